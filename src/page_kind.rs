//! Page-kind discriminator: names the subtree a key-value page
//! belongs to, written as the trailing byte of the page's serialized
//! form.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PageKind {
    NodePage = 0,
    PathSummaryPage = 1,
    TextValuePage = 2,
    AttributeValuePage = 3,
}

impl PageKind {
    pub fn from_tag(tag: u8) -> crate::error::Result<Self> {
        Ok(match tag {
            0 => PageKind::NodePage,
            1 => PageKind::PathSummaryPage,
            2 => PageKind::TextValuePage,
            3 => PageKind::AttributeValuePage,
            other => {
                return Err(crate::error::PageError::Format {
                    detail: format!("unknown page-kind tag {other}"),
                })
            }
        })
    }
}
