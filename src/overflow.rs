//! Overflow page: a flat byte container used when a single serialized
//! record exceeds the inline size limit. It carries
//! no metadata of its own; its identity is the `PageReference` that
//! points at it. The on-disk layout of the page itself belongs to the
//! surrounding page-write machinery and is out of scope here.

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverflowPage {
    data: Vec<u8>,
}

impl OverflowPage {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }
}
