//! Dewey-ID: hierarchical node position used for fast structural
//! comparisons. Treated elsewhere as an opaque, orderable,
//! variable-length byte string; this module picks the concrete
//! representation the rest of the crate builds against.

use std::io::{Read, Write};

use crate::error::Result;
use crate::varint::{read_varlong, varlong_len, write_varlong};

/// A hierarchical position: one entry per tree level (ancestor prefix
/// + sibling index). `Ord` is derived directly from the level vector,
/// so a strict-prefix ancestor sorts before its descendant and sibling
/// indices compare numerically within a shared prefix — the natural
/// document-order comparison a Dewey-ID is meant to give.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DeweyId(Vec<u32>);

impl DeweyId {
    pub fn from_levels(levels: impl Into<Vec<u32>>) -> Self {
        Self(levels.into())
    }

    pub fn levels(&self) -> &[u32] {
        &self.0
    }

    /// Count of shared leading levels with `other`.
    fn common_prefix_len(&self, other: &DeweyId) -> usize {
        self.0
            .iter()
            .zip(other.0.iter())
            .take_while(|(a, b)| a == b)
            .count()
    }

    /// Byte length of the raw, non-delta VarLong-per-level encoding.
    /// Used only as the sort key ordering Dewey-entries by increasing
    /// serialized byte length: the delta-encoded length depends on the
    /// previously-emitted id, which in turn depends on this very
    /// ordering, so a raw length is the only well-defined key available
    /// before emission order is decided (see DESIGN.md).
    pub fn encoded_len(&self) -> usize {
        self.0.iter().map(|&level| varlong_len(level as u64)).sum()
    }

    /// Write `self` delta-encoded against `previous`. `kind_tag` is
    /// carried through as a one-byte tag ahead of the payload (real
    /// codecs may use it to special-case e.g. attribute nodes).
    pub fn serialize_delta<W: Write>(
        &self,
        out: &mut W,
        kind_tag: u8,
        previous: Option<&DeweyId>,
    ) -> Result<()> {
        out.write_all(&[kind_tag])?;
        let prefix = previous.map(|p| self.common_prefix_len(p)).unwrap_or(0);
        write_varlong(out, prefix as u64)?;
        let suffix = &self.0[prefix..];
        write_varlong(out, suffix.len() as u64)?;
        for &level in suffix {
            write_varlong(out, level as u64)?;
        }
        Ok(())
    }

    /// Read a delta-encoded Dewey-ID previously written by
    /// `serialize_delta`.
    pub fn deserialize_delta<R: Read>(input: &mut R, previous: Option<&DeweyId>) -> Result<(Self, u8)> {
        let mut kind_tag = [0u8; 1];
        input.read_exact(&mut kind_tag)?;
        let prefix = read_varlong(input)? as usize;
        let suffix_len = read_varlong(input)? as usize;
        let mut levels = match previous {
            Some(p) if prefix <= p.0.len() => p.0[..prefix].to_vec(),
            Some(_) => {
                return Err(crate::error::PageError::Format {
                    detail: "dewey-id prefix longer than previous id".to_string(),
                })
            }
            None => {
                if prefix != 0 {
                    return Err(crate::error::PageError::Format {
                        detail: "dewey-id prefix on first element must be 0".to_string(),
                    });
                }
                Vec::new()
            }
        };
        levels.reserve(suffix_len);
        for _ in 0..suffix_len {
            levels.push(read_varlong(input)? as u32);
        }
        Ok((DeweyId(levels), kind_tag[0]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn natural_ordering_is_ancestor_before_descendant() {
        let root = DeweyId::from_levels(vec![1]);
        let child = DeweyId::from_levels(vec![1, 2]);
        let grandchild = DeweyId::from_levels(vec![1, 2, 3]);
        assert!(root < child);
        assert!(child < grandchild);
        assert!(root < grandchild);
    }

    #[test]
    fn delta_roundtrip_chain() {
        let ids = vec![
            DeweyId::from_levels(vec![1]),
            DeweyId::from_levels(vec![1, 2]),
            DeweyId::from_levels(vec![1, 2, 3]),
        ];
        let mut buf = Vec::new();
        let mut prev: Option<DeweyId> = None;
        for id in &ids {
            id.serialize_delta(&mut buf, 1, prev.as_ref()).unwrap();
            prev = Some(id.clone());
        }

        let mut cursor = &buf[..];
        let mut prev: Option<DeweyId> = None;
        for expected in &ids {
            let (got, tag) = DeweyId::deserialize_delta(&mut cursor, prev.as_ref()).unwrap();
            assert_eq!(&got, expected);
            assert_eq!(tag, 1);
            prev = Some(got);
        }
    }
}
