//! VarLong — the variable-length self-delimiting unsigned integer
//! encoding used throughout the page format (GLOSSARY). Backed by the
//! `leb128` crate rather than a hand-rolled scheme, matching the
//! closest example in the retrieval pack that persists page-index
//! integers the same way.

use std::io::{Read, Write};

use crate::error::{PageError, Result};

/// Write `value` as a VarLong.
pub fn write_varlong<W: Write>(out: &mut W, value: u64) -> Result<()> {
    leb128::write::unsigned(out, value)
        .map(|_| ())
        .map_err(PageError::Io)
}

/// Read a VarLong.
pub fn read_varlong<R: Read>(input: &mut R) -> Result<u64> {
    leb128::read::unsigned(input).map_err(|e| match e {
        leb128::read::Error::IoError(e) => PageError::Io(e),
        leb128::read::Error::Overflow => PageError::Format {
            detail: "VarLong overflowed 64 bits".to_string(),
        },
    })
}

/// Number of bytes `write_varlong` would emit for `value`, computed
/// directly from its magnitude (7 payload bits per byte) rather than by
/// running the encoder against a counting sink.
pub fn varlong_len(value: u64) -> usize {
    let mut v = value;
    let mut len = 1;
    while v >= 0x80 {
        v >>= 7;
        len += 1;
    }
    len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_small_and_large_values() {
        for v in [0u64, 1, 127, 128, 300, u32::MAX as u64, u64::MAX] {
            let mut buf = Vec::new();
            write_varlong(&mut buf, v).unwrap();
            let mut cursor = &buf[..];
            let got = read_varlong(&mut cursor).unwrap();
            assert_eq!(got, v);
        }
    }

    #[test]
    fn varlong_len_matches_actual_encoded_length() {
        for v in [0u64, 1, 127, 128, 16383, 16384, u32::MAX as u64, u64::MAX] {
            let mut buf = Vec::new();
            write_varlong(&mut buf, v).unwrap();
            assert_eq!(varlong_len(v), buf.len());
        }
    }
}
