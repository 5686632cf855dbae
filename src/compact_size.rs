//! Bitcoin's CompactSize variable-length integer encoding.
//!
//! Counts and length prefixes on the wire are encoded in the smallest of
//! four forms: a single byte for values up to 0xfc, or a tag byte
//! (0xfd/0xfe/0xff) followed by 2, 4 or 8 little-endian bytes. Decoding
//! rejects non-minimal encodings so that parse/serialize round-trips are
//! bit exact.

use std::{error, fmt};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CompactSizeError {
    /// The buffer ended before the encoding was complete.
    UnexpectedEnd,
    /// The value was encoded in a wider form than necessary.
    NonMinimal,
}

impl fmt::Display for CompactSizeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            CompactSizeError::UnexpectedEnd => {
                write!(f, "CompactSize: buffer too short for encoding")
            }
            CompactSizeError::NonMinimal => write!(f, "CompactSize: non-minimal encoding"),
        }
    }
}

impl error::Error for CompactSizeError {}

/// Decodes the CompactSize starting at `pos` and returns the value
/// together with the position of the first byte after it.
pub fn decode(buf: &[u8], pos: usize) -> Result<(u64, usize), CompactSizeError> {
    let tag = *buf.get(pos).ok_or(CompactSizeError::UnexpectedEnd)?;
    let (value, width, minimal) = match tag {
        0x00..=0xfc => (u64::from(tag), 0, true),
        0xfd => {
            let v = u64::from(read_le_u16(buf, pos + 1)?);
            (v, 2, v >= 0xfd)
        }
        0xfe => {
            let v = u64::from(read_le_u32(buf, pos + 1)?);
            (v, 4, v > 0xffff)
        }
        0xff => {
            let v = read_le_u64(buf, pos + 1)?;
            (v, 8, v > 0xffff_ffff)
        }
    };
    if !minimal {
        return Err(CompactSizeError::NonMinimal);
    }
    Ok((value, pos + 1 + width))
}

/// Encodes `value` in its minimal CompactSize form.
pub fn encode(value: u64) -> Vec<u8> {
    let mut out = Vec::with_capacity(encoded_size(value));
    encode_into(value, &mut out);
    out
}

/// Appends the minimal CompactSize form of `value` to `out`.
pub fn encode_into(value: u64, out: &mut Vec<u8>) {
    match value {
        0x00..=0xfc => out.push(value as u8),
        0xfd..=0xffff => {
            out.push(0xfd);
            out.extend_from_slice(&(value as u16).to_le_bytes());
        }
        0x1_0000..=0xffff_ffff => {
            out.push(0xfe);
            out.extend_from_slice(&(value as u32).to_le_bytes());
        }
        _ => {
            out.push(0xff);
            out.extend_from_slice(&value.to_le_bytes());
        }
    }
}

/// Byte length of `encode(value)` without encoding.
pub fn encoded_size(value: u64) -> usize {
    match value {
        0x00..=0xfc => 1,
        0xfd..=0xffff => 3,
        0x1_0000..=0xffff_ffff => 5,
        _ => 9,
    }
}

fn read_le_u16(buf: &[u8], pos: usize) -> Result<u16, CompactSizeError> {
    let bytes = buf
        .get(pos..pos + 2)
        .ok_or(CompactSizeError::UnexpectedEnd)?;
    let mut le = [0u8; 2];
    le.copy_from_slice(bytes);
    Ok(u16::from_le_bytes(le))
}

fn read_le_u32(buf: &[u8], pos: usize) -> Result<u32, CompactSizeError> {
    let bytes = buf
        .get(pos..pos + 4)
        .ok_or(CompactSizeError::UnexpectedEnd)?;
    let mut le = [0u8; 4];
    le.copy_from_slice(bytes);
    Ok(u32::from_le_bytes(le))
}

fn read_le_u64(buf: &[u8], pos: usize) -> Result<u64, CompactSizeError> {
    let bytes = buf
        .get(pos..pos + 8)
        .ok_or(CompactSizeError::UnexpectedEnd)?;
    let mut le = [0u8; 8];
    le.copy_from_slice(bytes);
    Ok(u64::from_le_bytes(le))
}

#[cfg(test)]
mod tests {
    use super::{decode, encode, encoded_size, CompactSizeError};

    #[test]
    fn encode_boundaries() {
        assert_eq!(encode(0), vec![0x00]);
        assert_eq!(encode(252), vec![0xfc]);
        assert_eq!(encode(253), vec![0xfd, 0xfd, 0x00]);
        assert_eq!(encode(0xffff), vec![0xfd, 0xff, 0xff]);
        assert_eq!(encode(0x1_0000), vec![0xfe, 0x00, 0x00, 0x01, 0x00]);
        assert_eq!(encode(0xffff_ffff), vec![0xfe, 0xff, 0xff, 0xff, 0xff]);
        assert_eq!(
            encode(0x1_0000_0000),
            vec![0xff, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00]
        );
        assert_eq!(
            encode(u64::MAX),
            vec![0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff]
        );
    }

    #[test]
    fn round_trip_law() {
        let values = [
            0u64,
            1,
            0x10,
            0xfc,
            0xfd,
            0x1234,
            0xffff,
            0x1_0000,
            0xdead_beef,
            0xffff_ffff,
            0x1_0000_0000,
            u64::MAX,
        ];
        for &v in values.iter() {
            let bytes = encode(v);
            assert_eq!(bytes.len(), encoded_size(v));
            assert_eq!(decode(&bytes, 0), Ok((v, encoded_size(v))));
        }
    }

    #[test]
    fn decode_at_offset() {
        let buf = [0xaa, 0xbb, 0xfd, 0x34, 0x12];
        assert_eq!(decode(&buf, 2), Ok((0x1234, 5)));
    }

    #[test]
    fn decode_truncated() {
        assert_eq!(decode(&[], 0), Err(CompactSizeError::UnexpectedEnd));
        assert_eq!(decode(&[0xfd, 0x01], 0), Err(CompactSizeError::UnexpectedEnd));
        assert_eq!(
            decode(&[0xfe, 0x01, 0x02, 0x03], 0),
            Err(CompactSizeError::UnexpectedEnd)
        );
        assert_eq!(
            decode(&[0xff, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07], 0),
            Err(CompactSizeError::UnexpectedEnd)
        );
    }

    #[test]
    fn decode_non_minimal() {
        // 16 fits a single byte, 0xfd fits two, 0xffff fits four.
        assert_eq!(
            decode(&[0xfd, 0x10, 0x00], 0),
            Err(CompactSizeError::NonMinimal)
        );
        assert_eq!(
            decode(&[0xfe, 0xfd, 0x00, 0x00, 0x00], 0),
            Err(CompactSizeError::NonMinimal)
        );
        assert_eq!(
            decode(
                &[0xff, 0xff, 0xff, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
                0
            ),
            Err(CompactSizeError::NonMinimal)
        );
    }
}
