//! lib0 variable-length unsigned integers
//!
//! Seven bits per byte, least significant group first; the high bit marks
//! that another byte follows.

use crate::error::{ProtocolError, ProtocolResult};
use bytes::BufMut;

/// Longest encoding of a u64
pub const MAX_VARINT_LEN: usize = 10;

/// Append `value` to `buf`
pub fn write_var_uint<B: BufMut>(buf: &mut B, mut value: u64) {
    while value > 0x7f {
        buf.put_u8(0x80 | (value & 0x7f) as u8);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

/// Number of bytes `value` takes once encoded
pub fn var_uint_len(mut value: u64) -> usize {
    let mut len = 1;
    while value > 0x7f {
        value >>= 7;
        len += 1;
    }
    len
}

/// Read an integer from the front of `data`.
///
/// Returns the value and the number of bytes consumed.
pub fn read_var_uint(data: &[u8]) -> ProtocolResult<(u64, usize)> {
    let mut value: u64 = 0;

    for (i, &byte) in data.iter().enumerate() {
        if i >= MAX_VARINT_LEN || (i == MAX_VARINT_LEN - 1 && byte > 1) {
            return Err(ProtocolError::VarintOverflow);
        }
        value |= u64::from(byte & 0x7f) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok((value, i + 1));
        }
    }

    Err(ProtocolError::UnexpectedEof("variable-length integer"))
}

/// Append `data` prefixed with its length
pub fn write_var_buf<B: BufMut>(buf: &mut B, data: &[u8]) {
    write_var_uint(buf, data.len() as u64);
    buf.put_slice(data);
}

/// Read a length-prefixed byte string from the front of `data`.
///
/// Returns the bytes and the total number of bytes consumed.
pub fn read_var_buf(data: &[u8]) -> ProtocolResult<(&[u8], usize)> {
    let (len, prefix) = read_var_uint(data)?;
    let remaining = data.len() - prefix;
    if len > remaining as u64 {
        return Err(ProtocolError::PayloadTruncated { len, remaining });
    }
    let end = prefix + len as usize;
    Ok((&data[prefix..end], end))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode(value: u64) -> Vec<u8> {
        let mut buf = Vec::new();
        write_var_uint(&mut buf, value);
        buf
    }

    #[test]
    fn test_known_encodings() {
        assert_eq!(encode(0), vec![0x00]);
        assert_eq!(encode(127), vec![0x7f]);
        assert_eq!(encode(128), vec![0x80, 0x01]);
        assert_eq!(encode(300), vec![0xac, 0x02]);
        assert_eq!(encode(u64::MAX).len(), MAX_VARINT_LEN);
    }

    #[test]
    fn test_len_matches_encoding() {
        for value in [0, 1, 127, 128, 16_383, 16_384, u32::MAX as u64, u64::MAX] {
            assert_eq!(var_uint_len(value), encode(value).len());
            assert_eq!(read_var_uint(&encode(value)).unwrap(), (value, encode(value).len()));
        }
    }

    #[test]
    fn test_truncated_integer() {
        assert_eq!(
            read_var_uint(&[0x80, 0x80]),
            Err(ProtocolError::UnexpectedEof("variable-length integer"))
        );
        assert!(read_var_uint(&[]).is_err());
    }

    #[test]
    fn test_overflow() {
        assert_eq!(read_var_uint(&[0xff; 11]), Err(ProtocolError::VarintOverflow));
    }

    #[test]
    fn test_var_buf_reports_truncation() {
        assert_eq!(
            read_var_buf(&[5, 1, 2]),
            Err(ProtocolError::PayloadTruncated { len: 5, remaining: 2 })
        );
        assert_eq!(read_var_buf(&[2, 1, 2, 9]).unwrap(), (&[1u8, 2][..], 3));
    }
}
