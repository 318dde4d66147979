//! Document-id framing
//!
//! A frame routes one message to one document: the UTF-8 document ID,
//! prefixed with its byte length, followed by the message bytes.

use crate::error::{ProtocolError, ProtocolResult};
use crate::varint::{read_var_uint, var_uint_len, write_var_uint};
use bytes::{BufMut, Bytes, BytesMut};

/// A decoded frame, borrowing from the received bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    pub doc_id: &'a str,
    pub message: &'a [u8],
}

/// Prefix `message` with the ID of the document it belongs to
pub fn encode_frame(doc_id: &str, message: &[u8]) -> Bytes {
    let id = doc_id.as_bytes();
    let mut buf = BytesMut::with_capacity(var_uint_len(id.len() as u64) + id.len() + message.len());
    write_var_uint(&mut buf, id.len() as u64);
    buf.put_slice(id);
    buf.put_slice(message);
    buf.freeze()
}

/// Split a frame into its document ID and message.
///
/// Any error here means the byte stream can no longer be trusted.
pub fn decode_frame(data: &[u8]) -> ProtocolResult<Frame<'_>> {
    let (len, prefix) = read_var_uint(data)?;
    let remaining = data.len() - prefix;
    if len > remaining as u64 {
        return Err(ProtocolError::IdTooLong { len, remaining });
    }

    let end = prefix + len as usize;
    let doc_id = std::str::from_utf8(&data[prefix..end]).map_err(|_| ProtocolError::InvalidUtf8)?;
    let message = &data[end..];
    if message.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }

    Ok(Frame { doc_id, message })
}
