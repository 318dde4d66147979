//! Length-delimited frame decoder for byte-stream transports

use crate::error::{ProtocolError, ProtocolResult};
use crate::varint::{read_var_uint, var_uint_len, write_var_uint};
use bytes::{BufMut, Bytes, BytesMut};

/// Maximum frame size (16MB)
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

/// Prefix a frame with its length for a byte-stream transport
pub fn encode_delimited(frame: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(var_uint_len(frame.len() as u64) + frame.len());
    write_var_uint(&mut buf, frame.len() as u64);
    buf.put_slice(frame);
    buf.freeze()
}

/// Reassembles frames from arbitrarily split reads
pub struct FrameDecoder {
    buffer: BytesMut,
    max_frame_size: usize,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::with_max_frame_size(MAX_FRAME_SIZE)
    }

    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(4096),
            max_frame_size,
        }
    }

    /// Add data to the decoder buffer
    pub fn feed(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Bytes received but not yet returned as a frame
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Try to take a complete frame from the buffer
    pub fn next_frame(&mut self) -> ProtocolResult<Option<Bytes>> {
        let (len, prefix) = match read_var_uint(&self.buffer) {
            Ok(header) => header,
            Err(ProtocolError::UnexpectedEof(_)) => return Ok(None), // Incomplete
            Err(e) => return Err(e),
        };

        if len > self.max_frame_size as u64 {
            return Err(ProtocolError::FrameTooLarge {
                size: usize::try_from(len).unwrap_or(usize::MAX),
                max: self.max_frame_size,
            });
        }

        let len = len as usize;
        if self.buffer.len() < prefix + len {
            return Ok(None);
        }

        let _ = self.buffer.split_to(prefix);
        Ok(Some(self.buffer.split_to(len).freeze()))
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{decode_frame, encode_frame};

    #[test]
    fn test_single_frame() {
        let frame = encode_frame("a", &[0, 2, 0]);
        let mut decoder = FrameDecoder::new();
        decoder.feed(&encode_delimited(&frame));

        assert_eq!(decoder.next_frame().unwrap(), Some(frame));
        assert_eq!(decoder.next_frame().unwrap(), None);
        assert_eq!(decoder.buffered(), 0);
    }

    #[test]
    fn test_split_reads() {
        let frame = encode_frame("notes", &[0, 0, 1, 0]);
        let wire = encode_delimited(&frame);
        let mut decoder = FrameDecoder::new();

        for byte in &wire[..wire.len() - 1] {
            decoder.feed(&[*byte]);
            assert!(decoder.next_frame().unwrap().is_none());
        }
        decoder.feed(&wire[wire.len() - 1..]);

        let got = decoder.next_frame().unwrap().unwrap();
        assert_eq!(decode_frame(&got).unwrap().doc_id, "notes");
    }

    #[test]
    fn test_several_frames_in_one_read() {
        let mut wire = BytesMut::new();
        for id in ["a", "b", "c"] {
            wire.extend_from_slice(&encode_delimited(&encode_frame(id, &[1])));
        }

        let mut decoder = FrameDecoder::new();
        decoder.feed(&wire);

        let ids: Vec<String> = std::iter::from_fn(|| decoder.next_frame().unwrap())
            .map(|f| decode_frame(&f).unwrap().doc_id.to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_oversized_frame_rejected() {
        let mut decoder = FrameDecoder::with_max_frame_size(8);
        decoder.feed(&encode_delimited(&[0u8; 9]));

        assert_eq!(
            decoder.next_frame(),
            Err(ProtocolError::FrameTooLarge { size: 9, max: 8 })
        );
    }
}
