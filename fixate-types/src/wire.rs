//! Length-delimited multipart framing.
//!
//! Every channel in the system (video, joint state, perception, external
//! commands, robot shim) carries multipart messages over a byte stream:
//!
//! ```text
//! message := u8 part_count, part*
//! part    := u32_le len, len bytes
//! ```
//!
//! The decoder is incremental: feed it bytes as they arrive and pull
//! complete messages out. Partial messages stay buffered.

use byteorder::{ByteOrder, LittleEndian};
use bytes::{Buf, BytesMut};

/// Parts of one decoded multipart message, in wire order.
pub type Multipart = Vec<Vec<u8>>;

/// Refuse absurd part sizes rather than attempting the allocation. The
/// largest legitimate part is a 640x480 RGB frame (921600 bytes).
const MAX_PART_LEN: usize = 4 * 1024 * 1024;

const MAX_PARTS: usize = 16;

#[derive(Debug, Default)]
pub struct MultipartCodec {
    buf: BytesMut,
}

impl MultipartCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append raw bytes received from the transport.
    pub fn feed(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Try to decode the next complete message.
    ///
    /// Returns `Ok(None)` when more bytes are needed. A malformed header
    /// is unrecoverable for a stream transport, so it is surfaced as an
    /// error and the caller reconnects.
    pub fn try_decode(&mut self) -> crate::Result<Option<Multipart>> {
        if self.buf.is_empty() {
            return Ok(None);
        }
        let n_parts = self.buf[0] as usize;
        if n_parts == 0 || n_parts > MAX_PARTS {
            return Err(crate::Error::MalformedMessage("bad part count"));
        }

        // First pass: check the whole message is buffered.
        let mut offset = 1usize;
        for _ in 0..n_parts {
            if self.buf.len() < offset + 4 {
                return Ok(None);
            }
            let len = LittleEndian::read_u32(&self.buf[offset..offset + 4]) as usize;
            if len > MAX_PART_LEN {
                return Err(crate::Error::MalformedMessage("oversized part"));
            }
            offset += 4;
            if self.buf.len() < offset + len {
                return Ok(None);
            }
            offset += len;
        }

        // Second pass: split it off.
        self.buf.advance(1);
        let mut parts = Vec::with_capacity(n_parts);
        for _ in 0..n_parts {
            let len = LittleEndian::read_u32(&self.buf[0..4]) as usize;
            self.buf.advance(4);
            parts.push(self.buf.split_to(len).to_vec());
        }
        Ok(Some(parts))
    }
}

/// Encode a multipart message into a fresh buffer ready to write.
pub fn encode_multipart(parts: &[&[u8]]) -> Vec<u8> {
    assert!(!parts.is_empty() && parts.len() <= MAX_PARTS);
    let total: usize = 1 + parts.iter().map(|p| 4 + p.len()).sum::<usize>();
    let mut out = Vec::with_capacity(total);
    out.push(parts.len() as u8);
    for part in parts {
        let mut len_buf = [0u8; 4];
        LittleEndian::write_u32(&mut len_buf, part.len() as u32);
        out.extend_from_slice(&len_buf);
        out.extend_from_slice(part);
    }
    out
}

/// Pack a capture timestamp into the 8-byte little-endian video header.
pub fn encode_timestamp_header(timestamp: f64) -> [u8; 8] {
    let mut buf = [0u8; 8];
    LittleEndian::write_f64(&mut buf, timestamp);
    buf
}

/// Unpack the 8-byte little-endian video header.
pub fn decode_timestamp_header(buf: &[u8]) -> Option<f64> {
    if buf.len() != 8 {
        return None;
    }
    Some(LittleEndian::read_f64(buf))
}
