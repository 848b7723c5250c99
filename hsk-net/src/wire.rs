use crate::error::{NetworkError, Result};
use bytes::{Bytes, BytesMut};
use hsk_core::constants::{MAX_MESSAGE_SIZE, WIRE_HEADER_SIZE};
use std::collections::VecDeque;

/// A fully parsed frame: `[magic][cmd][payload_len][payload]` minus the
/// envelope (spec §4.2/§6).
#[derive(Debug, Clone)]
pub struct Frame {
    pub cmd: u8,
    pub payload: Bytes,
}

/// Builds the wire envelope for an outgoing packet.
pub fn encode(magic: u32, cmd: u8, payload: &[u8]) -> Bytes {
    let mut out = BytesMut::with_capacity(WIRE_HEADER_SIZE + payload.len());
    out.extend_from_slice(&magic.to_le_bytes());
    out.extend_from_slice(&[cmd]);
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    out.freeze()
}

/// A streaming frame parser. Consumes an unbounded byte stream through
/// `feed(chunk)` and emits zero or more parsed frames per call; there are
/// no hidden awaits (design note §9) — everything is driven explicitly by
/// `waiting`, the number of bytes still needed to complete the stage in
/// progress, and `pending`, the queue of not-yet-consumed chunks.
pub struct WireCodec {
    magic: u32,
    waiting: usize,
    header_done: bool,
    cmd: u8,
    payload_len: u32,
    pending: VecDeque<Bytes>,
    buffered_len: usize,
}

impl WireCodec {
    pub fn new(magic: u32) -> WireCodec {
        WireCodec {
            magic,
            waiting: WIRE_HEADER_SIZE,
            header_done: false,
            cmd: 0,
            payload_len: 0,
            pending: VecDeque::new(),
            buffered_len: 0,
        }
    }

    pub fn feed(&mut self, chunk: Bytes) -> Result<Vec<Frame>> {
        if !chunk.is_empty() {
            self.buffered_len += chunk.len();
            self.pending.push_back(chunk);
        }

        let mut frames = Vec::new();
        while self.buffered_len >= self.waiting {
            if !self.header_done {
                let header = self.take(WIRE_HEADER_SIZE);
                let magic = u32::from_le_bytes([header[0], header[1], header[2], header[3]]);
                if magic != self.magic {
                    return Err(NetworkError::BadMagic);
                }
                let cmd = header[4];
                let len = u32::from_le_bytes([header[5], header[6], header[7], header[8]]);
                if len as usize > MAX_MESSAGE_SIZE {
                    return Err(NetworkError::Oversize(len as usize));
                }
                self.cmd = cmd;
                self.payload_len = len;
                if len == 0 {
                    frames.push(Frame { cmd, payload: Bytes::new() });
                    self.waiting = WIRE_HEADER_SIZE;
                } else {
                    self.header_done = true;
                    self.waiting = len as usize;
                }
            } else {
                let payload = self.take(self.payload_len as usize);
                frames.push(Frame { cmd: self.cmd, payload });
                self.header_done = false;
                self.waiting = WIRE_HEADER_SIZE;
            }
        }
        Ok(frames)
    }

    /// Pulls exactly `n` bytes out of `pending`, coalescing chunks if the
    /// requested span crosses a chunk boundary.
    fn take(&mut self, n: usize) -> Bytes {
        debug_assert!(self.buffered_len >= n);
        self.buffered_len -= n;

        if let Some(front) = self.pending.front() {
            if front.len() == n {
                return self.pending.pop_front().unwrap();
            }
            if front.len() > n {
                let mut front = self.pending.pop_front().unwrap();
                let taken = front.split_to(n);
                self.pending.push_front(front);
                return taken;
            }
        }

        let mut out = BytesMut::with_capacity(n);
        let mut remaining = n;
        while remaining > 0 {
            let mut front = self.pending.pop_front().expect("buffered_len tracked correctly");
            if front.len() <= remaining {
                remaining -= front.len();
                out.extend_from_slice(&front);
            } else {
                let rest = front.split_off(remaining);
                out.extend_from_slice(&front);
                self.pending.push_front(rest);
                remaining = 0;
            }
        }
        out.freeze()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAGIC: u32 = 0x1234_5678;

    #[test]
    fn encode_decode_round_trip() {
        let payload = b"hello handshake";
        let frame = encode(MAGIC, 2, payload);
        let mut codec = WireCodec::new(MAGIC);
        let frames = codec.feed(frame).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].cmd, 2);
        assert_eq!(&frames[0].payload[..], payload);
    }

    #[test]
    fn split_across_many_small_chunks() {
        let payload = vec![7u8; 5000];
        let frame = encode(MAGIC, 9, &payload);
        let mut codec = WireCodec::new(MAGIC);
        let mut frames = Vec::new();
        for byte in frame {
            frames.extend(codec.feed(Bytes::copy_from_slice(&[byte])).unwrap());
        }
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0].payload[..], &payload[..]);
    }

    #[test]
    fn two_frames_in_one_chunk() {
        let mut buf = BytesMut::new();
        buf.extend_from_slice(&encode(MAGIC, 1, b"a"));
        buf.extend_from_slice(&encode(MAGIC, 2, b"bb"));
        let mut codec = WireCodec::new(MAGIC);
        let frames = codec.feed(buf.freeze()).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].cmd, 1);
        assert_eq!(frames[1].cmd, 2);
    }

    #[test]
    fn bad_magic_is_protocol_error() {
        let frame = encode(MAGIC, 1, b"x");
        let mut codec = WireCodec::new(0xdead_beef);
        assert!(matches!(codec.feed(frame), Err(NetworkError::BadMagic)));
    }

    #[test]
    fn oversize_payload_is_rejected() {
        let mut header = BytesMut::new();
        header.extend_from_slice(&MAGIC.to_le_bytes());
        header.extend_from_slice(&[1u8]);
        header.extend_from_slice(&((MAX_MESSAGE_SIZE as u32) + 1).to_le_bytes());
        let mut codec = WireCodec::new(MAGIC);
        assert!(matches!(codec.feed(header.freeze()), Err(NetworkError::Oversize(_))));
    }

    #[test]
    fn exact_max_message_size_is_accepted_as_header() {
        let mut header = BytesMut::new();
        header.extend_from_slice(&MAGIC.to_le_bytes());
        header.extend_from_slice(&[1u8]);
        header.extend_from_slice(&(MAX_MESSAGE_SIZE as u32).to_le_bytes());
        let mut codec = WireCodec::new(MAGIC);
        assert!(codec.feed(header.freeze()).is_ok());
    }
}
