//! MLLP frame codec
//!
//! Decoding is a two-state scan over the byte stream: bytes before the
//! start marker are discarded, a second start marker restarts the frame,
//! and a `0x1C 0x0D` pair terminates it. A `0x1C` not followed by `0x0D`
//! stays in the body.

use bytes::{Buf, BufMut, BytesMut};
use hale_core::error::Error;
use tokio_util::codec::{Decoder, Encoder};

/// Start of block (VT)
pub const START_OF_BLOCK: u8 = 0x0B;
/// End of block (FS)
pub const END_OF_BLOCK: u8 = 0x1C;
/// End of frame (CR)
pub const CARRIAGE_RETURN: u8 = 0x0D;

/// Default maximum frame size (10 MB); bounds buffer growth on a
/// misbehaving peer.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 10 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DecodeState {
    WaitStart,
    InBody,
}

/// Frame codec for MLLP over TCP
///
/// Decodes to the UTF-8 payload between the markers; encodes by wrapping
/// the payload in the markers.
#[derive(Debug)]
pub struct MllpCodec {
    state: DecodeState,
    body: Vec<u8>,
    max_frame_size: usize,
}

impl Default for MllpCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FRAME_SIZE)
    }
}

impl MllpCodec {
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            state: DecodeState::WaitStart,
            body: Vec::new(),
            max_frame_size,
        }
    }

    /// Wrap a payload in MLLP framing
    pub fn frame(payload: &str) -> Vec<u8> {
        let mut framed = Vec::with_capacity(payload.len() + 3);
        framed.push(START_OF_BLOCK);
        framed.extend_from_slice(payload.as_bytes());
        framed.push(END_OF_BLOCK);
        framed.push(CARRIAGE_RETURN);
        framed
    }
}

/// A decoded frame, or the frame-local error it was dropped for
///
/// Frame problems (oversize body, non-UTF-8 payload) are yielded as values
/// rather than stream errors so the connection keeps going; only I/O
/// failures terminate the stream.
pub type DecodedFrame = Result<String, Error>;

impl Decoder for MllpCodec {
    type Item = DecodedFrame;
    type Error = Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<DecodedFrame>, Error> {
        while src.has_remaining() {
            match self.state {
                DecodeState::WaitStart => {
                    match src.iter().position(|&b| b == START_OF_BLOCK) {
                        Some(pos) => {
                            src.advance(pos + 1);
                            self.body.clear();
                            self.state = DecodeState::InBody;
                        }
                        None => {
                            // Garbage between frames is discarded
                            src.clear();
                            return Ok(None);
                        }
                    }
                }
                DecodeState::InBody => {
                    let byte = src.get_u8();
                    if byte == START_OF_BLOCK {
                        // Restart: a new start marker abandons the
                        // accumulated body
                        self.body.clear();
                        continue;
                    }
                    if byte == CARRIAGE_RETURN && self.body.last() == Some(&END_OF_BLOCK) {
                        self.body.pop();
                        self.state = DecodeState::WaitStart;
                        let payload = std::mem::take(&mut self.body);
                        return match String::from_utf8(payload) {
                            Ok(payload) => Ok(Some(Ok(payload))),
                            Err(e) => Ok(Some(Err(Error::frame(format!(
                                "frame is not UTF-8: {}",
                                e
                            ))))),
                        };
                    }
                    self.body.push(byte);
                    if self.body.len() > self.max_frame_size {
                        self.body.clear();
                        self.state = DecodeState::WaitStart;
                        return Ok(Some(Err(Error::frame(format!(
                            "frame exceeds maximum size of {} bytes",
                            self.max_frame_size
                        )))));
                    }
                }
            }
        }
        Ok(None)
    }
}

impl<T: AsRef<str>> Encoder<T> for MllpCodec {
    type Error = Error;

    fn encode(&mut self, payload: T, dst: &mut BytesMut) -> Result<(), Error> {
        let payload = payload.as_ref();
        dst.reserve(payload.len() + 3);
        dst.put_u8(START_OF_BLOCK);
        dst.put_slice(payload.as_bytes());
        dst.put_u8(END_OF_BLOCK);
        dst.put_u8(CARRIAGE_RETURN);
        Ok(())
    }
}
