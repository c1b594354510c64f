//! Binary frame codec for the attach channel.
//!
//! Encode and decode are pure functions: no hidden state, no allocation
//! pooling. [`decode_frame`] takes one complete frame's bytes; [`FrameReader`]
//! buffers partial reads off a socket and yields frames as they complete,
//! for the attach hub's input task.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Maximum payload size for `stdin`/`stdout`/`stderr` frames: 2^24 - 1
/// bytes.
pub const MAX_PAYLOAD_LEN: usize = (1 << 24) - 1;
/// `error` frame text is silently truncated to this many bytes on encode.
pub const MAX_ERROR_LEN: usize = 1024;

const TAG_STDIN: u8 = 0x01;
const TAG_STDOUT: u8 = 0x02;
const TAG_STDERR: u8 = 0x03;
const TAG_EXIT: u8 = 0x04;
const TAG_ERROR: u8 = 0x05;
const TAG_STDIN_CLOSE: u8 = 0x06;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Stdin(Vec<u8>),
    Stdout(Vec<u8>),
    Stderr(Vec<u8>),
    Exit(i32),
    Error(String),
    StdinClose,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CodecError {
    #[error("payload of {0} bytes exceeds the 2^24-1 byte limit")]
    PayloadTooLarge(usize),
    #[error("unknown frame tag {0:#04x}")]
    UnknownTag(u8),
    #[error("truncated frame: need {needed} bytes, have {have}")]
    Truncated { needed: usize, have: usize },
    #[error("declared length {declared} does not match {actual} bytes available")]
    LengthMismatch { declared: usize, actual: usize },
    #[error("error frame payload is not valid UTF-8")]
    InvalidUtf8,
}

fn put_length_prefixed(buf: &mut BytesMut, tag: u8, payload: &[u8]) -> Result<(), CodecError> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(CodecError::PayloadTooLarge(payload.len()));
    }
    buf.put_u8(tag);
    buf.put_u32(payload.len() as u32);
    buf.put_slice(payload);
    Ok(())
}

/// Encode `frame` to its wire bytes.
pub fn encode_frame(frame: &Frame) -> Result<Bytes, CodecError> {
    let mut buf = BytesMut::new();
    match frame {
        Frame::Stdin(data) => put_length_prefixed(&mut buf, TAG_STDIN, data)?,
        Frame::Stdout(data) => put_length_prefixed(&mut buf, TAG_STDOUT, data)?,
        Frame::Stderr(data) => put_length_prefixed(&mut buf, TAG_STDERR, data)?,
        Frame::Exit(code) => {
            buf.put_u8(TAG_EXIT);
            buf.put_i32(*code);
        }
        Frame::Error(message) => {
            let truncated = if message.len() > MAX_ERROR_LEN {
                let mut cut = MAX_ERROR_LEN;
                while !message.is_char_boundary(cut) {
                    cut -= 1;
                }
                &message[..cut]
            } else {
                message.as_str()
            };
            put_length_prefixed(&mut buf, TAG_ERROR, truncated.as_bytes())?;
        }
        Frame::StdinClose => buf.put_u8(TAG_STDIN_CLOSE),
    }
    Ok(buf.freeze())
}

/// Decode exactly one frame from a complete, self-contained byte slice.
/// Any leftover trailing bytes are an error. Callers that read frames off
/// a stream should use [`FrameReader`] instead.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, CodecError> {
    let mut cursor = bytes;
    let frame = decode_one(&mut cursor)?;
    if !cursor.is_empty() {
        return Err(CodecError::LengthMismatch { declared: bytes.len() - cursor.len(), actual: bytes.len() });
    }
    Ok(frame)
}

fn decode_one(cursor: &mut &[u8]) -> Result<Frame, CodecError> {
    if cursor.is_empty() {
        return Err(CodecError::Truncated { needed: 1, have: 0 });
    }
    let tag = cursor.get_u8();

    match tag {
        TAG_STDIN | TAG_STDOUT | TAG_STDERR | TAG_ERROR => {
            if cursor.remaining() < 4 {
                return Err(CodecError::Truncated { needed: 4, have: cursor.remaining() });
            }
            let len = cursor.get_u32() as usize;
            if len > MAX_PAYLOAD_LEN {
                return Err(CodecError::PayloadTooLarge(len));
            }
            if cursor.remaining() < len {
                return Err(CodecError::Truncated { needed: len, have: cursor.remaining() });
            }
            let payload = cursor[..len].to_vec();
            cursor.advance(len);

            Ok(match tag {
                TAG_STDIN => Frame::Stdin(payload),
                TAG_STDOUT => Frame::Stdout(payload),
                TAG_STDERR => Frame::Stderr(payload),
                TAG_ERROR => Frame::Error(String::from_utf8(payload).map_err(|_| CodecError::InvalidUtf8)?),
                _ => unreachable!(),
            })
        }
        TAG_EXIT => {
            if cursor.remaining() < 4 {
                return Err(CodecError::Truncated { needed: 4, have: cursor.remaining() });
            }
            Ok(Frame::Exit(cursor.get_i32()))
        }
        TAG_STDIN_CLOSE => Ok(Frame::StdinClose),
        other => Err(CodecError::UnknownTag(other)),
    }
}

/// Incremental frame reader for a byte stream: the attach hub's input
/// task reads frames as bytes trickle in off the channel.
#[derive(Default)]
pub struct FrameReader {
    buf: BytesMut,
}

impl FrameReader {
    pub fn new() -> Self {
        Self { buf: BytesMut::new() }
    }

    /// Append newly-read bytes.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Try to pull one complete frame out of the buffered bytes.
    ///
    /// Returns `Ok(None)` if more bytes are needed, `Ok(Some(frame))` once
    /// a full frame is available (consuming it from the internal buffer),
    /// or `Err` if the buffered prefix can never form a valid frame
    /// (unknown tag, or a declared length beyond the protocol's limit).
    pub fn next_frame(&mut self) -> Result<Option<Frame>, CodecError> {
        if self.buf.is_empty() {
            return Ok(None);
        }
        let tag = self.buf[0];

        let frame_len = match tag {
            TAG_STDIN | TAG_STDOUT | TAG_STDERR | TAG_ERROR => {
                if self.buf.len() < 5 {
                    return Ok(None);
                }
                let len = u32::from_be_bytes(self.buf[1..5].try_into().unwrap()) as usize;
                if len > MAX_PAYLOAD_LEN {
                    return Err(CodecError::PayloadTooLarge(len));
                }
                5 + len
            }
            TAG_EXIT => 5,
            TAG_STDIN_CLOSE => 1,
            other => return Err(CodecError::UnknownTag(other)),
        };

        if self.buf.len() < frame_len {
            return Ok(None);
        }

        let frame_bytes = self.buf.split_to(frame_len);
        Ok(Some(decode_frame(&frame_bytes)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::stdin(Frame::Stdin(b"hello".to_vec()))]
    #[case::stdout(Frame::Stdout(b"world".to_vec()))]
    #[case::empty_stderr(Frame::Stderr(vec![]))]
    #[case::exit_zero(Frame::Exit(0))]
    #[case::exit_nonzero(Frame::Exit(137))]
    #[case::error(Frame::Error("boom".to_string()))]
    #[case::stdin_close(Frame::StdinClose)]
    fn round_trips_every_message_kind(#[case] frame: Frame) {
        let bytes = encode_frame(&frame).unwrap();
        assert_eq!(decode_frame(&bytes).unwrap(), frame);
    }

    #[test]
    fn encoding_oversized_payload_fails() {
        let data = vec![0u8; MAX_PAYLOAD_LEN + 1];
        let err = encode_frame(&Frame::Stdin(data)).unwrap_err();
        assert!(matches!(err, CodecError::PayloadTooLarge(_)));
    }

    #[test]
    fn error_frame_text_is_truncated_silently() {
        let long = "x".repeat(MAX_ERROR_LEN + 500);
        let encoded = encode_frame(&Frame::Error(long)).unwrap();
        let decoded = decode_frame(&encoded).unwrap();
        match decoded {
            Frame::Error(text) => assert_eq!(text.len(), MAX_ERROR_LEN),
            other => panic!("expected Error frame, got {other:?}"),
        }
    }

    #[test]
    fn truncated_length_prefixed_frame_fails() {
        let full = encode_frame(&Frame::Stdout(b"0123456789".to_vec())).unwrap();
        let truncated = &full[..full.len() - 3];
        assert!(decode_frame(truncated).is_err());
    }

    #[test]
    fn unknown_tag_fails() {
        let bytes = [0xffu8];
        assert!(matches!(decode_frame(&bytes), Err(CodecError::UnknownTag(0xff))));
    }

    #[test]
    fn frame_reader_assembles_frames_fed_in_pieces() {
        let mut reader = FrameReader::new();
        let encoded = encode_frame(&Frame::Stdout(b"hello".to_vec())).unwrap();

        reader.feed(&encoded[..3]);
        assert_eq!(reader.next_frame().unwrap(), None);

        reader.feed(&encoded[3..]);
        assert_eq!(reader.next_frame().unwrap(), Some(Frame::Stdout(b"hello".to_vec())));
        assert_eq!(reader.next_frame().unwrap(), None);
    }

    #[test]
    fn frame_reader_handles_multiple_queued_frames() {
        let mut reader = FrameReader::new();
        reader.feed(&encode_frame(&Frame::StdinClose).unwrap());
        reader.feed(&encode_frame(&Frame::Exit(1)).unwrap());

        assert_eq!(reader.next_frame().unwrap(), Some(Frame::StdinClose));
        assert_eq!(reader.next_frame().unwrap(), Some(Frame::Exit(1)));
        assert_eq!(reader.next_frame().unwrap(), None);
    }

    #[test]
    fn frame_reader_rejects_unknown_tag() {
        let mut reader = FrameReader::new();
        reader.feed(&[0xaa]);
        assert!(matches!(reader.next_frame(), Err(CodecError::UnknownTag(0xaa))));
    }
}
