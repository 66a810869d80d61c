//! Stream framing for `Message` bytes sent over a byte-oriented transport (e.g. TCP).
//!
//! The wire framing is `<decimal-length>:<payload-bytes>`: an ASCII decimal length, a single `:`
//! separator, then exactly that many payload bytes. [`FrameDecoder`] is a small explicit state
//! machine that accepts bytes as they arrive off the wire, in whatever chunk sizes the transport
//! happens to deliver them, and yields complete payloads as soon as each frame is fully buffered.

use alloc::vec::Vec;

use crate::error::DecodeError;

/// Maximum number of ASCII digits accepted for a frame's length prefix, bounding how much a
/// malformed or hostile peer can make a decoder buffer before giving up.
const MAX_LENGTH_DIGITS: usize = 19;

/// Encodes `payload` with the `<decimal-length>:<payload-bytes>` frame header.
pub fn encode_frame(payload: &[u8], out: &mut Vec<u8>) {
    out.extend_from_slice(payload.len().to_string().as_bytes());
    out.push(b':');
    out.extend_from_slice(payload);
}

/// Incremental decoder for the `<decimal-length>:<payload-bytes>` framing scheme.
///
/// Bytes are fed in via [`feed`](Self::feed) as they arrive off the transport, in arbitrary chunk
/// sizes — a single call may complete zero, one, or several frames. The decoder holds only the
/// bytes of the frame currently in progress; completed frames are handed back immediately and not
/// retained.
pub struct FrameDecoder {
    state: State,
}

enum State {
    ReadingLength { digits: Vec<u8> },
    ReadingPayload { remaining: usize, buf: Vec<u8> },
    Failed,
}

impl FrameDecoder {
    /// Constructs a decoder ready to read the length prefix of the first frame.
    pub fn new() -> Self {
        Self {
            state: State::ReadingLength { digits: Vec::new() },
        }
    }

    /// Feeds the next chunk of bytes read from the transport, returning any frame payloads
    /// completed as a result.
    ///
    /// # Errors
    ///
    /// Returns [`DecodeError::Malformed`] if the length prefix contains a non-digit byte, is
    /// empty at the `:` separator, or exceeds [`MAX_LENGTH_DIGITS`] digits. Once an error is
    /// returned the decoder is permanently failed and every subsequent call also errors: framing
    /// state is corrupted and the connection should be dropped.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<Vec<u8>>, DecodeError> {
        let mut frames = Vec::new();
        let mut bytes = bytes;
        loop {
            match &mut self.state {
                State::Failed => return Err(DecodeError::Malformed),
                State::ReadingLength { digits } => {
                    let Some(sep) = bytes.iter().position(|&b| b == b':') else {
                        if bytes.len() + digits.len() > MAX_LENGTH_DIGITS {
                            self.state = State::Failed;
                            return Err(DecodeError::Malformed);
                        }
                        digits.extend_from_slice(bytes);
                        return Ok(frames);
                    };
                    digits.extend_from_slice(&bytes[..sep]);
                    let remaining = parse_length(digits).ok_or(DecodeError::Malformed)?;
                    bytes = &bytes[sep + 1..];
                    self.state = State::ReadingPayload {
                        remaining,
                        buf: Vec::with_capacity(remaining),
                    };
                }
                State::ReadingPayload { remaining, buf } => {
                    let take = (*remaining).min(bytes.len());
                    buf.extend_from_slice(&bytes[..take]);
                    *remaining -= take;
                    bytes = &bytes[take..];
                    if *remaining == 0 {
                        let mut payload = Vec::new();
                        core::mem::swap(&mut payload, buf);
                        frames.push(payload);
                        self.state = State::ReadingLength { digits: Vec::new() };
                    } else {
                        return Ok(frames);
                    }
                }
            }
        }
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_length(digits: &[u8]) -> Option<usize> {
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let mut value: usize = 0;
    for &digit in digits {
        value = value.checked_mul(10)?.checked_add((digit - b'0') as usize)?;
    }
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_one_frame_fed_whole() {
        let mut decoder = FrameDecoder::new();
        let mut encoded = Vec::new();
        encode_frame(b"hello", &mut encoded);
        let frames = decoder.feed(&encoded).unwrap();
        assert_eq!(frames, alloc::vec![b"hello".to_vec()]);
    }

    #[test]
    fn decodes_frame_fed_one_byte_at_a_time() {
        let mut decoder = FrameDecoder::new();
        let mut encoded = Vec::new();
        encode_frame(b"hello world", &mut encoded);
        let mut frames = Vec::new();
        for byte in &encoded {
            frames.extend(decoder.feed(core::slice::from_ref(byte)).unwrap());
        }
        assert_eq!(frames, alloc::vec![b"hello world".to_vec()]);
    }

    #[test]
    fn decodes_multiple_frames_in_one_chunk() {
        let mut decoder = FrameDecoder::new();
        let mut encoded = Vec::new();
        encode_frame(b"one", &mut encoded);
        encode_frame(b"two", &mut encoded);
        encode_frame(b"", &mut encoded);
        let frames = decoder.feed(&encoded).unwrap();
        assert_eq!(
            frames,
            alloc::vec![b"one".to_vec(), b"two".to_vec(), Vec::new()]
        );
    }

    #[test]
    fn rejects_non_digit_length() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.feed(b"12x:hello").is_err());
    }

    #[test]
    fn rejects_empty_length() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.feed(b":hello").is_err());
    }

    #[test]
    fn stays_failed_after_an_error() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.feed(b"x:").is_err());
        assert!(decoder.feed(b"5:hello").is_err());
    }

    #[test]
    fn splits_frame_boundary_across_feed_calls() {
        let mut decoder = FrameDecoder::new();
        let mut encoded = Vec::new();
        encode_frame(b"split", &mut encoded);
        let midpoint = encoded.len() / 2;
        let mut frames = decoder.feed(&encoded[..midpoint]).unwrap();
        assert!(frames.is_empty());
        frames.extend(decoder.feed(&encoded[midpoint..]).unwrap());
        assert_eq!(frames, alloc::vec![b"split".to_vec()]);
    }
}
