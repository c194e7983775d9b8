//! JSONL framing for [`Message`] values.
//!
//! Each frame occupies exactly one line. The decoder is incremental: callers
//! feed it whatever bytes the socket produced and drain complete messages.

use thiserror::Error;

use crate::message::Message;

/// Upper bound on the size of a single encoded frame, newline included.
pub const MAX_FRAME_BYTES: usize = 64 * 1024;

/// Errors raised while encoding or decoding frames.
#[derive(Debug, Error)]
pub enum FrameError {
    /// A line could not be parsed as a [`Message`].
    #[error("malformed frame: {source}")]
    Malformed {
        /// Underlying parse failure.
        #[source]
        source: serde_json::Error,
    },
    /// A frame grew past [`MAX_FRAME_BYTES`] without a terminating newline.
    #[error("frame too large: {size} bytes exceeds {max_size} byte limit")]
    TooLarge {
        /// Bytes buffered so far.
        size: usize,
        /// Configured limit.
        max_size: usize,
    },
    /// A message could not be serialised.
    #[error("failed to encode frame: {source}")]
    Encode {
        /// Underlying serialisation failure.
        #[source]
        source: serde_json::Error,
    },
}

/// Encodes a message as a single newline-terminated line.
///
/// # Errors
///
/// Returns [`FrameError::Encode`] if serialisation fails.
pub fn encode(message: &Message) -> Result<Vec<u8>, FrameError> {
    let mut line = serde_json::to_vec(message).map_err(|source| FrameError::Encode { source })?;
    line.push(b'\n');
    Ok(line)
}

/// Incremental line decoder.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    max_frame: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Creates a decoder enforcing [`MAX_FRAME_BYTES`].
    #[must_use]
    pub const fn new() -> Self {
        Self::with_limit(MAX_FRAME_BYTES)
    }

    /// Creates a decoder with a custom frame size limit.
    #[must_use]
    pub const fn with_limit(max_frame: usize) -> Self {
        Self {
            buffer: Vec::new(),
            max_frame,
        }
    }

    /// Appends raw bytes received from the peer.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Number of bytes buffered but not yet decoded.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Decodes the next complete frame, if one is buffered.
    ///
    /// Blank lines are skipped. Returns `Ok(None)` when more bytes are needed.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Malformed`] for a line that is not a valid
    /// message and [`FrameError::TooLarge`] when a frame exceeds the limit.
    /// The decoder should be discarded after an error.
    pub fn next_message(&mut self) -> Result<Option<Message>, FrameError> {
        loop {
            let Some(position) = self.buffer.iter().position(|byte| *byte == b'\n') else {
                return self.check_limit(self.buffer.len()).map(|()| None);
            };
            self.check_limit(position + 1)?;

            let line: Vec<u8> = self.buffer.drain(..=position).collect();
            let trimmed = line.trim_ascii();
            if trimmed.is_empty() {
                continue;
            }
            return serde_json::from_slice(trimmed)
                .map(Some)
                .map_err(|source| FrameError::Malformed { source });
        }
    }

    fn check_limit(&self, size: usize) -> Result<(), FrameError> {
        if size > self.max_frame {
            return Err(FrameError::TooLarge {
                size,
                max_size: self.max_frame,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::message::Band;

    fn drain(decoder: &mut FrameDecoder) -> Vec<Message> {
        let mut messages = Vec::new();
        while let Some(message) = decoder.next_message().expect("decode frame") {
            messages.push(message);
        }
        messages
    }

    #[test]
    fn encoded_frames_end_with_newline() {
        let line = encode(&Message::chunk(Band::new(2), b"hi".to_vec())).expect("encode");
        assert_eq!(line.last(), Some(&b'\n'));
        assert_eq!(line.iter().filter(|byte| **byte == b'\n').count(), 1);
    }

    #[test]
    fn reassembles_frames_split_across_reads() {
        let mut bytes = encode(&Message::invoke(Band::new(1), "ping")).expect("encode");
        bytes.extend(encode(&Message::choke(Band::new(1))).expect("encode"));
        let (head, tail) = bytes.split_at(10);

        let mut decoder = FrameDecoder::new();
        decoder.extend(head);
        assert!(drain(&mut decoder).is_empty());
        decoder.extend(tail);

        assert_eq!(
            drain(&mut decoder),
            vec![
                Message::invoke(Band::new(1), "ping"),
                Message::choke(Band::new(1)),
            ]
        );
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn skips_blank_lines() {
        let mut decoder = FrameDecoder::new();
        decoder.extend(b"\n\r\n{\"band\":3,\"payload\":{\"kind\":\"heartbeat\"}}\n");
        assert_eq!(
            drain(&mut decoder),
            vec![Message::new(Band::new(3), crate::Payload::Heartbeat)]
        );
    }

    #[rstest]
    #[case::not_json(b"hello\n".as_slice())]
    #[case::unknown_kind(br#"{"band":1,"payload":{"kind":"bogus"}}"#.as_slice())]
    #[case::missing_band(br#"{"payload":{"kind":"choke"}}"#.as_slice())]
    fn rejects_malformed_frames(#[case] input: &[u8]) {
        let mut decoder = FrameDecoder::new();
        decoder.extend(input);
        decoder.extend(b"\n");
        let error = decoder.next_message().expect_err("frame should be rejected");
        assert!(matches!(error, FrameError::Malformed { .. }));
    }

    #[test]
    fn rejects_unterminated_oversized_frames() {
        let mut decoder = FrameDecoder::with_limit(16);
        decoder.extend(&[b'x'; 17]);
        let error = decoder.next_message().expect_err("frame should be rejected");
        assert!(matches!(
            error,
            FrameError::TooLarge {
                size: 17,
                max_size: 16
            }
        ));
    }

    #[test]
    fn rejects_terminated_oversized_frames() {
        let line = encode(&Message::chunk(Band::new(9), vec![0_u8; 64])).expect("encode");
        let mut decoder = FrameDecoder::with_limit(32);
        decoder.extend(&line);
        assert!(matches!(
            decoder.next_message(),
            Err(FrameError::TooLarge { .. })
        ));
    }
}
