//! Inbound half of a channel: socket bytes to decoded messages.

use std::io::{self, Read};

use drover_proto::{FrameDecoder, Message};

use super::{Disconnect, DisconnectHandler, MessageHandler};

const READ_CHUNK: usize = 16 * 1024;

/// Reads performed per readiness turn before yielding to other channels.
pub(crate) const READS_PER_TURN: usize = 4;

/// Result of one budgeted read turn.
#[derive(Debug, Default)]
pub(crate) struct ReadOutcome {
    pub(crate) messages: Vec<Message>,
    pub(crate) end: Option<Disconnect>,
    /// The budget ran out before the source would block.
    pub(crate) exhausted: bool,
}

pub(crate) struct Reader {
    decoder: FrameDecoder,
    handlers: Option<(MessageHandler, DisconnectHandler)>,
    closed: bool,
}

impl Reader {
    pub(crate) fn new() -> Self {
        Self {
            decoder: FrameDecoder::new(),
            handlers: None,
            closed: false,
        }
    }

    pub(crate) fn bind(&mut self, on_message: MessageHandler, on_disconnect: DisconnectHandler) {
        self.handlers = Some((on_message, on_disconnect));
    }

    pub(crate) fn handlers(&self) -> Option<(MessageHandler, DisconnectHandler)> {
        self.handlers.clone()
    }

    /// Reads until the source would block or `max_reads` reads have been
    /// made, decoding every complete frame.
    ///
    /// Messages decoded before an end-of-stream or failure are still returned,
    /// in the order their bytes arrived. Once an end has been reported the
    /// reader stays closed and yields nothing further. A turn cut short by the
    /// budget sets [`ReadOutcome::exhausted`]; the caller must come back even
    /// though no new readiness edge will arrive.
    pub(crate) fn read_available<R: Read>(
        &mut self,
        mut source: R,
        max_reads: usize,
    ) -> ReadOutcome {
        let mut outcome = ReadOutcome::default();
        if self.closed {
            return outcome;
        }

        let mut chunk = [0_u8; READ_CHUNK];
        let mut reads = 0;
        loop {
            if reads == max_reads {
                outcome.exhausted = true;
                break;
            }
            reads += 1;
            match source.read(&mut chunk) {
                Ok(0) => {
                    outcome.end = Some(Disconnect::PeerClosed);
                    break;
                }
                Ok(read) => {
                    self.decoder.extend(chunk.get(..read).unwrap_or_default());
                    if let Err(reason) = self.decode_into(&mut outcome.messages) {
                        outcome.end = Some(reason);
                        break;
                    }
                }
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => break,
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(error) => {
                    outcome.end = Some(Disconnect::Read(error));
                    break;
                }
            }
        }

        self.closed = outcome.end.is_some();
        outcome
    }

    fn decode_into(&mut self, messages: &mut Vec<Message>) -> Result<(), Disconnect> {
        while let Some(message) = self.decoder.next_message().map_err(Disconnect::Decode)? {
            messages.push(message);
        }
        Ok(())
    }
}
