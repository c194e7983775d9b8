//! Outbound half of a channel: a single serial byte queue.

use std::io::{self, Write};

use drover_proto::{Message, encode};
use tracing::warn;

use super::{CHANNEL_TARGET, Disconnect, DisconnectHandler};

pub(crate) struct Writer {
    queue: Vec<u8>,
    on_disconnect: Option<DisconnectHandler>,
    closed: bool,
}

impl Writer {
    pub(crate) const fn new() -> Self {
        Self {
            queue: Vec::new(),
            on_disconnect: None,
            closed: false,
        }
    }

    pub(crate) fn bind(&mut self, on_disconnect: DisconnectHandler) {
        self.on_disconnect = Some(on_disconnect);
    }

    pub(crate) fn on_disconnect(&self) -> Option<DisconnectHandler> {
        self.on_disconnect.clone()
    }

    /// Bytes accepted but not yet written to the socket.
    #[cfg(test)]
    pub(crate) fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Queues a frame behind everything already pending, then flushes.
    ///
    /// Writes on a closed writer are dropped.
    pub(crate) fn write<W: Write>(&mut self, sink: W, message: &Message) -> Result<(), Disconnect> {
        if self.closed {
            return Ok(());
        }
        match encode(message) {
            Ok(frame) => self.queue.extend_from_slice(&frame),
            Err(error) => {
                warn!(
                    target: CHANNEL_TARGET,
                    band = %message.band(),
                    error = %error,
                    "dropping unencodable frame"
                );
                return Ok(());
            }
        }
        self.flush(sink)
    }

    /// Writes queued bytes until the sink would block or the queue is empty.
    ///
    /// A failure closes the writer and discards whatever was still queued.
    pub(crate) fn flush<W: Write>(&mut self, mut sink: W) -> Result<(), Disconnect> {
        if self.closed {
            return Ok(());
        }
        while !self.queue.is_empty() {
            match sink.write(&self.queue) {
                Ok(0) => return Err(self.close(io::ErrorKind::WriteZero.into())),
                Ok(written) => {
                    self.queue.drain(..written);
                }
                Err(error) if error.kind() == io::ErrorKind::WouldBlock => break,
                Err(error) if error.kind() == io::ErrorKind::Interrupted => {}
                Err(error) => return Err(self.close(error)),
            }
        }
        Ok(())
    }

    fn close(&mut self, error: io::Error) -> Disconnect {
        self.closed = true;
        self.queue.clear();
        Disconnect::Write(error)
    }
}

#[cfg(test)]
mod tests {
    use drover_proto::{Band, FrameDecoder};

    use super::*;

    /// Sink that accepts `budget` bytes, then reports it would block.
    struct Throttled {
        written: Vec<u8>,
        budget: usize,
    }

    impl Write for Throttled {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.budget == 0 {
                return Err(io::ErrorKind::WouldBlock.into());
            }
            let accepted = buf.len().min(self.budget);
            self.budget -= accepted;
            self.written.extend_from_slice(buf.get(..accepted).unwrap_or_default());
            Ok(accepted)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    struct Broken;

    impl Write for Broken {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn decode_all(bytes: &[u8]) -> Vec<Message> {
        let mut decoder = FrameDecoder::new();
        decoder.extend(bytes);
        let mut messages = Vec::new();
        while let Some(message) = decoder.next_message().expect("decode") {
            messages.push(message);
        }
        messages
    }

    #[test]
    fn preserves_order_across_partial_writes() {
        let mut sink = Throttled {
            written: Vec::new(),
            budget: 20,
        };
        let mut writer = Writer::new();
        let band = Band::new(7);

        writer
            .write(&mut sink, &Message::chunk(band, b"first".to_vec()))
            .expect("queue first");
        writer
            .write(&mut sink, &Message::chunk(band, b"second".to_vec()))
            .expect("queue second");
        writer
            .write(&mut sink, &Message::choke(band))
            .expect("queue choke");
        assert!(writer.pending() > 0, "sink should have throttled");

        sink.budget = usize::MAX;
        writer.flush(&mut sink).expect("flush remainder");
        assert_eq!(writer.pending(), 0);
        assert_eq!(
            decode_all(&sink.written),
            vec![
                Message::chunk(band, b"first".to_vec()),
                Message::chunk(band, b"second".to_vec()),
                Message::choke(band),
            ]
        );
    }

    #[test]
    fn failure_closes_writer_and_silences_later_writes() {
        let mut writer = Writer::new();
        let result = writer.write(Broken, &Message::choke(Band::new(1)));
        assert!(matches!(result, Err(Disconnect::Write(_))));
        assert_eq!(writer.pending(), 0);

        writer
            .write(Broken, &Message::choke(Band::new(1)))
            .expect("closed writer ignores writes");
    }
}
