use crate::base::error::{Error, Result};
use crate::base::message::Message;
use crate::base::read_buffer::ReadBuffer;
use crate::base::traits::{ProtocolDecoder, ProtocolEncoder};
use log::{error, trace, warn};
use std::io;
use std::time::{Duration, Instant};

/// Large enough for a full LMS1xx scan telegram (DIST1 + RSSI1 at 0.25°).
const DEFAULT_CHANNEL_READ_BUFFER_SIZE: usize = 32 * 1024;

/// Channel encodes and decodes messages with a protocol, and sends and receives bytes via a stream.
///
/// The stream is expected to have a short read timeout (or be non-blocking) so that
/// [`Channel::read_until`] can enforce its own deadline.
///
/// # Examples
/// ```ignore
/// let stream = TcpStream::connect("192.168.1.2:2111")?;
/// let mut channel = Channel::new(ColaAProtocol::new(), Box::new(stream));
/// channel.write(&Message::new("sRN", "LMPscancfg"))?;
/// ```
#[derive(Debug)]
pub struct Channel<P, T: ?Sized> {
    protocol: P,
    stream: Box<T>,
    read_buffer: ReadBuffer,
}

impl<P, T: ?Sized> Channel<P, T>
where
    P: ProtocolDecoder + ProtocolEncoder,
    T: io::Read + io::Write,
{
    /// Create a new `Channel` with the default read buffer size.
    pub fn new(protocol: P, stream: Box<T>) -> Channel<P, T> {
        Channel::with_read_buffer_size(protocol, stream, DEFAULT_CHANNEL_READ_BUFFER_SIZE)
    }

    /// Create a new `Channel` with a non-default read buffer capacity.
    pub fn with_read_buffer_size(
        protocol: P,
        stream: Box<T>,
        read_buffer_size: usize,
    ) -> Channel<P, T> {
        trace!("Creating new Channel with buffer size {}", read_buffer_size);
        let mut chn = Channel {
            protocol,
            stream,
            read_buffer: ReadBuffer::with_capacity(read_buffer_size),
        };
        chn.reset();
        chn
    }

    /// Reset the protocol state and drop any buffered bytes.
    ///
    /// Used after a communication error, when partially received telegrams can no
    /// longer be trusted.
    pub fn reset(&mut self) {
        trace!("Resetting Channel protocol encoder, decoder and read buffer");
        self.protocol.reset_encoder();
        self.protocol.reset_decoder();
        self.read_buffer.clear();
    }

    /// Borrow the underlying stream.
    pub fn stream(&self) -> &T {
        &self.stream
    }

    /// Decode as many buffered bytes as possible, returning the first complete message.
    fn decode_buffered(&mut self) -> Result<Option<Message>> {
        while !self.read_buffer.is_empty() {
            let decoded = self.protocol.decode(self.read_buffer.current_read_slice());
            let (consumed, msg_option) = match decoded {
                Ok(decoded) => decoded,
                Err(e) => {
                    error!("Protocol decode error: {}", e);
                    self.protocol.reset_decoder();
                    self.read_buffer.clear();
                    return Err(e);
                }
            };
            self.read_buffer.skip_bytes(consumed);

            if let Some(msg) = msg_option {
                trace!(
                    "Decoded message: {} {} ({} params)",
                    msg.kind,
                    msg.name,
                    msg.params.len()
                );
                return Ok(Some(msg));
            }

            if consumed == 0 {
                if self.read_buffer.free_space() == 0 {
                    error!("Buffer full and decode consumed 0 bytes. Resetting decoder.");
                    self.protocol.reset_decoder();
                    self.read_buffer.clear();
                    return Err(Error::protocol("decoder stalled on full buffer"));
                }
                break;
            }
        }
        Ok(None)
    }

    /// Read a message, waiting at most `timeout` for it to complete.
    ///
    /// Returns [`Error::Timeout`] when the deadline passes and a transport error when
    /// the peer closes the stream.
    pub fn read_until(&mut self, timeout: Duration) -> Result<Message> {
        let start = Instant::now();

        loop {
            if let Some(msg) = self.decode_buffered()? {
                return Ok(msg);
            }

            let elapsed = start.elapsed();
            if elapsed >= timeout {
                trace!("Overall timeout reached ({:?})", elapsed);
                return Err(Error::Timeout);
            }

            match self.read_buffer.read_from(&mut self.stream) {
                Ok(0) => {
                    if self.read_buffer.free_space() > 0 {
                        warn!("Stream closed by peer");
                        return Err(Error::transport("connection closed by peer"));
                    }
                }
                Ok(bytes_read) => trace!(
                    "Read {} bytes from stream (buffer len: {})",
                    bytes_read,
                    self.read_buffer.len()
                ),
                Err(e)
                    if matches!(
                        e.kind(),
                        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
                    ) =>
                {
                    trace!("Stream read timed out, {:?} left", timeout - elapsed);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => {
                    error!("IO error reading from stream: {}", e);
                    return Err(e.into());
                }
            }
        }
    }

    /// Write a message to the channel.
    pub fn write(&mut self, msg: &Message) -> Result<usize> {
        trace!("Channel write: {}", msg.body());
        let written = self.protocol.write_to(msg, &mut self.stream)?;
        self.stream.flush()?;
        Ok(written)
    }

    /// Send a request and wait for the first message accepted by `is_reply`.
    ///
    /// Messages rejected by `is_reply` (for instance scan telegrams that were
    /// already in flight) are dropped. The deadline covers the whole exchange.
    pub fn invoke<F>(
        &mut self,
        request: &Message,
        timeout: Duration,
        is_reply: F,
    ) -> Result<Message>
    where
        F: Fn(&Message) -> bool,
    {
        self.write(request)?;
        let deadline = Instant::now() + timeout;

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let msg = self.read_until(remaining)?;
            if is_reply(&msg) {
                return Ok(msg);
            }
            trace!(
                "Invoke {}: skipping unrelated message {} {}",
                request.name,
                msg.kind,
                msg.name
            );
        }
    }
}
