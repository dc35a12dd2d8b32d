use crate::base::error::Result;
use crate::base::message::Message;
use std::io;

/// Defines the behavior for decoding byte streams into `Message` objects.
pub trait ProtocolDecoder {
    /// Attempts to decode a `Message` from the provided buffer.
    ///
    /// Returns the number of bytes consumed from the buffer and the decoded
    /// message, if the consumed bytes completed one.
    fn decode(&mut self, buf: &[u8]) -> Result<(usize, Option<Message>)>;

    /// Resets the internal state of the decoder.
    /// Called after a communication error or when a new connection starts.
    fn reset_decoder(&mut self);
}

/// Defines the behavior for encoding `Message` objects into byte streams.
pub trait ProtocolEncoder {
    /// Encodes a `Message` into a freshly allocated byte vector.
    fn encode(&mut self, msg: &Message) -> Result<Vec<u8>>;

    /// Encodes a `Message` and writes it to `dest`.
    ///
    /// Returns the number of bytes written.
    fn write_to(&mut self, msg: &Message, dest: &mut impl io::Write) -> Result<usize> {
        let bytes = self.encode(msg)?;
        dest.write_all(&bytes)?;
        Ok(bytes.len())
    }

    /// Resets the internal state of the encoder.
    fn reset_encoder(&mut self);
}
