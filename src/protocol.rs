use crate::base::{Error, Message, ProtocolDecoder, ProtocolEncoder, Result};
use log::{trace, warn};

/// Start of a CoLa-A telegram.
const COLA_STX: u8 = 0x02;
/// End of a CoLa-A telegram.
const COLA_ETX: u8 = 0x03;

/// Upper bound on a telegram body. A full scan with remission stays well below this.
const COLA_MAX_TELEGRAM_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone, PartialEq)]
enum DecodeStatus {
    WaitStx,
    ReceiveBody,
}

/// The CoLa-A ("command language, ASCII") framing used by SICK LMS1xx devices.
///
/// A telegram is `<STX>` followed by space separated ASCII tokens and `<ETX>`.
/// Numbers inside the tokens are hexadecimal unless prefixed with `+`/`-`.
#[derive(Debug, Clone, PartialEq)]
pub struct ColaAProtocol {
    status: DecodeStatus,
    body: Vec<u8>,
}

impl ColaAProtocol {
    /// Creates a new `ColaAProtocol` waiting for the start of a telegram.
    pub fn new() -> ColaAProtocol {
        ColaAProtocol {
            status: DecodeStatus::WaitStx,
            body: Vec::new(),
        }
    }

    fn start_wait_stx(&mut self) {
        self.status = DecodeStatus::WaitStx;
        self.body.clear();
    }

    fn start_receive_body(&mut self) {
        self.status = DecodeStatus::ReceiveBody;
        self.body.clear();
    }

    fn finish_telegram(&mut self) -> Result<Message> {
        let parsed = std::str::from_utf8(&self.body)
            .ok()
            .and_then(Message::parse);
        let result = parsed.ok_or_else(|| {
            Error::protocol(format!(
                "malformed telegram: {:?}",
                String::from_utf8_lossy(&self.body)
            ))
        });
        self.start_wait_stx();
        result
    }
}

impl Default for ColaAProtocol {
    fn default() -> Self {
        Self::new()
    }
}

impl ProtocolDecoder for ColaAProtocol {
    fn decode(&mut self, buf: &[u8]) -> Result<(usize, Option<Message>)> {
        for (i, &byte) in buf.iter().enumerate() {
            match self.status {
                DecodeStatus::WaitStx => {
                    if byte == COLA_STX {
                        self.start_receive_body();
                    } else {
                        trace!("Skipping byte {:02X} outside of a telegram", byte);
                    }
                }
                DecodeStatus::ReceiveBody => match byte {
                    COLA_ETX => return Ok((i + 1, Some(self.finish_telegram()?))),
                    COLA_STX => {
                        warn!(
                            "Telegram restarted after {} bytes, dropping partial body",
                            self.body.len()
                        );
                        self.start_receive_body();
                    }
                    _ => {
                        if self.body.len() >= COLA_MAX_TELEGRAM_SIZE {
                            self.start_wait_stx();
                            return Err(Error::protocol("telegram exceeds maximum size"));
                        }
                        self.body.push(byte);
                    }
                },
            }
        }
        Ok((buf.len(), None))
    }

    fn reset_decoder(&mut self) {
        self.start_wait_stx();
    }
}

impl ProtocolEncoder for ColaAProtocol {
    fn encode(&mut self, msg: &Message) -> Result<Vec<u8>> {
        let tokens = std::iter::once(&msg.kind)
            .chain(std::iter::once(&msg.name))
            .chain(msg.params.iter());
        for token in tokens {
            let valid = !token.is_empty()
                && token
                    .bytes()
                    .all(|b| b.is_ascii_graphic() && b != COLA_STX && b != COLA_ETX);
            if !valid {
                return Err(Error::protocol(format!("invalid telegram token {:?}", token)));
            }
        }

        let body = msg.body();
        let mut bytes = Vec::with_capacity(body.len() + 2);
        bytes.push(COLA_STX);
        bytes.extend_from_slice(body.as_bytes());
        bytes.push(COLA_ETX);
        Ok(bytes)
    }

    fn reset_encoder(&mut self) {
        // Stateless.
    }
}
