//! In-memory stand-ins used by the unit tests.

use std::io::{self, Cursor, Read, Write};
use std::thread;
use std::time::Duration;

/// How long an exhausted stream blocks before reporting `WouldBlock`, like a socket
/// read timeout.
const READ_TIMEOUT: Duration = Duration::from_millis(1);

/// A byte stream replaying a fixed input and recording everything written to it.
///
/// Once the input is exhausted it either behaves like a socket whose read timeout
/// expired (`WouldBlock`) or like a closed peer (`Ok(0)`).
#[derive(Debug)]
pub(crate) struct ScriptedStream {
    input: Cursor<Vec<u8>>,
    output: Vec<u8>,
    close_at_end: bool,
}

impl ScriptedStream {
    pub(crate) fn new(input: Vec<u8>) -> ScriptedStream {
        ScriptedStream {
            input: Cursor::new(input),
            output: Vec::new(),
            close_at_end: false,
        }
    }

    pub(crate) fn closing(input: Vec<u8>) -> ScriptedStream {
        ScriptedStream {
            close_at_end: true,
            ..ScriptedStream::new(input)
        }
    }

    pub(crate) fn written(&self) -> &[u8] {
        &self.output
    }
}

impl Read for ScriptedStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let exhausted = self.input.position() as usize >= self.input.get_ref().len();
        if exhausted && !self.close_at_end {
            thread::sleep(READ_TIMEOUT);
            return Err(io::ErrorKind::WouldBlock.into());
        }
        self.input.read(buf)
    }
}

impl Write for ScriptedStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.output.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Wraps telegram bodies in CoLa-A framing bytes.
pub(crate) fn frame(bodies: &[&str]) -> Vec<u8> {
    let mut bytes = Vec::new();
    for body in bodies {
        bytes.push(0x02);
        bytes.extend_from_slice(body.as_bytes());
        bytes.push(0x03);
    }
    bytes
}
