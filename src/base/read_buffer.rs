use std::io::{self, Read};

/// A linear byte buffer that is filled from a stream and drained from the front.
///
/// Consumed bytes are reclaimed lazily: the unread tail is moved back to the
/// start of the storage only when a read would otherwise find no room.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadBuffer {
    buf: Vec<u8>,
    start: usize,
    end: usize,
}

impl ReadBuffer {
    /// Creates an empty buffer able to hold `capacity` unread bytes.
    pub fn with_capacity(capacity: usize) -> ReadBuffer {
        ReadBuffer {
            buf: vec![0; capacity],
            start: 0,
            end: 0,
        }
    }

    /// Number of unread bytes.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    /// Room left for new bytes, counting space held by already consumed bytes.
    pub fn free_space(&self) -> usize {
        self.buf.len() - self.len()
    }

    /// All unread bytes, oldest first.
    pub fn current_read_slice(&self) -> &[u8] {
        &self.buf[self.start..self.end]
    }

    /// Marks up to `bytes` unread bytes as consumed and returns how many were skipped.
    pub fn skip_bytes(&mut self, bytes: usize) -> usize {
        let skipped = bytes.min(self.len());
        self.start += skipped;
        if self.start == self.end {
            self.start = 0;
            self.end = 0;
        }
        skipped
    }

    /// Drops every unread byte.
    pub fn clear(&mut self) {
        self.start = 0;
        self.end = 0;
    }

    /// Performs a single `read` from `upstream` into the free space.
    ///
    /// Returns `Ok(0)` without touching the stream when the buffer is full.
    /// Stream errors, including timeouts, are handed back to the caller.
    pub fn read_from(&mut self, upstream: &mut impl Read) -> io::Result<usize> {
        if self.end == self.buf.len() {
            if self.start == 0 {
                return Ok(0);
            }
            self.buf.copy_within(self.start..self.end, 0);
            self.end -= self.start;
            self.start = 0;
        }

        let read = upstream.read(&mut self.buf[self.end..])?;
        self.end += read;
        Ok(read)
    }
}
