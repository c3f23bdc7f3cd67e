use std::io::{self, Read};

/// Reusable buffers of one connection
///
/// `Conn` owns a single `BufferSet`; received bytes stay in `read_buffer` until
/// the next `compact`, which is what keeps a held row readable.
#[derive(Debug, Default)]
pub struct BufferSet {
    /// Bytes received from the socket. `read_pos..` is not parsed yet.
    pub read_buffer: Vec<u8>,
    read_pos: usize,

    /// Framed packets waiting to be written. `write_pos..` is not sent yet.
    write_buffer: Vec<u8>,
    write_pos: usize,

    /// Payload assembled from continued (16MB) packets
    pub payload_buffer: Vec<u8>,
}

impl BufferSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes received but not parsed yet
    #[inline]
    pub fn unread(&self) -> &[u8] {
        &self.read_buffer[self.read_pos..]
    }

    #[inline]
    pub fn read_pos(&self) -> usize {
        self.read_pos
    }

    /// Mark `n` unread bytes as parsed.
    #[inline]
    pub fn consume(&mut self, n: usize) {
        self.read_pos = (self.read_pos + n).min(self.read_buffer.len());
    }

    /// Drop parsed bytes from the front of the read buffer.
    ///
    /// Invalidates every range previously taken from `read_buffer`.
    pub fn compact(&mut self) {
        if self.read_pos == 0 {
            return;
        }
        self.read_buffer.drain(..self.read_pos);
        self.read_pos = 0;
    }

    /// Append at most `chunk` bytes read from `reader`. Returns the byte count.
    pub fn fill_from<R: Read>(&mut self, reader: &mut R, chunk: usize) -> io::Result<usize> {
        let start = self.read_buffer.len();
        self.read_buffer.resize(start + chunk.max(1), 0);
        let result = reader.read(&mut self.read_buffer[start..]);
        let n = *result.as_ref().unwrap_or(&0);
        self.read_buffer.truncate(start + n);
        result
    }

    /// Buffer to append outgoing packets to
    #[inline]
    pub fn write_buffer_mut(&mut self) -> &mut Vec<u8> {
        &mut self.write_buffer
    }

    /// Bytes queued but not written yet
    #[inline]
    pub fn unsent(&self) -> &[u8] {
        &self.write_buffer[self.write_pos..]
    }

    /// Mark `n` queued bytes as written; resets the buffer once all are.
    pub fn advance_write(&mut self, n: usize) {
        self.write_pos = (self.write_pos + n).min(self.write_buffer.len());
        if self.write_pos == self.write_buffer.len() {
            self.write_buffer.clear();
            self.write_pos = 0;
        }
    }

    /// Forget all buffered bytes, keeping capacity.
    pub fn clear(&mut self) {
        self.read_buffer.clear();
        self.read_pos = 0;
        self.write_buffer.clear();
        self.write_pos = 0;
        self.payload_buffer.clear();
    }
}
