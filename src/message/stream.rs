//! In-memory body stream.

use std::io::{self, Read, Write};

/// Readable, appendable body buffer with a read cursor.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Stream {
    buf: Vec<u8>,
    pos: usize,
}

impl Stream {
    pub fn new(content: impl Into<Vec<u8>>) -> Self {
        Self {
            buf: content.into(),
            pos: 0,
        }
    }

    /// Replace the content, keeping the allocation.
    pub fn reset(&mut self, content: &[u8]) {
        self.buf.clear();
        self.buf.extend_from_slice(content);
        self.pos = 0;
    }

    #[inline]
    pub fn contents(&self) -> &[u8] {
        &self.buf
    }

    /// Content as text, invalid UTF-8 replaced.
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.buf).into_owned()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Read cursor position.
    #[inline]
    pub fn tell(&self) -> usize {
        self.pos
    }

    #[inline]
    pub fn eof(&self) -> bool {
        self.pos >= self.buf.len()
    }

    #[inline]
    pub fn rewind(&mut self) {
        self.pos = 0;
    }
}

impl Read for Stream {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        let remaining = &self.buf[self.pos.min(self.buf.len())..];
        let n = remaining.len().min(out.len());
        out[..n].copy_from_slice(&remaining[..n]);
        self.pos += n;
        Ok(n)
    }
}

impl Write for Stream {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
