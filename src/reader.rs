// Sequential byte cursor over an object-file stream.
//
// Wraps any `Read` source and tracks the absolute input offset so that
// truncation errors can point at the byte where the stream ran dry.
// All multi-byte integers in AS .p files are little-endian.

use std::io::{self, Read};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    /// The stream ended before `wanted` more bytes could be read.
    #[error("unexpected end of input at offset {offset:#X} ({wanted} more bytes expected)")]
    Truncated { offset: u64, wanted: u64 },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

// ---------------------------------------------------------------------------
// ByteReader
// ---------------------------------------------------------------------------

/// Forward-only reader with position tracking.
///
/// `ByteReader` never seeks the underlying source: payload bytes are either
/// copied out or skipped, which keeps it usable over pipes and in-memory
/// slices alike.
pub struct ByteReader<R: Read> {
    inner: R,
    pos: u64,
}

impl<R: Read> ByteReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, pos: 0 }
    }

    /// Number of bytes consumed so far.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Read one byte, returning `None` on a clean end of input.
    pub fn try_read_u8(&mut self) -> Result<Option<u8>, ReadError> {
        let mut byte = [0u8; 1];
        loop {
            match self.inner.read(&mut byte) {
                Ok(0) => return Ok(None),
                Ok(_) => {
                    self.pos += 1;
                    return Ok(Some(byte[0]));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
    }

    pub fn read_u8(&mut self) -> Result<u8, ReadError> {
        let mut buf = [0u8; 1];
        self.read_into(&mut buf)?;
        Ok(buf[0])
    }

    pub fn read_u16_le(&mut self) -> Result<u16, ReadError> {
        let mut buf = [0u8; 2];
        self.read_into(&mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    pub fn read_i32_le(&mut self) -> Result<i32, ReadError> {
        let mut buf = [0u8; 4];
        self.read_into(&mut buf)?;
        Ok(i32::from_le_bytes(buf))
    }

    /// Fill `buf` completely or fail with [`ReadError::Truncated`].
    pub fn read_into(&mut self, buf: &mut [u8]) -> Result<(), ReadError> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.inner.read(&mut buf[filled..]) {
                Ok(0) => {
                    return Err(ReadError::Truncated {
                        offset: self.pos,
                        wanted: (buf.len() - filled) as u64,
                    });
                }
                Ok(n) => {
                    filled += n;
                    self.pos += n as u64;
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    /// Read exactly `len` bytes into a fresh buffer.
    pub fn read_bytes(&mut self, len: usize) -> Result<Vec<u8>, ReadError> {
        let mut buf = vec![0u8; len];
        self.read_into(&mut buf)?;
        Ok(buf)
    }

    /// Discard up to `len` bytes and return how many were actually there.
    pub fn skip_up_to(&mut self, len: u64) -> Result<u64, ReadError> {
        let skipped = io::copy(&mut (&mut self.inner).take(len), &mut io::sink())?;
        self.pos += skipped;
        Ok(skipped)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
