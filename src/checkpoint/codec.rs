//! Minimal binary codec used by the save/resume format.
//!
//! Integers are little-endian. Strings are UTF-8 prefixed by their byte
//! length as an unsigned LEB128 varint.

use std::io::{self, Read, Write};
use thiserror::Error;

/// Errors raised by [`BinaryWriter`] and [`BinaryReader`].
#[derive(Debug, Error)]
pub enum CodecError {
    /// Underlying stream failure, including `UnexpectedEof` on exhaustion.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Codec is already closed")]
    Closed,

    #[error("String is not valid UTF-8")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),

    #[error("Malformed varint length prefix")]
    MalformedLength,

    #[error("String of {0} bytes exceeds the length limit")]
    StringTooLong(usize),
}

impl CodecError {
    /// True when the underlying stream ran out of data.
    pub fn is_eof(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == io::ErrorKind::UnexpectedEof)
    }
}

const MAX_VARINT_BYTES: usize = 5;

/// Writes codec values to a byte sink.
#[derive(Debug)]
pub struct BinaryWriter<W: Write> {
    inner: Option<W>,
}

impl<W: Write> BinaryWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner: Some(inner) }
    }

    fn sink(&mut self) -> Result<&mut W, CodecError> {
        self.inner.as_mut().ok_or(CodecError::Closed)
    }

    pub fn write_u8(&mut self, value: u8) -> Result<(), CodecError> {
        self.sink()?.write_all(&[value])?;
        Ok(())
    }

    pub fn write_i16(&mut self, value: i16) -> Result<(), CodecError> {
        self.sink()?.write_all(&value.to_le_bytes())?;
        Ok(())
    }

    pub fn write_string(&mut self, value: &str) -> Result<(), CodecError> {
        let len = u32::try_from(value.len()).map_err(|_| CodecError::StringTooLong(value.len()))?;
        let mut prefix = [0u8; MAX_VARINT_BYTES];
        let used = encode_varint(len, &mut prefix);
        let sink = self.sink()?;
        sink.write_all(&prefix[..used])?;
        sink.write_all(value.as_bytes())?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), CodecError> {
        self.sink()?.flush()?;
        Ok(())
    }

    /// Flush and release the sink. Every later call fails with
    /// [`CodecError::Closed`].
    pub fn close(&mut self) -> Result<(), CodecError> {
        let mut inner = self.inner.take().ok_or(CodecError::Closed)?;
        inner.flush()?;
        Ok(())
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    /// Give back the sink, unless the writer was closed.
    pub fn into_inner(self) -> Result<W, CodecError> {
        self.inner.ok_or(CodecError::Closed)
    }
}

/// Reads codec values from a byte source.
#[derive(Debug)]
pub struct BinaryReader<R: Read> {
    inner: Option<R>,
}

impl<R: Read> BinaryReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner: Some(inner) }
    }

    fn source(&mut self) -> Result<&mut R, CodecError> {
        self.inner.as_mut().ok_or(CodecError::Closed)
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        let mut buf = [0u8; 1];
        self.source()?.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    pub fn read_i16(&mut self) -> Result<i16, CodecError> {
        let mut buf = [0u8; 2];
        self.source()?.read_exact(&mut buf)?;
        Ok(i16::from_le_bytes(buf))
    }

    pub fn read_string(&mut self) -> Result<String, CodecError> {
        let len = self.read_varint()? as usize;
        let mut bytes = Vec::new();
        // Bounded read so a corrupt prefix cannot force a huge allocation.
        self.source()?.take(len as u64).read_to_end(&mut bytes)?;
        if bytes.len() < len {
            return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
        }
        Ok(String::from_utf8(bytes)?)
    }

    fn read_varint(&mut self) -> Result<u32, CodecError> {
        let mut value: u32 = 0;
        for index in 0..MAX_VARINT_BYTES {
            let byte = self.read_u8()?;
            let bits = u32::from(byte & 0x7f);
            if index == MAX_VARINT_BYTES - 1 && bits > 0x0f {
                return Err(CodecError::MalformedLength);
            }
            value |= bits << (7 * index);
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(CodecError::MalformedLength)
    }

    /// Release the source. Every later call fails with [`CodecError::Closed`].
    pub fn close(&mut self) -> Result<(), CodecError> {
        self.inner.take().map(drop).ok_or(CodecError::Closed)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }
}

fn encode_varint(mut value: u32, out: &mut [u8; MAX_VARINT_BYTES]) -> usize {
    let mut used = 0;
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out[used] = byte;
            return used + 1;
        }
        out[used] = byte | 0x80;
        used += 1;
    }
}
