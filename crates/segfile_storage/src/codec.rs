//! Fixed-width little-endian primitives for data and sidecar files.
//!
//! ## Length-prefixed fields
//!
//! ```text
//! short-length bytes: | len (2) | bytes (len) |     len ≤ 65535
//! int-length bytes:   | len (4) | bytes (len) |
//! ```

use std::io::{self, Read, Write};

/// Largest payload a short-length field can carry.
pub const MAX_SHORT_LENGTH: usize = u16::MAX as usize;

/// Reading primitives, available on every [`Read`].
pub trait DataInputExt: Read {
    /// Reads one byte.
    fn read_u8(&mut self) -> io::Result<u8> {
        let mut buf = [0u8; 1];
        self.read_exact(&mut buf)?;
        Ok(buf[0])
    }

    /// Reads a little-endian `u16`.
    fn read_u16(&mut self) -> io::Result<u16> {
        let mut buf = [0u8; 2];
        self.read_exact(&mut buf)?;
        Ok(u16::from_le_bytes(buf))
    }

    /// Reads a little-endian `u32`.
    fn read_u32(&mut self) -> io::Result<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_le_bytes(buf))
    }

    /// Reads a little-endian `i32`.
    fn read_i32(&mut self) -> io::Result<i32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(i32::from_le_bytes(buf))
    }

    /// Reads a little-endian `u64`.
    fn read_u64(&mut self) -> io::Result<u64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }

    /// Reads a little-endian `i64`.
    fn read_i64(&mut self) -> io::Result<i64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(i64::from_le_bytes(buf))
    }

    /// Reads a u16-length-prefixed byte string.
    fn read_short_length_bytes(&mut self) -> io::Result<Vec<u8>> {
        let len = usize::from(self.read_u16()?);
        let mut buf = vec![0u8; len];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// Reads a u32-length-prefixed byte string of at most `max_len` bytes.
    fn read_int_length_bytes(&mut self, max_len: usize) -> io::Result<Vec<u8>> {
        let len = self.read_u32()? as usize;
        if len > max_len {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!("length {len} exceeds limit {max_len}"),
            ));
        }
        // Grow with the data actually present rather than trusting the prefix.
        let mut buf = Vec::new();
        Read::take(&mut *self, len as u64).read_to_end(&mut buf)?;
        if buf.len() != len {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        Ok(buf)
    }

    /// Reads a u16-length-prefixed UTF-8 string.
    fn read_utf(&mut self) -> io::Result<String> {
        let bytes = self.read_short_length_bytes()?;
        String::from_utf8(bytes)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e.utf8_error()))
    }

    /// Skips over a u16-length-prefixed byte string, returning its length.
    fn skip_short_length(&mut self) -> io::Result<u16> {
        let len = self.read_u16()?;
        let mut field = Read::take(&mut *self, u64::from(len));
        let skipped = io::copy(&mut field, &mut io::sink())?;
        if skipped != u64::from(len) {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        Ok(len)
    }
}

impl<R: Read + ?Sized> DataInputExt for R {}

/// Writing primitives, available on every [`Write`].
pub trait DataOutputExt: Write {
    /// Writes one byte.
    fn write_u8(&mut self, value: u8) -> io::Result<()> {
        self.write_all(&[value])
    }

    /// Writes a little-endian `u16`.
    fn write_u16(&mut self, value: u16) -> io::Result<()> {
        self.write_all(&value.to_le_bytes())
    }

    /// Writes a little-endian `u32`.
    fn write_u32(&mut self, value: u32) -> io::Result<()> {
        self.write_all(&value.to_le_bytes())
    }

    /// Writes a little-endian `i32`.
    fn write_i32(&mut self, value: i32) -> io::Result<()> {
        self.write_all(&value.to_le_bytes())
    }

    /// Writes a little-endian `u64`.
    fn write_u64(&mut self, value: u64) -> io::Result<()> {
        self.write_all(&value.to_le_bytes())
    }

    /// Writes a little-endian `i64`.
    fn write_i64(&mut self, value: i64) -> io::Result<()> {
        self.write_all(&value.to_le_bytes())
    }

    /// Writes a u16-length-prefixed byte string.
    fn write_short_length_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        let len = u16::try_from(bytes.len()).map_err(|_| {
            io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} bytes exceed short length limit {MAX_SHORT_LENGTH}", bytes.len()),
            )
        })?;
        self.write_u16(len)?;
        self.write_all(bytes)
    }

    /// Writes a u32-length-prefixed byte string.
    fn write_int_length_bytes(&mut self, bytes: &[u8]) -> io::Result<()> {
        let len = u32::try_from(bytes.len())
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "value too long"))?;
        self.write_u32(len)?;
        self.write_all(bytes)
    }

    /// Writes a u16-length-prefixed UTF-8 string.
    fn write_utf(&mut self, value: &str) -> io::Result<()> {
        self.write_short_length_bytes(value.as_bytes())
    }
}

impl<W: Write + ?Sized> DataOutputExt for W {}
