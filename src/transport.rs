//! Register bus boundary
//!
//! The acquisition core sees the sensor as two primitives, "write these bytes"
//! and "read this many bytes". Register addressing and burst framing are
//! encoded on top of those primitives by [`RegisterAccess`].

use crate::error::TransportError;

/// Byte-oriented register interface to one sensor
///
/// Implementations are shared between the event handler and the attach/detach
/// paths, so both methods take `&self`; any bus locking is internal.
pub trait Transport: Send + Sync {
    /// Write `bytes` to the device, returning how many were accepted
    fn write(&self, bytes: &[u8]) -> Result<usize, TransportError>;

    /// Read into `buf`, returning how many bytes were filled
    fn read(&self, buf: &mut [u8]) -> Result<usize, TransportError>;
}

/// Register-level helpers with exact-length checks
pub trait RegisterAccess {
    /// Write all of `bytes` or fail with `ShortWrite`
    fn write_all(&self, bytes: &[u8]) -> Result<(), TransportError>;

    /// Fill all of `buf` or fail with `ShortRead`
    fn read_exact(&self, buf: &mut [u8]) -> Result<(), TransportError>;

    /// Write a single byte to a register
    fn write_register(&self, reg: u8, value: u8) -> Result<(), TransportError> {
        self.write_all(&[reg, value])
    }

    /// Read a single byte from a register
    fn read_register(&self, reg: u8) -> Result<u8, TransportError> {
        self.write_all(&[reg])?;
        let mut data = [0u8];
        self.read_exact(&mut data)?;
        Ok(data[0])
    }
}

impl<T: Transport + ?Sized> RegisterAccess for T {
    fn write_all(&self, bytes: &[u8]) -> Result<(), TransportError> {
        let written = self.write(bytes)?;
        if written != bytes.len() {
            return Err(TransportError::ShortWrite {
                expected: bytes.len(),
                actual: written,
            });
        }
        Ok(())
    }

    fn read_exact(&self, buf: &mut [u8]) -> Result<(), TransportError> {
        let read = self.read(buf)?;
        if read != buf.len() {
            return Err(TransportError::ShortRead {
                expected: buf.len(),
                actual: read,
            });
        }
        Ok(())
    }
}
