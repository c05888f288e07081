//! Byte sinks and sources.
//!
//! The engine never touches a file or a buffer directly. It writes through a
//! [`WriteInstrument`] and reads through a [`ReadInstrument`]:
//!
//! - [`BufferWriter`]: appends to a `Vec<u8>`.
//! - [`SizeDetermination`]: counts bytes without storing them.
//! - [`BufferReader`]: reads from [`Bytes`], can hand out zero-copy slices.
//! - `IoWriter` / `IoReader` (`std`): adapters over `std::io`.
//!
//! Multi-byte scalars are little-endian; counts and lengths are LEB128.

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use bytes::Bytes;

use crate::error::InstrumentError;

// -----------------------------------------------------------------------------
// Modules

mod buffer;
mod reader;
pub mod varint;

#[cfg(feature = "std")]
mod io;

// -----------------------------------------------------------------------------
// Exports

pub use buffer::{BufferWriter, SizeDetermination};
pub use reader::BufferReader;

#[cfg(feature = "std")]
pub use io::{IoReader, IoWriter};

// -----------------------------------------------------------------------------
// WriteInstrument

/// A byte sink.
pub trait WriteInstrument {
    /// Appends `bytes`.
    fn write(&mut self, bytes: &[u8]) -> Result<(), InstrumentError>;

    /// The number of bytes written so far.
    fn offset(&self) -> usize;

    /// Returns `true` if the sink only counts bytes.
    ///
    /// Writers may then skip producing payloads and call
    /// [`advance`](Self::advance) with their size instead.
    #[inline]
    fn is_size_determination(&self) -> bool {
        false
    }

    /// Appends `count` zero bytes.
    fn advance(&mut self, count: usize) -> Result<(), InstrumentError> {
        const ZEROES: [u8; 64] = [0; 64];
        let mut left = count;
        while left > 0 {
            let chunk = left.min(ZEROES.len());
            self.write(&ZEROES[..chunk])?;
            left -= chunk;
        }
        Ok(())
    }

    #[inline]
    fn write_u8(&mut self, value: u8) -> Result<(), InstrumentError> {
        self.write(&[value])
    }

    #[inline]
    fn write_u16(&mut self, value: u16) -> Result<(), InstrumentError> {
        self.write(&value.to_le_bytes())
    }

    #[inline]
    fn write_u32(&mut self, value: u32) -> Result<(), InstrumentError> {
        self.write(&value.to_le_bytes())
    }

    #[inline]
    fn write_u64(&mut self, value: u64) -> Result<(), InstrumentError> {
        self.write(&value.to_le_bytes())
    }

    fn write_varint(&mut self, value: u64) -> Result<(), InstrumentError> {
        let mut out = [0; varint::MAX_VARINT_LEN];
        let len = varint::encode(value, &mut out);
        self.write(&out[..len])
    }

    /// Writes a length-prefixed UTF-8 string.
    fn write_str(&mut self, value: &str) -> Result<(), InstrumentError> {
        self.write_varint(value.len() as u64)?;
        self.write(value.as_bytes())
    }
}

// -----------------------------------------------------------------------------
// ReadInstrument

/// A byte source.
pub trait ReadInstrument {
    /// Fills `out` completely.
    fn read(&mut self, out: &mut [u8]) -> Result<(), InstrumentError>;

    /// Skips `count` bytes.
    fn ignore(&mut self, count: usize) -> Result<(), InstrumentError>;

    /// Takes the next `count` bytes without copying them.
    ///
    /// Returns `Ok(None)`, consuming nothing, if the source cannot share
    /// its storage.
    fn reference_data(&mut self, count: usize) -> Result<Option<Bytes>, InstrumentError>;

    /// Takes the next `count` bytes as an independent, bounded reader.
    fn sub_instrument(&mut self, count: usize) -> Result<BufferReader, InstrumentError>;

    /// Bytes left, if the source knows.
    fn remaining(&self) -> Option<usize>;

    /// The number of bytes consumed so far.
    fn offset(&self) -> usize;

    /// Reads `count` bytes into a fresh buffer.
    fn read_vec(&mut self, count: usize) -> Result<Vec<u8>, InstrumentError> {
        if let Some(remaining) = self.remaining()
            && count > remaining
        {
            return Err(InstrumentError::UnexpectedEnd {
                requested: count,
                remaining,
            });
        }
        let mut out = vec![0; count];
        self.read(&mut out)?;
        Ok(out)
    }

    #[inline]
    fn read_u8(&mut self) -> Result<u8, InstrumentError> {
        let mut out = [0; 1];
        self.read(&mut out)?;
        Ok(out[0])
    }

    #[inline]
    fn read_u16(&mut self) -> Result<u16, InstrumentError> {
        let mut out = [0; 2];
        self.read(&mut out)?;
        Ok(u16::from_le_bytes(out))
    }

    #[inline]
    fn read_u32(&mut self) -> Result<u32, InstrumentError> {
        let mut out = [0; 4];
        self.read(&mut out)?;
        Ok(u32::from_le_bytes(out))
    }

    #[inline]
    fn read_u64(&mut self) -> Result<u64, InstrumentError> {
        let mut out = [0; 8];
        self.read(&mut out)?;
        Ok(u64::from_le_bytes(out))
    }

    fn read_varint(&mut self) -> Result<u64, InstrumentError> {
        varint::decode(|| self.read_u8())
    }

    /// Reads a length-prefixed string. Invalid UTF-8 yields `Ok(None)`.
    fn read_string(&mut self) -> Result<Option<String>, InstrumentError> {
        let len = self.read_varint()?;
        let len = usize::try_from(len).map_err(|_| InstrumentError::VarintOverflow)?;
        let bytes = self.read_vec(len)?;
        Ok(String::from_utf8(bytes).ok())
    }

    /// Skips a length-prefixed string.
    fn ignore_string(&mut self) -> Result<(), InstrumentError> {
        let len = self.read_varint()?;
        let len = usize::try_from(len).map_err(|_| InstrumentError::VarintOverflow)?;
        self.ignore(len)
    }
}
