use alloc::vec::Vec;

use bytes::Bytes;

use crate::error::InstrumentError;
use crate::instrument::WriteInstrument;

// -----------------------------------------------------------------------------
// BufferWriter

/// Appends to an owned buffer, optionally bounded.
///
/// # Examples
///
/// ```
/// use vc_serialize::instrument::{BufferWriter, WriteInstrument};
///
/// let mut writer = BufferWriter::new();
/// writer.write_u16(0xBEEF).unwrap();
/// writer.write_varint(300).unwrap();
/// assert_eq!(writer.as_slice(), &[0xEF, 0xBE, 0xAC, 0x02]);
///
/// let mut bounded = BufferWriter::with_limit(2);
/// assert!(bounded.write_u32(1).is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct BufferWriter {
    buffer: Vec<u8>,
    limit: Option<usize>,
}

impl BufferWriter {
    #[inline]
    pub const fn new() -> Self {
        Self {
            buffer: Vec::new(),
            limit: None,
        }
    }

    /// Creates a writer that refuses to grow past `limit` bytes.
    #[inline]
    pub const fn with_limit(limit: usize) -> Self {
        Self {
            buffer: Vec::new(),
            limit: Some(limit),
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.buffer
    }

    #[inline]
    pub fn into_vec(self) -> Vec<u8> {
        self.buffer
    }

    #[inline]
    pub fn into_bytes(self) -> Bytes {
        Bytes::from(self.buffer)
    }
}

impl WriteInstrument for BufferWriter {
    fn write(&mut self, bytes: &[u8]) -> Result<(), InstrumentError> {
        if let Some(limit) = self.limit
            && self.buffer.len() + bytes.len() > limit
        {
            return Err(InstrumentError::Full);
        }
        self.buffer.extend_from_slice(bytes);
        Ok(())
    }

    #[inline]
    fn offset(&self) -> usize {
        self.buffer.len()
    }
}

// -----------------------------------------------------------------------------
// SizeDetermination

/// Counts the bytes a write would produce.
#[derive(Debug, Clone, Copy, Default)]
pub struct SizeDetermination {
    size: usize,
}

impl SizeDetermination {
    #[inline]
    pub const fn new() -> Self {
        Self { size: 0 }
    }

    #[inline]
    pub const fn size(&self) -> usize {
        self.size
    }
}

impl WriteInstrument for SizeDetermination {
    #[inline]
    fn write(&mut self, bytes: &[u8]) -> Result<(), InstrumentError> {
        self.size += bytes.len();
        Ok(())
    }

    #[inline]
    fn offset(&self) -> usize {
        self.size
    }

    #[inline]
    fn is_size_determination(&self) -> bool {
        true
    }

    #[inline]
    fn advance(&mut self, count: usize) -> Result<(), InstrumentError> {
        self.size += count;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{BufferWriter, SizeDetermination};
    use crate::instrument::WriteInstrument;

    #[test]
    fn advance_writes_zeroes() {
        let mut writer = BufferWriter::new();
        writer.write_u8(7).unwrap();
        writer.advance(130).unwrap();
        assert_eq!(writer.offset(), 131);
        assert!(writer.as_slice()[1..].iter().all(|b| *b == 0));
    }

    #[test]
    fn size_matches_buffer() {
        let mut size = SizeDetermination::new();
        let mut writer = BufferWriter::new();
        for instrument in [&mut size as &mut dyn WriteInstrument, &mut writer] {
            instrument.write_str("hello").unwrap();
            instrument.write_varint(1 << 40).unwrap();
            instrument.advance(3).unwrap();
        }
        assert_eq!(size.size(), writer.as_slice().len());
    }
}
