use bytes::{Buf, Bytes};

use crate::error::InstrumentError;
use crate::instrument::ReadInstrument;

/// Reads from a shared, immutable buffer.
///
/// Slices taken with [`reference_data`](ReadInstrument::reference_data) and
/// [`sub_instrument`](ReadInstrument::sub_instrument) share the storage of
/// the buffer instead of copying it.
///
/// # Examples
///
/// ```
/// use vc_serialize::instrument::{BufferReader, ReadInstrument};
///
/// let mut reader = BufferReader::new(vec![0x2A, 0, 3, b'a', b'b', b'c']);
/// assert_eq!(reader.read_u16().unwrap(), 42);
///
/// let mut sub = reader.sub_instrument(4).unwrap();
/// assert_eq!(sub.read_string().unwrap().as_deref(), Some("abc"));
/// assert_eq!(sub.remaining(), Some(0));
/// assert_eq!(reader.remaining(), Some(0));
/// ```
#[derive(Debug, Clone, Default)]
pub struct BufferReader {
    data: Bytes,
    offset: usize,
}

impl BufferReader {
    #[inline]
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            offset: 0,
        }
    }

    /// The bytes not consumed yet.
    #[inline]
    pub fn chunk(&self) -> &[u8] {
        &self.data
    }

    fn check(&self, count: usize) -> Result<(), InstrumentError> {
        if count > self.data.len() {
            return Err(InstrumentError::UnexpectedEnd {
                requested: count,
                remaining: self.data.len(),
            });
        }
        Ok(())
    }

    fn take(&mut self, count: usize) -> Result<Bytes, InstrumentError> {
        self.check(count)?;
        self.offset += count;
        Ok(self.data.split_to(count))
    }
}

impl ReadInstrument for BufferReader {
    fn read(&mut self, out: &mut [u8]) -> Result<(), InstrumentError> {
        self.check(out.len())?;
        self.data.copy_to_slice(out);
        self.offset += out.len();
        Ok(())
    }

    fn ignore(&mut self, count: usize) -> Result<(), InstrumentError> {
        self.check(count)?;
        self.data.advance(count);
        self.offset += count;
        Ok(())
    }

    #[inline]
    fn reference_data(&mut self, count: usize) -> Result<Option<Bytes>, InstrumentError> {
        self.take(count).map(Some)
    }

    #[inline]
    fn sub_instrument(&mut self, count: usize) -> Result<BufferReader, InstrumentError> {
        self.take(count).map(BufferReader::new)
    }

    #[inline]
    fn remaining(&self) -> Option<usize> {
        Some(self.data.len())
    }

    #[inline]
    fn offset(&self) -> usize {
        self.offset
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::BufferReader;
    use crate::error::InstrumentError;
    use crate::instrument::ReadInstrument;

    #[test]
    fn referenced_data_shares_storage() {
        let source = bytes::Bytes::from(vec![1, 2, 3, 4, 5]);
        let start = source.as_ptr() as usize;
        let mut reader = BufferReader::new(source.clone());
        reader.ignore(1).unwrap();

        let shared = reader.reference_data(3).unwrap().unwrap();
        assert_eq!(&shared[..], &[2, 3, 4]);
        assert_eq!(shared.as_ptr() as usize, start + 1);
        assert_eq!(reader.offset(), 4);
    }

    #[test]
    fn bounded() {
        let mut reader = BufferReader::new(vec![1, 2]);
        assert_eq!(
            reader.read_u32(),
            Err(InstrumentError::UnexpectedEnd {
                requested: 4,
                remaining: 2
            })
        );
        // A failed read consumes nothing.
        assert_eq!(reader.read_u16(), Ok(0x0201));
        assert!(reader.ignore(1).is_err());
    }
}
