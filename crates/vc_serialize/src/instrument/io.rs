use alloc::string::ToString;

use bytes::Bytes;
use std::io::{self, Read, Write};

use crate::error::InstrumentError;
use crate::instrument::{BufferReader, ReadInstrument, WriteInstrument};

fn io_error(err: io::Error) -> InstrumentError {
    match err.kind() {
        io::ErrorKind::UnexpectedEof => InstrumentError::UnexpectedEnd {
            requested: 0,
            remaining: 0,
        },
        _ => InstrumentError::Io(err.to_string()),
    }
}

// -----------------------------------------------------------------------------
// IoWriter

/// Writes into any [`std::io::Write`].
#[derive(Debug)]
pub struct IoWriter<W> {
    inner: W,
    offset: usize,
}

impl<W: Write> IoWriter<W> {
    #[inline]
    pub const fn new(inner: W) -> Self {
        Self { inner, offset: 0 }
    }

    /// Flushes and returns the wrapped writer.
    pub fn finish(mut self) -> Result<W, InstrumentError> {
        self.inner.flush().map_err(io_error)?;
        Ok(self.inner)
    }
}

impl<W: Write> WriteInstrument for IoWriter<W> {
    fn write(&mut self, bytes: &[u8]) -> Result<(), InstrumentError> {
        self.inner.write_all(bytes).map_err(io_error)?;
        self.offset += bytes.len();
        Ok(())
    }

    #[inline]
    fn offset(&self) -> usize {
        self.offset
    }
}

// -----------------------------------------------------------------------------
// IoReader

/// Reads from any [`std::io::Read`].
///
/// The source cannot share its storage: referenced data is always copied.
#[derive(Debug)]
pub struct IoReader<R> {
    inner: R,
    offset: usize,
}

impl<R: Read> IoReader<R> {
    #[inline]
    pub const fn new(inner: R) -> Self {
        Self { inner, offset: 0 }
    }

    #[inline]
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> ReadInstrument for IoReader<R> {
    fn read(&mut self, out: &mut [u8]) -> Result<(), InstrumentError> {
        self.inner.read_exact(out).map_err(io_error)?;
        self.offset += out.len();
        Ok(())
    }

    fn ignore(&mut self, count: usize) -> Result<(), InstrumentError> {
        let skipped = io::copy(&mut (&mut self.inner).take(count as u64), &mut io::sink())
            .map_err(io_error)?;
        self.offset += skipped as usize;
        if skipped as usize != count {
            return Err(InstrumentError::UnexpectedEnd {
                requested: count,
                remaining: skipped as usize,
            });
        }
        Ok(())
    }

    #[inline]
    fn reference_data(&mut self, _count: usize) -> Result<Option<Bytes>, InstrumentError> {
        Ok(None)
    }

    fn sub_instrument(&mut self, count: usize) -> Result<BufferReader, InstrumentError> {
        self.read_vec(count).map(BufferReader::new)
    }

    #[inline]
    fn remaining(&self) -> Option<usize> {
        None
    }

    #[inline]
    fn offset(&self) -> usize {
        self.offset
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec::Vec;

    use super::{IoReader, IoWriter};
    use crate::error::InstrumentError;
    use crate::instrument::{ReadInstrument, WriteInstrument};

    #[test]
    fn through_std_io() {
        let mut writer = IoWriter::new(Vec::new());
        writer.write_str("vc").unwrap();
        writer.write_u32(9).unwrap();
        let bytes = writer.finish().unwrap();

        let mut reader = IoReader::new(bytes.as_slice());
        assert_eq!(reader.reference_data(1), Ok(None));
        assert_eq!(reader.read_string().unwrap().as_deref(), Some("vc"));
        let mut sub = reader.sub_instrument(4).unwrap();
        assert_eq!(sub.read_u32(), Ok(9));
        assert!(matches!(
            reader.ignore(1),
            Err(InstrumentError::UnexpectedEnd { .. })
        ));
    }
}
