//! Unsigned LEB128.

use crate::error::InstrumentError;

/// The longest encoding of a `u64`.
pub const MAX_VARINT_LEN: usize = 10;

/// Encodes `value` into `out`, returning the number of bytes used.
///
/// # Examples
///
/// ```
/// use vc_serialize::instrument::varint;
///
/// let mut out = [0; varint::MAX_VARINT_LEN];
/// assert_eq!(varint::encode(300, &mut out), 2);
/// assert_eq!(&out[..2], &[0xAC, 0x02]);
/// ```
pub fn encode(mut value: u64, out: &mut [u8; MAX_VARINT_LEN]) -> usize {
    let mut len = 0;
    loop {
        let byte = (value & 0x7F) as u8;
        value >>= 7;
        if value == 0 {
            out[len] = byte;
            return len + 1;
        }
        out[len] = byte | 0x80;
        len += 1;
    }
}

/// The number of bytes `value` encodes to.
#[inline]
pub const fn encoded_len(value: u64) -> usize {
    let bits = 64 - (value | 1).leading_zeros() as usize;
    bits.div_ceil(7)
}

/// Decodes one value, pulling bytes from `next`.
pub fn decode(
    mut next: impl FnMut() -> Result<u8, InstrumentError>,
) -> Result<u64, InstrumentError> {
    let mut value = 0_u64;
    for index in 0..MAX_VARINT_LEN {
        let byte = next()?;
        let payload = (byte & 0x7F) as u64;
        // The tenth byte may only carry the top bit of a u64.
        if index == MAX_VARINT_LEN - 1 && payload > 1 {
            return Err(InstrumentError::VarintOverflow);
        }
        value |= payload << (7 * index);
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(InstrumentError::VarintOverflow)
}

#[cfg(test)]
mod tests {
    use super::{MAX_VARINT_LEN, decode, encode, encoded_len};
    use crate::error::InstrumentError;

    fn decode_slice(bytes: &[u8]) -> Result<u64, InstrumentError> {
        let mut iter = bytes.iter().copied();
        decode(|| {
            iter.next().ok_or(InstrumentError::UnexpectedEnd {
                requested: 1,
                remaining: 0,
            })
        })
    }

    #[test]
    fn boundaries() {
        for value in [0, 1, 127, 128, 16_383, 16_384, u32::MAX as u64, u64::MAX] {
            let mut out = [0; MAX_VARINT_LEN];
            let len = encode(value, &mut out);
            assert_eq!(len, encoded_len(value));
            assert_eq!(decode_slice(&out[..len]), Ok(value));
        }
    }

    #[test]
    fn overflow_and_truncation() {
        let too_long = [0xFF; 11];
        assert_eq!(decode_slice(&too_long), Err(InstrumentError::VarintOverflow));
        assert!(matches!(
            decode_slice(&[0x80, 0x80]),
            Err(InstrumentError::UnexpectedEnd { .. })
        ));
    }
}
