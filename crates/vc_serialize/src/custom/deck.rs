use alloc::vec::Vec;

use vc_reflect::Value;
use vc_reflect::value::DeckValue;

use super::{stream, template_of};
use crate::allocator::AllocError;
use crate::de::Deserializer;
use crate::error::{ReadError, WriteError};
use crate::ops::{BufferWalker, Comparer};
use crate::ser::Serializer;

pub(super) const BYTE_SIZE: (usize, usize) = (48, 8);

/// Bytes of one chunk header: pointer and size.
const CHUNK_HEADER_SIZE: usize = 16;

pub(super) fn parse(definition: &str) -> Option<&str> {
    template_of(definition, &["Deck"], 1..=1).map(|(_, arguments)| arguments[0])
}

fn to_u32(value: usize) -> Result<u32, WriteError> {
    u32::try_from(value).map_err(|_| WriteError::MismatchedValue {
        definition: "Deck".into(),
        found: "chunk size larger than u32::MAX",
    })
}

pub(super) fn write(ser: &mut Serializer<'_, '_>, definition: &str, value: &Value) -> Result<(), WriteError> {
    let (Some(element), Value::Deck(deck)) = (parse(definition), value) else {
        return Err(Serializer::mismatch(definition, value));
    };

    ser.write_count(deck.len())?;
    if deck.is_empty() {
        return Ok(());
    }
    ser.instrument().write_u32(to_u32(deck.chunk_size())?)?;
    ser.instrument().write_u32(deck.exponent())?;

    // The chunk buffer itself is a stream of streams.
    ser.write_count(deck.chunk_count())?;
    for chunk in deck.chunks() {
        stream::write_items(ser, element, chunk)?;
    }
    Ok(())
}

pub(super) fn read(de: &mut Deserializer<'_, '_>, definition: &str) -> Result<Option<Value>, ReadError> {
    let Some(element) = parse(definition) else {
        return Err(de.corrupted("deck definition without an element"));
    };

    let total = de.read_length(de.min_encoded_size(element))?;
    if total == 0 {
        return Ok((!de.is_ignoring()).then(|| Value::Deck(DeckValue::default())));
    }

    let chunk_size = de.instrument().read_u32()? as usize;
    let exponent = de.instrument().read_u32()?;
    if chunk_size == 0 || (exponent != 0 && 1_usize.checked_shl(exponent) != Some(chunk_size)) {
        return Err(de.corrupted("deck chunk size does not match its exponent"));
    }

    let chunk_count = de.read_length(1)?;
    if chunk_count != total.div_ceil(chunk_size) {
        return Err(de.corrupted("deck chunk count does not match its element count"));
    }

    let mut chunks = Vec::with_capacity(chunk_count);
    for _ in 0..chunk_count {
        if let Some(items) = stream::read_items(de, element)? {
            if items.len() > chunk_size {
                return Err(de.corrupted("deck chunk holds more than its chunk size"));
            }
            chunks.push(items);
        }
    }

    if de.is_ignoring() {
        return Ok(None);
    }
    if chunks.iter().map(Vec::len).sum::<usize>() != total {
        return Err(de.corrupted("deck chunks do not add up to its element count"));
    }
    match DeckValue::from_chunks(chunk_size, chunks) {
        Some(deck) => Ok(Some(Value::Deck(deck))),
        None => Err(de.corrupted("deck chunks are not filled in order")),
    }
}

pub(super) fn visit_buffers(
    walker: &mut BufferWalker<'_, '_>,
    definition: &str,
    value: &Value,
) -> Result<(), AllocError> {
    let (Some(element), Value::Deck(deck)) = (parse(definition), value) else {
        return Ok(());
    };
    if !walker.native_containers() {
        let (size, align) = walker.layout(element);
        walker.charge(deck.chunk_count().saturating_mul(CHUNK_HEADER_SIZE), 8)?;
        for _ in deck.chunks() {
            walker.charge(deck.chunk_size().saturating_mul(size), align)?;
        }
    }
    if !walker.is_blittable(element) {
        for item in deck.iter() {
            walker.value(element, item)?;
        }
    }
    Ok(())
}

pub(super) fn compare(cmp: &Comparer<'_, '_>, definition: &str, a: &Value, b: &Value) -> bool {
    match (parse(definition), a, b) {
        (Some(element), Value::Deck(a), Value::Deck(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(a, b)| cmp.values(element, a, b))
        }
        _ => a == b,
    }
}
