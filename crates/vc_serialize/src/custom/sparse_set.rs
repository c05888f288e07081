use vc_reflect::Value;
use vc_reflect::value::{SparseSetValue, SparseSlot};

use super::{CustomTypeHandler, stream, template_of};
use crate::allocator::AllocError;
use crate::de::Deserializer;
use crate::error::{ReadError, WriteError};
use crate::ops::{BufferWalker, Comparer};
use crate::ser::Serializer;

pub(super) const VERSION: u32 = 1;

/// The recorded sparse-set version of data written as plain streams.
pub const SPARSE_SET_LEGACY_VERSION: u32 = 0;

/// Bytes of one indirection entry on the wire.
const SLOT_SIZE: usize = 8;

/// `(resizable, element)`.
pub(super) fn parse(definition: &str) -> Option<(bool, &str)> {
    let (name, arguments) = template_of(definition, &["SparseSet", "ResizableSparseSet"], 1..=1)?;
    Some((name == "ResizableSparseSet", arguments[0]))
}

pub(super) fn byte_size(definition: &str) -> Option<(usize, usize)> {
    match parse(definition)? {
        (true, _) => Some((40, 8)),
        (false, _) => Some((24, 8)),
    }
}

fn to_u32(value: usize) -> Result<u32, WriteError> {
    u32::try_from(value).map_err(|_| WriteError::MismatchedValue {
        definition: "SparseSet".into(),
        found: "sparse set larger than u32::MAX",
    })
}

pub(super) fn write(ser: &mut Serializer<'_, '_>, definition: &str, value: &Value) -> Result<(), WriteError> {
    let (Some((_, element)), Value::SparseSet(set)) = (parse(definition), value) else {
        return Err(Serializer::mismatch(definition, value));
    };

    if ser.settings().legacy_sparse_sets {
        return stream::write_items(ser, element, set.buffer());
    }

    let instrument = ser.instrument();
    instrument.write_u32(to_u32(set.len())?)?;
    instrument.write_u32(to_u32(set.capacity())?)?;
    instrument.write_u32(set.first_free())?;
    ser.write_elements(element, set.buffer())?;

    let mut slots = alloc::vec::Vec::with_capacity(set.capacity() * SLOT_SIZE);
    for slot in set.indirection() {
        slots.extend_from_slice(&slot.index.to_le_bytes());
        slots.extend_from_slice(&slot.handle.to_le_bytes());
    }
    ser.instrument().write(&slots)?;
    Ok(())
}

pub(super) fn read(de: &mut Deserializer<'_, '_>, definition: &str) -> Result<Option<Value>, ReadError> {
    let Some((_, element)) = parse(definition) else {
        return Err(de.corrupted("sparse set definition without an element"));
    };

    if de.settings().legacy_sparse_sets
        || de.version(CustomTypeHandler::SparseSet) == SPARSE_SET_LEGACY_VERSION
    {
        let items = stream::read_items(de, element)?;
        return Ok(items.map(|items| Value::SparseSet(SparseSetValue::from_sequential(items))));
    }

    let count = de.instrument().read_u32()?;
    let capacity = de.instrument().read_u32()?;
    let first_free = de.instrument().read_u32()?;
    if count > capacity {
        return Err(de.corrupted("sparse set holds more elements than handles"));
    }
    let capacity = de.check_count(capacity as u64, SLOT_SIZE)?;
    let count = de.check_count(count as u64, de.min_encoded_size(element))?;

    let buffer = de.read_elements(element, count)?;
    if de.is_ignoring() {
        de.instrument().ignore(capacity * SLOT_SIZE)?;
        return Ok(None);
    }

    let raw = de.instrument().read_vec(capacity * SLOT_SIZE)?;
    let indirection = raw
        .chunks_exact(SLOT_SIZE)
        .map(|entry| SparseSlot {
            index: u32::from_le_bytes([entry[0], entry[1], entry[2], entry[3]]),
            handle: u32::from_le_bytes([entry[4], entry[5], entry[6], entry[7]]),
        })
        .collect();

    let buffer = buffer.unwrap_or_default();
    match SparseSetValue::from_raw_parts(buffer, indirection, first_free) {
        Some(set) => Ok(Some(Value::SparseSet(set))),
        None => Err(de.corrupted("sparse set indirection does not match its elements")),
    }
}

pub(super) fn visit_buffers(
    walker: &mut BufferWalker<'_, '_>,
    definition: &str,
    value: &Value,
) -> Result<(), AllocError> {
    let (Some((resizable, element)), Value::SparseSet(set)) = (parse(definition), value) else {
        return Ok(());
    };
    if !(resizable && walker.native_containers()) {
        let (size, align) = walker.layout(element);
        walker.charge(set.capacity() * (size + SLOT_SIZE), align.max(4))?;
    }
    if !walker.is_blittable(element) {
        for item in set.buffer() {
            walker.value(element, item)?;
        }
    }
    Ok(())
}

pub(super) fn compare(cmp: &Comparer<'_, '_>, definition: &str, a: &Value, b: &Value) -> bool {
    match (parse(definition), a, b) {
        (Some((_, element)), Value::SparseSet(a), Value::SparseSet(b)) => {
            a.len() == b.len()
                && a.iter().all(|(handle, item)| {
                    b.get(handle).is_some_and(|other| cmp.values(element, item, other))
                })
        }
        _ => a == b,
    }
}
