use alloc::vec;
use alloc::vec::Vec;

use vc_reflect::Value;
use vc_reflect::value::{HashTableValue, METADATA_EMPTY};
use vc_utils::num::align_up;

use super::template_of;
use crate::allocator::AllocError;
use crate::de::Deserializer;
use crate::definition::DefinitionInfo;
use crate::error::{ReadError, WriteError};
use crate::layout::encode_image;
use crate::ops::{BufferWalker, Comparer};
use crate::ser::Serializer;

pub(super) const BYTE_SIZE: (usize, usize) = (32, 8);

/// How values and identifiers are arranged in a hash table's storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HashTableLayout {
    /// All values, then all identifiers.
    #[default]
    SoA,
    /// `(value, identifier)` pairs laid out like a C struct.
    Pairs,
}

/// `(value, identifier, layout)`.
pub(super) fn parse(definition: &str) -> Option<(&str, &str, HashTableLayout)> {
    let (_, arguments) = template_of(definition, &["HashTable"], 2..=3)?;
    let layout = match arguments.get(2).copied() {
        None | Some("SoA") => HashTableLayout::SoA,
        Some("Pairs") => HashTableLayout::Pairs,
        Some(_) => return None,
    };
    Some((arguments[0], arguments[1], layout))
}

/// `(identifier_offset, stride)` of one pair.
fn pair_layout(value: (usize, usize), identifier: (usize, usize)) -> (usize, usize) {
    let offset = align_up(value.0, identifier.1);
    (offset, align_up(offset + identifier.0, value.1.max(identifier.1)))
}

fn to_u32(value: usize) -> Result<u32, WriteError> {
    u32::try_from(value).map_err(|_| WriteError::MismatchedValue {
        definition: "HashTable".into(),
        found: "hash table larger than u32::MAX",
    })
}

// -----------------------------------------------------------------------------
// Write

pub(super) fn write(ser: &mut Serializer<'_, '_>, definition: &str, value: &Value) -> Result<(), WriteError> {
    let (Some((value_def, identifier_def, layout)), Value::HashTable(table)) = (parse(definition), value)
    else {
        return Err(Serializer::mismatch(definition, value));
    };

    let instrument = ser.instrument();
    instrument.write_u32(to_u32(table.len())?)?;
    instrument.write_u32(to_u32(table.capacity())?)?;
    instrument.write(table.metadata())?;

    let value_info = ser.resolver().resolve(value_def);
    let identifier_info = ser.resolver().resolve(identifier_def);

    match layout {
        HashTableLayout::SoA => {
            write_column(ser, value_def, &value_info, table, false)?;
            write_column(ser, identifier_def, &identifier_info, table, true)
        }
        HashTableLayout::Pairs if value_info.is_blittable && identifier_info.is_blittable => {
            write_pair_image(ser, (value_def, &value_info), (identifier_def, &identifier_info), table)
        }
        HashTableLayout::Pairs => {
            for (_, identifier, value) in table.iter() {
                ser.write_resolved(value_def, &value_info, None, value)?;
                ser.write_resolved(identifier_def, &identifier_info, None, identifier)?;
            }
            Ok(())
        }
    }
}

/// Blittable columns cover every slot, empty ones zeroed. Other columns
/// only hold the occupied slots.
fn write_column<'s, 'a>(
    ser: &mut Serializer<'s, 'a>,
    definition: &str,
    info: &DefinitionInfo<'a>,
    table: &HashTableValue,
    identifiers: bool,
) -> Result<(), WriteError> {
    if info.is_blittable {
        let items: Vec<Option<&Value>> = (0..table.capacity())
            .map(|slot| table.slot(slot).map(|pair| pick(pair, identifiers)))
            .collect();
        return ser.write_blittable_run(definition, info, &items);
    }
    for (_, identifier, value) in table.iter() {
        ser.write_resolved(definition, info, None, pick((identifier, value), identifiers))?;
    }
    Ok(())
}

#[inline]
fn pick<'v>((identifier, value): (&'v Value, &'v Value), identifiers: bool) -> &'v Value {
    if identifiers { identifier } else { value }
}

fn write_pair_image<'s, 'a>(
    ser: &mut Serializer<'s, 'a>,
    (value_def, value_info): (&str, &DefinitionInfo<'a>),
    (identifier_def, identifier_info): (&str, &DefinitionInfo<'a>),
    table: &HashTableValue,
) -> Result<(), WriteError> {
    let unknown = |definition: &str| WriteError::UnknownType(definition.into());
    let value_size = value_info.byte_size.ok_or_else(|| unknown(value_def))?;
    let identifier_size = identifier_info.byte_size.ok_or_else(|| unknown(identifier_def))?;
    let (offset, stride) = pair_layout(
        (value_size, value_info.alignment),
        (identifier_size, identifier_info.alignment),
    );

    if ser.instrument().is_size_determination() {
        ser.instrument().advance(table.capacity() * stride)?;
        return Ok(());
    }

    let resolver = ser.resolver();
    let mut image = vec![0_u8; table.capacity() * stride];
    for (slot, identifier, value) in table.iter() {
        let pair = &mut image[slot * stride..(slot + 1) * stride];
        encode_image(value_def, value_info, value, resolver, &mut pair[..value_size])?;
        encode_image(
            identifier_def,
            identifier_info,
            identifier,
            resolver,
            &mut pair[offset..offset + identifier_size],
        )?;
    }
    ser.instrument().write(&image)?;
    Ok(())
}

// -----------------------------------------------------------------------------
// Read

pub(super) fn read(de: &mut Deserializer<'_, '_>, definition: &str) -> Result<Option<Value>, ReadError> {
    let Some((value_def, identifier_def, layout)) = parse(definition) else {
        return Err(de.corrupted("malformed hash table definition"));
    };

    let count = de.instrument().read_u32()? as usize;
    let capacity = de.instrument().read_u32()? as usize;
    if (capacity != 0 && !capacity.is_power_of_two()) || count > capacity {
        return Err(de.corrupted("hash table capacity is not a power of two"));
    }
    let capacity = de.check_count(capacity as u64, 1)?;
    let metadata = de.instrument().read_vec(capacity)?;
    let occupied: Vec<usize> = metadata
        .iter()
        .enumerate()
        .filter_map(|(slot, meta)| (*meta != METADATA_EMPTY).then_some(slot))
        .collect();
    if occupied.len() != count {
        return Err(de.corrupted("hash table metadata disagrees with its element count"));
    }

    let value_info = de.recorded().resolve(value_def);
    let identifier_info = de.recorded().resolve(identifier_def);

    let (values, identifiers) = match layout {
        HashTableLayout::SoA => {
            let values = read_column(de, value_def, &value_info, &metadata, &occupied)?;
            let identifiers = read_column(de, identifier_def, &identifier_info, &metadata, &occupied)?;
            (values, identifiers)
        }
        HashTableLayout::Pairs if value_info.is_blittable && identifier_info.is_blittable => {
            read_pair_image(
                de,
                (value_def, &value_info),
                (identifier_def, &identifier_info),
                capacity,
                &occupied,
            )?
        }
        HashTableLayout::Pairs => {
            let mut values = Vec::with_capacity(count);
            let mut identifiers = Vec::with_capacity(count);
            for _ in &occupied {
                values.extend(de.read_resolved(value_def, &value_info, None)?);
                identifiers.extend(de.read_resolved(identifier_def, &identifier_info, None)?);
            }
            (values, identifiers)
        }
    };

    if de.is_ignoring() {
        return Ok(None);
    }

    let mut slots: Vec<Option<(Value, Value)>> = (0..capacity).map(|_| None).collect();
    let mut pairs = identifiers.into_iter().zip(values);
    for slot in &occupied {
        slots[*slot] = pairs.next();
    }

    let hashes_match = slots.iter().zip(&metadata).all(|(slot, meta)| {
        slot.as_ref()
            .is_none_or(|(identifier, _)| HashTableValue::metadata_of(identifier) == *meta)
    });
    if hashes_match {
        return match HashTableValue::from_raw_parts(metadata, slots) {
            Some(table) => Ok(Some(Value::HashTable(table))),
            None => Err(de.corrupted("hash table slots do not match their metadata")),
        };
    }

    // Identifier hashes changed, e.g. a converted identifier type.
    log::warn!("hash table `{definition}` does not match its recorded metadata, rebuilding");
    let mut table = HashTableValue::with_capacity(capacity);
    for (identifier, value) in slots.into_iter().flatten() {
        table.insert(identifier, value);
    }
    Ok(Some(Value::HashTable(table)))
}

fn read_column<'s, 'a>(
    de: &mut Deserializer<'s, 'a>,
    definition: &str,
    info: &DefinitionInfo<'a>,
    metadata: &[u8],
    occupied: &[usize],
) -> Result<Vec<Value>, ReadError> {
    if info.is_blittable {
        let all = de.read_blittable_run(definition, info, metadata.len())?;
        return Ok(all
            .into_iter()
            .flatten()
            .zip(metadata)
            .filter_map(|(item, meta)| (*meta != METADATA_EMPTY).then_some(item))
            .collect());
    }
    let mut items = Vec::with_capacity(occupied.len());
    for _ in occupied {
        items.extend(de.read_resolved(definition, info, None)?);
    }
    Ok(items)
}

fn read_pair_image<'s, 'a>(
    de: &mut Deserializer<'s, 'a>,
    (value_def, value_info): (&str, &DefinitionInfo<'a>),
    (identifier_def, identifier_info): (&str, &DefinitionInfo<'a>),
    capacity: usize,
    occupied: &[usize],
) -> Result<(Vec<Value>, Vec<Value>), ReadError> {
    let value_size = value_info.byte_size.ok_or_else(|| de.unknown(value_def))?;
    let identifier_size = identifier_info.byte_size.ok_or_else(|| de.unknown(identifier_def))?;
    let (offset, stride) = pair_layout(
        (value_size, value_info.alignment),
        (identifier_size, identifier_info.alignment),
    );
    let total = capacity
        .checked_mul(stride)
        .ok_or_else(|| de.corrupted("hash table pair storage overflows"))?;

    if de.is_ignoring() {
        de.instrument().ignore(total)?;
        return Ok((Vec::new(), Vec::new()));
    }

    let image = de.instrument().read_vec(total)?;
    let mut values = Vec::with_capacity(occupied.len());
    let mut identifiers = Vec::with_capacity(occupied.len());
    for slot in occupied {
        let pair = &image[slot * stride..(slot + 1) * stride];
        values.push(de.decode_blittable(value_def, value_info, &pair[..value_size])?);
        identifiers.push(de.decode_blittable(
            identifier_def,
            identifier_info,
            &pair[offset..offset + identifier_size],
        )?);
    }
    Ok((values, identifiers))
}

// -----------------------------------------------------------------------------
// Buffers & comparison

pub(super) fn visit_buffers(
    walker: &mut BufferWalker<'_, '_>,
    definition: &str,
    value: &Value,
) -> Result<(), AllocError> {
    let (Some((value_def, identifier_def, layout)), Value::HashTable(table)) = (parse(definition), value)
    else {
        return Ok(());
    };
    let value_layout = walker.layout(value_def);
    let identifier_layout = walker.layout(identifier_def);
    let payload = match layout {
        HashTableLayout::SoA => value_layout.0 + identifier_layout.0,
        HashTableLayout::Pairs => pair_layout(value_layout, identifier_layout).1,
    };
    // One metadata byte per slot.
    walker.charge(
        table.capacity() * (payload + 1),
        value_layout.1.max(identifier_layout.1),
    )?;

    let values_owned = !walker.is_blittable(value_def);
    let identifiers_owned = !walker.is_blittable(identifier_def);
    for (_, identifier, value) in table.iter() {
        if values_owned {
            walker.value(value_def, value)?;
        }
        if identifiers_owned {
            walker.value(identifier_def, identifier)?;
        }
    }
    Ok(())
}

pub(super) fn compare(cmp: &Comparer<'_, '_>, definition: &str, a: &Value, b: &Value) -> bool {
    match (parse(definition), a, b) {
        (Some((value_def, ..)), Value::HashTable(a), Value::HashTable(b)) => {
            a.len() == b.len()
                && a.iter().all(|(_, identifier, value)| {
                    b.get(identifier)
                        .is_some_and(|other| cmp.values(value_def, value, other))
                })
        }
        _ => a == b,
    }
}
