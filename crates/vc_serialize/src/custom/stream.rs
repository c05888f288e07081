use alloc::string::String;
use alloc::vec::Vec;

use bytes::Bytes;
use vc_reflect::value::StreamValue;
use vc_reflect::{BasicType, StreamKind, Value};

use super::template_of;
use crate::allocator::AllocError;
use crate::de::Deserializer;
use crate::error::{ReadError, WriteError};
use crate::ops::{BufferWalker, Comparer};
use crate::ser::Serializer;

const NAMES: [&str; 3] = ["Stream", "CapacityStream", "ResizableStream"];

pub(super) fn parse(definition: &str) -> Option<(StreamKind, &str)> {
    let (name, arguments) = template_of(definition, &NAMES, 1..=1)?;
    Some((StreamKind::from_template(name)?, arguments[0]))
}

pub(super) fn byte_size(definition: &str) -> Option<(usize, usize)> {
    match parse(definition)?.0 {
        // Pointer, size, capacity and an allocator handle.
        StreamKind::ResizableStream => Some((32, 8)),
        _ => Some((16, 8)),
    }
}

pub(super) fn default_value(definition: &str) -> Value {
    match parse(definition).and_then(|(_, element)| BasicType::from_name(element)) {
        Some(BasicType::Char) => Value::String(String::new()),
        Some(BasicType::WChar) => Value::WString(Vec::new()),
        Some(BasicType::UInt8) => Value::Bytes(Bytes::new()),
        _ => Value::Stream(StreamValue::default()),
    }
}

// -----------------------------------------------------------------------------
// Write

pub(super) fn write(ser: &mut Serializer<'_, '_>, definition: &str, value: &Value) -> Result<(), WriteError> {
    let Some((_, element)) = parse(definition) else {
        return Err(Serializer::mismatch(definition, value));
    };
    match (BasicType::from_name(element), value) {
        (_, Value::Stream(stream)) => write_items(ser, element, &stream.items),
        (Some(BasicType::Char), Value::String(text)) => {
            ser.write_count(text.len())?;
            ser.instrument().write(text.as_bytes())?;
            ser.instrument().write_u8(0)?;
            Ok(())
        }
        (Some(BasicType::WChar), Value::WString(units)) => {
            ser.write_count(units.len())?;
            let bytes: Vec<u8> = units.iter().flat_map(|unit| unit.to_le_bytes()).collect();
            ser.instrument().write(&bytes)?;
            ser.instrument().write_u16(0)?;
            Ok(())
        }
        (Some(BasicType::UInt8), Value::Bytes(bytes)) => {
            ser.write_count(bytes.len())?;
            ser.instrument().write(bytes)?;
            Ok(())
        }
        _ => Err(Serializer::mismatch(definition, value)),
    }
}

/// Writes a plain stream of `element`: count, elements, and a terminator
/// after string-like payloads.
pub(super) fn write_items(
    ser: &mut Serializer<'_, '_>,
    element: &str,
    items: &[Value],
) -> Result<(), WriteError> {
    ser.write_count(items.len())?;
    ser.write_elements(element, items)?;
    match BasicType::from_name(element) {
        Some(BasicType::Char) => ser.instrument().write_u8(0)?,
        Some(BasicType::WChar) => ser.instrument().write_u16(0)?,
        _ => {}
    }
    Ok(())
}

// -----------------------------------------------------------------------------
// Read

pub(super) fn read(de: &mut Deserializer<'_, '_>, definition: &str) -> Result<Option<Value>, ReadError> {
    let Some((_, element)) = parse(definition) else {
        return Err(de.corrupted("stream definition without an element"));
    };
    match BasicType::from_name(element) {
        Some(BasicType::Char) => read_text(de),
        Some(BasicType::WChar) => read_wide_text(de),
        Some(BasicType::UInt8) => {
            let len = de.read_length(1)?;
            Ok(de.read_bytes_payload(len)?.map(Value::Bytes))
        }
        _ => Ok(read_items(de, element)?.map(|items| Value::Stream(StreamValue::new(items)))),
    }
}

/// Reads what [`write_items`] wrote.
pub(super) fn read_items(
    de: &mut Deserializer<'_, '_>,
    element: &str,
) -> Result<Option<Vec<Value>>, ReadError> {
    let count = de.read_length(de.min_encoded_size(element))?;
    let items = de.read_elements(element, count)?;
    match BasicType::from_name(element) {
        Some(BasicType::Char) => de.instrument().ignore(1)?,
        Some(BasicType::WChar) => de.instrument().ignore(2)?,
        _ => {}
    }
    Ok(items)
}

fn read_text(de: &mut Deserializer<'_, '_>) -> Result<Option<Value>, ReadError> {
    let len = de.read_length(1)?;
    if de.is_ignoring() {
        de.instrument().ignore(len + 1)?;
        return Ok(None);
    }
    let bytes = de.instrument().read_vec(len)?;
    de.instrument().ignore(1)?;
    Ok(Some(match String::from_utf8(bytes) {
        Ok(text) => Value::String(text),
        // Not text after all: keep the characters.
        Err(err) => Value::Stream(
            err.into_bytes()
                .into_iter()
                .map(|byte| Value::I8(byte as i8))
                .collect(),
        ),
    }))
}

fn read_wide_text(de: &mut Deserializer<'_, '_>) -> Result<Option<Value>, ReadError> {
    let len = de.read_length(2)?;
    if de.is_ignoring() {
        de.instrument().ignore((len + 1) * 2)?;
        return Ok(None);
    }
    let bytes = de.instrument().read_vec(len * 2)?;
    de.instrument().ignore(2)?;
    let units = bytes
        .chunks_exact(2)
        .map(|unit| u16::from_le_bytes([unit[0], unit[1]]))
        .collect();
    Ok(Some(Value::WString(units)))
}

// -----------------------------------------------------------------------------
// Buffers & comparison

pub(super) fn visit_buffers(
    walker: &mut BufferWalker<'_, '_>,
    definition: &str,
    value: &Value,
) -> Result<(), AllocError> {
    let Some((kind, element)) = parse(definition) else {
        return Ok(());
    };
    let (size, align) = walker.layout(element);
    let (bytes, align) = match value {
        Value::String(text) if !text.is_empty() => (text.len() + 1, 1),
        Value::WString(units) if !units.is_empty() => ((units.len() + 1) * 2, 2),
        Value::Bytes(bytes) => (bytes.len(), 1),
        Value::Stream(stream) => (stream.len() * size, align),
        _ => (0, 1),
    };
    if !(kind == StreamKind::ResizableStream && walker.native_containers()) {
        walker.charge(bytes, align)?;
    }
    if let Value::Stream(stream) = value
        && !walker.is_blittable(element)
    {
        for item in &stream.items {
            walker.value(element, item)?;
        }
    }
    Ok(())
}

pub(super) fn compare(cmp: &Comparer<'_, '_>, definition: &str, a: &Value, b: &Value) -> bool {
    let Some((_, element)) = parse(definition) else {
        return a == b;
    };
    if let Some(basic) = BasicType::from_name(element)
        && let (Some(a), Some(b)) = (units(basic, a), units(basic, b))
    {
        return a == b;
    }
    match (a, b) {
        (Value::Stream(a), Value::Stream(b)) => {
            a.len() == b.len()
                && a.items
                    .iter()
                    .zip(&b.items)
                    .all(|(a, b)| cmp.values(element, a, b))
        }
        _ => a == b,
    }
}

/// The code units of a byte or character stream, in either of the forms
/// such a stream is held in.
fn units(element: BasicType, value: &Value) -> Option<Vec<u16>> {
    let unit = |item: &Value| match (element, item) {
        (BasicType::Char, Value::I8(c)) => Some(u16::from(*c as u8)),
        (BasicType::UInt8, Value::U8(byte)) => Some(u16::from(*byte)),
        (BasicType::WChar, Value::U16(unit)) => Some(*unit),
        _ => None,
    };
    match (element, value) {
        (BasicType::Char, Value::String(text)) => Some(text.bytes().map(u16::from).collect()),
        (BasicType::UInt8, Value::Bytes(bytes)) => Some(bytes.iter().copied().map(u16::from).collect()),
        (BasicType::WChar, Value::WString(units)) => Some(units.clone()),
        (BasicType::Char | BasicType::UInt8 | BasicType::WChar, Value::Stream(stream)) => {
            stream.items.iter().map(unit).collect()
        }
        _ => None,
    }
}
