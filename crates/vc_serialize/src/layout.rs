//! Raw images of blittable values and default values.
//!
//! The image of a blittable aggregate is its C layout: every field at its
//! recorded offset, little-endian, padding zeroed.

use alloc::string::ToString;
use alloc::vec::Vec;

use vc_reflect::shape::DefinitionShape;
use vc_reflect::{BasicType, ReflectionField, ReflectionType, StreamKind, StructValue, Value};

use crate::custom::CustomTypeHandler;
use crate::definition::{DefinitionInfo, DefinitionResolver, DefinitionTarget, TypeSource};
use crate::error::WriteError;

// -----------------------------------------------------------------------------
// Encode

fn mismatch(definition: &str, value: &Value) -> WriteError {
    WriteError::MismatchedValue {
        definition: definition.to_string(),
        found: value.kind_name(),
    }
}

/// Writes a basic value or fixed basic array into `out`.
fn encode_basic(basic: BasicType, count: usize, array: bool, value: &Value, out: &mut [u8]) -> bool {
    if !array {
        return basic.encode(value, out);
    }
    match value {
        Value::Array(items) if items.len() == count => items
            .iter()
            .zip(out.chunks_exact_mut(basic.byte_size()))
            .all(|(item, chunk)| basic.encode(item, chunk)),
        _ => false,
    }
}

/// Writes the image of `value` into `out`, which is exactly one instance long.
pub(crate) fn encode_image(
    definition: &str,
    info: &DefinitionInfo<'_>,
    value: &Value,
    resolver: &DefinitionResolver<'_>,
    out: &mut [u8],
) -> Result<(), WriteError> {
    match info.target {
        DefinitionTarget::Reflected(ty) => encode_struct(ty, value, resolver, out),
        DefinitionTarget::Fundamental if info.is_blittable => {
            let array = info.stream_kind == StreamKind::BasicTypeArray;
            encode_basic(info.basic_type, info.basic_type_count, array, value, out)
                .then_some(())
                .ok_or_else(|| mismatch(definition, value))
        }
        _ => Err(mismatch(definition, value)),
    }
}

fn encode_struct(
    ty: &ReflectionType,
    value: &Value,
    resolver: &DefinitionResolver<'_>,
    out: &mut [u8],
) -> Result<(), WriteError> {
    let fields = value.as_struct().ok_or_else(|| mismatch(&ty.name, value))?;
    for field in &ty.fields {
        let item = field_value(ty, fields, field)?;
        let start = field.info.pointer_offset;
        let slot = &mut out[start..start + field.info.byte_size];
        if field.is_basic_blittable() {
            let array = field.info.stream_type == StreamKind::BasicTypeArray;
            let info = &field.info;
            if !encode_basic(info.basic_type, info.basic_type_count, array, item, slot) {
                return Err(mismatch(&field.definition, item));
            }
        } else {
            let nested = resolver.resolve(&field.definition);
            encode_image(&field.definition, &nested, item, resolver, slot)?;
        }
    }
    Ok(())
}

pub(crate) fn field_value<'v>(
    ty: &ReflectionType,
    fields: &'v StructValue,
    field: &ReflectionField,
) -> Result<&'v Value, WriteError> {
    fields.get(&field.name).ok_or_else(|| WriteError::MissingField {
        type_name: ty.name.clone(),
        field: field.name.clone(),
    })
}

// -----------------------------------------------------------------------------
// Decode

/// Builds a value from the image in `bytes`, which is one instance long.
///
/// Aggregates come out shaped like the type `resolver` knows, which is the
/// recorded type when reading through a field table.
pub(crate) fn decode_image(
    info: &DefinitionInfo<'_>,
    bytes: &[u8],
    resolver: &DefinitionResolver<'_>,
) -> Value {
    match info.target {
        DefinitionTarget::Reflected(ty) => decode_struct(ty, bytes, resolver),
        _ if info.stream_kind == StreamKind::BasicTypeArray => {
            decode_array(info.basic_type, info.basic_type_count, bytes)
        }
        _ => info.basic_type.decode(bytes),
    }
}

fn decode_array(basic: BasicType, count: usize, bytes: &[u8]) -> Value {
    Value::Array(
        bytes
            .chunks_exact(basic.byte_size())
            .take(count)
            .map(|chunk| basic.decode(chunk))
            .collect(),
    )
}

pub(crate) fn decode_struct(
    ty: &ReflectionType,
    bytes: &[u8],
    resolver: &DefinitionResolver<'_>,
) -> Value {
    let mut value = StructValue::new(ty.name.clone());
    value.fields.reserve(ty.fields.len());
    for field in &ty.fields {
        let start = field.info.pointer_offset;
        let slot = &bytes[start..start + field.info.byte_size];
        let item = if field.is_basic_blittable() {
            match field.info.stream_type {
                StreamKind::BasicTypeArray => {
                    decode_array(field.info.basic_type, field.info.basic_type_count, slot)
                }
                _ => field.info.basic_type.decode(slot),
            }
        } else {
            decode_image(&resolver.resolve(&field.definition), slot, resolver)
        };
        value.fields.push((field.name.clone(), item));
    }
    Value::Struct(value)
}

// -----------------------------------------------------------------------------
// Defaults

/// The value a field takes when nothing was read into it.
pub fn field_default(field: &ReflectionField, source: &dyn TypeSource) -> Value {
    if let Some(value) = &field.info.default_value {
        return value.clone();
    }
    if field.info.stream_type == StreamKind::Pointer && field.has_tag("Reference") {
        return Value::Reference(None);
    }
    default_value(&field.definition, source)
}

/// The zero value of `definition`: zero scalars, null pointers, empty
/// containers, and aggregates of field defaults.
///
/// # Examples
///
/// ```
/// use vc_reflect::registry::{TypeDescriptor, TypeRegistry};
/// use vc_reflect::{StructValue, Value};
/// use vc_serialize::custom::CustomTypes;
/// use vc_serialize::default_value;
///
/// let mut registry = TypeRegistry::new();
/// registry.add(
///     TypeDescriptor::new("Sprite")
///         .field("name", "Stream<char>")
///         .field_with_default("scale", "float", Value::F32(1.0)),
/// );
/// registry.resolve(&CustomTypes).unwrap();
///
/// let expected = StructValue::new("Sprite")
///     .with("name", Value::String(String::new()))
///     .with("scale", Value::F32(1.0));
/// assert_eq!(default_value("Sprite", &registry), expected.into());
/// ```
pub fn default_value(definition: &str, source: &dyn TypeSource) -> Value {
    if let Some(handler) = CustomTypeHandler::find(definition) {
        return handler.default_value(definition, source);
    }
    match DefinitionShape::parse(definition) {
        DefinitionShape::Basic(basic) => basic.zero_value(),
        DefinitionShape::BasicArray { element, count } => {
            Value::Array((0..count).map(|_| element.zero_value()).collect())
        }
        DefinitionShape::Pointer(_) => Value::Pointer(None),
        DefinitionShape::Named(name) => match source.try_get_type(name) {
            Some(ty) => {
                let fields: Vec<_> = ty
                    .fields
                    .iter()
                    .map(|field| (field.name.clone(), field_default(field, source)))
                    .collect();
                Value::Struct(StructValue {
                    type_name: ty.name.clone(),
                    fields,
                })
            }
            None => Value::Struct(StructValue::new(name)),
        },
        DefinitionShape::Template { name, .. } => Value::Struct(StructValue::new(name)),
    }
}
