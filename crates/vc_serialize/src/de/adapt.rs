//! Shaping recorded values after the compiled layout.
//!
//! A field keeps its value when its definition did not change. Numeric basic
//! types convert into each other, fixed arrays and streams of them element
//! by element. Any other change resets the field to its default.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use bytes::Bytes;
use vc_reflect::shape::DefinitionShape;
use vc_reflect::value::StreamValue;
use vc_reflect::{BasicType, ReflectionField, ReflectionType, StructValue, Value};

use crate::custom::CustomTypeHandler;
use crate::definition::{DefinitionResolver, DefinitionTarget};
use crate::error::ReadError;
use crate::instrument::ReadInstrument;
use crate::layout::{decode_image, field_default};

/// The two layouts of one read.
///
/// Without a field table both resolvers are the compiled one.
#[derive(Clone, Copy)]
pub(crate) struct Schemas<'s, 'a> {
    pub compiled: &'s DefinitionResolver<'a>,
    pub recorded: &'s DefinitionResolver<'a>,
    pub has_table: bool,
    pub fail_if_mismatch: bool,
}

impl<'s, 'a> Schemas<'s, 'a> {
    /// Returns `true` if the recorded image of `name` is the compiled image.
    pub fn layouts_match(&self, name: &str) -> bool {
        let (Some(recorded), Some(compiled)) = (
            self.recorded.try_get_type(name),
            self.compiled.try_get_type(name),
        ) else {
            return false;
        };
        recorded.byte_size == compiled.byte_size
            && recorded.fields.len() == compiled.fields.len()
            && recorded.fields.iter().zip(&compiled.fields).all(|(r, c)| {
                r.name == c.name
                    && r.definition == c.definition
                    && r.info.pointer_offset == c.info.pointer_offset
                    && r.info.byte_size == c.info.byte_size
                    && r.info.basic_type == c.info.basic_type
                    && r.info.stream_type == c.info.stream_type
                    && r.info.basic_type_count == c.info.basic_type_count
                    && match self.recorded.resolve(&r.definition).target {
                        DefinitionTarget::Reflected(nested) => self.layouts_match(&nested.name),
                        _ => true,
                    }
            })
    }

    /// Decodes one recorded image of `ty` field by field.
    pub fn decode_fields(
        &self,
        ty: &ReflectionType,
        input: &mut dyn ReadInstrument,
    ) -> Result<Value, ReadError> {
        let overlap = || ReadError::Corrupted(alloc::format!("fields of `{}` overlap", ty.name));

        let mut fields = Vec::with_capacity(ty.fields.len());
        let mut cursor = 0;
        for field in &ty.fields {
            let padding = field.info.pointer_offset.checked_sub(cursor).ok_or_else(overlap)?;
            input.ignore(padding)?;

            let info = self.recorded.resolve(&field.definition);
            let value = match info.target {
                DefinitionTarget::Reflected(nested) => self.decode_fields(nested, input)?,
                _ => decode_image(&info, &input.read_vec(field.info.byte_size)?, self.recorded),
            };
            fields.push((field.name.clone(), value));
            cursor = field.info.pointer_offset + field.info.byte_size;
        }
        input.ignore(ty.byte_size.checked_sub(cursor).ok_or_else(overlap)?)?;
        self.adapt_struct(ty, fields)
    }

    /// Turns the fields read for recorded type `recorded` into a value of
    /// the compiled type of the same name.
    pub fn adapt_struct(
        &self,
        recorded: &ReflectionType,
        mut fields: Vec<(String, Value)>,
    ) -> Result<Value, ReadError> {
        let compiled = match self.compiled.try_get_type(&recorded.name) {
            Some(compiled) if self.has_table => compiled,
            _ => {
                return Ok(Value::Struct(StructValue {
                    type_name: recorded.name.clone(),
                    fields,
                }));
            }
        };

        if self.fail_if_mismatch
            && let Some(extra) = recorded.fields.iter().find(|f| compiled.field(&f.name).is_none())
        {
            return Err(mismatch(&compiled.name, &extra.name));
        }

        let mut adapted = Vec::with_capacity(compiled.fields.len());
        for field in &compiled.fields {
            let read = fields.iter().position(|(name, _)| *name == field.name);
            let value = match (read, recorded.field(&field.name)) {
                (Some(position), Some(counterpart)) => {
                    let (_, value) = fields.swap_remove(position);
                    self.adapt_field(&compiled.name, counterpart, field, value)?
                }
                _ if self.fail_if_mismatch => return Err(mismatch(&compiled.name, &field.name)),
                _ => {
                    log::warn!(
                        "field `{}` of `{}` was not recorded, using its default",
                        field.name,
                        compiled.name
                    );
                    field_default(field, self.compiled.source())
                }
            };
            adapted.push((field.name.clone(), value));
        }
        Ok(Value::Struct(StructValue {
            type_name: compiled.name.clone(),
            fields: adapted,
        }))
    }

    /// Converts the value of `recorded` into a value of `compiled`.
    pub fn adapt_field(
        &self,
        type_name: &str,
        recorded: &ReflectionField,
        compiled: &ReflectionField,
        value: Value,
    ) -> Result<Value, ReadError> {
        if recorded.definition.trim() == compiled.definition.trim() {
            return Ok(fit_array(&compiled.definition, value));
        }
        if self.fail_if_mismatch {
            return Err(mismatch(type_name, &compiled.name));
        }
        if let Some(converted) = convert(&recorded.definition, &compiled.definition, &value) {
            log::debug!(
                "converted field `{}` of `{type_name}` from `{}` to `{}`",
                compiled.name,
                recorded.definition,
                compiled.definition
            );
            return Ok(converted);
        }
        log::warn!(
            "field `{}` of `{type_name}` changed from `{}` to `{}`, using its default",
            compiled.name,
            recorded.definition,
            compiled.definition
        );
        Ok(field_default(compiled, self.compiled.source()))
    }
}

fn mismatch(type_name: &str, field: &str) -> ReadError {
    ReadError::FieldTypeMismatch {
        type_name: type_name.to_string(),
        field: field.to_string(),
    }
}

// -----------------------------------------------------------------------------
// Conversions

fn convert(from: &str, to: &str, value: &Value) -> Option<Value> {
    if let (Some(from), Some(to)) = (stream_element(from), stream_element(to)) {
        if from == to {
            // Only the stream kind changed.
            return Some(value.clone());
        }
        let (from, to) = (BasicType::from_name(from)?, BasicType::from_name(to)?);
        let items = stream_items(value)?
            .iter()
            .map(|item| to.convert_from(from, item))
            .collect::<Option<Vec<_>>>()?;
        return Some(stream_value(to, items));
    }

    match (DefinitionShape::parse(from), DefinitionShape::parse(to)) {
        (DefinitionShape::Basic(from), DefinitionShape::Basic(to)) => to.convert_from(from, value),
        (
            DefinitionShape::BasicArray { element: from, .. },
            DefinitionShape::BasicArray { element: to, count },
        ) => {
            let Value::Array(items) = value else {
                return None;
            };
            let mut converted = items
                .iter()
                .take(count)
                .map(|item| to.convert_from(from, item))
                .collect::<Option<Vec<_>>>()?;
            converted.resize_with(count, || to.zero_value());
            Some(Value::Array(converted))
        }
        _ => None,
    }
}

/// Pads or cuts a basic array to the element count of `definition`.
fn fit_array(definition: &str, value: Value) -> Value {
    match (DefinitionShape::parse(definition), value) {
        (DefinitionShape::BasicArray { element, count }, Value::Array(mut items)) => {
            items.truncate(count);
            items.resize_with(count, || element.zero_value());
            Value::Array(items)
        }
        (_, value) => value,
    }
}

fn stream_element(definition: &str) -> Option<&str> {
    CustomTypeHandler::Stream.stream_element(definition)
}

fn stream_items(value: &Value) -> Option<Vec<Value>> {
    Some(match value {
        Value::Stream(stream) => stream.items.clone(),
        Value::String(text) => text.bytes().map(|byte| Value::I8(byte as i8)).collect(),
        Value::WString(units) => units.iter().map(|unit| Value::U16(*unit)).collect(),
        Value::Bytes(bytes) => bytes.iter().map(|byte| Value::U8(*byte)).collect(),
        _ => return None,
    })
}

/// Builds the value a stream of `element` holds.
fn stream_value(element: BasicType, items: Vec<Value>) -> Value {
    match element {
        BasicType::Char => {
            let bytes: Vec<u8> = items
                .iter()
                .map(|item| match item {
                    Value::I8(c) => *c as u8,
                    _ => 0,
                })
                .collect();
            match String::from_utf8(bytes) {
                Ok(text) => Value::String(text),
                Err(_) => Value::Stream(StreamValue::new(items)),
            }
        }
        BasicType::WChar => Value::WString(
            items
                .iter()
                .map(|item| match item {
                    Value::U16(unit) => *unit,
                    _ => 0,
                })
                .collect(),
        ),
        BasicType::UInt8 => Value::Bytes(Bytes::from(
            items
                .iter()
                .map(|item| match item {
                    Value::U8(byte) => *byte,
                    _ => 0,
                })
                .collect::<Vec<u8>>(),
        )),
        _ => Value::Stream(StreamValue::new(items)),
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::String;
    use alloc::vec;

    use vc_reflect::Value;
    use vc_reflect::value::StreamValue;

    use super::{convert, fit_array};

    #[test]
    fn numeric_conversions() {
        assert_eq!(convert("int16", "int32", &Value::I16(-3)), Some(Value::I32(-3)));
        assert_eq!(convert("float", "double", &Value::F32(0.5)), Some(Value::F64(0.5)));
        assert_eq!(convert("int", "Stream<int>", &Value::I32(1)), None);
    }

    #[test]
    fn arrays_truncate_and_fill() {
        let value = Value::Array(vec![Value::U8(1), Value::U8(2), Value::U8(3)]);
        assert_eq!(
            convert("uint8[3]", "uint16[2]", &value),
            Some(Value::Array(vec![Value::U16(1), Value::U16(2)]))
        );
        assert_eq!(
            convert("uint8[3]", "uint8[4]", &value),
            Some(Value::Array(vec![Value::U8(1), Value::U8(2), Value::U8(3), Value::U8(0)]))
        );
    }

    #[test]
    fn short_arrays_fill_to_the_compiled_count() {
        let short = Value::Array(vec![Value::I32(5)]);
        assert_eq!(
            fit_array("int32[3]", short),
            Value::Array(vec![Value::I32(5), Value::I32(0), Value::I32(0)])
        );
        let long = Value::Array(vec![Value::I8(1), Value::I8(2)]);
        assert_eq!(fit_array("int8[1]", long), Value::Array(vec![Value::I8(1)]));
        assert_eq!(fit_array("int32", Value::I32(9)), Value::I32(9));
    }

    #[test]
    fn streams_convert_elements() {
        let value = Value::Stream(StreamValue::new(vec![Value::I32(7), Value::I32(-1)]));
        assert_eq!(
            convert("Stream<int>", "ResizableStream<int64>", &value),
            Some(Value::Stream(StreamValue::new(vec![Value::I64(7), Value::I64(-1)])))
        );
        let text = Value::String(String::from("abc"));
        assert_eq!(convert("Stream<char>", "CapacityStream<char>", &text), Some(text.clone()));
        assert_eq!(convert("Stream<char>", "Stream<Name>", &text), None);
    }
}
