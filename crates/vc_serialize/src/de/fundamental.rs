use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;

use vc_reflect::shape::DefinitionShape;
use vc_reflect::{BasicType, ReflectionField, StreamKind, Value};

use super::Deserializer;
use crate::definition::DefinitionInfo;
use crate::error::ReadError;

impl<'s, 'a> Deserializer<'s, 'a> {
    /// Reads a basic value, a fixed basic array or a pointer.
    pub(crate) fn read_fundamental(
        &mut self,
        definition: &str,
        info: &DefinitionInfo<'a>,
        field: Option<&ReflectionField>,
    ) -> Result<Option<Value>, ReadError> {
        match info.stream_kind {
            StreamKind::Basic => {
                let size = info.basic_type.byte_size();
                if self.is_ignoring() {
                    self.instrument().ignore(size)?;
                    return Ok(None);
                }
                let bytes = self.instrument().read_vec(size)?;
                Ok(Some(info.basic_type.decode(&bytes)))
            }
            StreamKind::BasicTypeArray => self.read_basic_array(info),
            StreamKind::Pointer => {
                let DefinitionShape::Pointer(pointee) = DefinitionShape::parse(definition.trim()) else {
                    return Err(self.corrupted("pointer definition without a pointee"));
                };
                match field.and_then(|field| field.tag_argument("Reference")) {
                    Some(key) => self.read_reference(key),
                    None => self.read_pointer(pointee, info.basic_type),
                }
            }
            _ => Err(self.unknown(definition)),
        }
    }

    /// Reads up to the declared element count; surplus recorded elements
    /// are skipped. Missing ones are zero, filled here when the compiled
    /// layout is the declared one and by field adaptation otherwise.
    fn read_basic_array(&mut self, info: &DefinitionInfo<'a>) -> Result<Option<Value>, ReadError> {
        let element = info.basic_type;
        let size = element.byte_size();
        let count = self.read_length(size)?;
        if self.is_ignoring() {
            self.instrument().ignore(count * size)?;
            return Ok(None);
        }

        let kept = count.min(info.basic_type_count);
        let bytes = self.instrument().read_vec(kept * size)?;
        self.instrument().ignore((count - kept) * size)?;

        let mut items: Vec<Value> = bytes.chunks_exact(size.max(1)).map(|chunk| element.decode(chunk)).collect();
        if !self.has_table() {
            items.resize_with(info.basic_type_count, || element.zero_value());
        }
        Ok(Some(Value::Array(items)))
    }

    fn read_reference(&mut self, key: &str) -> Result<Option<Value>, ReadError> {
        let token = self.instrument().read_varint()?;
        if self.is_ignoring() {
            return Ok(None);
        }
        if token == 0 {
            return Ok(Some(Value::Reference(None)));
        }
        let element = u32::try_from(token - 1)
            .ok()
            .and_then(|token| self.passdown().element(key, token))
            .cloned();
        match element {
            Some(element) => Ok(Some(Value::Reference(Some(Box::new(element))))),
            None => Err(self.corrupted("reference token does not resolve")),
        }
    }

    fn read_pointer(&mut self, pointee: &str, basic: BasicType) -> Result<Option<Value>, ReadError> {
        match basic {
            BasicType::Char => {
                let len = self.read_length(1)?;
                if len == 0 || self.is_ignoring() {
                    self.instrument().ignore(len)?;
                    return Ok((!self.is_ignoring()).then_some(Value::Pointer(None)));
                }
                let bytes = self.instrument().read_vec(len - 1)?;
                self.instrument().ignore(1)?;
                match String::from_utf8(bytes) {
                    Ok(text) => Ok(Some(Value::String(text))),
                    Err(_) => Err(self.corrupted("string is not UTF-8")),
                }
            }
            BasicType::WChar => {
                let len = self.read_length(2)?;
                if len == 0 || self.is_ignoring() {
                    self.instrument().ignore(len * 2)?;
                    return Ok((!self.is_ignoring()).then_some(Value::Pointer(None)));
                }
                let bytes = self.instrument().read_vec((len - 1) * 2)?;
                self.instrument().ignore(2)?;
                let units = bytes
                    .chunks_exact(2)
                    .map(|unit| u16::from_le_bytes([unit[0], unit[1]]))
                    .collect();
                Ok(Some(Value::WString(units)))
            }
            _ => match self.instrument().read_varint()? {
                0 => Ok((!self.is_ignoring()).then_some(Value::Pointer(None))),
                1 => {
                    let value = self.read_value(pointee, None)?;
                    Ok(value.map(|value| Value::Pointer(Some(Box::new(value)))))
                }
                _ => Err(self.corrupted("pointer marker is neither 0 nor 1")),
            },
        }
    }
}
