use alloc::string::ToString;
use alloc::vec;
use alloc::vec::Vec;

use vc_reflect::shape::DefinitionShape;
use vc_reflect::{BasicType, ReflectionField, StreamKind, Value};

use super::Serializer;
use crate::definition::DefinitionInfo;
use crate::error::WriteError;

impl<'s, 'a> Serializer<'s, 'a> {
    /// Writes a basic value, a fixed basic array or a pointer.
    pub(crate) fn write_fundamental(
        &mut self,
        definition: &str,
        info: &DefinitionInfo<'a>,
        field: Option<&ReflectionField>,
        value: &Value,
    ) -> Result<(), WriteError> {
        match info.stream_kind {
            StreamKind::Basic => {
                let mut out = vec![0_u8; info.basic_type.byte_size()];
                if !info.basic_type.encode(value, &mut out) {
                    return Err(Self::mismatch(definition, value));
                }
                self.instrument().write(&out)?;
                Ok(())
            }
            StreamKind::BasicTypeArray => self.write_basic_array(definition, info, value),
            StreamKind::Pointer => {
                let DefinitionShape::Pointer(pointee) = DefinitionShape::parse(definition.trim()) else {
                    return Err(Self::mismatch(definition, value));
                };
                match field.and_then(|field| field.tag_argument("Reference")) {
                    Some(key) => self.write_reference(key, definition, value),
                    None => self.write_pointer(definition, pointee, info.basic_type, value),
                }
            }
            _ => Err(WriteError::UnknownType(definition.to_string())),
        }
    }

    fn write_basic_array(
        &mut self,
        definition: &str,
        info: &DefinitionInfo<'a>,
        value: &Value,
    ) -> Result<(), WriteError> {
        let Value::Array(items) = value else {
            return Err(Self::mismatch(definition, value));
        };
        let element = info.basic_type;
        let size = element.byte_size();
        let mut out = vec![0_u8; items.len() * size];
        for (item, chunk) in items.iter().zip(out.chunks_exact_mut(size.max(1))) {
            if !element.encode(item, chunk) {
                return Err(Self::mismatch(definition, item));
            }
        }
        self.write_count(items.len())?;
        self.instrument().write(&out)?;
        Ok(())
    }

    fn write_reference(&mut self, key: &str, definition: &str, value: &Value) -> Result<(), WriteError> {
        let token = match value {
            Value::Reference(None) => 0,
            Value::Reference(Some(element)) => {
                let token = self.passdown().find_token(key, element).map_err(|reason| {
                    WriteError::UnresolvedReference {
                        key: key.to_string(),
                        reason,
                    }
                })?;
                token as u64 + 1
            }
            _ => return Err(Self::mismatch(definition, value)),
        };
        self.instrument().write_varint(token)?;
        Ok(())
    }

    fn write_pointer(
        &mut self,
        definition: &str,
        pointee: &str,
        basic: BasicType,
        value: &Value,
    ) -> Result<(), WriteError> {
        match (basic, value) {
            (_, Value::Pointer(None)) => self.write_count(0),
            (BasicType::Char, Value::String(text)) => {
                self.write_count(text.len() + 1)?;
                self.instrument().write(text.as_bytes())?;
                self.instrument().write_u8(0)?;
                Ok(())
            }
            (BasicType::WChar, Value::WString(units)) => {
                self.write_count(units.len() + 1)?;
                let bytes: Vec<u8> = units.iter().flat_map(|unit| unit.to_le_bytes()).collect();
                self.instrument().write(&bytes)?;
                self.instrument().write_u16(0)?;
                Ok(())
            }
            (BasicType::Char | BasicType::WChar, Value::Pointer(Some(inner))) => {
                self.write_pointer(definition, pointee, basic, inner)
            }
            (_, Value::Pointer(Some(inner))) => {
                self.write_count(1)?;
                self.write_value(pointee, None, inner)
            }
            _ => Err(Self::mismatch(definition, value)),
        }
    }
}
