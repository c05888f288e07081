use vc_reflect::Value;
use vc_reflect::value::DataPointerValue;

use super::CustomTypeHandler;
use crate::allocator::AllocError;
use crate::de::Deserializer;
use crate::error::{ReadError, WriteError};
use crate::ops::BufferWalker;
use crate::ser::Serializer;

pub(super) const TYPE_NAME: &str = "DataPointer";

pub(super) const VERSION: u8 = 1;

/// A pointer with the tag in its high bits, and the size.
pub(super) const BYTE_SIZE: (usize, usize) = (8, 8);

pub(super) fn write(ser: &mut Serializer<'_, '_>, definition: &str, value: &Value) -> Result<(), WriteError> {
    let Value::DataPointer(pointer) = value else {
        return Err(Serializer::mismatch(definition, value));
    };
    ser.instrument().write_u8(VERSION)?;
    ser.instrument().write_u16(pointer.tag)?;
    ser.write_count(pointer.data.len())?;
    ser.instrument().write(&pointer.data)?;
    Ok(())
}

pub(super) fn read(de: &mut Deserializer<'_, '_>) -> Result<Option<Value>, ReadError> {
    let version = de.instrument().read_u8()?;
    if version != VERSION {
        return Err(ReadError::UnknownVersion {
            handler: CustomTypeHandler::DataPointer.name(),
            version: version as u32,
        });
    }
    let tag = de.instrument().read_u16()?;
    let len = de.read_length(1)?;
    let data = de.read_bytes_payload(len)?;
    Ok(data.map(|data| Value::DataPointer(DataPointerValue { tag, data })))
}

pub(super) fn visit_buffers(walker: &mut BufferWalker<'_, '_>, value: &Value) -> Result<(), AllocError> {
    match value {
        Value::DataPointer(pointer) => walker.charge(pointer.data.len(), 1),
        _ => Ok(()),
    }
}
