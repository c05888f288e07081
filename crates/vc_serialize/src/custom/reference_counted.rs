use vc_reflect::Value;
use vc_reflect::value::SharedValue;
use vc_utils::num::align_up;

use super::{CustomTypeHandler, template_of};
use crate::allocator::AllocError;
use crate::de::Deserializer;
use crate::definition::{TypeSource, definition_layout};
use crate::error::{ReadError, WriteError};
use crate::layout;
use crate::ops::{BufferWalker, Comparer};
use crate::ser::Serializer;

pub(super) const VERSION: u8 = 1;

pub(super) fn parse(definition: &str) -> Option<&str> {
    template_of(definition, &["ReferenceCounted"], 1..=1).map(|(_, arguments)| arguments[0])
}

/// The payload followed by a `u32` count.
pub(super) fn byte_size(definition: &str, source: &dyn TypeSource) -> Option<(usize, usize)> {
    let (size, align) = definition_layout(parse(definition)?, source)?;
    let align = align.max(4);
    Some((align_up(size + 4, align), align))
}

pub(super) fn default_value(definition: &str, source: &dyn TypeSource) -> Value {
    let payload = parse(definition).map_or(Value::Pointer(None), |inner| {
        layout::default_value(inner, source)
    });
    Value::Shared(SharedValue::new(0, payload))
}

pub(super) fn write(ser: &mut Serializer<'_, '_>, definition: &str, value: &Value) -> Result<(), WriteError> {
    let (Some(inner), Value::Shared(shared)) = (parse(definition), value) else {
        return Err(Serializer::mismatch(definition, value));
    };
    ser.instrument().write_u8(VERSION)?;
    ser.instrument().write_u32(shared.reference_count)?;
    ser.write_value(inner, None, &shared.value)
}

pub(super) fn read(de: &mut Deserializer<'_, '_>, definition: &str) -> Result<Option<Value>, ReadError> {
    let Some(inner) = parse(definition) else {
        return Err(de.corrupted("reference counted definition without a payload"));
    };
    let version = de.instrument().read_u8()?;
    if version != VERSION {
        return Err(ReadError::UnknownVersion {
            handler: CustomTypeHandler::ReferenceCounted.name(),
            version: version as u32,
        });
    }
    let reference_count = de.instrument().read_u32()?;
    let payload = de.read_value(inner, None)?;
    Ok(payload.map(|payload| Value::Shared(SharedValue::new(reference_count, payload))))
}

pub(super) fn visit_buffers(
    walker: &mut BufferWalker<'_, '_>,
    definition: &str,
    value: &Value,
) -> Result<(), AllocError> {
    match (parse(definition), value) {
        (Some(inner), Value::Shared(shared)) => walker.value(inner, &shared.value),
        _ => Ok(()),
    }
}

pub(super) fn compare(cmp: &Comparer<'_, '_>, definition: &str, a: &Value, b: &Value) -> bool {
    match (parse(definition), a, b) {
        (Some(inner), Value::Shared(a), Value::Shared(b)) => {
            a.reference_count == b.reference_count && cmp.values(inner, &a.value, &b.value)
        }
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use vc_reflect::registry::TypeRegistry;
    use vc_reflect::Value;
    use vc_reflect::value::SharedValue;

    use super::{byte_size, default_value};

    #[test]
    fn count_follows_payload() {
        let registry = TypeRegistry::new();
        assert_eq!(byte_size("ReferenceCounted<uint8>", &registry), Some((8, 4)));
        assert_eq!(byte_size("ReferenceCounted<double3>", &registry), Some((32, 8)));
        assert_eq!(byte_size("ReferenceCounted<Missing>", &registry), None);
        assert_eq!(
            default_value("ReferenceCounted<int>", &registry),
            Value::Shared(SharedValue::new(0, Value::I32(0)))
        );
    }
}
