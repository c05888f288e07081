use alloc::boxed::Box;

use vc_reflect::value::{AllocatorDescriptor, AllocatorKind, AllocatorValue};
use vc_reflect::{ReflectionField, Value};

use crate::allocator::AllocError;
use crate::de::Deserializer;
use crate::error::{ReadError, WriteError};
use crate::ops::BufferWalker;
use crate::ser::Serializer;

const POLYMORPHIC: &str = "AllocatorPolymorphic";

/// Field tag binding the field to the reader's allocator.
const REFERENCE_TAG: &str = "ReferenceAllocator";

/// Kind tag of a polymorphic allocator holding nothing.
const EMPTY_TAG: u8 = 0xFF;

/// Deepest descriptor nesting accepted on read.
const MAX_DEPTH: usize = 8;

/// `None` for the polymorphic handle.
pub(super) fn parse(definition: &str) -> Option<Option<AllocatorKind>> {
    if definition == POLYMORPHIC {
        return Some(None);
    }
    AllocatorKind::from_type_name(definition).map(Some)
}

pub(super) fn byte_size(definition: &str) -> Option<(usize, usize)> {
    let size = match parse(definition)? {
        None => 16,
        Some(AllocatorKind::Linear) => 32,
        Some(AllocatorKind::Stack) => 40,
        Some(AllocatorKind::Multipool) => 64,
        Some(AllocatorKind::MemoryManager) => 96,
        Some(AllocatorKind::MemoryArena) => 80,
        Some(AllocatorKind::ResizableLinear) => 56,
    };
    Some((size, 8))
}

fn zeroed(kind: AllocatorKind) -> AllocatorDescriptor {
    match kind {
        AllocatorKind::Linear => AllocatorDescriptor::Linear { capacity: 0 },
        AllocatorKind::Stack => AllocatorDescriptor::Stack { capacity: 0 },
        AllocatorKind::Multipool => AllocatorDescriptor::Multipool {
            capacity: 0,
            pool_count: 0,
        },
        AllocatorKind::MemoryManager => AllocatorDescriptor::MemoryManager {
            initial: Box::new(AllocatorDescriptor::Linear { capacity: 0 }),
            backup: Box::new(AllocatorDescriptor::Linear { capacity: 0 }),
        },
        AllocatorKind::MemoryArena => AllocatorDescriptor::MemoryArena {
            allocator_count: 0,
            block_count: 0,
            base: Box::new(AllocatorDescriptor::Linear { capacity: 0 }),
        },
        AllocatorKind::ResizableLinear => AllocatorDescriptor::ResizableLinear {
            initial_capacity: 0,
            backup_capacity: 0,
        },
    }
}

pub(super) fn default_value(definition: &str) -> Value {
    match parse(definition) {
        Some(Some(kind)) => Value::Allocator(AllocatorValue::Owned(zeroed(kind))),
        _ => Value::Allocator(AllocatorValue::Empty),
    }
}

fn is_reference(field: Option<&ReflectionField>) -> bool {
    field.is_some_and(|field| field.has_tag(REFERENCE_TAG))
}

// -----------------------------------------------------------------------------
// Write

pub(super) fn write(
    ser: &mut Serializer<'_, '_>,
    definition: &str,
    field: Option<&ReflectionField>,
    value: &Value,
) -> Result<(), WriteError> {
    if is_reference(field) {
        return Ok(());
    }
    let (Some(kind), Value::Allocator(allocator)) = (parse(definition), value) else {
        return Err(Serializer::mismatch(definition, value));
    };
    match (kind, allocator) {
        (None, AllocatorValue::Empty | AllocatorValue::Borrowed) => {
            ser.instrument().write_u8(EMPTY_TAG)?;
            Ok(())
        }
        (None, AllocatorValue::Owned(descriptor)) => write_descriptor(ser, descriptor),
        (Some(kind), AllocatorValue::Owned(descriptor)) if descriptor.kind() == kind => {
            write_descriptor(ser, descriptor)
        }
        _ => Err(Serializer::mismatch(definition, value)),
    }
}

fn write_descriptor(
    ser: &mut Serializer<'_, '_>,
    descriptor: &AllocatorDescriptor,
) -> Result<(), WriteError> {
    ser.instrument().write_u8(descriptor.kind() as u8)?;
    match descriptor {
        AllocatorDescriptor::Linear { capacity } | AllocatorDescriptor::Stack { capacity } => {
            ser.instrument().write_u64(*capacity)?;
        }
        AllocatorDescriptor::Multipool {
            capacity,
            pool_count,
        } => {
            ser.instrument().write_u64(*capacity)?;
            ser.instrument().write_u32(*pool_count)?;
        }
        AllocatorDescriptor::MemoryManager { initial, backup } => {
            write_descriptor(ser, initial)?;
            write_descriptor(ser, backup)?;
        }
        AllocatorDescriptor::MemoryArena {
            allocator_count,
            block_count,
            base,
        } => {
            ser.instrument().write_u32(*allocator_count)?;
            ser.instrument().write_u32(*block_count)?;
            write_descriptor(ser, base)?;
        }
        AllocatorDescriptor::ResizableLinear {
            initial_capacity,
            backup_capacity,
        } => {
            ser.instrument().write_u64(*initial_capacity)?;
            ser.instrument().write_u64(*backup_capacity)?;
        }
    }
    Ok(())
}

// -----------------------------------------------------------------------------
// Read

pub(super) fn read(
    de: &mut Deserializer<'_, '_>,
    definition: &str,
    field: Option<&ReflectionField>,
) -> Result<Option<Value>, ReadError> {
    if is_reference(field) {
        return Ok((!de.is_ignoring()).then_some(Value::Allocator(AllocatorValue::Borrowed)));
    }
    let Some(expected) = parse(definition) else {
        return Err(de.corrupted("unknown allocator definition"));
    };

    let tag = de.instrument().read_u8()?;
    let allocator = if tag == EMPTY_TAG {
        if expected.is_some() {
            return Err(de.corrupted("concrete allocator recorded as empty"));
        }
        AllocatorValue::Empty
    } else {
        let descriptor = read_descriptor(de, tag, 0)?;
        if expected.is_some_and(|kind| kind != descriptor.kind()) {
            return Err(de.corrupted("allocator kind does not match its field"));
        }
        AllocatorValue::Owned(descriptor)
    };
    Ok((!de.is_ignoring()).then_some(Value::Allocator(allocator)))
}

fn read_descriptor(
    de: &mut Deserializer<'_, '_>,
    tag: u8,
    depth: usize,
) -> Result<AllocatorDescriptor, ReadError> {
    if depth >= MAX_DEPTH {
        return Err(de.corrupted("allocator descriptors nest too deep"));
    }
    let Some(kind) = AllocatorKind::from_u8(tag) else {
        return Err(de.corrupted("unknown allocator kind"));
    };
    Ok(match kind {
        AllocatorKind::Linear => AllocatorDescriptor::Linear {
            capacity: de.instrument().read_u64()?,
        },
        AllocatorKind::Stack => AllocatorDescriptor::Stack {
            capacity: de.instrument().read_u64()?,
        },
        AllocatorKind::Multipool => AllocatorDescriptor::Multipool {
            capacity: de.instrument().read_u64()?,
            pool_count: de.instrument().read_u32()?,
        },
        AllocatorKind::ResizableLinear => AllocatorDescriptor::ResizableLinear {
            initial_capacity: de.instrument().read_u64()?,
            backup_capacity: de.instrument().read_u64()?,
        },
        AllocatorKind::MemoryManager => AllocatorDescriptor::MemoryManager {
            initial: nested(de, depth)?,
            backup: nested(de, depth)?,
        },
        AllocatorKind::MemoryArena => AllocatorDescriptor::MemoryArena {
            allocator_count: de.instrument().read_u32()?,
            block_count: de.instrument().read_u32()?,
            base: nested(de, depth)?,
        },
    })
}

fn nested(de: &mut Deserializer<'_, '_>, depth: usize) -> Result<Box<AllocatorDescriptor>, ReadError> {
    let tag = de.instrument().read_u8()?;
    read_descriptor(de, tag, depth + 1).map(Box::new)
}

// -----------------------------------------------------------------------------
// Buffers

pub(super) fn visit_buffers(walker: &mut BufferWalker<'_, '_>, value: &Value) -> Result<(), AllocError> {
    match value {
        Value::Allocator(AllocatorValue::Owned(descriptor)) => {
            let bytes = usize::try_from(descriptor.reserved_bytes()).unwrap_or(usize::MAX);
            walker.charge(bytes, 8)
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::{byte_size, default_value, parse};
    use vc_reflect::Value;
    use vc_reflect::value::{AllocatorKind, AllocatorValue};

    #[test]
    fn definitions() {
        assert_eq!(parse("AllocatorPolymorphic"), Some(None));
        assert_eq!(parse("MemoryArena"), Some(Some(AllocatorKind::MemoryArena)));
        assert_eq!(parse("Allocator"), None);
        assert_eq!(byte_size("ResizableLinearAllocator"), Some((56, 8)));
        assert_eq!(default_value("AllocatorPolymorphic"), Value::Allocator(AllocatorValue::Empty));
        assert!(matches!(
            default_value("StackAllocator"),
            Value::Allocator(AllocatorValue::Owned(descriptor)) if descriptor.kind() == AllocatorKind::Stack
        ));
    }
}
