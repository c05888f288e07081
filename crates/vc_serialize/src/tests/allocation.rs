use vc_reflect::registry::{TypeDescriptor, TypeRegistry};
use vc_reflect::value::StreamValue;
use vc_reflect::{StructValue, Value};

use super::{registry, scene, write_scene, write_with};
use crate::allocator::TrackingAllocator;
use crate::custom::CustomTypes;
use crate::de::deserialize;
use crate::error::{ReadError, ReadStatus};
use crate::instrument::BufferReader;
use crate::ops::{copy_value, deallocate_value};
use crate::options::{CopyOptions, DeallocateOptions, ReadOptions, ReadSettings, WriteOptions};

#[test]
fn deallocate_returns_what_a_read_charged() {
    let registry = registry();
    let bytes = write_scene(&WriteOptions::default());
    for native in [false, true] {
        let allocator = TrackingAllocator::new();
        let options = ReadOptions {
            settings: ReadSettings {
                use_container_native_allocator: native,
                ..Default::default()
            },
            field_allocator: &allocator,
            ..Default::default()
        };
        let read = deserialize(&registry, "Scene", &mut BufferReader::new(bytes.clone()), &options).unwrap();
        assert!(allocator.live_bytes() > 0);

        deallocate_value(&registry, "Scene", &read, &allocator, DeallocateOptions::from(&options.settings));
        assert_eq!(allocator.live_bytes(), 0);
    }
}

#[test]
fn native_containers_are_not_charged() {
    let mut registry = TypeRegistry::new();
    registry.add(
        TypeDescriptor::new("Buffers")
            .field("fixed", "Stream<uint32>")
            .field("growing", "ResizableStream<uint32>"),
    );
    registry.resolve(&CustomTypes).unwrap();

    let ids = || Value::Stream((0..8).map(Value::U32).collect::<StreamValue>());
    let buffers: Value = StructValue::new("Buffers")
        .with("fixed", ids())
        .with("growing", ids())
        .into();
    let bytes = write_with(&registry, "Buffers", &buffers, &WriteOptions::default());

    let charged = |native| {
        let allocator = TrackingAllocator::new();
        let mut options = ReadOptions {
            field_allocator: &allocator,
            ..Default::default()
        };
        options.settings.use_container_native_allocator = native;
        deserialize(&registry, "Buffers", &mut BufferReader::new(bytes.clone()), &options).unwrap();
        allocator.live_bytes()
    };
    assert_eq!(charged(false), 2 * 8 * 4);
    assert_eq!(charged(true), 8 * 4);
}

#[test]
fn failed_reads_keep_nothing() {
    let registry = registry();
    let bytes = write_scene(&WriteOptions::default());

    let allocator = TrackingAllocator::with_limit(64);
    let options = ReadOptions {
        field_allocator: &allocator,
        ..Default::default()
    };
    let err = deserialize(&registry, "Scene", &mut BufferReader::new(bytes.clone()), &options).unwrap_err();
    assert!(matches!(err, ReadError::AllocationFailed(_)));
    assert_eq!(err.status(), ReadStatus::CouldNotOpenOrRead);
    assert_eq!(allocator.live_bytes(), 0);

    let unlimited = TrackingAllocator::new();
    let options = ReadOptions {
        field_allocator: &unlimited,
        ..Default::default()
    };
    for len in [0, 10, bytes.len() / 2, bytes.len() - 1] {
        let err = deserialize(&registry, "Scene", &mut BufferReader::new(bytes.slice(..len)), &options).unwrap_err();
        assert_eq!(err.status(), ReadStatus::CorruptedFile, "truncated to {len} bytes");
        assert_eq!(unlimited.allocation_count(), 0);
    }
}

#[test]
fn copies_match_reads() {
    let registry = registry();
    let bytes = write_scene(&WriteOptions::default());

    let read_allocator = TrackingAllocator::new();
    let options = ReadOptions {
        field_allocator: &read_allocator,
        ..Default::default()
    };
    let read = deserialize(&registry, "Scene", &mut BufferReader::new(bytes), &options).unwrap();

    let copy_allocator = TrackingAllocator::new();
    let mut copy = crate::layout::default_value("Scene", &registry);
    let copy_options = CopyOptions {
        overwrite_allocators: true,
        ..Default::default()
    };
    copy_value(&registry, "Scene", &scene(), &mut copy, &copy_allocator, copy_options).unwrap();
    assert_eq!(copy, read);
    assert_eq!(copy_allocator.live_bytes(), read_allocator.live_bytes());
}
