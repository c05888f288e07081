use bytes::Bytes;
use vc_reflect::registry::TypeRegistry;
use vc_reflect::{TypeDescriptor, Value};

use super::{registry, scene, write_scene, write_with};
use crate::allocator::TrackingAllocator;
use crate::custom::CustomTypes;
use crate::de::{deserialize, ignore_deserialize};
use crate::instrument::BufferReader;
use crate::options::{ReadMode, ReadOptions, ReadSettings, WriteOptions, WriteSettings};
use crate::ser::serialize_size;

fn write_options(settings: WriteSettings) -> WriteOptions<'static> {
    WriteOptions {
        settings,
        ..Default::default()
    }
}

fn settings_grid() -> [(WriteSettings, ReadSettings); 3] {
    let plain = ReadSettings::default();
    [
        (WriteSettings::default(), plain.clone()),
        (
            WriteSettings {
                write_type_table: false,
                ..Default::default()
            },
            ReadSettings {
                read_type_table: false,
                ..plain.clone()
            },
        ),
        (
            WriteSettings {
                legacy_sparse_sets: true,
                write_type_table_tags: true,
                ..Default::default()
            },
            plain,
        ),
    ]
}

#[test]
fn ignore_consumes_what_was_written() {
    let registry = registry();
    for (write, read) in settings_grid() {
        let bytes = write_scene(&write_options(write));
        let allocator = TrackingAllocator::new();
        let options = ReadOptions {
            settings: read,
            field_allocator: &allocator,
            ..Default::default()
        };

        let consumed = ignore_deserialize(&registry, "Scene", &mut BufferReader::new(bytes.clone()), &options).unwrap();
        assert_eq!(consumed, bytes.len());
        assert_eq!(allocator.allocation_count(), 0);

        // Streaming sources skip the same distance.
        #[cfg(feature = "std")]
        {
            let mut reader = crate::instrument::IoReader::new(bytes.as_ref());
            assert_eq!(ignore_deserialize(&registry, "Scene", &mut reader, &options).unwrap(), bytes.len());
        }
    }
}

#[test]
fn ignore_mode_returns_the_default() {
    let registry = registry();
    let bytes = write_scene(&WriteOptions::default());
    let options = ReadOptions {
        mode: ReadMode::Ignore,
        ..Default::default()
    };
    let read = deserialize(&registry, "Scene", &mut BufferReader::new(bytes), &options).unwrap();
    assert_eq!(read, crate::layout::default_value("Scene", &registry));
}

#[test]
fn size_determination_matches_output() {
    let registry = registry();
    for (write, _) in settings_grid() {
        for fast_path in [false, true] {
            let options = write_options(WriteSettings {
                disable_blittable_fast_path: !fast_path,
                ..write.clone()
            });
            let predicted = serialize_size(&registry, "Scene", &scene(), &options).unwrap();
            assert_eq!(predicted, write_scene(&options).len());
        }
    }
}

#[test]
fn fast_path_matches_field_path() {
    let fast = write_scene(&WriteOptions::default());
    let slow = write_scene(&write_options(WriteSettings {
        disable_blittable_fast_path: true,
        ..Default::default()
    }));
    assert_eq!(fast, slow);

    // Padding between `flag` and `value` is written as zeroes on both paths.
    let padded = super::padded(0xAB, 1.0);
    let mut expected = [0_u8; 16];
    expected[0] = 0xAB;
    expected[8..].copy_from_slice(&1.0_f64.to_le_bytes());
    let mut tiny = TypeRegistry::new();
    tiny.add(TypeDescriptor::new("Padded").field("flag", "uint8").field("value", "double"));
    tiny.resolve(&CustomTypes).unwrap();
    for disable in [false, true] {
        let options = write_options(WriteSettings {
            write_type_table: false,
            disable_blittable_fast_path: disable,
            ..Default::default()
        });
        assert_eq!(write_with(&tiny, "Padded", &padded, &options).as_ref(), expected);
    }
}

fn bytes_field(value: &Value) -> Option<&Bytes> {
    match value.as_struct()?.get("bytes")? {
        Value::Bytes(bytes) => Some(bytes),
        _ => None,
    }
}

#[test]
fn materialize_shares_payloads() {
    let registry = registry();
    let source = write_scene(&WriteOptions::default());
    let range = source.as_ptr_range();

    let read = |mode| {
        let options = ReadOptions {
            mode,
            ..Default::default()
        };
        deserialize(&registry, "Scene", &mut BufferReader::new(source.clone()), &options).unwrap()
    };

    let shared = read(ReadMode::Materialize);
    let payload = bytes_field(&shared).unwrap();
    assert_eq!(payload.as_ref(), b"payload bytes");
    assert!(range.contains(&payload.as_ptr()));

    let copied = read(ReadMode::ForceAllocate);
    let payload = bytes_field(&copied).unwrap();
    assert_eq!(payload.as_ref(), b"payload bytes");
    assert!(!range.contains(&payload.as_ptr()));
    assert_eq!(shared, copied);
}
