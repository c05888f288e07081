use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use vc_reflect::registry::{TypeDescriptor, TypeRegistry};
use vc_reflect::value::{DataPointerValue, SharedValue, StreamValue};
use vc_reflect::{StructValue, Value};

use super::{buffer_of, items, registry, write_scene, write_with};
use crate::custom::CustomTypes;
use crate::de::deserialize;
use crate::error::{ReadError, ReadStatus};
use crate::instrument::BufferReader;
use crate::options::{ReadOptions, ReadSettings, WriteOptions, WriteSettings};

fn build(descriptors: impl IntoIterator<Item = TypeDescriptor>) -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    for descriptor in descriptors {
        registry.add(descriptor);
    }
    registry.resolve(&CustomTypes).unwrap();
    registry
}

fn strict() -> ReadOptions<'static> {
    ReadOptions {
        settings: ReadSettings {
            fail_if_field_mismatch: true,
            ..Default::default()
        },
        ..Default::default()
    }
}

#[test]
fn added_field_keeps_its_default() {
    let old = build([TypeDescriptor::new("Sample").field("a", "int").field("b", "int")]);
    let new = build([TypeDescriptor::new("Sample")
        .field("a", "int")
        .field("b", "int")
        .field_with_default("c", "int", Value::I32(7))]);

    let sample: Value = StructValue::new("Sample")
        .with("a", Value::I32(1))
        .with("b", Value::I32(-2))
        .into();
    let bytes = write_with(&old, "Sample", &sample, &WriteOptions::default());

    let read = deserialize(&new, "Sample", &mut BufferReader::new(bytes.clone()), &ReadOptions::default()).unwrap();
    let expected: Value = StructValue::new("Sample")
        .with("a", Value::I32(1))
        .with("b", Value::I32(-2))
        .with("c", Value::I32(7))
        .into();
    assert_eq!(read, expected);

    let err = deserialize(&new, "Sample", &mut BufferReader::new(bytes), &strict()).unwrap_err();
    assert_eq!(err.status(), ReadStatus::FieldTypeMismatch);
}

#[test]
fn drifted_blittable_runs() {
    let old = build([
        TypeDescriptor::new("Cloud").field("points", "Stream<Point>"),
        TypeDescriptor::new("Point").field("position", "float3").field("id", "uint16"),
    ]);
    let new = build([
        TypeDescriptor::new("Cloud").field("points", "Stream<Point>"),
        TypeDescriptor::new("Point")
            .field("id", "uint32")
            .field("position", "float3")
            .field("normal", "float3"),
    ]);

    let point = |version: u32, i: u16| -> Value {
        let position = Value::Array(vec![Value::F32(i as f32); 3]);
        let point = StructValue::new("Point").with("position", position);
        match version {
            0 => point.with("id", Value::U16(i)).into(),
            _ => StructValue::new("Point")
                .with("id", Value::U32(i as u32))
                .with("position", Value::Array(vec![Value::F32(i as f32); 3]))
                .with("normal", Value::Array(vec![Value::F32(0.0); 3]))
                .into(),
        }
    };
    let cloud = |version: u32| -> Value {
        StructValue::new("Cloud")
            .with("points", Value::Stream((0..5).map(|i| point(version, i)).collect()))
            .into()
    };

    let bytes = write_with(&old, "Cloud", &cloud(0), &WriteOptions::default());
    let read = deserialize(&new, "Cloud", &mut BufferReader::new(bytes), &ReadOptions::default()).unwrap();
    assert_eq!(read, cloud(1));
}

#[test]
fn removed_and_retyped_fields() {
    let old = build([TypeDescriptor::new("Stats")
        .field("a", "int16")
        .field("gone", "Stream<char>")
        .field("b", "float")
        .field("scores", "Stream<int>")]);
    let new = build([TypeDescriptor::new("Stats")
        .field("b", "double")
        .field("a", "int")
        .field("scores", "ResizableStream<int64>")]);

    let stats: Value = StructValue::new("Stats")
        .with("a", Value::I16(-5))
        .with("gone", Value::String(String::from("removed")))
        .with("b", Value::F32(0.5))
        .with("scores", Value::Stream(StreamValue::new(vec![Value::I32(3), Value::I32(-9)])))
        .into();
    let bytes = write_with(&old, "Stats", &stats, &WriteOptions::default());

    let read = deserialize(&new, "Stats", &mut BufferReader::new(bytes.clone()), &ReadOptions::default()).unwrap();
    let expected: Value = StructValue::new("Stats")
        .with("b", Value::F64(0.5))
        .with("a", Value::I32(-5))
        .with("scores", Value::Stream(StreamValue::new(vec![Value::I64(3), Value::I64(-9)])))
        .into();
    assert_eq!(read, expected);

    let err = deserialize(&new, "Stats", &mut BufferReader::new(bytes), &strict()).unwrap_err();
    assert!(matches!(err, ReadError::FieldTypeMismatch { .. }));
}

#[test]
fn unknown_handler_versions_fail() {
    let registry = build([TypeDescriptor::new("Blob")
        .field("data", "DataPointer")
        .field("shared", "ReferenceCounted<uint32>")]);
    let blob: Value = StructValue::new("Blob")
        .with("data", Value::DataPointer(DataPointerValue::new(1, vec![0xAA_u8; 3])))
        .with("shared", Value::Shared(SharedValue::new(1, Value::U32(5))))
        .into();
    let options = WriteOptions {
        settings: WriteSettings {
            write_type_table: false,
            ..Default::default()
        },
        ..Default::default()
    };
    let bytes = write_with(&registry, "Blob", &blob, &options);
    let read_options = ReadOptions {
        settings: ReadSettings {
            read_type_table: false,
            ..Default::default()
        },
        ..Default::default()
    };
    assert_eq!(
        deserialize(&registry, "Blob", &mut BufferReader::new(bytes.clone()), &read_options).unwrap(),
        blob
    );

    // `u8` version, `u16` tag, length, three bytes; then the shared value.
    let shared_version = 1 + 2 + 1 + 3;
    for position in [0, shared_version] {
        let mut patched: Vec<u8> = bytes.to_vec();
        patched[position] += 1;
        let err = deserialize(&registry, "Blob", &mut BufferReader::new(patched), &read_options).unwrap_err();
        assert!(matches!(err, ReadError::UnknownVersion { version: 2, .. }));
        assert_eq!(err.status(), ReadStatus::FieldTypeMismatch);
    }
}

#[test]
fn legacy_sparse_sets_renumber_handles() {
    let registry = registry();
    let bytes = write_scene(&WriteOptions {
        settings: WriteSettings {
            legacy_sparse_sets: true,
            ..Default::default()
        },
        ..Default::default()
    });
    let read = deserialize(&registry, "Scene", &mut BufferReader::new(bytes), &ReadOptions::default()).unwrap();
    let read_items = read.as_struct().and_then(|s| s.get("items")).unwrap();
    assert_eq!(buffer_of(read_items), items().buffer());
    let Value::SparseSet(set) = read_items else {
        panic!("items is not a sparse set");
    };
    assert_eq!(set.iter().map(|(handle, _)| handle).collect::<Vec<_>>(), [0, 1]);

    let selected = read.as_struct().and_then(|s| s.get("selected"));
    assert_eq!(selected, Some(&Value::Reference(Some(Box::new(super::item(3))))));
}
