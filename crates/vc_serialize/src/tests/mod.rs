//! Whole-engine properties, checked on one scene that uses every container
//! family.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use bytes::Bytes;
use vc_reflect::registry::{TypeDescriptor, TypeRegistry};
use vc_reflect::value::{
    AllocatorDescriptor, AllocatorValue, DataPointerValue, DeckValue, HashTableValue, MaterialBinding,
    MaterialBuffer, MaterialValue, SharedValue, SparseSetValue, StreamValue,
};
use vc_reflect::{StructValue, Value};

use crate::custom::CustomTypes;
use crate::instrument::BufferWriter;
use crate::options::WriteOptions;
use crate::ser::serialize;

mod allocation;
mod compat;
mod modes;
mod round_trip;

// -----------------------------------------------------------------------------
// Fixture

fn registry() -> TypeRegistry {
    let mut registry = TypeRegistry::new();
    registry.add(
        TypeDescriptor::new("Vertex")
            .field("position", "float3")
            .field("color", "uint32"),
    );
    registry.add(
        TypeDescriptor::new("Mesh")
            .field("name", "Stream<char>")
            .field("vertices", "Stream<Vertex>")
            .field("indices", "Stream<uint16>"),
    );
    registry.add(TypeDescriptor::new("Item").field("id", "uint32").field("weight", "float"));
    registry.add(TypeDescriptor::new("Padded").field("flag", "uint8").field("value", "double"));
    registry.add(
        TypeDescriptor::new("Scene")
            .field("meshes", "Stream<Mesh>")
            .tagged_field("items", "SparseSet<Item>", "ReferenceKey:items")
            .tagged_field("selected", "Item*", "Reference:items")
            .field("lookup", "HashTable<float, uint32>")
            .field("labels", "HashTable<Padded, Stream<char>, Pairs>")
            .field("history", "Deck<int64>")
            .field("allocator", "AllocatorPolymorphic")
            .field("shared", "ReferenceCounted<Padded>")
            .field("blob", "DataPointer")
            .field("bytes", "Stream<uint8>")
            .field("padded", "ResizableStream<Padded>")
            .field("title", "wchar_t*")
            .field("material", "MaterialAsset"),
    );
    registry.resolve(&CustomTypes).unwrap();
    registry
}

fn vertex(x: f32, color: u32) -> Value {
    StructValue::new("Vertex")
        .with("position", Value::Array(vec![Value::F32(x), Value::F32(-x), Value::F32(0.5)]))
        .with("color", Value::U32(color))
        .into()
}

fn mesh(name: &str, vertices: u32, indices: &[u16]) -> Value {
    StructValue::new("Mesh")
        .with("name", Value::String(String::from(name)))
        .with(
            "vertices",
            Value::Stream((0..vertices).map(|i| vertex(i as f32, 0xFF00_0000 | i)).collect()),
        )
        .with(
            "indices",
            Value::Stream(indices.iter().map(|i| Value::U16(*i)).collect()),
        )
        .into()
}

fn item(id: u32) -> Value {
    StructValue::new("Item")
        .with("id", Value::U32(id))
        .with("weight", Value::F32(id as f32 * 0.25))
        .into()
}

fn padded(flag: u8, value: f64) -> Value {
    StructValue::new("Padded")
        .with("flag", Value::U8(flag))
        .with("value", Value::F64(value))
        .into()
}

fn items() -> SparseSetValue {
    let mut items = SparseSetValue::default();
    let first = items.add(item(1));
    items.add(item(2));
    items.add(item(3));
    items.remove(first);
    items
}

fn lookup(ids: impl IntoIterator<Item = u32>) -> HashTableValue {
    let mut table = HashTableValue::new();
    for id in ids {
        table.insert(Value::U32(id), Value::F32(id as f32 * 0.5));
    }
    table
}

fn material() -> MaterialValue {
    MaterialValue {
        name: String::from("stone"),
        vertex_shader: 1,
        pixel_shader: 2,
        textures: vec![MaterialBinding { slot: 0, handle: 3 }],
        samplers: vec![MaterialBinding {
            slot: 0,
            handle: MaterialValue::NO_HANDLE,
        }],
        buffers: vec![MaterialBuffer {
            slot: 1,
            data: Bytes::from_static(&[7; 16]),
            dynamic: true,
        }],
    }
}

fn scene() -> Value {
    let mut labels = HashTableValue::new();
    labels.insert(Value::String(String::from("north")), padded(1, 1.5));
    labels.insert(Value::String(String::from("south")), padded(2, -3.0));

    let allocator = AllocatorDescriptor::MemoryManager {
        initial: Box::new(AllocatorDescriptor::Linear { capacity: 4096 }),
        backup: Box::new(AllocatorDescriptor::Multipool {
            capacity: 1 << 20,
            pool_count: 8,
        }),
    };

    StructValue::new("Scene")
        .with(
            "meshes",
            Value::Stream(StreamValue::new(vec![
                mesh("quad", 4, &[0, 1, 2, 2, 3, 0]),
                mesh("", 0, &[]),
            ])),
        )
        .with("items", Value::SparseSet(items()))
        .with("selected", Value::Reference(Some(Box::new(item(3)))))
        .with("lookup", Value::HashTable(lookup(0..20)))
        .with("labels", Value::HashTable(labels))
        .with(
            "history",
            Value::Deck(DeckValue::from_items(4, (0..10).map(|i| Value::I64(i * 1000 - 3)))),
        )
        .with("allocator", Value::Allocator(AllocatorValue::Owned(allocator)))
        .with("shared", Value::Shared(SharedValue::new(3, padded(7, -2.25))))
        .with("blob", Value::DataPointer(DataPointerValue::new(9, vec![1_u8, 2, 3, 4, 5])))
        .with("bytes", Value::Bytes(Bytes::from_static(b"payload bytes")))
        .with(
            "padded",
            Value::Stream((0..3).map(|i| padded(i, i as f64 / 3.0)).collect()),
        )
        .with("title", Value::WString("Title".encode_utf16().collect()))
        .with("material", Value::Material(material()))
        .into()
}

/// Serializes `value` of `type_name` with `options`.
fn write_with(registry: &TypeRegistry, type_name: &str, value: &Value, options: &WriteOptions<'_>) -> Bytes {
    let mut out = BufferWriter::new();
    serialize(registry, type_name, value, &mut out, options).unwrap();
    out.into_bytes()
}

fn write_scene(options: &WriteOptions<'_>) -> Bytes {
    write_with(&registry(), "Scene", &scene(), options)
}

/// The values of a sparse set in buffer order.
fn buffer_of(value: &Value) -> Vec<Value> {
    match value {
        Value::SparseSet(set) => set.buffer().to_vec(),
        _ => Vec::new(),
    }
}
