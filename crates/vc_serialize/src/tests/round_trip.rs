use alloc::boxed::Box;
use alloc::string::String;

use vc_reflect::value::{DeckValue, MaterialValue};
use vc_reflect::{StructValue, Value};

use super::{item, lookup, registry, scene, write_scene, write_with};
use crate::custom::CustomTypes;
use crate::de::deserialize;
use crate::error::{WriteError, WriteStatus};
use crate::instrument::{BufferReader, BufferWriter};
use crate::ops::compare_values;
use crate::options::{ReadOptions, WriteOptions};
use crate::passdown::{AssetKind, AssetResolver};
use crate::ser::serialize;

#[test]
fn every_container_survives() {
    let registry = registry();
    let bytes = write_scene(&WriteOptions::default());
    let read = deserialize(&registry, "Scene", &mut BufferReader::new(bytes), &ReadOptions::default()).unwrap();

    assert!(compare_values(&registry, "Scene", &scene(), &read));
    assert_eq!(read, scene());
}

#[test]
fn without_field_table() {
    let registry = registry();
    let mut options = WriteOptions::default();
    options.settings.write_type_table = false;
    let bytes = write_scene(&options);

    let mut read_options = ReadOptions::default();
    read_options.settings.read_type_table = false;
    let read = deserialize(&registry, "Scene", &mut BufferReader::new(bytes), &read_options).unwrap();
    assert_eq!(read, scene());
}

#[test]
fn hash_tables_ignore_insertion_order() {
    let registry = registry();
    let forward = lookup(0..40);
    let backward = lookup((0..40).rev());
    let (forward, backward) = (Value::HashTable(forward), Value::HashTable(backward));
    assert!(compare_values(&registry, "HashTable<float, uint32>", &forward, &backward));

    let with_lookup = |table: &Value| {
        let mut value = scene();
        if let Some(lookup) = value.as_struct_mut().and_then(|s| s.get_mut("lookup")) {
            *lookup = table.clone();
        }
        value
    };
    let read = |table: &Value| {
        let bytes = write_with(&registry, "Scene", &with_lookup(table), &WriteOptions::default());
        deserialize(&registry, "Scene", &mut BufferReader::new(bytes), &ReadOptions::default()).unwrap()
    };
    assert!(compare_values(&registry, "Scene", &read(&forward), &read(&backward)));
}

#[test]
fn decks_keep_their_chunks() {
    let mut registry = vc_reflect::TypeRegistry::new();
    registry.add(vc_reflect::TypeDescriptor::new("Timeline").field("events", "Deck<Stream<char>>"));
    registry.resolve(&CustomTypes).unwrap();

    let events = DeckValue::from_items(
        2,
        ["start", "", "pause", "resume", "stop"]
            .into_iter()
            .map(|name| Value::String(String::from(name))),
    );
    assert_eq!(events.chunk_count(), 3);
    let timeline: Value = StructValue::new("Timeline").with("events", Value::Deck(events)).into();

    let bytes = write_with(&registry, "Timeline", &timeline, &WriteOptions::default());
    let read = deserialize(&registry, "Timeline", &mut BufferReader::new(bytes), &ReadOptions::default()).unwrap();
    assert_eq!(read, timeline);
    let Some(Value::Deck(deck)) = read.as_struct().and_then(|s| s.get("events")) else {
        panic!("events is not a deck");
    };
    assert_eq!(deck.chunk_size(), 2);
}

#[test]
fn references_resolve_into_their_container() {
    let registry = registry();
    let bytes = write_scene(&WriteOptions::default());
    let read = deserialize(&registry, "Scene", &mut BufferReader::new(bytes), &ReadOptions::default()).unwrap();
    let selected = read.as_struct().and_then(|s| s.get("selected"));
    assert_eq!(selected, Some(&Value::Reference(Some(Box::new(item(3))))));

    // The removed item is not in the container any more.
    let mut dangling = scene();
    if let Some(selected) = dangling.as_struct_mut().and_then(|s| s.get_mut("selected")) {
        *selected = Value::Reference(Some(Box::new(item(1))));
    }
    let mut out = BufferWriter::new();
    let err = serialize(&registry, "Scene", &dangling, &mut out, &WriteOptions::default()).unwrap_err();
    assert!(matches!(err, WriteError::UnresolvedReference { .. }));
    assert_eq!(err.status(), WriteStatus::CouldNotOpenOrWrite);
}

/// Maps handles to `"<kind>:<handle>"`, moving every handle by `offset`
/// on the way back.
struct Database {
    offset: u32,
}

impl AssetResolver for Database {
    fn asset_name(&self, kind: AssetKind, handle: u32) -> Option<String> {
        Some(alloc::format!("{kind:?}:{}", handle.checked_sub(self.offset)?))
    }

    fn asset_handle(&self, kind: AssetKind, name: &str) -> Option<u32> {
        let (prefix, handle) = name.split_once(':')?;
        if prefix != alloc::format!("{kind:?}") || handle == "3" {
            // Texture 3 is missing from this database.
            return None;
        }
        Some(handle.parse::<u32>().ok()? + self.offset)
    }
}

#[test]
fn material_handles_travel_as_names() {
    let registry = registry();
    let writer_db = Database { offset: 0 };
    let reader_db = Database { offset: 100 };

    let bytes = write_scene(&WriteOptions {
        asset_resolver: Some(&writer_db),
        ..Default::default()
    });
    let read_options = ReadOptions {
        asset_resolver: Some(&reader_db),
        ..Default::default()
    };
    let read = deserialize(&registry, "Scene", &mut BufferReader::new(bytes), &read_options).unwrap();
    let Some(Value::Material(material)) = read.as_struct().and_then(|s| s.get("material")) else {
        panic!("material is not a material");
    };
    assert_eq!(material.vertex_shader, 101);
    assert_eq!(material.pixel_shader, 102);
    assert_eq!(material.textures[0].handle, MaterialValue::NO_HANDLE);
    assert_eq!(material.samplers[0].handle, MaterialValue::NO_HANDLE);
    assert_eq!(material.buffers, super::material().buffers);
    assert_eq!(material.name, "stone");
}
