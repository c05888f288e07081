//! Reflection-driven binary serialization.
//!
//! Values described by a [`TypeRegistry`](vc_reflect::TypeRegistry) are
//! written depth-first through a [`WriteInstrument`](instrument::WriteInstrument)
//! and read back through a [`ReadInstrument`](instrument::ReadInstrument).
//!
//! - Blittable aggregates travel as their memory image, in one block per run.
//! - Built-in containers (streams, sparse sets, hash tables, decks, allocator
//!   descriptors, ...) are handled by the [`custom`] handlers.
//! - An optional [`FieldTable`] records the layout the data was written with,
//!   so that builds with a changed layout can still read it.
//! - Reads can materialize, skip ([`ReadMode::Ignore`]) or copy every payload
//!   ([`ReadMode::ForceAllocate`]); materialized buffers are charged to an
//!   [`Allocator`].
//!
//! # Examples
//!
//! ```
//! use vc_reflect::registry::{TypeDescriptor, TypeRegistry};
//! use vc_reflect::value::SparseSetValue;
//! use vc_reflect::{StructValue, Value};
//! use vc_serialize::custom::CustomTypes;
//! use vc_serialize::instrument::{BufferReader, BufferWriter};
//! use vc_serialize::{compare_values, deserialize, serialize};
//!
//! let mut registry = TypeRegistry::new();
//! registry.add(
//!     TypeDescriptor::new("Squad")
//!         .field("name", "Stream<char>")
//!         .field("units", "SparseSet<Unit>"),
//! );
//! registry.add(TypeDescriptor::new("Unit").field("health", "float").field("level", "uint8"));
//! registry.resolve(&CustomTypes).unwrap();
//!
//! let unit = |health: f32| {
//!     Value::Struct(StructValue::new("Unit").with("health", Value::F32(health)).with("level", Value::U8(1)))
//! };
//! let mut units = SparseSetValue::default();
//! let first = units.add(unit(10.0));
//! units.add(unit(20.0));
//! units.remove(first);
//!
//! let squad = Value::Struct(
//!     StructValue::new("Squad")
//!         .with("name", Value::String("Red".into()))
//!         .with("units", Value::SparseSet(units)),
//! );
//!
//! let mut out = BufferWriter::new();
//! serialize(&registry, "Squad", &squad, &mut out, &Default::default()).unwrap();
//! let read = deserialize(&registry, "Squad", &mut BufferReader::new(out.into_bytes()), &Default::default()).unwrap();
//! assert!(compare_values(&registry, "Squad", &squad, &read));
//! ```
#![cfg_attr(docsrs, feature(doc_cfg))]
#![no_std]

// -----------------------------------------------------------------------------
// no_std support

#[cfg(feature = "std")]
extern crate std;

extern crate alloc;

// -----------------------------------------------------------------------------
// Modules

pub mod custom;
pub mod definition;
pub mod instrument;
pub mod passdown;

mod allocator;
mod de;
mod dependencies;
mod error;
mod field_table;
mod layout;
mod ops;
mod options;
mod ser;

#[cfg(all(debug_assertions, feature = "debug"))]
mod stack;

#[cfg(test)]
mod tests;

// -----------------------------------------------------------------------------
// Top-Level exports

pub use allocator::{AllocError, Allocator, GlobalAllocator, TrackingAllocator};
pub use de::{deserialize, ignore_deserialize, read_field_table};
pub use dependencies::missing_dependent_types;
pub use error::{InstrumentError, ReadError, ReadStatus, WriteError, WriteStatus};
pub use field_table::{FieldTable, FieldTableField, FieldTableType};
pub use layout::{default_value, field_default};
pub use ops::{compare_values, copy_value, deallocate_value};
pub use options::{
    CopyOptions, DeallocateOptions, ReadMode, ReadOptions, ReadSettings, WriteOptions, WriteSettings,
};
pub use ser::{build_field_table, serialize, serialize_size, write_field_table};

#[cfg(feature = "std")]
pub use de::deserialize_from_file;
#[cfg(feature = "std")]
pub use ser::serialize_to_file;
