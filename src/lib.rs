//! Reflection-driven binary archives.
//!
//! - [`reflect`]: type registry, definitions and dynamic values.
//! - [`serialize`]: the write and read engines, field tables, instruments
//!   and allocators.
//! - [`utils`]: fixed-seed hashing and alignment helpers.
//!
//! # Examples
//!
//! ```
//! use vc_archive::reflect::{StructValue, TypeDescriptor, TypeRegistry, Value};
//! use vc_archive::serialize::custom::CustomTypes;
//! use vc_archive::serialize::instrument::{BufferReader, BufferWriter};
//! use vc_archive::serialize::{ReadOptions, WriteOptions, deserialize, serialize};
//!
//! let mut registry = TypeRegistry::new();
//! registry.add(TypeDescriptor::new("Tag").field("name", "Stream<char>").field("weight", "float"));
//! registry.resolve(&CustomTypes).unwrap();
//!
//! let tag: Value = StructValue::new("Tag")
//!     .with("name", Value::String("grass".into()))
//!     .with("weight", Value::F32(0.75))
//!     .into();
//!
//! let mut out = BufferWriter::new();
//! serialize(&registry, "Tag", &tag, &mut out, &WriteOptions::default()).unwrap();
//!
//! let mut input = BufferReader::new(out.into_bytes());
//! let read = deserialize(&registry, "Tag", &mut input, &ReadOptions::default()).unwrap();
//! assert_eq!(read, tag);
//! ```
#![cfg_attr(docsrs, feature(doc_cfg))]
#![no_std]

pub use vc_reflect as reflect;
pub use vc_serialize as serialize;
pub use vc_utils as utils;
