//! Runtime type descriptions and dynamic values.
//!
//! This crate is the boundary the serializer consumes:
//!
//! - [`basic`]: the basic type table (`int`, `float3`, `wchar_t`, ...).
//! - [`shape`]: parsing of field definition strings (`Stream<Foo>`, `int[4]`, `char*`).
//! - [`info`]: [`ReflectionType`] and [`ReflectionField`] records.
//! - [`registry`]: the [`TypeRegistry`] that lays out registered aggregates.
//! - [`value`]: the dynamic [`Value`] tree that is written and read.
//!
//! # Examples
//!
//! ```
//! use vc_reflect::registry::{NoCustomTypes, TypeDescriptor, TypeRegistry};
//!
//! let mut registry = TypeRegistry::new();
//! registry.add(
//!     TypeDescriptor::new("Vertex")
//!         .field("position", "float3")
//!         .field("color", "uint32"),
//! );
//! registry.resolve(&NoCustomTypes).unwrap();
//!
//! let vertex = registry.get_type("Vertex").unwrap();
//! assert_eq!(vertex.byte_size, 16);
//! assert!(vertex.is_blittable);
//! ```
//!
//! [`ReflectionType`]: info::ReflectionType
//! [`ReflectionField`]: info::ReflectionField
//! [`TypeRegistry`]: registry::TypeRegistry
//! [`Value`]: value::Value
#![cfg_attr(docsrs, feature(doc_cfg))]
#![no_std]

// -----------------------------------------------------------------------------
// no_std support

#[cfg(feature = "std")]
extern crate std;

extern crate alloc;

// -----------------------------------------------------------------------------
// Modules

pub mod basic;
pub mod info;
pub mod registry;
pub mod shape;
pub mod value;

// -----------------------------------------------------------------------------
// Top-Level exports

pub use basic::{BasicType, ScalarKind, StreamKind};
pub use info::{ReflectionField, ReflectionFieldInfo, ReflectionType};
pub use registry::{CustomLayout, RegistryError, TypeDescriptor, TypeRegistry};
pub use value::{StructValue, Value};
