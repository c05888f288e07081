//! The dynamic value tree.
//!
//! A [`Value`] is an instance of a runtime-described type. Aggregates are
//! [`StructValue`]s holding their fields in declaration order; each built-in
//! container family has its own value type carrying exactly the state its
//! wire format records.
//!
//! # Equality
//!
//! `PartialEq` is structural. Streams ignore their capacity, sparse sets
//! compare handle to element, and hash tables compare identifier to value,
//! so two tables holding the same pairs are equal regardless of slot order.

use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;
use core::hash::{Hash, Hasher};

use bytes::Bytes;

// -----------------------------------------------------------------------------
// Modules

mod allocator;
mod asset;
mod deck;
mod hash_table;
mod scalar;
mod sparse_set;
mod stream;

// -----------------------------------------------------------------------------
// Exports

pub use allocator::{AllocatorDescriptor, AllocatorKind, AllocatorValue};
pub use asset::{DataPointerValue, MaterialBinding, MaterialBuffer, MaterialValue, SharedValue};
pub use deck::DeckValue;
pub use hash_table::{HashTableValue, METADATA_EMPTY};
pub use sparse_set::{FREE_SLOT_BIT, NO_SLOT, SparseSetValue, SparseSlot};
pub use stream::StreamValue;

// -----------------------------------------------------------------------------
// Value

/// An instance of a runtime-described type.
///
/// Scalars of basic types map to the matching variant (`char` is `I8`,
/// `wchar_t` is `U16`); vector basic types and fixed arrays are [`Value::Array`].
/// Streams of `char`, `wchar_t` and `uint8` use [`Value::String`],
/// [`Value::WString`] and [`Value::Bytes`] instead of [`Value::Stream`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    /// Vector basic types and fixed arrays.
    Array(Vec<Value>),
    /// `char*` and `Stream<char>`.
    String(String),
    /// `wchar_t*` and `Stream<wchar_t>`, as UTF-16 units.
    WString(Vec<u16>),
    /// `Stream<uint8>`; may share the buffer it was read from.
    Bytes(Bytes),
    /// An owning pointer to a single value.
    Pointer(Option<Box<Value>>),
    /// A non-owning pointer, holding the element it points at.
    Reference(Option<Box<Value>>),
    Struct(StructValue),
    Stream(StreamValue),
    SparseSet(SparseSetValue),
    HashTable(HashTableValue),
    Deck(DeckValue),
    Allocator(AllocatorValue),
    DataPointer(DataPointerValue),
    Shared(SharedValue),
    Material(MaterialValue),
}

impl Value {
    /// Returns the aggregate, if this is a [`Value::Struct`].
    #[inline]
    pub fn as_struct(&self) -> Option<&StructValue> {
        match self {
            Self::Struct(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the aggregate mutably, if this is a [`Value::Struct`].
    #[inline]
    pub fn as_struct_mut(&mut self) -> Option<&mut StructValue> {
        match self {
            Self::Struct(v) => Some(v),
            _ => None,
        }
    }

    /// Returns the string, if this is a [`Value::String`].
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(v) => Some(v),
            _ => None,
        }
    }

    /// Widens an integer value to `i128`.
    pub fn as_i128(&self) -> Option<i128> {
        Some(match *self {
            Self::Bool(v) => v as i128,
            Self::I8(v) => v as i128,
            Self::U8(v) => v as i128,
            Self::I16(v) => v as i128,
            Self::U16(v) => v as i128,
            Self::I32(v) => v as i128,
            Self::U32(v) => v as i128,
            Self::I64(v) => v as i128,
            Self::U64(v) => v as i128,
            _ => return None,
        })
    }

    /// Widens a numeric value to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Self::F32(v) => Some(v as f64),
            Self::F64(v) => Some(v),
            _ => self.as_i128().map(|v| v as f64),
        }
    }

    /// A short name of the variant, for diagnostics.
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "bool",
            Self::I8(_) => "i8",
            Self::U8(_) => "u8",
            Self::I16(_) => "i16",
            Self::U16(_) => "u16",
            Self::I32(_) => "i32",
            Self::U32(_) => "u32",
            Self::I64(_) => "i64",
            Self::U64(_) => "u64",
            Self::F32(_) => "f32",
            Self::F64(_) => "f64",
            Self::Array(_) => "array",
            Self::String(_) => "string",
            Self::WString(_) => "wstring",
            Self::Bytes(_) => "bytes",
            Self::Pointer(_) => "pointer",
            Self::Reference(_) => "reference",
            Self::Struct(_) => "struct",
            Self::Stream(_) => "stream",
            Self::SparseSet(_) => "sparse set",
            Self::HashTable(_) => "hash table",
            Self::Deck(_) => "deck",
            Self::Allocator(_) => "allocator",
            Self::DataPointer(_) => "data pointer",
            Self::Shared(_) => "reference counted",
            Self::Material(_) => "material",
        }
    }
}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        core::mem::discriminant(self).hash(state);
        match self {
            Self::Bool(v) => v.hash(state),
            Self::I8(v) => v.hash(state),
            Self::U8(v) => v.hash(state),
            Self::I16(v) => v.hash(state),
            Self::U16(v) => v.hash(state),
            Self::I32(v) => v.hash(state),
            Self::U32(v) => v.hash(state),
            Self::I64(v) => v.hash(state),
            Self::U64(v) => v.hash(state),
            Self::F32(v) => v.to_bits().hash(state),
            Self::F64(v) => v.to_bits().hash(state),
            Self::Array(v) => v.hash(state),
            Self::String(v) => v.hash(state),
            Self::WString(v) => v.hash(state),
            Self::Bytes(v) => v.hash(state),
            Self::Pointer(v) | Self::Reference(v) => v.hash(state),
            Self::Struct(v) => {
                v.type_name.hash(state);
                for (_, field) in &v.fields {
                    field.hash(state);
                }
            }
            Self::Stream(v) => v.items.hash(state),
            Self::DataPointer(v) => {
                v.tag.hash(state);
                v.data.hash(state);
            }
            Self::Shared(v) => v.value.hash(state),
            // Containers are never used as identifiers; their length keeps
            // the hash consistent with `PartialEq`.
            Self::SparseSet(v) => v.len().hash(state),
            Self::HashTable(v) => v.len().hash(state),
            Self::Deck(v) => v.len().hash(state),
            Self::Allocator(_) | Self::Material(_) => {}
        }
    }
}

// -----------------------------------------------------------------------------
// StructValue

/// An instance of an aggregate, fields in declaration order.
///
/// # Examples
///
/// ```
/// use vc_reflect::{StructValue, Value};
///
/// let mut value = StructValue::new("Vertex")
///     .with("x", Value::F32(1.0))
///     .with("y", Value::F32(2.0));
///
/// value.set("y", Value::F32(3.0));
/// assert_eq!(value.get("y"), Some(&Value::F32(3.0)));
/// assert_eq!(value.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct StructValue {
    pub type_name: String,
    pub fields: Vec<(String, Value)>,
}

impl StructValue {
    /// Creates an aggregate value without fields.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            fields: Vec::new(),
        }
    }

    /// Appends a field, builder style.
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.push((name.into(), value));
        self
    }

    /// Returns the field named `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Returns the field named `name` mutably.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.fields
            .iter_mut()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Overwrites the field named `name`, or appends it.
    pub fn set(&mut self, name: &str, value: Value) {
        match self.get_mut(name) {
            Some(slot) => *slot = value,
            None => self.fields.push((name.into(), value)),
        }
    }

    /// Returns the number of fields.
    #[inline]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Returns `true` if there are no fields.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<StructValue> for Value {
    #[inline]
    fn from(value: StructValue) -> Self {
        Self::Struct(value)
    }
}
