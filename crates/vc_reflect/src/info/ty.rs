use alloc::string::String;
use alloc::vec::Vec;

use crate::info::ReflectionField;

/// A laid-out aggregate.
///
/// Fields are stored in declaration order with their offsets resolved.
/// `byte_size` is rounded up to `alignment`, like a C struct.
#[derive(Debug, Clone, PartialEq)]
pub struct ReflectionType {
    pub name: String,
    pub fields: Vec<ReflectionField>,
    pub byte_size: usize,
    pub alignment: usize,
    pub tag: Option<String>,
    /// No pointers, no streams, no custom types, and every nested aggregate
    /// blittable. Decided once when the registry lays the type out.
    pub is_blittable: bool,
}

impl ReflectionType {
    /// Returns the field named `name`.
    pub fn field(&self, name: &str) -> Option<&ReflectionField> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Returns the declaration index of the field named `name`.
    ///
    /// This is O(N) complexity.
    pub fn field_index(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }

    /// Returns the number of fields.
    #[inline]
    pub fn field_len(&self) -> usize {
        self.fields.len()
    }
}
