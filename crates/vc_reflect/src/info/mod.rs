//! Reflection records produced by the [`TypeRegistry`](crate::registry::TypeRegistry).

// -----------------------------------------------------------------------------
// Modules

mod field;
mod ty;

// -----------------------------------------------------------------------------
// Exports

pub use field::{ReflectionField, ReflectionFieldInfo};
pub use ty::ReflectionType;
