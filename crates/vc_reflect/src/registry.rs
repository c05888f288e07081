//! The type registry: the store of laid-out [`ReflectionType`]s.
//!
//! Types are added as [`TypeDescriptor`]s (names and definition strings) and
//! laid out by [`TypeRegistry::resolve`]. Layout needs the byte size of custom
//! container definitions, which the registry does not know about; those are
//! reported through the [`CustomLayout`] seam by whoever owns the handlers.

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::mem;

use thiserror::Error;
use vc_utils::hash::HashMap;
use vc_utils::num::align_up;

use crate::basic::{BasicType, StreamKind};
use crate::info::{ReflectionField, ReflectionFieldInfo, ReflectionType};
use crate::shape::{DefinitionShape, split_template};
use crate::value::Value;

/// Size and alignment of pointers in laid-out aggregates.
pub const POINTER_SIZE: usize = 8;

// -----------------------------------------------------------------------------
// Error

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RegistryError {
    #[error("type `{0}` is not registered")]
    UnknownType(String),

    #[error("type `{0}` is registered twice")]
    DuplicateType(String),

    #[error("types could not be laid out, missing dependent types: {0:?}")]
    Unresolved(Vec<String>),

    #[error("field `{type_name}::{field}` has a tag `{tag}` its custom type rejects")]
    InvalidTag {
        type_name: String,
        field: String,
        tag: String,
    },
}

// -----------------------------------------------------------------------------
// CustomLayout

/// Layout queries for custom container definitions.
pub trait CustomLayout {
    /// Returns the index of the custom type handling `definition`, if any.
    fn match_custom(&self, definition: &str) -> Option<u32>;

    /// Returns `(byte_size, alignment)` of `definition`.
    ///
    /// `None` means the size depends on a type that is not laid out yet;
    /// the registry retries in a later round instead of failing.
    fn byte_size(
        &self,
        index: u32,
        definition: &str,
        registry: &TypeRegistry,
    ) -> Option<(usize, usize)>;

    /// Returns `false` if the custom type cannot honor `tag`.
    fn validate_tag(&self, index: u32, tag: &str) -> bool;
}

/// A [`CustomLayout`] that knows no custom types.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCustomTypes;

impl CustomLayout for NoCustomTypes {
    #[inline]
    fn match_custom(&self, _definition: &str) -> Option<u32> {
        None
    }

    #[inline]
    fn byte_size(&self, _: u32, _: &str, _: &TypeRegistry) -> Option<(usize, usize)> {
        None
    }

    #[inline]
    fn validate_tag(&self, _: u32, _: &str) -> bool {
        true
    }
}

// -----------------------------------------------------------------------------
// TypeDescriptor

/// A field as declared, before layout.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: String,
    pub definition: String,
    pub tag: Option<String>,
    pub default_value: Option<Value>,
}

/// An aggregate as declared, before layout.
///
/// # Examples
///
/// ```
/// use vc_reflect::registry::TypeDescriptor;
/// use vc_reflect::Value;
///
/// let descriptor = TypeDescriptor::new("Light")
///     .field("color", "float3")
///     .field_with_default("intensity", "float", Value::F32(1.0))
///     .tagged_field("shadow_map", "Stream<uint8>", "ReferenceKey:maps");
///
/// assert_eq!(descriptor.fields().len(), 3);
/// ```
#[derive(Debug, Clone)]
pub struct TypeDescriptor {
    name: String,
    fields: Vec<FieldDescriptor>,
    tag: Option<String>,
}

impl TypeDescriptor {
    /// Creates an aggregate without fields.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            tag: None,
        }
    }

    /// Appends a field.
    pub fn field(self, name: impl Into<String>, definition: impl Into<String>) -> Self {
        self.push(name.into(), definition.into(), None, None)
    }

    /// Appends a field carrying a tag.
    pub fn tagged_field(
        self,
        name: impl Into<String>,
        definition: impl Into<String>,
        tag: impl Into<String>,
    ) -> Self {
        self.push(name.into(), definition.into(), Some(tag.into()), None)
    }

    /// Appends a field with the value it takes when a read leaves it unpopulated.
    pub fn field_with_default(
        self,
        name: impl Into<String>,
        definition: impl Into<String>,
        default_value: Value,
    ) -> Self {
        self.push(name.into(), definition.into(), None, Some(default_value))
    }

    /// Sets the tag of the aggregate itself.
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    fn push(
        mut self,
        name: String,
        definition: String,
        tag: Option<String>,
        default_value: Option<Value>,
    ) -> Self {
        self.fields.push(FieldDescriptor {
            name,
            definition,
            tag,
            default_value,
        });
        self
    }

    /// Returns the name of the aggregate.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the declared fields.
    #[inline]
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }
}

// -----------------------------------------------------------------------------
// TypeRegistry

/// The store of laid-out aggregates, looked up by name.
///
/// # Examples
///
/// ```
/// use vc_reflect::registry::{NoCustomTypes, RegistryError, TypeDescriptor, TypeRegistry};
///
/// let mut registry = TypeRegistry::new();
/// // `Outer` embeds `Inner`, which is added later: layout is retried.
/// registry.add(TypeDescriptor::new("Outer").field("inner", "Inner").field("flag", "bool"));
/// registry.add(TypeDescriptor::new("Inner").field("value", "double"));
/// registry.resolve(&NoCustomTypes).unwrap();
///
/// assert_eq!(registry.get_type("Outer").unwrap().byte_size, 16);
/// assert!(registry.try_get_type("Missing").is_none());
///
/// registry.add(TypeDescriptor::new("Broken").field("value", "Missing"));
/// assert_eq!(
///     registry.resolve(&NoCustomTypes),
///     Err(RegistryError::Unresolved(vec!["Broken".into()])),
/// );
/// ```
#[derive(Debug, Default)]
pub struct TypeRegistry {
    types: HashMap<String, ReflectionType>,
    pending: Vec<TypeDescriptor>,
}

impl TypeRegistry {
    /// Creates an empty registry.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues an aggregate for layout by the next [`resolve`](Self::resolve).
    pub fn add(&mut self, descriptor: TypeDescriptor) {
        self.pending.push(descriptor);
    }

    /// Lays out every queued aggregate.
    ///
    /// Aggregates whose fields depend on types not laid out yet are retried
    /// until a round makes no progress. The ones left are reported as
    /// [`RegistryError::Unresolved`] and stay queued.
    pub fn resolve(&mut self, layout: &dyn CustomLayout) -> Result<(), RegistryError> {
        while !self.pending.is_empty() {
            let mut progress = false;
            let mut remaining = Vec::new();
            let mut queue = mem::take(&mut self.pending).into_iter();

            while let Some(descriptor) = queue.next() {
                match self.lay_out(&descriptor, layout) {
                    Ok(Some(ty)) => {
                        log::trace!("laid out `{}` ({} bytes)", ty.name, ty.byte_size);
                        self.types.insert(ty.name.clone(), ty);
                        progress = true;
                    }
                    Ok(None) => remaining.push(descriptor),
                    Err(err) => {
                        remaining.push(descriptor);
                        remaining.extend(queue);
                        self.pending = remaining;
                        return Err(err);
                    }
                }
            }

            self.pending = remaining;
            if !progress {
                let names = self.pending.iter().map(|d| d.name.clone()).collect();
                return Err(RegistryError::Unresolved(names));
            }
        }
        Ok(())
    }

    /// Returns the aggregate named `name`.
    pub fn get_type(&self, name: &str) -> Result<&ReflectionType, RegistryError> {
        self.types
            .get(name)
            .ok_or_else(|| RegistryError::UnknownType(name.to_string()))
    }

    /// Returns the aggregate named `name`, if registered.
    #[inline]
    pub fn try_get_type(&self, name: &str) -> Option<&ReflectionType> {
        self.types.get(name)
    }

    /// Returns `true` if an aggregate named `name` is laid out.
    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Iterates the laid-out aggregates in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &ReflectionType> {
        self.types.values()
    }

    /// Returns the number of laid-out aggregates.
    #[inline]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns the names still waiting for layout.
    pub fn pending(&self) -> impl Iterator<Item = &str> {
        self.pending.iter().map(TypeDescriptor::name)
    }

    // `Ok(None)` defers the aggregate to the next round.
    fn lay_out(
        &self,
        descriptor: &TypeDescriptor,
        layout: &dyn CustomLayout,
    ) -> Result<Option<ReflectionType>, RegistryError> {
        if self.types.contains_key(&descriptor.name) {
            return Err(RegistryError::DuplicateType(descriptor.name.clone()));
        }

        let mut fields = Vec::with_capacity(descriptor.fields.len());
        let mut offset = 0;
        let mut alignment = 1;
        let mut is_blittable = true;

        for field in &descriptor.fields {
            let Some((mut info, blittable)) = self.lay_out_field(descriptor, field, layout)? else {
                return Ok(None);
            };
            offset = align_up(offset, info.alignment);
            info.pointer_offset = offset;
            offset += info.byte_size;
            alignment = alignment.max(info.alignment);
            is_blittable &= blittable;

            fields.push(ReflectionField {
                name: field.name.clone(),
                definition: field.definition.clone(),
                tag: field.tag.clone(),
                info,
            });
        }

        Ok(Some(ReflectionType {
            name: descriptor.name.clone(),
            fields,
            byte_size: align_up(offset, alignment),
            alignment,
            tag: descriptor.tag.clone(),
            is_blittable,
        }))
    }

    fn lay_out_field(
        &self,
        owner: &TypeDescriptor,
        field: &FieldDescriptor,
        layout: &dyn CustomLayout,
    ) -> Result<Option<(ReflectionFieldInfo, bool)>, RegistryError> {
        let mut info = ReflectionFieldInfo {
            basic_type: BasicType::Unknown,
            stream_type: StreamKind::Basic,
            byte_size: 0,
            alignment: 1,
            pointer_offset: 0,
            basic_type_count: 1,
            default_value: field.default_value.clone(),
        };

        if let Some(index) = layout.match_custom(&field.definition) {
            if let Some(tag) = &field.tag
                && !layout.validate_tag(index, tag)
            {
                return Err(RegistryError::InvalidTag {
                    type_name: owner.name.clone(),
                    field: field.name.clone(),
                    tag: tag.clone(),
                });
            }
            let Some((size, align)) = layout.byte_size(index, &field.definition, self) else {
                return Ok(None);
            };
            if let Some((name, arguments)) = split_template(&field.definition)
                && let Some(stream) = StreamKind::from_template(name)
            {
                info.stream_type = stream;
                if let [element] = arguments.as_slice() {
                    info.basic_type = BasicType::from_name(element).unwrap_or(BasicType::Unknown);
                }
            }
            info.byte_size = size;
            info.alignment = align.max(1);
            return Ok(Some((info, false)));
        }

        let blittable = match DefinitionShape::parse(&field.definition) {
            DefinitionShape::Basic(basic) => {
                info.basic_type = basic;
                info.byte_size = basic.byte_size();
                info.alignment = basic.alignment();
                true
            }
            DefinitionShape::BasicArray { element, count } => {
                info.basic_type = element;
                info.stream_type = StreamKind::BasicTypeArray;
                info.basic_type_count = count;
                info.byte_size = element.byte_size() * count;
                info.alignment = element.alignment();
                true
            }
            DefinitionShape::Pointer(pointee) => {
                info.basic_type = BasicType::from_name(pointee).unwrap_or(BasicType::Unknown);
                info.stream_type = StreamKind::Pointer;
                info.byte_size = POINTER_SIZE;
                info.alignment = POINTER_SIZE;
                false
            }
            DefinitionShape::Named(name) => match self.types.get(name) {
                Some(nested) => {
                    info.byte_size = nested.byte_size;
                    info.alignment = nested.alignment;
                    nested.is_blittable
                }
                None => return Ok(None),
            },
            // A template no custom type claims.
            DefinitionShape::Template { .. } => return Ok(None),
        };

        Ok(Some((info, blittable)))
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;
    use alloc::vec;

    use super::{CustomLayout, NoCustomTypes, RegistryError, TypeDescriptor, TypeRegistry};
    use crate::basic::{BasicType, StreamKind};

    /// Claims `Box<T>` with the size of `T` plus a header.
    struct Boxes;

    impl CustomLayout for Boxes {
        fn match_custom(&self, definition: &str) -> Option<u32> {
            definition.starts_with("Box<").then_some(0)
        }

        fn byte_size(&self, _: u32, definition: &str, registry: &TypeRegistry) -> Option<(usize, usize)> {
            let inner = definition.strip_prefix("Box<")?.strip_suffix('>')?;
            let size = match BasicType::from_name(inner) {
                Some(basic) => basic.byte_size(),
                None => registry.try_get_type(inner)?.byte_size,
            };
            Some((size + 8, 8))
        }

        fn validate_tag(&self, _: u32, tag: &str) -> bool {
            tag != "Forbidden"
        }
    }

    #[test]
    fn c_layout() {
        let mut registry = TypeRegistry::new();
        registry.add(
            TypeDescriptor::new("Mixed")
                .field("a", "uint8")
                .field("b", "double")
                .field("c", "int16[3]")
                .field("d", "char*"),
        );
        registry.resolve(&NoCustomTypes).unwrap();

        let ty = registry.get_type("Mixed").unwrap();
        let offsets: vec::Vec<usize> = ty.fields.iter().map(|f| f.info.pointer_offset).collect();
        assert_eq!(offsets, vec![0, 8, 16, 24]);
        assert_eq!(ty.byte_size, 32);
        assert_eq!(ty.alignment, 8);
        assert!(!ty.is_blittable);

        let array = &ty.fields[2];
        assert_eq!(array.info.stream_type, StreamKind::BasicTypeArray);
        assert_eq!(array.info.basic_type_count, 3);

        let pointer = &ty.fields[3];
        assert_eq!(pointer.info.stream_type, StreamKind::Pointer);
        assert_eq!(pointer.info.basic_type, BasicType::Char);
    }

    #[test]
    fn custom_sizes_are_deferred() {
        let mut registry = TypeRegistry::new();
        registry.add(TypeDescriptor::new("Holder").field("boxed", "Box<Payload>"));
        registry.add(TypeDescriptor::new("Payload").field("x", "int"));
        registry.resolve(&Boxes).unwrap();

        assert_eq!(registry.get_type("Holder").unwrap().byte_size, 16);
        assert!(!registry.get_type("Holder").unwrap().is_blittable);
    }

    #[test]
    fn rejected_tag() {
        let mut registry = TypeRegistry::new();
        registry.add(TypeDescriptor::new("Holder").tagged_field("boxed", "Box<int>", "Forbidden"));
        assert_eq!(
            registry.resolve(&Boxes),
            Err(RegistryError::InvalidTag {
                type_name: "Holder".to_string(),
                field: "boxed".to_string(),
                tag: "Forbidden".to_string(),
            })
        );
        assert_eq!(registry.pending().count(), 1);
    }

    #[test]
    fn duplicate_type() {
        let mut registry = TypeRegistry::new();
        registry.add(TypeDescriptor::new("A").field("x", "int"));
        registry.resolve(&NoCustomTypes).unwrap();
        registry.add(TypeDescriptor::new("A").field("x", "int"));
        assert_eq!(
            registry.resolve(&NoCustomTypes),
            Err(RegistryError::DuplicateType("A".to_string()))
        );
    }
}
