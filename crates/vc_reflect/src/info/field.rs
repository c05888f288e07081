use alloc::string::String;

use crate::basic::{BasicType, StreamKind};
use crate::value::Value;

// -----------------------------------------------------------------------------
// ReflectionFieldInfo

/// Layout information for one field.
#[derive(Debug, Clone, PartialEq)]
pub struct ReflectionFieldInfo {
    /// The basic type of the field, or of its elements for arrays, pointers
    /// and streams. [`BasicType::Unknown`] for aggregates and custom types.
    pub basic_type: BasicType,
    pub stream_type: StreamKind,
    /// Size of the field itself inside its parent.
    pub byte_size: usize,
    pub alignment: usize,
    /// Offset of the field inside its parent.
    pub pointer_offset: usize,
    /// Element count for fixed arrays, `1` otherwise.
    pub basic_type_count: usize,
    /// Value used when a read leaves the field unpopulated.
    pub default_value: Option<Value>,
}

// -----------------------------------------------------------------------------
// ReflectionField

/// A laid-out field of a [`ReflectionType`](crate::info::ReflectionType).
///
/// # Tags
///
/// `tag` is a whitespace separated list of annotations. An annotation may
/// carry an argument after a colon:
///
/// ```
/// use vc_reflect::registry::{NoCustomTypes, TypeDescriptor, TypeRegistry};
///
/// let mut registry = TypeRegistry::new();
/// registry.add(
///     TypeDescriptor::new("Node")
///         .tagged_field("parent", "Node*", "Reference:nodes"),
/// );
/// registry.resolve(&NoCustomTypes).unwrap();
///
/// let field = &registry.get_type("Node").unwrap().fields[0];
/// assert!(field.has_tag("Reference"));
/// assert_eq!(field.tag_argument("Reference"), Some("nodes"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct ReflectionField {
    pub name: String,
    pub definition: String,
    pub tag: Option<String>,
    pub info: ReflectionFieldInfo,
}

impl ReflectionField {
    /// Iterates the annotations of the tag as `(name, argument)`.
    pub fn tags(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.tag
            .as_deref()
            .unwrap_or("")
            .split_whitespace()
            .map(|tag| match tag.split_once(':') {
                Some((name, argument)) => (name, Some(argument)),
                None => (tag, None),
            })
    }

    /// Returns `true` if the annotation `name` is present.
    pub fn has_tag(&self, name: &str) -> bool {
        self.tags().any(|(tag, _)| tag == name)
    }

    /// Returns the argument of the annotation `name`, if present.
    pub fn tag_argument(&self, name: &str) -> Option<&str> {
        self.tags()
            .find(|(tag, _)| *tag == name)
            .and_then(|(_, argument)| argument)
    }

    /// Returns `true` if the field can be copied through its raw image.
    #[inline]
    pub fn is_basic_blittable(&self) -> bool {
        self.info.basic_type.is_known()
            && matches!(
                self.info.stream_type,
                StreamKind::Basic | StreamKind::BasicTypeArray
            )
    }
}
