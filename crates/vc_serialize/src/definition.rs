//! Resolution of definition strings into [`DefinitionInfo`].

use alloc::string::{String, ToString};
use core::cell::RefCell;

use vc_reflect::registry::{POINTER_SIZE, TypeRegistry};
use vc_reflect::shape::DefinitionShape;
use vc_reflect::{BasicType, ReflectionType, StreamKind};
use vc_utils::hash::HashMap;

use crate::custom::CustomTypeHandler;

// -----------------------------------------------------------------------------
// TypeSource

/// Where aggregates are looked up by name.
///
/// The [`TypeRegistry`] is the compiled source. A field table read from a
/// file is the recorded one.
pub trait TypeSource {
    fn try_get_type(&self, name: &str) -> Option<&ReflectionType>;
}

impl TypeSource for TypeRegistry {
    #[inline]
    fn try_get_type(&self, name: &str) -> Option<&ReflectionType> {
        TypeRegistry::try_get_type(self, name)
    }
}

// -----------------------------------------------------------------------------
// DefinitionInfo

/// What a definition resolves to.
#[derive(Debug, Clone, Copy)]
pub enum DefinitionTarget<'a> {
    /// A basic type, a fixed basic array or a pointer.
    Fundamental,
    /// A registered aggregate.
    Reflected(&'a ReflectionType),
    /// A built-in container family.
    Custom(CustomTypeHandler),
    /// Nothing known by this name.
    Unresolved,
}

/// Everything the engines need to know about one definition.
#[derive(Debug, Clone)]
pub struct DefinitionInfo<'a> {
    /// `None` while a dependent type is unknown.
    pub byte_size: Option<usize>,
    pub alignment: usize,
    pub is_blittable: bool,
    pub target: DefinitionTarget<'a>,
    pub basic_type: BasicType,
    pub stream_kind: StreamKind,
    /// Element count of fixed arrays, `1` otherwise.
    pub basic_type_count: usize,
    pub stream_element_byte_size: usize,
    pub stream_alignment: usize,
}

impl<'a> DefinitionInfo<'a> {
    const fn unresolved() -> Self {
        Self {
            byte_size: None,
            alignment: 1,
            is_blittable: false,
            target: DefinitionTarget::Unresolved,
            basic_type: BasicType::Unknown,
            stream_kind: StreamKind::Basic,
            basic_type_count: 1,
            stream_element_byte_size: 0,
            stream_alignment: 1,
        }
    }

    #[inline]
    pub fn reflected_type(&self) -> Option<&'a ReflectionType> {
        match self.target {
            DefinitionTarget::Reflected(ty) => Some(ty),
            _ => None,
        }
    }

    #[inline]
    pub fn custom_type(&self) -> Option<CustomTypeHandler> {
        match self.target {
            DefinitionTarget::Custom(handler) => Some(handler),
            _ => None,
        }
    }

    #[inline]
    pub fn custom_type_index(&self) -> Option<u32> {
        self.custom_type().map(CustomTypeHandler::index)
    }

    #[inline]
    pub fn is_resolved(&self) -> bool {
        !matches!(self.target, DefinitionTarget::Unresolved)
    }
}

// -----------------------------------------------------------------------------
// Layout

/// `(byte_size, alignment)` of `definition`, `None` if a type it depends
/// on is unknown.
pub fn definition_layout(definition: &str, source: &dyn TypeSource) -> Option<(usize, usize)> {
    if let Some(handler) = CustomTypeHandler::find(definition) {
        return handler.byte_size(definition, source);
    }
    match DefinitionShape::parse(definition) {
        DefinitionShape::Basic(basic) => Some((basic.byte_size(), basic.alignment())),
        DefinitionShape::BasicArray { element, count } => {
            Some((element.byte_size() * count, element.alignment()))
        }
        DefinitionShape::Pointer(_) => Some((POINTER_SIZE, POINTER_SIZE)),
        DefinitionShape::Named(name) => source
            .try_get_type(name)
            .map(|ty| (ty.byte_size, ty.alignment)),
        DefinitionShape::Template { .. } => None,
    }
}

/// Returns `true` if instances of `definition` are copied through their
/// raw image.
pub fn definition_is_blittable(definition: &str, source: &dyn TypeSource) -> bool {
    if CustomTypeHandler::find(definition).is_some() {
        return false;
    }
    match DefinitionShape::parse(definition) {
        DefinitionShape::Basic(_) | DefinitionShape::BasicArray { .. } => true,
        DefinitionShape::Named(name) => source.try_get_type(name).is_some_and(|ty| ty.is_blittable),
        DefinitionShape::Pointer(_) | DefinitionShape::Template { .. } => false,
    }
}

// -----------------------------------------------------------------------------
// DefinitionResolver

/// Resolves definitions against one [`TypeSource`], caching the results.
///
/// Blittability and layout are decided once per distinct definition string
/// and reused for every instance.
///
/// # Examples
///
/// ```
/// use vc_reflect::registry::{TypeDescriptor, TypeRegistry};
/// use vc_serialize::custom::CustomTypes;
/// use vc_serialize::definition::DefinitionResolver;
///
/// let mut registry = TypeRegistry::new();
/// registry.add(TypeDescriptor::new("Pair").field("a", "int").field("b", "int"));
/// registry.resolve(&CustomTypes).unwrap();
///
/// let resolver = DefinitionResolver::new(&registry);
/// let pair = resolver.resolve("Pair");
/// assert_eq!(pair.byte_size, Some(8));
/// assert!(pair.is_blittable);
///
/// let stream = resolver.resolve("Stream<Pair>");
/// assert_eq!(stream.custom_type_index(), Some(0));
/// assert_eq!(stream.stream_element_byte_size, 8);
/// assert!(!stream.is_blittable);
/// ```
pub struct DefinitionResolver<'a> {
    source: &'a dyn TypeSource,
    cache: RefCell<HashMap<String, DefinitionInfo<'a>>>,
}

impl<'a> DefinitionResolver<'a> {
    pub fn new(source: &'a dyn TypeSource) -> Self {
        Self {
            source,
            cache: RefCell::new(HashMap::default()),
        }
    }

    #[inline]
    pub fn source(&self) -> &'a dyn TypeSource {
        self.source
    }

    #[inline]
    pub fn try_get_type(&self, name: &str) -> Option<&'a ReflectionType> {
        self.source.try_get_type(name)
    }

    /// Resolves `definition`.
    ///
    /// Unknown names yield an info whose target is
    /// [`DefinitionTarget::Unresolved`]; callers decide how to fail.
    pub fn resolve(&self, definition: &str) -> DefinitionInfo<'a> {
        if let Some(info) = self.cache.borrow().get(definition) {
            return info.clone();
        }
        let info = self.resolve_uncached(definition.trim());
        // Unknown sizes may become known once more types are laid out.
        if info.byte_size.is_some() {
            self.cache
                .borrow_mut()
                .insert(definition.to_string(), info.clone());
        }
        info
    }

    fn resolve_uncached(&self, definition: &str) -> DefinitionInfo<'a> {
        let mut info = DefinitionInfo::unresolved();

        if let Some(handler) = CustomTypeHandler::find(definition) {
            info.target = DefinitionTarget::Custom(handler);
            if let Some((size, align)) = handler.byte_size(definition, self.source) {
                info.byte_size = Some(size);
                info.alignment = align;
            }
            if let Some(element) = handler.stream_element(definition) {
                info.stream_kind = handler.stream_kind(definition);
                info.basic_type = BasicType::from_name(element).unwrap_or(BasicType::Unknown);
                if let Some((size, align)) = definition_layout(element, self.source) {
                    info.stream_element_byte_size = size;
                    info.stream_alignment = align;
                }
            }
            return info;
        }

        match DefinitionShape::parse(definition) {
            DefinitionShape::Basic(basic) => {
                info.target = DefinitionTarget::Fundamental;
                info.basic_type = basic;
                info.byte_size = Some(basic.byte_size());
                info.alignment = basic.alignment();
                info.is_blittable = true;
            }
            DefinitionShape::BasicArray { element, count } => {
                info.target = DefinitionTarget::Fundamental;
                info.basic_type = element;
                info.stream_kind = StreamKind::BasicTypeArray;
                info.basic_type_count = count;
                info.byte_size = Some(element.byte_size() * count);
                info.alignment = element.alignment();
                info.stream_element_byte_size = element.byte_size();
                info.stream_alignment = element.alignment();
                info.is_blittable = true;
            }
            DefinitionShape::Pointer(pointee) => {
                info.target = DefinitionTarget::Fundamental;
                info.basic_type = BasicType::from_name(pointee).unwrap_or(BasicType::Unknown);
                info.stream_kind = StreamKind::Pointer;
                info.byte_size = Some(POINTER_SIZE);
                info.alignment = POINTER_SIZE;
                if let Some((size, align)) = definition_layout(pointee, self.source) {
                    info.stream_element_byte_size = size;
                    info.stream_alignment = align;
                }
            }
            DefinitionShape::Named(name) => {
                if let Some(ty) = self.source.try_get_type(name) {
                    info.target = DefinitionTarget::Reflected(ty);
                    info.byte_size = Some(ty.byte_size);
                    info.alignment = ty.alignment;
                    info.is_blittable = ty.is_blittable;
                }
            }
            DefinitionShape::Template { .. } => {}
        }
        info
    }
}

#[cfg(test)]
mod tests {
    use vc_reflect::registry::{TypeDescriptor, TypeRegistry};
    use vc_reflect::{BasicType, StreamKind};

    use super::{DefinitionResolver, DefinitionTarget, definition_layout};
    use crate::custom::CustomTypes;

    fn registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry.add(TypeDescriptor::new("Inner").field("x", "double").field("y", "uint8"));
        registry.add(
            TypeDescriptor::new("Outer")
                .field("inner", "Inner")
                .field("names", "Stream<char>"),
        );
        registry.resolve(&CustomTypes).unwrap();
        registry
    }

    #[test]
    fn exactly_one_target() {
        let registry = registry();
        let resolver = DefinitionResolver::new(&registry);

        let basic = resolver.resolve("float4");
        assert!(matches!(basic.target, DefinitionTarget::Fundamental));
        assert_eq!(basic.basic_type, BasicType::Float4);
        assert!(basic.reflected_type().is_none() && basic.custom_type_index().is_none());

        let array = resolver.resolve("uint16[5]");
        assert_eq!(array.stream_kind, StreamKind::BasicTypeArray);
        assert_eq!(array.byte_size, Some(10));

        let inner = resolver.resolve("Inner");
        assert_eq!(inner.reflected_type().map(|ty| ty.name.as_str()), Some("Inner"));
        assert_eq!(inner.byte_size, Some(16));
        assert!(inner.is_blittable);

        let outer = resolver.resolve("Outer");
        assert!(!outer.is_blittable);

        let missing = resolver.resolve("Missing");
        assert!(!missing.is_resolved());
        assert_eq!(missing.byte_size, None);
    }

    #[test]
    fn stream_metadata() {
        let registry = registry();
        let resolver = DefinitionResolver::new(&registry);
        let info = resolver.resolve("ResizableStream<Inner>");
        assert_eq!(info.stream_kind, StreamKind::ResizableStream);
        assert_eq!(info.stream_element_byte_size, 16);
        assert_eq!(info.stream_alignment, 8);
        assert_eq!(info.byte_size, Some(32));
        assert_eq!(definition_layout("Inner*", &registry), Some((8, 8)));
    }
}
