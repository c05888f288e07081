//! Built-in container families.
//!
//! Each family has one [`CustomTypeHandler`] variant. Handlers own no state:
//! the engines pass them the current writer or reader, and everything else
//! travels in the [`Passdown`](crate::passdown::Passdown) of the call.
//!
//! | Handler            | Definitions |
//! |--------------------|-------------|
//! | `Stream`           | `Stream<T>`, `CapacityStream<T>`, `ResizableStream<T>` |
//! | `SparseSet`        | `SparseSet<T>`, `ResizableSparseSet<T>` |
//! | `HashTable`        | `HashTable<V, I>`, `HashTable<V, I, SoA>`, `HashTable<V, I, Pairs>` |
//! | `Deck`             | `Deck<T>` |
//! | `Allocator`        | the concrete allocator names, `AllocatorPolymorphic` |
//! | `DataPointer`      | `DataPointer` |
//! | `ReferenceCounted` | `ReferenceCounted<T>` |
//! | `Material`         | `MaterialAsset` |

use alloc::vec::Vec;

use vc_reflect::registry::{CustomLayout, TypeRegistry};
use vc_reflect::shape::split_template;
use vc_reflect::{ReflectionField, StreamKind, Value};

use crate::de::Deserializer;
use crate::definition::TypeSource;
use crate::error::{ReadError, WriteError};
use crate::ops::{BufferWalker, Comparer};
use crate::ser::Serializer;

// -----------------------------------------------------------------------------
// Modules

mod allocator;
mod data_pointer;
mod deck;
mod hash_table;
mod material;
mod reference_counted;
mod sparse_set;
mod stream;

// -----------------------------------------------------------------------------
// Exports

pub use hash_table::HashTableLayout;
pub use sparse_set::SPARSE_SET_LEGACY_VERSION;

/// Splits `definition` if it instantiates one of `names` with
/// `arity` arguments.
fn template_of<'d>(
    definition: &'d str,
    names: &[&str],
    arity: core::ops::RangeInclusive<usize>,
) -> Option<(&'d str, Vec<&'d str>)> {
    let (name, arguments) = split_template(definition)?;
    (names.contains(&name) && arity.contains(&arguments.len())).then_some((name, arguments))
}

// -----------------------------------------------------------------------------
// CustomTypeHandler

/// A built-in container family.
///
/// The discriminant is the index recorded in field tables and the position
/// of the handler's version in the recorded version list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CustomTypeHandler {
    Stream = 0,
    SparseSet = 1,
    HashTable = 2,
    Deck = 3,
    Allocator = 4,
    DataPointer = 5,
    ReferenceCounted = 6,
    Material = 7,
}

impl CustomTypeHandler {
    /// Every handler, in match order.
    pub const ALL: [Self; 8] = [
        Self::Stream,
        Self::SparseSet,
        Self::HashTable,
        Self::Deck,
        Self::Allocator,
        Self::DataPointer,
        Self::ReferenceCounted,
        Self::Material,
    ];

    pub const COUNT: usize = Self::ALL.len();

    #[inline]
    pub const fn index(self) -> u32 {
        self as u32
    }

    #[inline]
    pub const fn from_index(index: u32) -> Option<Self> {
        if (index as usize) < Self::COUNT {
            Some(Self::ALL[index as usize])
        } else {
            None
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Stream => "Stream",
            Self::SparseSet => "SparseSet",
            Self::HashTable => "HashTable",
            Self::Deck => "Deck",
            Self::Allocator => "Allocator",
            Self::DataPointer => "DataPointer",
            Self::ReferenceCounted => "ReferenceCounted",
            Self::Material => "Material",
        }
    }

    /// The wire format version this build writes.
    pub const fn version(self) -> u32 {
        match self {
            Self::SparseSet => sparse_set::VERSION,
            Self::DataPointer => data_pointer::VERSION as u32,
            Self::ReferenceCounted => reference_counted::VERSION as u32,
            Self::Material => material::VERSION as u32,
            Self::Stream | Self::HashTable | Self::Deck | Self::Allocator => 1,
        }
    }

    /// Returns `true` if this handler claims `definition`.
    pub fn matches(self, definition: &str) -> bool {
        let definition = definition.trim();
        match self {
            Self::Stream => stream::parse(definition).is_some(),
            Self::SparseSet => sparse_set::parse(definition).is_some(),
            Self::HashTable => hash_table::parse(definition).is_some(),
            Self::Deck => deck::parse(definition).is_some(),
            Self::Allocator => allocator::parse(definition).is_some(),
            Self::DataPointer => definition == data_pointer::TYPE_NAME,
            Self::ReferenceCounted => reference_counted::parse(definition).is_some(),
            Self::Material => definition == material::TYPE_NAME,
        }
    }

    /// Returns the handler claiming `definition`.
    ///
    /// # Examples
    ///
    /// ```
    /// use vc_serialize::custom::CustomTypeHandler;
    ///
    /// assert_eq!(CustomTypeHandler::find("ResizableStream<int>"), Some(CustomTypeHandler::Stream));
    /// assert_eq!(CustomTypeHandler::find("HashTable<float, uint32, Pairs>"), Some(CustomTypeHandler::HashTable));
    /// assert_eq!(CustomTypeHandler::find("MemoryManager"), Some(CustomTypeHandler::Allocator));
    /// assert_eq!(CustomTypeHandler::find("HashTable<float>"), None);
    /// assert_eq!(CustomTypeHandler::find("Transform"), None);
    /// ```
    pub fn find(definition: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|handler| handler.matches(definition))
    }

    /// `(byte_size, alignment)` of one instance.
    ///
    /// `None` while a type the instance embeds by value is unknown.
    pub fn byte_size(self, definition: &str, source: &dyn TypeSource) -> Option<(usize, usize)> {
        let definition = definition.trim();
        match self {
            Self::Stream => stream::byte_size(definition),
            Self::SparseSet => sparse_set::byte_size(definition),
            Self::HashTable => Some(hash_table::BYTE_SIZE),
            Self::Deck => Some(deck::BYTE_SIZE),
            Self::Allocator => allocator::byte_size(definition),
            Self::DataPointer => Some(data_pointer::BYTE_SIZE),
            Self::ReferenceCounted => reference_counted::byte_size(definition, source),
            Self::Material => Some(material::BYTE_SIZE),
        }
    }

    /// The element definition of the stream family.
    pub fn stream_element(self, definition: &str) -> Option<&str> {
        match self {
            Self::Stream => stream::parse(definition.trim()).map(|(_, element)| element),
            _ => None,
        }
    }

    pub fn stream_kind(self, definition: &str) -> StreamKind {
        match self {
            Self::Stream => stream::parse(definition.trim())
                .map_or(StreamKind::Unknown, |(kind, _)| kind),
            _ => StreamKind::Unknown,
        }
    }

    /// The definitions an instance needs to be written or read.
    pub fn dependencies(self, definition: &str) -> Vec<&str> {
        let definition = definition.trim();
        match self {
            Self::Stream => stream::parse(definition).map(|(_, e)| e).into_iter().collect(),
            Self::SparseSet => sparse_set::parse(definition).map(|(_, e)| e).into_iter().collect(),
            Self::HashTable => hash_table::parse(definition)
                .map(|(value, identifier, _)| alloc::vec![value, identifier])
                .unwrap_or_default(),
            Self::Deck => deck::parse(definition).into_iter().collect(),
            Self::ReferenceCounted => reference_counted::parse(definition).into_iter().collect(),
            Self::Allocator | Self::DataPointer | Self::Material => Vec::new(),
        }
    }

    /// Returns `false` if a field of this family cannot honor `tag`.
    ///
    /// `ReferenceKey` needs element tokens, which only the addressable
    /// containers provide. `ReferenceAllocator` only makes sense on an
    /// allocator. `Reference` is for pointers.
    pub fn validate_tag(self, tag: &str) -> bool {
        tag.split_whitespace().all(|annotation| {
            let name = annotation.split_once(':').map_or(annotation, |(name, _)| name);
            match name {
                "ReferenceKey" => matches!(
                    self,
                    Self::Stream | Self::SparseSet | Self::HashTable | Self::Deck
                ),
                "ReferenceAllocator" => self == Self::Allocator,
                "Reference" => false,
                _ => true,
            }
        })
    }

    /// The value an unpopulated instance holds.
    pub fn default_value(self, definition: &str, source: &dyn TypeSource) -> Value {
        let definition = definition.trim();
        match self {
            Self::Stream => stream::default_value(definition),
            Self::SparseSet => Value::SparseSet(Default::default()),
            Self::HashTable => Value::HashTable(Default::default()),
            Self::Deck => Value::Deck(Default::default()),
            Self::Allocator => allocator::default_value(definition),
            Self::DataPointer => Value::DataPointer(Default::default()),
            Self::ReferenceCounted => reference_counted::default_value(definition, source),
            Self::Material => Value::Material(Default::default()),
        }
    }

    // -------------------------------------------------------------------------
    // Engine entry points

    pub(crate) fn write(
        self,
        ser: &mut Serializer<'_, '_>,
        definition: &str,
        field: Option<&ReflectionField>,
        value: &Value,
    ) -> Result<(), WriteError> {
        let definition = definition.trim();
        match self {
            Self::Stream => stream::write(ser, definition, value),
            Self::SparseSet => sparse_set::write(ser, definition, value),
            Self::HashTable => hash_table::write(ser, definition, value),
            Self::Deck => deck::write(ser, definition, value),
            Self::Allocator => allocator::write(ser, definition, field, value),
            Self::DataPointer => data_pointer::write(ser, definition, value),
            Self::ReferenceCounted => reference_counted::write(ser, definition, value),
            Self::Material => material::write(ser, definition, value),
        }
    }

    /// Reads one instance; `None` when the reader ignores.
    pub(crate) fn read(
        self,
        de: &mut Deserializer<'_, '_>,
        definition: &str,
        field: Option<&ReflectionField>,
    ) -> Result<Option<Value>, ReadError> {
        let definition = definition.trim();
        match self {
            Self::Stream => stream::read(de, definition),
            Self::SparseSet => sparse_set::read(de, definition),
            Self::HashTable => hash_table::read(de, definition),
            Self::Deck => deck::read(de, definition),
            Self::Allocator => allocator::read(de, definition, field),
            Self::DataPointer => data_pointer::read(de),
            Self::ReferenceCounted => reference_counted::read(de, definition),
            Self::Material => material::read(de),
        }
    }

    /// Reports every buffer an instance owns.
    pub(crate) fn visit_buffers(
        self,
        walker: &mut BufferWalker<'_, '_>,
        definition: &str,
        value: &Value,
    ) -> Result<(), crate::allocator::AllocError> {
        let definition = definition.trim();
        match self {
            Self::Stream => stream::visit_buffers(walker, definition, value),
            Self::SparseSet => sparse_set::visit_buffers(walker, definition, value),
            Self::HashTable => hash_table::visit_buffers(walker, definition, value),
            Self::Deck => deck::visit_buffers(walker, definition, value),
            Self::Allocator => allocator::visit_buffers(walker, value),
            Self::DataPointer => data_pointer::visit_buffers(walker, value),
            Self::ReferenceCounted => reference_counted::visit_buffers(walker, definition, value),
            Self::Material => material::visit_buffers(walker, value),
        }
    }

    /// Structural equality of two instances.
    pub(crate) fn compare(
        self,
        cmp: &Comparer<'_, '_>,
        definition: &str,
        a: &Value,
        b: &Value,
    ) -> bool {
        let definition = definition.trim();
        match self {
            Self::Stream => stream::compare(cmp, definition, a, b),
            Self::SparseSet => sparse_set::compare(cmp, definition, a, b),
            Self::HashTable => hash_table::compare(cmp, definition, a, b),
            Self::Deck => deck::compare(cmp, definition, a, b),
            Self::ReferenceCounted => reference_counted::compare(cmp, definition, a, b),
            Self::Allocator | Self::DataPointer | Self::Material => a == b,
        }
    }

    // -------------------------------------------------------------------------
    // Element access

    /// The number of addressable elements of an instance.
    pub fn element_count(self, value: &Value) -> usize {
        match (self, value) {
            (Self::Stream, Value::Stream(stream)) => stream.len(),
            (Self::Stream, Value::String(text)) => text.len(),
            (Self::Stream, Value::WString(units)) => units.len(),
            (Self::Stream, Value::Bytes(bytes)) => bytes.len(),
            (Self::SparseSet, Value::SparseSet(set)) => set.len(),
            (Self::HashTable, Value::HashTable(table)) => table.len(),
            (Self::Deck, Value::Deck(deck)) => deck.len(),
            _ => 0,
        }
    }

    /// The element behind `token`.
    ///
    /// Tokens are positions for streams and decks, handles for sparse sets
    /// and slots for hash tables.
    pub fn get_element(self, value: &Value, token: u32) -> Option<&Value> {
        match (self, value) {
            (Self::Stream, Value::Stream(stream)) => stream.items.get(token as usize),
            (Self::SparseSet, Value::SparseSet(set)) => set.get(token),
            (Self::HashTable, Value::HashTable(table)) => {
                table.slot(token as usize).map(|(_, value)| value)
            }
            (Self::Deck, Value::Deck(deck)) => deck.get(token as usize),
            _ => None,
        }
    }

    /// The token of the first element equal to `element`.
    pub fn find_element(self, value: &Value, element: &Value) -> Option<u32> {
        let position = match (self, value) {
            (Self::Stream, Value::Stream(stream)) => {
                stream.items.iter().position(|item| item == element)
            }
            (Self::SparseSet, Value::SparseSet(set)) => {
                return set
                    .iter()
                    .find_map(|(handle, item)| (item == element).then_some(handle));
            }
            (Self::HashTable, Value::HashTable(table)) => table
                .iter()
                .find_map(|(slot, _, item)| (item == element).then_some(slot)),
            (Self::Deck, Value::Deck(deck)) => deck.iter().position(|item| item == element),
            _ => None,
        };
        position.and_then(|position| u32::try_from(position).ok())
    }
}

// -----------------------------------------------------------------------------
// CustomTypes

/// Reports the built-in container families to a [`TypeRegistry`].
///
/// # Examples
///
/// ```
/// use vc_reflect::registry::{TypeDescriptor, TypeRegistry};
/// use vc_serialize::custom::CustomTypes;
///
/// let mut registry = TypeRegistry::new();
/// registry.add(
///     TypeDescriptor::new("Inventory")
///         .field("ids", "Stream<uint32>")
///         .field("count", "uint32"),
/// );
/// registry.resolve(&CustomTypes).unwrap();
///
/// let inventory = registry.get_type("Inventory").unwrap();
/// assert_eq!(inventory.byte_size, 24);
/// assert!(!inventory.is_blittable);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct CustomTypes;

impl CustomLayout for CustomTypes {
    #[inline]
    fn match_custom(&self, definition: &str) -> Option<u32> {
        CustomTypeHandler::find(definition).map(CustomTypeHandler::index)
    }

    fn byte_size(
        &self,
        index: u32,
        definition: &str,
        registry: &TypeRegistry,
    ) -> Option<(usize, usize)> {
        CustomTypeHandler::from_index(index)?.byte_size(definition, registry)
    }

    fn validate_tag(&self, index: u32, tag: &str) -> bool {
        CustomTypeHandler::from_index(index).is_some_and(|handler| handler.validate_tag(tag))
    }
}

#[cfg(test)]
mod tests {
    use vc_reflect::registry::{RegistryError, TypeDescriptor, TypeRegistry};
    use vc_reflect::Value;
    use vc_reflect::value::{SparseSetValue, StreamValue};

    use super::{CustomTypeHandler, CustomTypes};

    #[test]
    fn indices_are_stable() {
        for (index, handler) in CustomTypeHandler::ALL.into_iter().enumerate() {
            assert_eq!(handler.index() as usize, index);
            assert_eq!(CustomTypeHandler::from_index(index as u32), Some(handler));
        }
        assert_eq!(CustomTypeHandler::from_index(8), None);
    }

    #[test]
    fn tags_are_checked_at_registration() {
        let mut registry = TypeRegistry::new();
        registry.add(TypeDescriptor::new("Bad").tagged_field("alloc", "LinearAllocator", "ReferenceKey:x"));
        assert!(matches!(
            registry.resolve(&CustomTypes),
            Err(RegistryError::InvalidTag { .. })
        ));

        assert!(CustomTypeHandler::Allocator.validate_tag("ReferenceAllocator"));
        assert!(CustomTypeHandler::Deck.validate_tag("ReferenceKey:cards Hidden"));
        assert!(!CustomTypeHandler::Stream.validate_tag("Reference:other"));
    }

    #[test]
    fn reference_counted_waits_for_its_payload() {
        let mut registry = TypeRegistry::new();
        registry.add(TypeDescriptor::new("Holder").field("shared", "ReferenceCounted<Payload>"));
        registry.add(TypeDescriptor::new("Payload").field("a", "double").field("b", "uint8"));
        registry.resolve(&CustomTypes).unwrap();

        // 16 bytes of payload, a 4-byte count, rounded to 8.
        assert_eq!(registry.get_type("Holder").unwrap().byte_size, 24);
    }

    #[test]
    fn element_tokens() {
        let stream = Value::Stream(StreamValue::new(alloc::vec![Value::I32(4), Value::I32(5)]));
        let handler = CustomTypeHandler::Stream;
        assert_eq!(handler.find_element(&stream, &Value::I32(5)), Some(1));
        assert_eq!(handler.get_element(&stream, 1), Some(&Value::I32(5)));
        assert_eq!(handler.element_count(&stream), 2);

        let mut set = SparseSetValue::new();
        let a = set.add(Value::U8(1));
        let b = set.add(Value::U8(2));
        set.remove(a);
        let set = Value::SparseSet(set);
        assert_eq!(CustomTypeHandler::SparseSet.find_element(&set, &Value::U8(2)), Some(b));
    }
}
