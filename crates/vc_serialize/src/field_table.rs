//! The recorded layout of the types a payload holds.
//!
//! A field table is written next to the data, or stored apart from it, so
//! that a later build with different type layouts can still read the data.
//! It records every aggregate reachable from the root, with its fields, and
//! the format version of every custom type handler.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use vc_reflect::shape::DefinitionShape;
use vc_reflect::{BasicType, ReflectionField, ReflectionFieldInfo, ReflectionType, StreamKind};
use vc_utils::hash::{HashMap, HashSet};

use crate::custom::CustomTypeHandler;
use crate::definition::TypeSource;
use crate::dependencies;
use crate::error::{InstrumentError, ReadError};
use crate::instrument::{ReadInstrument, WriteInstrument};

/// `"VCFT"`.
const MAGIC: u32 = u32::from_le_bytes(*b"VCFT");

const NO_CUSTOM_SERIALIZER: u8 = 0xFF;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct TableFlags: u8 {
        const HAS_TAGS = 1;
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    struct TypeFlags: u8 {
        const BLITTABLE = 1;
    }
}

// -----------------------------------------------------------------------------
// FieldTable

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldTableField {
    pub name: String,
    pub definition: String,
    pub basic_type: BasicType,
    pub stream_type: StreamKind,
    pub byte_size: u32,
    pub pointer_offset: u32,
    pub basic_type_count: u32,
    /// Index of the [`CustomTypeHandler`] of the field.
    pub custom_serializer_index: Option<u8>,
    pub tag: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldTableType {
    pub name: String,
    pub byte_size: u32,
    pub alignment: u32,
    pub is_blittable: bool,
    pub fields: Vec<FieldTableField>,
}

/// Recorded types and handler versions.
///
/// # Examples
///
/// ```
/// use vc_reflect::registry::{TypeDescriptor, TypeRegistry};
/// use vc_serialize::custom::CustomTypes;
/// use vc_serialize::instrument::{BufferReader, BufferWriter};
/// use vc_serialize::FieldTable;
///
/// let mut registry = TypeRegistry::new();
/// registry.add(TypeDescriptor::new("Level").field("spawns", "Stream<Spawn>"));
/// registry.add(TypeDescriptor::new("Spawn").field("position", "float3").field("kind", "uint8"));
/// registry.resolve(&CustomTypes).unwrap();
///
/// let table = FieldTable::build(&registry, "Level", false);
/// assert_eq!(table.type_index("Spawn"), Some(1));
/// assert_eq!(table.field_index(1, "kind"), Some(1));
///
/// let mut out = BufferWriter::new();
/// table.write(&mut out).unwrap();
/// let read = FieldTable::read(&mut BufferReader::new(out.into_bytes())).unwrap();
/// assert_eq!(read, table);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldTable {
    pub types: Vec<FieldTableType>,
    /// One version per [`CustomTypeHandler`], in index order.
    pub versions: Vec<u32>,
}

impl Default for FieldTable {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldTable {
    /// An empty table recording the handler versions of this build.
    pub fn new() -> Self {
        Self {
            types: Vec::new(),
            versions: CustomTypeHandler::ALL.iter().map(|handler| handler.version()).collect(),
        }
    }

    /// The table of `root` and every aggregate it reaches.
    pub fn build(source: &dyn TypeSource, root: &str, include_tags: bool) -> Self {
        let mut table = Self::new();
        table.add_type(source, root, include_tags);
        table
    }

    /// Appends `root` and the aggregates it reaches that the table does not
    /// hold yet. Existing indices do not move.
    pub fn add_type(&mut self, source: &dyn TypeSource, root: &str, include_tags: bool) {
        for ty in dependencies::collect(source, root).types {
            if self.type_index(&ty.name).is_none() {
                self.types.push(FieldTableType::from_reflected(ty, include_tags));
            }
        }
    }

    #[inline]
    pub fn type_index(&self, name: &str) -> Option<usize> {
        self.types.iter().position(|ty| ty.name == name)
    }

    #[inline]
    pub fn get_type(&self, name: &str) -> Option<&FieldTableType> {
        self.types.iter().find(|ty| ty.name == name)
    }

    pub fn field_index(&self, type_index: usize, field: &str) -> Option<usize> {
        self.types
            .get(type_index)?
            .fields
            .iter()
            .position(|f| f.name == field)
    }

    /// The recorded version of `handler`.
    ///
    /// Tables from builds that predate a handler report its current version.
    pub fn version(&self, handler: CustomTypeHandler) -> u32 {
        self.versions
            .get(handler.index() as usize)
            .copied()
            .unwrap_or_else(|| handler.version())
    }

    pub(crate) fn versions(&self) -> [u32; CustomTypeHandler::COUNT] {
        CustomTypeHandler::ALL.map(|handler| self.version(handler))
    }

    // -------------------------------------------------------------------------
    // Wire format

    pub fn write(&self, out: &mut dyn WriteInstrument) -> Result<(), InstrumentError> {
        let has_tags = self
            .types
            .iter()
            .flat_map(|ty| &ty.fields)
            .any(|field| field.tag.is_some());
        let mut flags = TableFlags::empty();
        flags.set(TableFlags::HAS_TAGS, has_tags);

        out.write_u32(MAGIC)?;
        out.write_u8(flags.bits())?;
        out.write_varint(self.types.len() as u64)?;
        for ty in &self.types {
            out.write_str(&ty.name)?;
            out.write_u32(ty.byte_size)?;
            out.write_u32(ty.alignment)?;
            let mut type_flags = TypeFlags::empty();
            type_flags.set(TypeFlags::BLITTABLE, ty.is_blittable);
            out.write_u8(type_flags.bits())?;
            out.write_varint(ty.fields.len() as u64)?;

            for field in &ty.fields {
                out.write_str(&field.name)?;
                out.write_str(&field.definition)?;
                out.write_u8(field.basic_type as u8)?;
                out.write_u8(field.stream_type as u8)?;
                out.write_u32(field.byte_size)?;
                out.write_u32(field.pointer_offset)?;
                out.write_u32(field.basic_type_count)?;
                out.write_u8(field.custom_serializer_index.unwrap_or(NO_CUSTOM_SERIALIZER))?;
                if has_tags {
                    out.write_str(field.tag.as_deref().unwrap_or(""))?;
                }
            }
        }

        out.write_varint(self.versions.len() as u64)?;
        for version in &self.versions {
            out.write_u32(*version)?;
        }
        Ok(())
    }

    /// Reads and validates a table.
    pub fn read(input: &mut dyn ReadInstrument) -> Result<Self, ReadError> {
        if input.read_u32()? != MAGIC {
            return Err(corrupted("field table magic is missing"));
        }
        let flags = TableFlags::from_bits(input.read_u8()?)
            .ok_or_else(|| corrupted("unknown field table flags"))?;

        let type_count = read_count(input)?;
        let mut types = Vec::new();
        for _ in 0..type_count {
            let name = read_text(input)?;
            let byte_size = input.read_u32()?;
            let alignment = input.read_u32()?;
            let type_flags = TypeFlags::from_bits(input.read_u8()?)
                .ok_or_else(|| corrupted("unknown field table type flags"))?;

            let field_count = read_count(input)?;
            let mut fields = Vec::new();
            for _ in 0..field_count {
                let name = read_text(input)?;
                let definition = read_text(input)?;
                let basic_type = BasicType::from_u8(input.read_u8()?);
                let stream_type = StreamKind::from_u8(input.read_u8()?);
                let byte_size = input.read_u32()?;
                let pointer_offset = input.read_u32()?;
                let basic_type_count = input.read_u32()?;
                let custom_serializer_index = match input.read_u8()? {
                    NO_CUSTOM_SERIALIZER => None,
                    index => Some(index),
                };
                let tag = if flags.contains(TableFlags::HAS_TAGS) {
                    Some(read_text(input)?).filter(|tag| !tag.is_empty())
                } else {
                    None
                };
                fields.push(FieldTableField {
                    name,
                    definition,
                    basic_type,
                    stream_type,
                    byte_size,
                    pointer_offset,
                    basic_type_count,
                    custom_serializer_index,
                    tag,
                });
            }
            types.push(FieldTableType {
                name,
                byte_size,
                alignment,
                is_blittable: type_flags.contains(TypeFlags::BLITTABLE),
                fields,
            });
        }

        let version_count = read_count(input)?;
        let mut versions = Vec::new();
        for _ in 0..version_count {
            versions.push(input.read_u32()?);
        }

        let table = Self { types, versions };
        table.validate()?;
        Ok(table)
    }

    /// Checks that every recorded image can be decoded.
    pub(crate) fn validate(&self) -> Result<(), ReadError> {
        let mut names: HashSet<&str> = HashSet::default();
        for ty in &self.types {
            if !names.insert(ty.name.as_str()) {
                return Err(corrupted("field table records a type twice"));
            }
            if !ty.alignment.is_power_of_two() {
                return Err(corrupted("recorded alignment is not a power of two"));
            }
        }

        for ty in &self.types {
            for field in &ty.fields {
                if field.pointer_offset as u64 + field.byte_size as u64 > ty.byte_size as u64 {
                    return Err(corrupted("recorded field lies outside its type"));
                }
                if let DefinitionShape::BasicArray { element, count } = DefinitionShape::parse(&field.definition) {
                    let size = (element.byte_size() as u64).checked_mul(count as u64);
                    if field.stream_type != StreamKind::BasicTypeArray
                        || field.basic_type != element
                        || field.basic_type_count as usize != count
                        || size != Some(field.byte_size as u64)
                    {
                        return Err(corrupted("recorded array disagrees with its definition"));
                    }
                }
                if !ty.is_blittable {
                    continue;
                }
                let basic = field.basic_type;
                let expected = match field.stream_type {
                    StreamKind::Basic if basic.is_known() => basic.byte_size() as u64,
                    StreamKind::BasicTypeArray if basic.is_known() => {
                        basic.byte_size() as u64 * field.basic_type_count as u64
                    }
                    _ => match DefinitionShape::parse(&field.definition) {
                        DefinitionShape::Named(name) => match self.get_type(name) {
                            Some(nested) if nested.is_blittable => nested.byte_size as u64,
                            _ => return Err(corrupted("blittable type records a non-blittable field")),
                        },
                        _ => return Err(corrupted("blittable type records a non-blittable field")),
                    },
                };
                if expected != field.byte_size as u64 {
                    return Err(corrupted("recorded field size disagrees with its definition"));
                }
            }
        }

        for ty in self.types.iter().filter(|ty| ty.is_blittable) {
            self.check_acyclic(ty, &mut Vec::new())?;
        }
        Ok(())
    }

    /// Blittable types cannot contain themselves.
    fn check_acyclic<'t>(&'t self, ty: &'t FieldTableType, path: &mut Vec<&'t str>) -> Result<(), ReadError> {
        if path.contains(&ty.name.as_str()) {
            return Err(corrupted("blittable type contains itself"));
        }
        path.push(&ty.name);
        for field in &ty.fields {
            if let DefinitionShape::Named(name) = DefinitionShape::parse(&field.definition)
                && let Some(nested) = self.get_type(name)
            {
                self.check_acyclic(nested, path)?;
            }
        }
        path.pop();
        Ok(())
    }

    /// The recorded types as a [`TypeSource`].
    pub(crate) fn schema(&self) -> RecordedSchema {
        let types = self
            .types
            .iter()
            .map(|ty| (ty.name.clone(), ty.to_reflected()))
            .collect();
        RecordedSchema { types }
    }
}

impl FieldTableType {
    fn from_reflected(ty: &ReflectionType, include_tags: bool) -> Self {
        let fields = ty
            .fields
            .iter()
            .map(|field| FieldTableField {
                name: field.name.clone(),
                definition: field.definition.clone(),
                basic_type: field.info.basic_type,
                stream_type: field.info.stream_type,
                byte_size: field.info.byte_size as u32,
                pointer_offset: field.info.pointer_offset as u32,
                basic_type_count: field.info.basic_type_count as u32,
                custom_serializer_index: CustomTypeHandler::find(&field.definition)
                    .map(|handler| handler.index() as u8),
                tag: field.tag.clone().filter(|_| include_tags),
            })
            .collect();
        Self {
            name: ty.name.clone(),
            byte_size: ty.byte_size as u32,
            alignment: ty.alignment as u32,
            is_blittable: ty.is_blittable,
            fields,
        }
    }

    fn to_reflected(&self) -> ReflectionType {
        let fields = self
            .fields
            .iter()
            .map(|field| ReflectionField {
                name: field.name.clone(),
                definition: field.definition.clone(),
                tag: field.tag.clone(),
                info: ReflectionFieldInfo {
                    basic_type: field.basic_type,
                    stream_type: field.stream_type,
                    byte_size: field.byte_size as usize,
                    alignment: if field.basic_type.is_known() {
                        field.basic_type.alignment()
                    } else {
                        1
                    },
                    pointer_offset: field.pointer_offset as usize,
                    basic_type_count: field.basic_type_count as usize,
                    default_value: None,
                },
            })
            .collect();
        ReflectionType {
            name: self.name.clone(),
            fields,
            byte_size: self.byte_size as usize,
            alignment: self.alignment as usize,
            tag: None,
            is_blittable: self.is_blittable,
        }
    }
}

fn corrupted(message: &str) -> ReadError {
    ReadError::Corrupted(message.to_string())
}

fn read_count(input: &mut dyn ReadInstrument) -> Result<usize, ReadError> {
    let count = input.read_varint()?;
    let count = u32::try_from(count).map_err(|_| corrupted("field table count larger than u32::MAX"))?;
    if input.remaining().is_some_and(|remaining| count as usize > remaining) {
        return Err(corrupted("field table count larger than the remaining data"));
    }
    Ok(count as usize)
}

fn read_text(input: &mut dyn ReadInstrument) -> Result<String, ReadError> {
    input
        .read_string()?
        .ok_or_else(|| corrupted("field table text is not UTF-8"))
}

// -----------------------------------------------------------------------------
// RecordedSchema

/// The types of a field table, laid out as they were when written.
pub(crate) struct RecordedSchema {
    types: HashMap<String, ReflectionType>,
}

impl TypeSource for RecordedSchema {
    #[inline]
    fn try_get_type(&self, name: &str) -> Option<&ReflectionType> {
        self.types.get(name)
    }
}

#[cfg(test)]
mod tests {
    use vc_reflect::registry::{TypeDescriptor, TypeRegistry};

    use super::FieldTable;
    use crate::custom::{CustomTypeHandler, CustomTypes};
    use crate::definition::TypeSource;
    use crate::error::ReadError;
    use crate::instrument::{BufferReader, BufferWriter, WriteInstrument};

    fn registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry.add(
            TypeDescriptor::new("Player")
                .field("name", "Stream<char>")
                .tagged_field("items", "SparseSet<Item>", "ReferenceKey:items")
                .field("position", "float3"),
        );
        registry.add(TypeDescriptor::new("Item").field("id", "uint32").field("weight", "float"));
        registry.resolve(&CustomTypes).unwrap();
        registry
    }

    #[test]
    fn tags_are_optional() {
        let registry = registry();
        let untagged = FieldTable::build(&registry, "Player", false);
        assert!(untagged.types[0].fields[1].tag.is_none());
        assert_eq!(
            untagged.types[0].fields[1].custom_serializer_index,
            Some(CustomTypeHandler::SparseSet.index() as u8)
        );

        let tagged = FieldTable::build(&registry, "Player", true);
        let mut out = BufferWriter::new();
        tagged.write(&mut out).unwrap();
        let read = FieldTable::read(&mut BufferReader::new(out.into_bytes())).unwrap();
        assert_eq!(read.types[0].fields[1].tag.as_deref(), Some("ReferenceKey:items"));
    }

    #[test]
    fn schema_matches_registry() {
        let registry = registry();
        let schema = FieldTable::build(&registry, "Player", false).schema();
        let recorded = schema.try_get_type("Item").unwrap();
        let compiled = registry.get_type("Item").unwrap();
        assert_eq!(recorded.byte_size, compiled.byte_size);
        assert_eq!(recorded.fields[1].info, compiled.fields[1].info);
        assert!(recorded.is_blittable);
    }

    #[test]
    fn rejects_garbage() {
        let mut out = BufferWriter::new();
        out.write_u32(0xDEAD_BEEF).unwrap();
        assert!(matches!(
            FieldTable::read(&mut BufferReader::new(out.into_bytes())),
            Err(ReadError::Corrupted(_))
        ));

        let mut table = FieldTable::build(&registry(), "Player", false);
        let item = table.type_index("Item").unwrap();
        table.types[item].fields[1].pointer_offset = 64;
        let mut out = BufferWriter::new();
        table.write(&mut out).unwrap();
        assert!(matches!(
            FieldTable::read(&mut BufferReader::new(out.into_bytes())),
            Err(ReadError::Corrupted(_))
        ));
    }

    #[test]
    fn rejects_impossible_layouts() {
        let mut table = FieldTable::build(&registry(), "Player", false);
        let item = table.type_index("Item").unwrap();
        table.types[item].alignment = 0;
        assert!(matches!(table.validate(), Err(ReadError::Corrupted(_))));
        table.types[item].alignment = 6;
        assert!(matches!(table.validate(), Err(ReadError::Corrupted(_))));
        table.types[item].alignment = 4;
        assert!(table.validate().is_ok());

        // An array whose count outgrows what the field records.
        let player = table.type_index("Player").unwrap();
        let position = &mut table.types[player].fields[2];
        position.definition = "float[4000000000]".into();
        assert!(matches!(table.validate(), Err(ReadError::Corrupted(_))));
    }

    #[test]
    fn settings_dump() {
        let table = FieldTable::build(&registry(), "Player", false);
        let text = serde_json::to_string(&table).unwrap();
        assert_eq!(serde_json::from_str::<FieldTable>(&text).unwrap(), table);
    }
}
