//! The write engine.

use crate::custom::{CustomTypeHandler, SPARSE_SET_LEGACY_VERSION};
use crate::definition::{DefinitionResolver, TypeSource};
use crate::dependencies::missing_dependent_types;
use crate::error::WriteError;
use crate::field_table::FieldTable;
use crate::instrument::{SizeDetermination, WriteInstrument};
use crate::options::WriteOptions;

// -----------------------------------------------------------------------------
// Modules

mod fundamental;
mod writer;

// -----------------------------------------------------------------------------
// Exports

pub(crate) use writer::Serializer;

// -----------------------------------------------------------------------------
// Entry points

/// Writes `value`, an instance of the aggregate `type_name`.
///
/// The output is the caller header, the field table if
/// [`write_type_table`](crate::WriteSettings::write_type_table) is set, then
/// the fields of the root in declaration order. A failed write may leave
/// partial output behind.
///
/// # Examples
///
/// ```
/// use vc_reflect::registry::{TypeDescriptor, TypeRegistry};
/// use vc_reflect::{StructValue, Value};
/// use vc_serialize::custom::CustomTypes;
/// use vc_serialize::instrument::BufferWriter;
/// use vc_serialize::{serialize, serialize_size, WriteOptions, WriteSettings};
///
/// let mut registry = TypeRegistry::new();
/// registry.add(TypeDescriptor::new("Counter").field("value", "uint32"));
/// registry.resolve(&CustomTypes).unwrap();
///
/// let value = Value::Struct(StructValue::new("Counter").with("value", Value::U32(7)));
/// let options = WriteOptions {
///     settings: WriteSettings { write_type_table: false, ..Default::default() },
///     ..Default::default()
/// };
///
/// let mut out = BufferWriter::new();
/// serialize(&registry, "Counter", &value, &mut out, &options).unwrap();
/// assert_eq!(out.as_slice(), [7, 0, 0, 0]);
/// assert_eq!(serialize_size(&registry, "Counter", &value, &options).unwrap(), 4);
/// ```
pub fn serialize(
    source: &dyn TypeSource,
    type_name: &str,
    value: &vc_reflect::Value,
    instrument: &mut dyn WriteInstrument,
    options: &WriteOptions<'_>,
) -> Result<(), WriteError> {
    let root = source
        .try_get_type(type_name)
        .ok_or_else(|| WriteError::UnknownType(type_name.into()))?;

    let settings = &options.settings;
    if settings.verify_dependent_types {
        let missing = missing_dependent_types(source, type_name);
        if !missing.is_empty() {
            return Err(WriteError::MissingDependentTypes(missing));
        }
    }

    let start = instrument.offset();
    log::debug!("serializing `{type_name}`");

    instrument.write(options.header)?;
    if settings.write_type_table {
        let table = build_field_table(source, type_name, settings.write_type_table_tags);
        record_versions(table, settings.legacy_sparse_sets).write(instrument)?;
    }

    let resolver = DefinitionResolver::new(source);
    let mut ser = Serializer::new(&resolver, instrument, settings, options.asset_resolver);
    if let Err(err) = ser.write_struct(root, value) {
        ser.report_failure(&err);
        return Err(err);
    }
    drop(ser);

    log::debug!(
        "serialized `{type_name}` in {} bytes",
        instrument.offset() - start
    );
    Ok(())
}

/// The number of bytes [`serialize`] produces for the same arguments.
pub fn serialize_size(
    source: &dyn TypeSource,
    type_name: &str,
    value: &vc_reflect::Value,
    options: &WriteOptions<'_>,
) -> Result<usize, WriteError> {
    let mut counter = SizeDetermination::new();
    serialize(source, type_name, value, &mut counter, options)?;
    Ok(counter.size())
}

/// Serializes into the file at `path`, replacing it.
///
/// The output is staged in memory first; the staging buffer is charged to
/// [`WriteOptions::allocator`] while the call runs.
#[cfg(feature = "std")]
pub fn serialize_to_file(
    source: &dyn TypeSource,
    type_name: &str,
    value: &vc_reflect::Value,
    path: impl AsRef<std::path::Path>,
    options: &WriteOptions<'_>,
) -> Result<(), WriteError> {
    use alloc::string::ToString;

    use crate::allocator::{Charge, Ledger};
    use crate::instrument::BufferWriter;

    let path = path.as_ref();
    let size = serialize_size(source, type_name, value, options)?;

    let mut staging = Ledger::new(options.allocator);
    staging.charge(Charge { size, align: 8 })?;

    let mut out = BufferWriter::new();
    serialize(source, type_name, value, &mut out, options)?;
    std::fs::write(path, out.as_slice()).map_err(|err| {
        log::debug!("writing `{}` failed: {err}", path.display());
        WriteError::CouldNotOpen(path.display().to_string())
    })
}

// -----------------------------------------------------------------------------
// Field tables

/// The field table of `type_name` with the handler versions of this build.
#[inline]
pub fn build_field_table(source: &dyn TypeSource, type_name: &str, include_tags: bool) -> FieldTable {
    FieldTable::build(source, type_name, include_tags)
}

/// Writes a stand-alone field table.
pub fn write_field_table(table: &FieldTable, instrument: &mut dyn WriteInstrument) -> Result<(), WriteError> {
    table.write(instrument)?;
    Ok(())
}

/// Records the sparse set format the payload uses.
fn record_versions(mut table: FieldTable, legacy_sparse_sets: bool) -> FieldTable {
    if legacy_sparse_sets {
        let index = CustomTypeHandler::SparseSet.index() as usize;
        if table.versions.len() <= index {
            table.versions.resize(index + 1, 0);
        }
        table.versions[index] = SPARSE_SET_LEGACY_VERSION;
    }
    table
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use vc_reflect::registry::{TypeDescriptor, TypeRegistry};
    use vc_reflect::value::StreamValue;
    use vc_reflect::{StructValue, Value};

    use super::{serialize, serialize_size};
    use crate::custom::{CustomTypeHandler, CustomTypes, SPARSE_SET_LEGACY_VERSION};
    use crate::error::{WriteError, WriteStatus};
    use crate::field_table::FieldTable;
    use crate::instrument::{BufferReader, BufferWriter, ReadInstrument};
    use crate::options::{WriteOptions, WriteSettings};

    fn registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry.add(
            TypeDescriptor::new("Team")
                .field("members", "SparseSet<uint16>")
                .field("score", "int"),
        );
        registry.add(TypeDescriptor::new("Broken").field("parts", "Stream<Part>"));
        registry.resolve(&CustomTypes).unwrap();
        registry
    }

    #[test]
    fn header_then_table_then_payload() {
        let registry = registry();
        let team = Value::Struct(
            StructValue::new("Team")
                .with("members", Value::SparseSet(Default::default()))
                .with("score", Value::I32(-2)),
        );
        let options = WriteOptions {
            header: b"HDR!",
            settings: WriteSettings {
                legacy_sparse_sets: true,
                ..Default::default()
            },
            ..Default::default()
        };

        let mut out = BufferWriter::new();
        serialize(&registry, "Team", &team, &mut out, &options).unwrap();
        assert_eq!(&out.as_slice()[..4], b"HDR!");
        assert_eq!(
            serialize_size(&registry, "Team", &team, &options).unwrap(),
            out.as_slice().len()
        );

        let mut input = BufferReader::new(out.into_bytes());
        input.ignore(4).unwrap();
        let table = FieldTable::read(&mut input).unwrap();
        assert_eq!(table.version(CustomTypeHandler::SparseSet), SPARSE_SET_LEGACY_VERSION);
        assert_eq!(table.types[0].name, "Team");
        // Empty legacy sparse set, then the score.
        assert_eq!(input.chunk(), [0, 0xFE, 0xFF, 0xFF, 0xFF]);
    }

    #[test]
    fn missing_types_write_nothing() {
        let registry = registry();
        let value = Value::Struct(
            StructValue::new("Broken").with("parts", Value::Stream(StreamValue::new(vec![]))),
        );
        let mut out = BufferWriter::new();
        let err = serialize(&registry, "Broken", &value, &mut out, &Default::default()).unwrap_err();
        assert_eq!(err, WriteError::MissingDependentTypes(vec!["Part".into()]));
        assert_eq!(err.status(), WriteStatus::MissingDependentTypes);
        assert!(out.as_slice().is_empty());

        let err = serialize(&registry, "Nothing", &value, &mut out, &Default::default()).unwrap_err();
        assert_eq!(err.status(), WriteStatus::MissingDependentTypes);
    }
}
