//! The read engine.

use alloc::vec;

use vc_reflect::Value;

use crate::allocator::{Allocator, Charge, Ledger};
use crate::custom::CustomTypeHandler;
use crate::definition::{DefinitionResolver, TypeSource};
use crate::dependencies::missing_dependent_types;
use crate::error::ReadError;
use crate::field_table::FieldTable;
use crate::instrument::ReadInstrument;
use crate::layout::default_value;
use crate::ops::BufferWalker;
use crate::options::{ReadMode, ReadOptions};

// -----------------------------------------------------------------------------
// Modules

mod adapt;
mod fundamental;
mod reader;

// -----------------------------------------------------------------------------
// Exports

pub(crate) use adapt::Schemas;
pub(crate) use reader::Deserializer;

// -----------------------------------------------------------------------------
// Entry points

/// Reads an instance of the aggregate `type_name`.
///
/// The data is laid out as by [`serialize`](crate::serialize): header, the
/// optional field table, then the root. When a field table is present,
/// in the data or in [`ReadOptions::field_table`], the data may come from a
/// build with a different layout of the same types.
///
/// Every buffer of the result is charged to
/// [`field_allocator`](ReadOptions::field_allocator). In
/// [`ReadMode::Ignore`] the source is skipped and the default value of
/// `type_name` is returned.
///
/// # Examples
///
/// ```
/// use vc_reflect::registry::{TypeDescriptor, TypeRegistry};
/// use vc_reflect::{StructValue, Value};
/// use vc_serialize::custom::CustomTypes;
/// use vc_serialize::instrument::{BufferReader, BufferWriter};
/// use vc_serialize::{deserialize, serialize, ReadOptions, TrackingAllocator};
///
/// let mut registry = TypeRegistry::new();
/// registry.add(TypeDescriptor::new("Path").field("points", "Stream<float2>"));
/// registry.resolve(&CustomTypes).unwrap();
///
/// let points = (0..4).map(|i| Value::Array(vec![Value::F32(i as f32), Value::F32(1.0)]));
/// let path = Value::Struct(StructValue::new("Path").with("points", Value::Stream(points.collect())));
///
/// let mut out = BufferWriter::new();
/// serialize(&registry, "Path", &path, &mut out, &Default::default()).unwrap();
///
/// let allocator = TrackingAllocator::new();
/// let options = ReadOptions { field_allocator: &allocator, ..Default::default() };
/// let read = deserialize(&registry, "Path", &mut BufferReader::new(out.into_bytes()), &options).unwrap();
/// assert_eq!(read, path);
/// assert_eq!(allocator.live_bytes(), 4 * 8);
/// ```
pub fn deserialize(
    source: &dyn TypeSource,
    type_name: &str,
    instrument: &mut dyn ReadInstrument,
    options: &ReadOptions<'_>,
) -> Result<Value, ReadError> {
    let value = read_root(source, type_name, instrument, options, options.mode)?;
    let Some(value) = value else {
        return Ok(default_value(type_name, source));
    };

    let resolver = DefinitionResolver::new(source);
    let native = options.settings.use_container_native_allocator;
    let charged = charge(&resolver, native, type_name, &value, options.field_allocator).or_else(|err| {
        let backup = options.backup_allocator.ok_or(err)?;
        log::debug!("field allocator refused `{type_name}` ({err}), using the backup allocator");
        charge(&resolver, native, type_name, &value, backup)
    });
    match charged {
        Ok(bytes) => {
            log::debug!("`{type_name}` owns {bytes} charged bytes");
            Ok(value)
        }
        Err(err) => Err(ReadError::AllocationFailed(err)),
    }
}

/// Skips an instance of `type_name`, returning the number of bytes it
/// occupies, header and field table included.
///
/// Nothing is allocated.
pub fn ignore_deserialize(
    source: &dyn TypeSource,
    type_name: &str,
    instrument: &mut dyn ReadInstrument,
    options: &ReadOptions<'_>,
) -> Result<usize, ReadError> {
    let start = instrument.offset();
    read_root(source, type_name, instrument, options, ReadMode::Ignore)?;
    Ok(instrument.offset() - start)
}

/// Reads the file at `path`.
///
/// The file buffer is charged to [`ReadOptions::file_allocator`] for the
/// duration of the call.
#[cfg(feature = "std")]
pub fn deserialize_from_file(
    source: &dyn TypeSource,
    type_name: &str,
    path: impl AsRef<std::path::Path>,
    options: &ReadOptions<'_>,
) -> Result<Value, ReadError> {
    use alloc::string::ToString;

    use crate::instrument::BufferReader;

    let path = path.as_ref();
    let contents = std::fs::read(path).map_err(|err| {
        log::debug!("reading `{}` failed: {err}", path.display());
        ReadError::CouldNotOpen(path.display().to_string())
    })?;

    let mut file = Ledger::new(options.file_allocator);
    file.charge(Charge {
        size: contents.len(),
        align: 8,
    })?;
    deserialize(source, type_name, &mut BufferReader::new(contents), options)
}

/// Reads a stand-alone field table.
#[inline]
pub fn read_field_table(instrument: &mut dyn ReadInstrument) -> Result<FieldTable, ReadError> {
    FieldTable::read(instrument)
}

// -----------------------------------------------------------------------------
// Internals

/// Header, field table and root; `None` in ignore mode.
fn read_root(
    source: &dyn TypeSource,
    type_name: &str,
    instrument: &mut dyn ReadInstrument,
    options: &ReadOptions<'_>,
    mode: ReadMode,
) -> Result<Option<Value>, ReadError> {
    let settings = &options.settings;
    let start = instrument.offset();
    log::debug!("deserializing `{type_name}` ({mode:?})");

    let header = instrument.read_vec(settings.header_size)?;
    if let Some(validate) = options.validate_header
        && !validate(header.as_slice())
    {
        return Err(ReadError::InvalidHeader);
    }

    let embedded;
    let table = if settings.read_type_table {
        embedded = FieldTable::read(instrument)?;
        Some(&embedded)
    } else {
        if let Some(supplied) = options.field_table {
            supplied.validate()?;
        }
        options.field_table
    };

    if let Some(table) = table {
        for handler in CustomTypeHandler::ALL {
            let version = table.version(handler);
            if version > handler.version() {
                return Err(ReadError::UnknownVersion {
                    handler: handler.name(),
                    version,
                });
            }
        }
    }

    if source.try_get_type(type_name).is_none() {
        return Err(ReadError::MissingDependentTypes(vec![type_name.into()]));
    }
    if settings.verify_dependent_types {
        let missing = missing_dependent_types(source, type_name);
        if !missing.is_empty() {
            return Err(ReadError::MissingDependentTypes(missing));
        }
    }

    let recorded_schema = table.map(FieldTable::schema);
    let compiled = DefinitionResolver::new(source);
    let recorded = match &recorded_schema {
        Some(schema) => DefinitionResolver::new(schema),
        None => DefinitionResolver::new(source),
    };
    let root = recorded
        .try_get_type(type_name)
        .ok_or_else(|| ReadError::MissingDependentTypes(vec![type_name.into()]))?;

    let schemas = Schemas {
        compiled: &compiled,
        recorded: &recorded,
        has_table: table.is_some(),
        fail_if_mismatch: settings.fail_if_field_mismatch,
    };
    let versions = table.map_or(CustomTypeHandler::ALL.map(CustomTypeHandler::version), |table| {
        table.versions()
    });

    let mut de = Deserializer::new(
        schemas,
        &mut *instrument,
        settings,
        mode,
        versions,
        options.asset_resolver,
    );
    let value = de.read_struct(root);
    drop(de);

    match &value {
        Ok(_) => log::debug!(
            "deserialized `{type_name}` from {} bytes",
            instrument.offset() - start
        ),
        Err(err) => log::debug!("deserialization of `{type_name}` failed: {err}"),
    }
    value
}

/// Charges every buffer of `value` to `allocator`, all or nothing.
fn charge(
    resolver: &DefinitionResolver<'_>,
    native: bool,
    type_name: &str,
    value: &Value,
    allocator: &dyn Allocator,
) -> Result<usize, crate::allocator::AllocError> {
    let mut ledger = Ledger::new(allocator);
    BufferWalker::new(resolver, native, &mut |charge: Charge| ledger.charge(charge)).value(type_name, value)?;
    Ok(ledger.commit())
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use vc_reflect::registry::{TypeDescriptor, TypeRegistry};
    use vc_reflect::value::StreamValue;
    use vc_reflect::{StructValue, Value};

    use super::{deserialize, ignore_deserialize, read_field_table};
    use crate::allocator::TrackingAllocator;
    use crate::custom::{CustomTypeHandler, CustomTypes};
    use crate::error::{ReadError, ReadStatus};
    use crate::field_table::FieldTable;
    use crate::instrument::{BufferReader, BufferWriter};
    use crate::options::{ReadOptions, ReadSettings, WriteOptions, WriteSettings};
    use crate::ser::{build_field_table, serialize, write_field_table};

    fn registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry.add(
            TypeDescriptor::new("Log")
                .field("lines", "Stream<Stream<char>>")
                .field("level", "uint8"),
        );
        registry.resolve(&CustomTypes).unwrap();
        registry
    }

    fn log_value() -> Value {
        let lines = ["boot", "", "ready"]
            .into_iter()
            .map(|line| Value::String(line.into()))
            .collect::<StreamValue>();
        Value::Struct(
            StructValue::new("Log")
                .with("lines", Value::Stream(lines))
                .with("level", Value::U8(3)),
        )
    }

    fn write(options: &WriteOptions<'_>) -> BufferWriter {
        let mut out = BufferWriter::new();
        serialize(&registry(), "Log", &log_value(), &mut out, options).unwrap();
        out
    }

    #[test]
    fn header_is_validated() {
        let out = write(&WriteOptions {
            header: b"LOG1",
            ..Default::default()
        });
        let bytes = out.into_bytes();
        let accept = |header: &[u8]| header == b"LOG1";
        let reject = |_: &[u8]| false;

        let mut options = ReadOptions {
            validate_header: Some(&accept),
            ..Default::default()
        };
        options.settings.header_size = 4;
        let read = deserialize(&registry(), "Log", &mut BufferReader::new(bytes.clone()), &options).unwrap();
        assert_eq!(read, log_value());

        options.validate_header = Some(&reject);
        let err = deserialize(&registry(), "Log", &mut BufferReader::new(bytes), &options).unwrap_err();
        assert_eq!(err.status(), ReadStatus::InvalidHeader);
    }

    #[test]
    fn stand_alone_table() {
        let registry = registry();
        let mut table_out = BufferWriter::new();
        write_field_table(&build_field_table(&registry, "Log", false), &mut table_out).unwrap();
        let table = read_field_table(&mut BufferReader::new(table_out.into_bytes())).unwrap();

        let out = write(&WriteOptions {
            settings: WriteSettings {
                write_type_table: false,
                ..Default::default()
            },
            ..Default::default()
        });
        let options = ReadOptions {
            settings: ReadSettings {
                read_type_table: false,
                ..Default::default()
            },
            field_table: Some(&table),
            ..Default::default()
        };
        let read = deserialize(&registry, "Log", &mut BufferReader::new(out.into_bytes()), &options).unwrap();
        assert_eq!(read, log_value());
    }

    #[test]
    fn newer_handler_versions_are_rejected() {
        let registry = registry();
        let mut table = FieldTable::build(&registry, "Log", false);
        table.versions[CustomTypeHandler::Stream.index() as usize] += 1;
        let options = ReadOptions {
            settings: ReadSettings {
                read_type_table: false,
                ..Default::default()
            },
            field_table: Some(&table),
            ..Default::default()
        };
        let out = write(&WriteOptions {
            settings: WriteSettings {
                write_type_table: false,
                ..Default::default()
            },
            ..Default::default()
        });
        let err = deserialize(&registry, "Log", &mut BufferReader::new(out.into_bytes()), &options).unwrap_err();
        assert!(matches!(err, ReadError::UnknownVersion { handler: "Stream", .. }));
        assert_eq!(err.status(), ReadStatus::FieldTypeMismatch);
    }

    #[test]
    fn allocation_falls_back_to_backup() {
        let bytes = write(&Default::default()).into_bytes();
        let small = TrackingAllocator::with_limit(4);
        let backup = TrackingAllocator::new();

        let options = ReadOptions {
            field_allocator: &small,
            ..Default::default()
        };
        let err = deserialize(&registry(), "Log", &mut BufferReader::new(bytes.clone()), &options).unwrap_err();
        assert!(matches!(err, ReadError::AllocationFailed(_)));
        assert_eq!(small.live_bytes(), 0);

        let options = ReadOptions {
            field_allocator: &small,
            backup_allocator: Some(&backup),
            ..Default::default()
        };
        deserialize(&registry(), "Log", &mut BufferReader::new(bytes), &options).unwrap();
        assert_eq!(small.live_bytes(), 0);
        assert!(backup.live_bytes() > 0);
    }

    #[test]
    fn ignore_reports_consumed_bytes() {
        let out = write(&Default::default());
        let len = out.as_slice().len();
        let mut input = BufferReader::new(out.into_bytes());
        assert_eq!(
            ignore_deserialize(&registry(), "Log", &mut input, &Default::default()).unwrap(),
            len
        );
        let mut truncated = BufferReader::new(vec![0_u8; 3]);
        let err = ignore_deserialize(&registry(), "Log", &mut truncated, &Default::default()).unwrap_err();
        assert_eq!(err.status(), ReadStatus::CorruptedFile);
    }
}
