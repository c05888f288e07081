//! Per-call options.
//!
//! The plain-data part of each option set ([`WriteSettings`], [`ReadSettings`])
//! implements `serde`, so it can live in a configuration file. The rest holds
//! borrowed collaborators and is built in code.

use serde::{Deserialize, Serialize};

use crate::allocator::{Allocator, GlobalAllocator};
use crate::field_table::FieldTable;
use crate::passdown::AssetResolver;

static GLOBAL: GlobalAllocator = GlobalAllocator;

// -----------------------------------------------------------------------------
// Write

/// Serializable write switches.
///
/// # Examples
///
/// ```
/// use vc_serialize::WriteSettings;
///
/// let settings: WriteSettings = serde_json::from_str(r#"{ "write_type_table": false }"#).unwrap();
/// assert!(!settings.write_type_table);
/// assert!(settings.verify_dependent_types);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WriteSettings {
    /// Embed the field table after the header.
    pub write_type_table: bool,
    /// Fail with `MissingDependentTypes` before writing anything.
    pub verify_dependent_types: bool,
    /// Record field tags in the embedded field table.
    pub write_type_table_tags: bool,
    /// Write blittable aggregates field by field instead of as one image.
    pub disable_blittable_fast_path: bool,
    /// Write sparse sets as plain streams.
    pub legacy_sparse_sets: bool,
}

impl Default for WriteSettings {
    fn default() -> Self {
        Self {
            write_type_table: true,
            verify_dependent_types: true,
            write_type_table_tags: false,
            disable_blittable_fast_path: false,
            legacy_sparse_sets: false,
        }
    }
}

/// Options of one serialize call.
pub struct WriteOptions<'a> {
    /// Opaque bytes written before everything else.
    pub header: &'a [u8],
    pub settings: WriteSettings,
    pub asset_resolver: Option<&'a dyn AssetResolver>,
    /// Charged for the staging buffer of file writes.
    pub allocator: &'a dyn Allocator,
}

impl Default for WriteOptions<'_> {
    fn default() -> Self {
        Self {
            header: &[],
            settings: WriteSettings::default(),
            asset_resolver: None,
            allocator: &GLOBAL,
        }
    }
}

// -----------------------------------------------------------------------------
// Read

/// How a read treats the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ReadMode {
    /// Build the value; byte payloads may share the source buffer.
    #[default]
    Materialize,
    /// Advance past the data without building or allocating anything.
    Ignore,
    /// Build the value, copying every byte payload out of the source.
    ForceAllocate,
}

/// Serializable read switches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadSettings {
    /// The data embeds a field table after the header.
    pub read_type_table: bool,
    /// Treat any difference between recorded and compiled layouts as an error.
    pub fail_if_field_mismatch: bool,
    pub verify_dependent_types: bool,
    /// Do not charge resizable containers to the field allocator.
    pub use_container_native_allocator: bool,
    /// Bytes of caller header before the field table.
    pub header_size: usize,
    /// Sparse sets were written as plain streams.
    pub legacy_sparse_sets: bool,
}

impl Default for ReadSettings {
    fn default() -> Self {
        Self {
            read_type_table: true,
            fail_if_field_mismatch: false,
            verify_dependent_types: true,
            use_container_native_allocator: false,
            header_size: 0,
            legacy_sparse_sets: false,
        }
    }
}

/// Options of one deserialize call.
pub struct ReadOptions<'a> {
    pub settings: ReadSettings,
    pub mode: ReadMode,
    /// A stand-alone field table for data that does not embed one.
    pub field_table: Option<&'a FieldTable>,
    /// Receives the header; returning `false` fails with `InvalidHeader`.
    pub validate_header: Option<&'a dyn Fn(&[u8]) -> bool>,
    pub asset_resolver: Option<&'a dyn AssetResolver>,
    /// Charged for the whole file buffer of file reads.
    pub file_allocator: &'a dyn Allocator,
    /// Charged for every materialized buffer.
    pub field_allocator: &'a dyn Allocator,
    /// Charged instead when the field allocator refuses.
    pub backup_allocator: Option<&'a dyn Allocator>,
}

impl Default for ReadOptions<'_> {
    fn default() -> Self {
        Self {
            settings: ReadSettings::default(),
            mode: ReadMode::default(),
            field_table: None,
            validate_header: None,
            asset_resolver: None,
            file_allocator: &GLOBAL,
            field_allocator: &GLOBAL,
            backup_allocator: None,
        }
    }
}

// -----------------------------------------------------------------------------
// Copy & Deallocate

/// Options of [`copy_value`](crate::copy_value).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CopyOptions {
    /// Release the buffers of the destination before overwriting it.
    pub deallocate_existing: bool,
    /// Replace allocator fields of the destination with the source's.
    /// Otherwise the destination keeps its own allocators.
    pub overwrite_allocators: bool,
}

/// Options of [`deallocate_value`](crate::deallocate_value).
///
/// Must match the [`ReadSettings`] of the read that produced the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeallocateOptions {
    pub use_container_native_allocator: bool,
}

impl From<&ReadSettings> for DeallocateOptions {
    #[inline]
    fn from(settings: &ReadSettings) -> Self {
        Self {
            use_container_native_allocator: settings.use_container_native_allocator,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ReadMode, ReadSettings, WriteSettings};

    #[test]
    fn settings_from_ron() {
        let settings: ReadSettings = ron::from_str(
            "(fail_if_field_mismatch: true, header_size: 16, legacy_sparse_sets: true)",
        )
        .unwrap();
        assert!(settings.fail_if_field_mismatch);
        assert!(settings.read_type_table);
        assert_eq!(settings.header_size, 16);

        let text = ron::to_string(&settings).unwrap();
        assert_eq!(ron::from_str::<ReadSettings>(&text).unwrap(), settings);
    }

    #[test]
    fn settings_from_json() {
        let settings: WriteSettings =
            serde_json::from_str(r#"{ "disable_blittable_fast_path": true }"#).unwrap();
        assert!(settings.disable_blittable_fast_path);
        assert!(settings.write_type_table);

        let mode: ReadMode = serde_json::from_str(r#""ForceAllocate""#).unwrap();
        assert_eq!(mode, ReadMode::ForceAllocate);
    }
}
