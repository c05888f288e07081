use alloc::string::String;
use alloc::vec::Vec;

use thiserror::Error;

use crate::allocator::AllocError;

// -----------------------------------------------------------------------------
// InstrumentError

/// A failure of the byte sink or source itself.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum InstrumentError {
    #[error("requested {requested} bytes but only {remaining} remain")]
    UnexpectedEnd { requested: usize, remaining: usize },

    #[error("variable-length integer does not fit in 64 bits")]
    VarintOverflow,

    #[error("the instrument refused more data")]
    Full,

    #[error("i/o failure: {0}")]
    Io(String),
}

// -----------------------------------------------------------------------------
// Status codes

/// The flattened outcome of a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteStatus {
    Ok,
    CouldNotOpenOrWrite,
    MissingDependentTypes,
}

/// The flattened outcome of a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadStatus {
    Ok,
    CouldNotOpenOrRead,
    MissingDependentTypes,
    InvalidHeader,
    FieldTypeMismatch,
    CorruptedFile,
}

// -----------------------------------------------------------------------------
// WriteError

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum WriteError {
    #[error(transparent)]
    Instrument(#[from] InstrumentError),

    #[error("could not open `{0}` for writing")]
    CouldNotOpen(String),

    #[error("missing dependent types: {0:?}")]
    MissingDependentTypes(Vec<String>),

    #[error("`{0}` does not resolve to a type")]
    UnknownType(String),

    #[error("value of kind `{found}` does not fit definition `{definition}`")]
    MismatchedValue {
        definition: String,
        found: &'static str,
    },

    #[error("value of `{type_name}` has no field `{field}`")]
    MissingField { type_name: String, field: String },

    #[error("reference `{key}` does not resolve: {reason}")]
    UnresolvedReference { key: String, reason: &'static str },

    #[error(transparent)]
    AllocationFailed(#[from] AllocError),
}

impl WriteError {
    /// The result code this error reports as.
    ///
    /// Values that do not match their definitions cannot be written, so
    /// they report the same code as a failing sink.
    pub fn status(&self) -> WriteStatus {
        match self {
            Self::MissingDependentTypes(_) | Self::UnknownType(_) => {
                WriteStatus::MissingDependentTypes
            }
            _ => WriteStatus::CouldNotOpenOrWrite,
        }
    }
}

// -----------------------------------------------------------------------------
// ReadError

#[derive(Debug, Error, Clone, PartialEq)]
#[non_exhaustive]
pub enum ReadError {
    #[error(transparent)]
    Instrument(#[from] InstrumentError),

    #[error("could not open `{0}` for reading")]
    CouldNotOpen(String),

    #[error("missing dependent types: {0:?}")]
    MissingDependentTypes(Vec<String>),

    #[error("the header was rejected")]
    InvalidHeader,

    #[error("field `{field}` of `{type_name}` does not match the recorded layout")]
    FieldTypeMismatch { type_name: String, field: String },

    #[error("{handler} version {version} is not supported")]
    UnknownVersion { handler: &'static str, version: u32 },

    #[error("corrupted data: {0}")]
    Corrupted(String),

    #[error(transparent)]
    AllocationFailed(#[from] AllocError),
}

impl ReadError {
    /// The result code this error reports as.
    ///
    /// Running out of input is corruption; other instrument failures are
    /// read failures. An unknown handler version is a layout mismatch.
    pub fn status(&self) -> ReadStatus {
        match self {
            Self::Instrument(InstrumentError::UnexpectedEnd { .. })
            | Self::Instrument(InstrumentError::VarintOverflow)
            | Self::Corrupted(_) => ReadStatus::CorruptedFile,
            Self::Instrument(_) | Self::CouldNotOpen(_) | Self::AllocationFailed(_) => {
                ReadStatus::CouldNotOpenOrRead
            }
            Self::MissingDependentTypes(_) => ReadStatus::MissingDependentTypes,
            Self::InvalidHeader => ReadStatus::InvalidHeader,
            Self::FieldTypeMismatch { .. } | Self::UnknownVersion { .. } => {
                ReadStatus::FieldTypeMismatch
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use super::{InstrumentError, ReadError, ReadStatus, WriteError, WriteStatus};

    #[test]
    fn status_codes() {
        let truncated = ReadError::from(InstrumentError::UnexpectedEnd {
            requested: 4,
            remaining: 1,
        });
        assert_eq!(truncated.status(), ReadStatus::CorruptedFile);
        assert_eq!(
            ReadError::from(InstrumentError::Io("denied".to_string())).status(),
            ReadStatus::CouldNotOpenOrRead
        );
        assert_eq!(
            ReadError::UnknownVersion {
                handler: "DataPointer",
                version: 2
            }
            .status(),
            ReadStatus::FieldTypeMismatch
        );
        assert_eq!(
            WriteError::UnknownType("Missing".to_string()).status(),
            WriteStatus::MissingDependentTypes
        );
        assert_eq!(
            WriteError::from(InstrumentError::Full).status(),
            WriteStatus::CouldNotOpenOrWrite
        );
    }
}
