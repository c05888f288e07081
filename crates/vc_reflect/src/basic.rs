//! The basic type table.
//!
//! A basic type is a scalar or a small fixed vector of scalars. Its byte
//! representation is always little-endian and always blittable.

use serde::{Deserialize, Serialize};

// -----------------------------------------------------------------------------
// ScalarKind

/// The component type of a [`BasicType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Bool,
    I8,
    U8,
    I16,
    U16,
    I32,
    U32,
    I64,
    U64,
    F32,
    F64,
}

impl ScalarKind {
    /// Returns the size of one component in bytes.
    #[inline]
    pub const fn byte_size(self) -> usize {
        match self {
            Self::Bool | Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
        }
    }

    /// Returns `true` for `F32` and `F64`.
    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }
}

// -----------------------------------------------------------------------------
// BasicType

macro_rules! basic_types {
    ($($variant:ident = $tag:literal => $name:literal, $scalar:ident, $count:literal;)*) => {
        /// A basic (non-aggregate) field type.
        ///
        /// The discriminant is the tag recorded in field tables.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[repr(u8)]
        pub enum BasicType {
            $($variant = $tag,)*
            /// Not a basic type: an aggregate, a custom container, or unresolved.
            Unknown = 0xFF,
        }

        impl BasicType {
            /// All basic types, excluding [`BasicType::Unknown`].
            pub const ALL: &'static [BasicType] = &[$(BasicType::$variant,)*];

            /// The canonical definition string of the type.
            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)*
                    Self::Unknown => "unknown",
                }
            }

            /// The component type.
            ///
            /// [`BasicType::Unknown`] reports `U8`; callers check [`is_known`](Self::is_known) first.
            pub const fn scalar(self) -> ScalarKind {
                match self {
                    $(Self::$variant => ScalarKind::$scalar,)*
                    Self::Unknown => ScalarKind::U8,
                }
            }

            /// The number of components, `1` for scalars.
            pub const fn components(self) -> usize {
                match self {
                    $(Self::$variant => $count,)*
                    Self::Unknown => 0,
                }
            }

            /// Decodes a tag recorded in a field table.
            pub const fn from_u8(tag: u8) -> Self {
                match tag {
                    $($tag => Self::$variant,)*
                    _ => Self::Unknown,
                }
            }
        }
    };
}

basic_types! {
    Bool = 0 => "bool", Bool, 1;
    Int8 = 1 => "int8", I8, 1;
    UInt8 = 2 => "uint8", U8, 1;
    Int16 = 3 => "int16", I16, 1;
    UInt16 = 4 => "uint16", U16, 1;
    Int32 = 5 => "int32", I32, 1;
    UInt32 = 6 => "uint32", U32, 1;
    Int64 = 7 => "int64", I64, 1;
    UInt64 = 8 => "uint64", U64, 1;
    Float = 9 => "float", F32, 1;
    Double = 10 => "double", F64, 1;
    Char = 11 => "char", I8, 1;
    WChar = 12 => "wchar_t", U16, 1;
    Float2 = 13 => "float2", F32, 2;
    Float3 = 14 => "float3", F32, 3;
    Float4 = 15 => "float4", F32, 4;
    Double2 = 16 => "double2", F64, 2;
    Double3 = 17 => "double3", F64, 3;
    Double4 = 18 => "double4", F64, 4;
    Int2 = 19 => "int2", I32, 2;
    Int3 = 20 => "int3", I32, 3;
    Int4 = 21 => "int4", I32, 4;
    UInt2 = 22 => "uint2", U32, 2;
    UInt3 = 23 => "uint3", U32, 3;
    UInt4 = 24 => "uint4", U32, 4;
}

impl BasicType {
    /// Resolves a definition string, accepting the usual C spellings as aliases.
    ///
    /// # Examples
    ///
    /// ```
    /// use vc_reflect::BasicType;
    ///
    /// assert_eq!(BasicType::from_name("int"), Some(BasicType::Int32));
    /// assert_eq!(BasicType::from_name("float3"), Some(BasicType::Float3));
    /// assert_eq!(BasicType::from_name("Foo"), None);
    /// ```
    pub fn from_name(name: &str) -> Option<Self> {
        let alias = match name {
            "int" | "int32_t" => Some(Self::Int32),
            "unsigned int" | "uint32_t" | "unsigned" => Some(Self::UInt32),
            "short" | "int16_t" => Some(Self::Int16),
            "unsigned short" | "uint16_t" => Some(Self::UInt16),
            "int8_t" | "signed char" => Some(Self::Int8),
            "unsigned char" | "uint8_t" => Some(Self::UInt8),
            "long long" | "int64_t" => Some(Self::Int64),
            "unsigned long long" | "uint64_t" | "size_t" => Some(Self::UInt64),
            "wchar" => Some(Self::WChar),
            _ => None,
        };
        alias.or_else(|| Self::ALL.iter().copied().find(|ty| ty.name() == name))
    }

    /// Returns `false` only for [`BasicType::Unknown`].
    #[inline]
    pub const fn is_known(self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// Size in bytes.
    #[inline]
    pub const fn byte_size(self) -> usize {
        self.scalar().byte_size() * self.components()
    }

    /// Alignment in bytes, the alignment of one component.
    #[inline]
    pub const fn alignment(self) -> usize {
        self.scalar().byte_size()
    }

    /// `char` and `wchar_t` streams and pointers are treated as strings.
    #[inline]
    pub const fn is_string_like(self) -> bool {
        matches!(self, Self::Char | Self::WChar)
    }
}

// -----------------------------------------------------------------------------
// StreamKind

/// How a field stores its basic type(s).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum StreamKind {
    /// A single value.
    Basic = 0,
    /// An owning or reference pointer.
    Pointer = 1,
    /// A fixed array, `int[4]`.
    BasicTypeArray = 2,
    /// `Stream<T>`: pointer and size.
    Stream = 3,
    /// `CapacityStream<T>`: pointer, size and a fixed capacity.
    CapacityStream = 4,
    /// `ResizableStream<T>`: pointer, size, capacity and an allocator.
    ResizableStream = 5,
    Unknown = 0xFF,
}

impl StreamKind {
    /// Decodes a tag recorded in a field table.
    pub const fn from_u8(tag: u8) -> Self {
        match tag {
            0 => Self::Basic,
            1 => Self::Pointer,
            2 => Self::BasicTypeArray,
            3 => Self::Stream,
            4 => Self::CapacityStream,
            5 => Self::ResizableStream,
            _ => Self::Unknown,
        }
    }

    /// Maps a stream template name to its kind.
    pub fn from_template(name: &str) -> Option<Self> {
        match name {
            "Stream" => Some(Self::Stream),
            "CapacityStream" => Some(Self::CapacityStream),
            "ResizableStream" => Some(Self::ResizableStream),
            _ => None,
        }
    }

    /// Returns `true` for the three stream kinds.
    #[inline]
    pub const fn is_stream(self) -> bool {
        matches!(
            self,
            Self::Stream | Self::CapacityStream | Self::ResizableStream
        )
    }
}
