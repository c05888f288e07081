use alloc::boxed::Box;
use alloc::string::String;
use alloc::vec::Vec;

use bytes::Bytes;

use crate::value::Value;

// -----------------------------------------------------------------------------
// DataPointer

/// A byte buffer with a 16-bit user tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct DataPointerValue {
    pub tag: u16,
    pub data: Bytes,
}

impl DataPointerValue {
    #[inline]
    pub fn new(tag: u16, data: impl Into<Bytes>) -> Self {
        Self {
            tag,
            data: data.into(),
        }
    }
}

// -----------------------------------------------------------------------------
// ReferenceCounted

/// A value with an intrusive reference count.
#[derive(Debug, Clone, PartialEq)]
pub struct SharedValue {
    pub reference_count: u32,
    pub value: Box<Value>,
}

impl SharedValue {
    #[inline]
    pub fn new(reference_count: u32, value: Value) -> Self {
        Self {
            reference_count,
            value: Box::new(value),
        }
    }
}

// -----------------------------------------------------------------------------
// Material

/// A texture or sampler bound to a shader slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MaterialBinding {
    pub slot: u32,
    pub handle: u32,
}

/// Constant buffer contents bound to a shader slot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MaterialBuffer {
    pub slot: u32,
    pub data: Bytes,
    pub dynamic: bool,
}

/// A material asset.
///
/// Shader and texture fields hold asset handles. Handles are only meaningful
/// inside one asset database, so writers translate them to names through an
/// asset resolver when one is available.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MaterialValue {
    pub name: String,
    pub vertex_shader: u32,
    pub pixel_shader: u32,
    pub textures: Vec<MaterialBinding>,
    pub samplers: Vec<MaterialBinding>,
    pub buffers: Vec<MaterialBuffer>,
}

impl MaterialValue {
    /// Handle of a missing asset.
    pub const NO_HANDLE: u32 = u32::MAX;

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            vertex_shader: Self::NO_HANDLE,
            pixel_shader: Self::NO_HANDLE,
            textures: Vec::new(),
            samplers: Vec::new(),
            buffers: Vec::new(),
        }
    }
}

impl Default for MaterialValue {
    fn default() -> Self {
        Self::new(String::new())
    }
}
