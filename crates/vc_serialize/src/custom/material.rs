//! `MaterialAsset`: version, name, then the asset flag and every handle.
//!
//! Handles are only meaningful inside one asset database. When the caller
//! supplies an [`AssetResolver`](crate::passdown::AssetResolver), handles are
//! written as asset names and mapped back on read; otherwise the raw handles
//! are written.

use alloc::string::String;
use alloc::vec::Vec;

use vc_reflect::Value;
use vc_reflect::value::{MaterialBinding, MaterialBuffer, MaterialValue};

use super::CustomTypeHandler;
use crate::allocator::AllocError;
use crate::de::Deserializer;
use crate::error::{ReadError, WriteError};
use crate::ops::BufferWalker;
use crate::passdown::AssetKind;
use crate::ser::Serializer;

pub(super) const TYPE_NAME: &str = "MaterialAsset";

pub(super) const VERSION: u8 = 1;

pub(super) const BYTE_SIZE: (usize, usize) = (120, 8);

const HANDLES: u8 = 0;
const ASSET_NAMES: u8 = 1;

/// Bytes of one binding entry.
const BINDING_SIZE: usize = 8;

// -----------------------------------------------------------------------------
// Write

pub(super) fn write(ser: &mut Serializer<'_, '_>, definition: &str, value: &Value) -> Result<(), WriteError> {
    let Value::Material(material) = value else {
        return Err(Serializer::mismatch(definition, value));
    };
    ser.instrument().write_u8(VERSION)?;
    ser.instrument().write_str(&material.name)?;

    let names = ser.passdown().asset_resolver().is_some();
    ser.instrument().write_u8(if names { ASSET_NAMES } else { HANDLES })?;

    write_handle(ser, AssetKind::Shader, material.vertex_shader)?;
    write_handle(ser, AssetKind::Shader, material.pixel_shader)?;
    write_bindings(ser, AssetKind::Texture, &material.textures)?;
    write_bindings(ser, AssetKind::Sampler, &material.samplers)?;

    ser.write_count(material.buffers.len())?;
    for buffer in &material.buffers {
        ser.instrument().write_u32(buffer.slot)?;
        ser.instrument().write_u8(buffer.dynamic as u8)?;
        ser.write_count(buffer.data.len())?;
        ser.instrument().write(&buffer.data)?;
    }
    Ok(())
}

fn write_bindings(
    ser: &mut Serializer<'_, '_>,
    kind: AssetKind,
    bindings: &[MaterialBinding],
) -> Result<(), WriteError> {
    ser.write_count(bindings.len())?;
    for binding in bindings {
        ser.instrument().write_u32(binding.slot)?;
        write_handle(ser, kind, binding.handle)?;
    }
    Ok(())
}

fn write_handle(ser: &mut Serializer<'_, '_>, kind: AssetKind, handle: u32) -> Result<(), WriteError> {
    let Some(resolver) = ser.passdown().asset_resolver() else {
        ser.instrument().write_u32(handle)?;
        return Ok(());
    };
    if handle == MaterialValue::NO_HANDLE {
        ser.instrument().write_str("")?;
        return Ok(());
    }
    let name = resolver
        .asset_name(kind, handle)
        .ok_or(WriteError::UnresolvedReference {
            key: String::from(TYPE_NAME),
            reason: "the asset resolver does not know a handle of the material",
        })?;
    ser.instrument().write_str(&name)?;
    Ok(())
}

// -----------------------------------------------------------------------------
// Read

pub(super) fn read(de: &mut Deserializer<'_, '_>) -> Result<Option<Value>, ReadError> {
    let version = de.instrument().read_u8()?;
    if version != VERSION {
        return Err(ReadError::UnknownVersion {
            handler: CustomTypeHandler::Material.name(),
            version: version as u32,
        });
    }
    let name = read_text(de)?;
    let names = match de.instrument().read_u8()? {
        HANDLES => false,
        ASSET_NAMES => true,
        _ => return Err(de.corrupted("unknown material handle encoding")),
    };

    let vertex_shader = read_handle(de, names, AssetKind::Shader)?;
    let pixel_shader = read_handle(de, names, AssetKind::Shader)?;
    let textures = read_bindings(de, names, AssetKind::Texture)?;
    let samplers = read_bindings(de, names, AssetKind::Sampler)?;

    let count = de.read_length(6)?;
    let mut buffers = Vec::new();
    for _ in 0..count {
        let slot = de.instrument().read_u32()?;
        let dynamic = de.instrument().read_u8()? != 0;
        let len = de.read_length(1)?;
        if let Some(data) = de.read_bytes_payload(len)? {
            buffers.push(MaterialBuffer { slot, data, dynamic });
        }
    }

    if de.is_ignoring() {
        return Ok(None);
    }
    Ok(Some(Value::Material(MaterialValue {
        name,
        vertex_shader,
        pixel_shader,
        textures,
        samplers,
        buffers,
    })))
}

fn read_text(de: &mut Deserializer<'_, '_>) -> Result<String, ReadError> {
    if de.is_ignoring() {
        de.instrument().ignore_string()?;
        return Ok(String::new());
    }
    match de.instrument().read_string()? {
        Some(text) => Ok(text),
        None => Err(de.corrupted("material text is not UTF-8")),
    }
}

fn read_bindings(
    de: &mut Deserializer<'_, '_>,
    names: bool,
    kind: AssetKind,
) -> Result<Vec<MaterialBinding>, ReadError> {
    let count = de.read_length(if names { 5 } else { BINDING_SIZE })?;
    let mut bindings = Vec::new();
    for _ in 0..count {
        let slot = de.instrument().read_u32()?;
        let handle = read_handle(de, names, kind)?;
        if !de.is_ignoring() {
            bindings.push(MaterialBinding { slot, handle });
        }
    }
    Ok(bindings)
}

fn read_handle(de: &mut Deserializer<'_, '_>, names: bool, kind: AssetKind) -> Result<u32, ReadError> {
    if !names {
        return Ok(de.instrument().read_u32()?);
    }
    let name = read_text(de)?;
    if name.is_empty() {
        return Ok(MaterialValue::NO_HANDLE);
    }
    let handle = de
        .passdown()
        .asset_resolver()
        .and_then(|resolver| resolver.asset_handle(kind, &name));
    Ok(handle.unwrap_or_else(|| {
        log::warn!("material asset `{name}` ({kind:?}) does not resolve, leaving it unbound");
        MaterialValue::NO_HANDLE
    }))
}

// -----------------------------------------------------------------------------
// Buffers

pub(super) fn visit_buffers(walker: &mut BufferWalker<'_, '_>, value: &Value) -> Result<(), AllocError> {
    let Value::Material(material) = value else {
        return Ok(());
    };
    if !material.name.is_empty() {
        walker.charge(material.name.len() + 1, 1)?;
    }
    walker.charge(material.textures.len() * BINDING_SIZE, 4)?;
    walker.charge(material.samplers.len() * BINDING_SIZE, 4)?;
    for buffer in &material.buffers {
        walker.charge(buffer.data.len(), 16)?;
    }
    Ok(())
}
