use alloc::string::ToString;
use alloc::vec;
use alloc::vec::Vec;

use vc_reflect::value::SparseSetValue;
use vc_reflect::{ReflectionField, ReflectionType, StreamKind, Value};

use crate::custom::CustomTypeHandler;
use crate::definition::{DefinitionInfo, DefinitionResolver, DefinitionTarget};
use crate::error::WriteError;
use crate::instrument::WriteInstrument;
use crate::layout::{encode_image, field_value};
use crate::options::WriteSettings;
use crate::passdown::{AssetResolver, Passdown};

/// The depth-first writer of one serialize call.
pub(crate) struct Serializer<'s, 'a> {
    resolver: &'s DefinitionResolver<'a>,
    instrument: &'s mut dyn WriteInstrument,
    settings: &'s WriteSettings,
    passdown: Passdown<'s>,
    #[cfg(all(debug_assertions, feature = "debug"))]
    stack: crate::stack::DefinitionStack,
    #[cfg(all(debug_assertions, feature = "debug"))]
    failed_at: Option<crate::stack::DefinitionStack>,
}

impl<'s, 'a> Serializer<'s, 'a> {
    pub fn new(
        resolver: &'s DefinitionResolver<'a>,
        instrument: &'s mut dyn WriteInstrument,
        settings: &'s WriteSettings,
        asset_resolver: Option<&'s dyn AssetResolver>,
    ) -> Self {
        Self {
            resolver,
            instrument,
            settings,
            passdown: Passdown::new(asset_resolver),
            #[cfg(all(debug_assertions, feature = "debug"))]
            stack: crate::stack::DefinitionStack::new(),
            #[cfg(all(debug_assertions, feature = "debug"))]
            failed_at: None,
        }
    }

    #[inline]
    pub fn instrument(&mut self) -> &mut dyn WriteInstrument {
        &mut *self.instrument
    }

    #[inline]
    pub fn resolver(&self) -> &'s DefinitionResolver<'a> {
        self.resolver
    }

    #[inline]
    pub fn settings(&self) -> &'s WriteSettings {
        self.settings
    }

    #[inline]
    pub fn passdown(&self) -> &Passdown<'s> {
        &self.passdown
    }

    /// Logs where the first failure of this call happened.
    pub fn report_failure(&self, err: &WriteError) {
        #[cfg(all(debug_assertions, feature = "debug"))]
        if let Some(stack) = &self.failed_at {
            log::debug!("serialization failed: {err} (stack:\n{stack:?})");
            return;
        }
        log::debug!("serialization failed: {err}");
    }

    pub(crate) fn mismatch(definition: &str, value: &Value) -> WriteError {
        WriteError::MismatchedValue {
            definition: definition.to_string(),
            found: value.kind_name(),
        }
    }

    // -------------------------------------------------------------------------
    // Dispatch

    /// Writes one value of `definition`.
    pub fn write_value(
        &mut self,
        definition: &str,
        field: Option<&ReflectionField>,
        value: &Value,
    ) -> Result<(), WriteError> {
        let info = self.resolver.resolve(definition);
        self.write_resolved(definition, &info, field, value)
    }

    pub fn write_resolved(
        &mut self,
        definition: &str,
        info: &DefinitionInfo<'a>,
        field: Option<&ReflectionField>,
        value: &Value,
    ) -> Result<(), WriteError> {
        #[cfg(all(debug_assertions, feature = "debug"))]
        self.stack.push(definition);

        let result = match info.target {
            DefinitionTarget::Unresolved => Err(WriteError::UnknownType(definition.to_string())),
            DefinitionTarget::Reflected(ty) if ty.is_blittable => {
                self.write_blittable_run(definition, info, &[Some(value)])
            }
            DefinitionTarget::Reflected(ty) => self.write_struct_fields(ty, value),
            DefinitionTarget::Custom(handler) => handler.write(self, definition, field, value),
            DefinitionTarget::Fundamental => self.write_fundamental(definition, info, field, value),
        };

        #[cfg(all(debug_assertions, feature = "debug"))]
        {
            if result.is_err() && self.failed_at.is_none() {
                self.failed_at = Some(self.stack.clone());
            }
            self.stack.pop();
        }

        result
    }

    /// Writes an aggregate of type `ty`.
    pub fn write_struct(&mut self, ty: &'a ReflectionType, value: &Value) -> Result<(), WriteError> {
        let info = self.resolver.resolve(&ty.name);
        self.write_resolved(&ty.name, &info, None, value)
    }

    fn write_struct_fields(&mut self, ty: &'a ReflectionType, value: &Value) -> Result<(), WriteError> {
        let fields = value
            .as_struct()
            .ok_or_else(|| Self::mismatch(&ty.name, value))?;
        for field in &ty.fields {
            let item = field_value(ty, fields, field)?;
            self.write_field(field, item)?;
        }
        Ok(())
    }

    fn write_field(&mut self, field: &ReflectionField, value: &Value) -> Result<(), WriteError> {
        log::trace!("writing field `{}: {}`", field.name, field.definition);
        self.write_value(&field.definition, Some(field), value)?;

        if let Some(key) = field.tag_argument("ReferenceKey")
            && let Some(handler) = CustomTypeHandler::find(&field.definition)
        {
            let registered = match value {
                // Legacy sparse sets are read back with sequential handles.
                Value::SparseSet(set) if self.settings.legacy_sparse_sets => {
                    Value::SparseSet(SparseSetValue::from_sequential(set.buffer().to_vec()))
                }
                _ => value.clone(),
            };
            self.passdown.register(key, handler, registered);
        }
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Runs

    /// Writes consecutive elements of `element`.
    ///
    /// Blittable elements go out as one block; others one by one.
    pub fn write_elements<'v>(
        &mut self,
        element: &str,
        items: impl IntoIterator<Item = &'v Value>,
    ) -> Result<(), WriteError> {
        let info = self.resolver.resolve(element);
        if info.is_blittable {
            let items: Vec<Option<&Value>> = items.into_iter().map(Some).collect();
            return self.write_blittable_run(element, &info, &items);
        }
        for item in items {
            self.write_resolved(element, &info, None, item)?;
        }
        Ok(())
    }

    /// Writes the images of blittable `items`; `None` writes a zeroed image.
    pub fn write_blittable_run(
        &mut self,
        definition: &str,
        info: &DefinitionInfo<'a>,
        items: &[Option<&Value>],
    ) -> Result<(), WriteError> {
        let size = info
            .byte_size
            .ok_or_else(|| WriteError::UnknownType(definition.to_string()))?;

        if self.instrument.is_size_determination() {
            self.instrument.advance(size * items.len())?;
            return Ok(());
        }

        if self.settings.disable_blittable_fast_path {
            for item in items {
                match item {
                    Some(value) => self.write_blittable_fields(definition, info, value)?,
                    None => self.instrument.advance(size)?,
                }
            }
            return Ok(());
        }

        let mut image = vec![0_u8; size * items.len()];
        for (item, out) in items.iter().zip(image.chunks_exact_mut(size.max(1))) {
            if let Some(value) = item {
                encode_image(definition, info, value, self.resolver, out)?;
            }
        }
        self.instrument.write(&image)?;
        Ok(())
    }

    /// The slow path for one blittable value: every field on its own, with
    /// explicit padding. Produces the same bytes as the image.
    fn write_blittable_fields(
        &mut self,
        definition: &str,
        info: &DefinitionInfo<'a>,
        value: &Value,
    ) -> Result<(), WriteError> {
        let Some(ty) = info.reflected_type() else {
            let size = info.byte_size.unwrap_or(0);
            let mut out = vec![0_u8; size];
            encode_image(definition, info, value, self.resolver, &mut out)?;
            self.instrument.write(&out)?;
            return Ok(());
        };

        let fields = value
            .as_struct()
            .ok_or_else(|| Self::mismatch(definition, value))?;
        let mut cursor = 0;
        for field in &ty.fields {
            let item = field_value(ty, fields, field)?;
            self.instrument.advance(field.info.pointer_offset - cursor)?;
            let nested = self.resolver.resolve(&field.definition);
            self.write_blittable_fields(&field.definition, &nested, item)?;
            cursor = field.info.pointer_offset + field.info.byte_size;
        }
        self.instrument.advance(ty.byte_size - cursor)?;
        Ok(())
    }

    /// Writes an element count as LEB128.
    #[inline]
    pub fn write_count(&mut self, count: usize) -> Result<(), WriteError> {
        self.instrument.write_varint(count as u64)?;
        Ok(())
    }

    /// Returns the stream kind of a fundamental definition.
    #[inline]
    pub fn is_pointer(info: &DefinitionInfo<'_>) -> bool {
        info.stream_kind == StreamKind::Pointer
    }
}
