use alloc::string::{String, ToString};
use alloc::vec;
use alloc::vec::Vec;

use bytes::Bytes;
use vc_reflect::{ReflectionField, ReflectionType, Value};
use vc_utils::hash::HashMap;

use super::adapt::Schemas;
use crate::custom::CustomTypeHandler;
use crate::definition::{DefinitionInfo, DefinitionResolver, DefinitionTarget};
use crate::error::ReadError;
use crate::instrument::ReadInstrument;
use crate::layout::decode_image;
use crate::options::{ReadMode, ReadSettings};
use crate::passdown::{AssetResolver, Passdown};

/// Nesting deeper than this is corrupted data.
const MAX_DEPTH: usize = 128;

/// The depth-first reader of one deserialize call.
///
/// Reads walk the recorded layout, which is the layout the data was written
/// with, and shape every aggregate after its compiled layout as soon as it
/// is complete.
pub(crate) struct Deserializer<'s, 'a> {
    schemas: Schemas<'s, 'a>,
    instrument: &'s mut dyn ReadInstrument,
    settings: &'s ReadSettings,
    mode: ReadMode,
    versions: [u32; CustomTypeHandler::COUNT],
    passdown: Passdown<'s>,
    /// Whether a recorded blittable type has the compiled image.
    exact: HashMap<String, bool>,
    depth: usize,
    #[cfg(all(debug_assertions, feature = "debug"))]
    stack: crate::stack::DefinitionStack,
}

impl<'s, 'a> Deserializer<'s, 'a> {
    pub fn new(
        schemas: Schemas<'s, 'a>,
        instrument: &'s mut dyn ReadInstrument,
        settings: &'s ReadSettings,
        mode: ReadMode,
        versions: [u32; CustomTypeHandler::COUNT],
        asset_resolver: Option<&'s dyn AssetResolver>,
    ) -> Self {
        Self {
            schemas,
            instrument,
            settings,
            mode,
            versions,
            passdown: Passdown::new(asset_resolver),
            exact: HashMap::default(),
            depth: 0,
            #[cfg(all(debug_assertions, feature = "debug"))]
            stack: crate::stack::DefinitionStack::new(),
        }
    }

    #[inline]
    pub fn instrument(&mut self) -> &mut dyn ReadInstrument {
        &mut *self.instrument
    }

    #[inline]
    pub fn is_ignoring(&self) -> bool {
        self.mode == ReadMode::Ignore
    }

    #[inline]
    pub fn settings(&self) -> &'s ReadSettings {
        self.settings
    }

    /// Resolves against the layout the data was written with.
    #[inline]
    pub fn recorded(&self) -> &'s DefinitionResolver<'a> {
        self.schemas.recorded
    }

    #[inline]
    pub fn compiled(&self) -> &'s DefinitionResolver<'a> {
        self.schemas.compiled
    }

    /// Returns `true` if the data came with its own field table.
    #[inline]
    pub fn has_table(&self) -> bool {
        self.schemas.has_table
    }

    #[inline]
    pub fn passdown(&self) -> &Passdown<'s> {
        &self.passdown
    }

    /// The recorded format version of `handler`.
    #[inline]
    pub fn version(&self, handler: CustomTypeHandler) -> u32 {
        self.versions[handler.index() as usize]
    }

    /// Runs `f` in ignore mode.
    pub fn ignoring<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, ReadError>,
    ) -> Result<T, ReadError> {
        let mode = core::mem::replace(&mut self.mode, ReadMode::Ignore);
        let result = f(self);
        self.mode = mode;
        result
    }

    // -------------------------------------------------------------------------
    // Errors

    pub fn corrupted(&self, message: &str) -> ReadError {
        #[cfg(all(debug_assertions, feature = "debug"))]
        if !self.stack.is_empty() {
            return ReadError::Corrupted(alloc::format!("{message} (stack:\n{:?})", self.stack));
        }
        ReadError::Corrupted(message.to_string())
    }

    pub fn unknown(&self, definition: &str) -> ReadError {
        ReadError::MissingDependentTypes(vec![definition.to_string()])
    }

    // -------------------------------------------------------------------------
    // Counts

    /// Bounds `count` elements of at least `min_size` bytes each by what is
    /// left in the source.
    pub fn check_count(&self, count: u64, min_size: usize) -> Result<usize, ReadError> {
        let count = u32::try_from(count)
            .map_err(|_| self.corrupted("element count larger than u32::MAX"))? as usize;
        if let Some(remaining) = self.instrument.remaining()
            && count.saturating_mul(min_size.max(1)) > remaining
        {
            return Err(self.corrupted("element count larger than the remaining data"));
        }
        Ok(count)
    }

    /// Reads a LEB128 count of elements of at least `min_size` bytes each.
    pub fn read_length(&mut self, min_size: usize) -> Result<usize, ReadError> {
        let count = self.instrument.read_varint()?;
        self.check_count(count, min_size)
    }

    /// The fewest bytes one recorded instance of `element` occupies.
    pub fn min_encoded_size(&self, element: &str) -> usize {
        let info = self.schemas.recorded.resolve(element);
        match info.byte_size {
            Some(size) if info.is_blittable => size,
            _ => 1,
        }
    }

    // -------------------------------------------------------------------------
    // Dispatch

    /// Reads one value of `definition`; `None` when ignoring.
    ///
    /// `field` supplies the tags, which may come from the compiled field
    /// when the recorded one has none.
    pub fn read_value(
        &mut self,
        definition: &str,
        field: Option<&ReflectionField>,
    ) -> Result<Option<Value>, ReadError> {
        let info = self.schemas.recorded.resolve(definition);
        self.read_resolved(definition, &info, field)
    }

    pub fn read_resolved(
        &mut self,
        definition: &str,
        info: &DefinitionInfo<'a>,
        field: Option<&ReflectionField>,
    ) -> Result<Option<Value>, ReadError> {
        if self.depth == MAX_DEPTH {
            return Err(self.corrupted("definitions nest too deep"));
        }
        self.depth += 1;
        #[cfg(all(debug_assertions, feature = "debug"))]
        self.stack.push(definition);

        let result = match info.target {
            DefinitionTarget::Unresolved => Err(self.unknown(definition)),
            DefinitionTarget::Reflected(ty) if ty.is_blittable => self
                .read_blittable_run(definition, info, 1)
                .map(|items| items.and_then(|items| items.into_iter().next())),
            DefinitionTarget::Reflected(ty) => self.read_struct_fields(ty),
            DefinitionTarget::Custom(handler) => handler.read(self, definition, field),
            DefinitionTarget::Fundamental => self.read_fundamental(definition, info, field),
        };

        #[cfg(all(debug_assertions, feature = "debug"))]
        self.stack.pop();
        self.depth -= 1;

        result
    }

    /// Reads an aggregate of recorded type `ty`.
    pub fn read_struct(&mut self, ty: &'a ReflectionType) -> Result<Option<Value>, ReadError> {
        let info = self.schemas.recorded.resolve(&ty.name);
        self.read_resolved(&ty.name, &info, None)
    }

    fn read_struct_fields(&mut self, ty: &'a ReflectionType) -> Result<Option<Value>, ReadError> {
        let compiled = self.schemas.compiled.try_get_type(&ty.name);
        let mut fields = Vec::with_capacity(ty.fields.len());

        for field in &ty.fields {
            let counterpart = compiled.and_then(|compiled| compiled.field(&field.name));
            if compiled.is_some() && counterpart.is_none() {
                if self.schemas.fail_if_mismatch {
                    return Err(ReadError::FieldTypeMismatch {
                        type_name: ty.name.clone(),
                        field: field.name.clone(),
                    });
                }
                log::warn!("skipping recorded field `{}` of `{}`", field.name, ty.name);
                self.ignoring(|de| de.read_field(field, field))?;
                continue;
            }

            let tags = match (&field.tag, counterpart) {
                (None, Some(counterpart)) => counterpart,
                _ => field,
            };
            if let Some(value) = self.read_field(field, tags)? {
                fields.push((field.name.clone(), value));
            }
        }

        if self.is_ignoring() {
            return Ok(None);
        }
        self.schemas.adapt_struct(ty, fields).map(Some)
    }

    fn read_field(
        &mut self,
        field: &ReflectionField,
        tags: &ReflectionField,
    ) -> Result<Option<Value>, ReadError> {
        log::trace!("reading field `{}: {}`", field.name, field.definition);
        let value = self.read_value(&field.definition, Some(tags))?;

        if let (Some(key), Some(value)) = (tags.tag_argument("ReferenceKey"), &value)
            && let Some(handler) = CustomTypeHandler::find(&field.definition)
        {
            self.passdown.register(key, handler, value.clone());
        }
        Ok(value)
    }

    // -------------------------------------------------------------------------
    // Runs

    /// Reads `count` consecutive elements of `element`.
    pub fn read_elements(
        &mut self,
        element: &str,
        count: usize,
    ) -> Result<Option<Vec<Value>>, ReadError> {
        let info = self.schemas.recorded.resolve(element);
        if info.is_blittable {
            return self.read_blittable_run(element, &info, count);
        }
        let mut items = Vec::with_capacity(if self.is_ignoring() { 0 } else { count });
        for _ in 0..count {
            items.extend(self.read_resolved(element, &info, None)?);
        }
        Ok((!self.is_ignoring()).then_some(items))
    }

    /// Reads `count` images of a recorded blittable definition.
    pub fn read_blittable_run(
        &mut self,
        definition: &str,
        info: &DefinitionInfo<'a>,
        count: usize,
    ) -> Result<Option<Vec<Value>>, ReadError> {
        let size = info.byte_size.ok_or_else(|| self.unknown(definition))?;
        let total = size
            .checked_mul(count)
            .ok_or_else(|| self.corrupted("blittable run overflows"))?;

        if self.is_ignoring() {
            self.instrument.ignore(total)?;
            return Ok(None);
        }

        if let Some(ty) = info.reflected_type()
            && !self.is_exact(ty)
        {
            let mut input = self.instrument.sub_instrument(total)?;
            let mut items = Vec::with_capacity(count);
            for _ in 0..count {
                items.push(self.schemas.decode_fields(ty, &mut input)?);
            }
            return Ok(Some(items));
        }

        let compiled = self.schemas.compiled.resolve(definition);
        let resolver = self.schemas.compiled;
        let bytes = self.instrument.read_vec(total)?;
        let items = (0..count)
            .map(|index| decode_image(&compiled, &bytes[index * size..(index + 1) * size], resolver))
            .collect();
        Ok(Some(items))
    }

    /// Builds one value from the recorded image in `bytes`.
    pub fn decode_blittable(
        &mut self,
        definition: &str,
        info: &DefinitionInfo<'a>,
        bytes: &[u8],
    ) -> Result<Value, ReadError> {
        match info.reflected_type() {
            Some(ty) if !self.is_exact(ty) => {
                let mut input = crate::instrument::BufferReader::new(Bytes::copy_from_slice(bytes));
                self.schemas.decode_fields(ty, &mut input)
            }
            _ => {
                let compiled = self.schemas.compiled.resolve(definition);
                Ok(decode_image(&compiled, bytes, self.schemas.compiled))
            }
        }
    }

    /// Returns `true` if the recorded image of `ty` is the compiled one.
    fn is_exact(&mut self, ty: &ReflectionType) -> bool {
        if !self.schemas.has_table {
            return true;
        }
        if let Some(exact) = self.exact.get(&ty.name) {
            return *exact;
        }
        let exact = self.schemas.layouts_match(&ty.name);
        if !exact {
            log::debug!("`{}` changed layout since it was written", ty.name);
        }
        self.exact.insert(ty.name.clone(), exact);
        exact
    }

    /// Takes a byte payload of `len` bytes the way the read mode asks.
    pub fn read_bytes_payload(&mut self, len: usize) -> Result<Option<Bytes>, ReadError> {
        match self.mode {
            ReadMode::Ignore => {
                self.instrument.ignore(len)?;
                Ok(None)
            }
            ReadMode::Materialize => match self.instrument.reference_data(len)? {
                Some(bytes) => Ok(Some(bytes)),
                None => Ok(Some(Bytes::from(self.instrument.read_vec(len)?))),
            },
            ReadMode::ForceAllocate => Ok(Some(Bytes::from(self.instrument.read_vec(len)?))),
        }
    }
}
