//! Generic walkers over values: buffer accounting, copy, comparison and
//! deallocation.
//!
//! Each walker resolves definitions the way the engines do and hands the
//! built-in container families to their [`CustomTypeHandler`].

use alloc::vec;

use vc_reflect::shape::DefinitionShape;
use vc_reflect::Value;

use crate::allocator::{AllocError, Allocator, Charge, Ledger};
use crate::custom::CustomTypeHandler;
use crate::definition::{DefinitionInfo, DefinitionResolver, DefinitionTarget, TypeSource};
use crate::layout::{default_value, encode_image};
use crate::options::{CopyOptions, DeallocateOptions};

// -----------------------------------------------------------------------------
// BufferWalker

/// Reports every buffer a value owns, in a fixed order.
///
/// Reads charge these buffers to the field allocator; deallocation returns
/// the same list.
pub(crate) struct BufferWalker<'w, 'a> {
    resolver: &'w DefinitionResolver<'a>,
    native: bool,
    visit: &'w mut dyn FnMut(Charge) -> Result<(), AllocError>,
}

impl<'w, 'a> BufferWalker<'w, 'a> {
    pub fn new(
        resolver: &'w DefinitionResolver<'a>,
        native: bool,
        visit: &'w mut dyn FnMut(Charge) -> Result<(), AllocError>,
    ) -> Self {
        Self {
            resolver,
            native,
            visit,
        }
    }

    /// Reports one buffer; empty buffers are skipped.
    pub fn charge(&mut self, size: usize, align: usize) -> Result<(), AllocError> {
        if size == 0 {
            return Ok(());
        }
        (self.visit)(Charge { size, align })
    }

    /// Resizable containers allocate through their own allocator.
    #[inline]
    pub fn native_containers(&self) -> bool {
        self.native
    }

    /// `(byte_size, alignment)` of one instance, `(0, 1)` if unknown.
    pub fn layout(&self, definition: &str) -> (usize, usize) {
        let info = self.resolver.resolve(definition);
        (info.byte_size.unwrap_or(0), info.alignment)
    }

    #[inline]
    pub fn is_blittable(&self, definition: &str) -> bool {
        self.resolver.resolve(definition).is_blittable
    }

    /// Reports the buffers of `value`, but not the instance itself.
    pub fn value(&mut self, definition: &str, value: &Value) -> Result<(), AllocError> {
        let info = self.resolver.resolve(definition);
        match info.target {
            DefinitionTarget::Reflected(ty) if !ty.is_blittable => {
                let Some(fields) = value.as_struct() else {
                    return Ok(());
                };
                for field in &ty.fields {
                    if let Some(item) = fields.get(&field.name) {
                        self.value(&field.definition, item)?;
                    }
                }
                Ok(())
            }
            DefinitionTarget::Custom(handler) => handler.visit_buffers(self, definition, value),
            DefinitionTarget::Fundamental => match value {
                Value::String(text) => self.charge(text.len() + 1, 1),
                Value::WString(units) => self.charge((units.len() + 1) * 2, 2),
                Value::Pointer(Some(inner)) if matches!(**inner, Value::String(_) | Value::WString(_)) => {
                    self.value(definition, inner)
                }
                Value::Pointer(Some(inner)) => {
                    let DefinitionShape::Pointer(pointee) = DefinitionShape::parse(definition.trim()) else {
                        return Ok(());
                    };
                    let (size, align) = self.layout(pointee);
                    self.charge(size, align)?;
                    self.value(pointee, inner)
                }
                _ => Ok(()),
            },
            DefinitionTarget::Reflected(_) | DefinitionTarget::Unresolved => Ok(()),
        }
    }
}

// -----------------------------------------------------------------------------
// Comparer

/// Structural equality: blittable data compares by image, everything else
/// by content, containers by their handler.
pub(crate) struct Comparer<'w, 'a> {
    resolver: &'w DefinitionResolver<'a>,
}

impl Comparer<'_, '_> {
    pub fn values(&self, definition: &str, a: &Value, b: &Value) -> bool {
        let info = self.resolver.resolve(definition);
        match info.target {
            _ if info.is_blittable => self.images(definition, &info, a, b),
            DefinitionTarget::Reflected(ty) => match (a.as_struct(), b.as_struct()) {
                (Some(a), Some(b)) => ty.fields.iter().all(|field| {
                    match (a.get(&field.name), b.get(&field.name)) {
                        (Some(a), Some(b)) => self.values(&field.definition, a, b),
                        (None, None) => true,
                        _ => false,
                    }
                }),
                _ => a == b,
            },
            DefinitionTarget::Custom(handler) => handler.compare(self, definition, a, b),
            DefinitionTarget::Fundamental => match (a, b) {
                (Value::Pointer(Some(a)), Value::Pointer(Some(b))) => {
                    match DefinitionShape::parse(definition.trim()) {
                        DefinitionShape::Pointer(pointee) if !matches!(**a, Value::String(_)) => {
                            self.values(pointee, a, b)
                        }
                        _ => a == b,
                    }
                }
                _ => a == b,
            },
            DefinitionTarget::Unresolved => a == b,
        }
    }

    fn images(&self, definition: &str, info: &DefinitionInfo<'_>, a: &Value, b: &Value) -> bool {
        let size = info.byte_size.unwrap_or(0);
        let (mut left, mut right) = (vec![0_u8; size], vec![0_u8; size]);
        match (
            encode_image(definition, info, a, self.resolver, &mut left),
            encode_image(definition, info, b, self.resolver, &mut right),
        ) {
            (Ok(()), Ok(())) => left == right,
            _ => a == b,
        }
    }
}

// -----------------------------------------------------------------------------
// Public operations

/// Returns `true` if `a` and `b` hold the same data as instances of
/// `definition`.
///
/// Blittable data compares bit for bit, so two NaNs with the same payload
/// are equal. Sparse sets compare by handle and hash tables by key,
/// independent of slot order.
///
/// # Examples
///
/// ```
/// use vc_reflect::registry::TypeRegistry;
/// use vc_reflect::Value;
/// use vc_reflect::value::HashTableValue;
/// use vc_serialize::compare_values;
///
/// let registry = TypeRegistry::new();
/// let mut a = HashTableValue::new();
/// let mut b = HashTableValue::with_capacity(64);
/// for i in 0..10_u32 {
///     a.insert(Value::U32(i), Value::F32(i as f32));
///     b.insert(Value::U32(9 - i), Value::F32((9 - i) as f32));
/// }
/// let (a, b) = (Value::HashTable(a), Value::HashTable(b));
/// assert!(compare_values(&registry, "HashTable<float, uint32>", &a, &b));
/// assert!(compare_values(&registry, "float", &Value::F32(f32::NAN), &Value::F32(f32::NAN)));
/// ```
pub fn compare_values(source: &dyn TypeSource, definition: &str, a: &Value, b: &Value) -> bool {
    let resolver = DefinitionResolver::new(source);
    Comparer {
        resolver: &resolver,
    }
    .values(definition, a, b)
}

/// Deep-copies `from` into `to`, charging the copied buffers to `allocator`.
///
/// With [`CopyOptions::deallocate_existing`] the buffers of `to` are
/// released first. If charging then fails, `to` holds the default value of
/// `definition` and nothing stays charged.
pub fn copy_value(
    source: &dyn TypeSource,
    definition: &str,
    from: &Value,
    to: &mut Value,
    allocator: &dyn Allocator,
    options: CopyOptions,
) -> Result<(), AllocError> {
    let resolver = DefinitionResolver::new(source);

    let mut copied = from.clone();
    if !options.overwrite_allocators {
        keep_allocators(&resolver, definition, to, &mut copied);
    }

    if options.deallocate_existing {
        release(&resolver, false, definition, to, allocator);
    }

    let mut ledger = Ledger::new(allocator);
    let charged = BufferWalker::new(&resolver, false, &mut |charge: Charge| ledger.charge(charge))
        .value(definition, &copied);
    if let Err(err) = charged {
        if options.deallocate_existing {
            *to = default_value(definition, source);
        }
        return Err(err);
    }

    ledger.commit();
    *to = copied;
    Ok(())
}

/// Releases every buffer `value` owns to `allocator`.
///
/// The options must match those of the read or copy that charged the value.
/// Releasing the same value twice releases its buffers twice.
pub fn deallocate_value(
    source: &dyn TypeSource,
    definition: &str,
    value: &Value,
    allocator: &dyn Allocator,
    options: DeallocateOptions,
) {
    let resolver = DefinitionResolver::new(source);
    release(
        &resolver,
        options.use_container_native_allocator,
        definition,
        value,
        allocator,
    );
}

fn release(
    resolver: &DefinitionResolver<'_>,
    native: bool,
    definition: &str,
    value: &Value,
    allocator: &dyn Allocator,
) {
    let mut give_back = |charge: Charge| {
        allocator.deallocate(charge.size, charge.align);
        Ok(())
    };
    // Releasing never fails.
    let _ = BufferWalker::new(resolver, native, &mut give_back).value(definition, value);
}

/// Puts the allocator fields of `destination` into `copied`.
fn keep_allocators(
    resolver: &DefinitionResolver<'_>,
    definition: &str,
    destination: &Value,
    copied: &mut Value,
) {
    let info = resolver.resolve(definition);
    match (info.target, destination, copied) {
        (DefinitionTarget::Custom(CustomTypeHandler::Allocator), Value::Allocator(_), copied) => {
            *copied = destination.clone();
        }
        (
            DefinitionTarget::Custom(handler @ CustomTypeHandler::ReferenceCounted),
            Value::Shared(destination),
            Value::Shared(copied),
        ) => {
            if let Some(inner) = handler.dependencies(definition).first() {
                keep_allocators(resolver, inner, &destination.value, &mut copied.value);
            }
        }
        (DefinitionTarget::Reflected(ty), Value::Struct(destination), Value::Struct(copied))
            if !ty.is_blittable =>
        {
            for field in &ty.fields {
                if let (Some(old), Some(new)) = (destination.get(&field.name), copied.get_mut(&field.name)) {
                    keep_allocators(resolver, &field.definition, old, new);
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use alloc::boxed::Box;
    use alloc::string::String;

    use vc_reflect::registry::{TypeDescriptor, TypeRegistry};
    use vc_reflect::value::{AllocatorDescriptor, AllocatorValue, StreamValue};
    use vc_reflect::{StructValue, Value};

    use super::{compare_values, copy_value, deallocate_value};
    use crate::allocator::TrackingAllocator;
    use crate::custom::CustomTypes;
    use crate::options::{CopyOptions, DeallocateOptions};

    fn registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry.add(
            TypeDescriptor::new("Pool")
                .field("name", "char*")
                .field("items", "Stream<uint32>")
                .field("allocator", "LinearAllocator"),
        );
        registry.resolve(&CustomTypes).unwrap();
        registry
    }

    fn pool(name: &str, items: u32, capacity: u64) -> Value {
        StructValue::new("Pool")
            .with("name", Value::String(String::from(name)))
            .with(
                "items",
                Value::Stream((0..items).map(Value::U32).collect::<StreamValue>()),
            )
            .with(
                "allocator",
                Value::Allocator(AllocatorValue::Owned(AllocatorDescriptor::Linear { capacity })),
            )
            .into()
    }

    #[test]
    fn copy_charges_and_keeps_allocators() {
        let registry = registry();
        let allocator = TrackingAllocator::new();
        let from = pool("abc", 4, 1024);
        let mut to = pool("", 0, 64);

        copy_value(&registry, "Pool", &from, &mut to, &allocator, CopyOptions::default()).unwrap();
        // "abc\0", four items and the 64 bytes the kept allocator reserves.
        assert_eq!(allocator.live_bytes(), 4 + 16 + 64);
        assert_eq!(to.as_struct().unwrap().get("items"), from.as_struct().unwrap().get("items"));
        assert!(!compare_values(&registry, "Pool", &from, &to));

        deallocate_value(&registry, "Pool", &to, &allocator, DeallocateOptions::default());
        assert_eq!(allocator.live_bytes(), 0);
    }

    #[test]
    fn failed_copy_releases_everything() {
        let registry = registry();
        let allocator = TrackingAllocator::with_limit(32);
        let from = pool("abc", 64, 0);
        let mut to = pool("x", 1, 0);

        let options = CopyOptions {
            overwrite_allocators: true,
            ..CopyOptions::default()
        };
        assert!(copy_value(&registry, "Pool", &from, &mut to, &allocator, options).is_err());
        assert_eq!(allocator.live_bytes(), 0);
        assert_eq!(to, pool("x", 1, 0));
    }

    #[test]
    fn pointers_compare_their_pointees() {
        let registry = registry();
        let a = Value::Pointer(Some(Box::new(Value::F64(1.0))));
        let b = Value::Pointer(Some(Box::new(Value::F64(1.0))));
        assert!(compare_values(&registry, "double*", &a, &b));
        assert!(!compare_values(&registry, "double*", &a, &Value::Pointer(None)));
    }
}
