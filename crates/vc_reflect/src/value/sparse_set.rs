use alloc::vec::Vec;

use crate::value::Value;

/// Marks a free indirection slot; the low bits hold the next free slot.
pub const FREE_SLOT_BIT: u32 = 0x8000_0000;

/// End of the free list.
pub const NO_SLOT: u32 = 0x7FFF_FFFF;

// -----------------------------------------------------------------------------
// SparseSlot

/// One entry of the indirection buffer.
///
/// - `index`: for an occupied handle, the dense position of its element; for a
///   free handle, `FREE_SLOT_BIT | next_free`.
/// - `handle`: for dense position `i < len`, the handle owning element `i`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SparseSlot {
    pub index: u32,
    pub handle: u32,
}

// -----------------------------------------------------------------------------
// SparseSetValue

/// A dense buffer addressed through stable handles.
///
/// Removing an element moves the last element into its place, so dense
/// positions change while handles stay valid.
///
/// # Examples
///
/// ```
/// use vc_reflect::value::SparseSetValue;
/// use vc_reflect::Value;
///
/// let mut set = SparseSetValue::new();
/// let a = set.add(Value::I32(10));
/// let b = set.add(Value::I32(20));
/// let c = set.add(Value::I32(30));
///
/// assert_eq!(set.remove(a), Some(Value::I32(10)));
/// assert_eq!(set.get(c), Some(&Value::I32(30)));
/// assert_eq!(set.get(b), Some(&Value::I32(20)));
/// assert_eq!(set.len(), 2);
///
/// // The freed handle is reused first.
/// assert_eq!(set.add(Value::I32(40)), a);
/// ```
#[derive(Debug, Clone)]
pub struct SparseSetValue {
    buffer: Vec<Value>,
    indirection: Vec<SparseSlot>,
    first_free: u32,
}

impl Default for SparseSetValue {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl SparseSetValue {
    const MIN_CAPACITY: usize = 4;

    /// Creates an empty set without capacity.
    pub const fn new() -> Self {
        Self {
            buffer: Vec::new(),
            indirection: Vec::new(),
            first_free: NO_SLOT,
        }
    }

    /// Creates an empty set with `capacity` free handles.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut set = Self::new();
        set.grow(capacity);
        set
    }

    /// Rebuilds a set from the plain stream layout: handles are `0..n`.
    pub fn from_sequential(buffer: Vec<Value>) -> Self {
        let indirection = (0..buffer.len() as u32)
            .map(|i| SparseSlot {
                index: i,
                handle: i,
            })
            .collect();
        Self {
            buffer,
            indirection,
            first_free: NO_SLOT,
        }
    }

    /// Rebuilds a set from its recorded parts.
    ///
    /// Returns `None` if the parts are not consistent with each other.
    pub fn from_raw_parts(
        buffer: Vec<Value>,
        indirection: Vec<SparseSlot>,
        first_free: u32,
    ) -> Option<Self> {
        let len = buffer.len();
        let capacity = indirection.len();
        if len > capacity || (first_free != NO_SLOT && first_free as usize >= capacity) {
            return None;
        }
        // Exactly `len` handles are occupied, each by a dense position.
        let mut occupied = 0;
        for slot in indirection.iter().filter(|slot| slot.index & FREE_SLOT_BIT == 0) {
            if slot.index as usize >= len {
                return None;
            }
            occupied += 1;
        }
        if occupied != len {
            return None;
        }
        for (position, slot) in indirection.iter().take(len).enumerate() {
            let owner = indirection.get(slot.handle as usize)?;
            if owner.index as usize != position {
                return None;
            }
        }
        let mut free = first_free;
        let mut steps = 0;
        while free != NO_SLOT {
            let slot = indirection.get(free as usize)?;
            if slot.index & FREE_SLOT_BIT == 0 || steps > capacity {
                return None;
            }
            free = slot.index & !FREE_SLOT_BIT;
            steps += 1;
        }
        Some(Self {
            buffer,
            indirection,
            first_free,
        })
    }

    fn grow(&mut self, additional: usize) {
        let start = self.indirection.len();
        let end = start + additional;
        if additional == 0 {
            return;
        }
        // New slots chain into the front of the free list, lowest first.
        for slot in start..end {
            let next = if slot + 1 < end {
                (slot + 1) as u32
            } else {
                self.first_free
            };
            self.indirection.push(SparseSlot {
                index: FREE_SLOT_BIT | next,
                handle: 0,
            });
        }
        self.first_free = start as u32;
    }

    /// Inserts an element and returns its handle.
    pub fn add(&mut self, value: Value) -> u32 {
        if self.first_free == NO_SLOT {
            let capacity = self.indirection.len();
            self.grow(capacity.max(Self::MIN_CAPACITY));
        }
        let handle = self.first_free;
        self.first_free = self.indirection[handle as usize].index & !FREE_SLOT_BIT;

        let position = self.buffer.len() as u32;
        self.buffer.push(value);
        self.indirection[handle as usize].index = position;
        self.indirection[position as usize].handle = handle;
        handle
    }

    /// Removes the element behind `handle`.
    pub fn remove(&mut self, handle: u32) -> Option<Value> {
        let position = self.position_of(handle)?;
        let last = self.buffer.len() - 1;
        let value = self.buffer.swap_remove(position);
        if position != last {
            let moved = self.indirection[last].handle;
            self.indirection[position].handle = moved;
            self.indirection[moved as usize].index = position as u32;
        }
        self.indirection[handle as usize].index = FREE_SLOT_BIT | self.first_free;
        self.first_free = handle;
        Some(value)
    }

    fn position_of(&self, handle: u32) -> Option<usize> {
        let slot = self.indirection.get(handle as usize)?;
        if slot.index & FREE_SLOT_BIT != 0 {
            return None;
        }
        Some(slot.index as usize)
    }

    /// Returns the element behind `handle`.
    pub fn get(&self, handle: u32) -> Option<&Value> {
        self.buffer.get(self.position_of(handle)?)
    }

    /// Returns the handle owning the element at dense `position`.
    pub fn handle_at(&self, position: usize) -> Option<u32> {
        (position < self.buffer.len()).then(|| self.indirection[position].handle)
    }

    /// Iterates `(handle, element)` in dense order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &Value)> {
        self.buffer
            .iter()
            .enumerate()
            .map(|(position, value)| (self.indirection[position].handle, value))
    }

    /// The dense element buffer.
    #[inline]
    pub fn buffer(&self) -> &[Value] {
        &self.buffer
    }

    /// The dense element buffer, mutably. Handles are unaffected.
    #[inline]
    pub fn buffer_mut(&mut self) -> &mut [Value] {
        &mut self.buffer
    }

    /// The indirection buffer, one entry per handle.
    #[inline]
    pub fn indirection(&self) -> &[SparseSlot] {
        &self.indirection
    }

    /// Head of the free handle list, [`NO_SLOT`] if full.
    #[inline]
    pub fn first_free(&self) -> u32 {
        self.first_free
    }

    /// Returns the number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns `true` if there are no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Returns the number of handles.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.indirection.len()
    }

    /// Drops every element and handle.
    pub fn clear(&mut self) {
        *self = Self::new();
    }
}

impl PartialEq for SparseSetValue {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .all(|(handle, value)| other.get(handle) == Some(value))
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;

    use super::{FREE_SLOT_BIT, NO_SLOT, SparseSetValue, SparseSlot};
    use crate::value::Value;

    #[test]
    fn holes_keep_handles() {
        let mut set = SparseSetValue::new();
        let handles: vec::Vec<u32> = (0..6).map(|i| set.add(Value::U32(i))).collect();
        set.remove(handles[1]);
        set.remove(handles[4]);

        assert_eq!(set.len(), 4);
        for (i, handle) in handles.iter().enumerate() {
            let expected = (i != 1 && i != 4).then_some(Value::U32(i as u32));
            assert_eq!(set.get(*handle), expected.as_ref());
        }

        let rebuilt = SparseSetValue::from_raw_parts(
            set.buffer().to_vec(),
            set.indirection().to_vec(),
            set.first_free(),
        )
        .unwrap();
        assert_eq!(rebuilt, set);
    }

    #[test]
    fn equality_ignores_dense_order() {
        let mut a = SparseSetValue::new();
        let mut b = SparseSetValue::new();
        for i in 0..3 {
            a.add(Value::I8(i));
            b.add(Value::I8(i));
        }
        a.remove(0);
        a.add(Value::I8(0));
        // `a` holds handle 0 at the end of its dense buffer now.
        assert_ne!(a.buffer(), b.buffer());
        assert_eq!(a, b);
    }

    #[test]
    fn inconsistent_parts_are_rejected() {
        let bad = SparseSetValue::from_raw_parts(
            vec![Value::I8(1)],
            vec![SparseSlot { index: 1, handle: 0 }, SparseSlot { index: FREE_SLOT_BIT | NO_SLOT, handle: 0 }],
            NO_SLOT,
        );
        assert!(bad.is_none());

        let looping = SparseSetValue::from_raw_parts(
            vec![],
            vec![SparseSlot { index: FREE_SLOT_BIT, handle: 0 }],
            0,
        );
        assert!(looping.is_none());

        // Handle 1 claims a dense position past the end.
        let out_of_range = SparseSetValue::from_raw_parts(
            vec![Value::I8(1)],
            vec![SparseSlot { index: 0, handle: 0 }, SparseSlot { index: 5, handle: 0 }],
            NO_SLOT,
        );
        assert!(out_of_range.is_none());

        // Two handles claim the same element.
        let shared = SparseSetValue::from_raw_parts(
            vec![Value::I8(1)],
            vec![SparseSlot { index: 0, handle: 0 }, SparseSlot { index: 0, handle: 0 }],
            NO_SLOT,
        );
        assert!(shared.is_none());
    }

    #[test]
    fn sequential() {
        let set = SparseSetValue::from_sequential(vec![Value::I8(5), Value::I8(6)]);
        assert_eq!(set.get(1), Some(&Value::I8(6)));
        assert_eq!(set.first_free(), NO_SLOT);
    }
}
