use alloc::vec::Vec;

use vc_utils::hash::fixed_hash;

use crate::value::Value;

/// Metadata byte of an empty slot.
pub const METADATA_EMPTY: u8 = 0;

/// A power-of-two open-addressing table of `(identifier, value)` pairs.
///
/// Each slot has one metadata byte: [`METADATA_EMPTY`], or `0x80` plus the
/// top seven bits of the identifier's hash. The metadata is part of the wire
/// format, so identifier hashes use the fixed-seed hasher.
///
/// # Examples
///
/// ```
/// use vc_reflect::value::HashTableValue;
/// use vc_reflect::Value;
///
/// let mut table = HashTableValue::new();
/// table.insert(Value::U32(7), Value::F32(0.5));
/// table.insert(Value::U32(9), Value::F32(1.5));
///
/// assert_eq!(table.get(&Value::U32(9)), Some(&Value::F32(1.5)));
/// assert_eq!(table.remove(&Value::U32(7)), Some(Value::F32(0.5)));
/// assert_eq!(table.len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct HashTableValue {
    metadata: Vec<u8>,
    /// `(identifier, value)` per slot.
    slots: Vec<Option<(Value, Value)>>,
    count: usize,
}

impl Default for HashTableValue {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

impl HashTableValue {
    const MIN_CAPACITY: usize = 8;

    /// Creates an empty table without capacity.
    pub const fn new() -> Self {
        Self {
            metadata: Vec::new(),
            slots: Vec::new(),
            count: 0,
        }
    }

    /// Creates an empty table with at least `capacity` slots.
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = vc_utils::num::power_of_two_at_least(capacity, Self::MIN_CAPACITY);
        Self {
            metadata: alloc::vec![METADATA_EMPTY; capacity],
            slots: (0..capacity).map(|_| None).collect(),
            count: 0,
        }
    }

    /// Rebuilds a table from its recorded slots.
    ///
    /// Returns `None` if the capacity is not a power of two or if the
    /// metadata disagrees with slot occupancy.
    pub fn from_raw_parts(metadata: Vec<u8>, slots: Vec<Option<(Value, Value)>>) -> Option<Self> {
        let capacity = slots.len();
        if metadata.len() != capacity || (capacity != 0 && !capacity.is_power_of_two()) {
            return None;
        }
        let mut count = 0;
        for (meta, slot) in metadata.iter().zip(&slots) {
            match (slot, *meta == METADATA_EMPTY) {
                (None, true) => {}
                (Some((identifier, _)), false) if Self::metadata_of(identifier) == *meta => {
                    count += 1;
                }
                _ => return None,
            }
        }
        Some(Self {
            metadata,
            slots,
            count,
        })
    }

    #[inline]
    fn hash_of(identifier: &Value) -> u64 {
        fixed_hash(identifier)
    }

    /// The metadata byte an occupied slot holding `identifier` carries.
    #[inline]
    pub fn metadata_of(identifier: &Value) -> u8 {
        0x80 | (Self::hash_of(identifier) >> 57) as u8
    }

    #[inline]
    fn mask(&self) -> usize {
        self.slots.len() - 1
    }

    /// Returns the slot holding `identifier`.
    pub fn find(&self, identifier: &Value) -> Option<usize> {
        if self.count == 0 {
            return None;
        }
        let meta = Self::metadata_of(identifier);
        let mut slot = Self::hash_of(identifier) as usize & self.mask();
        for _ in 0..self.slots.len() {
            match &self.slots[slot] {
                None => return None,
                Some((candidate, _)) if self.metadata[slot] == meta && candidate == identifier => {
                    return Some(slot);
                }
                Some(_) => slot = (slot + 1) & self.mask(),
            }
        }
        None
    }

    /// Returns the value stored under `identifier`.
    pub fn get(&self, identifier: &Value) -> Option<&Value> {
        let slot = self.find(identifier)?;
        self.slots[slot].as_ref().map(|(_, value)| value)
    }

    /// Inserts a pair, returning the value it replaced.
    pub fn insert(&mut self, identifier: Value, value: Value) -> Option<Value> {
        if let Some(slot) = self.find(&identifier) {
            let (_, old) = self.slots[slot].as_mut()?;
            return Some(core::mem::replace(old, value));
        }
        // Keep the load factor at or below 7/8.
        if (self.count + 1) * 8 > self.slots.len() * 7 {
            self.rehash((self.slots.len() * 2).max(Self::MIN_CAPACITY));
        }
        self.place(identifier, value);
        None
    }

    fn place(&mut self, identifier: Value, value: Value) {
        let mut slot = Self::hash_of(&identifier) as usize & self.mask();
        while self.slots[slot].is_some() {
            slot = (slot + 1) & self.mask();
        }
        self.metadata[slot] = Self::metadata_of(&identifier);
        self.slots[slot] = Some((identifier, value));
        self.count += 1;
    }

    fn rehash(&mut self, capacity: usize) {
        let old = core::mem::replace(self, Self::with_capacity(capacity));
        for (identifier, value) in old.slots.into_iter().flatten() {
            self.place(identifier, value);
        }
    }

    /// Removes the pair stored under `identifier`.
    pub fn remove(&mut self, identifier: &Value) -> Option<Value> {
        let mut hole = self.find(identifier)?;
        let (_, value) = self.slots[hole].take()?;
        self.metadata[hole] = METADATA_EMPTY;
        self.count -= 1;

        // Backward-shift the rest of the probe run into the hole.
        let mask = self.mask();
        let mut next = (hole + 1) & mask;
        while let Some((candidate, _)) = &self.slots[next] {
            let home = Self::hash_of(candidate) as usize & mask;
            let distance_to_next = next.wrapping_sub(home) & mask;
            let distance_to_hole = hole.wrapping_sub(home) & mask;
            if distance_to_hole <= distance_to_next {
                self.slots[hole] = self.slots[next].take();
                self.metadata[hole] = self.metadata[next];
                self.metadata[next] = METADATA_EMPTY;
                hole = next;
            }
            next = (next + 1) & mask;
        }
        Some(value)
    }

    /// Returns the pair stored in `slot`.
    pub fn slot(&self, slot: usize) -> Option<(&Value, &Value)> {
        self.slots
            .get(slot)?
            .as_ref()
            .map(|(identifier, value)| (identifier, value))
    }

    /// Iterates `(slot, identifier, value)` over occupied slots in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Value, &Value)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(slot, pair)| pair.as_ref().map(|(i, v)| (slot, i, v)))
    }

    /// Iterates every value mutably. Identifiers cannot change in place.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut Value> {
        self.slots.iter_mut().flatten().map(|(_, value)| value)
    }

    /// The per-slot metadata bytes.
    #[inline]
    pub fn metadata(&self) -> &[u8] {
        &self.metadata
    }

    /// Returns the number of pairs.
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    /// Returns `true` if there are no pairs.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns the number of slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Drops every pair and slot.
    pub fn clear(&mut self) {
        *self = Self::new();
    }
}

impl PartialEq for HashTableValue {
    fn eq(&self, other: &Self) -> bool {
        self.count == other.count
            && self
                .iter()
                .all(|(_, identifier, value)| other.get(identifier) == Some(value))
    }
}

#[cfg(test)]
mod tests {
    use alloc::format;
    use alloc::string::String;

    use super::{HashTableValue, METADATA_EMPTY};
    use crate::value::Value;

    fn key(i: u32) -> Value {
        Value::String(format!("key-{i}"))
    }

    #[test]
    fn insertion_order_does_not_matter() {
        let mut forward = HashTableValue::new();
        let mut backward = HashTableValue::with_capacity(64);
        for i in 0..40 {
            forward.insert(key(i), Value::U32(i));
        }
        for i in (0..40).rev() {
            backward.insert(key(i), Value::U32(i));
        }
        assert_ne!(forward.capacity(), 0);
        assert_eq!(forward, backward);

        backward.insert(key(3), Value::U32(300));
        assert_ne!(forward, backward);
    }

    #[test]
    fn removal_keeps_probe_runs_reachable() {
        let mut table = HashTableValue::with_capacity(8);
        for i in 0..7 {
            table.insert(Value::U64(i), Value::U64(i * 10));
        }
        for i in (0..7).step_by(2) {
            assert_eq!(table.remove(&Value::U64(i)), Some(Value::U64(i * 10)));
        }
        for i in (1..7).step_by(2) {
            assert_eq!(table.get(&Value::U64(i)), Some(&Value::U64(i * 10)));
        }
        assert_eq!(table.len(), 3);
        let empty = table.metadata().iter().filter(|m| **m == METADATA_EMPTY).count();
        assert_eq!(empty, table.capacity() - 3);
    }

    #[test]
    fn raw_parts_validate_metadata() {
        let mut table = HashTableValue::with_capacity(8);
        table.insert(Value::String(String::from("a")), Value::Bool(true));
        let slots = (0..table.capacity())
            .map(|s| table.slot(s).map(|(i, v)| (i.clone(), v.clone())))
            .collect::<alloc::vec::Vec<_>>();

        let rebuilt = HashTableValue::from_raw_parts(table.metadata().to_vec(), slots.clone()).unwrap();
        assert_eq!(rebuilt, table);

        let mut wrong = table.metadata().to_vec();
        wrong.iter_mut().for_each(|m| *m = METADATA_EMPTY);
        assert!(HashTableValue::from_raw_parts(wrong, slots).is_none());
    }
}
