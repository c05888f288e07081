use alloc::vec::Vec;

use crate::value::Value;

/// The elements of a `Stream<T>`, `CapacityStream<T>` or `ResizableStream<T>`.
///
/// `capacity` is informational: a read restores it to the element count.
#[derive(Debug, Clone, Default)]
pub struct StreamValue {
    pub items: Vec<Value>,
    pub capacity: usize,
}

impl StreamValue {
    /// Creates a stream whose capacity equals its size.
    pub fn new(items: Vec<Value>) -> Self {
        let capacity = items.len();
        Self { items, capacity }
    }

    /// Creates an empty stream with room for `capacity` elements.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends an element, growing the recorded capacity if needed.
    pub fn push(&mut self, value: Value) {
        self.items.push(value);
        self.capacity = self.capacity.max(self.items.len());
    }

    /// Returns the number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if there are no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

impl PartialEq for StreamValue {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl FromIterator<Value> for StreamValue {
    fn from_iter<I: IntoIterator<Item = Value>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
