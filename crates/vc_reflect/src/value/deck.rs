use alloc::vec::Vec;

use crate::value::Value;

/// A chunked sequence: every chunk but the last holds `chunk_size` elements.
///
/// # Examples
///
/// ```
/// use vc_reflect::value::DeckValue;
/// use vc_reflect::Value;
///
/// let mut deck = DeckValue::new(4);
/// for i in 0..10 {
///     deck.push(Value::U16(i));
/// }
/// assert_eq!(deck.chunk_count(), 3);
/// assert_eq!(deck.get(9), Some(&Value::U16(9)));
/// assert_eq!(deck.exponent(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct DeckValue {
    chunk_size: usize,
    chunks: Vec<Vec<Value>>,
}

impl Default for DeckValue {
    #[inline]
    fn default() -> Self {
        Self::new(Self::DEFAULT_CHUNK_SIZE)
    }
}

impl DeckValue {
    pub const DEFAULT_CHUNK_SIZE: usize = 64;

    /// Creates an empty deck. A chunk size of zero is raised to one.
    pub const fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: if chunk_size == 0 { 1 } else { chunk_size },
            chunks: Vec::new(),
        }
    }

    /// Creates a deck from `items`, split into chunks.
    pub fn from_items(chunk_size: usize, items: impl IntoIterator<Item = Value>) -> Self {
        let mut deck = Self::new(chunk_size);
        items.into_iter().for_each(|item| deck.push(item));
        deck
    }

    /// Creates a deck from chunks that are already split.
    ///
    /// Returns `None` unless every chunk but the last holds exactly
    /// `chunk_size` elements and the last one holds between one and
    /// `chunk_size`.
    pub fn from_chunks(chunk_size: usize, chunks: Vec<Vec<Value>>) -> Option<Self> {
        let last = chunks.len().checked_sub(1);
        let filled = chunks.iter().enumerate().all(|(index, chunk)| {
            if Some(index) == last {
                !chunk.is_empty() && chunk.len() <= chunk_size
            } else {
                chunk.len() == chunk_size
            }
        });
        (chunk_size != 0 && filled).then_some(Self { chunk_size, chunks })
    }

    /// Appends an element, opening a new chunk when the last one is full.
    pub fn push(&mut self, value: Value) {
        match self.chunks.last_mut() {
            Some(chunk) if chunk.len() < self.chunk_size => chunk.push(value),
            _ => {
                let mut chunk = Vec::with_capacity(self.chunk_size.min(Self::DEFAULT_CHUNK_SIZE));
                chunk.push(value);
                self.chunks.push(chunk);
            }
        }
    }

    /// Returns the element at `index`.
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.chunks
            .get(index / self.chunk_size)?
            .get(index % self.chunk_size)
    }

    /// Returns the number of elements.
    pub fn len(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum()
    }

    /// Returns `true` if there are no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chunks.iter().all(Vec::is_empty)
    }

    #[inline]
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    #[inline]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    #[inline]
    pub fn chunks(&self) -> &[Vec<Value>] {
        &self.chunks
    }

    #[inline]
    pub fn chunks_mut(&mut self) -> &mut [Vec<Value>] {
        &mut self.chunks
    }

    /// The shift replacing division by the chunk size, zero if the chunk
    /// size is not a power of two.
    pub fn exponent(&self) -> u32 {
        if self.chunk_size.is_power_of_two() {
            self.chunk_size.trailing_zeros()
        } else {
            0
        }
    }

    /// Iterates the elements in order.
    pub fn iter(&self) -> impl Iterator<Item = &Value> {
        self.chunks.iter().flatten()
    }
}

impl PartialEq for DeckValue {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().eq(other.iter())
    }
}
