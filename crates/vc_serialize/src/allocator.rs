//! Allocation accounting.
//!
//! Every buffer a read materializes is charged to an [`Allocator`]. The engine
//! keeps its own ledger of charges during a call so that a failing call can
//! hand everything back before it returns.

use alloc::vec::Vec;
use core::sync::atomic::{AtomicUsize, Ordering};

use thiserror::Error;

// -----------------------------------------------------------------------------
// AllocError

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("allocation of {requested} bytes refused, {available} bytes available")]
pub struct AllocError {
    pub requested: usize,
    pub available: usize,
}

// -----------------------------------------------------------------------------
// Allocator

/// The allocator a read charges its buffers to.
pub trait Allocator {
    fn allocate(&self, size: usize, align: usize) -> Result<(), AllocError>;

    /// Returns memory previously charged with the same size and alignment.
    fn deallocate(&self, size: usize, align: usize);
}

/// Accepts every request and tracks nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobalAllocator;

impl Allocator for GlobalAllocator {
    #[inline]
    fn allocate(&self, _size: usize, _align: usize) -> Result<(), AllocError> {
        Ok(())
    }

    #[inline]
    fn deallocate(&self, _size: usize, _align: usize) {}
}

/// Counts live bytes and allocation calls, optionally up to a capacity.
///
/// # Examples
///
/// ```
/// use vc_serialize::{Allocator, TrackingAllocator};
///
/// let allocator = TrackingAllocator::with_limit(64);
/// allocator.allocate(48, 8).unwrap();
/// assert!(allocator.allocate(32, 8).is_err());
///
/// allocator.deallocate(48, 8);
/// assert_eq!(allocator.live_bytes(), 0);
/// assert_eq!(allocator.allocation_count(), 1);
/// ```
#[derive(Debug, Default)]
pub struct TrackingAllocator {
    live: AtomicUsize,
    allocations: AtomicUsize,
    limit: Option<usize>,
}

impl TrackingAllocator {
    #[inline]
    pub const fn new() -> Self {
        Self {
            live: AtomicUsize::new(0),
            allocations: AtomicUsize::new(0),
            limit: None,
        }
    }

    #[inline]
    pub const fn with_limit(limit: usize) -> Self {
        Self {
            live: AtomicUsize::new(0),
            allocations: AtomicUsize::new(0),
            limit: Some(limit),
        }
    }

    /// Bytes charged and not yet returned.
    #[inline]
    pub fn live_bytes(&self) -> usize {
        self.live.load(Ordering::Acquire)
    }

    /// Successful allocation calls so far.
    #[inline]
    pub fn allocation_count(&self) -> usize {
        self.allocations.load(Ordering::Acquire)
    }
}

impl Allocator for TrackingAllocator {
    fn allocate(&self, size: usize, _align: usize) -> Result<(), AllocError> {
        let limit = self.limit.unwrap_or(usize::MAX);
        self.live
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |live| {
                live.checked_add(size).filter(|total| *total <= limit)
            })
            .map_err(|live| AllocError {
                requested: size,
                available: limit.saturating_sub(live),
            })?;
        self.allocations.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }

    fn deallocate(&self, size: usize, _align: usize) {
        let previous = self.live.fetch_sub(size, Ordering::AcqRel);
        debug_assert!(previous >= size, "deallocated more than was allocated");
    }
}

// -----------------------------------------------------------------------------
// Ledger

/// One charged buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Charge {
    pub size: usize,
    pub align: usize,
}

/// The charges made against one allocator during a call.
pub(crate) struct Ledger<'a> {
    allocator: &'a dyn Allocator,
    charges: Vec<Charge>,
}

impl<'a> Ledger<'a> {
    #[inline]
    pub fn new(allocator: &'a dyn Allocator) -> Self {
        Self {
            allocator,
            charges: Vec::new(),
        }
    }

    /// Charges one buffer; empty buffers are free.
    pub fn charge(&mut self, charge: Charge) -> Result<(), AllocError> {
        if charge.size == 0 {
            return Ok(());
        }
        self.allocator.allocate(charge.size, charge.align)?;
        self.charges.push(charge);
        Ok(())
    }

    /// Returns every charge to the allocator.
    pub fn release(&mut self) {
        for charge in self.charges.drain(..).rev() {
            self.allocator.deallocate(charge.size, charge.align);
        }
    }

    /// Keeps the charges: the caller now owns the memory.
    #[inline]
    pub fn commit(mut self) -> usize {
        let total = self.charges.iter().map(|c| c.size).sum();
        self.charges.clear();
        total
    }
}

impl Drop for Ledger<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::{Allocator, Charge, Ledger, TrackingAllocator};

    #[test]
    fn dropped_ledger_releases() {
        let allocator = TrackingAllocator::new();
        {
            let mut ledger = Ledger::new(&allocator);
            ledger.charge(Charge { size: 10, align: 1 }).unwrap();
            ledger.charge(Charge { size: 0, align: 1 }).unwrap();
            assert_eq!(allocator.live_bytes(), 10);
        }
        assert_eq!(allocator.live_bytes(), 0);
        assert_eq!(allocator.allocation_count(), 1);
    }

    #[test]
    fn committed_ledger_keeps() {
        let allocator = TrackingAllocator::new();
        let mut ledger = Ledger::new(&allocator);
        ledger.charge(Charge { size: 24, align: 8 }).unwrap();
        assert_eq!(ledger.commit(), 24);
        assert_eq!(allocator.live_bytes(), 24);
        allocator.deallocate(24, 8);
    }
}
