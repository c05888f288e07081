use alloc::boxed::Box;

/// The concrete allocator families, with their wire tags.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AllocatorKind {
    Linear = 0,
    Stack = 1,
    Multipool = 2,
    MemoryManager = 3,
    MemoryArena = 4,
    ResizableLinear = 5,
}

impl AllocatorKind {
    pub const ALL: [Self; 6] = [
        Self::Linear,
        Self::Stack,
        Self::Multipool,
        Self::MemoryManager,
        Self::MemoryArena,
        Self::ResizableLinear,
    ];

    #[inline]
    pub const fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(Self::Linear),
            1 => Some(Self::Stack),
            2 => Some(Self::Multipool),
            3 => Some(Self::MemoryManager),
            4 => Some(Self::MemoryArena),
            5 => Some(Self::ResizableLinear),
            _ => None,
        }
    }

    /// The type name a field of this concrete kind is declared with.
    pub const fn type_name(self) -> &'static str {
        match self {
            Self::Linear => "LinearAllocator",
            Self::Stack => "StackAllocator",
            Self::Multipool => "MultipoolAllocator",
            Self::MemoryManager => "MemoryManager",
            Self::MemoryArena => "MemoryArena",
            Self::ResizableLinear => "ResizableLinearAllocator",
        }
    }

    pub fn from_type_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.type_name() == name)
    }
}

/// The parameters needed to rebuild an empty allocator of the same shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AllocatorDescriptor {
    Linear {
        capacity: u64,
    },
    Stack {
        capacity: u64,
    },
    Multipool {
        capacity: u64,
        pool_count: u32,
    },
    MemoryManager {
        initial: Box<AllocatorDescriptor>,
        backup: Box<AllocatorDescriptor>,
    },
    MemoryArena {
        allocator_count: u32,
        block_count: u32,
        base: Box<AllocatorDescriptor>,
    },
    ResizableLinear {
        initial_capacity: u64,
        backup_capacity: u64,
    },
}

impl AllocatorDescriptor {
    #[inline]
    pub const fn kind(&self) -> AllocatorKind {
        match self {
            Self::Linear { .. } => AllocatorKind::Linear,
            Self::Stack { .. } => AllocatorKind::Stack,
            Self::Multipool { .. } => AllocatorKind::Multipool,
            Self::MemoryManager { .. } => AllocatorKind::MemoryManager,
            Self::MemoryArena { .. } => AllocatorKind::MemoryArena,
            Self::ResizableLinear { .. } => AllocatorKind::ResizableLinear,
        }
    }

    /// Bytes an empty allocator of this shape reserves up front.
    pub fn reserved_bytes(&self) -> u64 {
        match self {
            Self::Linear { capacity } | Self::Stack { capacity } | Self::Multipool { capacity, .. } => {
                *capacity
            }
            Self::MemoryManager { initial, .. } => initial.reserved_bytes(),
            Self::MemoryArena {
                allocator_count,
                base,
                ..
            } => base.reserved_bytes().saturating_mul(*allocator_count as u64),
            Self::ResizableLinear {
                initial_capacity, ..
            } => *initial_capacity,
        }
    }

    /// Returns `true` for allocators that grow by requesting more memory.
    #[inline]
    pub const fn is_resizable(&self) -> bool {
        matches!(self, Self::MemoryManager { .. } | Self::ResizableLinear { .. })
    }
}

/// An allocator field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum AllocatorValue {
    /// A type-erased allocator holding nothing.
    #[default]
    Empty,
    /// An allocator owned by the field.
    Owned(AllocatorDescriptor),
    /// Bound to the allocator of whoever reads the value.
    Borrowed,
}

impl AllocatorValue {
    #[inline]
    pub fn descriptor(&self) -> Option<&AllocatorDescriptor> {
        match self {
            Self::Owned(descriptor) => Some(descriptor),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::boxed::Box;

    use super::{AllocatorDescriptor, AllocatorKind};

    #[test]
    fn kinds_round_trip_through_tags_and_names() {
        for kind in AllocatorKind::ALL {
            assert_eq!(AllocatorKind::from_u8(kind as u8), Some(kind));
            assert_eq!(AllocatorKind::from_type_name(kind.type_name()), Some(kind));
        }
        assert_eq!(AllocatorKind::from_u8(6), None);
    }

    #[test]
    fn nested_reservation() {
        let arena = AllocatorDescriptor::MemoryArena {
            allocator_count: 4,
            block_count: 16,
            base: Box::new(AllocatorDescriptor::Multipool {
                capacity: 1024,
                pool_count: 8,
            }),
        };
        assert_eq!(arena.reserved_bytes(), 4096);
        assert!(!arena.is_resizable());
        assert_eq!(arena.kind(), AllocatorKind::MemoryArena);
    }
}
