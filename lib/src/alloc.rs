/*! Memory allocation hooks.

Stream states and scratch buffers are the only memory allocated by this
crate after a program is built, and they are allocated through an
[`Allocator`]. Embedders that need to track or limit this memory provide
their own implementation of the trait, and pass it to
[`crate::Stream::open_with`] or [`crate::Scratch::new_with`]. Scanning
never allocates.
*/

use crate::errors::Error;

/// Allocates and frees the memory used by streams and scratch spaces.
pub trait Allocator: Send + Sync {
    /// Returns a zeroed block with exactly `size` bytes, or `None` if the
    /// memory can't be allocated.
    fn allocate(&self, size: usize) -> Option<Box<[u8]>>;

    /// Releases a block returned by [`Allocator::allocate`].
    fn free(&self, block: Box<[u8]>) {
        drop(block)
    }
}

/// The default allocator, backed by the global allocator.
///
/// Allocation failures are reported as errors instead of aborting the
/// process.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAllocator;

/// The instance of [`SystemAllocator`] used when no allocator is provided.
pub(crate) static SYSTEM_ALLOCATOR: SystemAllocator = SystemAllocator;

impl Allocator for SystemAllocator {
    fn allocate(&self, size: usize) -> Option<Box<[u8]>> {
        let mut block = Vec::new();
        block.try_reserve_exact(size).ok()?;
        block.resize(size, 0);
        Some(block.into_boxed_slice())
    }
}

/// Allocates a block with `allocator`, checking that the block has the
/// requested size.
pub(crate) fn allocate(
    allocator: &dyn Allocator,
    size: usize,
) -> Result<Box<[u8]>, Error> {
    match allocator.allocate(size) {
        Some(block) if block.len() == size => Ok(block),
        Some(block) => {
            allocator.free(block);
            Err(Error::InvalidArgument(
                "allocator returned a block with the wrong size",
            ))
        }
        None => Err(Error::AllocationFailure { size }),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use pretty_assertions::assert_eq;

    use super::{allocate, Allocator, SystemAllocator};
    use crate::errors::Error;

    /// Allocator that keeps track of the memory in use, and fails when a
    /// limit is exceeded.
    #[derive(Default)]
    pub struct CountingAllocator {
        pub limit: usize,
        pub in_use: AtomicUsize,
        pub allocations: AtomicUsize,
    }

    impl CountingAllocator {
        pub fn with_limit(limit: usize) -> Self {
            Self { limit, ..Default::default() }
        }
    }

    impl Allocator for CountingAllocator {
        fn allocate(&self, size: usize) -> Option<Box<[u8]>> {
            if self.in_use.load(Ordering::Relaxed) + size > self.limit {
                return None;
            }
            self.in_use.fetch_add(size, Ordering::Relaxed);
            self.allocations.fetch_add(1, Ordering::Relaxed);
            SystemAllocator.allocate(size)
        }

        fn free(&self, block: Box<[u8]>) {
            self.in_use.fetch_sub(block.len(), Ordering::Relaxed);
        }
    }

    struct BrokenAllocator;

    impl Allocator for BrokenAllocator {
        fn allocate(&self, size: usize) -> Option<Box<[u8]>> {
            Some(vec![0; size + 1].into_boxed_slice())
        }
    }

    #[test]
    fn system_allocator() {
        let block = allocate(&SystemAllocator, 100).unwrap();
        assert_eq!(block.len(), 100);
        assert!(block.iter().all(|b| *b == 0));

        assert_eq!(
            allocate(&SystemAllocator, usize::MAX).unwrap_err(),
            Error::AllocationFailure { size: usize::MAX }
        );
    }

    #[test]
    fn counting_allocator() {
        let allocator = CountingAllocator::with_limit(150);

        let block = allocate(&allocator, 100).unwrap();
        assert_eq!(allocator.in_use.load(Ordering::Relaxed), 100);

        assert_eq!(
            allocate(&allocator, 100).unwrap_err(),
            Error::AllocationFailure { size: 100 }
        );

        allocator.free(block);
        assert_eq!(allocator.in_use.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn wrong_size() {
        assert!(matches!(
            allocate(&BrokenAllocator, 10),
            Err(Error::InvalidArgument(_))
        ));
    }
}
