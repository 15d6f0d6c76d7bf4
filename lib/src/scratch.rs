/*! Scratch space.

Scanning needs some temporary memory: a buffer for the seam between the
history and a new chunk, a buffer for the window seen by confirmation
automata, a buffer for sorting candidates that end at the same offset, and
the stream state used by block-mode scans. All of it lives in a [`Scratch`],
which is allocated in advance so that scanning never allocates.

A scratch space can be used with any program that fits in it, see
[`Scratch::grow_for`]. It's not shared, every thread that scans needs its
own scratch space, and the borrow checker makes sure that a scratch space
is not used by two scans at the same time.
*/

use std::mem;

#[cfg(feature = "logging")]
use log::*;

use crate::alloc::{allocate, Allocator, SYSTEM_ALLOCATOR};
use crate::errors::{Error, Incompatible};
use crate::literals::Candidate;
use crate::program::Program;

/// Temporary memory used while scanning.
pub struct Scratch<'a> {
    allocator: &'a dyn Allocator,
    pub(crate) buffers: Buffers,
    /// Stream state used by block-mode scans.
    pub(crate) block: Box<[u8]>,
}

/// Buffers used by every scan.
pub(crate) struct Buffers {
    pub seam: Box<[u8]>,
    pub window: Box<[u8]>,
    pub ties: Vec<Candidate>,
}

impl Scratch<'static> {
    /// Creates a scratch space for scanning with `program`, using the
    /// system allocator.
    pub fn new(program: &Program) -> Result<Self, Error> {
        Self::new_with(program, &SYSTEM_ALLOCATOR)
    }
}

impl<'a> Scratch<'a> {
    /// Creates a scratch space for scanning with `program`. The memory is
    /// requested to `allocator`.
    pub fn new_with(
        program: &Program,
        allocator: &'a dyn Allocator,
    ) -> Result<Self, Error> {
        program.validate()?;

        let mut scratch = Self {
            allocator,
            buffers: Buffers {
                seam: Box::default(),
                window: Box::default(),
                ties: Vec::new(),
            },
            block: Box::default(),
        };

        scratch.grow_for(program)?;

        Ok(scratch)
    }

    /// Makes the scratch space large enough for `program`, keeping it large
    /// enough for the programs it already fits. This allows sharing a single
    /// scratch space among several programs.
    pub fn grow_for(&mut self, program: &Program) -> Result<(), Error> {
        program.validate()?;

        grow(self.allocator, &mut self.buffers.seam, program.seam_size())?;
        grow(self.allocator, &mut self.buffers.window, program.window_size())?;
        grow(self.allocator, &mut self.block, program.stream_size())?;

        let ties = program.num_literals();

        if self.buffers.ties.capacity() < ties {
            let additional = ties - self.buffers.ties.len();
            self.buffers
                .ties
                .try_reserve_exact(additional)
                .map_err(|_| Error::AllocationFailure {
                    size: ties * mem::size_of::<Candidate>(),
                })?;
        }

        #[cfg(feature = "logging")]
        debug!(
            "Scratch space: seam {}, window {}, block {}, ties {}",
            self.buffers.seam.len(),
            self.buffers.window.len(),
            self.block.len(),
            self.buffers.ties.capacity()
        );

        Ok(())
    }

    /// Total number of bytes in the scratch space.
    pub fn size(&self) -> usize {
        self.buffers.seam.len()
            + self.buffers.window.len()
            + self.block.len()
            + self.buffers.ties.capacity() * mem::size_of::<Candidate>()
    }

    /// Checks that the scratch space is large enough for `program`.
    pub(crate) fn validate(
        &self,
        program: &Program,
    ) -> Result<(), Incompatible> {
        if self.buffers.seam.len() < program.seam_size()
            || self.buffers.window.len() < program.window_size()
            || self.block.len() < program.stream_size()
            || self.buffers.ties.capacity() < program.num_literals()
        {
            return Err(Incompatible::Scratch);
        }
        Ok(())
    }
}

impl Drop for Scratch<'_> {
    fn drop(&mut self) {
        release(self.allocator, mem::take(&mut self.buffers.seam));
        release(self.allocator, mem::take(&mut self.buffers.window));
        release(self.allocator, mem::take(&mut self.block));
    }
}

/// Replaces `buffer` with a larger one if it has less than `size` bytes.
fn grow(
    allocator: &dyn Allocator,
    buffer: &mut Box<[u8]>,
    size: usize,
) -> Result<(), Error> {
    if buffer.len() < size {
        let larger = allocate(allocator, size)?;
        release(allocator, mem::replace(buffer, larger));
    }
    Ok(())
}

/// Returns a buffer to the allocator. Empty buffers were not allocated by
/// it.
fn release(allocator: &dyn Allocator, buffer: Box<[u8]>) {
    if !buffer.is_empty() {
        allocator.free(buffer);
    }
}
