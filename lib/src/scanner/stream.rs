/*! Scanner for scanning data in chunks.

This scanner is designed for scenarios where the data to be scanned is not
available as a single contiguous block of memory, but rather arrives in
smaller chunks, one after the other. The matches reported are exactly the
same that would be reported if all the chunks were concatenated and scanned
as a single block, regardless of where the chunk boundaries fall.
*/

use std::mem;

#[cfg(feature = "logging")]
use log::*;

use crate::alloc::{allocate, Allocator, SYSTEM_ALLOCATOR};
use crate::errors::{Error, Incompatible};
use crate::program::Program;
use crate::scanner::{context, Action, MatchEvent, ScanStatus};
use crate::scratch::Scratch;
use crate::state::{StateHeader, StateView};

/// Scans data in chunks.
///
/// Everything a stream remembers between chunks lives in a flat block of
/// memory with [`Program::stream_size`] bytes, allocated when the stream is
/// opened. Scanning never allocates.
///
/// # Examples
///
/// ```
/// # use mpscan::{Action, ByteClass, Depth, ProgramBuilder, Scratch, Stream};
/// let mut builder = ProgramBuilder::new();
/// builder.add_literal("ab").unwrap();
/// builder.add_repeat(ByteClass::byte(b'b'), 3, Depth::new(5)).unwrap();
///
/// let program = builder.build().unwrap();
/// let mut scratch = Scratch::new(&program).unwrap();
/// let mut stream = Stream::open(&program).unwrap();
/// let mut matches = Vec::new();
///
/// for chunk in [b"xxa".as_slice(), b"bb", b"bbby"] {
///     stream
///         .scan(&mut scratch, chunk, |m| {
///             matches.push((m.start, m.end));
///             Action::Continue
///         })
///         .unwrap();
/// }
///
/// stream.close(&mut scratch, |_| Action::Continue).unwrap();
///
/// assert_eq!(matches, vec![(Some(2), 4), (Some(3), 8)]);
/// ```
pub struct Stream<'p> {
    program: &'p Program,
    allocator: &'p dyn Allocator,
    state: Box<[u8]>,
}

impl<'p> Stream<'p> {
    /// Opens a stream for scanning with `program`.
    pub fn open(program: &'p Program) -> Result<Self, Error> {
        Self::open_with(program, &SYSTEM_ALLOCATOR)
    }

    /// Opens a stream for scanning with `program`, the stream state is
    /// requested to `allocator`.
    pub fn open_with(
        program: &'p Program,
        allocator: &'p dyn Allocator,
    ) -> Result<Self, Error> {
        program.validate()?;

        let mut state = allocate(allocator, program.stream_size())?;

        StateView::new(&program.layout, &mut state).init(program.checksum);

        #[cfg(feature = "logging")]
        debug!("Stream opened, state size: {}", state.len());

        Ok(Self { program, allocator, state })
    }

    /// Returns the program used by this stream.
    pub fn program(&self) -> &'p Program {
        self.program
    }

    /// Number of bytes scanned so far.
    pub fn offset(&self) -> u64 {
        StateHeader::new(&self.state).offset()
    }

    /// Returns `true` if the stream was stopped by a callback.
    pub fn is_terminated(&self) -> bool {
        StateHeader::new(&self.state).is_terminated()
    }

    /// Scans the next chunk of data.
    ///
    /// Matches that end within the chunk are reported to `callback`, except
    /// those that depend on bytes that were not received yet. Those are
    /// reported when the next chunks are scanned, or when the stream is
    /// closed.
    pub fn scan<F>(
        &mut self,
        scratch: &mut Scratch<'_>,
        data: &[u8],
        callback: F,
    ) -> Result<ScanStatus, Error>
    where
        F: FnMut(&MatchEvent) -> Action,
    {
        self.program.validate()?;
        scratch.validate(self.program)?;

        context::scan(
            self.program,
            &mut self.state,
            &mut scratch.buffers,
            data,
            false,
            callback,
        )
    }

    /// Closes the stream, reporting the matches that can only be decided at
    /// the end of the data.
    ///
    /// The memory used by the stream is released. Dropping a stream also
    /// releases it, but without reporting anything.
    pub fn close<F>(
        mut self,
        scratch: &mut Scratch<'_>,
        callback: F,
    ) -> Result<ScanStatus, Error>
    where
        F: FnMut(&MatchEvent) -> Action,
    {
        self.program.validate()?;
        scratch.validate(self.program)?;

        let status = context::scan(
            self.program,
            &mut self.state,
            &mut scratch.buffers,
            &[],
            true,
            callback,
        );

        #[cfg(feature = "logging")]
        debug!("Stream closed at offset {}", self.offset());

        status
    }

    /// Puts the stream back in the state it had when it was opened. No
    /// matches are reported.
    pub fn reset(&mut self) {
        StateView::new(&self.program.layout, &mut self.state)
            .init(self.program.checksum);
    }

    /// Replaces the state of this stream with a copy of the state of
    /// `other`. Both streams must use the same program.
    pub fn copy_from(&mut self, other: &Stream<'_>) -> Result<(), Error> {
        if self.program.checksum != other.program.checksum
            || self.state.len() != other.state.len()
        {
            return Err(Incompatible::StateProgram.into());
        }
        self.state.copy_from_slice(&other.state);
        Ok(())
    }

    /// Returns a new stream with a copy of the state of this one. The copy
    /// uses the same allocator.
    pub fn try_clone(&self) -> Result<Stream<'p>, Error> {
        let mut state = allocate(self.allocator, self.state.len())?;
        state.copy_from_slice(&self.state);
        Ok(Self { program: self.program, allocator: self.allocator, state })
    }

    /// Returns the stream state. Its content can be stored and loaded later
    /// with [`Stream::restore`], by the same build of this crate and with
    /// the same program.
    pub fn as_bytes(&self) -> &[u8] {
        &self.state
    }

    /// Replaces the state of this stream with a state previously obtained
    /// with [`Stream::as_bytes`].
    ///
    /// If `bytes` is not a valid state for the program, an error is returned
    /// and the stream is reset. Besides the size and the program, the fields
    /// in the state are checked for consistency, so that a corrupt state is
    /// rejected here instead of failing in a later scan.
    pub fn restore(&mut self, bytes: &[u8]) -> Result<(), Error> {
        if bytes.len() != self.state.len() {
            self.reset();
            return Err(Incompatible::StateSize {
                expected: self.state.len(),
                found: bytes.len(),
            }
            .into());
        }

        self.state.copy_from_slice(bytes);

        let result = StateView::new(&self.program.layout, &mut self.state)
            .validate(self.program.checksum, &self.program.repeats);

        if let Err(err) = result {
            self.reset();
            return Err(err.into());
        }

        Ok(())
    }
}

impl Drop for Stream<'_> {
    fn drop(&mut self) {
        self.allocator.free(mem::take(&mut self.state));
    }
}
