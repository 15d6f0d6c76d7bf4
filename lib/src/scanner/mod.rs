/*! This module implements the scanners.

There are two ways of scanning data with a [`Program`]. The block-mode
[`Scanner`] scans a single contiguous block, while a [`Stream`] scans data
that arrives in chunks, reporting exactly the same matches that would be
reported if all the chunks were scanned as a single block.

Both of them report matches through a callback that receives a
[`MatchEvent`] and decides whether the scan continues.
*/

use crate::errors::Error;
use crate::program::{PatternId, Program};
use crate::scratch::Scratch;
use crate::state::StateView;

pub use stream::Stream;

mod context;
mod stream;


/// A match reported while scanning.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MatchEvent {
    /// The pattern that matched.
    pub pattern: PatternId,
    /// Stream offset of the first byte of the match. `None` for patterns
    /// with the `NoStart` flag.
    pub start: Option<u64>,
    /// Stream offset that follows the last byte of the match.
    pub end: u64,
}

/// Returned by the callback to indicate whether the scan must continue.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    /// Keep scanning.
    Continue,
    /// Stop scanning. A stopped stream doesn't report any more matches.
    Stop,
}

/// Outcome of a scan that didn't fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScanStatus {
    /// Every match was reported.
    Completed,
    /// The callback asked to stop, now or in some previous scan of the same
    /// stream.
    Terminated,
}

/// Scans blocks of data with a compiled program.
///
/// The scanner receives a [`Program`] and scans data with it. The same
/// scanner can be used for scanning any number of blocks, even in
/// parallel, as long as each thread provides its own [`Scratch`].
///
/// # Examples
///
/// ```
/// # use mpscan::{Action, ProgramBuilder, Scanner, Scratch};
/// let mut builder = ProgramBuilder::new();
/// let ab = builder.add_literal("ab").unwrap();
/// let program = builder.build().unwrap();
///
/// let mut scratch = Scratch::new(&program).unwrap();
/// let mut matches = Vec::new();
///
/// Scanner::new(&program)
///     .scan(&mut scratch, b"xxabb", |m| {
///         matches.push(*m);
///         Action::Continue
///     })
///     .unwrap();
///
/// assert_eq!(matches.len(), 1);
/// assert_eq!(matches[0].pattern, ab);
/// assert_eq!(matches[0].start, Some(2));
/// assert_eq!(matches[0].end, 4);
/// ```
pub struct Scanner<'p> {
    program: &'p Program,
}

impl<'p> Scanner<'p> {
    /// Creates a new scanner.
    pub fn new(program: &'p Program) -> Self {
        Self { program }
    }

    /// Returns the program used by this scanner.
    pub fn program(&self) -> &'p Program {
        self.program
    }

    /// Scans a block of data.
    ///
    /// `callback` is called for every match, in order of increasing end
    /// offset. When the callback returns [`Action::Stop`] the scan stops
    /// and [`ScanStatus::Terminated`] is returned.
    pub fn scan<F>(
        &self,
        scratch: &mut Scratch<'_>,
        data: &[u8],
        callback: F,
    ) -> Result<ScanStatus, Error>
    where
        F: FnMut(&MatchEvent) -> Action,
    {
        self.program.validate()?;
        scratch.validate(self.program)?;

        // Block-mode scans use a stream state that lives in the scratch
        // space, and that is discarded after the scan.
        let state = &mut scratch.block[..self.program.stream_size()];

        StateView::new(&self.program.layout, state)
            .init(self.program.checksum);

        context::scan(
            self.program,
            state,
            &mut scratch.buffers,
            data,
            true,
            callback,
        )
    }
}
