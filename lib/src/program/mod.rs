/*! Compiled programs.

A [`Program`] is the immutable representation of a set of patterns that is
consumed while scanning. It contains the table with every literal that must
be searched for, the descriptors of the bounded repeats, the code of the
confirmation automata, and some metadata derived from all of them, like the
number of bytes that must be retained between the chunks of a stream.

Programs are assembled with [`ProgramBuilder`] from descriptors that were
already decided by some pattern compiler. A program can be shared by any
number of scanners and streams, even across threads.
*/

use std::fmt::{Debug, Formatter};

use bitmask::bitmask;
use bstr::ByteSlice;
use serde::{Deserialize, Serialize};

use crate::confirm::Automaton;
use crate::config::EngineConfig;
use crate::errors::{Error, Incompatible};
use crate::literals::LiteralTable;
use crate::repeat::RepeatDescriptor;
use crate::state::StateLayout;

pub use builder::{Literal, ProgramBuilder, MAX_LITERAL_LEN};

mod builder;


macro_rules! id_type {
    ($(#[$attr:meta])* $name:ident) => {
        $(#[$attr])*
        #[derive(
            Copy,
            Clone,
            Debug,
            Eq,
            Hash,
            PartialEq,
            PartialOrd,
            Ord,
            Serialize,
            Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(u32);

        impl From<u32> for $name {
            #[inline]
            fn from(value: u32) -> Self {
                Self(value)
            }
        }

        impl From<usize> for $name {
            #[inline]
            fn from(value: usize) -> Self {
                Self(value as u32)
            }
        }

        impl From<$name> for u32 {
            #[inline]
            fn from(value: $name) -> Self {
                value.0
            }
        }

        impl From<$name> for usize {
            #[inline]
            fn from(value: $name) -> Self {
                value.0 as usize
            }
        }
    };
}

id_type!(
    /// Identifies a pattern.
    ///
    /// Patterns are numbered in the order they were added to the
    /// [`ProgramBuilder`], starting at zero. This is the identifier passed
    /// to the callback in every [`crate::MatchEvent`].
    PatternId
);

id_type!(
    /// Identifies a literal within a program.
    LiteralId
);

id_type!(
    /// Identifies a bounded repeat within a program.
    RepeatId
);

id_type!(
    /// Identifies a confirmation automaton within a program.
    AutomatonId
);

bitmask! {
    /// Flags associated to patterns.
    ///
    /// `SingleMatch` patterns are reported at most once per stream, and
    /// `NoStart` patterns are reported without the start offset of the
    /// match.
    #[derive(Debug)]
    pub mask PatternFlagSet: u8 where flags PatternFlags {
        SingleMatch  = 0x01,
        NoStart      = 0x02,
    }
}

bitmask! {
    /// Flags associated to literals. `Anchored` literals only match at the
    /// start of the stream.
    #[derive(Debug)]
    pub mask LiteralFlagSet: u8 where flags LiteralFlags {
        Anchored     = 0x01,
    }
}

/// What a pattern is made of.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PatternKind {
    /// The pattern matches when any of its literals is found (and confirmed,
    /// for literals with an automaton).
    Literals,
    /// The pattern is a bounded repeat.
    Repeat(RepeatId),
}

#[derive(Clone, Debug)]
pub(crate) struct PatternInfo {
    pub kind: PatternKind,
    pub flags: PatternFlagSet,
}

/// What is triggered when a literal is found.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum LiteralTarget {
    /// The literal is part of a pattern, which is reported.
    Pattern(PatternId),
    /// The literal is a byte of the class of a bounded repeat, and it may
    /// start a new run of the repeat.
    Repeat(RepeatId),
}

pub(crate) struct LiteralInfo {
    pub bytes: Vec<u8>,
    pub target: LiteralTarget,
    pub flags: LiteralFlagSet,
    pub automaton: Option<AutomatonId>,
}

impl Debug for LiteralInfo {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiteralInfo")
            .field("bytes", &self.bytes.as_bstr())
            .field("target", &self.target)
            .field("flags", &self.flags)
            .field("automaton", &self.automaton)
            .finish()
    }
}

/// Identifies the version of this crate, and the platform, that produced a
/// program.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgramHeader {
    /// Always [`ProgramHeader::MAGIC`].
    pub magic: [u8; 4],
    /// Version of the program format.
    pub version: u32,
    /// Platform for which the program was built.
    pub platform: String,
}

impl ProgramHeader {
    /// Magic bytes at the start of every program header.
    pub const MAGIC: [u8; 4] = *b"MPSC";
    /// Incremented every time the layout of programs, or the layout of the
    /// stream state, changes.
    pub const VERSION: u32 = 1;

    /// Returns the header for programs built by this build of the crate.
    pub fn current() -> Self {
        Self {
            magic: Self::MAGIC,
            version: Self::VERSION,
            platform: current_platform(),
        }
    }

    /// Checks that a program with this header can be used by this build.
    pub fn validate(&self) -> Result<(), Incompatible> {
        if self.magic != Self::MAGIC {
            return Err(Incompatible::Magic);
        }
        if self.version != Self::VERSION {
            return Err(Incompatible::Version {
                expected: Self::VERSION,
                found: self.version,
            });
        }
        let platform = current_platform();
        if self.platform != platform {
            return Err(Incompatible::Platform {
                expected: platform,
                found: self.platform.clone(),
            });
        }
        Ok(())
    }
}

fn current_platform() -> String {
    format!(
        "{}-{}-{}",
        std::env::consts::ARCH,
        std::env::consts::OS,
        if cfg!(target_endian = "little") { "le" } else { "be" }
    )
}

/// A compiled set of patterns.
pub struct Program {
    pub(crate) header: ProgramHeader,
    pub(crate) config: EngineConfig,
    pub(crate) patterns: Vec<PatternInfo>,
    pub(crate) literals: Vec<LiteralInfo>,
    pub(crate) table: LiteralTable,
    pub(crate) repeats: Vec<RepeatDescriptor>,
    pub(crate) automata: Vec<Automaton>,
    /// Length of the longest literal.
    pub(crate) max_literal_len: usize,
    /// Maximum number of bytes that an automaton reads before the start
    /// of its literal.
    pub(crate) lookbehind: usize,
    /// Maximum number of bytes that an automaton reads after the end of
    /// its literal.
    pub(crate) lookahead: usize,
    pub(crate) layout: StateLayout,
    pub(crate) checksum: u32,
}

impl Program {
    /// Checks that the program was built for this version of the crate and
    /// for the current platform.
    pub fn validate(&self) -> Result<(), Error> {
        self.header.validate()?;
        Ok(())
    }

    /// Header of the program.
    pub fn header(&self) -> &ProgramHeader {
        &self.header
    }

    /// Configuration used when the program was built.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Size in bytes of the state of each stream scanning with this program.
    #[inline]
    pub fn stream_size(&self) -> usize {
        self.layout.size()
    }

    /// CRC-32 of the descriptors in the program. Stream states remember the
    /// checksum of the program that created them.
    #[inline]
    pub fn checksum(&self) -> u32 {
        self.checksum
    }

    /// Number of patterns in the program.
    pub fn num_patterns(&self) -> usize {
        self.patterns.len()
    }

    /// Number of literals in the program, including those that trigger
    /// bounded repeats.
    pub fn num_literals(&self) -> usize {
        self.literals.len()
    }

    /// Number of bounded repeats in the program.
    pub fn num_repeats(&self) -> usize {
        self.repeats.len()
    }

    /// Descriptor of a bounded repeat.
    pub fn repeat(&self, id: RepeatId) -> &RepeatDescriptor {
        &self.repeats[usize::from(id)]
    }

    /// Number of bytes retained between the chunks of a stream.
    #[inline]
    pub fn history_size(&self) -> usize {
        self.layout.history_size()
    }

    /// Size of the buffer used for scanning the boundary between two chunks.
    #[inline]
    pub(crate) fn seam_size(&self) -> usize {
        self.history_size() + self.max_literal_len.saturating_sub(1)
    }

    /// Size of the largest window that an automaton can look at.
    #[inline]
    pub(crate) fn window_size(&self) -> usize {
        self.lookbehind + self.max_literal_len + self.lookahead
    }

    #[inline]
    pub(crate) fn literal(&self, id: LiteralId) -> &LiteralInfo {
        &self.literals[usize::from(id)]
    }

    #[inline]
    pub(crate) fn pattern(&self, id: PatternId) -> &PatternInfo {
        &self.patterns[usize::from(id)]
    }

    #[inline]
    pub(crate) fn automaton(&self, id: AutomatonId) -> &Automaton {
        &self.automata[usize::from(id)]
    }
}

impl Debug for Program {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Program")
            .field("header", &self.header)
            .field("patterns", &self.patterns.len())
            .field("literals", &self.literals.len())
            .field("repeats", &self.repeats.len())
            .field("automata", &self.automata.len())
            .field("history_size", &self.history_size())
            .field("stream_size", &self.stream_size())
            .field("checksum", &format_args!("{:08x}", self.checksum))
            .finish()
    }
}
