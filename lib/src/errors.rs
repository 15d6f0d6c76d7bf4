use thiserror::Error;

use crate::program::{AutomatonId, PatternId};

/// Errors returned by this crate.
///
/// A scan that was stopped by its callback is not an error, it is reported
/// as [`crate::ScanStatus::Terminated`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// A parameter passed to the function was invalid.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// A program, stream state or scratch space can't be used with the
    /// object it was paired with.
    #[error(transparent)]
    Incompatible(#[from] Incompatible),

    /// A memory allocation failed.
    #[error("can not allocate {size} bytes")]
    AllocationFailure {
        /// Number of bytes requested.
        size: usize,
    },

    /// The descriptors passed to [`crate::ProgramBuilder`] are not valid.
    #[error(transparent)]
    Build(#[from] BuildError),
}

/// Describes why two objects are incompatible.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Incompatible {
    /// The program doesn't start with the expected magic.
    #[error("not a compiled program")]
    Magic,

    /// The program was produced by a different version of this crate.
    #[error("program built for version {found}, expected {expected}")]
    Version {
        /// Version expected by this build.
        expected: u32,
        /// Version found in the program.
        found: u32,
    },

    /// The program was produced for a different platform.
    #[error("program built for platform `{found}`, expected `{expected}`")]
    Platform {
        /// Platform of this build.
        expected: String,
        /// Platform found in the program.
        found: String,
    },

    /// The stream state has an unexpected size.
    #[error("stream state has {found} bytes, expected {expected}")]
    StateSize {
        /// Size required by the program.
        expected: usize,
        /// Actual size of the stream state.
        found: usize,
    },

    /// The stream state is corrupt or was opened for a different program.
    #[error("stream state doesn't belong to this program")]
    StateProgram,

    /// The scratch space is too small for the program.
    #[error("scratch space was not allocated for this program")]
    Scratch,
}

/// Errors detected while assembling a program with
/// [`crate::ProgramBuilder`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BuildError {
    /// Literals can't be empty.
    #[error("empty literal in pattern {0:?}")]
    EmptyLiteral(PatternId),

    /// A literal exceeds the maximum literal length.
    #[error(
        "literal of {len} bytes in pattern {pattern:?} exceeds the maximum \
         of {max} bytes"
    )]
    LiteralTooLong {
        /// Pattern that contains the literal.
        pattern: PatternId,
        /// Length of the literal.
        len: usize,
        /// Maximum length allowed.
        max: usize,
    },

    /// A pattern has nothing that can make it match.
    #[error("pattern {0:?} has no literals")]
    NoLiterals(PatternId),

    /// A bounded repeat has invalid bounds.
    #[error("invalid repeat bounds {{{min},{max}}} in pattern {pattern:?}")]
    RepeatBounds {
        /// Pattern that contains the repeat.
        pattern: PatternId,
        /// Lower bound.
        min: u32,
        /// Upper bound.
        max: String,
    },

    /// A bounded repeat has an empty byte class.
    #[error("empty byte class in pattern {0:?}")]
    EmptyClass(PatternId),

    /// A confirmation automaton is malformed.
    #[error("invalid automaton {id:?}: {reason}")]
    Automaton {
        /// The automaton.
        id: AutomatonId,
        /// What's wrong with it.
        reason: String,
    },

    /// The pattern doesn't exist.
    #[error("unknown pattern {0:?}")]
    UnknownPattern(PatternId),

    /// A pattern references an automaton that doesn't exist.
    #[error("unknown automaton {0:?}")]
    UnknownAutomaton(AutomatonId),

    /// The configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The program exceeds some internal limit.
    #[error("program too large: {0}")]
    TooLarge(&'static str),
}
