/*! A multi-pattern matching engine that scans blocks and streams of data.

Patterns are assembled into a [`Program`] with a [`ProgramBuilder`]. A
pattern is either a set of literals, optionally confirmed by a small
automaton that inspects the bytes around each occurrence, or a bounded
repeat of bytes from a [`ByteClass`]. Programs are immutable, and can be
shared by any number of scanners and streams.

Data can be scanned as a single block with a [`Scanner`], or in chunks with
a [`Stream`]. In both cases matches are reported through a callback in
order of increasing end offset, and a stream reports exactly the same
matches that a block scan of the concatenated chunks would report,
regardless of where chunk boundaries fall.

Scanning never allocates. The memory needed for scanning is allocated in
advance: a [`Scratch`] holds temporary buffers and each [`Stream`] owns a
fixed-size block with its state. Both can obtain their memory from a
custom [`Allocator`].

# Example

```rust
# use mpscan::{Action, ByteClass, Depth, ProgramBuilder, Scratch, Stream};
let mut builder = ProgramBuilder::new();

// A pattern that matches "foo" or "bar".
let literals = builder.add_literals([
    mpscan::Literal::new("foo"),
    mpscan::Literal::new("bar"),
]).unwrap();

// A pattern that matches runs of 2 to 4 digits.
let digits = builder
    .add_repeat(ByteClass::range(b'0'..=b'9'), 2, Depth::new(4))
    .unwrap();

let program = builder.build().unwrap();

let mut scratch = Scratch::new(&program).unwrap();
let mut stream = Stream::open(&program).unwrap();
let mut matches = Vec::new();

for chunk in [b"fo".as_slice(), b"o 12", b"3 ba", b"r"] {
    stream
        .scan(&mut scratch, chunk, |m| {
            matches.push((m.pattern, m.start, m.end));
            Action::Continue
        })
        .unwrap();
}

stream
    .close(&mut scratch, |m| {
        matches.push((m.pattern, m.start, m.end));
        Action::Continue
    })
    .unwrap();

assert_eq!(
    matches,
    vec![
        (literals, Some(0), 3),
        (digits, Some(4), 7),
        (literals, Some(8), 11),
    ]
);
```
*/

pub use alloc::Allocator;
pub use alloc::SystemAllocator;

pub use class::ByteClass;

pub use config::EngineConfig;
pub use config::RepeatConfig;

pub use confirm::Alternative;
pub use confirm::AutomatonBuilder;
pub use confirm::Reach;

pub use errors::BuildError;
pub use errors::Error;
pub use errors::Incompatible;

pub use program::AutomatonId;
pub use program::Literal;
pub use program::LiteralFlagSet;
pub use program::LiteralFlags;
pub use program::LiteralId;
pub use program::PatternFlagSet;
pub use program::PatternFlags;
pub use program::PatternId;
pub use program::Program;
pub use program::ProgramBuilder;
pub use program::ProgramHeader;
pub use program::RepeatId;
pub use program::MAX_LITERAL_LEN;

pub use repeat::Depth;
pub use repeat::RepeatDescriptor;
pub use repeat::RepeatKind;

pub use scanner::Action;
pub use scanner::MatchEvent;
pub use scanner::ScanStatus;
pub use scanner::Scanner;
pub use scanner::Stream;

pub use scratch::Scratch;

pub mod config;
pub mod loadval;

mod alloc;
mod class;
mod confirm;
mod errors;
mod literals;
mod program;
mod repeat;
mod scanner;
mod scratch;
mod state;
