/*! Layout of the stream state.

The state of a stream is a flat region of bytes with a fixed size that only
depends on the program. The region starts with a header, which is followed
by the history (the last bytes scanned), a table with one entry per pattern,
and the state of every bounded repeat:

```text
 offset  size   field
 0       4      magic "MPSS"
 4       4      checksum of the program
 8       8      stream offset (bytes scanned so far)
 16      8      resume key: end offset
 24      4      resume key: rank
 28      1      flags
 29      1      padding
 30      2      length of the history
 32      H      history
 32+H    8*P    pattern table
 ...            repeat states
```

All integers are little-endian. Each entry in the pattern table contains
the end offset of the last match reported for the pattern plus one (zero
means that the pattern was not reported yet), and the most significant bit
is set when the pattern can't be reported anymore.

Because the state is just bytes, copying a stream is copying its bytes.
*/

use std::ops::Range;

use crate::errors::Incompatible;
use crate::literals::Key;
use crate::loadval::load;
use crate::repeat::{RepeatDescriptor, RepeatState};

#[cfg(test)]
mod tests;

/// Magic that identifies a stream state.
pub(crate) const MAGIC: [u8; 4] = *b"MPSS";

const MAGIC_AT: usize = 0;
const CHECKSUM_AT: usize = 4;
const OFFSET_AT: usize = 8;
const RESUME_END_AT: usize = 16;
const RESUME_RANK_AT: usize = 24;
const FLAGS_AT: usize = 28;
const HISTORY_LEN_AT: usize = 30;
const HEADER_SIZE: usize = 32;

/// The stream was terminated by the callback.
const TERMINATED: u8 = 0x01;

/// The pattern can't be reported anymore.
const EXHAUSTED: u64 = 1 << 63;

/// Describes where each piece of the stream state is located.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct StateLayout {
    history_size: usize,
    patterns: Range<usize>,
    repeats: Vec<Range<usize>>,
    size: usize,
}

impl StateLayout {
    /// Creates the layout for a program that retains `history_size` bytes
    /// of history, and has the given number of patterns and repeats.
    pub fn new(
        history_size: usize,
        num_patterns: usize,
        repeats: &[RepeatDescriptor],
    ) -> Self {
        let patterns_at = HEADER_SIZE + history_size;
        let patterns = patterns_at..patterns_at + 8 * num_patterns;

        let mut offset = patterns.end;
        let repeats = repeats
            .iter()
            .map(|repeat| {
                let range = offset..offset + repeat.state_size();
                offset = range.end;
                range
            })
            .collect();

        Self { history_size, patterns, repeats, size: offset }
    }

    /// Size of the stream state in bytes.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Maximum number of bytes in the history.
    #[inline]
    pub fn history_size(&self) -> usize {
        self.history_size
    }
}

/// Entry in the pattern table.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct PatternEntry {
    /// End offset of the last match reported for the pattern.
    pub last_end: Option<u64>,
    /// The pattern can't be reported anymore.
    pub exhausted: bool,
}

/// Read-only access to the header of a stream state.
pub(crate) struct StateHeader<'a> {
    raw: &'a [u8],
}

impl<'a> StateHeader<'a> {
    pub fn new(raw: &'a [u8]) -> Self {
        debug_assert!(raw.len() >= HEADER_SIZE);
        Self { raw }
    }

    #[inline]
    pub fn offset(&self) -> u64 {
        load(self.raw, OFFSET_AT, 0, self.raw.len())
    }

    #[inline]
    pub fn is_terminated(&self) -> bool {
        self.raw[FLAGS_AT] & TERMINATED != 0
    }
}

/// Read and write access to the stream state.
pub(crate) struct StateView<'a> {
    layout: &'a StateLayout,
    raw: &'a mut [u8],
}

impl<'a> StateView<'a> {
    pub fn new(layout: &'a StateLayout, raw: &'a mut [u8]) -> Self {
        Self { layout, raw }
    }

    /// Puts the state in its initial state, for the program with the given
    /// checksum.
    pub fn init(&mut self, checksum: u32) {
        self.raw.fill(0);
        self.raw[MAGIC_AT..MAGIC_AT + 4].copy_from_slice(MAGIC.as_slice());
        self.raw[CHECKSUM_AT..CHECKSUM_AT + 4]
            .copy_from_slice(checksum.to_le_bytes().as_slice());
    }

    /// Checks that the state has the size required by the layout, that it
    /// was initialized for the program with the given checksum, and that
    /// its fields are consistent with each other.
    ///
    /// `repeats` are the descriptors of the program's bounded repeats.
    pub fn validate(
        &mut self,
        checksum: u32,
        repeats: &[RepeatDescriptor],
    ) -> Result<(), Incompatible> {
        if self.raw.len() != self.layout.size() {
            return Err(Incompatible::StateSize {
                expected: self.layout.size(),
                found: self.raw.len(),
            });
        }
        if self.raw[MAGIC_AT..MAGIC_AT + 4] != MAGIC
            || self.read_u32(CHECKSUM_AT) != checksum
            || self.raw[FLAGS_AT] & !TERMINATED != 0
        {
            return Err(Incompatible::StateProgram);
        }
        // A terminated stream is never scanned again, its fields may have
        // been left halfway through a chunk.
        if self.is_terminated() {
            return Ok(());
        }
        if !self.is_consistent(repeats) {
            return Err(Incompatible::StateProgram);
        }
        Ok(())
    }

    /// Checks the relationships between the fields of a state that is not
    /// terminated. Every offset stored in the state is at most the number
    /// of bytes scanned so far.
    fn is_consistent(&mut self, repeats: &[RepeatDescriptor]) -> bool {
        let offset = self.offset();

        let history_len = self.layout.history_size() as u64;
        if self.history_len() as u64 != history_len.min(offset) {
            return false;
        }

        if self.resume().0 > offset.saturating_add(1) {
            return false;
        }

        let num_patterns = self.layout.patterns.len() / 8;
        let reported_later = |i| {
            self.pattern(i).last_end.is_some_and(|end| end > offset)
        };
        if (0..num_patterns).any(reported_later) {
            return false;
        }

        repeats.len() == self.layout.repeats.len()
            && repeats
                .iter()
                .all(|desc| self.repeat(desc).is_consistent(offset))
    }

    /// Number of bytes scanned so far.
    #[inline]
    pub fn offset(&self) -> u64 {
        StateHeader::new(self.raw).offset()
    }

    #[inline]
    pub fn set_offset(&mut self, offset: u64) {
        self.write_u64(OFFSET_AT, offset);
    }

    /// Candidates with a key lower than this one were already processed.
    #[inline]
    pub fn resume(&self) -> Key {
        (self.read_u64(RESUME_END_AT), self.read_u32(RESUME_RANK_AT))
    }

    #[inline]
    pub fn set_resume(&mut self, key: Key) {
        self.write_u64(RESUME_END_AT, key.0);
        self.raw[RESUME_RANK_AT..RESUME_RANK_AT + 4]
            .copy_from_slice(key.1.to_le_bytes().as_slice());
    }

    #[inline]
    pub fn is_terminated(&self) -> bool {
        StateHeader::new(self.raw).is_terminated()
    }

    #[inline]
    pub fn set_terminated(&mut self) {
        self.raw[FLAGS_AT] |= TERMINATED;
    }

    /// The last bytes scanned, at most [`StateLayout::history_size`].
    pub fn history(&self) -> &[u8] {
        let start = HEADER_SIZE;
        &self.raw[start..start + self.history_len()]
    }

    /// Replaces the history with the last bytes of `older` followed by
    /// `newer`.
    pub fn set_history(&mut self, older: &[u8], newer: &[u8]) {
        let keep = self.layout.history_size().min(older.len() + newer.len());
        let from_newer = keep.min(newer.len());
        let from_older = keep - from_newer;

        let history = &mut self.raw[HEADER_SIZE..HEADER_SIZE + keep];
        let (head, tail) = history.split_at_mut(from_older);

        head.copy_from_slice(&older[older.len() - from_older..]);
        tail.copy_from_slice(&newer[newer.len() - from_newer..]);

        self.raw[HISTORY_LEN_AT..HISTORY_LEN_AT + 2]
            .copy_from_slice((keep as u16).to_le_bytes().as_slice());
    }

    pub fn pattern(&self, index: usize) -> PatternEntry {
        let entry = self.read_u64(self.layout.patterns.start + 8 * index);
        PatternEntry {
            last_end: (entry & !EXHAUSTED).checked_sub(1),
            exhausted: entry & EXHAUSTED != 0,
        }
    }

    pub fn set_pattern(&mut self, index: usize, entry: PatternEntry) {
        let mut value = entry.last_end.map_or(0, |end| end + 1);
        if entry.exhausted {
            value |= EXHAUSTED;
        }
        self.write_u64(self.layout.patterns.start + 8 * index, value);
    }

    /// Returns the state of a repeat.
    pub fn repeat<'r>(
        &'r mut self,
        desc: &'r RepeatDescriptor,
    ) -> RepeatState<'r> {
        let range = self.layout.repeats[usize::from(desc.id())].clone();
        RepeatState::new(desc, &mut self.raw[range])
    }

    #[inline]
    fn history_len(&self) -> usize {
        u16::from_le_bytes([
            self.raw[HISTORY_LEN_AT],
            self.raw[HISTORY_LEN_AT + 1],
        ]) as usize
    }

    #[inline]
    fn read_u32(&self, at: usize) -> u32 {
        load(self.raw, at, 0, self.raw.len())
    }

    #[inline]
    fn read_u64(&self, at: usize) -> u64 {
        load(self.raw, at, 0, self.raw.len())
    }

    #[inline]
    fn write_u64(&mut self, at: usize, value: u64) {
        self.raw[at..at + 8].copy_from_slice(value.to_le_bytes().as_slice());
    }
}
