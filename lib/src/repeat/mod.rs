/*! Bounded repeats.

A bounded repeat is a byte class that must match between `min` and `max`
consecutive times. A repeat reports a match at the end of every *maximal*
run of consecutive bytes in the class, provided that the length `n` of the
run satisfies `min <= n <= max`. For example, `b{3,5}` matches `bbbbb`
in `xbbbbby`, but doesn't match anything in `xbbbbbby`, because the run of
six `b` is longer than the upper bound.

Tracking the length of a run doesn't require one state per repetition. The
state of a repeat is kept in one of three compact representations, chosen
when the program is built according to the magnitude of the bounds (see
[`RepeatKind::select`]):

- [`RepeatKind::Bitmap`] keeps a bitmap with the outcome of the last
  `max + 1` steps. Used for small finite bounds.

- [`RepeatKind::Ring`] keeps the offsets of the last `max + 1` matching bytes
  in a ring. Used for finite bounds too large for the bitmap.

- [`RepeatKind::Counter`] keeps a saturating counter. Used for unbounded
  repeats and for finite bounds too large for the ring.

All of them give exactly the same answers, and all of them are accessed
through [`RepeatState`], so the code driving the repeats never needs to know
which representation is in use.

The state of a repeat lives inside the stream state, and [`RepeatState`] is
just a view that reads and writes it in place. This means that the state of
a repeat survives across the chunks of a stream, bit for bit.
*/

use std::mem::size_of;

use crate::class::ByteClass;
use crate::config::RepeatConfig;
use crate::literals::Key;
use crate::loadval::{load, load_cautious_fwd};
use crate::program::{PatternId, RepeatId};

pub use depth::Depth;

mod depth;

#[cfg(test)]
mod tests;

/// The representations for the state of a bounded repeat.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RepeatKind {
    /// Bitmap with the outcome of the most recent steps.
    Bitmap,
    /// Saturating counter.
    Counter,
    /// Ring with the offsets of the most recent matching bytes.
    Ring,
}

impl RepeatKind {
    /// Chooses the representation for a repeat with the given upper bound.
    ///
    /// The choice depends only on `max` and on the thresholds in `config`.
    pub fn select(max: Depth, config: &RepeatConfig) -> Self {
        match max.value() {
            Some(max) if max <= config.bitmap_limit => RepeatKind::Bitmap,
            Some(max) if max <= config.ring_limit => RepeatKind::Ring,
            _ => RepeatKind::Counter,
        }
    }
}

/// Static description of a bounded repeat.
#[derive(Clone, Debug)]
pub struct RepeatDescriptor {
    pub(crate) id: RepeatId,
    pub(crate) pattern: PatternId,
    pub(crate) class: ByteClass,
    pub(crate) min: u32,
    pub(crate) max: Depth,
    pub(crate) kind: RepeatKind,
    /// Each byte in the class is a literal that triggers the repeat. These
    /// are the ranks of such literals, sorted by byte.
    pub(crate) ranks: Vec<(u8, u32)>,
}

impl RepeatDescriptor {
    /// Identifier of this repeat.
    pub fn id(&self) -> RepeatId {
        self.id
    }

    /// Pattern reported when the repeat matches.
    pub fn pattern(&self) -> PatternId {
        self.pattern
    }

    /// The repeated byte class.
    pub fn class(&self) -> &ByteClass {
        &self.class
    }

    /// Minimum number of repetitions.
    pub fn min(&self) -> u32 {
        self.min
    }

    /// Maximum number of repetitions.
    pub fn max(&self) -> Depth {
        self.max
    }

    /// Representation used for the state of this repeat.
    pub fn kind(&self) -> RepeatKind {
        self.kind
    }

    /// Returns `true` if a run of exactly `n` repetitions satisfies the
    /// bounds of this repeat.
    #[inline]
    pub fn accepts(&self, n: u64) -> bool {
        n >= self.min as u64 && self.max.admits(n)
    }

    /// Rank of the matches that end with the given byte. Matches are ranked
    /// like the literal that corresponds to their last byte.
    pub(crate) fn rank_of(&self, byte: u8) -> u32 {
        match self.ranks.binary_search_by_key(&byte, |(b, _)| *b) {
            Ok(i) => self.ranks[i].1,
            Err(_) => u32::MAX,
        }
    }

    /// Number of items kept in the bitmap or ring, `max + 1`. This allows
    /// telling a run of exactly `max` repetitions from a longer one.
    #[inline]
    fn window(&self) -> u64 {
        self.max.value().map(|max| max as u64 + 1).unwrap_or(u64::MAX)
    }

    /// Number of bytes used by the state of this repeat.
    pub(crate) fn state_size(&self) -> usize {
        HEADER_SIZE
            + match self.kind {
                RepeatKind::Bitmap => size_of::<u64>(),
                RepeatKind::Counter => size_of::<u64>(),
                RepeatKind::Ring => {
                    RING_SLOTS + self.window() as usize * size_of::<u64>()
                }
            }
    }
}

/// A run that satisfied the bounds of its repeat, and must be reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct RunMatch {
    /// Offset of the first byte in the run.
    pub start: u64,
    /// Offset that follows the last byte in the run.
    pub end: u64,
    /// Rank of the match, see [`RepeatDescriptor::rank_of`].
    pub rank: u32,
}

impl RunMatch {
    #[inline]
    pub fn key(&self) -> Key {
        (self.end, self.rank)
    }
}

// Layout of the state of a repeat:
//
//   [0..8)    end of the most recent run + 1, or 0 if there was no run yet
//   [8..16)   end of the pending match + 1, or 0 if there's no pending match
//   [16..24)  length of the pending match
//   [24..28)  rank of the pending match
//   [28..32)  padding
//   [32..)    payload, which depends on the representation
//
// Payload for bitmaps: u64 bitmap, bit 0 is the most recent step.
// Payload for counters: u64 counter.
// Payload for rings: u16 number of items, u16 position for the next item,
// u32 padding, and the slots (u64 each).
const RUN_END: usize = 0;
const PENDING_END: usize = 8;
const PENDING_LEN: usize = 16;
const PENDING_RANK: usize = 24;
const PAYLOAD: usize = 32;
const HEADER_SIZE: usize = PAYLOAD;
const RING_SLOTS: usize = 8;

/// View over the state of a bounded repeat.
pub(crate) struct RepeatState<'s> {
    desc: &'s RepeatDescriptor,
    raw: &'s mut [u8],
}

impl<'s> RepeatState<'s> {
    /// Creates a view over the state of the repeat described by `desc`.
    /// `raw` must have exactly [`RepeatDescriptor::state_size`] bytes.
    pub fn new(desc: &'s RepeatDescriptor, raw: &'s mut [u8]) -> Self {
        debug_assert_eq!(raw.len(), desc.state_size());
        Self { desc, raw }
    }

    /// Puts the repeat in its initial state: no run, no pending match.
    pub fn init(&mut self) {
        self.raw.fill(0);
    }

    /// Returns the offset that follows the last byte of the most recent run,
    /// regardless of whether the run is still open or was already closed.
    /// Every byte in the class before this offset has been accounted for.
    pub fn run_end(&self) -> Option<u64> {
        self.read_u64(RUN_END).checked_sub(1)
    }

    /// Returns `true` if there's a run that can still be extended.
    pub fn is_open(&self) -> bool {
        self.run_len() > 0
    }

    /// Extends the current run, or starts a new one, with `n` more
    /// repetitions. The last of them ends at `end` (i.e: `end` is the offset
    /// that follows the last repeated byte).
    pub fn extend(&mut self, n: u64, end: u64) {
        if n == 0 {
            return;
        }

        debug_assert!(
            !self.is_open() || self.run_end().map_or(false, |e| e + n == end)
        );

        let window = self.desc.window();

        match self.desc.kind {
            RepeatKind::Bitmap => {
                let mask =
                    if window >= 64 { u64::MAX } else { (1 << window) - 1 };
                let bits = self.read_u64(PAYLOAD);
                let bits = if n >= 64 {
                    u64::MAX
                } else {
                    (bits << n) | ((1 << n) - 1)
                };
                self.write_u64(PAYLOAD, bits & mask);
            }
            RepeatKind::Counter => {
                let count = self.read_u64(PAYLOAD).saturating_add(n);
                self.write_u64(PAYLOAD, count.min(window));
            }
            RepeatKind::Ring => {
                // Only the last `window` offsets are kept, the previous ones
                // would be overwritten anyways.
                let pushed = n.min(window);
                for off in end - pushed + 1..=end {
                    self.ring_push(off);
                }
            }
        }

        self.write_u64(RUN_END, end + 1);
    }

    /// Length of the current run. Runs longer than `max` are reported as
    /// `max + 1`.
    pub fn run_len(&self) -> u64 {
        match self.desc.kind {
            RepeatKind::Bitmap => {
                self.read_u64(PAYLOAD).trailing_ones() as u64
            }
            RepeatKind::Counter => self.read_u64(PAYLOAD),
            RepeatKind::Ring => self.ring_len() as u64,
        }
    }

    /// Returns `true` if the current run satisfies the bounds of the repeat.
    pub fn is_satisfied(&self) -> bool {
        let len = self.run_len();
        if !self.desc.accepts(len) {
            return false;
        }
        match self.desc.kind {
            // The offsets retained in the ring must be evenly spaced, one
            // step apart. Anything else means that the ring was not reset
            // when a run was broken.
            RepeatKind::Ring if len > 0 => {
                let (oldest, newest) = self.ring_span();
                newest - oldest == len - 1
            }
            _ => true,
        }
    }

    /// Closes the current run. If the run is not empty and satisfies the
    /// bounds of the repeat it becomes the pending match, with the given
    /// rank. The pending match is also returned. The repeat is left without
    /// a current run.
    pub fn close(&mut self, rank: u32) -> Option<RunMatch> {
        if !self.is_open() {
            return None;
        }

        let end = self.run_end()?;

        let result = if self.is_satisfied() {
            debug_assert!(self.pending().is_none());
            let len = self.run_len();
            self.write_u64(PENDING_END, end + 1);
            self.write_u64(PENDING_LEN, len);
            self.raw[PENDING_RANK..PENDING_RANK + 4]
                .copy_from_slice(rank.to_le_bytes().as_slice());
            Some(RunMatch { start: end - len, end, rank })
        } else {
            None
        };

        self.raw[PAYLOAD..].fill(0);

        result
    }

    /// Returns the pending match, if any.
    pub fn pending(&self) -> Option<RunMatch> {
        let end = self.read_u64(PENDING_END).checked_sub(1)?;
        let len = self.read_u64(PENDING_LEN);
        let rank = load::<u32>(self.raw, PENDING_RANK, 0, self.raw.len());
        Some(RunMatch { start: end - len, end, rank })
    }

    /// Returns and clears the pending match.
    pub fn take_pending(&mut self) -> Option<RunMatch> {
        let pending = self.pending();
        self.raw[PENDING_END..PAYLOAD].fill(0);
        pending
    }

    /// Returns `true` if the state is one that the repeat can reach after
    /// scanning `offset` bytes.
    ///
    /// An open run always reaches `offset`, because runs are extended up
    /// to the end of each chunk, and every other offset in the state is at
    /// most `offset`.
    pub fn is_consistent(&self, offset: u64) -> bool {
        let run_end = self.run_end();
        let run_len = self.run_len();

        if run_end.is_some_and(|end| end > offset) {
            return false;
        }
        if run_len > 0 && run_end != Some(offset) {
            return false;
        }
        if run_len > run_end.unwrap_or(0) {
            return false;
        }

        if let Some(end) = self.read_u64(PENDING_END).checked_sub(1) {
            if end > offset || self.read_u64(PENDING_LEN) > end {
                return false;
            }
        }

        let window = self.desc.window();

        match self.desc.kind {
            RepeatKind::Bitmap => {
                window >= 64 || self.read_u64(PAYLOAD) >> window == 0
            }
            RepeatKind::Counter => run_len <= window,
            RepeatKind::Ring => {
                if self.ring_head() as u64 >= window
                    || self.ring_len() as u64 > window
                {
                    return false;
                }
                if run_len == 0 {
                    return true;
                }
                // The run is contiguous, so the retained offsets are one
                // step apart and the newest one is the end of the run.
                let (oldest, newest) = self.ring_span();
                oldest <= newest
                    && newest - oldest == run_len - 1
                    && Some(newest) == run_end
            }
        }
    }

    fn ring_len(&self) -> u16 {
        u16::from_le_bytes([self.raw[PAYLOAD], self.raw[PAYLOAD + 1]])
    }

    fn ring_head(&self) -> u16 {
        u16::from_le_bytes([self.raw[PAYLOAD + 2], self.raw[PAYLOAD + 3]])
    }

    fn ring_slot(&self, i: u64) -> usize {
        PAYLOAD + RING_SLOTS + i as usize * size_of::<u64>()
    }

    fn ring_push(&mut self, offset: u64) {
        let window = self.desc.window();
        let head = self.ring_head() as u64;
        let len = self.ring_len() as u64;

        let slot = self.ring_slot(head);
        self.write_u64(slot, offset);

        let head = ((head + 1) % window) as u16;
        let len = (len + 1).min(window) as u16;

        self.raw[PAYLOAD..PAYLOAD + 2].copy_from_slice(&len.to_le_bytes());
        self.raw[PAYLOAD + 2..PAYLOAD + 4]
            .copy_from_slice(&head.to_le_bytes());
    }

    /// Returns the oldest and newest offsets in a non-empty ring.
    fn ring_span(&self) -> (u64, u64) {
        let window = self.desc.window();
        let head = self.ring_head() as u64;
        let len = self.ring_len() as u64;
        let newest =
            self.read_u64(self.ring_slot((head + window - 1) % window));
        let oldest =
            self.read_u64(self.ring_slot((head + window - len) % window));
        (oldest, newest)
    }

    #[inline]
    fn read_u64(&self, at: usize) -> u64 {
        load(self.raw, at, 0, self.raw.len())
    }

    #[inline]
    fn write_u64(&mut self, at: usize, value: u64) {
        self.raw[at..at + size_of::<u64>()]
            .copy_from_slice(&value.to_le_bytes());
    }
}

/// Returns the number of leading bytes in `haystack` that belong to `class`.
///
/// Classes with a single byte are checked eight bytes at a time.
pub(crate) fn run_length(haystack: &[u8], class: &ByteClass) -> usize {
    let len = haystack.len();

    let b = match class.single() {
        Some(b) => b,
        None => {
            return haystack
                .iter()
                .position(|b| !class.contains(*b))
                .unwrap_or(len)
        }
    };

    let pattern = u64::from_le_bytes([b; 8]);
    let mut i = 0;

    while i + 8 <= len {
        let diff = load::<u64>(haystack, i, 0, len) ^ pattern;
        if diff != 0 {
            return i + (diff.trailing_zeros() / 8) as usize;
        }
        i += 8;
    }

    if i < len {
        // The bytes past the end of the haystack are zero in the loaded
        // value, they can match the pattern if `b` is zero, so the result
        // is capped to the haystack length.
        let diff = load_cautious_fwd::<u64>(haystack, i, i, len) ^ pattern;
        let matching = if diff == 0 {
            8
        } else {
            (diff.trailing_zeros() / 8) as usize
        };
        return i + matching.min(len - i);
    }

    len
}
