/*! Literal scanner.

Every pattern is reduced to one or more literals, and finding them is the
first step of every scan. All the literals in a program are searched for
at once, and every occurrence of a literal becomes a [`Candidate`] that is
later processed by the scanner.

Candidates are produced in the order of their keys: first by the offset
where the literal ends, and then by the rank of the literal. Ranks are
fixed when the program is built, longer literals have better (lower) ranks
than shorter ones, and literals with the same length are ranked in the
order they were added to the program.

In streaming mode a literal can start in one chunk and end in another. The
scanner retains the last bytes of each chunk (the history), and
[`LiteralTable::candidates`] receives a seam buffer formed by the history
followed by the first bytes of the new chunk. Occurrences that start in the
history are found in the seam buffer, the rest are found in the new chunk,
and both sequences are merged.
*/

use std::cmp::Reverse;
use std::iter::Peekable;

use aho_corasick::{AhoCorasick, FindOverlappingIter, MatchKind};
use bstr::ByteSlice;
use itertools::Itertools;
use memchr::memmem;
use rustc_hash::FxHashMap;

use crate::errors::BuildError;
use crate::program::LiteralId;

#[cfg(test)]
mod tests;

/// The key that determines the order in which candidates and matches are
/// processed: end offset, and then rank.
pub(crate) type Key = (u64, u32);

/// An occurrence of a literal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Candidate {
    /// Stream offset where the literal ends (exclusive).
    pub end: u64,
    /// The literal.
    pub literal: LiteralId,
    /// Rank of the literal.
    pub rank: u32,
}

impl Candidate {
    #[inline]
    pub fn key(&self) -> Key {
        (self.end, self.rank)
    }
}

/// All the literals in a program, and the automaton that finds them.
#[derive(Debug)]
pub(crate) struct LiteralTable {
    matcher: LiteralMatcher,
    /// Literals that share the same bytes are searched for once. For each
    /// distinct byte string, the literals that have those bytes.
    groups: Vec<Vec<LiteralId>>,
    /// Rank of each literal, indexed by [`LiteralId`].
    ranks: Vec<u32>,
    /// Length of each literal, indexed by [`LiteralId`].
    lengths: Vec<usize>,
}

impl LiteralTable {
    /// Creates the table for the given literals. The literal with index `i`
    /// in the slice gets `LiteralId` `i`.
    pub fn new<L: AsRef<[u8]>>(literals: &[L]) -> Result<Self, BuildError> {
        let mut distinct: Vec<&[u8]> = Vec::new();
        let mut groups: Vec<Vec<LiteralId>> = Vec::new();
        let mut index: FxHashMap<&[u8], usize> = FxHashMap::default();

        for (id, literal) in literals.iter().enumerate() {
            let literal = literal.as_ref();
            let group = *index.entry(literal).or_insert_with(|| {
                distinct.push(literal);
                groups.push(Vec::new());
                distinct.len() - 1
            });
            groups[group].push(id.into());
        }

        let mut order: Vec<usize> = (0..literals.len()).collect();
        order.sort_by_key(|id| (Reverse(literals[*id].as_ref().len()), *id));

        let mut ranks = vec![0; literals.len()];
        for (rank, id) in order.into_iter().enumerate() {
            ranks[id] = rank as u32;
        }

        let lengths =
            literals.iter().map(|literal| literal.as_ref().len()).collect();

        Ok(Self {
            matcher: LiteralMatcher::new(distinct.as_slice())?,
            groups,
            ranks,
            lengths,
        })
    }

    /// Number of literals in the table.
    #[inline]
    pub fn len(&self) -> usize {
        self.ranks.len()
    }

    /// Rank of a literal.
    #[inline]
    pub fn rank(&self, literal: LiteralId) -> u32 {
        self.ranks[usize::from(literal)]
    }

    /// Length of a literal.
    #[inline]
    pub fn literal_len(&self, literal: LiteralId) -> usize {
        self.lengths[usize::from(literal)]
    }

    /// Returns the candidates found in a chunk.
    ///
    /// `seam` contains the last `history_len` bytes that preceded the chunk,
    /// followed by the first bytes of the chunk. `data` is the chunk itself,
    /// which starts at stream offset `chunk_start`. Candidates with a key
    /// lower than `resume` are not returned, they were processed while
    /// scanning some previous chunk.
    ///
    /// `ties` is used for sorting candidates that end at the same offset,
    /// its capacity must be at least [`LiteralTable::len`].
    pub fn candidates<'a>(
        &'a self,
        seam: &'a [u8],
        history_len: usize,
        data: &'a [u8],
        chunk_start: u64,
        resume: Key,
        ties: &'a mut Vec<Candidate>,
    ) -> Candidates<'a, impl Iterator<Item = Hit> + 'a> {
        debug_assert!(ties.capacity() >= self.len());

        let seam_base = chunk_start - history_len as u64;

        // Occurrences in the seam that start in the new chunk are ignored,
        // they are also found while scanning the chunk.
        let seam_hits = self
            .matcher
            .occurrences(seam)
            .filter(move |(_, start, _)| *start < history_len)
            .map(move |(group, _, end)| Hit {
                group,
                end: seam_base + end as u64,
            });

        let data_hits = self
            .matcher
            .occurrences(data)
            .map(move |(group, _, end)| Hit {
                group,
                end: chunk_start + end as u64,
            });

        ties.clear();

        Candidates {
            hits: seam_hits
                .merge_by(data_hits, |a, b| a.end <= b.end)
                .peekable(),
            table: self,
            ties,
            next_tie: 0,
            resume,
        }
    }
}

/// An occurrence of some distinct literal string.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Hit {
    group: usize,
    end: u64,
}

/// Iterator returned by [`LiteralTable::candidates`].
pub(crate) struct Candidates<'a, I: Iterator<Item = Hit>> {
    hits: Peekable<I>,
    table: &'a LiteralTable,
    ties: &'a mut Vec<Candidate>,
    next_tie: usize,
    resume: Key,
}

impl<'a, I: Iterator<Item = Hit>> Candidates<'a, I> {
    fn push(&mut self, hit: Hit) {
        for literal in &self.table.groups[hit.group] {
            self.ties.push(Candidate {
                end: hit.end,
                literal: *literal,
                rank: self.table.rank(*literal),
            });
        }
    }
}

impl<'a, I: Iterator<Item = Hit>> Iterator for Candidates<'a, I> {
    type Item = Candidate;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(candidate) = self.ties.get(self.next_tie).copied() {
                self.next_tie += 1;
                if candidate.key() >= self.resume {
                    return Some(candidate);
                }
                continue;
            }

            self.ties.clear();
            self.next_tie = 0;

            let first = self.hits.next()?;
            let end = first.end;

            // Whole groups of candidates that were already processed are
            // skipped without sorting them.
            if end < self.resume.0 {
                while self.hits.next_if(|hit| hit.end == end).is_some() {}
                continue;
            }

            self.push(first);

            while let Some(hit) = self.hits.next_if(|hit| hit.end == end) {
                self.push(hit);
            }

            if self.ties.len() > 1 {
                self.ties.sort_unstable_by_key(|candidate| candidate.rank);
            }
        }
    }
}

/// Finds all the occurrences of a set of distinct byte strings.
enum LiteralMatcher {
    /// There are no literals.
    Empty,
    /// A single literal, searched for with `memmem`.
    Single(memmem::Finder<'static>),
    /// Two or more literals, searched for with Aho-Corasick.
    Multi(AhoCorasick),
}

impl std::fmt::Debug for LiteralMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LiteralMatcher::Empty => write!(f, "Empty"),
            LiteralMatcher::Single(finder) => {
                write!(f, "Single({:?})", finder.needle().as_bstr())
            }
            LiteralMatcher::Multi(ac) => {
                write!(f, "Multi({} literals)", ac.patterns_len())
            }
        }
    }
}

impl LiteralMatcher {
    fn new(literals: &[&[u8]]) -> Result<Self, BuildError> {
        match literals {
            [] => Ok(LiteralMatcher::Empty),
            [literal] => Ok(LiteralMatcher::Single(
                memmem::Finder::new(literal).into_owned(),
            )),
            literals => AhoCorasick::builder()
                .match_kind(MatchKind::Standard)
                .build(literals)
                .map(LiteralMatcher::Multi)
                .map_err(|_| BuildError::TooLarge("literal automaton")),
        }
    }

    /// Returns every occurrence of every literal in `haystack`, including
    /// overlapping ones, as `(literal, start, end)` tuples sorted by `end`.
    fn occurrences<'a>(&'a self, haystack: &'a [u8]) -> Occurrences<'a> {
        match self {
            LiteralMatcher::Empty => Occurrences::Empty,
            LiteralMatcher::Single(finder) => {
                Occurrences::Single { finder, haystack, pos: 0 }
            }
            LiteralMatcher::Multi(ac) => {
                Occurrences::Multi(ac.find_overlapping_iter(haystack))
            }
        }
    }
}

enum Occurrences<'a> {
    Empty,
    Single {
        finder: &'a memmem::Finder<'static>,
        haystack: &'a [u8],
        pos: usize,
    },
    Multi(FindOverlappingIter<'a, 'a>),
}

impl<'a> Iterator for Occurrences<'a> {
    type Item = (usize, usize, usize);

    fn next(&mut self) -> Option<Self::Item> {
        match self {
            Occurrences::Empty => None,
            Occurrences::Single { finder, haystack, pos } => {
                let start = *pos + finder.find(haystack.get(*pos..)?)?;
                // Occurrences of the literal may overlap, the search
                // continues one byte after the start of the previous one.
                *pos = start + 1;
                Some((0, start, start + finder.needle().len()))
            }
            Occurrences::Multi(iter) => iter
                .next()
                .map(|m| (m.pattern().as_usize(), m.start(), m.end())),
        }
    }
}
