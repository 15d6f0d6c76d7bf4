/*! Confirmation automata.

Some literals are not enough by themselves for declaring a match. A literal
may require certain bytes before or after it, or the pattern may only match
at the start or the end of the stream. In such cases the literal carries a
small automaton that is executed every time the literal is found, and that
confirms or rejects the candidate.

Automata are straight-line programs for a tiny virtual machine. The machine
has a cursor that starts at the first byte of the literal. Most instructions
match bytes at the cursor and advance it, [`Instr::Seek`] moves the cursor
without matching, and [`Instr::Match`] confirms the candidate. Alternations
are resolved by trying the alternatives in order and taking the first one
that matches, there's no backtracking.

Because automata are straight-line, the range of offsets that an automaton
can read around the literal (its reach) is known when the program is built.
This determines how many bytes must be retained between the chunks of a
stream.
*/

use crate::confirm::instr::{Instr, InstrParser};

pub use instr::{Alternative, AutomatonBuilder};
pub(crate) use vm::{run, Verdict, Window};

pub(crate) mod instr;
mod vm;

#[cfg(test)]
mod tests;

/// Largest distance that an automaton can read before the start, or after
/// the end of its literal.
pub const MAX_REACH: i64 = u16::MAX as i64 / 4;

/// Range of offsets read by an automaton, relative to the start of the
/// literal that triggers it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Reach {
    /// Leftmost offset read, zero or negative.
    pub min: i64,
    /// Offset that follows the rightmost offset read, zero or positive.
    pub max: i64,
}

impl Reach {
    /// Number of bytes that the automaton needs before the start of a
    /// literal.
    pub fn lookbehind(&self) -> usize {
        (-self.min).max(0) as usize
    }

    /// Number of bytes that the automaton needs after the end of a literal
    /// with the given length.
    pub fn lookahead(&self, literal_len: usize) -> usize {
        (self.max - literal_len as i64).max(0) as usize
    }
}

/// A validated confirmation automaton.
#[derive(Clone, Debug)]
pub(crate) struct Automaton {
    code: Vec<u8>,
    reach: Reach,
}

impl Automaton {
    /// Validates the code and computes its reach.
    pub fn new(code: Vec<u8>) -> Result<Self, String> {
        let reach = analyze(code.as_slice())?;
        Ok(Self { code, reach })
    }

    #[inline]
    pub fn code(&self) -> &[u8] {
        self.code.as_slice()
    }

    #[inline]
    pub fn reach(&self) -> Reach {
        self.reach
    }
}

/// Checks that `code` is a well-formed straight-line program that ends with
/// [`Instr::Match`], and returns its reach.
fn analyze(code: &[u8]) -> Result<Reach, String> {
    // Interval with the possible positions of the cursor. It's a single
    // position except after alternatives of different lengths.
    let mut lo: i64 = 0;
    let mut hi: i64 = 0;
    let mut reach = Reach::default();
    let mut parser = InstrParser::new(code);

    let read = |lo: i64, hi: i64, len: i64, reach: &mut Reach| {
        reach.min = reach.min.min(lo);
        reach.max = reach.max.max(hi + len);
    };

    while let Some(instr) = parser.next() {
        let instr = instr.map_err(|err| format!("{:?}", err))?;
        match instr {
            Instr::Match => {
                if !parser.remaining().is_empty() {
                    return Err("code after MATCH".to_string());
                }
                return if reach.min < -MAX_REACH || reach.max > MAX_REACH {
                    Err(format!(
                        "reach [{}, {}) exceeds the limit of {} bytes",
                        reach.min, reach.max, MAX_REACH
                    ))
                } else {
                    Ok(reach)
                };
            }
            Instr::Literal(literal) | Instr::MaskedLiteral(literal, _) => {
                let len = literal.len() as i64;
                read(lo, hi, len, &mut reach);
                lo += len;
                hi += len;
            }
            Instr::Class(_) | Instr::NotClass(_) => {
                read(lo, hi, 1, &mut reach);
                lo += 1;
                hi += 1;
            }
            Instr::Seek(delta) => {
                lo += delta as i64;
                hi += delta as i64;
            }
            Instr::AssertStart => {}
            Instr::AssertEnd => {
                // Deciding whether the cursor is at the end requires knowing
                // if there's a byte at the cursor.
                read(lo, hi, 1, &mut reach);
            }
            Instr::Alternation(alternatives) => {
                let mut min_len = i64::MAX;
                let mut max_len = 0;
                for alternative in alternatives {
                    let alternative =
                        alternative.map_err(|err| format!("{:?}", err))?;
                    let len = match alternative {
                        Instr::Literal(literal)
                        | Instr::MaskedLiteral(literal, _) => literal.len(),
                        other => {
                            return Err(format!(
                                "{:?} not allowed in alternation",
                                other
                            ))
                        }
                    } as i64;
                    min_len = min_len.min(len);
                    max_len = max_len.max(len);
                }
                if min_len == i64::MAX {
                    return Err("empty alternation".to_string());
                }
                read(lo, hi, max_len, &mut reach);
                lo += min_len;
                hi += max_len;
            }
        }
        if lo < -MAX_REACH || hi > MAX_REACH {
            return Err("cursor out of range".to_string());
        }
    }

    Err("missing MATCH at the end of the code".to_string())
}
