use crate::confirm::instr::{Instr, InstrParser};
use crate::loadval::{load, load_cautious_fwd};

/// Outcome of running a confirmation automaton.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verdict {
    /// The candidate is a match that starts at the given offset.
    Confirmed { start: u64 },
    /// The candidate is not a match.
    Rejected,
    /// The automaton needs bytes that were not received yet. Never returned
    /// when the window reaches the end of the stream.
    NeedsMoreContext,
}

/// The bytes that an automaton can see.
pub(crate) struct Window<'w> {
    /// Bytes in the window.
    pub bytes: &'w [u8],
    /// Stream offset of the first byte in `bytes`.
    pub base: u64,
    /// `true` if no more bytes will follow the window.
    pub at_end: bool,
}

impl<'w> Window<'w> {
    /// Stream offset that follows the last byte in the window.
    #[inline]
    fn end(&self) -> i64 {
        (self.base + self.bytes.len() as u64) as i64
    }
}

/// Result of matching a sequence of bytes at some offset.
enum Step {
    Matched,
    Failed,
    Incomplete,
}

/// Runs the automaton in `code` for a literal that starts at stream offset
/// `literal_start`.
///
/// The code must have been validated by [`crate::confirm::Automaton::new`].
pub(crate) fn run(
    code: &[u8],
    literal_start: u64,
    window: &Window,
) -> Verdict {
    let mut cursor = literal_start as i64;
    let mut leftmost = cursor;

    for instr in InstrParser::new(code) {
        let instr = match instr {
            Ok(instr) => instr,
            Err(_) => return Verdict::Rejected,
        };

        let step = match instr {
            Instr::Match => {
                return Verdict::Confirmed { start: leftmost as u64 };
            }
            Instr::Literal(literal) => {
                let step = match_at(window, cursor, literal, None);
                (step, literal.len())
            }
            Instr::MaskedLiteral(literal, mask) => {
                let step = match_at(window, cursor, literal, Some(mask));
                (step, literal.len())
            }
            Instr::Class(class) => {
                let step = match byte_at(window, cursor) {
                    Ok(b) if class.contains(b) => Step::Matched,
                    Ok(_) => Step::Failed,
                    Err(step) => step,
                };
                (step, 1)
            }
            Instr::NotClass(class) => {
                let step = match byte_at(window, cursor) {
                    Ok(b) if !class.contains(b) => Step::Matched,
                    Ok(_) => Step::Failed,
                    Err(step) => step,
                };
                (step, 1)
            }
            Instr::Seek(delta) => {
                cursor += delta as i64;
                continue;
            }
            Instr::AssertStart => {
                let step =
                    if cursor == 0 { Step::Matched } else { Step::Failed };
                (step, 0)
            }
            Instr::AssertEnd => {
                let end = window.end();
                let step = if cursor < end {
                    Step::Failed
                } else if !window.at_end {
                    Step::Incomplete
                } else if cursor == end {
                    Step::Matched
                } else {
                    Step::Failed
                };
                (step, 0)
            }
            Instr::Alternation(alternatives) => {
                let mut result = (Step::Failed, 0);
                for alternative in alternatives {
                    let (literal, mask) = match alternative {
                        Ok(Instr::Literal(literal)) => (literal, None),
                        Ok(Instr::MaskedLiteral(literal, mask)) => {
                            (literal, Some(mask))
                        }
                        _ => return Verdict::Rejected,
                    };
                    match match_at(window, cursor, literal, mask) {
                        Step::Failed => continue,
                        step => {
                            result = (step, literal.len());
                            break;
                        }
                    }
                }
                result
            }
        };

        match step {
            (Step::Matched, len) => {
                if len > 0 {
                    leftmost = leftmost.min(cursor);
                }
                cursor += len as i64;
            }
            (Step::Failed, _) => return Verdict::Rejected,
            (Step::Incomplete, _) => return Verdict::NeedsMoreContext,
        }
    }

    Verdict::Rejected
}

/// Returns the byte at stream offset `pos`.
#[inline]
fn byte_at(window: &Window, pos: i64) -> Result<u8, Step> {
    if pos < window.base as i64 {
        return Err(Step::Failed);
    }
    if pos >= window.end() {
        return Err(if window.at_end {
            Step::Failed
        } else {
            Step::Incomplete
        });
    }
    Ok(window.bytes[(pos - window.base as i64) as usize])
}

/// Matches `literal` (optionally masked) at stream offset `pos`.
///
/// When only a prefix of the literal is inside the window, the prefix is
/// checked anyways, a mismatch in the prefix is definitive.
fn match_at(
    window: &Window,
    pos: i64,
    literal: &[u8],
    mask: Option<&[u8]>,
) -> Step {
    // Offsets before the window are either before the start of the stream
    // or were discarded long ago.
    if pos < window.base as i64 {
        return Step::Failed;
    }

    let at = (pos - window.base as i64) as usize;
    let avail = window.bytes.len().saturating_sub(at).min(literal.len());

    if !prefix_matches(
        window.bytes,
        at,
        &literal[..avail],
        mask.map(|mask| &mask[..avail]),
    ) {
        return Step::Failed;
    }

    if avail < literal.len() {
        if window.at_end {
            Step::Failed
        } else {
            Step::Incomplete
        }
    } else {
        Step::Matched
    }
}

/// Compares `hay[at..at + literal.len()]` with `literal`, eight bytes at a
/// time. The range must be within `hay`.
fn prefix_matches(
    hay: &[u8],
    at: usize,
    literal: &[u8],
    mask: Option<&[u8]>,
) -> bool {
    let n = literal.len();
    let mut i = 0;

    while i < n {
        let (h, l, m) = if i + 8 <= n {
            (
                load::<u64>(hay, at + i, at, at + n),
                load::<u64>(literal, i, 0, n),
                mask.map_or(u64::MAX, |mask| load::<u64>(mask, i, 0, n)),
            )
        } else {
            // Bytes past the end of the literal are zero in the three
            // values, and therefore never cause a mismatch.
            (
                load_cautious_fwd::<u64>(hay, at + i, at, at + n),
                load_cautious_fwd::<u64>(literal, i, 0, n),
                mask.map_or(u64::MAX, |mask| {
                    load_cautious_fwd::<u64>(mask, i, 0, n)
                }),
            )
        };
        if h & m != l {
            return false;
        }
        i += 8;
    }

    true
}
