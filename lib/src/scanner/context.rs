#[cfg(feature = "logging")]
use std::time::Instant;

#[cfg(feature = "logging")]
use log::*;

use crate::class::ByteClass;
use crate::confirm::{run, Verdict, Window};
use crate::errors::Error;
use crate::literals::{Candidate, Key};
use crate::program::{
    AutomatonId, LiteralFlags, LiteralInfo, LiteralTarget, PatternFlags,
    PatternId, Program, RepeatId,
};
use crate::repeat::run_length;
use crate::scanner::{Action, MatchEvent, ScanStatus};
use crate::scratch::Buffers;
use crate::state::StateView;

/// Key larger than the key of any match.
const MAX_KEY: Key = (u64::MAX, u32::MAX);

/// Scans a chunk of data, updating the stream state in `state`.
///
/// `state` must have the size of the program's stream state, and `buffers`
/// must be large enough for the program. `final_chunk` indicates that no
/// more data will follow this chunk.
pub(crate) fn scan<F>(
    program: &Program,
    state: &mut [u8],
    buffers: &mut Buffers,
    data: &[u8],
    final_chunk: bool,
    callback: F,
) -> Result<ScanStatus, Error>
where
    F: FnMut(&MatchEvent) -> Action,
{
    let mut state = StateView::new(&program.layout, state);

    state.validate(program.checksum, &program.repeats)?;

    if state.is_terminated() {
        return Ok(ScanStatus::Terminated);
    }

    #[cfg(feature = "logging")]
    let scan_start = Instant::now();

    let Buffers { seam, window, ties } = buffers;

    // The seam is the history followed by the first bytes of the chunk,
    // enough for finding every literal that starts in the history.
    let history_len = state.history().len();
    let prefix_len =
        data.len().min(program.max_literal_len.saturating_sub(1));
    let seam_len = history_len + prefix_len;

    seam[..history_len].copy_from_slice(state.history());
    seam[history_len..seam_len].copy_from_slice(&data[..prefix_len]);

    let seam = &seam[..seam_len];
    let resume = state.resume();
    let chunk_start = state.offset();

    let pending = program
        .repeats
        .iter()
        .filter(|desc| state.repeat(desc).pending().is_some())
        .count();

    let mut ctx = ScanContext {
        program,
        state,
        input: Input { history: &seam[..history_len], data, chunk_start },
        window: &mut window[..],
        final_chunk,
        pending,
        status: ContextStatus::Scanning,
        callback,
    };

    let flow = ctx.search(seam, resume, ties);

    #[cfg(feature = "logging")]
    debug!(
        "Scanned {} bytes at offset {} in {:?}",
        data.len(),
        chunk_start,
        Instant::elapsed(&scan_start)
    );

    if flow == Flow::Stop {
        ctx.status = ContextStatus::Terminated;
        ctx.state.set_terminated();
        return Ok(ScanStatus::Terminated);
    }

    let chunk_end = ctx.input.chunk_end();

    ctx.state.set_history(ctx.input.history, data);
    ctx.state.set_offset(chunk_end);
    ctx.status = ContextStatus::Idle;

    Ok(ScanStatus::Completed)
}

/// What the scan does after processing a candidate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    /// The candidate needs bytes from the next chunk. The candidate and all
    /// the following ones are processed again in the next call.
    Defer,
    /// The callback asked to stop.
    Stop,
}

/// States of the scan context.
///
/// A context starts `Idle`, is `Scanning` while it processes the chunk, and
/// goes back to `Idle` when the whole chunk was processed. While the
/// callback runs it is `SuspendedForCallback`, and it becomes `Terminated`
/// if the callback asks to stop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ContextStatus {
    Idle,
    Scanning,
    SuspendedForCallback,
    Terminated,
}

/// The bytes visible while scanning a chunk: the history retained from the
/// previous chunks, and the chunk itself.
struct Input<'d> {
    history: &'d [u8],
    data: &'d [u8],
    /// Stream offset of the first byte in `data`.
    chunk_start: u64,
}

impl Input<'_> {
    /// Stream offset of the first byte in the history.
    #[inline]
    fn floor(&self) -> u64 {
        self.chunk_start - self.history.len() as u64
    }

    /// Stream offset that follows the last byte in the chunk.
    #[inline]
    fn chunk_end(&self) -> u64 {
        self.chunk_start + self.data.len() as u64
    }

    /// Returns the byte at the given stream offset, which must be within
    /// `[floor, chunk_end)`.
    fn byte_at(&self, offset: u64) -> u8 {
        if offset >= self.chunk_start {
            self.data[(offset - self.chunk_start) as usize]
        } else {
            self.history[(offset - self.floor()) as usize]
        }
    }

    /// Fills `dst` with the bytes that start at the given stream offset.
    fn copy_to(&self, offset: u64, dst: &mut [u8]) {
        let mut offset = offset;
        let mut dst = dst;

        if offset < self.chunk_start {
            let i = (offset - self.floor()) as usize;
            let n = dst.len().min(self.history.len() - i);
            let (head, tail) = dst.split_at_mut(n);
            head.copy_from_slice(&self.history[i..i + n]);
            offset += n as u64;
            dst = tail;
        }

        if !dst.is_empty() {
            let i = (offset - self.chunk_start) as usize;
            dst.copy_from_slice(&self.data[i..i + dst.len()]);
        }
    }

    /// Number of consecutive bytes in `class` that start at the given
    /// stream offset.
    fn run_length(&self, offset: u64, class: &ByteClass) -> u64 {
        let mut n = 0;
        let mut offset = offset;

        if offset < self.chunk_start {
            let i = (offset - self.floor()) as usize;
            let in_history = run_length(&self.history[i..], class);
            if in_history < self.history.len() - i {
                return in_history as u64;
            }
            n = in_history as u64;
            offset = self.chunk_start;
        }

        let i = (offset - self.chunk_start) as usize;
        n + run_length(&self.data[i..], class) as u64
    }
}

/// Structure that holds information about the current scan.
struct ScanContext<'c, F> {
    program: &'c Program,
    state: StateView<'c>,
    input: Input<'c>,
    /// Buffer where the bytes seen by confirmation automata are copied.
    window: &'c mut [u8],
    final_chunk: bool,
    /// Number of repeats with a pending match.
    pending: usize,
    status: ContextStatus,
    callback: F,
}

impl<'c, F> ScanContext<'c, F>
where
    F: FnMut(&MatchEvent) -> Action,
{
    /// Processes every candidate in the chunk, and the matches of the
    /// bounded repeats.
    fn search(
        &mut self,
        seam: &[u8],
        resume: Key,
        ties: &mut Vec<Candidate>,
    ) -> Flow {
        let program = self.program;

        self.extend_open_runs();

        let mut deferred = None;

        #[cfg(feature = "logging")]
        let mut candidates = 0_usize;

        for candidate in program.table.candidates(
            seam,
            self.input.history.len(),
            self.input.data,
            self.input.chunk_start,
            resume,
            ties,
        ) {
            #[cfg(feature = "logging")]
            {
                candidates += 1;
            }

            // Repeat matches that go before the candidate must be reported
            // first.
            if self.flush(candidate.key()) == Flow::Stop {
                return Flow::Stop;
            }

            let flow = if self.waits_for_open_run(candidate.key()) {
                Flow::Defer
            } else {
                self.process(&candidate)
            };

            match flow {
                Flow::Continue => {}
                Flow::Defer => {
                    #[cfg(feature = "logging")]
                    debug!(
                        "Candidate for literal {:?} ending at {} deferred",
                        candidate.literal, candidate.end
                    );
                    deferred = Some(candidate.key());
                    break;
                }
                Flow::Stop => return Flow::Stop,
            }
        }

        #[cfg(feature = "logging")]
        debug!("Candidates processed: {}", candidates);

        // Runs that reach the end of the data were closed as soon as they
        // were found, so every pending match is known at this point.
        if self.final_chunk {
            debug_assert!(deferred.is_none());
            return self.flush(MAX_KEY);
        }

        // Matches up to the end of the chunk can be reported now, unless
        // some candidate was deferred. In that case only the matches that
        // go before the deferred candidate are reported, the rest wait.
        let limit = deferred.unwrap_or((self.input.chunk_end() + 1, 0));

        self.state.set_resume(limit);
        self.flush(limit)
    }

    /// Returns `true` if a candidate must wait until the next chunk because
    /// some run that reaches the end of the chunk could produce a match
    /// that goes before the candidate.
    ///
    /// Such a match would end at the end of the chunk, so this only affects
    /// candidates that end there too.
    fn waits_for_open_run(&mut self, key: Key) -> bool {
        let program = self.program;
        let chunk_end = self.input.chunk_end();

        if self.final_chunk || key.0 != chunk_end || chunk_end == 0 {
            return false;
        }

        let last = self.input.byte_at(chunk_end - 1);

        program.repeats.iter().any(|desc| {
            self.state.repeat(desc).is_open()
                && (chunk_end, desc.rank_of(last)) < key
        })
    }

    fn process(&mut self, candidate: &Candidate) -> Flow {
        let program = self.program;
        let literal = program.literal(candidate.literal);

        match literal.target {
            LiteralTarget::Pattern(pattern) => {
                self.process_literal(literal, pattern, candidate.end)
            }
            LiteralTarget::Repeat(id) => {
                self.trigger_repeat(id, candidate.end);
                Flow::Continue
            }
        }
    }

    fn process_literal(
        &mut self,
        literal: &LiteralInfo,
        pattern: PatternId,
        end: u64,
    ) -> Flow {
        let mut start = end - literal.bytes.len() as u64;

        if literal.flags.contains(LiteralFlags::Anchored) && start != 0 {
            return Flow::Continue;
        }

        let entry = self.state.pattern(usize::from(pattern));

        // Skip the confirmation when the match would be discarded anyways.
        if entry.exhausted || entry.last_end == Some(end) {
            return Flow::Continue;
        }

        if let Some(automaton) = literal.automaton {
            match self.confirm(automaton, start) {
                Verdict::Confirmed { start: confirmed } => start = confirmed,
                Verdict::Rejected => return Flow::Continue,
                Verdict::NeedsMoreContext => return Flow::Defer,
            }
        }

        self.report(pattern, start, end)
    }

    /// Runs a confirmation automaton for a literal that starts at the given
    /// stream offset.
    fn confirm(&mut self, id: AutomatonId, literal_start: u64) -> Verdict {
        let automaton = self.program.automaton(id);
        let reach = automaton.reach();
        let chunk_end = self.input.chunk_end();

        let lo = (literal_start as i64 + reach.min)
            .max(self.input.floor() as i64) as u64;

        let hi = (literal_start as i64 + reach.max)
            .max(lo as i64)
            .min(chunk_end as i64) as u64;

        let bytes = &mut self.window[..(hi - lo) as usize];

        self.input.copy_to(lo, bytes);

        let window = Window {
            bytes,
            base: lo,
            at_end: self.final_chunk && hi == chunk_end,
        };

        run(automaton.code(), literal_start, &window)
    }

    /// Handles a byte that can start a new run of a bounded repeat. The
    /// byte ends at `end`.
    fn trigger_repeat(&mut self, id: RepeatId, end: u64) {
        let desc = self.program.repeat(id);
        let mut repeat = self.state.repeat(desc);

        // The byte is part of a run that was already processed.
        if repeat.run_end().is_some_and(|run_end| end <= run_end) {
            return;
        }

        let from = end - 1;
        let n = self.input.run_length(from, &desc.class);

        repeat.extend(n, from + n);

        // The run is extended as much as possible, if it doesn't reach the
        // end of the chunk there's a byte that breaks it. At the end of the
        // data the run can't continue either.
        if from + n < self.input.chunk_end() || self.final_chunk {
            let last = self.input.byte_at(from + n - 1);
            if repeat.close(desc.rank_of(last)).is_some() {
                self.pending += 1;
            }
        }
    }

    /// Extends the runs that were open at the end of the previous chunk
    /// with the bytes at the start of this one. Runs that reach the end of
    /// the data are closed.
    fn extend_open_runs(&mut self) {
        let program = self.program;
        let chunk_start = self.input.chunk_start;

        for desc in &program.repeats {
            let mut repeat = self.state.repeat(desc);

            if !repeat.is_open() {
                continue;
            }

            let n = run_length(self.input.data, &desc.class);

            repeat.extend(n as u64, chunk_start + n as u64);

            if n < self.input.data.len() || self.final_chunk {
                let last = self.input.byte_at(chunk_start + n as u64 - 1);
                if repeat.close(desc.rank_of(last)).is_some() {
                    self.pending += 1;
                }
            }
        }
    }

    /// Reports the pending repeat matches with a key lower than `limit`,
    /// in key order.
    fn flush(&mut self, limit: Key) -> Flow {
        let program = self.program;

        while self.pending > 0 {
            let mut next = None;

            for desc in &program.repeats {
                if let Some(m) = self.state.repeat(desc).pending() {
                    let better = match next {
                        Some((best, _)) => m.key() < best,
                        None => m.key() < limit,
                    };
                    if better {
                        next = Some((m.key(), desc));
                    }
                }
            }

            let Some((_, desc)) = next else {
                break;
            };

            let m = self.state.repeat(desc).take_pending();

            self.pending -= 1;

            if let Some(m) = m {
                if self.report(desc.pattern, m.start, m.end) == Flow::Stop {
                    return Flow::Stop;
                }
            }
        }

        Flow::Continue
    }

    /// Reports a match for `pattern` to the callback, unless the pattern
    /// can't be reported anymore or was already reported at the same end
    /// offset.
    fn report(&mut self, pattern: PatternId, start: u64, end: u64) -> Flow {
        debug_assert_eq!(self.status, ContextStatus::Scanning);

        let program = self.program;
        let flags = &program.pattern(pattern).flags;
        let index = usize::from(pattern);

        let mut entry = self.state.pattern(index);

        if entry.exhausted || entry.last_end == Some(end) {
            return Flow::Continue;
        }

        entry.last_end = Some(end);
        entry.exhausted = flags.contains(PatternFlags::SingleMatch);

        self.state.set_pattern(index, entry);

        let event = MatchEvent {
            pattern,
            start: (!flags.contains(PatternFlags::NoStart)).then_some(start),
            end,
        };

        self.status = ContextStatus::SuspendedForCallback;

        match (self.callback)(&event) {
            Action::Continue => {
                self.status = ContextStatus::Scanning;
                Flow::Continue
            }
            Action::Stop => {
                self.status = ContextStatus::Terminated;
                Flow::Stop
            }
        }
    }
}
