use pretty_assertions::assert_eq;

use super::{
    run_length, Depth, RepeatDescriptor, RepeatKind, RepeatState, RunMatch,
};
use crate::class::ByteClass;
use crate::config::RepeatConfig;
use crate::program::{PatternId, RepeatId};

const BITMAP: RepeatConfig =
    RepeatConfig { bitmap_limit: 63, ring_limit: 255 };
const RING: RepeatConfig =
    RepeatConfig { bitmap_limit: 0, ring_limit: 1000 };
const COUNTER: RepeatConfig =
    RepeatConfig { bitmap_limit: 0, ring_limit: 0 };

fn descriptor(
    min: u32,
    max: Depth,
    config: &RepeatConfig,
) -> RepeatDescriptor {
    RepeatDescriptor {
        id: RepeatId::from(0_usize),
        pattern: PatternId::from(0_usize),
        class: ByteClass::byte(b'b'),
        min,
        max,
        kind: RepeatKind::select(max, config),
        ranks: vec![(b'b', 0)],
    }
}

/// Returns `true` if a run of exactly `n` repetitions is accepted.
fn accepts_run(desc: &RepeatDescriptor, n: u64) -> bool {
    let mut raw = vec![0; desc.state_size()];
    let mut state = RepeatState::new(desc, raw.as_mut_slice());
    state.init();
    // Extend one step at a time, as if each byte arrived in its own chunk.
    for end in 1..=n {
        state.extend(1, end);
    }
    let satisfied = state.is_satisfied();
    let closed = state.close(0);
    assert_eq!(closed.is_some(), satisfied && n > 0);
    satisfied
}

#[test]
fn kind_selection() {
    let config = RepeatConfig::default();

    let select = |max| RepeatKind::select(max, &config);

    assert_eq!(select(Depth::new(1)), RepeatKind::Bitmap);
    assert_eq!(select(Depth::new(63)), RepeatKind::Bitmap);
    assert_eq!(select(Depth::new(64)), RepeatKind::Ring);
    assert_eq!(select(Depth::new(255)), RepeatKind::Ring);
    assert_eq!(select(Depth::new(256)), RepeatKind::Counter);
    assert_eq!(select(Depth::INFINITY), RepeatKind::Counter);
}

#[test]
fn bounds() {
    for config in [&BITMAP, &RING, &COUNTER] {
        let desc = descriptor(3, Depth::new(5), config);

        assert!(!accepts_run(&desc, 2), "{:?}", desc.kind());
        assert!(accepts_run(&desc, 3), "{:?}", desc.kind());
        assert!(accepts_run(&desc, 4), "{:?}", desc.kind());
        assert!(accepts_run(&desc, 5), "{:?}", desc.kind());
        assert!(!accepts_run(&desc, 6), "{:?}", desc.kind());
        assert!(!accepts_run(&desc, 100), "{:?}", desc.kind());
    }
}

#[test]
fn bitmap_at_limit() {
    let desc = descriptor(60, Depth::new(63), &BITMAP);
    assert_eq!(desc.kind(), RepeatKind::Bitmap);

    assert!(!accepts_run(&desc, 59));
    assert!(accepts_run(&desc, 60));
    assert!(accepts_run(&desc, 63));
    assert!(!accepts_run(&desc, 64));
    assert!(!accepts_run(&desc, 200));
}

#[test]
fn infinite_max() {
    let desc = descriptor(4, Depth::INFINITY, &BITMAP);
    assert_eq!(desc.kind(), RepeatKind::Counter);

    assert!(!accepts_run(&desc, 3));
    assert!(accepts_run(&desc, 4));
    assert!(accepts_run(&desc, 5));
    assert!(accepts_run(&desc, 1000));

    // Long runs extended in bulk keep their exact length.
    let mut raw = vec![0; desc.state_size()];
    let mut state = RepeatState::new(&desc, raw.as_mut_slice());
    state.extend(1 << 40, (1 << 40) + 7);
    assert_eq!(state.run_len(), 1 << 40);
    assert_eq!(
        state.close(0),
        Some(RunMatch { start: 7, end: (1 << 40) + 7, rank: 0 })
    );
}

#[test]
fn exact_count() {
    for config in [&BITMAP, &RING, &COUNTER] {
        let desc = descriptor(4, Depth::new(4), config);

        assert!(!accepts_run(&desc, 3));
        assert!(accepts_run(&desc, 4));
        assert!(!accepts_run(&desc, 5));
    }
}

#[test]
fn zero_min() {
    for config in [&BITMAP, &RING, &COUNTER] {
        let desc = descriptor(0, Depth::new(2), config);

        // An empty run satisfies the bounds, but is never reported.
        assert!(accepts_run(&desc, 0));
        assert!(accepts_run(&desc, 1));
        assert!(accepts_run(&desc, 2));
        assert!(!accepts_run(&desc, 3));
    }
}

#[test]
fn representations_agree() {
    let bounds = [
        (1, 1),
        (1, 2),
        (2, 7),
        (5, 5),
        (10, 40),
        (0, 63),
        (50, 63),
    ];

    for (min, max) in bounds {
        let bitmap = descriptor(min, Depth::new(max), &BITMAP);
        let ring = descriptor(min, Depth::new(max), &RING);
        let counter = descriptor(min, Depth::new(max), &COUNTER);

        assert_eq!(bitmap.kind(), RepeatKind::Bitmap);
        assert_eq!(ring.kind(), RepeatKind::Ring);
        assert_eq!(counter.kind(), RepeatKind::Counter);

        for n in 0..=max as u64 + 3 {
            let expected = n >= min as u64 && n <= max as u64;
            assert_eq!(accepts_run(&bitmap, n), expected, "{min} {max} {n}");
            assert_eq!(accepts_run(&ring, n), expected, "{min} {max} {n}");
            assert_eq!(accepts_run(&counter, n), expected, "{min} {max} {n}");
        }
    }
}

#[test]
fn bulk_extension() {
    for config in [&BITMAP, &RING, &COUNTER] {
        let desc = descriptor(3, Depth::new(20), config);

        let mut raw = vec![0; desc.state_size()];
        let mut state = RepeatState::new(&desc, raw.as_mut_slice());

        state.extend(5, 105);
        state.extend(7, 112);
        state.extend(0, 112);

        assert_eq!(state.run_len(), 12);
        assert_eq!(state.run_end(), Some(112));
        assert!(state.is_open());
        let run = RunMatch { start: 100, end: 112, rank: 0 };

        assert_eq!(state.close(0), Some(run));
        assert!(!state.is_open());

        // The end of the run is remembered after closing it.
        assert_eq!(state.run_end(), Some(112));
        assert_eq!(state.pending(), Some(run));
        assert_eq!(state.take_pending(), Some(run));
        assert_eq!(state.pending(), None);

        // A run that is too long in a single step.
        state.extend(100, 300);
        assert!(!state.is_satisfied());
        assert_eq!(state.close(0), None);
        assert_eq!(state.pending(), None);
    }
}

#[test]
fn state_is_plain_bytes() {
    let desc = descriptor(2, Depth::new(100), &RepeatConfig::default());
    assert_eq!(desc.kind(), RepeatKind::Ring);

    let mut raw = vec![0; desc.state_size()];
    RepeatState::new(&desc, raw.as_mut_slice()).extend(3, 53);

    // A copy of the bytes behaves exactly like the original.
    let mut copy = raw.clone();
    let mut original = RepeatState::new(&desc, raw.as_mut_slice());
    let mut copied = RepeatState::new(&desc, copy.as_mut_slice());

    original.extend(1, 54);
    copied.extend(1, 54);

    let run = RunMatch { start: 50, end: 54, rank: 0 };

    assert_eq!(original.close(0), Some(run));
    assert_eq!(copied.close(0), Some(run));
    assert_eq!(raw, copy);
}

#[test]
fn run_lengths() {
    let b = ByteClass::byte(b'b');

    assert_eq!(run_length(b"", &b), 0);
    assert_eq!(run_length(b"x", &b), 0);
    assert_eq!(run_length(b"bbbx", &b), 3);
    assert_eq!(run_length(b"bbbbbbbb", &b), 8);
    assert_eq!(run_length(b"bbbbbbbbbbbbx", &b), 12);
    assert_eq!(run_length(b"bbbbbbbbbbbbbbbbbbbbb", &b), 21);

    // Bytes beyond the end of the haystack are loaded as zeroes, they must
    // not be counted when the class is the zero byte.
    let zero = ByteClass::byte(0);
    assert_eq!(run_length(&[0; 3], &zero), 3);
    assert_eq!(run_length(&[0; 11], &zero), 11);
    assert_eq!(run_length(&[0, 0, 1, 0], &zero), 2);

    let digits = ByteClass::range(b'0'..=b'9');
    assert_eq!(run_length(b"0123456789abc", &digits), 10);
    assert_eq!(run_length(b"42", &digits), 2);
}
