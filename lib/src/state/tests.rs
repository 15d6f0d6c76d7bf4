use pretty_assertions::assert_eq;

use super::{PatternEntry, StateLayout, StateView, HEADER_SIZE};
use crate::errors::Incompatible;

#[test]
fn layout() {
    let layout = StateLayout::new(10, 3, &[]);

    assert_eq!(layout.history_size(), 10);
    assert_eq!(layout.size(), HEADER_SIZE + 10 + 3 * 8);
}

#[test]
fn header() {
    let layout = StateLayout::new(4, 2, &[]);
    let mut raw = vec![0; layout.size()];
    let mut state = StateView::new(&layout, raw.as_mut_slice());

    // A zeroed region is not a valid state.
    assert_eq!(state.validate(0xcafe, &[]), Err(Incompatible::StateProgram));

    state.init(0xcafe);

    assert_eq!(state.validate(0xcafe, &[]), Ok(()));
    assert_eq!(
        state.validate(0xbeef, &[]),
        Err(Incompatible::StateProgram)
    );
    assert_eq!(state.offset(), 0);
    assert_eq!(state.resume(), (0, 0));
    assert!(!state.is_terminated());

    state.set_offset(1234);
    state.set_resume((1000, 7));
    state.set_terminated();

    assert_eq!(state.offset(), 1234);
    assert_eq!(state.resume(), (1000, 7));
    assert!(state.is_terminated());

    assert_eq!(&raw[0..4], b"MPSS");

    let mut short = vec![0; layout.size() - 1];
    assert_eq!(
        StateView::new(&layout, short.as_mut_slice()).validate(0xcafe, &[]),
        Err(Incompatible::StateSize {
            expected: layout.size(),
            found: layout.size() - 1
        })
    );
}

#[test]
fn history() {
    let layout = StateLayout::new(4, 0, &[]);
    let mut raw = vec![0; layout.size()];
    let mut state = StateView::new(&layout, raw.as_mut_slice());

    state.init(0);
    assert_eq!(state.history(), b"");

    state.set_history(b"", b"ab");
    assert_eq!(state.history(), b"ab");

    state.set_history(b"ab", b"c");
    assert_eq!(state.history(), b"abc");

    state.set_history(b"abc", b"de");
    assert_eq!(state.history(), b"bcde");

    state.set_history(b"bcde", b"fghij");
    assert_eq!(state.history(), b"ghij");

    state.set_history(b"ghij", b"");
    assert_eq!(state.history(), b"ghij");
}

#[test]
fn patterns() {
    let layout = StateLayout::new(1, 2, &[]);
    let mut raw = vec![0; layout.size()];
    let mut state = StateView::new(&layout, raw.as_mut_slice());

    state.init(0);

    assert_eq!(state.pattern(0), PatternEntry::default());

    let entry = PatternEntry { last_end: Some(0), exhausted: true };
    state.set_pattern(1, entry);

    assert_eq!(state.pattern(0), PatternEntry::default());
    assert_eq!(state.pattern(1), entry);
}

#[test]
fn consistency() {
    let layout = StateLayout::new(4, 1, &[]);
    let mut raw = vec![0; layout.size()];
    let mut state = StateView::new(&layout, raw.as_mut_slice());

    state.init(0);

    // Two bytes scanned, but nothing in the history.
    state.set_offset(2);
    assert_eq!(state.validate(0, &[]), Err(Incompatible::StateProgram));

    state.set_history(b"", b"ab");
    assert_eq!(state.validate(0, &[]), Ok(()));

    // The history can't be longer than the data scanned.
    state.set_offset(1);
    assert_eq!(state.validate(0, &[]), Err(Incompatible::StateProgram));
    state.set_offset(2);

    state.set_resume((4, 0));
    assert_eq!(state.validate(0, &[]), Err(Incompatible::StateProgram));
    state.set_resume((3, 0));
    assert_eq!(state.validate(0, &[]), Ok(()));

    let entry = PatternEntry { last_end: Some(3), exhausted: false };
    state.set_pattern(0, entry);
    assert_eq!(state.validate(0, &[]), Err(Incompatible::StateProgram));

    // The fields of a terminated stream are not used anymore.
    state.set_terminated();
    assert_eq!(state.validate(0, &[]), Ok(()));
}
