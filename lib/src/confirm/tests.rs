use pretty_assertions::assert_eq;

use super::{
    run, Alternative, Automaton, AutomatonBuilder, Reach, Verdict, Window,
};
use crate::class::ByteClass;
use crate::confirm::instr::Instr;

fn automaton(f: impl FnOnce(&mut AutomatonBuilder)) -> Automaton {
    let mut builder = AutomatonBuilder::new();
    f(&mut builder);
    Automaton::new(builder.into_inner()).unwrap()
}

fn window(bytes: &[u8], at_end: bool) -> Window {
    Window { bytes, base: 0, at_end }
}

#[test]
fn reach() {
    // Literal "bar" preceded by "foo".
    let a = automaton(|c| {
        c.emit_seek(-3).emit_literal(b"foo").emit_match();
    });
    assert_eq!(a.reach(), Reach { min: -3, max: 0 });
    assert_eq!(a.reach().lookbehind(), 3);
    assert_eq!(a.reach().lookahead(3), 0);

    // Literal "bar" followed by a digit and the end of the stream.
    let a = automaton(|c| {
        c.emit_seek(3)
            .emit_class(&ByteClass::range(b'0'..=b'9'))
            .emit_assert_end()
            .emit_match();
    });
    assert_eq!(a.reach(), Reach { min: 0, max: 5 });
    assert_eq!(a.reach().lookbehind(), 0);
    assert_eq!(a.reach().lookahead(3), 2);

    // Alternatives of different lengths.
    let a = automaton(|c| {
        c.emit_alternation(&[
            Alternative::Literal(b"ab".to_vec()),
            Alternative::Masked(b"a".to_vec(), b"\xdf".to_vec()),
        ])
        .emit_literal(b"x")
        .emit_match();
    });
    assert_eq!(a.reach(), Reach { min: 0, max: 3 });
}

#[test]
fn invalid_code() {
    // No MATCH at the end.
    let mut c = AutomatonBuilder::new();
    c.emit_literal(b"foo");
    assert!(Automaton::new(c.into_inner()).is_err());

    // Code after MATCH.
    let mut c = AutomatonBuilder::new();
    c.emit_match().emit_literal(b"foo");
    assert!(Automaton::new(c.into_inner()).is_err());

    // Unknown opcode.
    assert!(Automaton::new(vec![0xff, Instr::MATCH]).is_err());

    // Truncated literal.
    assert!(Automaton::new(vec![Instr::LITERAL, 0x05, 0x00, b'a']).is_err());

    // Empty code.
    assert!(Automaton::new(vec![]).is_err());

    // Empty alternation.
    let mut c = AutomatonBuilder::new();
    c.emit_alternation(&[]).emit_match();
    assert!(Automaton::new(c.into_inner()).is_err());

    // Non-literal inside an alternation.
    assert!(Automaton::new(vec![
        Instr::ALTERNATION,
        0x01,
        0x00,
        Instr::ASSERT_START,
        Instr::MATCH
    ])
    .is_err());

    // Too far away.
    let mut c = AutomatonBuilder::new();
    c.emit_seek(i16::MAX).emit_seek(i16::MAX).emit_match();
    assert!(Automaton::new(c.into_inner()).is_err());
}

#[test]
fn lookbehind() {
    let a = automaton(|c| {
        c.emit_seek(-3).emit_literal(b"foo").emit_match();
    });

    // "foobar", the literal "bar" starts at 3.
    assert_eq!(
        run(a.code(), 3, &window(b"foobar", false)),
        Verdict::Confirmed { start: 0 }
    );
    assert_eq!(run(a.code(), 3, &window(b"fooba", false)), Verdict::Confirmed {
        start: 0
    });
    assert_eq!(run(a.code(), 3, &window(b"fxobar", true)), Verdict::Rejected);
    // Reading before the start of the stream is a rejection.
    assert_eq!(run(a.code(), 1, &window(b"xbar", false)), Verdict::Rejected);
}

#[test]
fn lookahead() {
    let a = automaton(|c| {
        c.emit_seek(3)
            .emit_not_class(&ByteClass::range(b'a'..=b'z'))
            .emit_match();
    });

    assert_eq!(
        run(a.code(), 0, &window(b"bar!", false)),
        Verdict::Confirmed { start: 0 }
    );
    assert_eq!(run(a.code(), 0, &window(b"barx", false)), Verdict::Rejected);
    assert_eq!(
        run(a.code(), 0, &window(b"bar", false)),
        Verdict::NeedsMoreContext
    );
    assert_eq!(run(a.code(), 0, &window(b"bar", true)), Verdict::Rejected);
}

#[test]
fn long_literals() {
    let a = automaton(|c| {
        c.emit_literal(b"0123456789abcdefXYZ").emit_match();
    });

    assert_eq!(
        run(a.code(), 2, &window(b"..0123456789abcdefXYZ..", false)),
        Verdict::Confirmed { start: 2 }
    );
    assert_eq!(
        run(a.code(), 2, &window(b"..0123456789abcdefXYz..", false)),
        Verdict::Rejected
    );
    assert_eq!(
        run(a.code(), 2, &window(b"..0123456789abcdefX", false)),
        Verdict::NeedsMoreContext
    );
    // A mismatch in the available prefix is definitive.
    assert_eq!(
        run(a.code(), 2, &window(b"..0123456789Abcde", false)),
        Verdict::Rejected
    );
}

#[test]
fn masked_alternation() {
    // Case-insensitive "get" or "put" after the literal.
    let a = automaton(|c| {
        c.emit_seek(1)
            .emit_alternation(&[
                Alternative::Masked(b"GET".to_vec(), b"\xdf\xdf\xdf".to_vec()),
                Alternative::Masked(b"PUT".to_vec(), b"\xdf\xdf\xdf".to_vec()),
            ])
            .emit_match();
    });

    for input in [b"/get", b"/GeT", b"/PUT", b"/pUt"] {
        assert_eq!(
            run(a.code(), 0, &window(input, true)),
            Verdict::Confirmed { start: 0 }
        );
    }
    assert_eq!(run(a.code(), 0, &window(b"/del", true)), Verdict::Rejected);
    assert_eq!(
        run(a.code(), 0, &window(b"/ge", false)),
        Verdict::NeedsMoreContext
    );
    assert_eq!(run(a.code(), 0, &window(b"/ge", true)), Verdict::Rejected);
}

#[test]
fn anchors() {
    let start = automaton(|c| {
        c.emit_assert_start().emit_match();
    });

    assert_eq!(
        run(start.code(), 0, &window(b"abc", false)),
        Verdict::Confirmed { start: 0 }
    );
    assert_eq!(
        run(start.code(), 1, &window(b"abc", false)),
        Verdict::Rejected
    );

    let end = automaton(|c| {
        c.emit_seek(3).emit_assert_end().emit_match();
    });

    assert_eq!(
        run(end.code(), 0, &window(b"abc", true)),
        Verdict::Confirmed { start: 0 }
    );
    assert_eq!(
        run(end.code(), 0, &window(b"abc", false)),
        Verdict::NeedsMoreContext
    );
    assert_eq!(run(end.code(), 0, &window(b"abcd", false)), Verdict::Rejected);
}

#[test]
fn window_with_base() {
    let a = automaton(|c| {
        c.emit_seek(-2)
            .emit_literal(b"xy")
            .emit_seek(2)
            .emit_literal(b"!")
            .emit_match();
    });

    // The window starts at stream offset 100.
    let w = Window { bytes: b"xyab!", base: 100, at_end: false };

    assert_eq!(run(a.code(), 102, &w), Verdict::Confirmed { start: 100 });
    // Bytes before the window are not available.
    assert_eq!(run(a.code(), 101, &w), Verdict::Rejected);
}
