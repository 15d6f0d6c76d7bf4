use pretty_assertions::assert_eq;

use super::{Candidate, Key, LiteralTable};
use crate::program::LiteralId;

/// Returns the candidates as `(end, literal)` tuples.
fn scan(
    table: &LiteralTable,
    history: &[u8],
    data: &[u8],
    chunk_start: u64,
    resume: Key,
) -> Vec<(u64, u32)> {
    let mut seam = history.to_vec();
    seam.extend_from_slice(&data[..data.len().min(8)]);
    let mut ties = Vec::with_capacity(table.len());
    table
        .candidates(&seam, history.len(), data, chunk_start, resume, &mut ties)
        .map(|c: Candidate| (c.end, c.literal.into()))
        .collect()
}

#[test]
fn ranks() {
    let table = LiteralTable::new(&["ab", "b", "abc", "xy", "b"]).unwrap();

    assert_eq!(table.len(), 5);
    assert_eq!(table.rank(LiteralId::from(2_usize)), 0);
    assert_eq!(table.rank(LiteralId::from(0_usize)), 1);
    assert_eq!(table.rank(LiteralId::from(3_usize)), 2);
    assert_eq!(table.rank(LiteralId::from(1_usize)), 3);
    assert_eq!(table.rank(LiteralId::from(4_usize)), 4);
    assert_eq!(table.literal_len(LiteralId::from(2_usize)), 3);
}

#[test]
fn ordered_by_end_and_rank() {
    let table = LiteralTable::new(&["b", "ab", "abc", "c", "b"]).unwrap();

    assert_eq!(
        scan(&table, b"", b"xabcb", 0, (0, 0)),
        vec![
            (3, 1), // ab
            (3, 0), // b
            (3, 4), // b, same bytes as literal 0 but worse rank
            (4, 2), // abc
            (4, 3), // c
            (5, 0),
            (5, 4),
        ]
    );
}

#[test]
fn overlapping() {
    let table = LiteralTable::new(&["aa"]).unwrap();
    assert_eq!(
        scan(&table, b"", b"aaaa", 10, (0, 0)),
        vec![(12, 0), (13, 0), (14, 0)]
    );

    let table = LiteralTable::new(&["aa", "aaa"]).unwrap();
    assert_eq!(
        scan(&table, b"", b"aaaa", 0, (0, 0)),
        vec![(2, 0), (3, 1), (3, 0), (4, 1), (4, 0)]
    );
}

#[test]
fn seam() {
    let table = LiteralTable::new(&["abcd", "cd", "x"]).unwrap();

    // The previous chunk ended with "xab", the new chunk starts at 100.
    assert_eq!(
        scan(&table, b"xab", b"cdx", 100, (100, 0)),
        vec![(102, 0), (102, 1), (103, 2)]
    );

    // With a resume key that already covers everything in the history, the
    // "x" that ends at 98 is not reported again.
    assert_eq!(
        scan(&table, b"xab", b"cdx", 100, (101, 0)),
        vec![(102, 0), (102, 1), (103, 2)]
    );

    // Candidates that were deferred while scanning the previous chunk are
    // found again.
    assert_eq!(
        scan(&table, b"xab", b"cdx", 100, (98, 0)),
        vec![(98, 2), (102, 0), (102, 1), (103, 2)]
    );
}

#[test]
fn resume_within_ties() {
    let table = LiteralTable::new(&["ab", "b"]).unwrap();

    // The candidate for "ab" ending at 2 was already processed, but not
    // the one for "b".
    assert_eq!(scan(&table, b"ab", b"b", 2, (2, 1)), vec![(2, 1), (3, 1)]);
}

#[test]
fn no_literals() {
    let table = LiteralTable::new::<&[u8]>(&[]).unwrap();
    assert_eq!(scan(&table, b"", b"abc", 0, (0, 0)), vec![]);
}
