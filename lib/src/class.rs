use std::fmt::{Debug, Formatter};
use std::ops::RangeInclusive;

use bitvec::array::BitArray;
use bitvec::order::Lsb0;

/// A set of byte values.
///
/// Used for describing the bytes accepted by a bounded repeat, and by the
/// `CLASS` instruction of confirmation automata. The set is stored as a
/// 256-bit bitmap, where bit `n` is set if byte `n` belongs to the class.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct ByteClass {
    bits: BitArray<[u8; 32], Lsb0>,
}

impl ByteClass {
    /// Size of the class when encoded as raw bytes.
    pub const ENCODED_SIZE: usize = 32;

    /// Creates an empty class.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a class that contains a single byte.
    pub fn byte(b: u8) -> Self {
        let mut class = Self::new();
        class.insert(b);
        class
    }

    /// Creates a class that contains all the bytes in the given range.
    pub fn range(range: RangeInclusive<u8>) -> Self {
        let mut class = Self::new();
        for b in range {
            class.insert(b);
        }
        class
    }

    /// Creates a class that contains every possible byte.
    pub fn any() -> Self {
        Self::range(0..=255)
    }

    /// Creates a class from its raw encoding, as produced by
    /// [`ByteClass::to_raw`].
    pub fn from_raw(raw: [u8; 32]) -> Self {
        Self { bits: BitArray::new(raw) }
    }

    /// Returns the raw encoding of this class.
    pub fn to_raw(&self) -> [u8; 32] {
        self.bits.into_inner()
    }

    /// Adds a byte to the class.
    #[inline]
    pub fn insert(&mut self, b: u8) {
        self.bits.set(b as usize, true);
    }

    /// Returns `true` if the class contains the given byte.
    #[inline(always)]
    pub fn contains(&self, b: u8) -> bool {
        self.bits[b as usize]
    }

    /// Number of bytes in the class.
    pub fn len(&self) -> usize {
        self.bits.count_ones()
    }

    /// Returns `true` if the class doesn't contain any byte.
    pub fn is_empty(&self) -> bool {
        self.bits.not_any()
    }

    /// If the class contains exactly one byte, returns that byte.
    pub fn single(&self) -> Option<u8> {
        if self.len() == 1 {
            self.bits.first_one().map(|b| b as u8)
        } else {
            None
        }
    }

    /// Returns the complement of this class.
    pub fn negated(&self) -> Self {
        Self { bits: !self.bits }
    }

    /// Iterator over the bytes in the class, in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u8> + '_ {
        self.bits.iter_ones().map(|b| b as u8)
    }
}

impl Default for ByteClass {
    fn default() -> Self {
        Self { bits: BitArray::ZERO }
    }
}

impl FromIterator<u8> for ByteClass {
    fn from_iter<I: IntoIterator<Item = u8>>(iter: I) -> Self {
        let mut class = Self::new();
        for b in iter {
            class.insert(b);
        }
        class
    }
}

impl Debug for ByteClass {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for b in self.iter() {
            write!(f, "{:02x}", b)?;
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::ByteClass;

    #[test]
    fn byte_class() {
        let class = ByteClass::range(b'a'..=b'c');

        assert_eq!(class.len(), 3);
        assert!(class.contains(b'b'));
        assert!(!class.contains(b'd'));
        assert_eq!(class.single(), None);
        assert_eq!(class.iter().collect::<Vec<_>>(), b"abc".to_vec());

        assert_eq!(ByteClass::byte(0).single(), Some(0));
        assert_eq!(ByteClass::byte(255).single(), Some(255));

        let negated = class.negated();
        assert_eq!(negated.len(), 253);
        assert!(!negated.contains(b'a'));

        assert_eq!(ByteClass::from_raw(class.to_raw()), class);
        assert!(ByteClass::new().is_empty());
        assert_eq!(ByteClass::any().len(), 256);
    }
}
