use std::fmt::{Display, Formatter};
use std::ops::Add;

use crate::errors::Error;

/// A repeat bound that can be either finite or infinite.
///
/// The infinite value is a sentinel that absorbs any addition, so combining
/// bounds never overflows: `∞ + n = ∞`, and finite values whose sum doesn't
/// fit in the representation also become `∞`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Depth(u32);

impl Depth {
    /// The infinite bound.
    pub const INFINITY: Depth = Depth(u32::MAX);

    /// Largest finite value.
    pub const MAX_FINITE: u32 = u32::MAX - 1;

    /// Creates a finite bound.
    ///
    /// # Panics
    ///
    /// If `value` is larger than [`Depth::MAX_FINITE`].
    pub const fn new(value: u32) -> Self {
        assert!(value <= Self::MAX_FINITE, "finite depth out of range");
        Self(value)
    }

    /// Returns `true` if this is the infinite bound.
    #[inline]
    pub const fn is_infinite(&self) -> bool {
        self.0 == u32::MAX
    }

    /// Returns `true` if this is a finite bound.
    #[inline]
    pub const fn is_finite(&self) -> bool {
        !self.is_infinite()
    }

    /// Returns the value of a finite bound, or `None` for the infinite one.
    #[inline]
    pub const fn value(&self) -> Option<u32> {
        if self.is_infinite() {
            None
        } else {
            Some(self.0)
        }
    }

    /// Returns `true` if `n` is lower than or equal to this bound.
    #[inline]
    pub fn admits(&self, n: u64) -> bool {
        self.is_infinite() || n <= self.0 as u64
    }
}

impl TryFrom<u32> for Depth {
    type Error = Error;

    /// Converts a finite bound, `u32::MAX` is out of range.
    fn try_from(value: u32) -> Result<Self, Self::Error> {
        if value > Self::MAX_FINITE {
            return Err(Error::InvalidArgument("finite depth out of range"));
        }
        Ok(Self(value))
    }
}

impl Add for Depth {
    type Output = Depth;

    fn add(self, rhs: Self) -> Self::Output {
        if self.is_infinite() || rhs.is_infinite() {
            return Depth::INFINITY;
        }
        match self.0.checked_add(rhs.0) {
            Some(sum) if sum <= Self::MAX_FINITE => Depth(sum),
            _ => Depth::INFINITY,
        }
    }
}

impl Display for Depth {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self.value() {
            Some(value) => write!(f, "{}", value),
            None => write!(f, "inf"),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::Depth;
    use crate::errors::Error;

    #[test]
    fn addition() {
        assert_eq!(Depth::new(10) + Depth::new(20), Depth::new(30));
        assert_eq!(Depth::new(10) + Depth::INFINITY, Depth::INFINITY);
        assert_eq!(Depth::INFINITY + Depth::new(0), Depth::INFINITY);
        assert_eq!(Depth::INFINITY + Depth::INFINITY, Depth::INFINITY);
        assert_eq!(
            Depth::new(Depth::MAX_FINITE) + Depth::new(1),
            Depth::INFINITY
        );
        assert_eq!(
            Depth::new(Depth::MAX_FINITE - 1) + Depth::new(1),
            Depth::new(Depth::MAX_FINITE)
        );
    }

    #[test]
    fn conversion() {
        assert_eq!(Depth::try_from(4), Ok(Depth::new(4)));
        assert_eq!(
            Depth::try_from(Depth::MAX_FINITE),
            Ok(Depth::new(Depth::MAX_FINITE))
        );
        assert_eq!(
            Depth::try_from(u32::MAX),
            Err(Error::InvalidArgument("finite depth out of range"))
        );
    }

    #[test]
    fn ordering_and_display() {
        assert!(Depth::new(5000) < Depth::INFINITY);
        assert!(Depth::new(1) < Depth::new(2));
        assert_eq!(Depth::new(200).to_string(), "200");
        assert_eq!(Depth::INFINITY.to_string(), "inf");
        assert_eq!(Depth::INFINITY.value(), None);
        assert!(Depth::INFINITY.admits(u64::MAX));
        assert!(Depth::new(3).admits(3));
        assert!(!Depth::new(3).admits(4));
    }
}
