/*! Fixed-width loads that are safe near the edges of a buffer.

Every component that reads the input close to the start or the end of a
buffer goes through the functions in this module. A load reads `W` bytes
(`W` being 1, 2, 4, 8 or 16, one per implementor of [`LoadValue`]) starting at
position `ptr`, and assembles them in little-endian order, so byte `k` of the
returned value is the byte found at `ptr + k`.

Each function receives the valid range `[lo, hi)` of the underlying buffer.
Normal and aligned loads require the whole `[ptr, ptr + W)` range to be valid.
The cautious variants relax that requirement and synthesize a zero for every
byte that falls outside the valid range, instead of reading it:

```text
             lo                      hi
              |<------- valid ------>|
   ...  ?  ?  | a  b  c  d  e  f  g  |  ?  ?  ...
              |                      |
 cautious everywhere at lo-2, W=4:  [0 0 a b]
 cautious forward at hi-2, W=4:           [f g 0 0]
```

Positions are byte offsets relative to the start of the slice. Cautious
backward and cautious everywhere loads accept negative positions, which
represent positions before the start of the slice.
*/

use std::fmt::Debug;
use std::mem::{align_of, size_of};

/// Largest width supported by [`LoadValue`] implementors.
const MAX_WIDTH: usize = size_of::<u128>();

/// Types that can be produced by a load.
pub trait LoadValue: Copy + Default + Eq + Debug {
    /// Number of bytes read by a load of this type.
    const WIDTH: usize;

    /// Builds a value from exactly [`LoadValue::WIDTH`] bytes in
    /// little-endian order.
    fn from_le_slice(bytes: &[u8]) -> Self;
}

macro_rules! impl_load_value {
    ($($ty:ty),*) => {$(
        impl LoadValue for $ty {
            const WIDTH: usize = size_of::<$ty>();

            #[inline(always)]
            fn from_le_slice(bytes: &[u8]) -> Self {
                let mut buf = [0_u8; size_of::<$ty>()];
                buf.copy_from_slice(bytes);
                <$ty>::from_le_bytes(buf)
            }
        }
    )*};
}

impl_load_value!(u8, u16, u32, u64, u128);

/// The different kinds of loads.
///
/// Useful when the kind of load is decided at runtime, see [`load_with`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadMode {
    /// `[ptr, ptr + W)` must be inside `[lo, hi)`.
    Normal,
    /// Like [`LoadMode::Normal`], but `ptr` is also aligned to `W`.
    Aligned,
    /// Bytes at or after `hi` are zero. Bytes before `ptr` are never read.
    CautiousForward,
    /// Bytes before `lo` are zero.
    CautiousBackward,
    /// Bytes outside `[lo, hi)` are zero.
    CautiousEverywhere,
}

/// Loads `W` bytes at `ptr`.
///
/// The caller guarantees that `[ptr, ptr + W)` is inside `[lo, hi)`.
///
/// # Panics
///
/// If the bytes to read are outside of `buf`. The check against `[lo, hi)`
/// is only performed in debug builds.
#[inline(always)]
pub fn load<T: LoadValue>(buf: &[u8], ptr: usize, lo: usize, hi: usize) -> T {
    debug_assert!(lo <= ptr && ptr + T::WIDTH <= hi);
    T::from_le_slice(&buf[ptr..ptr + T::WIDTH])
}

/// Like [`load`] but for positions that are known to be aligned to the
/// natural alignment of `T`. For `u8` this is exactly the same as [`load`].
#[inline(always)]
pub fn load_aligned<T: LoadValue>(
    buf: &[u8],
    ptr: usize,
    lo: usize,
    hi: usize,
) -> T {
    debug_assert_eq!(
        (buf.as_ptr() as usize + ptr) % align_of::<T>(),
        0,
        "unaligned load at {}",
        ptr
    );
    load(buf, ptr, lo, hi)
}

/// Loads `W` bytes at `ptr`, where `ptr + W` may go beyond `hi`.
///
/// Bytes at or after `hi` are zero in the result. `ptr` must be at or after
/// `lo`, and bytes before `ptr` are never read.
#[inline]
pub fn load_cautious_fwd<T: LoadValue>(
    buf: &[u8],
    ptr: usize,
    lo: usize,
    hi: usize,
) -> T {
    debug_assert!(lo <= ptr);
    match isize::try_from(ptr) {
        Ok(ptr_signed) => cautious(buf, ptr_signed, ptr, hi),
        Err(_) => T::default(),
    }
}

/// Loads `W` bytes at `ptr`, where `ptr` may be before `lo`.
///
/// Bytes before `lo` are zero in the result. `ptr + W` must not go beyond
/// `hi`.
#[inline]
pub fn load_cautious_bck<T: LoadValue>(
    buf: &[u8],
    ptr: isize,
    lo: usize,
    hi: usize,
) -> T {
    debug_assert!(ptr.saturating_add(T::WIDTH as isize) <= hi as isize);
    cautious(buf, ptr, lo, hi)
}

/// Loads `W` bytes at `ptr`, where any of those bytes may be outside the
/// valid range `[lo, hi)`. Such bytes are zero in the result.
///
/// When `lo >= hi` the valid range is empty and the result is zero.
#[inline]
pub fn load_cautious_everywhere<T: LoadValue>(
    buf: &[u8],
    ptr: isize,
    lo: usize,
    hi: usize,
) -> T {
    cautious(buf, ptr, lo, hi)
}

/// Performs a load of the given kind.
///
/// For [`LoadMode::Normal`], [`LoadMode::Aligned`] and
/// [`LoadMode::CautiousForward`] `ptr` must not be negative.
///
/// # Panics
///
/// If `ptr` is negative in one of the modes that don't accept negative
/// positions.
pub fn load_with<T: LoadValue>(
    mode: LoadMode,
    buf: &[u8],
    ptr: isize,
    lo: usize,
    hi: usize,
) -> T {
    let unsigned = || {
        usize::try_from(ptr).unwrap_or_else(|_| {
            panic!("{:?} load with negative position {}", mode, ptr)
        })
    };
    match mode {
        LoadMode::Normal => load(buf, unsigned(), lo, hi),
        LoadMode::Aligned => load_aligned(buf, unsigned(), lo, hi),
        LoadMode::CautiousForward => {
            load_cautious_fwd(buf, unsigned(), lo, hi)
        }
        LoadMode::CautiousBackward => load_cautious_bck(buf, ptr, lo, hi),
        LoadMode::CautiousEverywhere => {
            load_cautious_everywhere(buf, ptr, lo, hi)
        }
    }
}

/// Shared implementation of all cautious loads.
///
/// Only the bytes in `[ptr, ptr + W) ∩ [lo, hi) ∩ [0, buf.len())` are read,
/// all the others are left as zero.
#[inline]
fn cautious<T: LoadValue>(buf: &[u8], ptr: isize, lo: usize, hi: usize) -> T {
    let hi = hi.min(buf.len());

    if lo >= hi {
        return T::default();
    }

    let width = T::WIDTH as isize;
    let start = ptr.max(lo as isize);
    let end = ptr.saturating_add(width).min(hi as isize);

    // Fast path, all the bytes are valid.
    if start == ptr && end - start == width {
        return T::from_le_slice(&buf[start as usize..end as usize]);
    }

    if start >= end {
        return T::default();
    }

    let mut bytes = [0_u8; MAX_WIDTH];
    let dst = (start - ptr) as usize;
    let len = (end - start) as usize;

    bytes[dst..dst + len]
        .copy_from_slice(&buf[start as usize..end as usize]);

    T::from_le_slice(&bytes[..T::WIDTH])
}
