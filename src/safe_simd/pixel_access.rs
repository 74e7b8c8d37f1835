//! Row access and edge windows for the kernels.
//!
//! When the `unchecked` feature is enabled, row slicing uses unchecked
//! indexing (bounds are still `debug_assert!`ed). Otherwise it uses normal
//! bounds-checked indexing.

use crate::include::common::bitdepth::BitDepth;

/// Get an immutable slice from a buffer at a given offset.
#[inline(always)]
pub fn row_slice<T>(buf: &[T], offset: usize, len: usize) -> &[T] {
    #[cfg(feature = "unchecked")]
    {
        debug_assert!(offset + len <= buf.len());
        // SAFETY: callers derive `offset + len` from a view whose rows lie
        // within `buf`, checked above in debug builds.
        #[allow(unsafe_code)]
        unsafe {
            buf.get_unchecked(offset..offset + len)
        }
    }
    #[cfg(not(feature = "unchecked"))]
    &buf[offset..offset + len]
}

/// Get a mutable slice from a buffer at a given offset.
#[inline(always)]
pub fn row_slice_mut<T>(buf: &mut [T], offset: usize, len: usize) -> &mut [T] {
    #[cfg(feature = "unchecked")]
    {
        debug_assert!(offset + len <= buf.len());
        // SAFETY: see `row_slice`.
        #[allow(unsafe_code)]
        unsafe {
            buf.get_unchecked_mut(offset..offset + len)
        }
    }
    #[cfg(not(feature = "unchecked"))]
    &mut buf[offset..offset + len]
}

/// The first `N` elements of `buf` as an array reference.
///
/// Panics like slice indexing when `buf` is shorter than `N`.
#[inline(always)]
pub fn first_array<T, const N: usize>(buf: &[T]) -> &[T; N] {
    match buf.first_chunk() {
        Some(chunk) => chunk,
        None => panic!("slice of length {} is shorter than {N}", buf.len()),
    }
}

/// Widen up to `N` samples into a zero-initialised window, replicating the
/// last valid sample into the unused tail.
///
/// Used for the ragged right edge of a row: lanes past `src.len()` hold a
/// valid sample, so lookups keyed on them stay in range, and their results
/// are discarded by [`store_window`].
#[inline(always)]
pub fn edge_window<T: Copy + Into<i32>, const N: usize>(src: &[T]) -> [i16; N] {
    let mut window = [0i16; N];
    let valid = src.len().min(N);
    for (w, &s) in window.iter_mut().zip(&src[..valid]) {
        *w = s.into() as i16;
    }
    if let Some(&last) = src[..valid].last() {
        window[valid..].fill(last.into() as i16);
    }
    window
}

/// Widen up to `N` samples into a zero-initialised window.
#[inline(always)]
pub fn zero_window<T: Copy + Into<i32>, const N: usize>(src: &[T]) -> [i16; N] {
    let mut window = [0i16; N];
    for (w, &s) in window.iter_mut().zip(src) {
        *w = s.into() as i16;
    }
    window
}

/// Narrow the first `dst.len()` lanes of `lanes` into pixels.
///
/// Lanes must already be clamped to the pixel range.
#[inline(always)]
pub fn store_window<BD: BitDepth>(dst: &mut [BD::Pixel], lanes: &[i16]) {
    for (d, &v) in dst.iter_mut().zip(lanes) {
        *d = BD::pixel_from(v as i32);
    }
}
