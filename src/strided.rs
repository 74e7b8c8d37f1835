//! Borrowed 2-D views over caller-owned sample buffers.
//!
//! A view is a slice plus a row stride in elements. Kernels only touch the
//! first `width` elements of each row, so padding columns past the block
//! width are never read or written.

use crate::src::safe_simd::pixel_access::{row_slice, row_slice_mut};

#[derive(Clone, Copy, Debug)]
pub struct PlaneRef<'a, T> {
    data: &'a [T],
    stride: usize,
}

impl<'a, T> PlaneRef<'a, T> {
    pub fn new(data: &'a [T], stride: usize) -> Self {
        Self { data, stride }
    }

    /// The first `len` elements of row `y`.
    #[inline]
    pub fn row(&self, y: usize, len: usize) -> &'a [T] {
        row_slice(self.data, y * self.stride, len)
    }
}

#[derive(Debug)]
pub struct PlaneMut<'a, T> {
    data: &'a mut [T],
    stride: usize,
}

impl<'a, T> PlaneMut<'a, T> {
    pub fn new(data: &'a mut [T], stride: usize) -> Self {
        Self { data, stride }
    }

    #[inline]
    pub fn row_mut(&mut self, y: usize, len: usize) -> &mut [T] {
        row_slice_mut(self.data, y * self.stride, len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_follow_stride() {
        let buf: Vec<u8> = (0..24).collect();
        let plane = PlaneRef::new(&buf, 8);
        assert_eq!(plane.row(0, 4), &[0, 1, 2, 3]);
        assert_eq!(plane.row(2, 3), &[16, 17, 18]);
    }

    #[test]
    fn row_mut_leaves_padding_alone() {
        let mut buf = vec![0u16; 12];
        let mut plane = PlaneMut::new(&mut buf, 6);
        plane.row_mut(1, 2).fill(7);
        plane.row_mut(0, 1)[0] = 1;
        assert_eq!(plane.row_mut(1, 6), &[7, 7, 0, 0, 0, 0]);
        assert_eq!(buf, [1, 0, 0, 0, 0, 0, 7, 7, 0, 0, 0, 0]);
    }
}
