//! Integer helpers shared by the baseline kernels.

#[inline]
pub fn iclip(v: i32, min: i32, max: i32) -> i32 {
    if v < min {
        min
    } else if v > max {
        max
    } else {
        v
    }
}

/// Rounding right shift: adds half of `1 << shift` before shifting.
/// Shifts are arithmetic, so negative values round toward positive infinity
/// at the half.
#[inline]
pub fn round2(x: i32, shift: u8) -> i32 {
    if shift == 0 {
        return x;
    }
    (x + (1 << (shift - 1))) >> shift
}
