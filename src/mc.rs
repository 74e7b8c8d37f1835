//! Distance-weighted compound prediction blending.
//!
//! Two intermediate predictions (signed 16-bit, before the final rounding)
//! are combined with a pair of weights summing to 16:
//!
//! `dst = clip(round2(p0 * w0 + p1 * w1, 8), 0, bitdepth_max)`

use crate::include::common::bitdepth::BitDepth;
use crate::include::common::intops::round2;
use crate::src::cpu::CpuFlags;
use crate::src::strided::{PlaneMut, PlaneRef};

/// Both weights of a pair add up to `1 << DISTANCE_WEIGHT_BITS`.
pub const DISTANCE_WEIGHT_BITS: u8 = 4;

/// Total rounding shift: the weight bits plus the inter post-rounding bits.
pub const DISTANCE_WEIGHTED_BLEND_SHIFT: u8 = DISTANCE_WEIGHT_BITS + 4;

pub type DistanceWeightedBlendFn<BD> = fn(
    PlaneRef<'_, i16>,
    PlaneRef<'_, i16>,
    u8,
    u8,
    usize,
    usize,
    PlaneMut<'_, <BD as BitDepth>::Pixel>,
    BD,
);

#[inline]
pub(crate) fn is_block_dimension(n: usize) -> bool {
    n.is_power_of_two() && (4..=128).contains(&n)
}

#[inline]
pub(crate) fn debug_assert_blend_args(weight_0: u8, weight_1: u8, width: usize, height: usize) {
    debug_assert_eq!(
        weight_0 as u32 + weight_1 as u32,
        1 << DISTANCE_WEIGHT_BITS,
        "distance weights must sum to 16"
    );
    debug_assert!(is_block_dimension(width), "unsupported block width {width}");
    debug_assert!(is_block_dimension(height), "unsupported block height {height}");
}

#[inline]
pub(crate) fn blend_sample<BD: BitDepth>(p0: i16, p1: i16, w0: i32, w1: i32, bd: BD) -> BD::Pixel {
    let sum = p0 as i32 * w0 + p1 as i32 * w1;
    // Saturate to i16 first, matching the narrowing rounding shift of the
    // vector forms, then clamp to the pixel range.
    let rounded =
        round2(sum, DISTANCE_WEIGHTED_BLEND_SHIFT).clamp(i16::MIN as i32, i16::MAX as i32);
    bd.iclip_pixel(rounded)
}

pub(crate) fn distance_weighted_blend_rust<BD: BitDepth>(
    prediction_0: PlaneRef<'_, i16>,
    prediction_1: PlaneRef<'_, i16>,
    weight_0: u8,
    weight_1: u8,
    width: usize,
    height: usize,
    mut dst: PlaneMut<'_, BD::Pixel>,
    bd: BD,
) {
    debug_assert_blend_args(weight_0, weight_1, width, height);
    let (w0, w1) = (weight_0 as i32, weight_1 as i32);
    for y in 0..height {
        let p0 = prediction_0.row(y, width);
        let p1 = prediction_1.row(y, width);
        let dst = dst.row_mut(y, width);
        for ((d, &a), &b) in dst.iter_mut().zip(p0).zip(p1) {
            *d = blend_sample(a, b, w0, w1, bd);
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Rav1dMCDSPContext<BD: BitDepth> {
    pub distance_weighted_blend: DistanceWeightedBlendFn<BD>,
}

impl<BD: BitDepth> Rav1dMCDSPContext<BD> {
    pub const fn default() -> Self {
        Self {
            distance_weighted_blend: distance_weighted_blend_rust::<BD>,
        }
    }

    #[cfg(target_arch = "x86_64")]
    const fn init_sse41(mut self, flags: CpuFlags) -> Self {
        use crate::src::safe_simd::mc;

        if !flags.contains(CpuFlags::SSE41) {
            return self;
        }

        self.distance_weighted_blend = mc::distance_weighted_blend_sse41::<BD>;
        self
    }

    #[cfg(not(target_arch = "x86_64"))]
    const fn init_sse41(self, _flags: CpuFlags) -> Self {
        self
    }

    #[cfg(target_arch = "x86_64")]
    const fn init_avx2(mut self, flags: CpuFlags) -> Self {
        use crate::src::safe_simd::mc;

        if !flags.contains(CpuFlags::AVX2) {
            return self;
        }

        self.distance_weighted_blend = mc::distance_weighted_blend_avx2::<BD>;
        self
    }

    #[cfg(not(target_arch = "x86_64"))]
    const fn init_avx2(self, _flags: CpuFlags) -> Self {
        self
    }

    #[cfg(target_arch = "aarch64")]
    const fn init_neon(mut self, flags: CpuFlags) -> Self {
        use crate::src::safe_simd::mc_arm;

        if !flags.contains(CpuFlags::NEON) {
            return self;
        }

        self.distance_weighted_blend = mc_arm::distance_weighted_blend_neon::<BD>;
        self
    }

    #[cfg(not(target_arch = "aarch64"))]
    const fn init_neon(self, _flags: CpuFlags) -> Self {
        self
    }

    /// Runs every initializer in fixed priority order; later tiers overwrite
    /// the entries of earlier ones.
    #[inline(always)]
    const fn init(self, flags: CpuFlags) -> Self {
        self.init_sse41(flags).init_avx2(flags).init_neon(flags)
    }

    pub const fn new(flags: CpuFlags) -> Self {
        Self::default().init(flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::include::common::bitdepth::{BitDepth16, BitDepth8};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const SIZES: [usize; 6] = [4, 8, 16, 32, 64, 128];

    fn reference<BD: BitDepth>(p0: &[i16], p1: &[i16], w0: u8, w1: u8, bd: BD) -> Vec<i32> {
        p0.iter()
            .zip(p1)
            .map(|(&a, &b)| {
                let sum = a as i32 * w0 as i32 + b as i32 * w1 as i32;
                ((sum + 128) >> 8).clamp(0, bd.bitdepth_max())
            })
            .collect()
    }

    fn blend<BD: BitDepth>(
        p0: &[i16],
        p1: &[i16],
        w0: u8,
        w1: u8,
        w: usize,
        h: usize,
        bd: BD,
    ) -> Vec<BD::Pixel> {
        let mut dst = vec![BD::Pixel::default(); w * h];
        distance_weighted_blend_rust(
            PlaneRef::new(p0, w),
            PlaneRef::new(p1, w),
            w0,
            w1,
            w,
            h,
            PlaneMut::new(&mut dst, w),
            bd,
        );
        dst
    }

    #[test]
    fn constant_block_weighted_12_4() {
        let p0 = [100i16; 16];
        let p1 = [200i16; 16];
        // Predictions carry 4 extra bits of precision.
        let p0 = p0.map(|v| v << 4);
        let p1 = p1.map(|v| v << 4);
        let out = blend(&p0, &p1, 12, 4, 4, 4, BitDepth8);
        assert_eq!(out, [125u8; 16]);
    }

    #[test]
    fn symmetric_weights_average() {
        let mut rng = StdRng::seed_from_u64(7);
        let p0: Vec<i16> = (0..64).map(|_| rng.gen_range(0..=255 << 4)).collect();
        let p1: Vec<i16> = (0..64).map(|_| rng.gen_range(0..=255 << 4)).collect();
        let out = blend(&p0, &p1, 8, 8, 8, 8, BitDepth8);
        for i in 0..64 {
            let avg = (p0[i] as i32 + p1[i] as i32 + 16) >> 5;
            assert_eq!(out[i] as i32, avg, "sample {i}");
        }
    }

    #[test]
    fn matches_reference_all_sizes() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for &w in &SIZES {
            for &h in &SIZES {
                let n = w * h;
                let p0: Vec<i16> = (0..n).map(|_| rng.gen_range(-5000..20000)).collect();
                let p1: Vec<i16> = (0..n).map(|_| rng.gen_range(-5000..20000)).collect();
                for w0 in 0..=16u8 {
                    let w1 = 16 - w0;
                    let out8 = blend(&p0, &p1, w0, w1, w, h, BitDepth8);
                    let ref8 = reference(&p0, &p1, w0, w1, BitDepth8);
                    assert!(out8.iter().map(|&v| v as i32).eq(ref8), "{w}x{h} w0={w0}");
                    let out10 = blend(&p0, &p1, w0, w1, w, h, BitDepth16);
                    let ref10 = reference(&p0, &p1, w0, w1, BitDepth16);
                    assert!(out10.iter().map(|&v| v as i32).eq(ref10), "{w}x{h} w0={w0}");
                }
            }
        }
    }

    #[test]
    fn extreme_predictions_saturate() {
        let p0 = [i16::MAX; 16];
        let p1 = [i16::MIN; 16];
        assert_eq!(blend(&p0, &p0, 9, 7, 4, 4, BitDepth8), [255u8; 16]);
        assert_eq!(blend(&p1, &p1, 9, 7, 4, 4, BitDepth16), [0u16; 16]);
    }

    #[test]
    fn padding_columns_untouched() {
        let (w, h, stride) = (4, 4, 7);
        let p0 = vec![1600i16; stride * h];
        let p1 = vec![3200i16; stride * h];
        let mut dst = vec![0xAAu8; stride * h];
        distance_weighted_blend_rust(
            PlaneRef::new(&p0, stride),
            PlaneRef::new(&p1, stride),
            8,
            8,
            w,
            h,
            PlaneMut::new(&mut dst, stride),
            BitDepth8,
        );
        for (i, &v) in dst.iter().enumerate() {
            let expected = if i % stride < w { 150 } else { 0xAA };
            assert_eq!(v, expected, "index {i}");
        }
    }
}
