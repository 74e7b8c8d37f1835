//! Distance-weighted blend for x86_64 (SSE4.1 and AVX2).
//!
//! Each tier specializes by width class: 4xH packs several rows into one
//! vector, 8xH processes row pairs, and wider blocks step 16 samples at a
//! time. All of them produce exactly the baseline result.

#![forbid(unsafe_code)]

use core::arch::x86_64::*;

use archmage::{arcane, rite, Desktop64, SimdToken, X64V2Token};

use crate::include::common::bitdepth::BitDepth;
use crate::src::mc::{
    blend_sample, debug_assert_blend_args, distance_weighted_blend_rust,
    DISTANCE_WEIGHTED_BLEND_SHIFT,
};
use crate::src::safe_simd::partial_simd::{
    mm256_loadu_si256, mm256_storeu_si256, mm_loadl_epi64, mm_loadu_si128, mm_storeu_si128,
};
use crate::src::safe_simd::pixel_access::{first_array, store_window};
use crate::src::strided::{PlaneMut, PlaneRef};

const BLEND_ROUND: i32 = 1 << (DISTANCE_WEIGHTED_BLEND_SHIFT - 1);
const BLEND_SHIFT: i32 = DISTANCE_WEIGHTED_BLEND_SHIFT as i32;

/// Weight pair laid out for `madd` over interleaved `(p0, p1)` lanes.
#[inline(always)]
fn packed_weights(weight_0: u8, weight_1: u8) -> i32 {
    (weight_1 as i32) << 16 | weight_0 as i32
}

// ============================================================================
// SSE4.1
// ============================================================================

/// `round2(p0 * w0 + p1 * w1, 8)` for 8 lanes, saturated to i16.
#[rite]
fn weighted_average_8(_t: X64V2Token, p0: __m128i, p1: __m128i, weights: __m128i) -> __m128i {
    let round = _mm_set1_epi32(BLEND_ROUND);
    let lo = _mm_madd_epi16(_mm_unpacklo_epi16(p0, p1), weights);
    let hi = _mm_madd_epi16(_mm_unpackhi_epi16(p0, p1), weights);
    let lo = _mm_srai_epi32::<BLEND_SHIFT>(_mm_add_epi32(lo, round));
    let hi = _mm_srai_epi32::<BLEND_SHIFT>(_mm_add_epi32(hi, round));
    _mm_packs_epi32(lo, hi)
}

#[rite]
fn clip_pixels_8(_t: X64V2Token, v: __m128i, max: __m128i) -> [i16; 8] {
    let v = _mm_min_epi16(_mm_max_epi16(v, _mm_setzero_si128()), max);
    let mut lanes = [0i16; 8];
    mm_storeu_si128(&mut lanes, v);
    lanes
}

#[rite]
fn load_4x2(_t: X64V2Token, plane: PlaneRef<'_, i16>, y: usize) -> __m128i {
    let r0 = mm_loadl_epi64(first_array(plane.row(y, 4)));
    let r1 = mm_loadl_epi64(first_array(plane.row(y + 1, 4)));
    _mm_unpacklo_epi64(r0, r1)
}

#[rite]
fn blend_4xh_sse41<BD: BitDepth>(
    t: X64V2Token,
    p0: PlaneRef<'_, i16>,
    p1: PlaneRef<'_, i16>,
    weights: __m128i,
    max: __m128i,
    height: usize,
    dst: &mut PlaneMut<'_, BD::Pixel>,
) {
    for y in (0..height).step_by(2) {
        let avg = weighted_average_8(t, load_4x2(t, p0, y), load_4x2(t, p1, y), weights);
        let lanes = clip_pixels_8(t, avg, max);
        store_window::<BD>(dst.row_mut(y, 4), &lanes[..4]);
        store_window::<BD>(dst.row_mut(y + 1, 4), &lanes[4..]);
    }
}

#[rite]
fn blend_8xh_sse41<BD: BitDepth>(
    t: X64V2Token,
    p0: PlaneRef<'_, i16>,
    p1: PlaneRef<'_, i16>,
    weights: __m128i,
    max: __m128i,
    height: usize,
    dst: &mut PlaneMut<'_, BD::Pixel>,
) {
    for y in (0..height).step_by(2) {
        for row in [y, y + 1] {
            let a = mm_loadu_si128(first_array(p0.row(row, 8)));
            let b = mm_loadu_si128(first_array(p1.row(row, 8)));
            let lanes = clip_pixels_8(t, weighted_average_8(t, a, b, weights), max);
            store_window::<BD>(dst.row_mut(row, 8), &lanes);
        }
    }
}

#[rite]
fn blend_large_sse41<BD: BitDepth>(
    t: X64V2Token,
    p0: PlaneRef<'_, i16>,
    p1: PlaneRef<'_, i16>,
    weight_0: u8,
    weight_1: u8,
    width: usize,
    height: usize,
    dst: &mut PlaneMut<'_, BD::Pixel>,
    bd: BD,
) {
    let weights = _mm_set1_epi32(packed_weights(weight_0, weight_1));
    let max = _mm_set1_epi16(bd.bitdepth_max() as i16);
    for y in 0..height {
        let p0 = p0.row(y, width);
        let p1 = p1.row(y, width);
        let dst = dst.row_mut(y, width);
        let mut x = 0;
        while x + 16 <= width {
            for half in [x, x + 8] {
                let a = mm_loadu_si128(first_array(&p0[half..]));
                let b = mm_loadu_si128(first_array(&p1[half..]));
                let lanes = clip_pixels_8(t, weighted_average_8(t, a, b, weights), max);
                store_window::<BD>(&mut dst[half..half + 8], &lanes);
            }
            x += 16;
        }
        for x in x..width {
            dst[x] = blend_sample(p0[x], p1[x], weight_0 as i32, weight_1 as i32, bd);
        }
    }
}

#[arcane]
fn distance_weighted_blend_sse41_inner<BD: BitDepth>(
    t: X64V2Token,
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
    let weights = _mm_set1_epi32(packed_weights(weight_0, weight_1));
    let max = _mm_set1_epi16(bd.bitdepth_max() as i16);
    match width {
        4 => blend_4xh_sse41::<BD>(t, prediction_0, prediction_1, weights, max, height, &mut dst),
        8 => blend_8xh_sse41::<BD>(t, prediction_0, prediction_1, weights, max, height, &mut dst),
        _ => blend_large_sse41::<BD>(
            t,
            prediction_0,
            prediction_1,
            weight_0,
            weight_1,
            width,
            height,
            &mut dst,
            bd,
        ),
    }
}

pub fn distance_weighted_blend_sse41<BD: BitDepth>(
    prediction_0: PlaneRef<'_, i16>,
    prediction_1: PlaneRef<'_, i16>,
    weight_0: u8,
    weight_1: u8,
    width: usize,
    height: usize,
    dst: PlaneMut<'_, BD::Pixel>,
    bd: BD,
) {
    match X64V2Token::summon() {
        Some(token) => distance_weighted_blend_sse41_inner::<BD>(
            token,
            prediction_0,
            prediction_1,
            weight_0,
            weight_1,
            width,
            height,
            dst,
            bd,
        ),
        None => distance_weighted_blend_rust(
            prediction_0,
            prediction_1,
            weight_0,
            weight_1,
            width,
            height,
            dst,
            bd,
        ),
    }
}

// ============================================================================
// AVX2
// ============================================================================

#[rite]
fn weighted_average_16(_t: Desktop64, p0: __m256i, p1: __m256i, weights: __m256i) -> __m256i {
    // Unpack and pack are both per 128-bit lane, so lane order is preserved.
    let round = _mm256_set1_epi32(BLEND_ROUND);
    let lo = _mm256_madd_epi16(_mm256_unpacklo_epi16(p0, p1), weights);
    let hi = _mm256_madd_epi16(_mm256_unpackhi_epi16(p0, p1), weights);
    let lo = _mm256_srai_epi32::<BLEND_SHIFT>(_mm256_add_epi32(lo, round));
    let hi = _mm256_srai_epi32::<BLEND_SHIFT>(_mm256_add_epi32(hi, round));
    _mm256_packs_epi32(lo, hi)
}

#[rite]
fn clip_pixels_16(_t: Desktop64, v: __m256i, max: __m256i) -> [i16; 16] {
    let v = _mm256_min_epi16(_mm256_max_epi16(v, _mm256_setzero_si256()), max);
    let mut lanes = [0i16; 16];
    mm256_storeu_si256(&mut lanes, v);
    lanes
}

/// Rows `y..y + 4` of a 4-wide block, two per 128-bit lane.
#[rite]
fn load_4x4(_t: Desktop64, plane: PlaneRef<'_, i16>, y: usize) -> __m256i {
    let [r0, r1, r2, r3] = [y, y + 1, y + 2, y + 3].map(|y| first_array(plane.row(y, 4)));
    _mm256_set_m128i(
        _mm_unpacklo_epi64(mm_loadl_epi64(r2), mm_loadl_epi64(r3)),
        _mm_unpacklo_epi64(mm_loadl_epi64(r0), mm_loadl_epi64(r1)),
    )
}

/// Rows `y` and `y + 1` in the low and high 128-bit lanes.
#[rite]
fn load_8x2(_t: Desktop64, plane: PlaneRef<'_, i16>, y: usize) -> __m256i {
    _mm256_set_m128i(
        mm_loadu_si128(first_array(plane.row(y + 1, 8))),
        mm_loadu_si128(first_array(plane.row(y, 8))),
    )
}

#[rite]
fn blend_4xh_avx2<BD: BitDepth>(
    t: Desktop64,
    p0: PlaneRef<'_, i16>,
    p1: PlaneRef<'_, i16>,
    weights: __m256i,
    max: __m256i,
    height: usize,
    dst: &mut PlaneMut<'_, BD::Pixel>,
) {
    for y in (0..height).step_by(4) {
        let a = load_4x4(t, p0, y);
        let b = load_4x4(t, p1, y);
        let lanes = clip_pixels_16(t, weighted_average_16(t, a, b, weights), max);
        for (i, row) in lanes.chunks_exact(4).enumerate() {
            store_window::<BD>(dst.row_mut(y + i, 4), row);
        }
    }
}

#[rite]
fn blend_8xh_avx2<BD: BitDepth>(
    t: Desktop64,
    p0: PlaneRef<'_, i16>,
    p1: PlaneRef<'_, i16>,
    weights: __m256i,
    max: __m256i,
    height: usize,
    dst: &mut PlaneMut<'_, BD::Pixel>,
) {
    for y in (0..height).step_by(2) {
        let a = load_8x2(t, p0, y);
        let b = load_8x2(t, p1, y);
        let lanes = clip_pixels_16(t, weighted_average_16(t, a, b, weights), max);
        store_window::<BD>(dst.row_mut(y, 8), &lanes[..8]);
        store_window::<BD>(dst.row_mut(y + 1, 8), &lanes[8..]);
    }
}

#[rite]
fn blend_large_avx2<BD: BitDepth>(
    t: Desktop64,
    p0: PlaneRef<'_, i16>,
    p1: PlaneRef<'_, i16>,
    weight_0: u8,
    weight_1: u8,
    width: usize,
    height: usize,
    dst: &mut PlaneMut<'_, BD::Pixel>,
    bd: BD,
) {
    let weights = _mm256_set1_epi32(packed_weights(weight_0, weight_1));
    let max = _mm256_set1_epi16(bd.bitdepth_max() as i16);
    for y in 0..height {
        let p0 = p0.row(y, width);
        let p1 = p1.row(y, width);
        let dst = dst.row_mut(y, width);
        let mut x = 0;
        while x + 16 <= width {
            let a = mm256_loadu_si256(first_array(&p0[x..]));
            let b = mm256_loadu_si256(first_array(&p1[x..]));
            let lanes = clip_pixels_16(t, weighted_average_16(t, a, b, weights), max);
            store_window::<BD>(&mut dst[x..x + 16], &lanes);
            x += 16;
        }
        for x in x..width {
            dst[x] = blend_sample(p0[x], p1[x], weight_0 as i32, weight_1 as i32, bd);
        }
    }
}

#[arcane]
fn distance_weighted_blend_avx2_inner<BD: BitDepth>(
    t: Desktop64,
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
    let weights = _mm256_set1_epi32(packed_weights(weight_0, weight_1));
    let max = _mm256_set1_epi16(bd.bitdepth_max() as i16);
    match width {
        4 => blend_4xh_avx2::<BD>(t, prediction_0, prediction_1, weights, max, height, &mut dst),
        8 => blend_8xh_avx2::<BD>(t, prediction_0, prediction_1, weights, max, height, &mut dst),
        _ => blend_large_avx2::<BD>(
            t,
            prediction_0,
            prediction_1,
            weight_0,
            weight_1,
            width,
            height,
            &mut dst,
            bd,
        ),
    }
}

pub fn distance_weighted_blend_avx2<BD: BitDepth>(
    prediction_0: PlaneRef<'_, i16>,
    prediction_1: PlaneRef<'_, i16>,
    weight_0: u8,
    weight_1: u8,
    width: usize,
    height: usize,
    dst: PlaneMut<'_, BD::Pixel>,
    bd: BD,
) {
    match Desktop64::summon() {
        Some(token) => distance_weighted_blend_avx2_inner::<BD>(
            token,
            prediction_0,
            prediction_1,
            weight_0,
            weight_1,
            width,
            height,
            dst,
            bd,
        ),
        None => distance_weighted_blend_sse41(
            prediction_0,
            prediction_1,
            weight_0,
            weight_1,
            width,
            height,
            dst,
            bd,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::include::common::bitdepth::{BitDepth16, BitDepth8};
    use crate::src::mc::DistanceWeightedBlendFn;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    const SIZES: [usize; 6] = [4, 8, 16, 32, 64, 128];

    fn check_tier<BD: BitDepth>(tier: DistanceWeightedBlendFn<BD>, bd: BD, seed: u64) {
        let mut rng = StdRng::seed_from_u64(seed);
        for &w in &SIZES {
            for &h in &SIZES {
                // Odd strides so rows are not vector aligned.
                let (s0, s1, sd) = (w + 3, w + 5, w + 1);
                let p0: Vec<i16> = (0..s0 * h).map(|_| rng.gen()).collect();
                let p1: Vec<i16> = (0..s1 * h).map(|_| rng.gen_range(-4096..20000)).collect();
                let w0 = rng.gen_range(0..=16u8);
                let mut expected = vec![BD::Pixel::default(); sd * h];
                let mut actual = expected.clone();
                distance_weighted_blend_rust(
                    PlaneRef::new(&p0, s0),
                    PlaneRef::new(&p1, s1),
                    w0,
                    16 - w0,
                    w,
                    h,
                    PlaneMut::new(&mut expected, sd),
                    bd,
                );
                tier(
                    PlaneRef::new(&p0, s0),
                    PlaneRef::new(&p1, s1),
                    w0,
                    16 - w0,
                    w,
                    h,
                    PlaneMut::new(&mut actual, sd),
                    bd,
                );
                assert_eq!(actual, expected, "{w}x{h} w0={w0}");
            }
        }
    }

    #[test]
    fn sse41_matches_scalar() {
        if X64V2Token::summon().is_none() {
            eprintln!("Skipping SSE4.1 test - CPU doesn't support it");
            return;
        }
        check_tier(distance_weighted_blend_sse41::<BitDepth8>, BitDepth8, 1);
        check_tier(distance_weighted_blend_sse41::<BitDepth16>, BitDepth16, 2);
    }

    #[test]
    fn avx2_matches_scalar() {
        if Desktop64::summon().is_none() {
            eprintln!("Skipping AVX2 test - CPU doesn't support it");
            return;
        }
        check_tier(distance_weighted_blend_avx2::<BitDepth8>, BitDepth8, 3);
        check_tier(distance_weighted_blend_avx2::<BitDepth16>, BitDepth16, 4);
    }
}
