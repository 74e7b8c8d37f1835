//! Film grain blending for x86_64 (SSE4.1 and AVX2).
//!
//! Rows are processed 8 (SSE4.1) or 16 (AVX2) samples at a time. The ragged
//! right edge goes through the same vector path on a padded window: the
//! last valid sample is replicated so scaling lookups stay in range, and
//! only lanes inside the row are stored.
//!
//! Scaling uses the rounding multiply-high form
//! `mulhrs(grain, scaling << (15 - scaling_shift))`, which equals
//! `round2(scaling * grain, scaling_shift)`.

#![forbid(unsafe_code)]

use core::arch::x86_64::*;

use archmage::{arcane, rite, Desktop64, SimdToken, X64V2Token};

use crate::include::common::bitdepth::{BitDepth, BPC};
use crate::include::dav1d::headers::{FilmGrainParams, Plane};
use crate::src::filmgrain::{
    blend_noise_chroma_rust, blend_noise_luma_rust, chroma_dimensions, debug_assert_chroma_params,
    debug_assert_luma_args, NoiseImage, ScalingLut, CHROMA_KEY_SHIFT,
};
use crate::src::safe_simd::partial_simd::{
    mm256_loadu_si256, mm256_storeu_si256, mm_loadu_si128, mm_storeu_si128,
};
use crate::src::safe_simd::pixel_access::{edge_window, first_array, store_window, zero_window};
use crate::src::strided::{PlaneMut, PlaneRef};

const KEY_SHIFT: i32 = CHROMA_KEY_SHIFT as i32;

/// Fraction bits of a 10-bit key scaled to Q15 for `mulhrs`.
const FRAC_TO_Q15: i32 = 15 - 2;

#[inline(always)]
fn packed_multipliers(params: &FilmGrainParams, plane: Plane) -> i32 {
    params.multiplier(plane) << 16 | (params.luma_multiplier(plane) & 0xffff)
}

#[inline(always)]
fn scaled_offset<BD: BitDepth>(params: &FilmGrainParams, plane: Plane) -> i16 {
    (params.offset(plane) << (BD::BITDEPTH - 8)) as i16
}

/// Constants shared by every step of one call.
#[derive(Clone, Copy)]
struct Blend<V> {
    shift: __m128i,
    floor: V,
    ceiling: V,
}

// ============================================================================
// SSE4.1
// ============================================================================

#[rite]
fn scaling_factors_8<BD: BitDepth>(_t: X64V2Token, lut: &ScalingLut, keys: &[i16; 8]) -> __m128i {
    match BD::BPC {
        BPC::BPC8 => mm_loadu_si128(&keys.map(|k| lut[k as usize] as i16)),
        BPC::BPC16 => {
            let index = keys.map(|k| (k >> 2) as usize);
            let start = mm_loadu_si128(&index.map(|i| lut[i] as i16));
            let end = mm_loadu_si128(&index.map(|i| lut[i + 1] as i16));
            let frac = _mm_and_si128(mm_loadu_si128(keys), _mm_set1_epi16(3));
            let frac = _mm_slli_epi16::<FRAC_TO_Q15>(frac);
            _mm_add_epi16(start, _mm_mulhrs_epi16(_mm_sub_epi16(end, start), frac))
        }
    }
}

#[rite]
fn add_noise_8<BD: BitDepth>(
    t: X64V2Token,
    orig: &[i16; 8],
    keys: &[i16; 8],
    grain: &[i16; 8],
    lut: &ScalingLut,
    blend: Blend<__m128i>,
) -> [i16; 8] {
    let scaling = _mm_sll_epi16(scaling_factors_8::<BD>(t, lut, keys), blend.shift);
    let noise = _mm_mulhrs_epi16(mm_loadu_si128(grain), scaling);
    let v = _mm_add_epi16(mm_loadu_si128(orig), noise);
    let v = _mm_min_epi16(_mm_max_epi16(v, blend.floor), blend.ceiling);
    let mut lanes = [0i16; 8];
    mm_storeu_si128(&mut lanes, v);
    lanes
}

/// Luma keys for chroma columns `x..x + 8`.
#[rite]
fn average_luma_8<P: Copy + Into<i32>>(
    _t: X64V2Token,
    luma: &[P],
    x: usize,
    subsampling_x: u8,
) -> __m128i {
    if subsampling_x == 0 {
        let window: [i16; 8] = edge_window(&luma[x..]);
        return mm_loadu_si128(&window);
    }
    let window: [i16; 16] = edge_window(&luma[x << 1..]);
    let lo = mm_loadu_si128(first_array(&window[..8]));
    let hi = mm_loadu_si128(first_array(&window[8..]));
    let sum = _mm_hadd_epi16(lo, hi);
    _mm_srli_epi16::<1>(_mm_add_epi16(sum, _mm_set1_epi16(1)))
}

/// `clip(((avg * luma_multiplier + orig * multiplier) >> 6) + offset)`
#[rite]
fn direct_keys_8(
    _t: X64V2Token,
    avg: __m128i,
    orig: __m128i,
    multipliers: __m128i,
    offset: __m128i,
    pixel_max: __m128i,
) -> __m128i {
    let lo = _mm_madd_epi16(_mm_unpacklo_epi16(avg, orig), multipliers);
    let hi = _mm_madd_epi16(_mm_unpackhi_epi16(avg, orig), multipliers);
    let merged = _mm_packs_epi32(
        _mm_srai_epi32::<KEY_SHIFT>(lo),
        _mm_srai_epi32::<KEY_SHIFT>(hi),
    );
    let merged = _mm_add_epi16(merged, offset);
    _mm_min_epi16(_mm_max_epi16(merged, _mm_setzero_si128()), pixel_max)
}

#[arcane]
fn blend_noise_luma_sse41_inner<BD: BitDepth>(
    t: X64V2Token,
    noise_image: &NoiseImage<BD::Entry>,
    min_value: i32,
    max_luma: i32,
    scaling_shift: u8,
    width: usize,
    height: usize,
    start_height: usize,
    scaling_lut_y: &ScalingLut,
    src: PlaneRef<'_, BD::Pixel>,
    mut dst: PlaneMut<'_, BD::Pixel>,
) {
    let noise = &noise_image[Plane::Y as usize];
    debug_assert_luma_args(noise, scaling_shift, width, height, start_height);
    let blend = Blend {
        shift: _mm_cvtsi32_si128(15 - scaling_shift as i32),
        floor: _mm_set1_epi16(min_value as i16),
        ceiling: _mm_set1_epi16(max_luma as i16),
    };
    for y in 0..height {
        let src = src.row(y, width);
        let grain = &noise.row(start_height + y)[..width];
        let dst = dst.row_mut(y, width);
        for x in (0..width).step_by(8) {
            let orig: [i16; 8] = edge_window(&src[x..]);
            let grain: [i16; 8] = zero_window(&grain[x..]);
            let lanes = add_noise_8::<BD>(t, &orig, &orig, &grain, scaling_lut_y, blend);
            store_window::<BD>(&mut dst[x..width.min(x + 8)], &lanes);
        }
    }
}

#[arcane]
fn blend_noise_chroma_sse41_inner<BD: BitDepth, const CFL: bool>(
    t: X64V2Token,
    plane: Plane,
    params: &FilmGrainParams,
    noise_image: &NoiseImage<BD::Entry>,
    min_value: i32,
    max_chroma: i32,
    width: usize,
    height: usize,
    start_row: usize,
    subsampling_x: u8,
    subsampling_y: u8,
    scaling_lut: &ScalingLut,
    luma: PlaneRef<'_, BD::Pixel>,
    src: PlaneRef<'_, BD::Pixel>,
    mut dst: PlaneMut<'_, BD::Pixel>,
    bd: BD,
) {
    let (chroma_width, chroma_height) =
        chroma_dimensions(width, height, subsampling_x, subsampling_y);
    let noise = &noise_image[plane as usize];
    debug_assert_luma_args(noise, params.chroma_scaling, chroma_width, chroma_height, start_row);
    debug_assert_chroma_params(params, plane);
    let blend = Blend {
        shift: _mm_cvtsi32_si128(15 - params.chroma_scaling as i32),
        floor: _mm_set1_epi16(min_value as i16),
        ceiling: _mm_set1_epi16(max_chroma as i16),
    };
    let multipliers = _mm_set1_epi32(packed_multipliers(params, plane));
    let offset = _mm_set1_epi16(scaled_offset::<BD>(params, plane));
    let pixel_max = _mm_set1_epi16(bd.bitdepth_max() as i16);

    for y in 0..chroma_height {
        let luma = luma.row(y << subsampling_y, width);
        let src = src.row(y, chroma_width);
        let grain = &noise.row(start_row + y)[..chroma_width];
        let dst = dst.row_mut(y, chroma_width);
        for x in (0..chroma_width).step_by(8) {
            let avg = average_luma_8(t, luma, x, subsampling_x);
            let orig: [i16; 8] = edge_window(&src[x..]);
            let keys = if CFL {
                avg
            } else {
                direct_keys_8(t, avg, mm_loadu_si128(&orig), multipliers, offset, pixel_max)
            };
            let mut key_lanes = [0i16; 8];
            mm_storeu_si128(&mut key_lanes, keys);
            let grain: [i16; 8] = zero_window(&grain[x..]);
            let lanes = add_noise_8::<BD>(t, &orig, &key_lanes, &grain, scaling_lut, blend);
            store_window::<BD>(&mut dst[x..chroma_width.min(x + 8)], &lanes);
        }
    }
}

pub fn blend_noise_luma_sse41<BD: BitDepth>(
    noise_image: &NoiseImage<BD::Entry>,
    min_value: i32,
    max_luma: i32,
    scaling_shift: u8,
    width: usize,
    height: usize,
    start_height: usize,
    scaling_lut_y: &ScalingLut,
    src: PlaneRef<'_, BD::Pixel>,
    dst: PlaneMut<'_, BD::Pixel>,
    bd: BD,
) {
    match X64V2Token::summon() {
        Some(token) => blend_noise_luma_sse41_inner::<BD>(
            token,
            noise_image,
            min_value,
            max_luma,
            scaling_shift,
            width,
            height,
            start_height,
            scaling_lut_y,
            src,
            dst,
        ),
        None => blend_noise_luma_rust(
            noise_image,
            min_value,
            max_luma,
            scaling_shift,
            width,
            height,
            start_height,
            scaling_lut_y,
            src,
            dst,
            bd,
        ),
    }
}

pub fn blend_noise_chroma_sse41<BD: BitDepth, const CFL: bool>(
    plane: Plane,
    params: &FilmGrainParams,
    noise_image: &NoiseImage<BD::Entry>,
    min_value: i32,
    max_chroma: i32,
    width: usize,
    height: usize,
    start_row: usize,
    subsampling_x: u8,
    subsampling_y: u8,
    scaling_lut: &ScalingLut,
    luma: PlaneRef<'_, BD::Pixel>,
    src: PlaneRef<'_, BD::Pixel>,
    dst: PlaneMut<'_, BD::Pixel>,
    bd: BD,
) {
    match X64V2Token::summon() {
        Some(token) => blend_noise_chroma_sse41_inner::<BD, CFL>(
            token,
            plane,
            params,
            noise_image,
            min_value,
            max_chroma,
            width,
            height,
            start_row,
            subsampling_x,
            subsampling_y,
            scaling_lut,
            luma,
            src,
            dst,
            bd,
        ),
        None => blend_noise_chroma_rust::<BD, CFL>(
            plane,
            params,
            noise_image,
            min_value,
            max_chroma,
            width,
            height,
            start_row,
            subsampling_x,
            subsampling_y,
            scaling_lut,
            luma,
            src,
            dst,
            bd,
        ),
    }
}

// ============================================================================
// AVX2
// ============================================================================

#[rite]
fn scaling_factors_16<BD: BitDepth>(_t: Desktop64, lut: &ScalingLut, keys: &[i16; 16]) -> __m256i {
    match BD::BPC {
        BPC::BPC8 => mm256_loadu_si256(&keys.map(|k| lut[k as usize] as i16)),
        BPC::BPC16 => {
            let index = keys.map(|k| (k >> 2) as usize);
            let start = mm256_loadu_si256(&index.map(|i| lut[i] as i16));
            let end = mm256_loadu_si256(&index.map(|i| lut[i + 1] as i16));
            let frac = _mm256_and_si256(mm256_loadu_si256(keys), _mm256_set1_epi16(3));
            let frac = _mm256_slli_epi16::<FRAC_TO_Q15>(frac);
            _mm256_add_epi16(start, _mm256_mulhrs_epi16(_mm256_sub_epi16(end, start), frac))
        }
    }
}

#[rite]
fn add_noise_16<BD: BitDepth>(
    t: Desktop64,
    orig: &[i16; 16],
    keys: &[i16; 16],
    grain: &[i16; 16],
    lut: &ScalingLut,
    blend: Blend<__m256i>,
) -> [i16; 16] {
    let scaling = _mm256_sll_epi16(scaling_factors_16::<BD>(t, lut, keys), blend.shift);
    let noise = _mm256_mulhrs_epi16(mm256_loadu_si256(grain), scaling);
    let v = _mm256_add_epi16(mm256_loadu_si256(orig), noise);
    let v = _mm256_min_epi16(_mm256_max_epi16(v, blend.floor), blend.ceiling);
    let mut lanes = [0i16; 16];
    mm256_storeu_si256(&mut lanes, v);
    lanes
}

#[rite]
fn average_luma_16<P: Copy + Into<i32>>(
    _t: Desktop64,
    luma: &[P],
    x: usize,
    subsampling_x: u8,
) -> __m256i {
    if subsampling_x == 0 {
        let window: [i16; 16] = edge_window(&luma[x..]);
        return mm256_loadu_si256(&window);
    }
    let window: [i16; 32] = edge_window(&luma[x << 1..]);
    let lo = mm256_loadu_si256(first_array(&window[..16]));
    let hi = mm256_loadu_si256(first_array(&window[16..]));
    // hadd works per 128-bit lane; restore column order across lanes.
    let sum = _mm256_permute4x64_epi64::<0b11_01_10_00>(_mm256_hadd_epi16(lo, hi));
    _mm256_srli_epi16::<1>(_mm256_add_epi16(sum, _mm256_set1_epi16(1)))
}

#[rite]
fn direct_keys_16(
    _t: Desktop64,
    avg: __m256i,
    orig: __m256i,
    multipliers: __m256i,
    offset: __m256i,
    pixel_max: __m256i,
) -> __m256i {
    let lo = _mm256_madd_epi16(_mm256_unpacklo_epi16(avg, orig), multipliers);
    let hi = _mm256_madd_epi16(_mm256_unpackhi_epi16(avg, orig), multipliers);
    let merged = _mm256_packs_epi32(
        _mm256_srai_epi32::<KEY_SHIFT>(lo),
        _mm256_srai_epi32::<KEY_SHIFT>(hi),
    );
    let merged = _mm256_add_epi16(merged, offset);
    _mm256_min_epi16(_mm256_max_epi16(merged, _mm256_setzero_si256()), pixel_max)
}

#[arcane]
fn blend_noise_luma_avx2_inner<BD: BitDepth>(
    t: Desktop64,
    noise_image: &NoiseImage<BD::Entry>,
    min_value: i32,
    max_luma: i32,
    scaling_shift: u8,
    width: usize,
    height: usize,
    start_height: usize,
    scaling_lut_y: &ScalingLut,
    src: PlaneRef<'_, BD::Pixel>,
    mut dst: PlaneMut<'_, BD::Pixel>,
) {
    let noise = &noise_image[Plane::Y as usize];
    debug_assert_luma_args(noise, scaling_shift, width, height, start_height);
    let blend = Blend {
        shift: _mm_cvtsi32_si128(15 - scaling_shift as i32),
        floor: _mm256_set1_epi16(min_value as i16),
        ceiling: _mm256_set1_epi16(max_luma as i16),
    };
    for y in 0..height {
        let src = src.row(y, width);
        let grain = &noise.row(start_height + y)[..width];
        let dst = dst.row_mut(y, width);
        for x in (0..width).step_by(16) {
            let orig: [i16; 16] = edge_window(&src[x..]);
            let grain: [i16; 16] = zero_window(&grain[x..]);
            let lanes = add_noise_16::<BD>(t, &orig, &orig, &grain, scaling_lut_y, blend);
            store_window::<BD>(&mut dst[x..width.min(x + 16)], &lanes);
        }
    }
}

#[arcane]
fn blend_noise_chroma_avx2_inner<BD: BitDepth, const CFL: bool>(
    t: Desktop64,
    plane: Plane,
    params: &FilmGrainParams,
    noise_image: &NoiseImage<BD::Entry>,
    min_value: i32,
    max_chroma: i32,
    width: usize,
    height: usize,
    start_row: usize,
    subsampling_x: u8,
    subsampling_y: u8,
    scaling_lut: &ScalingLut,
    luma: PlaneRef<'_, BD::Pixel>,
    src: PlaneRef<'_, BD::Pixel>,
    mut dst: PlaneMut<'_, BD::Pixel>,
    bd: BD,
) {
    let (chroma_width, chroma_height) =
        chroma_dimensions(width, height, subsampling_x, subsampling_y);
    let noise = &noise_image[plane as usize];
    debug_assert_luma_args(noise, params.chroma_scaling, chroma_width, chroma_height, start_row);
    debug_assert_chroma_params(params, plane);
    let blend = Blend {
        shift: _mm_cvtsi32_si128(15 - params.chroma_scaling as i32),
        floor: _mm256_set1_epi16(min_value as i16),
        ceiling: _mm256_set1_epi16(max_chroma as i16),
    };
    let multipliers = _mm256_set1_epi32(packed_multipliers(params, plane));
    let offset = _mm256_set1_epi16(scaled_offset::<BD>(params, plane));
    let pixel_max = _mm256_set1_epi16(bd.bitdepth_max() as i16);

    for y in 0..chroma_height {
        let luma = luma.row(y << subsampling_y, width);
        let src = src.row(y, chroma_width);
        let grain = &noise.row(start_row + y)[..chroma_width];
        let dst = dst.row_mut(y, chroma_width);
        for x in (0..chroma_width).step_by(16) {
            let avg = average_luma_16(t, luma, x, subsampling_x);
            let orig: [i16; 16] = edge_window(&src[x..]);
            let keys = if CFL {
                avg
            } else {
                direct_keys_16(t, avg, mm256_loadu_si256(&orig), multipliers, offset, pixel_max)
            };
            let mut key_lanes = [0i16; 16];
            mm256_storeu_si256(&mut key_lanes, keys);
            let grain: [i16; 16] = zero_window(&grain[x..]);
            let lanes = add_noise_16::<BD>(t, &orig, &key_lanes, &grain, scaling_lut, blend);
            store_window::<BD>(&mut dst[x..chroma_width.min(x + 16)], &lanes);
        }
    }
}

pub fn blend_noise_luma_avx2<BD: BitDepth>(
    noise_image: &NoiseImage<BD::Entry>,
    min_value: i32,
    max_luma: i32,
    scaling_shift: u8,
    width: usize,
    height: usize,
    start_height: usize,
    scaling_lut_y: &ScalingLut,
    src: PlaneRef<'_, BD::Pixel>,
    dst: PlaneMut<'_, BD::Pixel>,
    bd: BD,
) {
    match Desktop64::summon() {
        Some(token) => blend_noise_luma_avx2_inner::<BD>(
            token,
            noise_image,
            min_value,
            max_luma,
            scaling_shift,
            width,
            height,
            start_height,
            scaling_lut_y,
            src,
            dst,
        ),
        None => blend_noise_luma_sse41(
            noise_image,
            min_value,
            max_luma,
            scaling_shift,
            width,
            height,
            start_height,
            scaling_lut_y,
            src,
            dst,
            bd,
        ),
    }
}

pub fn blend_noise_chroma_avx2<BD: BitDepth, const CFL: bool>(
    plane: Plane,
    params: &FilmGrainParams,
    noise_image: &NoiseImage<BD::Entry>,
    min_value: i32,
    max_chroma: i32,
    width: usize,
    height: usize,
    start_row: usize,
    subsampling_x: u8,
    subsampling_y: u8,
    scaling_lut: &ScalingLut,
    luma: PlaneRef<'_, BD::Pixel>,
    src: PlaneRef<'_, BD::Pixel>,
    dst: PlaneMut<'_, BD::Pixel>,
    bd: BD,
) {
    match Desktop64::summon() {
        Some(token) => blend_noise_chroma_avx2_inner::<BD, CFL>(
            token,
            plane,
            params,
            noise_image,
            min_value,
            max_chroma,
            width,
            height,
            start_row,
            subsampling_x,
            subsampling_y,
            scaling_lut,
            luma,
            src,
            dst,
            bd,
        ),
        None => blend_noise_chroma_sse41::<BD, CFL>(
            plane,
            params,
            noise_image,
            min_value,
            max_chroma,
            width,
            height,
            start_row,
            subsampling_x,
            subsampling_y,
            scaling_lut,
            luma,
            src,
            dst,
            bd,
        ),
    }
}
