//! Film grain blending for aarch64 NEON, 8 samples per step.
//!
//! `vqrdmulh` doubles the product before taking the high half, so
//! `vqrdmulh(grain, scaling << (15 - shift))` is the same rounding
//! multiply-high as the x86 `pmulhrsw` form.

#![forbid(unsafe_code)]

use core::arch::aarch64::*;

use archmage::{arcane, rite, Arm64, SimdToken};

use crate::include::common::bitdepth::{BitDepth, BPC};
use crate::include::dav1d::headers::{FilmGrainParams, Plane};
use crate::src::filmgrain::{
    blend_noise_chroma_rust, blend_noise_luma_rust, chroma_dimensions, debug_assert_chroma_params,
    debug_assert_luma_args, NoiseImage, ScalingLut, CHROMA_KEY_SHIFT,
};
use crate::src::safe_simd::partial_simd::{vld1q_s16_8, vst1q_s16_8};
use crate::src::safe_simd::pixel_access::{edge_window, first_array, store_window, zero_window};
use crate::src::strided::{PlaneMut, PlaneRef};

const KEY_SHIFT: i32 = CHROMA_KEY_SHIFT as i32;

/// Fraction bits of a 10-bit key scaled to Q15.
const FRAC_TO_Q15: i32 = 15 - 2;

#[derive(Clone, Copy)]
struct Blend {
    shift: int16x8_t,
    floor: int16x8_t,
    ceiling: int16x8_t,
}

#[rite]
fn scaling_factors_8<BD: BitDepth>(_t: Arm64, lut: &ScalingLut, keys: &[i16; 8]) -> int16x8_t {
    match BD::BPC {
        BPC::BPC8 => vld1q_s16_8(&keys.map(|k| lut[k as usize] as i16)),
        BPC::BPC16 => {
            let index = keys.map(|k| (k >> 2) as usize);
            let start = vld1q_s16_8(&index.map(|i| lut[i] as i16));
            let end = vld1q_s16_8(&index.map(|i| lut[i + 1] as i16));
            let frac = vandq_s16(vld1q_s16_8(keys), vdupq_n_s16(3));
            let frac = vshlq_n_s16::<FRAC_TO_Q15>(frac);
            vaddq_s16(start, vqrdmulhq_s16(vsubq_s16(end, start), frac))
        }
    }
}

#[rite]
fn add_noise_8<BD: BitDepth>(
    t: Arm64,
    orig: &[i16; 8],
    keys: &[i16; 8],
    grain: &[i16; 8],
    lut: &ScalingLut,
    blend: Blend,
) -> [i16; 8] {
    let scaling = vshlq_s16(scaling_factors_8::<BD>(t, lut, keys), blend.shift);
    let noise = vqrdmulhq_s16(vld1q_s16_8(grain), scaling);
    let v = vaddq_s16(vld1q_s16_8(orig), noise);
    let v = vminq_s16(vmaxq_s16(v, blend.floor), blend.ceiling);
    let mut lanes = [0i16; 8];
    vst1q_s16_8(&mut lanes, v);
    lanes
}

#[rite]
fn average_luma_8<P: Copy + Into<i32>>(
    _t: Arm64,
    luma: &[P],
    x: usize,
    subsampling_x: u8,
) -> int16x8_t {
    if subsampling_x == 0 {
        let window: [i16; 8] = edge_window(&luma[x..]);
        return vld1q_s16_8(&window);
    }
    let window: [i16; 16] = edge_window(&luma[x << 1..]);
    let sum = vpaddq_s16(
        vld1q_s16_8(first_array(&window[..8])),
        vld1q_s16_8(first_array(&window[8..])),
    );
    vrshrq_n_s16::<1>(sum)
}

#[rite]
fn direct_keys_8(
    _t: Arm64,
    avg: int16x8_t,
    orig: int16x8_t,
    luma_multiplier: int16x4_t,
    multiplier: int16x4_t,
    offset: int16x8_t,
    pixel_max: int16x8_t,
) -> int16x8_t {
    let lo = vmlal_s16(
        vmull_s16(vget_low_s16(avg), luma_multiplier),
        vget_low_s16(orig),
        multiplier,
    );
    let hi = vmlal_s16(
        vmull_s16(vget_high_s16(avg), luma_multiplier),
        vget_high_s16(orig),
        multiplier,
    );
    let merged = vcombine_s16(
        vqmovn_s32(vshrq_n_s32::<KEY_SHIFT>(lo)),
        vqmovn_s32(vshrq_n_s32::<KEY_SHIFT>(hi)),
    );
    let merged = vaddq_s16(merged, offset);
    vminq_s16(vmaxq_s16(merged, vdupq_n_s16(0)), pixel_max)
}

#[arcane]
fn blend_noise_luma_neon_inner<BD: BitDepth>(
    t: Arm64,
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
        shift: vdupq_n_s16(15 - scaling_shift as i16),
        floor: vdupq_n_s16(min_value as i16),
        ceiling: vdupq_n_s16(max_luma as i16),
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
fn blend_noise_chroma_neon_inner<BD: BitDepth, const CFL: bool>(
    t: Arm64,
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
        shift: vdupq_n_s16(15 - params.chroma_scaling as i16),
        floor: vdupq_n_s16(min_value as i16),
        ceiling: vdupq_n_s16(max_chroma as i16),
    };
    let luma_multiplier = vdup_n_s16(params.luma_multiplier(plane) as i16);
    let multiplier = vdup_n_s16(params.multiplier(plane) as i16);
    let offset = vdupq_n_s16((params.offset(plane) << (BD::BITDEPTH - 8)) as i16);
    let pixel_max = vdupq_n_s16(bd.bitdepth_max() as i16);

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
                direct_keys_8(
                    t,
                    avg,
                    vld1q_s16_8(&orig),
                    luma_multiplier,
                    multiplier,
                    offset,
                    pixel_max,
                )
            };
            let mut key_lanes = [0i16; 8];
            vst1q_s16_8(&mut key_lanes, keys);
            let grain: [i16; 8] = zero_window(&grain[x..]);
            let lanes = add_noise_8::<BD>(t, &orig, &key_lanes, &grain, scaling_lut, blend);
            store_window::<BD>(&mut dst[x..chroma_width.min(x + 8)], &lanes);
        }
    }
}

pub fn blend_noise_luma_neon<BD: BitDepth>(
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
    match Arm64::summon() {
        Some(token) => blend_noise_luma_neon_inner::<BD>(
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

pub fn blend_noise_chroma_neon<BD: BitDepth, const CFL: bool>(
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
    match Arm64::summon() {
        Some(token) => blend_noise_chroma_neon_inner::<BD, CFL>(
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
