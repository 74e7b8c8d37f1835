//! Distance-weighted blend for aarch64 NEON.
//!
//! Widening multiply-accumulate into 32 bits, then a rounding saturating
//! narrow by 8 (`vqrshrn`), which is exactly `round2` saturated to i16.

#![forbid(unsafe_code)]

use core::arch::aarch64::*;

use archmage::{arcane, rite, Arm64, SimdToken};

use crate::include::common::bitdepth::BitDepth;
use crate::src::mc::{
    blend_sample, debug_assert_blend_args, distance_weighted_blend_rust,
    DISTANCE_WEIGHTED_BLEND_SHIFT,
};
use crate::src::safe_simd::partial_simd::{vld1_s16_4, vld1q_s16_8, vst1q_s16_8};
use crate::src::safe_simd::pixel_access::{first_array, store_window};
use crate::src::strided::{PlaneMut, PlaneRef};

const BLEND_SHIFT: i32 = DISTANCE_WEIGHTED_BLEND_SHIFT as i32;

#[derive(Clone, Copy)]
struct Weights {
    w0: int16x4_t,
    w1: int16x4_t,
    max: int16x8_t,
}

#[rite]
fn weighted_average_8(_t: Arm64, p0: int16x8_t, p1: int16x8_t, weights: Weights) -> [i16; 8] {
    let lo = vmlal_s16(
        vmull_s16(vget_low_s16(p0), weights.w0),
        vget_low_s16(p1),
        weights.w1,
    );
    let hi = vmlal_s16(
        vmull_s16(vget_high_s16(p0), weights.w0),
        vget_high_s16(p1),
        weights.w1,
    );
    let avg = vcombine_s16(
        vqrshrn_n_s32::<BLEND_SHIFT>(lo),
        vqrshrn_n_s32::<BLEND_SHIFT>(hi),
    );
    let avg = vminq_s16(vmaxq_s16(avg, vdupq_n_s16(0)), weights.max);
    let mut lanes = [0i16; 8];
    vst1q_s16_8(&mut lanes, avg);
    lanes
}

#[rite]
fn load_4x2(_t: Arm64, plane: PlaneRef<'_, i16>, y: usize) -> int16x8_t {
    vcombine_s16(
        vld1_s16_4(first_array(plane.row(y, 4))),
        vld1_s16_4(first_array(plane.row(y + 1, 4))),
    )
}

#[rite]
fn blend_4xh_neon<BD: BitDepth>(
    t: Arm64,
    p0: PlaneRef<'_, i16>,
    p1: PlaneRef<'_, i16>,
    weights: Weights,
    height: usize,
    dst: &mut PlaneMut<'_, BD::Pixel>,
) {
    for y in (0..height).step_by(2) {
        let lanes = weighted_average_8(t, load_4x2(t, p0, y), load_4x2(t, p1, y), weights);
        store_window::<BD>(dst.row_mut(y, 4), &lanes[..4]);
        store_window::<BD>(dst.row_mut(y + 1, 4), &lanes[4..]);
    }
}

#[rite]
fn blend_8xh_neon<BD: BitDepth>(
    t: Arm64,
    p0: PlaneRef<'_, i16>,
    p1: PlaneRef<'_, i16>,
    weights: Weights,
    height: usize,
    dst: &mut PlaneMut<'_, BD::Pixel>,
) {
    for y in (0..height).step_by(2) {
        for row in [y, y + 1] {
            let a = vld1q_s16_8(first_array(p0.row(row, 8)));
            let b = vld1q_s16_8(first_array(p1.row(row, 8)));
            store_window::<BD>(dst.row_mut(row, 8), &weighted_average_8(t, a, b, weights));
        }
    }
}

#[rite]
fn blend_large_neon<BD: BitDepth>(
    t: Arm64,
    p0: PlaneRef<'_, i16>,
    p1: PlaneRef<'_, i16>,
    weight_0: u8,
    weight_1: u8,
    weights: Weights,
    width: usize,
    height: usize,
    dst: &mut PlaneMut<'_, BD::Pixel>,
    bd: BD,
) {
    for y in 0..height {
        let p0 = p0.row(y, width);
        let p1 = p1.row(y, width);
        let dst = dst.row_mut(y, width);
        let mut x = 0;
        while x + 16 <= width {
            for half in [x, x + 8] {
                let a = vld1q_s16_8(first_array(&p0[half..]));
                let b = vld1q_s16_8(first_array(&p1[half..]));
                store_window::<BD>(&mut dst[half..half + 8], &weighted_average_8(t, a, b, weights));
            }
            x += 16;
        }
        for x in x..width {
            dst[x] = blend_sample(p0[x], p1[x], weight_0 as i32, weight_1 as i32, bd);
        }
    }
}

#[arcane]
fn distance_weighted_blend_neon_inner<BD: BitDepth>(
    t: Arm64,
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
    let weights = Weights {
        w0: vdup_n_s16(weight_0 as i16),
        w1: vdup_n_s16(weight_1 as i16),
        max: vdupq_n_s16(bd.bitdepth_max() as i16),
    };
    match width {
        4 => blend_4xh_neon::<BD>(t, prediction_0, prediction_1, weights, height, &mut dst),
        8 => blend_8xh_neon::<BD>(t, prediction_0, prediction_1, weights, height, &mut dst),
        _ => blend_large_neon::<BD>(
            t,
            prediction_0,
            prediction_1,
            weight_0,
            weight_1,
            weights,
            width,
            height,
            &mut dst,
            bd,
        ),
    }
}

pub fn distance_weighted_blend_neon<BD: BitDepth>(
    prediction_0: PlaneRef<'_, i16>,
    prediction_1: PlaneRef<'_, i16>,
    weight_0: u8,
    weight_1: u8,
    width: usize,
    height: usize,
    dst: PlaneMut<'_, BD::Pixel>,
    bd: BD,
) {
    match Arm64::summon() {
        Some(token) => distance_weighted_blend_neon_inner(
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
