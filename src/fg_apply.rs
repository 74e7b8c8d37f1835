//! Film grain application for one horizontal strip of a frame.

use crate::include::common::bitdepth::BitDepth;
use crate::include::dav1d::headers::{ClipRange, FilmGrainParams, Plane};
use crate::src::error::Result;
use crate::src::filmgrain::{chroma_dimensions, NoiseImage, Rav1dFilmGrainDSPContext, ScalingLut};
use crate::src::strided::{PlaneMut, PlaneRef};
use strum::EnumCount;

fn copy_plane<P: Copy>(
    src: PlaneRef<'_, P>,
    mut dst: PlaneMut<'_, P>,
    width: usize,
    height: usize,
) {
    for y in 0..height {
        dst.row_mut(y, width).copy_from_slice(src.row(y, width));
    }
}

/// Applies grain to the luma plane and both chroma planes of a strip.
///
/// `start_height` is the strip's first luma row within the noise image and
/// must be even when chroma is vertically subsampled. Planes without
/// scaling points are copied unchanged. In chroma-from-luma mode both chroma
/// planes are scaled through the luma table.
pub fn apply_film_grain_strip<BD: BitDepth>(
    dsp: &Rav1dFilmGrainDSPContext<BD>,
    params: &FilmGrainParams,
    noise_image: &NoiseImage<BD::Entry>,
    scaling_luts: &[ScalingLut; Plane::COUNT],
    clip: &ClipRange,
    width: usize,
    height: usize,
    start_height: usize,
    subsampling_x: u8,
    subsampling_y: u8,
    src: [PlaneRef<'_, BD::Pixel>; Plane::COUNT],
    dst: [PlaneMut<'_, BD::Pixel>; Plane::COUNT],
    bd: BD,
) -> Result<()> {
    params.validate()?;
    debug_assert!(subsampling_y == 0 || start_height % 2 == 0);

    let [src_y, src_u, src_v] = src;
    let [dst_y, dst_u, dst_v] = dst;

    if params.applies_to(Plane::Y) {
        (dsp.blend_noise_luma)(
            noise_image,
            clip.min,
            clip.max_luma,
            params.chroma_scaling,
            width,
            height,
            start_height,
            &scaling_luts[Plane::Y as usize],
            src_y,
            dst_y,
            bd,
        );
    } else {
        copy_plane(src_y, dst_y, width, height);
    }

    let cfl = params.chroma_scaling_from_luma;
    let (chroma_width, chroma_height) =
        chroma_dimensions(width, height, subsampling_x, subsampling_y);
    for (plane, src, dst) in [(Plane::U, src_u, dst_u), (Plane::V, src_v, dst_v)] {
        if !params.applies_to(plane) {
            copy_plane(src, dst, chroma_width, chroma_height);
            continue;
        }
        let lut = if cfl {
            &scaling_luts[Plane::Y as usize]
        } else {
            &scaling_luts[plane as usize]
        };
        (dsp.blend_noise_chroma[cfl as usize])(
            plane,
            params,
            noise_image,
            clip.min,
            clip.max_chroma,
            width,
            height,
            start_height >> subsampling_y,
            subsampling_x,
            subsampling_y,
            lut,
            src_y,
            src,
            dst,
            bd,
        );
    }
    Ok(())
}
