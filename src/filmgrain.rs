//! Film grain blending: adds a precomputed noise image to reconstructed
//! samples, scaled by a piecewise-linear function of intensity.

use crate::include::common::bitdepth::{BitDepth, BPC};
use crate::include::common::intops::{iclip, round2};
use crate::include::dav1d::headers::{
    FilmGrainParams, Plane, CHROMA_MULTIPLIER_RANGE, CHROMA_OFFSET_RANGE,
};
use crate::src::cpu::CpuFlags;
use crate::src::error::{Error, Result};
use crate::src::strided::{PlaneMut, PlaneRef};
use strum::EnumCount;

pub const SCALING_LOOKUP_TABLE_SIZE: usize = 256;

/// Guard entry past the last index, read by high bit depth interpolation.
pub const SCALING_LOOKUP_TABLE_PADDING: usize = 1;

pub type ScalingLut = [u8; SCALING_LOOKUP_TABLE_SIZE + SCALING_LOOKUP_TABLE_PADDING];

/// Bits shifted off the combined luma/chroma key in the direct chroma mode.
pub const CHROMA_KEY_SHIFT: u8 = 6;

/// Checks the length of an externally built scaling table.
pub fn scaling_lut_from_slice(lut: &[u8]) -> Result<&ScalingLut> {
    lut.try_into().map_err(|_| Error::ScalingLutLength {
        expected: SCALING_LOOKUP_TABLE_SIZE + SCALING_LOOKUP_TABLE_PADDING,
        actual: lut.len(),
    })
}

/// Row-major 2-D array.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Array2D<T> {
    data: Vec<T>,
    rows: usize,
    columns: usize,
}

impl<T: Copy + Default> Array2D<T> {
    pub fn new(rows: usize, columns: usize) -> Self {
        Self {
            data: vec![T::default(); rows * columns],
            rows,
            columns,
        }
    }

    pub fn from_vec(rows: usize, columns: usize, data: Vec<T>) -> Result<Self> {
        if data.len() != rows * columns {
            return Err(Error::NoiseImageShape {
                rows,
                columns,
                len: data.len(),
            });
        }
        Ok(Self {
            data,
            rows,
            columns,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    #[inline]
    pub fn row(&self, y: usize) -> &[T] {
        &self.data[y * self.columns..][..self.columns]
    }

    #[inline]
    pub fn row_mut(&mut self, y: usize) -> &mut [T] {
        &mut self.data[y * self.columns..][..self.columns]
    }
}

/// One noise array per plane, indexed by [`Plane`].
pub type NoiseImage<E> = [Array2D<E>; Plane::COUNT];

/// Scaling factor for one sample value.
///
/// At 8 bits the table is indexed directly. Above that, the low bits
/// interpolate between an entry and its successor, which is why the table
/// carries a guard entry.
#[inline]
pub fn get_scaling_factor<BD: BitDepth>(lut: &ScalingLut, value: i32) -> i32 {
    match BD::BPC {
        BPC::BPC8 => lut[value as usize] as i32,
        BPC::BPC16 => {
            let shift = BD::BITDEPTH - 8;
            let index = (value >> shift) as usize;
            let frac = value & ((1 << shift) - 1);
            let start = lut[index] as i32;
            let end = lut[index + 1] as i32;
            start + round2((end - start) * frac, shift)
        }
    }
}

/// `round2(scale * grain, scaling_shift)`; the vector forms compute the same
/// as a rounding multiply-high of `grain` by `scale << (15 - scaling_shift)`.
#[inline]
pub(crate) fn scale_noise(scale: i32, grain: i32, scaling_shift: u8) -> i32 {
    round2(scale * grain, scaling_shift)
}

/// Luma key for chroma column `x`. With horizontal subsampling this is the
/// rounded mean of the two co-located samples; the right neighbour is
/// clamped to the last valid column.
#[inline]
pub(crate) fn average_luma<P: Copy + Into<i32>>(
    luma_row: &[P],
    x: usize,
    subsampling_x: u8,
) -> i32 {
    if subsampling_x == 0 {
        return luma_row[x].into();
    }
    let luma_x = x << 1;
    let next = (luma_x + 1).min(luma_row.len() - 1);
    (luma_row[luma_x].into() + luma_row[next].into() + 1) >> 1
}

#[inline]
pub(crate) fn chroma_dimensions(
    width: usize,
    height: usize,
    subsampling_x: u8,
    subsampling_y: u8,
) -> (usize, usize) {
    (
        (width + subsampling_x as usize) >> subsampling_x,
        (height + subsampling_y as usize) >> subsampling_y,
    )
}

pub type BlendNoiseLumaFn<BD> = fn(
    &NoiseImage<<BD as BitDepth>::Entry>,
    i32,
    i32,
    u8,
    usize,
    usize,
    usize,
    &ScalingLut,
    PlaneRef<'_, <BD as BitDepth>::Pixel>,
    PlaneMut<'_, <BD as BitDepth>::Pixel>,
    BD,
);

pub type BlendNoiseChromaFn<BD> = fn(
    Plane,
    &FilmGrainParams,
    &NoiseImage<<BD as BitDepth>::Entry>,
    i32,
    i32,
    usize,
    usize,
    usize,
    u8,
    u8,
    &ScalingLut,
    PlaneRef<'_, <BD as BitDepth>::Pixel>,
    PlaneRef<'_, <BD as BitDepth>::Pixel>,
    PlaneMut<'_, <BD as BitDepth>::Pixel>,
    BD,
);

pub(crate) fn debug_assert_luma_args<E>(
    noise: &Array2D<E>,
    scaling_shift: u8,
    width: usize,
    height: usize,
    start_height: usize,
) {
    debug_assert!((8..=11).contains(&scaling_shift), "scaling shift {scaling_shift}");
    debug_assert!(noise.rows >= start_height + height, "noise image too short");
    debug_assert!(noise.columns >= width, "noise image too narrow");
}

pub(crate) fn debug_assert_chroma_params(params: &FilmGrainParams, plane: Plane) {
    debug_assert!(plane.is_chroma());
    debug_assert!(
        CHROMA_MULTIPLIER_RANGE.contains(&params.multiplier(plane))
            && CHROMA_MULTIPLIER_RANGE.contains(&params.luma_multiplier(plane)),
        "chroma multipliers out of range"
    );
    debug_assert!(
        CHROMA_OFFSET_RANGE.contains(&params.offset(plane)),
        "chroma offset out of range"
    );
}

/// Baseline luma blend.
///
/// `start_height` selects the first noise row; only `[0, width)` of each
/// destination row is written.
pub(crate) fn blend_noise_luma_rust<BD: BitDepth>(
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
    _bd: BD,
) {
    let noise = &noise_image[Plane::Y as usize];
    debug_assert_luma_args(noise, scaling_shift, width, height, start_height);
    for y in 0..height {
        let src = src.row(y, width);
        let grain = &noise.row(start_height + y)[..width];
        let dst = dst.row_mut(y, width);
        for x in 0..width {
            let orig = src[x].into();
            let scale = get_scaling_factor::<BD>(scaling_lut_y, orig);
            let noise = scale_noise(scale, grain[x].into(), scaling_shift);
            dst[x] = BD::pixel_from(iclip(orig + noise, min_value, max_luma));
        }
    }
}

/// Baseline chroma blend for both modes.
///
/// With `CFL` the scaling key is the co-located luma average; otherwise it is
/// `((luma * luma_multiplier + chroma * multiplier) >> 6) + offset`, clamped
/// to the pixel range. `start_row` is already in chroma rows.
pub(crate) fn blend_noise_chroma_rust<BD: BitDepth, const CFL: bool>(
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
    debug_assert_chroma_params(params, plane);
    let (chroma_width, chroma_height) =
        chroma_dimensions(width, height, subsampling_x, subsampling_y);
    let noise = &noise_image[plane as usize];
    let scaling_shift = params.chroma_scaling;
    debug_assert_luma_args(noise, scaling_shift, chroma_width, chroma_height, start_row);

    let luma_multiplier = params.luma_multiplier(plane);
    let multiplier = params.multiplier(plane);
    let offset = params.offset(plane) << (BD::BITDEPTH - 8);

    for y in 0..chroma_height {
        let luma = luma.row(y << subsampling_y, width);
        let src = src.row(y, chroma_width);
        let grain = &noise.row(start_row + y)[..chroma_width];
        let dst = dst.row_mut(y, chroma_width);
        for x in 0..chroma_width {
            let avg = average_luma(luma, x, subsampling_x);
            let orig = src[x].into();
            let key = if CFL {
                avg
            } else {
                let combined = avg * luma_multiplier + orig * multiplier;
                iclip((combined >> CHROMA_KEY_SHIFT) + offset, 0, bd.bitdepth_max())
            };
            let scale = get_scaling_factor::<BD>(scaling_lut, key);
            let noise = scale_noise(scale, grain[x].into(), scaling_shift);
            dst[x] = BD::pixel_from(iclip(orig + noise, min_value, max_chroma));
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Rav1dFilmGrainDSPContext<BD: BitDepth> {
    pub blend_noise_luma: BlendNoiseLumaFn<BD>,
    /// Indexed by `chroma_scaling_from_luma as usize`.
    pub blend_noise_chroma: [BlendNoiseChromaFn<BD>; 2],
}

impl<BD: BitDepth> Rav1dFilmGrainDSPContext<BD> {
    pub const fn default() -> Self {
        Self {
            blend_noise_luma: blend_noise_luma_rust::<BD>,
            blend_noise_chroma: [
                blend_noise_chroma_rust::<BD, false>,
                blend_noise_chroma_rust::<BD, true>,
            ],
        }
    }

    #[cfg(target_arch = "x86_64")]
    const fn init_sse41(mut self, flags: CpuFlags) -> Self {
        use crate::src::safe_simd::filmgrain;

        if !flags.contains(CpuFlags::SSE41) {
            return self;
        }

        self.blend_noise_luma = filmgrain::blend_noise_luma_sse41::<BD>;
        self.blend_noise_chroma = [
            filmgrain::blend_noise_chroma_sse41::<BD, false>,
            filmgrain::blend_noise_chroma_sse41::<BD, true>,
        ];
        self
    }

    #[cfg(not(target_arch = "x86_64"))]
    const fn init_sse41(self, _flags: CpuFlags) -> Self {
        self
    }

    #[cfg(target_arch = "x86_64")]
    const fn init_avx2(mut self, flags: CpuFlags) -> Self {
        use crate::src::safe_simd::filmgrain;

        if !flags.contains(CpuFlags::AVX2) {
            return self;
        }

        self.blend_noise_luma = filmgrain::blend_noise_luma_avx2::<BD>;
        self.blend_noise_chroma = [
            filmgrain::blend_noise_chroma_avx2::<BD, false>,
            filmgrain::blend_noise_chroma_avx2::<BD, true>,
        ];
        self
    }

    #[cfg(not(target_arch = "x86_64"))]
    const fn init_avx2(self, _flags: CpuFlags) -> Self {
        self
    }

    #[cfg(target_arch = "aarch64")]
    const fn init_neon(mut self, flags: CpuFlags) -> Self {
        use crate::src::safe_simd::filmgrain_arm;

        if !flags.contains(CpuFlags::NEON) {
            return self;
        }

        self.blend_noise_luma = filmgrain_arm::blend_noise_luma_neon::<BD>;
        self.blend_noise_chroma = [
            filmgrain_arm::blend_noise_chroma_neon::<BD, false>,
            filmgrain_arm::blend_noise_chroma_neon::<BD, true>,
        ];
        self
    }

    #[cfg(not(target_arch = "aarch64"))]
    const fn init_neon(self, _flags: CpuFlags) -> Self {
        self
    }

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

    fn noise_image<E: Copy + Default>(rows: usize, columns: usize) -> NoiseImage<E> {
        [
            Array2D::new(rows, columns),
            Array2D::new(rows, columns),
            Array2D::new(rows, columns),
        ]
    }

    fn monotone_lut(rng: &mut StdRng) -> ScalingLut {
        let mut lut = [0u8; 257];
        let mut v = 0u8;
        for entry in lut.iter_mut() {
            v = v.saturating_add(rng.gen_range(0..3));
            *entry = v;
        }
        lut
    }

    #[test]
    fn lut_length_is_checked() {
        let lut = vec![7u8; 257];
        assert_eq!(scaling_lut_from_slice(&lut).map(|lut| lut[256]), Ok(7));
        assert_eq!(
            scaling_lut_from_slice(&lut[..256]),
            Err(Error::ScalingLutLength {
                expected: 257,
                actual: 256
            })
        );
    }

    #[test]
    fn array2d_shape_is_checked() {
        assert!(Array2D::from_vec(2, 3, vec![0i8; 6]).is_ok());
        assert_eq!(
            Array2D::from_vec(2, 3, vec![0i8; 5]),
            Err(Error::NoiseImageShape {
                rows: 2,
                columns: 3,
                len: 5
            })
        );
    }

    #[test]
    fn scaling_factor_8bit_is_lookup() {
        let mut lut = [0u8; 257];
        for (i, v) in lut.iter_mut().enumerate() {
            *v = (i * 7 % 256) as u8;
        }
        for k in 0..256 {
            assert_eq!(get_scaling_factor::<BitDepth8>(&lut, k), lut[k as usize] as i32);
        }
    }

    #[test]
    fn scaling_factor_10bit_interpolates() {
        let mut lut = [0u8; 257];
        lut[10] = 20;
        lut[11] = 40;
        assert_eq!(get_scaling_factor::<BitDepth16>(&lut, 40), 20);
        assert_eq!(get_scaling_factor::<BitDepth16>(&lut, 41), 25);
        assert_eq!(get_scaling_factor::<BitDepth16>(&lut, 42), 30);
        assert_eq!(get_scaling_factor::<BitDepth16>(&lut, 43), 35);
        assert_eq!(get_scaling_factor::<BitDepth16>(&lut, 44), 40);
        lut[10] = 40;
        lut[11] = 20;
        assert_eq!(get_scaling_factor::<BitDepth16>(&lut, 41), 35);
        assert_eq!(get_scaling_factor::<BitDepth16>(&lut, 43), 25);
    }

    #[test]
    fn scaling_factor_reads_guard_entry() {
        let mut lut = [0u8; 257];
        lut[255] = 100;
        lut[256] = 200;
        assert_eq!(get_scaling_factor::<BitDepth16>(&lut, 1023), 175);
    }

    #[test]
    fn scaling_factor_10bit_monotone() {
        let mut rng = StdRng::seed_from_u64(10);
        for _ in 0..32 {
            let lut = monotone_lut(&mut rng);
            let mut prev = 0;
            for v in 0..1024 {
                let s = get_scaling_factor::<BitDepth16>(&lut, v);
                assert!(s >= prev, "value {v}: {s} < {prev}");
                prev = s;
            }
        }
    }

    #[test]
    fn scale_noise_matches_rounding_multiply_high() {
        for shift in 8..=11u8 {
            for scale in [0, 1, 37, 128, 255] {
                for grain in [-128, -77, -1, 0, 1, 64, 127] {
                    let s = scale << (15 - shift);
                    let mulhrs = (grain * s + (1 << 14)) >> 15;
                    assert_eq!(scale_noise(scale, grain, shift), mulhrs);
                }
            }
        }
    }

    #[test]
    fn luma_zero_noise_is_identity() {
        let mut rng = StdRng::seed_from_u64(2);
        let noise = noise_image::<i8>(8, 8);
        let src: Vec<u8> = (0..64).map(|_| rng.gen()).collect();
        for shift in 8..=11 {
            let mut lut = [0u8; 257];
            rng.fill(&mut lut[..]);
            let mut dst = [0u8; 64];
            blend_noise_luma_rust(
                &noise,
                0,
                255,
                shift,
                8,
                8,
                0,
                &lut,
                PlaneRef::new(&src, 8),
                PlaneMut::new(&mut dst, 8),
                BitDepth8,
            );
            assert_eq!(&dst[..], &src[..]);
        }
    }

    #[test]
    fn luma_known_values() {
        let mut noise = noise_image::<i8>(4, 4);
        noise[0].row_mut(1).copy_from_slice(&[10, -10, 127, -128]);
        let lut = [64u8; 257];
        let src = [100u8, 100, 250, 20];
        let mut dst = [0u8; 4];
        blend_noise_luma_rust(
            &noise,
            16,
            235,
            8,
            4,
            1,
            1,
            &lut,
            PlaneRef::new(&src, 4),
            PlaneMut::new(&mut dst, 4),
            BitDepth8,
        );
        // 64 * 10 / 256 = 2.5 -> 3; 64 * -10 / 256 = -2.5 -> -2.
        assert_eq!(dst, [103, 98, 235, 16]);
    }

    #[test]
    fn cfl_subsampled_average_and_odd_width() {
        let mut noise = noise_image::<i8>(2, 3);
        noise[1].row_mut(0).fill(64);
        let mut lut = [0u8; 257];
        lut[16] = 128;
        lut[60] = 64;
        lut[7] = 255;
        // Width 5: chroma columns use luma pairs (0,1), (2,3), (4,4).
        let luma = [10u8, 21, 60, 60, 7, 200];
        let src = [50u8, 50, 50];
        let mut dst = [0u8; 3];
        let params = FilmGrainParams {
            chroma_scaling_from_luma: true,
            chroma_scaling: 8,
            ..Default::default()
        };
        blend_noise_chroma_rust::<_, true>(
            Plane::U,
            &params,
            &noise,
            0,
            255,
            5,
            1,
            0,
            1,
            1,
            &lut,
            PlaneRef::new(&luma, 6),
            PlaneRef::new(&src, 3),
            PlaneMut::new(&mut dst, 3),
            BitDepth8,
        );
        assert_eq!(dst, [50 + 32, 50 + 16, 50 + 64]);
    }

    #[test]
    fn direct_mode_key() {
        let mut noise = noise_image::<i16>(1, 2);
        noise[2].row_mut(0).fill(100);
        let params = FilmGrainParams {
            chroma_scaling: 8,
            v_luma_multiplier: 64,
            v_multiplier: -32,
            v_offset: 10,
            ..Default::default()
        };
        // key = ((400 * 64 - 200 * 32) >> 6) + (10 << 2) = 300 + 40 = 340
        // -> index 85, no fraction.
        let mut lut = [0u8; 257];
        lut[85] = 128;
        let luma = [400u16, 400];
        let src = [200u16, 1020];
        let mut dst = [0u16; 2];
        blend_noise_chroma_rust::<_, false>(
            Plane::V,
            &params,
            &noise,
            0,
            1023,
            2,
            1,
            0,
            0,
            0,
            &lut,
            PlaneRef::new(&luma, 2),
            PlaneRef::new(&src, 2),
            PlaneMut::new(&mut dst, 2),
            BitDepth16,
        );
        // Second sample: key = ((25600 - 32640) >> 6) + 40 = -110 + 40 -> clamped to 0.
        assert_eq!(dst, [250, 1020]);
    }

    #[test]
    fn direct_mode_shift_floors_negative_keys() {
        let mut noise = noise_image::<i8>(1, 1);
        noise[1].row_mut(0)[0] = 127;
        let params = FilmGrainParams {
            chroma_scaling: 8,
            u_luma_multiplier: -1,
            u_offset: 1,
            ..Default::default()
        };
        // (1 * -1) >> 6 == -1, so the key is 0 rather than 1.
        let mut lut = [0u8; 257];
        lut[0] = 255;
        let luma = [1u8];
        let src = [0u8];
        let mut dst = [0u8];
        blend_noise_chroma_rust::<_, false>(
            Plane::U,
            &params,
            &noise,
            0,
            255,
            1,
            1,
            0,
            0,
            0,
            &lut,
            PlaneRef::new(&luma, 1),
            PlaneRef::new(&src, 1),
            PlaneMut::new(&mut dst, 1),
            BitDepth8,
        );
        assert_eq!(dst, [127]);
    }

    #[test]
    fn chroma_zero_noise_is_identity_both_modes() {
        let mut rng = StdRng::seed_from_u64(3);
        let noise = noise_image::<i16>(8, 8);
        let luma: Vec<u16> = (0..16 * 16).map(|_| rng.gen_range(0..1024)).collect();
        let src: Vec<u16> = (0..8 * 8).map(|_| rng.gen_range(0..1024)).collect();
        let mut lut = [0u8; 257];
        rng.fill(&mut lut[..]);
        let params = FilmGrainParams {
            chroma_scaling: 11,
            u_luma_multiplier: rng.gen_range(-128..128),
            u_multiplier: rng.gen_range(-128..128),
            u_offset: rng.gen_range(-256..256),
            ..Default::default()
        };
        let ctx = Rav1dFilmGrainDSPContext::<BitDepth16>::default();
        for blend in ctx.blend_noise_chroma {
            let mut dst = vec![0u16; 64];
            blend(
                Plane::U,
                &params,
                &noise,
                0,
                1023,
                16,
                16,
                0,
                1,
                1,
                &lut,
                PlaneRef::new(&luma, 16),
                PlaneRef::new(&src, 8),
                PlaneMut::new(&mut dst, 8),
                BitDepth16,
            );
            assert_eq!(dst, src);
        }
    }
}
