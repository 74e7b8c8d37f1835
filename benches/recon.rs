//! Kernel benchmarks, one run per tier available on this machine.
//!
//! ```bash
//! cargo bench --bench recon
//! cargo bench --bench recon --features unchecked   # unchecked row indexing
//! ```

use divan::counter::ItemsCount;
use divan::Bencher;
use rav1d_recon::{
    Array2D, BitDepth, BitDepth16, BitDepth8, CpuLevel, FilmGrainParams, NoiseImage, Plane,
    PlaneMut, PlaneRef, Rav1dReconDSPContext,
};
use std::hint::black_box;

fn main() {
    divan::main();
}

const WIDTH: usize = 128;
const HEIGHT: usize = 64;

fn levels() -> &'static [CpuLevel] {
    CpuLevel::platform_levels()
}

fn predictions() -> (Vec<i16>, Vec<i16>) {
    let p0 = (0..WIDTH * HEIGHT).map(|i| ((i * 37) % 4096) as i16).collect();
    let p1 = (0..WIDTH * HEIGHT).map(|i| ((i * 101) % 4096) as i16).collect();
    (p0, p1)
}

fn pixels<BD: BitDepth>(len: usize, bd: BD) -> Vec<BD::Pixel> {
    (0..len)
        .map(|i| BD::pixel_from((i as i32 * 13) & bd.bitdepth_max()))
        .collect()
}

fn noise<BD: BitDepth>(bd: BD) -> NoiseImage<BD::Entry> {
    let (lo, hi) = bd.grain_range();
    let span = hi - lo + 1;
    std::array::from_fn(|p| {
        let data = (0..HEIGHT * WIDTH)
            .map(|i| BD::entry_from(lo + ((i as i32 * 7 + p as i32) % span)))
            .collect();
        Array2D::from_vec(HEIGHT, WIDTH, data).unwrap()
    })
}

fn bench_blend<BD: BitDepth>(bencher: Bencher, level: CpuLevel, bd: BD) {
    let dsp = Rav1dReconDSPContext::<BD>::new(level.to_mask());
    let (p0, p1) = predictions();
    let mut dst = vec![BD::Pixel::default(); WIDTH * HEIGHT];
    bencher
        .counter(ItemsCount::new(WIDTH * HEIGHT))
        .bench_local(|| {
            (dsp.mc.distance_weighted_blend)(
                PlaneRef::new(black_box(&p0), WIDTH),
                PlaneRef::new(&p1, WIDTH),
                11,
                5,
                WIDTH,
                HEIGHT,
                PlaneMut::new(&mut dst, WIDTH),
                bd,
            )
        });
}

fn bench_luma<BD: BitDepth>(bencher: Bencher, level: CpuLevel, bd: BD) {
    let dsp = Rav1dReconDSPContext::<BD>::new(level.to_mask());
    let noise = noise(bd);
    let lut = std::array::from_fn(|i| (i / 2) as u8);
    let src = pixels(WIDTH * HEIGHT, bd);
    let mut dst = vec![BD::Pixel::default(); WIDTH * HEIGHT];
    bencher
        .counter(ItemsCount::new(WIDTH * HEIGHT))
        .bench_local(|| {
            (dsp.fg.blend_noise_luma)(
                &noise,
                0,
                bd.bitdepth_max(),
                10,
                WIDTH,
                HEIGHT,
                0,
                black_box(&lut),
                PlaneRef::new(&src, WIDTH),
                PlaneMut::new(&mut dst, WIDTH),
                bd,
            )
        });
}

fn bench_chroma<BD: BitDepth>(bencher: Bencher, level: CpuLevel, cfl: bool, bd: BD) {
    let dsp = Rav1dReconDSPContext::<BD>::new(level.to_mask());
    let noise = noise(bd);
    let lut = std::array::from_fn(|i| (i / 2) as u8);
    let params = FilmGrainParams {
        chroma_scaling: 10,
        u_offset: 12,
        u_luma_multiplier: -40,
        u_multiplier: 96,
        ..Default::default()
    };
    let (cw, ch) = (WIDTH / 2, HEIGHT / 2);
    let luma = pixels(WIDTH * HEIGHT, bd);
    let src = pixels(cw * ch, bd);
    let mut dst = vec![BD::Pixel::default(); cw * ch];
    bencher.counter(ItemsCount::new(cw * ch)).bench_local(|| {
        (dsp.fg.blend_noise_chroma[cfl as usize])(
            Plane::U,
            &params,
            &noise,
            0,
            bd.bitdepth_max(),
            WIDTH,
            HEIGHT,
            0,
            1,
            1,
            black_box(&lut),
            PlaneRef::new(&luma, WIDTH),
            PlaneRef::new(&src, cw),
            PlaneMut::new(&mut dst, cw),
            bd,
        )
    });
}

#[divan::bench_group(sample_count = 100)]
mod blend {
    use super::*;

    #[divan::bench(args = levels())]
    fn bits_8(bencher: Bencher, level: &CpuLevel) {
        bench_blend(bencher, *level, BitDepth8);
    }

    #[divan::bench(args = levels())]
    fn bits_10(bencher: Bencher, level: &CpuLevel) {
        bench_blend(bencher, *level, BitDepth16);
    }
}

#[divan::bench_group(sample_count = 100)]
mod film_grain_luma {
    use super::*;

    #[divan::bench(args = levels())]
    fn bits_8(bencher: Bencher, level: &CpuLevel) {
        bench_luma(bencher, *level, BitDepth8);
    }

    #[divan::bench(args = levels())]
    fn bits_10(bencher: Bencher, level: &CpuLevel) {
        bench_luma(bencher, *level, BitDepth16);
    }
}

#[divan::bench_group(sample_count = 100)]
mod film_grain_chroma {
    use super::*;

    #[divan::bench(args = levels())]
    fn cfl_8(bencher: Bencher, level: &CpuLevel) {
        bench_chroma(bencher, *level, true, BitDepth8);
    }

    #[divan::bench(args = levels())]
    fn direct_8(bencher: Bencher, level: &CpuLevel) {
        bench_chroma(bencher, *level, false, BitDepth8);
    }

    #[divan::bench(args = levels())]
    fn direct_10(bencher: Bencher, level: &CpuLevel) {
        bench_chroma(bencher, *level, false, BitDepth16);
    }
}
