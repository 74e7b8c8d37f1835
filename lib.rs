#![allow(non_upper_case_globals)]
#![allow(clippy::too_many_arguments)]
// Unsafe is denied crate-wide and forbidden in the SIMD kernel modules. The
// only opt-out is the `unchecked` row accessors.
#![deny(unsafe_code)]
#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::undocumented_unsafe_blocks)]

#[cfg(not(any(feature = "bitdepth_8", feature = "bitdepth_16")))]
compile_error!("No bitdepths enabled. Enable one or more of the following features: `bitdepth_8`, `bitdepth_16`");

pub mod include {
    pub mod common {
        pub mod bitdepth;
        pub(crate) mod intops;
    } // mod common
    pub mod dav1d {
        pub mod headers;
    } // mod dav1d
} // mod include
pub mod src {
    pub mod cpu;
    pub mod error;
    pub mod strided;

    // DSP dispatch modules (baseline kernels and fn ptr tables)
    pub mod filmgrain;
    pub mod mc;
    pub mod recon_dsp;

    // Film grain strip application on top of the dispatch table
    pub mod fg_apply;

    // Accelerated kernels (internal, reached through the dispatch tables)
    pub(crate) mod safe_simd;
} // mod src

pub use include::common::bitdepth::{BitDepth, BitDepth16, BitDepth8, BPC};
pub use include::dav1d::headers::{ClipRange, FilmGrainParams, Plane};
pub use src::cpu::{rav1d_get_cpu_flags, rav1d_set_cpu_flags_mask, rav1d_set_cpu_level};
pub use src::cpu::{CpuFlags, CpuLevel};
pub use src::error::{Error, Result};
pub use src::fg_apply::apply_film_grain_strip;
pub use src::filmgrain::{
    get_scaling_factor, scaling_lut_from_slice, Array2D, NoiseImage, Rav1dFilmGrainDSPContext,
    ScalingLut, SCALING_LOOKUP_TABLE_PADDING, SCALING_LOOKUP_TABLE_SIZE,
};
pub use src::mc::Rav1dMCDSPContext;
pub use src::recon_dsp::{rav1d_init_dsp, Rav1dReconDSPContext};
pub use src::strided::{PlaneMut, PlaneRef};
