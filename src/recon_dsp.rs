//! Process-wide kernel dispatch table.
//!
//! One [`Rav1dReconDSPContext`] per bit depth, built once from
//! [`rav1d_get_cpu_flags`] on first use and immutable afterwards.

use crate::include::common::bitdepth::{BitDepth, BitDepth16, BitDepth8};
use crate::src::cpu::{rav1d_get_cpu_flags, CpuFlags};
use crate::src::filmgrain::Rav1dFilmGrainDSPContext;
use crate::src::mc::Rav1dMCDSPContext;
use log::debug;

#[derive(Clone, Copy, Debug)]
pub struct Rav1dReconDSPContext<BD: BitDepth> {
    pub mc: Rav1dMCDSPContext<BD>,
    pub fg: Rav1dFilmGrainDSPContext<BD>,
}

impl<BD: BitDepth> Rav1dReconDSPContext<BD> {
    /// Baseline kernels only.
    pub const fn default() -> Self {
        Self {
            mc: Rav1dMCDSPContext::default(),
            fg: Rav1dFilmGrainDSPContext::default(),
        }
    }

    /// Baseline kernels overwritten by every tier `flags` allows.
    ///
    /// Building a context does not touch global state, so tables for
    /// several tiers can coexist (e.g. to compare them).
    pub const fn new(flags: CpuFlags) -> Self {
        Self {
            mc: Rav1dMCDSPContext::new(flags),
            fg: Rav1dFilmGrainDSPContext::new(flags),
        }
    }

    /// The process-wide table for this bit depth.
    pub fn get() -> &'static Self {
        BD::dsp_slot().get_or_init(|| {
            let flags = rav1d_get_cpu_flags();
            debug!(
                "initializing {}-bit reconstruction DSP with cpu flags {flags:?}",
                BD::BITDEPTH
            );
            Self::new(flags)
        })
    }
}

/// Builds the process-wide tables for every enabled bit depth.
///
/// Calling this at startup is optional; [`Rav1dReconDSPContext::get`]
/// initializes lazily. Repeated calls are no-ops.
#[cold]
pub fn rav1d_init_dsp() {
    #[cfg(feature = "bitdepth_8")]
    Rav1dReconDSPContext::<BitDepth8>::get();
    #[cfg(feature = "bitdepth_16")]
    Rav1dReconDSPContext::<BitDepth16>::get();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_returns_same_table() {
        rav1d_init_dsp();
        let a = Rav1dReconDSPContext::<BitDepth8>::get();
        let b = Rav1dReconDSPContext::<BitDepth8>::get();
        assert!(std::ptr::eq(a, b));
        let c = Rav1dReconDSPContext::<BitDepth16>::get();
        let d = Rav1dReconDSPContext::<BitDepth16>::get();
        assert!(std::ptr::eq(c, d));
    }

    #[cfg(target_arch = "x86_64")]
    #[test]
    fn avx2_overrides_sse41() {
        let sse41 = Rav1dReconDSPContext::<BitDepth8>::new(CpuFlags::SSE41);
        let avx2 = Rav1dReconDSPContext::<BitDepth8>::new(CpuFlags::SSE41 | CpuFlags::AVX2);
        let baseline = Rav1dReconDSPContext::<BitDepth8>::default();
        assert_ne!(
            sse41.fg.blend_noise_luma as usize,
            baseline.fg.blend_noise_luma as usize
        );
        assert_ne!(
            avx2.fg.blend_noise_luma as usize,
            sse41.fg.blend_noise_luma as usize
        );
    }
}
