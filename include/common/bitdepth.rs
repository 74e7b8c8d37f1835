use crate::include::common::intops::iclip;
use crate::src::recon_dsp::Rav1dReconDSPContext;
use std::fmt::Debug;
use std::sync::OnceLock;

/// Bits per component of the sample containers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BPC {
    BPC8,
    BPC16,
}

/// Unsigned output sample.
pub trait Pixel: Copy + Default + Debug + Eq + Into<i32> + Send + Sync + 'static {}

impl Pixel for u8 {}
impl Pixel for u16 {}

/// Signed noise image entry.
pub trait Entry: Copy + Default + Debug + Eq + Into<i32> + Send + Sync + 'static {}

impl Entry for i8 {}
impl Entry for i16 {}

/// Compile-time selection of the working bit depth.
///
/// Kernels are generic over this trait and also take a `bd: BD` value, which
/// is what carries the type through the function pointer tables.
pub trait BitDepth: Clone + Copy + Debug + Default + Send + Sync + 'static {
    const BPC: BPC;
    const BITDEPTH: u8;

    type Pixel: Pixel;
    type Entry: Entry;

    #[inline]
    fn bitdepth(&self) -> u8 {
        Self::BITDEPTH
    }

    #[inline]
    fn bitdepth_max(&self) -> i32 {
        (1 << Self::BITDEPTH) - 1
    }

    /// Narrows a value already within `[0, bitdepth_max]`.
    fn pixel_from(v: i32) -> Self::Pixel;

    /// Narrows a value already within the grain range of this depth.
    fn entry_from(v: i32) -> Self::Entry;

    #[inline]
    fn iclip_pixel(&self, v: i32) -> Self::Pixel {
        Self::pixel_from(iclip(v, 0, self.bitdepth_max()))
    }

    /// Inclusive range of film grain noise values at this depth.
    #[inline]
    fn grain_range(&self) -> (i32, i32) {
        let half = 128 << (Self::BITDEPTH - 8);
        (-half, half - 1)
    }

    /// Process-wide dispatch table slot for this depth.
    #[doc(hidden)]
    fn dsp_slot() -> &'static OnceLock<Rav1dReconDSPContext<Self>>;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BitDepth8;

/// 10-bit samples held in 16-bit containers.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BitDepth16;

impl BitDepth for BitDepth8 {
    const BPC: BPC = BPC::BPC8;
    const BITDEPTH: u8 = 8;

    type Pixel = u8;
    type Entry = i8;

    #[inline]
    fn pixel_from(v: i32) -> u8 {
        debug_assert!((0..=u8::MAX as i32).contains(&v));
        v as u8
    }

    #[inline]
    fn entry_from(v: i32) -> i8 {
        debug_assert!((i8::MIN as i32..=i8::MAX as i32).contains(&v));
        v as i8
    }

    fn dsp_slot() -> &'static OnceLock<Rav1dReconDSPContext<Self>> {
        static DSP: OnceLock<Rav1dReconDSPContext<BitDepth8>> = OnceLock::new();
        &DSP
    }
}

impl BitDepth for BitDepth16 {
    const BPC: BPC = BPC::BPC16;
    const BITDEPTH: u8 = 10;

    type Pixel = u16;
    type Entry = i16;

    #[inline]
    fn pixel_from(v: i32) -> u16 {
        debug_assert!((0..=(1 << Self::BITDEPTH) - 1).contains(&v));
        v as u16
    }

    #[inline]
    fn entry_from(v: i32) -> i16 {
        debug_assert!((-512..=511).contains(&v));
        v as i16
    }

    fn dsp_slot() -> &'static OnceLock<Rav1dReconDSPContext<Self>> {
        static DSP: OnceLock<Rav1dReconDSPContext<BitDepth16>> = OnceLock::new();
        &DSP
    }
}
