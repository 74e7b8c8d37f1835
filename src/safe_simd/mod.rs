//! Accelerated kernels written with `core::arch` intrinsics.
//!
//! Every public entry point summons an `archmage` token before entering its
//! `#[arcane]` body and falls back to the next lower tier when the CPU lacks
//! it, so a dispatch table built from any flag set is sound to call.

#![deny(unsafe_code)]

use cfg_if::cfg_if;

pub mod partial_simd;
pub mod pixel_access;

cfg_if! {
    if #[cfg(target_arch = "x86_64")] {
        pub mod filmgrain;
        pub mod mc;
    } else if #[cfg(target_arch = "aarch64")] {
        pub mod filmgrain_arm;
        pub mod mc_arm;
    }
}
