//! Fixed-width SIMD loads and stores over array references.
//!
//! Thin aliases over `safe_unaligned_simd`: the array type carries the
//! access width, so none of these need `unsafe`.

#![forbid(unsafe_code)]

#[cfg(target_arch = "x86_64")]
pub use x86_64_aliases::*;

#[cfg(target_arch = "aarch64")]
pub use aarch64_aliases::*;

#[cfg(target_arch = "x86_64")]
mod x86_64_aliases {
    use core::arch::x86_64::{__m128i, __m256i};

    /// Load 64 bits into the low half of an __m128i, zeroing the high half.
    #[inline]
    #[target_feature(enable = "sse2")]
    pub fn mm_loadl_epi64(src: &[i16; 4]) -> __m128i {
        safe_unaligned_simd::x86_64::_mm_loadu_si64(src)
    }

    #[inline]
    #[target_feature(enable = "sse2")]
    pub fn mm_loadu_si128(src: &[i16; 8]) -> __m128i {
        safe_unaligned_simd::x86_64::_mm_loadu_si128(src)
    }

    #[inline]
    #[target_feature(enable = "sse2")]
    pub fn mm_storeu_si128(dst: &mut [i16; 8], val: __m128i) {
        safe_unaligned_simd::x86_64::_mm_storeu_si128(dst, val)
    }

    #[inline]
    #[target_feature(enable = "avx")]
    pub fn mm256_loadu_si256(src: &[i16; 16]) -> __m256i {
        safe_unaligned_simd::x86_64::_mm256_loadu_si256(src)
    }

    #[inline]
    #[target_feature(enable = "avx")]
    pub fn mm256_storeu_si256(dst: &mut [i16; 16], val: __m256i) {
        safe_unaligned_simd::x86_64::_mm256_storeu_si256(dst, val)
    }
}

#[cfg(target_arch = "aarch64")]
mod aarch64_aliases {
    use core::arch::aarch64::{int16x4_t, int16x8_t};

    #[inline]
    #[target_feature(enable = "neon")]
    pub fn vld1_s16_4(src: &[i16; 4]) -> int16x4_t {
        safe_unaligned_simd::aarch64::vld1_s16(src)
    }

    #[inline]
    #[target_feature(enable = "neon")]
    pub fn vld1q_s16_8(src: &[i16; 8]) -> int16x8_t {
        safe_unaligned_simd::aarch64::vld1q_s16(src)
    }

    #[inline]
    #[target_feature(enable = "neon")]
    pub fn vst1q_s16_8(dst: &mut [i16; 8], val: int16x8_t) {
        safe_unaligned_simd::aarch64::vst1q_s16(dst, val)
    }
}
