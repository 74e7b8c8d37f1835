use crate::src::error::Error;
use bitflags::bitflags;
use log::{debug, warn};
use std::env;
use std::ffi::c_uint;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::AtomicU32;
use std::sync::atomic::Ordering;
use std::sync::Once;

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct CpuFlags: c_uint {}
}

// One flag per kernel tier.
#[cfg(target_arch = "x86_64")]
bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct CpuFlags: c_uint {
        const SSE41 = 1 << 0;
        const AVX2 = 1 << 1;
    }
}

#[cfg(target_arch = "aarch64")]
bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct CpuFlags: c_uint {
        const NEON = 1 << 0;
    }
}

/// Name of the environment variable that caps the detected CPU level.
pub const CPU_LEVEL_ENV: &str = "RAV1D_CPU_LEVEL";

impl CpuFlags {
    pub const fn compile_time_detect() -> Self {
        let individual_flags = [
            #[cfg(all(target_arch = "x86_64", target_feature = "sse4.1"))]
            CpuFlags::SSE41,
            #[cfg(all(target_arch = "x86_64", target_feature = "avx2"))]
            CpuFlags::AVX2,
            #[cfg(all(target_arch = "aarch64", target_feature = "neon"))]
            CpuFlags::NEON,
        ];

        let mut combined_flags = Self::empty();
        let mut i = 0;
        while i < individual_flags.len() {
            combined_flags = combined_flags.union(individual_flags[i]);
            i += 1;
        }
        combined_flags
    }

    /// Flags whose kernel tier can summon its token on this CPU.
    pub fn run_time_detect() -> Self {
        #[allow(unused_mut)]
        let mut flags = Self::empty();

        #[cfg(target_arch = "x86_64")]
        {
            use archmage::{Desktop64, SimdToken as _, X64V2Token};
            if X64V2Token::summon().is_some() {
                flags |= Self::SSE41;
            }
            if Desktop64::summon().is_some() {
                flags |= Self::AVX2;
            }
        }

        #[cfg(target_arch = "aarch64")]
        {
            use archmage::{Arm64, SimdToken as _};
            if Arm64::summon().is_some() {
                flags |= Self::NEON;
            }
        }

        flags
    }
}

/// Upper bound on the kernel tier used by the dispatch tables.
///
/// Levels that do not exist on the running architecture map to the scalar
/// baseline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum CpuLevel {
    /// Baseline Rust kernels only.
    Scalar,
    /// x86-64-v2: SSE4.1 kernels.
    X86V2,
    /// x86-64-v3: AVX2 kernels.
    X86V3,
    /// aarch64 NEON kernels.
    Neon,
    /// Whatever the host supports.
    #[default]
    Native,
}

impl CpuLevel {
    /// Levels that select distinct kernel tiers on this architecture,
    /// lowest first.
    pub const fn platform_levels() -> &'static [CpuLevel] {
        #[cfg(target_arch = "x86_64")]
        {
            &[CpuLevel::Scalar, CpuLevel::X86V2, CpuLevel::X86V3]
        }
        #[cfg(target_arch = "aarch64")]
        {
            &[CpuLevel::Scalar, CpuLevel::Neon]
        }
        #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
        {
            &[CpuLevel::Scalar]
        }
    }

    /// The flag mask this level allows.
    pub const fn to_mask(self) -> CpuFlags {
        match self {
            CpuLevel::Scalar => CpuFlags::empty(),
            #[cfg(target_arch = "x86_64")]
            CpuLevel::X86V2 => CpuFlags::SSE41,
            #[cfg(target_arch = "x86_64")]
            CpuLevel::X86V3 => CpuLevel::X86V2.to_mask().union(CpuFlags::AVX2),
            #[cfg(target_arch = "aarch64")]
            CpuLevel::Neon => CpuFlags::NEON,
            CpuLevel::Native => CpuFlags::all(),
            #[allow(unreachable_patterns)]
            _ => CpuFlags::empty(),
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            CpuLevel::Scalar => "scalar",
            CpuLevel::X86V2 => "x86-64-v2",
            CpuLevel::X86V3 => "x86-64-v3",
            CpuLevel::Neon => "neon",
            CpuLevel::Native => "native",
        }
    }
}

impl fmt::Display for CpuLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CpuLevel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "scalar" | "rust" | "none" => Ok(CpuLevel::Scalar),
            "x86-64-v2" | "v2" | "sse4.1" | "sse41" => Ok(CpuLevel::X86V2),
            "x86-64-v3" | "v3" | "avx2" => Ok(CpuLevel::X86V3),
            "neon" => Ok(CpuLevel::Neon),
            "native" | "" => Ok(CpuLevel::Native),
            _ => Err(Error::InvalidCpuLevel(s.to_owned())),
        }
    }
}

/// Reads the [`CPU_LEVEL_ENV`] cap. Unparsable values are logged and ignored.
fn env_cpu_level() -> Option<CpuLevel> {
    let value = env::var(CPU_LEVEL_ENV).ok()?;
    match value.parse() {
        Ok(level) => Some(level),
        Err(e) => {
            warn!("ignoring {CPU_LEVEL_ENV}: {e}");
            None
        }
    }
}

/// Detected flags (run time and compile time), capped by [`CPU_LEVEL_ENV`].
/// Written once.
static rav1d_cpu_flags: AtomicU32 = AtomicU32::new(0);
static rav1d_cpu_flags_init: Once = Once::new();

/// Caller-installed mask, see [`rav1d_set_cpu_flags_mask`].
static rav1d_cpu_flags_mask: AtomicU32 = AtomicU32::new(!0);

fn rav1d_init_cpu() {
    rav1d_cpu_flags_init.call_once(|| {
        let mut flags = CpuFlags::run_time_detect() | CpuFlags::compile_time_detect();
        if let Some(level) = env_cpu_level() {
            flags &= level.to_mask();
            debug!("cpu level capped to {level} by {CPU_LEVEL_ENV}");
        }
        debug!("detected cpu flags {flags:?}");
        rav1d_cpu_flags.store(flags.bits(), Ordering::SeqCst);
    });
}

/// Flags used to build the process-wide dispatch tables.
///
/// The mask applies to the compile-time flags too, so a mask of `0` forces
/// the baseline kernels even when built with `-C target-feature=+avx2`.
pub fn rav1d_get_cpu_flags() -> CpuFlags {
    rav1d_init_cpu();
    let flags = rav1d_cpu_flags.load(Ordering::SeqCst);
    let mask = rav1d_cpu_flags_mask.load(Ordering::SeqCst);
    CpuFlags::from_bits_truncate(flags & mask)
}

/// Restricts the flags seen by [`rav1d_get_cpu_flags`].
///
/// Only affects dispatch tables initialised afterwards; the process-wide
/// tables are built once, on first use.
#[cold]
pub fn rav1d_set_cpu_flags_mask(mask: c_uint) {
    rav1d_cpu_flags_mask.store(mask, Ordering::SeqCst);
}

#[cold]
pub fn rav1d_set_cpu_level(level: CpuLevel) {
    rav1d_set_cpu_flags_mask(level.to_mask().bits());
}
