use thiserror::Error;

/// Errors raised at the boundary of the kernel layer.
///
/// Kernels never fail; these cover inputs that are assembled outside a
/// kernel call (lookup tables, parameter records, configuration).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("scaling lookup table has {actual} entries, expected {expected}")]
    ScalingLutLength { expected: usize, actual: usize },

    #[error("film grain scaling shift {0} is outside 8..=11")]
    ScalingShift(u8),

    #[error("film grain {name} {value} is outside {min}..={max}")]
    ChromaParameter {
        name: &'static str,
        value: i32,
        min: i32,
        max: i32,
    },

    #[error("noise image of {rows}x{columns} cannot hold {len} entries")]
    NoiseImageShape {
        rows: usize,
        columns: usize,
        len: usize,
    },

    #[error("unknown cpu level `{0}`")]
    InvalidCpuLevel(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
