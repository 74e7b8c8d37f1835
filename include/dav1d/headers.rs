//! Film grain parameter records as they arrive from the frame header.

use crate::include::common::bitdepth::BitDepth;
use crate::src::error::{Error, Result};
use std::ops::RangeInclusive;
use strum::{EnumCount, FromRepr};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, EnumCount, FromRepr)]
#[repr(usize)]
pub enum Plane {
    Y = 0,
    U = 1,
    V = 2,
}

impl Plane {
    pub const CHROMA: [Plane; 2] = [Plane::U, Plane::V];

    #[inline]
    pub const fn is_chroma(self) -> bool {
        !matches!(self, Plane::Y)
    }
}

pub const MIN_LUMA_VALUE: i32 = 16;
pub const MAX_LUMA_VALUE: i32 = 235;
pub const MAX_CHROMA_VALUE: i32 = 240;

/// Film grain synthesis parameters consumed by the blend kernels.
///
/// `chroma_scaling` is the scaling shift (`grain_scaling_minus_8 + 8`) and
/// applies to all three planes.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilmGrainParams {
    pub chroma_scaling_from_luma: bool,
    pub clip_to_restricted_range: bool,
    pub chroma_scaling: u8,
    pub num_y_points: u8,
    pub num_u_points: u8,
    pub num_v_points: u8,
    pub u_offset: i32,
    pub v_offset: i32,
    pub u_luma_multiplier: i32,
    pub v_luma_multiplier: i32,
    pub u_multiplier: i32,
    pub v_multiplier: i32,
}

/// Output clamp bounds for film grain application.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClipRange {
    pub min: i32,
    pub max_luma: i32,
    pub max_chroma: i32,
}

/// Chroma multipliers are coded as 8 bits minus 128.
pub const CHROMA_MULTIPLIER_RANGE: RangeInclusive<i32> = -128..=127;

/// Chroma offsets are coded as 9 bits minus 256.
pub const CHROMA_OFFSET_RANGE: RangeInclusive<i32> = -256..=255;

fn check_range(name: &'static str, value: i32, range: RangeInclusive<i32>) -> Result<()> {
    if range.contains(&value) {
        return Ok(());
    }
    Err(Error::ChromaParameter {
        name,
        value,
        min: *range.start(),
        max: *range.end(),
    })
}

impl FilmGrainParams {
    /// Checks the fields the kernels rely on. Chroma multipliers and offsets
    /// must stay in their coded ranges to fit the kernels' 16-bit lanes.
    pub fn validate(&self) -> Result<()> {
        if !(8..=11).contains(&self.chroma_scaling) {
            return Err(Error::ScalingShift(self.chroma_scaling));
        }
        check_range("u_multiplier", self.u_multiplier, CHROMA_MULTIPLIER_RANGE)?;
        check_range("u_luma_multiplier", self.u_luma_multiplier, CHROMA_MULTIPLIER_RANGE)?;
        check_range("u_offset", self.u_offset, CHROMA_OFFSET_RANGE)?;
        check_range("v_multiplier", self.v_multiplier, CHROMA_MULTIPLIER_RANGE)?;
        check_range("v_luma_multiplier", self.v_luma_multiplier, CHROMA_MULTIPLIER_RANGE)?;
        check_range("v_offset", self.v_offset, CHROMA_OFFSET_RANGE)?;
        Ok(())
    }

    pub fn offset(&self, plane: Plane) -> i32 {
        match plane {
            Plane::Y => 0,
            Plane::U => self.u_offset,
            Plane::V => self.v_offset,
        }
    }

    pub fn luma_multiplier(&self, plane: Plane) -> i32 {
        match plane {
            Plane::Y => 0,
            Plane::U => self.u_luma_multiplier,
            Plane::V => self.v_luma_multiplier,
        }
    }

    pub fn multiplier(&self, plane: Plane) -> i32 {
        match plane {
            Plane::Y => 0,
            Plane::U => self.u_multiplier,
            Plane::V => self.v_multiplier,
        }
    }

    /// Whether grain is applied to `plane` at all.
    pub fn applies_to(&self, plane: Plane) -> bool {
        match plane {
            Plane::Y => self.num_y_points > 0,
            Plane::U => self.chroma_scaling_from_luma || self.num_u_points > 0,
            Plane::V => self.chroma_scaling_from_luma || self.num_v_points > 0,
        }
    }

    pub fn clip_range<BD: BitDepth>(&self, bd: BD, is_identity_matrix: bool) -> ClipRange {
        let shift = bd.bitdepth() - 8;
        if self.clip_to_restricted_range {
            let max_luma = MAX_LUMA_VALUE << shift;
            ClipRange {
                min: MIN_LUMA_VALUE << shift,
                max_luma,
                max_chroma: if is_identity_matrix {
                    max_luma
                } else {
                    MAX_CHROMA_VALUE << shift
                },
            }
        } else {
            ClipRange {
                min: 0,
                max_luma: bd.bitdepth_max(),
                max_chroma: bd.bitdepth_max(),
            }
        }
    }
}
