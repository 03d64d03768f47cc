use std::convert::TryFrom;
use std::fmt;

use crate::consts::{angle_step, length_step};
use crate::error::TemplateError;
use crate::math::{angle_diff, line_orientation};

#[repr(u8)]
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub enum MinutiaKind {
    /// Ridge ending.
    Ending = 0,
    /// Ridge bifurcation.
    Bifurcation = 1,
}

impl MinutiaKind {
    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for MinutiaKind {
    type Error = TemplateError;

    fn try_from(code: u8) -> Result<Self, Self::Error> {
        match code {
            0 => Ok(MinutiaKind::Ending),
            1 => Ok(MinutiaKind::Bifurcation),
            other => Err(TemplateError::InvalidInput(format!(
                "unknown minutia type {}",
                other
            ))),
        }
    }
}

impl fmt::Display for MinutiaKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Represents a single minutia.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MinutiaPoint {
    /// X coordinate in pixels.
    pub x: i32,
    /// Y coordinate in pixels.
    pub y: i32,
    /// Counterclockwise orientation in radians, in `[0, 2π)`.
    pub theta: f64,
    /// Type of the minutia.
    pub kind: MinutiaKind,
}

impl MinutiaPoint {
    pub fn new(x: i32, y: i32, theta: f64, kind: MinutiaKind) -> Self {
        MinutiaPoint { x, y, theta, kind }
    }
}

impl fmt::Display for MinutiaPoint {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let kind = match self.kind {
            MinutiaKind::Ending => "Ending",
            MinutiaKind::Bifurcation => "Bifurcation",
        };
        write!(f, "{} {} {:.3} {}", self.x, self.y, self.theta, kind)
    }
}

/// Quantization steps applied to a pair.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Quantization {
    pub length_step: f64,
    pub angle_step: f64,
}

impl Quantization {
    /// Steps currently configured in [`crate::consts`].
    pub fn current() -> Self {
        Quantization {
            length_step: length_step(),
            angle_step: angle_step(),
        }
    }
}

pub trait Quantize {
    fn quantize(self, steps: &Quantization) -> QuantizedPair;
}

/// Directed pair of minutiae `i -> j` on a single fingerprint, before quantization.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct MinutiaPair {
    /// Rounded euclidean distance in pixels.
    pub length: u32,
    /// Angle between minutia `i` and the line `i -> j`.
    pub alpha_i: f64,
    /// Angle between minutia `j` and the line `i -> j`.
    pub alpha_j: f64,
    pub kind_i: MinutiaKind,
    pub kind_j: MinutiaKind,
}

impl MinutiaPair {
    pub fn new(m_i: &MinutiaPoint, m_j: &MinutiaPoint) -> Self {
        let dx = m_j.x - m_i.x;
        let dy = m_j.y - m_i.y;
        let phi = line_orientation(dx, dy);

        MinutiaPair {
            length: (dx as f64).hypot(dy as f64).round() as u32,
            alpha_i: angle_diff(m_i.theta, phi),
            alpha_j: angle_diff(m_j.theta, phi),
            kind_i: m_i.kind,
            kind_j: m_j.kind,
        }
    }
}

impl Quantize for MinutiaPair {
    #[inline]
    fn quantize(self, steps: &Quantization) -> QuantizedPair {
        QuantizedPair {
            length: (self.length as f64 / steps.length_step).floor() as u32,
            alpha_i: (self.alpha_i / steps.angle_step).floor() as u32,
            alpha_j: (self.alpha_j / steps.angle_step).floor() as u32,
            kind_i: self.kind_i,
            kind_j: self.kind_j,
        }
    }
}

/// Pair whose distance and angles have been reduced to bucket indices.
///
/// Equality and hashing are structural over all five features.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct QuantizedPair {
    pub length: u32,
    pub alpha_i: u32,
    pub alpha_j: u32,
    pub kind_i: MinutiaKind,
    pub kind_j: MinutiaKind,
}

impl QuantizedPair {
    pub fn new(
        length: u32,
        alpha_i: u32,
        alpha_j: u32,
        kind_i: MinutiaKind,
        kind_j: MinutiaKind,
    ) -> Self {
        QuantizedPair {
            length,
            alpha_i,
            alpha_j,
            kind_i,
            kind_j,
        }
    }

    /// Builds a pair from raw feature values, validating the type codes.
    pub fn from_features(
        length: u32,
        alpha_i: u32,
        alpha_j: u32,
        kind_i: u8,
        kind_j: u8,
    ) -> Result<Self, TemplateError> {
        Ok(QuantizedPair {
            length,
            alpha_i,
            alpha_j,
            kind_i: MinutiaKind::try_from(kind_i)?,
            kind_j: MinutiaKind::try_from(kind_j)?,
        })
    }
}

impl Quantize for QuantizedPair {
    /// Bucket indices are already fixed points of quantization.
    #[inline]
    fn quantize(self, _steps: &Quantization) -> QuantizedPair {
        self
    }
}

impl fmt::Display for QuantizedPair {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{} {:.3} {:.3} {} {}",
            self.length, self.alpha_i as f64, self.alpha_j as f64, self.kind_i, self.kind_j
        )
    }
}
