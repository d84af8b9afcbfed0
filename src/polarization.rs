use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign};

use crate::math::Complex64;

/// phase retardance of a half-wave plate (radians)
pub const HALF_WAVE: f64 = std::f64::consts::PI;
/// phase retardance of a quarter-wave plate (radians)
pub const QUARTER_WAVE: f64 = std::f64::consts::FRAC_PI_2;

/// complex horizontal and vertical amplitudes. rays carry it normalized;
/// power lost at a polarizing element lives in the ray's intensity
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Jones {
    pub h: Complex64,
    pub v: Complex64,
}

impl Jones {
    pub fn new(h: Complex64, v: Complex64) -> Self {
        Self { h, v }
    }

    /// linear polarization at `degrees` from horizontal.
    pub fn linear(degrees: f64) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Self::new(Complex64::new(cos, 0.0), Complex64::new(sin, 0.0))
    }

    pub fn horizontal() -> Self {
        Self::linear(0.0)
    }

    /// re-expresses the state in a frame rotated by `degrees`.
    pub fn rotate(self, degrees: f64) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Self::new(
            self.h * cos + self.v * sin,
            -self.h * sin + self.v * cos,
        )
    }

    /// wave retarder with its fast axis at `fast_axis` degrees, delaying the
    /// slow component by `phase` radians.
    pub fn retard(self, fast_axis: f64, phase: f64) -> Self {
        let local = self.rotate(fast_axis);
        let shifted = Self::new(local.h, local.v * Complex64::from_polar(1.0, phase));
        shifted.rotate(-fast_axis)
    }

    /// ideal linear polarizer transmitting along `axis` degrees.
    /// the result is not renormalized; its intensity is the Malus factor.
    pub fn polarize(self, axis: f64) -> Self {
        let local = self.rotate(axis);
        Self::new(local.h, Complex64::new(0.0, 0.0)).rotate(-axis)
    }

    pub fn intensity(&self) -> f64 {
        self.h.norm_sqr() + self.v.norm_sqr()
    }

    /// unit-magnitude copy; a zero vector stays zero.
    pub fn normalized(self) -> Self {
        let magnitude = self.intensity().sqrt();
        if magnitude > 0.0 && magnitude.is_finite() {
            Self::new(self.h / magnitude, self.v / magnitude)
        } else {
            self
        }
    }

    pub fn stokes(&self) -> Stokes {
        let cross = self.h.conj() * self.v;
        Stokes {
            s0: self.intensity(),
            s1: self.h.norm_sqr() - self.v.norm_sqr(),
            s2: 2.0 * cross.re,
            s3: 2.0 * cross.im,
        }
    }
}

impl Default for Jones {
    fn default() -> Self {
        Self::horizontal()
    }
}

/// Applies a polarization-affecting transform and splits the outcome into a
/// new scalar intensity and a renormalized Jones vector.
pub fn attenuate(intensity: f64, transformed: Jones) -> (f64, Jones) {
    (intensity * transformed.intensity(), transformed.normalized())
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Stokes {
    pub s0: f64,
    pub s1: f64,
    pub s2: f64,
    pub s3: f64,
}

impl Stokes {
    pub fn scaled(self, weight: f64) -> Self {
        Self {
            s0: self.s0 * weight,
            s1: self.s1 * weight,
            s2: self.s2 * weight,
            s3: self.s3 * weight,
        }
    }

    /// orientation of the polarization ellipse, in [0, 180) degrees.
    pub fn orientation(&self) -> f64 {
        let angle = (0.5 * self.s2.atan2(self.s1)).to_degrees().rem_euclid(180.0);
        // rem_euclid can round up to exactly 180 for tiny negative inputs
        if angle >= 180.0 {
            0.0
        } else {
            angle
        }
    }

    /// ellipticity angle, in [-45, 45] degrees.
    pub fn ellipticity(&self) -> f64 {
        if self.s0 <= 0.0 {
            return 0.0;
        }
        let ratio = (self.s3 / self.s0).clamp(-1.0, 1.0);
        (0.5 * ratio.asin()).to_degrees()
    }
}

impl Add for Stokes {
    type Output = Self;
    fn add(self, other: Self) -> Self {
        Self {
            s0: self.s0 + other.s0,
            s1: self.s1 + other.s1,
            s2: self.s2 + other.s2,
            s3: self.s3 + other.s3,
        }
    }
}

impl AddAssign for Stokes {
    fn add_assign(&mut self, other: Self) {
        *self = *self + other;
    }
}

/// Final read-out of a polarization detector.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PolarizationReading {
    pub stokes: Stokes,
    /// degrees, [0, 180)
    pub orientation: f64,
    /// degrees, [-45, 45]
    pub ellipticity: f64,
}

impl From<Stokes> for PolarizationReading {
    fn from(stokes: Stokes) -> Self {
        Self {
            stokes,
            orientation: stokes.orientation(),
            ellipticity: stokes.ellipticity(),
        }
    }
}
