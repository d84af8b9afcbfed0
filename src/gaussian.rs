use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::math::Complex64;

#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GaussianBeam {
    /// waist radius w0
    pub waist: f64,
    /// axial distance from the waist, positive past it
    pub position: f64,
    pub rayleigh_range: f64,
    pub wavelength: f64,
}

impl GaussianBeam {
    /// a beam sitting at its waist.
    pub fn from_waist(waist: f64, wavelength: f64) -> Self {
        Self {
            waist,
            position: 0.0,
            rayleigh_range: rayleigh_range(waist, wavelength),
            wavelength,
        }
    }

    pub fn q(&self) -> Complex64 {
        Complex64::new(self.position, self.rayleigh_range)
    }

    /// free-space propagation by `distance`.
    pub fn propagate(self, distance: f64) -> Self {
        Self {
            position: self.position + distance,
            ..self
        }
    }

    /// ideal thin lens of focal length `focal_length`, negative for diverging
    /// lenses: 1/q' = 1/q - 1/f
    pub fn through_thin_lens(self, focal_length: f64) -> Self {
        if focal_length == 0.0 || !focal_length.is_finite() {
            return self;
        }
        let q = self.q();
        if q.norm_sqr() == 0.0 {
            return self;
        }
        let transformed = (q.inv() - Complex64::new(1.0 / focal_length, 0.0)).inv();
        if !(transformed.re.is_finite() && transformed.im > 0.0) {
            return self;
        }
        let rayleigh_range = transformed.im;
        Self {
            waist: (rayleigh_range * self.wavelength / PI).sqrt(),
            position: transformed.re,
            rayleigh_range,
            wavelength: self.wavelength,
        }
    }

    /// w(z) = w0 sqrt(1 + (z / zR)^2)
    pub fn radius_at(&self, z: f64) -> f64 {
        if self.rayleigh_range <= 0.0 {
            return self.waist;
        }
        let ratio = z / self.rayleigh_range;
        self.waist * (1.0 + ratio * ratio).sqrt()
    }

    /// beam radius at the current axial position.
    pub fn radius(&self) -> f64 {
        self.radius_at(self.position)
    }
}

pub fn rayleigh_range(waist: f64, wavelength: f64) -> f64 {
    if wavelength > 0.0 {
        PI * waist * waist / wavelength
    } else {
        0.0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_radius_grows_by_sqrt2_at_rayleigh_range() {
        let beam = GaussianBeam::from_waist(0.5, 632.8e-6);
        let zr = beam.rayleigh_range;
        assert!((beam.radius() - 0.5).abs() < 1e-12);
        let far = beam.propagate(zr);
        assert!((far.radius() - 0.5 * 2f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_propagate_only_moves_position() {
        let beam = GaussianBeam::from_waist(0.5, 632.8e-6).propagate(12.0);
        assert_eq!(beam.position, 12.0);
        assert_eq!(beam.waist, 0.5);
    }

    #[test]
    fn test_converging_lens_focuses_after_lens() {
        // a collimated beam at its waist focuses near the focal point
        let beam = GaussianBeam::from_waist(1.0, 1.0e-3).through_thin_lens(100.0);
        // negative position means the new waist lies ahead of the beam
        assert!(beam.position < 0.0);
        assert!((beam.position + 100.0).abs() < 1.0, "{:?}", beam);
        assert!(beam.waist < 1.0);
    }

    #[test]
    fn test_diverging_lens_moves_waist_behind() {
        let beam = GaussianBeam::from_waist(1.0, 1.0e-3).through_thin_lens(-100.0);
        assert!(beam.position > 0.0);
        assert!(beam.waist < 1.0);
        assert!(beam.radius() > 0.99);
    }

    #[test]
    fn test_degenerate_lens_is_ignored() {
        let beam = GaussianBeam::from_waist(1.0, 1.0e-3);
        assert_eq!(beam.through_thin_lens(0.0), beam);
        assert_eq!(beam.through_thin_lens(f64::NAN), beam);
    }
}
