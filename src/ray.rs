use itertools::Itertools;
use serde::Serialize;

use crate::element::{Color, Element, SourceConfig};
use crate::gaussian::GaussianBeam;
use crate::math::{Point, Vec2};
use crate::polarization::Jones;

/// A branch waiting to be propagated. Consumed exactly once by
/// [`trace_branch`](crate::trace::trace_branch).
#[derive(Clone, Debug, PartialEq)]
pub struct PendingRay {
    pub origin: Point,
    /// unit length
    pub direction: Vec2,
    pub intensity: f64,
    /// unit magnitude; lost power lives in `intensity`
    pub polarization: Jones,
    pub beam: GaussianBeam,
    /// traversal steps left before the branch is cut
    pub remaining: usize,
    pub color: Color,
}

impl PendingRay {
    /// the single ray a source emits along its rotation
    pub fn from_source(element: &Element, config: &SourceConfig, max_bounces: usize) -> Self {
        Self {
            origin: element.position,
            direction: element.front(),
            intensity: config.power,
            polarization: Jones::linear(config.polarization_angle),
            beam: GaussianBeam::from_waist(config.waist_diameter / 2.0, config.wavelength),
            remaining: max_bounces,
            color: config.color,
        }
    }

    /// a branch leaving this ray's current position, inheriting its beam,
    /// color and remaining budget
    pub fn child(&self, direction: Vec2, intensity: f64, polarization: Jones) -> Self {
        Self {
            origin: self.origin,
            direction,
            intensity,
            polarization,
            beam: self.beam,
            remaining: self.remaining,
            color: self.color,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.origin.coords.iter().all(|c| c.is_finite())
            && self.direction.iter().all(|c| c.is_finite())
    }
}

/// How a traced branch ended.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Fate {
    /// left the scene without striking anything
    Escaped,
    /// absorbed by a detector or coupled into a fiber
    Absorbed,
    /// stopped by an aperture blade or rejected by a fiber
    Blocked,
    /// continued as child branches
    Split,
    /// attenuated below the intensity floor
    Extinguished,
    /// ran out of bounce budget
    Exhausted,
    /// position or direction became non-finite
    Aborted,
}

/// One finished branch: a polyline plus what it started with.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TracedRay {
    pub points: Vec<Point>,
    pub intensity: f64,
    pub color: Color,
    pub polarization: Jones,
    /// beam state at the start of each segment, `points.len() - 1` entries
    pub beams: Vec<GaussianBeam>,
    pub fate: Fate,
}

impl TracedRay {
    pub fn segment_lengths(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().tuple_windows().map(|(a, b)| (*b - *a).norm())
    }

    pub fn length(&self) -> f64 {
        self.segment_lengths().sum()
    }

    /// Gaussian beam radius `distance` along the polyline, or None past its end.
    pub fn beam_radius_at(&self, distance: f64) -> Option<f64> {
        if distance < 0.0 {
            return None;
        }
        let mut start = 0.0;
        for (length, beam) in self.segment_lengths().zip(self.beams.iter()) {
            if distance <= start + length {
                return Some(beam.radius_at(beam.position + distance - start));
            }
            start += length;
        }
        None
    }

    pub fn start(&self) -> Option<&Point> {
        self.points.first()
    }

    pub fn end(&self) -> Option<&Point> {
        self.points.last()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn beam() -> GaussianBeam {
        GaussianBeam::from_waist(0.5, 632.8e-6)
    }

    #[test]
    fn test_length_and_beam_radius_along_path() {
        let b = beam();
        let ray = TracedRay {
            points: vec![Point::new(0.0, 0.0), Point::new(3.0, 4.0), Point::new(3.0, 14.0)],
            intensity: 1.0,
            color: Color::RED,
            polarization: Jones::horizontal(),
            beams: vec![b, b.propagate(5.0)],
            fate: Fate::Escaped,
        };
        assert!((ray.length() - 15.0).abs() < 1e-12);
        let r = ray.beam_radius_at(7.0).unwrap();
        assert!((r - b.radius_at(7.0)).abs() < 1e-12);
        assert!(ray.beam_radius_at(15.5).is_none());
        assert!(ray.beam_radius_at(-1.0).is_none());
    }

    #[test]
    fn test_child_inherits_state() {
        let parent = PendingRay {
            origin: Point::new(1.0, 2.0),
            direction: Vec2::new(1.0, 0.0),
            intensity: 1.0,
            polarization: Jones::horizontal(),
            beam: beam(),
            remaining: 7,
            color: Color::new(0, 255, 0),
        };
        let child = parent.child(Vec2::new(0.0, 1.0), 0.25, Jones::linear(90.0));
        assert_eq!(child.origin, parent.origin);
        assert_eq!(child.remaining, 7);
        assert_eq!(child.color, parent.color);
        assert_eq!(child.beam, parent.beam);
        assert_eq!(child.intensity, 0.25);
    }
}
