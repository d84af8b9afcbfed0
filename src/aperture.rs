use crate::math::Point;

pub trait Aperture {
    /// returns whether a hit at `p` on an element centered at `center` is
    /// rejected by the aperture
    fn is_rejected(&self, center: &Point, p: &Point) -> bool;
}

/// round opening of a given radius, centered on the element.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CircularAperture {
    pub radius: f64,
}

impl CircularAperture {
    pub fn from_diameter(diameter: f64) -> Self {
        Self {
            radius: diameter / 2.0,
        }
    }
}

impl Aperture for CircularAperture {
    fn is_rejected(&self, center: &Point, p: &Point) -> bool {
        (*p - *center).norm() > self.radius
    }
}
