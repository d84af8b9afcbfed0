use ordered_float::OrderedFloat;

use crate::aperture::{Aperture, CircularAperture};
use crate::element::ElementKind;
use crate::geometry::{Layout, Surface, SurfaceRole};
use crate::math::{cross, Point, Vec2, EPSILON};

/// Result of one nearest-intersection query.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Hit {
    pub distance: f64,
    pub point: Point,
    /// unit normal facing the incoming ray
    pub normal: Vec2,
    /// geometric normal pointing away from the element body
    pub outward: Vec2,
    /// which part of the element was struck
    pub role: SurfaceRole,
    /// index of the struck element in the scene
    pub element: usize,
}

impl Hit {
    /// true when the ray arrives from the side the outward normal faces
    pub fn from_outside(&self, direction: &Vec2) -> bool {
        direction.dot(&self.outward) < 0.0
    }
}

/// parametric distance and point along the ray, plus the outward normal
type SurfaceHit = (f64, Point, Vec2);

pub fn ray_segment(origin: &Point, direction: &Vec2, start: &Point, end: &Point) -> Option<(f64, Point)> {
    let edge = *end - *start;
    let denom = cross(*direction, edge);
    if denom == 0.0 {
        return None;
    }
    let offset = *start - *origin;
    let t = cross(offset, edge) / denom;
    let u = cross(offset, *direction) / denom;
    if t > EPSILON && (0.0..=1.0).contains(&u) {
        Some((t, *origin + *direction * t))
    } else {
        None
    }
}

/// both roots of the ray/circle quadratic, ascending. `direction` need not be
/// normalized.
pub fn ray_circle(origin: &Point, direction: &Vec2, center: &Point, radius: f64) -> Option<(f64, f64)> {
    let scv = *origin - *center;
    let a = direction.dot(direction);
    let b = 2.0 * direction.dot(&scv);
    let c = scv.dot(&scv) - radius * radius;
    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 || a == 0.0 {
        return None;
    }
    let root = discriminant.sqrt();
    let a2 = 2.0 * a;
    Some(((-b - root) / a2, (-b + root) / a2))
}

pub fn intersect_surface(origin: &Point, direction: &Vec2, surface: &Surface) -> Option<SurfaceHit> {
    match surface {
        Surface::Segment { start, end, normal, .. } => {
            ray_segment(origin, direction, start, end).map(|(t, p)| (t, p, *normal))
        }
        Surface::Arc {
            center,
            radius,
            axis,
            min_cos,
            ..
        } => {
            let (t0, t1) = ray_circle(origin, direction, center, *radius)?;
            [t0, t1].iter().copied().find_map(|t| {
                if t <= EPSILON {
                    return None;
                }
                let p = *origin + *direction * t;
                let radial = (p - *center) / *radius;
                if radial.dot(axis) >= min_cos - 1e-9 {
                    Some((t, p, surface.outward_normal(&p)))
                } else {
                    None
                }
            })
        }
    }
}

/// aperture stops let rays through their opening as if they were absent
fn passes_through(kind: &ElementKind, center: &Point, p: &Point) -> bool {
    match kind {
        ElementKind::ApertureStop(config) => {
            !CircularAperture::from_diameter(config.aperture_diameter).is_rejected(center, p)
        }
        _ => false,
    }
}

/// globally nearest accepted hit among all elements. ties keep the first in
/// scene order.
pub fn nearest_hit(layout: &Layout, origin: &Point, direction: &Vec2) -> Option<Hit> {
    layout
        .surfaces
        .iter()
        .enumerate()
        .flat_map(|(index, surfaces)| {
            let element = layout.element(index);
            surfaces.iter().filter_map(move |surface| {
                let (distance, point, outward) = intersect_surface(origin, direction, surface)?;
                if passes_through(&element.kind, &element.position, &point) {
                    return None;
                }
                let normal = if direction.dot(&outward) > 0.0 {
                    -outward
                } else {
                    outward
                };
                Some(Hit {
                    distance,
                    point,
                    normal,
                    outward,
                    role: surface.role(),
                    element: index,
                })
            })
        })
        .min_by_key(|hit| OrderedFloat(hit.distance))
}
