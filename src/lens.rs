use crate::element::{Element, LensConfig, LensShape};
use crate::geometry::{local_segment, Surface, SurfaceRole};
use crate::math::{rotate, to_world, Vec2};

pub const AIR_IOR: f64 = 1.0;
pub const GLASS_IOR: f64 = 1.5;
/// center thickness of every lens body
pub const NOMINAL_THICKNESS: f64 = 10.0;
/// thinnest allowed rim of a convex lens
const MIN_EDGE_THICKNESS: f64 = 1.0;

/// Dimensions of the two-surface lens body derived from its focal length.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct LensProfile {
    /// radius of curvature of the curved surface(s)
    pub radius: f64,
    /// center thickness
    pub thickness: f64,
    pub half_height: f64,
    /// depth of a curved cap measured at the rim
    pub sag: f64,
}

impl LensProfile {
    pub fn new(config: &LensConfig) -> Self {
        let half_height = config.diameter / 2.0;
        // lensmaker's equation for a thin lens in air, symmetric or plano
        let power_factor = if config.shape.is_plano() {
            GLASS_IOR - AIR_IOR
        } else {
            2.0 * (GLASS_IOR - AIR_IOR)
        };
        let radius = (power_factor * config.focal_length.abs()).max(half_height);
        let sag = radius - (radius * radius - half_height * half_height).max(0.0).sqrt();
        let thickness = match config.shape {
            LensShape::Convex => NOMINAL_THICKNESS.max(2.0 * sag + MIN_EDGE_THICKNESS),
            LensShape::PlanoConvex => NOMINAL_THICKNESS.max(sag + MIN_EDGE_THICKNESS),
            LensShape::Concave | LensShape::PlanoConcave => NOMINAL_THICKNESS,
        };
        Self {
            radius,
            thickness,
            half_height,
            sag,
        }
    }

    fn min_cos(&self) -> f64 {
        (self.radius - self.sag) / self.radius
    }
}

/// curved cap whose vertex sits at local (`vertex_x`, 0) and which bulges
/// toward `facing` (+1 for the +x side, -1 for the -x side).
fn cap(element: &Element, profile: &LensProfile, vertex_x: f64, facing: f64, convex: bool) -> Surface {
    // convex caps curve back toward the glass, concave ones away from it
    let center_x = if convex {
        vertex_x - facing * profile.radius
    } else {
        vertex_x + facing * profile.radius
    };
    let axis = if convex { facing } else { -facing };
    Surface::Arc {
        center: to_world(&element.position, element.rotation, Vec2::new(center_x, 0.0)),
        radius: profile.radius,
        axis: rotate(Vec2::new(axis, 0.0), element.rotation),
        min_cos: profile.min_cos(),
        convex,
        role: SurfaceRole::Cap,
    }
}

/// glass boundaries of a lens: front and back faces plus the two rims
pub fn surfaces(element: &Element, config: &LensConfig) -> Vec<Surface> {
    let profile = LensProfile::new(config);
    let h = profile.half_height;
    if h <= 0.0 {
        return Vec::new();
    }
    let half = profile.thickness / 2.0;
    let convex = config.shape.is_converging();
    let mut surfaces = vec![cap(element, &profile, half, 1.0, convex)];
    let front_rim = if convex { half - profile.sag } else { half + profile.sag };
    let back_rim = if config.shape.is_plano() {
        surfaces.push(local_segment(
            element,
            Vec2::new(-half, -h),
            Vec2::new(-half, h),
            Vec2::new(-1.0, 0.0),
            SurfaceRole::Flat,
        ));
        -half
    } else {
        surfaces.push(cap(element, &profile, -half, -1.0, convex));
        if convex {
            -half + profile.sag
        } else {
            -half - profile.sag
        }
    };
    if front_rim - back_rim > 0.0 {
        for side in [1.0, -1.0] {
            surfaces.push(local_segment(
                element,
                Vec2::new(back_rim, side * h),
                Vec2::new(front_rim, side * h),
                Vec2::new(0.0, side),
                SurfaceRole::Rim,
            ));
        }
    }
    surfaces
}

/// vector form of Snell's law. `normal` faces the incoming ray.
/// returns None on total internal reflection.
pub fn refract(n1: f64, n2: f64, normal: Vec2, dir: Vec2) -> Option<Vec2> {
    if n1 == n2 {
        return Some(dir);
    }
    let eta = n1 / n2;
    let cos1 = -normal.dot(&dir);
    let cos2_2 = 1.0 - eta * eta * (1.0 - cos1 * cos1);
    if cos2_2 < 0.0 {
        None
    } else {
        let cos2 = cos2_2.sqrt();
        Some((dir * eta + normal * (eta * cos1 - cos2)).normalize())
    }
}
