pub use nalgebra::{Point2, Rotation2, Vector2};
pub use num_complex::Complex64;

pub type Vec2 = Vector2<f64>;
pub type Point = Point2<f64>;

/// intersections closer than this to a ray's origin are ignored, so a ray
/// leaving a surface never re-strikes it at t = 0.
pub const EPSILON: f64 = 1.0e-4;

/// unit vector pointing along `degrees`, measured counterclockwise from +x.
/// the four cardinal angles produce exact components.
pub fn direction_from_degrees(degrees: f64) -> Vec2 {
    let normalized = degrees.rem_euclid(360.0);
    if normalized == 0.0 {
        Vec2::new(1.0, 0.0)
    } else if normalized == 90.0 {
        Vec2::new(0.0, 1.0)
    } else if normalized == 180.0 {
        Vec2::new(-1.0, 0.0)
    } else if normalized == 270.0 {
        Vec2::new(0.0, -1.0)
    } else {
        let (sin, cos) = normalized.to_radians().sin_cos();
        Vec2::new(cos, sin)
    }
}

/// rotates `v` counterclockwise by `degrees`.
pub fn rotate(v: Vec2, degrees: f64) -> Vec2 {
    if degrees.rem_euclid(360.0) == 0.0 {
        return v;
    }
    let axis = direction_from_degrees(degrees);
    Vec2::new(axis.x * v.x - axis.y * v.y, axis.y * v.x + axis.x * v.y)
}

/// maps a point from an element's local frame into world space.
pub fn to_world(origin: &Point, degrees: f64, local: Vec2) -> Point {
    *origin + rotate(local, degrees)
}

/// specular reflection, R = D - 2(D.N)N
pub fn reflect(direction: Vec2, normal: Vec2) -> Vec2 {
    direction - 2.0 * direction.dot(&normal) * normal
}

/// 2D cross product (z component of the 3D cross product).
pub fn cross(a: Vec2, b: Vec2) -> f64 {
    a.x * b.y - a.y * b.x
}

pub fn is_finite(v: &Vec2) -> bool {
    v.x.is_finite() && v.y.is_finite()
}
