use crate::element::{Element, ElementKind, Scene};
use crate::lens;
use crate::math::{rotate, to_world, Point, Vec2};

/// which part of its element a boundary is
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SurfaceRole {
    /// the single working face of a flat element
    Face,
    /// curved lens surface
    Cap,
    /// flat back of a plano lens
    Flat,
    /// lens edge between the two optical surfaces
    Rim,
    /// one of the two mirrors of a cavity
    CavityMirror,
}

/// Struck-able boundary in world coordinates. Elements are built from a local
/// template whose front normal points along +x, then rotated and translated.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Surface {
    /// straight boundary from `start` to `end` with a fixed outward normal
    Segment {
        start: Point,
        end: Point,
        normal: Vec2,
        role: SurfaceRole,
    },
    /// spherical cap: the part of the circle within `max_angle` of `axis`,
    /// i.e. where (p - center) / radius . axis >= min_cos
    Arc {
        center: Point,
        radius: f64,
        axis: Vec2,
        min_cos: f64,
        /// convex caps face outward along (p - center), concave ones against it
        convex: bool,
        role: SurfaceRole,
    },
}

impl Surface {
    /// flat face of `length` through `origin`, perpendicular to `normal`
    pub fn face(origin: Point, normal: Vec2, length: f64, role: SurfaceRole) -> Self {
        let along = Vec2::new(-normal.y, normal.x) * (length / 2.0);
        Surface::Segment {
            start: origin - along,
            end: origin + along,
            normal,
            role,
        }
    }

    pub fn role(&self) -> SurfaceRole {
        match *self {
            Surface::Segment { role, .. } | Surface::Arc { role, .. } => role,
        }
    }

    /// outward normal at `p`, pointing away from the element body
    pub fn outward_normal(&self, p: &Point) -> Vec2 {
        match *self {
            Surface::Segment { normal, .. } => normal,
            Surface::Arc {
                center,
                radius,
                convex,
                ..
            } => {
                let n = (*p - center) / radius;
                if convex {
                    n
                } else {
                    -n
                }
            }
        }
    }
}

/// maps a local template segment onto the element's world placement
pub fn local_segment(
    element: &Element,
    start: Vec2,
    end: Vec2,
    normal: Vec2,
    role: SurfaceRole,
) -> Surface {
    Surface::Segment {
        start: to_world(&element.position, element.rotation, start),
        end: to_world(&element.position, element.rotation, end),
        normal: rotate(normal, element.rotation),
        role,
    }
}

/// resolves the boundaries light can strike on `element`
pub fn surfaces(element: &Element) -> Vec<Surface> {
    let front = element.front();
    let face = |length: f64| vec![Surface::face(
        element.position,
        front,
        length,
        SurfaceRole::Face,
    )];
    match &element.kind {
        ElementKind::Source(_) => Vec::new(),
        ElementKind::Lens(config) => lens::surfaces(element, config),
        ElementKind::CavityMirrorPair(config) => {
            let offset = front * (config.cavity_length / 2.0);
            vec![
                Surface::face(
                    element.position + offset,
                    front,
                    config.length,
                    SurfaceRole::CavityMirror,
                ),
                Surface::face(
                    element.position - offset,
                    -front,
                    config.length,
                    SurfaceRole::CavityMirror,
                ),
            ]
        }
        ElementKind::Mirror(config) => face(config.length),
        ElementKind::BeamSplitter(config) => face(config.length),
        ElementKind::PolarizingBeamSplitter(config) => face(config.length),
        ElementKind::ApertureStop(config) => face(config.length),
        ElementKind::Detector(config) | ElementKind::PolarizationDetector(config) => {
            face(config.length)
        }
        ElementKind::AcoustoOpticModulator(config) => face(config.length),
        ElementKind::FiberCoupler(config) => face(config.length),
        ElementKind::HalfWavePlate(config) | ElementKind::QuarterWavePlate(config) => {
            face(config.length)
        }
        ElementKind::Polarizer(config) => face(config.length),
    }
}

/// A scene with every element's boundaries resolved once, shared by all
/// trace steps of one computation.
pub struct Layout<'a> {
    pub scene: &'a Scene,
    pub surfaces: Vec<Vec<Surface>>,
}

impl<'a> Layout<'a> {
    pub fn new(scene: &'a Scene) -> Self {
        Self {
            scene,
            surfaces: scene.elements().iter().map(surfaces).collect(),
        }
    }

    pub fn element(&self, index: usize) -> &'a Element {
        &self.scene.elements()[index]
    }
}
