pub mod accumulator;
pub mod aperture;
pub mod config;
pub mod element;
pub mod engine;
pub mod gaussian;
pub mod geometry;
pub mod intersect;
pub mod lens;
pub mod math;
pub mod polarization;
pub mod ray;
pub mod trace;

pub use crate::config::{load_config, ConfigError, RunConfig};
pub use crate::element::{Color, Element, ElementKind, LensShape, Scene};
pub use crate::engine::{Engine, TraceLimits, TraceResult};
pub use crate::math::{Point, Vec2};
pub use crate::polarization::{Jones, PolarizationReading, Stokes};
pub use crate::ray::{Fate, TracedRay};

pub extern crate nalgebra as na;

/// Traces `scene` with the default [`TraceLimits`].
pub fn compute(scene: &Scene) -> TraceResult {
    Engine::default().compute(scene)
}
