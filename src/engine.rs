use std::collections::{BTreeMap, VecDeque};

use log::{debug, trace};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::accumulator::{Accumulator, Readout};
use crate::element::{Color, ElementKind, Scene};
use crate::geometry::Layout;
use crate::polarization::PolarizationReading;
use crate::ray::{PendingRay, TracedRay};
use crate::trace::{trace_branch, Branch};

/// Bounds that keep every computation finite.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceLimits {
    /// traversal steps per branch, inherited by children
    pub max_bounces: usize,
    /// completed branches per computation
    pub max_rays: usize,
    /// branches at or below this intensity are never queued
    pub min_intensity: f64,
    /// how far an escaping ray is drawn
    pub escape_distance: f64,
}

impl Default for TraceLimits {
    fn default() -> Self {
        Self {
            max_bounces: 64,
            max_rays: 2000,
            min_intensity: 1.0e-4,
            escape_distance: 5000.0,
        }
    }
}

/// Everything one computation produced.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TraceResult {
    /// completed branches in the order they were traced
    pub rays: Vec<TracedRay>,
    pub hits: BTreeMap<String, f64>,
    pub polarization: BTreeMap<String, PolarizationReading>,
    pub colors: BTreeMap<String, Color>,
    /// the ray cap discarded queued branches
    pub truncated: bool,
}

impl TraceResult {
    fn new(rays: Vec<TracedRay>, readout: Readout, truncated: bool) -> Self {
        let Readout {
            hits,
            polarization,
            colors,
        } = readout;
        Self {
            rays,
            hits,
            polarization,
            colors,
            truncated,
        }
    }

    /// flat id -> value map; polarization detectors add `{id}_angle` and
    /// `{id}_ellipticity` entries next to their power
    pub fn readout(&self) -> BTreeMap<String, f64> {
        let mut flat = self.hits.clone();
        for (id, reading) in &self.polarization {
            flat.insert(format!("{}_angle", id), reading.orientation);
            flat.insert(format!("{}_ellipticity", id), reading.ellipticity);
        }
        flat
    }

    pub fn power(&self, id: &str) -> Option<f64> {
        self.hits.get(id).copied()
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Engine {
    pub limits: TraceLimits,
}

impl Engine {
    pub fn new(limits: TraceLimits) -> Self {
        Self { limits }
    }

    /// a branch is queued only if it is bright enough and can still take a step
    fn is_viable(&self, ray: &PendingRay) -> bool {
        ray.remaining > 0 && ray.intensity.is_finite() && ray.intensity > self.limits.min_intensity
    }

    fn seeds(&self, scene: &Scene) -> VecDeque<PendingRay> {
        scene
            .elements()
            .iter()
            .filter_map(|element| match &element.kind {
                ElementKind::Source(config) => {
                    Some(PendingRay::from_source(element, config, self.limits.max_bounces))
                }
                _ => None,
            })
            .filter(|seed| {
                if !seed.is_finite() {
                    trace!("skipping source with non-finite placement at {:?}", seed.origin);
                    return false;
                }
                self.is_viable(seed)
            })
            .collect()
    }

    /// Traces every source in `scene` to completion or to the ray cap.
    pub fn compute(&self, scene: &Scene) -> TraceResult {
        let layout = Layout::new(scene);
        let mut queue = self.seeds(scene);
        let mut accumulator = Accumulator::new(scene);
        let mut rays = Vec::new();
        let mut truncated = false;

        while let Some(pending) = queue.pop_front() {
            if rays.len() >= self.limits.max_rays {
                debug!(
                    "ray cap of {} reached, dropping {} queued branches",
                    self.limits.max_rays,
                    queue.len() + 1
                );
                truncated = true;
                break;
            }
            let Branch {
                ray,
                children,
                deposits,
            } = trace_branch(&layout, pending, &self.limits);
            rays.push(ray);
            accumulator = deposits.into_iter().fold(accumulator, Accumulator::deposit);
            queue.extend(children.into_iter().filter(|child| self.is_viable(child)));
        }

        TraceResult::new(rays, accumulator.finish(scene), truncated)
    }

    /// Traces independent scenes on the rayon pool. Results keep the input order.
    pub fn compute_many(&self, scenes: &[Scene]) -> Vec<TraceResult> {
        scenes.par_iter().map(|scene| self.compute(scene)).collect()
    }
}
