use log::trace;

use crate::accumulator::Deposit;
use crate::aperture::{Aperture, CircularAperture};
use crate::element::{
    BeamSplitterConfig, CavityConfig, Element, ElementKind, FiberCouplerConfig, LensConfig,
    MirrorConfig, ModulatorConfig, PolarizerConfig, PolarizingBeamSplitterConfig,
};
use crate::engine::TraceLimits;
use crate::geometry::Layout;
use crate::intersect::{nearest_hit, Hit};
use crate::lens::{refract, AIR_IOR, GLASS_IOR};
use crate::math::{reflect, rotate};
use crate::polarization::{attenuate, HALF_WAVE, QUARTER_WAVE};
use crate::ray::{Fate, PendingRay, TracedRay};

/// coupled power below this does not tag the fiber with the ray's color
const COLOR_THRESHOLD: f64 = 1.0e-6;
/// 2 sqrt(2 ln 2): converts a full width at half maximum into a sigma
const FWHM_TO_SIGMA: f64 = 2.355;

/// Everything one branch produced.
#[derive(Clone, Debug, PartialEq)]
pub struct Branch {
    pub ray: TracedRay,
    pub children: Vec<PendingRay>,
    pub deposits: Vec<Deposit>,
}

enum Step {
    Continue,
    Stop(Fate),
    Split(Vec<PendingRay>),
}

/// Follows one pending ray until it ends or splits. Pure in the ray and the
/// scene: queueing and accumulation are left to the caller.
pub fn trace_branch(layout: &Layout, pending: PendingRay, limits: &TraceLimits) -> Branch {
    let (intensity, color, polarization) = (pending.intensity, pending.color, pending.polarization);
    let mut ray = pending;
    let mut points = vec![ray.origin];
    let mut beams = Vec::new();
    let mut deposits = Vec::new();
    let mut children = Vec::new();

    let fate = loop {
        if !ray.is_finite() {
            trace!("aborting branch with non-finite state at {:?}", ray.origin);
            break Fate::Aborted;
        }
        if ray.remaining == 0 {
            trace!("branch exhausted its bounce budget at {:?}", ray.origin);
            break Fate::Exhausted;
        }
        ray.remaining -= 1;

        let hit = match nearest_hit(layout, &ray.origin, &ray.direction) {
            Some(hit) => hit,
            None => {
                points.push(ray.origin + ray.direction * limits.escape_distance);
                beams.push(ray.beam);
                break Fate::Escaped;
            }
        };
        points.push(hit.point);
        beams.push(ray.beam);
        ray.beam = ray.beam.propagate(hit.distance);
        ray.origin = hit.point;

        let element = layout.element(hit.element);
        match interact(element, &hit, &mut ray, limits, &mut deposits) {
            Step::Continue => {}
            Step::Stop(fate) => break fate,
            Step::Split(spawned) => {
                children = spawned;
                break Fate::Split;
            }
        }
    };

    Branch {
        ray: TracedRay {
            points,
            intensity,
            color,
            polarization,
            beams,
            fate,
        },
        children,
        deposits,
    }
}

fn interact(
    element: &Element,
    hit: &Hit,
    ray: &mut PendingRay,
    limits: &TraceLimits,
    deposits: &mut Vec<Deposit>,
) -> Step {
    match &element.kind {
        // sources expose no surfaces, so they are never struck
        ElementKind::Source(_) => Step::Continue,
        ElementKind::Mirror(config) => mirror(config, hit, ray, limits),
        ElementKind::Lens(config) => lens(config, hit, ray),
        ElementKind::BeamSplitter(config) => beam_splitter(config, hit, ray),
        ElementKind::PolarizingBeamSplitter(config) => {
            deposits.push(Deposit::Power {
                element: hit.element,
                amount: ray.intensity,
            });
            polarizing_beam_splitter(config, hit, ray)
        }
        // hits inside the opening were filtered out by the nearest-hit query
        ElementKind::ApertureStop(_) => Step::Stop(Fate::Blocked),
        ElementKind::Detector(_) => {
            deposits.push(Deposit::Power {
                element: hit.element,
                amount: ray.intensity,
            });
            Step::Stop(Fate::Absorbed)
        }
        ElementKind::PolarizationDetector(_) => {
            deposits.push(Deposit::Power {
                element: hit.element,
                amount: ray.intensity,
            });
            deposits.push(Deposit::Stokes {
                element: hit.element,
                stokes: ray.polarization.stokes().scaled(ray.intensity),
            });
            Step::Stop(Fate::Absorbed)
        }
        ElementKind::AcoustoOpticModulator(config) => modulator(config, ray),
        ElementKind::FiberCoupler(config) => fiber_coupler(config, element, hit, ray, deposits),
        ElementKind::CavityMirrorPair(config) => cavity_mirror(config, hit, ray),
        ElementKind::HalfWavePlate(config) => wave_plate(config.fast_axis, HALF_WAVE, ray),
        ElementKind::QuarterWavePlate(config) => wave_plate(config.fast_axis, QUARTER_WAVE, ray),
        ElementKind::Polarizer(config) => polarizer(config, ray),
    }
}

fn mirror(config: &MirrorConfig, hit: &Hit, ray: &mut PendingRay, limits: &TraceLimits) -> Step {
    ray.direction = reflect(ray.direction, hit.normal);
    if config.reflectivity < 1.0 {
        ray.intensity *= config.reflectivity;
        if ray.intensity <= limits.min_intensity {
            return Step::Stop(Fate::Extinguished);
        }
    }
    Step::Continue
}

fn lens(config: &LensConfig, hit: &Hit, ray: &mut PendingRay) -> Step {
    let entering = hit.from_outside(&ray.direction);
    let (n1, n2) = if entering {
        (AIR_IOR, GLASS_IOR)
    } else {
        (GLASS_IOR, AIR_IOR)
    };
    match refract(n1, n2, hit.normal, ray.direction) {
        Some(direction) => {
            ray.direction = direction;
            // the whole thin-lens transform happens once, on the way out
            if !entering {
                ray.beam = ray.beam.through_thin_lens(config.signed_focal_length());
            }
        }
        None => ray.direction = reflect(ray.direction, hit.normal),
    }
    Step::Continue
}

fn beam_splitter(config: &BeamSplitterConfig, hit: &Hit, ray: &PendingRay) -> Step {
    let t = config.transmission;
    Step::Split(vec![
        ray.child(
            reflect(ray.direction, hit.normal),
            ray.intensity * (1.0 - t),
            ray.polarization,
        ),
        ray.child(ray.direction, ray.intensity * t, ray.polarization),
    ])
}

fn polarizing_beam_splitter(config: &PolarizingBeamSplitterConfig, hit: &Hit, ray: &PendingRay) -> Step {
    let (transmitted, t_state) = attenuate(ray.intensity, ray.polarization.polarize(config.axis));
    let (reflected, r_state) =
        attenuate(ray.intensity, ray.polarization.polarize(config.axis + 90.0));
    Step::Split(vec![
        ray.child(reflect(ray.direction, hit.normal), reflected, r_state),
        ray.child(ray.direction, transmitted, t_state),
    ])
}

fn modulator(config: &ModulatorConfig, ray: &PendingRay) -> Step {
    let e = config.efficiency;
    Step::Split(vec![
        ray.child(ray.direction, ray.intensity * (1.0 - e), ray.polarization),
        ray.child(
            rotate(ray.direction, config.deviation),
            ray.intensity * e,
            ray.polarization,
        ),
    ])
}

/// fraction of power coupled at incidence `theta` for an acceptance
/// half-angle `acceptance` (both radians); zero outside the cone
pub fn coupling_efficiency(theta: f64, acceptance: f64) -> f64 {
    if theta > acceptance {
        return 0.0;
    }
    let sigma = acceptance / FWHM_TO_SIGMA;
    if sigma <= 0.0 {
        return 1.0;
    }
    (-theta * theta / (2.0 * sigma * sigma)).exp()
}

fn fiber_coupler(
    config: &FiberCouplerConfig,
    element: &Element,
    hit: &Hit,
    ray: &PendingRay,
    deposits: &mut Vec<Deposit>,
) -> Step {
    let core = CircularAperture::from_diameter(config.core_diameter);
    if !hit.from_outside(&ray.direction) || core.is_rejected(&element.position, &hit.point) {
        return Step::Stop(Fate::Blocked);
    }
    let cos = (-ray.direction).dot(&hit.outward).clamp(-1.0, 1.0);
    let theta = cos.acos();
    let acceptance = config.acceptance_angle.to_radians();
    if theta > acceptance {
        return Step::Stop(Fate::Blocked);
    }
    let coupled = ray.intensity * coupling_efficiency(theta, acceptance);
    deposits.push(Deposit::Power {
        element: hit.element,
        amount: coupled,
    });
    if coupled > COLOR_THRESHOLD {
        deposits.push(Deposit::Color {
            element: hit.element,
            color: ray.color,
        });
    }
    Step::Stop(Fate::Absorbed)
}

fn cavity_mirror(config: &CavityConfig, hit: &Hit, ray: &PendingRay) -> Step {
    let r = config.reflectivity;
    Step::Split(vec![
        ray.child(
            reflect(ray.direction, hit.normal),
            ray.intensity * r,
            ray.polarization,
        ),
        ray.child(ray.direction, ray.intensity * (1.0 - r), ray.polarization),
    ])
}

fn wave_plate(fast_axis: f64, phase: f64, ray: &PendingRay) -> Step {
    let (intensity, state) = attenuate(ray.intensity, ray.polarization.retard(fast_axis, phase));
    Step::Split(vec![ray.child(ray.direction, intensity, state)])
}

fn polarizer(config: &PolarizerConfig, ray: &PendingRay) -> Step {
    let (intensity, state) = attenuate(ray.intensity, ray.polarization.polarize(config.axis));
    Step::Split(vec![ray.child(ray.direction, intensity, state)])
}
