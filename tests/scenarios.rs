use rand::prelude::*;

use beamtrace::element::{
    ApertureStopConfig, BeamSplitterConfig, CavityConfig, DetectorConfig, FiberCouplerConfig,
    LensConfig, MirrorConfig, ModulatorConfig, PolarizerConfig, PolarizingBeamSplitterConfig,
    SourceConfig, WavePlateConfig,
};
use beamtrace::geometry::Layout;
use beamtrace::ray::PendingRay;
use beamtrace::trace::{coupling_efficiency, trace_branch};
use beamtrace::{
    compute, Color, Element, ElementKind, Engine, Fate, LensShape, Point, Scene, TraceLimits,
    TraceResult, Vec2,
};

fn source_at(x: f64, y: f64, rotation: f64) -> Element {
    Element::new(
        "laser",
        Point::new(x, y),
        rotation,
        ElementKind::Source(SourceConfig::default()),
    )
}

fn polarized_source(angle: f64) -> Element {
    Element::new(
        "laser",
        Point::origin(),
        0.0,
        ElementKind::Source(SourceConfig {
            polarization_angle: angle,
            ..SourceConfig::default()
        }),
    )
}

fn detector_at(id: &str, x: f64) -> Element {
    Element::new(
        id,
        Point::new(x, 0.0),
        180.0,
        ElementKind::Detector(DetectorConfig::default()),
    )
}

fn last_direction(result: &TraceResult, ray: usize) -> Vec2 {
    let points = &result.rays[ray].points;
    let n = points.len();
    (points[n - 1] - points[n - 2]).normalize()
}

#[test]
fn cardinal_sources_are_exact() {
    for (rotation, expected) in [
        (0.0, Vec2::new(1.0, 0.0)),
        (90.0, Vec2::new(0.0, 1.0)),
        (180.0, Vec2::new(-1.0, 0.0)),
        (270.0, Vec2::new(0.0, -1.0)),
        (-90.0, Vec2::new(0.0, -1.0)),
    ] {
        let result = compute(&Scene::new(vec![source_at(0.0, 0.0, rotation)]));
        assert_eq!(result.rays.len(), 1);
        let ray = &result.rays[0];
        assert_eq!(ray.fate, Fate::Escaped);
        let direction = (ray.points[1] - ray.points[0]) / TraceLimits::default().escape_distance;
        assert_eq!(direction, expected, "rotation {}", rotation);
    }

    let result = compute(&Scene::new(vec![source_at(0.0, 0.0, 30.0)]));
    let direction = last_direction(&result, 0);
    let expected = Vec2::new(30f64.to_radians().cos(), 30f64.to_radians().sin());
    assert!((direction - expected).norm() < 1e-12);
}

#[test]
fn diagonal_mirror_turns_beam_vertical() {
    let scene = Scene::new(vec![
        source_at(0.0, 0.0, 0.0),
        Element::new(
            "m",
            Point::new(50.0, 0.0),
            135.0,
            ElementKind::Mirror(MirrorConfig::default()),
        ),
    ]);
    let result = compute(&scene);
    assert_eq!(result.rays.len(), 1);
    let ray = &result.rays[0];
    assert_eq!(ray.points.len(), 3);
    assert!((ray.points[1] - Point::new(50.0, 0.0)).norm() < 1e-9);
    assert!((last_direction(&result, 0) - Vec2::new(0.0, 1.0)).norm() < 1e-12);
}

#[test]
fn beam_splitter_divides_intensity() {
    for transmission in [0.5, 0.3] {
        let scene = Scene::new(vec![
            source_at(0.0, 0.0, 0.0),
            Element::new(
                "bs",
                Point::new(50.0, 0.0),
                135.0,
                ElementKind::BeamSplitter(BeamSplitterConfig {
                    transmission,
                    ..BeamSplitterConfig::default()
                }),
            ),
        ]);
        let result = compute(&scene);
        assert_eq!(result.rays.len(), 3);
        assert_eq!(result.rays[0].fate, Fate::Split);
        let reflected = &result.rays[1];
        let transmitted = &result.rays[2];
        assert!((reflected.intensity - (1.0 - transmission)).abs() < 1e-12);
        assert!((transmitted.intensity - transmission).abs() < 1e-12);
        assert!((last_direction(&result, 1) - Vec2::new(0.0, 1.0)).norm() < 1e-12);
        assert!((last_direction(&result, 2) - Vec2::new(1.0, 0.0)).norm() < 1e-12);
    }
}

#[test]
fn modulator_diffracts_first_order() {
    let scene = Scene::new(vec![
        source_at(0.0, 0.0, 0.0),
        Element::new(
            "aom",
            Point::new(50.0, 0.0),
            180.0,
            ElementKind::AcoustoOpticModulator(ModulatorConfig {
                efficiency: 0.2,
                deviation: 5.0,
                ..ModulatorConfig::default()
            }),
        ),
    ]);
    let result = compute(&scene);
    assert_eq!(result.rays.len(), 3);
    assert!((result.rays[1].intensity - 0.8).abs() < 1e-12);
    assert!((result.rays[2].intensity - 0.2).abs() < 1e-12);
    assert!((last_direction(&result, 1) - Vec2::new(1.0, 0.0)).norm() < 1e-12);
    let deviated = Vec2::new(5f64.to_radians().cos(), 5f64.to_radians().sin());
    assert!((last_direction(&result, 2) - deviated).norm() < 1e-9);
}

#[test]
fn polarizer_follows_malus_law() {
    for (psi, expected) in [(0.0, 1.0), (45.0, 0.5), (90.0, 0.0), (120.0, 0.25)] {
        let scene = Scene::new(vec![
            polarized_source(psi),
            Element::new(
                "pol",
                Point::new(50.0, 0.0),
                180.0,
                ElementKind::Polarizer(PolarizerConfig::default()),
            ),
            detector_at("det", 100.0),
        ]);
        let result = compute(&scene);
        let power = result.power("det").unwrap();
        assert!((power - expected).abs() < 1e-9, "psi {}: {}", psi, power);
    }
}

#[test]
fn polarizing_beam_splitter_separates_axes() {
    let scene = Scene::new(vec![
        polarized_source(30.0),
        Element::new(
            "pbs",
            Point::new(50.0, 0.0),
            135.0,
            ElementKind::PolarizingBeamSplitter(PolarizingBeamSplitterConfig::default()),
        ),
        detector_at("through", 100.0),
        Element::new(
            "up",
            Point::new(50.0, 50.0),
            270.0,
            ElementKind::Detector(DetectorConfig::default()),
        ),
    ]);
    let result = compute(&scene);
    let c = 30f64.to_radians().cos().powi(2);
    assert!((result.power("pbs").unwrap() - 1.0).abs() < 1e-12);
    assert!((result.power("through").unwrap() - c).abs() < 1e-9);
    assert!((result.power("up").unwrap() - (1.0 - c)).abs() < 1e-9);
}

#[test]
fn quarter_wave_plate_makes_circular_light() {
    let scene = Scene::new(vec![
        polarized_source(45.0),
        Element::new(
            "qwp",
            Point::new(50.0, 0.0),
            180.0,
            ElementKind::QuarterWavePlate(WavePlateConfig::default()),
        ),
        Element::new(
            "pd",
            Point::new(100.0, 0.0),
            180.0,
            ElementKind::PolarizationDetector(DetectorConfig::default()),
        ),
    ]);
    let result = compute(&scene);
    let reading = result.polarization["pd"];
    assert!((reading.ellipticity.abs() - 45.0).abs() < 1e-4, "{:?}", reading);
    assert!((result.power("pd").unwrap() - 1.0).abs() < 1e-9);
    let flat = result.readout();
    assert_eq!(flat["pd_ellipticity"], reading.ellipticity);
}

#[test]
fn half_wave_plate_rotates_linear_light() {
    let scene = Scene::new(vec![
        polarized_source(0.0),
        Element::new(
            "hwp",
            Point::new(50.0, 0.0),
            180.0,
            ElementKind::HalfWavePlate(WavePlateConfig {
                fast_axis: 22.5,
                ..WavePlateConfig::default()
            }),
        ),
        Element::new(
            "pd",
            Point::new(100.0, 0.0),
            180.0,
            ElementKind::PolarizationDetector(DetectorConfig::default()),
        ),
    ]);
    let result = compute(&scene);
    let flat = result.readout();
    assert!((flat["pd_angle"] - 45.0).abs() < 1e-6, "{:?}", flat);
    assert!(flat["pd_ellipticity"].abs() < 1e-6);
    assert!((flat["pd"] - 1.0).abs() < 1e-9);
}

#[test]
fn fiber_coupling_efficiency() {
    let acceptance = 10f64.to_radians();
    assert!((coupling_efficiency(0.0, acceptance) - 1.0).abs() < 1e-12);
    assert!(coupling_efficiency(acceptance, acceptance) < 0.1);
    assert!(coupling_efficiency(1.5 * acceptance, acceptance) < 0.1);

    let fiber = |tilt: f64| {
        Scene::new(vec![
            source_at(0.0, 0.0, 0.0),
            Element::new(
                "fiber",
                Point::new(100.0, 0.0),
                180.0 + tilt,
                ElementKind::FiberCoupler(FiberCouplerConfig::default()),
            ),
        ])
    };

    let result = compute(&fiber(0.0));
    assert!((result.power("fiber").unwrap() - 1.0).abs() < 1e-12);
    assert_eq!(result.colors["fiber"], Color::RED);
    assert_eq!(result.rays[0].fate, Fate::Absorbed);

    let result = compute(&fiber(5.0));
    let expected = coupling_efficiency(5f64.to_radians(), acceptance);
    assert!((result.power("fiber").unwrap() - expected).abs() < 1e-9);

    let result = compute(&fiber(15.0));
    assert_eq!(result.power("fiber"), Some(0.0));
    assert_eq!(result.rays[0].fate, Fate::Blocked);
    assert!(!result.colors.contains_key("fiber"));
}

#[test]
fn concave_lens_diverges_parallel_rays() {
    for offset in [10.0, -10.0] {
        let scene = Scene::new(vec![
            source_at(0.0, offset, 0.0),
            Element::new(
                "l",
                Point::new(100.0, 0.0),
                0.0,
                ElementKind::Lens(LensConfig {
                    shape: LensShape::Concave,
                    ..LensConfig::default()
                }),
            ),
        ]);
        let result = compute(&scene);
        let direction = last_direction(&result, 0);
        assert!(direction.x > 0.0);
        assert!(direction.y * offset > 0.0, "offset {}: {:?}", offset, direction);
    }
}

#[test]
fn aperture_passes_inside_and_blocks_outside() {
    let iris = Element::new(
        "iris",
        Point::new(50.0, 0.0),
        0.0,
        ElementKind::ApertureStop(ApertureStopConfig {
            aperture_diameter: 10.0,
            ..ApertureStopConfig::default()
        }),
    );

    let result = compute(&Scene::new(vec![source_at(0.0, 4.0, 0.0), iris.clone()]));
    assert_eq!(result.rays[0].fate, Fate::Escaped);
    assert_eq!(result.rays[0].points.len(), 2);

    let result = compute(&Scene::new(vec![source_at(0.0, 6.0, 0.0), iris.clone()]));
    assert_eq!(result.rays[0].fate, Fate::Blocked);

    // passing through the opening costs no bounce
    let engine = Engine::new(TraceLimits {
        max_bounces: 1,
        ..TraceLimits::default()
    });
    let result = engine.compute(&Scene::new(vec![
        source_at(0.0, 0.0, 0.0),
        iris,
        detector_at("det", 100.0),
    ]));
    assert_eq!(result.power("det"), Some(1.0));
}

#[test]
fn cavity_conserves_intensity_at_each_mirror() {
    let limits = TraceLimits::default();
    let scene = Scene::new(vec![
        source_at(0.0, 0.0, 0.0),
        Element::new(
            "cav",
            Point::new(100.0, 0.0),
            0.0,
            ElementKind::CavityMirrorPair(CavityConfig::default()),
        ),
    ]);
    let layout = Layout::new(&scene);
    let seed = match &scene.elements()[0].kind {
        ElementKind::Source(config) => {
            PendingRay::from_source(&scene.elements()[0], config, limits.max_bounces)
        }
        _ => unreachable!(),
    };

    // follow the branch that enters the cavity for a few round trips
    let mut pending = seed;
    for _ in 0..6 {
        let parent = pending.intensity;
        let branch = trace_branch(&layout, pending, &limits);
        assert_eq!(branch.ray.fate, Fate::Split);
        assert_eq!(branch.children.len(), 2);
        let total: f64 = branch.children.iter().map(|child| child.intensity).sum();
        assert!((total - parent).abs() < 1e-12);
        pending = branch
            .children
            .into_iter()
            .find(|child| {
                let inside = child.origin + child.direction * 10.0;
                inside.x > 50.0 && inside.x < 150.0
            })
            .unwrap();
    }

    let result = compute(&scene);
    assert!(!result.truncated);
    assert!(result.rays.len() < limits.max_rays);
    // every traced branch took at least one step
    assert!(result.rays.iter().all(|ray| ray.points.len() >= 2));
}

#[test]
fn splitter_resonator_stops_at_the_ray_cap() {
    let limits = TraceLimits::default();
    let scene = Scene::new(vec![
        source_at(0.0, 0.0, 0.0),
        Element::new(
            "bs",
            Point::new(50.0, 0.0),
            180.0,
            ElementKind::BeamSplitter(BeamSplitterConfig::default()),
        ),
        Element::new(
            "back",
            Point::new(-50.0, 0.0),
            0.0,
            ElementKind::Mirror(MirrorConfig::default()),
        ),
        Element::new(
            "front",
            Point::new(100.0, 0.0),
            180.0,
            ElementKind::Mirror(MirrorConfig::default()),
        ),
    ]);
    let result = compute(&scene);
    assert!(result.truncated);
    assert_eq!(result.rays.len(), limits.max_rays);
    assert!(result
        .rays
        .iter()
        .all(|ray| ray.intensity > limits.min_intensity));
}

#[test]
fn identical_scenes_trace_identically() {
    let scene = bench_scene();
    let a = compute(&scene);
    let b = compute(&scene);
    assert_eq!(a.rays.len(), b.rays.len());
    for (x, y) in a.rays.iter().zip(b.rays.iter()) {
        assert_eq!(x.points.len(), y.points.len());
        for (p, q) in x.points.iter().zip(y.points.iter()) {
            assert_eq!(p.x.to_bits(), q.x.to_bits());
            assert_eq!(p.y.to_bits(), q.y.to_bits());
        }
    }
    assert_eq!(a, b);
}

fn bench_scene() -> Scene {
    Scene::new(vec![
        polarized_source(20.0),
        Element::new(
            "bs",
            Point::new(50.0, 0.0),
            135.0,
            ElementKind::BeamSplitter(BeamSplitterConfig::default()),
        ),
        Element::new(
            "l",
            Point::new(150.0, 0.0),
            0.0,
            ElementKind::Lens(LensConfig::default()),
        ),
        Element::new(
            "hwp",
            Point::new(50.0, 60.0),
            270.0,
            ElementKind::HalfWavePlate(WavePlateConfig {
                fast_axis: 22.5,
                ..WavePlateConfig::default()
            }),
        ),
        Element::new(
            "pd",
            Point::new(50.0, 120.0),
            270.0,
            ElementKind::PolarizationDetector(DetectorConfig::default()),
        ),
        detector_at("det", 300.0),
    ])
}

fn random_kind(rng: &mut StdRng) -> ElementKind {
    match rng.gen_range(0..13) {
        0 => ElementKind::Mirror(MirrorConfig {
            reflectivity: rng.gen_range(0.5..=1.0),
            ..MirrorConfig::default()
        }),
        1 => ElementKind::Lens(LensConfig {
            focal_length: rng.gen_range(20.0..200.0),
            shape: [
                LensShape::Convex,
                LensShape::Concave,
                LensShape::PlanoConvex,
                LensShape::PlanoConcave,
            ][rng.gen_range(0..4)],
            ..LensConfig::default()
        }),
        2 => ElementKind::BeamSplitter(BeamSplitterConfig {
            transmission: rng.gen_range(0.0..=1.0),
            ..BeamSplitterConfig::default()
        }),
        3 => ElementKind::PolarizingBeamSplitter(PolarizingBeamSplitterConfig {
            axis: rng.gen_range(0.0..180.0),
            ..PolarizingBeamSplitterConfig::default()
        }),
        4 => ElementKind::ApertureStop(ApertureStopConfig::default()),
        5 => ElementKind::Detector(DetectorConfig::default()),
        6 => ElementKind::PolarizationDetector(DetectorConfig::default()),
        7 => ElementKind::AcoustoOpticModulator(ModulatorConfig::default()),
        8 => ElementKind::FiberCoupler(FiberCouplerConfig::default()),
        9 => ElementKind::CavityMirrorPair(CavityConfig::default()),
        10 => ElementKind::HalfWavePlate(WavePlateConfig {
            fast_axis: rng.gen_range(0.0..180.0),
            ..WavePlateConfig::default()
        }),
        11 => ElementKind::QuarterWavePlate(WavePlateConfig {
            fast_axis: rng.gen_range(0.0..180.0),
            ..WavePlateConfig::default()
        }),
        _ => ElementKind::Polarizer(PolarizerConfig {
            axis: rng.gen_range(0.0..180.0),
            ..PolarizerConfig::default()
        }),
    }
}

fn random_scene(rng: &mut StdRng) -> Scene {
    let mut elements = Vec::new();
    for i in 0..rng.gen_range(1..4) {
        elements.push(Element::new(
            format!("src{}", i),
            Point::new(rng.gen_range(-200.0..200.0), rng.gen_range(-200.0..200.0)),
            rng.gen_range(0.0..360.0),
            ElementKind::Source(SourceConfig {
                polarization_angle: rng.gen_range(0.0..180.0),
                ..SourceConfig::default()
            }),
        ));
    }
    for i in 0..rng.gen_range(1..12) {
        let kind = random_kind(rng);
        elements.push(Element::new(
            format!("e{}", i),
            Point::new(rng.gen_range(-200.0..200.0), rng.gen_range(-200.0..200.0)),
            rng.gen_range(0.0..360.0),
            kind,
        ));
    }
    Scene::new(elements)
}

#[test]
fn random_scenes_terminate_and_conserve_energy() {
    let limits = TraceLimits::default();
    let mut rng = StdRng::seed_from_u64(0x5eed);
    for _ in 0..40 {
        let scene = random_scene(&mut rng);
        let result = compute(&scene);
        assert!(result.rays.len() <= limits.max_rays);
        for ray in &result.rays {
            assert!(ray.points.len() >= 2 && ray.points.len() <= limits.max_bounces + 1);
            assert!(ray
                .points
                .iter()
                .all(|p| p.x.is_finite() && p.y.is_finite()));
            assert!(ray.intensity > limits.min_intensity);
        }

        let emitted = scene
            .elements()
            .iter()
            .filter(|e| matches!(e.kind, ElementKind::Source(_)))
            .count() as f64;
        let absorbed: f64 = scene
            .elements()
            .iter()
            .filter(|e| {
                matches!(
                    e.kind,
                    ElementKind::Detector(_)
                        | ElementKind::PolarizationDetector(_)
                        | ElementKind::FiberCoupler(_)
                )
            })
            .filter_map(|e| result.power(&e.id))
            .sum();
        assert!(absorbed >= 0.0);
        assert!(absorbed <= emitted + 1e-9, "{} > {}", absorbed, emitted);

        assert_eq!(result, compute(&scene));
    }
}

#[test]
fn parallel_batch_matches_sequential() {
    let mut rng = StdRng::seed_from_u64(7);
    let mut scenes: Vec<Scene> = (0..8).map(|_| random_scene(&mut rng)).collect();
    scenes.push(bench_scene());
    let engine = Engine::default();
    let sequential: Vec<TraceResult> = scenes.iter().map(|scene| engine.compute(scene)).collect();
    assert_eq!(engine.compute_many(&scenes), sequential);
}
