use log::warn;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::math::{direction_from_degrees, Point, Vec2};

/// Display tag carried by a source and inherited by every ray it spawns.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const RED: Color = Color { r: 255, g: 0, b: 0 };

    pub fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

impl Default for Color {
    fn default() -> Self {
        Color::RED
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl FromStr for Color {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        if hex.len() != 6 || !hex.is_ascii() {
            return Err(format!("expected a #rrggbb color, got {:?}", s));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|e| format!("bad color {:?}: {}", s, e))
        };
        Ok(Color::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

impl TryFrom<String> for Color {
    type Error = String;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Color> for String {
    fn from(color: Color) -> String {
        color.to_string()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LensShape {
    Convex,
    Concave,
    PlanoConvex,
    PlanoConcave,
}

impl Default for LensShape {
    fn default() -> Self {
        LensShape::Convex
    }
}

impl LensShape {
    pub fn is_converging(self) -> bool {
        matches!(self, LensShape::Convex | LensShape::PlanoConvex)
    }

    pub fn is_plano(self) -> bool {
        matches!(self, LensShape::PlanoConvex | LensShape::PlanoConcave)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub power: f64,
    /// degrees from horizontal in the Jones frame
    pub polarization_angle: f64,
    pub color: Color,
    pub waist_diameter: f64,
    pub wavelength: f64,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            power: 1.0,
            polarization_angle: 0.0,
            color: Color::RED,
            waist_diameter: 1.0,
            // HeNe, in scene units (mm)
            wavelength: 632.8e-6,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    pub length: f64,
    pub reflectivity: f64,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            length: 40.0,
            reflectivity: 1.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LensConfig {
    /// magnitude is used; `shape` decides converging or diverging
    pub focal_length: f64,
    pub shape: LensShape,
    pub diameter: f64,
}

impl Default for LensConfig {
    fn default() -> Self {
        Self {
            focal_length: 100.0,
            shape: LensShape::Convex,
            diameter: 40.0,
        }
    }
}

impl LensConfig {
    /// signed focal length used by the Gaussian beam transform
    pub fn signed_focal_length(&self) -> f64 {
        if self.shape.is_converging() {
            self.focal_length.abs()
        } else {
            -self.focal_length.abs()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeamSplitterConfig {
    pub length: f64,
    /// fraction transmitted straight through; the rest is reflected
    pub transmission: f64,
}

impl Default for BeamSplitterConfig {
    fn default() -> Self {
        Self {
            length: 40.0,
            transmission: 0.5,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolarizerConfig {
    pub length: f64,
    /// transmission axis, degrees
    pub axis: f64,
}

impl Default for PolarizerConfig {
    fn default() -> Self {
        Self {
            length: 30.0,
            axis: 0.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolarizingBeamSplitterConfig {
    pub length: f64,
    /// transmitted axis, degrees; the perpendicular axis is reflected
    pub axis: f64,
}

impl Default for PolarizingBeamSplitterConfig {
    fn default() -> Self {
        Self {
            length: 40.0,
            axis: 0.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApertureStopConfig {
    pub length: f64,
    pub aperture_diameter: f64,
}

impl Default for ApertureStopConfig {
    fn default() -> Self {
        Self {
            length: 40.0,
            aperture_diameter: 10.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub length: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self { length: 40.0 }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModulatorConfig {
    pub length: f64,
    /// fraction diffracted into the first order
    pub efficiency: f64,
    /// first-order deviation, degrees counterclockwise
    pub deviation: f64,
}

impl Default for ModulatorConfig {
    fn default() -> Self {
        Self {
            length: 30.0,
            efficiency: 0.5,
            deviation: 5.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FiberCouplerConfig {
    pub length: f64,
    pub core_diameter: f64,
    /// acceptance half-angle, degrees
    pub acceptance_angle: f64,
}

impl Default for FiberCouplerConfig {
    fn default() -> Self {
        Self {
            length: 20.0,
            core_diameter: 5.0,
            acceptance_angle: 10.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CavityConfig {
    /// height of each mirror
    pub length: f64,
    /// separation between the two mirrors
    pub cavity_length: f64,
    pub reflectivity: f64,
}

impl Default for CavityConfig {
    fn default() -> Self {
        Self {
            length: 40.0,
            cavity_length: 100.0,
            reflectivity: 0.95,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WavePlateConfig {
    pub length: f64,
    /// fast axis, degrees
    pub fast_axis: f64,
}

impl Default for WavePlateConfig {
    fn default() -> Self {
        Self {
            length: 30.0,
            fast_axis: 0.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ElementKind {
    Source(SourceConfig),
    Mirror(MirrorConfig),
    Lens(LensConfig),
    BeamSplitter(BeamSplitterConfig),
    PolarizingBeamSplitter(PolarizingBeamSplitterConfig),
    ApertureStop(ApertureStopConfig),
    Detector(DetectorConfig),
    PolarizationDetector(DetectorConfig),
    AcoustoOpticModulator(ModulatorConfig),
    FiberCoupler(FiberCouplerConfig),
    CavityMirrorPair(CavityConfig),
    HalfWavePlate(WavePlateConfig),
    QuarterWavePlate(WavePlateConfig),
    Polarizer(PolarizerConfig),
}

impl ElementKind {
    pub fn name(&self) -> &'static str {
        match self {
            ElementKind::Source(_) => "source",
            ElementKind::Mirror(_) => "mirror",
            ElementKind::Lens(_) => "lens",
            ElementKind::BeamSplitter(_) => "beam_splitter",
            ElementKind::PolarizingBeamSplitter(_) => "polarizing_beam_splitter",
            ElementKind::ApertureStop(_) => "aperture_stop",
            ElementKind::Detector(_) => "detector",
            ElementKind::PolarizationDetector(_) => "polarization_detector",
            ElementKind::AcoustoOpticModulator(_) => "acousto_optic_modulator",
            ElementKind::FiberCoupler(_) => "fiber_coupler",
            ElementKind::CavityMirrorPair(_) => "cavity_mirror_pair",
            ElementKind::HalfWavePlate(_) => "half_wave_plate",
            ElementKind::QuarterWavePlate(_) => "quarter_wave_plate",
            ElementKind::Polarizer(_) => "polarizer",
        }
    }

    /// kinds that report accumulated power in the trace result
    pub fn is_power_sensitive(&self) -> bool {
        matches!(
            self,
            ElementKind::Detector(_)
                | ElementKind::PolarizationDetector(_)
                | ElementKind::PolarizingBeamSplitter(_)
                | ElementKind::FiberCoupler(_)
        )
    }

    /// clamps every parameter into its physical range, replacing
    /// non-finite values with the kind's default.
    fn sanitized(self, id: &str) -> Self {
        let fixer = Fixer { id, kind: self.name() };
        match self {
            ElementKind::Source(c) => {
                let d = SourceConfig::default();
                ElementKind::Source(SourceConfig {
                    power: fixer.non_negative("power", c.power, d.power),
                    polarization_angle: fixer.finite(
                        "polarization_angle",
                        c.polarization_angle,
                        d.polarization_angle,
                    ),
                    color: c.color,
                    waist_diameter: fixer.positive(
                        "waist_diameter",
                        c.waist_diameter,
                        d.waist_diameter,
                    ),
                    wavelength: fixer.positive("wavelength", c.wavelength, d.wavelength),
                })
            }
            ElementKind::Mirror(c) => {
                let d = MirrorConfig::default();
                ElementKind::Mirror(MirrorConfig {
                    length: fixer.non_negative("length", c.length, d.length),
                    reflectivity: fixer.ratio("reflectivity", c.reflectivity, d.reflectivity),
                })
            }
            ElementKind::Lens(c) => {
                let d = LensConfig::default();
                ElementKind::Lens(LensConfig {
                    focal_length: fixer.finite("focal_length", c.focal_length, d.focal_length),
                    shape: c.shape,
                    diameter: fixer.non_negative("diameter", c.diameter, d.diameter),
                })
            }
            ElementKind::BeamSplitter(c) => {
                let d = BeamSplitterConfig::default();
                ElementKind::BeamSplitter(BeamSplitterConfig {
                    length: fixer.non_negative("length", c.length, d.length),
                    transmission: fixer.ratio("transmission", c.transmission, d.transmission),
                })
            }
            ElementKind::PolarizingBeamSplitter(c) => {
                let d = PolarizingBeamSplitterConfig::default();
                ElementKind::PolarizingBeamSplitter(PolarizingBeamSplitterConfig {
                    length: fixer.non_negative("length", c.length, d.length),
                    axis: fixer.finite("axis", c.axis, d.axis),
                })
            }
            ElementKind::ApertureStop(c) => {
                let d = ApertureStopConfig::default();
                ElementKind::ApertureStop(ApertureStopConfig {
                    length: fixer.non_negative("length", c.length, d.length),
                    aperture_diameter: fixer.non_negative(
                        "aperture_diameter",
                        c.aperture_diameter,
                        d.aperture_diameter,
                    ),
                })
            }
            ElementKind::Detector(c) => ElementKind::Detector(fixer.detector(c)),
            ElementKind::PolarizationDetector(c) => {
                ElementKind::PolarizationDetector(fixer.detector(c))
            }
            ElementKind::AcoustoOpticModulator(c) => {
                let d = ModulatorConfig::default();
                ElementKind::AcoustoOpticModulator(ModulatorConfig {
                    length: fixer.non_negative("length", c.length, d.length),
                    efficiency: fixer.ratio("efficiency", c.efficiency, d.efficiency),
                    deviation: fixer.finite("deviation", c.deviation, d.deviation),
                })
            }
            ElementKind::FiberCoupler(c) => {
                let d = FiberCouplerConfig::default();
                ElementKind::FiberCoupler(FiberCouplerConfig {
                    length: fixer.non_negative("length", c.length, d.length),
                    core_diameter: fixer.non_negative(
                        "core_diameter",
                        c.core_diameter,
                        d.core_diameter,
                    ),
                    acceptance_angle: fixer.non_negative(
                        "acceptance_angle",
                        c.acceptance_angle,
                        d.acceptance_angle,
                    ),
                })
            }
            ElementKind::CavityMirrorPair(c) => {
                let d = CavityConfig::default();
                ElementKind::CavityMirrorPair(CavityConfig {
                    length: fixer.non_negative("length", c.length, d.length),
                    cavity_length: fixer.non_negative(
                        "cavity_length",
                        c.cavity_length,
                        d.cavity_length,
                    ),
                    reflectivity: fixer.ratio("reflectivity", c.reflectivity, d.reflectivity),
                })
            }
            ElementKind::HalfWavePlate(c) => ElementKind::HalfWavePlate(fixer.wave_plate(c)),
            ElementKind::QuarterWavePlate(c) => ElementKind::QuarterWavePlate(fixer.wave_plate(c)),
            ElementKind::Polarizer(c) => {
                let d = PolarizerConfig::default();
                ElementKind::Polarizer(PolarizerConfig {
                    length: fixer.non_negative("length", c.length, d.length),
                    axis: fixer.finite("axis", c.axis, d.axis),
                })
            }
        }
    }
}

struct Fixer<'a> {
    id: &'a str,
    kind: &'static str,
}

impl Fixer<'_> {
    fn replace(&self, field: &str, value: f64, fixed: f64) -> f64 {
        if value != fixed {
            warn!(
                "{} {:?}: {} = {} is out of range, using {}",
                self.kind, self.id, field, value, fixed
            );
        }
        fixed
    }

    fn finite(&self, field: &str, value: f64, default: f64) -> f64 {
        if value.is_finite() {
            value
        } else {
            self.replace(field, value, default)
        }
    }

    fn non_negative(&self, field: &str, value: f64, default: f64) -> f64 {
        if !value.is_finite() {
            self.replace(field, value, default)
        } else if value < 0.0 {
            self.replace(field, value, value.abs())
        } else {
            value
        }
    }

    fn positive(&self, field: &str, value: f64, default: f64) -> f64 {
        if value.is_finite() && value > 0.0 {
            value
        } else {
            self.replace(field, value, default)
        }
    }

    fn ratio(&self, field: &str, value: f64, default: f64) -> f64 {
        if !value.is_finite() {
            self.replace(field, value, default)
        } else if !(0.0..=1.0).contains(&value) {
            self.replace(field, value, value.clamp(0.0, 1.0))
        } else {
            value
        }
    }

    fn detector(&self, c: DetectorConfig) -> DetectorConfig {
        DetectorConfig {
            length: self.non_negative("length", c.length, DetectorConfig::default().length),
        }
    }

    fn wave_plate(&self, c: WavePlateConfig) -> WavePlateConfig {
        let d = WavePlateConfig::default();
        WavePlateConfig {
            length: self.non_negative("length", c.length, d.length),
            fast_axis: self.finite("fast_axis", c.fast_axis, d.fast_axis),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Element {
    pub id: String,
    pub position: Point,
    /// degrees counterclockwise; at 0 the element's front faces +x
    #[serde(default)]
    pub rotation: f64,
    #[serde(flatten)]
    pub kind: ElementKind,
}

impl Element {
    pub fn new(id: impl Into<String>, position: Point, rotation: f64, kind: ElementKind) -> Self {
        Self {
            id: id.into(),
            position,
            rotation,
            kind,
        }
    }

    /// world-space unit normal of the element's front face
    pub fn front(&self) -> Vec2 {
        direction_from_degrees(self.rotation)
    }
}

/// An immutable, sanitized collection of elements ready to be traced.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scene {
    elements: Vec<Element>,
}

impl Scene {
    pub fn new(elements: Vec<Element>) -> Self {
        let elements = elements
            .into_iter()
            .map(|mut element| {
                if !element.rotation.is_finite() {
                    warn!("element {:?} has a non-finite rotation, using 0", element.id);
                    element.rotation = 0.0;
                }
                let Element { id, position, rotation, kind } = element;
                let kind = kind.sanitized(&id);
                Element { id, position, rotation, kind }
            })
            .collect();
        Self { elements }
    }

    pub fn elements(&self) -> &[Element] {
        &self.elements
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

impl From<Vec<Element>> for Scene {
    fn from(elements: Vec<Element>) -> Self {
        Scene::new(elements)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_color_parse_and_display() {
        let color: Color = "#12ab9F".parse().unwrap();
        assert_eq!(color, Color::new(0x12, 0xab, 0x9f));
        assert_eq!(color.to_string(), "#12ab9f");
        assert!("#12ab".parse::<Color>().is_err());
        assert!("zzzzzz".parse::<Color>().is_err());
    }

    #[test]
    fn test_sanitize_clamps_ratios() {
        let scene = Scene::new(vec![
            Element::new(
                "bs",
                Point::origin(),
                f64::NAN,
                ElementKind::BeamSplitter(BeamSplitterConfig {
                    length: -10.0,
                    transmission: 1.7,
                }),
            ),
            Element::new(
                "src",
                Point::origin(),
                0.0,
                ElementKind::Source(SourceConfig {
                    wavelength: 0.0,
                    ..SourceConfig::default()
                }),
            ),
        ]);
        let bs = &scene.elements()[0];
        assert_eq!(bs.rotation, 0.0);
        assert_eq!(
            bs.kind,
            ElementKind::BeamSplitter(BeamSplitterConfig {
                length: 10.0,
                transmission: 1.0
            })
        );
        match &scene.elements()[1].kind {
            ElementKind::Source(c) => assert_eq!(c.wavelength, SourceConfig::default().wavelength),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_signed_focal_length() {
        let lens = LensConfig {
            focal_length: -50.0,
            shape: LensShape::PlanoConvex,
            ..LensConfig::default()
        };
        assert_eq!(lens.signed_focal_length(), 50.0);
        let lens = LensConfig {
            shape: LensShape::Concave,
            ..lens
        };
        assert_eq!(lens.signed_focal_length(), -50.0);
    }

    #[test]
    fn test_power_sensitive_kinds() {
        assert!(ElementKind::Detector(DetectorConfig::default()).is_power_sensitive());
        assert!(ElementKind::FiberCoupler(FiberCouplerConfig::default()).is_power_sensitive());
        assert!(!ElementKind::Mirror(MirrorConfig::default()).is_power_sensitive());
    }
}
