use std::collections::BTreeMap;

use crate::element::{Color, ElementKind, Scene};
use crate::polarization::{PolarizationReading, Stokes};

/// One branch's contribution to the read-out, keyed by element index.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Deposit {
    Power { element: usize, amount: f64 },
    /// already weighted by the branch intensity
    Stokes { element: usize, stokes: Stokes },
    Color { element: usize, color: Color },
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Accumulator {
    power: BTreeMap<usize, f64>,
    stokes: BTreeMap<usize, Stokes>,
    colors: BTreeMap<usize, Color>,
}

/// Accumulated read-out keyed by element id.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Readout {
    pub hits: BTreeMap<String, f64>,
    pub polarization: BTreeMap<String, PolarizationReading>,
    pub colors: BTreeMap<String, Color>,
}

impl Accumulator {
    /// an accumulator with a zero entry for every power-sensitive element
    pub fn new(scene: &Scene) -> Self {
        let mut accumulator = Self::default();
        for (index, element) in scene.elements().iter().enumerate() {
            if element.kind.is_power_sensitive() {
                accumulator.power.insert(index, 0.0);
            }
            if let ElementKind::PolarizationDetector(_) = element.kind {
                accumulator.stokes.insert(index, Stokes::default());
            }
        }
        accumulator
    }

    pub fn deposit(mut self, deposit: Deposit) -> Self {
        match deposit {
            Deposit::Power { element, amount } => {
                *self.power.entry(element).or_insert(0.0) += amount;
            }
            Deposit::Stokes { element, stokes } => {
                *self.stokes.entry(element).or_default() += stokes;
            }
            Deposit::Color { element, color } => {
                // last writer wins
                self.colors.insert(element, color);
            }
        }
        self
    }

    pub fn power(&self, element: usize) -> Option<f64> {
        self.power.get(&element).copied()
    }

    /// reduces the sums once into id-keyed read-outs
    pub fn finish(self, scene: &Scene) -> Readout {
        let id = |index: usize| scene.elements()[index].id.clone();
        let mut readout = Readout::default();
        for (index, amount) in self.power {
            *readout.hits.entry(id(index)).or_insert(0.0) += amount;
        }
        let mut stokes: BTreeMap<String, Stokes> = BTreeMap::new();
        for (index, sum) in self.stokes {
            *stokes.entry(id(index)).or_default() += sum;
        }
        readout.polarization = stokes
            .into_iter()
            .map(|(id, sum)| (id, PolarizationReading::from(sum)))
            .collect();
        for (index, color) in self.colors {
            readout.colors.insert(id(index), color);
        }
        readout
    }
}
