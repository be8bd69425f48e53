//! Random-Access Contention Library
//!
//! Slotted simulation of many IoT terminals contending for a small preamble
//! space on a shared satellite uplink, under probabilistic access-class
//! barring (ACB). One slot is one RA opportunity (RAO); per slot the
//! scheduler runs traffic, visibility, planning, attempt, resolution and
//! feedback phases in strict order.

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod policy;
pub mod satellite;
pub mod scheduler;
pub mod sky;
pub mod terminal;
pub mod traffic;

pub use policy::PolicyKind;
pub use satellite::SatelliteNode;
pub use scheduler::{RunSummary, ScenarioConfig, Simulation};
pub use sky::{PropagatedSky, SkyModel, UniformSky};
pub use terminal::Terminal;
pub use traffic::TrafficModel;

#[derive(Error, Debug)]
pub enum ScenarioError {
    #[error("Invalid scenario parameter: {0}")]
    InvalidParameter(String),
    #[error("No satellites available to simulate")]
    NoSatellites,
}

pub type Result<T> = std::result::Result<T, ScenarioError>;

/// How a newly arrived packet's delay budget is assigned, in slots.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum BudgetModel {
    /// Every packet gets the same budget.
    Fixed(u32),
    /// Budget drawn uniformly from `min..=max` per packet.
    Uniform { min: u32, max: u32 },
}

impl BudgetModel {
    pub fn draw(&self, rng: &mut impl Rng) -> u32 {
        match *self {
            BudgetModel::Fixed(b) => b,
            BudgetModel::Uniform { min, max } => rng.gen_range(min..=max),
        }
    }
}

/// Parameters of the combined urgency score and the barring mapping.
///
/// `S = ((d/d_B)^p + ((1/K)(1 - γ/T_max))^p)^(1/p)` and
/// `p_ACB = clamp(x1·S^x2 + x3, 0, 1)`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct BarringConfig {
    /// Norm exponent `p` folding delay urgency and coverage urgency.
    pub exponent: f64,
    pub x1: f64,
    pub x2: f64,
    pub x3: f64,
}

impl Default for BarringConfig {
    fn default() -> Self {
        Self {
            exponent: 4.0,
            x1: 1.0,
            x2: 2.0,
            x3: 0.05,
        }
    }
}

impl BarringConfig {
    /// A config whose barring probability is always 1.0; every ACB trial
    /// passes. Used as the open-loop control condition.
    pub fn always_pass() -> Self {
        Self {
            exponent: 4.0,
            x1: 0.0,
            x2: 1.0,
            x3: 1.0,
        }
    }
}
