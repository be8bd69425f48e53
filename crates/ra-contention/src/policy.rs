//! Attempt policies
//!
//! One interface, two variants: the ordered multi-attempt policy under test
//! and the single-attempt baseline it is compared against. A policy only
//! decides which satellite (if any) receives this slot's preamble; the
//! terminal's barring vector and attempt order are computed beforehand in the
//! planning phase.

use crate::terminal::Terminal;
use crate::{Result, ScenarioError};
use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Chooses the target satellite for a terminal's attempt this slot, or `None`
/// to back off silently. Returned values index the scheduler's satellite
/// list.
pub trait AttemptPolicy {
    fn choose_target(&self, terminal: &Terminal, rng: &mut dyn RngCore) -> Option<usize>;
}

/// Walk the terminal's attempt order; the first satellite whose ACB trial
/// passes gets the preamble, later ones are not tried this slot.
pub struct OrderedMultiAttempt;

impl AttemptPolicy for OrderedMultiAttempt {
    fn choose_target(&self, terminal: &Terminal, rng: &mut dyn RngCore) -> Option<usize> {
        for &i in terminal.order() {
            if rng.gen::<f64>() < terminal.barring()[i] {
                return Some(terminal.visible()[i]);
            }
        }
        None
    }
}

/// Baseline: one uniformly chosen visible satellite, one ACB trial, no retry
/// across satellites within the slot.
pub struct SingleAttempt;

impl AttemptPolicy for SingleAttempt {
    fn choose_target(&self, terminal: &Terminal, rng: &mut dyn RngCore) -> Option<usize> {
        let k = terminal.visible().len();
        if k == 0 {
            return None;
        }
        let i = rng.gen_range(0..k);
        if rng.gen::<f64>() < terminal.barring()[i] {
            Some(terminal.visible()[i])
        } else {
            None
        }
    }
}

/// Policy variant selector, part of the scenario parameter surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyKind {
    Ordered,
    Single,
}

impl PolicyKind {
    pub fn build(&self) -> Box<dyn AttemptPolicy> {
        match self {
            PolicyKind::Ordered => Box::new(OrderedMultiAttempt),
            PolicyKind::Single => Box::new(SingleAttempt),
        }
    }
}

impl FromStr for PolicyKind {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "ordered" => Ok(PolicyKind::Ordered),
            "single" => Ok(PolicyKind::Single),
            other => Err(ScenarioError::InvalidParameter(format!(
                "unknown policy '{other}', expected 'ordered' or 'single'"
            ))),
        }
    }
}

impl std::fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PolicyKind::Ordered => write!(f, "ordered"),
            PolicyKind::Single => write!(f, "single"),
        }
    }
}
