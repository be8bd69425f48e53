//! Terminal (UE) agent
//!
//! Two-state packet lifecycle: Idle until the traffic model activates a
//! packet, then Active until the packet either succeeds or exhausts its delay
//! budget and is dropped. The visible-satellite set, barring vector and
//! attempt order are per-slot derived views, recomputed every slot and never
//! carried across a slot boundary.

use crate::sky::SkyModel;
use crate::BarringConfig;
use chrono::{DateTime, Utc};
use orbital_planes::visibility::GroundPoint;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashSet;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrafficState {
    Idle,
    Active,
}

pub struct Terminal {
    pub id: u32,
    pub location: GroundPoint,
    state: TrafficState,
    /// Delay budget d_B of the current packet, slots.
    budget: u32,
    /// Slots the current packet has been waiting, 0 ≤ d ≤ d_B while Active.
    delay: u32,
    pub successes: u64,
    pub losses: u64,
    visible: Vec<usize>,
    barring: Vec<f64>,
    order: Vec<usize>,
}

impl Terminal {
    pub fn new(id: u32, location: GroundPoint) -> Self {
        Self {
            id,
            location,
            state: TrafficState::Idle,
            budget: 0,
            delay: 0,
            successes: 0,
            losses: 0,
            visible: Vec::new(),
            barring: Vec::new(),
            order: Vec::new(),
        }
    }

    pub fn is_active(&self) -> bool {
        self.state == TrafficState::Active
    }

    pub fn delay(&self) -> u32 {
        self.delay
    }

    pub fn budget(&self) -> u32 {
        self.budget
    }

    /// Idle → Active on packet arrival: delay resets, a budget is assigned,
    /// the stale visible set is cleared pending recomputation.
    pub fn activate(&mut self, budget: u32) {
        debug_assert_eq!(self.state, TrafficState::Idle);
        self.state = TrafficState::Active;
        self.budget = budget;
        self.delay = 0;
        self.visible.clear();
    }

    /// Age a retained Active packet by one slot. The drop check runs
    /// immediately after the increment: the instant delay would exceed the
    /// budget, the packet is dropped and the terminal is Idle again.
    /// Returns true when the packet was dropped.
    pub fn age_slot(&mut self) -> bool {
        if self.state != TrafficState::Active {
            return false;
        }
        self.delay += 1;
        if self.delay > self.budget {
            self.losses += 1;
            self.state = TrafficState::Idle;
            self.delay = 0;
            trace!("terminal {} dropped packet after budget exhaustion", self.id);
            return true;
        }
        false
    }

    /// Replace the visible-satellite view for this slot. Recomputed for every
    /// terminal regardless of state: a packet arriving next slot must
    /// immediately know its candidate satellites.
    pub fn set_visible(&mut self, indices: Vec<usize>) {
        self.visible = indices;
    }

    pub fn visible(&self) -> &[usize] {
        &self.visible
    }

    pub fn barring(&self) -> &[f64] {
        &self.barring
    }

    pub fn order(&self) -> &[usize] {
        &self.order
    }

    /// Planning phase: recompute the per-visible-satellite barring vector and
    /// the attempt order. Idle terminals, and active ones with an empty
    /// visible set, plan nothing this slot.
    pub fn plan(
        &mut self,
        sky: &dyn SkyModel,
        at: DateTime<Utc>,
        cfg: &BarringConfig,
        rng: &mut impl Rng,
    ) {
        self.barring.clear();
        self.order.clear();
        if self.state != TrafficState::Active || self.visible.is_empty() {
            return;
        }

        let k = self.visible.len();
        for &sat in &self.visible {
            let gamma = sky.remaining_pass_s(&self.location, sat, at);
            self.barring.push(barring_probability(
                self.delay,
                self.budget,
                k,
                gamma,
                sky.max_pass_s(),
                cfg,
            ));
        }

        self.order = (0..k).collect();
        self.order.shuffle(rng);
    }

    /// Feedback phase: consume the slot-wide success list. Success resets the
    /// packet sub-state; anything else is retained and ages next slot.
    pub fn feedback(&mut self, slot_successes: &HashSet<u32>) {
        if self.state == TrafficState::Active && slot_successes.contains(&self.id) {
            self.successes += 1;
            self.state = TrafficState::Idle;
            self.delay = 0;
        }
    }
}

/// Barring probability for one visible satellite.
///
/// Folds delay urgency (how close the packet is to its budget) and coverage
/// urgency (how soon this satellite leaves the sky) into the combined score
/// `S = ((d/d_B)^p + ((1/K)(1 - γ/T_max))^p)^(1/p)`, then maps it through
/// `p_ACB = clamp(x1·S^x2 + x3, 0, 1)`.
///
/// A zero budget counts as full delay urgency; the packet is already at the
/// drop edge.
pub fn barring_probability(
    delay: u32,
    budget: u32,
    visible_count: usize,
    remaining_pass_s: f64,
    max_pass_s: f64,
    cfg: &BarringConfig,
) -> f64 {
    let p = cfg.exponent;
    let delay_urgency = if budget == 0 {
        1.0
    } else {
        delay as f64 / budget as f64
    };
    let coverage_urgency =
        ((1.0 / visible_count as f64) * (1.0 - remaining_pass_s / max_pass_s)).max(0.0);

    let score = (delay_urgency.powf(p) + coverage_urgency.powf(p)).powf(1.0 / p);
    (cfg.x1 * score.powf(cfg.x2) + cfg.x3).clamp(0.0, 1.0)
}
