//! Traffic models
//!
//! Packet arrival generation. The Bernoulli model draws per slot; the burst
//! model pre-computes one arrival slot per terminal per burst window from a
//! front-loaded Beta(3,4) distribution at setup. The schedule is read-only
//! during the run; the loop never regenerates it.

use rand::Rng;
use rand_distr::{Beta, Distribution};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Beta shape parameters of the bursty arrival profile (3GPP-style
/// front-loaded surge within each window).
const BURST_BETA_ALPHA: f64 = 3.0;
const BURST_BETA_BETA: f64 = 4.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum TrafficModel {
    /// Independent per-slot activation draw for each idle terminal.
    Bernoulli { activation_prob: f64 },
    /// One pre-drawn arrival per terminal per burst window of `window_slots`
    /// slots.
    Burst { window_slots: u32 },
}

/// Pre-computed burst arrivals: per terminal, the sorted slot indices at
/// which a new packet becomes ready.
#[derive(Debug, Clone)]
pub struct ArrivalSchedule {
    arrivals: Vec<Vec<u32>>,
}

impl ArrivalSchedule {
    /// Draw one arrival slot per terminal per burst window covering
    /// `total_slots`.
    pub fn generate(
        terminals: usize,
        total_slots: u32,
        window_slots: u32,
        rng: &mut impl Rng,
    ) -> Self {
        let beta = Beta::new(BURST_BETA_ALPHA, BURST_BETA_BETA)
            .expect("burst Beta shape constants are valid");

        let mut arrivals = vec![Vec::new(); terminals];
        let mut window_start = 0u32;
        while window_start < total_slots {
            for slots in arrivals.iter_mut() {
                let offset = (beta.sample(rng) * window_slots as f64) as u32;
                let slot = (window_start + offset.min(window_slots - 1)).min(total_slots - 1);
                slots.push(slot);
            }
            window_start += window_slots;
        }

        debug!(
            "Generated burst schedule: {terminals} terminals, {} windows",
            total_slots.div_ceil(window_slots)
        );
        Self { arrivals }
    }

    /// Whether a packet arrives for `terminal` at `slot`.
    pub fn arrives(&self, terminal: usize, slot: u32) -> bool {
        self.arrivals[terminal].binary_search(&slot).is_ok()
    }
}
