//! Contention scheduler
//!
//! Drives slots `n = 0..N-1` at a fixed RA-opportunity period. Per slot the
//! six phases run strictly in order over all entities; collision resolution
//! observes a complete, immutable snapshot of the attempt phase. Nothing in
//! the steady-state loop can fail: all validation happens at setup.

use crate::policy::{AttemptPolicy, PolicyKind};
use crate::satellite::SatelliteNode;
use crate::sky::SkyModel;
use crate::terminal::Terminal;
use crate::traffic::{ArrivalSchedule, TrafficModel};
use crate::{BarringConfig, BudgetModel, Result, ScenarioError};
use chrono::{DateTime, Duration, Utc};
use orbital_planes::visibility::GroundPoint;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

/// Terminals are scattered uniformly within this box around the scenario
/// ground center, degrees.
const TERMINAL_SCATTER_DEG: f64 = 0.5;

/// Full parameter surface of one simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioConfig {
    pub terminals: usize,
    pub slots: u32,
    /// Preamble-space size Z per satellite.
    pub preamble_space: u32,
    /// RA-opportunity period, milliseconds. One slot.
    pub rao_ms: u64,
    pub traffic: TrafficModel,
    pub budget: BudgetModel,
    pub barring: BarringConfig,
    pub policy: PolicyKind,
    /// Ground center the terminal population is scattered around.
    pub ground: GroundPoint,
    pub start_time: DateTime<Utc>,
    pub seed: u64,
}

impl ScenarioConfig {
    fn validate(&self) -> Result<()> {
        if self.terminals == 0 {
            return Err(ScenarioError::InvalidParameter(
                "terminal count must be positive".into(),
            ));
        }
        if self.slots == 0 {
            return Err(ScenarioError::InvalidParameter(
                "slot count must be positive".into(),
            ));
        }
        if self.preamble_space == 0 {
            return Err(ScenarioError::InvalidParameter(
                "preamble space must be positive".into(),
            ));
        }
        if self.rao_ms == 0 {
            return Err(ScenarioError::InvalidParameter(
                "RAO period must be positive".into(),
            ));
        }
        // Negated comparison so NaN is rejected too.
        if !(self.barring.exponent > 0.0) {
            return Err(ScenarioError::InvalidParameter(
                "barring exponent must be positive".into(),
            ));
        }
        match self.traffic {
            TrafficModel::Bernoulli { activation_prob } => {
                if !(0.0..=1.0).contains(&activation_prob) {
                    return Err(ScenarioError::InvalidParameter(
                        "activation probability must be within [0, 1]".into(),
                    ));
                }
            }
            TrafficModel::Burst { window_slots } => {
                if window_slots == 0 {
                    return Err(ScenarioError::InvalidParameter(
                        "burst window must span at least one slot".into(),
                    ));
                }
            }
        }
        if let BudgetModel::Uniform { min, max } = self.budget {
            if min > max {
                return Err(ScenarioError::InvalidParameter(
                    "budget range is inverted".into(),
                ));
            }
        }
        Ok(())
    }
}

/// Run-level aggregate handed to the reporting layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub total_successes: u64,
    pub total_losses: u64,
    /// Successful accesses per RAO slot.
    pub throughput_per_slot: f64,
    /// Successful accesses per second of simulated time.
    pub throughput_per_second: f64,
    /// Successes over offered packets; `None` when no traffic was offered.
    pub success_rate: Option<f64>,
    pub slots: u32,
    pub elapsed_s: f64,
    /// Per-slot success counts, one entry per RAO.
    pub throughput_history: Vec<u32>,
}

/// One configured simulation run.
pub struct Simulation {
    cfg: ScenarioConfig,
    sky: Box<dyn SkyModel>,
    nodes: Vec<SatelliteNode>,
    terminals: Vec<Terminal>,
    policy: Box<dyn AttemptPolicy>,
    schedule: Option<ArrivalSchedule>,
    rng: ChaCha8Rng,
}

impl Simulation {
    /// Validate the scenario and build all entities. Setup is the only place
    /// a run can fail; an empty constellation is rejected here.
    pub fn new(cfg: ScenarioConfig, sky: Box<dyn SkyModel>) -> Result<Self> {
        cfg.validate()?;
        if sky.satellite_count() == 0 {
            return Err(ScenarioError::NoSatellites);
        }

        let mut rng = ChaCha8Rng::seed_from_u64(cfg.seed);

        let nodes = (0..sky.satellite_count())
            .map(|i| SatelliteNode::new(i as u32, cfg.preamble_space))
            .collect();

        let terminals = (0..cfg.terminals)
            .map(|i| {
                let lat = cfg.ground.latitude_deg
                    + rng.gen_range(-TERMINAL_SCATTER_DEG..TERMINAL_SCATTER_DEG);
                let lon = cfg.ground.longitude_deg
                    + rng.gen_range(-TERMINAL_SCATTER_DEG..TERMINAL_SCATTER_DEG);
                Terminal::new(i as u32, GroundPoint::new(lat, lon))
            })
            .collect();

        let schedule = match cfg.traffic {
            TrafficModel::Burst { window_slots } => Some(ArrivalSchedule::generate(
                cfg.terminals,
                cfg.slots,
                window_slots,
                &mut rng,
            )),
            TrafficModel::Bernoulli { .. } => None,
        };

        let policy = cfg.policy.build();

        info!(
            "Scenario ready: {} terminals, {} satellites, {} slots, Z={}, policy={}",
            cfg.terminals,
            sky.satellite_count(),
            cfg.slots,
            cfg.preamble_space,
            cfg.policy
        );

        Ok(Self {
            cfg,
            sky,
            nodes,
            terminals,
            policy,
            schedule,
            rng,
        })
    }

    pub fn terminals(&self) -> &[Terminal] {
        &self.terminals
    }

    /// Run all slots and aggregate the result.
    pub fn run(&mut self) -> RunSummary {
        let slot_duration = Duration::milliseconds(self.cfg.rao_ms as i64);
        let mut throughput_history = Vec::with_capacity(self.cfg.slots as usize);

        for slot in 0..self.cfg.slots {
            let at = self.cfg.start_time + slot_duration * slot as i32;

            // Phase 1: traffic. An active packet ages (and may drop); an idle
            // terminal may receive a new arrival.
            for (i, terminal) in self.terminals.iter_mut().enumerate() {
                if terminal.is_active() {
                    terminal.age_slot();
                } else {
                    let arrives = match self.cfg.traffic {
                        TrafficModel::Bernoulli { activation_prob } => {
                            self.rng.gen::<f64>() < activation_prob
                        }
                        TrafficModel::Burst { .. } => self
                            .schedule
                            .as_ref()
                            .map(|s| s.arrives(i, slot))
                            .unwrap_or(false),
                    };
                    if arrives {
                        let budget = self.cfg.budget.draw(&mut self.rng);
                        terminal.activate(budget);
                    }
                }
            }

            // Phase 2: visibility, recomputed for every terminal regardless
            // of state.
            for terminal in self.terminals.iter_mut() {
                let visible: Vec<usize> = (0..self.sky.satellite_count())
                    .filter(|&s| self.sky.visible(&terminal.location, s, at))
                    .collect();
                terminal.set_visible(visible);
            }

            // Phase 3: planning.
            for terminal in self.terminals.iter_mut() {
                terminal.plan(self.sky.as_ref(), at, &self.cfg.barring, &mut self.rng);
            }

            // Phase 4: attempts. A terminal with no visible satellite skips
            // the phase and simply ages next slot.
            for terminal in &self.terminals {
                if !terminal.is_active() || terminal.visible().is_empty() {
                    continue;
                }
                if let Some(target) = self.policy.choose_target(terminal, &mut self.rng) {
                    self.nodes[target].receive_preamble(terminal.id, &mut self.rng);
                }
            }

            // Phase 5: resolution, once per node, over the complete attempt
            // snapshot.
            let mut slot_successes: HashSet<u32> = HashSet::new();
            for node in self.nodes.iter_mut() {
                slot_successes.extend(node.resolve_slot());
            }
            throughput_history.push(slot_successes.len() as u32);

            // Phase 6: feedback.
            for terminal in self.terminals.iter_mut() {
                terminal.feedback(&slot_successes);
            }

            if !slot_successes.is_empty() {
                debug!("slot {slot}: {} successful accesses", slot_successes.len());
            }
        }

        self.summarize(throughput_history)
    }

    fn summarize(&self, throughput_history: Vec<u32>) -> RunSummary {
        let total_successes: u64 = throughput_history.iter().map(|&c| c as u64).sum();
        let total_losses: u64 = self.terminals.iter().map(|t| t.losses).sum();
        let elapsed_s = self.cfg.slots as f64 * self.cfg.rao_ms as f64 / 1000.0;

        let offered = total_successes + total_losses;
        let success_rate = (offered > 0).then(|| total_successes as f64 / offered as f64);

        RunSummary {
            total_successes,
            total_losses,
            throughput_per_slot: total_successes as f64 / self.cfg.slots as f64,
            throughput_per_second: total_successes as f64 / elapsed_s,
            success_rate,
            slots: self.cfg.slots,
            elapsed_s,
            throughput_history,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sky::UniformSky;
    use chrono::TimeZone;

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 12, 20, 42, 0).unwrap()
    }

    fn base_config() -> ScenarioConfig {
        ScenarioConfig {
            terminals: 10,
            slots: 100,
            preamble_space: 54,
            rao_ms: 640,
            traffic: TrafficModel::Bernoulli {
                activation_prob: 0.5,
            },
            budget: BudgetModel::Fixed(10),
            barring: BarringConfig::default(),
            policy: PolicyKind::Ordered,
            ground: GroundPoint::new(25.03, 121.56),
            start_time: start(),
            seed: 1,
        }
    }

    fn uniform_sky(satellites: usize) -> Box<UniformSky> {
        Box::new(UniformSky::new(satellites, 600.0, start()))
    }

    /// A sky whose satellites never rise above the horizon.
    struct EmptySky;

    impl SkyModel for EmptySky {
        fn satellite_count(&self) -> usize {
            1
        }
        fn visible(&self, _: &GroundPoint, _: usize, _: DateTime<Utc>) -> bool {
            false
        }
        fn remaining_pass_s(&self, _: &GroundPoint, _: usize, _: DateTime<Utc>) -> f64 {
            0.0
        }
        fn max_pass_s(&self) -> f64 {
            600.0
        }
    }

    #[test]
    fn setup_rejects_degenerate_parameters() {
        let sky = uniform_sky(2);
        let mut cfg = base_config();
        cfg.terminals = 0;
        assert!(matches!(
            Simulation::new(cfg, sky),
            Err(ScenarioError::InvalidParameter(_))
        ));

        let mut cfg = base_config();
        cfg.preamble_space = 0;
        assert!(Simulation::new(cfg, uniform_sky(2)).is_err());

        let mut cfg = base_config();
        cfg.traffic = TrafficModel::Bernoulli {
            activation_prob: 1.5,
        };
        assert!(Simulation::new(cfg, uniform_sky(2)).is_err());
    }

    #[test]
    fn setup_rejects_a_non_finite_barring_exponent() {
        // NaN would flow through powf and bar every terminal forever.
        let mut cfg = base_config();
        cfg.barring.exponent = f64::NAN;
        assert!(matches!(
            Simulation::new(cfg, uniform_sky(2)),
            Err(ScenarioError::InvalidParameter(_))
        ));

        let mut cfg = base_config();
        cfg.barring.exponent = -1.0;
        assert!(Simulation::new(cfg, uniform_sky(2)).is_err());
    }

    #[test]
    fn setup_rejects_an_empty_constellation() {
        let cfg = base_config();
        assert!(matches!(
            Simulation::new(cfg, uniform_sky(0)),
            Err(ScenarioError::NoSatellites)
        ));
    }

    #[test]
    fn sole_transmitter_with_open_barring_succeeds_every_slot() {
        // Single terminal, barring fixed at 1.0: no backoff is ever possible,
        // and with nobody to collide with every active slot succeeds.
        let mut cfg = base_config();
        cfg.terminals = 1;
        cfg.slots = 50;
        cfg.policy = PolicyKind::Single;
        cfg.traffic = TrafficModel::Bernoulli {
            activation_prob: 1.0,
        };
        cfg.barring = BarringConfig::always_pass();

        let mut sim = Simulation::new(cfg, uniform_sky(1)).unwrap();
        let summary = sim.run();

        assert_eq!(summary.total_successes, 50);
        assert_eq!(summary.total_losses, 0);
        assert_eq!(summary.success_rate, Some(1.0));
        assert!(summary.throughput_history.iter().all(|&c| c == 1));
    }

    #[test]
    fn forced_collisions_drop_each_packet_exactly_once_after_the_budget() {
        // Two terminals, one satellite, one preamble code: every attempted
        // slot collides. Budget 3 means a packet survives its arrival slot
        // plus three aged slots and drops on the fourth aging step.
        let mut cfg = base_config();
        cfg.terminals = 2;
        cfg.slots = 5;
        cfg.preamble_space = 1;
        cfg.budget = BudgetModel::Fixed(3);
        cfg.traffic = TrafficModel::Bernoulli {
            activation_prob: 1.0,
        };
        cfg.barring = BarringConfig::always_pass();

        let mut sim = Simulation::new(cfg, uniform_sky(1)).unwrap();
        let summary = sim.run();

        assert_eq!(summary.total_successes, 0);
        // Both packets arrived at slot 0 and dropped at slot 4, exactly once.
        assert_eq!(summary.total_losses, 2);
        assert_eq!(summary.success_rate, Some(0.0));
    }

    #[test]
    fn empty_visible_set_skips_attempts_without_aborting() {
        let mut cfg = base_config();
        cfg.terminals = 5;
        cfg.slots = 40;
        cfg.budget = BudgetModel::Fixed(3);
        cfg.traffic = TrafficModel::Bernoulli {
            activation_prob: 1.0,
        };

        let mut sim = Simulation::new(cfg, Box::new(EmptySky)).unwrap();
        let summary = sim.run();

        assert_eq!(summary.total_successes, 0);
        assert!(summary.total_losses > 0);
        assert!(summary.throughput_history.iter().all(|&c| c == 0));
    }

    #[test]
    fn no_offered_traffic_reports_undefined_success_rate() {
        let mut cfg = base_config();
        cfg.traffic = TrafficModel::Bernoulli {
            activation_prob: 0.0,
        };

        let mut sim = Simulation::new(cfg, uniform_sky(2)).unwrap();
        let summary = sim.run();
        assert_eq!(summary.total_successes, 0);
        assert_eq!(summary.total_losses, 0);
        assert_eq!(summary.success_rate, None);
    }

    #[test]
    fn runs_are_deterministic_per_seed() {
        let cfg = base_config();
        let a = Simulation::new(cfg.clone(), uniform_sky(2)).unwrap().run();
        let b = Simulation::new(cfg, uniform_sky(2)).unwrap().run();
        assert_eq!(a.throughput_history, b.throughput_history);
        assert_eq!(a.total_losses, b.total_losses);
    }

    #[test]
    fn burst_traffic_offers_one_packet_per_terminal_per_window() {
        let mut cfg = base_config();
        cfg.terminals = 20;
        cfg.slots = 64;
        cfg.traffic = TrafficModel::Burst { window_slots: 16 };
        cfg.budget = BudgetModel::Fixed(2);
        cfg.barring = BarringConfig::always_pass();

        let mut sim = Simulation::new(cfg, uniform_sky(4)).unwrap();
        let summary = sim.run();

        // 20 terminals x 4 windows = 80 offered packets. A packet whose
        // successor arrives while it is still pending is not re-offered, so
        // the resolved total can fall slightly short, never over.
        let resolved = summary.total_successes + summary.total_losses;
        assert!(resolved > 0);
        assert!(resolved <= 80, "resolved {resolved} packets");
    }
}
