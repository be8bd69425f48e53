//! RA Contention Scenario Runner
//!
//! Runs the slotted random-access contention simulation, either against a
//! real TLE-derived constellation subset (plane selection) or against the
//! uniform everything-visible sky.
//!
//! Usage:
//!   ra-sim --terminals 100 --slots 1000 --policy ordered
//!   ra-sim --tle-file data/starlink.tle --prefix STARLINK --top-planes 4
//!   ra-sim --sweep 50,100,150 --output results.json

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::Parser;
use orbital_planes::visibility::GroundPoint;
use orbital_planes::{filter_by_prefix, load_tle_file, select_planes, OrbitalObject};
use ra_contention::{
    BarringConfig, BudgetModel, PolicyKind, PropagatedSky, RunSummary, ScenarioConfig, Simulation,
    SkyModel, TrafficModel, UniformSky,
};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "ra-sim",
    about = "Satellite random-access contention simulator with access-class barring"
)]
struct Args {
    /// TLE catalog file; omitted means the uniform all-visible sky
    #[arg(long)]
    tle_file: Option<PathBuf>,

    /// Catalog name prefix for the operator's objects of interest
    #[arg(long, default_value = "STARLINK")]
    prefix: String,

    /// Number of orbital planes to keep from the catalog
    #[arg(long, default_value_t = 4)]
    top_planes: usize,

    /// Serving satellite count for the uniform sky (no TLE file)
    #[arg(long, default_value_t = 2)]
    satellites: usize,

    /// Ground center latitude, degrees
    #[arg(long, default_value_t = 25.03)]
    lat: f64,

    /// Ground center longitude, degrees
    #[arg(long, default_value_t = 121.56)]
    lon: f64,

    /// Minimum elevation for a satellite to serve a terminal, degrees
    #[arg(long, default_value_t = 10.0)]
    min_elevation: f64,

    /// Terminal (UE) count
    #[arg(short, long, default_value_t = 100)]
    terminals: usize,

    /// Number of RA-opportunity slots to simulate
    #[arg(short, long, default_value_t = 1000)]
    slots: u32,

    /// Preamble-space size Z per satellite
    #[arg(long, default_value_t = 54)]
    preambles: u32,

    /// RA-opportunity period, milliseconds
    #[arg(long, default_value_t = 640)]
    rao_ms: u64,

    /// Burst-window duration for the bursty traffic model, milliseconds
    #[arg(long, default_value_t = 10_000)]
    burst_ms: u64,

    /// Traffic model: "bernoulli" or "burst"
    #[arg(long, default_value = "bernoulli")]
    traffic: String,

    /// Per-slot activation probability for the bernoulli traffic model
    #[arg(long, default_value_t = 0.5)]
    activation_prob: f64,

    /// Delay budget per packet, slots
    #[arg(long, default_value_t = 10)]
    budget: u32,

    /// If set, budgets are drawn uniformly from budget..=budget_max
    #[arg(long)]
    budget_max: Option<u32>,

    /// Urgency-score norm exponent p
    #[arg(long, default_value_t = 4.0)]
    exponent: f64,

    /// Barring mapping weights x1,x2,x3
    #[arg(long, default_value = "1,2,0.05")]
    weights: String,

    /// Maximum satellite pass duration T_max, seconds
    #[arg(long, default_value_t = 600.0)]
    max_pass_s: f64,

    /// Attempt policy: "ordered" (multi-attempt) or "single" (baseline)
    #[arg(long, default_value = "ordered")]
    policy: PolicyKind,

    /// Reference time, RFC 3339; defaults to now
    #[arg(long)]
    at: Option<String>,

    /// RNG seed
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Write the run summary as pretty JSON
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Sweep terminal counts, comparing both policies (e.g. "50,100,150")
    #[arg(long)]
    sweep: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn parse_weights(s: &str) -> Result<(f64, f64, f64)> {
    let parts: Vec<f64> = s
        .split(',')
        .map(|p| p.trim().parse::<f64>())
        .collect::<std::result::Result<_, _>>()
        .with_context(|| format!("invalid weights '{s}'"))?;
    match parts.as_slice() {
        [x1, x2, x3] => Ok((*x1, *x2, *x3)),
        _ => bail!("weights must be three comma-separated values, got '{s}'"),
    }
}

/// Serving constellation for one run: either selected plane members or the
/// uniform sky parameters.
enum Constellation {
    Planes(Vec<OrbitalObject>),
    Uniform(usize),
}

impl Constellation {
    fn build_sky(&self, args: &Args, start: DateTime<Utc>) -> Box<dyn SkyModel> {
        match self {
            Constellation::Planes(members) => Box::new(PropagatedSky::new(
                members.clone(),
                args.min_elevation,
                args.rao_ms as f64 / 1000.0,
                args.max_pass_s,
            )),
            Constellation::Uniform(satellites) => {
                Box::new(UniformSky::new(*satellites, args.max_pass_s, start))
            }
        }
    }
}

fn scenario(args: &Args, start: DateTime<Utc>, terminals: usize, policy: PolicyKind) -> Result<ScenarioConfig> {
    // Checked here, ahead of the burst-window division below.
    if args.rao_ms == 0 {
        bail!("RAO period must be positive, got --rao-ms 0");
    }
    let (x1, x2, x3) = parse_weights(&args.weights)?;

    let traffic = match args.traffic.as_str() {
        "bernoulli" => TrafficModel::Bernoulli {
            activation_prob: args.activation_prob,
        },
        "burst" => TrafficModel::Burst {
            window_slots: (args.burst_ms / args.rao_ms).max(1) as u32,
        },
        other => bail!("unknown traffic model '{other}', expected 'bernoulli' or 'burst'"),
    };

    let budget = match args.budget_max {
        Some(max) => BudgetModel::Uniform {
            min: args.budget,
            max,
        },
        None => BudgetModel::Fixed(args.budget),
    };

    Ok(ScenarioConfig {
        terminals,
        slots: args.slots,
        preamble_space: args.preambles,
        rao_ms: args.rao_ms,
        traffic,
        budget,
        barring: BarringConfig {
            exponent: args.exponent,
            x1,
            x2,
            x3,
        },
        policy,
        ground: GroundPoint::new(args.lat, args.lon),
        start_time: start,
        seed: args.seed,
    })
}

fn run_once(
    args: &Args,
    constellation: &Constellation,
    start: DateTime<Utc>,
    terminals: usize,
    policy: PolicyKind,
) -> Result<RunSummary> {
    let cfg = scenario(args, start, terminals, policy)?;
    let sky = constellation.build_sky(args, start);
    let mut sim = Simulation::new(cfg, sky)?;
    Ok(sim.run())
}

fn log_summary(summary: &RunSummary) {
    info!("{}", "=".repeat(60));
    info!("SUMMARY");
    info!("{}", "=".repeat(60));
    info!("Total successful accesses: {}", summary.total_successes);
    info!("Total dropped packets:     {}", summary.total_losses);
    info!(
        "Average throughput:        {:.3} packets/slot ({:.3} packets/s)",
        summary.throughput_per_slot, summary.throughput_per_second
    );
    match summary.success_rate {
        Some(rate) => info!("Success rate:              {:.4}", rate),
        None => info!("Success rate:              n/a (no traffic offered)"),
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let start = match &args.at {
        Some(s) => DateTime::parse_from_rfc3339(s)
            .with_context(|| format!("invalid --at timestamp '{s}'"))?
            .with_timezone(&Utc),
        None => Utc::now(),
    };

    info!("{}", "=".repeat(60));
    info!("NTN Random-Access Contention Simulator");
    info!("{}", "=".repeat(60));

    let constellation = match &args.tle_file {
        Some(path) => {
            let catalog = load_tle_file(path)?;
            let filtered = filter_by_prefix(catalog, &args.prefix);
            let ground = GroundPoint::new(args.lat, args.lon);
            let members = select_planes(&filtered, start, &ground, args.top_planes);
            if members.is_empty() {
                bail!(
                    "no constellation available: catalog {} yielded no visible planes",
                    path.display()
                );
            }
            Constellation::Planes(members)
        }
        None => Constellation::Uniform(args.satellites),
    };

    if let Some(sweep) = &args.sweep {
        let counts: Vec<usize> = sweep
            .split(',')
            .map(|p| p.trim().parse::<usize>())
            .collect::<std::result::Result<_, _>>()
            .with_context(|| format!("invalid sweep list '{sweep}'"))?;

        let mut results = Vec::new();
        for &count in &counts {
            for policy in [PolicyKind::Ordered, PolicyKind::Single] {
                let summary = run_once(&args, &constellation, start, count, policy)?;
                info!(
                    "{:>6} terminals | {:7} | {:.3} packets/slot | success rate {}",
                    count,
                    policy.to_string(),
                    summary.throughput_per_slot,
                    summary
                        .success_rate
                        .map(|r| format!("{r:.4}"))
                        .unwrap_or_else(|| "n/a".into())
                );
                results.push(serde_json::json!({
                    "terminals": count,
                    "policy": policy.to_string(),
                    "summary": summary,
                }));
            }
        }

        if let Some(path) = &args.output {
            info!("Writing sweep results to {}", path.display());
            let writer = BufWriter::new(File::create(path)?);
            serde_json::to_writer_pretty(writer, &results)?;
        }
        return Ok(());
    }

    let summary = run_once(&args, &constellation, start, args.terminals, args.policy)?;
    log_summary(&summary);

    if let Some(path) = &args.output {
        info!("Writing summary to {}", path.display());
        let writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer_pretty(writer, &summary)?;
    }

    Ok(())
}
