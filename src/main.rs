//! Railsim - Entry Point
//!
//! Builds a simulation from definition files (or a recorded replay), runs
//! it to the requested time and optionally records the command log.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tokio::runtime::Runtime;

use railsim::command::ReplayFile;
use railsim::core::clock::{format_clock, parse_clock};
use railsim::core::config::SimulationConfig;
use railsim::core::error::Result;
use railsim::simulation::{spawn_watcher, RunMode, Simulation, TracingReporter};

/// Railway network simulator
#[derive(Parser, Debug)]
#[command(name = "railsim")]
#[command(about = "Simulate trains on a rail network with disruptive events and exact replay")]
struct Args {
    /// Network definition (TOML)
    #[arg(long, default_value = "data/network.toml")]
    network: PathBuf,

    /// Train definitions (TOML)
    #[arg(long, default_value = "data/trains.toml")]
    trains: PathBuf,

    /// Simulation configuration (TOML, partial files allowed)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Seed for the event generator
    #[arg(long)]
    seed: Option<u64>,

    /// Stop time of day, HH:MM[:SS] (hours may exceed 24)
    #[arg(long)]
    until: Option<String>,

    /// Write the command log to this replay file
    #[arg(long)]
    record: Option<PathBuf>,

    /// Replay a recorded run instead of simulating
    #[arg(long, conflicts_with = "record")]
    replay: Option<PathBuf>,

    /// Send finished trains back along their route
    #[arg(long)]
    round_trip: bool,

    /// Reload definition files when they change
    #[arg(long)]
    watch: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("railsim=info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => SimulationConfig::from_toml_file(path)?,
        None => SimulationConfig::default(),
    };
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if args.round_trip {
        config.round_trip = true;
    }

    // Runtime for the file watcher and Ctrl-C handling
    let rt = Runtime::new()?;

    let mut sim = match &args.replay {
        Some(path) => {
            if args.seed.is_some() || args.round_trip {
                tracing::warn!("--seed and --round-trip are taken from the replay file");
            }
            let replay = ReplayFile::load(path)?;
            Simulation::from_replay(config, replay)?
        }
        None => Simulation::from_files(config, &args.network, &args.trains)?
            .with_recording(args.record.is_some()),
    };
    sim.set_reporter(Box::new(TracingReporter));

    let stop = sim.stop_handle();
    let ctrl_c = stop.clone();
    rt.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, stopping after this tick");
            ctrl_c.request_stop();
        }
    });

    if args.watch {
        if sim.mode.is_replay() {
            tracing::warn!("--watch is ignored while replaying");
        } else {
            let interval = Duration::from_millis(sim.config.watch_interval_ms);
            let (rx, _task) = spawn_watcher(
                rt.handle(),
                args.network.clone(),
                args.trains.clone(),
                interval,
                stop.clone(),
            );
            sim.attach_reloads(rx);
        }
    }

    let until = match (&args.until, &sim.mode) {
        (Some(text), _) => parse_clock(text)?,
        (None, RunMode::Replay(cursor)) => {
            cursor.last_time().unwrap_or(sim.config.start_time) + sim.config.tick_seconds
        }
        (None, RunMode::Live) => sim.config.start_time + 24.0 * 3600.0,
    };

    tracing::info!(
        seed = sim.config.seed,
        trains = sim.trains.len(),
        until = %format_clock(until),
        "Railsim starting..."
    );
    sim.run_until(until);
    stop.request_stop();

    if let Some(path) = &args.record {
        sim.replay_file()?.save(path)?;
        tracing::info!(path = %path.display(), commands = sim.log.len(), "replay written");
    }

    Ok(())
}
