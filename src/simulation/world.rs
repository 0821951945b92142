//! Simulation state: everything one run owns

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ahash::{AHashMap, AHashSet};
use tokio::sync::mpsc;
use tracing::info;

use crate::command::codec::ReplayFile;
use crate::command::log::CommandLog;
use crate::command::replay::ReplayCursor;
use crate::core::clock::format_clock;
use crate::core::config::SimulationConfig;
use crate::core::error::{Result, SimError};
use crate::core::types::{SimTime, Tick, TrainId};
use crate::events::dispatcher::EventDispatcher;
use crate::events::factory::EventFactory;
use crate::events::scheduler::EventScheduler;
use crate::network::graph::Network;
use crate::safety::risk::RiskAssessor;
use crate::safety::traffic::TrafficController;
use crate::scenario::loader::{build_trains, load_network, load_trains, report_rejected};
use crate::simulation::reload::ReloadRequest;
use crate::simulation::report::{NullReporter, Reporter};
use crate::simulation::tick::{run_simulation_tick, SimulationEvent};
use crate::train::entity::Train;

/// Cooperative cancellation flag, checked once per tick
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Definition files the run was built from
#[derive(Debug, Clone, PartialEq)]
pub struct SourceFiles {
    pub network: PathBuf,
    pub trains: PathBuf,
}

/// Whether business logic runs or recorded commands are re-applied
#[derive(Debug, Clone)]
pub enum RunMode {
    Live,
    Replay(ReplayCursor),
}

impl RunMode {
    pub fn is_replay(&self) -> bool {
        matches!(self, Self::Replay(_))
    }
}

pub struct Simulation {
    pub config: SimulationConfig,
    pub network: Network,
    /// Invariant: `trains[i].id == TrainId(i)`
    pub trains: Vec<Train>,
    pub(crate) names: AHashMap<String, usize>,
    pub risk: RiskAssessor,
    pub traffic: TrafficController,
    pub scheduler: EventScheduler,
    pub factory: EventFactory,
    pub dispatcher: EventDispatcher,
    pub log: CommandLog,
    pub mode: RunMode,
    pub current_tick: Tick,
    pub sources: Option<SourceFiles>,
    pub(crate) reporter: Box<dyn Reporter>,
    pub(crate) next_report: SimTime,
    pub(crate) reloads: Option<mpsc::Receiver<ReloadRequest>>,
    stop: StopHandle,
}

impl Simulation {
    /// Live simulation over an already built network and fleet
    ///
    /// Trains are re-numbered so ids match their index.
    pub fn new(config: SimulationConfig, network: Network, trains: Vec<Train>) -> Self {
        let trains: Vec<Train> = trains
            .into_iter()
            .enumerate()
            .map(|(i, mut t)| {
                t.id = TrainId(i as u32);
                t
            })
            .collect();
        let names = trains
            .iter()
            .enumerate()
            .map(|(i, t)| (t.name.clone(), i))
            .collect();

        let mut dispatcher = EventDispatcher::new();
        dispatcher.rebuild(&network, &trains);

        Self {
            traffic: TrafficController::new(&config),
            factory: EventFactory::new(config.seed, config.events.clone()),
            next_report: config.start_time,
            config,
            network,
            trains,
            names,
            risk: RiskAssessor::new(),
            scheduler: EventScheduler::new(),
            dispatcher,
            log: CommandLog::new(false),
            mode: RunMode::Live,
            current_tick: 0,
            sources: None,
            reporter: Box::new(NullReporter),
            reloads: None,
            stop: StopHandle::new(),
        }
    }

    /// Load definition files and build a live simulation
    ///
    /// Invalid trains are logged and left out.
    pub fn from_files(config: SimulationConfig, network: &Path, trains: &Path) -> Result<Self> {
        config.validate()?;
        let net = load_network(network)?;
        let (specs, mut rejected) = load_trains(trains)?;
        let (fleet, unbuilt) = build_trains(&specs, &net, 0, &AHashSet::new());
        rejected.extend(unbuilt);
        report_rejected(&rejected);
        info!(trains = fleet.len(), omitted = rejected.len(), "fleet built");

        let mut sim = Self::new(config, net, fleet);
        sim.sources = Some(SourceFiles {
            network: network.to_path_buf(),
            trains: trains.to_path_buf(),
        });
        Ok(sim)
    }

    /// Rebuild the recorded run's inputs and switch to replay
    ///
    /// Simulation parameters come from the replay header. Only the reporting
    /// and watcher intervals of `local` apply.
    pub fn from_replay(local: SimulationConfig, replay: ReplayFile) -> Result<Self> {
        replay.validate()?;
        let config = SimulationConfig {
            report_interval_s: local.report_interval_s,
            watch_interval_ms: local.watch_interval_ms,
            ..replay.effective_config()
        };
        if config.tick_seconds != local.tick_seconds || config.start_time != local.start_time {
            info!(
                tick_seconds = config.tick_seconds,
                start_time = config.start_time,
                "using the recorded clock"
            );
        }

        let network = PathBuf::from(&replay.network_file);
        let trains = PathBuf::from(&replay.train_file);
        let mut sim = Self::from_files(config, &network, &trains).map_err(|e| {
            SimError::Replay(format!("cannot rebuild recorded inputs: {}", e))
        })?;
        sim.dispatcher.set_train_effects(false);
        sim.mode = RunMode::Replay(ReplayCursor::new(replay.commands));
        info!(seed = sim.config.seed, "replay loaded");
        Ok(sim)
    }

    pub fn with_recording(mut self, recording: bool) -> Self {
        self.log.set_recording(recording);
        self
    }

    pub fn set_reporter(&mut self, reporter: Box<dyn Reporter>) {
        self.reporter = reporter;
    }

    /// Feed hot-reload requests from a watcher
    pub fn attach_reloads(&mut self, receiver: mpsc::Receiver<ReloadRequest>) {
        self.reloads = Some(receiver);
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Simulation time at the start of the current tick
    pub fn now(&self) -> SimTime {
        self.config.time_at(self.current_tick)
    }

    pub fn train_by_name(&self, name: &str) -> Option<&Train> {
        self.names.get(name).and_then(|&i| self.trains.get(i))
    }

    pub(crate) fn train_index(&self, name: &str) -> Option<usize> {
        self.names.get(name).copied()
    }

    pub(crate) fn add_trains(&mut self, trains: Vec<Train>) {
        for train in trains {
            self.names.insert(train.name.clone(), self.trains.len());
            self.trains.push(train);
        }
    }

    pub fn active_trains(&self) -> usize {
        self.trains.iter().filter(|t| t.is_active()).count()
    }

    pub fn finished_trains(&self) -> usize {
        self.trains.iter().filter(|t| t.finished).count()
    }

    /// Nothing left to simulate
    ///
    /// Never true while watching for reloads or in round-trip mode.
    pub fn is_done(&self) -> bool {
        if self.reloads.is_some() || self.config.round_trip {
            return false;
        }
        if let RunMode::Replay(cursor) = &self.mode {
            if !cursor.is_finished() {
                return false;
            }
        }
        self.trains.iter().all(|t| t.finished)
    }

    /// Advance one tick
    pub fn step(&mut self) -> Vec<SimulationEvent> {
        run_simulation_tick(self)
    }

    /// Run until `until`, a stop request, or nothing is left to do
    ///
    /// Returns the number of ticks run.
    pub fn run_until(&mut self, until: SimTime) -> u64 {
        let first = self.current_tick;
        while self.now() < until && !self.stop.is_stop_requested() && !self.is_done() {
            self.step();
        }
        let ran = self.current_tick - first;
        info!(
            ticks = ran,
            time = %format_clock(self.now()),
            finished = self.finished_trains(),
            total = self.trains.len(),
            "simulation stopped"
        );
        ran
    }

    /// The recorded run, ready to be saved
    pub fn replay_file(&self) -> Result<ReplayFile> {
        let sources = self.sources.as_ref().ok_or_else(|| {
            SimError::Replay("run was not built from definition files".into())
        })?;
        Ok(ReplayFile::new(
            sources.network.to_string_lossy(),
            sources.trains.to_string_lossy(),
            self.config.clone(),
            self.log.commands().to_vec(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stop_handle_is_shared() {
        let a = StopHandle::new();
        let b = a.clone();
        assert!(!a.is_stop_requested());
        b.request_stop();
        assert!(a.is_stop_requested());
    }

    #[test]
    fn test_empty_simulation_is_done() {
        let sim = Simulation::new(SimulationConfig::default(), Network::new(), Vec::new());
        assert!(sim.is_done());
        assert_eq!(sim.now(), 0.0);
        assert!(sim.replay_file().is_err());
    }
}
