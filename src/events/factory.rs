//! Seeded random event generation
//!
//! Rolls once per simulated minute, in a fixed order (station delay,
//! maintenance, signal failure, weather), consuming exactly one probability
//! draw per kind per minute. Same seed, same network, same clock: same
//! events.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::core::config::{EventConfig, Range};
use crate::core::types::{EventId, NodeId, RailId, SimTime};
use crate::events::kinds::EventKind;
use crate::events::scheduler::EventScheduler;
use crate::network::graph::Network;

#[derive(Debug, Clone)]
pub struct EventFactory {
    rng: ChaCha8Rng,
    config: EventConfig,
    last_minute: Option<i64>,
}

impl EventFactory {
    pub fn new(seed: u64, config: EventConfig) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            config,
            last_minute: None,
        }
    }

    pub fn config(&self) -> &EventConfig {
        &self.config
    }

    /// Roll for new events if `now` falls in a minute not rolled yet
    ///
    /// Returns the ids of the events scheduled.
    pub fn maybe_generate(
        &mut self,
        now: SimTime,
        network: &Network,
        scheduler: &mut EventScheduler,
    ) -> Vec<EventId> {
        if !self.config.enabled || network.node_count() == 0 {
            return Vec::new();
        }
        let minute = (now / 60.0).floor() as i64;
        if self.last_minute == Some(minute) {
            return Vec::new();
        }
        self.last_minute = Some(minute);

        let mut created = Vec::new();

        let roll = self.rng.gen::<f64>();
        if roll < self.config.station_delay_probability {
            created.extend(self.station_delay(now, network, scheduler));
        }
        let roll = self.rng.gen::<f64>();
        if roll < self.config.maintenance_probability {
            created.extend(self.maintenance(now, network, scheduler));
        }
        let roll = self.rng.gen::<f64>();
        if roll < self.config.signal_failure_probability {
            created.extend(self.signal_failure(now, network, scheduler));
        }
        let roll = self.rng.gen::<f64>();
        if roll < self.config.weather_probability {
            created.extend(self.weather(now, network, scheduler));
        }

        created
    }

    fn station_delay(
        &mut self,
        now: SimTime,
        network: &Network,
        scheduler: &mut EventScheduler,
    ) -> Option<EventId> {
        let candidates: Vec<NodeId> = network
            .stations()
            .map(|n| n.id)
            .filter(|&id| !node_is_busy(scheduler, id))
            .collect();
        let node = self.pick(&candidates)?;
        let extra_dwell_s = self.sample(self.config.station_delay_extra_min) * 60.0;
        let duration = self.sample(self.config.station_delay_duration_min) * 60.0;
        let kind = EventKind::StationDelay {
            node,
            extra_dwell_s,
        };
        Some(self.schedule(kind, now, duration, scheduler))
    }

    fn maintenance(
        &mut self,
        now: SimTime,
        network: &Network,
        scheduler: &mut EventScheduler,
    ) -> Option<EventId> {
        let running =
            scheduler.count_pending(|k| matches!(k, EventKind::TrackMaintenance { .. }));
        if running >= self.config.max_concurrent_maintenance {
            return None;
        }
        let candidates: Vec<RailId> = network
            .rails()
            .iter()
            .map(|r| r.id)
            .filter(|&id| !rail_under_maintenance(scheduler, id))
            .collect();
        let rail = self.pick(&candidates)?;
        let speed_factor = self.sample(self.config.maintenance_speed_factor);
        let duration = self.sample(self.config.maintenance_duration_min) * 60.0;
        let kind = EventKind::TrackMaintenance { rail, speed_factor };
        Some(self.schedule(kind, now, duration, scheduler))
    }

    fn signal_failure(
        &mut self,
        now: SimTime,
        network: &Network,
        scheduler: &mut EventScheduler,
    ) -> Option<EventId> {
        let running = scheduler.count_pending(|k| matches!(k, EventKind::SignalFailure { .. }));
        if running >= self.config.max_concurrent_signal_failures {
            return None;
        }
        let candidates: Vec<NodeId> = network
            .nodes()
            .iter()
            .map(|n| n.id)
            .filter(|&id| !node_is_busy(scheduler, id))
            .collect();
        let node = self.pick(&candidates)?;
        let duration = self.sample(self.config.signal_failure_duration_min) * 60.0;
        let kind = EventKind::SignalFailure {
            node,
            stop_duration_s: self.config.signal_stop_duration_s,
        };
        Some(self.schedule(kind, now, duration, scheduler))
    }

    fn weather(
        &mut self,
        now: SimTime,
        network: &Network,
        scheduler: &mut EventScheduler,
    ) -> Option<EventId> {
        if scheduler.count_pending(|k| matches!(k, EventKind::Weather { .. })) > 0 {
            return None;
        }
        let candidates: Vec<NodeId> = network.nodes().iter().map(|n| n.id).collect();
        let center = self.pick(&candidates)?;
        let radius_hops = if self.config.max_weather_radius == 0 {
            0
        } else {
            self.rng.gen_range(1..=self.config.max_weather_radius)
        };
        let speed_factor = self.sample(self.config.weather_speed_factor);
        let duration = self.sample(self.config.weather_duration_min) * 60.0;
        let kind = EventKind::Weather {
            center,
            radius_hops,
            speed_factor,
            region: network.nodes_within(center, radius_hops),
        };
        Some(self.schedule(kind, now, duration, scheduler))
    }

    fn schedule(
        &mut self,
        kind: EventKind,
        now: SimTime,
        duration_s: SimTime,
        scheduler: &mut EventScheduler,
    ) -> EventId {
        let start = now + self.sample(self.config.lead_time_min) * 60.0;
        let id = scheduler.schedule(kind, start, duration_s);
        debug!(id = id.0, start, duration_s, "event scheduled");
        id
    }

    fn pick<T: Copy>(&mut self, candidates: &[T]) -> Option<T> {
        if candidates.is_empty() {
            return None;
        }
        Some(candidates[self.rng.gen_range(0..candidates.len())])
    }

    fn sample(&mut self, range: Range) -> f64 {
        if range.max <= range.min {
            return range.min;
        }
        self.rng.gen_range(range.min..=range.max)
    }
}

/// Node already carries a signal failure or station delay (scheduled or active)
fn node_is_busy(scheduler: &EventScheduler, node: NodeId) -> bool {
    scheduler.pending().any(|e| match e.kind {
        EventKind::SignalFailure { node: n, .. } | EventKind::StationDelay { node: n, .. } => {
            n == node
        }
        _ => false,
    })
}

fn rail_under_maintenance(scheduler: &EventScheduler, rail: RailId) -> bool {
    scheduler
        .pending()
        .any(|e| matches!(e.kind, EventKind::TrackMaintenance { rail: r, .. } if r == rail))
}
