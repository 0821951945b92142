//! Event lifecycle: scheduled, then active, then expired
//!
//! Events activate in the first pipeline pass at or after their start time
//! and expire in the first pass at or after `start + duration`. Both steps
//! go through the dispatcher; expiry reverts exactly what activation did.
//! Signal failures stay enforced while active: every pass stops trains that
//! have reached the failed node since the previous one.

use tracing::{debug, info};

use crate::core::types::{EventId, RailId, SimTime, TrainId};
use crate::events::dispatcher::{DispatchOutcome, EventDispatcher, Phase};
use crate::events::kinds::{Event, EventKind};
use crate::network::graph::Network;
use crate::train::entity::Train;

/// Report of one lifecycle step
#[derive(Debug, Clone, PartialEq)]
pub struct EventNotice {
    pub id: EventId,
    pub time: SimTime,
    pub type_name: &'static str,
    pub description: String,
    pub phase: Phase,
    /// Rails the event restricted, with their previous limit (km/h)
    pub original_limits: Vec<(RailId, f64)>,
}

/// Everything one `advance` call changed
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchedulerOutcome {
    pub activated: Vec<EventNotice>,
    pub expired: Vec<EventNotice>,
    pub forced_stops: Vec<TrainId>,
    pub delayed: Vec<TrainId>,
}

#[derive(Debug, Clone, Default)]
pub struct EventScheduler {
    scheduled: Vec<Event>,
    active: Vec<Event>,
    next_id: u32,
}

impl EventScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an event; returns its id
    pub fn schedule(&mut self, kind: EventKind, start: SimTime, duration_s: SimTime) -> EventId {
        let id = EventId(self.next_id);
        self.next_id += 1;
        self.scheduled.push(Event::new(id, kind, start, duration_s));
        id
    }

    pub fn scheduled(&self) -> &[Event] {
        &self.scheduled
    }

    pub fn active(&self) -> &[Event] {
        &self.active
    }

    /// Scheduled and active events
    pub fn pending(&self) -> impl Iterator<Item = &Event> {
        self.scheduled.iter().chain(self.active.iter())
    }

    /// Scheduled and active events matching a predicate
    pub fn count_pending(&self, pred: impl Fn(&EventKind) -> bool) -> usize {
        self.pending().filter(|e| pred(&e.kind)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.scheduled.is_empty() && self.active.is_empty()
    }

    /// Drop every event without reverting effects
    ///
    /// Only valid when the network the effects lived on is discarded too.
    pub fn clear(&mut self) {
        self.scheduled.clear();
        self.active.clear();
    }

    /// Activate due events, then expire finished ones
    pub fn advance(
        &mut self,
        now: SimTime,
        network: &mut Network,
        trains: &mut [Train],
        dispatcher: &EventDispatcher,
    ) -> SchedulerOutcome {
        let mut outcome = SchedulerOutcome::default();
        let mut effects = DispatchOutcome::default();

        let (mut due, waiting): (Vec<Event>, Vec<Event>) = std::mem::take(&mut self.scheduled)
            .into_iter()
            .partition(|e| e.start <= now);
        self.scheduled = waiting;
        due.sort_by(|a, b| a.start.total_cmp(&b.start).then(a.id.cmp(&b.id)));

        for mut event in due {
            event.active = true;
            effects.merge(dispatcher.dispatch(&mut event, Phase::Activated, network, trains, now));
            let notice = notice(&event, Phase::Activated, now, network);
            info!(id = event.id.0, kind = event.type_name(), "{}", notice.description);
            outcome.activated.push(notice);
            self.active.push(event);
        }

        let (ended, running): (Vec<Event>, Vec<Event>) = std::mem::take(&mut self.active)
            .into_iter()
            .partition(|e| e.end() <= now);
        self.active = running;

        for mut event in ended {
            effects.merge(dispatcher.dispatch(&mut event, Phase::Expired, network, trains, now));
            event.active = false;
            debug!(id = event.id.0, kind = event.type_name(), "event expired");
            outcome.expired.push(notice(&event, Phase::Expired, now, network));
        }

        for event in &self.active {
            effects.merge(dispatcher.enforce(event, network, trains, now));
        }

        outcome.forced_stops = effects.forced_stops;
        outcome.delayed = effects.delayed;
        outcome
    }
}

fn notice(event: &Event, phase: Phase, now: SimTime, network: &Network) -> EventNotice {
    EventNotice {
        id: event.id,
        time: now,
        type_name: event.type_name(),
        description: event.describe(network),
        phase,
        original_limits: event.original_limits.clone(),
    }
}
