//! Periodic reporting: event notices, fleet dashboard, per-train journeys

use tracing::info;

use crate::core::clock::format_clock;
use crate::core::types::{SimTime, TrainId};
use crate::core::units::{m_to_km, ms_to_kmh};
use crate::events::scheduler::EventNotice;
use crate::network::graph::Network;
use crate::train::entity::Train;

const STRIP_WIDTH: usize = 24;

/// Fleet-wide summary at one instant
#[derive(Debug, Clone, PartialEq)]
pub struct DashboardSnapshot {
    pub time: SimTime,
    pub active_trains: usize,
    pub total_trains: usize,
    pub completed_trains: usize,
    pub active_events: usize,
}

/// One train's progress at one instant
#[derive(Debug, Clone, PartialEq)]
pub struct JourneySnapshot {
    pub time: SimTime,
    pub train: TrainId,
    pub name: String,
    pub from: String,
    pub to: String,
    pub remaining_km: f64,
    pub state: &'static str,
    pub speed_kmh: f64,
    /// Occupancy of the current rail in the direction of travel, e.g.
    /// `[....o.......>...........]` (`>` this train, `o` others)
    pub strip: String,
}

impl JourneySnapshot {
    pub fn capture(
        train: &Train,
        trains: &[Train],
        network: &Network,
        time: SimTime,
    ) -> Option<Self> {
        let segment = train.current_segment()?;
        let (from, to) = network.segment_endpoints(segment);
        let length_m = train.current_rail_length_m(network);
        let others: Vec<f64> = trains
            .iter()
            .filter(|t| t.id != train.id && t.holds_rail && !t.finished)
            .filter_map(|t| {
                let theirs = t.current_segment()?;
                if theirs.rail != segment.rail {
                    return None;
                }
                // Measure from our entry end of the rail
                Some(if theirs.direction == segment.direction {
                    t.position_m
                } else {
                    length_m - t.position_m
                })
            })
            .collect();

        Some(Self {
            time,
            train: train.id,
            name: train.name.clone(),
            from: from.to_string(),
            to: to.to_string(),
            remaining_km: m_to_km(train.remaining_route_m(network)),
            state: train.state.name(),
            speed_kmh: ms_to_kmh(train.velocity_ms),
            strip: occupancy_strip(length_m, train.position_m, &others, STRIP_WIDTH),
        })
    }
}

/// Render a rail as a fixed-width ASCII strip with one cell per
/// `length_m / width` metres
pub fn occupancy_strip(length_m: f64, own_m: f64, others_m: &[f64], width: usize) -> String {
    let cell = |position: f64| -> usize {
        if length_m <= 0.0 || width == 0 {
            return 0;
        }
        let fraction = (position / length_m).clamp(0.0, 1.0);
        ((fraction * width as f64) as usize).min(width.saturating_sub(1))
    };

    let mut cells = vec!['.'; width];
    for &position in others_m {
        if let Some(c) = cells.get_mut(cell(position)) {
            *c = 'o';
        }
    }
    if let Some(c) = cells.get_mut(cell(own_m)) {
        *c = '>';
    }

    let mut strip = String::with_capacity(width + 2);
    strip.push('[');
    strip.extend(cells);
    strip.push(']');
    strip
}

/// Receiver of simulation reports
pub trait Reporter: Send {
    fn event_activated(&mut self, _notice: &EventNotice) {}
    fn event_ended(&mut self, _notice: &EventNotice) {}
    fn dashboard(&mut self, _snapshot: &DashboardSnapshot) {}
    fn journey(&mut self, _snapshot: &JourneySnapshot) {}
}

/// Emits every report through `tracing`
#[derive(Debug, Default)]
pub struct TracingReporter;

impl Reporter for TracingReporter {
    fn event_activated(&mut self, notice: &EventNotice) {
        info!(
            time = %format_clock(notice.time),
            kind = notice.type_name,
            "event started: {}",
            notice.description
        );
    }

    fn event_ended(&mut self, notice: &EventNotice) {
        info!(
            time = %format_clock(notice.time),
            kind = notice.type_name,
            "event ended: {}",
            notice.description
        );
    }

    fn dashboard(&mut self, s: &DashboardSnapshot) {
        info!(
            time = %format_clock(s.time),
            active = s.active_trains,
            total = s.total_trains,
            completed = s.completed_trains,
            events = s.active_events,
            "dashboard"
        );
    }

    fn journey(&mut self, j: &JourneySnapshot) {
        info!(
            time = %format_clock(j.time),
            train = %j.name,
            "{} -> {} {} {:.1} km left, {} at {:.0} km/h",
            j.from,
            j.to,
            j.strip,
            j.remaining_km,
            j.state,
            j.speed_kmh
        );
    }
}

/// Discards every report
#[derive(Debug, Default)]
pub struct NullReporter;

impl Reporter for NullReporter {}
