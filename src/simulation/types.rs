//! Type definitions for the simulation.
//!
//! Contains the data structures shared across the simulation:
//! - Activity and event kind enums
//! - Event records produced on every store mutation
//! - The simulation clock used for relative-time stamping
//! - Communication channel aliases and queue constants

use chrono::{DateTime, Utc};
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_time::Instant;
use serde::Serialize;

/// Maximum number of nodes a scenario may contain. Bounds the task pools
/// spawned for per-node activities.
pub const MAX_NODE_COUNT: usize = 64;

/// Depth of the global event channel (activities→controller). Generous so
/// that bursts of ticks never stall an activity inside its critical section.
pub const EVENT_QUEUE_SIZE: usize = 1024;
/// Bounded channel used by activity tasks to publish events for the controller.
pub type EventQueue = embassy_sync::channel::Channel<CriticalSectionRawMutex, SimulationEvent, EVENT_QUEUE_SIZE>;
/// Receiver side of the event channel.
pub type EventQueueReceiver = embassy_sync::channel::Receiver<'static, CriticalSectionRawMutex, SimulationEvent, EVENT_QUEUE_SIZE>;
/// Sender side of the event channel.
pub type EventQueueSender = embassy_sync::channel::Sender<'static, CriticalSectionRawMutex, SimulationEvent, EVENT_QUEUE_SIZE>;

/// The four consumption activity kinds. Activities are data (kind + cost +
/// interval), not separate types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActivityKind {
    Idle,
    Transmit,
    Sense,
    Receive,
}

impl ActivityKind {
    /// Human-readable label used in log lines.
    pub fn label(&self) -> &'static str {
        match self {
            ActivityKind::Idle => "idle",
            ActivityKind::Transmit => "transmit",
            ActivityKind::Sense => "sense",
            ActivityKind::Receive => "receive",
        }
    }
}

/// Kind tag carried by every event record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Idle,
    Transmit,
    Sense,
    Receive,
    Harvest,
    /// Terminal marker, emitted exactly once when a node crosses the
    /// depletion threshold.
    Depleted,
}

impl From<ActivityKind> for EventKind {
    fn from(kind: ActivityKind) -> Self {
        match kind {
            ActivityKind::Idle => EventKind::Idle,
            ActivityKind::Transmit => EventKind::Transmit,
            ActivityKind::Sense => EventKind::Sense,
            ActivityKind::Receive => EventKind::Receive,
        }
    }
}

/// One structured record per energy-store mutation, plus the terminal marker.
#[derive(Debug, Clone, Serialize)]
pub struct EventRecord {
    /// Wall-clock timestamp captured at emission.
    pub wall_clock: DateTime<Utc>,
    /// Seconds elapsed since the simulation start instant.
    pub relative_time_secs: f64,
    /// Node whose store was mutated.
    pub node_id: u32,
    pub kind: EventKind,
    /// Signed energy delta: negative for debits, positive for credits,
    /// zero for the terminal marker.
    pub magnitude: f64,
    /// Store level immediately after the mutation.
    pub resulting_level: f64,
}

impl EventRecord {
    /// Record for a consumption debit.
    pub fn debit(clock: &SimulationClock, node_id: u32, kind: ActivityKind, cost: f64, resulting_level: f64) -> Self {
        Self {
            wall_clock: Utc::now(),
            relative_time_secs: clock.relative_secs(),
            node_id,
            kind: kind.into(),
            magnitude: -cost,
            resulting_level,
        }
    }

    /// Record for a harvest credit.
    pub fn credit(clock: &SimulationClock, node_id: u32, energy: f64, resulting_level: f64) -> Self {
        Self {
            wall_clock: Utc::now(),
            relative_time_secs: clock.relative_secs(),
            node_id,
            kind: EventKind::Harvest,
            magnitude: energy,
            resulting_level,
        }
    }

    /// Terminal marker for the node that crossed the depletion threshold.
    pub fn depleted(clock: &SimulationClock, node_id: u32, resulting_level: f64) -> Self {
        Self {
            wall_clock: Utc::now(),
            relative_time_secs: clock.relative_secs(),
            node_id,
            kind: EventKind::Depleted,
            magnitude: 0.0,
            resulting_level,
        }
    }
}

/// Envelope for messages flowing from activity tasks to the controller.
#[derive(Debug)]
pub enum SimulationEvent {
    /// A store mutation or the terminal marker.
    Record(EventRecord),
    /// An activity's timer loop has exited. `node_id` is `None` for the
    /// network-wide sink activity.
    ActivityStopped { node_id: Option<u32>, kind: EventKind },
}

/// Simulation start reference, captured once by the controller and shared by
/// value with every activity for relative-time stamping.
#[derive(Debug, Clone, Copy)]
pub struct SimulationClock {
    start: Instant,
}

impl SimulationClock {
    pub fn start_now() -> Self {
        Self { start: Instant::now() }
    }

    /// Seconds elapsed since the simulation started.
    pub fn relative_secs(&self) -> f64 {
        self.start.elapsed().as_micros() as f64 / 1_000_000.0
    }
}

/// Push a record into the event channel without blocking. Records are
/// emitted inside the store critical section, so a full queue drops the
/// record rather than stalling sibling activities.
pub fn emit(events: &EventQueueSender, record: EventRecord) {
    if events.try_send(SimulationEvent::Record(record)).is_err() {
        log::warn!("event queue full, dropping a record");
    }
}
