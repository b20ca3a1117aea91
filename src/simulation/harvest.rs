//! Ambient-energy harvesting.
//!
//! The harvester reads forward through a pre-indexed irradiance profile.
//! Each tick it takes the two samples bracketing the current window,
//! converts irradiance to instantaneous panel power, fits a line through the
//! two power points and credits the store with the definite integral of that
//! line over the window. Running out of sample pairs stops the harvester
//! quietly; harvesting exhaustion is not node death.

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;

use anyhow::Context;

use crate::common::scenario::PanelParameters;

use super::store::SharedNodeBank;
use super::timer::{ActivityTimer, ShutdownSignal, TickOutcome};
use super::types::{emit, EventKind, EventQueueSender, EventRecord, SimulationClock, SimulationEvent, MAX_NODE_COUNT};

/// One point of the externally supplied ambient-irradiance time series.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct AmbientSample {
    pub timestamp: f64,
    pub irradiance: f64,
}

#[derive(Deserialize)]
struct AmbientProfileFile {
    samples: Vec<AmbientSample>,
}

/// Error type for ambient profile loading failures.
#[derive(Debug)]
pub enum ProfileLoadError {
    FileReadError(String),
    ParseError(String),
    ValidationError(String),
}

impl std::fmt::Display for ProfileLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProfileLoadError::FileReadError(msg) => write!(f, "Failed to read file: {}", msg),
            ProfileLoadError::ParseError(msg) => write!(f, "Failed to parse JSON: {}", msg),
            ProfileLoadError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for ProfileLoadError {}

/// Immutable, pre-indexed ambient-irradiance signal.
///
/// Samples are keyed by `round(timestamp / step)` so lookups by window index
/// are O(1) and idempotent even when the underlying series is sparse or
/// irregular. Validation rejects every configuration that could later make
/// the integration degenerate (`t1 == t2`), so the hot path never sees it.
#[derive(Debug)]
pub struct AmbientProfile {
    indexed: HashMap<u64, AmbientSample>,
    sample_count: usize,
}

impl AmbientProfile {
    /// Load a profile from a JSON file and index it with the given step.
    pub fn load(path: &str, step: f64) -> Result<Self, ProfileLoadError> {
        let data = fs::read_to_string(path)
            .with_context(|| format!("Failed to read file: {}", path))
            .map_err(|e| ProfileLoadError::FileReadError(e.to_string()))?;

        let file: AmbientProfileFile = serde_json::from_str(&data)
            .context("Invalid JSON format")
            .map_err(|e| ProfileLoadError::ParseError(e.to_string()))?;

        Self::from_samples(file.samples, step).map_err(ProfileLoadError::ValidationError)
    }

    /// Build and validate a profile from an in-memory sample list.
    pub fn from_samples(samples: Vec<AmbientSample>, step: f64) -> Result<Self, String> {
        if step <= 0.0 {
            return Err("Harvest step must be positive".to_string());
        }
        if samples.is_empty() {
            return Err("Ambient profile must contain at least one sample".to_string());
        }

        let mut indexed = HashMap::with_capacity(samples.len());
        let mut previous: Option<f64> = None;
        for sample in &samples {
            if sample.timestamp < 0.0 {
                return Err(format!("Sample timestamp {} must be non-negative", sample.timestamp));
            }
            if sample.irradiance < 0.0 {
                return Err(format!(
                    "Sample at t={} has negative irradiance {}",
                    sample.timestamp, sample.irradiance
                ));
            }
            if let Some(prev) = previous {
                if sample.timestamp <= prev {
                    return Err(format!(
                        "Sample timestamps must be strictly increasing ({} follows {})",
                        sample.timestamp, prev
                    ));
                }
            }
            previous = Some(sample.timestamp);

            let index = (sample.timestamp / step).round() as u64;
            if indexed.insert(index, *sample).is_some() {
                return Err(format!(
                    "Two samples map to harvest index {} (step {})",
                    index, step
                ));
            }
        }

        Ok(Self {
            indexed,
            sample_count: samples.len(),
        })
    }

    /// O(1) lookup of the sample at a window index. Repeated lookups of the
    /// same index always return the same value.
    pub fn sample_at(&self, index: u64) -> Option<AmbientSample> {
        self.indexed.get(&index).copied()
    }

    pub fn len(&self) -> usize {
        self.sample_count
    }

    pub fn is_empty(&self) -> bool {
        self.sample_count == 0
    }
}

/// Definite integral of the line through `(t1, p1)` and `(t2, p2)` over
/// `[t1, t2]`. Callers guarantee `t2 > t1`; profile validation rejects any
/// sample pair that would violate it.
pub fn integrate_power_window(t1: f64, p1: f64, t2: f64, p2: f64) -> f64 {
    debug_assert!(t2 > t1, "harvest window must have strictly increasing timestamps");
    let m = (p2 - p1) / (t2 - t1);
    let b = p2 - m * t2;
    let antiderivative = |t: f64| m * t * t / 2.0 + b * t;
    antiderivative(t2) - antiderivative(t1)
}

/// Walks the ambient profile forward one window per tick, producing the
/// harvested energy of each window.
pub struct HarvestIntegrator<'a> {
    profile: &'a AmbientProfile,
    panel: PanelParameters,
    next_index: u64,
}

impl<'a> HarvestIntegrator<'a> {
    pub fn new(profile: &'a AmbientProfile, panel: PanelParameters) -> Self {
        Self {
            profile,
            panel,
            next_index: 0,
        }
    }

    fn power(&self, sample: AmbientSample) -> f64 {
        sample.irradiance * self.panel.area_m2 * self.panel.efficiency
    }

    /// Energy harvested over the next window, or `None` once no bracketing
    /// sample pair remains.
    pub fn next_energy(&mut self) -> Option<f64> {
        let first = self.profile.sample_at(self.next_index)?;
        let second = self.profile.sample_at(self.next_index + 1)?;
        self.next_index += 1;
        Some(integrate_power_window(
            first.timestamp,
            self.power(first),
            second.timestamp,
            self.power(second),
        ))
    }
}

/// Timer loop of one node's harvesting activity.
///
/// Credits the node's store with the energy of each window. Exhausting the
/// profile stops this activity only; the global termination flag is left
/// untouched.
pub async fn run_harvest(
    node_index: usize,
    node_id: u32,
    panel: PanelParameters,
    profile: &AmbientProfile,
    bank: &SharedNodeBank,
    shutdown: &ShutdownSignal,
    events: EventQueueSender,
    clock: SimulationClock,
    interval: embassy_time::Duration,
) {
    let timer = ActivityTimer::new(interval);
    let mut integrator = HarvestIntegrator::new(profile, panel);
    timer
        .run(shutdown, async || {
            let Some(energy) = integrator.next_energy() else {
                log::info!("node {} harvest data exhausted, harvester stopping", node_id);
                return TickOutcome::Stop;
            };
            let mut bank = bank.lock().await;
            let level = bank.node_mut(node_index).store.credit(energy);
            emit(&events, EventRecord::credit(&clock, node_id, energy, level));
            TickOutcome::Continue
        })
        .await;

    log::debug!("harvest activity for node {} exited", node_id);
    events
        .send(SimulationEvent::ActivityStopped {
            node_id: Some(node_id),
            kind: EventKind::Harvest,
        })
        .await;
}

/// Per-node harvesting task.
#[embassy_executor::task(pool_size = MAX_NODE_COUNT)]
pub async fn harvest_task(
    node_index: usize,
    node_id: u32,
    panel: PanelParameters,
    profile: &'static AmbientProfile,
    bank: &'static SharedNodeBank,
    shutdown: &'static ShutdownSignal,
    events: EventQueueSender,
    clock: SimulationClock,
    interval: embassy_time::Duration,
) {
    run_harvest(node_index, node_id, panel, profile, bank, shutdown, events, clock, interval).await;
}
