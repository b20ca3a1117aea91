//! Scenario loading, parsing, and validation logic.
//!
//! Contains all data structures for the scenario configuration and provides
//! functions for loading and validating scenario files. Everything here is
//! start-up glue: the simulation core receives the validated values and
//! never touches the filesystem or re-checks domains at tick time.

use anyhow::Context;
use embassy_time::Duration;
use serde::Deserialize;
use std::collections::HashSet;
use std::fs;

use crate::simulation::consumption::ConsumptionActivity;
use crate::simulation::types::{ActivityKind, MAX_NODE_COUNT};

/// Error type for scenario loading failures.
#[derive(Debug)]
pub enum ScenarioLoadError {
    FileReadError(String),
    ParseError(String),
    ValidationError(String),
}

impl std::fmt::Display for ScenarioLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScenarioLoadError::FileReadError(msg) => write!(f, "Failed to read file: {}", msg),
            ScenarioLoadError::ParseError(msg) => write!(f, "Failed to parse JSON: {}", msg),
            ScenarioLoadError::ValidationError(msg) => write!(f, "Validation error: {}", msg),
        }
    }
}

impl std::error::Error for ScenarioLoadError {}

/// One simulated node: identity and battery size.
#[derive(Debug, Deserialize, Clone)]
pub struct NodeConfig {
    pub node_id: u32,
    /// Maximum (and initial) stored energy of the node.
    pub storage_capacity: f64,
}

/// Fixed energy cost per event for each consumption activity kind.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct ConsumptionCosts {
    pub idle: f64,
    pub transmit: f64,
    pub sense: f64,
    pub receive: f64,
}

/// Tick interval per activity kind, in milliseconds of host time.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct ActivityIntervals {
    pub idle: u64,
    pub transmit: u64,
    pub sense: u64,
    pub receive: u64,
    pub harvest: u64,
}

/// Solar panel constants used to convert irradiance into power.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct PanelParameters {
    /// Collecting surface in square meters.
    pub area_m2: f64,
    /// Conversion efficiency, in (0, 1].
    pub efficiency: f64,
}

/// Root structure representing an entire simulation scenario.
#[derive(Debug, Deserialize)]
pub struct Scenario {
    /// All nodes present in the simulated network.
    pub nodes: Vec<NodeConfig>,
    pub consumption_costs: ConsumptionCosts,
    #[serde(rename = "activity_intervals_ms")]
    pub activity_intervals: ActivityIntervals,
    /// Level at or below which a node is considered dead.
    #[serde(default)]
    pub depletion_threshold: f64,
    pub panel: PanelParameters,
    /// Time units covered by one harvest window; also the index step of the
    /// ambient profile.
    pub harvest_step: f64,
    /// Path to the ambient-sample file, resolved relative to the scenario
    /// file at load time.
    pub ambient_profile: String,
    /// Optional path for the JSON-lines event log.
    #[serde(default)]
    pub event_log: Option<String>,
}

impl Scenario {
    /// The three per-node consumption activities as data. Receive is driven
    /// by the network-wide sink activity instead, see [`Self::sink_activity`].
    pub fn consumption_activities(&self) -> [ConsumptionActivity; 3] {
        [
            ConsumptionActivity {
                kind: ActivityKind::Idle,
                cost: self.consumption_costs.idle,
                interval: Duration::from_millis(self.activity_intervals.idle),
            },
            ConsumptionActivity {
                kind: ActivityKind::Transmit,
                cost: self.consumption_costs.transmit,
                interval: Duration::from_millis(self.activity_intervals.transmit),
            },
            ConsumptionActivity {
                kind: ActivityKind::Sense,
                cost: self.consumption_costs.sense,
                interval: Duration::from_millis(self.activity_intervals.sense),
            },
        ]
    }

    /// The shared receive activity debiting every node per tick.
    pub fn sink_activity(&self) -> ConsumptionActivity {
        ConsumptionActivity {
            kind: ActivityKind::Receive,
            cost: self.consumption_costs.receive,
            interval: Duration::from_millis(self.activity_intervals.receive),
        }
    }

    pub fn harvest_interval(&self) -> Duration {
        Duration::from_millis(self.activity_intervals.harvest)
    }
}

/// Load and parse a scenario from a file.
///
/// # Parameters
///
/// * `path` - Path to the scenario JSON file
///
/// # Returns
///
/// Parsed and validated Scenario or an error.
pub fn load_scenario(path: &str) -> Result<Scenario, ScenarioLoadError> {
    let data = fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path))
        .map_err(|e| ScenarioLoadError::FileReadError(e.to_string()))?;

    let mut scenario: Scenario = serde_json::from_str(&data)
        .context("Invalid JSON format")
        .map_err(|e| ScenarioLoadError::ParseError(e.to_string()))?;

    // Resolve the ambient profile path against the scenario file's directory
    {
        use std::path::Path;
        if let Some(parent_dir) = Path::new(path).parent() {
            let full_path = parent_dir.join(&scenario.ambient_profile);
            scenario.ambient_profile = full_path.to_string_lossy().to_string();
        }
    }

    validate_scenario(&scenario).map_err(ScenarioLoadError::ValidationError)?;

    Ok(scenario)
}

/// Validate a parsed scenario.
///
/// Every domain constraint of the hot path is enforced here so that debit,
/// credit and tick stay total functions at run time.
///
/// # Returns
///
/// `Ok(())` if validation passes, `Err(String)` with error description otherwise.
pub fn validate_scenario(scenario: &Scenario) -> Result<(), String> {
    if scenario.nodes.is_empty() {
        return Err("Scenario must contain at least one node".to_string());
    }
    if scenario.nodes.len() > MAX_NODE_COUNT {
        return Err(format!(
            "Node count {} exceeds maximum of {}",
            scenario.nodes.len(),
            MAX_NODE_COUNT
        ));
    }

    // Check for duplicate node IDs
    let mut node_ids = HashSet::new();
    for node in &scenario.nodes {
        if !node_ids.insert(node.node_id) {
            return Err(format!("Duplicate node_id found: {}", node.node_id));
        }
    }

    for node in &scenario.nodes {
        if node.storage_capacity <= 0.0 {
            return Err(format!(
                "Node {} storage_capacity {} must be positive",
                node.node_id, node.storage_capacity
            ));
        }
        if scenario.depletion_threshold >= node.storage_capacity {
            return Err(format!(
                "depletion_threshold {} must be below node {} capacity {}",
                scenario.depletion_threshold, node.node_id, node.storage_capacity
            ));
        }
    }

    if scenario.depletion_threshold < 0.0 {
        return Err("depletion_threshold must be non-negative".to_string());
    }

    let costs = [
        ("idle", scenario.consumption_costs.idle),
        ("transmit", scenario.consumption_costs.transmit),
        ("sense", scenario.consumption_costs.sense),
        ("receive", scenario.consumption_costs.receive),
    ];
    for (name, cost) in costs {
        if cost < 0.0 {
            return Err(format!("Consumption cost '{}' must be non-negative, got {}", name, cost));
        }
    }

    let intervals = [
        ("idle", scenario.activity_intervals.idle),
        ("transmit", scenario.activity_intervals.transmit),
        ("sense", scenario.activity_intervals.sense),
        ("receive", scenario.activity_intervals.receive),
        ("harvest", scenario.activity_intervals.harvest),
    ];
    for (name, interval) in intervals {
        if interval == 0 {
            return Err(format!("Activity interval '{}' must be positive", name));
        }
    }

    if scenario.panel.area_m2 <= 0.0 {
        return Err("Panel area_m2 must be positive".to_string());
    }
    if scenario.panel.efficiency <= 0.0 || scenario.panel.efficiency > 1.0 {
        return Err(format!(
            "Panel efficiency {} must be within (0, 1]",
            scenario.panel.efficiency
        ));
    }

    if scenario.harvest_step <= 0.0 {
        return Err("harvest_step must be positive".to_string());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_scenario() -> Scenario {
        Scenario {
            nodes: vec![NodeConfig {
                node_id: 1,
                storage_capacity: 1000.0,
            }],
            consumption_costs: ConsumptionCosts {
                idle: 1.0,
                transmit: 10.0,
                sense: 100.0,
                receive: 5.0,
            },
            activity_intervals: ActivityIntervals {
                idle: 1000,
                transmit: 2000,
                sense: 3000,
                receive: 5000,
                harvest: 1000,
            },
            depletion_threshold: 0.0,
            panel: PanelParameters {
                area_m2: 1.0,
                efficiency: 0.2,
            },
            harvest_step: 30.0,
            ambient_profile: "profile.json".to_string(),
            event_log: None,
        }
    }

    #[test]
    fn valid_scenario_passes() {
        assert!(validate_scenario(&sample_scenario()).is_ok());
    }

    #[test]
    fn rejects_empty_node_list() {
        let mut scenario = sample_scenario();
        scenario.nodes.clear();
        assert!(validate_scenario(&scenario).is_err());
    }

    #[test]
    fn rejects_duplicate_node_ids() {
        let mut scenario = sample_scenario();
        scenario.nodes.push(NodeConfig {
            node_id: 1,
            storage_capacity: 500.0,
        });
        assert!(validate_scenario(&scenario).is_err());
    }

    #[test]
    fn rejects_non_positive_capacity() {
        let mut scenario = sample_scenario();
        scenario.nodes[0].storage_capacity = 0.0;
        assert!(validate_scenario(&scenario).is_err());
    }

    #[test]
    fn rejects_negative_cost() {
        let mut scenario = sample_scenario();
        scenario.consumption_costs.sense = -1.0;
        assert!(validate_scenario(&scenario).is_err());
    }

    #[test]
    fn rejects_zero_interval() {
        let mut scenario = sample_scenario();
        scenario.activity_intervals.harvest = 0;
        assert!(validate_scenario(&scenario).is_err());
    }

    #[test]
    fn rejects_threshold_at_or_above_capacity() {
        let mut scenario = sample_scenario();
        scenario.depletion_threshold = 1000.0;
        assert!(validate_scenario(&scenario).is_err());
    }

    #[test]
    fn rejects_out_of_range_panel_efficiency() {
        let mut scenario = sample_scenario();
        scenario.panel.efficiency = 1.5;
        assert!(validate_scenario(&scenario).is_err());
    }

    #[test]
    fn load_resolves_ambient_profile_relative_to_scenario() {
        let dir = std::env::temp_dir().join(format!("ens-scenario-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let scenario_path = dir.join("scenario.json");
        std::fs::write(
            &scenario_path,
            r#"{
                "nodes": [{"node_id": 1, "storage_capacity": 1000.0}],
                "consumption_costs": {"idle": 1.0, "transmit": 10.0, "sense": 100.0, "receive": 5.0},
                "activity_intervals_ms": {"idle": 1000, "transmit": 2000, "sense": 3000, "receive": 5000, "harvest": 1000},
                "panel": {"area_m2": 1.0, "efficiency": 0.2},
                "harvest_step": 30.0,
                "ambient_profile": "clear-day.json"
            }"#,
        )
        .unwrap();

        let scenario = load_scenario(scenario_path.to_str().unwrap()).unwrap();
        assert!(scenario.ambient_profile.ends_with("clear-day.json"));
        assert_ne!(scenario.ambient_profile, "clear-day.json");
        assert_eq!(scenario.depletion_threshold, 0.0);
        assert!(scenario.event_log.is_none());

        std::fs::remove_dir_all(&dir).ok();
    }
}
