//! Headless entry point for the energy node simulator.
//!
//! Loads and validates the scenario and ambient profile (every
//! configuration error is fatal here, before any activity starts), spawns
//! the Embassy executor on a dedicated thread, and blocks until the
//! simulation reports its outcome.

use anyhow::Context;
use embassy_executor::Executor;
use env_logger::Builder;
use log::{info, LevelFilter};
use std::sync::mpsc;
use std::thread;

use crate::common::scenario::{load_scenario, Scenario};
use crate::simulation::harvest::AmbientProfile;
use crate::simulation::recorder::EventLog;
use crate::simulation::simulation_task;

mod common;
mod simulation;

fn main() -> anyhow::Result<()> {
    // Logging setup
    Builder::new()
        .filter_level(LevelFilter::Info)
        .filter(Some("energy_node_simulator"), LevelFilter::Debug)
        .init();

    info!("Starting up");

    let scenario_path = std::env::args()
        .nth(1)
        .context("usage: energy-node-simulator <scenario.json>")?;

    let scenario = load_scenario(&scenario_path)
        .with_context(|| format!("invalid scenario '{}'", scenario_path))?;
    let profile = AmbientProfile::load(&scenario.ambient_profile, scenario.harvest_step)
        .with_context(|| format!("invalid ambient profile '{}'", scenario.ambient_profile))?;
    let event_log = match &scenario.event_log {
        Some(path) => EventLog::create(path)?,
        None => EventLog::disabled(),
    };

    print_banner(&scenario, &profile);

    // INTENTIONAL LEAK: Box::leak provides the 'static lifetimes required
    // by the Embassy task signatures. Both live for the entire run.
    let scenario: &'static Scenario = Box::leak(Box::new(scenario));
    let profile: &'static AmbientProfile = Box::leak(Box::new(profile));

    let (outcome_tx, outcome_rx) = mpsc::channel();

    // Spawn the Embassy executor on a dedicated background thread
    let _executor_handle = thread::Builder::new()
        .name("embassy-executor".to_string())
        .spawn(move || {
            // Leak the executor to satisfy the 'static lifetime required by run()
            let executor: &'static mut Executor = Box::leak(Box::new(Executor::new()));
            executor.run(|spawner| {
                let _ = spawner.spawn(simulation_task(spawner, scenario, profile, event_log, outcome_tx));
            });
        })
        .context("failed to spawn embassy executor thread")?;

    let outcome = outcome_rx
        .recv()
        .context("simulation ended without reporting an outcome")?;

    info!("--- Simulation complete ---");
    info!(
        "elapsed {:.3}s, {} debits, {} credits, {} terminal marker(s), {} records logged",
        outcome.elapsed_secs,
        outcome.total_debits,
        outcome.total_credits,
        outcome.terminal_records,
        outcome.records_logged
    );
    for (node_id, level) in &outcome.final_levels {
        info!("node {} final level: {:.3}", node_id, level);
    }

    Ok(())
}

/// Startup banner echoing the effective configuration.
fn print_banner(scenario: &Scenario, profile: &AmbientProfile) {
    info!("--- Starting Simulation ---");
    for node in &scenario.nodes {
        info!("node {}: capacity {:.3}", node.node_id, node.storage_capacity);
    }
    info!(
        "costs: idle {:.3}, transmit {:.3}, sense {:.3}, receive {:.3}",
        scenario.consumption_costs.idle,
        scenario.consumption_costs.transmit,
        scenario.consumption_costs.sense,
        scenario.consumption_costs.receive
    );
    info!(
        "depletion threshold: {:.3}, harvest step: {:.1}, panel {:.3} m2 at {:.0}% efficiency",
        scenario.depletion_threshold,
        scenario.harvest_step,
        scenario.panel.area_m2,
        scenario.panel.efficiency * 100.0
    );
    info!("ambient profile: {} samples", profile.len());
}
