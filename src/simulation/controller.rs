//! Central controller task owning the simulation lifecycle.
//!
//! The controller is a passive owner: it builds the node bank, spawns every
//! activity task, then drains the event channel, forwarding records to the
//! event log and counting activity exits. Once all activities have observed
//! termination (or exhausted their data) and reported exit, it snapshots the
//! final levels and hands the outcome back to the blocked host thread.

use embassy_executor::Spawner;

use crate::common::scenario::Scenario;

use super::consumption::{consumption_task, sink_task};
use super::harvest::{harvest_task, AmbientProfile};
use super::recorder::EventLog;
use super::store::{EnergyNode, NodeBank, SharedNodeBank};
use super::timer::ShutdownSignal;
use super::types::{EventKind, EventQueue, EventQueueReceiver, SimulationClock, SimulationEvent};

/// Final report handed to the host thread when the run ends.
#[derive(Debug)]
pub struct SimulationOutcome {
    /// Seconds between simulation start and the last activity exit.
    pub elapsed_secs: f64,
    pub total_debits: u64,
    pub total_credits: u64,
    /// Terminal depletion markers seen (one on a normal run).
    pub terminal_records: u64,
    /// Records successfully appended to the event log.
    pub records_logged: u64,
    /// `(node_id, level)` for every node at the end of the run.
    pub final_levels: Vec<(u32, f64)>,
}

/// Running totals accumulated while draining the event channel.
#[derive(Debug, Default, PartialEq, Eq)]
struct EventTotals {
    debits: u64,
    credits: u64,
    terminal: u64,
    logged: u64,
}

/// Spawn every activity of the scenario. Returns the number of spawned
/// activities so the controller knows how many exit reports to await.
fn spawn_activities(
    spawner: &Spawner,
    scenario: &'static Scenario,
    profile: &'static AmbientProfile,
    bank: &'static SharedNodeBank,
    shutdown: &'static ShutdownSignal,
    events: &'static EventQueue,
    clock: SimulationClock,
) -> usize {
    let mut running = 0;

    for (index, node) in scenario.nodes.iter().enumerate() {
        for activity in scenario.consumption_activities() {
            let _ = spawner.spawn(consumption_task(
                index,
                node.node_id,
                activity,
                bank,
                shutdown,
                events.sender(),
                clock,
            ));
            running += 1;
        }

        let _ = spawner.spawn(harvest_task(
            index,
            node.node_id,
            scenario.panel,
            profile,
            bank,
            shutdown,
            events.sender(),
            clock,
            scenario.harvest_interval(),
        ));
        running += 1;
    }

    let _ = spawner.spawn(sink_task(
        scenario.sink_activity(),
        bank,
        shutdown,
        events.sender(),
        clock,
    ));
    running += 1;

    running
}

/// Drain the event channel until every activity has reported exit,
/// forwarding each record to the event log.
async fn drain_events(events: EventQueueReceiver, event_log: &mut EventLog, mut running: usize) -> EventTotals {
    let mut totals = EventTotals::default();

    while running > 0 {
        match events.receive().await {
            SimulationEvent::Record(record) => {
                match record.kind {
                    EventKind::Harvest => totals.credits += 1,
                    EventKind::Depleted => totals.terminal += 1,
                    _ => totals.debits += 1,
                }
                log::debug!(
                    "[{:.3}s] node {} {:?} {:+.3} -> {:.3}",
                    record.relative_time_secs,
                    record.node_id,
                    record.kind,
                    record.magnitude,
                    record.resulting_level
                );
                match event_log.append(&record) {
                    Ok(()) => totals.logged += 1,
                    Err(err) => log::error!("failed to append event record: {:#}", err),
                }
            }
            SimulationEvent::ActivityStopped { node_id, kind } => {
                running -= 1;
                log::debug!(
                    "activity {:?} (node {:?}) stopped, {} still running",
                    kind,
                    node_id,
                    running
                );
            }
        }
    }

    totals
}

/// Top-level simulation task spawned on the Embassy executor.
#[embassy_executor::task]
pub async fn simulation_task(
    spawner: Spawner,
    scenario: &'static Scenario,
    profile: &'static AmbientProfile,
    event_log: EventLog,
    outcome_tx: std::sync::mpsc::Sender<SimulationOutcome>,
) {
    // INTENTIONAL LEAK: Box::leak provides the 'static lifetimes Embassy
    // tasks require for shared state. All of it lives for the entire
    // simulation and is reclaimed on process exit.
    let nodes: Vec<EnergyNode> = scenario
        .nodes
        .iter()
        .map(|n| EnergyNode::new(n.node_id, n.storage_capacity, scenario.depletion_threshold))
        .collect();
    let bank: &'static SharedNodeBank = Box::leak(Box::new(SharedNodeBank::new(NodeBank::new(nodes))));
    let shutdown: &'static ShutdownSignal = Box::leak(Box::new(ShutdownSignal::new()));
    let events: &'static EventQueue = Box::leak(Box::new(EventQueue::new()));

    let clock = SimulationClock::start_now();
    let running = spawn_activities(&spawner, scenario, profile, bank, shutdown, events, clock);
    log::info!(
        "simulation started: {} nodes, {} activities",
        scenario.nodes.len(),
        running
    );

    let mut event_log = event_log;
    let totals = drain_events(events.receiver(), &mut event_log, running).await;
    if let Err(err) = event_log.flush() {
        log::error!("failed to flush event log: {:#}", err);
    }

    let elapsed_secs = clock.relative_secs();
    let final_levels = bank.lock().await.levels();
    log::info!("all activities exited after {:.3}s", elapsed_secs);

    let outcome = SimulationOutcome {
        elapsed_secs,
        total_debits: totals.debits,
        total_credits: totals.credits,
        terminal_records: totals.terminal,
        records_logged: totals.logged,
        final_levels,
    };
    if outcome_tx.send(outcome).is_err() {
        log::warn!("host thread is no longer waiting for the simulation outcome");
    }
}
