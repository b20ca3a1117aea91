//! Per-node consumption activities and the network-wide sink.
//!
//! Idle, transmit and sense run as independent periodic tasks bound to one
//! node each; they differ only in data (kind, cost, interval). Receive is
//! special: a single sink task sweeps every node of the bank per tick, all
//! inside one critical section, and abandons the rest of the sweep the
//! moment any node crosses the depletion threshold.

use embassy_time::Duration;

use super::store::SharedNodeBank;
use super::timer::{ActivityTimer, ShutdownSignal, TickOutcome};
use super::types::{
    emit, ActivityKind, EventQueueSender, EventRecord, SimulationClock, SimulationEvent, MAX_NODE_COUNT,
};

/// Size of the pool backing the three per-node consumption task kinds.
const CONSUMPTION_TASK_POOL: usize = MAX_NODE_COUNT * 3;

/// One consumption activity as data: what it is called, what each event
/// costs, and how often it fires.
#[derive(Debug, Clone, Copy)]
pub struct ConsumptionActivity {
    pub kind: ActivityKind,
    pub cost: f64,
    pub interval: Duration,
}

/// Timer loop of one per-node consumption activity.
///
/// Each tick debits the node's store, emits the debit record, and requests
/// global termination when the store crossed the depletion threshold. The
/// first activity to observe depletion also emits the terminal record.
pub async fn run_consumption(
    node_index: usize,
    node_id: u32,
    activity: ConsumptionActivity,
    bank: &SharedNodeBank,
    shutdown: &ShutdownSignal,
    events: EventQueueSender,
    clock: SimulationClock,
) {
    let timer = ActivityTimer::new(activity.interval);
    let mut terminal: Option<EventRecord> = None;
    timer
        .run(shutdown, async || {
            let mut bank = bank.lock().await;
            let outcome = bank.node_mut(node_index).store.debit(activity.cost);
            emit(
                &events,
                EventRecord::debit(&clock, node_id, activity.kind, activity.cost, outcome.level),
            );
            if outcome.depleted {
                if shutdown.request() {
                    log::info!(
                        "node {} depleted by {} activity (level {:.3}), halting simulation",
                        node_id,
                        activity.kind.label(),
                        outcome.level
                    );
                    terminal = Some(EventRecord::depleted(&clock, node_id, outcome.level));
                }
                return TickOutcome::Stop;
            }
            TickOutcome::Continue
        })
        .await;

    // The terminal marker must never be lost, so it takes the blocking send
    // path once the bank lock is released.
    if let Some(record) = terminal {
        events.send(SimulationEvent::Record(record)).await;
    }

    log::debug!("{} activity for node {} exited", activity.kind.label(), node_id);
    events
        .send(SimulationEvent::ActivityStopped {
            node_id: Some(node_id),
            kind: activity.kind.into(),
        })
        .await;
}

/// Timer loop of the shared receive sink.
///
/// One tick sweeps every node in the bank under a single lock scope. The
/// sweep stops early, without undoing prior debits, as soon as any node in
/// the batch crosses the depletion threshold.
pub async fn run_sink(
    activity: ConsumptionActivity,
    bank: &SharedNodeBank,
    shutdown: &ShutdownSignal,
    events: EventQueueSender,
    clock: SimulationClock,
) {
    let timer = ActivityTimer::new(activity.interval);
    let mut terminal: Option<EventRecord> = None;
    timer
        .run(shutdown, async || {
            let mut bank = bank.lock().await;
            for index in 0..bank.len() {
                let node = bank.node_mut(index);
                let node_id = node.node_id;
                let outcome = node.store.debit(activity.cost);
                emit(
                    &events,
                    EventRecord::debit(&clock, node_id, activity.kind, activity.cost, outcome.level),
                );
                if outcome.depleted {
                    if shutdown.request() {
                        log::info!(
                            "node {} depleted during receive sweep (level {:.3}), halting simulation",
                            node_id,
                            outcome.level
                        );
                        terminal = Some(EventRecord::depleted(&clock, node_id, outcome.level));
                    }
                    return TickOutcome::Stop;
                }
            }
            TickOutcome::Continue
        })
        .await;

    if let Some(record) = terminal {
        events.send(SimulationEvent::Record(record)).await;
    }

    log::debug!("receive sink exited");
    events
        .send(SimulationEvent::ActivityStopped {
            node_id: None,
            kind: activity.kind.into(),
        })
        .await;
}

/// Per-node consumption task (idle, transmit or sense).
#[embassy_executor::task(pool_size = CONSUMPTION_TASK_POOL)]
pub async fn consumption_task(
    node_index: usize,
    node_id: u32,
    activity: ConsumptionActivity,
    bank: &'static SharedNodeBank,
    shutdown: &'static ShutdownSignal,
    events: EventQueueSender,
    clock: SimulationClock,
) {
    run_consumption(node_index, node_id, activity, bank, shutdown, events, clock).await;
}

/// The single network-wide receive sink task.
#[embassy_executor::task]
pub async fn sink_task(
    activity: ConsumptionActivity,
    bank: &'static SharedNodeBank,
    shutdown: &'static ShutdownSignal,
    events: EventQueueSender,
    clock: SimulationClock,
) {
    run_sink(activity, bank, shutdown, events, clock).await;
}
