//! Energy simulation core module.
//!
//! This module provides the complete infrastructure for simulating the
//! energy behavior of battery-powered sensor nodes. It integrates:
//! - The shared energy store and node bank behind one mutex
//! - A reusable periodic activity timer with cooperative shutdown
//! - Consumption activities (idle, transmit, sense) and the receive sink
//! - The harvesting integrator over a piecewise-linear ambient signal
//! - Structured event recording for every store mutation
//!
//! ## Module Organization
//!
//! - `types`: Core data structures (events, records, channels, clock)
//! - `store`: EnergyStore, NodeBank and debit/credit semantics
//! - `timer`: ActivityTimer and the shared ShutdownSignal
//! - `consumption`: Per-node consumption tasks and the sink task
//! - `harvest`: Ambient profile, integration math and harvest tasks
//! - `recorder`: JSON-lines event log
//! - `controller`: Central task coordinating the whole run
//!
//! ## Public API
//!
//! The main entry point is `simulation_task`, which should be spawned by
//! the Embassy executor. It reports its outcome through a `std::sync::mpsc`
//! channel so the host thread can block until the run ends.

pub mod consumption;
pub mod controller;
pub mod harvest;
pub mod recorder;
pub mod store;
pub mod timer;
pub mod types;

// Re-export the main simulation task for convenience
pub use controller::{simulation_task, SimulationOutcome};
