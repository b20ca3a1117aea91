//! Energy store and node bank.
//!
//! The [`EnergyStore`] owns the current/maximum energy level of one node and
//! enforces `0 <= level <= capacity` on every mutation. All stores of a
//! scenario live inside one [`NodeBank`] behind a single async mutex, so a
//! whole read-modify-write sequence (debit or credit plus the threshold
//! check) executes as one critical section, including the batch sweep of the
//! sink activity.

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

/// All node stores behind one lock. Exclusivity is a property of the
/// resource, not of ambient global state.
pub type SharedNodeBank = embassy_sync::mutex::Mutex<CriticalSectionRawMutex, NodeBank>;

/// Result of a debit operation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DebitOutcome {
    /// Level after the debit, floored at zero.
    pub level: f64,
    /// True when the resulting level is at or below the depletion threshold.
    pub depleted: bool,
}

/// Coarse charge state of a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreState {
    /// Level equals capacity and no depletion has been observed.
    Charged,
    /// Level is between the threshold and capacity.
    Depleting,
    /// The level reached the depletion threshold at least once. Terminal:
    /// later credits never leave this state.
    Depleted,
}

/// The battery of one simulated node.
///
/// Debit and credit are total functions: energy loss is always physically
/// applicable and surplus harvest energy is dropped, so neither operation
/// has an error path. Domain violations (negative cost, non-positive
/// capacity) are rejected at configuration time instead.
#[derive(Debug, Clone)]
pub struct EnergyStore {
    capacity: f64,
    level: f64,
    depletion_threshold: f64,
    depleted: bool,
}

impl EnergyStore {
    /// Creates a full store. `capacity` must be positive and
    /// `depletion_threshold` below it; both are validated at scenario load.
    pub fn new(capacity: f64, depletion_threshold: f64) -> Self {
        Self {
            capacity,
            level: capacity,
            depletion_threshold,
            depleted: false,
        }
    }

    /// Removes `amount` from the store, flooring at zero, and reports
    /// whether the resulting level crossed the depletion threshold.
    pub fn debit(&mut self, amount: f64) -> DebitOutcome {
        self.level = (self.level - amount).max(0.0);
        if self.level <= self.depletion_threshold {
            self.depleted = true;
        }
        DebitOutcome {
            level: self.level,
            depleted: self.depleted,
        }
    }

    /// Adds `amount` to the store if there is still room, clamping at
    /// capacity. A credit arriving while the store is already full is
    /// skipped entirely; surplus energy is dropped, never banked.
    pub fn credit(&mut self, amount: f64) -> f64 {
        if self.level < self.capacity {
            self.level = (self.level + amount).min(self.capacity);
        }
        self.level
    }

    /// Read-only snapshot of the current level.
    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Charged → Depleting → Depleted; Depleted is latched.
    pub fn state(&self) -> StoreState {
        if self.depleted {
            StoreState::Depleted
        } else if self.level == self.capacity {
            StoreState::Charged
        } else {
            StoreState::Depleting
        }
    }
}

/// One simulated battery-backed device.
#[derive(Debug, Clone)]
pub struct EnergyNode {
    pub node_id: u32,
    pub store: EnergyStore,
}

impl EnergyNode {
    pub fn new(node_id: u32, capacity: f64, depletion_threshold: f64) -> Self {
        Self {
            node_id,
            store: EnergyStore::new(capacity, depletion_threshold),
        }
    }
}

/// The collection of all nodes in the simulated network, indexed by position.
#[derive(Debug, Default)]
pub struct NodeBank {
    nodes: Vec<EnergyNode>,
}

impl NodeBank {
    pub fn new(nodes: Vec<EnergyNode>) -> Self {
        Self { nodes }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, index: usize) -> &EnergyNode {
        &self.nodes[index]
    }

    pub fn node_mut(&mut self, index: usize) -> &mut EnergyNode {
        &mut self.nodes[index]
    }

    /// Snapshot of `(node_id, level)` pairs for the final summary.
    pub fn levels(&self) -> Vec<(u32, f64)> {
        self.nodes.iter().map(|n| (n.node_id, n.store.level())).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debit_floors_at_zero() {
        let mut store = EnergyStore::new(100.0, 0.0);
        let outcome = store.debit(250.0);
        assert_eq!(outcome.level, 0.0);
        assert!(outcome.depleted);
        assert_eq!(store.level(), 0.0);
    }

    #[test]
    fn credit_saturates_at_capacity() {
        let mut store = EnergyStore::new(100.0, 0.0);
        store.debit(30.0);
        let level = store.credit(100.0);
        assert_eq!(level, 100.0);
    }

    #[test]
    fn credit_at_full_capacity_is_skipped() {
        let mut store = EnergyStore::new(100.0, 0.0);
        let level = store.credit(50.0);
        assert_eq!(level, 100.0);
        assert_eq!(store.state(), StoreState::Charged);
    }

    #[test]
    fn level_stays_within_bounds_over_mixed_operations() {
        let mut store = EnergyStore::new(100.0, 0.0);
        let operations: [(bool, f64); 8] = [
            (true, 40.0),
            (false, 10.0),
            (true, 90.0),
            (false, 500.0),
            (true, 0.0),
            (false, 0.0),
            (true, 100.0),
            (false, 3.0),
        ];
        for (is_debit, amount) in operations {
            if is_debit {
                store.debit(amount);
            } else {
                store.credit(amount);
            }
            assert!(store.level() >= 0.0 && store.level() <= store.capacity());
        }
    }

    #[test]
    fn threshold_crossing_latches_depleted_state() {
        let mut store = EnergyStore::new(100.0, 10.0);
        let outcome = store.debit(95.0);
        assert_eq!(outcome.level, 5.0);
        assert!(outcome.depleted);
        assert_eq!(store.state(), StoreState::Depleted);

        // Credits still clamp the level but never resurrect the node.
        store.credit(50.0);
        assert_eq!(store.level(), 55.0);
        assert_eq!(store.state(), StoreState::Depleted);
        assert!(store.debit(1.0).depleted);
    }

    #[test]
    fn state_transitions_charged_to_depleting() {
        let mut store = EnergyStore::new(100.0, 0.0);
        assert_eq!(store.state(), StoreState::Charged);
        store.debit(1.0);
        assert_eq!(store.state(), StoreState::Depleting);
    }
}
