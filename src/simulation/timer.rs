//! Periodic execution primitive and the shared termination flag.
//!
//! [`ActivityTimer`] implements the wait-then-act contract shared by every
//! activity: sleep one full interval, check the stop signal, then tick. The
//! warm-up delay before the first tick and the cooperative cancellation
//! semantics (a sleeping activity finishes its sleep, observes the flag and
//! exits without ticking) both fall out of that ordering.

use embassy_time::{Duration, Timer};
use std::sync::atomic::{AtomicBool, Ordering};

/// Process-wide termination flag. Once requested it is never reset; every
/// activity polls it immediately before each tick.
#[derive(Debug, Default)]
pub struct ShutdownSignal {
    requested: AtomicBool,
}

impl ShutdownSignal {
    pub const fn new() -> Self {
        Self {
            requested: AtomicBool::new(false),
        }
    }

    /// Requests termination. Returns true only for the first caller, so the
    /// winner alone emits the terminal event record.
    pub fn request(&self) -> bool {
        !self.requested.swap(true, Ordering::SeqCst)
    }

    pub fn is_requested(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}

/// What a tick callback wants the timer loop to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    /// Stop this activity's loop without touching the shared signal. Used by
    /// the harvester on sample exhaustion and by consumption activities that
    /// just observed depletion.
    Stop,
}

/// Fixed-interval periodic executor.
pub struct ActivityTimer {
    interval: Duration,
}

impl ActivityTimer {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Repeatedly waits `interval` then invokes `tick`, until the shutdown
    /// signal is observed or the callback asks to stop. The signal check
    /// happens after the sleep and before the tick, so no tick ever runs
    /// once termination is visible to this activity.
    pub async fn run<F>(&self, shutdown: &ShutdownSignal, mut tick: F)
    where
        F: AsyncFnMut() -> TickOutcome,
    {
        loop {
            Timer::after(self.interval).await;
            if shutdown.is_requested() {
                return;
            }
            if tick().await == TickOutcome::Stop {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_executor::{Executor, Spawner};
    use std::sync::mpsc;

    /// Timer futures only complete under the Embassy executor, so the loop
    /// under test runs on a dedicated executor thread and reports its final
    /// tick count back over an mpsc channel.
    fn spawn_executor(init: impl FnOnce(Spawner) + Send + 'static) {
        std::thread::Builder::new()
            .name("test-executor".to_string())
            .spawn(move || {
                let executor: &'static mut Executor = Box::leak(Box::new(Executor::new()));
                executor.run(init);
            })
            .unwrap();
    }

    /// Counts ticks until the loop exits; `stop_at` of zero never stops
    /// from inside the callback.
    #[embassy_executor::task(pool_size = 4)]
    async fn counting_task(
        interval: Duration,
        shutdown: &'static ShutdownSignal,
        stop_at: u32,
        done: mpsc::Sender<u32>,
    ) {
        let timer = ActivityTimer::new(interval);
        let mut ticks = 0u32;
        timer
            .run(shutdown, async || {
                ticks += 1;
                if stop_at != 0 && ticks >= stop_at {
                    TickOutcome::Stop
                } else {
                    TickOutcome::Continue
                }
            })
            .await;
        let _ = done.send(ticks);
    }

    fn leak_shutdown() -> &'static ShutdownSignal {
        Box::leak(Box::new(ShutdownSignal::new()))
    }

    #[test]
    fn first_shutdown_request_wins() {
        let shutdown = ShutdownSignal::new();
        assert!(!shutdown.is_requested());
        assert!(shutdown.request());
        assert!(!shutdown.request());
        assert!(shutdown.is_requested());
    }

    #[test]
    fn preset_shutdown_prevents_any_tick() {
        let shutdown = leak_shutdown();
        shutdown.request();
        let (done_tx, done_rx) = mpsc::channel();
        spawn_executor(move |spawner| {
            spawner
                .spawn(counting_task(Duration::from_millis(1), shutdown, 0, done_tx))
                .unwrap();
        });
        assert_eq!(done_rx.recv().unwrap(), 0);
    }

    #[test]
    fn stop_outcome_ends_the_loop() {
        let shutdown = leak_shutdown();
        let (done_tx, done_rx) = mpsc::channel();
        spawn_executor(move |spawner| {
            spawner
                .spawn(counting_task(Duration::from_millis(1), shutdown, 3, done_tx))
                .unwrap();
        });
        assert_eq!(done_rx.recv().unwrap(), 3);
    }

    #[test]
    fn signal_raised_mid_sleep_skips_the_next_tick() {
        let shutdown = leak_shutdown();
        let (done_tx, done_rx) = mpsc::channel();
        spawn_executor(move |spawner| {
            spawner
                .spawn(counting_task(Duration::from_millis(50), shutdown, 0, done_tx))
                .unwrap();
        });
        std::thread::sleep(std::time::Duration::from_millis(5));
        shutdown.request();
        assert_eq!(done_rx.recv().unwrap(), 0);
    }
}
