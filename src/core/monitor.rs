//! Standby purge policy loop
//!
//! On a fixed cadence: read the configuration, take a memory snapshot,
//! compare effective free memory against the threshold, and purge the
//! standby list when it falls short. One decision per tick — a purge that
//! does not lift free memory above the threshold is simply re-evaluated on
//! the next tick, which bounds the purge rate by the configured interval.

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::core::config::{ConfigStore, PolicyConfig};
use crate::core::memlist::{probe, MemoryListOps, NtStatus, PurgeError};
use crate::core::sink::EventSink;

/// Delay after a failed memory list query, replacing the normal interval
/// so the loop does not hot-spin against a failing diagnostic endpoint.
pub const ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// State shared between the monitor loop and the service control handler.
///
/// The control handler is the only writer of the running flag; the loop
/// only reads it, at the top of each iteration.
#[derive(Debug)]
pub struct MonitorContext {
    running: AtomicBool,
}

impl MonitorContext {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(true),
        }
    }

    /// Signal the loop to stop at its next poll point.
    pub fn request_stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Default for MonitorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tick {
    /// Free memory at or above the threshold; nothing to do.
    Idle { free_mb: f64 },
    /// Threshold crossed and the standby list was purged.
    Purged { free_mb: f64 },
    /// Threshold crossed but the purge call failed.
    PurgeFailed { free_mb: f64, status: NtStatus },
    /// The memory list query itself failed.
    ProbeFailed { status: NtStatus },
}

/// The monitor core: probe, decide, purge, report.
pub struct StandbyMonitor {
    ops: Box<dyn MemoryListOps>,
    store: Box<dyn ConfigStore>,
    sink: Box<dyn EventSink>,
    page_size: u64,
}

impl StandbyMonitor {
    pub fn new(
        ops: Box<dyn MemoryListOps>,
        store: Box<dyn ConfigStore>,
        sink: Box<dyn EventSink>,
        page_size: u64,
    ) -> Self {
        Self {
            ops,
            store,
            sink,
            page_size,
        }
    }

    /// One-time startup self-check: issue a purge once to confirm the
    /// process holds the privilege the loop will need.
    ///
    /// A failure here means the service is not elevated and must not enter
    /// the tick loop; an operator has to repair the environment and
    /// restart.
    pub fn check_privileges(&self) -> Result<(), PurgeError> {
        if let Err(e) = self.ops.purge_standby_list() {
            self.sink
                .error("Insufficient privileges to purge the standby list.");
            return Err(e);
        }
        Ok(())
    }

    /// Evaluate one tick against the given configuration.
    pub fn tick(&self, config: &PolicyConfig) -> Tick {
        let snapshot = match probe(self.ops.as_ref(), self.page_size) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.sink
                    .error(&format!("Memory list query failed. Status={}", e.status));
                return Tick::ProbeFailed { status: e.status };
            }
        };

        let free_mb = snapshot.free_mb();
        debug!(
            "free {:.0} MB, standby {:.0} MB, threshold {} MB",
            free_mb,
            snapshot.standby_mb(),
            config.min_free_mb
        );

        if free_mb >= f64::from(config.min_free_mb) {
            return Tick::Idle { free_mb };
        }

        match self.ops.purge_standby_list() {
            Ok(()) => {
                self.sink.info(&format!(
                    "Standby list purged. Effective free: {:.0} MB",
                    free_mb
                ));
                Tick::Purged { free_mb }
            }
            Err(e) => {
                self.sink.error(&format!(
                    "Failed to purge standby list (status {}). Effective free: {:.0} MB",
                    e.status, free_mb
                ));
                Tick::PurgeFailed {
                    free_mb,
                    status: e.status,
                }
            }
        }
    }

    /// Delay to apply before the next tick.
    ///
    /// Only a probe failure changes the schedule; a purge failure is
    /// assumed transient once the startup privilege check has passed.
    pub fn delay_after(&self, tick: &Tick, config: &PolicyConfig) -> Duration {
        match tick {
            Tick::ProbeFailed { .. } => ERROR_BACKOFF,
            _ => config.interval(),
        }
    }

    /// Run the policy loop until the context's stop flag is observed.
    ///
    /// The sleep blocks the worker thread; the flag is polled again at the
    /// top of the next iteration, so worst-case stop latency is one full
    /// sleep.
    pub fn run(&self, ctx: &MonitorContext) {
        while ctx.is_running() {
            let config = PolicyConfig::load(self.store.as_ref());
            let tick = self.tick(&config);
            thread::sleep(self.delay_after(&tick, &config));
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::{Arc, Mutex};
    use std::time::Instant;

    use super::*;
    use crate::core::config::{MemoryConfigStore, CHECK_INTERVAL_KEY, MIN_FREE_MB_KEY};
    use crate::core::memlist::{MemoryListCounts, ProbeError};

    const PAGE_SIZE: u64 = 4096;

    fn counts_with(free_mb: u64, standby_mb: u64) -> MemoryListCounts {
        let mut counts = MemoryListCounts::default();
        counts.free_page_count = free_mb * 1024 * 1024 / PAGE_SIZE;
        counts.page_count_by_priority[2] = standby_mb * 1024 * 1024 / PAGE_SIZE;
        counts
    }

    struct FakeOps {
        query_result: Result<MemoryListCounts, ProbeError>,
        purge_result: Result<(), PurgeError>,
        query_calls: Arc<AtomicUsize>,
        purge_calls: Arc<AtomicUsize>,
    }

    impl FakeOps {
        fn healthy(free_mb: u64, standby_mb: u64) -> Self {
            Self {
                query_result: Ok(counts_with(free_mb, standby_mb)),
                purge_result: Ok(()),
                query_calls: Arc::new(AtomicUsize::new(0)),
                purge_calls: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    impl MemoryListOps for FakeOps {
        fn query_memory_list(&self) -> Result<MemoryListCounts, ProbeError> {
            self.query_calls.fetch_add(1, Ordering::SeqCst);
            self.query_result
        }

        fn purge_standby_list(&self) -> Result<(), PurgeError> {
            self.purge_calls.fetch_add(1, Ordering::SeqCst);
            self.purge_result
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        infos: Arc<Mutex<Vec<String>>>,
        errors: Arc<Mutex<Vec<String>>>,
    }

    impl EventSink for RecordingSink {
        fn info(&self, message: &str) {
            self.infos.lock().unwrap().push(message.to_string());
        }

        fn error(&self, message: &str) {
            self.errors.lock().unwrap().push(message.to_string());
        }
    }

    struct Harness {
        monitor: StandbyMonitor,
        query_calls: Arc<AtomicUsize>,
        purge_calls: Arc<AtomicUsize>,
        infos: Arc<Mutex<Vec<String>>>,
        errors: Arc<Mutex<Vec<String>>>,
    }

    fn harness(ops: FakeOps, store: MemoryConfigStore) -> Harness {
        let query_calls = Arc::clone(&ops.query_calls);
        let purge_calls = Arc::clone(&ops.purge_calls);
        let sink = RecordingSink::default();
        let infos = Arc::clone(&sink.infos);
        let errors = Arc::clone(&sink.errors);

        Harness {
            monitor: StandbyMonitor::new(
                Box::new(ops),
                Box::new(store),
                Box::new(sink),
                PAGE_SIZE,
            ),
            query_calls,
            purge_calls,
            infos,
            errors,
        }
    }

    #[test]
    fn test_purges_when_free_below_threshold() {
        let h = harness(FakeOps::healthy(1024, 4096), MemoryConfigStore::new());
        let config = PolicyConfig::default();

        let tick = h.monitor.tick(&config);

        match tick {
            Tick::Purged { free_mb } => assert!((free_mb - 1024.0).abs() < 1e-9),
            other => panic!("expected purge, got {:?}", other),
        }
        assert_eq!(h.purge_calls.load(Ordering::SeqCst), 1);
        assert!(h.infos.lock().unwrap()[0].contains("1024 MB"));
        assert!(h.errors.lock().unwrap().is_empty());
    }

    #[test]
    fn test_idles_when_free_above_threshold() {
        let h = harness(FakeOps::healthy(4096, 2048), MemoryConfigStore::new());
        let config = PolicyConfig::default();

        let tick = h.monitor.tick(&config);

        assert!(matches!(tick, Tick::Idle { .. }));
        assert_eq!(h.purge_calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.monitor.delay_after(&tick, &config), Duration::from_secs(10));
    }

    #[test]
    fn test_threshold_is_a_strict_comparison() {
        // Exactly at the threshold counts as healthy.
        let h = harness(FakeOps::healthy(2048, 0), MemoryConfigStore::new());

        let tick = h.monitor.tick(&PolicyConfig::default());

        assert!(matches!(tick, Tick::Idle { .. }));
        assert_eq!(h.purge_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_probe_failure_backs_off_without_purging() {
        let mut ops = FakeOps::healthy(0, 0);
        ops.query_result = Err(ProbeError {
            status: NtStatus(0xC000_0004u32 as i32),
        });
        let h = harness(ops, MemoryConfigStore::new());
        let config = PolicyConfig::default();

        let tick = h.monitor.tick(&config);

        assert!(matches!(tick, Tick::ProbeFailed { .. }));
        assert_eq!(h.purge_calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.monitor.delay_after(&tick, &config), ERROR_BACKOFF);
        assert!(h.errors.lock().unwrap()[0].contains("0xC0000004"));
    }

    #[test]
    fn test_purge_failure_keeps_normal_interval() {
        let mut ops = FakeOps::healthy(512, 4096);
        ops.purge_result = Err(PurgeError {
            status: NtStatus(0xC000_0061u32 as i32),
        });
        let h = harness(ops, MemoryConfigStore::new());
        let config = PolicyConfig::default();

        let tick = h.monitor.tick(&config);

        assert!(matches!(tick, Tick::PurgeFailed { .. }));
        assert_eq!(h.monitor.delay_after(&tick, &config), config.interval());
        let errors = h.errors.lock().unwrap();
        assert!(errors[0].contains("0xC0000061"));
        assert!(errors[0].contains("512 MB"));
    }

    #[test]
    fn test_purge_of_empty_standby_is_silent_success() {
        let h = harness(FakeOps::healthy(100, 0), MemoryConfigStore::new());

        let tick = h.monitor.tick(&PolicyConfig::default());

        assert!(matches!(tick, Tick::Purged { .. }));
        assert!(h.errors.lock().unwrap().is_empty());
    }

    #[test]
    fn test_privilege_check_reports_failure() {
        let mut ops = FakeOps::healthy(0, 0);
        ops.purge_result = Err(PurgeError {
            status: NtStatus(0xC000_0061u32 as i32),
        });
        let h = harness(ops, MemoryConfigStore::new());

        assert!(h.monitor.check_privileges().is_err());
        assert!(h.errors.lock().unwrap()[0].contains("privileges"));
    }

    #[test]
    fn test_privilege_check_passes_quietly() {
        let h = harness(FakeOps::healthy(0, 0), MemoryConfigStore::new());

        assert!(h.monitor.check_privileges().is_ok());
        assert_eq!(h.purge_calls.load(Ordering::SeqCst), 1);
        assert!(h.errors.lock().unwrap().is_empty());
    }

    #[test]
    fn test_stopped_context_prevents_any_tick() {
        let h = harness(FakeOps::healthy(4096, 0), MemoryConfigStore::new());
        let ctx = MonitorContext::new();
        ctx.request_stop();

        h.monitor.run(&ctx);

        assert_eq!(h.query_calls.load(Ordering::SeqCst), 0);
        assert_eq!(h.purge_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_stop_during_sleep_bounds_shutdown() {
        let store = MemoryConfigStore::new();
        store.set(CHECK_INTERVAL_KEY, 1);
        store.set(MIN_FREE_MB_KEY, 2048);
        let h = harness(FakeOps::healthy(4096, 0), store);
        let query_calls = Arc::clone(&h.query_calls);

        let ctx = Arc::new(MonitorContext::new());
        let loop_ctx = Arc::clone(&ctx);
        let monitor = h.monitor;

        let start = Instant::now();
        let worker = thread::spawn(move || monitor.run(&loop_ctx));
        thread::sleep(Duration::from_millis(200));
        ctx.request_stop();
        worker.join().unwrap();

        // At most one full sleep cycle after the stop signal.
        assert!(start.elapsed() < Duration::from_secs(3));
        assert!(query_calls.load(Ordering::SeqCst) >= 1);
    }
}
