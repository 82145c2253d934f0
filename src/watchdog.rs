/// Watchdog lifecycle: arm at run start, heartbeat before each test,
/// disarm at run finish. Thin wrapper over the monitor task; the three
/// operations map one-to-one onto the framework hooks a harness gets.
use crate::heartbeat::{self, HeartbeatSender};
use crate::monitor::Monitor;
use crate::report::{AlarmReporter, AlarmSink, ExitProcess, ProcessTerminator};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

pub struct Watchdog {
    sender: HeartbeatSender,
    handle: Option<JoinHandle<()>>,
}

impl Watchdog {
    /// Arm with the production alarm path: stderr diagnostics, exit 2.
    pub fn arm(timeout: Duration, reporter: AlarmReporter) -> Self {
        Self::arm_with(timeout, Arc::new(reporter), Arc::new(ExitProcess))
    }

    /// Arm with explicit alarm and termination seams (tests substitute
    /// fakes here so an alarm doesn't exit the test process).
    pub fn arm_with(
        timeout: Duration,
        sink: Arc<dyn AlarmSink>,
        terminator: Arc<dyn ProcessTerminator>,
    ) -> Self {
        let (sender, rx) = heartbeat::channel();
        let monitor = Monitor::new(timeout, rx, sink, terminator);
        let handle = tokio::spawn(monitor.run());
        tracing::info!(timeout_secs = timeout.as_secs_f64(), "watchdog armed");
        Self {
            sender,
            handle: Some(handle),
        }
    }

    /// A new test is about to run. Non-blocking.
    pub fn on_test_start(&self, description: &str) {
        self.sender.test_started(description);
    }

    /// Stop the monitor, whether sleeping or draining, and wait for the
    /// task to fully terminate. Safe to call more than once.
    pub async fn disarm(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
            // Cancelled is the expected join outcome here.
            let _ = handle.await;
            tracing::info!("watchdog disarmed");
        }
    }

    /// Whether the monitor task is still attached (true until disarm).
    #[allow(dead_code)]
    pub fn is_armed(&self) -> bool {
        self.handle.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Mutex;

    struct FakeTerminator {
        code: AtomicI32,
    }

    impl FakeTerminator {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                code: AtomicI32::new(-1),
            })
        }

        fn code(&self) -> i32 {
            self.code.load(Ordering::SeqCst)
        }
    }

    impl ProcessTerminator for FakeTerminator {
        fn terminate(&self, code: i32) {
            self.code.store(code, Ordering::SeqCst);
        }
    }

    struct RecordingSink {
        alarms: Mutex<Vec<String>>,
    }

    impl RecordingSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                alarms: Mutex::new(Vec::new()),
            })
        }

        fn alarms(&self) -> Vec<String> {
            self.alarms.lock().unwrap().clone()
        }
    }

    impl AlarmSink for RecordingSink {
        fn alarm(&self, description: &str, _timeout: Duration) {
            self.alarms.lock().unwrap().push(description.to_string());
        }
    }

    fn arm_fake(timeout: Duration) -> (Watchdog, Arc<RecordingSink>, Arc<FakeTerminator>) {
        let sink = RecordingSink::new();
        let terminator = FakeTerminator::new();
        let watchdog = Watchdog::arm_with(timeout, sink.clone(), terminator.clone());
        (watchdog, sink, terminator)
    }

    #[tokio::test]
    async fn test_disarm_while_sleeping() {
        let (mut watchdog, sink, terminator) = arm_fake(Duration::from_millis(100));
        watchdog.disarm().await;
        assert!(!watchdog.is_armed());

        // Well past the deadline: nothing fires after disarm.
        tokio::time::sleep(Duration::from_millis(250)).await;
        assert_eq!(terminator.code(), -1);
        assert!(sink.alarms().is_empty());
    }

    #[tokio::test]
    async fn test_disarm_is_idempotent() {
        let (mut watchdog, _sink, _terminator) = arm_fake(Duration::from_millis(100));
        watchdog.disarm().await;
        watchdog.disarm().await;
        assert!(!watchdog.is_armed());
    }

    #[tokio::test]
    async fn test_disarm_after_alarm_completes() {
        let (mut watchdog, sink, _terminator) = arm_fake(Duration::from_millis(50));
        // Let the alarm fire, then disarm the already-finished monitor.
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(sink.alarms().len(), 1);
        watchdog.disarm().await;
    }

    #[tokio::test]
    async fn test_heartbeat_after_disarm_is_noop() {
        let (mut watchdog, _sink, _terminator) = arm_fake(Duration::from_millis(100));
        watchdog.disarm().await;
        watchdog.on_test_start("late arrival");
    }

    #[tokio::test]
    async fn test_alarm_names_the_running_test() {
        let (watchdog, sink, terminator) = arm_fake(Duration::from_millis(100));
        watchdog.on_test_start("slow test");

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert_eq!(terminator.code(), 2);
        assert_eq!(sink.alarms(), vec!["slow test".to_string()]);
    }

    #[tokio::test]
    async fn test_heartbeats_keep_watchdog_quiet_through_disarm() {
        let (mut watchdog, sink, _terminator) = arm_fake(Duration::from_millis(150));
        for i in 0..5 {
            watchdog.on_test_start(&format!("test {i}"));
            tokio::time::sleep(Duration::from_millis(40)).await;
        }
        watchdog.disarm().await;
        assert!(sink.alarms().is_empty());
    }
}
