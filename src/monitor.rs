/// The watchdog's background monitor: tracks time since the last
/// heartbeat and aborts the process when a test overruns its deadline.
///
/// Three states. DRAINING applies queued heartbeats (last one wins).
/// WAITING sleeps until `anchor + timeout`, then re-checks the channel
/// before trusting the clock, so a heartbeat racing the wake-up never
/// turns into a false timeout. ALARMED is terminal: report, then exit 2.
use crate::heartbeat::Heartbeat;
use crate::report::{AlarmSink, ProcessTerminator, TIMEOUT_EXIT_CODE};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::error::TryRecvError;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::Instant;

/// Description used if the run hangs before any test has started.
pub const IDLE_DESCRIPTION: &str = "<no test started>";

/// State owned exclusively by the monitor task. Nothing else reads or
/// writes it; the heartbeat channel is the only shared resource.
pub struct Monitor {
    timeout: Duration,
    anchor: Instant,
    description: String,
    rx: UnboundedReceiver<Heartbeat>,
    sink: Arc<dyn AlarmSink>,
    terminator: Arc<dyn ProcessTerminator>,
}

impl Monitor {
    pub fn new(
        timeout: Duration,
        rx: UnboundedReceiver<Heartbeat>,
        sink: Arc<dyn AlarmSink>,
        terminator: Arc<dyn ProcessTerminator>,
    ) -> Self {
        Self {
            timeout,
            anchor: Instant::now(),
            description: IDLE_DESCRIPTION.to_string(),
            rx,
            sink,
            terminator,
        }
    }

    /// Run until aborted (disarm), the producer side disappears, or a
    /// deadline is exceeded.
    pub async fn run(mut self) {
        tracing::debug!(timeout_secs = self.timeout.as_secs_f64(), "monitor armed");
        loop {
            // DRAINING: apply every queued heartbeat before sleeping.
            // A burst of test starts collapses to the newest window.
            loop {
                match self.rx.try_recv() {
                    Ok(heartbeat) => self.apply(heartbeat),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        tracing::debug!("heartbeat sender dropped, monitor stopping");
                        return;
                    }
                }
            }

            // WAITING: sleep until the current window's deadline. A
            // heartbeat arriving mid-sleep wakes us immediately.
            let wake_at = self.anchor + self.timeout;
            tokio::select! {
                _ = tokio::time::sleep_until(wake_at) => {}
                received = self.rx.recv() => {
                    match received {
                        Some(heartbeat) => {
                            self.apply(heartbeat);
                            continue;
                        }
                        None => {
                            tracing::debug!("heartbeat sender dropped, monitor stopping");
                            return;
                        }
                    }
                }
            }
            // The timer fired. Give a test start that raced the wake-up
            // a chance to land before we trust the clock.
            tokio::task::yield_now().await;

            if !self.rx.is_empty() {
                continue;
            }
            let elapsed = self.anchor.elapsed();
            if elapsed > self.timeout {
                // ALARMED: terminal.
                tracing::error!(
                    description = %self.description,
                    elapsed_secs = elapsed.as_secs_f64(),
                    timeout_secs = self.timeout.as_secs_f64(),
                    "test exceeded deadline, aborting run"
                );
                self.sink.alarm(&self.description, self.timeout);
                self.terminator.terminate(TIMEOUT_EXIT_CODE);
                // Only reachable with a substitute terminator.
                return;
            }
            // Woke early; recompute from the (possibly updated) anchor.
        }
    }

    fn apply(&mut self, heartbeat: Heartbeat) {
        tracing::debug!(description = %heartbeat.description, "heartbeat");
        self.anchor = heartbeat.at;
        self.description = heartbeat.description;
    }
}
