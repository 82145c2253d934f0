/// Heartbeat channel between the test executor and the monitor task.
///
/// The executor sends one heartbeat per test start; the monitor drains
/// them opportunistically. The channel is unbounded so the send side
/// never blocks test execution.
use tokio::sync::mpsc;
use tokio::time::Instant;

/// One "a new test is about to run" event.
///
/// The timestamp is captured by the producer, not the consumer, so time
/// spent sitting in the queue never counts against the test's window.
#[derive(Debug, Clone)]
pub struct Heartbeat {
    pub at: Instant,
    pub description: String,
}

/// Producer handle held by the executor side.
#[derive(Debug, Clone)]
pub struct HeartbeatSender {
    tx: mpsc::UnboundedSender<Heartbeat>,
}

impl HeartbeatSender {
    /// Record that a test is about to run. Non-blocking; if the monitor
    /// has already been stopped the heartbeat is silently dropped.
    pub fn test_started(&self, description: impl Into<String>) {
        let heartbeat = Heartbeat {
            at: Instant::now(),
            description: description.into(),
        };
        if self.tx.send(heartbeat).is_err() {
            tracing::debug!("heartbeat dropped: monitor already stopped");
        }
    }
}

/// Create the heartbeat channel: one sender for the executor, one
/// receiver owned exclusively by the monitor task.
pub fn channel() -> (HeartbeatSender, mpsc::UnboundedReceiver<Heartbeat>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (HeartbeatSender { tx }, rx)
}
