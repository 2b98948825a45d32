//! Run registry and per-run event channels.
//!
//! The registry is the process-wide map from run identifier to that run's
//! event channel and lifecycle flags. Producers (`emit`) and the single
//! consumer (`consume`) never touch each other directly; everything goes
//! through the channel. Emitting to an unknown run is a silent no-op, which
//! is exactly what lets producer tasks outlive a disconnected consumer.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use futures::Stream;
use tokio::sync::mpsc;

use taliesin_types::{Envelope, Event, RunId};

/// A stream of stamped events for one run.
pub type EventStream = Pin<Box<dyn Stream<Item = Envelope> + Send + 'static>>;

struct RunEntry {
    sender: mpsc::UnboundedSender<Envelope>,
    /// Taken by the first (and only) consumer.
    receiver: Option<mpsc::UnboundedReceiver<Envelope>>,
    active: bool,
}

type RunMap = Arc<Mutex<HashMap<RunId, RunEntry>>>;

/// Process-wide registry of active runs.
///
/// Cloning is cheap and all clones share the same run map.
#[derive(Clone)]
pub struct RunRegistry {
    heartbeat_interval: Duration,
    runs: RunMap,
}

impl RunRegistry {
    /// Create a registry with the default 1 second heartbeat interval.
    pub fn new() -> Self {
        Self::with_heartbeat_interval(Duration::from_secs(1))
    }

    /// Create a registry with a custom heartbeat interval.
    pub fn with_heartbeat_interval(heartbeat_interval: Duration) -> Self {
        Self {
            heartbeat_interval,
            runs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Register a run, creating its empty event channel.
    ///
    /// Run identifiers must be unique; re-registering an id replaces the
    /// previous channel.
    pub fn register(&self, run_id: RunId) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let entry = RunEntry {
            sender,
            receiver: Some(receiver),
            active: true,
        };

        let mut runs = self.runs.lock();
        if runs.insert(run_id, entry).is_some() {
            tracing::warn!(%run_id, "Replaced existing run registration");
        } else {
            tracing::info!(%run_id, "Registered run");
        }
    }

    /// Stamp and append an event to a run's channel.
    ///
    /// Silently dropped when the run is not registered (e.g. the consumer
    /// disconnected and the channel was cleaned up).
    pub fn emit(&self, run_id: RunId, event: Event) {
        let runs = self.runs.lock();
        let Some(entry) = runs.get(&run_id) else {
            tracing::debug!(%run_id, "Dropping event for unregistered run");
            return;
        };

        let envelope = Envelope::stamp(run_id, event);
        tracing::debug!(%run_id, event = ?envelope.event, "Emitting event");
        // The entry owns a sender, so the channel cannot be closed while the
        // entry exists; a failed send is equivalent to the no-op case.
        let _ = entry.sender.send(envelope);
    }

    /// Mark a run's producer as finished. Emission stays possible until the
    /// consumer (or its absence) cleans the entry up.
    pub fn mark_inactive(&self, run_id: RunId) {
        if let Some(entry) = self.runs.lock().get_mut(&run_id) {
            entry.active = false;
        }
    }

    /// Whether a run is registered and its producer still active.
    pub fn is_active(&self, run_id: RunId) -> bool {
        self.runs.lock().get(&run_id).is_some_and(|e| e.active)
    }

    /// Whether a run is registered at all.
    pub fn contains(&self, run_id: RunId) -> bool {
        self.runs.lock().contains_key(&run_id)
    }

    /// Number of registered runs.
    pub fn run_count(&self) -> usize {
        self.runs.lock().len()
    }

    /// Remove a run's channel and flags.
    pub fn remove(&self, run_id: RunId) {
        remove_run(&self.runs, run_id);
    }

    /// Consume a run's event stream.
    ///
    /// Returns `None` when the run is unknown or already being consumed.
    /// The stream yields events in emission order, inserting a synthetic
    /// `heartbeat` whenever no event arrives within the heartbeat interval.
    /// It ends immediately after yielding a terminal event (`complete` or
    /// `error`), and the run's channel is removed when the stream finishes
    /// or is dropped; early abandonment counts as cleanup too.
    pub fn consume(&self, run_id: RunId) -> Option<EventStream> {
        let mut receiver = {
            let mut runs = self.runs.lock();
            runs.get_mut(&run_id)?.receiver.take()?
        };

        let guard = CleanupGuard {
            runs: Arc::clone(&self.runs),
            run_id,
        };
        let heartbeat_interval = self.heartbeat_interval;

        Some(Box::pin(async_stream::stream! {
            // Held for the stream's lifetime; removes the run when dropped.
            let _guard = guard;

            loop {
                match tokio::time::timeout(heartbeat_interval, receiver.recv()).await {
                    Ok(Some(envelope)) => {
                        let terminal = envelope.is_terminal();
                        yield envelope;
                        if terminal {
                            break;
                        }
                    }
                    Ok(None) => {
                        // All senders gone without a terminal event; the
                        // registry entry normally prevents this, but a
                        // replaced registration can close the old channel.
                        tracing::warn!(%run_id, "Event channel closed without terminal event");
                        break;
                    }
                    Err(_) => {
                        yield Envelope::stamp(run_id, Event::Heartbeat);
                    }
                }
            }
        }))
    }
}

impl Default for RunRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn remove_run(runs: &RunMap, run_id: RunId) {
    if runs.lock().remove(&run_id).is_some() {
        tracing::info!(%run_id, "Removed run");
    }
}

struct CleanupGuard {
    runs: RunMap,
    run_id: RunId,
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        remove_run(&self.runs, self.run_id);
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_events_delivered_in_emission_order() {
        let registry = RunRegistry::new();
        let run_id = RunId::new();
        registry.register(run_id);

        registry.emit(run_id, Event::thought("one"));
        registry.emit(run_id, Event::thought("two"));
        registry.emit(run_id, Event::complete("done"));

        let stream = registry.consume(run_id).unwrap();
        let events: Vec<Envelope> = stream.collect().await;

        assert_eq!(events.len(), 3);
        assert_eq!(events[0].event, Event::thought("one"));
        assert_eq!(events[1].event, Event::thought("two"));
        assert!(events[2].is_terminal());
    }

    #[tokio::test]
    async fn test_timestamps_non_decreasing() {
        let registry = RunRegistry::new();
        let run_id = RunId::new();
        registry.register(run_id);

        for i in 0..5 {
            registry.emit(run_id, Event::thought(format!("t{}", i)));
        }
        registry.emit(run_id, Event::complete("done"));

        let events: Vec<Envelope> = registry.consume(run_id).unwrap().collect().await;
        for pair in events.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    #[tokio::test]
    async fn test_emit_to_unregistered_run_is_noop() {
        let registry = RunRegistry::new();
        // Must not panic or error.
        registry.emit(RunId::new(), Event::thought("lost"));
        assert_eq!(registry.run_count(), 0);
    }

    #[tokio::test]
    async fn test_stream_ends_after_terminal_event() {
        let registry = RunRegistry::new();
        let run_id = RunId::new();
        registry.register(run_id);

        registry.emit(run_id, Event::error("boom"));
        // Emitted after the terminal event; must never be observed.
        registry.emit(run_id, Event::thought("late"));

        let events: Vec<Envelope> = registry.consume(run_id).unwrap().collect().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event, Event::error("boom"));
    }

    #[tokio::test]
    async fn test_run_removed_after_terminal_event() {
        let registry = RunRegistry::new();
        let run_id = RunId::new();
        registry.register(run_id);
        registry.emit(run_id, Event::complete("done"));

        let _events: Vec<Envelope> = registry.consume(run_id).unwrap().collect().await;
        assert!(!registry.contains(run_id));

        // Producer emits after cleanup are no-ops.
        registry.emit(run_id, Event::thought("ghost"));
        assert!(!registry.contains(run_id));
    }

    #[tokio::test]
    async fn test_dropping_stream_cleans_up() {
        let registry = RunRegistry::new();
        let run_id = RunId::new();
        registry.register(run_id);
        registry.emit(run_id, Event::thought("pending"));

        {
            let mut stream = registry.consume(run_id).unwrap();
            let first = stream.next().await.unwrap();
            assert_eq!(first.event, Event::thought("pending"));
            // Client disconnects: stream dropped mid-run.
        }

        assert!(!registry.contains(run_id));
    }

    #[tokio::test]
    async fn test_consume_unknown_run_returns_none() {
        let registry = RunRegistry::new();
        assert!(registry.consume(RunId::new()).is_none());
    }

    #[tokio::test]
    async fn test_second_consume_returns_none() {
        let registry = RunRegistry::new();
        let run_id = RunId::new();
        registry.register(run_id);

        let _stream = registry.consume(run_id).unwrap();
        assert!(registry.consume(run_id).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_heartbeat_on_idle_channel() {
        let registry = RunRegistry::with_heartbeat_interval(Duration::from_secs(1));
        let run_id = RunId::new();
        registry.register(run_id);

        let mut stream = registry.consume(run_id).unwrap();

        // No events for over an interval: a heartbeat arrives first.
        let first = stream.next().await.unwrap();
        assert!(first.event.is_heartbeat());

        // A real event still comes through afterwards.
        registry.emit(run_id, Event::complete("done"));
        let second = stream.next().await.unwrap();
        assert!(second.is_terminal());
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_clones_share_the_run_map() {
        let registry = RunRegistry::new();
        let clone = registry.clone();
        let run_id = RunId::new();

        registry.register(run_id);
        assert!(clone.contains(run_id));

        clone.remove(run_id);
        assert!(!registry.contains(run_id));
    }

    #[tokio::test]
    async fn test_active_flag_lifecycle() {
        let registry = RunRegistry::new();
        let run_id = RunId::new();
        registry.register(run_id);
        assert!(registry.is_active(run_id));

        registry.mark_inactive(run_id);
        assert!(!registry.is_active(run_id));
        assert!(registry.contains(run_id));
    }
}
