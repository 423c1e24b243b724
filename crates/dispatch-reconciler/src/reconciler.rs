use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

use crate::snapshot::Snapshot;
use crate::source::{CollectionSource, FetchError, FetchOutcome};

const MIN_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, PartialEq)]
pub struct CycleUpdate<T> {
    pub sequence: u64,
    pub current: Vec<T>,
    pub newly_appeared: Vec<T>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome<T> {
    Applied(CycleUpdate<T>),
    NotModified { sequence: u64 },
    /// A newer cycle was applied first, or `stop` ran while this one was in flight.
    Superseded { sequence: u64 },
}

impl<T> TickOutcome<T> {
    pub fn sequence(&self) -> u64 {
        match self {
            Self::Applied(update) => update.sequence,
            Self::NotModified { sequence } | Self::Superseded { sequence } => *sequence,
        }
    }
}

/// Receives the result of every applied cycle.
///
/// Calls are serialized in applied order.
pub trait UpdateSink<T>: Send + Sync {
    fn on_update(&self, update: &CycleUpdate<T>);

    fn on_error(&self, _error: &FetchError) {}
}

struct CycleState<T: crate::source::Keyed> {
    snapshot: Snapshot<T>,
    last_applied: u64,
    stopped_through: u64,
}

pub struct Reconciler<S: CollectionSource> {
    collection: String,
    source: S,
    sink: Arc<dyn UpdateSink<S::Item>>,
    issued: AtomicU64,
    state: Mutex<CycleState<S::Item>>,
}

/// Cancellation handle returned by [`Reconciler::start`].
#[derive(Debug)]
pub struct PollHandle {
    task: JoinHandle<()>,
    cancelled: Arc<AtomicBool>,
}

impl<S: CollectionSource> Reconciler<S> {
    pub fn new(
        collection: impl Into<String>,
        source: S,
        sink: Arc<dyn UpdateSink<S::Item>>,
    ) -> Self {
        Self {
            collection: collection.into(),
            source,
            sink,
            issued: AtomicU64::new(0),
            state: Mutex::new(CycleState {
                snapshot: Snapshot::new(),
                last_applied: 0,
                stopped_through: 0,
            }),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Items of the last applied snapshot.
    pub fn current(&self) -> Vec<S::Item> {
        self.lock_state().snapshot.items().to_vec()
    }

    pub fn last_applied_sequence(&self) -> u64 {
        self.lock_state().last_applied
    }

    /// Runs one fetch-and-reconcile cycle.
    ///
    /// The sequence number is taken before the fetch is issued; the result is
    /// applied only if no later-issued cycle has been applied in the meantime.
    pub async fn tick(&self) -> Result<TickOutcome<S::Item>, FetchError> {
        let sequence = self.issue();
        self.run(sequence).await
    }

    fn issue(&self) -> u64 {
        self.issued.fetch_add(1, Ordering::SeqCst) + 1
    }

    async fn run(&self, sequence: u64) -> Result<TickOutcome<S::Item>, FetchError> {
        debug!(collection = %self.collection, sequence, "fetch issued");
        match self.source.fetch().await {
            Ok(FetchOutcome::Fresh(items)) => Ok(self.apply(sequence, items)),
            Ok(FetchOutcome::NotModified) => Ok(self.not_modified(sequence)),
            Err(error) => self.fail(sequence, error),
        }
    }

    /// Starts the polling loop: one cycle immediately, then one per `interval`.
    ///
    /// Each cycle runs as its own task so a slow fetch never delays the next
    /// scheduled one.
    pub fn start(self: &Arc<Self>, interval: Duration) -> PollHandle {
        let period = interval.max(MIN_INTERVAL);
        let reconciler = Arc::clone(self);
        let cancelled = Arc::new(AtomicBool::new(false));
        let stopped = Arc::clone(&cancelled);
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                // issued before the cancel check, so `stop` either sees this
                // sequence in its watermark or this loop sees the cancel
                let sequence = reconciler.issue();
                if stopped.load(Ordering::SeqCst) {
                    break;
                }
                let cycle = Arc::clone(&reconciler);
                tokio::spawn(async move {
                    if let Err(error) = cycle.run(sequence).await {
                        debug!(
                            collection = %cycle.collection,
                            sequence,
                            kind = %error.kind,
                            "scheduled cycle failed"
                        );
                    }
                });
            }
        });
        debug!(
            collection = %self.collection,
            interval_ms = period.as_millis() as u64,
            "polling started"
        );
        PollHandle { task, cancelled }
    }

    /// Cancels future cycles. Cycles already in flight still complete, but
    /// their results are discarded.
    pub fn stop(&self, handle: PollHandle) {
        handle.cancelled.store(true, Ordering::SeqCst);
        handle.task.abort();
        let issued = self.issued.load(Ordering::SeqCst);
        let mut state = self.lock_state();
        state.stopped_through = state.stopped_through.max(issued);
        debug!(collection = %self.collection, stopped_through = issued, "polling stopped");
    }

    fn apply(&self, sequence: u64, items: Vec<S::Item>) -> TickOutcome<S::Item> {
        let mut state = self.lock_state();
        if is_stale(&state, sequence) {
            drop(state);
            return self.superseded(sequence);
        }

        let newly_appeared = state.snapshot.replace(items);
        state.last_applied = sequence;
        let update = CycleUpdate {
            sequence,
            current: state.snapshot.items().to_vec(),
            newly_appeared,
        };
        self.sink.on_update(&update);
        drop(state);

        debug!(
            collection = %self.collection,
            sequence,
            items = update.current.len(),
            new_items = update.newly_appeared.len(),
            "snapshot applied"
        );
        self.record("applied");
        metrics::gauge!("dispatch_reconcile_items", "collection" => self.collection.clone())
            .set(update.current.len() as f64);
        metrics::gauge!("dispatch_reconcile_new_items", "collection" => self.collection.clone())
            .set(update.newly_appeared.len() as f64);
        TickOutcome::Applied(update)
    }

    fn not_modified(&self, sequence: u64) -> TickOutcome<S::Item> {
        debug!(collection = %self.collection, sequence, "not modified; keeping snapshot");
        self.record("not_modified");
        TickOutcome::NotModified { sequence }
    }

    fn fail(&self, sequence: u64, error: FetchError) -> Result<TickOutcome<S::Item>, FetchError> {
        let stopped = sequence <= self.lock_state().stopped_through;
        if stopped {
            return Ok(self.superseded(sequence));
        }
        warn!(
            collection = %self.collection,
            sequence,
            kind = %error.kind,
            error = %error.message,
            "fetch failed; keeping previous snapshot"
        );
        self.record("error");
        self.sink.on_error(&error);
        Err(error)
    }

    fn superseded(&self, sequence: u64) -> TickOutcome<S::Item> {
        debug!(collection = %self.collection, sequence, "stale result discarded");
        self.record("superseded");
        TickOutcome::Superseded { sequence }
    }

    fn record(&self, outcome: &'static str) {
        metrics::counter!(
            "dispatch_reconcile_cycles_total",
            "collection" => self.collection.clone(),
            "outcome" => outcome
        )
        .increment(1);
    }

    fn lock_state(&self) -> MutexGuard<'_, CycleState<S::Item>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn is_stale<T: crate::source::Keyed>(state: &CycleState<T>, sequence: u64) -> bool {
    sequence <= state.last_applied || sequence <= state.stopped_through
}
