use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use dispatch_reconciler::{
    CollectionSource, CycleUpdate, FetchError, Keyed, PollHandle, Reconciler, TickOutcome,
    UpdateSink,
};
use serde::Serialize;

pub type SharedSource<T> = Arc<dyn CollectionSource<Item = T>>;

/// Most recent failure shown on a console, tagged with where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LastError {
    pub source: &'static str,
    pub message: String,
}

impl LastError {
    pub fn new(source: &'static str, message: impl Into<String>) -> Self {
        Self {
            source,
            message: message.into(),
        }
    }
}

impl fmt::Display for LastError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source, self.message)
    }
}

/// Console state that can surface the latest failure.
pub trait ErrorSurface {
    fn last_error_mut(&mut self) -> &mut Option<LastError>;
}

/// Folds each applied cycle into shared console state.
///
/// A failed cycle replaces the last error; an applied one clears it when it
/// came from the same collection.
pub(crate) struct ViewSink<V, T> {
    collection: &'static str,
    view: Arc<Mutex<V>>,
    apply: fn(&mut V, &CycleUpdate<T>),
}

impl<V, T> ViewSink<V, T> {
    pub(crate) fn new(
        collection: &'static str,
        view: Arc<Mutex<V>>,
        apply: fn(&mut V, &CycleUpdate<T>),
    ) -> Self {
        Self {
            collection,
            view,
            apply,
        }
    }
}

impl<V, T> UpdateSink<T> for ViewSink<V, T>
where
    V: ErrorSurface + Send,
{
    fn on_update(&self, update: &CycleUpdate<T>) {
        let mut view = lock(&self.view);
        (self.apply)(&mut view, update);
        let last_error = view.last_error_mut();
        if last_error
            .as_ref()
            .is_some_and(|error| error.source == self.collection)
        {
            *last_error = None;
        }
    }

    fn on_error(&self, error: &FetchError) {
        *lock(&self.view).last_error_mut() = Some(LastError::new(self.collection, error.to_string()));
    }
}

/// One polled collection: its reconciler plus the handle of the running loop.
pub struct LiveCollection<T: Keyed + Clone + Send + Sync + 'static> {
    reconciler: Arc<Reconciler<SharedSource<T>>>,
    handle: Mutex<Option<PollHandle>>,
}

impl<T: Keyed + Clone + Send + Sync + 'static> LiveCollection<T> {
    pub fn new(
        collection: &str,
        source: SharedSource<T>,
        sink: Arc<dyn UpdateSink<T>>,
    ) -> Self {
        Self {
            reconciler: Arc::new(Reconciler::new(collection, source, sink)),
            handle: Mutex::new(None),
        }
    }

    /// Starts polling unless already running.
    pub fn start(&self, interval: Duration) {
        let mut handle = lock(&self.handle);
        if handle.is_none() {
            *handle = Some(self.reconciler.start(interval));
        }
    }

    pub fn stop(&self) {
        if let Some(handle) = lock(&self.handle).take() {
            self.reconciler.stop(handle);
        }
    }

    /// On-demand cycle. Failures are already logged and surfaced by the sink.
    pub async fn refresh(&self) -> Option<TickOutcome<T>> {
        self.reconciler.tick().await.ok()
    }

    pub fn current(&self) -> Vec<T> {
        self.reconciler.current()
    }
}

pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
