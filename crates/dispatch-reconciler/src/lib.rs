//! Pull-only live-state reconciliation.
//!
//! A [`Reconciler`] periodically fetches a full collection from a
//! [`CollectionSource`], diffs it by key against the previously applied
//! [`Snapshot`] and hands the result to an [`UpdateSink`]. Results are applied
//! in issue order: a cycle that completes after a newer one has been applied
//! is discarded.

mod reconciler;
mod snapshot;
mod source;

pub use reconciler::{CycleUpdate, PollHandle, Reconciler, TickOutcome, UpdateSink};
pub use snapshot::{dedupe_by_key, Snapshot};
pub use source::{CollectionSource, FetchError, FetchErrorKind, FetchOutcome, Keyed};
