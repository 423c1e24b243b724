//! Admin and response-team consoles built on live collections.

pub mod admin;
pub mod backend;
pub mod filter;
pub mod live;
pub mod responder;

pub use admin::{AdminConsole, AdminCounters, AdminSources, AdminSummary};
pub use backend::{AdminBackend, ResponderBackend, RoutePlanner};
pub use filter::ResolvedFilter;
pub use live::{ErrorSurface, LastError, LiveCollection, SharedSource};
pub use responder::{
    Responder, ResponderConsole, ResponderSources, ResponderSummary, RouteView,
};

use dispatch_core::DispatchResult;

pub(crate) fn record_action<T>(action: &'static str, result: &DispatchResult<T>) {
    let outcome = if result.is_ok() { "ok" } else { "error" };
    metrics::counter!(
        "dispatch_console_actions_total",
        "action" => action,
        "outcome" => outcome
    )
    .increment(1);
}
