use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use dispatch_client::{ApiClient, ConfirmedReportsSource, NotificationsSource};
use dispatch_core::{
    Coordinate, DispatchError, DispatchResult, Notification, NotificationId, Report, ReportName,
    TeamId, Timestamp, UserId,
};
use dispatch_geo::RouteSummary;
use dispatch_reconciler::CycleUpdate;
use serde::Serialize;
use tracing::info;

use crate::backend::{ResponderBackend, RoutePlanner};
use crate::live::{ErrorSurface, LastError, LiveCollection, SharedSource, ViewSink, lock};
use crate::record_action;

const LOCATION_UPDATE: &str = "location update";
const TEAM_CONFIRMED_REPORTS: &str = "team_confirmed_reports";
const TEAM_NOTIFICATIONS: &str = "team_notifications";

/// Who the console acts as.
#[derive(Debug, Clone)]
pub struct Responder {
    pub team_id: TeamId,
    pub user_id: UserId,
    pub resolver_name: String,
}

pub struct ResponderSources {
    pub confirmed: SharedSource<Report>,
    pub notifications: SharedSource<Notification>,
}

impl ResponderSources {
    pub fn from_api(api: &ApiClient, user: UserId) -> Self {
        Self {
            confirmed: Arc::new(ConfirmedReportsSource::new(api.clone())),
            notifications: Arc::new(NotificationsSource::new(api.clone(), user)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteView {
    pub report: ReportName,
    pub summary: RouteSummary,
    pub label: String,
    pub path: Vec<Coordinate>,
}

#[derive(Debug, Default)]
struct ResponderState {
    notifications: Vec<Notification>,
    cleared: HashSet<NotificationId>,
    new_notifications: usize,
    resolved_locally: HashSet<ReportName>,
    position: Option<Coordinate>,
    route: Option<RouteView>,
    last_error: Option<LastError>,
}

impl ErrorSurface for ResponderState {
    fn last_error_mut(&mut self) -> &mut Option<LastError> {
        &mut self.last_error
    }
}

impl ResponderState {
    fn apply_confirmed(&mut self, update: &CycleUpdate<Report>) {
        // forget local removals once the backend stops listing them
        let listed: HashSet<&ReportName> =
            update.current.iter().map(|report| &report.name).collect();
        self.resolved_locally.retain(|name| listed.contains(name));
    }

    fn apply_notifications(&mut self, update: &CycleUpdate<Notification>) {
        let listed: HashSet<&NotificationId> = update.current.iter().map(|note| &note.id).collect();
        self.cleared.retain(|id| listed.contains(id));
        self.notifications = update
            .current
            .iter()
            .filter(|note| !self.cleared.contains(&note.id))
            .cloned()
            .collect();
        self.new_notifications = update.newly_appeared.len();
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResponderSummary {
    pub team_id: TeamId,
    pub confirmed: Vec<Report>,
    pub notifications: Vec<Notification>,
    pub new_notifications: usize,
    pub position: Option<Coordinate>,
    pub route: Option<RouteView>,
    pub last_error: Option<LastError>,
}

pub struct ResponderConsole {
    responder: Responder,
    backend: Arc<dyn ResponderBackend>,
    planner: Option<Arc<dyn RoutePlanner>>,
    state: Arc<Mutex<ResponderState>>,
    confirmed: LiveCollection<Report>,
    notifications: LiveCollection<Notification>,
}

impl ResponderConsole {
    /// Collection labels of the response-team reconcilers.
    pub const COLLECTIONS: [&'static str; 2] = [TEAM_CONFIRMED_REPORTS, TEAM_NOTIFICATIONS];

    pub fn new(
        responder: Responder,
        backend: Arc<dyn ResponderBackend>,
        planner: Option<Arc<dyn RoutePlanner>>,
        sources: ResponderSources,
    ) -> Self {
        let state = Arc::new(Mutex::new(ResponderState::default()));
        Self {
            responder,
            backend,
            planner,
            confirmed: LiveCollection::new(
                TEAM_CONFIRMED_REPORTS,
                sources.confirmed,
                Arc::new(ViewSink::new(
                    "confirmed reports",
                    state.clone(),
                    ResponderState::apply_confirmed,
                )),
            ),
            notifications: LiveCollection::new(
                TEAM_NOTIFICATIONS,
                sources.notifications,
                Arc::new(ViewSink::new(
                    "notifications",
                    state.clone(),
                    ResponderState::apply_notifications,
                )),
            ),
            state,
        }
    }

    pub fn responder(&self) -> &Responder {
        &self.responder
    }

    pub fn start(&self, interval: Duration) {
        self.confirmed.start(interval);
        self.notifications.start(interval);
        info!(
            team = %self.responder.team_id,
            interval_ms = interval.as_millis() as u64,
            "response-team console polling"
        );
    }

    pub fn stop(&self) {
        self.confirmed.stop();
        self.notifications.stop();
    }

    pub async fn refresh(&self) {
        tokio::join!(self.confirmed.refresh(), self.notifications.refresh());
    }

    /// Confirmed reports minus the ones this console resolved since the last cycle.
    pub fn confirmed(&self) -> Vec<Report> {
        // snapshot first: the reconciler lock is taken before the state lock
        let current = self.confirmed.current();
        let state = lock(&self.state);
        current
            .into_iter()
            .filter(|report| !state.resolved_locally.contains(&report.name))
            .collect()
    }

    pub fn summary(&self) -> ResponderSummary {
        let confirmed = self.confirmed();
        let state = lock(&self.state);
        ResponderSummary {
            team_id: self.responder.team_id.clone(),
            confirmed,
            notifications: state.notifications.clone(),
            new_notifications: state.new_notifications,
            position: state.position,
            route: state.route.clone(),
            last_error: state.last_error.clone(),
        }
    }

    /// Records the team's position and posts it to the backend.
    pub async fn report_position(&self, coordinate: Coordinate) -> DispatchResult<()> {
        if !coordinate.is_valid() {
            return Err(DispatchError::invalid_input("position is out of range"));
        }
        lock(&self.state).position = Some(coordinate);
        let result = self
            .backend
            .post_location(&self.responder.team_id, coordinate)
            .await;
        record_action("post_location", &result);
        let mut state = lock(&self.state);
        match &result {
            Ok(()) => {
                if state
                    .last_error
                    .as_ref()
                    .is_some_and(|error| error.source == LOCATION_UPDATE)
                {
                    state.last_error = None;
                }
            }
            Err(error) => {
                state.last_error = Some(LastError::new(LOCATION_UPDATE, error.message.clone()));
            }
        }
        drop(state);
        result
    }

    /// Resolves a confirmed report as this console's resolver.
    pub async fn resolve(&self, name: &ReportName, at: Timestamp) -> DispatchResult<()> {
        let mut report = self
            .confirmed()
            .into_iter()
            .find(|report| &report.name == name)
            .ok_or_else(|| DispatchError::not_found(format!("confirmed report '{name}' not found")))?;
        report.resolve(&self.responder.resolver_name, at)?;

        let result = self
            .backend
            .resolve_report(name, &self.responder.resolver_name, at)
            .await;
        record_action("resolve", &result);
        result?;
        info!(name = %name, resolver = %self.responder.resolver_name, "report resolved");

        {
            let mut state = lock(&self.state);
            state.resolved_locally.insert(name.clone());
            if state.route.as_ref().is_some_and(|route| &route.report == name) {
                state.route = None;
            }
        }
        self.confirmed.refresh().await;
        Ok(())
    }

    /// Driving route from the last reported position to a confirmed report.
    pub async fn directions(&self, name: &ReportName) -> DispatchResult<RouteView> {
        let planner = self
            .planner
            .as_ref()
            .ok_or_else(|| DispatchError::invalid_input("routing is not configured"))?;
        let from = lock(&self.state)
            .position
            .ok_or_else(|| DispatchError::invalid_input("own position is not known yet"))?;
        let report = self
            .confirmed()
            .into_iter()
            .find(|report| &report.name == name)
            .ok_or_else(|| DispatchError::not_found(format!("confirmed report '{name}' not found")))?;
        let to = report
            .location
            .ok_or_else(|| DispatchError::invalid_input(format!("report '{name}' has no location")))?;

        let route = planner
            .route(from, to)
            .await?
            .ok_or_else(|| DispatchError::not_found(format!("no route to report '{name}'")))?;
        let summary = route.summary();
        let view = RouteView {
            report: name.clone(),
            label: summary.to_string(),
            summary,
            path: route.path,
        };
        lock(&self.state).route = Some(view.clone());
        Ok(view)
    }

    /// Empties the visible notification list; the snapshot is kept so the
    /// cleared ones are not counted as new again.
    pub fn clear_notifications(&self) {
        let mut state = lock(&self.state);
        let ResponderState {
            notifications,
            cleared,
            new_notifications,
            ..
        } = &mut *state;
        cleared.extend(notifications.drain(..).map(|note| note.id));
        *new_notifications = 0;
    }
}

impl Drop for ResponderConsole {
    fn drop(&mut self) {
        self.stop();
    }
}
