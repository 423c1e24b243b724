use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::FixedOffset;
use dispatch_client::{
    ApiClient, ConfirmedReportsSource, Page, PendingReportsSource, ResolvedReportsSource,
    TeamLocationsSource,
};
use dispatch_core::{
    DispatchCode, DispatchError, DispatchResult, Report, ReportKind, ReportName, TeamLocation,
    Timestamp,
};
use dispatch_reconciler::CycleUpdate;
use serde::Serialize;
use tracing::info;

use crate::backend::AdminBackend;
use crate::filter::ResolvedFilter;
use crate::live::{ErrorSurface, LastError, LiveCollection, SharedSource, ViewSink, lock};
use crate::record_action;

/// Sources for the five collections the admin console polls.
pub struct AdminSources {
    pub pending_complaints: SharedSource<Report>,
    pub pending_emergencies: SharedSource<Report>,
    pub confirmed: SharedSource<Report>,
    pub team_locations: SharedSource<TeamLocation>,
    pub resolved: SharedSource<Report>,
}

impl AdminSources {
    pub fn from_api(api: &ApiClient) -> Self {
        Self {
            pending_complaints: Arc::new(PendingReportsSource::new(
                api.clone(),
                ReportKind::Complaint,
            )),
            pending_emergencies: Arc::new(PendingReportsSource::new(
                api.clone(),
                ReportKind::Emergency,
            )),
            confirmed: Arc::new(ConfirmedReportsSource::new(api.clone())),
            team_locations: Arc::new(TeamLocationsSource::new(api.clone())),
            resolved: Arc::new(ResolvedReportsSource::new(api.clone())),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AdminCounters {
    pub new_complaints: usize,
    pub new_emergencies: usize,
    pub confirmed_complaints: usize,
    pub confirmed_emergencies: usize,
    pub active_teams: usize,
    pub resolved_total: usize,
    pub last_error: Option<LastError>,
}

impl ErrorSurface for AdminCounters {
    fn last_error_mut(&mut self) -> &mut Option<LastError> {
        &mut self.last_error
    }
}

impl AdminCounters {
    fn apply_pending_complaints(&mut self, update: &CycleUpdate<Report>) {
        self.new_complaints = update.newly_appeared.len();
    }

    fn apply_pending_emergencies(&mut self, update: &CycleUpdate<Report>) {
        self.new_emergencies = update.newly_appeared.len();
    }

    fn apply_confirmed(&mut self, update: &CycleUpdate<Report>) {
        let (complaints, emergencies) =
            update
                .current
                .iter()
                .fold((0, 0), |(complaints, emergencies), report| match report.kind {
                    ReportKind::Complaint => (complaints + 1, emergencies),
                    ReportKind::Emergency => (complaints, emergencies + 1),
                });
        self.confirmed_complaints = complaints;
        self.confirmed_emergencies = emergencies;
    }

    fn apply_team_locations(&mut self, update: &CycleUpdate<TeamLocation>) {
        self.active_teams = update
            .current
            .iter()
            .map(|location| &location.team_id)
            .collect::<HashSet<_>>()
            .len();
    }

    fn apply_resolved(&mut self, update: &CycleUpdate<Report>) {
        self.resolved_total = update.current.len();
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminSummary {
    #[serde(flatten)]
    pub counters: AdminCounters,
    pub pending_complaints: usize,
    pub pending_emergencies: usize,
}

const PENDING_COMPLAINTS: &str = "pending_complaints";
const PENDING_EMERGENCIES: &str = "pending_emergencies";
const CONFIRMED_REPORTS: &str = "confirmed_reports";
const TEAM_LOCATIONS: &str = "team_locations";
const RESOLVED_REPORTS: &str = "resolved_reports";

pub struct AdminConsole {
    backend: Arc<dyn AdminBackend>,
    counters: Arc<Mutex<AdminCounters>>,
    pending_complaints: LiveCollection<Report>,
    pending_emergencies: LiveCollection<Report>,
    confirmed: LiveCollection<Report>,
    team_locations: LiveCollection<TeamLocation>,
    resolved: LiveCollection<Report>,
    offset: FixedOffset,
}

impl AdminConsole {
    /// Collection labels of the admin reconcilers.
    pub const COLLECTIONS: [&'static str; 5] = [
        PENDING_COMPLAINTS,
        PENDING_EMERGENCIES,
        CONFIRMED_REPORTS,
        TEAM_LOCATIONS,
        RESOLVED_REPORTS,
    ];

    pub fn new(backend: Arc<dyn AdminBackend>, sources: AdminSources, offset: FixedOffset) -> Self {
        let counters = Arc::new(Mutex::new(AdminCounters::default()));
        Self {
            backend,
            pending_complaints: LiveCollection::new(
                PENDING_COMPLAINTS,
                sources.pending_complaints,
                Arc::new(ViewSink::new(
                    "pending complaints",
                    counters.clone(),
                    AdminCounters::apply_pending_complaints,
                )),
            ),
            pending_emergencies: LiveCollection::new(
                PENDING_EMERGENCIES,
                sources.pending_emergencies,
                Arc::new(ViewSink::new(
                    "pending emergencies",
                    counters.clone(),
                    AdminCounters::apply_pending_emergencies,
                )),
            ),
            confirmed: LiveCollection::new(
                CONFIRMED_REPORTS,
                sources.confirmed,
                Arc::new(ViewSink::new(
                    "confirmed reports",
                    counters.clone(),
                    AdminCounters::apply_confirmed,
                )),
            ),
            team_locations: LiveCollection::new(
                TEAM_LOCATIONS,
                sources.team_locations,
                Arc::new(ViewSink::new(
                    "team locations",
                    counters.clone(),
                    AdminCounters::apply_team_locations,
                )),
            ),
            resolved: LiveCollection::new(
                RESOLVED_REPORTS,
                sources.resolved,
                Arc::new(ViewSink::new(
                    "resolved reports",
                    counters.clone(),
                    AdminCounters::apply_resolved,
                )),
            ),
            counters,
            offset,
        }
    }

    pub fn start(&self, interval: Duration) {
        self.pending_complaints.start(interval);
        self.pending_emergencies.start(interval);
        self.confirmed.start(interval);
        self.team_locations.start(interval);
        self.resolved.start(interval);
        info!(interval_ms = interval.as_millis() as u64, "admin console polling");
    }

    pub fn stop(&self) {
        self.pending_complaints.stop();
        self.pending_emergencies.stop();
        self.confirmed.stop();
        self.team_locations.stop();
        self.resolved.stop();
    }

    /// Runs one cycle of every collection.
    pub async fn refresh(&self) {
        tokio::join!(
            self.pending_complaints.refresh(),
            self.pending_emergencies.refresh(),
            self.confirmed.refresh(),
            self.team_locations.refresh(),
            self.resolved.refresh(),
        );
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    pub fn summary(&self) -> AdminSummary {
        let counters = lock(&self.counters).clone();
        AdminSummary {
            counters,
            pending_complaints: self.pending_complaints.current().len(),
            pending_emergencies: self.pending_emergencies.current().len(),
        }
    }

    pub fn pending(&self, kind: ReportKind) -> Vec<Report> {
        self.pending_collection(kind).current()
    }

    pub fn confirmed(&self) -> Vec<Report> {
        self.confirmed.current()
    }

    pub fn team_locations(&self) -> Vec<TeamLocation> {
        self.team_locations.current()
    }

    pub fn resolved(&self, filter: &ResolvedFilter, now: Timestamp) -> Vec<Report> {
        filter.apply(&self.resolved.current(), now, self.offset)
    }

    /// One page of a pending listing, read straight from the backend.
    pub async fn pending_page(&self, kind: ReportKind, page: Page) -> DispatchResult<Vec<Report>> {
        self.backend.pending_page(kind, page).await
    }

    /// Confirms a pending report with a dispatch code.
    pub async fn confirm(
        &self,
        kind: ReportKind,
        name: &ReportName,
        code: DispatchCode,
        at: Timestamp,
    ) -> DispatchResult<()> {
        let mut report = self.locate(kind, name).await?;
        report.confirm(code, at)?;

        let result = self.backend.confirm_report(kind, name, code).await;
        record_action("confirm", &result);
        result?;
        info!(%kind, name = %name, code = %code, "report confirmed");

        tokio::join!(self.pending_collection(kind).refresh(), self.confirmed.refresh());
        Ok(())
    }

    /// Deletes a pending or confirmed report.
    pub async fn delete(&self, kind: ReportKind, name: &ReportName) -> DispatchResult<()> {
        let report = self.locate(kind, name).await?;
        report.ensure_deletable()?;

        let result = self.backend.delete_report(kind, name).await;
        record_action("delete", &result);
        result?;
        info!(%kind, name = %name, "report deleted");

        tokio::join!(self.pending_collection(kind).refresh(), self.confirmed.refresh());
        Ok(())
    }

    /// Finds the report in the local snapshots, refreshing the pending
    /// listing once when it is not there yet.
    async fn locate(&self, kind: ReportKind, name: &ReportName) -> DispatchResult<Report> {
        if let Some(report) = self.find(kind, name) {
            return Ok(report);
        }
        self.pending_collection(kind).refresh().await;
        self.find(kind, name)
            .ok_or_else(|| DispatchError::not_found(format!("{kind} '{name}' not found")))
    }

    fn find(&self, kind: ReportKind, name: &ReportName) -> Option<Report> {
        let matches = |report: &Report| report.kind == kind && &report.name == name;
        self.pending_collection(kind)
            .current()
            .into_iter()
            .chain(self.confirmed.current())
            .chain(self.resolved.current())
            .find(|report| matches(report))
    }

    fn pending_collection(&self, kind: ReportKind) -> &LiveCollection<Report> {
        match kind {
            ReportKind::Complaint => &self.pending_complaints,
            ReportKind::Emergency => &self.pending_emergencies,
        }
    }
}

impl Drop for AdminConsole {
    fn drop(&mut self) {
        self.stop();
    }
}
