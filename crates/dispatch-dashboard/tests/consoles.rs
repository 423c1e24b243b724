use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{FixedOffset, TimeZone, Utc};
use dispatch_client::Page;
use dispatch_core::{
    Coordinate, DispatchCode, DispatchError, DispatchResult, ErrorCode, Notification,
    NotificationId, Report, ReportKind, ReportName, ReportState, TeamId, TeamLocation, Timestamp,
    UserId,
};
use dispatch_dashboard::{
    AdminBackend, AdminConsole, AdminSources, ResolvedFilter, Responder, ResponderBackend,
    ResponderConsole, ResponderSources, RoutePlanner,
};
use dispatch_geo::Route;
use dispatch_reconciler::{CollectionSource, FetchError, FetchOutcome, Keyed};

struct ListSource<T> {
    items: Mutex<Result<Vec<T>, FetchError>>,
    calls: AtomicUsize,
}

impl<T> ListSource<T> {
    fn new(items: Vec<T>) -> Arc<Self> {
        Arc::new(Self {
            items: Mutex::new(Ok(items)),
            calls: AtomicUsize::new(0),
        })
    }

    fn set(&self, items: Vec<T>) {
        *self.items.lock().unwrap() = Ok(items);
    }

    fn fail(&self, message: &str) {
        *self.items.lock().unwrap() = Err(FetchError::transport(message));
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<T> CollectionSource for ListSource<T>
where
    T: Keyed + Clone + Send + Sync + 'static,
{
    type Item = T;

    async fn fetch(&self) -> Result<FetchOutcome<T>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.items
            .lock()
            .unwrap()
            .clone()
            .map(FetchOutcome::Fresh)
    }
}

#[derive(Default)]
struct RecordingBackend {
    confirmed: Mutex<Vec<(ReportKind, ReportName, DispatchCode)>>,
    deleted: Mutex<Vec<(ReportKind, ReportName)>>,
    resolved: Mutex<Vec<(ReportName, String)>>,
    positions: Mutex<Vec<(TeamId, Coordinate)>>,
    failing: AtomicBool,
}

impl RecordingBackend {
    fn failing() -> Self {
        Self {
            failing: AtomicBool::new(true),
            ..Self::default()
        }
    }

    fn outcome(&self) -> DispatchResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            Err(DispatchError::new(ErrorCode::Upstream, "backend unavailable"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl AdminBackend for RecordingBackend {
    async fn pending_page(&self, kind: ReportKind, page: Page) -> DispatchResult<Vec<Report>> {
        Ok((0..page.size)
            .map(|offset| pending(kind, &format!("page-{}-{}", page.index, offset)))
            .collect())
    }

    async fn confirm_report(
        &self,
        kind: ReportKind,
        name: &ReportName,
        code: DispatchCode,
    ) -> DispatchResult<()> {
        self.confirmed
            .lock()
            .unwrap()
            .push((kind, name.clone(), code));
        self.outcome()
    }

    async fn delete_report(&self, kind: ReportKind, name: &ReportName) -> DispatchResult<()> {
        self.deleted.lock().unwrap().push((kind, name.clone()));
        self.outcome()
    }
}

#[async_trait]
impl ResponderBackend for RecordingBackend {
    async fn resolve_report(
        &self,
        name: &ReportName,
        resolver: &str,
        _at: Timestamp,
    ) -> DispatchResult<()> {
        self.resolved
            .lock()
            .unwrap()
            .push((name.clone(), resolver.to_string()));
        self.outcome()
    }

    async fn post_location(&self, team: &TeamId, coordinate: Coordinate) -> DispatchResult<()> {
        self.positions
            .lock()
            .unwrap()
            .push((team.clone(), coordinate));
        self.outcome()
    }
}

struct StraightLine;

#[async_trait]
impl RoutePlanner for StraightLine {
    async fn route(&self, from: Coordinate, to: Coordinate) -> DispatchResult<Option<Route>> {
        Ok(Some(Route {
            path: vec![from, to],
            distance_m: 2_340.0,
            duration_s: 600.0,
        }))
    }
}

fn now() -> Timestamp {
    Utc.with_ymd_and_hms(2024, 5, 10, 4, 0, 0).unwrap()
}

fn manila() -> FixedOffset {
    FixedOffset::east_opt(8 * 3600).unwrap()
}

fn report(kind: ReportKind, name: &str, state: ReportState) -> Report {
    Report {
        name: ReportName::new(name),
        kind,
        category: "Flood".to_string(),
        address: "Barangay Malanday, Marikina".to_string(),
        description: String::new(),
        location: Some(Coordinate::new(14.6507, 121.1029)),
        media_url: None,
        state,
    }
}

fn pending(kind: ReportKind, name: &str) -> Report {
    report(kind, name, ReportState::Pending)
}

fn confirmed(kind: ReportKind, name: &str) -> Report {
    report(
        kind,
        name,
        ReportState::Confirmed {
            code: Some(DispatchCode::Yellow),
            confirmed_at: Some(now()),
        },
    )
}

fn resolved(kind: ReportKind, name: &str) -> Report {
    report(
        kind,
        name,
        ReportState::Resolved {
            code: Some(DispatchCode::Red),
            confirmed_at: Some(now()),
            resolved_at: now(),
            resolved_by: "Pedro".to_string(),
        },
    )
}

fn team(id: &str) -> TeamLocation {
    TeamLocation {
        team_id: TeamId::new(id),
        coordinate: Coordinate::new(14.64, 121.10),
        recorded_at: None,
    }
}

fn note(id: &str) -> Notification {
    Notification {
        id: NotificationId::new(id),
        message: format!("dispatch {id}"),
        created_at: None,
    }
}

fn name(value: &str) -> ReportName {
    ReportName::new(value)
}

struct AdminFixture {
    console: AdminConsole,
    backend: Arc<RecordingBackend>,
    complaints: Arc<ListSource<Report>>,
    emergencies: Arc<ListSource<Report>>,
    confirmed: Arc<ListSource<Report>>,
    teams: Arc<ListSource<TeamLocation>>,
    resolved: Arc<ListSource<Report>>,
}

fn admin(backend: RecordingBackend) -> AdminFixture {
    let backend = Arc::new(backend);
    let complaints = ListSource::new(vec![
        pending(ReportKind::Complaint, "Ana"),
        pending(ReportKind::Complaint, "Ben"),
    ]);
    let emergencies = ListSource::new(vec![pending(ReportKind::Emergency, "Carla")]);
    let confirmed_reports = ListSource::new(vec![
        confirmed(ReportKind::Complaint, "Dino"),
        confirmed(ReportKind::Emergency, "Ella"),
        confirmed(ReportKind::Emergency, "Fe"),
    ]);
    let teams = ListSource::new(vec![team("team-1"), team("team-2"), team("team-1")]);
    let resolved_reports = ListSource::new(vec![resolved(ReportKind::Complaint, "Gina")]);

    let sources = AdminSources {
        pending_complaints: complaints.clone(),
        pending_emergencies: emergencies.clone(),
        confirmed: confirmed_reports.clone(),
        team_locations: teams.clone(),
        resolved: resolved_reports.clone(),
    };
    AdminFixture {
        console: AdminConsole::new(backend.clone(), sources, manila()),
        backend,
        complaints,
        emergencies,
        confirmed: confirmed_reports,
        teams,
        resolved: resolved_reports,
    }
}

#[tokio::test]
async fn admin_counters_follow_each_cycle() {
    let fixture = admin(RecordingBackend::default());
    fixture.console.refresh().await;

    let summary = fixture.console.summary();
    assert_eq!(summary.counters.new_complaints, 2);
    assert_eq!(summary.counters.new_emergencies, 1);
    assert_eq!(summary.counters.confirmed_complaints, 1);
    assert_eq!(summary.counters.confirmed_emergencies, 2);
    assert_eq!(summary.counters.active_teams, 2);
    assert_eq!(summary.counters.resolved_total, 1);
    assert_eq!(summary.pending_complaints, 2);
    assert_eq!(summary.pending_emergencies, 1);
    assert_eq!(summary.counters.last_error, None);

    fixture.complaints.set(vec![
        pending(ReportKind::Complaint, "Ana"),
        pending(ReportKind::Complaint, "Ben"),
        pending(ReportKind::Complaint, "Hugo"),
    ]);
    fixture.teams.set(vec![team("team-1")]);
    fixture.console.refresh().await;

    let summary = fixture.console.summary();
    assert_eq!(summary.counters.new_complaints, 1);
    assert_eq!(summary.counters.new_emergencies, 0);
    assert_eq!(summary.counters.active_teams, 1);
    assert_eq!(summary.pending_complaints, 3);
    assert_eq!(fixture.emergencies.calls(), 2);
    assert_eq!(fixture.resolved.calls(), 2);
}

#[tokio::test]
async fn failed_fetch_is_surfaced_until_the_next_good_cycle() {
    let fixture = admin(RecordingBackend::default());
    fixture.console.refresh().await;

    fixture.confirmed.fail("connection reset");
    fixture.console.refresh().await;
    let summary = fixture.console.summary();
    let error = summary.counters.last_error.expect("error surfaced");
    assert_eq!(error.source, "confirmed reports");
    assert!(error.message.contains("connection reset"), "got {error}");
    assert_eq!(summary.counters.confirmed_emergencies, 2);
    assert_eq!(fixture.console.confirmed().len(), 3);

    fixture
        .confirmed
        .set(vec![confirmed(ReportKind::Complaint, "Dino")]);
    fixture.console.refresh().await;
    let summary = fixture.console.summary();
    assert_eq!(summary.counters.last_error, None);
    assert_eq!(summary.counters.confirmed_emergencies, 0);
}

#[tokio::test]
async fn confirm_sends_code_and_refreshes_listings() {
    let fixture = admin(RecordingBackend::default());
    fixture.console.refresh().await;
    let calls_before = fixture.complaints.calls();

    fixture
        .console
        .confirm(ReportKind::Complaint, &name("Ana"), DispatchCode::Red, now())
        .await
        .expect("confirm");

    assert_eq!(
        *fixture.backend.confirmed.lock().unwrap(),
        vec![(ReportKind::Complaint, name("Ana"), DispatchCode::Red)]
    );
    assert_eq!(fixture.complaints.calls(), calls_before + 1);
    assert_eq!(fixture.confirmed.calls(), 2);
}

#[tokio::test]
async fn confirming_a_confirmed_report_is_rejected_locally() {
    let fixture = admin(RecordingBackend::default());
    fixture.console.refresh().await;

    let error = fixture
        .console
        .confirm(ReportKind::Emergency, &name("Ella"), DispatchCode::Blue, now())
        .await
        .unwrap_err();
    assert_eq!(error.code, ErrorCode::InvalidTransition);
    assert!(fixture.backend.confirmed.lock().unwrap().is_empty());
}

#[tokio::test]
async fn resolved_reports_cannot_be_deleted() {
    let fixture = admin(RecordingBackend::default());
    fixture.console.refresh().await;

    let error = fixture
        .console
        .delete(ReportKind::Complaint, &name("Gina"))
        .await
        .unwrap_err();
    assert_eq!(error.code, ErrorCode::InvalidTransition);

    fixture
        .console
        .delete(ReportKind::Emergency, &name("Fe"))
        .await
        .expect("confirmed reports are deletable");
    assert_eq!(
        *fixture.backend.deleted.lock().unwrap(),
        vec![(ReportKind::Emergency, name("Fe"))]
    );
}

#[tokio::test]
async fn unknown_report_refreshes_pending_once_then_fails() {
    let fixture = admin(RecordingBackend::default());
    fixture.console.refresh().await;
    let calls_before = fixture.complaints.calls();

    let error = fixture
        .console
        .delete(ReportKind::Complaint, &name("Nobody"))
        .await
        .unwrap_err();
    assert_eq!(error.code, ErrorCode::NotFound);
    assert_eq!(fixture.complaints.calls(), calls_before + 1);
    assert!(fixture.backend.deleted.lock().unwrap().is_empty());
}

#[tokio::test]
async fn report_submitted_since_last_cycle_can_be_confirmed() {
    let fixture = admin(RecordingBackend::default());
    fixture.console.refresh().await;
    fixture.complaints.set(vec![pending(ReportKind::Complaint, "Ivy")]);

    fixture
        .console
        .confirm(ReportKind::Complaint, &name("Ivy"), DispatchCode::Yellow, now())
        .await
        .expect("found after refresh");
}

#[tokio::test]
async fn backend_rejection_is_returned_to_the_caller() {
    let fixture = admin(RecordingBackend::failing());
    fixture.console.refresh().await;

    let error = fixture
        .console
        .confirm(ReportKind::Complaint, &name("Ben"), DispatchCode::Red, now())
        .await
        .unwrap_err();
    assert_eq!(error.code, ErrorCode::Upstream);
}

#[tokio::test]
async fn resolved_listing_applies_the_filter() {
    let fixture = admin(RecordingBackend::default());
    fixture.resolved.set(vec![
        resolved(ReportKind::Complaint, "Gina Santos"),
        resolved(ReportKind::Emergency, "Jose Rizal"),
    ]);
    fixture.console.refresh().await;

    let all = fixture.console.resolved(&ResolvedFilter::default(), now());
    assert_eq!(all.len(), 2);
    let found = fixture.console.resolved(
        &ResolvedFilter::new("RIZAL", dispatch_core::TimeWindow::Day),
        now(),
    );
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].name, name("Jose Rizal"));
}

#[tokio::test]
async fn pending_page_reads_from_the_backend() {
    let fixture = admin(RecordingBackend::default());
    let page = fixture
        .console
        .pending_page(ReportKind::Emergency, Page::new(2, 3))
        .await
        .expect("page");
    assert_eq!(page.len(), 3);
    assert_eq!(page[0].name, name("page-2-0"));
    assert_eq!(fixture.emergencies.calls(), 0);
}

struct ResponderFixture {
    console: ResponderConsole,
    backend: Arc<RecordingBackend>,
    confirmed: Arc<ListSource<Report>>,
    notifications: Arc<ListSource<Notification>>,
}

fn responder(backend: RecordingBackend, planner: Option<Arc<dyn RoutePlanner>>) -> ResponderFixture {
    let backend = Arc::new(backend);
    let confirmed_reports = ListSource::new(vec![
        confirmed(ReportKind::Emergency, "Ella"),
        confirmed(ReportKind::Complaint, "Dino"),
    ]);
    let notifications = ListSource::new(vec![note("n-1"), note("n-2")]);
    let sources = ResponderSources {
        confirmed: confirmed_reports.clone(),
        notifications: notifications.clone(),
    };
    let identity = Responder {
        team_id: TeamId::new("team-7"),
        user_id: UserId::new("user-7"),
        resolver_name: "Pedro Penduko".to_string(),
    };
    ResponderFixture {
        console: ResponderConsole::new(identity, backend.clone(), planner, sources),
        backend,
        confirmed: confirmed_reports,
        notifications,
    }
}

#[tokio::test]
async fn resolved_report_stays_hidden_until_the_backend_drops_it() {
    let fixture = responder(RecordingBackend::default(), None);
    fixture.console.refresh().await;

    fixture
        .console
        .resolve(&name("Ella"), now())
        .await
        .expect("resolve");
    assert_eq!(
        *fixture.backend.resolved.lock().unwrap(),
        vec![(name("Ella"), "Pedro Penduko".to_string())]
    );
    // the source still lists it
    let visible: Vec<_> = fixture.console.confirmed().into_iter().map(|r| r.name).collect();
    assert_eq!(visible, vec![name("Dino")]);

    fixture
        .confirmed
        .set(vec![confirmed(ReportKind::Complaint, "Dino")]);
    fixture.console.refresh().await;
    fixture.confirmed.set(vec![
        confirmed(ReportKind::Complaint, "Dino"),
        confirmed(ReportKind::Emergency, "Ella"),
    ]);
    fixture.console.refresh().await;
    assert_eq!(fixture.console.confirmed().len(), 2);
}

#[tokio::test]
async fn resolving_an_unlisted_report_is_not_found() {
    let fixture = responder(RecordingBackend::default(), None);
    fixture.console.refresh().await;

    let error = fixture
        .console
        .resolve(&name("Ana"), now())
        .await
        .unwrap_err();
    assert_eq!(error.code, ErrorCode::NotFound);
    assert!(fixture.backend.resolved.lock().unwrap().is_empty());
}

#[tokio::test]
async fn cleared_notifications_are_not_counted_again() {
    let fixture = responder(RecordingBackend::default(), None);
    fixture.console.refresh().await;
    let summary = fixture.console.summary();
    assert_eq!(summary.new_notifications, 2);
    assert_eq!(summary.notifications.len(), 2);

    fixture.console.clear_notifications();
    let summary = fixture.console.summary();
    assert_eq!(summary.new_notifications, 0);
    assert!(summary.notifications.is_empty());

    fixture.console.refresh().await;
    let summary = fixture.console.summary();
    assert_eq!(summary.new_notifications, 0);
    assert!(summary.notifications.is_empty());

    fixture
        .notifications
        .set(vec![note("n-1"), note("n-2"), note("n-3")]);
    fixture.console.refresh().await;
    let summary = fixture.console.summary();
    assert_eq!(summary.new_notifications, 1);
    assert_eq!(summary.notifications, vec![note("n-3")]);
}

#[tokio::test]
async fn directions_need_a_known_position() {
    let planner: Arc<dyn RoutePlanner> = Arc::new(StraightLine);
    let fixture = responder(RecordingBackend::default(), Some(planner));
    fixture.console.refresh().await;

    let error = fixture.console.directions(&name("Ella")).await.unwrap_err();
    assert_eq!(error.code, ErrorCode::InvalidInput);

    let here = Coordinate::new(14.63, 121.09);
    fixture.console.report_position(here).await.expect("post");
    assert_eq!(
        *fixture.backend.positions.lock().unwrap(),
        vec![(TeamId::new("team-7"), here)]
    );

    let route = fixture.console.directions(&name("Ella")).await.expect("route");
    assert_eq!(route.label, "2.34 km, 10 mins");
    assert_eq!(route.path.first(), Some(&here));
    assert_eq!(fixture.console.summary().route, Some(route));

    fixture
        .console
        .resolve(&name("Ella"), now())
        .await
        .expect("resolve");
    assert_eq!(fixture.console.summary().route, None);
}

#[tokio::test]
async fn directions_without_a_planner_are_rejected() {
    let fixture = responder(RecordingBackend::default(), None);
    fixture.console.refresh().await;
    fixture
        .console
        .report_position(Coordinate::new(14.63, 121.09))
        .await
        .expect("post");

    let error = fixture.console.directions(&name("Ella")).await.unwrap_err();
    assert_eq!(error.code, ErrorCode::InvalidInput);
}

#[tokio::test]
async fn position_updates_are_validated_and_failures_surfaced() {
    let fixture = responder(RecordingBackend::failing(), None);

    let error = fixture
        .console
        .report_position(Coordinate::new(95.0, 0.0))
        .await
        .unwrap_err();
    assert_eq!(error.code, ErrorCode::InvalidInput);
    assert!(fixture.backend.positions.lock().unwrap().is_empty());

    let error = fixture
        .console
        .report_position(Coordinate::new(14.63, 121.09))
        .await
        .unwrap_err();
    assert_eq!(error.code, ErrorCode::Upstream);
    let summary = fixture.console.summary();
    assert!(summary.position.is_some());
    let error = summary.last_error.expect("error surfaced");
    assert_eq!(error.to_string(), "location update: backend unavailable");
}

#[tokio::test]
async fn location_error_clears_after_the_next_successful_update() {
    let fixture = responder(RecordingBackend::failing(), None);
    let position = Coordinate::new(14.63, 121.09);

    fixture.console.report_position(position).await.unwrap_err();
    assert!(fixture.console.summary().last_error.is_some());

    fixture.backend.failing.store(false, Ordering::SeqCst);
    fixture.console.report_position(position).await.unwrap();
    assert!(fixture.console.summary().last_error.is_none());
    assert_eq!(fixture.backend.positions.lock().unwrap().len(), 2);
}

#[tokio::test]
async fn location_success_keeps_collection_errors() {
    let fixture = responder(RecordingBackend::default(), None);
    fixture.notifications.fail("notifications offline");
    fixture.console.refresh().await;
    assert!(fixture.console.summary().last_error.is_some());

    fixture
        .console
        .report_position(Coordinate::new(14.63, 121.09))
        .await
        .unwrap();
    let error = fixture.console.summary().last_error.expect("still surfaced");
    assert_eq!(error.source, "notifications");
}
