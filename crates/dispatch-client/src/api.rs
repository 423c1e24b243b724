use dispatch_core::{
    Coordinate, DispatchCode, DispatchError, ErrorCode, NewReport, Notification, Report,
    ReportKind, ReportName, ReportStage, TeamId, TeamLocation, Timestamp, UserId,
};
use dispatch_reconciler::{FetchError, FetchErrorKind, FetchOutcome};
use reqwest::header::{CACHE_CONTROL, HeaderValue, PRAGMA};
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::warn;

use crate::wire::{
    Ack, ConfirmBody, ConfirmedEnvelope, LocationBody, LocationsEnvelope, NotificationRecord,
    NotificationsEnvelope, ReportRecord, ResolveBody, ResolvedEnvelope, SubmitBody,
    TeamLocationRecord,
};

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid backend url: {0}")]
    Url(String),
    #[error("backend transport error: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("{operation} request failed with {status}")]
    Status {
        operation: &'static str,
        status: StatusCode,
    },
    #[error("{operation} was rejected by the backend: {message}")]
    Rejected {
        operation: &'static str,
        message: String,
    },
    #[error("malformed {operation} response: {message}")]
    Malformed {
        operation: &'static str,
        message: String,
    },
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status, .. } if *status == StatusCode::NOT_FOUND)
    }
}

impl From<ApiError> for FetchError {
    fn from(error: ApiError) -> Self {
        let message = error.to_string();
        match error {
            ApiError::Url(_) | ApiError::Transport(_) => FetchError::transport(message),
            ApiError::Status { .. } => FetchError::status(message),
            ApiError::Malformed { .. } => FetchError::malformed(message),
            ApiError::Rejected { .. } => FetchError::new(FetchErrorKind::Other, message),
        }
    }
}

impl From<ApiError> for DispatchError {
    fn from(error: ApiError) -> Self {
        let code = if error.is_not_found() {
            ErrorCode::NotFound
        } else {
            ErrorCode::Upstream
        };
        DispatchError::new(code, error.to_string())
    }
}

/// Zero-based page of a pending listing. The backend counts pages from one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub index: usize,
    pub size: usize,
}

impl Page {
    pub fn new(index: usize, size: usize) -> Self {
        Self {
            index,
            size: size.max(1),
        }
    }

    fn query(&self) -> [(&'static str, String); 2] {
        [
            ("page", (self.index + 1).to_string()),
            ("pageSize", self.size.to_string()),
        ]
    }
}

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> Result<Self, ApiError> {
        let base = format!("{}/", base_url.trim().trim_end_matches('/'));
        let base_url = Url::parse(&base).map_err(|err| ApiError::Url(err.to_string()))?;
        Ok(Self { client, base_url })
    }

    pub async fn submit_report(&self, report: &NewReport) -> Result<(), ApiError> {
        let path = match report.kind {
            ReportKind::Complaint => "submitComplaint",
            ReportKind::Emergency => "submitEmergency",
        };
        let url = self.endpoint(&[path])?;
        let response = self
            .client
            .post(url)
            .json(&SubmitBody::new(report))
            .send()
            .await
            .map_err(ApiError::Transport)?;
        acknowledge("submit", response).await
    }

    pub async fn list_pending(
        &self,
        kind: ReportKind,
        page: Option<Page>,
    ) -> Result<Vec<Report>, ApiError> {
        let url = self.endpoint(&[kind.collection()])?;
        let mut request = self.client.get(url);
        if let Some(page) = page {
            request = request.query(&page.query());
        }
        let response = request.send().await.map_err(ApiError::Transport)?;
        let records: Vec<ReportRecord> = read_json(kind.collection(), response).await?;
        Ok(convert_reports(records, ReportStage::Pending, |_| kind))
    }

    pub async fn confirm_report(
        &self,
        kind: ReportKind,
        name: &ReportName,
        code: DispatchCode,
    ) -> Result<(), ApiError> {
        let url = self.endpoint(&[kind.collection(), "confirm", name.as_str()])?;
        let response = self
            .client
            .post(url)
            .json(&ConfirmBody {
                emergency_code: code.label(),
            })
            .send()
            .await
            .map_err(ApiError::Transport)?;
        acknowledge("confirm", response).await
    }

    pub async fn delete_report(&self, kind: ReportKind, name: &ReportName) -> Result<(), ApiError> {
        let url = self.endpoint(&[kind.collection(), name.as_str()])?;
        let response = self
            .client
            .delete(url)
            .send()
            .await
            .map_err(ApiError::Transport)?;
        acknowledge("delete", response).await
    }

    /// Confirmed complaints followed by confirmed emergencies.
    pub async fn list_confirmed(&self) -> Result<Vec<Report>, ApiError> {
        let url = self.endpoint(&["api", "confirmedReports"])?;
        let response = self.client.get(url).send().await.map_err(ApiError::Transport)?;
        let envelope: ConfirmedEnvelope = read_json("confirmedReports", response).await?;
        let mut reports = convert_reports(envelope.complaints, ReportStage::Confirmed, |_| {
            ReportKind::Complaint
        });
        reports.extend(convert_reports(
            envelope.emergencies,
            ReportStage::Confirmed,
            |_| ReportKind::Emergency,
        ));
        Ok(reports)
    }

    pub async fn list_resolved(&self) -> Result<Vec<Report>, ApiError> {
        let url = self.endpoint(&["api", "resolvedReports"])?;
        let response = self.client.get(url).send().await.map_err(ApiError::Transport)?;
        let envelope: ResolvedEnvelope = read_json("resolvedReports", response).await?;
        Ok(convert_reports(
            envelope.resolved_reports,
            ReportStage::Resolved,
            |record| record.inferred_kind().unwrap_or(ReportKind::Complaint),
        ))
    }

    pub async fn resolve_report(
        &self,
        name: &ReportName,
        resolver: &str,
        at: Timestamp,
    ) -> Result<(), ApiError> {
        let url = self.endpoint(&["api", "resolveReport"])?;
        let response = self
            .client
            .post(url)
            .json(&ResolveBody {
                name: name.as_str(),
                resolver_name: resolver,
                resolved_at: at.to_rfc3339(),
            })
            .send()
            .await
            .map_err(ApiError::Transport)?;
        acknowledge("resolve", response).await
    }

    pub async fn post_location(&self, team: &TeamId, coordinate: Coordinate) -> Result<(), ApiError> {
        let url = self.endpoint(&["api", "updateLocation"])?;
        let response = self
            .client
            .post(url)
            .json(&LocationBody {
                latitude: coordinate.latitude,
                longitude: coordinate.longitude,
                team_id: team.as_str(),
            })
            .send()
            .await
            .map_err(ApiError::Transport)?;
        acknowledge("updateLocation", response).await
    }

    pub async fn list_team_locations(&self) -> Result<Vec<TeamLocation>, ApiError> {
        let url = self.endpoint(&["api", "responseTeamLocations"])?;
        let response = self.client.get(url).send().await.map_err(ApiError::Transport)?;
        let envelope: LocationsEnvelope = read_json("responseTeamLocations", response).await?;
        if !envelope.success {
            return Err(ApiError::Rejected {
                operation: "responseTeamLocations",
                message: "success flag not set".to_string(),
            });
        }
        Ok(envelope
            .locations
            .into_iter()
            .filter_map(TeamLocationRecord::into_location)
            .collect())
    }

    /// Pending notifications for `user`; a `304` maps to [`FetchOutcome::NotModified`].
    pub async fn list_notifications(
        &self,
        user: &UserId,
    ) -> Result<FetchOutcome<Notification>, ApiError> {
        let url = self.endpoint(&["api", "notifications", user.as_str()])?;
        let response = self
            .client
            .get(url)
            .header(CACHE_CONTROL, HeaderValue::from_static("no-cache"))
            .header(PRAGMA, HeaderValue::from_static("no-cache"))
            .send()
            .await
            .map_err(ApiError::Transport)?;
        if response.status() == StatusCode::NOT_MODIFIED {
            return Ok(FetchOutcome::NotModified);
        }
        let envelope: NotificationsEnvelope = read_json("notifications", response).await?;
        Ok(FetchOutcome::Fresh(
            envelope
                .notifications
                .into_iter()
                .filter_map(NotificationRecord::into_notification)
                .collect(),
        ))
    }

    /// Joins percent-encoded path segments onto the base url.
    pub(crate) fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Url(format!("{} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

async fn read_json<T: DeserializeOwned>(
    operation: &'static str,
    response: Response,
) -> Result<T, ApiError> {
    let status = response.status();
    if !status.is_success() {
        return Err(ApiError::Status { operation, status });
    }
    let body = response.bytes().await.map_err(ApiError::Transport)?;
    serde_json::from_slice(&body).map_err(|err| ApiError::Malformed {
        operation,
        message: err.to_string(),
    })
}

/// Checks a mutation response. Bodies that are not JSON are accepted on 2xx;
/// an explicit `"success": false` is a rejection.
async fn acknowledge(operation: &'static str, response: Response) -> Result<(), ApiError> {
    let status = response.status();
    if !status.is_success() {
        return Err(ApiError::Status { operation, status });
    }
    let body = response.bytes().await.map_err(ApiError::Transport)?;
    let ack: Ack = serde_json::from_slice(&body).unwrap_or_default();
    match ack.success {
        Some(false) => Err(ApiError::Rejected {
            operation,
            message: ack.message.unwrap_or_else(|| "success flag not set".to_string()),
        }),
        _ => Ok(()),
    }
}

/// Converts records, skipping the ones that cannot form a valid report.
fn convert_reports(
    records: Vec<ReportRecord>,
    stage: ReportStage,
    kind_of: impl Fn(&ReportRecord) -> ReportKind,
) -> Vec<Report> {
    records
        .into_iter()
        .filter_map(|record| {
            let kind = kind_of(&record);
            match record.into_report(kind, stage) {
                Ok(report) => Some(report),
                Err(message) => {
                    warn!(%stage, %kind, error = %message, "skipping report record");
                    None
                }
            }
        })
        .collect()
}
