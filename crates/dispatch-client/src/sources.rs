//! Backend collections exposed as reconciler sources.

use async_trait::async_trait;
use dispatch_core::{Notification, Report, ReportKind, TeamLocation, UserId};
use dispatch_reconciler::{CollectionSource, FetchError, FetchOutcome};

use crate::api::ApiClient;

/// Unpaged listing of pending complaints or emergencies.
pub struct PendingReportsSource {
    api: ApiClient,
    kind: ReportKind,
}

impl PendingReportsSource {
    pub fn new(api: ApiClient, kind: ReportKind) -> Self {
        Self { api, kind }
    }
}

#[async_trait]
impl CollectionSource for PendingReportsSource {
    type Item = Report;

    async fn fetch(&self) -> Result<FetchOutcome<Report>, FetchError> {
        let reports = self.api.list_pending(self.kind, None).await?;
        Ok(FetchOutcome::Fresh(reports))
    }
}

pub struct ConfirmedReportsSource {
    api: ApiClient,
}

impl ConfirmedReportsSource {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl CollectionSource for ConfirmedReportsSource {
    type Item = Report;

    async fn fetch(&self) -> Result<FetchOutcome<Report>, FetchError> {
        Ok(FetchOutcome::Fresh(self.api.list_confirmed().await?))
    }
}

pub struct ResolvedReportsSource {
    api: ApiClient,
}

impl ResolvedReportsSource {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl CollectionSource for ResolvedReportsSource {
    type Item = Report;

    async fn fetch(&self) -> Result<FetchOutcome<Report>, FetchError> {
        Ok(FetchOutcome::Fresh(self.api.list_resolved().await?))
    }
}

pub struct TeamLocationsSource {
    api: ApiClient,
}

impl TeamLocationsSource {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait]
impl CollectionSource for TeamLocationsSource {
    type Item = TeamLocation;

    async fn fetch(&self) -> Result<FetchOutcome<TeamLocation>, FetchError> {
        Ok(FetchOutcome::Fresh(self.api.list_team_locations().await?))
    }
}

pub struct NotificationsSource {
    api: ApiClient,
    user: UserId,
}

impl NotificationsSource {
    pub fn new(api: ApiClient, user: UserId) -> Self {
        Self { api, user }
    }
}

#[async_trait]
impl CollectionSource for NotificationsSource {
    type Item = Notification;

    async fn fetch(&self) -> Result<FetchOutcome<Notification>, FetchError> {
        Ok(self.api.list_notifications(&self.user).await?)
    }
}
