use async_trait::async_trait;
use dispatch_client::{ApiClient, LocationIqClient, Page};
use dispatch_core::{
    Coordinate, DispatchCode, DispatchResult, Report, ReportKind, ReportName, TeamId, Timestamp,
};
use dispatch_geo::Route;

/// Backend mutations and paged reads issued by the admin console.
#[async_trait]
pub trait AdminBackend: Send + Sync {
    async fn pending_page(&self, kind: ReportKind, page: Page) -> DispatchResult<Vec<Report>>;

    async fn confirm_report(
        &self,
        kind: ReportKind,
        name: &ReportName,
        code: DispatchCode,
    ) -> DispatchResult<()>;

    async fn delete_report(&self, kind: ReportKind, name: &ReportName) -> DispatchResult<()>;
}

/// Backend mutations issued by the response-team console.
#[async_trait]
pub trait ResponderBackend: Send + Sync {
    async fn resolve_report(
        &self,
        name: &ReportName,
        resolver: &str,
        at: Timestamp,
    ) -> DispatchResult<()>;

    async fn post_location(&self, team: &TeamId, coordinate: Coordinate) -> DispatchResult<()>;
}

#[async_trait]
pub trait RoutePlanner: Send + Sync {
    async fn route(&self, from: Coordinate, to: Coordinate) -> DispatchResult<Option<Route>>;
}

#[async_trait]
impl AdminBackend for ApiClient {
    async fn pending_page(&self, kind: ReportKind, page: Page) -> DispatchResult<Vec<Report>> {
        Ok(self.list_pending(kind, Some(page)).await?)
    }

    async fn confirm_report(
        &self,
        kind: ReportKind,
        name: &ReportName,
        code: DispatchCode,
    ) -> DispatchResult<()> {
        Ok(ApiClient::confirm_report(self, kind, name, code).await?)
    }

    async fn delete_report(&self, kind: ReportKind, name: &ReportName) -> DispatchResult<()> {
        Ok(ApiClient::delete_report(self, kind, name).await?)
    }
}

#[async_trait]
impl ResponderBackend for ApiClient {
    async fn resolve_report(
        &self,
        name: &ReportName,
        resolver: &str,
        at: Timestamp,
    ) -> DispatchResult<()> {
        Ok(ApiClient::resolve_report(self, name, resolver, at).await?)
    }

    async fn post_location(&self, team: &TeamId, coordinate: Coordinate) -> DispatchResult<()> {
        Ok(ApiClient::post_location(self, team, coordinate).await?)
    }
}

#[async_trait]
impl RoutePlanner for LocationIqClient {
    async fn route(&self, from: Coordinate, to: Coordinate) -> DispatchResult<Option<Route>> {
        Ok(self.directions(from, to).await?)
    }
}
