use actix_web::{post, web, HttpResponse};
use dispatch_core::{Coordinate, DispatchError, NewReport, ReportName, UserId};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::WebError;
use crate::routes::parse_kind;
use crate::state::AppState;

/// Complainant form as posted by the submission page.
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub name: String,
    pub address: String,
    pub category: String,
    #[serde(default)]
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
    pub media_url: String,
    pub user_id: String,
}

#[derive(Debug, Serialize)]
struct Submitted {
    status: &'static str,
}

#[post("/ui/reports/{kind}")]
pub async fn submit(
    state: web::Data<AppState>,
    kind: web::Path<String>,
    payload: web::Json<SubmitRequest>,
) -> Result<HttpResponse, WebError> {
    let kind = parse_kind(&kind)?;
    let request = payload.into_inner();
    let report = NewReport {
        kind,
        name: ReportName::new(request.name),
        address: request.address,
        category: request.category,
        description: request.description,
        location: Coordinate::new(request.latitude, request.longitude),
        media_url: request.media_url,
        submitter: UserId::new(request.user_id),
    };
    report.validate()?;
    state
        .api
        .submit_report(&report)
        .await
        .map_err(DispatchError::from)?;
    info!(%kind, name = %report.name, "report submitted");
    Ok(HttpResponse::Created().json(Submitted {
        status: "submitted",
    }))
}
