use actix_web::{get, post, web, HttpResponse};
use chrono::Utc;
use dispatch_core::{Coordinate, ReportName};

use crate::error::WebError;
use crate::state::AppState;

#[get("/ui/team/summary")]
pub async fn summary(state: web::Data<AppState>) -> Result<HttpResponse, WebError> {
    Ok(HttpResponse::Ok().json(state.team()?.summary()))
}

#[post("/ui/team/location")]
pub async fn location(
    state: web::Data<AppState>,
    payload: web::Json<Coordinate>,
) -> Result<HttpResponse, WebError> {
    state.team()?.report_position(payload.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[post("/ui/team/reports/{name}/resolve")]
pub async fn resolve(
    state: web::Data<AppState>,
    name: web::Path<String>,
) -> Result<HttpResponse, WebError> {
    let name = ReportName::new(name.into_inner());
    state.team()?.resolve(&name, Utc::now()).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[get("/ui/team/reports/{name}/directions")]
pub async fn directions(
    state: web::Data<AppState>,
    name: web::Path<String>,
) -> Result<HttpResponse, WebError> {
    let name = ReportName::new(name.into_inner());
    let route = state.team()?.directions(&name).await?;
    Ok(HttpResponse::Ok().json(route))
}

#[post("/ui/team/notifications/clear")]
pub async fn clear_notifications(state: web::Data<AppState>) -> Result<HttpResponse, WebError> {
    state.team()?.clear_notifications();
    Ok(HttpResponse::NoContent().finish())
}
