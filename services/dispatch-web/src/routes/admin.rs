use actix_web::rt::time::interval;
use actix_web::web::Bytes;
use actix_web::{delete, get, post, web, HttpResponse};
use chrono::Utc;
use dispatch_client::Page;
use dispatch_core::{DispatchCode, ReportName, TimeWindow};
use dispatch_dashboard::ResolvedFilter;
use futures_util::stream::unfold;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::WebError;
use crate::routes::parse_kind;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub code: String,
}

#[derive(Debug, Deserialize)]
pub struct ResolvedQuery {
    pub q: Option<String>,
    pub window: Option<String>,
}

#[get("/ui/admin/summary")]
pub async fn summary(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.admin.summary())
}

#[get("/ui/admin/stream/sse")]
pub async fn stream(state: web::Data<AppState>) -> HttpResponse {
    let ticker = interval(state.backend.admin_poll_interval());
    let stream = unfold((ticker, state), |(mut ticker, state)| async move {
        ticker.tick().await;
        let bytes = build_sse_event("summary", &state.admin.summary());
        Some((Ok::<Bytes, actix_web::Error>(bytes), (ticker, state)))
    });

    HttpResponse::Ok()
        .insert_header(("Content-Type", "text/event-stream"))
        .insert_header(("Cache-Control", "no-cache"))
        .insert_header(("Connection", "keep-alive"))
        .streaming(stream)
}

#[get("/ui/admin/reports/{kind}")]
pub async fn pending_page(
    state: web::Data<AppState>,
    kind: web::Path<String>,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, WebError> {
    let kind = parse_kind(&kind)?;
    let page = Page::new(
        query.page.unwrap_or(0),
        query.page_size.unwrap_or(state.backend.page_size),
    );
    let reports = state.admin.pending_page(kind, page).await?;
    Ok(HttpResponse::Ok().json(reports))
}

#[post("/ui/admin/reports/{kind}/{name}/confirm")]
pub async fn confirm(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
    payload: web::Json<ConfirmRequest>,
) -> Result<HttpResponse, WebError> {
    let (kind, name) = path.into_inner();
    let kind = parse_kind(&kind)?;
    let code: DispatchCode = payload
        .code
        .parse()
        .map_err(|_| WebError::bad_request(format!("unknown dispatch code '{}'", payload.code)))?;
    state
        .admin
        .confirm(kind, &ReportName::new(name), code, Utc::now())
        .await?;
    Ok(HttpResponse::NoContent().finish())
}

#[delete("/ui/admin/reports/{kind}/{name}")]
pub async fn delete(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
) -> Result<HttpResponse, WebError> {
    let (kind, name) = path.into_inner();
    let kind = parse_kind(&kind)?;
    state.admin.delete(kind, &ReportName::new(name)).await?;
    Ok(HttpResponse::NoContent().finish())
}

#[get("/ui/admin/confirmed")]
pub async fn confirmed(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.admin.confirmed())
}

#[get("/ui/admin/teams")]
pub async fn teams(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.admin.team_locations())
}

#[get("/ui/admin/resolved")]
pub async fn resolved(
    state: web::Data<AppState>,
    query: web::Query<ResolvedQuery>,
) -> Result<HttpResponse, WebError> {
    let query = query.into_inner();
    let window = match query.window.as_deref() {
        Some(value) => value.parse::<TimeWindow>().map_err(|()| {
            WebError::bad_request(format!(
                "unknown window '{value}'; expected all, day, month or year"
            ))
        })?,
        None => TimeWindow::default(),
    };
    let filter = ResolvedFilter::new(query.q.unwrap_or_default(), window);
    Ok(HttpResponse::Ok().json(state.admin.resolved(&filter, Utc::now())))
}

fn build_sse_event<T: Serialize>(name: &str, payload: &T) -> Bytes {
    let data = match serde_json::to_string(payload) {
        Ok(data) => data,
        Err(err) => {
            warn!(event = name, error = %err, "failed to encode sse payload");
            "{}".to_string()
        }
    };
    Bytes::from(format!("event: {name}\ndata: {data}\n\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Counts {
        new_complaints: usize,
    }

    #[test]
    fn sse_event_is_a_named_json_frame() {
        let bytes = build_sse_event("summary", &Counts { new_complaints: 3 });
        assert_eq!(
            bytes,
            Bytes::from_static(b"event: summary\ndata: {\"new_complaints\":3}\n\n")
        );
    }
}
