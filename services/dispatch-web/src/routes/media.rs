use actix_web::http::header::CONTENT_TYPE;
use actix_web::web::Bytes;
use actix_web::{get, post, web, HttpRequest, HttpResponse};
use chrono::Utc;
use dispatch_client::MediaFile;
use dispatch_core::DispatchError;
use serde::{Deserialize, Serialize};

use crate::error::WebError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub file_name: String,
    /// Lets the page poll `/ui/media/progress/{upload_id}` while the upload runs.
    #[serde(default)]
    pub upload_id: Option<String>,
}

#[derive(Debug, Serialize)]
struct Uploaded {
    url: String,
}

#[derive(Debug, Serialize)]
struct Progress {
    progress: f64,
}

#[post("/ui/media")]
pub async fn upload(
    req: HttpRequest,
    state: web::Data<AppState>,
    query: web::Query<UploadQuery>,
    body: Bytes,
) -> Result<HttpResponse, WebError> {
    let store = state.media()?;
    let UploadQuery {
        file_name,
        upload_id,
    } = query.into_inner();
    let content_type = req
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let file = MediaFile {
        file_name,
        content_type,
        bytes: body.to_vec(),
    };
    // object names carry the local calendar date
    let today = Utc::now().with_timezone(&state.admin.offset()).date_naive();
    let upload_progress = upload_id.as_deref().map(|id| state.uploads.begin(id));
    let result = store.upload(file, today, upload_progress).await;
    if let Some(id) = &upload_id {
        state.uploads.finish(id);
    }
    let url = result?;
    Ok(HttpResponse::Created().json(Uploaded { url }))
}

#[get("/ui/media/progress/{upload_id}")]
pub async fn progress(
    state: web::Data<AppState>,
    upload_id: web::Path<String>,
) -> Result<HttpResponse, WebError> {
    let progress = state.uploads.fraction(&upload_id).ok_or_else(|| {
        DispatchError::not_found(format!("no upload '{upload_id}' in progress"))
    })?;
    Ok(HttpResponse::Ok().json(Progress { progress }))
}
