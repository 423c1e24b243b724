use actix_web::{get, web, HttpResponse};
use dispatch_core::{Coordinate, DispatchError};
use serde::{Deserialize, Serialize};

use crate::error::WebError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AutocompleteQuery {
    #[serde(default)]
    pub q: String,
}

#[derive(Debug, Deserialize)]
pub struct ReverseQuery {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Serialize)]
struct ReverseResponse {
    display_name: Option<String>,
}

#[get("/ui/geocode/autocomplete")]
pub async fn autocomplete(
    state: web::Data<AppState>,
    query: web::Query<AutocompleteQuery>,
) -> Result<HttpResponse, WebError> {
    let candidates = state
        .geocoder()?
        .autocomplete(&query.q)
        .await
        .map_err(DispatchError::from)?;
    Ok(HttpResponse::Ok().json(candidates))
}

#[get("/ui/geocode/reverse")]
pub async fn reverse(
    state: web::Data<AppState>,
    query: web::Query<ReverseQuery>,
) -> Result<HttpResponse, WebError> {
    let coordinate = Coordinate::new(query.lat, query.lon);
    if !coordinate.is_valid() {
        return Err(WebError::bad_request("coordinate is out of range"));
    }
    let display_name = state
        .geocoder()?
        .reverse(coordinate)
        .await
        .map_err(DispatchError::from)?;
    Ok(HttpResponse::Ok().json(ReverseResponse { display_name }))
}
