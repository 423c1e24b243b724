//! LocationIQ autocomplete, reverse geocoding and driving directions.

use dispatch_core::{DispatchError, ErrorCode};
use dispatch_geo::{Coordinate, POLYLINE_PRECISION, PolylineError, Route, decode_polyline};
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::wire::lenient_f64;

/// Queries shorter than this (after trimming) are not sent.
pub const MIN_QUERY_CHARS: usize = 4;

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("invalid geocoder url: {0}")]
    Url(String),
    #[error("geocoder transport error: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("{operation} request failed with {status}")]
    Status {
        operation: &'static str,
        status: StatusCode,
    },
    #[error("malformed {operation} response: {message}")]
    Malformed {
        operation: &'static str,
        message: String,
    },
    #[error("route geometry could not be decoded: {0}")]
    Geometry(#[from] PolylineError),
}

impl From<GeocodeError> for DispatchError {
    fn from(error: GeocodeError) -> Self {
        DispatchError::new(ErrorCode::Upstream, error.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AddressCandidate {
    pub display_name: String,
    pub coordinate: Coordinate,
}

#[derive(Debug, Deserialize)]
struct PlaceRecord {
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    lat: Option<f64>,
    #[serde(default, deserialize_with = "lenient_f64")]
    lon: Option<f64>,
}

impl PlaceRecord {
    fn into_candidate(self) -> Option<AddressCandidate> {
        let display_name = self.display_name.filter(|name| !name.trim().is_empty())?;
        let coordinate = Coordinate::new(self.lat?, self.lon?);
        coordinate.is_valid().then_some(AddressCandidate {
            display_name,
            coordinate,
        })
    }
}

#[derive(Debug, Deserialize)]
struct DirectionsResponse {
    #[serde(default, deserialize_with = "null_as_empty")]
    routes: Vec<RouteRecord>,
}

#[derive(Debug, Deserialize)]
struct RouteRecord {
    geometry: String,
    #[serde(default)]
    distance: f64,
    #[serde(default)]
    duration: f64,
}

pub fn is_searchable(text: &str) -> bool {
    text.trim().chars().count() >= MIN_QUERY_CHARS
}

#[derive(Clone)]
pub struct LocationIqClient {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl LocationIqClient {
    pub fn new(base_url: &str, api_key: impl Into<String>) -> Result<Self, GeocodeError> {
        Self::with_client(Client::new(), base_url, api_key)
    }

    pub fn with_client(
        client: Client,
        base_url: &str,
        api_key: impl Into<String>,
    ) -> Result<Self, GeocodeError> {
        let base = format!("{}/", base_url.trim().trim_end_matches('/'));
        let base_url = Url::parse(&base).map_err(|err| GeocodeError::Url(err.to_string()))?;
        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
        })
    }

    /// Address candidates for free text. Short input yields no candidates
    /// without a request.
    pub async fn autocomplete(&self, text: &str) -> Result<Vec<AddressCandidate>, GeocodeError> {
        if !is_searchable(text) {
            return Ok(Vec::new());
        }
        let url = self.autocomplete_url(text)?;
        let places: Option<Vec<PlaceRecord>> = self.get_json("autocomplete", url).await?;
        Ok(places
            .unwrap_or_default()
            .into_iter()
            .filter_map(PlaceRecord::into_candidate)
            .collect())
    }

    pub async fn reverse(&self, coordinate: Coordinate) -> Result<Option<String>, GeocodeError> {
        let url = self.reverse_url(coordinate)?;
        let place: Option<PlaceRecord> = self.get_json("reverse", url).await?;
        Ok(place
            .and_then(|place| place.display_name)
            .filter(|name| !name.trim().is_empty()))
    }

    /// Driving route between two points, or `None` when no route exists.
    pub async fn directions(
        &self,
        from: Coordinate,
        to: Coordinate,
    ) -> Result<Option<Route>, GeocodeError> {
        let url = self.directions_url(from, to)?;
        let response: Option<DirectionsResponse> = self.get_json("directions", url).await?;
        let Some(route) = response.and_then(|response| response.routes.into_iter().next()) else {
            return Ok(None);
        };
        let path = decode_polyline(&route.geometry, POLYLINE_PRECISION)?;
        Ok(Some(Route {
            path,
            distance_m: route.distance,
            duration_s: route.duration,
        }))
    }

    fn autocomplete_url(&self, text: &str) -> Result<Url, GeocodeError> {
        let mut url = self.join("v1/autocomplete.php")?;
        url.query_pairs_mut()
            .append_pair("key", &self.api_key)
            .append_pair("q", text.trim())
            .append_pair("format", "json");
        Ok(url)
    }

    fn reverse_url(&self, coordinate: Coordinate) -> Result<Url, GeocodeError> {
        let mut url = self.join("v1/reverse.php")?;
        url.query_pairs_mut()
            .append_pair("key", &self.api_key)
            .append_pair("lat", &coordinate.latitude.to_string())
            .append_pair("lon", &coordinate.longitude.to_string())
            .append_pair("format", "json");
        Ok(url)
    }

    fn directions_url(&self, from: Coordinate, to: Coordinate) -> Result<Url, GeocodeError> {
        // coordinates are lng,lat pairs joined by ';'
        let path = format!(
            "v1/directions/driving/{},{};{},{}",
            from.longitude, from.latitude, to.longitude, to.latitude
        );
        let mut url = self.join(&path)?;
        url.query_pairs_mut()
            .append_pair("key", &self.api_key)
            .append_pair("steps", "true")
            .append_pair("geometries", "polyline")
            .append_pair("overview", "full");
        Ok(url)
    }

    fn join(&self, path: &str) -> Result<Url, GeocodeError> {
        self.base_url
            .join(path)
            .map_err(|err| GeocodeError::Url(err.to_string()))
    }

    /// LocationIQ answers "nothing found" with a 404; that maps to `None`.
    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        url: Url,
    ) -> Result<Option<T>, GeocodeError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(GeocodeError::Transport)?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(GeocodeError::Status { operation, status });
        }
        let body = response.bytes().await.map_err(GeocodeError::Transport)?;
        serde_json::from_slice(&body)
            .map(Some)
            .map_err(|err| GeocodeError::Malformed {
                operation,
                message: err.to_string(),
            })
    }
}

fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}
