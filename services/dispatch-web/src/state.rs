use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use dispatch_client::{ApiClient, LocationIqClient, MediaStore, UploadProgress};
use dispatch_config::{BackendConfig, ServiceConfig};
use dispatch_dashboard::{AdminConsole, ResponderConsole};

use crate::error::WebError;

pub struct AppState {
    pub config: ServiceConfig,
    pub backend: BackendConfig,
    pub api: ApiClient,
    pub admin: AdminConsole,
    pub team: Option<ResponderConsole>,
    pub geocoder: Option<LocationIqClient>,
    pub media: Option<MediaStore>,
    pub uploads: UploadRegistry,
}

impl AppState {
    pub fn team(&self) -> Result<&ResponderConsole, WebError> {
        self.team
            .as_ref()
            .ok_or(WebError::Disabled("response-team console"))
    }

    pub fn geocoder(&self) -> Result<&LocationIqClient, WebError> {
        self.geocoder.as_ref().ok_or(WebError::Disabled("geocoding"))
    }

    pub fn media(&self) -> Result<&MediaStore, WebError> {
        self.media.as_ref().ok_or(WebError::Disabled("media upload"))
    }
}

/// Uploads in flight, keyed by the id the submitting page chose.
#[derive(Default)]
pub struct UploadRegistry {
    uploads: Mutex<HashMap<String, UploadProgress>>,
}

impl UploadRegistry {
    pub fn begin(&self, id: &str) -> UploadProgress {
        let progress = UploadProgress::new();
        self.uploads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.to_string(), progress.clone());
        progress
    }

    pub fn finish(&self, id: &str) {
        self.uploads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id);
    }

    pub fn fraction(&self, id: &str) -> Option<f64> {
        self.uploads
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .map(UploadProgress::fraction)
    }
}
