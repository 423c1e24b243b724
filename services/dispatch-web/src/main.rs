mod error;
mod routes;
mod state;

use actix_web::{web, App, HttpServer};
use chrono::FixedOffset;
use dispatch_client::{ApiClient, LocationIqClient, MediaStore};
use dispatch_config::{BackendConfig, GeocodeConfig, MediaConfig, ResponderConfig, ServiceConfig};
use dispatch_core::{TeamId, UserId};
use dispatch_dashboard::{
    AdminConsole, AdminSources, Responder, ResponderConsole, ResponderSources, RoutePlanner,
};
use dispatch_observability::{init, log_startup};
use state::{AppState, UploadRegistry};
use std::io;
use std::sync::Arc;
use tracing::info;

// Request bodies other than media uploads stay small.
const DEFAULT_PAYLOAD_BYTES: usize = 256 * 1024;

#[actix_web::main]
async fn main() -> io::Result<()> {
    let config = ServiceConfig::from_env("dispatch-web");
    let responder_config = ResponderConfig::from_env();
    let mut collections = AdminConsole::COLLECTIONS.to_vec();
    if responder_config.is_some() {
        collections.extend(ResponderConsole::COLLECTIONS);
    }
    let telemetry = init(&config, &collections);
    log_startup(&telemetry);

    let backend = BackendConfig::from_env();
    let offset = FixedOffset::east_opt(backend.utc_offset_minutes * 60).ok_or_else(|| {
        io::Error::new(io::ErrorKind::InvalidInput, "DISPATCH_UTC_OFFSET_MINUTES out of range")
    })?;
    let api = ApiClient::new(&backend.base_url)
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err.to_string()))?;

    let geocoder = GeocodeConfig::from_env()
        .map(|geocode| LocationIqClient::new(&geocode.base_url, geocode.api_key))
        .transpose()
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err.to_string()))?;
    let media_config = MediaConfig::from_env();
    let media = media_config
        .as_ref()
        .map(|media| MediaStore::new(&media.base_url, &media.bucket, media.max_upload_bytes))
        .transpose()
        .map_err(|err| io::Error::new(io::ErrorKind::Other, err.to_string()))?;
    let payload_limit = media_config
        .as_ref()
        .map(|media| usize::try_from(media.max_upload_bytes).unwrap_or(usize::MAX))
        .unwrap_or(DEFAULT_PAYLOAD_BYTES);

    let admin = AdminConsole::new(Arc::new(api.clone()), AdminSources::from_api(&api), offset);
    admin.start(backend.admin_poll_interval());

    let team = responder_config.map(|identity| {
        let user_id = UserId::new(identity.user_id);
        let responder = Responder {
            team_id: TeamId::new(identity.team_id),
            user_id: user_id.clone(),
            resolver_name: identity.resolver_name,
        };
        let planner = geocoder
            .clone()
            .map(|client| Arc::new(client) as Arc<dyn RoutePlanner>);
        let console = ResponderConsole::new(
            responder,
            Arc::new(api.clone()),
            planner,
            ResponderSources::from_api(&api, user_id),
        );
        console.start(backend.team_poll_interval());
        console
    });
    info!(
        team_console = team.is_some(),
        geocoding = geocoder.is_some(),
        media_uploads = media.is_some(),
        "consoles configured"
    );

    let bind_addr = config.bind_addr.clone();
    let state = web::Data::new(AppState {
        config,
        backend,
        api,
        admin,
        team,
        geocoder,
        media,
        uploads: UploadRegistry::default(),
    });

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .app_data(web::PayloadConfig::new(payload_limit))
            .configure(routes::configure)
    })
        .bind(bind_addr)?
        .run()
        .await
}
