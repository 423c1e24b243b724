pub mod admin;
pub mod geocode;
pub mod health;
pub mod media;
pub mod reports;
pub mod team;

use actix_web::web;
use dispatch_core::ReportKind;

use crate::error::WebError;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(health::health)
        .service(admin::summary)
        .service(admin::stream)
        .service(admin::pending_page)
        .service(admin::confirm)
        .service(admin::delete)
        .service(admin::confirmed)
        .service(admin::teams)
        .service(admin::resolved)
        .service(team::summary)
        .service(team::location)
        .service(team::resolve)
        .service(team::directions)
        .service(team::clear_notifications)
        .service(reports::submit)
        .service(media::upload)
        .service(media::progress)
        .service(geocode::autocomplete)
        .service(geocode::reverse);
}

pub(crate) fn parse_kind(value: &str) -> Result<ReportKind, WebError> {
    value
        .parse()
        .map_err(|_| WebError::bad_request(format!("unknown report kind '{value}'")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{AppState, UploadRegistry};
    use actix_web::{App, test};
    use async_trait::async_trait;
    use chrono::{FixedOffset, Utc};
    use dispatch_client::ApiClient;
    use dispatch_config::{BackendConfig, ServiceConfig};
    use dispatch_core::{DispatchCode, Report, ReportName, ReportState, TeamLocation};
    use dispatch_dashboard::{AdminConsole, AdminSources};
    use dispatch_reconciler::{CollectionSource, FetchError, FetchOutcome, Keyed};
    use serde_json::Value;
    use std::collections::HashMap;
    use std::sync::Arc;

    struct Fixed<T>(Vec<T>);

    #[async_trait]
    impl<T: Keyed + Clone + Send + Sync + 'static> CollectionSource for Fixed<T> {
        type Item = T;

        async fn fetch(&self) -> Result<FetchOutcome<T>, FetchError> {
            Ok(FetchOutcome::Fresh(self.0.clone()))
        }
    }

    fn report(kind: ReportKind, name: &str, state: ReportState) -> Report {
        Report {
            name: ReportName::new(name),
            kind,
            category: "Fire".to_string(),
            address: "Concepcion Uno, Marikina".to_string(),
            description: String::new(),
            location: None,
            media_url: None,
            state,
        }
    }

    async fn app_state() -> web::Data<AppState> {
        let empty: HashMap<String, String> = HashMap::new();
        // nothing listens here; handlers under test fail before reaching it
        let api = ApiClient::new("http://127.0.0.1:9").unwrap();
        let sources = AdminSources {
            pending_complaints: Arc::new(Fixed(vec![report(
                ReportKind::Complaint,
                "Ana",
                ReportState::Pending,
            )])),
            pending_emergencies: Arc::new(Fixed(Vec::<Report>::new())),
            confirmed: Arc::new(Fixed(vec![report(
                ReportKind::Emergency,
                "Ella",
                ReportState::Confirmed {
                    code: Some(DispatchCode::Red),
                    confirmed_at: Some(Utc::now()),
                },
            )])),
            team_locations: Arc::new(Fixed(Vec::<TeamLocation>::new())),
            resolved: Arc::new(Fixed(Vec::<Report>::new())),
        };
        let admin = AdminConsole::new(
            Arc::new(api.clone()),
            sources,
            FixedOffset::east_opt(8 * 3600).unwrap(),
        );
        admin.refresh().await;
        web::Data::new(AppState {
            config: ServiceConfig::from_lookup(&empty, "dispatch-web"),
            backend: BackendConfig::from_lookup(&empty),
            api,
            admin,
            team: None,
            geocoder: None,
            media: None,
            uploads: UploadRegistry::default(),
        })
    }

    #[actix_web::test]
    async fn admin_summary_reflects_the_last_cycle() {
        let app = test::init_service(
            App::new()
                .app_data(app_state().await)
                .configure(configure),
        )
        .await;
        let req = test::TestRequest::get().uri("/ui/admin/summary").to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["new_complaints"], 1);
        assert_eq!(body["confirmed_emergencies"], 1);
        assert_eq!(body["pending_complaints"], 1);
        assert_eq!(body["last_error"], Value::Null);
    }

    #[actix_web::test]
    async fn confirm_maps_domain_errors_to_status_codes() {
        let app = test::init_service(
            App::new()
                .app_data(app_state().await)
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/ui/admin/reports/rumours/Ana/confirm")
            .set_json(serde_json::json!({ "code": "Code Red" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 400);

        let req = test::TestRequest::post()
            .uri("/ui/admin/reports/complaint/Ana/confirm")
            .set_json(serde_json::json!({ "code": "Code Purple" }))
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 400);

        let req = test::TestRequest::post()
            .uri("/ui/admin/reports/emergency/Ella/confirm")
            .set_json(serde_json::json!({ "code": "Code Red" }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 409);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"].as_str().unwrap().contains("Ella"));

        let req = test::TestRequest::delete()
            .uri("/ui/admin/reports/complaint/Nobody")
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 404);
    }

    #[actix_web::test]
    async fn disabled_features_answer_not_found() {
        let app = test::init_service(
            App::new()
                .app_data(app_state().await)
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get().uri("/ui/team/summary").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 404);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "response-team console is not configured");

        let req = test::TestRequest::get()
            .uri("/ui/geocode/autocomplete?q=Marikina")
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 404);
    }

    #[actix_web::test]
    async fn invalid_submission_is_rejected_before_the_backend() {
        let app = test::init_service(
            App::new()
                .app_data(app_state().await)
                .configure(configure),
        )
        .await;
        let req = test::TestRequest::post()
            .uri("/ui/reports/complaint")
            .set_json(serde_json::json!({
                "name": "Ana",
                "address": "",
                "category": "Noise",
                "latitude": 14.65,
                "longitude": 121.1,
                "media_url": "https://example.invalid/a.jpg",
                "user_id": "u-1"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "address is required");
    }

    #[actix_web::test]
    async fn resolved_rejects_unknown_windows_as_json() {
        let app = test::init_service(
            App::new()
                .app_data(app_state().await)
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/ui/admin/resolved?q=ana&window=fortnight")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
        let body: Value = test::read_body_json(resp).await;
        assert!(body["error"].as_str().unwrap().contains("fortnight"));

        let req = test::TestRequest::get()
            .uri("/ui/admin/resolved?window=Month")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
        let body: Value = test::read_body_json(resp).await;
        assert_eq!(body, serde_json::json!([]));
    }

    #[actix_web::test]
    async fn upload_progress_is_readable_while_registered() {
        let state = app_state().await;
        let progress = state.uploads.begin("up-1");
        let app = test::init_service(
            App::new()
                .app_data(state.clone())
                .configure(configure),
        )
        .await;

        let req = test::TestRequest::get()
            .uri("/ui/media/progress/up-1")
            .to_request();
        let body: Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["progress"], 0.0);
        assert_eq!(progress.fraction(), 0.0);

        state.uploads.finish("up-1");
        let req = test::TestRequest::get()
            .uri("/ui/media/progress/up-1")
            .to_request();
        assert_eq!(test::call_service(&app, req).await.status(), 404);
    }

    #[actix_web::test]
    async fn kinds_accept_singular_and_plural() {
        assert_eq!(parse_kind("emergencies").unwrap(), ReportKind::Emergency);
        assert!(parse_kind("rumour").is_err());
    }
}
