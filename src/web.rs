//! HTTP trigger for sync runs
//!
//! `POST /` runs one sync and answers once it has finished. Runs never
//! overlap: a request arriving during a run gets `409 Conflict`.

use axum::{extract::State, http::StatusCode, routing::get, routing::post, Router};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::SyncConfig;
use crate::error::Result;
use crate::sync::run_once;

/// Shared application state
#[derive(Clone)]
struct AppState {
    config: Arc<SyncConfig>,
    run_lock: Arc<Mutex<()>>,
}

/// POST / - run one sync
async fn trigger_handler(State(state): State<AppState>) -> StatusCode {
    let Ok(_running) = state.run_lock.try_lock() else {
        log::warn!("Sync requested while a run is in progress");
        return StatusCode::CONFLICT;
    };

    match run_once(state.config.as_ref().clone()).await {
        Ok(report) => {
            log::info!("Triggered sync finished: {:?}", report);
            StatusCode::NO_CONTENT
        }
        Err(e) => {
            log::error!("Triggered sync failed: {}", e);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// GET /health
async fn health_handler() -> &'static str {
    "ok"
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/", post(trigger_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Build the web server router
pub fn create_router(config: SyncConfig) -> Router {
    router(AppState {
        config: Arc::new(config),
        run_lock: Arc::new(Mutex::new(())),
    })
}

/// Start the web server
///
/// Binds to 0.0.0.0 (all interfaces) to work with container port mapping.
pub async fn serve(config: SyncConfig, port: u16) -> Result<()> {
    let app = create_router(config);
    let addr = format!("0.0.0.0:{}", port);

    log::info!("Sync trigger listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::json;
    use std::time::Duration;
    use tower::ServiceExt;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(mock_uri: &str) -> SyncConfig {
        let mut config = SyncConfig::new(
            "test_token",
            "appBase",
            "Products",
            format!("{mock_uri}/stock.csv"),
            format!("{mock_uri}/productdata.csv"),
        )
        .with_rate_limit_delay(Duration::ZERO);
        config.api_url = mock_uri.to_string();
        config
    }

    fn state(config: SyncConfig) -> AppState {
        AppState {
            config: Arc::new(config),
            run_lock: Arc::new(Mutex::new(())),
        }
    }

    fn trigger() -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/")
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn health_answers_ok() {
        let app = create_router(config("http://127.0.0.1:9"));
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"ok");
    }

    #[tokio::test]
    async fn concurrent_trigger_is_rejected() {
        let state = state(config("http://127.0.0.1:9"));
        let _running = state.run_lock.lock().await;

        let response = router(state.clone()).oneshot(trigger()).await.unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn failed_run_answers_500() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let app = create_router(config(&mock_server.uri()));
        let response = app.oneshot(trigger()).await.unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn successful_run_answers_204() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/stock.csv"))
            .respond_with(ResponseTemplate::new(200).set_body_string("sku;Einkaufspreis netto\nW-1;8,00\n"))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/productdata.csv"))
            .respond_with(ResponseTemplate::new(200).set_body_string("sku;Produktname lang\nW-1;Grauburgunder\n"))
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path("/appBase/Products"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "records": [{ "id": "rec1", "fields": { "variants.sku": "W-1" } }]
            })))
            .mount(&mock_server)
            .await;
        Mock::given(method("PATCH"))
            .and(path("/appBase/Products"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "records": [] })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let app = create_router(config(&mock_server.uri()));
        let response = app.oneshot(trigger()).await.unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn lock_is_released_after_a_run() {
        let state = state(config("http://127.0.0.1:9"));

        // fails fast on the unreachable feed
        let first = router(state.clone()).oneshot(trigger()).await.unwrap();
        assert_eq!(first.status(), StatusCode::INTERNAL_SERVER_ERROR);

        assert!(state.run_lock.try_lock().is_ok());
    }
}
