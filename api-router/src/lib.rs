use api_state::ApiState;
use axum::{
    extract::{DefaultBodyLimit, FromRef},
    routing::{get, post},
    Router,
};
use routes::{
    liveness::live, ocr::ocr_image, readiness::ready, result::get_result, status::check_status,
    upload::upload_image,
};

pub mod api_state;
pub mod error;
mod routes;

/// Router for the JSON API surface.
pub fn api_routes<S>(app_state: &ApiState) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
    ApiState: FromRef<S>,
{
    // Probes for k8s/systemd, no body limits needed
    let probes = Router::new()
        .route("/ready", get(ready))
        .route("/live", get(live));

    let uploads = Router::new()
        .route("/upload", post(upload_image))
        .route("/ocr", post(ocr_image))
        .layer(DefaultBodyLimit::max(app_state.config.upload_max_body_bytes));

    let queries = Router::new()
        .route("/status/{file_id}", get(check_status))
        .route("/result/{file_id}", get(get_result));

    probes.merge(uploads).merge(queries)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
    };
    use common::{
        storage::{blob::BlobStorage, db::SurrealDbClient},
        utils::config::{AppConfig, StorageKind},
    };
    use ocr_pipeline::{recognizer::testing::StaticRecognizer, JobLifecycle};
    use tower::ServiceExt;
    use uuid::Uuid;

    use super::*;

    #[derive(Clone)]
    struct TestState {
        api: ApiState,
    }

    impl FromRef<TestState> for ApiState {
        fn from_ref(state: &TestState) -> ApiState {
            state.api.clone()
        }
    }

    async fn test_app(config: AppConfig) -> Router {
        let db = Arc::new(
            SurrealDbClient::memory("test_ns", &Uuid::new_v4().to_string())
                .await
                .expect("in-memory surrealdb"),
        );
        let blobs = BlobStorage::with_backend(
            Arc::new(object_store::memory::InMemory::new()),
            StorageKind::Memory,
        );
        let lifecycle = Arc::new(JobLifecycle::new(
            Arc::clone(&db),
            blobs,
            Arc::new(StaticRecognizer {
                text: "Hello".into(),
            }),
            &config,
        ));
        let api = ApiState::new(db, lifecycle, &config);
        api_routes::<TestState>(&api).with_state(TestState { api })
    }

    fn multipart_upload(uri: &str, file_name: &str, bytes: &[u8]) -> Request<Body> {
        let boundary = "X-API-TEST-BOUNDARY";
        let mut body = Vec::new();
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; \
                 filename=\"{file_name}\"\r\nContent-Type: image/png\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(bytes);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .expect("request")
    }

    #[tokio::test]
    async fn test_upload_over_configured_body_limit_is_rejected() {
        let config = AppConfig {
            upload_max_body_bytes: 2048,
            ..AppConfig::default()
        };
        let app = test_app(config).await;

        let oversized = vec![0_u8; 8192];
        let response = app
            .oneshot(multipart_upload("/upload", "big.png", &oversized))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_upload_under_configured_body_limit_is_accepted() {
        let config = AppConfig {
            upload_max_body_bytes: 2048,
            ..AppConfig::default()
        };
        let app = test_app(config).await;

        let response = app
            .oneshot(multipart_upload("/upload", "small.png", b"tiny"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_sync_route_honors_configured_body_limit() {
        let config = AppConfig {
            upload_max_body_bytes: 2048,
            ..AppConfig::default()
        };
        let app = test_app(config).await;

        let oversized = vec![0_u8; 8192];
        let response = app
            .oneshot(multipart_upload("/ocr", "big.png", &oversized))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }
}
