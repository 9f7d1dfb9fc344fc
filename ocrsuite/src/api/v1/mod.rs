pub mod handlers;
pub mod openapi;
pub mod response;
pub mod router;

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tokio_util::sync::CancellationToken;
    use tower::ServiceExt;

    use crate::api::routes::create_router;
    use crate::api::state::AppState;
    use crate::config::Config;
    use crate::error::Result;
    use crate::extraction::SamplerProvider;
    use crate::models::OcrMode;
    use crate::ocr::{EngineBuilder, EngineFactory, OcrEngine, PreprocessProfile};
    use crate::store::InMemoryDocumentTypeStore;

    const BOUNDARY: &str = "ocrsuite-test-boundary";

    struct ScriptedEngine;

    #[async_trait]
    impl OcrEngine for ScriptedEngine {
        fn name(&self) -> &str {
            "FAST/SCRIPTED"
        }

        fn profile(&self) -> PreprocessProfile {
            PreprocessProfile::Fast
        }

        async fn recognize_text(&self, _image: Vec<u8>) -> String {
            "CAN CUOC CONG DAN\nSo / No: 079201001234\nHo va ten: TRAN THI B".to_string()
        }
    }

    struct ScriptedBuilder;

    impl EngineBuilder for ScriptedBuilder {
        fn build_fast(&self) -> Result<Arc<dyn OcrEngine>> {
            Ok(Arc::new(ScriptedEngine))
        }

        fn build_enhanced(&self) -> Result<Arc<dyn OcrEngine>> {
            Err(crate::error::OcrError::EngineUnavailable(
                "no models in tests".to_string(),
            ))
        }
    }

    fn test_state() -> AppState {
        let samplers = Arc::new(SamplerProvider::new());
        samplers
            .load_from_json(r#"{"idOnly":["id"]}"#)
            .unwrap();

        AppState::new(
            Config::default(),
            Arc::new(EngineFactory::new(OcrMode::Auto, Arc::new(ScriptedBuilder))),
            samplers,
            Arc::new(InMemoryDocumentTypeStore::seeded()),
            CancellationToken::new(),
        )
    }

    fn png_bytes() -> Vec<u8> {
        let img = image::DynamicImage::new_rgb8(32, 16);
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)
            .unwrap();
        out
    }

    fn multipart_body(file: Option<&[u8]>, fields: &[(&str, &str)]) -> Vec<u8> {
        let mut body = Vec::new();
        if let Some(bytes) = file {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"card.png\"\r\nContent-Type: image/png\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn ocr_request(body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/v1/ocr")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_engine_slots() {
        let app = create_router(test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["status"], "ok");
        assert_eq!(json["data"]["engines"]["fast"], "not_loaded");
        assert_eq!(json["data"]["engines"]["enhanced"], "not_loaded");
        assert_eq!(json["data"]["samplers"], 1);
    }

    #[tokio::test]
    async fn ocr_extracts_fields_for_document_type() {
        let app = create_router(test_state());
        let png = png_bytes();
        let body = multipart_body(Some(&png), &[("docType", "CCCD_FULL"), ("mode", "auto")]);

        let response = app.oneshot(ocr_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let data = &json["data"];
        assert_eq!(data["documentTypeCode"], "CCCD_FULL");
        assert_eq!(data["engineName"], "FAST/SCRIPTED");
        assert_eq!(data["fields"]["id"], "079201001234");
        assert_eq!(data["metadata"]["psm"], 6);
        assert_eq!(data["templateUsed"]["version"], "v1");
        assert!(json.get("error").is_none());
    }

    #[tokio::test]
    async fn ocr_without_document_type_is_unknown() {
        let app = create_router(test_state());
        let png = png_bytes();
        let body = multipart_body(Some(&png), &[("mode", "bogus"), ("sampler", "idOnly")]);

        let response = app.oneshot(ocr_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["documentTypeCode"], "UNKNOWN");
        assert_eq!(json["data"]["fields"], serde_json::json!({}));
        assert!(json["data"]["templateUsed"].is_null());
        assert!(json["data"]["metadata"].is_null());
    }

    #[tokio::test]
    async fn ocr_enhanced_request_falls_back_to_fast() {
        let app = create_router(test_state());
        let png = png_bytes();
        let body = multipart_body(Some(&png), &[("mode", "enhanced")]);

        let response = app.oneshot(ocr_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["engineName"], "FAST/SCRIPTED");
    }

    #[tokio::test]
    async fn ocr_requires_file() {
        let app = create_router(test_state());
        let body = multipart_body(None, &[("docType", "CCCD_FULL")]);

        let response = app.oneshot(ocr_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "invalid_request");
        assert!(json.get("data").is_none());
    }

    #[tokio::test]
    async fn ocr_rejects_undecodable_image() {
        let app = create_router(test_state());
        let body = multipart_body(Some(b"definitely not an image"), &[]);

        let response = app.oneshot(ocr_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["error"]["code"], "invalid_request");
    }

    #[tokio::test]
    async fn sampler_reload_reports_table_size() {
        let state = test_state();
        let samplers = state.samplers.clone();
        let app = create_router(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/samplers:reload")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["count"], samplers.len());
    }

    #[tokio::test]
    async fn enhanced_reset_clears_recorded_failure() {
        let app = create_router(test_state());
        let png = png_bytes();

        let response = app
            .clone()
            .oneshot(ocr_request(multipart_body(Some(&png), &[("mode", "enhanced")])))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let health = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v1/health")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(body_json(health).await["data"]["engines"]["enhanced"], "unavailable");

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/engines/enhanced:reset")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"]["enhanced"], "not_loaded");
        assert_eq!(json["data"]["fast"], "ready");
    }

    #[tokio::test]
    async fn openapi_json_is_valid() {
        let app = create_router(test_state());

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/openapi.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let version = json["openapi"]
            .as_str()
            .expect("openapi field should be a string");
        assert!(version.starts_with('3'));
        assert!(json["paths"].get("/api/v1/ocr").is_some());
        assert!(json["paths"].get("/api/v1/engines/enhanced:reset").is_some());
    }
}
