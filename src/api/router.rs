//! HTTP router.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! CORS admits the local web UI only.

use axum::http::{header, HeaderValue, Method};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::api::endpoints;
use crate::api::types::ApiContext;

/// Origins of the local web front end.
pub const ALLOWED_ORIGINS: [&str; 2] = ["http://localhost:3000", "http://127.0.0.1:3000"];

pub fn api_router(ctx: ApiContext) -> Router {
    Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/analyze", post(endpoints::analyze::full))
        .route("/analyze/soap", post(endpoints::analyze::soap))
        .with_state(ctx)
        .layer(cors_layer())
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(ALLOWED_ORIGINS.map(HeaderValue::from_static))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use crate::engine_service::EngineService;
    use crate::pipeline::agents::AgentRole;
    use crate::pipeline::audit::MemoryAuditSink;
    use crate::pipeline::inference::ScriptedGenerator;
    use crate::pipeline::orchestrator::Pipeline;
    use crate::pipeline::retrieval::RetrievalStage;

    const SOAP_JSON: &str = r#"{"subjective": "Cough for three days.", "objective": "T 38.4",
        "assessment": "Possible lower respiratory tract infection", "plan_suggestions": "Consider CXR."}"#;

    fn app(generator: ScriptedGenerator) -> Router {
        let engine = EngineService::new(Box::new(generator));
        let pipeline = Pipeline::new(
            Arc::new(engine),
            RetrievalStage::disabled(),
            Box::new(MemoryAuditSink::new()),
        );
        api_router(ApiContext::new(Arc::new(pipeline)))
    }

    fn full_script() -> ScriptedGenerator {
        ScriptedGenerator::new("medgemma-test")
            .with_response(AgentRole::Soap, SOAP_JSON)
            .with_response(
                AgentRole::Differential,
                r#"{"diagnoses": [{"rank": 1, "condition": "Acute bronchitis", "likelihood": "Moderate"}]}"#,
            )
            .with_response(AgentRole::Guideline, r#"{"recommendations": []}"#)
            .with_response(
                AgentRole::Patient,
                r#"{"summary": "Your doctor is looking into your cough.", "key_points": ["Rest"]}"#,
            )
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn valid_body() -> serde_json::Value {
        serde_json::json!({
            "clinical_notes": "54F, productive cough x3 days, fever 38.4, crackles R base.",
            "patient_age": 54,
            "patient_sex": "female"
        })
    }

    #[tokio::test]
    async fn health_reports_model_and_idle_engine() {
        let response = app(full_script())
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert_eq!(json["status"], "ok");
        assert_eq!(json["model"], "medgemma-test");
        assert_eq!(json["engine_busy"], false);
        assert_eq!(json["retrieval_enabled"], false);
        assert!(json["current_operation"].is_null());
    }

    #[tokio::test]
    async fn analyze_returns_all_sections() {
        let response = app(full_script())
            .oneshot(post_json("/analyze", valid_body()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert_eq!(json["status"], "complete");
        assert_eq!(json["soap"]["status"], "parsed");
        assert_eq!(
            json["differential"]["diagnoses"][0]["condition"],
            "Acute bronchitis"
        );
        assert_eq!(json["model_id"], "medgemma-test");
        assert!(json["disclaimer"]
            .as_str()
            .unwrap()
            .contains("CLINICAL DECISION SUPPORT ONLY"));
    }

    #[tokio::test]
    async fn analyze_reports_degraded_sections() {
        let response = app(full_script().with_response(AgentRole::Patient, "no json"))
            .oneshot(post_json("/analyze", valid_body()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = json_body(response).await;
        assert_eq!(json["status"], "degraded");
        assert_eq!(json["sections"], serde_json::json!(["patient"]));
        assert_eq!(json["patient"]["status"], "degraded");
    }

    #[tokio::test]
    async fn short_notes_rejected_with_422() {
        let response = app(full_script())
            .oneshot(post_json(
                "/analyze",
                serde_json::json!({ "clinical_notes": "cough" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = json_body(response).await;
        assert_eq!(json["error"]["code"], "INVALID_INPUT");
    }

    #[tokio::test]
    async fn malformed_body_rejected_with_422() {
        let request = Request::builder()
            .method("POST")
            .uri("/analyze")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = app(full_script()).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let json = json_body(response).await;
        assert_eq!(json["error"]["code"], "INVALID_INPUT");
    }

    #[tokio::test]
    async fn invalid_sex_rejected_with_422() {
        let mut body = valid_body();
        body["patient_sex"] = "unknown".into();
        let response = app(full_script())
            .oneshot(post_json("/analyze", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn inference_failure_returns_503() {
        let response = app(full_script().failing_on(AgentRole::Differential))
            .oneshot(post_json("/analyze", valid_body()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = json_body(response).await;
        assert_eq!(json["error"]["code"], "INFERENCE_UNAVAILABLE");
        assert_eq!(json["safe_to_retry"], true);
    }

    #[tokio::test]
    async fn soap_endpoint_runs_soap_only() {
        let response = app(full_script())
            .oneshot(post_json("/analyze/soap", valid_body()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["soap"]["status"], "parsed");
        assert!(json.get("differential").is_none());
    }

    #[tokio::test]
    async fn cors_allows_local_ui_only() {
        let preflight = |origin: &str| {
            Request::builder()
                .method("OPTIONS")
                .uri("/analyze")
                .header("origin", origin)
                .header("access-control-request-method", "POST")
                .body(Body::empty())
                .unwrap()
        };

        let allowed = app(full_script())
            .oneshot(preflight("http://localhost:3000"))
            .await
            .unwrap();
        assert_eq!(
            allowed.headers().get("access-control-allow-origin").unwrap(),
            "http://localhost:3000"
        );

        let denied = app(full_script())
            .oneshot(preflight("http://evil.example"))
            .await
            .unwrap();
        assert!(denied.headers().get("access-control-allow-origin").is_none());
    }
}
