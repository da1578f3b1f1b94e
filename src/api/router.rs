//! HTTP router for the intake service.
//!
//! Returns a composable `Router` that can be mounted on any axum server.
//! Routes are nested under `/api/`.
//!
//! Access control happens inside handlers through `ApiContext::authorize`,
//! since the required capability differs per route. The middleware stack
//! (outermost → innermost) is: CORS → no-store header → audit logger.

use std::sync::Arc;

use axum::http::{header, HeaderValue};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::set_header::SetResponseHeaderLayer;

use crate::api::endpoints;
use crate::api::middleware;
use crate::api::types::ApiContext;
use crate::core_state::CoreState;

/// Build the API router over shared core state.
///
/// Middleware uses `Extension<ApiContext>` (injected outside the audit layer).
/// Endpoint handlers use `State<ApiContext>` (provided via `with_state`).
pub fn api_router(core: Arc<CoreState>) -> Router {
    build_router(ApiContext::new(core))
}

fn build_router(ctx: ApiContext) -> Router {
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let routes = Router::new()
        .route("/health", get(endpoints::health::check))
        .route("/session", get(endpoints::session::current))
        .route("/session/login", post(endpoints::session::login))
        .route("/session/logout", post(endpoints::session::logout))
        .route("/session/consent", post(endpoints::session::consent))
        .route(
            "/cases",
            post(endpoints::cases::create).get(endpoints::cases::list),
        )
        .route("/cases/:id", get(endpoints::cases::detail))
        .route(
            "/cases/:id/analysis",
            post(endpoints::analysis::start)
                .get(endpoints::analysis::status)
                .delete(endpoints::analysis::abandon),
        )
        .route("/cases/:id/result", get(endpoints::analysis::result))
        .route("/cases/:id/report.pdf", get(endpoints::analysis::report_pdf))
        .route("/cases/:id/report.txt", get(endpoints::analysis::report_text))
        .route("/cases/:id/follow-up", post(endpoints::analysis::follow_up))
        .route("/medications/search", get(endpoints::medications::search))
        .route("/medications/:item_seq", get(endpoints::medications::detail))
        .route(
            "/assessment/connection",
            get(endpoints::assessment::connection),
        )
        .with_state(ctx.clone())
        .layer(axum::middleware::from_fn(middleware::audit::log_access))
        // Patient data must not linger in intermediary caches
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .layer(axum::Extension(ctx));

    Router::new()
        .nest("/api", routes)
        .layer(CorsLayer::permissive())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::config::DrugApiConfig;
    use crate::db;
    use crate::medications::DrugRegistryClient;
    use crate::models::AssessmentResult;
    use crate::pipeline::assessment::MockAssessor;
    use crate::pipeline::{Stage, StageKind, ANALYSIS_STAGES};

    fn result() -> AssessmentResult {
        serde_json::from_value(json!({
            "riskLevel": "high",
            "riskScore": 72,
            "summary": "Possible cardiac involvement",
            "recommendations": [
                {"priority": "urgent", "text": "ECG within 10 minutes"}
            ]
        }))
        .unwrap()
    }

    fn test_core(mock: Arc<MockAssessor>) -> Arc<CoreState> {
        let conn = db::open_memory_database().unwrap();
        let drugs = DrugRegistryClient::new(DrugApiConfig {
            api_key: None,
            base_url: "http://127.0.0.1:9".into(),
        })
        .unwrap();
        let core = CoreState::new(conn, mock, drugs).unwrap().with_sequencer(|s| {
            let stages: Vec<Stage> = ANALYSIS_STAGES
                .iter()
                .map(|st| Stage {
                    kind: match st.kind {
                        StageKind::Timed(_) => StageKind::Timed(Duration::ZERO),
                        other => other,
                    },
                    ..*st
                })
                .collect();
            s.with_stages(stages).with_handoff_delay(Duration::ZERO)
        });
        Arc::new(core)
    }

    fn request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
        let builder = Request::builder().method(method).uri(uri);
        match body {
            Some(v) => builder
                .header("Content-Type", "application/json")
                .body(Body::from(v.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        }
    }

    async fn send(core: &Arc<CoreState>, req: Request<Body>) -> Response {
        api_router(core.clone()).oneshot(req).await.unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn sign_in(core: &Arc<CoreState>, email: &str) {
        let login = json!({"email": email, "password": "secret"});
        let res = send(core, request("POST", "/api/session/login", Some(login))).await;
        assert_eq!(res.status(), StatusCode::OK);
        let res = send(core, request("POST", "/api/session/consent", None)).await;
        assert_eq!(res.status(), StatusCode::OK);
    }

    fn intake() -> Value {
        json!({
            "gender": "male",
            "ageGroup": "50-59",
            "chiefComplaint": "Chest pain radiating to left arm",
            "questionnaire": {"symptomDuration": "2 hours", "painLevel": 8}
        })
    }

    async fn create_case(core: &Arc<CoreState>) -> String {
        let res = send(core, request("POST", "/api/cases", Some(intake()))).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        json_body(res).await["caseId"].as_str().unwrap().to_string()
    }

    async fn wait_until_finished(core: &Arc<CoreState>, case_id: &str) -> Value {
        for _ in 0..200 {
            let uri = format!("/api/cases/{case_id}/analysis");
            let snapshot = json_body(send(core, request("GET", &uri, None)).await).await;
            if snapshot["status"]["state"] != "running" {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("analysis did not finish");
    }

    #[tokio::test]
    async fn health_is_public() {
        let core = test_core(Arc::new(MockAssessor::returning(result())));
        let res = send(&core, request("GET", "/api/health", None)).await;

        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers().get("Cache-Control").unwrap(), "no-store");
        let body = json_body(res).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["authenticated"], false);
    }

    #[tokio::test]
    async fn cases_require_sign_in() {
        let core = test_core(Arc::new(MockAssessor::returning(result())));
        let res = send(&core, request("GET", "/api/cases", None)).await;

        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(res).await["error"]["code"], "AUTH_REQUIRED");
    }

    #[tokio::test]
    async fn consent_required_after_login() {
        let core = test_core(Arc::new(MockAssessor::returning(result())));
        let login = json!({"email": "dr.kim@example.com", "password": "secret"});
        let res = send(&core, request("POST", "/api/session/login", Some(login))).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert_eq!(body["consented"], false);
        assert_eq!(body["user"]["role"], "clinician");

        let res = send(&core, request("POST", "/api/cases", Some(intake()))).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        assert_eq!(json_body(res).await["error"]["code"], "CONSENT_REQUIRED");
    }

    #[tokio::test]
    async fn empty_credentials_rejected() {
        let core = test_core(Arc::new(MockAssessor::returning(result())));
        let login = json!({"email": "", "password": "secret"});
        let res = send(&core, request("POST", "/api/session/login", Some(login))).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn clinician_cannot_check_connection() {
        let core = test_core(Arc::new(MockAssessor::returning(result())));
        sign_in(&core, "dr.kim@example.com").await;

        let res = send(&core, request("GET", "/api/assessment/connection", None)).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn admin_checks_connection() {
        let core = test_core(Arc::new(MockAssessor::returning(result())));
        sign_in(&core, "admin@example.com").await;

        let res = send(&core, request("GET", "/api/assessment/connection", None)).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(json_body(res).await["success"], true);
    }

    #[tokio::test]
    async fn invalid_intake_is_bad_request() {
        let core = test_core(Arc::new(MockAssessor::returning(result())));
        sign_in(&core, "dr.kim@example.com").await;

        let mut draft = intake();
        draft["chiefComplaint"] = json!("   ");
        let res = send(&core, request("POST", "/api/cases", Some(draft))).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn unknown_case_is_not_found() {
        let core = test_core(Arc::new(MockAssessor::returning(result())));
        sign_in(&core, "dr.kim@example.com").await;

        let res = send(&core, request("GET", "/api/cases/CASE-0", None)).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        let res = send(&core, request("GET", "/api/cases/CASE-0/result", None)).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn intake_to_result_flow() {
        let core = test_core(Arc::new(MockAssessor::returning(result())));
        sign_in(&core, "dr.kim@example.com").await;
        let case_id = create_case(&core).await;

        let uri = format!("/api/cases/{case_id}/analysis");
        let res = send(&core, request("POST", &uri, None)).await;
        assert_eq!(res.status(), StatusCode::ACCEPTED);
        let started = json_body(res).await;
        assert_eq!(started["stages"].as_array().unwrap().len(), 5);

        let done = wait_until_finished(&core, &case_id).await;
        assert_eq!(done["status"]["state"], "completed");
        assert_eq!(
            done["status"]["result_path"],
            format!("/cases/{case_id}/result")
        );

        let uri = format!("/api/cases/{case_id}/result");
        let res = send(&core, request("GET", &uri, None)).await;
        assert_eq!(res.status(), StatusCode::OK);
        let stored = json_body(res).await;
        assert_eq!(stored["riskLevel"], "high");
        assert_eq!(stored["riskScore"], 72);

        let res = send(&core, request("GET", "/api/cases", None)).await;
        let list = json_body(res).await;
        assert_eq!(list[0]["id"], case_id.as_str());
        assert_eq!(list[0]["riskScore"], 72);
    }

    #[tokio::test]
    async fn failed_assessment_reported_in_snapshot() {
        let mock = MockAssessor::failing(crate::pipeline::assessment::AssessmentError::Remote {
            status: 429,
            message: "Rate limit reached".into(),
        });
        let core = test_core(Arc::new(mock));
        sign_in(&core, "dr.kim@example.com").await;
        let case_id = create_case(&core).await;

        let uri = format!("/api/cases/{case_id}/analysis");
        send(&core, request("POST", &uri, None)).await;
        let done = wait_until_finished(&core, &case_id).await;

        assert_eq!(done["status"]["state"], "failed");
        assert_eq!(done["error"], "Rate limit reached");
        assert_eq!(done["stages"][2]["status"], "error");
    }

    #[tokio::test]
    async fn second_start_conflicts_until_restart() {
        let mock = Arc::new(MockAssessor::returning(result()).gated());
        let core = test_core(mock.clone());
        sign_in(&core, "dr.kim@example.com").await;
        let case_id = create_case(&core).await;

        let uri = format!("/api/cases/{case_id}/analysis");
        let res = send(&core, request("POST", &uri, None)).await;
        assert_eq!(res.status(), StatusCode::ACCEPTED);
        let res = send(&core, request("POST", &uri, None)).await;
        assert_eq!(res.status(), StatusCode::CONFLICT);

        let res = send(&core, request("DELETE", &uri, None)).await;
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        let res = send(&core, request("GET", &uri, None)).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        mock.release();
    }

    #[tokio::test]
    async fn report_downloads_as_pdf() {
        let core = test_core(Arc::new(MockAssessor::returning(result())));
        sign_in(&core, "dr.kim@example.com").await;
        let case_id = create_case(&core).await;
        let uri = format!("/api/cases/{case_id}/analysis");
        send(&core, request("POST", &uri, None)).await;
        wait_until_finished(&core, &case_id).await;

        let uri = format!("/api/cases/{case_id}/report.pdf");
        let res = send(&core, request("GET", &uri, None)).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers().get("Content-Type").unwrap(), "application/pdf");
        let disposition = res
            .headers()
            .get("Content-Disposition")
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(disposition.contains(&case_id));
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn report_downloads_as_text() {
        let core = test_core(Arc::new(MockAssessor::returning(result())));
        sign_in(&core, "dr.kim@example.com").await;
        let case_id = create_case(&core).await;

        let uri = format!("/api/cases/{case_id}/report.txt");
        let res = send(&core, request("GET", &uri, None)).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);

        let analysis = format!("/api/cases/{case_id}/analysis");
        send(&core, request("POST", &analysis, None)).await;
        wait_until_finished(&core, &case_id).await;

        let res = send(&core, request("GET", &uri, None)).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers().get("Content-Type").unwrap(),
            "text/plain; charset=utf-8"
        );
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.starts_with(&format!("AI Analysis Report - {case_id}")));
        assert!(text.contains("Risk: HIGH (72/100)"));
        assert!(text.contains("[URGENT] ECG within 10 minutes"));
    }

    #[tokio::test]
    async fn follow_up_answers_and_rejects_blank() {
        let mock = MockAssessor::returning(result()).with_follow_up("Repeat troponin at 3 hours.");
        let core = test_core(Arc::new(mock));
        sign_in(&core, "dr.kim@example.com").await;
        let case_id = create_case(&core).await;
        let uri = format!("/api/cases/{case_id}/analysis");
        send(&core, request("POST", &uri, None)).await;
        wait_until_finished(&core, &case_id).await;

        let uri = format!("/api/cases/{case_id}/follow-up");
        let res = send(&core, request("POST", &uri, Some(json!({"question": " "})))).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        let ask = json!({"question": "What labs should follow?"});
        let res = send(&core, request("POST", &uri, Some(ask))).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(json_body(res).await["answer"], "Repeat troponin at 3 hours.");
    }

    #[tokio::test]
    async fn medication_search_without_key_is_empty() {
        let core = test_core(Arc::new(MockAssessor::returning(result())));
        sign_in(&core, "dr.kim@example.com").await;

        let res = send(&core, request("GET", "/api/medications/search?q=aspirin", None)).await;
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert_eq!(body["items"], json!([]));
    }

    #[tokio::test]
    async fn logout_signs_out() {
        let core = test_core(Arc::new(MockAssessor::returning(result())));
        sign_in(&core, "dr.kim@example.com").await;

        let res = send(&core, request("POST", "/api/session/logout", None)).await;
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        let res = send(&core, request("GET", "/api/session", None)).await;
        let body = json_body(res).await;
        assert!(body["user"].is_null());
        assert_eq!(body["consented"], false);
    }
}
