use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use relief_grant::error::AppError;
use relief_grant::workflows::relief::{
    application_router, ApplicationRepository, DecisionReplay, EligibilityEngine,
    ReliefApplicationService, ReplayReport,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::io::Cursor;
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub(crate) struct ReplayRequest {
    pub(crate) csv: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct ReplayResponse {
    pub(crate) awarded: usize,
    pub(crate) declined: usize,
    #[serde(flatten)]
    pub(crate) report: ReplayReport,
}

pub(crate) fn with_application_routes<R>(service: Arc<ReliefApplicationService<R>>) -> axum::Router
where
    R: ApplicationRepository + 'static,
{
    application_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/relief/replay",
            axum::routing::post(replay_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

/// Replay a CSV batch through the rule engine; nothing is stored.
pub(crate) async fn replay_endpoint(
    Extension(state): Extension<AppState>,
    Json(payload): Json<ReplayRequest>,
) -> Result<Json<ReplayResponse>, AppError> {
    let engine = EligibilityEngine::new(state.policy.as_ref().clone());
    let report = DecisionReplay::new(&engine).replay_reader(Cursor::new(payload.csv.into_bytes()))?;

    Ok(Json(ReplayResponse {
        awarded: report.awarded(),
        declined: report.declined(),
        report,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::InMemoryApplicationRepository;
    use axum::body::Body;
    use axum::http::Request;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use relief_grant::workflows::relief::GrantPolicyConfig;
    use std::sync::atomic::{AtomicBool, Ordering};
    use tower::ServiceExt;

    fn state(ready: bool) -> AppState {
        AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
            policy: Arc::new(GrantPolicyConfig::default()),
        }
    }

    fn app(state: AppState) -> axum::Router {
        let service = Arc::new(ReliefApplicationService::new(
            Arc::new(InMemoryApplicationRepository::default()),
            GrantPolicyConfig::default(),
        ));
        with_application_routes(service).layer(Extension(state))
    }

    async fn read_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 256 * 1024)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json")
    }

    #[tokio::test]
    async fn readiness_reflects_the_flag() {
        let state = state(false);
        let router = app(state.clone());

        let response = router
            .clone()
            .oneshot(Request::get("/ready").body(Body::empty()).expect("request"))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);

        state.readiness.store(true, Ordering::Release);
        let response = router
            .oneshot(Request::get("/ready").body(Body::empty()).expect("request"))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_json(response).await["status"], "ready");
    }

    #[tokio::test]
    async fn health_and_metrics_respond() {
        let router = app(state(true));

        let response = router
            .clone()
            .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::OK);

        let response = router
            .oneshot(Request::get("/metrics").body(Body::empty()).expect("request"))
            .await
            .expect("route executes");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()[header::CONTENT_TYPE],
            "text/plain; version=0.0.4"
        );
    }

    #[tokio::test]
    async fn replay_endpoint_carries_balances_between_rows() {
        let csv = "applicant_id,employment_start_date,event,requested_amount,evaluation_date\n\
                   a@example.com,2020-01-01,Flood,6000,2023-08-01\n\
                   a@example.com,2020-01-01,Tornado,5000,2023-08-02\n\
                   b@example.com,2020-01-01,Wildfire,100,2023-08-02\n";

        let Json(body) = replay_endpoint(
            Extension(state(true)),
            Json(ReplayRequest {
                csv: csv.to_string(),
            }),
        )
        .await
        .expect("replay succeeds");

        assert_eq!(body.awarded, 1);
        assert_eq!(body.declined, 2);
        assert_eq!(
            body.report.entries[1].prior_balance.twelve_month_remaining,
            rust_decimal::Decimal::from(4000)
        );
    }

    #[tokio::test]
    async fn malformed_replay_csv_is_a_bad_request() {
        let router = app(state(true));

        let response = router
            .oneshot(
                Request::post("/api/v1/relief/replay")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(
                        json!({"csv": "applicant_id,employment_start_date,event,requested_amount,evaluation_date\na@example.com,yesterday,Flood,10,2023-08-01\n"})
                            .to_string(),
                    ))
                    .expect("request"),
            )
            .await
            .expect("route executes");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn replay_endpoint_rejects_non_positive_amounts() {
        let csv = "applicant_id,employment_start_date,event,requested_amount,evaluation_date\n\
                   a@example.com,2020-01-01,Flood,-50,2023-08-02\n";

        let result = replay_endpoint(
            Extension(state(true)),
            Json(ReplayRequest {
                csv: csv.to_string(),
            }),
        )
        .await;

        match result {
            Err(err) => assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST),
            Ok(_) => panic!("negative amount must not be replayed"),
        }
    }
}
