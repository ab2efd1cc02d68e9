use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use serde_json::{json, Value};

use super::domain::{ApplicantId, ApplicationId, ApplicationRequest, GrantBalance};
use super::draft::{DraftField, DraftPatch, DraftSource, FieldValue};
use super::repository::{ApplicationRepository, RepositoryError};
use super::service::{ApplicationServiceError, ReliefApplicationService};

/// Stateless evaluation request: facts, the balance to evaluate against, and an optional date.
#[derive(Debug, Clone, Deserialize)]
pub struct EligibilityQuery {
    pub request: ApplicationRequest,
    pub balance: GrantBalance,
    #[serde(default)]
    pub evaluation_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManualEdit {
    pub fields: BTreeMap<DraftField, FieldValue>,
}

/// Assistant tool call forwarded verbatim from the chat surface.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolCall {
    pub name: String,
    #[serde(default)]
    pub args: Value,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DecisionCommand {
    #[serde(default)]
    pub evaluation_date: Option<NaiveDate>,
}

/// Router builder exposing HTTP endpoints for drafts, submission, and decisions.
pub fn application_router<R>(service: Arc<ReliefApplicationService<R>>) -> Router
where
    R: ApplicationRepository + 'static,
{
    Router::new()
        .route("/api/v1/relief/eligibility", post(eligibility_handler::<R>))
        .route(
            "/api/v1/relief/applicants/:applicant_id/balance",
            get(balance_handler::<R>),
        )
        .route(
            "/api/v1/relief/applicants/:applicant_id/draft",
            get(draft_handler::<R>).patch(draft_edit_handler::<R>),
        )
        .route(
            "/api/v1/relief/applicants/:applicant_id/draft/extraction",
            post(extraction_handler::<R>),
        )
        .route(
            "/api/v1/relief/applicants/:applicant_id/submission",
            post(submit_handler::<R>),
        )
        .route(
            "/api/v1/relief/applications/:application_id/decision",
            post(decision_handler::<R>),
        )
        .route(
            "/api/v1/relief/applications/:application_id",
            get(status_handler::<R>),
        )
        .with_state(service)
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

fn error_response(error: ApplicationServiceError) -> Response {
    let status = match &error {
        ApplicationServiceError::Invalid(_) | ApplicationServiceError::Draft(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ApplicationServiceError::AlreadyDecided { .. }
        | ApplicationServiceError::Repository(RepositoryError::Conflict) => StatusCode::CONFLICT,
        ApplicationServiceError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
        ApplicationServiceError::Repository(RepositoryError::Unavailable(_)) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    let payload = json!({
        "error": error.to_string(),
    });
    (status, Json(payload)).into_response()
}

pub(crate) async fn eligibility_handler<R>(
    State(service): State<Arc<ReliefApplicationService<R>>>,
    Json(query): Json<EligibilityQuery>,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    let evaluation_date = query.evaluation_date.unwrap_or_else(today);
    match service
        .evaluate(&query.request, &query.balance, evaluation_date)
        .await
    {
        Ok(outcome) => (StatusCode::OK, Json(outcome)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn balance_handler<R>(
    State(service): State<Arc<ReliefApplicationService<R>>>,
    Path(applicant_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    let applicant = ApplicantId(applicant_id);
    match service.current_balance(&applicant) {
        Ok(balance) => {
            let payload = json!({
                "applicant_id": applicant.0,
                "balance": balance,
            });
            (StatusCode::OK, Json(payload)).into_response()
        }
        Err(error) => error_response(error),
    }
}

pub(crate) async fn draft_handler<R>(
    State(service): State<Arc<ReliefApplicationService<R>>>,
    Path(applicant_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    match service.draft(&ApplicantId(applicant_id)) {
        Ok(draft) => (StatusCode::OK, Json(draft)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn draft_edit_handler<R>(
    State(service): State<Arc<ReliefApplicationService<R>>>,
    Path(applicant_id): Path<String>,
    Json(edit): Json<ManualEdit>,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    let patch = DraftPatch {
        source: DraftSource::ManualEdit,
        fields: edit.fields,
    };
    match service.update_draft(&ApplicantId(applicant_id), patch) {
        Ok(draft) => (StatusCode::OK, Json(draft)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn extraction_handler<R>(
    State(service): State<Arc<ReliefApplicationService<R>>>,
    Path(applicant_id): Path<String>,
    Json(call): Json<ToolCall>,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    match service.apply_extraction(&ApplicantId(applicant_id), &call.name, &call.args) {
        Ok(draft) => (StatusCode::OK, Json(draft)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn submit_handler<R>(
    State(service): State<Arc<ReliefApplicationService<R>>>,
    Path(applicant_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    match service.submit(&ApplicantId(applicant_id), today()) {
        Ok(record) => (StatusCode::ACCEPTED, Json(record.status_view())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn decision_handler<R>(
    State(service): State<Arc<ReliefApplicationService<R>>>,
    Path(application_id): Path<String>,
    body: Bytes,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    // An empty body decides as of today; anything else must parse.
    let command = if body.iter().all(u8::is_ascii_whitespace) {
        DecisionCommand::default()
    } else {
        match serde_json::from_slice::<DecisionCommand>(&body) {
            Ok(command) => command,
            Err(err) => {
                let payload = json!({
                    "error": format!("invalid decision command: {err}"),
                });
                return (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response();
            }
        }
    };
    let evaluation_date = command.evaluation_date.unwrap_or_else(today);

    match service
        .decide(&ApplicationId(application_id), evaluation_date)
        .await
    {
        Ok(record) => (StatusCode::OK, Json(record.status_view())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn status_handler<R>(
    State(service): State<Arc<ReliefApplicationService<R>>>,
    Path(application_id): Path<String>,
) -> Response
where
    R: ApplicationRepository + 'static,
{
    match service.get(&ApplicationId(application_id)) {
        Ok(record) => (StatusCode::OK, Json(record.status_view())).into_response(),
        Err(error) => error_response(error),
    }
}
