use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::response::Response;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::Value;

use crate::workflows::relief::classifier::{
    ClassifierAdapter, ClassifierError, ClassifierPayload, ClassifierVerdict,
    EligibilityClassifier,
};
use crate::workflows::relief::domain::{
    AgreementFlags, ApplicantId, ApplicantProfile, ApplicationId, ApplicationRequest,
    Decision, DisasterEvent, GrantBalance, PostalAddress, SubmittedApplication,
};
use crate::workflows::relief::draft::ApplicationDraft;
use crate::workflows::relief::evaluation::{EligibilityEngine, GrantPolicyConfig};
use crate::workflows::relief::repository::{
    ApplicationRecord, ApplicationRepository, RepositoryError,
};
use crate::workflows::relief::{application_router, ReliefApplicationService};

pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
}

pub(super) fn amount(value: i64) -> Decimal {
    Decimal::from(value)
}

pub(super) fn balance(twelve_month: i64, lifetime: i64) -> GrantBalance {
    GrantBalance::new(amount(twelve_month), amount(lifetime))
}

pub(super) fn policy_config() -> GrantPolicyConfig {
    GrantPolicyConfig::default()
}

pub(super) fn engine() -> EligibilityEngine {
    EligibilityEngine::new(policy_config())
}

pub(super) fn applicant() -> ApplicantId {
    ApplicantId("jordan.lee@example.com".to_string())
}

pub(super) fn evaluation_date() -> NaiveDate {
    date(2023, 8, 12)
}

/// Flood request for 2500 from someone employed since 2020.
pub(super) fn request() -> ApplicationRequest {
    ApplicationRequest {
        applicant_id: applicant(),
        employment_start_date: date(2020, 1, 1),
        event: DisasterEvent::Flood,
        requested_amount: amount(2500),
    }
}

pub(super) fn request_for(event: DisasterEvent, requested: i64) -> ApplicationRequest {
    ApplicationRequest {
        event,
        requested_amount: amount(requested),
        ..request()
    }
}

pub(super) fn profile() -> ApplicantProfile {
    ApplicantProfile {
        first_name: "Jordan".to_string(),
        last_name: "Lee".to_string(),
        email: "jordan.lee@example.com".to_string(),
        mobile_number: "555-0142".to_string(),
        primary_address: PostalAddress {
            country: "United States".to_string(),
            street1: "12 Levee Road".to_string(),
            street2: None,
            city: "Cedar Rapids".to_string(),
            state: "IA".to_string(),
            zip: "52401".to_string(),
        },
        employment_start_date: Some(date(2020, 1, 1)),
        eligibility_type: Some("Employee".to_string()),
        household_income: Some(amount(48_000)),
        household_size: Some(3),
        homeowner: Some(true),
        preferred_language: Some("English".to_string()),
    }
}

pub(super) fn submitted(requested: i64) -> SubmittedApplication {
    SubmittedApplication {
        request: request_for(DisasterEvent::Flood, requested),
        profile: profile(),
        agreements: AgreementFlags::default(),
    }
}

pub(super) fn build_service() -> (
    ReliefApplicationService<MemoryRepository>,
    Arc<MemoryRepository>,
) {
    let repository = Arc::new(MemoryRepository::default());
    let service = ReliefApplicationService::new(repository.clone(), policy_config());
    (service, repository)
}

pub(super) fn build_model_service(
    classifier: ScriptedClassifier,
) -> (
    ReliefApplicationService<MemoryRepository>,
    Arc<MemoryRepository>,
) {
    let (service, repository) = build_service();
    let service = service.with_classifier(ClassifierAdapter::new(Arc::new(classifier)));
    (service, repository)
}

#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    pub(super) records: Arc<Mutex<Vec<ApplicationRecord>>>,
    pub(super) drafts: Arc<Mutex<HashMap<ApplicantId, ApplicationDraft>>>,
}

impl ApplicationRepository for MemoryRepository {
    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        if guard
            .iter()
            .any(|existing| existing.application_id == record.application_id)
        {
            return Err(RepositoryError::Conflict);
        }
        guard.push(record.clone());
        Ok(record)
    }

    fn update(&self, record: ApplicationRecord) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("repository mutex poisoned");
        let slot = guard
            .iter_mut()
            .find(|existing| existing.application_id == record.application_id)
            .ok_or(RepositoryError::NotFound)?;
        *slot = record;
        Ok(())
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard
            .iter()
            .find(|record| &record.application_id == id)
            .cloned())
    }

    fn history(&self, applicant: &ApplicantId) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        let guard = self.records.lock().expect("repository mutex poisoned");
        Ok(guard
            .iter()
            .filter(|record| record.applicant_id() == applicant)
            .cloned()
            .collect())
    }

    fn save_draft(&self, draft: ApplicationDraft) -> Result<(), RepositoryError> {
        let mut guard = self.drafts.lock().expect("draft mutex poisoned");
        guard.insert(draft.applicant_id.clone(), draft);
        Ok(())
    }

    fn fetch_draft(
        &self,
        applicant: &ApplicantId,
    ) -> Result<Option<ApplicationDraft>, RepositoryError> {
        let guard = self.drafts.lock().expect("draft mutex poisoned");
        Ok(guard.get(applicant).cloned())
    }

    fn discard_draft(&self, applicant: &ApplicantId) -> Result<(), RepositoryError> {
        let mut guard = self.drafts.lock().expect("draft mutex poisoned");
        guard.remove(applicant);
        Ok(())
    }
}

pub(super) struct UnavailableRepository;

impl ApplicationRepository for UnavailableRepository {
    fn insert(&self, _record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn update(&self, _record: ApplicationRecord) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch(&self, _id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn history(&self, _applicant: &ApplicantId) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn save_draft(&self, _draft: ApplicationDraft) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn fetch_draft(
        &self,
        _applicant: &ApplicantId,
    ) -> Result<Option<ApplicationDraft>, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }

    fn discard_draft(&self, _applicant: &ApplicantId) -> Result<(), RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

/// What a [`ScriptedClassifier`] does when called.
#[derive(Debug, Clone)]
pub(super) enum Script {
    Verdict(ClassifierVerdict),
    Timeout,
    Status(u16),
    Malformed,
    /// Never completes.
    Hang,
}

/// Classifier double that follows a fixed script and records the payloads it saw.
#[derive(Clone)]
pub(super) struct ScriptedClassifier {
    script: Script,
    pub(super) calls: Arc<Mutex<Vec<ClassifierPayload>>>,
}

impl ScriptedClassifier {
    pub(super) fn new(script: Script) -> Self {
        Self {
            script,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub(super) fn verdict(decision: Decision, twelve_month: i64, lifetime: i64) -> Self {
        Self::new(Script::Verdict(ClassifierVerdict {
            decision,
            new_twelve_month_remaining: amount(twelve_month),
            new_lifetime_remaining: amount(lifetime),
        }))
    }

    pub(super) fn calls(&self) -> Vec<ClassifierPayload> {
        self.calls.lock().expect("call log poisoned").clone()
    }
}

#[async_trait]
impl EligibilityClassifier for ScriptedClassifier {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn classify(
        &self,
        payload: &ClassifierPayload,
    ) -> Result<ClassifierVerdict, ClassifierError> {
        self.calls
            .lock()
            .expect("call log poisoned")
            .push(payload.clone());

        match &self.script {
            Script::Verdict(verdict) => Ok(*verdict),
            Script::Timeout => Err(ClassifierError::Timeout),
            Script::Status(status) => Err(ClassifierError::Status {
                status: *status,
                body: "upstream error".to_string(),
            }),
            Script::Malformed => ClassifierVerdict::parse("I think this should be awarded."),
            Script::Hang => {
                std::future::pending::<()>().await;
                Err(ClassifierError::Timeout)
            }
        }
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}

pub(super) fn application_router_with_service(
    service: ReliefApplicationService<MemoryRepository>,
) -> axum::Router {
    application_router(Arc::new(service))
}
