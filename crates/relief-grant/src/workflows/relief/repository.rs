use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::domain::{
    ApplicantId, ApplicationId, ApplicationStatus, EligibilityDecision, GrantBalance,
    SubmittedApplication,
};
use super::draft::ApplicationDraft;
use super::evaluation::{DecisionSource, EvaluationOutcome};

/// Repository record pairing a submitted application with its decision, once made.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub application_id: ApplicationId,
    pub submitted_on: NaiveDate,
    pub application: SubmittedApplication,
    pub status: ApplicationStatus,
    pub outcome: Option<EvaluationOutcome>,
}

impl ApplicationRecord {
    pub fn applicant_id(&self) -> &ApplicantId {
        &self.application.request.applicant_id
    }

    pub fn decision(&self) -> Option<&EligibilityDecision> {
        self.outcome.as_ref().map(|outcome| &outcome.decision)
    }

    pub fn decision_rationale(&self) -> String {
        match &self.outcome {
            Some(outcome) => outcome.summary(),
            None => "pending decision".to_string(),
        }
    }

    pub fn status_view(&self) -> ApplicationStatusView {
        let decision = self.decision();
        ApplicationStatusView {
            application_id: self.application_id.clone(),
            applicant_id: self.applicant_id().clone(),
            status: self.status.label(),
            decision_rationale: self.decision_rationale(),
            decisioned_date: decision.map(EligibilityDecision::decisioned_date_label),
            updated_balance: decision.map(|decision| decision.updated_balance),
            source: self.outcome.as_ref().map(|outcome| outcome.source),
        }
    }
}

/// Storage abstraction so the service module can be exercised in isolation.
pub trait ApplicationRepository: Send + Sync {
    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError>;
    fn update(&self, record: ApplicationRecord) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError>;
    /// Every record for `applicant`, oldest submission first.
    fn history(&self, applicant: &ApplicantId) -> Result<Vec<ApplicationRecord>, RepositoryError>;
    fn save_draft(&self, draft: ApplicationDraft) -> Result<(), RepositoryError>;
    fn fetch_draft(
        &self,
        applicant: &ApplicantId,
    ) -> Result<Option<ApplicationDraft>, RepositoryError>;
    fn discard_draft(&self, applicant: &ApplicantId) -> Result<(), RepositoryError>;
}

/// Error enumeration for repository failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Sanitized representation of an application's exposed status.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationStatusView {
    pub application_id: ApplicationId,
    pub applicant_id: ApplicantId,
    pub status: &'static str,
    pub decision_rationale: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decisioned_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_balance: Option<GrantBalance>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<DecisionSource>,
}
