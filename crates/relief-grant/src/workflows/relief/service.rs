use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::NaiveDate;
use serde_json::Value;
use tracing::info;

use super::classifier::ClassifierAdapter;
use super::domain::{
    ApplicantId, ApplicationId, ApplicationRequest, ApplicationStatus, GrantBalance,
    SubmittedApplication,
};
use super::draft::{ApplicationDraft, DraftError, DraftPatch};
use super::evaluation::{
    DecisionSource, EligibilityEngine, EvaluationOutcome, GrantPolicyConfig,
};
use super::intake::{validate_request, RequestValidationError};
use super::repository::{ApplicationRecord, ApplicationRepository, RepositoryError};

/// Service composing drafts, the repository, and the configured decision strategy.
pub struct ReliefApplicationService<R> {
    repository: Arc<R>,
    engine: Arc<EligibilityEngine>,
    classifier: Option<ClassifierAdapter>,
    applicant_locks: LockTable,
}

static APPLICATION_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_application_id() -> ApplicationId {
    let id = APPLICATION_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    ApplicationId(format!("APP-{id:06}"))
}

impl<R> ReliefApplicationService<R>
where
    R: ApplicationRepository + 'static,
{
    /// Rule-based service.
    pub fn new(repository: Arc<R>, config: GrantPolicyConfig) -> Self {
        Self {
            repository,
            engine: Arc::new(EligibilityEngine::new(config)),
            classifier: None,
            applicant_locks: Mutex::new(HashMap::new()),
        }
    }

    /// Delegate decisions to `classifier` instead of the in-process rules.
    pub fn with_classifier(mut self, classifier: ClassifierAdapter) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn decision_source(&self) -> DecisionSource {
        match self.classifier {
            Some(_) => DecisionSource::ModelAssisted,
            None => DecisionSource::RuleBased,
        }
    }

    pub fn policy(&self) -> &GrantPolicyConfig {
        self.engine.config()
    }

    /// Current draft for `applicant`, seeded from their last profile when none is stored.
    pub fn draft(&self, applicant: &ApplicantId) -> Result<ApplicationDraft, ApplicationServiceError> {
        if let Some(draft) = self.repository.fetch_draft(applicant)? {
            return Ok(draft);
        }

        let history = self.repository.history(applicant)?;
        let draft = match history.last() {
            Some(record) => ApplicationDraft::seeded(applicant.clone(), &record.application.profile),
            None => ApplicationDraft::new(applicant.clone()),
        };
        Ok(draft)
    }

    pub fn update_draft(
        &self,
        applicant: &ApplicantId,
        patch: DraftPatch,
    ) -> Result<ApplicationDraft, ApplicationServiceError> {
        let mut draft = self.draft(applicant)?;
        let written = draft.merge(patch)?;
        self.repository.save_draft(draft.clone())?;
        info!(applicant = %applicant, fields = written, "draft updated");
        Ok(draft)
    }

    /// Merge an assistant tool call (`updateUserProfile` / `startOrUpdateApplicationDraft`).
    pub fn apply_extraction(
        &self,
        applicant: &ApplicantId,
        tool: &str,
        args: &Value,
    ) -> Result<ApplicationDraft, ApplicationServiceError> {
        let patch = DraftPatch::from_tool_call(tool, args)?;
        self.update_draft(applicant, patch)
    }

    /// Freeze the applicant's draft into a new submitted application and discard the draft.
    pub fn submit(
        &self,
        applicant: &ApplicantId,
        submitted_on: NaiveDate,
    ) -> Result<ApplicationRecord, ApplicationServiceError> {
        let draft = self.draft(applicant)?;
        let application = draft.submit().map_err(|err| match err {
            DraftError::Invalid(invalid) => ApplicationServiceError::Invalid(invalid),
            other => ApplicationServiceError::Draft(other),
        })?;

        let record = self.submit_application(application, submitted_on)?;
        self.repository.discard_draft(applicant)?;
        Ok(record)
    }

    /// Store an already-assembled application as `Submitted`.
    pub fn submit_application(
        &self,
        application: SubmittedApplication,
        submitted_on: NaiveDate,
    ) -> Result<ApplicationRecord, ApplicationServiceError> {
        validate_request(&application.request)?;

        let record = ApplicationRecord {
            application_id: next_application_id(),
            submitted_on,
            application,
            status: ApplicationStatus::Submitted,
            outcome: None,
        };

        let stored = self.repository.insert(record)?;
        info!(
            application = %stored.application_id,
            applicant = %stored.applicant_id(),
            "application submitted"
        );
        Ok(stored)
    }

    /// Evaluate a request against an explicit balance without touching stored state.
    pub async fn evaluate(
        &self,
        request: &ApplicationRequest,
        balance: &GrantBalance,
        evaluation_date: NaiveDate,
    ) -> Result<EvaluationOutcome, ApplicationServiceError> {
        validate_request(request)?;

        let outcome = match &self.classifier {
            Some(classifier) => classifier.evaluate(request, balance, evaluation_date).await,
            None => self.engine.evaluate(request, balance, evaluation_date),
        };
        Ok(outcome)
    }

    /// Decide a submitted application against the applicant's current balance.
    ///
    /// Decisions for the same applicant run one at a time. Nothing is written until the
    /// decision is complete, so a cancelled call leaves the balance untouched.
    pub async fn decide(
        &self,
        application_id: &ApplicationId,
        evaluation_date: NaiveDate,
    ) -> Result<ApplicationRecord, ApplicationServiceError> {
        let applicant = self.get(application_id)?.applicant_id().clone();

        let _turn = self.applicant_turn(&applicant).await;

        let mut record = self.get(application_id)?;
        if record.status.is_terminal() {
            return Err(ApplicationServiceError::AlreadyDecided {
                application_id: application_id.clone(),
                status: record.status,
            });
        }

        let balance = self.current_balance(&applicant)?;
        let outcome = self
            .evaluate(&record.application.request, &balance, evaluation_date)
            .await?;

        record.status = outcome.decision.decision.into();
        record.outcome = Some(outcome);
        self.repository.update(record.clone())?;

        info!(
            application = %record.application_id,
            applicant = %applicant,
            decision = record.status.label(),
            source = record.outcome.as_ref().map(|outcome| outcome.source.label()),
            "application decisioned"
        );
        Ok(record)
    }

    /// Balance left after the applicant's most recent decision.
    pub fn current_balance(
        &self,
        applicant: &ApplicantId,
    ) -> Result<GrantBalance, ApplicationServiceError> {
        let history = self.repository.history(applicant)?;

        // Balances never grow, so the latest one is the componentwise minimum.
        let balance = history
            .iter()
            .filter_map(ApplicationRecord::decision)
            .map(|decision| decision.updated_balance)
            .fold(self.engine.config().initial_balance(), |lowest, balance| {
                GrantBalance::new(
                    lowest.twelve_month_remaining.min(balance.twelve_month_remaining),
                    lowest.lifetime_remaining.min(balance.lifetime_remaining),
                )
            });
        Ok(balance)
    }

    /// Fetch an application and current status for API responses.
    pub fn get(
        &self,
        application_id: &ApplicationId,
    ) -> Result<ApplicationRecord, ApplicationServiceError> {
        let record = self
            .repository
            .fetch(application_id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(record)
    }

    pub fn history(
        &self,
        applicant: &ApplicantId,
    ) -> Result<Vec<ApplicationRecord>, ApplicationServiceError> {
        Ok(self.repository.history(applicant)?)
    }

    async fn applicant_turn(&self, applicant: &ApplicantId) -> ApplicantTurn<'_> {
        let lock = {
            let mut locks = lock_table(&self.applicant_locks);
            locks.entry(applicant.clone()).or_default().clone()
        };
        ApplicantTurn {
            locks: &self.applicant_locks,
            applicant: applicant.clone(),
            guard: Some(lock.lock_owned().await),
        }
    }

    #[cfg(test)]
    pub(crate) fn tracked_applicants(&self) -> usize {
        lock_table(&self.applicant_locks).len()
    }
}

type LockMap = HashMap<ApplicantId, Arc<tokio::sync::Mutex<()>>>;
type LockTable = Mutex<LockMap>;

fn lock_table(locks: &LockTable) -> MutexGuard<'_, LockMap> {
    locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Exclusive decision turn for one applicant; the table entry is dropped with the last holder.
struct ApplicantTurn<'a> {
    locks: &'a LockTable,
    applicant: ApplicantId,
    guard: Option<tokio::sync::OwnedMutexGuard<()>>,
}

impl Drop for ApplicantTurn<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut locks = lock_table(self.locks);
        let idle = locks
            .get(&self.applicant)
            .is_some_and(|lock| Arc::strong_count(lock) == 1);
        if idle {
            locks.remove(&self.applicant);
        }
    }
}

/// Error raised by the application service.
#[derive(Debug, thiserror::Error)]
pub enum ApplicationServiceError {
    #[error(transparent)]
    Invalid(#[from] RequestValidationError),
    #[error(transparent)]
    Draft(#[from] DraftError),
    #[error("application {application_id} is already {}", status.label())]
    AlreadyDecided {
        application_id: ApplicationId,
        status: ApplicationStatus,
    },
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}
