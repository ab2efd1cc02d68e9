use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use relief_grant::config::{AppConfig, DecisionMode};
use relief_grant::error::AppError;
use relief_grant::workflows::relief::intake;
use relief_grant::workflows::relief::{
    ApplicantId, ApplicationDraft, ApplicationId, ApplicationRecord, ApplicationRepository,
    ClassifierAdapter, DisasterEvent, GeminiClassifier, GrantPolicyConfig, ReliefApplicationService,
    RepositoryError,
};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
    pub(crate) policy: Arc<GrantPolicyConfig>,
}

#[derive(Default)]
struct Store {
    records: Vec<ApplicationRecord>,
    index: HashMap<ApplicationId, usize>,
    drafts: HashMap<ApplicantId, ApplicationDraft>,
}

/// Process-local repository; records are kept in submission order.
#[derive(Default, Clone)]
pub(crate) struct InMemoryApplicationRepository {
    store: Arc<Mutex<Store>>,
}

impl InMemoryApplicationRepository {
    fn lock(&self) -> Result<MutexGuard<'_, Store>, RepositoryError> {
        self.store
            .lock()
            .map_err(|_| RepositoryError::Unavailable("repository mutex poisoned".to_string()))
    }
}

impl ApplicationRepository for InMemoryApplicationRepository {
    fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
        let mut store = self.lock()?;
        if store.index.contains_key(&record.application_id) {
            return Err(RepositoryError::Conflict);
        }
        let position = store.records.len();
        store.index.insert(record.application_id.clone(), position);
        store.records.push(record.clone());
        Ok(record)
    }

    fn update(&self, record: ApplicationRecord) -> Result<(), RepositoryError> {
        let mut store = self.lock()?;
        let position = *store
            .index
            .get(&record.application_id)
            .ok_or(RepositoryError::NotFound)?;
        store.records[position] = record;
        Ok(())
    }

    fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
        let store = self.lock()?;
        Ok(store
            .index
            .get(id)
            .and_then(|position| store.records.get(*position))
            .cloned())
    }

    fn history(&self, applicant: &ApplicantId) -> Result<Vec<ApplicationRecord>, RepositoryError> {
        let store = self.lock()?;
        Ok(store
            .records
            .iter()
            .filter(|record| record.applicant_id() == applicant)
            .cloned()
            .collect())
    }

    fn save_draft(&self, draft: ApplicationDraft) -> Result<(), RepositoryError> {
        let mut store = self.lock()?;
        store.drafts.insert(draft.applicant_id.clone(), draft);
        Ok(())
    }

    fn fetch_draft(
        &self,
        applicant: &ApplicantId,
    ) -> Result<Option<ApplicationDraft>, RepositoryError> {
        let store = self.lock()?;
        Ok(store.drafts.get(applicant).cloned())
    }

    fn discard_draft(&self, applicant: &ApplicantId) -> Result<(), RepositoryError> {
        let mut store = self.lock()?;
        store.drafts.remove(applicant);
        Ok(())
    }
}

pub(crate) type ApplicationService = ReliefApplicationService<InMemoryApplicationRepository>;

/// Build the service for the configured decision mode.
pub(crate) fn build_service(
    config: &AppConfig,
    repository: Arc<InMemoryApplicationRepository>,
) -> Result<ApplicationService, AppError> {
    let service = ReliefApplicationService::new(repository, config.policy.clone());

    let service = match config.decision_mode {
        DecisionMode::Rules => service,
        DecisionMode::Model => {
            let gemini = GeminiClassifier::new(&config.classifier, config.policy.clone())?;
            info!(model = %config.classifier.model, "using model-assisted decisions");
            service.with_classifier(ClassifierAdapter::new(Arc::new(gemini)))
        }
    };

    Ok(service)
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

pub(crate) fn parse_amount(raw: &str) -> Result<Decimal, String> {
    intake::parse_amount(raw).map_err(|err| format!("failed to parse '{raw}' as an amount ({err})"))
}

pub(crate) fn parse_event(raw: &str) -> Result<DisasterEvent, String> {
    DisasterEvent::from_str(raw).map_err(|err| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use relief_grant::workflows::relief::{
        AgreementFlags, ApplicantProfile, ApplicationRequest, ApplicationStatus,
        SubmittedApplication,
    };

    fn record(id: &str, applicant: &str) -> ApplicationRecord {
        let date = NaiveDate::from_ymd_opt(2023, 8, 1).expect("valid");
        ApplicationRecord {
            application_id: ApplicationId(id.to_string()),
            submitted_on: date,
            application: SubmittedApplication {
                request: ApplicationRequest {
                    applicant_id: ApplicantId(applicant.to_string()),
                    employment_start_date: date,
                    event: DisasterEvent::Flood,
                    requested_amount: Decimal::from(100),
                },
                profile: ApplicantProfile::default(),
                agreements: AgreementFlags::default(),
            },
            status: ApplicationStatus::Submitted,
            outcome: None,
        }
    }

    #[test]
    fn repository_keeps_history_in_submission_order() {
        let repository = InMemoryApplicationRepository::default();
        repository.insert(record("APP-1", "a@example.com")).expect("insert");
        repository.insert(record("APP-2", "b@example.com")).expect("insert");
        repository.insert(record("APP-3", "a@example.com")).expect("insert");

        let ids: Vec<String> = repository
            .history(&ApplicantId("a@example.com".to_string()))
            .expect("history")
            .into_iter()
            .map(|record| record.application_id.0)
            .collect();
        assert_eq!(ids, vec!["APP-1", "APP-3"]);

        assert!(matches!(
            repository.insert(record("APP-1", "a@example.com")),
            Err(RepositoryError::Conflict)
        ));
        assert!(matches!(
            repository.update(record("APP-9", "a@example.com")),
            Err(RepositoryError::NotFound)
        ));
    }

    #[test]
    fn amounts_accept_currency_formatting() {
        assert_eq!(parse_amount("$2,500.50"), Ok(Decimal::new(250_050, 2)));
        assert!(parse_amount("lots").is_err());
        assert!(parse_date("08/12/2023").is_err());
        assert_eq!(parse_event(" tornado "), Ok(DisasterEvent::Tornado));
        assert!(parse_event("Earthquake").is_err());
    }
}
