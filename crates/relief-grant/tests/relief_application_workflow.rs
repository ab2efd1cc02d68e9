//! End-to-end scenarios for relief applications, exercised through the public service facade and
//! HTTP router.

mod common {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use relief_grant::workflows::relief::{
        ApplicantId, ApplicationDraft, ApplicationId, ApplicationRecord, ApplicationRepository,
        GrantBalance, GrantPolicyConfig, ReliefApplicationService, RepositoryError,
    };

    pub(super) fn date(year: i32, month: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(year, month, day).expect("valid date")
    }

    pub(super) fn balance(twelve_month: i64, lifetime: i64) -> GrantBalance {
        GrantBalance::new(Decimal::from(twelve_month), Decimal::from(lifetime))
    }

    #[derive(Default, Clone)]
    pub(super) struct MemoryRepository {
        records: Arc<Mutex<Vec<ApplicationRecord>>>,
        drafts: Arc<Mutex<HashMap<ApplicantId, ApplicationDraft>>>,
    }

    impl ApplicationRepository for MemoryRepository {
        fn insert(&self, record: ApplicationRecord) -> Result<ApplicationRecord, RepositoryError> {
            let mut guard = self.records.lock().expect("lock");
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
            let mut guard = self.records.lock().expect("lock");
            match guard
                .iter_mut()
                .find(|existing| existing.application_id == record.application_id)
            {
                Some(slot) => {
                    *slot = record;
                    Ok(())
                }
                None => Err(RepositoryError::NotFound),
            }
        }

        fn fetch(&self, id: &ApplicationId) -> Result<Option<ApplicationRecord>, RepositoryError> {
            let guard = self.records.lock().expect("lock");
            Ok(guard.iter().find(|record| &record.application_id == id).cloned())
        }

        fn history(
            &self,
            applicant: &ApplicantId,
        ) -> Result<Vec<ApplicationRecord>, RepositoryError> {
            let guard = self.records.lock().expect("lock");
            Ok(guard
                .iter()
                .filter(|record| record.applicant_id() == applicant)
                .cloned()
                .collect())
        }

        fn save_draft(&self, draft: ApplicationDraft) -> Result<(), RepositoryError> {
            self.drafts
                .lock()
                .expect("lock")
                .insert(draft.applicant_id.clone(), draft);
            Ok(())
        }

        fn fetch_draft(
            &self,
            applicant: &ApplicantId,
        ) -> Result<Option<ApplicationDraft>, RepositoryError> {
            Ok(self.drafts.lock().expect("lock").get(applicant).cloned())
        }

        fn discard_draft(&self, applicant: &ApplicantId) -> Result<(), RepositoryError> {
            self.drafts.lock().expect("lock").remove(applicant);
            Ok(())
        }
    }

    pub(super) fn build_service() -> (
        ReliefApplicationService<MemoryRepository>,
        Arc<MemoryRepository>,
    ) {
        let repository = Arc::new(MemoryRepository::default());
        let service = ReliefApplicationService::new(repository.clone(), GrantPolicyConfig::default());
        (service, repository)
    }
}

mod lifecycle {
    use super::common::*;
    use relief_grant::workflows::relief::{
        ApplicantId, ApplicationServiceError, ApplicationStatus, DraftPatch,
    };
    use serde_json::json;

    fn fill_draft(
        service: &relief_grant::workflows::relief::ReliefApplicationService<MemoryRepository>,
        applicant: &ApplicantId,
        event: &str,
        amount: u32,
    ) {
        let profile = DraftPatch::from_tool_call(
            "updateUserProfile",
            &json!({
                "firstName": "Avery",
                "lastName": "Moss",
                "employmentStartDate": "2019-06-01",
                "primaryAddress": {"city": "Davenport", "state": "IA", "zip": "52801"}
            }),
        )
        .expect("profile tool call");
        service.update_draft(applicant, profile).expect("profile merged");
        service
            .apply_extraction(
                applicant,
                "startOrUpdateApplicationDraft",
                &json!({"event": event, "requestedAmount": amount}),
            )
            .expect("draft merged");
    }

    #[tokio::test]
    async fn applicant_spends_down_their_twelve_month_allowance() {
        let (service, _) = build_service();
        let applicant = ApplicantId("avery.moss@example.com".to_string());

        fill_draft(&service, &applicant, "Flood", 6000);
        let first = service
            .submit(&applicant, date(2023, 8, 1))
            .expect("first submission");
        let first = service
            .decide(&first.application_id, date(2023, 8, 2))
            .await
            .expect("first decision");
        assert_eq!(first.status, ApplicationStatus::Awarded);

        fill_draft(&service, &applicant, "Tornado", 5000);
        let second = service
            .submit(&applicant, date(2023, 9, 1))
            .expect("second submission");
        assert_eq!(second.application.profile.primary_address.city, "Davenport");
        let second = service
            .decide(&second.application_id, date(2023, 9, 2))
            .await
            .expect("second decision");
        assert_eq!(second.status, ApplicationStatus::Declined);

        fill_draft(&service, &applicant, "Tornado", 4000);
        let third = service
            .submit(&applicant, date(2023, 10, 1))
            .expect("third submission");
        let third = service
            .decide(&third.application_id, date(2023, 10, 2))
            .await
            .expect("third decision");
        assert_eq!(third.status, ApplicationStatus::Awarded);

        assert_eq!(
            service.current_balance(&applicant).expect("balance"),
            balance(0, 40_000)
        );
        assert_eq!(service.history(&applicant).expect("history").len(), 3);
    }

    #[tokio::test]
    async fn applicants_have_independent_balances() {
        let (service, _) = build_service();
        let avery = ApplicantId("avery.moss@example.com".to_string());
        let blake = ApplicantId("blake.ortiz@example.com".to_string());

        fill_draft(&service, &avery, "Flood", 10_000);
        let record = service.submit(&avery, date(2023, 8, 1)).expect("submit");
        service
            .decide(&record.application_id, date(2023, 8, 1))
            .await
            .expect("decide");

        assert_eq!(
            service.current_balance(&avery).expect("balance"),
            balance(0, 40_000)
        );
        assert_eq!(
            service.current_balance(&blake).expect("balance"),
            balance(10_000, 50_000)
        );
    }

    #[tokio::test]
    async fn wildfire_requests_are_declined_and_cannot_be_redecided() {
        let (service, _) = build_service();
        let applicant = ApplicantId("avery.moss@example.com".to_string());

        fill_draft(&service, &applicant, "Wildfire", 1500);
        let record = service.submit(&applicant, date(2023, 8, 1)).expect("submit");
        let decided = service
            .decide(&record.application_id, date(2023, 8, 1))
            .await
            .expect("decide");
        assert_eq!(decided.status, ApplicationStatus::Declined);
        assert!(decided.decision_rationale().contains("Wildfire"));

        assert!(matches!(
            service.decide(&record.application_id, date(2023, 8, 2)).await,
            Err(ApplicationServiceError::AlreadyDecided { .. })
        ));
        assert_eq!(
            service.current_balance(&applicant).expect("balance"),
            balance(10_000, 50_000)
        );
    }
}

mod routing {
    use super::common::*;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use relief_grant::workflows::relief::application_router;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn read_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), 64 * 1024)
            .await
            .expect("body");
        serde_json::from_slice(&bytes).expect("json")
    }

    #[tokio::test]
    async fn eligibility_examples_round_trip_over_http() {
        let (service, _) = build_service();
        let router = application_router(Arc::new(service));

        let cases = [
            ("Flood", 7500, "Awarded", 5000.0),
            ("Flood", 2000, "Declined", 2000.0),
            ("Wildfire", 7500, "Declined", 7500.0),
        ];

        for (event, twelve_month, expected, remaining) in cases {
            let body = json!({
                "request": {
                    "applicant_id": "user@example.com",
                    "employment_start_date": "2020-01-01",
                    "event": event,
                    "requested_amount": 2500
                },
                "balance": {"twelve_month_remaining": twelve_month, "lifetime_remaining": 47500},
                "evaluation_date": "2023-08-12"
            });
            let response = router
                .clone()
                .oneshot(
                    Request::post("/api/v1/relief/eligibility")
                        .header(header::CONTENT_TYPE, "application/json")
                        .body(Body::from(body.to_string()))
                        .expect("request"),
                )
                .await
                .expect("route executes");

            assert_eq!(response.status(), StatusCode::OK);
            let payload = read_json(response).await;
            assert_eq!(payload["decision"]["decision"], expected, "{event}/{twelve_month}");
            assert_eq!(
                payload["decision"]["updated_balance"]["twelve_month_remaining"].as_f64(),
                Some(remaining)
            );
        }
    }

    #[tokio::test]
    async fn unknown_application_returns_not_found() {
        let (service, _) = build_service();
        let router = application_router(Arc::new(service));

        let response = router
            .oneshot(
                Request::get("/api/v1/relief/applications/APP-404404")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("route executes");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
