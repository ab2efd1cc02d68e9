//! External classifier boundary.
//!
//! A classifier receives the application facts and prior balance and answers with a decision
//! and new balances. Its answer is never trusted directly: [`ClassifierAdapter`] makes exactly
//! one attempt, fails closed on any error, and runs successful answers through the same
//! decision gate as the in-process rules.

mod gemini;
mod prompt;

pub use gemini::GeminiClassifier;
pub use prompt::{build_prompt, response_schema, ClassifierPayload};

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::domain::{ApplicationRequest, Decision, EligibilityDecision, GrantBalance};
use super::evaluation::{DecisionSource, DeclineReason, EvaluationOutcome};

/// Failure talking to, or understanding, the classifier.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("classifier api key is not configured")]
    MissingApiKey,
    #[error("classifier unavailable: {0}")]
    Unavailable(String),
    #[error("classifier request timed out")]
    Timeout,
    #[error("classifier returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("classifier response malformed: {0}")]
    Malformed(String),
}

impl ClassifierError {
    pub fn is_malformed(&self) -> bool {
        matches!(self, ClassifierError::Malformed(_))
    }

    fn decline_reason(&self) -> DeclineReason {
        if self.is_malformed() {
            DeclineReason::ClassifierMalformedResponse {
                detail: self.to_string(),
            }
        } else {
            DeclineReason::ClassifierUnavailable {
                detail: self.to_string(),
            }
        }
    }
}

/// Structured answer the classifier must return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifierVerdict {
    pub decision: Decision,
    #[serde(with = "rust_decimal::serde::float")]
    pub new_twelve_month_remaining: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub new_lifetime_remaining: Decimal,
}

impl ClassifierVerdict {
    /// Parse the model's text output, tolerating a surrounding markdown code fence.
    pub fn parse(raw: &str) -> Result<Self, ClassifierError> {
        let trimmed = raw.trim();
        let body = trimmed
            .strip_prefix("```json")
            .or_else(|| trimmed.strip_prefix("```"))
            .and_then(|inner| inner.trim_end().strip_suffix("```"))
            .unwrap_or(trimmed)
            .trim();

        serde_json::from_str(body).map_err(|err| ClassifierError::Malformed(err.to_string()))
    }

    fn into_candidate(self, decisioned_date: NaiveDate) -> EligibilityDecision {
        EligibilityDecision {
            decision: self.decision,
            decisioned_date,
            updated_balance: GrantBalance::new(
                self.new_twelve_month_remaining,
                self.new_lifetime_remaining,
            ),
        }
    }
}

/// Anything able to classify an application payload.
#[async_trait]
pub trait EligibilityClassifier: Send + Sync {
    fn name(&self) -> &str;

    async fn classify(&self, payload: &ClassifierPayload)
        -> Result<ClassifierVerdict, ClassifierError>;
}

/// Model-assisted evaluator: one classifier attempt, gated, failing closed.
#[derive(Clone)]
pub struct ClassifierAdapter {
    classifier: Arc<dyn EligibilityClassifier>,
}

impl ClassifierAdapter {
    pub fn new(classifier: Arc<dyn EligibilityClassifier>) -> Self {
        Self { classifier }
    }

    pub fn classifier_name(&self) -> &str {
        self.classifier.name()
    }

    pub async fn evaluate(
        &self,
        request: &ApplicationRequest,
        balance: &GrantBalance,
        evaluation_date: NaiveDate,
    ) -> EvaluationOutcome {
        let payload = ClassifierPayload::new(request, balance, evaluation_date);

        match self.classifier.classify(&payload).await {
            Ok(verdict) => {
                info!(
                    applicant = %request.applicant_id,
                    classifier = self.classifier.name(),
                    decision = verdict.decision.label(),
                    "classifier returned verdict"
                );
                EvaluationOutcome::gated(
                    request,
                    balance,
                    verdict.into_candidate(evaluation_date),
                    DecisionSource::ModelAssisted,
                    Vec::new(),
                    None,
                )
            }
            Err(err) => {
                warn!(
                    applicant = %request.applicant_id,
                    classifier = self.classifier.name(),
                    error = %err,
                    "classifier failed; declining with balance unchanged"
                );
                EvaluationOutcome::fail_closed(
                    balance,
                    evaluation_date,
                    DecisionSource::ModelAssisted,
                    err.decline_reason(),
                )
            }
        }
    }
}

impl std::fmt::Debug for ClassifierAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassifierAdapter")
            .field("classifier", &self.classifier.name())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verdict_parses_plain_and_fenced_json() {
        let plain = r#"{"decision":"Awarded","newTwelveMonthRemaining":5000,"newLifetimeRemaining":45000.5}"#;
        let verdict = ClassifierVerdict::parse(plain).expect("plain json parses");
        assert_eq!(verdict.decision, Decision::Awarded);
        assert_eq!(verdict.new_twelve_month_remaining, Decimal::from(5000));
        assert_eq!(verdict.new_lifetime_remaining, Decimal::new(450005, 1));

        let fenced = format!("```json\n{plain}\n```");
        assert_eq!(ClassifierVerdict::parse(&fenced).expect("fenced parses"), verdict);
    }

    #[test]
    fn verdict_rejects_unknown_decisions() {
        let raw = r#"{"decision":"Review","newTwelveMonthRemaining":1,"newLifetimeRemaining":1}"#;
        let err = ClassifierVerdict::parse(raw).expect_err("review is not a decision");
        assert!(err.is_malformed());
    }

    #[test]
    fn verdict_rejects_missing_balances() {
        let err = ClassifierVerdict::parse(r#"{"decision":"Declined"}"#)
            .expect_err("balances are required");
        assert!(err.is_malformed());
    }
}
