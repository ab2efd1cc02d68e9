mod config;
mod guard;
mod policy;
mod rules;

pub use config::GrantPolicyConfig;
pub use guard::{enforce_invariants, PolicyViolation};
pub use policy::DeclineReason;
pub use rules::{PolicyRule, RuleFinding};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::domain::{ApplicationRequest, Decision, EligibilityDecision, GrantBalance};
use policy::decide_outcome;

/// Which evaluator produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    RuleBased,
    ModelAssisted,
}

impl DecisionSource {
    pub const fn label(self) -> &'static str {
        match self {
            DecisionSource::RuleBased => "rule_based",
            DecisionSource::ModelAssisted => "model_assisted",
        }
    }
}

/// Stateless evaluator that applies the grant policy to a request and balance.
///
/// Evaluation never reads the wall clock: callers pass the evaluation date.
#[derive(Debug, Clone)]
pub struct EligibilityEngine {
    config: GrantPolicyConfig,
}

impl EligibilityEngine {
    pub fn new(config: GrantPolicyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &GrantPolicyConfig {
        &self.config
    }

    /// The decision alone; identical inputs always give identical output.
    pub fn decide(
        &self,
        request: &ApplicationRequest,
        balance: &GrantBalance,
        evaluation_date: NaiveDate,
    ) -> EligibilityDecision {
        self.evaluate(request, balance, evaluation_date).decision
    }

    /// Decision plus the per-rule audit trail.
    pub fn evaluate(
        &self,
        request: &ApplicationRequest,
        balance: &GrantBalance,
        evaluation_date: NaiveDate,
    ) -> EvaluationOutcome {
        let report = rules::check_request(request, balance, evaluation_date, &self.config);
        let candidate = decide_outcome(
            request,
            balance,
            evaluation_date,
            report.first_failure.as_ref(),
        );

        EvaluationOutcome::gated(
            request,
            balance,
            candidate,
            DecisionSource::RuleBased,
            report.findings,
            report.first_failure,
        )
    }
}

/// Evaluation output describing the decision and how it was reached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationOutcome {
    pub decision: EligibilityDecision,
    pub source: DecisionSource,
    pub findings: Vec<RuleFinding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decline_reason: Option<DeclineReason>,
}

impl EvaluationOutcome {
    /// Run `candidate` through [`enforce_invariants`], declining on any violation.
    pub(crate) fn gated(
        request: &ApplicationRequest,
        prior: &GrantBalance,
        candidate: EligibilityDecision,
        source: DecisionSource,
        findings: Vec<RuleFinding>,
        decline_reason: Option<DeclineReason>,
    ) -> Self {
        match enforce_invariants(request, prior, candidate) {
            Ok(decision) => {
                let decline_reason = match decision.decision {
                    Decision::Awarded => None,
                    Decision::Declined => {
                        Some(decline_reason.unwrap_or(DeclineReason::ClassifierDeclined))
                    }
                };
                Self {
                    decision,
                    source,
                    findings,
                    decline_reason,
                }
            }
            Err(violation) => {
                warn!(
                    applicant = %request.applicant_id,
                    source = source.label(),
                    %violation,
                    "decision gate overrode award"
                );
                Self {
                    decision: EligibilityDecision::declined(candidate.decisioned_date, *prior),
                    source,
                    findings,
                    decline_reason: Some(DeclineReason::PolicyViolation(violation)),
                }
            }
        }
    }

    /// Outcome used whenever a decision cannot be obtained: declined, balance untouched.
    pub(crate) fn fail_closed(
        prior: &GrantBalance,
        evaluation_date: NaiveDate,
        source: DecisionSource,
        reason: DeclineReason,
    ) -> Self {
        Self {
            decision: EligibilityDecision::declined(evaluation_date, *prior),
            source,
            findings: Vec::new(),
            decline_reason: Some(reason),
        }
    }

    pub fn summary(&self) -> String {
        match (&self.decision.decision, &self.decline_reason) {
            (Decision::Awarded, _) => format!(
                "awarded; twelve-month balance now {}, lifetime balance now {}",
                self.decision.updated_balance.twelve_month_remaining,
                self.decision.updated_balance.lifetime_remaining
            ),
            (Decision::Declined, Some(reason)) => reason.summary(),
            (Decision::Declined, None) => "declined".to_string(),
        }
    }
}
