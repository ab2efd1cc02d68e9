use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::super::domain::{
    ApplicationRequest, Decision, DisasterEvent, EligibilityDecision, GrantBalance,
};
use super::guard::PolicyViolation;

/// Why an application was declined, suitable for applicant-facing notices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeclineReason {
    IneligibleEvent {
        event: DisasterEvent,
    },
    EmploymentAfterDecision {
        employment_start_date: NaiveDate,
        evaluation_date: NaiveDate,
    },
    NonPositiveAmount {
        requested: Decimal,
    },
    ExceedsProgramCeiling {
        requested: Decimal,
        ceiling: Decimal,
    },
    InsufficientTwelveMonthBalance {
        requested: Decimal,
        remaining: Decimal,
    },
    ClassifierDeclined,
    ClassifierUnavailable {
        detail: String,
    },
    ClassifierMalformedResponse {
        detail: String,
    },
    PolicyViolation(PolicyViolation),
}

impl DeclineReason {
    pub fn summary(&self) -> String {
        match self {
            DeclineReason::IneligibleEvent { event } => {
                format!("declined: {event} is not an eligible event")
            }
            DeclineReason::EmploymentAfterDecision {
                employment_start_date,
                evaluation_date,
            } => format!(
                "declined: employment starts {employment_start_date}, after decision date {evaluation_date}"
            ),
            DeclineReason::NonPositiveAmount { requested } => {
                format!("declined: requested amount {requested} must be positive")
            }
            DeclineReason::ExceedsProgramCeiling { requested, ceiling } => {
                format!("declined: requested {requested} exceeds the program ceiling of {ceiling}")
            }
            DeclineReason::InsufficientTwelveMonthBalance {
                requested,
                remaining,
            } => format!(
                "declined: requested {requested} exceeds the remaining twelve-month balance of {remaining}"
            ),
            DeclineReason::ClassifierDeclined => "declined by eligibility classifier".to_string(),
            DeclineReason::ClassifierUnavailable { .. }
            | DeclineReason::ClassifierMalformedResponse { .. } => {
                "declined: eligibility could not be confirmed".to_string()
            }
            DeclineReason::PolicyViolation(violation) => format!("declined: {violation}"),
        }
    }
}

/// Turn the first failing rule (if any) into the decision and its balance.
pub(crate) fn decide_outcome(
    request: &ApplicationRequest,
    balance: &GrantBalance,
    evaluation_date: NaiveDate,
    first_failure: Option<&DeclineReason>,
) -> EligibilityDecision {
    if first_failure.is_some() {
        return EligibilityDecision::declined(evaluation_date, *balance);
    }

    EligibilityDecision {
        decision: Decision::Awarded,
        decisioned_date: evaluation_date,
        updated_balance: balance.debit(request.requested_amount),
    }
}
