use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::{json, Value};

use super::super::domain::{ApplicationRequest, DisasterEvent, GrantBalance};
use super::super::evaluation::GrantPolicyConfig;

/// Request facts and prior balance as sent to the classifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifierPayload {
    pub applicant_id: String,
    pub employment_start_date: NaiveDate,
    pub event: DisasterEvent,
    #[serde(with = "rust_decimal::serde::float")]
    pub requested_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub current_twelve_month_remaining: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub current_lifetime_remaining: Decimal,
    pub evaluation_date: NaiveDate,
}

impl ClassifierPayload {
    pub fn new(
        request: &ApplicationRequest,
        balance: &GrantBalance,
        evaluation_date: NaiveDate,
    ) -> Self {
        Self {
            applicant_id: request.applicant_id.0.clone(),
            employment_start_date: request.employment_start_date,
            event: request.event,
            requested_amount: request.requested_amount,
            current_twelve_month_remaining: balance.twelve_month_remaining,
            current_lifetime_remaining: balance.lifetime_remaining,
            evaluation_date,
        }
    }
}

/// Natural-language instructions plus the serialized payload.
pub fn build_prompt(payload: &ClassifierPayload, policy: &GrantPolicyConfig) -> String {
    let eligible = policy
        .eligible_events
        .iter()
        .map(|event| format!("\"{}\"", event.label()))
        .collect::<Vec<_>>()
        .join(", ");

    let application = serde_json::to_string_pretty(payload).unwrap_or_else(|_| "{}".to_string());

    format!(
        "You are an eligibility analyst for a disaster relief grant program.\n\
         Decide whether the application below is \"Awarded\" or \"Declined\".\n\
         \n\
         RULES (all must hold for \"Awarded\"):\n\
         1. The event is one of: {eligible}.\n\
         2. employmentStartDate is on or before evaluationDate.\n\
         3. requestedAmount is greater than 0 and at most {ceiling}.\n\
         4. requestedAmount is at most currentTwelveMonthRemaining.\n\
         \n\
         If \"Awarded\", newTwelveMonthRemaining = currentTwelveMonthRemaining - requestedAmount and \
         newLifetimeRemaining = currentLifetimeRemaining - requestedAmount.\n\
         If \"Declined\", both remaining amounts are returned unchanged.\n\
         \n\
         APPLICATION:\n{application}\n\
         \n\
         Respond with JSON only, matching the response schema.",
        ceiling = policy.program_ceiling,
    )
}

/// Response schema constraining the classifier's JSON output.
pub fn response_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "decision": {
                "type": "STRING",
                "enum": ["Awarded", "Declined"]
            },
            "newTwelveMonthRemaining": { "type": "NUMBER" },
            "newLifetimeRemaining": { "type": "NUMBER" }
        },
        "required": ["decision", "newTwelveMonthRemaining", "newLifetimeRemaining"]
    })
}
