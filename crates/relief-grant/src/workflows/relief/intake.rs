use std::str::FromStr;

use rust_decimal::Decimal;

use super::domain::ApplicationRequest;
use super::draft::DraftField;

/// Request problems the caller must fix; distinct from a Declined outcome.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestValidationError {
    #[error("applicant id must not be empty")]
    EmptyApplicantId,
    #[error("requested amount must be greater than zero (found {requested})")]
    NonPositiveAmount { requested: Decimal },
    #[error("draft is missing required field {0:?}")]
    MissingField(DraftField),
}

/// Reject requests that cannot be evaluated at all.
pub fn validate_request(request: &ApplicationRequest) -> Result<(), RequestValidationError> {
    if request.applicant_id.0.trim().is_empty() {
        return Err(RequestValidationError::EmptyApplicantId);
    }

    if request.requested_amount <= Decimal::ZERO {
        return Err(RequestValidationError::NonPositiveAmount {
            requested: request.requested_amount,
        });
    }

    Ok(())
}

/// Parse a dollar amount as typed by applicants: `2500`, `$2,500.00`, ` 48000 `.
pub fn parse_amount(raw: &str) -> Result<Decimal, rust_decimal::Error> {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| *c != '$' && *c != ',')
        .collect();
    Decimal::from_str(cleaned.trim())
}
