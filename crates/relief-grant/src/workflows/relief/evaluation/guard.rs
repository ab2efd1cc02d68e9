use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::super::domain::{ApplicationRequest, Decision, EligibilityDecision, GrantBalance};

/// An award that would break the balance invariants. Never returned as a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum PolicyViolation {
    #[error("award of {requested} must be positive")]
    NonPositiveAward { requested: Decimal },
    #[error("award of {requested} exceeds the twelve-month balance of {remaining}")]
    ExceedsTwelveMonthBalance {
        requested: Decimal,
        remaining: Decimal,
    },
    #[error("award of {requested} exceeds the lifetime balance of {remaining}")]
    ExceedsLifetimeBalance {
        requested: Decimal,
        remaining: Decimal,
    },
}

/// Final check applied to every candidate decision, whichever evaluator produced it.
///
/// An `Awarded` candidate must fit inside the prior balance; its applied balance is always
/// recomputed from `prior`, so a candidate carrying different arithmetic is corrected rather
/// than trusted. A `Declined` candidate always carries `prior` unchanged.
pub fn enforce_invariants(
    request: &ApplicationRequest,
    prior: &GrantBalance,
    candidate: EligibilityDecision,
) -> Result<EligibilityDecision, PolicyViolation> {
    match candidate.decision {
        Decision::Declined => {
            if candidate.updated_balance != *prior {
                warn!(
                    applicant = %request.applicant_id,
                    "declined candidate changed the balance; restoring prior balance"
                );
            }
            Ok(EligibilityDecision::declined(candidate.decisioned_date, *prior))
        }
        Decision::Awarded => {
            let requested = request.requested_amount;
            if requested <= Decimal::ZERO {
                return Err(PolicyViolation::NonPositiveAward { requested });
            }
            if requested > prior.twelve_month_remaining {
                return Err(PolicyViolation::ExceedsTwelveMonthBalance {
                    requested,
                    remaining: prior.twelve_month_remaining,
                });
            }
            if requested > prior.lifetime_remaining {
                return Err(PolicyViolation::ExceedsLifetimeBalance {
                    requested,
                    remaining: prior.lifetime_remaining,
                });
            }

            let expected = prior.debit(requested);
            if candidate.updated_balance != expected {
                warn!(
                    applicant = %request.applicant_id,
                    candidate_twelve_month = %candidate.updated_balance.twelve_month_remaining,
                    candidate_lifetime = %candidate.updated_balance.lifetime_remaining,
                    expected_twelve_month = %expected.twelve_month_remaining,
                    expected_lifetime = %expected.lifetime_remaining,
                    "awarded candidate balance disagrees with prior balance minus award; using computed balance"
                );
            }

            debug_assert!(expected.is_within(prior) && expected.is_non_negative());
            Ok(EligibilityDecision {
                decision: Decision::Awarded,
                decisioned_date: candidate.decisioned_date,
                updated_balance: expected,
            })
        }
    }
}
