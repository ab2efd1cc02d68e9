use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::super::domain::{ApplicationRequest, GrantBalance};
use super::config::GrantPolicyConfig;
use super::policy::DeclineReason;

/// Hard policy rules, in the order they are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PolicyRule {
    EligibleEvent,
    EmploymentPrecedesDecision,
    AmountWithinCeiling,
    AmountWithinTwelveMonthBalance,
}

/// Pass/fail result for one rule, kept for audits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleFinding {
    pub rule: PolicyRule,
    pub passed: bool,
    pub notes: String,
}

pub(crate) struct RuleReport {
    pub findings: Vec<RuleFinding>,
    pub first_failure: Option<DeclineReason>,
}

impl RuleReport {
    fn record(&mut self, rule: PolicyRule, failure: Option<DeclineReason>, notes: String) {
        self.findings.push(RuleFinding {
            rule,
            passed: failure.is_none(),
            notes,
        });
        if self.first_failure.is_none() {
            self.first_failure = failure;
        }
    }
}

pub(crate) fn check_request(
    request: &ApplicationRequest,
    balance: &GrantBalance,
    evaluation_date: NaiveDate,
    config: &GrantPolicyConfig,
) -> RuleReport {
    let mut report = RuleReport {
        findings: Vec::with_capacity(4),
        first_failure: None,
    };

    if config.is_eligible_event(request.event) {
        report.record(
            PolicyRule::EligibleEvent,
            None,
            format!("{} is an eligible event", request.event),
        );
    } else {
        report.record(
            PolicyRule::EligibleEvent,
            Some(DeclineReason::IneligibleEvent {
                event: request.event,
            }),
            format!("{} is not an eligible event", request.event),
        );
    }

    if request.employment_start_date <= evaluation_date {
        report.record(
            PolicyRule::EmploymentPrecedesDecision,
            None,
            format!(
                "employment started {} on or before {}",
                request.employment_start_date, evaluation_date
            ),
        );
    } else {
        report.record(
            PolicyRule::EmploymentPrecedesDecision,
            Some(DeclineReason::EmploymentAfterDecision {
                employment_start_date: request.employment_start_date,
                evaluation_date,
            }),
            format!(
                "employment starts {} after decision date {}",
                request.employment_start_date, evaluation_date
            ),
        );
    }

    let requested = request.requested_amount;
    if requested <= rust_decimal::Decimal::ZERO {
        report.record(
            PolicyRule::AmountWithinCeiling,
            Some(DeclineReason::NonPositiveAmount { requested }),
            format!("requested amount {requested} is not positive"),
        );
    } else if requested > config.program_ceiling {
        report.record(
            PolicyRule::AmountWithinCeiling,
            Some(DeclineReason::ExceedsProgramCeiling {
                requested,
                ceiling: config.program_ceiling,
            }),
            format!(
                "requested amount {requested} exceeds program ceiling {}",
                config.program_ceiling
            ),
        );
    } else {
        report.record(
            PolicyRule::AmountWithinCeiling,
            None,
            format!(
                "requested amount {requested} within program ceiling {}",
                config.program_ceiling
            ),
        );
    }

    let remaining = balance.twelve_month_remaining;
    if requested <= remaining {
        report.record(
            PolicyRule::AmountWithinTwelveMonthBalance,
            None,
            format!("requested amount {requested} within twelve-month balance {remaining}"),
        );
    } else {
        report.record(
            PolicyRule::AmountWithinTwelveMonthBalance,
            Some(DeclineReason::InsufficientTwelveMonthBalance {
                requested,
                remaining,
            }),
            format!("requested amount {requested} exceeds twelve-month balance {remaining}"),
        );
    }

    report
}
