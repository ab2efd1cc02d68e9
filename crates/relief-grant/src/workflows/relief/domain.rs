use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Identifier for the person requesting relief (the profile store key).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ApplicantId(pub String);

impl fmt::Display for ApplicantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier wrapper for submitted applications.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ApplicationId(pub String);

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Qualifying disaster the applicant is requesting relief for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DisasterEvent {
    Flood,
    Tornado,
    #[serde(
        rename = "Tropical Storm/Hurricane",
        alias = "TropicalStormOrHurricane"
    )]
    TropicalStormOrHurricane,
    Wildfire,
}

impl DisasterEvent {
    pub const ALL: [DisasterEvent; 4] = [
        DisasterEvent::Flood,
        DisasterEvent::Tornado,
        DisasterEvent::TropicalStormOrHurricane,
        DisasterEvent::Wildfire,
    ];

    pub const fn label(self) -> &'static str {
        match self {
            DisasterEvent::Flood => "Flood",
            DisasterEvent::Tornado => "Tornado",
            DisasterEvent::TropicalStormOrHurricane => "Tropical Storm/Hurricane",
            DisasterEvent::Wildfire => "Wildfire",
        }
    }
}

impl fmt::Display for DisasterEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown disaster event '{0}'")]
pub struct UnknownEvent(pub String);

impl FromStr for DisasterEvent {
    type Err = UnknownEvent;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized: String = raw
            .trim()
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "flood" => Ok(DisasterEvent::Flood),
            "tornado" => Ok(DisasterEvent::Tornado),
            "tropicalstormhurricane" | "tropicalstormorhurricane" | "tropicalstorm"
            | "hurricane" => Ok(DisasterEvent::TropicalStormOrHurricane),
            "wildfire" => Ok(DisasterEvent::Wildfire),
            _ => Err(UnknownEvent(raw.trim().to_string())),
        }
    }
}

/// Normalized application facts consumed by the eligibility evaluator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationRequest {
    pub applicant_id: ApplicantId,
    pub employment_start_date: NaiveDate,
    pub event: DisasterEvent,
    #[serde(with = "rust_decimal::serde::float")]
    pub requested_amount: Decimal,
}

/// Remaining grant capacity for an applicant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GrantBalance {
    #[serde(with = "rust_decimal::serde::float")]
    pub twelve_month_remaining: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub lifetime_remaining: Decimal,
}

impl GrantBalance {
    pub fn new(twelve_month_remaining: Decimal, lifetime_remaining: Decimal) -> Self {
        Self {
            twelve_month_remaining,
            lifetime_remaining,
        }
    }

    /// Balance after awarding `amount` against both windows.
    pub fn debit(&self, amount: Decimal) -> GrantBalance {
        GrantBalance {
            twelve_month_remaining: self.twelve_month_remaining - amount,
            lifetime_remaining: self.lifetime_remaining - amount,
        }
    }

    pub fn is_non_negative(&self) -> bool {
        !self.twelve_month_remaining.is_sign_negative() && !self.lifetime_remaining.is_sign_negative()
    }

    /// True when neither window grew relative to `prior`.
    pub fn is_within(&self, prior: &GrantBalance) -> bool {
        self.twelve_month_remaining <= prior.twelve_month_remaining
            && self.lifetime_remaining <= prior.lifetime_remaining
    }
}

/// Binary eligibility outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Decision {
    Awarded,
    Declined,
}

impl Decision {
    pub const fn label(self) -> &'static str {
        match self {
            Decision::Awarded => "Awarded",
            Decision::Declined => "Declined",
        }
    }
}

/// Immutable decision record appended to the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EligibilityDecision {
    pub decision: Decision,
    pub decisioned_date: NaiveDate,
    pub updated_balance: GrantBalance,
}

impl EligibilityDecision {
    pub fn declined(decisioned_date: NaiveDate, prior: GrantBalance) -> Self {
        Self {
            decision: Decision::Declined,
            decisioned_date,
            updated_balance: prior,
        }
    }

    /// `decisioned_date` rendered as an ISO calendar date (YYYY-MM-DD).
    pub fn decisioned_date_label(&self) -> String {
        self.decisioned_date.format("%Y-%m-%d").to_string()
    }

    pub fn is_awarded(&self) -> bool {
        self.decision == Decision::Awarded
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostalAddress {
    pub country: String,
    pub street1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street2: Option<String>,
    pub city: String,
    pub state: String,
    pub zip: String,
}

/// Applicant details captured alongside an application and frozen at submission.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicantProfile {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub mobile_number: String,
    pub primary_address: PostalAddress,
    pub employment_start_date: Option<NaiveDate>,
    pub eligibility_type: Option<String>,
    pub household_income: Option<Decimal>,
    pub household_size: Option<u8>,
    pub homeowner: Option<bool>,
    pub preferred_language: Option<String>,
}

/// Optional consents collected on the final application step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgreementFlags {
    pub share_story: bool,
    pub receive_additional_info: bool,
}

/// A draft frozen into its immutable submitted form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmittedApplication {
    pub request: ApplicationRequest,
    pub profile: ApplicantProfile,
    pub agreements: AgreementFlags,
}

/// Lifecycle status tracked for every stored application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplicationStatus {
    Submitted,
    Awarded,
    Declined,
}

impl ApplicationStatus {
    pub const fn label(self) -> &'static str {
        match self {
            ApplicationStatus::Submitted => "submitted",
            ApplicationStatus::Awarded => "awarded",
            ApplicationStatus::Declined => "declined",
        }
    }

    pub const fn is_terminal(self) -> bool {
        !matches!(self, ApplicationStatus::Submitted)
    }
}

impl From<Decision> for ApplicationStatus {
    fn from(decision: Decision) -> Self {
        match decision {
            Decision::Awarded => ApplicationStatus::Awarded,
            Decision::Declined => ApplicationStatus::Declined,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_parse_from_form_labels() {
        for event in DisasterEvent::ALL {
            assert_eq!(event.label().parse::<DisasterEvent>(), Ok(event));
        }
        assert_eq!(
            "tropical storm / hurricane".parse::<DisasterEvent>(),
            Ok(DisasterEvent::TropicalStormOrHurricane)
        );
        assert_eq!(
            "TropicalStormOrHurricane".parse::<DisasterEvent>(),
            Ok(DisasterEvent::TropicalStormOrHurricane)
        );
        assert!("Medical".parse::<DisasterEvent>().is_err());
    }

    #[test]
    fn events_serialize_with_form_labels() {
        let json = serde_json::to_string(&DisasterEvent::TropicalStormOrHurricane)
            .expect("event serializes");
        assert_eq!(json, "\"Tropical Storm/Hurricane\"");
        let parsed: DisasterEvent =
            serde_json::from_str("\"TropicalStormOrHurricane\"").expect("alias accepted");
        assert_eq!(parsed, DisasterEvent::TropicalStormOrHurricane);
    }

    #[test]
    fn decisioned_date_renders_iso() {
        let decision = EligibilityDecision::declined(
            NaiveDate::from_ymd_opt(2023, 8, 2).expect("valid"),
            GrantBalance::new(Decimal::from(1), Decimal::from(2)),
        );
        assert_eq!(decision.decisioned_date_label(), "2023-08-02");
        let json = serde_json::to_value(decision).expect("decision serializes");
        assert_eq!(json["decisioned_date"], "2023-08-02");
    }
}
