//! Per-applicant application drafts.
//!
//! A draft is a field map written by two kinds of writers: manual edits and extraction tool
//! calls coming out of a chat assistant. Each write replaces the stored value for that field and
//! records which writer produced it. Submitting freezes the draft into a [`SubmittedApplication`].

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::domain::{
    AgreementFlags, ApplicantId, ApplicantProfile, ApplicationRequest, DisasterEvent,
    PostalAddress, SubmittedApplication,
};
use super::intake::{parse_amount, validate_request, RequestValidationError};

/// Tool name used by the assistant to record profile details.
pub const UPDATE_PROFILE_TOOL: &str = "updateUserProfile";
/// Tool name used by the assistant to record the relief request itself.
pub const UPDATE_DRAFT_TOOL: &str = "startOrUpdateApplicationDraft";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftField {
    FirstName,
    LastName,
    Email,
    MobileNumber,
    AddressCountry,
    AddressStreet1,
    AddressStreet2,
    AddressCity,
    AddressState,
    AddressZip,
    EmploymentStartDate,
    EligibilityType,
    HouseholdIncome,
    HouseholdSize,
    Homeowner,
    PreferredLanguage,
    Event,
    RequestedAmount,
    ShareStory,
    ReceiveAdditionalInfo,
}

/// Shape of value a field accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Date,
    Amount,
    Count,
    Flag,
    Event,
}

impl DraftField {
    pub const REQUIRED: [DraftField; 3] = [
        DraftField::EmploymentStartDate,
        DraftField::Event,
        DraftField::RequestedAmount,
    ];

    pub const fn kind(self) -> FieldKind {
        match self {
            DraftField::EmploymentStartDate => FieldKind::Date,
            DraftField::HouseholdIncome | DraftField::RequestedAmount => FieldKind::Amount,
            DraftField::HouseholdSize => FieldKind::Count,
            DraftField::Homeowner | DraftField::ShareStory | DraftField::ReceiveAdditionalInfo => {
                FieldKind::Flag
            }
            DraftField::Event => FieldKind::Event,
            _ => FieldKind::Text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    Text(String),
    Date(NaiveDate),
    Amount(Decimal),
    Count(u8),
    Flag(bool),
    Event(DisasterEvent),
}

impl FieldValue {
    pub const fn kind(&self) -> FieldKind {
        match self {
            FieldValue::Text(_) => FieldKind::Text,
            FieldValue::Date(_) => FieldKind::Date,
            FieldValue::Amount(_) => FieldKind::Amount,
            FieldValue::Count(_) => FieldKind::Count,
            FieldValue::Flag(_) => FieldKind::Flag,
            FieldValue::Event(_) => FieldKind::Event,
        }
    }
}

/// Writer responsible for a field's current value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DraftSource {
    /// Copied from the applicant's last submitted profile.
    Profile,
    ManualEdit,
    Extraction,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftEntry {
    pub value: FieldValue,
    pub source: DraftSource,
}

/// A batch of field writes from a single writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftPatch {
    pub source: DraftSource,
    pub fields: BTreeMap<DraftField, FieldValue>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DraftError {
    #[error("unknown extraction tool '{0}'")]
    UnknownTool(String),
    #[error("extraction arguments must be a JSON object")]
    ArgumentsNotObject,
    #[error("field {field:?} expects {expected:?} but received {received:?}")]
    TypeMismatch {
        field: DraftField,
        expected: FieldKind,
        received: FieldKind,
    },
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
    #[error(transparent)]
    Invalid(#[from] RequestValidationError),
}

impl DraftPatch {
    pub fn new(source: DraftSource) -> Self {
        Self {
            source,
            fields: BTreeMap::new(),
        }
    }

    pub fn with(mut self, field: DraftField, value: FieldValue) -> Self {
        self.fields.insert(field, value);
        self
    }

    /// Translate an assistant tool call into an extraction patch.
    ///
    /// Unknown argument keys are ignored; known keys with unusable values are errors.
    pub fn from_tool_call(name: &str, args: &Value) -> Result<Self, DraftError> {
        let args = args.as_object().ok_or(DraftError::ArgumentsNotObject)?;
        let mut patch = DraftPatch::new(DraftSource::Extraction);

        match name {
            UPDATE_PROFILE_TOOL => {
                patch.extract_text(args, "firstName", DraftField::FirstName)?;
                patch.extract_text(args, "lastName", DraftField::LastName)?;
                patch.extract_text(args, "email", DraftField::Email)?;
                patch.extract_text(args, "mobileNumber", DraftField::MobileNumber)?;
                patch.extract_date(args, "employmentStartDate")?;
                patch.extract_text(args, "eligibilityType", DraftField::EligibilityType)?;
                patch.extract_amount(args, "householdIncome", DraftField::HouseholdIncome)?;
                patch.extract_count(args, "householdSize")?;
                patch.extract_flag(args, "homeowner", DraftField::Homeowner)?;
                patch.extract_text(args, "preferredLanguage", DraftField::PreferredLanguage)?;

                if let Some(address) = args.get("primaryAddress") {
                    let address = address.as_object().ok_or_else(|| DraftError::InvalidValue {
                        field: "primaryAddress".to_string(),
                        reason: "expected an object".to_string(),
                    })?;
                    patch.extract_text(address, "country", DraftField::AddressCountry)?;
                    patch.extract_text(address, "street1", DraftField::AddressStreet1)?;
                    patch.extract_text(address, "street2", DraftField::AddressStreet2)?;
                    patch.extract_text(address, "city", DraftField::AddressCity)?;
                    patch.extract_text(address, "state", DraftField::AddressState)?;
                    patch.extract_text(address, "zip", DraftField::AddressZip)?;
                }
            }
            UPDATE_DRAFT_TOOL => {
                if let Some(raw) = args.get("event") {
                    let label = raw.as_str().ok_or_else(|| invalid("event", "expected a string"))?;
                    let event = DisasterEvent::from_str(label)
                        .map_err(|err| invalid("event", &err.to_string()))?;
                    patch.fields.insert(DraftField::Event, FieldValue::Event(event));
                }
                patch.extract_amount(args, "requestedAmount", DraftField::RequestedAmount)?;
                patch.extract_flag(args, "shareStory", DraftField::ShareStory)?;
                patch.extract_flag(
                    args,
                    "receiveAdditionalInfo",
                    DraftField::ReceiveAdditionalInfo,
                )?;
            }
            other => return Err(DraftError::UnknownTool(other.to_string())),
        }

        debug!(tool = name, fields = patch.fields.len(), "translated extraction tool call");
        Ok(patch)
    }

    fn extract_text(
        &mut self,
        args: &Map<String, Value>,
        key: &str,
        field: DraftField,
    ) -> Result<(), DraftError> {
        match args.get(key) {
            None | Some(Value::Null) => Ok(()),
            Some(Value::String(text)) => {
                let text = text.trim();
                if !text.is_empty() {
                    self.fields.insert(field, FieldValue::Text(text.to_string()));
                }
                Ok(())
            }
            Some(_) => Err(invalid(key, "expected a string")),
        }
    }

    fn extract_date(&mut self, args: &Map<String, Value>, key: &str) -> Result<(), DraftError> {
        match args.get(key) {
            None | Some(Value::Null) => Ok(()),
            Some(Value::String(raw)) => {
                let date = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
                    .map_err(|err| invalid(key, &err.to_string()))?;
                self.fields
                    .insert(DraftField::EmploymentStartDate, FieldValue::Date(date));
                Ok(())
            }
            Some(_) => Err(invalid(key, "expected a YYYY-MM-DD string")),
        }
    }

    fn extract_amount(
        &mut self,
        args: &Map<String, Value>,
        key: &str,
        field: DraftField,
    ) -> Result<(), DraftError> {
        let amount = match args.get(key) {
            None | Some(Value::Null) => return Ok(()),
            Some(Value::Number(number)) => Decimal::from_str(&number.to_string())
                .map_err(|err| invalid(key, &err.to_string()))?,
            Some(Value::String(raw)) => {
                parse_amount(raw).map_err(|err| invalid(key, &err.to_string()))?
            }
            Some(_) => return Err(invalid(key, "expected a number")),
        };
        self.fields.insert(field, FieldValue::Amount(amount));
        Ok(())
    }

    fn extract_count(&mut self, args: &Map<String, Value>, key: &str) -> Result<(), DraftError> {
        let count = match args.get(key) {
            None | Some(Value::Null) => return Ok(()),
            Some(Value::Number(number)) => number
                .as_u64()
                .and_then(|value| u8::try_from(value).ok())
                .ok_or_else(|| invalid(key, "expected a whole number up to 255"))?,
            Some(Value::String(raw)) => raw
                .trim()
                .parse::<u8>()
                .map_err(|err| invalid(key, &err.to_string()))?,
            Some(_) => return Err(invalid(key, "expected a number")),
        };
        self.fields
            .insert(DraftField::HouseholdSize, FieldValue::Count(count));
        Ok(())
    }

    fn extract_flag(
        &mut self,
        args: &Map<String, Value>,
        key: &str,
        field: DraftField,
    ) -> Result<(), DraftError> {
        let flag = match args.get(key) {
            None | Some(Value::Null) => return Ok(()),
            Some(Value::Bool(flag)) => *flag,
            Some(Value::String(raw)) => match raw.trim().to_ascii_lowercase().as_str() {
                "yes" | "true" => true,
                "no" | "false" => false,
                _ => return Err(invalid(key, "expected yes or no")),
            },
            Some(_) => return Err(invalid(key, "expected a boolean")),
        };
        self.fields.insert(field, FieldValue::Flag(flag));
        Ok(())
    }
}

fn invalid(field: &str, reason: &str) -> DraftError {
    DraftError::InvalidValue {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

/// Mutable, per-applicant field map prior to submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApplicationDraft {
    pub applicant_id: ApplicantId,
    pub fields: BTreeMap<DraftField, DraftEntry>,
}

impl ApplicationDraft {
    pub fn new(applicant_id: ApplicantId) -> Self {
        Self {
            applicant_id,
            fields: BTreeMap::new(),
        }
    }

    /// Start a draft pre-filled from a previously submitted profile.
    pub fn seeded(applicant_id: ApplicantId, profile: &ApplicantProfile) -> Self {
        let mut patch = DraftPatch::new(DraftSource::Profile);
        let text_fields = [
            (DraftField::FirstName, &profile.first_name),
            (DraftField::LastName, &profile.last_name),
            (DraftField::Email, &profile.email),
            (DraftField::MobileNumber, &profile.mobile_number),
            (DraftField::AddressCountry, &profile.primary_address.country),
            (DraftField::AddressStreet1, &profile.primary_address.street1),
            (DraftField::AddressCity, &profile.primary_address.city),
            (DraftField::AddressState, &profile.primary_address.state),
            (DraftField::AddressZip, &profile.primary_address.zip),
        ];
        for (field, value) in text_fields {
            if !value.is_empty() {
                patch.fields.insert(field, FieldValue::Text(value.clone()));
            }
        }

        let optional_text = [
            (DraftField::AddressStreet2, &profile.primary_address.street2),
            (DraftField::EligibilityType, &profile.eligibility_type),
            (DraftField::PreferredLanguage, &profile.preferred_language),
        ];
        for (field, value) in optional_text {
            if let Some(value) = value {
                patch.fields.insert(field, FieldValue::Text(value.clone()));
            }
        }

        if let Some(date) = profile.employment_start_date {
            patch
                .fields
                .insert(DraftField::EmploymentStartDate, FieldValue::Date(date));
        }
        if let Some(income) = profile.household_income {
            patch
                .fields
                .insert(DraftField::HouseholdIncome, FieldValue::Amount(income));
        }
        if let Some(size) = profile.household_size {
            patch
                .fields
                .insert(DraftField::HouseholdSize, FieldValue::Count(size));
        }
        if let Some(homeowner) = profile.homeowner {
            patch
                .fields
                .insert(DraftField::Homeowner, FieldValue::Flag(homeowner));
        }

        let mut draft = Self::new(applicant_id);
        draft.apply(patch);
        draft
    }

    /// Apply `patch` with per-field last-write-wins semantics.
    ///
    /// The patch is rejected as a whole when any value has the wrong shape for its field.
    pub fn merge(&mut self, patch: DraftPatch) -> Result<usize, DraftError> {
        for (field, value) in &patch.fields {
            if field.kind() != value.kind() {
                return Err(DraftError::TypeMismatch {
                    field: *field,
                    expected: field.kind(),
                    received: value.kind(),
                });
            }
        }
        Ok(self.apply(patch))
    }

    fn apply(&mut self, patch: DraftPatch) -> usize {
        let written = patch.fields.len();
        for (field, value) in patch.fields {
            self.fields.insert(
                field,
                DraftEntry {
                    value,
                    source: patch.source,
                },
            );
        }
        written
    }

    pub fn get(&self, field: DraftField) -> Option<&FieldValue> {
        self.fields.get(&field).map(|entry| &entry.value)
    }

    pub fn source_of(&self, field: DraftField) -> Option<DraftSource> {
        self.fields.get(&field).map(|entry| entry.source)
    }

    pub fn missing_required(&self) -> Vec<DraftField> {
        DraftField::REQUIRED
            .into_iter()
            .filter(|field| !self.fields.contains_key(field))
            .collect()
    }

    /// Freeze the draft into its submitted form.
    pub fn submit(self) -> Result<SubmittedApplication, DraftError> {
        if let Some(field) = self.missing_required().into_iter().next() {
            return Err(RequestValidationError::MissingField(field).into());
        }

        let employment_start_date = match self.get(DraftField::EmploymentStartDate) {
            Some(FieldValue::Date(date)) => *date,
            _ => {
                return Err(
                    RequestValidationError::MissingField(DraftField::EmploymentStartDate).into(),
                )
            }
        };
        let event = match self.get(DraftField::Event) {
            Some(FieldValue::Event(event)) => *event,
            _ => return Err(RequestValidationError::MissingField(DraftField::Event).into()),
        };
        let requested_amount = match self.get(DraftField::RequestedAmount) {
            Some(FieldValue::Amount(amount)) => *amount,
            _ => {
                return Err(
                    RequestValidationError::MissingField(DraftField::RequestedAmount).into(),
                )
            }
        };

        let request = ApplicationRequest {
            applicant_id: self.applicant_id.clone(),
            employment_start_date,
            event,
            requested_amount,
        };
        validate_request(&request)?;

        let profile = ApplicantProfile {
            first_name: self.text(DraftField::FirstName).unwrap_or_default(),
            last_name: self.text(DraftField::LastName).unwrap_or_default(),
            email: self.text(DraftField::Email).unwrap_or_default(),
            mobile_number: self.text(DraftField::MobileNumber).unwrap_or_default(),
            primary_address: PostalAddress {
                country: self.text(DraftField::AddressCountry).unwrap_or_default(),
                street1: self.text(DraftField::AddressStreet1).unwrap_or_default(),
                street2: self.text(DraftField::AddressStreet2),
                city: self.text(DraftField::AddressCity).unwrap_or_default(),
                state: self.text(DraftField::AddressState).unwrap_or_default(),
                zip: self.text(DraftField::AddressZip).unwrap_or_default(),
            },
            employment_start_date: Some(employment_start_date),
            eligibility_type: self.text(DraftField::EligibilityType),
            household_income: match self.get(DraftField::HouseholdIncome) {
                Some(FieldValue::Amount(amount)) => Some(*amount),
                _ => None,
            },
            household_size: match self.get(DraftField::HouseholdSize) {
                Some(FieldValue::Count(size)) => Some(*size),
                _ => None,
            },
            homeowner: self.flag(DraftField::Homeowner),
            preferred_language: self.text(DraftField::PreferredLanguage),
        };

        let agreements = AgreementFlags {
            share_story: self.flag(DraftField::ShareStory).unwrap_or(false),
            receive_additional_info: self
                .flag(DraftField::ReceiveAdditionalInfo)
                .unwrap_or(false),
        };

        Ok(SubmittedApplication {
            request,
            profile,
            agreements,
        })
    }

    fn text(&self, field: DraftField) -> Option<String> {
        match self.get(field) {
            Some(FieldValue::Text(text)) => Some(text.clone()),
            _ => None,
        }
    }

    fn flag(&self, field: DraftField) -> Option<bool> {
        match self.get(field) {
            Some(FieldValue::Flag(flag)) => Some(*flag),
            _ => None,
        }
    }
}
