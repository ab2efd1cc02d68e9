//! Batch replay of historical requests from CSV.
//!
//! Rows are evaluated in file order; each applicant's balance starts at the configured
//! allowances and carries forward from one row to the next.

use std::collections::HashMap;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::domain::{ApplicantId, ApplicationRequest, DisasterEvent, GrantBalance};
use super::evaluation::{EligibilityEngine, EvaluationOutcome};
use super::intake::{parse_amount, validate_request, RequestValidationError};

#[derive(Debug, thiserror::Error)]
pub enum ReplayImportError {
    #[error("failed to read replay file: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid replay CSV data: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {line}: invalid {column} '{value}'")]
    InvalidValue {
        line: u64,
        column: &'static str,
        value: String,
    },
}

#[derive(Debug, Deserialize)]
struct ReplayRow {
    applicant_id: String,
    employment_start_date: String,
    event: String,
    requested_amount: String,
    evaluation_date: String,
}

/// One replayed row and its outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayEntry {
    pub line: u64,
    pub request: ApplicationRequest,
    pub evaluation_date: NaiveDate,
    pub prior_balance: GrantBalance,
    pub outcome: EvaluationOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReplayReport {
    pub entries: Vec<ReplayEntry>,
    pub final_balances: Vec<(ApplicantId, GrantBalance)>,
}

impl ReplayReport {
    pub fn awarded(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.outcome.decision.is_awarded())
            .count()
    }

    pub fn declined(&self) -> usize {
        self.entries.len() - self.awarded()
    }
}

pub struct DecisionReplay<'a> {
    engine: &'a EligibilityEngine,
}

impl<'a> DecisionReplay<'a> {
    pub fn new(engine: &'a EligibilityEngine) -> Self {
        Self { engine }
    }

    pub fn replay_file<P: AsRef<Path>>(&self, path: P) -> Result<ReplayReport, ReplayImportError> {
        let file = std::fs::File::open(path)?;
        self.replay_reader(file)
    }

    pub fn replay_reader<R: Read>(&self, reader: R) -> Result<ReplayReport, ReplayImportError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut balances: HashMap<ApplicantId, GrantBalance> = HashMap::new();
        let mut order: Vec<ApplicantId> = Vec::new();
        let mut entries = Vec::new();

        let headers = csv_reader.headers()?.clone();
        for record in csv_reader.records() {
            let record = record?;
            // Physical line where the record starts; quoted fields may span lines.
            let line = record.position().map_or(0, |position| position.line());
            let row: ReplayRow = record.deserialize(Some(&headers))?;
            let (request, evaluation_date) = row.into_request(line)?;

            let prior_balance = match balances.get(&request.applicant_id) {
                Some(balance) => *balance,
                None => {
                    order.push(request.applicant_id.clone());
                    self.engine.config().initial_balance()
                }
            };

            let outcome = self
                .engine
                .evaluate(&request, &prior_balance, evaluation_date);
            balances.insert(request.applicant_id.clone(), outcome.decision.updated_balance);

            entries.push(ReplayEntry {
                line,
                request,
                evaluation_date,
                prior_balance,
                outcome,
            });
        }

        let final_balances = order
            .into_iter()
            .filter_map(|applicant| {
                let balance = balances.get(&applicant).copied()?;
                Some((applicant, balance))
            })
            .collect();

        let report = ReplayReport {
            entries,
            final_balances,
        };
        info!(
            rows = report.entries.len(),
            awarded = report.awarded(),
            declined = report.declined(),
            "replay complete"
        );
        Ok(report)
    }
}

impl ReplayRow {
    fn into_request(self, line: u64) -> Result<(ApplicationRequest, NaiveDate), ReplayImportError> {
        let invalid = |column: &'static str, value: &str| ReplayImportError::InvalidValue {
            line,
            column,
            value: value.to_string(),
        };

        let employment_start_date = parse_date(&self.employment_start_date)
            .ok_or_else(|| invalid("employment_start_date", &self.employment_start_date))?;
        let evaluation_date = parse_date(&self.evaluation_date)
            .ok_or_else(|| invalid("evaluation_date", &self.evaluation_date))?;
        let event = DisasterEvent::from_str(&self.event)
            .map_err(|_| invalid("event", &self.event))?;
        let requested_amount = parse_amount(&self.requested_amount)
            .map_err(|_| invalid("requested_amount", &self.requested_amount))?;

        let request = ApplicationRequest {
            applicant_id: ApplicantId(self.applicant_id),
            employment_start_date,
            event,
            requested_amount,
        };
        validate_request(&request).map_err(|err| match err {
            RequestValidationError::EmptyApplicantId => {
                invalid("applicant_id", &request.applicant_id.0)
            }
            RequestValidationError::NonPositiveAmount { .. }
            | RequestValidationError::MissingField(_) => {
                invalid("requested_amount", &self.requested_amount)
            }
        })?;
        Ok((request, evaluation_date))
    }
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").ok()
}
