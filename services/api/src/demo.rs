use crate::infra::{build_service, ApplicationService, InMemoryApplicationRepository};
use chrono::{Local, NaiveDate};
use clap::Args;
use relief_grant::config::AppConfig;
use relief_grant::error::AppError;
use relief_grant::workflows::relief::{
    ApplicantId, ApplicationRecord, ApplicationRequest, DecisionReplay, DisasterEvent,
    EligibilityEngine, EvaluationOutcome, GrantBalance, GrantPolicyConfig,
    ReliefApplicationService, ReplayReport,
};
use rust_decimal::Decimal;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Args, Debug)]
pub(crate) struct EvaluateArgs {
    /// Applicant identifier (email address)
    #[arg(long)]
    pub(crate) applicant: String,
    /// Employment start date (YYYY-MM-DD)
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) employment_start: NaiveDate,
    /// Disaster event, e.g. "Flood" or "Tropical Storm/Hurricane"
    #[arg(long, value_parser = crate::infra::parse_event)]
    pub(crate) event: DisasterEvent,
    /// Requested amount in dollars
    #[arg(long, value_parser = crate::infra::parse_amount)]
    pub(crate) amount: Decimal,
    /// Remaining twelve-month balance (defaults to the full allowance)
    #[arg(long, value_parser = crate::infra::parse_amount)]
    pub(crate) twelve_month_remaining: Option<Decimal>,
    /// Remaining lifetime balance (defaults to the full allowance)
    #[arg(long, value_parser = crate::infra::parse_amount)]
    pub(crate) lifetime_remaining: Option<Decimal>,
    /// Decision date (defaults to today)
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) evaluation_date: Option<NaiveDate>,
    /// Print the full outcome as JSON
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug)]
pub(crate) struct ReplayArgs {
    /// CSV with applicant_id, employment_start_date, event, requested_amount, evaluation_date
    #[arg(long)]
    pub(crate) file: PathBuf,
    /// Print the full report as JSON
    #[arg(long)]
    pub(crate) json: bool,
}

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Date the demo applications are decided on (defaults to today).
    #[arg(long, value_parser = crate::infra::parse_date)]
    pub(crate) evaluation_date: Option<NaiveDate>,
    /// Applicant identifier used for the walkthrough.
    #[arg(long, default_value = "avery.moss@example.com")]
    pub(crate) applicant: String,
}

pub(crate) async fn run_evaluate(args: EvaluateArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let service = build_service(&config, Arc::new(InMemoryApplicationRepository::default()))?;

    let allowance = config.policy.initial_balance();
    let balance = GrantBalance::new(
        args.twelve_month_remaining
            .unwrap_or(allowance.twelve_month_remaining),
        args.lifetime_remaining
            .unwrap_or(allowance.lifetime_remaining),
    );
    let request = ApplicationRequest {
        applicant_id: ApplicantId(args.applicant),
        employment_start_date: args.employment_start,
        event: args.event,
        requested_amount: args.amount,
    };
    let evaluation_date = args
        .evaluation_date
        .unwrap_or_else(|| Local::now().date_naive());

    let outcome = service.evaluate(&request, &balance, evaluation_date).await?;

    if args.json {
        print_json(&json!({
            "request": request,
            "prior_balance": balance,
            "outcome": outcome,
        }));
    } else {
        render_outcome(&request, &balance, &outcome);
    }
    Ok(())
}

pub(crate) fn run_replay(args: ReplayArgs) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    let engine = EligibilityEngine::new(config.policy);
    let report = DecisionReplay::new(&engine).replay_file(&args.file)?;

    if args.json {
        print_json(&report);
    } else {
        render_replay(&args.file, &report);
    }
    Ok(())
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        evaluation_date,
        applicant,
    } = args;
    let evaluation_date = evaluation_date.unwrap_or_else(|| Local::now().date_naive());
    let applicant = ApplicantId(applicant);

    println!("Relief grant demo ({evaluation_date})");

    let engine = EligibilityEngine::new(GrantPolicyConfig::default());
    println!("\nStateless eligibility checks");
    let mid_year = GrantBalance::new(Decimal::from(7500), Decimal::from(47_500));
    let spent = GrantBalance::new(Decimal::from(2000), Decimal::from(47_500));
    for (event, balance) in [
        (DisasterEvent::Flood, mid_year),
        (DisasterEvent::Flood, spent),
        (DisasterEvent::Wildfire, mid_year),
    ] {
        let request = ApplicationRequest {
            applicant_id: ApplicantId("user@example.com".to_string()),
            employment_start_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or(evaluation_date),
            event,
            requested_amount: Decimal::from(2500),
        };
        let outcome = engine.evaluate(&request, &balance, evaluation_date);
        render_outcome(&request, &balance, &outcome);
    }

    println!("\nApplication lifecycle for {applicant}");
    let repository = Arc::new(InMemoryApplicationRepository::default());
    let service: ApplicationService =
        ReliefApplicationService::new(repository, GrantPolicyConfig::default());

    let profile = json!({
        "firstName": "Avery",
        "lastName": "Moss",
        "email": applicant.0.as_str(),
        "employmentStartDate": "2019-06-01",
        "primaryAddress": {
            "street1": "214 River Dr",
            "city": "Davenport",
            "state": "IA",
            "zip": "52801",
            "country": "United States"
        }
    });
    if let Err(err) = service.apply_extraction(&applicant, "updateUserProfile", &profile) {
        println!("  Profile update rejected: {err}");
        return Ok(());
    }
    println!("- Profile captured from assistant tool call");

    for (event, amount) in [("Flood", "$6,000"), ("Tornado", "$5,000"), ("Tornado", "$4,000")] {
        let draft = json!({ "event": event, "requestedAmount": amount });
        if let Err(err) =
            service.apply_extraction(&applicant, "startOrUpdateApplicationDraft", &draft)
        {
            println!("  Draft update rejected: {err}");
            continue;
        }

        let record = match service.submit(&applicant, evaluation_date) {
            Ok(record) => record,
            Err(err) => {
                println!("  Submission rejected: {err}");
                continue;
            }
        };
        println!(
            "- Submitted {} ({} for {})",
            record.application_id, event, amount
        );

        match service.decide(&record.application_id, evaluation_date).await {
            Ok(decided) => render_record(&decided),
            Err(err) => println!("  Decision unavailable: {err}"),
        }
    }

    let balance = service.current_balance(&applicant)?;
    println!(
        "\nRemaining balance: {} (twelve-month) | {} (lifetime)",
        balance.twelve_month_remaining, balance.lifetime_remaining
    );

    Ok(())
}

fn render_outcome(request: &ApplicationRequest, prior: &GrantBalance, outcome: &EvaluationOutcome) {
    println!(
        "- {} requests {} for {} against {} / {}: {}",
        request.applicant_id,
        request.requested_amount,
        request.event,
        prior.twelve_month_remaining,
        prior.lifetime_remaining,
        outcome.decision.decision.label()
    );
    println!(
        "  Decisioned {} via {} | {}",
        outcome.decision.decisioned_date_label(),
        outcome.source.label(),
        outcome.summary()
    );
    for finding in &outcome.findings {
        let mark = if finding.passed { "pass" } else { "fail" };
        println!("    - {:?}: {} ({})", finding.rule, mark, finding.notes);
    }
}

fn render_record(record: &ApplicationRecord) {
    let view = record.status_view();
    println!("  Status: {} | {}", view.status, view.decision_rationale);
}

fn render_replay(path: &std::path::Path, report: &ReplayReport) {
    println!("Replay of {}", path.display());
    println!(
        "- {} rows | {} awarded | {} declined",
        report.entries.len(),
        report.awarded(),
        report.declined()
    );
    for entry in &report.entries {
        println!(
            "  line {}: {} {} {} -> {}",
            entry.line,
            entry.request.applicant_id,
            entry.request.event,
            entry.request.requested_amount,
            entry.outcome.summary()
        );
    }
    println!("Final balances:");
    for (applicant, balance) in &report.final_balances {
        println!(
            "  - {}: {} (twelve-month) | {} (lifetime)",
            applicant, balance.twelve_month_remaining, balance.lifetime_remaining
        );
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(rendered) => println!("{rendered}"),
        Err(err) => eprintln!("unable to render output: {err}"),
    }
}
