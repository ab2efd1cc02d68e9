//! Relief-grant intake, eligibility decisions, and balance tracking.
//!
//! Drafts are edited until submission, submitted applications are decided exactly once, and
//! every decision (rule-based or model-assisted) passes the same balance gate before it is
//! stored.

pub mod classifier;
pub mod domain;
pub mod draft;
pub mod evaluation;
pub mod intake;
pub mod replay;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use classifier::{
    ClassifierAdapter, ClassifierError, ClassifierPayload, ClassifierVerdict,
    EligibilityClassifier, GeminiClassifier,
};
pub use domain::{
    AgreementFlags, ApplicantId, ApplicantProfile, ApplicationId, ApplicationRequest,
    ApplicationStatus, Decision, DisasterEvent, EligibilityDecision, GrantBalance, PostalAddress,
    SubmittedApplication,
};
pub use draft::{ApplicationDraft, DraftError, DraftField, DraftPatch, DraftSource, FieldValue};
pub use evaluation::{
    DecisionSource, DeclineReason, EligibilityEngine, EvaluationOutcome, GrantPolicyConfig,
    PolicyViolation,
};
pub use intake::RequestValidationError;
pub use replay::{DecisionReplay, ReplayImportError, ReplayReport};
pub use repository::{
    ApplicationRecord, ApplicationRepository, ApplicationStatusView, RepositoryError,
};
pub use router::application_router;
pub use service::{ApplicationServiceError, ReliefApplicationService};
