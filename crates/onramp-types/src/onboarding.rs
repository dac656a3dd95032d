//! Onboarding pipeline domain types.
//!
//! Defines the fixed step vocabulary (`StepName`), per-step lifecycle
//! statuses (`StepStatus`), and the durable `StepStatusRecord` that is the
//! single source of truth for how far an employee has progressed. The
//! workflow engine derives its execution position entirely from this
//! record -- there is no separate cursor that could drift out of sync.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Step vocabulary
// ---------------------------------------------------------------------------

/// Lifecycle status of a single onboarding step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    NotStarted,
    InProgress,
    Waiting,
    Completed,
    Failed,
    Retry,
}

impl StepStatus {
    /// String form matching the serde representation. Used for JSON-path
    /// updates in the SQLite repository.
    pub fn as_str(self) -> &'static str {
        match self {
            StepStatus::NotStarted => "not_started",
            StepStatus::InProgress => "in_progress",
            StepStatus::Waiting => "waiting",
            StepStatus::Completed => "completed",
            StepStatus::Failed => "failed",
            StepStatus::Retry => "retry",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A document that must be delivered and signed during onboarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Policy,
    Nda,
    Guidelines,
}

impl DocumentKind {
    /// All documents, in pipeline order.
    pub const ALL: [DocumentKind; 3] =
        [DocumentKind::Policy, DocumentKind::Nda, DocumentKind::Guidelines];

    pub fn as_str(self) -> &'static str {
        match self {
            DocumentKind::Policy => "policy",
            DocumentKind::Nda => "nda",
            DocumentKind::Guidelines => "guidelines",
        }
    }

    /// Human-readable document title used in notification emails.
    pub fn title(self) -> &'static str {
        match self {
            DocumentKind::Policy => "Company Policy",
            DocumentKind::Nda => "Non-Disclosure Agreement",
            DocumentKind::Guidelines => "Development Guidelines",
        }
    }

    /// The step recording that this document was dispatched.
    pub fn sent_step(self) -> StepName {
        match self {
            DocumentKind::Policy => StepName::PolicySent,
            DocumentKind::Nda => StepName::NdaSent,
            DocumentKind::Guidelines => StepName::GuidelinesSent,
        }
    }

    /// The gate satisfied when the signature webhook arrives.
    pub fn signed_step(self) -> StepName {
        match self {
            DocumentKind::Policy => StepName::PolicySigned,
            DocumentKind::Nda => StepName::NdaSigned,
            DocumentKind::Guidelines => StepName::GuidelinesSigned,
        }
    }

    /// The comprehension quiz paired with this document.
    pub fn quiz(self) -> QuizKind {
        match self {
            DocumentKind::Policy => QuizKind::Policy,
            DocumentKind::Nda => QuizKind::Nda,
            DocumentKind::Guidelines => QuizKind::Guidelines,
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A comprehension quiz tied to one of the onboarding documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuizKind {
    Policy,
    Nda,
    Guidelines,
}

impl QuizKind {
    pub const ALL: [QuizKind; 3] = [QuizKind::Policy, QuizKind::Nda, QuizKind::Guidelines];

    pub fn as_str(self) -> &'static str {
        match self {
            QuizKind::Policy => "policy",
            QuizKind::Nda => "nda",
            QuizKind::Guidelines => "guidelines",
        }
    }

    /// The gate satisfied when a passing quiz result arrives.
    pub fn passed_step(self) -> StepName {
        match self {
            QuizKind::Policy => StepName::PolicyQuizPassed,
            QuizKind::Nda => StepName::NdaQuizPassed,
            QuizKind::Guidelines => StepName::GuidelinesQuizPassed,
        }
    }
}

impl fmt::Display for QuizKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The fixed set of onboarding steps.
///
/// The first nine form a strict linear sequence; the last three are the
/// final provisioning tasks, unordered with respect to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepName {
    PolicySent,
    PolicySigned,
    PolicyQuizPassed,
    NdaSent,
    NdaSigned,
    NdaQuizPassed,
    GuidelinesSent,
    GuidelinesSigned,
    GuidelinesQuizPassed,
    SlackInviteSent,
    JiraAccessGranted,
    OnboardingCallScheduled,
}

impl StepName {
    /// Every step, in pipeline order. Progress is computed over this set.
    pub const ALL: [StepName; 12] = [
        StepName::PolicySent,
        StepName::PolicySigned,
        StepName::PolicyQuizPassed,
        StepName::NdaSent,
        StepName::NdaSigned,
        StepName::NdaQuizPassed,
        StepName::GuidelinesSent,
        StepName::GuidelinesSigned,
        StepName::GuidelinesQuizPassed,
        StepName::SlackInviteSent,
        StepName::JiraAccessGranted,
        StepName::OnboardingCallScheduled,
    ];

    /// String form matching the serde representation. Used as the JSON map
    /// key in persisted records and for JSON-path updates in SQLite.
    pub fn as_str(self) -> &'static str {
        match self {
            StepName::PolicySent => "policy_sent",
            StepName::PolicySigned => "policy_signed",
            StepName::PolicyQuizPassed => "policy_quiz_passed",
            StepName::NdaSent => "nda_sent",
            StepName::NdaSigned => "nda_signed",
            StepName::NdaQuizPassed => "nda_quiz_passed",
            StepName::GuidelinesSent => "guidelines_sent",
            StepName::GuidelinesSigned => "guidelines_signed",
            StepName::GuidelinesQuizPassed => "guidelines_quiz_passed",
            StepName::SlackInviteSent => "slack_invite_sent",
            StepName::JiraAccessGranted => "jira_access_granted",
            StepName::OnboardingCallScheduled => "onboarding_call_scheduled",
        }
    }
}

impl fmt::Display for StepName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Step-status record
// ---------------------------------------------------------------------------

/// Durable per-employee record of step statuses and attempt counts.
///
/// Invariant: `completed` is terminal. `set_status` refuses to overwrite a
/// completed step, which is what makes duplicate webhook delivery and stale
/// resume triggers harmless.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepStatusRecord {
    /// Step statuses. Absent entries mean `not_started`.
    #[serde(default)]
    pub statuses: HashMap<StepName, StepStatus>,
    /// Execution attempt counts for side-effecting steps.
    #[serde(default)]
    pub attempts: HashMap<StepName, u32>,
    /// When onboarding was started via the enrollment trigger.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the pipeline reached its terminal state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    /// Last mutation timestamp.
    pub last_updated: DateTime<Utc>,
}

impl StepStatusRecord {
    /// Create an empty record (all steps `not_started`).
    pub fn new() -> Self {
        Self {
            statuses: HashMap::new(),
            attempts: HashMap::new(),
            started_at: None,
            completed_at: None,
            last_updated: Utc::now(),
        }
    }

    /// Current status of a step (`not_started` when never touched).
    pub fn status(&self, step: StepName) -> StepStatus {
        self.statuses
            .get(&step)
            .copied()
            .unwrap_or(StepStatus::NotStarted)
    }

    /// Transition a step to a new status.
    ///
    /// Returns `false` (and leaves the record untouched) when the step is
    /// already `completed` -- completed steps are immutable.
    pub fn set_status(&mut self, step: StepName, status: StepStatus) -> bool {
        if self.status(step) == StepStatus::Completed {
            return false;
        }
        self.statuses.insert(step, status);
        self.last_updated = Utc::now();
        true
    }

    /// Number of execution attempts recorded for a step.
    pub fn attempt_count(&self, step: StepName) -> u32 {
        self.attempts.get(&step).copied().unwrap_or(0)
    }

    /// Record one more execution attempt, returning the new count.
    pub fn record_attempt(&mut self, step: StepName) -> u32 {
        let count = self.attempts.entry(step).or_insert(0);
        *count += 1;
        self.last_updated = Utc::now();
        *count
    }

    /// Number of completed steps.
    pub fn completed_count(&self) -> usize {
        StepName::ALL
            .iter()
            .filter(|s| self.status(**s) == StepStatus::Completed)
            .count()
    }

    /// Overall progress percentage, rounded to two decimals.
    pub fn progress(&self) -> f64 {
        let completed = self.completed_count() as f64;
        let total = StepName::ALL.len() as f64;
        (completed / total * 10_000.0).round() / 100.0
    }

    /// True when every listed step is `completed`.
    pub fn all_completed(&self, steps: &[StepName]) -> bool {
        steps.iter().all(|s| self.status(*s) == StepStatus::Completed)
    }

    /// The subset of `steps` that is not yet `completed`.
    pub fn missing(&self, steps: &[StepName]) -> Vec<StepName> {
        steps
            .iter()
            .copied()
            .filter(|s| self.status(*s) != StepStatus::Completed)
            .collect()
    }
}

impl Default for StepStatusRecord {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// History entries
// ---------------------------------------------------------------------------

/// One quiz attempt, recorded regardless of pass/fail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub quiz: QuizKind,
    pub score: u32,
    pub passed: bool,
    pub recorded_at: DateTime<Utc>,
}

/// Result of dispatching a document through the e-signature service.
///
/// Persisted immediately after the remote send succeeds; its presence is
/// the proof that the side effect fired, which is what makes re-entry
/// after a crash safe.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentDispatch {
    pub tracking_id: String,
    pub signing_url: String,
    /// True when the remote service was unreachable and a local stand-in
    /// result was generated instead.
    pub simulated: bool,
    pub dispatched_at: DateTime<Utc>,
}

/// Outcome of one notification email attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum EmailOutcome {
    Sent,
    Failed { error: String },
}

/// Audit-trail entry for a notification email.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailLogEntry {
    pub template: String,
    pub subject: String,
    pub outcome: EmailOutcome,
    pub recorded_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Status view
// ---------------------------------------------------------------------------

/// One row of the status view: a step and its current status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepStatusEntry {
    pub step: StepName,
    pub status: StepStatus,
}

/// API-facing snapshot of an employee's onboarding progress.
///
/// Steps appear in pipeline order, regardless of hash-map iteration order
/// in the underlying record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OnboardingStatusView {
    pub steps: Vec<StepStatusEntry>,
    pub progress: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub last_updated: DateTime<Utc>,
}

impl From<&StepStatusRecord> for OnboardingStatusView {
    fn from(record: &StepStatusRecord) -> Self {
        Self {
            steps: StepName::ALL
                .iter()
                .map(|s| StepStatusEntry {
                    step: *s,
                    status: record.status(*s),
                })
                .collect(),
            progress: record.progress(),
            started_at: record.started_at,
            completed_at: record.completed_at,
            last_updated: record.last_updated,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_name_serde_snake_case() {
        let json = serde_json::to_string(&StepName::PolicyQuizPassed).unwrap();
        assert_eq!(json, "\"policy_quiz_passed\"");
        let parsed: StepName = serde_json::from_str("\"nda_signed\"").unwrap();
        assert_eq!(parsed, StepName::NdaSigned);
    }

    #[test]
    fn step_name_as_str_matches_serde() {
        for step in StepName::ALL {
            let json = serde_json::to_string(&step).unwrap();
            assert_eq!(json, format!("\"{}\"", step.as_str()));
        }
    }

    #[test]
    fn step_status_as_str_matches_serde() {
        for status in [
            StepStatus::NotStarted,
            StepStatus::InProgress,
            StepStatus::Waiting,
            StepStatus::Completed,
            StepStatus::Failed,
            StepStatus::Retry,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{}\"", status.as_str()));
        }
    }

    #[test]
    fn document_step_mapping() {
        assert_eq!(DocumentKind::Policy.sent_step(), StepName::PolicySent);
        assert_eq!(DocumentKind::Nda.signed_step(), StepName::NdaSigned);
        assert_eq!(
            DocumentKind::Guidelines.quiz().passed_step(),
            StepName::GuidelinesQuizPassed
        );
    }

    #[test]
    fn new_record_is_empty() {
        let record = StepStatusRecord::new();
        for step in StepName::ALL {
            assert_eq!(record.status(step), StepStatus::NotStarted);
        }
        assert_eq!(record.completed_count(), 0);
        assert_eq!(record.progress(), 0.0);
    }

    #[test]
    fn set_status_transitions() {
        let mut record = StepStatusRecord::new();
        assert!(record.set_status(StepName::PolicySent, StepStatus::InProgress));
        assert_eq!(record.status(StepName::PolicySent), StepStatus::InProgress);
        assert!(record.set_status(StepName::PolicySent, StepStatus::Completed));
        assert_eq!(record.status(StepName::PolicySent), StepStatus::Completed);
    }

    #[test]
    fn completed_step_is_immutable() {
        let mut record = StepStatusRecord::new();
        record.set_status(StepName::PolicySigned, StepStatus::Completed);

        // Re-delivery of the same event must not regress the step.
        assert!(!record.set_status(StepName::PolicySigned, StepStatus::Waiting));
        assert!(!record.set_status(StepName::PolicySigned, StepStatus::NotStarted));
        assert_eq!(record.status(StepName::PolicySigned), StepStatus::Completed);
    }

    #[test]
    fn progress_is_derived_from_completed_count() {
        let mut record = StepStatusRecord::new();
        record.set_status(StepName::PolicySent, StepStatus::Completed);
        record.set_status(StepName::PolicySigned, StepStatus::Completed);
        record.set_status(StepName::PolicyQuizPassed, StepStatus::Completed);
        assert_eq!(record.completed_count(), 3);
        assert_eq!(record.progress(), 25.0);

        // Non-completed statuses do not count.
        record.set_status(StepName::NdaSent, StepStatus::InProgress);
        assert_eq!(record.progress(), 25.0);
    }

    #[test]
    fn attempt_counts_accumulate() {
        let mut record = StepStatusRecord::new();
        assert_eq!(record.attempt_count(StepName::NdaSent), 0);
        assert_eq!(record.record_attempt(StepName::NdaSent), 1);
        assert_eq!(record.record_attempt(StepName::NdaSent), 2);
        assert_eq!(record.attempt_count(StepName::NdaSent), 2);
    }

    #[test]
    fn missing_lists_incomplete_steps() {
        let mut record = StepStatusRecord::new();
        record.set_status(StepName::PolicySigned, StepStatus::Completed);
        let gates = [StepName::PolicySigned, StepName::NdaSigned];
        assert!(!record.all_completed(&gates));
        assert_eq!(record.missing(&gates), vec![StepName::NdaSigned]);
    }

    #[test]
    fn record_json_roundtrip() {
        let mut record = StepStatusRecord::new();
        record.set_status(StepName::PolicySent, StepStatus::Completed);
        record.set_status(StepName::PolicySigned, StepStatus::Waiting);
        record.record_attempt(StepName::PolicySent);
        record.started_at = Some(Utc::now());

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"policy_sent\":\"completed\""));

        let parsed: StepStatusRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.status(StepName::PolicySent), StepStatus::Completed);
        assert_eq!(parsed.status(StepName::PolicySigned), StepStatus::Waiting);
        assert_eq!(parsed.attempt_count(StepName::PolicySent), 1);
        assert!(parsed.started_at.is_some());
    }

    #[test]
    fn status_view_is_pipeline_ordered() {
        let mut record = StepStatusRecord::new();
        record.set_status(StepName::GuidelinesSent, StepStatus::Completed);

        let view = OnboardingStatusView::from(&record);
        assert_eq!(view.steps.len(), 12);
        assert_eq!(view.steps[0].step, StepName::PolicySent);
        assert_eq!(view.steps[11].step, StepName::OnboardingCallScheduled);
        assert_eq!(view.steps[6].status, StepStatus::Completed);
        assert!((view.progress - 8.33).abs() < 0.001);
    }

    #[test]
    fn email_outcome_serde() {
        let sent = serde_json::to_string(&EmailOutcome::Sent).unwrap();
        assert!(sent.contains("\"status\":\"sent\""));

        let failed = EmailOutcome::Failed {
            error: "connection refused".to_string(),
        };
        let json = serde_json::to_string(&failed).unwrap();
        assert!(json.contains("\"status\":\"failed\""));
        let parsed: EmailOutcome = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, failed);
    }

    #[test]
    fn quiz_attempt_roundtrip() {
        let attempt = QuizAttempt {
            quiz: QuizKind::Nda,
            score: 85,
            passed: true,
            recorded_at: Utc::now(),
        };
        let json = serde_json::to_string(&attempt).unwrap();
        assert!(json.contains("\"quiz\":\"nda\""));
        let parsed: QuizAttempt = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.score, 85);
        assert!(parsed.passed);
    }
}
