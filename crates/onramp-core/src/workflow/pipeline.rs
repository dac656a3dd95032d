//! The fixed onboarding pipeline topology.
//!
//! The pipeline is a straight line of nine stages (three documents, each
//! followed by a signature gate and a quiz gate) plus a terminal fan-out of
//! three provisioning tasks. The topology never changes at runtime, so it
//! is a const table iterated in order rather than a general graph.

use onramp_types::onboarding::{DocumentKind, QuizKind, StepName};

/// What a stage does when the engine reaches it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    /// Side-effecting step: dispatch a document for signature.
    Dispatch(DocumentKind),
    /// Gate satisfied only by a signature webhook.
    SignatureGate(DocumentKind),
    /// Gate satisfied only by a passing quiz-result webhook.
    QuizGate(QuizKind),
}

/// One stage of the ordered pipeline.
#[derive(Debug, Clone, Copy)]
pub struct Stage {
    pub step: StepName,
    pub kind: StageKind,
}

/// The nine ordered stages, in execution order.
pub const STAGES: [Stage; 9] = [
    Stage {
        step: StepName::PolicySent,
        kind: StageKind::Dispatch(DocumentKind::Policy),
    },
    Stage {
        step: StepName::PolicySigned,
        kind: StageKind::SignatureGate(DocumentKind::Policy),
    },
    Stage {
        step: StepName::PolicyQuizPassed,
        kind: StageKind::QuizGate(QuizKind::Policy),
    },
    Stage {
        step: StepName::NdaSent,
        kind: StageKind::Dispatch(DocumentKind::Nda),
    },
    Stage {
        step: StepName::NdaSigned,
        kind: StageKind::SignatureGate(DocumentKind::Nda),
    },
    Stage {
        step: StepName::NdaQuizPassed,
        kind: StageKind::QuizGate(QuizKind::Nda),
    },
    Stage {
        step: StepName::GuidelinesSent,
        kind: StageKind::Dispatch(DocumentKind::Guidelines),
    },
    Stage {
        step: StepName::GuidelinesSigned,
        kind: StageKind::SignatureGate(DocumentKind::Guidelines),
    },
    Stage {
        step: StepName::GuidelinesQuizPassed,
        kind: StageKind::QuizGate(QuizKind::Guidelines),
    },
];

/// The ordered step names of the nine pipeline stages.
pub const ORDERED_STEPS: [StepName; 9] = [
    StepName::PolicySent,
    StepName::PolicySigned,
    StepName::PolicyQuizPassed,
    StepName::NdaSent,
    StepName::NdaSigned,
    StepName::NdaQuizPassed,
    StepName::GuidelinesSent,
    StepName::GuidelinesSigned,
    StepName::GuidelinesQuizPassed,
];

/// The six gates that must all be `completed` before final provisioning.
pub const FINAL_GATES: [StepName; 6] = [
    StepName::PolicySigned,
    StepName::PolicyQuizPassed,
    StepName::NdaSigned,
    StepName::NdaQuizPassed,
    StepName::GuidelinesSigned,
    StepName::GuidelinesQuizPassed,
];

/// The three final provisioning steps (unordered w.r.t. each other).
pub const FINAL_TASK_STEPS: [StepName; 3] = [
    StepName::SlackInviteSent,
    StepName::JiraAccessGranted,
    StepName::OnboardingCallScheduled,
];

/// Steps that must be `completed` before `step` is allowed to fire.
///
/// For a pipeline step this is every step preceding it in the fixed order;
/// for a final task it is all nine pipeline steps.
pub fn prerequisites(step: StepName) -> &'static [StepName] {
    match ORDERED_STEPS.iter().position(|s| *s == step) {
        Some(index) => &ORDERED_STEPS[..index],
        None => &ORDERED_STEPS,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
