//! Notification email content.
//!
//! Deterministic plain-text templates. Content generation is intentionally
//! simple; the email service is a single-call collaborator and the
//! compliance gates never depend on notification delivery.

use onramp_types::onboarding::DocumentKind;

/// Body for the "document ready for review" notification.
pub fn document_ready(name: &str, document: DocumentKind) -> String {
    format!(
        "Hi {name},\n\nYour {} is ready for review and signature. \
         Please check your inbox for the signing link.\n\nHR Team",
        document.title()
    )
}

/// Body for the workspace (Slack) invitation.
pub fn slack_invite(name: &str) -> String {
    format!(
        "Hi {name},\n\nYou've been invited to join our Slack workspace. \
         Accept the invitation to meet the team and find your channels.\n\nHR Team"
    )
}

/// Body for the issue-tracker (Jira) access grant.
pub fn jira_access(name: &str) -> String {
    format!(
        "Hi {name},\n\nYour Jira access has been granted. Log in with your \
         company account to see your onboarding board.\n\nHR Team"
    )
}

/// Body for the onboarding-call scheduling email.
pub fn onboarding_call(name: &str, scheduling_link: &str) -> String {
    format!(
        "Hi {name},\n\nPlease schedule your onboarding call with your \
         manager at: {scheduling_link}\n\nHR Team"
    )
}
