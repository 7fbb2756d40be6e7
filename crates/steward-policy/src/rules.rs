//! Action eligibility and sensitivity routing.
//!
//! These are pure tables: given a status, an action, and (for review
//! actions) the caller's workflow role, they answer yes or no. The
//! applicant-identity check for submit/withdraw/appeal is the engine's
//! responsibility; role is irrelevant for those actions.

use serde::{Deserialize, Serialize};
use steward_types::{RequestStatus, Sensitivity, WorkflowRole};

/// An operation a caller can ask the workflow engine to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    /// Move a draft into PI review.
    Submit,
    /// Pull the request out of the pipeline before a decision.
    Withdraw,
    /// Decide the PI review stage.
    PiReview,
    /// Decide the ethics review stage.
    EthicsReview,
    /// Decide the admin review stage.
    AdminReview,
    /// Supersede the automated outcome while still in AI review.
    ManualOverride,
    /// Contest a rejection.
    Appeal,
}

/// Whether `action` is allowed on a request in `status` for a caller
/// holding `role`.
///
/// Review actions are both status- and role-gated; submit, withdraw,
/// and appeal are status-gated only (the engine additionally requires
/// the caller to be the applicant for those).
///
/// # Examples
///
/// ```
/// use steward_policy::{Action, can_perform};
/// use steward_types::{RequestStatus, WorkflowRole};
///
/// assert!(can_perform(RequestStatus::Draft, Action::Submit, None));
/// assert!(can_perform(
///     RequestStatus::PendingPi,
///     Action::PiReview,
///     Some(WorkflowRole::Pi),
/// ));
/// assert!(!can_perform(
///     RequestStatus::PendingPi,
///     Action::PiReview,
///     Some(WorkflowRole::Ethics),
/// ));
/// ```
pub fn can_perform(status: RequestStatus, action: Action, role: Option<WorkflowRole>) -> bool {
    match action {
        Action::Submit => status == RequestStatus::Draft,
        Action::Withdraw => status == RequestStatus::Draft || status.is_pending_review(),
        Action::PiReview => status == RequestStatus::PendingPi && role == Some(WorkflowRole::Pi),
        Action::EthicsReview => {
            status == RequestStatus::PendingEthics && role == Some(WorkflowRole::Ethics)
        }
        Action::AdminReview => {
            status == RequestStatus::PendingAdmin && role == Some(WorkflowRole::Administrator)
        }
        Action::ManualOverride => {
            status == RequestStatus::AiReview && role == Some(WorkflowRole::Administrator)
        }
        Action::Appeal => status == RequestStatus::Rejected,
    }
}

/// Next status after an ethics approval.
///
/// High and critical sensitivity requests must pass admin review;
/// normal sensitivity skips straight to the automated assessment.
pub fn route_after_ethics_approval(sensitivity: Sensitivity) -> RequestStatus {
    if sensitivity.requires_admin_review() {
        RequestStatus::PendingAdmin
    } else {
        RequestStatus::AiReview
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_submit_only_from_draft() {
        assert!(can_perform(RequestStatus::Draft, Action::Submit, None));
        for status in [
            RequestStatus::PendingPi,
            RequestStatus::Approved,
            RequestStatus::Rejected,
            RequestStatus::Locked,
        ] {
            assert!(!can_perform(status, Action::Submit, None));
        }
    }

    #[test_case(RequestStatus::Draft, true; "draft")]
    #[test_case(RequestStatus::PendingPi, true; "pending pi")]
    #[test_case(RequestStatus::PendingEthics, true; "pending ethics")]
    #[test_case(RequestStatus::PendingAdmin, true; "pending admin")]
    #[test_case(RequestStatus::AiReview, false; "ai review")]
    #[test_case(RequestStatus::Approved, false; "approved")]
    #[test_case(RequestStatus::Rejected, false; "rejected")]
    #[test_case(RequestStatus::Locked, false; "locked")]
    #[test_case(RequestStatus::Appealed, false; "appealed")]
    fn test_withdraw_window(status: RequestStatus, allowed: bool) {
        assert_eq!(can_perform(status, Action::Withdraw, None), allowed);
    }

    #[test]
    fn test_review_actions_are_role_gated() {
        assert!(can_perform(
            RequestStatus::PendingPi,
            Action::PiReview,
            Some(WorkflowRole::Pi),
        ));
        assert!(!can_perform(
            RequestStatus::PendingPi,
            Action::PiReview,
            Some(WorkflowRole::Administrator),
        ));
        assert!(!can_perform(RequestStatus::PendingPi, Action::PiReview, None));

        assert!(can_perform(
            RequestStatus::PendingEthics,
            Action::EthicsReview,
            Some(WorkflowRole::Ethics),
        ));
        assert!(!can_perform(
            RequestStatus::PendingEthics,
            Action::EthicsReview,
            Some(WorkflowRole::Pi),
        ));

        assert!(can_perform(
            RequestStatus::PendingAdmin,
            Action::AdminReview,
            Some(WorkflowRole::Administrator),
        ));
        assert!(!can_perform(
            RequestStatus::PendingAdmin,
            Action::AdminReview,
            Some(WorkflowRole::Ethics),
        ));
    }

    #[test]
    fn test_review_actions_require_matching_status() {
        // Right role, wrong stage.
        assert!(!can_perform(
            RequestStatus::PendingEthics,
            Action::PiReview,
            Some(WorkflowRole::Pi),
        ));
        assert!(!can_perform(
            RequestStatus::Draft,
            Action::AdminReview,
            Some(WorkflowRole::Administrator),
        ));
    }

    #[test]
    fn test_manual_override_window() {
        assert!(can_perform(
            RequestStatus::AiReview,
            Action::ManualOverride,
            Some(WorkflowRole::Administrator),
        ));
        assert!(!can_perform(
            RequestStatus::AiReview,
            Action::ManualOverride,
            Some(WorkflowRole::Pi),
        ));
        assert!(!can_perform(
            RequestStatus::Approved,
            Action::ManualOverride,
            Some(WorkflowRole::Administrator),
        ));
    }

    #[test]
    fn test_appeal_only_from_rejected() {
        assert!(can_perform(RequestStatus::Rejected, Action::Appeal, None));
        assert!(!can_perform(RequestStatus::Appealed, Action::Appeal, None));
        assert!(!can_perform(RequestStatus::Approved, Action::Appeal, None));
        assert!(!can_perform(RequestStatus::Locked, Action::Appeal, None));
    }

    #[test]
    fn test_routing_by_sensitivity() {
        assert_eq!(
            route_after_ethics_approval(Sensitivity::Normal),
            RequestStatus::AiReview
        );
        assert_eq!(
            route_after_ethics_approval(Sensitivity::High),
            RequestStatus::PendingAdmin
        );
        assert_eq!(
            route_after_ethics_approval(Sensitivity::Critical),
            RequestStatus::PendingAdmin
        );
    }
}
