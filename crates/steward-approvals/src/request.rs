//! The access-request entity.
//!
//! A [`RequestRecord`] is created in `Draft` by an applicant, mutated
//! exclusively through the workflow engine, and never physically
//! deleted: rejected, withdrawn, and locked requests are retained for
//! the audit record. Descriptive fields are fixed at creation; only the
//! workflow fields change, and only through engine transitions.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use steward_policy::RiskAssessment;
use steward_types::{ActorId, RequestId, RequestStatus, Sensitivity};

use crate::audit::{self, AuditAction, AuditEntry};

/// Applicant-supplied fields for a new request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestDraft {
    pub title: String,
    pub description: String,
    /// Fixed at creation; drives routing and risk-model strictness.
    pub sensitivity: Sensitivity,
    /// Identifier of the dataset in the (external) catalog.
    pub dataset: String,
    pub justification: String,
    pub access_purpose: String,
    pub time_range_start: Option<DateTime<Utc>>,
    pub time_range_end: Option<DateTime<Utc>>,
    /// Dataset fields the applicant needs access to.
    pub data_fields: BTreeSet<String>,
}

impl RequestDraft {
    pub fn new(
        title: impl Into<String>,
        sensitivity: Sensitivity,
        dataset: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            sensitivity,
            dataset: dataset.into(),
            justification: String::new(),
            access_purpose: String::new(),
            time_range_start: None,
            time_range_end: None,
            data_fields: BTreeSet::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_justification(mut self, justification: impl Into<String>) -> Self {
        self.justification = justification.into();
        self
    }

    pub fn with_access_purpose(mut self, purpose: impl Into<String>) -> Self {
        self.access_purpose = purpose.into();
        self
    }

    pub fn with_time_range(mut self, start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        self.time_range_start = Some(start);
        self.time_range_end = Some(end);
        self
    }

    pub fn with_data_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.data_fields = fields.into_iter().map(Into::into).collect();
        self
    }
}

/// One human review stage's outcome.
///
/// Set exactly once per stage pass; overwritten only when the stage is
/// revisited after a bounce-to-draft rework cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageReview {
    pub reviewer: ActorId,
    pub reviewed_at: DateTime<Utc>,
    pub comment: String,
    pub approved: bool,
}

/// Recorded access grant. Modeled only: no cryptographic enforcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrant {
    /// Opaque token string.
    pub token: String,
    pub granted_at: DateTime<Utc>,
    /// `granted_at` plus the configured validity window.
    pub expires_at: DateTime<Utc>,
}

/// External arbiter's ruling on an appeal.
///
/// Never auto-populated by this engine; the arbiter is an external
/// collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ArbiterDecision {
    Upheld,
    Overturned,
    Pending,
}

/// An appeal against a rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appeal {
    pub submitted_at: DateTime<Utc>,
    pub reason: String,
    pub arbiter_decision: ArbiterDecision,
}

/// One data-access request and its complete workflow state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    /// Unique, immutable, assigned at creation by the store.
    pub id: RequestId,
    /// Identity that created the request; the only party who may
    /// submit, withdraw, or appeal it.
    pub applicant: ActorId,
    pub created_at: DateTime<Utc>,

    // -- Descriptive fields, fixed at creation --
    pub title: String,
    pub description: String,
    pub sensitivity: Sensitivity,
    pub dataset: String,
    pub justification: String,
    pub access_purpose: String,
    pub time_range_start: Option<DateTime<Utc>>,
    pub time_range_end: Option<DateTime<Utc>>,
    pub data_fields: BTreeSet<String>,

    // -- Workflow position --
    /// Single source of truth for workflow position.
    pub status: RequestStatus,
    /// Progress-display mirror of `status`; always `status.step()`.
    pub current_step: u8,

    // -- Review stages --
    pub pi_review: Option<StageReview>,
    pub ethics_review: Option<StageReview>,
    pub admin_review: Option<StageReview>,

    /// Output of the automated review stage.
    pub risk_assessment: Option<RiskAssessment>,

    /// Set only on terminal approval.
    pub access_grant: Option<AccessGrant>,

    // -- Compliance --
    /// Monotonic non-decreasing count of compliance violations.
    pub violations_count: u32,
    pub locked_at: Option<DateTime<Utc>>,
    pub locked_reason: Option<String>,

    pub appeal: Option<Appeal>,

    /// Append-only evidentiary log; see [`crate::audit`].
    pub audit_trail: Vec<AuditEntry>,
}

impl RequestRecord {
    /// Build a fresh record in `Draft` with its creation audit entry.
    ///
    /// The store is the only caller; it supplies the id from its
    /// durable counter.
    pub(crate) fn new(id: RequestId, draft: RequestDraft, applicant: ActorId) -> Self {
        let mut record = Self {
            id,
            applicant: applicant.clone(),
            created_at: Utc::now(),
            title: draft.title,
            description: draft.description,
            sensitivity: draft.sensitivity,
            dataset: draft.dataset,
            justification: draft.justification,
            access_purpose: draft.access_purpose,
            time_range_start: draft.time_range_start,
            time_range_end: draft.time_range_end,
            data_fields: draft.data_fields,
            status: RequestStatus::Draft,
            current_step: RequestStatus::Draft.step(),
            pi_review: None,
            ethics_review: None,
            admin_review: None,
            risk_assessment: None,
            access_grant: None,
            violations_count: 0,
            locked_at: None,
            locked_reason: None,
            appeal: None,
            audit_trail: Vec::new(),
        };

        audit::append(
            &mut record.audit_trail,
            AuditAction::RequestCreated,
            applicant,
            format!("Created request for dataset: {}", record.dataset),
            None,
            Some(RequestStatus::Draft),
        );

        // Post-condition: the creation-entry invariant holds from birth
        assert!(
            audit::verify(&record.audit_trail).is_ok(),
            "creation entry must satisfy the trail invariants"
        );

        record
    }

    /// Move to `status`, keeping `current_step` consistent.
    ///
    /// Every transition goes through here; the step mirror is never
    /// assigned directly.
    pub(crate) fn set_status(&mut self, status: RequestStatus) {
        self.status = status;
        self.current_step = status.step();
    }

    /// Whether the grant (if any) is still valid at `now`.
    pub fn has_valid_grant(&self, now: DateTime<Utc>) -> bool {
        self.status == RequestStatus::Approved
            && self
                .access_grant
                .as_ref()
                .is_some_and(|grant| now < grant.expires_at)
    }

    /// Human-readable workflow position for progress displays.
    pub fn workflow_stage(&self) -> &'static str {
        self.status.step_label()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn record() -> RequestRecord {
        RequestRecord::new(
            RequestId::new(1),
            RequestDraft::new("Sleep study", Sensitivity::Normal, "sleep-2024")
                .with_justification("longitudinal analysis")
                .with_data_fields(["age", "heart_rate"]),
            ActorId::new("alice"),
        )
    }

    #[test]
    fn test_new_record_starts_in_draft() {
        let record = record();
        assert_eq!(record.status, RequestStatus::Draft);
        assert_eq!(record.current_step, 1);
        assert_eq!(record.violations_count, 0);
        assert!(record.pi_review.is_none());
        assert!(record.access_grant.is_none());
        assert!(record.appeal.is_none());
    }

    #[test]
    fn test_creation_audit_entry() {
        let record = record();
        assert_eq!(record.audit_trail.len(), 1);

        let entry = &record.audit_trail[0];
        assert_eq!(entry.id, 1);
        assert_eq!(entry.action, AuditAction::RequestCreated);
        assert_eq!(entry.actor, ActorId::new("alice"));
        assert_eq!(entry.previous_status, None);
        assert_eq!(entry.new_status, Some(RequestStatus::Draft));
        assert!(entry.details.contains("sleep-2024"));
    }

    #[test]
    fn test_set_status_keeps_step_in_lockstep() {
        let mut record = record();
        for status in [
            RequestStatus::PendingPi,
            RequestStatus::PendingEthics,
            RequestStatus::PendingAdmin,
            RequestStatus::AiReview,
            RequestStatus::Approved,
        ] {
            record.set_status(status);
            assert_eq!(record.current_step, status.step());
        }
    }

    #[test]
    fn test_grant_validity_window() {
        let mut record = record();
        let now = Utc::now();

        // No grant while in draft.
        assert!(!record.has_valid_grant(now));

        record.set_status(RequestStatus::Approved);
        record.access_grant = Some(AccessGrant {
            token: "grant-1-test".to_string(),
            granted_at: now,
            expires_at: now + Duration::days(90),
        });

        assert!(record.has_valid_grant(now + Duration::days(89)));
        assert!(!record.has_valid_grant(now + Duration::days(91)));
    }

    #[test]
    fn test_draft_builder() {
        let start = Utc::now();
        let end = start + Duration::days(30);
        let draft = RequestDraft::new("T", Sensitivity::High, "d")
            .with_description("desc")
            .with_access_purpose("replication")
            .with_time_range(start, end)
            .with_data_fields(["b", "a", "b"]);

        assert_eq!(draft.description, "desc");
        assert_eq!(draft.access_purpose, "replication");
        assert_eq!(draft.time_range_start, Some(start));
        // Set semantics: duplicates collapse, order is stable.
        assert_eq!(
            draft.data_fields.iter().collect::<Vec<_>>(),
            vec!["a", "b"]
        );
    }

    #[test]
    fn test_record_serde_round_trip() {
        let record = record();
        let json = serde_json::to_string(&record).unwrap();
        let back: RequestRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }
}
