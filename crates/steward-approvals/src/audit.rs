//! Per-request audit trail.
//!
//! Every state-changing engine operation appends exactly one entry to
//! the affected record's trail, after the mutation it describes, with
//! `previous_status`/`new_status` bracketing the transition. The trail
//! is the sole evidentiary mechanism: entries are never mutated,
//! reordered, or truncated after append. This is a structural guarantee
//! -- the API provides no mutation or deletion surface.
//!
//! # Invariants
//!
//! - Entry ids are sequential and 1-based per record.
//! - The first entry is always [`AuditAction::RequestCreated`] with
//!   `new_status = Draft` and no previous status.
//! - Every subsequent entry's `previous_status` equals the record's
//!   status immediately before the entry was appended.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use steward_types::{ActorId, RequestStatus};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuditError {
    #[error("Audit trail is empty")]
    Empty,

    #[error("Entry {position} has id {id}, expected {expected}")]
    NonSequentialId { position: usize, id: u32, expected: u32 },

    #[error("First entry must be REQUEST_CREATED with new status DRAFT")]
    MalformedCreationEntry,

    #[error("Entry {id} brackets {found:?} but the preceding entry ended at {expected:?}")]
    BrokenBracketing {
        id: u32,
        found: Option<RequestStatus>,
        expected: Option<RequestStatus>,
    },
}

/// What happened, as recorded in the audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    RequestCreated,
    RequestSubmitted,
    PiApproved,
    PiRejected,
    EthicsApproved,
    EthicsRejected,
    AdminApproved,
    AdminRejected,
    AiReviewCompleted,
    ManualOverride,
    RequestWithdrawn,
    AppealSubmitted,
    RequestLocked,
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            Self::RequestCreated => "REQUEST_CREATED",
            Self::RequestSubmitted => "REQUEST_SUBMITTED",
            Self::PiApproved => "PI_APPROVED",
            Self::PiRejected => "PI_REJECTED",
            Self::EthicsApproved => "ETHICS_APPROVED",
            Self::EthicsRejected => "ETHICS_REJECTED",
            Self::AdminApproved => "ADMIN_APPROVED",
            Self::AdminRejected => "ADMIN_REJECTED",
            Self::AiReviewCompleted => "AI_REVIEW_COMPLETED",
            Self::ManualOverride => "MANUAL_OVERRIDE",
            Self::RequestWithdrawn => "REQUEST_WITHDRAWN",
            Self::AppealSubmitted => "APPEAL_SUBMITTED",
            Self::RequestLocked => "REQUEST_LOCKED",
        };
        write!(f, "{tag}")
    }
}

/// One immutable trail entry.
///
/// All fields are set at append time and never change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Sequential 1-based id within this record's trail.
    pub id: u32,
    /// When the entry was appended.
    pub timestamp: DateTime<Utc>,
    /// What happened.
    pub action: AuditAction,
    /// Who did it (a reviewer, the applicant, `SYSTEM`, or `AI_SYSTEM`).
    pub actor: ActorId,
    /// Free-text context.
    pub details: String,
    /// Status immediately before the change. Absent only on the
    /// creation entry.
    pub previous_status: Option<RequestStatus>,
    /// Status immediately after the change.
    pub new_status: Option<RequestStatus>,
}

/// Append an entry to `trail`, assigning the next sequential id.
///
/// # Assertions
///
/// - Post: trail length increases by exactly 1
/// - Post: the new entry's id equals the new length
pub fn append(
    trail: &mut Vec<AuditEntry>,
    action: AuditAction,
    actor: ActorId,
    details: impl Into<String>,
    previous_status: Option<RequestStatus>,
    new_status: Option<RequestStatus>,
) -> &AuditEntry {
    let len_before = trail.len();

    trail.push(AuditEntry {
        id: u32::try_from(len_before + 1).unwrap_or(u32::MAX),
        timestamp: Utc::now(),
        action,
        actor,
        details: details.into(),
        previous_status,
        new_status,
    });

    // Post-condition: exactly one entry appended, sequentially numbered
    assert_eq!(trail.len(), len_before + 1, "append must add one entry");
    let entry = trail.last().expect("just pushed");
    assert_eq!(entry.id as usize, trail.len(), "ids must stay sequential");

    entry
}

/// Check the structural invariants of a trail.
///
/// Used when loading records from a durable backend and in tests;
/// the append path maintains these by construction.
pub fn verify(trail: &[AuditEntry]) -> Result<(), AuditError> {
    let first = trail.first().ok_or(AuditError::Empty)?;

    if first.action != AuditAction::RequestCreated
        || first.new_status != Some(RequestStatus::Draft)
        || first.previous_status.is_some()
    {
        return Err(AuditError::MalformedCreationEntry);
    }

    let mut expected_status = first.new_status;
    for (position, entry) in trail.iter().enumerate() {
        let expected_id = u32::try_from(position + 1).unwrap_or(u32::MAX);
        if entry.id != expected_id {
            return Err(AuditError::NonSequentialId {
                position,
                id: entry.id,
                expected: expected_id,
            });
        }

        if position > 0 {
            if entry.previous_status != expected_status {
                return Err(AuditError::BrokenBracketing {
                    id: entry.id,
                    found: entry.previous_status,
                    expected: expected_status,
                });
            }
            expected_status = entry.new_status;
        }
    }

    Ok(())
}
