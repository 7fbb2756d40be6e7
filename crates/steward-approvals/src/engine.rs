//! The workflow engine.
//!
//! Orchestrates every state transition of an access request: validates
//! the caller against the policy tables, mutates a working copy of the
//! record, appends the audit entries bracketing the change, and commits
//! through the store. Validate-then-mutate-then-log-then-commit is one
//! atomic unit: a failed commit leaves the store exactly as before, so
//! a transition is never partially applied.
//!
//! The automated review is an explicit post-transition step: whenever a
//! transition lands a request in `AiReview`, the engine runs the
//! injected [`RiskModel`] as the tail of that same transition and
//! appends a second audit entry for it. Swapping or mocking the model
//! never touches the transition code.
//!
//! # Example
//!
//! ```
//! use steward_approvals::engine::{EngineOptions, WorkflowEngine};
//! use steward_approvals::request::RequestDraft;
//! use steward_approvals::store::MemoryBackend;
//! use steward_policy::FixedRiskModel;
//! use steward_types::{ActorId, RequestStatus, Sensitivity, WorkflowRole};
//!
//! let mut engine = WorkflowEngine::open(
//!     MemoryBackend::new(),
//!     Box::new(FixedRiskModel::approving()),
//!     EngineOptions::default(),
//! )?;
//!
//! let alice = ActorId::new("alice");
//! let draft = RequestDraft::new("Sleep study", Sensitivity::Normal, "sleep-2024");
//! let record = engine.create_request(draft, alice.clone())?;
//!
//! engine.submit_request(record.id, &alice)?;
//! engine.pi_review(record.id, ActorId::new("dr-lee"), WorkflowRole::Pi, true, "sound")?;
//! let decided = engine.ethics_review(
//!     record.id,
//!     ActorId::new("board"),
//!     WorkflowRole::Ethics,
//!     true,
//!     "approved",
//! )?;
//!
//! // Normal sensitivity skips admin review; the automated stage ran
//! // synchronously and (with an always-approving model) granted access.
//! assert_eq!(decided.status, RequestStatus::Approved);
//! assert!(decided.access_grant.is_some());
//! # Ok::<(), steward_approvals::engine::EngineError>(())
//! ```

use chrono::{Duration, Utc};
use steward_policy::{
    Action, ReviewRequiredResolution, RiskModel, RiskRecommendation, can_perform,
    route_after_ethics_approval,
};
use steward_types::{ActorId, RequestId, RequestStatus, WorkflowRole};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit::{self, AuditAction};
use crate::request::{AccessGrant, Appeal, ArbiterDecision, RequestDraft, RequestRecord, StageReview};
use crate::store::{DurableBackend, RequestStore, StoreError};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Request not found: {0}")]
    NotFound(RequestId),

    #[error("Action {action:?} not permitted in status {status} for role {role:?}")]
    NotPermitted {
        action: Action,
        status: RequestStatus,
        role: Option<WorkflowRole>,
    },

    #[error("Actor {actor} is not the applicant of request {id}")]
    NotApplicant { id: RequestId, actor: ActorId },

    #[error("Storage error: {0}")]
    Storage(StoreError),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => Self::NotFound(id),
            other => Self::Storage(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

/// Engine tunables.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Days an access grant stays valid after approval.
    pub grant_validity_days: i64,
    /// How a `ReviewRequired` automated outcome resolves.
    pub review_required: ReviewRequiredResolution,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            grant_validity_days: 90,
            review_required: ReviewRequiredResolution::default(),
        }
    }
}

/// The approval-workflow engine.
///
/// One engine per store; multiple isolated instances may coexist (test
/// isolation, multi-tenant hosting). Operations on a given request are
/// assumed not to be invoked concurrently by independent callers; a
/// server hosting this engine over a network must add per-record mutual
/// exclusion before allowing concurrent callers.
pub struct WorkflowEngine<B: DurableBackend> {
    store: RequestStore<B>,
    risk_model: Box<dyn RiskModel>,
    options: EngineOptions,
}

impl<B: DurableBackend> WorkflowEngine<B> {
    /// Open an engine over `backend` with the given risk model.
    pub fn open(
        backend: B,
        risk_model: Box<dyn RiskModel>,
        options: EngineOptions,
    ) -> Result<Self> {
        Ok(Self {
            store: RequestStore::open(backend)?,
            risk_model,
            options,
        })
    }

    // ========================================================================
    // Transitions
    // ========================================================================

    /// Create a new request in `Draft`.
    pub fn create_request(
        &mut self,
        draft: RequestDraft,
        applicant: ActorId,
    ) -> Result<RequestRecord> {
        let record = self.store.create(draft, applicant)?;
        info!(id = %record.id, dataset = %record.dataset, "request created");
        Ok(record)
    }

    /// Submit a draft for PI review. Applicant only.
    pub fn submit_request(&mut self, id: RequestId, actor: &ActorId) -> Result<RequestRecord> {
        let mut record = self.store.get(id)?;
        self.authorize(&record, Action::Submit, None)?;
        Self::require_applicant(&record, actor)?;

        record.set_status(RequestStatus::PendingPi);
        audit::append(
            &mut record.audit_trail,
            AuditAction::RequestSubmitted,
            actor.clone(),
            "Request submitted for PI review",
            Some(RequestStatus::Draft),
            Some(RequestStatus::PendingPi),
        );

        self.commit(record, "submitted")
    }

    /// Decide the PI review stage.
    ///
    /// Approval advances to ethics review; rejection bounces the
    /// request back to `Draft` for rework.
    pub fn pi_review(
        &mut self,
        id: RequestId,
        reviewer: ActorId,
        role: WorkflowRole,
        approved: bool,
        comment: &str,
    ) -> Result<RequestRecord> {
        let mut record = self.store.get(id)?;
        self.authorize(&record, Action::PiReview, Some(role))?;

        record.pi_review = Some(StageReview {
            reviewer: reviewer.clone(),
            reviewed_at: Utc::now(),
            comment: comment.to_string(),
            approved,
        });

        let next = if approved {
            RequestStatus::PendingEthics
        } else {
            RequestStatus::Draft
        };
        record.set_status(next);

        audit::append(
            &mut record.audit_trail,
            if approved {
                AuditAction::PiApproved
            } else {
                AuditAction::PiRejected
            },
            reviewer,
            format!(
                "PI review: {}. Comment: {comment}",
                if approved { "Approved" } else { "Rejected" }
            ),
            Some(RequestStatus::PendingPi),
            Some(next),
        );

        self.commit(record, "pi review recorded")
    }

    /// Decide the ethics review stage.
    ///
    /// Approval routes by sensitivity: high and critical requests go on
    /// to admin review; normal requests enter automated review, which
    /// runs synchronously as the tail of this transition. Rejection
    /// bounces back to `Draft`.
    pub fn ethics_review(
        &mut self,
        id: RequestId,
        reviewer: ActorId,
        role: WorkflowRole,
        approved: bool,
        comment: &str,
    ) -> Result<RequestRecord> {
        let mut record = self.store.get(id)?;
        self.authorize(&record, Action::EthicsReview, Some(role))?;

        record.ethics_review = Some(StageReview {
            reviewer: reviewer.clone(),
            reviewed_at: Utc::now(),
            comment: comment.to_string(),
            approved,
        });

        let next = if approved {
            route_after_ethics_approval(record.sensitivity)
        } else {
            RequestStatus::Draft
        };
        record.set_status(next);

        audit::append(
            &mut record.audit_trail,
            if approved {
                AuditAction::EthicsApproved
            } else {
                AuditAction::EthicsRejected
            },
            reviewer,
            format!(
                "Ethics review: {}. Comment: {comment}",
                if approved { "Approved" } else { "Rejected" }
            ),
            Some(RequestStatus::PendingEthics),
            Some(next),
        );

        if record.status == RequestStatus::AiReview {
            self.run_automated_review(&mut record);
        }

        self.commit(record, "ethics review recorded")
    }

    /// Decide the admin review stage.
    ///
    /// Approval enters automated review (run synchronously); rejection
    /// bounces back to `Draft`.
    pub fn admin_review(
        &mut self,
        id: RequestId,
        reviewer: ActorId,
        role: WorkflowRole,
        approved: bool,
        comment: &str,
    ) -> Result<RequestRecord> {
        let mut record = self.store.get(id)?;
        self.authorize(&record, Action::AdminReview, Some(role))?;

        record.admin_review = Some(StageReview {
            reviewer: reviewer.clone(),
            reviewed_at: Utc::now(),
            comment: comment.to_string(),
            approved,
        });

        let next = if approved {
            RequestStatus::AiReview
        } else {
            RequestStatus::Draft
        };
        record.set_status(next);

        audit::append(
            &mut record.audit_trail,
            if approved {
                AuditAction::AdminApproved
            } else {
                AuditAction::AdminRejected
            },
            reviewer,
            format!(
                "Admin review: {}. Comment: {comment}",
                if approved { "Approved" } else { "Rejected" }
            ),
            Some(RequestStatus::PendingAdmin),
            Some(next),
        );

        if record.status == RequestStatus::AiReview {
            self.run_automated_review(&mut record);
        }

        self.commit(record, "admin review recorded")
    }

    /// Supersede the automated outcome while the request is still in
    /// `AiReview`. Administrator only.
    pub fn manual_override(
        &mut self,
        id: RequestId,
        reviewer: ActorId,
        role: WorkflowRole,
        approved: bool,
        reason: &str,
    ) -> Result<RequestRecord> {
        let mut record = self.store.get(id)?;
        self.authorize(&record, Action::ManualOverride, Some(role))?;

        let next = if approved {
            self.grant_access(&mut record);
            RequestStatus::Approved
        } else {
            RequestStatus::Rejected
        };
        record.set_status(next);

        audit::append(
            &mut record.audit_trail,
            AuditAction::ManualOverride,
            reviewer,
            format!(
                "Manual override: {}. Reason: {reason}",
                if approved { "Approved" } else { "Rejected" }
            ),
            Some(RequestStatus::AiReview),
            Some(next),
        );

        self.commit(record, "manual override applied")
    }

    /// Withdraw a request before a decision. Applicant only; allowed
    /// from `Draft` and the three human-review stages.
    pub fn withdraw_request(
        &mut self,
        id: RequestId,
        actor: &ActorId,
        reason: Option<&str>,
    ) -> Result<RequestRecord> {
        let mut record = self.store.get(id)?;
        self.authorize(&record, Action::Withdraw, None)?;
        Self::require_applicant(&record, actor)?;

        let previous = record.status;
        record.set_status(RequestStatus::Withdrawn);

        audit::append(
            &mut record.audit_trail,
            AuditAction::RequestWithdrawn,
            actor.clone(),
            reason.unwrap_or("Request withdrawn by applicant"),
            Some(previous),
            Some(RequestStatus::Withdrawn),
        );

        self.commit(record, "withdrawn")
    }

    /// Contest a rejection. Applicant only; the arbiter decision stays
    /// `Pending` -- ruling on it is outside this engine.
    pub fn submit_appeal(
        &mut self,
        id: RequestId,
        actor: &ActorId,
        reason: &str,
    ) -> Result<RequestRecord> {
        let mut record = self.store.get(id)?;
        self.authorize(&record, Action::Appeal, None)?;
        Self::require_applicant(&record, actor)?;

        record.appeal = Some(Appeal {
            submitted_at: Utc::now(),
            reason: reason.to_string(),
            arbiter_decision: ArbiterDecision::Pending,
        });
        record.set_status(RequestStatus::Appealed);

        audit::append(
            &mut record.audit_trail,
            AuditAction::AppealSubmitted,
            actor.clone(),
            format!("Appeal submitted. Reason: {reason}"),
            Some(RequestStatus::Rejected),
            Some(RequestStatus::Appealed),
        );

        self.commit(record, "appeal submitted")
    }

    /// Compliance lock: freeze a request from any status. Actor is
    /// always `SYSTEM`. The prior status survives only in the audit
    /// entry; a locked request is not restorable.
    pub fn lock_request(&mut self, id: RequestId, reason: &str) -> Result<RequestRecord> {
        let mut record = self.store.get(id)?;

        let previous = record.status;
        let violations_before = record.violations_count;

        record.violations_count += 1;
        record.locked_at = Some(Utc::now());
        record.locked_reason = Some(reason.to_string());
        record.set_status(RequestStatus::Locked);

        audit::append(
            &mut record.audit_trail,
            AuditAction::RequestLocked,
            ActorId::system(),
            format!("Request locked due to: {reason}"),
            Some(previous),
            Some(RequestStatus::Locked),
        );

        // Post-condition: violations count is monotonic
        assert_eq!(
            record.violations_count,
            violations_before + 1,
            "lock must increment violations by exactly one"
        );

        self.commit(record, "locked")
    }

    // ========================================================================
    // Read queries
    // ========================================================================

    /// Snapshot of a single request.
    pub fn get(&self, id: RequestId) -> Result<RequestRecord> {
        Ok(self.store.get(id)?)
    }

    /// All requests currently in `status`.
    pub fn list_by_status(&self, status: RequestStatus) -> Vec<RequestRecord> {
        self.store.list_by_status(status)
    }

    /// The review queue for a workflow role.
    pub fn list_for_reviewer_role(&self, role: WorkflowRole) -> Vec<RequestRecord> {
        self.store.list_for_reviewer_role(role)
    }

    /// All requests created by `applicant`.
    pub fn list_by_applicant(&self, applicant: &ActorId) -> Vec<RequestRecord> {
        self.store.list_by_applicant(applicant)
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    /// Run the injected risk model against a request sitting in
    /// `AiReview` and resolve its outcome.
    ///
    /// Always invoked as the tail of the transition that entered
    /// `AiReview`, never directly by an external caller.
    fn run_automated_review(&mut self, record: &mut RequestRecord) {
        assert_eq!(
            record.status,
            RequestStatus::AiReview,
            "automated review only runs in AI_REVIEW"
        );

        let assessment =
            self.risk_model
                .assess(record.sensitivity, &record.dataset, &record.justification);

        let next = match assessment.recommendation {
            RiskRecommendation::Approve => {
                self.grant_access(record);
                RequestStatus::Approved
            }
            RiskRecommendation::Reject => RequestStatus::Rejected,
            RiskRecommendation::ReviewRequired => match self.options.review_required {
                ReviewRequiredResolution::AutoReject => RequestStatus::Rejected,
                ReviewRequiredResolution::AwaitOverride => RequestStatus::AiReview,
            },
        };

        let details = format!(
            "AI recommendation: {} ({:.1}% confidence). {}",
            assessment.recommendation,
            assessment.confidence * 100.0,
            assessment.analysis
        );
        record.risk_assessment = Some(assessment);
        record.set_status(next);

        audit::append(
            &mut record.audit_trail,
            AuditAction::AiReviewCompleted,
            ActorId::ai_system(),
            details,
            Some(RequestStatus::AiReview),
            Some(next),
        );
    }

    /// Record an access grant on the request.
    fn grant_access(&self, record: &mut RequestRecord) {
        let granted_at = Utc::now();
        record.access_grant = Some(AccessGrant {
            token: format!("grant-{}-{}", record.id, Uuid::new_v4().simple()),
            granted_at,
            expires_at: granted_at + Duration::days(self.options.grant_validity_days),
        });
    }

    fn authorize(
        &self,
        record: &RequestRecord,
        action: Action,
        role: Option<WorkflowRole>,
    ) -> Result<()> {
        if can_perform(record.status, action, role) {
            Ok(())
        } else {
            warn!(id = %record.id, status = %record.status, ?action, ?role, "action denied");
            Err(EngineError::NotPermitted {
                action,
                status: record.status,
                role,
            })
        }
    }

    fn require_applicant(record: &RequestRecord, actor: &ActorId) -> Result<()> {
        if &record.applicant == actor {
            Ok(())
        } else {
            warn!(id = %record.id, %actor, "actor is not the applicant");
            Err(EngineError::NotApplicant {
                id: record.id,
                actor: actor.clone(),
            })
        }
    }

    /// Persist the mutated record and log the committed transition.
    fn commit(&mut self, record: RequestRecord, what: &str) -> Result<RequestRecord> {
        // Step mirror must be consistent before anything is persisted.
        assert_eq!(
            record.current_step,
            record.status.step(),
            "current_step must mirror status"
        );

        self.store.commit(record.clone())?;
        info!(id = %record.id, status = %record.status, step = record.current_step, "{what}");
        Ok(record)
    }
}
