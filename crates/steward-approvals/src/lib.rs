//! # steward-approvals: The approval-request workflow engine
//!
//! Governs controlled access to sensitive research datasets through a
//! multi-stage approval pipeline: a finite-state process that moves a
//! data-access request through sequential human and automated review
//! stages, enforcing role-gated transitions, branching by data
//! sensitivity, and recording an append-only audit trail.
//!
//! # Architecture
//!
//! ```text
//! caller (UI / CLI / tests)
//!        |
//!        v
//! WorkflowEngine ---- validates ----> steward-policy (pure rules)
//!   |        \------- assesses ----> RiskModel (injected)
//!   | mutates + appends audit entries
//!   v
//! RequestRecord { status, current_step, reviews, audit_trail, ... }
//!   |
//!   v
//! RequestStore ---- persists ----> DurableBackend (memory | JSON files)
//! ```
//!
//! # State machine
//!
//! ```text
//! DRAFT -> PENDING_PI -> PENDING_ETHICS -> PENDING_ADMIN -> AI_REVIEW -> APPROVED
//!   ^          |              |     \________________________^   |
//!   |          |              |      (normal sensitivity)        +-------> REJECTED -> APPEALED
//!   +----------+--------------+ (stage rejection bounces back)
//!
//! DRAFT / PENDING_* -> WITHDRAWN        any status -> LOCKED
//! ```
//!
//! Requests are never physically deleted: rejected, withdrawn, and
//! locked requests are retained, trail and all.
//!
//! # Example
//!
//! ```
//! use steward_approvals::{EngineOptions, MemoryBackend, RequestDraft, WorkflowEngine};
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
//! let record = engine.create_request(
//!     RequestDraft::new("Sleep study", Sensitivity::Normal, "sleep-2024"),
//!     alice.clone(),
//! )?;
//! engine.submit_request(record.id, &alice)?;
//!
//! let queue = engine.list_for_reviewer_role(WorkflowRole::Pi);
//! assert_eq!(queue.len(), 1);
//! assert_eq!(queue[0].status, RequestStatus::PendingPi);
//! # Ok::<(), steward_approvals::EngineError>(())
//! ```

pub mod audit;
pub mod engine;
pub mod request;
pub mod store;

// Re-export the working surface
pub use audit::{AuditAction, AuditEntry};
pub use engine::{EngineError, EngineOptions, WorkflowEngine};
pub use request::{
    AccessGrant, Appeal, ArbiterDecision, RequestDraft, RequestRecord, StageReview,
};
pub use store::{DurableBackend, JsonBackend, MemoryBackend, RequestStore, StoreError};
