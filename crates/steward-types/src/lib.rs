//! # steward-types: Core types for Steward
//!
//! This crate contains shared types used across the Steward system:
//! - Entity IDs ([`RequestId`], [`ActorId`])
//! - Workflow position ([`RequestStatus`])
//! - Data classification ([`Sensitivity`])
//! - Review-stage roles ([`WorkflowRole`], [`UiRole`])
//!
//! Everything here is pure data: no I/O, no clocks, no policy. The
//! workflow semantics live in `steward-policy` and `steward-approvals`.

use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Unknown status: {0}")]
    UnknownStatus(String),

    #[error("Unknown sensitivity: {0}")]
    UnknownSensitivity(String),

    #[error("Unknown workflow role: {0}")]
    UnknownWorkflowRole(String),

    #[error("Unknown UI role: {0}")]
    UnknownUiRole(String),
}

// ============================================================================
// Entity IDs
// ============================================================================

/// Unique identifier for an access request.
///
/// Assigned by the store from a durable monotonic counter: strictly
/// increasing, never reused, even across clearing of the record list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestId(u64);

impl RequestId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for RequestId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Identity of a caller: an applicant, a reviewer, or a system actor.
///
/// Identity resolution is an external collaborator; the engine treats
/// this as an opaque label and only compares it for equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActorId(String);

impl ActorId {
    /// Reserved actor for compliance-initiated operations (locks).
    pub const SYSTEM: &'static str = "SYSTEM";

    /// Reserved actor for the automated review stage.
    pub const AI_SYSTEM: &'static str = "AI_SYSTEM";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn system() -> Self {
        Self(Self::SYSTEM.to_string())
    }

    pub fn ai_system() -> Self {
        Self(Self::AI_SYSTEM.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ActorId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for ActorId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

// ============================================================================
// Workflow position
// ============================================================================

/// Position of a request in the approval workflow.
///
/// The single source of truth for what operations are currently valid.
/// `Approved`, `Withdrawn`, and `Locked` are terminal. `Rejected` is
/// terminal unless appealed; `Appealed` awaits an external arbiter
/// decision not modeled here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestStatus {
    /// Being drafted (or bounced back for rework) by the applicant.
    Draft,
    /// Awaiting principal-investigator review.
    PendingPi,
    /// Awaiting ethics-committee review.
    PendingEthics,
    /// Awaiting administrator review (high/critical sensitivity only).
    PendingAdmin,
    /// Awaiting the automated risk assessment.
    AiReview,
    /// Access granted; carries a token and expiry.
    Approved,
    /// Denied; may still be appealed.
    Rejected,
    /// Withdrawn by the applicant before a decision.
    Withdrawn,
    /// Frozen by a compliance lock.
    Locked,
    /// Rejection appealed; arbiter decision pending.
    Appealed,
}

impl RequestStatus {
    /// Progress-display step for this status.
    ///
    /// 1=Draft, 2=PI Review, 3=Ethics Review, 4=Admin Review,
    /// 5=AI Review, 6=Final Decision. Every decided or closed request
    /// maps to the final step regardless of where the workflow stopped.
    pub fn step(self) -> u8 {
        match self {
            Self::Draft => 1,
            Self::PendingPi => 2,
            Self::PendingEthics => 3,
            Self::PendingAdmin => 4,
            Self::AiReview => 5,
            Self::Approved | Self::Rejected | Self::Withdrawn | Self::Locked | Self::Appealed => 6,
        }
    }

    /// Human-readable label for the progress step.
    pub fn step_label(self) -> &'static str {
        match self.step() {
            1 => "Draft",
            2 => "PI Review",
            3 => "Ethics Review",
            4 => "Admin Review",
            5 => "AI Review",
            _ => "Final Decision",
        }
    }

    /// Whether no further transition can ever apply.
    ///
    /// `Rejected` is excluded: it can still move to `Appealed`.
    /// `Appealed` is excluded: it awaits an external arbiter.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Withdrawn | Self::Locked)
    }

    /// Whether the request is waiting on a human review stage.
    pub fn is_pending_review(self) -> bool {
        matches!(self, Self::PendingPi | Self::PendingEthics | Self::PendingAdmin)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "DRAFT",
            Self::PendingPi => "PENDING_PI",
            Self::PendingEthics => "PENDING_ETHICS",
            Self::PendingAdmin => "PENDING_ADMIN",
            Self::AiReview => "AI_REVIEW",
            Self::Approved => "APPROVED",
            Self::Rejected => "REJECTED",
            Self::Withdrawn => "WITHDRAWN",
            Self::Locked => "LOCKED",
            Self::Appealed => "APPEALED",
        }
    }
}

impl Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, ParseError> {
        match s.to_uppercase().as_str() {
            "DRAFT" => Ok(Self::Draft),
            "PENDING_PI" => Ok(Self::PendingPi),
            "PENDING_ETHICS" => Ok(Self::PendingEthics),
            "PENDING_ADMIN" => Ok(Self::PendingAdmin),
            "AI_REVIEW" => Ok(Self::AiReview),
            "APPROVED" => Ok(Self::Approved),
            "REJECTED" => Ok(Self::Rejected),
            "WITHDRAWN" => Ok(Self::Withdrawn),
            "LOCKED" => Ok(Self::Locked),
            "APPEALED" => Ok(Self::Appealed),
            _ => Err(ParseError::UnknownStatus(s.to_string())),
        }
    }
}

// ============================================================================
// Data classification
// ============================================================================

/// Sensitivity classification of the requested dataset.
///
/// Fixed at request creation; controls which review stages are
/// mandatory (high and critical requests cannot skip admin review)
/// and how strict the automated risk assessment is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensitivity {
    /// De-identified or low-risk data.
    Normal,
    /// Identifiable or otherwise restricted data.
    High,
    /// Special-category data (health, genetic, biometric).
    Critical,
}

impl Sensitivity {
    /// Whether the admin review stage is mandatory for this class.
    pub fn requires_admin_review(self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

impl Display for Sensitivity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Normal => write!(f, "normal"),
            Self::High => write!(f, "high"),
            Self::Critical => write!(f, "critical"),
        }
    }
}

impl FromStr for Sensitivity {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, ParseError> {
        match s.to_lowercase().as_str() {
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            "critical" => Ok(Self::Critical),
            _ => Err(ParseError::UnknownSensitivity(s.to_string())),
        }
    }
}

// ============================================================================
// Roles
// ============================================================================

/// Review-stage-facing role checked by the workflow engine.
///
/// Distinct from the UI-facing [`UiRole`]: the engine only ever sees
/// workflow roles; consumers map UI roles before calling in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WorkflowRole {
    /// Principal investigator: first human review stage.
    Pi,
    /// Ethics committee: second human review stage.
    Ethics,
    /// Administrator: admin review stage and manual override authority.
    Administrator,
}

impl Display for WorkflowRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pi => write!(f, "PI"),
            Self::Ethics => write!(f, "Ethics"),
            Self::Administrator => write!(f, "Administrator"),
        }
    }
}

impl FromStr for WorkflowRole {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, ParseError> {
        match s.to_lowercase().as_str() {
            "pi" => Ok(Self::Pi),
            "ethics" => Ok(Self::Ethics),
            "administrator" | "admin" => Ok(Self::Administrator),
            _ => Err(ParseError::UnknownWorkflowRole(s.to_string())),
        }
    }
}

/// UI-facing user role as supplied by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UiRole {
    Administrator,
    DataManager,
    DataAnalyst,
    Researcher,
    Guest,
}

impl UiRole {
    /// Map a UI role to the workflow role it reviews as.
    ///
    /// Administrators review as Administrator, data managers sit on the
    /// ethics committee, everyone else reviews as PI. This mapping is
    /// deployment policy applied by the engine's consumers; the engine
    /// itself checks only the [`WorkflowRole`] it is given.
    pub fn workflow_role(self) -> WorkflowRole {
        match self {
            Self::Administrator => WorkflowRole::Administrator,
            Self::DataManager => WorkflowRole::Ethics,
            Self::DataAnalyst | Self::Researcher | Self::Guest => WorkflowRole::Pi,
        }
    }
}

impl Display for UiRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Administrator => write!(f, "Administrator"),
            Self::DataManager => write!(f, "Data Manager"),
            Self::DataAnalyst => write!(f, "Data Analyst"),
            Self::Researcher => write!(f, "Researcher"),
            Self::Guest => write!(f, "Guest"),
        }
    }
}

impl FromStr for UiRole {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, ParseError> {
        match s.to_lowercase().replace([' ', '-'], "_").as_str() {
            "administrator" => Ok(Self::Administrator),
            "data_manager" => Ok(Self::DataManager),
            "data_analyst" => Ok(Self::DataAnalyst),
            "researcher" => Ok(Self::Researcher),
            "guest" => Ok(Self::Guest),
            _ => Err(ParseError::UnknownUiRole(s.to_string())),
        }
    }
}
