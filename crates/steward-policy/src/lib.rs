//! # steward-policy: Workflow policy rules
//!
//! Pure decision functions for the approval workflow, with no side
//! effects and no storage:
//!
//! - **Action eligibility** ([`can_perform`]): which action is allowed
//!   in which status, and by which workflow role.
//! - **Sensitivity routing** ([`route_after_ethics_approval`]): whether
//!   an ethics-approved request must pass admin review or can go
//!   straight to the automated assessment.
//! - **Risk scoring** ([`RiskModel`]): the replaceable policy behind
//!   the automated review stage.
//!
//! The engine in `steward-approvals` consults these rules before every
//! mutation; UIs may consult them too to pre-filter actions, but the
//! engine always re-validates.

pub mod risk;
pub mod rules;

pub use risk::{
    FixedRiskModel, HeuristicRiskModel, ReviewRequiredResolution, RiskAssessment, RiskModel,
    RiskRecommendation,
};
pub use rules::{Action, can_perform, route_after_ethics_approval};
