//! Workflow state-machine property tests.
//!
//! Applies randomised command sequences to the engine and checks that
//! the structural invariants hold after every accepted or denied
//! command:
//!
//! - `current_step` always mirrors `status.step()`
//! - the audit trail is well-formed (sequential ids, creation entry,
//!   bracketed statuses) and strictly growing
//! - violations never decrease
//! - a denied command leaves the record untouched

use proptest::prelude::*;
use steward_approvals::audit;
use steward_approvals::{EngineError, EngineOptions, MemoryBackend, RequestDraft, WorkflowEngine};
use steward_policy::{FixedRiskModel, ReviewRequiredResolution, RiskModel, RiskRecommendation};
use steward_types::{ActorId, RequestId, Sensitivity, WorkflowRole};

#[derive(Debug, Clone, Copy)]
enum Command {
    Submit,
    PiReview(bool),
    EthicsReview(bool),
    AdminReview(bool),
    Override(bool),
    Withdraw,
    Appeal,
    Lock,
}

fn command_strategy() -> impl Strategy<Value = Command> {
    prop_oneof![
        Just(Command::Submit),
        any::<bool>().prop_map(Command::PiReview),
        any::<bool>().prop_map(Command::EthicsReview),
        any::<bool>().prop_map(Command::AdminReview),
        any::<bool>().prop_map(Command::Override),
        Just(Command::Withdraw),
        Just(Command::Appeal),
        Just(Command::Lock),
    ]
}

fn sensitivity_strategy() -> impl Strategy<Value = Sensitivity> {
    prop_oneof![
        Just(Sensitivity::Normal),
        Just(Sensitivity::High),
        Just(Sensitivity::Critical),
    ]
}

fn outcome_strategy() -> impl Strategy<Value = RiskRecommendation> {
    prop_oneof![
        Just(RiskRecommendation::Approve),
        Just(RiskRecommendation::Reject),
        Just(RiskRecommendation::ReviewRequired),
    ]
}

fn apply(
    engine: &mut WorkflowEngine<MemoryBackend>,
    id: RequestId,
    applicant: &ActorId,
    command: Command,
) -> Result<steward_approvals::RequestRecord, EngineError> {
    let reviewer = ActorId::new("reviewer");
    match command {
        Command::Submit => engine.submit_request(id, applicant),
        Command::PiReview(approved) => {
            engine.pi_review(id, reviewer, WorkflowRole::Pi, approved, "pi")
        }
        Command::EthicsReview(approved) => {
            engine.ethics_review(id, reviewer, WorkflowRole::Ethics, approved, "ethics")
        }
        Command::AdminReview(approved) => {
            engine.admin_review(id, reviewer, WorkflowRole::Administrator, approved, "admin")
        }
        Command::Override(approved) => {
            engine.manual_override(id, reviewer, WorkflowRole::Administrator, approved, "override")
        }
        Command::Withdraw => engine.withdraw_request(id, applicant, None),
        Command::Appeal => engine.submit_appeal(id, applicant, "appeal"),
        Command::Lock => engine.lock_request(id, "violation"),
    }
}

proptest! {
    #[test]
    fn random_command_sequences_preserve_invariants(
        commands in prop::collection::vec(command_strategy(), 1..40),
        sensitivity in sensitivity_strategy(),
        outcome in outcome_strategy(),
        await_override in any::<bool>(),
    ) {
        let model: Box<dyn RiskModel> = Box::new(FixedRiskModel::new(outcome, 0.9));
        let options = EngineOptions {
            review_required: if await_override {
                ReviewRequiredResolution::AwaitOverride
            } else {
                ReviewRequiredResolution::AutoReject
            },
            ..EngineOptions::default()
        };
        let mut engine =
            WorkflowEngine::open(MemoryBackend::new(), model, options).unwrap();

        let applicant = ActorId::new("alice");
        let record = engine
            .create_request(
                RequestDraft::new("T", sensitivity, "D"),
                applicant.clone(),
            )
            .unwrap();
        let id = record.id;

        let mut trail_len = record.audit_trail.len();
        let mut violations = record.violations_count;

        for command in commands {
            let before = engine.get(id).unwrap();
            let result = apply(&mut engine, id, &applicant, command);
            let after = engine.get(id).unwrap();

            match result {
                Ok(returned) => {
                    // The returned record is the committed one.
                    prop_assert_eq!(&returned, &after);

                    // One entry per transition, two when the automated
                    // review ran as its tail.
                    let grew = after.audit_trail.len() - trail_len;
                    prop_assert!(
                        grew == 1 || grew == 2,
                        "transition appended {} entries", grew
                    );
                    trail_len = after.audit_trail.len();
                }
                Err(
                    EngineError::NotPermitted { .. } | EngineError::NotApplicant { .. },
                ) => {
                    // Denied commands must not touch the record.
                    prop_assert_eq!(&before, &after);
                }
                Err(err) => {
                    prop_assert!(false, "unexpected engine error: {err}");
                }
            }

            // Structural invariants hold after every command.
            prop_assert_eq!(after.current_step, after.status.step());
            prop_assert!(audit::verify(&after.audit_trail).is_ok());
            prop_assert!(after.violations_count >= violations);
            violations = after.violations_count;
        }
    }

    #[test]
    fn audit_trail_length_accounts_for_every_transition(
        commands in prop::collection::vec(command_strategy(), 1..30),
    ) {
        let mut engine = WorkflowEngine::open(
            MemoryBackend::new(),
            Box::new(FixedRiskModel::approving()),
            EngineOptions::default(),
        )
        .unwrap();

        let applicant = ActorId::new("alice");
        let record = engine
            .create_request(
                RequestDraft::new("T", Sensitivity::Normal, "D"),
                applicant.clone(),
            )
            .unwrap();

        let mut applied = 0usize;
        let mut ai_runs = 0usize;
        for command in commands {
            let before = engine.get(record.id).unwrap().audit_trail.len();
            if apply(&mut engine, record.id, &applicant, command).is_ok() {
                applied += 1;
                if engine.get(record.id).unwrap().audit_trail.len() == before + 2 {
                    ai_runs += 1;
                }
            }
        }

        let final_record = engine.get(record.id).unwrap();
        prop_assert_eq!(
            final_record.audit_trail.len(),
            1 + applied + ai_runs,
            "creation entry + one per transition + one per automated run"
        );
    }
}
