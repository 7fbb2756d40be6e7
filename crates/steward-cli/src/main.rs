//! Steward unified CLI.
//!
//! Drives the approval-request workflow engine over a file-backed
//! store: create requests, walk them through the review stages, and
//! inspect queues and audit trails.
//!
//! # Quick Start
//!
//! ```bash
//! # Initialize a project directory
//! steward init .
//!
//! # Create and submit a request
//! steward create "Sleep study" --dataset sleep-2024 --sensitivity normal --applicant alice
//! steward submit 1 --actor alice
//!
//! # Review as the PI
//! steward review pi 1 --reviewer dr-lee --ui-role researcher --approve --comment "sound"
//!
//! # Inspect
//! steward show 1
//! steward audit 1
//! ```

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use steward_approvals::{EngineOptions, JsonBackend, RequestDraft, RequestRecord, WorkflowEngine};
use steward_config::{ConfigLoader, Paths, StewardConfig};
use steward_policy::{HeuristicRiskModel, RiskModel};
use steward_types::{ActorId, RequestId, RequestStatus, Sensitivity, UiRole, WorkflowRole};

#[derive(Parser)]
#[command(name = "steward")]
#[command(version, about = "Steward - data-access approval workflows", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Project directory holding steward.toml and the data directory.
    #[arg(long, global = true, default_value = ".")]
    project_dir: PathBuf,

    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a project directory with a default steward.toml.
    Init {
        /// Directory to initialize.
        path: PathBuf,
    },

    /// Create a new access request (starts in DRAFT).
    Create {
        /// Request title.
        title: String,

        /// Dataset identifier in the catalog.
        #[arg(short, long)]
        dataset: String,

        /// Sensitivity classification (normal, high, critical).
        #[arg(short, long, default_value = "normal")]
        sensitivity: Sensitivity,

        /// Applicant identity.
        #[arg(short, long)]
        applicant: String,

        /// Longer description.
        #[arg(long, default_value = "")]
        description: String,

        /// Why access is needed.
        #[arg(short, long, default_value = "")]
        justification: String,

        /// What the access is for.
        #[arg(short, long, default_value = "")]
        purpose: String,

        /// Dataset fields needed (repeatable).
        #[arg(short, long)]
        field: Vec<String>,
    },

    /// Submit a draft for PI review.
    Submit {
        /// Request id.
        id: u64,

        /// Acting identity (must be the applicant).
        #[arg(short, long)]
        actor: String,
    },

    /// Decide a human review stage.
    #[command(subcommand)]
    Review(ReviewCommands),

    /// Supersede the automated outcome (Administrator only).
    Override {
        /// Request id.
        id: u64,

        /// Reviewer identity.
        #[arg(short, long)]
        reviewer: String,

        /// UI role of the reviewer (mapped to a workflow role).
        #[arg(long, default_value = "administrator")]
        ui_role: UiRole,

        /// Approve instead of reject.
        #[arg(long)]
        approve: bool,

        /// Reason for the override.
        #[arg(long)]
        reason: String,
    },

    /// Withdraw a request before a decision.
    Withdraw {
        /// Request id.
        id: u64,

        /// Acting identity (must be the applicant).
        #[arg(short, long)]
        actor: String,

        /// Optional reason.
        #[arg(long)]
        reason: Option<String>,
    },

    /// Appeal a rejection.
    Appeal {
        /// Request id.
        id: u64,

        /// Acting identity (must be the applicant).
        #[arg(short, long)]
        actor: String,

        /// Grounds for the appeal.
        #[arg(long)]
        reason: String,
    },

    /// Compliance-lock a request (system action).
    Lock {
        /// Request id.
        id: u64,

        /// Reason for the lock.
        #[arg(long)]
        reason: String,
    },

    /// List requests by status, reviewer role, or applicant.
    List {
        /// Filter by status (e.g. DRAFT, PENDING_PI).
        #[arg(short, long)]
        status: Option<RequestStatus>,

        /// Filter by reviewer queue (pi, ethics, administrator).
        #[arg(short, long)]
        role: Option<WorkflowRole>,

        /// Filter by applicant.
        #[arg(short, long)]
        applicant: Option<String>,
    },

    /// Show one request as JSON.
    Show {
        /// Request id.
        id: u64,
    },

    /// Print a request's audit trail.
    Audit {
        /// Request id.
        id: u64,
    },
}

#[derive(Subcommand)]
enum ReviewCommands {
    /// Principal-investigator review.
    Pi(ReviewArgs),
    /// Ethics-committee review.
    Ethics(ReviewArgs),
    /// Administrator review.
    Admin(ReviewArgs),
}

#[derive(clap::Args)]
struct ReviewArgs {
    /// Request id.
    id: u64,

    /// Reviewer identity.
    #[arg(short, long)]
    reviewer: String,

    /// UI role of the reviewer (mapped to a workflow role before the
    /// engine sees it).
    #[arg(long)]
    ui_role: UiRole,

    /// Approve instead of reject.
    #[arg(long)]
    approve: bool,

    /// Review comment.
    #[arg(short, long, default_value = "")]
    comment: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .init();

    match cli.command {
        Commands::Init { path } => init_project(&path),
        command => {
            let config = ConfigLoader::new()
                .with_project_dir(&cli.project_dir)
                .load()
                .context("Failed to load configuration")?;
            let mut engine = open_engine(&config)?;
            run_command(&mut engine, command)
        }
    }
}

fn run_command(engine: &mut WorkflowEngine<JsonBackend>, command: Commands) -> Result<()> {
    match command {
        Commands::Init { .. } => unreachable!("handled before engine setup"),

        Commands::Create {
            title,
            dataset,
            sensitivity,
            applicant,
            description,
            justification,
            purpose,
            field,
        } => {
            let draft = RequestDraft::new(title, sensitivity, dataset)
                .with_description(description)
                .with_justification(justification)
                .with_access_purpose(purpose)
                .with_data_fields(field);
            let record = engine.create_request(draft, ActorId::new(applicant))?;
            println!("Created request {} ({})", record.id, record.status);
            Ok(())
        }

        Commands::Submit { id, actor } => {
            let record = engine.submit_request(RequestId::new(id), &ActorId::new(actor))?;
            print_transition(&record);
            Ok(())
        }

        Commands::Review(review) => {
            let (record, stage) = match review {
                ReviewCommands::Pi(args) => (
                    engine.pi_review(
                        RequestId::new(args.id),
                        ActorId::new(&*args.reviewer),
                        args.ui_role.workflow_role(),
                        args.approve,
                        &args.comment,
                    )?,
                    "PI",
                ),
                ReviewCommands::Ethics(args) => (
                    engine.ethics_review(
                        RequestId::new(args.id),
                        ActorId::new(&*args.reviewer),
                        args.ui_role.workflow_role(),
                        args.approve,
                        &args.comment,
                    )?,
                    "Ethics",
                ),
                ReviewCommands::Admin(args) => (
                    engine.admin_review(
                        RequestId::new(args.id),
                        ActorId::new(&*args.reviewer),
                        args.ui_role.workflow_role(),
                        args.approve,
                        &args.comment,
                    )?,
                    "Admin",
                ),
            };
            println!("{stage} review recorded");
            print_transition(&record);
            Ok(())
        }

        Commands::Override {
            id,
            reviewer,
            ui_role,
            approve,
            reason,
        } => {
            let record = engine.manual_override(
                RequestId::new(id),
                ActorId::new(reviewer),
                ui_role.workflow_role(),
                approve,
                &reason,
            )?;
            print_transition(&record);
            Ok(())
        }

        Commands::Withdraw { id, actor, reason } => {
            let record = engine.withdraw_request(
                RequestId::new(id),
                &ActorId::new(actor),
                reason.as_deref(),
            )?;
            print_transition(&record);
            Ok(())
        }

        Commands::Appeal { id, actor, reason } => {
            let record =
                engine.submit_appeal(RequestId::new(id), &ActorId::new(actor), &reason)?;
            print_transition(&record);
            Ok(())
        }

        Commands::Lock { id, reason } => {
            let record = engine.lock_request(RequestId::new(id), &reason)?;
            println!(
                "Locked request {} (violations: {})",
                record.id, record.violations_count
            );
            Ok(())
        }

        Commands::List {
            status,
            role,
            applicant,
        } => {
            let records = if let Some(status) = status {
                engine.list_by_status(status)
            } else if let Some(role) = role {
                engine.list_for_reviewer_role(role)
            } else if let Some(applicant) = applicant {
                engine.list_by_applicant(&ActorId::new(applicant))
            } else {
                anyhow::bail!("pass one of --status, --role, or --applicant");
            };

            if records.is_empty() {
                println!("No matching requests");
                return Ok(());
            }
            for record in records {
                println!(
                    "{:>5}  {:<16} {:<16} step {}/6  {}  {}",
                    record.id.to_string(),
                    record.status.to_string(),
                    record.applicant.to_string(),
                    record.current_step,
                    record.dataset,
                    record.title,
                );
            }
            Ok(())
        }

        Commands::Show { id } => {
            let record = engine.get(RequestId::new(id))?;
            println!("{}", serde_json::to_string_pretty(&record)?);
            Ok(())
        }

        Commands::Audit { id } => {
            let record = engine.get(RequestId::new(id))?;
            println!("Audit trail for request {} ({}):", record.id, record.title);
            for entry in &record.audit_trail {
                let bracket = match (entry.previous_status, entry.new_status) {
                    (Some(from), Some(to)) => format!("{from} -> {to}"),
                    (None, Some(to)) => format!("-> {to}"),
                    _ => String::new(),
                };
                println!(
                    "  #{:<3} {}  {:<20} {:<12} {}  {}",
                    entry.id,
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    entry.action.to_string(),
                    entry.actor.to_string(),
                    bracket,
                    entry.details,
                );
            }
            Ok(())
        }
    }
}

/// Create a project directory with a default config file.
fn init_project(path: &PathBuf) -> Result<()> {
    let config_path = Paths::project_config_file(path);
    if config_path.exists() {
        anyhow::bail!(
            "Project already initialized: {} exists",
            config_path.display()
        );
    }

    fs::create_dir_all(path).context("Failed to create project directory")?;

    let config = StewardConfig::default();
    fs::create_dir_all(path.join(&config.storage.data_dir))
        .context("Failed to create data directory")?;

    let contents =
        toml::to_string_pretty(&config).context("Failed to serialize configuration")?;
    fs::write(&config_path, contents).context("Failed to write steward.toml")?;

    println!("Initialized Steward project in {}", path.display());
    println!("  Config: {}", config_path.display());
    println!("  Data:   {}", path.join(config.storage.data_dir).display());
    Ok(())
}

fn open_engine(config: &StewardConfig) -> Result<WorkflowEngine<JsonBackend>> {
    let backend = JsonBackend::open(&config.storage.data_dir)
        .context("Failed to open the data directory")?;

    let model: Box<dyn RiskModel> = match config.risk.seed {
        Some(seed) => Box::new(HeuristicRiskModel::seeded(seed)),
        None => Box::new(HeuristicRiskModel::new()),
    };

    let options = EngineOptions {
        grant_validity_days: config.workflow.grant_validity_days,
        review_required: config.workflow.review_required,
    };

    Ok(WorkflowEngine::open(backend, model, options)?)
}

fn print_transition(record: &RequestRecord) {
    println!(
        "Request {} is now {} (step {}/6, {})",
        record.id,
        record.status,
        record.current_step,
        record.workflow_stage(),
    );
    if let Some(grant) = &record.access_grant {
        println!(
            "  Access token: {} (expires {})",
            grant.token,
            grant.expires_at.format("%Y-%m-%d")
        );
    }
}
