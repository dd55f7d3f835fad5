//! `puzzlekit`: developer CLI over `puzzlekit-core`.
//!
//! Every invocation is one short app session: the account passed with
//! `--account` (or none) is the session state, the guest profile lives in the
//! data directory, and account profiles live on the remote service.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use eyre::{bail, eyre, WrapErr};
use puzzlekit_core::config::RemoteConfig;
use puzzlekit_core::logger::{set_logger_with_level, LogLevel, Logger};
use puzzlekit_core::remote::{HttpProfileStore, MemoryProfileStore, RemoteProfileStore};
use puzzlekit_core::session::{ManualAuthProvider, SessionWatcher};
use puzzlekit_core::storage::{FileSlotStore, LocalProfileStore, DEFAULT_GUEST_SLOT};
use puzzlekit_core::{
    Identity, IdentityCoordinator, PuzzleId, SessionSnapshot, SessionStatus, SubmissionGuard,
    SubmissionOutcome,
};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "puzzlekit", version)]
#[command(about = "Inspect and drive PuzzleKit progress from the terminal", long_about = None)]
struct Cli {
    #[command(flatten)]
    session: SessionArgs,

    #[command(subcommand)]
    command: Command,

    /// Print PuzzleKit debug logs through the host logger bridge
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Host logger for `--verbose`: the same bridge the mobile apps install.
struct StderrLogger;

impl Logger for StderrLogger {
    fn log(&self, level: LogLevel, message: String) {
        eprintln!("{level:>5} {message}");
    }
}

#[derive(Args)]
struct SessionArgs {
    /// Signed-in account id; omit to play signed out
    #[arg(long, env = "PUZZLEKIT_ACCOUNT", global = true)]
    account: Option<String>,

    /// Directory holding the guest profile
    #[arg(long, env = "PUZZLEKIT_DATA_DIR", global = true)]
    data_dir: Option<PathBuf>,

    /// Base URL of the remote profile service
    #[arg(long, env = "PUZZLEKIT_REMOTE_URL", global = true)]
    remote_url: Option<String>,

    /// Bearer token for the remote profile service
    #[arg(long, env = "PUZZLEKIT_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, env = "PUZZLEKIT_REMOTE_TIMEOUT_SECS", default_value_t = 5, global = true)]
    timeout_secs: u64,

    /// Retries for transient remote failures
    #[arg(long, env = "PUZZLEKIT_REMOTE_MAX_RETRIES", default_value_t = 0, global = true)]
    max_retries: u32,

    /// Accept an http:// remote URL
    #[arg(long, env = "PUZZLEKIT_ALLOW_INSECURE", global = true)]
    allow_insecure: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Show the active identity and its profile
    Status,

    /// Manage the guest profile
    Guest {
        #[command(subcommand)]
        command: GuestCommand,
    },

    /// Submit an answer verdict for a puzzle
    Submit {
        /// Puzzle id, e.g. case-1
        puzzle_id: String,

        /// XP awarded on first completion
        #[arg(short, long, default_value_t = 0)]
        reward: u64,

        /// Submit as a wrong answer
        #[arg(long)]
        incorrect: bool,
    },
}

#[derive(Subcommand)]
enum GuestCommand {
    /// Create a guest profile (only while signed out with no guest)
    Create {
        /// Name shown for the guest
        display_name: String,
    },
    /// Delete the guest profile and its progress
    Clear,
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        // Without a tracing subscriber, events reach the bridge as `log` records.
        set_logger_with_level(Arc::new(StderrLogger), LogLevel::Debug);
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_writer(std::io::stderr)
            .init();
    }

    let output = run(cli).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

async fn run(cli: Cli) -> eyre::Result<Value> {
    let data_dir = match cli.session.data_dir.clone() {
        Some(dir) => dir,
        None => dirs::data_dir()
            .map(|dir| dir.join("puzzlekit"))
            .ok_or_else(|| eyre!("no platform data directory; pass --data-dir"))?,
    };
    tracing::debug!(data_dir = %data_dir.display(), "using data directory");

    let local = LocalProfileStore::new(Arc::new(FileSlotStore::new(data_dir)), DEFAULT_GUEST_SLOT);
    let coordinator = Arc::new(IdentityCoordinator::new(local, remote_store(&cli.session)?));

    let auth = cli
        .session
        .account
        .clone()
        .map_or_else(ManualAuthProvider::new, ManualAuthProvider::signed_in);
    let watcher = SessionWatcher::new(Arc::new(auth));
    let mut events = watcher.events();
    let initial = events
        .try_next()
        .ok_or_else(|| eyre!("session watcher delivered no initial state"))?;
    coordinator
        .apply_session(initial)
        .await
        .wrap_err("failed to load the account profile")?;

    match cli.command {
        Command::Status => Ok(snapshot_json(&coordinator.snapshot())),
        Command::Guest {
            command: GuestCommand::Create { display_name },
        } => {
            coordinator.create_guest(&display_name).await?;
            Ok(snapshot_json(&coordinator.snapshot()))
        }
        Command::Guest {
            command: GuestCommand::Clear,
        } => {
            coordinator.clear_guest().await?;
            Ok(snapshot_json(&coordinator.snapshot()))
        }
        Command::Submit {
            puzzle_id,
            reward,
            incorrect,
        } => {
            let guard = SubmissionGuard::new(Arc::clone(&coordinator));
            let outcome = guard
                .submit(&PuzzleId::from(puzzle_id), !incorrect, reward)
                .await?;
            Ok(outcome_json(&outcome))
        }
    }
}

fn remote_store(args: &SessionArgs) -> eyre::Result<Arc<dyn RemoteProfileStore>> {
    let Some(remote_url) = &args.remote_url else {
        if args.account.is_some() {
            bail!("--account needs a remote service: pass --remote-url or set PUZZLEKIT_REMOTE_URL");
        }
        // Signed out: nothing will ever be fetched.
        return Ok(Arc::new(MemoryProfileStore::new()));
    };

    let mut config = RemoteConfig::new(remote_url.as_str())
        .with_timeout(Duration::from_secs(args.timeout_secs))
        .with_max_retries(args.max_retries);
    if let Some(api_key) = &args.api_key {
        config = config.with_api_key(api_key.as_str());
    }
    if args.allow_insecure {
        config = config.allow_insecure();
    }
    Ok(Arc::new(HttpProfileStore::new(&config)?))
}

fn snapshot_json(snapshot: &SessionSnapshot) -> Value {
    let (status, error) = match &snapshot.status {
        SessionStatus::Loading => ("loading", Value::Null),
        SessionStatus::Ready => ("ready", Value::Null),
        SessionStatus::Error { message, retryable } => (
            "error",
            json!({ "message": message, "retryable": retryable }),
        ),
    };
    let identity = match &snapshot.identity {
        Identity::None => Value::Null,
        Identity::Guest {
            guest_id,
            display_name,
        } => json!({ "guest_id": guest_id.as_str(), "display_name": display_name }),
        Identity::Account { account_id } => json!({ "account_id": account_id.as_str() }),
    };
    json!({
        "status": status,
        "error": error,
        "identity_kind": snapshot.identity_kind().to_string(),
        "identity": identity,
        "profile": snapshot.profile,
    })
}

fn outcome_json(outcome: &SubmissionOutcome) -> Value {
    match outcome {
        SubmissionOutcome::Rejected => json!({ "outcome": "rejected" }),
        SubmissionOutcome::Granted { reward, profile } => {
            json!({ "outcome": "granted", "reward": reward, "profile": profile })
        }
        SubmissionOutcome::AlreadyCompleted { profile } => {
            json!({ "outcome": "already_completed", "profile": profile })
        }
        SubmissionOutcome::Unpersisted { reward } => {
            json!({ "outcome": "unpersisted", "reward": reward })
        }
    }
}
