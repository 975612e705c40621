use std::fs;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use sauce_boss_api::{load_content, SauceBossApi};
use sauce_boss_core::{image_for, RequestEnvelope, SauceId, DEFAULT_IMAGE_URL};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

const CLI_CONTRACT_VERSION: &str = "cli.v1";
const DEFAULT_LOG_FILTER: &str = "sauce_boss=warn";

#[derive(Debug, Parser)]
#[command(name = "sb")]
#[command(about = "Sauce Boss developer CLI")]
struct Cli {
    /// SQLite session database. Session commands require it.
    #[arg(long, global = true)]
    session_db: Option<PathBuf>,

    #[arg(long, global = true)]
    content_dir: Option<PathBuf>,

    #[arg(long, global = true, default_value = "en")]
    default_language: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run one request envelope through the skill and print the response envelope.
    Invoke(InvokeArgs),
    Recipes(RecipesArgs),
    Image(ImageArgs),
    Db {
        #[command(subcommand)]
        command: DbCommand,
    },
    Session {
        #[command(subcommand)]
        command: SessionCommand,
    },
}

#[derive(Debug, Args)]
struct InvokeArgs {
    #[arg(long)]
    request: PathBuf,
    /// Seed for the random sauce picks, for reproducible output.
    #[arg(long)]
    seed: Option<u64>,
}

#[derive(Debug, Args)]
struct RecipesArgs {
    #[arg(long)]
    locale: String,
}

#[derive(Debug, Args)]
struct ImageArgs {
    #[arg(long)]
    id: String,
}

#[derive(Debug, Subcommand)]
enum DbCommand {
    SchemaVersion,
    Migrate(DbMigrateArgs),
    Backup(DbBackupArgs),
}

#[derive(Debug, Args)]
struct DbMigrateArgs {
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

#[derive(Debug, Args)]
struct DbBackupArgs {
    #[arg(long)]
    out: PathBuf,
}

#[derive(Debug, Subcommand)]
enum SessionCommand {
    Show(SessionIdArgs),
    List,
    Clear(SessionIdArgs),
    Purge(SessionPurgeArgs),
}

#[derive(Debug, Args)]
struct SessionIdArgs {
    #[arg(long)]
    session_id: String,
}

#[derive(Debug, Args)]
struct SessionPurgeArgs {
    #[arg(long)]
    idle_minutes: u32,
}

fn with_contract_version(value: Value) -> Value {
    match value {
        Value::Object(mut object) => {
            object.insert(
                "contract_version".to_string(),
                Value::String(CLI_CONTRACT_VERSION.to_string()),
            );
            Value::Object(object)
        }
        other => serde_json::json!({
            "contract_version": CLI_CONTRACT_VERSION,
            "payload": other
        }),
    }
}

fn emit_json(value: Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&with_contract_version(value))?);
    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let content = load_content(cli.content_dir.as_deref(), &cli.default_language)?;
    let mut api = SauceBossApi::new(content);
    if let Some(db_path) = cli.session_db {
        api = api.with_session_db(db_path);
    }

    match cli.command {
        Command::Invoke(args) => run_invoke(&args, &api),
        Command::Recipes(args) => emit_json(serde_json::to_value(api.recipes(&args.locale))?),
        Command::Image(args) => run_image(&args),
        Command::Db { command } => run_db(command, &api),
        Command::Session { command } => run_session(command, &api),
    }
}

fn run_invoke(args: &InvokeArgs, api: &SauceBossApi) -> Result<()> {
    let body = fs::read_to_string(&args.request)
        .with_context(|| format!("failed to read request {}", args.request.display()))?;
    let envelope: RequestEnvelope = serde_json::from_str(&body)
        .with_context(|| format!("{} is not a request envelope", args.request.display()))?;

    tracing::debug!(request = %args.request.display(), seed = ?args.seed, "invoking skill");
    let response = match args.seed {
        Some(seed) => api.handle_with_rng(&envelope, &mut StdRng::seed_from_u64(seed)),
        None => api.handle(&envelope),
    };
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}

fn run_image(args: &ImageArgs) -> Result<()> {
    let known = SauceId::parse(&args.id);
    let image_url = image_for(&args.id);
    emit_json(serde_json::json!({
        "id": args.id,
        "known": known.is_some(),
        "is_default": image_url == DEFAULT_IMAGE_URL,
        "image_url": image_url
    }))
}

fn run_db(command: DbCommand, api: &SauceBossApi) -> Result<()> {
    match command {
        DbCommand::SchemaVersion => {
            let status = api.schema_status()?;
            emit_json(serde_json::json!({
                "current_version": status.current_version,
                "target_version": status.target_version,
                "pending_versions": status.pending_versions,
                "up_to_date": status.pending_versions.is_empty()
            }))
        }
        DbCommand::Migrate(args) => emit_json(serde_json::to_value(api.migrate(args.dry_run)?)?),
        DbCommand::Backup(args) => {
            api.migrate(false)?;
            api.backup(&args.out)?;
            emit_json(serde_json::json!({
                "backup_path": args.out,
                "status": "ok"
            }))
        }
    }
}

fn run_session(command: SessionCommand, api: &SauceBossApi) -> Result<()> {
    match command {
        SessionCommand::Show(args) => {
            emit_json(serde_json::to_value(api.session_show(&args.session_id)?)?)
        }
        SessionCommand::List => {
            let sessions = api.session_list()?;
            emit_json(serde_json::json!({
                "count": sessions.len(),
                "sessions": sessions
            }))
        }
        SessionCommand::Clear(args) => {
            let deleted = api.session_clear(&args.session_id)?;
            if !deleted {
                return Err(anyhow!("session not found: {}", args.session_id));
            }
            emit_json(serde_json::json!({
                "session_id": args.session_id,
                "deleted": deleted
            }))
        }
        SessionCommand::Purge(args) => {
            let idle = time::Duration::minutes(i64::from(args.idle_minutes));
            let purged = api.session_purge(idle)?;
            emit_json(serde_json::json!({
                "idle_minutes": args.idle_minutes,
                "purged": purged
            }))
        }
    }
}
