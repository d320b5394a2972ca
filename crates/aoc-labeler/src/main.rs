use anyhow::{bail, Context, Result};
use aoc_label_core::{compress_label, normalize_label, LabelConfig, LabelRecord, PersistenceMode};
use aoc_label_store::{LabelSink, LabelsFileStore, PersistentLabelStore, SessionMetaStore};
use aoc_labeler::{
    ConfiguredCandidateSource, JsonlTranscript, LabelPipeline, LabelRequest, LabelerFileConfig,
};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

const LABELS_FILE_NAME: &str = "session-labels.json";
const SESSION_META_FILE_NAME: &str = "sessions.json";

#[derive(Parser)]
#[command(name = "aoc-labeler")]
#[command(about = "Derive and store short session labels", long_about = None)]
struct Cli {
    /// Verbose logging on stderr
    #[arg(long, global = true)]
    debug: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Label a session from its transcript if it is eligible
    Label(LabelArgs),
    /// Print stored labels
    Show(ShowArgs),
    /// Store a manual label that automatic labeling will not replace
    Set(SetArgs),
}

#[derive(Args)]
struct StoreArgs {
    /// TOML file with label options and store locations
    #[arg(long)]
    config: Option<PathBuf>,
    /// Which sink receives labels (labels-file | session-meta)
    #[arg(long)]
    mode: Option<PersistenceMode>,
    #[arg(long)]
    labels_path: Option<PathBuf>,
    #[arg(long)]
    session_meta_path: Option<PathBuf>,
}

#[derive(Args)]
struct LabelArgs {
    #[arg(long)]
    session: String,
    /// Line-delimited JSON transcript of the session
    #[arg(long)]
    transcript: PathBuf,
    /// Project name passed to the generator; defaults to the current directory name
    #[arg(long)]
    context_name: Option<String>,
    /// Replace an existing label, manual ones included
    #[arg(long)]
    relabel: bool,
    #[arg(long)]
    max_chars: Option<usize>,
    #[arg(long)]
    trigger_after: Option<usize>,
    #[arg(long)]
    max_messages: Option<usize>,
    #[arg(long)]
    timeout_ms: Option<u64>,
    /// Shell command that reads a prompt on stdin and prints a label
    #[arg(long, env = "AOC_LABEL_CMD")]
    candidate_cmd: Option<String>,
    #[command(flatten)]
    store: StoreArgs,
}

#[derive(Args)]
struct ShowArgs {
    /// Only this session; all labels otherwise
    #[arg(long)]
    session: Option<String>,
    #[command(flatten)]
    store: StoreArgs,
}

#[derive(Args)]
struct SetArgs {
    #[arg(long)]
    session: String,
    #[arg(long)]
    text: String,
    #[command(flatten)]
    store: StoreArgs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    match cli.command {
        Commands::Label(args) => label(args).await,
        Commands::Show(args) => show(args).await,
        Commands::Set(args) => set(args).await,
    }
}

fn init_logging(debug: bool) {
    let level = if debug {
        "debug".to_string()
    } else if let Ok(level) = std::env::var("AOC_LOG_LEVEL") {
        level
    } else {
        "info".to_string()
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}

async fn label(args: LabelArgs) -> Result<()> {
    let file = LabelerFileConfig::load_optional(args.store.config.as_deref())?;
    let mut config = file.label.clone();
    apply_overrides(&mut config, &args);

    let store = open_store(&args.store, &file, config.persistence_mode)?;
    let cmdline = args.candidate_cmd.or(file.candidate_command);
    let candidate = ConfiguredCandidateSource::from_cmdline(cmdline.as_deref());
    let pipeline =
        LabelPipeline::new(config, candidate, store).context("invalid label configuration")?;

    let context_name = args.context_name.or_else(current_dir_name);
    let request = LabelRequest {
        session_key: args.session,
        context_name,
    };
    let transcript = JsonlTranscript::new(args.transcript);
    let outcome = pipeline
        .run(&request, &transcript, Utc::now())
        .await
        .with_context(|| format!("failed to label session {}", request.session_key))?;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

fn apply_overrides(config: &mut LabelConfig, args: &LabelArgs) {
    if let Some(mode) = args.store.mode {
        config.persistence_mode = mode;
    }
    if args.relabel {
        config.relabel = true;
    }
    if let Some(max_chars) = args.max_chars {
        config.max_label_chars = max_chars;
    }
    if let Some(trigger_after) = args.trigger_after {
        config.trigger_after_requests = trigger_after;
    }
    if let Some(max_messages) = args.max_messages {
        config.max_messages_for_label = max_messages;
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.candidate_timeout_ms = timeout_ms;
    }
}

async fn show(args: ShowArgs) -> Result<()> {
    let file = LabelerFileConfig::load_optional(args.store.config.as_deref())?;
    let mode = args.store.mode.unwrap_or(file.label.persistence_mode);
    let store = open_store(&args.store, &file, mode)?;

    let rendered = match args.session {
        Some(session) => serde_json::to_string_pretty(&store.get_label(&session).await)?,
        None => serde_json::to_string_pretty(&store.read().await)?,
    };
    println!("{rendered}");
    Ok(())
}

async fn set(args: SetArgs) -> Result<()> {
    let file = LabelerFileConfig::load_optional(args.store.config.as_deref())?;
    let mode = args.store.mode.unwrap_or(file.label.persistence_mode);
    let store = open_store(&args.store, &file, mode)?;

    let text = compress_label(&normalize_label(&args.text), file.label.max_label_chars);
    if text.is_empty() {
        bail!("label text is empty after normalization");
    }
    let record = LabelRecord::manual(text, Utc::now());
    store
        .set_label(&args.session, record.clone())
        .await
        .with_context(|| format!("failed to store label for {}", args.session))?;

    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}

fn open_store(
    args: &StoreArgs,
    file: &LabelerFileConfig,
    mode: PersistenceMode,
) -> Result<PersistentLabelStore> {
    let store = match mode {
        PersistenceMode::LabelsFile => {
            let path = match args.labels_path.clone().or_else(|| file.labels_path.clone()) {
                Some(path) => path,
                None => default_state_dir()?.join(LABELS_FILE_NAME),
            };
            PersistentLabelStore::LabelsFile(LabelsFileStore::new(path))
        }
        PersistenceMode::SessionMeta => {
            let path = match args
                .session_meta_path
                .clone()
                .or_else(|| file.session_meta_path.clone())
            {
                Some(path) => path,
                None => default_state_dir()?.join(SESSION_META_FILE_NAME),
            };
            let store = match &file.session_meta_field {
                Some(field) => SessionMetaStore::with_field(path, field.as_str()),
                None => SessionMetaStore::new(path),
            };
            PersistentLabelStore::SessionMeta(store)
        }
    };
    Ok(store)
}

fn default_state_dir() -> Result<PathBuf> {
    dirs::state_dir()
        .or_else(|| dirs::home_dir().map(|home| home.join(".local/state")))
        .map(|dir| dir.join("aoc"))
        .context("unable to resolve a state directory; pass an explicit store path")
}

fn current_dir_name() -> Option<String> {
    let cwd = std::env::current_dir().ok()?;
    cwd.file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
}
