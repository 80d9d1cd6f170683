use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use style_extract::media::{embed_file, FileReplayGenerator};
use style_extract::{
    AccountTier, ArchiveStatus, Config, ProcessingRecord, ResolutionTier, Session, SqliteStore,
    UsageLevel,
};

/// Browse and maintain the local history of generated image edits
#[derive(Parser, Debug)]
#[command(version)]
struct Cli {
    /// SQLite catalog holding the history (defaults to the platform data dir)
    #[arg(long, env = "STYLE_EXTRACT_DB", value_name = "PATH")]
    db: Option<PathBuf>,

    /// Account whose history to use
    #[arg(long, env = "STYLE_EXTRACT_ACCOUNT")]
    account: Option<String>,

    /// Account tier, which sets the history byte budget
    #[arg(long, env = "STYLE_EXTRACT_TIER")]
    tier: Option<AccountTier>,

    /// Reject stored history blobs of this many bytes or more
    #[arg(long, env = "STYLE_EXTRACT_MAX_VALUE_BYTES", value_name = "BYTES")]
    max_value_bytes: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List history, newest first
    List,
    /// Show one record
    Show { id: String },
    /// Archive a result rendered elsewhere
    Add {
        /// Original input image
        #[arg(long)]
        input: PathBuf,
        /// Generated output image
        #[arg(long)]
        output: PathBuf,
        #[arg(long)]
        prompt: String,
        #[arg(long, default_value_t = ResolutionTier::default())]
        resolution: ResolutionTier,
    },
    /// Delete one record
    Delete { id: String },
    /// Delete the whole history
    Clear,
    /// Show how much of the budget is in use
    Usage,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::resolve(cli.db, cli.account, cli.tier, cli.max_value_bytes);

    let mut session = config
        .open_session()
        .with_context(|| format!("failed to open history catalog at {}", config.db_path.display()))?;

    // Generation is the only suspending step; a single-threaded runtime is enough
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    match cli.command {
        Command::List => print_list(&session),
        Command::Show { id } => {
            let Some(record) = session.select(&id) else {
                bail!("no record with id {id}");
            };
            print_record(record);
        }
        Command::Add {
            input,
            output,
            prompt,
            resolution,
        } => {
            let outcome = runtime.block_on(async {
                let original = embed_file(&input).await?;
                let generator = FileReplayGenerator::new(output);
                let outcome = session
                    .generate_and_record(&generator, original, &prompt, resolution)
                    .await?;
                anyhow::Ok(outcome)
            })?;

            match outcome.archive {
                ArchiveStatus::Archived { id } => {
                    println!("✅ Saved {id} ({})", session.usage());
                }
                ArchiveStatus::NotArchived(err) => {
                    bail!("result could not be saved to history: {err}");
                }
            }
        }
        Command::Delete { id } => {
            let before = session.list().len();
            session.delete_one(&id)?;
            if session.list().len() < before {
                println!("🗑️  Deleted {id}");
            } else {
                println!("No record with id {id}");
            }
        }
        Command::Clear => {
            session.clear()?;
            println!("🗑️  History cleared");
        }
        Command::Usage => print_usage(&session),
    }

    Ok(())
}

fn print_list(session: &Session<SqliteStore>) {
    let records = session.list();
    if records.is_empty() {
        println!("History is empty.");
        return;
    }

    for record in records {
        println!(
            "{}  {}  {:>6}  {:>9}  {}",
            record.id(),
            record.created_at().format("%Y-%m-%d %H:%M:%S"),
            record.resolution(),
            format_bytes(record.size_bytes()),
            truncate(record.prompt(), 48),
        );
    }
    print_usage(session);
}

fn print_record(record: &ProcessingRecord) {
    println!("id:          {}", record.id());
    println!("created:     {}", record.created_at().to_rfc3339());
    println!("resolution:  {}", record.resolution());
    println!("size:        {}", format_bytes(record.size_bytes()));
    println!("input:       {} ({})", record.original_image().preview_url, record.original_image().mime_type);
    println!("prompt:      {}", record.prompt());
}

fn print_usage(session: &Session<SqliteStore>) {
    let usage = session.usage();
    let marker = match usage.level() {
        UsageLevel::Healthy => "🟢",
        UsageLevel::Warning => "🟡",
        UsageLevel::Critical => "🔴",
    };
    println!(
        "{marker} {} records, {} [{}]",
        session.list().len(),
        usage,
        session.account().tier
    );
}

fn format_bytes(bytes: u64) -> String {
    if bytes >= 1024 * 1024 {
        format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{bytes} B")
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('…');
    out
}
