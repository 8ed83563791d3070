use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lark_common::{load_config, Budget, FilterRecord, GroupSize, TimeConstraint};
use lark_engine::{FileLoader, MoodResolver, SnapshotStore};

#[derive(Parser)]
#[command(name = "lark")]
#[command(about = "Mood-matched, diversified recommendations from the London Lark catalogue")]
#[command(version)]
struct Cli {
    /// Application config (TOML)
    #[arg(long, env = "LARK_CONFIG", default_value = "config/lark.toml", global = true)]
    config: PathBuf,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a recommendation from filter fields
    Recommend {
        /// Mood phrase, e.g. "something witchy"
        #[arg(long)]
        mood: Option<String>,

        /// Area or region, e.g. "Hackney" or "east_london"
        #[arg(long)]
        location: Option<String>,

        /// tonight, tomorrow, weekend, a weekday, or YYYY-MM-DD
        #[arg(long)]
        time: Option<TimeConstraint>,

        /// low or high
        #[arg(long)]
        budget: Option<Budget>,

        /// solo or group
        #[arg(long)]
        group: Option<GroupSize>,

        /// The user's raw message. Defaults to the mood phrase.
        #[arg(long)]
        text: Option<String>,

        /// Seed for reproducible picks
        #[arg(long, env = "LARK_SEED")]
        seed: Option<u64>,

        /// Reference date for relative time constraints (defaults to today)
        #[arg(long)]
        today: Option<NaiveDate>,
    },

    /// Resolve a mood phrase to a tag
    Resolve { phrase: Vec<String> },

    /// Classify text for sensitive content
    Classify { text: Vec<String> },

    /// Report catalogue coverage gaps
    Audit,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.log_json)?;

    let store = open_store(&cli.config)?;
    let engine = store.load_full();

    let output = match cli.command {
        Commands::Recommend {
            mood,
            location,
            time,
            budget,
            group,
            text,
            seed,
            today,
        } => {
            let filters = FilterRecord {
                raw_text: text.or_else(|| mood.clone()),
                mood,
                location,
                time,
                budget,
                group,
            };
            let today = today.unwrap_or_else(|| chrono::Local::now().date_naive());
            let mut rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_os_rng(),
            };

            let result = engine.recommend(&filters, today, &mut rng);
            info!(mode = ?result.mode, picks = result.picks.len(), "Recommendation complete");
            json!({
                "requires_resources": result.requires_resources(),
                "low_confidence": result.is_low_confidence(),
                "result": result,
            })
        }
        Commands::Resolve { phrase } => {
            let phrase = phrase.join(" ");
            let resolver = MoodResolver::new(engine.taxonomy());
            let mood = resolver.resolve(&phrase);
            json!({
                "phrase": phrase,
                "hedging": resolver.is_hedging(&phrase),
                "low_confidence": mood.as_ref().is_some_and(|m| m.is_low_confidence()),
                "mood": mood,
            })
        }
        Commands::Classify { text } => {
            let severity = engine.classify(&text.join(" "));
            json!({
                "requires_resources": severity.tier.requires_resources(),
                "severity": severity,
            })
        }
        Commands::Audit => {
            let audit = engine.audit();
            json!({
                "clean": audit.is_clean(),
                "audit": audit,
            })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("lark=info".parse()?);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

fn open_store(config_path: &Path) -> Result<SnapshotStore> {
    let config_dir = config_path.parent().unwrap_or_else(|| Path::new("."));
    let config = load_config(config_path)?.resolve_paths(config_dir);
    info!(catalogue = %config.data.catalogue.display(), "Loading London Lark engine");
    SnapshotStore::open(FileLoader::from_config(&config)).context("Failed to load engine snapshot")
}
