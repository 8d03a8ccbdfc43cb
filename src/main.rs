use anyhow::Context;
use background_service::{BackgroundService, BrandScoutService, ScanOptions};
use brandscout_core::{
    AppConfig, CoreError, ErrorExt, KeywordUpdate, OpportunityQuery, OpportunityStatus,
    SettingsPatch,
};
use clap::{Parser, Subcommand};
use database::Database;
use matching_engine::HeuristicScorer;
use reddit_client::{RedditClient, RedditClientConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "brandscout=info,background_service=info,reddit_client=info";

#[derive(Parser)]
#[command(name = "brandscout", version, about = "Finds Reddit posts worth replying to")]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = "BRANDSCOUT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the cadence scheduler until Ctrl-C
    Run,
    /// Scan one brand now
    Scan {
        #[arg(long)]
        brand: i64,
    },
    /// Show opportunity statistics for a brand
    Stats {
        #[arg(long)]
        brand: i64,
    },
    #[command(subcommand)]
    Keyword(KeywordCommand),
    #[command(subcommand)]
    Settings(SettingsCommand),
    #[command(subcommand)]
    Opportunities(OpportunityCommand),
}

#[derive(Subcommand)]
enum KeywordCommand {
    Add {
        #[arg(long)]
        brand: i64,
        term: String,
        /// Restrict to these subreddits (repeatable)
        #[arg(long = "subreddit")]
        subreddits: Vec<String>,
    },
    List {
        #[arg(long)]
        brand: i64,
    },
    Pause {
        id: i64,
    },
    Resume {
        id: i64,
    },
    Remove {
        id: i64,
    },
}

#[derive(Subcommand)]
enum SettingsCommand {
    Show {
        #[arg(long)]
        brand: i64,
    },
    Set {
        #[arg(long)]
        brand: i64,
        #[arg(long)]
        enabled: Option<bool>,
        #[arg(long)]
        frequency_hours: Option<u32>,
        #[arg(long)]
        min_score: Option<i64>,
        #[arg(long)]
        auto_comments: Option<bool>,
        #[arg(long)]
        tone: Option<String>,
        #[arg(long)]
        mention_brand: Option<bool>,
        #[arg(long)]
        brand_name: Option<String>,
        #[arg(long)]
        brand_description: Option<String>,
    },
}

#[derive(Subcommand)]
enum OpportunityCommand {
    List {
        #[arg(long)]
        brand: i64,
        #[arg(long)]
        status: Option<String>,
        #[arg(long, default_value_t = OpportunityQuery::DEFAULT_LIMIT)]
        limit: u32,
        #[arg(long)]
        cursor: Option<i64>,
    },
    Complete {
        id: i64,
    },
    Dismiss {
        id: i64,
    },
    Draft {
        id: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::load(cli.config.as_deref()).context("loading configuration")?;

    let mut db = Database::new(config.database_url.clone());
    db.connect().await.context("connecting to the database")?;
    db.run_migrations().await.context("running migrations")?;
    let db = Arc::new(db);

    let reddit = RedditClient::new(RedditClientConfig::from_settings(&config.reddit, &config.retry))
        .context("building the Reddit client")?;
    let generator = llm_interface::build_generator(&config.llm).context("building the text generator")?;
    let service = BrandScoutService::new(
        Arc::clone(&db),
        Arc::new(reddit),
        Arc::new(HeuristicScorer::new()),
        generator,
        config.llm.max_words,
        ScanOptions::from_config(&config),
    );

    let result = execute(cli.command, &config, &service).await;
    db.close().await;
    if let Some(error) = result.as_ref().err().and_then(|e| e.downcast_ref::<CoreError>()) {
        eprintln!("{}", error.user_friendly_message());
    }
    result
}

async fn execute(command: Command, config: &AppConfig, service: &BrandScoutService) -> anyhow::Result<()> {
    match command {
        Command::Run => {
            if !config.scheduler.enabled {
                anyhow::bail!("the scheduler is disabled in the configuration");
            }
            tracing::info!("Starting BrandScout scheduler");
            let scheduler = Arc::new(BackgroundService::new(
                service.database(),
                service.orchestrator(),
                Duration::from_secs(config.scheduler.tick_interval_secs),
            ));
            let shutdown = CancellationToken::new();
            let signal = shutdown.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    signal.cancel();
                }
            });
            scheduler.start(shutdown).await?;
        }
        Command::Scan { brand } => {
            let summary = service.trigger_scan(brand).await?;
            println!("{}", summary.message());
            print_json(&summary)?;
        }
        Command::Stats { brand } => print_json(&service.get_stats(brand).await?)?,
        Command::Keyword(command) => match command {
            KeywordCommand::Add {
                brand,
                term,
                subreddits,
            } => print_json(&service.add_keyword(brand, &term, &subreddits).await?)?,
            KeywordCommand::List { brand } => print_json(&service.get_keywords(brand).await?)?,
            KeywordCommand::Pause { id } => print_json(
                &service
                    .update_keyword(id, &KeywordUpdate { is_active: Some(false) })
                    .await?,
            )?,
            KeywordCommand::Resume { id } => print_json(
                &service
                    .update_keyword(id, &KeywordUpdate { is_active: Some(true) })
                    .await?,
            )?,
            KeywordCommand::Remove { id } => {
                service.delete_keyword(id).await?;
                println!("Keyword {} removed", id);
            }
        },
        Command::Settings(command) => match command {
            SettingsCommand::Show { brand } => print_json(&service.get_settings(brand).await?)?,
            SettingsCommand::Set {
                brand,
                enabled,
                frequency_hours,
                min_score,
                auto_comments,
                tone,
                mention_brand,
                brand_name,
                brand_description,
            } => {
                let patch = SettingsPatch {
                    is_enabled: enabled,
                    scan_frequency_hours: frequency_hours,
                    min_relevance_score: min_score,
                    auto_generate_comments: auto_comments,
                    comment_tone: tone,
                    include_brand_mention: mention_brand,
                    brand_name,
                    brand_description,
                };
                print_json(&service.update_settings(brand, &patch).await?)?
            }
        },
        Command::Opportunities(command) => match command {
            OpportunityCommand::List {
                brand,
                status,
                limit,
                cursor,
            } => {
                let status = status
                    .map(|s| s.parse::<OpportunityStatus>())
                    .transpose()?;
                let query = OpportunityQuery {
                    brand_id: brand,
                    status,
                    limit,
                    cursor,
                };
                print_json(&service.get_opportunities(&query).await?)?
            }
            OpportunityCommand::Complete { id } => print_json(
                &service
                    .update_opportunity_status(id, OpportunityStatus::Completed)
                    .await?,
            )?,
            OpportunityCommand::Dismiss { id } => print_json(
                &service
                    .update_opportunity_status(id, OpportunityStatus::Dismissed)
                    .await?,
            )?,
            OpportunityCommand::Draft { id } => print_json(&service.generate_comment(id).await?)?,
        },
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
