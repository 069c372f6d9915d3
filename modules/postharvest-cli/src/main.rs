use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use postharvest_analysis::AnalysisChain;
use postharvest_archive::{AcquisitionConfig, Orchestrator, PersistenceGateway, PgPostWriter};
use postharvest_common::AppConfig;

#[derive(Parser)]
#[command(name = "postharvest", about = "Archive and analyze social media posts")]
struct Cli {
    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Acquire a post and store it
    Process {
        url: String,
        /// Run the AI analysis chain before storing
        #[arg(long)]
        analyze: bool,
        /// Skip the database even when DATABASE_URL is set
        #[arg(long)]
        no_store: bool,
        /// Owner of the stored record (defaults to POSTHARVEST_USER_ID)
        #[arg(long)]
        user_id: Option<String>,
    },
    /// Acquire and analyze a post without storing it
    Analyze { url: String },
    /// Rewrite a post following the given instructions
    Remix {
        url: String,
        #[arg(long, default_value = "")]
        instructions: String,
    },
    /// Apply database migrations and exit
    Migrate,
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::from_default_env().add_directive("postharvest=info".parse()?);
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

async fn gateway(config: &AppConfig, enabled: bool) -> Result<PersistenceGateway> {
    let Some(url) = config.database_url.as_deref().filter(|_| enabled) else {
        if enabled {
            warn!("DATABASE_URL not set, results will not be stored");
        }
        return Ok(PersistenceGateway::disabled());
    };

    let writer = PgPostWriter::connect(url)
        .await
        .context("Failed to connect to Postgres")?;
    writer.migrate().await?;
    Ok(PersistenceGateway::new(Arc::new(writer)))
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs)?;

    let config = AppConfig::from_env()?;

    match cli.command {
        Command::Process {
            url,
            analyze,
            no_store,
            user_id,
        } => {
            let gateway = gateway(&config, !no_store).await?;
            let mut orchestrator =
                Orchestrator::from_config(AcquisitionConfig::from_app_config(&config), gateway);
            let user_id = user_id.or_else(|| config.user_id.clone());

            if analyze {
                orchestrator = orchestrator.with_analyzer(Arc::new(AnalysisChain::from_config(&config)));
                let processed = orchestrator
                    .process_and_analyze(&url, user_id.as_deref())
                    .await?;
                print_json(&processed)?;
            } else {
                let acquisition = orchestrator.process_url(&url, user_id.as_deref()).await?;
                print_json(&acquisition)?;
            }
        }
        Command::Analyze { url } => {
            let orchestrator = Orchestrator::from_config(
                AcquisitionConfig::from_app_config(&config),
                PersistenceGateway::disabled(),
            );
            let acquisition = orchestrator.process_url(&url, None).await?;
            let analysis = AnalysisChain::from_config(&config)
                .analyze(&acquisition.data)
                .await;
            print_json(&analysis)?;
        }
        Command::Remix { url, instructions } => {
            let orchestrator = Orchestrator::from_config(
                AcquisitionConfig::from_app_config(&config),
                PersistenceGateway::disabled(),
            );
            let acquisition = orchestrator.process_url(&url, None).await?;
            let remix = AnalysisChain::from_config(&config)
                .remix(&acquisition.data, &instructions)
                .await;
            print_json(&remix)?;
        }
        Command::Migrate => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL must be set to run migrations")?;
            PgPostWriter::connect(url).await?.migrate().await?;
            info!("Migrations applied");
        }
    }

    Ok(())
}
