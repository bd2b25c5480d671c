//! Crosspost CLI tool.

use clap::{Parser, Subcommand};

mod commands;

use commands::Client;

#[derive(Parser)]
#[command(name = "crosspost")]
#[command(about = "Crosspost publishing queue CLI", long_about = None)]
struct Cli {
    /// API server URL
    #[arg(long, env = "CROSSPOST_API_URL", default_value = "http://localhost:3000")]
    api_url: String,

    /// Acting account id
    #[arg(long, env = "CROSSPOST_ACCOUNT_ID")]
    account: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage publishing jobs
    Jobs {
        #[command(subcommand)]
        command: JobCommands,
    },
}

#[derive(Subcommand)]
enum JobCommands {
    /// List jobs
    List {
        /// Filter by status (queued, processing, published, failed, cancelled)
        #[arg(long, default_value = "all")]
        status: String,
        /// Filter by platform
        #[arg(long, default_value = "all")]
        platform: String,
        /// Scheduled-day range start (YYYY-MM-DD, inclusive)
        #[arg(long)]
        from: Option<String>,
        /// Scheduled-day range end (YYYY-MM-DD, inclusive)
        #[arg(long)]
        to: Option<String>,
    },
    /// Retry a job that has not published yet
    Retry {
        /// Job ID
        id: String,
    },
    /// Retry several jobs; reports how many published
    BulkRetry {
        /// Job IDs
        #[arg(required = true)]
        ids: Vec<String>,
    },
    /// Publish a queued job now, ignoring its schedule
    Publish {
        /// Job ID
        id: String,
    },
    /// Cancel a job
    Cancel {
        /// Job ID
        id: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let client = Client::new(&cli.api_url, &cli.account);

    match cli.command {
        Commands::Jobs { command } => match command {
            JobCommands::List {
                status,
                platform,
                from,
                to,
            } => {
                commands::jobs::list(&client, &status, &platform, from, to).await?;
            }
            JobCommands::Retry { id } => {
                commands::jobs::retry(&client, &id).await?;
            }
            JobCommands::BulkRetry { ids } => {
                commands::jobs::bulk_retry(&client, &ids).await?;
            }
            JobCommands::Publish { id } => {
                commands::jobs::publish(&client, &id).await?;
            }
            JobCommands::Cancel { id } => {
                commands::jobs::cancel(&client, &id).await?;
            }
        },
    }

    Ok(())
}
