use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::Level;

mod cmd;

#[derive(Parser)]
#[command(name = "pagesmith")]
#[command(version, about = "Turn briefs into published static apps, and grade them")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json_logs: bool,

    /// Config file (defaults to .pagesmith/config.toml when present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the build service (POST /, GET /health)
    Serve {
        #[arg(long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Run the evaluator service (POST /notify, GET /results, GET /health)
    Evaluate {
        #[arg(long)]
        host: Option<String>,
        #[arg(short, long)]
        port: Option<u16>,
        /// Evaluation database path
        #[arg(long)]
        db_path: Option<PathBuf>,
    },
    /// Create the evaluation database and exit
    InitDb {
        #[arg(long)]
        db_path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    pagesmith::telemetry::init_tracing(cli.json_logs, level);

    let mut config = pagesmith::config::AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Serve { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            cmd::cmd_serve(config).await?;
        }
        Commands::Evaluate {
            host,
            port,
            db_path,
        } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.evaluator_port = port;
            }
            if let Some(db_path) = db_path {
                config.evaluator.db_path = db_path;
            }
            cmd::cmd_evaluate(config).await?;
        }
        Commands::InitDb { db_path } => {
            let db_path = db_path.unwrap_or(config.evaluator.db_path);
            cmd::cmd_init_db(&db_path)?;
        }
    }

    Ok(())
}
