mod client;
mod console;
mod db;

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "cardmatrix")]
#[command(about = "Card customization matrix command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Show one plan's matrix and optionally stage and save edits
    Console(ConsoleArgs),
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    /// Check database connectivity
    Ping,
    /// Apply pending migrations
    Migrate,
    /// Load the option catalog and plans from YAML
    Seed {
        /// Catalog file (defaults to `CARDMATRIX_CATALOG_PATH`)
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
}

#[derive(Debug, Args)]
pub(crate) struct ConsoleArgs {
    /// Base URL of a running cardmatrix-server
    #[arg(long, env = "CARDMATRIX_SERVER_URL", default_value = "http://127.0.0.1:3000")]
    server: String,
    /// Bearer token for the admin routes
    #[arg(long, env = "CARDMATRIX_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
    /// Request timeout in seconds
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,
    /// Plan to edit
    #[arg(long)]
    plan_id: i64,
    /// Material context for textures, colours and patterns
    #[arg(long)]
    material: Option<String>,
    /// Option id or key to enable (repeatable)
    #[arg(long = "enable", value_name = "OPTION")]
    enable: Vec<String>,
    /// Option id or key to disable (repeatable)
    #[arg(long = "disable", value_name = "OPTION")]
    disable: Vec<String>,
    /// Option id or key to flip (repeatable)
    #[arg(long = "toggle", value_name = "OPTION")]
    toggle: Vec<String>,
    /// Show the staged edits without saving them
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Some(Commands::Db { command }) => match command {
            DbCommands::Ping => db::run_db_ping().await,
            DbCommands::Migrate => db::run_db_migrate().await,
            DbCommands::Seed { catalog } => db::run_db_seed(catalog).await,
        },
        Some(Commands::Console(args)) => console::run_console(&args).await,
        None => {
            println!("cardmatrix: pass --help to list commands");
            Ok(())
        }
    }
}
