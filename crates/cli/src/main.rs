mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use stratum_migrate::MigrateError;

#[derive(Parser)]
#[command(name = "stratum", version)]
#[command(about = "Transactional schema migrations for PostgreSQL")]
struct Cli {
    /// Directory containing <id>_<label>.up.sql / .down.sql pairs
    #[arg(long, global = true)]
    migrations_dir: Option<PathBuf>,

    /// Postgres connection string (defaults to DATABASE_URL)
    #[arg(long, global = true)]
    database_url: Option<String>,

    /// Seconds to wait for a concurrent migration run to finish
    #[arg(long, global = true)]
    lock_timeout: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply pending migrations, oldest first
    Up {
        /// Apply at most N migrations
        n: Option<usize>,
    },

    /// Revert the most recently applied migrations, newest first
    Down {
        /// How many migrations to revert
        #[arg(default_value_t = 1)]
        n: usize,
    },

    /// Show applied and pending migrations
    Status,

    /// Scaffold a new migration pair
    New {
        /// Migration name, e.g. "add email unique"
        name: String,
    },
}

/// Exit codes promised to callers: deploy scripts branch on these.
fn exit_code(err: &MigrateError) -> i32 {
    match err {
        MigrateError::LockTimeout { .. } => 2,
        MigrateError::Apply { .. } => 3,
        _ => 1,
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let overrides = commands::Overrides {
        migrations_dir: cli.migrations_dir,
        database_url: cli.database_url,
        lock_timeout: cli.lock_timeout,
    };

    let result = match cli.command {
        Commands::Up { n } => commands::up(&overrides, n).await,
        Commands::Down { n } => commands::down(&overrides, n).await,
        Commands::Status => commands::status(&overrides).await,
        Commands::New { name } => commands::new(&overrides, &name),
    };

    if let Err(e) = result {
        eprintln!("error: {}", e);
        std::process::exit(exit_code(&e));
    }
}
