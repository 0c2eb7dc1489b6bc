use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use snapvault::backup::LogNotifier;
use snapvault::cli::{handle_command, Commands};
use snapvault::config::VaultPaths;
use snapvault::service::BackupService;
use snapvault::storage::{FsDataStore, FsRestoreApplier};

#[derive(Parser)]
#[command(
    name = "snapvault",
    author = "Kaylee Beyene",
    version,
    about = "Scheduled backup rotation and recovery for application data",
    long_about = "snapvault keeps rolling snapshots of an application's data \
                  directory: scheduled backups with count and size based \
                  retention, a reconciled history log, and validated restores."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let paths = VaultPaths::new()?;
    paths.ensure_directories()?;

    let service = BackupService::new(
        paths.clone(),
        env!("CARGO_PKG_VERSION"),
        Arc::new(FsDataStore::new(&paths)),
        Arc::new(FsRestoreApplier::new(&paths)),
        Arc::new(LogNotifier),
    );

    handle_command(&service, cli.command).await?;
    Ok(())
}
