//! CLI commands for snapvault
//!
//! Thin clap handlers over [`BackupService`]; all behavior lives in the
//! library. Output is plain text for humans; scripting callers should use
//! the library surface directly.

use clap::Subcommand;
use std::path::PathBuf;

use crate::config::BackupInterval;
use crate::error::{VaultError, VaultResult};
use crate::service::BackupService;

/// Top-level snapvault commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the backup scheduler and keep it running
    Run,

    /// Trigger an immediate backup
    Now,

    /// List all available backups
    List {
        /// Show detailed information
        #[arg(short, long)]
        verbose: bool,
    },

    /// Print a backup's raw contents
    Show {
        /// Backup filename (use 'latest' for most recent)
        backup: String,
    },

    /// Delete a backup
    Delete {
        /// Backup filename (use 'latest' for most recent)
        backup: String,
    },

    /// Restore application data from a backup
    Restore {
        /// Backup filename (use 'latest' for most recent)
        backup: String,

        /// Merge restored categories into existing data
        #[arg(short, long)]
        merge: bool,

        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Show or clear the backup history
    History {
        /// Clear the history log (artifacts are untouched)
        #[arg(long)]
        clear: bool,
    },

    /// Show current scheduler status
    Status,

    /// Schedule configuration
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Backup location
    #[command(subcommand)]
    Location(LocationCommands),
}

/// Schedule config subcommands
#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the current schedule config
    Show,

    /// Update schedule config fields
    Set {
        /// Enable or disable scheduled backups
        #[arg(long)]
        enabled: Option<bool>,

        /// Backup interval: daily, weekly, or monthly
        #[arg(long)]
        interval: Option<String>,

        /// Maximum number of retained backups (1-50)
        #[arg(long)]
        max_count: Option<u32>,

        /// Maximum cumulative backup size in MB (10-1000)
        #[arg(long)]
        max_size_mb: Option<u64>,

        /// Back up before remote synchronization
        #[arg(long)]
        before_sync: Option<bool>,

        /// Back up before a matching pass
        #[arg(long)]
        before_match: Option<bool>,
    },
}

/// Backup location subcommands
#[derive(Subcommand)]
pub enum LocationCommands {
    /// Print the effective backup directory
    Show,

    /// Set an explicit backup directory (must be inside the data root)
    Set {
        /// Absolute, normalized directory path
        path: PathBuf,
    },

    /// Open the backup directory in the platform file manager
    Open,
}

/// Dispatch one CLI command
pub async fn handle_command(service: &BackupService, cmd: Commands) -> VaultResult<()> {
    match cmd {
        Commands::Run => {
            service.start()?;
            let status = service.scheduler_status()?;
            println!("Scheduler running.");
            println!("  Next backup: {}", format_timestamp(status.next_backup));
            println!("Press Ctrl-C to stop.");
            tokio::signal::ctrl_c()
                .await
                .map_err(|e| VaultError::Io(format!("Failed to wait for Ctrl-C: {}", e)))?;
            println!("Stopped.");
        }

        Commands::Now => {
            println!("Creating backup...");
            let result = service.trigger_backup().await;
            if result.success {
                println!("Backup created: {}", result.backup_id.unwrap_or_default());
            } else {
                println!("Backup failed: {}", result.error.unwrap_or_default());
            }
        }

        Commands::List { verbose } => {
            let backups = service.list_backups().await?;

            if backups.is_empty() {
                println!("No backups found.");
                println!("Create one with: snapvault now");
                return Ok(());
            }

            println!("Available Backups");
            println!("=================");
            println!();

            for (i, backup) in backups.iter().enumerate() {
                let age = chrono::Utc::now().timestamp_millis() - backup.modified_ms;
                let age_str = format_age(age);

                if verbose {
                    println!(
                        "{}. {}\n   Path: {}\n   Size: {}\n   Age: {}\n",
                        i + 1,
                        backup.filename,
                        backup.path.display(),
                        format_size(backup.size),
                        age_str,
                    );
                } else {
                    println!(
                        "  {}. {} ({} ago, {})",
                        i + 1,
                        backup.filename,
                        age_str,
                        format_size(backup.size),
                    );
                }
            }

            println!();
            println!("Total: {} backup(s)", backups.len());
        }

        Commands::Show { backup } => {
            let filename = resolve_backup_name(service, &backup).await?;
            let contents = service.read_backup(&filename).await?;
            println!("{}", contents);
        }

        Commands::Delete { backup } => {
            let filename = resolve_backup_name(service, &backup).await?;
            service.delete_backup(&filename).await?;
            println!("Deleted: {}", filename);
        }

        Commands::Restore {
            backup,
            merge,
            force,
        } => {
            let filename = resolve_backup_name(service, &backup).await?;

            if !force {
                println!("WARNING: This will overwrite current application data!");
                println!("To proceed, run again with --force flag:");
                println!("  snapvault restore {} --force", backup);
                return Ok(());
            }

            println!("Restoring from {}...", filename);
            let outcome = service.restore_backup(&filename, merge).await;

            if outcome.success {
                println!("Restore complete.");
            } else {
                println!("Restore failed:");
                for error in &outcome.errors {
                    println!("  - {}", error);
                }
            }
        }

        Commands::History { clear } => {
            if clear {
                service.clear_history()?;
                println!("History cleared.");
                return Ok(());
            }

            let entries = service.get_history()?;
            if entries.is_empty() {
                println!("No backup history.");
                return Ok(());
            }

            for entry in &entries {
                println!(
                    "{}  {}  v{}  {}  [{}]",
                    format_timestamp(Some(entry.timestamp)),
                    entry.id,
                    entry.app_version,
                    format_size(entry.size),
                    entry.data_keys.join(", "),
                );
            }
            println!();
            println!("Total: {} entry(ies)", entries.len());
        }

        Commands::Status => {
            let status = service.scheduler_status()?;
            let config = service.get_schedule_config()?;

            println!("Scheduler Status");
            println!("================");
            println!("Enabled:     {}", if config.enabled { "yes" } else { "no" });
            println!("Interval:    {}", config.interval);
            println!("Running:     {}", if status.is_running { "yes" } else { "no" });
            println!("Last backup: {}", format_timestamp(status.last_backup));
            println!("Next backup: {}", format_timestamp(status.next_backup));
        }

        Commands::Config(cmd) => handle_config_command(service, cmd)?,

        Commands::Location(cmd) => handle_location_command(service, cmd)?,
    }

    Ok(())
}

fn handle_config_command(service: &BackupService, cmd: ConfigCommands) -> VaultResult<()> {
    match cmd {
        ConfigCommands::Show => {
            let config = service.get_schedule_config()?;
            let json = serde_json::to_string_pretty(&config)
                .map_err(|e| VaultError::Json(format!("Failed to render config: {}", e)))?;
            println!("{}", json);
        }

        ConfigCommands::Set {
            enabled,
            interval,
            max_count,
            max_size_mb,
            before_sync,
            before_match,
        } => {
            let mut config = service.get_schedule_config()?;

            if let Some(enabled) = enabled {
                config.enabled = enabled;
            }
            if let Some(interval) = interval {
                config.interval = parse_interval(&interval)?;
            }
            if let Some(max_count) = max_count {
                config.max_backup_count = max_count;
            }
            if let Some(max_size_mb) = max_size_mb {
                config.max_backup_size_mb = max_size_mb;
            }
            if let Some(before_sync) = before_sync {
                config.auto_backup_before_sync = before_sync;
            }
            if let Some(before_match) = before_match {
                config.auto_backup_before_match = before_match;
            }

            let saved = service.set_schedule_config(config)?;
            println!(
                "Schedule: {} ({}), keep {} backups / {} MB",
                if saved.enabled { "enabled" } else { "disabled" },
                saved.interval,
                saved.max_backup_count,
                saved.max_backup_size_mb,
            );
        }
    }
    Ok(())
}

fn handle_location_command(service: &BackupService, cmd: LocationCommands) -> VaultResult<()> {
    match cmd {
        LocationCommands::Show => {
            println!("{}", service.get_backup_location()?.display());
        }

        LocationCommands::Set { path } => {
            service.set_backup_location(path)?;
            println!("Backup location: {}", service.get_backup_location()?.display());
        }

        LocationCommands::Open => {
            let dir = service.get_backup_location()?;
            std::fs::create_dir_all(&dir)
                .map_err(|e| VaultError::Io(format!("Failed to create backup directory: {}", e)))?;
            open_in_file_manager(&dir)?;
        }
    }
    Ok(())
}

/// Parse an interval name from the command line
fn parse_interval(value: &str) -> VaultResult<BackupInterval> {
    match value.to_ascii_lowercase().as_str() {
        "daily" => Ok(BackupInterval::Daily),
        "weekly" => Ok(BackupInterval::Weekly),
        "monthly" => Ok(BackupInterval::Monthly),
        other => Err(VaultError::Validation(format!(
            "Unknown interval '{}': expected daily, weekly, or monthly",
            other
        ))),
    }
}

/// Resolve the 'latest' keyword to a real filename
async fn resolve_backup_name(service: &BackupService, backup: &str) -> VaultResult<String> {
    if backup.eq_ignore_ascii_case("latest") {
        return service
            .list_backups()
            .await?
            .into_iter()
            .next()
            .map(|b| b.filename)
            .ok_or_else(|| VaultError::backup_not_found("latest"));
    }
    Ok(backup.to_string())
}

/// Launch the platform file manager on a directory
fn open_in_file_manager(dir: &std::path::Path) -> VaultResult<()> {
    #[cfg(target_os = "macos")]
    let program = "open";
    #[cfg(target_os = "windows")]
    let program = "explorer";
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let program = "xdg-open";

    std::process::Command::new(program)
        .arg(dir)
        .spawn()
        .map_err(|e| VaultError::Io(format!("Failed to open {}: {}", dir.display(), e)))?;
    Ok(())
}

/// Format an epoch-ms timestamp for display
fn format_timestamp(timestamp_ms: Option<i64>) -> String {
    match timestamp_ms.and_then(chrono::DateTime::<chrono::Utc>::from_timestamp_millis) {
        Some(dt) => dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => "never".to_string(),
    }
}

/// Format an age in milliseconds in human-readable form
fn format_age(age_ms: i64) -> String {
    let total_seconds = age_ms / 1000;

    if total_seconds < 60 {
        return format!("{}s", total_seconds.max(0));
    }

    let minutes = total_seconds / 60;
    if minutes < 60 {
        return format!("{}m", minutes);
    }

    let hours = minutes / 60;
    if hours < 24 {
        return format!("{}h", hours);
    }

    let days = hours / 24;
    if days < 30 {
        return format!("{}d", days);
    }

    let months = days / 30;
    format!("{}mo", months)
}

/// Format a file size in human-readable form
fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
