//! Backup scheduler
//!
//! Owns the timers that drive scheduled backups. The scheduler is an
//! explicit state machine — `Idle`, `ArmedOnce`, `ArmedRecurring`, and
//! `Running` (derived from the engine's flag) — driven by config updates
//! and timer fires:
//!
//! - On the first-ever enable (`last_backup_at` is `None`) the next run is
//!   immediate.
//! - Otherwise the next run is `last_backup_at + interval`. An overdue next
//!   run executes once as a catch-up, never once per missed interval.
//! - A one-shot timer covers the remaining gap, then hands over to the
//!   recurring interval timer. Every fire re-reads the freshest persisted
//!   config rather than the config captured at arm time.
//!
//! A reconfiguration received while a run is active is stored as the single
//! pending update (last write wins) and applied the moment the run
//! completes. All runs, scheduled and immediate, are routed through
//! [`BackupScheduler::run_backup`] so that hand-off is uniform.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;

use super::engine::{BackupEngine, BackupMode, BackupOutcome};
use super::notify::{BackupNotifier, SchedulerStatus};
use crate::config::{ScheduleConfig, VaultPaths};
use crate::error::{VaultError, VaultResult};

/// Scheduler state, including the engine-derived `Running`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerPhase {
    /// No timers armed
    Idle,
    /// One-shot timer armed for the remaining gap to the next run
    ArmedOnce,
    /// Recurring interval timer armed
    ArmedRecurring,
    /// A backup workflow is active right now
    Running,
}

/// What the scheduler should do next for a given config
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NextRun {
    /// Scheduled backups are off
    Disabled,
    /// Run now, then recur; `next_at` is persisted as the due time
    Immediate { next_at: i64 },
    /// Wait out the gap, run once, then recur
    Delayed { next_at: i64, delay_ms: i64 },
}

/// Decide the next run from the config and the current time
fn plan_next_run(config: &ScheduleConfig, now_ms: i64) -> NextRun {
    if !config.enabled {
        return NextRun::Disabled;
    }

    let interval_ms = config.interval.interval_ms();
    match config.last_backup_at {
        // First-ever enable: back up immediately.
        None => NextRun::Immediate { next_at: now_ms },
        Some(last) => {
            let next = last + interval_ms;
            if next <= now_ms {
                // Overdue: exactly one catch-up run.
                NextRun::Immediate { next_at: now_ms }
            } else {
                NextRun::Delayed {
                    next_at: next,
                    delay_ms: next - now_ms,
                }
            }
        }
    }
}

#[derive(Default)]
struct TimerState {
    task: Option<JoinHandle<()>>,
    armed_once: bool,
    armed: bool,
    pending: Option<ScheduleConfig>,
}

struct SchedulerInner {
    paths: VaultPaths,
    engine: Arc<BackupEngine>,
    notifier: Arc<dyn BackupNotifier>,
    timers: Mutex<TimerState>,
}

/// Drives scheduled backups and brokers config updates
///
/// Methods that arm timers must be called from within a Tokio runtime.
#[derive(Clone)]
pub struct BackupScheduler {
    inner: Arc<SchedulerInner>,
}

impl BackupScheduler {
    /// Create a scheduler over the engine; no timers are armed yet
    pub fn new(
        paths: VaultPaths,
        engine: Arc<BackupEngine>,
        notifier: Arc<dyn BackupNotifier>,
    ) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                paths,
                engine,
                notifier,
                timers: Mutex::new(TimerState::default()),
            }),
        }
    }

    /// Apply a new schedule config
    ///
    /// If a backup run is active the config becomes the single pending
    /// update (last write wins) and is applied when the run completes.
    /// Otherwise existing timers are cleared and new ones armed per the
    /// config.
    pub fn update(&self, config: &ScheduleConfig) -> VaultResult<()> {
        if self.inner.engine.is_running() {
            self.inner.timers.lock().unwrap().pending = Some(config.clone());
            tracing::debug!("backup in progress, deferring schedule update");

            // The run may have completed between the flag check and the
            // store above; if so nobody is left to apply the deferral.
            if !self.inner.engine.is_running() {
                if let Some(config) = self.inner.timers.lock().unwrap().pending.take() {
                    return apply_config(&self.inner, &config);
                }
            }
            return Ok(());
        }

        apply_config(&self.inner, config)
    }

    /// Run one backup now, then apply any deferred config update
    ///
    /// Shared by scheduled fires and the immediate-trigger entry points. A
    /// concurrent workflow rejects with [`VaultError::BackupInProgress`].
    pub async fn run_backup(&self, mode: BackupMode) -> VaultResult<BackupOutcome> {
        let config = ScheduleConfig::load_or_default(&self.inner.paths)?;
        run_with_config(&self.inner, &config, mode).await
    }

    /// Current status from the running flag and the persisted config
    pub fn status(&self) -> VaultResult<SchedulerStatus> {
        let config = ScheduleConfig::load_or_default(&self.inner.paths)?;
        Ok(SchedulerStatus {
            is_running: self.inner.engine.is_running(),
            last_backup: config.last_backup_at,
            next_backup: config.next_backup_at,
        })
    }

    /// Current state machine phase
    pub fn phase(&self) -> SchedulerPhase {
        if self.inner.engine.is_running() {
            return SchedulerPhase::Running;
        }
        let timers = self.inner.timers.lock().unwrap();
        if !timers.armed {
            SchedulerPhase::Idle
        } else if timers.armed_once {
            SchedulerPhase::ArmedOnce
        } else {
            SchedulerPhase::ArmedRecurring
        }
    }
}

/// Clear timers and re-arm them for `config`
fn apply_config(inner: &Arc<SchedulerInner>, config: &ScheduleConfig) -> VaultResult<()> {
    let mut timers = inner.timers.lock().unwrap();

    if let Some(task) = timers.task.take() {
        task.abort();
    }
    timers.armed = false;
    timers.armed_once = false;

    // The schedule decision uses the passed config, but the last-run time
    // belongs to the engine; take it from disk so a stale snapshot cannot
    // re-trigger a run that already happened.
    let persisted = ScheduleConfig::load_or_default(&inner.paths)?;
    let mut effective = config.clone();
    effective.last_backup_at = persisted.last_backup_at;

    let interval_ms = effective.interval.interval_ms();
    if effective.enabled && interval_ms <= 0 {
        tracing::error!(interval = %effective.interval, "refusing to arm zero-length interval");
        return Ok(());
    }

    let now_ms = chrono::Utc::now().timestamp_millis();
    let plan = plan_next_run(&effective, now_ms);

    let next_at = match plan {
        NextRun::Disabled => None,
        NextRun::Immediate { next_at } | NextRun::Delayed { next_at, .. } => Some(next_at),
    };
    persist_next_backup_at(&inner.paths, next_at)?;
    inner.notifier.status_changed(SchedulerStatus {
        is_running: false,
        last_backup: effective.last_backup_at,
        next_backup: next_at,
    });

    match plan {
        NextRun::Disabled => {
            tracing::info!("scheduled backups disabled");
        }
        NextRun::Immediate { .. } => {
            tracing::info!("backup due now, running immediately");
            timers.armed = true;
            timers.armed_once = false;
            timers.task = Some(tokio::spawn(run_loop(inner.clone(), None)));
        }
        NextRun::Delayed { next_at, delay_ms } => {
            tracing::info!(next_at, delay_ms, "armed one-shot backup timer");
            timers.armed = true;
            timers.armed_once = true;
            timers.task = Some(tokio::spawn(run_loop(
                inner.clone(),
                Some(Duration::from_millis(delay_ms as u64)),
            )));
        }
    }

    Ok(())
}

/// Timer task: optional initial gap, then run-and-recur
async fn run_loop(inner: Arc<SchedulerInner>, initial_delay: Option<Duration>) {
    if let Some(delay) = initial_delay {
        tokio::time::sleep(delay).await;
        let mut timers = inner.timers.lock().unwrap();
        timers.armed_once = false;
    }

    loop {
        scheduled_fire(&inner).await;

        // Re-read the freshest config for the recurring gap; the config
        // captured at arm time may be long stale by now.
        let config = match ScheduleConfig::load_or_default(&inner.paths) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %e, "failed to reload schedule config, stopping timer");
                break;
            }
        };
        if !config.enabled {
            break;
        }

        tokio::time::sleep(Duration::from_millis(config.interval.interval_ms() as u64)).await;
    }
}

/// One timer fire: reload config, run a scheduled backup
async fn scheduled_fire(inner: &Arc<SchedulerInner>) {
    let config = match ScheduleConfig::load_or_default(&inner.paths) {
        Ok(config) => config,
        Err(e) => {
            tracing::warn!(error = %e, "failed to load schedule config, skipping fire");
            return;
        }
    };
    if !config.enabled {
        return;
    }

    match run_with_config(inner, &config, BackupMode::Scheduled).await {
        Ok(_) => {}
        Err(VaultError::BackupInProgress) => {
            tracing::debug!("scheduled fire skipped, a backup is already active");
        }
        Err(e) => {
            tracing::warn!(error = %e, "scheduled backup failed");
        }
    }
}

/// Run the engine, then hand any deferred config update to the scheduler
async fn run_with_config(
    inner: &Arc<SchedulerInner>,
    config: &ScheduleConfig,
    mode: BackupMode,
) -> VaultResult<BackupOutcome> {
    let result = inner.engine.perform_backup(config, mode).await;

    // If we were rejected, some other workflow is active and owns the
    // pending hand-off.
    if !matches!(result, Err(VaultError::BackupInProgress)) {
        let pending = inner.timers.lock().unwrap().pending.take();
        if let Some(config) = pending {
            tracing::info!("applying deferred schedule update");
            if let Err(e) = apply_config(inner, &config) {
                tracing::error!(error = %e, "failed to apply deferred schedule update");
            }
        }

        // Status after the run, from the freshest persisted timestamps.
        if let Ok(config) = ScheduleConfig::load_or_default(&inner.paths) {
            inner.notifier.status_changed(SchedulerStatus {
                is_running: false,
                last_backup: config.last_backup_at,
                next_backup: config.next_backup_at,
            });
        }
    }

    result
}

/// Load-modify-save just the next-run timestamp
fn persist_next_backup_at(paths: &VaultPaths, next_at: Option<i64>) -> VaultResult<()> {
    let mut config = ScheduleConfig::load_or_default(paths)?;
    config.next_backup_at = next_at;
    config.save(paths)
}
