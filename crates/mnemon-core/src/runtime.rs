//! Background runtime for periodic retention work.
//!
//! Owns the momentum sweep and the optional forgetting run as scheduled jobs
//! with explicit start and shutdown, so the host ties them to its own
//! lifecycle instead of timers started in constructors.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use tracing::{debug, error, info};

use crate::error::{MnemonError, MnemonResult};
use crate::forgetting::{ForgettingPolicy, ForgettingResult};
use crate::momentum::{MomentumBuffer, SweepStats};

/// Configuration for the BackgroundRuntime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Whether to schedule the momentum sweep (default: true).
    pub enable_momentum_sweep: bool,
    /// Whether to schedule forgetting runs (default: false).
    pub enable_forgetting: bool,
    /// Interval between forgetting runs in minutes (default: 1440).
    pub forgetting_interval_minutes: u64,
    /// Most observations deleted per forgetting run (default: 100).
    pub forgetting_batch_limit: usize,
    /// Only report candidates, never delete (default: true).
    pub forgetting_dry_run: bool,
    /// Whether to run each job once immediately on start (default: false).
    pub run_on_start: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            enable_momentum_sweep: true,
            enable_forgetting: false,
            forgetting_interval_minutes: 1440,
            forgetting_batch_limit: 100,
            forgetting_dry_run: true,
            run_on_start: false,
        }
    }
}

impl RuntimeConfig {
    /// Enable scheduled forgetting every `minutes` (minimum 1).
    pub fn with_forgetting_interval(mut self, minutes: u64) -> Self {
        self.enable_forgetting = true;
        self.forgetting_interval_minutes = minutes.max(1);
        self
    }

    /// Let scheduled forgetting delete observations.
    pub fn with_live_forgetting(mut self) -> Self {
        self.forgetting_dry_run = false;
        self
    }

    /// Run each job immediately on start.
    pub fn with_run_on_start(mut self) -> Self {
        self.run_on_start = true;
        self
    }

    /// Disable the momentum sweep.
    pub fn without_momentum_sweep(mut self) -> Self {
        self.enable_momentum_sweep = false;
        self
    }

    /// Validate configuration values are in valid ranges.
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.forgetting_interval_minutes == 0 {
            return Err("forgetting_interval_minutes must be at least 1");
        }
        if self.forgetting_batch_limit == 0 {
            return Err("forgetting_batch_limit must be at least 1");
        }
        Ok(())
    }

    /// Create config from environment variables.
    ///
    /// Reads:
    /// - `MNEMON_DISABLE_MOMENTUM_SWEEP` (default: unset)
    /// - `MNEMON_FORGETTING_INTERVAL_MINUTES` (enables forgetting when set)
    /// - `MNEMON_FORGETTING_BATCH_LIMIT` (default: 100)
    /// - `MNEMON_FORGETTING_LIVE` (default: unset = dry run)
    /// - `MNEMON_RUN_ON_START` (default: unset)
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if std::env::var("MNEMON_DISABLE_MOMENTUM_SWEEP").is_ok() {
            config.enable_momentum_sweep = false;
        }

        if let Ok(interval) = std::env::var("MNEMON_FORGETTING_INTERVAL_MINUTES") {
            if let Ok(minutes) = interval.parse::<u64>() {
                config = config.with_forgetting_interval(minutes);
            }
        }

        if let Ok(limit) = std::env::var("MNEMON_FORGETTING_BATCH_LIMIT") {
            if let Ok(limit) = limit.parse() {
                config.forgetting_batch_limit = limit;
            }
        }

        if std::env::var("MNEMON_FORGETTING_LIVE").is_ok() {
            config.forgetting_dry_run = false;
        }

        if std::env::var("MNEMON_RUN_ON_START").is_ok() {
            config.run_on_start = true;
        }

        config
    }
}

/// Background runtime managing the retention jobs.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use mnemon_core::{BackgroundRuntime, MomentumBuffer, RuntimeConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let momentum = Arc::new(MomentumBuffer::default());
///     let mut runtime = BackgroundRuntime::new(RuntimeConfig::default(), momentum, None).await?;
///
///     runtime.start().await?;
///
///     // ... application runs ...
///
///     runtime.shutdown().await?;
///     Ok(())
/// }
/// ```
pub struct BackgroundRuntime {
    scheduler: JobScheduler,
    momentum: Arc<MomentumBuffer>,
    forgetting: Option<Arc<ForgettingPolicy>>,
    config: RuntimeConfig,
    started: bool,
}

impl BackgroundRuntime {
    /// Create a runtime. Jobs are registered on `start()`.
    pub async fn new(
        config: RuntimeConfig,
        momentum: Arc<MomentumBuffer>,
        forgetting: Option<Arc<ForgettingPolicy>>,
    ) -> MnemonResult<Self> {
        debug!(
            momentum_sweep = config.enable_momentum_sweep,
            forgetting = config.enable_forgetting && forgetting.is_some(),
            "Creating BackgroundRuntime"
        );

        let scheduler = JobScheduler::new().await?;

        Ok(Self {
            scheduler,
            momentum,
            forgetting,
            config,
            started: false,
        })
    }

    /// Register the enabled jobs and start the scheduler.
    pub async fn start(&mut self) -> MnemonResult<()> {
        if self.started {
            return Err(MnemonError::Scheduler("runtime already started".to_string()));
        }

        if self.config.enable_momentum_sweep {
            let interval_secs = self.momentum.config().sweep_interval_secs.max(1);
            let momentum = self.momentum.clone();
            let job = Job::new_repeated_async(Duration::from_secs(interval_secs), move |_uuid, _lock| {
                let momentum = momentum.clone();
                Box::pin(async move {
                    let stats = momentum.sweep();
                    debug!(
                        expired = stats.expired,
                        evicted = stats.evicted,
                        remaining = stats.remaining,
                        "Periodic momentum sweep"
                    );
                })
            });
            self.add_job("momentum_sweep", job).await?;
            info!(interval_secs, "Momentum sweep scheduled");
        }

        if let Some(policy) = self.scheduled_forgetting() {
            let interval_secs = self.config.forgetting_interval_minutes.max(1) * 60;
            let limit = self.config.forgetting_batch_limit;
            let dry_run = self.config.forgetting_dry_run;
            let job = Job::new_repeated_async(Duration::from_secs(interval_secs), move |_uuid, _lock| {
                let policy = policy.clone();
                Box::pin(async move {
                    debug!(limit, dry_run, "Starting periodic forgetting");
                    let result = policy.apply_forgetting(limit, dry_run).await;
                    info!(
                        deleted = result.deleted,
                        candidates = result.candidates.len(),
                        dry_run,
                        "Periodic forgetting complete"
                    );
                })
            });
            self.add_job("forgetting", job).await?;
            info!(
                interval_minutes = self.config.forgetting_interval_minutes,
                dry_run, "Forgetting scheduled"
            );
        }

        if self.config.run_on_start {
            debug!("Running retention jobs on start");
            if self.config.enable_momentum_sweep {
                self.run_momentum_sweep_now();
            }
            self.run_forgetting_now().await;
        }

        self.scheduler.start().await?;
        self.started = true;

        info!("Background runtime started");
        Ok(())
    }

    /// Stop the scheduler gracefully.
    pub async fn shutdown(&mut self) -> MnemonResult<()> {
        debug!("Shutting down background runtime");
        self.scheduler.shutdown().await?;
        self.started = false;
        info!("Background runtime stopped");
        Ok(())
    }

    async fn add_job(
        &self,
        name: &'static str,
        job: Result<Job, JobSchedulerError>,
    ) -> MnemonResult<()> {
        let added = match job {
            Ok(job) => self.scheduler.add(job).await.map(|_| ()),
            Err(e) => Err(e),
        };
        added.map_err(|e| {
            error!(job = name, error = %e, "Failed to schedule job");
            MnemonError::from(e)
        })
    }

    fn scheduled_forgetting(&self) -> Option<Arc<ForgettingPolicy>> {
        if self.config.enable_forgetting {
            self.forgetting.clone()
        } else {
            None
        }
    }

    /// Sweep the momentum buffer outside the schedule.
    pub fn run_momentum_sweep_now(&self) -> SweepStats {
        self.momentum.sweep()
    }

    /// Run forgetting outside the schedule with the configured limit and mode.
    ///
    /// Returns `None` when forgetting is not enabled.
    pub async fn run_forgetting_now(&self) -> Option<ForgettingResult> {
        let policy = self.scheduled_forgetting()?;
        Some(
            policy
                .apply_forgetting(self.config.forgetting_batch_limit, self.config.forgetting_dry_run)
                .await,
        )
    }

    /// Whether `start()` has run without a later `shutdown()`.
    pub fn is_started(&self) -> bool {
        self.started
    }

    /// Get the momentum buffer.
    pub fn momentum(&self) -> &Arc<MomentumBuffer> {
        &self.momentum
    }

    /// Get the runtime configuration.
    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }
}
