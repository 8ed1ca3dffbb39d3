//! Warm Scheduler
//!
//! Runs registered warming jobs at their cron times. The scheduler knows
//! nothing about business timing; callers pick the cadence per strategy.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{info, warn};

use super::cron::CronSchedule;
use super::warmer::{CacheWarmer, WarmReport, WarmSource};
use crate::error::Result;

/// Type-erased warming job so sources with different value types can share
/// one scheduler.
#[async_trait]
trait WarmJob: Send + Sync {
    async fn run(&self, warmer: &CacheWarmer, strategy: &str) -> WarmReport;
}

struct SourceJob<S>(Arc<S>);

#[async_trait]
impl<S: WarmSource> WarmJob for SourceJob<S> {
    async fn run(&self, warmer: &CacheWarmer, strategy: &str) -> WarmReport {
        let identifiers = match self.0.identifiers().await {
            Ok(identifiers) => identifiers,
            Err(e) => {
                warn!("Could not list identifiers to warm for {}: {}", strategy, e);
                return WarmReport {
                    strategy: strategy.to_string(),
                    ..WarmReport::default()
                };
            }
        };

        match warmer.warm(strategy, self.0.clone(), identifiers).await {
            Ok(report) => report,
            Err(e) => {
                warn!("Warming {} failed: {}", strategy, e);
                WarmReport {
                    strategy: strategy.to_string(),
                    ..WarmReport::default()
                }
            }
        }
    }
}

#[derive(Clone)]
struct ScheduledJob {
    strategy: String,
    schedule: CronSchedule,
    job: Arc<dyn WarmJob>,
}

/// A registered job as reported by [`WarmScheduler::jobs`].
#[derive(Debug, Clone, Serialize)]
pub struct ScheduledJobInfo {
    pub strategy: String,
    pub cron: String,
    pub next_run: Option<DateTime<Utc>>,
}

// == Warm Scheduler ==
pub struct WarmScheduler {
    warmer: Arc<CacheWarmer>,
    jobs: Vec<ScheduledJob>,
}

impl WarmScheduler {
    pub fn new(warmer: Arc<CacheWarmer>) -> Self {
        Self {
            warmer,
            jobs: Vec::new(),
        }
    }

    pub fn warmer(&self) -> &Arc<CacheWarmer> {
        &self.warmer
    }

    // == Schedule ==
    /// Registers `source` to warm `strategy` on `cron_expression`.
    ///
    /// Unknown strategies and malformed expressions are rejected here,
    /// not at fire time.
    pub fn schedule<S: WarmSource>(
        &mut self,
        strategy: &str,
        cron_expression: &str,
        source: Arc<S>,
    ) -> Result<()> {
        self.warmer.cache().strategies().get(strategy)?;
        let schedule = CronSchedule::parse(cron_expression)?;

        info!("Scheduled warming of {} at '{}'", strategy, schedule);
        self.jobs.push(ScheduledJob {
            strategy: strategy.to_string(),
            schedule,
            job: Arc::new(SourceJob(source)),
        });
        Ok(())
    }

    pub fn jobs(&self) -> Vec<ScheduledJobInfo> {
        let now = Utc::now();
        self.jobs
            .iter()
            .map(|job| ScheduledJobInfo {
                strategy: job.strategy.clone(),
                cron: job.schedule.expression().to_string(),
                next_run: job.schedule.next_after(now),
            })
            .collect()
    }

    // == Run Startup ==
    /// Runs every job whose strategy is marked `warm_on_startup`, in
    /// registration order.
    pub async fn run_startup(&self) -> Vec<WarmReport> {
        let mut reports = Vec::new();
        for job in &self.jobs {
            let warm_on_startup = self
                .warmer
                .cache()
                .strategies()
                .get(&job.strategy)
                .map(|s| s.warm_on_startup)
                .unwrap_or(false);
            if warm_on_startup {
                reports.push(job.job.run(&self.warmer, &job.strategy).await);
            }
        }
        reports
    }

    /// Runs every job registered for `strategy` now, outside its schedule.
    pub async fn run_now(&self, strategy: &str) -> Vec<WarmReport> {
        let mut reports = Vec::new();
        for job in self.jobs.iter().filter(|j| j.strategy == strategy) {
            reports.push(job.job.run(&self.warmer, &job.strategy).await);
        }
        reports
    }

    // == Spawn ==
    /// Starts one timer loop per job. Aborting the returned handle stops
    /// all of them.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut loops = JoinSet::new();
            for job in self.jobs.clone() {
                let warmer = self.warmer.clone();
                loops.spawn(async move {
                    loop {
                        let now = Utc::now();
                        let Some(next) = job.schedule.next_after(now) else {
                            warn!(
                                "Schedule '{}' for {} never fires again",
                                job.schedule, job.strategy
                            );
                            return;
                        };
                        let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
                        tokio::time::sleep(wait).await;

                        let report = job.job.run(&warmer, &job.strategy).await;
                        info!(
                            "Scheduled warm of {}: {} ok, {} failed",
                            job.strategy,
                            report.succeeded(),
                            report.failed()
                        );
                    }
                });
            }

            while loops.join_next().await.is_some() {}
        })
    }
}
