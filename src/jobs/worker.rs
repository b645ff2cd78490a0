//! Queue worker: a fetch loop reserving due jobs and a process loop
//! dispatching them to registered handlers under a concurrency bound.
//! Shutdown drains in-flight jobs before the process exits; anything
//! still reserved is reclaimed by another worker once its visibility
//! window lapses.

use crate::config::Config;
use crate::entities::Job;
use crate::jobs::{JobRegistry, JobRepository, calculate_backoff_delay};
use anyhow::Result;
use chrono::Utc;
use sqlx::PgPool;
use std::{sync::Arc, time::Duration};
use tokio::{
    signal,
    sync::{Semaphore, mpsc},
    time::{interval, sleep},
};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};
use uuid::Uuid;

#[derive(Clone)]
pub struct WorkerConfig {
    pub concurrency: usize,
    pub poll_interval_ms: u64,
    pub visibility_timeout_secs: i64,
    pub base_backoff_secs: u32,
}

impl WorkerConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            concurrency: config.worker_concurrency(),
            poll_interval_ms: config.worker_poll_interval_ms(),
            visibility_timeout_secs: config.worker_visibility_timeout_secs(),
            base_backoff_secs: config.worker_base_backoff_secs(),
        }
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            poll_interval_ms: 1000,
            visibility_timeout_secs: 300, // 5 minutes
            base_backoff_secs: 30,
        }
    }
}

/// Everything both loops need; cheap to clone into spawned tasks.
#[derive(Clone)]
struct WorkerCore {
    pool: PgPool,
    registry: Arc<JobRegistry>,
    config: WorkerConfig,
    worker_id: Uuid,
}

/// Owns the shutdown token and supervises the two loops.
pub struct WorkerSupervisor {
    core: WorkerCore,
    shutdown: CancellationToken,
}

impl WorkerSupervisor {
    pub fn new(pool: PgPool, registry: JobRegistry, config: WorkerConfig) -> Self {
        Self {
            core: WorkerCore {
                pool,
                registry: Arc::new(registry),
                config,
                worker_id: Uuid::new_v4(),
            },
            shutdown: CancellationToken::new(),
        }
    }

    pub async fn run(self) -> Result<()> {
        let worker_id = self.core.worker_id;
        info!(
            %worker_id,
            concurrency = self.core.config.concurrency,
            poll_interval_ms = self.core.config.poll_interval_ms,
            visibility_timeout_secs = self.core.config.visibility_timeout_secs,
            "worker starting"
        );

        let (job_tx, job_rx) = mpsc::channel(self.core.config.concurrency * 2);
        let semaphore = Arc::new(Semaphore::new(self.core.config.concurrency));

        let shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            if let Err(err) = signal::ctrl_c().await {
                error!(error = %err, "failed to listen for shutdown signal");
                return;
            }
            info!("shutdown signal received, draining in-flight jobs");
            shutdown.cancel();
        });

        let fetcher = tokio::spawn(
            self.core
                .clone()
                .fetch_loop(job_tx, self.shutdown.clone())
                .instrument(info_span!("fetcher", %worker_id)),
        );
        let processor = tokio::spawn(
            self.core
                .clone()
                .process_loop(job_rx, semaphore.clone(), self.shutdown.clone())
                .instrument(info_span!("processor", %worker_id)),
        );

        self.shutdown.cancelled().await;

        // All permits available means every in-flight job finished.
        let _permits = semaphore
            .acquire_many(self.core.config.concurrency as u32)
            .await?;
        info!(%worker_id, "all jobs drained, worker stopped");

        let _ = tokio::join!(fetcher, processor);
        Ok(())
    }
}

impl WorkerCore {
    async fn fetch_loop(
        self,
        job_tx: mpsc::Sender<Job>,
        shutdown: CancellationToken,
    ) -> Result<()> {
        let mut poll = interval(Duration::from_millis(self.config.poll_interval_ms));

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("fetcher stopping");
                    return Ok(());
                }
                _ = poll.tick() => {
                    let due = JobRepository::fetch_due_jobs(
                        &self.pool,
                        self.config.concurrency as i64,
                        self.worker_id,
                        self.config.visibility_timeout_secs,
                    )
                    .await;

                    match due {
                        Ok(jobs) => {
                            debug!(count = jobs.len(), "reserved due jobs");
                            for job in jobs {
                                if job_tx.send(job).await.is_err() {
                                    warn!("job channel closed, fetcher stopping");
                                    return Ok(());
                                }
                            }
                        }
                        Err(err) => {
                            error!(error = %err, "fetching due jobs failed");
                            // Back off rather than hammering a failing database
                            sleep(Duration::from_millis(1000)).await;
                        }
                    }
                }
            }
        }
    }

    async fn process_loop(
        self,
        mut job_rx: mpsc::Receiver<Job>,
        semaphore: Arc<Semaphore>,
        shutdown: CancellationToken,
    ) -> Result<()> {
        while let Some(job) = tokio::select! {
            _ = shutdown.cancelled() => None,
            job = job_rx.recv() => job,
        } {
            let permit = semaphore.clone().acquire_owned().await?;
            let core = self.clone();
            let span = info_span!(
                "job",
                job_id = %job.id,
                kind = %job.kind,
                attempt = job.attempts + 1,
            );

            tokio::spawn(
                async move {
                    let _permit = permit; // held until the job completes
                    core.process_job(job).await;
                }
                .instrument(span),
            );
        }

        info!("processor stopping");
        Ok(())
    }

    async fn process_job(self, job: Job) {
        let span = info_span!("job_execution", job_id = %job.id, kind = %job.kind);

        let handler = match self.registry.create_handler(&job.kind, job.payload.clone()) {
            Ok(handler) => handler,
            Err(err) => {
                error!(error = %err, "no runnable handler for job");
                let _ = JobRepository::mark_failure(
                    &self.pool,
                    job.id,
                    &format!("handler construction failed: {err}"),
                    None,
                    0,
                )
                .await;
                return;
            }
        };

        match handler.run(job.payload.clone(), &self.pool, span).await {
            Ok(()) => {
                info!("job succeeded");
                if let Err(err) = JobRepository::mark_success(&self.pool, job.id).await {
                    error!(error = %err, "could not record job success");
                }
            }
            Err(err) => self.record_failure(&job, err).await,
        }
    }

    /// Schedule a retry with backoff, or mark the job permanently failed
    /// once attempts are exhausted.
    async fn record_failure(&self, job: &Job, err: anyhow::Error) {
        let attempt = job.attempts + 1;
        error!(error = %err, attempt, "job failed");

        let retry_at = (attempt < job.max_attempts).then(|| {
            let delay = calculate_backoff_delay(attempt, self.config.base_backoff_secs);
            (delay, Utc::now() + chrono::Duration::from_std(delay).unwrap())
        });

        let outcome = match retry_at {
            Some((delay, next_run_at)) => {
                info!(
                    retry_in_secs = delay.as_secs(),
                    attempt = attempt + 1,
                    max_attempts = job.max_attempts,
                    "job scheduled for retry"
                );
                JobRepository::mark_failure(
                    &self.pool,
                    job.id,
                    &err.to_string(),
                    Some(next_run_at),
                    delay.as_secs() as i32,
                )
                .await
            }
            None => {
                warn!(attempts = attempt, "job permanently failed");
                JobRepository::mark_failure(&self.pool, job.id, &err.to_string(), None, 0).await
            }
        };

        if let Err(record_err) = outcome {
            error!(error = %record_err, "could not record job failure");
        }
    }
}
