//! Bounded concurrent execution of batch jobs.
//!
//! - One tokio task per batch, tracked in a `JoinSet`
//! - A job runs only while holding a semaphore permit; the permit is released
//!   when its subprocess has terminated (success, failure or timeout)
//! - A fatal job error (tool cannot be spawned) cancels every sibling and waits
//!   for them to unwind, so no subprocess or query file outlives the run

use autoblast_protocol::{Batch, JobReport};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info};

use crate::job::{run_job, JobConfig};
use crate::DispatchError;

pub struct Dispatcher {
    config: Arc<JobConfig>,
    max_concurrent: usize,
}

impl Dispatcher {
    /// `max_concurrent` is clamped to at least one.
    pub fn new(config: JobConfig, max_concurrent: usize) -> Self {
        Self {
            config: Arc::new(config),
            max_concurrent: max_concurrent.max(1),
        }
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    /// Run every batch and collect the reports in completion order.
    pub async fn run(&self, batches: Vec<Batch>) -> Result<Vec<JobReport>, DispatchError> {
        self.run_with(batches, |_| {}).await
    }

    /// Like [`Dispatcher::run`], calling `on_report` as each job finishes.
    pub async fn run_with<F>(
        &self,
        batches: Vec<Batch>,
        mut on_report: F,
    ) -> Result<Vec<JobReport>, DispatchError>
    where
        F: FnMut(&JobReport),
    {
        let total = batches.len();
        if total == 0 {
            return Ok(Vec::new());
        }

        info!(
            "Dispatching {} batches ({} concurrent, timeout {:.0}s)",
            total,
            self.max_concurrent,
            self.config.timeout.as_secs_f64()
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrent));
        let mut jobs = JoinSet::new();

        for batch in batches {
            let semaphore = Arc::clone(&semaphore);
            let config = Arc::clone(&self.config);
            jobs.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|_| DispatchError::PoolClosed)?;
                debug!("[Batch {}] Acquired job permit", batch.index);
                run_job(batch, &config).await
            });
        }

        let mut reports = Vec::with_capacity(total);
        while let Some(joined) = jobs.join_next().await {
            let failure = match joined {
                Ok(Ok(report)) => {
                    on_report(&report);
                    reports.push(report);
                    continue;
                }
                Ok(Err(e)) => e,
                Err(join_err) => DispatchError::Task(join_err.to_string()),
            };

            error!("Aborting dispatch: {}", failure);
            jobs.abort_all();
            while jobs.join_next().await.is_some() {}
            return Err(failure);
        }

        info!("All {} batches finished", total);
        Ok(reports)
    }
}
