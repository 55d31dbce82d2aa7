use super::record::{JobError, JobId, JobSnapshot, JobStatusView, PreprocessingJob};
use super::status::JobStatus;
use crate::dataset::{Dataset, DatasetMeta};
use crate::error::{ErrorCategory, FlowprepError, Result};
use crate::options::PreprocessingOptions;
use crate::pipeline::{PipelineResult, run_pipeline_with_progress};
use crate::quota::{QuotaRequest, TierPolicy, check_quota};
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, LockResult, Mutex, MutexGuard, RwLock};
use tokio::runtime::Handle;

/// Creates jobs, runs their workers and answers status queries.
///
/// Cloning is cheap; clones share the same job table.
#[derive(Clone)]
pub struct JobManager {
    inner: Arc<Inner>,
}

struct Inner {
    jobs: RwLock<HashMap<JobId, Arc<PreprocessingJob>>>,
    /// Dataset id to its single non-terminal job.
    active: Mutex<HashMap<String, JobId>>,
    runtime: Handle,
}

fn poisoned(what: &str) -> FlowprepError {
    FlowprepError::processing(format!("{what} lock poisoned"))
}

fn release_slot(
    job: &PreprocessingJob,
    active: LockResult<MutexGuard<'_, HashMap<String, JobId>>>,
) {
    match active {
        Ok(mut active) => {
            if active.get(&job.dataset_id) == Some(&job.id) {
                active.remove(&job.dataset_id);
            }
        }
        Err(_e) => tracing::error!(job_id = %job.id, "active jobs lock poisoned"),
    }
}

impl JobManager {
    /// Workers run on `runtime`'s blocking pool.
    pub fn new(runtime: Handle) -> Self {
        Self {
            inner: Arc::new(Inner {
                jobs: RwLock::new(HashMap::new()),
                active: Mutex::new(HashMap::new()),
                runtime,
            }),
        }
    }

    /// # Errors
    ///
    /// Fails when called outside a Tokio runtime.
    pub fn current() -> Result<Self> {
        let handle = Handle::try_current()
            .map_err(|e| FlowprepError::processing(format!("no Tokio runtime: {e}")))?;
        Ok(Self::new(handle))
    }

    /// Create a pending job for `dataset_id` and start its worker. Never blocks on
    /// the pipeline.
    ///
    /// # Errors
    ///
    /// [`FlowprepError::Conflict`] if the dataset already has a pending or
    /// processing job.
    pub fn submit(
        &self,
        dataset_id: impl Into<String>,
        dataset: Dataset,
        options: PreprocessingOptions,
    ) -> Result<JobId> {
        let dataset_id = dataset_id.into();
        let job = {
            let mut active = self.inner.active.lock().map_err(|_e| poisoned("active jobs"))?;
            if let Some(existing) = active.get(&dataset_id) {
                return Err(FlowprepError::Conflict(format!(
                    "dataset '{dataset_id}' already has active job {existing}"
                )));
            }
            let job = Arc::new(PreprocessingJob::new(dataset_id.clone(), options));
            self.inner
                .jobs
                .write()
                .map_err(|_e| poisoned("job table"))?
                .insert(job.id, Arc::clone(&job));
            active.insert(dataset_id, job.id);
            job
        };

        tracing::info!(job_id = %job.id, dataset_id = %job.dataset_id, "Job submitted");
        let id = job.id;
        let worker = Worker {
            manager: self.clone(),
            job,
        };
        // Detached: the job record, not the join handle, carries the outcome.
        drop(self.inner.runtime.spawn_blocking(move || worker.run(&dataset)));
        Ok(id)
    }

    /// Check the quota, then [`submit`](Self::submit). A denied request creates no
    /// job.
    ///
    /// # Errors
    ///
    /// [`FlowprepError::QuotaExceeded`] or [`FlowprepError::Conflict`].
    pub fn submit_checked(
        &self,
        dataset_id: impl Into<String>,
        dataset: Dataset,
        meta: &DatasetMeta,
        options: PreprocessingOptions,
        policy: &TierPolicy,
    ) -> Result<JobId> {
        check_quota(policy, &QuotaRequest::from(meta))?;
        self.submit(dataset_id, dataset, options)
    }

    fn run_worker(&self, job: &PreprocessingJob, dataset: &Dataset) {
        if let Err(e) = job.mark_processing() {
            tracing::error!(job_id = %job.id, "Could not start job: {e}");
            self.finish(job, Err(e));
            return;
        }

        let outcome = std::panic::catch_unwind(AssertUnwindSafe(|| {
            run_pipeline_with_progress(dataset, &job.options, |done, _| job.record_progress(done))
        }))
        .unwrap_or_else(|_panic| Err(FlowprepError::processing("pipeline worker panicked")));
        self.finish(job, outcome);
    }

    /// Record the terminal state and free the dataset slot under the same lock, so a
    /// caller that observes the terminal state can resubmit straight away.
    fn finish(&self, job: &PreprocessingJob, outcome: Result<PipelineResult>) {
        let active = self.inner.active.lock();
        let recorded = match outcome {
            Ok(result) => job.mark_completed(result),
            Err(e) => job.mark_failed(JobError {
                category: e.category(),
                message: e.to_string(),
                stage: job.current_stage(),
            }),
        };
        if let Err(e) = recorded {
            tracing::error!(job_id = %job.id, "Could not record job outcome: {e}");
        }
        release_slot(job, active);
    }

    /// Fail a job whose worker was dropped before it ran.
    fn abandon(&self, job: &PreprocessingJob) {
        let active = self.inner.active.lock();
        let recorded = job.mark_processing().and_then(|()| {
            job.mark_failed(JobError {
                category: ErrorCategory::Processing,
                message: "worker never started: runtime is shutting down".to_owned(),
                stage: None,
            })
        });
        if let Err(e) = recorded {
            tracing::error!(job_id = %job.id, "Could not record abandoned job: {e}");
        }
        release_slot(job, active);
    }

    fn job(&self, id: JobId) -> Result<Arc<PreprocessingJob>> {
        self.inner
            .jobs
            .read()
            .map_err(|_e| poisoned("job table"))?
            .get(&id)
            .cloned()
            .ok_or_else(|| FlowprepError::NotFound(format!("job {id}")))
    }

    /// Current status, progress and error. Never waits on the worker.
    ///
    /// # Errors
    ///
    /// [`FlowprepError::NotFound`] for an unknown id.
    pub fn get_status(&self, id: JobId) -> Result<JobStatusView> {
        self.job(id)?.view()
    }

    /// # Errors
    ///
    /// [`FlowprepError::NotReady`] unless the job completed, or
    /// [`FlowprepError::NotFound`].
    pub fn get_result(&self, id: JobId) -> Result<Arc<PipelineResult>> {
        self.job(id)?.result()
    }

    /// # Errors
    ///
    /// [`FlowprepError::NotFound`] for an unknown id.
    pub fn snapshot(&self, id: JobId) -> Result<JobSnapshot> {
        self.job(id)?.snapshot()
    }

    /// Every retained job, oldest first.
    ///
    /// # Errors
    ///
    /// Fails if a lock is poisoned.
    pub fn list(&self) -> Result<Vec<JobStatusView>> {
        let jobs: Vec<Arc<PreprocessingJob>> = self
            .inner
            .jobs
            .read()
            .map_err(|_e| poisoned("job table"))?
            .values()
            .cloned()
            .collect();
        let mut views = jobs.iter().map(|j| j.view()).collect::<Result<Vec<_>>>()?;
        views.sort_by_key(|v| v.created_at);
        Ok(views)
    }

    /// The newest job submitted for `dataset_id`, whatever its status.
    ///
    /// # Errors
    ///
    /// Fails if a lock is poisoned.
    pub fn latest_for_dataset(&self, dataset_id: &str) -> Result<Option<JobStatusView>> {
        let latest = self
            .inner
            .jobs
            .read()
            .map_err(|_e| poisoned("job table"))?
            .values()
            .filter(|job| job.dataset_id == dataset_id)
            .max_by_key(|job| job.created_at)
            .cloned();
        latest.map(|job| job.view()).transpose()
    }

    /// Remove a terminal job from the table.
    ///
    /// # Errors
    ///
    /// [`FlowprepError::Conflict`] while the job is still pending or processing.
    pub fn purge(&self, id: JobId) -> Result<()> {
        let job = self.job(id)?;
        let status = job.status()?;
        if !status.is_terminal() {
            return Err(FlowprepError::Conflict(format!(
                "job {id} is {status} and cannot be purged"
            )));
        }
        self.inner
            .jobs
            .write()
            .map_err(|_e| poisoned("job table"))?
            .remove(&id);
        tracing::info!(job_id = %id, "Job purged");
        Ok(())
    }

    /// Wait until the job reaches a terminal state.
    ///
    /// # Errors
    ///
    /// [`FlowprepError::NotFound`] for an unknown id.
    pub async fn wait(&self, id: JobId) -> Result<JobStatusView> {
        let job = self.job(id)?;
        let mut rx = job.subscribe();
        rx.wait_for(|status| status.is_terminal())
            .await
            .map_err(|e| {
                FlowprepError::processing(format!("job {id} status channel closed: {e}"))
            })?;
        job.view()
    }
}


/// Runs one job on the blocking pool. If the runtime drops it unrun, the job is
/// failed instead of staying pending.
struct Worker {
    manager: JobManager,
    job: Arc<PreprocessingJob>,
}

impl Worker {
    fn run(&self, dataset: &Dataset) {
        self.manager.run_worker(&self.job, dataset);
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        if matches!(self.job.status(), Ok(JobStatus::Pending)) {
            tracing::error!(job_id = %self.job.id, "Job worker dropped before it started");
            self.manager.abandon(&self.job);
        }
    }
}
