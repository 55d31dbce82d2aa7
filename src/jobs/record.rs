use super::status::JobStatus;
use crate::error::{ErrorCategory, FlowprepError, Result};
use crate::options::PreprocessingOptions;
use crate::pipeline::{PipelineResult, StageKind, StageRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::watch;
use uuid::Uuid;

pub type JobId = Uuid;

/// Why a job failed. Permanent once recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobError {
    pub category: ErrorCategory,
    pub message: String,
    /// The stage that was running, when the failure came from the pipeline.
    pub stage: Option<StageKind>,
}

#[derive(Debug, Default)]
struct JobState {
    status: JobStatus,
    error: Option<JobError>,
    result: Option<Arc<PipelineResult>>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
}

/// One tracked pipeline invocation.
///
/// Only the job's own worker mutates it. Progress is a single atomic counter of
/// completed stages that never decreases; everything else sits behind a lock that
/// is held only for the duration of a field copy.
#[derive(Debug)]
pub struct PreprocessingJob {
    pub id: JobId,
    pub dataset_id: String,
    /// Copy of the options at submission time.
    pub options: PreprocessingOptions,
    pub created_at: DateTime<Utc>,
    stages_completed: AtomicUsize,
    state: RwLock<JobState>,
    status_tx: watch::Sender<JobStatus>,
}

impl PreprocessingJob {
    pub(crate) fn new(dataset_id: String, options: PreprocessingOptions) -> Self {
        let (status_tx, _) = watch::channel(JobStatus::Pending);
        Self {
            id: Uuid::new_v4(),
            dataset_id,
            options,
            created_at: Utc::now(),
            stages_completed: AtomicUsize::new(0),
            state: RwLock::new(JobState::default()),
            status_tx,
        }
    }

    fn poisoned(&self) -> FlowprepError {
        FlowprepError::processing(format!("job {} state lock poisoned", self.id))
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, JobState>> {
        self.state.read().map_err(|_poisoned| self.poisoned())
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, JobState>> {
        self.state.write().map_err(|_poisoned| self.poisoned())
    }

    /// # Errors
    ///
    /// Fails if the state lock is poisoned.
    pub fn status(&self) -> Result<JobStatus> {
        Ok(self.read()?.status)
    }

    /// Completed stages over total stages, in `[0.0, 1.0]`.
    pub fn progress(&self) -> f64 {
        self.stages_completed.load(Ordering::SeqCst) as f64 / StageKind::COUNT as f64
    }

    /// Record that `completed` stages are done. Never moves progress backwards.
    pub(crate) fn record_progress(&self, completed: usize) {
        self.stages_completed
            .fetch_max(completed.min(StageKind::COUNT), Ordering::SeqCst);
    }

    /// The stage that would run next, if any.
    pub(crate) fn current_stage(&self) -> Option<StageKind> {
        StageKind::ALL
            .get(self.stages_completed.load(Ordering::SeqCst))
            .copied()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<JobStatus> {
        self.status_tx.subscribe()
    }

    fn transition(&self, state: &mut JobState, to: JobStatus) -> Result<()> {
        if !state.status.can_transition_to(to) {
            return Err(FlowprepError::processing(format!(
                "job {}: illegal transition {} -> {to}",
                self.id, state.status
            )));
        }
        tracing::info!(job_id = %self.id, from = %state.status, to = %to, "Job transition");
        state.status = to;
        self.status_tx.send_replace(to);
        Ok(())
    }

    pub(crate) fn mark_processing(&self) -> Result<()> {
        let mut state = self.write()?;
        self.transition(&mut state, JobStatus::Processing)?;
        state.started_at = Some(Utc::now());
        Ok(())
    }

    pub(crate) fn mark_completed(&self, result: PipelineResult) -> Result<()> {
        let mut state = self.write()?;
        self.transition(&mut state, JobStatus::Completed)?;
        state.result = Some(Arc::new(result));
        state.completed_at = Some(Utc::now());
        Ok(())
    }

    pub(crate) fn mark_failed(&self, error: JobError) -> Result<()> {
        let mut state = self.write()?;
        self.transition(&mut state, JobStatus::Failed)?;
        tracing::error!(
            job_id = %self.id,
            category = %error.category,
            stage = ?error.stage,
            "Job failed: {}",
            error.message
        );
        state.error = Some(error);
        state.completed_at = Some(Utc::now());
        Ok(())
    }

    /// # Errors
    ///
    /// [`FlowprepError::NotReady`] unless the job has completed.
    pub fn result(&self) -> Result<Arc<PipelineResult>> {
        let state = self.read()?;
        match (&state.result, state.status) {
            (Some(result), JobStatus::Completed) => Ok(Arc::clone(result)),
            _ => Err(FlowprepError::NotReady {
                job_id: self.id.to_string(),
                status: state.status.to_string(),
            }),
        }
    }

    /// # Errors
    ///
    /// Fails if the state lock is poisoned.
    pub fn view(&self) -> Result<JobStatusView> {
        let state = self.read()?;
        Ok(JobStatusView {
            id: self.id,
            dataset_id: self.dataset_id.clone(),
            status: state.status,
            progress: self.progress(),
            error: state.error.clone(),
            created_at: self.created_at,
            started_at: state.started_at,
            completed_at: state.completed_at,
        })
    }

    /// # Errors
    ///
    /// Fails if the state lock is poisoned.
    pub fn snapshot(&self) -> Result<JobSnapshot> {
        let state = self.read()?;
        Ok(JobSnapshot {
            id: self.id,
            dataset_id: self.dataset_id.clone(),
            status: state.status,
            progress: self.progress(),
            options: self.options,
            created_at: self.created_at,
            completed_at: state.completed_at,
            error: state.error.clone(),
            log: state.result.as_ref().map(|r| r.log.clone()),
        })
    }
}

/// Point-in-time status of a job, as returned to pollers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobStatusView {
    pub id: JobId,
    pub dataset_id: String,
    pub status: JobStatus,
    pub progress: f64,
    pub error: Option<JobError>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Persisted form of a job for collaborators that store or inspect it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSnapshot {
    pub id: JobId,
    pub dataset_id: String,
    pub status: JobStatus,
    pub progress: f64,
    pub options: PreprocessingOptions,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<JobError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log: Option<Vec<StageRecord>>,
}

impl JobSnapshot {
    /// # Errors
    ///
    /// Serialisation errors are passed on.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// # Errors
    ///
    /// Fails on malformed JSON or options that no longer validate.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    #![expect(clippy::unwrap_used)]
    use super::*;

    fn job() -> PreprocessingJob {
        PreprocessingJob::new("ds-1".to_owned(), PreprocessingOptions::default())
    }

    #[test]
    fn test_progress_never_decreases() {
        let job = job();
        job.record_progress(3);
        job.record_progress(1);
        assert!((job.progress() - 0.6).abs() < f64::EPSILON);
        job.record_progress(9);
        assert!((job.progress() - 1.0).abs() < f64::EPSILON);
        assert_eq!(job.current_stage(), None);
    }

    #[test]
    fn test_illegal_transition_is_rejected() {
        let job = job();
        let err = job
            .mark_failed(JobError {
                category: ErrorCategory::Processing,
                message: "boom".to_owned(),
                stage: None,
            })
            .unwrap_err();
        assert_eq!(err.category(), ErrorCategory::Processing);
        assert_eq!(job.status().unwrap(), JobStatus::Pending);
        assert!(job.view().unwrap().error.is_none());
    }

    #[test]
    fn test_result_not_ready_until_completed() {
        let job = job();
        job.mark_processing().unwrap();
        match job.result().unwrap_err() {
            FlowprepError::NotReady { status, .. } => assert_eq!(status, "processing"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_snapshot_json_round_trip() {
        let job = job();
        job.record_progress(2);
        let snapshot = job.snapshot().unwrap();
        let back = JobSnapshot::from_json(&snapshot.to_json().unwrap()).unwrap();
        assert_eq!(back, snapshot);
        assert!(snapshot.to_json().unwrap().contains("\"imputation_method\": \"mean\""));
    }
}
