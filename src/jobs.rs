//! Background jobs: the job record, its state machine, and the shared
//! registry.
//!
//! One conversion request = one [`Job`], driven end to end by one
//! `tokio::spawn` task. The [`JobStore`] is an explicit, injected
//! registry owned by the embedding layer (created at process start, torn
//! down at shutdown) — never process-global state.
//!
//! ## State machine
//!
//! ```text
//! processing(progress 0..=95) ──▶ completed(100)
//!                             └─▶ failed(progress frozen at last checkpoint)
//! ```
//!
//! Progress is monotonically non-decreasing and written at the fixed
//! checkpoints of [`crate::progress::Checkpoint`]. `completed` and
//! `failed` are terminal: once reached, the store refuses further field
//! mutation. A failed job keeps the progress of its last successful
//! checkpoint, which is deliberately diagnostic.
//!
//! ## Concurrency
//!
//! Each job is written only by its own background task; readers snapshot
//! through the store without blocking writers of *other* jobs (per-job
//! locks behind a registry lock held only for map access). Two jobs never
//! share mutable state.

use crate::config::ConversionConfig;
use crate::convert;
use crate::error::Paper2SpeechError;
use crate::model::Document;
use crate::output::JobResult;
use crate::pipeline::input;
use crate::progress::{Checkpoint, ConversionObserver, Observer};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, RwLock};
use tracing::{info, warn};
use uuid::Uuid;

/// Opaque unique job identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(Uuid);

impl JobId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Lifecycle status of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// One conversion request's visible record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub status: JobStatus,
    /// Monotonically non-decreasing, 0–100.
    pub progress: u8,
    pub created_at: DateTime<Utc>,
    /// Set when the job reaches a terminal state.
    pub finished_at: Option<DateTime<Utc>>,
    /// Present once completed.
    pub result: Option<JobResult>,
    /// Present once failed.
    pub error: Option<String>,
}

impl Job {
    fn new() -> Self {
        Self {
            id: JobId::new(),
            status: JobStatus::Processing,
            progress: 0,
            created_at: Utc::now(),
            finished_at: None,
            result: None,
            error: None,
        }
    }
}

/// Where a job's document comes from.
pub enum JobSource {
    /// Raw PDF bytes (staged to a managed temp file for the job's
    /// lifetime, removed on every exit path).
    Bytes(Vec<u8>),
    /// A local file path.
    Path(PathBuf),
    /// An already-read document.
    Document(Document),
}

/// Shared registry of job records.
///
/// Insertion is safe under concurrency; per-job updates go through a
/// per-entry lock so a reader of job A never blocks on the writer of
/// job B.
#[derive(Default)]
pub struct JobStore {
    jobs: RwLock<HashMap<JobId, Arc<RwLock<Job>>>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fresh `processing` job with progress 0.
    pub fn create(&self) -> JobId {
        let job = Job::new();
        let id = job.id.clone();
        self.jobs
            .write()
            .expect("job registry poisoned")
            .insert(id.clone(), Arc::new(RwLock::new(job)));
        id
    }

    /// Snapshot a job's current record.
    pub fn snapshot(&self, id: &JobId) -> Option<Job> {
        let entry = {
            let jobs = self.jobs.read().expect("job registry poisoned");
            Arc::clone(jobs.get(id)?)
        };
        let job = entry.read().expect("job record poisoned");
        Some(job.clone())
    }

    /// All known job ids, unordered.
    pub fn job_ids(&self) -> Vec<JobId> {
        self.jobs
            .read()
            .expect("job registry poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Apply a mutation unless the job is terminal. Returns whether the
    /// mutation was applied.
    fn update<F: FnOnce(&mut Job)>(&self, id: &JobId, f: F) -> bool {
        let entry = {
            let jobs = self.jobs.read().expect("job registry poisoned");
            match jobs.get(id) {
                Some(entry) => Arc::clone(entry),
                None => return false,
            }
        };
        let mut job = entry.write().expect("job record poisoned");
        if job.status.is_terminal() {
            return false;
        }
        f(&mut job);
        true
    }

    /// Raise progress to `value` (never lowers it).
    pub fn set_progress(&self, id: &JobId, value: u8) {
        self.update(id, |job| {
            job.progress = job.progress.max(value.min(100));
        });
    }

    /// Transition to `completed` with the success payload.
    pub fn complete(&self, id: &JobId, result: JobResult) {
        let applied = self.update(id, |job| {
            job.status = JobStatus::Completed;
            job.progress = 100;
            job.finished_at = Some(Utc::now());
            job.result = Some(result);
        });
        if applied {
            info!("Job {} completed", id);
        }
    }

    /// Transition to `failed` with a captured error description.
    /// Progress stays at its last checkpoint.
    pub fn fail(&self, id: &JobId, error: String) {
        let applied = self.update(id, |job| {
            job.status = JobStatus::Failed;
            job.finished_at = Some(Utc::now());
            job.error = Some(error.clone());
        });
        if applied {
            warn!("Job {} failed: {}", id, error);
        }
    }
}

/// Writes checkpoint progress into the store; fans events out to any
/// caller-supplied observer so both see the same stream.
struct JobObserver {
    store: Arc<JobStore>,
    id: JobId,
    inner: Option<Observer>,
}

impl ConversionObserver for JobObserver {
    fn on_checkpoint(&self, checkpoint: Checkpoint) {
        self.store.set_progress(&self.id, checkpoint.progress());
        if let Some(inner) = &self.inner {
            inner.on_checkpoint(checkpoint);
        }
    }

    fn on_extract_warning(&self, page: usize, stage: &str, detail: &str) {
        if let Some(inner) = &self.inner {
            inner.on_extract_warning(page, stage, detail);
        }
    }
}

/// Submit a conversion as a background job.
///
/// Input errors are rejected here, before any job record exists; a
/// malformed request never produces a job. On success the returned id is
/// immediately visible in the store with status `processing`.
pub fn submit(
    store: &Arc<JobStore>,
    source: JobSource,
    config: ConversionConfig,
) -> Result<JobId, Paper2SpeechError> {
    validate_source(&source)?;

    let id = store.create();
    let store = Arc::clone(store);
    let job_id = id.clone();

    tokio::spawn(async move {
        run_job(store, job_id, source, config).await;
    });

    Ok(id)
}

/// Cheap request validation that must precede job creation.
fn validate_source(source: &JobSource) -> Result<(), Paper2SpeechError> {
    match source {
        JobSource::Bytes(bytes) => input::validate_pdf_bytes(bytes),
        JobSource::Path(path) => {
            if !path.exists() {
                return Err(Paper2SpeechError::FileNotFound { path: path.clone() });
            }
            Ok(())
        }
        JobSource::Document(_) => Ok(()),
    }
}

/// Drive one job end to end and write its terminal state.
///
/// Temp input artifacts are owned by the conversion calls and dropped on
/// every exit path before this returns.
async fn run_job(store: Arc<JobStore>, id: JobId, source: JobSource, mut config: ConversionConfig) {
    let observer: Observer = Arc::new(JobObserver {
        store: Arc::clone(&store),
        id: id.clone(),
        inner: config.observer.take(),
    });
    config.observer = Some(observer);

    let outcome = match source {
        JobSource::Bytes(bytes) => convert::convert_from_bytes(&bytes, &config).await,
        JobSource::Path(path) => {
            convert::convert(path.to_string_lossy().as_ref(), &config).await
        }
        JobSource::Document(document) => convert::convert_document(&document, &config).await,
    };

    match outcome {
        Ok(output) => {
            let mut result = JobResult::from(&output);
            if let Some(dir) = &config.audio_output_dir {
                match write_artifact(dir, &id, &output.audio).await {
                    Ok(path) => result.audio_path = Some(path),
                    Err(e) => {
                        store.fail(&id, e.to_string());
                        return;
                    }
                }
            }
            store.complete(&id, result);
        }
        Err(e) => store.fail(&id, e.to_string()),
    }
}

/// Write the audio artifact to `<dir>/<job-id>.audio` atomically
/// (temp name + rename).
async fn write_artifact(
    dir: &std::path::Path,
    id: &JobId,
    audio: &[u8],
) -> Result<PathBuf, Paper2SpeechError> {
    let path = dir.join(format!("{id}.audio"));
    let map_err = |e: std::io::Error| Paper2SpeechError::OutputWriteFailed {
        path: path.clone(),
        source: e,
    };

    tokio::fs::create_dir_all(dir).await.map_err(map_err)?;
    let tmp_path = path.with_extension("audio.tmp");
    tokio::fs::write(&tmp_path, audio).await.map_err(map_err)?;
    tokio::fs::rename(&tmp_path, &path).await.map_err(map_err)?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn created_job_is_processing_at_zero() {
        let store = JobStore::new();
        let id = store.create();
        let job = store.snapshot(&id).unwrap();
        assert_eq!(job.status, JobStatus::Processing);
        assert_eq!(job.progress, 0);
        assert!(job.finished_at.is_none());
        assert!(job.error.is_none());
    }

    #[test]
    fn progress_is_monotonic() {
        let store = JobStore::new();
        let id = store.create();
        store.set_progress(&id, 45);
        store.set_progress(&id, 20);
        assert_eq!(store.snapshot(&id).unwrap().progress, 45);
    }

    #[test]
    fn completed_job_is_frozen() {
        let store = JobStore::new();
        let id = store.create();
        store.complete(
            &id,
            JobResult {
                audio_path: None,
                audio_bytes: 10,
                evaluation: None,
                stats: Default::default(),
            },
        );

        store.set_progress(&id, 7);
        store.fail(&id, "should be ignored".into());

        let job = store.snapshot(&id).unwrap();
        assert_eq!(job.status, JobStatus::Completed);
        assert_eq!(job.progress, 100);
        assert!(job.error.is_none());
        assert!(job.finished_at.is_some());
    }

    #[test]
    fn failed_job_keeps_last_checkpoint_progress() {
        let store = JobStore::new();
        let id = store.create();
        store.set_progress(&id, Checkpoint::SectionsAppended.progress());
        store.fail(&id, "synthesis backend down".into());

        let job = store.snapshot(&id).unwrap();
        assert_eq!(job.status, JobStatus::Failed);
        assert_eq!(job.progress, Checkpoint::SectionsAppended.progress());
        assert_eq!(job.error.as_deref(), Some("synthesis backend down"));
    }

    #[test]
    fn distinct_jobs_do_not_interfere() {
        let store = JobStore::new();
        let a = store.create();
        let b = store.create();
        store.set_progress(&a, 60);
        store.fail(&b, "boom".into());

        assert_eq!(store.snapshot(&a).unwrap().status, JobStatus::Processing);
        assert_eq!(store.snapshot(&a).unwrap().progress, 60);
        assert_eq!(store.snapshot(&b).unwrap().status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn malformed_bytes_never_create_a_job() {
        let store = Arc::new(JobStore::new());
        let err = submit(
            &store,
            JobSource::Bytes(b"not a pdf".to_vec()),
            ConversionConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Paper2SpeechError::NotAPdf { .. }));
        assert!(store.job_ids().is_empty());
    }

    #[test]
    fn concurrent_creation_is_safe() {
        let store = Arc::new(JobStore::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                for _ in 0..50 {
                    store.create();
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.job_ids().len(), 400);
    }
}
