use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::types::BackgroundKind;
use crate::metrics::prometheus::JOBS_STORED;
use crate::services::composer::GeneratedVideo;
use crate::services::workspace::Workspace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

/// The error a failed job reports, already mapped to its HTTP shape.
#[derive(Debug, Clone, Serialize)]
pub struct JobFailure {
    #[serde(skip)]
    pub status_code: u16,
    pub error: String,
    pub error_type: String,
}

pub struct JobRecord {
    pub id: String,
    pub status: JobStatus,
    pub background: BackgroundKind,
    pub original_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub video: Option<GeneratedVideo>,
    pub failure: Option<JobFailure>,
    pub workspace: Arc<Workspace>,
}

impl JobRecord {
    pub fn new(
        id: String,
        background: BackgroundKind,
        original_name: Option<String>,
        workspace: Arc<Workspace>,
    ) -> Self {
        Self {
            id,
            status: JobStatus::Queued,
            background,
            original_name,
            created_at: Utc::now(),
            finished_at: None,
            video: None,
            failure: None,
            workspace,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobView {
    pub id: String,
    pub status: JobStatus,
    pub background: BackgroundKind,
    pub original_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_secs: Option<f64>,
    pub size_bytes: Option<u64>,
    pub error: Option<JobFailure>,
}

impl From<&JobRecord> for JobView {
    fn from(record: &JobRecord) -> Self {
        JobView {
            id: record.id.clone(),
            status: record.status,
            background: record.background,
            original_name: record.original_name.clone(),
            created_at: record.created_at,
            finished_at: record.finished_at,
            duration_secs: record.video.as_ref().map(|v| v.duration_secs),
            size_bytes: record.video.as_ref().map(|v| v.size_bytes),
            error: record.failure.clone(),
        }
    }
}

/// Result lookup outcome for `GET /jobs/:id/result`.
pub enum JobResult {
    Ready(GeneratedVideo, Arc<Workspace>),
    Pending(JobStatus),
    Failed(JobFailure),
    NotFound,
}

pub struct JobStore {
    jobs: DashMap<String, JobRecord>,
    ttl: Duration,
    pending_slots: Arc<Semaphore>,
}

impl JobStore {
    pub fn new(ttl: Duration, max_pending: usize) -> Self {
        Self {
            jobs: DashMap::new(),
            ttl,
            pending_slots: Arc::new(Semaphore::new(max_pending.max(1))),
        }
    }

    /// Reserves room for one unfinished job. The permit travels with the job
    /// task and frees the slot when that task ends; `None` means the queue is full.
    pub fn try_admit(&self) -> Option<OwnedSemaphorePermit> {
        self.pending_slots.clone().try_acquire_owned().ok()
    }

    pub fn insert(&self, record: JobRecord) {
        self.jobs.insert(record.id.clone(), record);
        JOBS_STORED.set(self.jobs.len() as i64);
    }

    pub fn view(&self, id: &str) -> Option<JobView> {
        self.jobs.get(id).map(|record| JobView::from(record.value()))
    }

    pub fn mark_running(&self, id: &str) {
        if let Some(mut record) = self.jobs.get_mut(id) {
            record.status = JobStatus::Running;
        }
    }

    pub fn complete(&self, id: &str, video: GeneratedVideo) {
        if let Some(mut record) = self.jobs.get_mut(id) {
            record.status = JobStatus::Completed;
            record.finished_at = Some(Utc::now());
            record.video = Some(video);
        }
    }

    pub fn fail(&self, id: &str, failure: JobFailure) {
        if let Some(mut record) = self.jobs.get_mut(id) {
            record.status = JobStatus::Failed;
            record.finished_at = Some(Utc::now());
            record.failure = Some(failure);
        }
    }

    pub fn result(&self, id: &str) -> JobResult {
        let Some(record) = self.jobs.get(id) else {
            return JobResult::NotFound;
        };
        let result = match (record.status, &record.video, &record.failure) {
            (JobStatus::Completed, Some(video), _) => {
                JobResult::Ready(video.clone(), record.workspace.clone())
            }
            (JobStatus::Failed, _, Some(failure)) => JobResult::Failed(failure.clone()),
            (status, _, _) => JobResult::Pending(status),
        };
        result
    }

    /// Drops the job. Its files go once no download still holds the workspace.
    pub fn remove(&self, id: &str) -> bool {
        let removed = self.jobs.remove(id).is_some();
        JOBS_STORED.set(self.jobs.len() as i64);
        removed
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Removes finished jobs whose results have outlived the TTL.
    pub fn sweep_expired(&self, now: DateTime<Utc>) -> usize {
        let ttl =
            chrono::Duration::from_std(self.ttl).unwrap_or_else(|_| chrono::Duration::days(36_500));
        let before = self.jobs.len();
        self.jobs.retain(|_, record| match record.finished_at {
            Some(finished) if record.status.is_finished() => now - finished < ttl,
            _ => true,
        });
        let removed = before.saturating_sub(self.jobs.len());
        JOBS_STORED.set(self.jobs.len() as i64);
        removed
    }

    pub fn spawn_sweeper(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let removed = self.sweep_expired(Utc::now());
                if removed > 0 {
                    info!("Expired {} finished job(s)", removed);
                } else {
                    debug!("Job sweep: nothing expired, {} stored", self.len());
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn record(root: &std::path::Path, id: &str) -> JobRecord {
        let workspace = Arc::new(Workspace::create(root).unwrap());
        JobRecord::new(
            id.to_string(),
            BackgroundKind::Color,
            Some("song.mp3".to_string()),
            workspace,
        )
    }

    fn video() -> GeneratedVideo {
        GeneratedVideo {
            path: PathBuf::from("/tmp/output.mp4"),
            duration_secs: 2.0,
            size_bytes: 10,
        }
    }

    #[test]
    fn test_job_lifecycle() {
        let root = tempfile::tempdir().unwrap();
        let store = JobStore::new(Duration::from_secs(60), 4);
        store.insert(record(root.path(), "job1"));

        assert_eq!(store.view("job1").unwrap().status, JobStatus::Queued);
        assert!(matches!(
            store.result("job1"),
            JobResult::Pending(JobStatus::Queued)
        ));

        store.mark_running("job1");
        assert_eq!(store.view("job1").unwrap().status, JobStatus::Running);

        store.complete("job1", video());
        let view = store.view("job1").unwrap();
        assert_eq!(view.status, JobStatus::Completed);
        assert_eq!(view.duration_secs, Some(2.0));
        assert!(view.finished_at.is_some());
        assert!(matches!(store.result("job1"), JobResult::Ready(_, _)));
    }

    #[test]
    fn test_failed_job_reports_failure() {
        let root = tempfile::tempdir().unwrap();
        let store = JobStore::new(Duration::from_secs(60), 4);
        store.insert(record(root.path(), "job2"));
        store.fail(
            "job2",
            JobFailure {
                status_code: 415,
                error: "no audio stream found".to_string(),
                error_type: "unsupported_format".to_string(),
            },
        );

        match store.result("job2") {
            JobResult::Failed(failure) => assert_eq!(failure.status_code, 415),
            _ => panic!("expected failed job"),
        }
        let json = serde_json::to_value(store.view("job2").unwrap()).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["error"]["error_type"], "unsupported_format");
        assert!(json["error"].get("status_code").is_none());
    }

    #[test]
    fn test_unknown_job() {
        let store = JobStore::new(Duration::from_secs(60), 4);
        assert!(store.view("nope").is_none());
        assert!(matches!(store.result("nope"), JobResult::NotFound));
        assert!(!store.remove("nope"));
    }

    #[test]
    fn test_sweep_only_expired_finished_jobs() {
        let root = tempfile::tempdir().unwrap();
        let store = JobStore::new(Duration::from_secs(60), 4);
        store.insert(record(root.path(), "old"));
        store.insert(record(root.path(), "fresh"));
        store.insert(record(root.path(), "running"));
        store.complete("old", video());
        store.complete("fresh", video());
        store.mark_running("running");

        let workspace_path = store
            .jobs
            .get("old")
            .map(|r| r.workspace.path().to_path_buf())
            .unwrap();
        store.jobs.get_mut("old").unwrap().finished_at =
            Some(Utc::now() - chrono::Duration::seconds(120));

        let removed = store.sweep_expired(Utc::now());
        assert_eq!(removed, 1);
        assert!(store.view("old").is_none());
        assert!(store.view("fresh").is_some());
        assert!(store.view("running").is_some());
        assert!(!workspace_path.exists());
    }

    #[test]
    fn test_admission_is_bounded() {
        let store = JobStore::new(Duration::from_secs(60), 2);
        let first = store.try_admit().unwrap();
        let _second = store.try_admit().unwrap();
        assert!(store.try_admit().is_none());

        drop(first);
        assert!(store.try_admit().is_some());
    }
}
