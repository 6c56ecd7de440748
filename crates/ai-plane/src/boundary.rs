//! C15 — evaluation boundary: the thin contract layer separating the AI
//! plane from concrete persistence, queue, and HTTP-framework
//! implementations, which remain Non-goals of this crate (concrete HTTP
//! route handlers, multipart parsing, text extraction, the Postgres
//! repositories, and the background job queue transport).

use ai_plane_core::AiPlaneError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadKind {
    Cv,
    ProjectReport,
}

#[derive(Debug, Clone)]
pub struct UploadRecord {
    pub upload_id: Uuid,
    pub kind: UploadKind,
    pub storage_key: String,
    pub original_filename: String,
    pub content_type: String,
}

#[derive(Debug, Clone)]
pub struct EvaluationJob {
    pub job_id: Uuid,
    pub cv_id: Uuid,
    pub project_id: Uuid,
    pub job_description: String,
    pub study_case_brief: String,
    pub status: JobStatus,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct EvaluationResult {
    pub job_id: Uuid,
    pub cv_match_rate: f32,
    pub cv_feedback: String,
    pub project_score: u8,
    pub project_feedback: String,
    pub overall_summary: String,
    pub model_used: String,
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait UploadRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<UploadRecord, AiPlaneError>;
}

#[async_trait]
pub trait JobRepository: Send + Sync {
    async fn set_status(
        &self,
        job_id: Uuid,
        status: JobStatus,
        error: Option<String>,
    ) -> Result<(), AiPlaneError>;
}

#[async_trait]
pub trait ResultRepository: Send + Sync {
    async fn upsert(&self, result: EvaluationResult) -> Result<(), AiPlaneError>;
}

#[async_trait]
pub trait EvaluationQueue: Send + Sync {
    async fn enqueue_evaluate(&self, job: EvaluationJob) -> Result<(), AiPlaneError>;
}

/// In-memory test double exercising all four boundary traits, useful for
/// exercising the AI plane's call chain in tests without a real
/// Postgres/queue dependency.
pub mod test_double {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct InMemoryBoundary {
        uploads: Mutex<std::collections::HashMap<Uuid, UploadRecord>>,
        job_statuses: Mutex<std::collections::HashMap<Uuid, (JobStatus, Option<String>)>>,
        results: Mutex<std::collections::HashMap<Uuid, EvaluationResult>>,
        enqueued: Mutex<Vec<EvaluationJob>>,
    }

    impl InMemoryBoundary {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn insert_upload(&self, record: UploadRecord) {
            self.uploads.lock().expect("upload mutex poisoned").insert(record.upload_id, record);
        }

        pub fn job_status(&self, job_id: Uuid) -> Option<(JobStatus, Option<String>)> {
            self.job_statuses.lock().expect("job status mutex poisoned").get(&job_id).cloned()
        }

        pub fn result_for(&self, job_id: Uuid) -> Option<EvaluationResult> {
            self.results.lock().expect("results mutex poisoned").get(&job_id).cloned()
        }

        pub fn enqueued_jobs(&self) -> Vec<EvaluationJob> {
            self.enqueued.lock().expect("enqueued mutex poisoned").clone()
        }
    }

    #[async_trait]
    impl UploadRepository for InMemoryBoundary {
        async fn get(&self, id: Uuid) -> Result<UploadRecord, AiPlaneError> {
            self.uploads
                .lock()
                .expect("upload mutex poisoned")
                .get(&id)
                .cloned()
                .ok_or_else(|| AiPlaneError::NotFound(format!("upload {id} not found")))
        }
    }

    #[async_trait]
    impl JobRepository for InMemoryBoundary {
        async fn set_status(
            &self,
            job_id: Uuid,
            status: JobStatus,
            error: Option<String>,
        ) -> Result<(), AiPlaneError> {
            self.job_statuses
                .lock()
                .expect("job status mutex poisoned")
                .insert(job_id, (status, error));
            Ok(())
        }
    }

    #[async_trait]
    impl ResultRepository for InMemoryBoundary {
        async fn upsert(&self, result: EvaluationResult) -> Result<(), AiPlaneError> {
            self.results.lock().expect("results mutex poisoned").insert(result.job_id, result);
            Ok(())
        }
    }

    #[async_trait]
    impl EvaluationQueue for InMemoryBoundary {
        async fn enqueue_evaluate(&self, job: EvaluationJob) -> Result<(), AiPlaneError> {
            self.enqueued.lock().expect("enqueued mutex poisoned").push(job);
            Ok(())
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn round_trips_job_status_and_result() {
            let boundary = InMemoryBoundary::new();
            let job_id = Uuid::new_v4();

            boundary.set_status(job_id, JobStatus::Processing, None).await.unwrap();
            assert_eq!(boundary.job_status(job_id), Some((JobStatus::Processing, None)));

            let result = EvaluationResult {
                job_id,
                cv_match_rate: 0.8,
                cv_feedback: "solid".into(),
                project_score: 8,
                project_feedback: "good".into(),
                overall_summary: "strong candidate".into(),
                model_used: "free-model".into(),
                created_at: Utc::now(),
            };
            boundary.upsert(result.clone()).await.unwrap();
            assert_eq!(boundary.result_for(job_id).unwrap().project_score, 8);
        }

        #[tokio::test]
        async fn missing_upload_is_not_found() {
            let boundary = InMemoryBoundary::new();
            let err = boundary.get(Uuid::new_v4()).await.unwrap_err();
            assert_eq!(err.status_code(), 404);
        }

        #[tokio::test]
        async fn enqueue_records_job() {
            let boundary = InMemoryBoundary::new();
            let job = EvaluationJob {
                job_id: Uuid::new_v4(),
                cv_id: Uuid::new_v4(),
                project_id: Uuid::new_v4(),
                job_description: "desc".into(),
                study_case_brief: "brief".into(),
                status: JobStatus::Queued,
                error: None,
            };
            boundary.enqueue_evaluate(job.clone()).await.unwrap();
            assert_eq!(boundary.enqueued_jobs().len(), 1);
        }
    }
}
