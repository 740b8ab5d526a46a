use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use uuid::Uuid;

use trackrs::domain::models::job_batch::{JobBatch, JobBatchStatus};
use trackrs::domain::models::prompt::Prompt;
use trackrs::domain::models::tracking_result::TrackingResult;
use trackrs::domain::repositories::job_batch_repository::{
    BatchProgress, JobBatchRepository, RepositoryError,
};
use trackrs::domain::repositories::tracking_result_repository::TrackingResultRepository;
use trackrs::domain::services::notifier::{EmailKind, Notifier};

/// 内存实现的批次仓库
///
/// 计数器递增在 Mutex 下串行，模拟存储层的线性化语义
pub struct MockBatchRepo {
    pub batches: Mutex<HashMap<Uuid, JobBatch>>,
}

impl MockBatchRepo {
    pub fn with_batch(batch: JobBatch) -> Self {
        let mut map = HashMap::new();
        map.insert(batch.id, batch);
        Self {
            batches: Mutex::new(map),
        }
    }

    pub fn get(&self, id: Uuid) -> Option<JobBatch> {
        self.batches.lock().unwrap().get(&id).cloned()
    }
}

#[async_trait]
impl JobBatchRepository for MockBatchRepo {
    async fn create(&self, batch: &JobBatch) -> Result<JobBatch, RepositoryError> {
        self.batches
            .lock()
            .unwrap()
            .insert(batch.id, batch.clone());
        Ok(batch.clone())
    }

    async fn create_with_results(
        &self,
        batch: &JobBatch,
        _prompts: &[Prompt],
        _results: &[TrackingResult],
    ) -> Result<(), RepositoryError> {
        self.batches
            .lock()
            .unwrap()
            .insert(batch.id, batch.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<JobBatch>, RepositoryError> {
        Ok(self.batches.lock().unwrap().get(&id).cloned())
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: JobBatchStatus,
    ) -> Result<(), RepositoryError> {
        let mut batches = self.batches.lock().unwrap();
        let batch = batches.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        batch.status = status;
        Ok(())
    }

    async fn set_terminal(
        &self,
        id: Uuid,
        status: JobBatchStatus,
    ) -> Result<(), RepositoryError> {
        let mut batches = self.batches.lock().unwrap();
        let batch = batches.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        batch.status = status;
        batch.completed_at = Some(Utc::now().into());
        Ok(())
    }

    async fn increment_completed(&self, id: Uuid) -> Result<BatchProgress, RepositoryError> {
        let mut batches = self.batches.lock().unwrap();
        let batch = batches.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        batch.completed_batches += 1;
        Ok(BatchProgress {
            completed_batches: batch.completed_batches,
            failed_batches: batch.failed_batches,
        })
    }

    async fn increment_failed(&self, id: Uuid) -> Result<BatchProgress, RepositoryError> {
        let mut batches = self.batches.lock().unwrap();
        let batch = batches.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        batch.failed_batches += 1;
        Ok(BatchProgress {
            completed_batches: batch.completed_batches,
            failed_batches: batch.failed_batches,
        })
    }

    async fn set_error(&self, id: Uuid, message: &str) -> Result<(), RepositoryError> {
        let mut batches = self.batches.lock().unwrap();
        let batch = batches.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        batch.error_message = Some(message.to_string());
        Ok(())
    }
}

/// 内存实现的追踪结果仓库
pub struct MockResultRepo {
    pub rows: Mutex<HashMap<Uuid, TrackingResult>>,
    /// 模拟分片内存在已完成行
    pub fulfilled_in_shard: bool,
    /// 模拟分片内未终态行数
    pub unfinished: u64,
}

impl MockResultRepo {
    pub fn new(fulfilled_in_shard: bool) -> Self {
        Self {
            rows: Mutex::new(HashMap::new()),
            fulfilled_in_shard,
            unfinished: 0,
        }
    }
}

#[async_trait]
impl TrackingResultRepository for MockResultRepo {
    async fn create(&self, result: &TrackingResult) -> Result<TrackingResult, RepositoryError> {
        self.rows.lock().unwrap().insert(result.id, result.clone());
        Ok(result.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<TrackingResult>, RepositoryError> {
        Ok(self.rows.lock().unwrap().get(&id).cloned())
    }

    async fn find_by_task_id(
        &self,
        task_id: &str,
    ) -> Result<Option<TrackingResult>, RepositoryError> {
        Ok(self
            .rows
            .lock()
            .unwrap()
            .values()
            .find(|r| r.external_task_id.as_deref() == Some(task_id))
            .cloned())
    }

    async fn update(&self, result: &TrackingResult) -> Result<(), RepositoryError> {
        self.rows.lock().unwrap().insert(result.id, result.clone());
        Ok(())
    }

    async fn stamp_task_id(&self, id: Uuid, task_id: &str) -> Result<(), RepositoryError> {
        let mut rows = self.rows.lock().unwrap();
        let row = rows.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        row.external_task_id = Some(task_id.to_string());
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, reason: &str) -> Result<bool, RepositoryError> {
        use trackrs::domain::models::tracking_result::ResultStatus;
        let mut rows = self.rows.lock().unwrap();
        let row = rows.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        if row.status == ResultStatus::Fulfilled {
            return Ok(false);
        }
        row.status = ResultStatus::Failed;
        row.response = Some(serde_json::json!({ "error": reason }));
        Ok(true)
    }

    async fn mark_shard_failed(
        &self,
        _job_batch_id: Uuid,
        _batch_number: i32,
        _reason: &str,
    ) -> Result<u64, RepositoryError> {
        Ok(0)
    }

    async fn count_unfinished_in_shard(
        &self,
        _job_batch_id: Uuid,
        _batch_number: i32,
    ) -> Result<u64, RepositoryError> {
        Ok(self.unfinished)
    }

    async fn exists_fulfilled_in_shard(
        &self,
        _job_batch_id: Uuid,
        _batch_number: i32,
    ) -> Result<bool, RepositoryError> {
        Ok(self.fulfilled_in_shard)
    }
}

/// 记录型通知器
pub struct MockNotifier {
    pub sent: Mutex<Vec<(EmailKind, String)>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
        }
    }

    pub fn sent_kinds(&self) -> Vec<EmailKind> {
        self.sent.lock().unwrap().iter().map(|(k, _)| *k).collect()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn send(
        &self,
        kind: EmailKind,
        to: &str,
        _vars: &BTreeMap<String, String>,
    ) -> anyhow::Result<()> {
        self.sent.lock().unwrap().push((kind, to.to_string()));
        Ok(())
    }
}
