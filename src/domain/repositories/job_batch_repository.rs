// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::job_batch::{JobBatch, JobBatchStatus};
use crate::domain::models::prompt::Prompt;
use crate::domain::models::tracking_result::TrackingResult;
use async_trait::async_trait;
use sea_orm::DbErr;
use thiserror::Error;
use uuid::Uuid;

/// 仓库错误类型
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// 数据库错误
    #[error("Database error: {0}")]
    Database(#[from] DbErr),
    /// 记录未找到
    #[error("Record not found")]
    NotFound,
}

/// 计数器递增后的批次进度快照
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchProgress {
    /// 已成功分片数
    pub completed_batches: i32,
    /// 已失败分片数
    pub failed_batches: i32,
}

/// 作业批次仓库特质
///
/// 定义批次数据访问接口；计数器递增在存储层是线性化的
#[async_trait]
pub trait JobBatchRepository: Send + Sync {
    /// 创建新批次
    async fn create(&self, batch: &JobBatch) -> Result<JobBatch, RepositoryError>;
    /// 在单个事务中创建批次、Prompt与待处理结果行
    ///
    /// 任一插入失败则整体回滚，不留下孤儿批次
    async fn create_with_results(
        &self,
        batch: &JobBatch,
        prompts: &[Prompt],
        results: &[TrackingResult],
    ) -> Result<(), RepositoryError>;
    /// 根据ID查找批次
    async fn find_by_id(&self, id: Uuid) -> Result<Option<JobBatch>, RepositoryError>;
    /// 更新批次状态
    async fn update_status(&self, id: Uuid, status: JobBatchStatus) -> Result<(), RepositoryError>;
    /// 写入终态并盖上完成时间
    async fn set_terminal(&self, id: Uuid, status: JobBatchStatus) -> Result<(), RepositoryError>;
    /// 原子递增成功分片计数，返回递增后的进度
    async fn increment_completed(&self, id: Uuid) -> Result<BatchProgress, RepositoryError>;
    /// 原子递增失败分片计数，返回递增后的进度
    async fn increment_failed(&self, id: Uuid) -> Result<BatchProgress, RepositoryError>;
    /// 记录批次级错误信息
    async fn set_error(&self, id: Uuid, message: &str) -> Result<(), RepositoryError>;
}
