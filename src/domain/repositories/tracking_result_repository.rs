// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::tracking_result::TrackingResult;
use crate::domain::repositories::job_batch_repository::RepositoryError;
use async_trait::async_trait;
use uuid::Uuid;

/// 追踪结果仓库特质
///
/// 终态写入是幂等的：失败写入以当前状态为门禁，不会降级已完成的行
#[async_trait]
pub trait TrackingResultRepository: Send + Sync {
    /// 创建单行结果
    async fn create(&self, result: &TrackingResult) -> Result<TrackingResult, RepositoryError>;
    /// 根据ID查找
    async fn find_by_id(&self, id: Uuid) -> Result<Option<TrackingResult>, RepositoryError>;
    /// 根据供应商任务ID查找
    async fn find_by_task_id(
        &self,
        task_id: &str,
    ) -> Result<Option<TrackingResult>, RepositoryError>;
    /// 全量更新一行（富化完成后的终态写入）
    async fn update(&self, result: &TrackingResult) -> Result<(), RepositoryError>;
    /// 盖上供应商任务ID并置为处理中
    async fn stamp_task_id(&self, id: Uuid, task_id: &str) -> Result<(), RepositoryError>;
    /// 将一行标记为失败并记录原因
    ///
    /// 已经 fulfilled 的行不受影响；返回是否真的发生了写入
    async fn mark_failed(&self, id: Uuid, reason: &str) -> Result<bool, RepositoryError>;
    /// 将整个分片的未终态行标记为失败
    async fn mark_shard_failed(
        &self,
        job_batch_id: Uuid,
        batch_number: i32,
        reason: &str,
    ) -> Result<u64, RepositoryError>;
    /// 统计分片内尚未到达终态的行数
    async fn count_unfinished_in_shard(
        &self,
        job_batch_id: Uuid,
        batch_number: i32,
    ) -> Result<u64, RepositoryError>;
    /// 分片内是否存在已完成的行（成功邮件去重用）
    async fn exists_fulfilled_in_shard(
        &self,
        job_batch_id: Uuid,
        batch_number: i32,
    ) -> Result<bool, RepositoryError>;
}
