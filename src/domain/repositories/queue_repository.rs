// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::queue_message::QueueMessage;
use crate::domain::repositories::job_batch_repository::RepositoryError;
use async_trait::async_trait;
use chrono::Duration;
use uuid::Uuid;

/// 队列仓库特质
///
/// 行级锁定令牌提供 at-least-once 投递语义
#[async_trait]
pub trait QueueRepository: Send + Sync {
    /// 创建新消息
    async fn create(&self, message: &QueueMessage) -> Result<QueueMessage, RepositoryError>;
    /// 获取指定主题的下一条待投递消息并加锁
    async fn acquire_next(
        &self,
        topic: &str,
        lock_token: Uuid,
        lock_duration: Duration,
    ) -> Result<Option<QueueMessage>, RepositoryError>;
    /// 确认消息处理完毕
    async fn mark_completed(&self, id: Uuid) -> Result<(), RepositoryError>;
    /// 重新调度消息投递
    async fn reschedule_retry(
        &self,
        id: Uuid,
        delay: Duration,
        attempt_count: i32,
    ) -> Result<(), RepositoryError>;
    /// 投递次数耗尽，移入死信状态
    async fn mark_dead(&self, id: Uuid) -> Result<(), RepositoryError>;
    /// 回收锁已过期的投递中消息
    async fn reclaim_expired(&self) -> Result<u64, RepositoryError>;
}
