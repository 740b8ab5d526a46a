// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::queue_message::QueueMessage;
use crate::domain::repositories::job_batch_repository::RepositoryError;
use crate::domain::repositories::queue_repository::QueueRepository;
use async_trait::async_trait;
use chrono::Duration;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

/// 队列错误类型
#[derive(Error, Debug)]
pub enum QueueError {
    /// 仓库错误
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// 任务队列特质
///
/// 每个供应商一个主题；nack 的消息按指数退避重新投递，
/// 投递次数耗尽后进入死信状态
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// 向主题发布一条消息
    async fn publish(
        &self,
        topic: &str,
        payload: serde_json::Value,
    ) -> Result<QueueMessage, QueueError>;

    /// 拉取主题的下一条消息
    async fn dequeue(
        &self,
        topic: &str,
        lock_token: Uuid,
    ) -> Result<Option<QueueMessage>, QueueError>;

    /// 确认消息（正向确认，不再投递）
    async fn complete(&self, message_id: Uuid) -> Result<(), QueueError>;

    /// 否定确认（重投或移入死信）
    async fn fail(&self, message: &QueueMessage) -> Result<(), QueueError>;
}

/// PostgreSQL任务队列实现
pub struct PostgresTaskQueue<R: QueueRepository> {
    /// 队列仓库
    repository: Arc<R>,
    /// 消息锁定时长
    lock_duration: Duration,
    /// 最大投递次数
    max_retries: i32,
}

impl<R: QueueRepository> PostgresTaskQueue<R> {
    /// 创建新的PostgreSQL任务队列实例
    ///
    /// # 参数
    ///
    /// * `repository` - 队列仓库
    /// * `lock_duration_seconds` - 消息锁定时长（秒）
    /// * `max_retries` - 最大投递次数
    pub fn new(repository: Arc<R>, lock_duration_seconds: i64, max_retries: i32) -> Self {
        Self {
            repository,
            lock_duration: Duration::seconds(lock_duration_seconds),
            max_retries,
        }
    }
}

#[async_trait]
impl<R: QueueRepository> TaskQueue for PostgresTaskQueue<R> {
    async fn publish(
        &self,
        topic: &str,
        payload: serde_json::Value,
    ) -> Result<QueueMessage, QueueError> {
        let message = QueueMessage::new(topic.to_string(), payload, self.max_retries);
        let created = self.repository.create(&message).await?;
        Ok(created)
    }

    async fn dequeue(
        &self,
        topic: &str,
        lock_token: Uuid,
    ) -> Result<Option<QueueMessage>, QueueError> {
        let message = self
            .repository
            .acquire_next(topic, lock_token, self.lock_duration)
            .await?;
        Ok(message)
    }

    async fn complete(&self, message_id: Uuid) -> Result<(), QueueError> {
        self.repository.mark_completed(message_id).await?;
        Ok(())
    }

    async fn fail(&self, message: &QueueMessage) -> Result<(), QueueError> {
        if message.can_retry() {
            // attempt_count 在拉取时已递增，这里只计算退避
            let delay_secs = 2i64.saturating_pow(message.attempt_count.max(1) as u32);
            self.repository
                .reschedule_retry(
                    message.id,
                    Duration::seconds(delay_secs.min(300)),
                    message.attempt_count,
                )
                .await?;
        } else {
            warn!(
                "Queue message {} exhausted {} deliveries, moving to dead state",
                message.id, message.max_retries
            );
            self.repository.mark_dead(message.id).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl<T: TaskQueue + ?Sized> TaskQueue for Arc<T> {
    async fn publish(
        &self,
        topic: &str,
        payload: serde_json::Value,
    ) -> Result<QueueMessage, QueueError> {
        (**self).publish(topic, payload).await
    }

    async fn dequeue(
        &self,
        topic: &str,
        lock_token: Uuid,
    ) -> Result<Option<QueueMessage>, QueueError> {
        (**self).dequeue(topic, lock_token).await
    }

    async fn complete(&self, message_id: Uuid) -> Result<(), QueueError> {
        (**self).complete(message_id).await
    }

    async fn fail(&self, message: &QueueMessage) -> Result<(), QueueError> {
        (**self).fail(message).await
    }
}
