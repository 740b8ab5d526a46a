// Copyright 2025 Kirky.X
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::domain::models::queue_message::{MessageStatus, QueueMessage};
use crate::domain::repositories::job_batch_repository::RepositoryError;
use crate::domain::repositories::queue_repository::QueueRepository;
use crate::infrastructure::database::entities::queue_message as queue_entity;
use async_trait::async_trait;
use chrono::{Duration, Utc};
use sea_orm::{sea_query::Expr, DbBackend, FromQueryResult, Statement, *};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// 队列仓库实现
///
/// SKIP LOCKED 拉取保证同一条消息同一时刻只被一个工作器持有
pub struct QueueRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl QueueRepositoryImpl {
    /// 创建新的队列仓库实例
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    fn from_model(model: queue_entity::Model) -> Result<QueueMessage, RepositoryError> {
        let status = MessageStatus::from_str(&model.status).map_err(|_| {
            RepositoryError::Database(DbErr::Custom("Invalid queue message status".to_string()))
        })?;

        Ok(QueueMessage {
            id: model.id,
            topic: model.topic,
            payload: model.payload,
            status,
            attempt_count: model.attempt_count,
            max_retries: model.max_retries,
            scheduled_at: model.scheduled_at,
            lock_token: model.lock_token,
            lock_expires_at: model.lock_expires_at,
            created_at: model.created_at,
            updated_at: model.updated_at,
        })
    }
}

#[async_trait]
impl QueueRepository for QueueRepositoryImpl {
    async fn create(&self, message: &QueueMessage) -> Result<QueueMessage, RepositoryError> {
        let model = queue_entity::ActiveModel {
            id: Set(message.id),
            topic: Set(message.topic.clone()),
            payload: Set(message.payload.clone()),
            status: Set(message.status.to_string()),
            attempt_count: Set(message.attempt_count),
            max_retries: Set(message.max_retries),
            scheduled_at: Set(message.scheduled_at),
            lock_token: Set(message.lock_token),
            lock_expires_at: Set(message.lock_expires_at),
            created_at: Set(message.created_at),
            updated_at: Set(message.updated_at),
        };

        model.insert(self.db.as_ref()).await?;
        Ok(message.clone())
    }

    async fn acquire_next(
        &self,
        topic: &str,
        lock_token: Uuid,
        lock_duration: Duration,
    ) -> Result<Option<QueueMessage>, RepositoryError> {
        let lock_expires_at = Utc::now() + lock_duration;
        let statement = Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"UPDATE queue_messages
               SET status = 'active',
                   lock_token = $2,
                   lock_expires_at = $3,
                   attempt_count = attempt_count + 1,
                   updated_at = NOW()
               WHERE id = (
                   SELECT id FROM queue_messages
                   WHERE topic = $1
                     AND status IN ('queued', 'failed')
                     AND (scheduled_at IS NULL OR scheduled_at <= NOW())
                   ORDER BY created_at
                   FOR UPDATE SKIP LOCKED
                   LIMIT 1
               )
               RETURNING *"#,
            [
                topic.into(),
                lock_token.into(),
                lock_expires_at.into(),
            ],
        );

        match self.db.query_one(statement).await? {
            Some(row) => {
                let model = queue_entity::Model::from_query_result(&row, "")?;
                Ok(Some(Self::from_model(model)?))
            }
            None => Ok(None),
        }
    }

    async fn mark_completed(&self, id: Uuid) -> Result<(), RepositoryError> {
        let model = queue_entity::ActiveModel {
            id: Set(id),
            status: Set(MessageStatus::Completed.to_string()),
            lock_token: Set(None),
            lock_expires_at: Set(None),
            updated_at: Set(Utc::now().into()),
            ..Default::default()
        };

        model.update(self.db.as_ref()).await?;
        Ok(())
    }

    async fn reschedule_retry(
        &self,
        id: Uuid,
        delay: Duration,
        attempt_count: i32,
    ) -> Result<(), RepositoryError> {
        let model = queue_entity::ActiveModel {
            id: Set(id),
            status: Set(MessageStatus::Queued.to_string()),
            attempt_count: Set(attempt_count),
            scheduled_at: Set(Some((Utc::now() + delay).into())),
            lock_token: Set(None),
            lock_expires_at: Set(None),
            updated_at: Set(Utc::now().into()),
            ..Default::default()
        };

        model.update(self.db.as_ref()).await?;
        Ok(())
    }

    async fn mark_dead(&self, id: Uuid) -> Result<(), RepositoryError> {
        let model = queue_entity::ActiveModel {
            id: Set(id),
            status: Set(MessageStatus::Dead.to_string()),
            lock_token: Set(None),
            lock_expires_at: Set(None),
            updated_at: Set(Utc::now().into()),
            ..Default::default()
        };

        model.update(self.db.as_ref()).await?;
        Ok(())
    }

    async fn reclaim_expired(&self) -> Result<u64, RepositoryError> {
        let updated = queue_entity::Entity::update_many()
            .col_expr(
                queue_entity::Column::Status,
                Expr::value(MessageStatus::Queued.to_string()),
            )
            .col_expr(queue_entity::Column::LockToken, Expr::value(Option::<Uuid>::None))
            .col_expr(
                queue_entity::Column::LockExpiresAt,
                Expr::value(Option::<chrono::DateTime<chrono::FixedOffset>>::None),
            )
            .filter(queue_entity::Column::Status.eq(MessageStatus::Active.to_string()))
            .filter(queue_entity::Column::LockExpiresAt.lt(Utc::now()))
            .exec(self.db.as_ref())
            .await?;

        Ok(updated.rows_affected)
    }
}
