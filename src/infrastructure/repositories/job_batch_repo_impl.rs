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

use crate::domain::models::job_batch::{JobBatch, JobBatchStatus};
use crate::domain::models::prompt::Prompt;
use crate::domain::models::tracking_result::TrackingResult;
use crate::domain::repositories::job_batch_repository::{
    BatchProgress, JobBatchRepository, RepositoryError,
};
use crate::infrastructure::database::entities::job_batch as batch_entity;
use crate::infrastructure::repositories::prompt_repo_impl;
use crate::infrastructure::repositories::tracking_result_repo_impl;
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{DbBackend, Statement, TransactionTrait, *};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// 作业批次仓库实现
pub struct JobBatchRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl JobBatchRepositoryImpl {
    /// 创建新的作业批次仓库实例
    ///
    /// # 参数
    ///
    /// * `db` - 数据库连接
    ///
    /// # 返回值
    ///
    /// 返回新的作业批次仓库实例
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    fn to_active_model(batch: &JobBatch) -> batch_entity::ActiveModel {
        batch_entity::ActiveModel {
            id: Set(batch.id),
            user_id: Set(batch.user_id),
            project_id: Set(batch.project_id),
            email: Set(batch.email.clone()),
            total_prompts: Set(batch.total_prompts),
            total_batches: Set(batch.total_batches),
            completed_batches: Set(batch.completed_batches),
            failed_batches: Set(batch.failed_batches),
            status: Set(batch.status.to_string()),
            openai_key: Set(batch.openai_key.clone()),
            openai_model: Set(batch.openai_model.clone()),
            web_search: Set(batch.web_search),
            country: Set(batch.country.clone()),
            brand_mentions: Set(serde_json::to_value(&batch.brand_mentions).unwrap_or_default()),
            domain_mentions: Set(serde_json::to_value(&batch.domain_mentions).unwrap_or_default()),
            tags: Set(serde_json::to_value(&batch.tags).unwrap_or_default()),
            error_message: Set(batch.error_message.clone()),
            created_at: Set(batch.created_at),
            updated_at: Set(batch.updated_at),
            completed_at: Set(batch.completed_at),
        }
    }

    fn from_model(model: batch_entity::Model) -> Result<JobBatch, RepositoryError> {
        let status = JobBatchStatus::from_str(&model.status).map_err(|_| {
            RepositoryError::Database(DbErr::Custom("Invalid job batch status".to_string()))
        })?;

        Ok(JobBatch {
            id: model.id,
            user_id: model.user_id,
            project_id: model.project_id,
            email: model.email,
            total_prompts: model.total_prompts,
            total_batches: model.total_batches,
            completed_batches: model.completed_batches,
            failed_batches: model.failed_batches,
            status,
            openai_key: model.openai_key,
            openai_model: model.openai_model,
            web_search: model.web_search,
            country: model.country,
            brand_mentions: serde_json::from_value(model.brand_mentions).unwrap_or_default(),
            domain_mentions: serde_json::from_value(model.domain_mentions).unwrap_or_default(),
            tags: serde_json::from_value(model.tags).unwrap_or_default(),
            error_message: model.error_message,
            created_at: model.created_at,
            updated_at: model.updated_at,
            completed_at: model.completed_at,
        })
    }

    /// 原子递增并读回递增后的计数
    async fn increment(&self, id: Uuid, column: &str) -> Result<BatchProgress, RepositoryError> {
        let sql = format!(
            "UPDATE job_batches SET {col} = {col} + 1, updated_at = NOW() \
             WHERE id = $1 RETURNING completed_batches, failed_batches",
            col = column
        );
        let statement = Statement::from_sql_and_values(DbBackend::Postgres, sql, [id.into()]);

        let row = self
            .db
            .query_one(statement)
            .await?
            .ok_or(RepositoryError::NotFound)?;

        Ok(BatchProgress {
            completed_batches: row.try_get("", "completed_batches")?,
            failed_batches: row.try_get("", "failed_batches")?,
        })
    }
}

#[async_trait]
impl JobBatchRepository for JobBatchRepositoryImpl {
    async fn create(&self, batch: &JobBatch) -> Result<JobBatch, RepositoryError> {
        Self::to_active_model(batch).insert(self.db.as_ref()).await?;
        Ok(batch.clone())
    }

    async fn create_with_results(
        &self,
        batch: &JobBatch,
        prompts: &[Prompt],
        results: &[TrackingResult],
    ) -> Result<(), RepositoryError> {
        let txn = self.db.begin().await?;

        Self::to_active_model(batch).insert(&txn).await?;

        if !prompts.is_empty() {
            let prompt_models = prompts.iter().map(prompt_repo_impl::to_active_model);
            crate::infrastructure::database::entities::prompt::Entity::insert_many(prompt_models)
                .exec(&txn)
                .await?;
        }

        if !results.is_empty() {
            let result_models = results
                .iter()
                .map(tracking_result_repo_impl::to_active_model);
            crate::infrastructure::database::entities::tracking_result::Entity::insert_many(
                result_models,
            )
            .exec(&txn)
            .await?;
        }

        txn.commit().await?;
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<JobBatch>, RepositoryError> {
        let model = batch_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?;

        match model {
            Some(model) => Ok(Some(Self::from_model(model)?)),
            None => Ok(None),
        }
    }

    async fn update_status(&self, id: Uuid, status: JobBatchStatus) -> Result<(), RepositoryError> {
        let model = batch_entity::ActiveModel {
            id: Set(id),
            status: Set(status.to_string()),
            updated_at: Set(Utc::now().into()),
            ..Default::default()
        };

        model.update(self.db.as_ref()).await?;
        Ok(())
    }

    async fn set_terminal(&self, id: Uuid, status: JobBatchStatus) -> Result<(), RepositoryError> {
        let model = batch_entity::ActiveModel {
            id: Set(id),
            status: Set(status.to_string()),
            completed_at: Set(Some(Utc::now().into())),
            updated_at: Set(Utc::now().into()),
            ..Default::default()
        };

        model.update(self.db.as_ref()).await?;
        Ok(())
    }

    async fn increment_completed(&self, id: Uuid) -> Result<BatchProgress, RepositoryError> {
        self.increment(id, "completed_batches").await
    }

    async fn increment_failed(&self, id: Uuid) -> Result<BatchProgress, RepositoryError> {
        self.increment(id, "failed_batches").await
    }

    async fn set_error(&self, id: Uuid, message: &str) -> Result<(), RepositoryError> {
        let model = batch_entity::ActiveModel {
            id: Set(id),
            error_message: Set(Some(message.to_string())),
            updated_at: Set(Utc::now().into()),
            ..Default::default()
        };

        model.update(self.db.as_ref()).await?;
        Ok(())
    }
}
