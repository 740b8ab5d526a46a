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

use crate::domain::models::tracking_result::{ResultStatus, TrackingResult};
use crate::domain::repositories::job_batch_repository::RepositoryError;
use crate::domain::repositories::tracking_result_repository::TrackingResultRepository;
use crate::infrastructure::database::entities::tracking_result as result_entity;
use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{sea_query::Expr, *};
use serde_json::json;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// 追踪结果仓库实现
pub struct TrackingResultRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl TrackingResultRepositoryImpl {
    /// 创建新的追踪结果仓库实例
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

/// 领域模型转ActiveModel（批量插入时由批次仓库复用）
pub fn to_active_model(result: &TrackingResult) -> result_entity::ActiveModel {
    result_entity::ActiveModel {
        id: Set(result.id),
        prompt_id: Set(result.prompt_id),
        prompt_text: Set(result.prompt_text.clone()),
        project_id: Set(result.project_id),
        user_id: Set(result.user_id),
        job_batch_id: Set(result.job_batch_id),
        batch_number: Set(result.batch_number),
        external_task_id: Set(result.external_task_id.clone()),
        status: Set(result.status.to_string()),
        is_present: Set(result.is_present),
        is_domain_present: Set(result.is_domain_present),
        sentiment: Set(result.sentiment),
        salience: Set(result.salience),
        response: Set(result.response.clone()),
        citations: Set(result
            .citations
            .as_ref()
            .map(|c| serde_json::to_value(c).unwrap_or_default())),
        mention_count: Set(result.mention_count),
        domain_mention_count: Set(result.domain_mention_count),
        web_search: Set(result.web_search),
        lcp: Set(result.lcp),
        actionability: Set(result.actionability),
        intent_classification: Set(result.intent_classification.map(|i| i.to_string())),
        serp_features: Set(result
            .serp_features
            .as_ref()
            .map(|f| serde_json::to_value(f).unwrap_or_default())),
        ai_search_volume: Set(result.ai_search_volume),
        ai_monthly_trends: Set(result
            .ai_monthly_trends
            .as_ref()
            .map(|t| serde_json::to_value(t).unwrap_or_default())),
        ai_volume_fetched_at: Set(result.ai_volume_fetched_at),
        ai_volume_location_code: Set(result.ai_volume_location_code),
        timestamp_ms: Set(result.timestamp_ms),
        source: Set(result.source.map(|s| s.to_string())),
        created_at: Set(result.created_at),
    }
}

fn from_model(model: result_entity::Model) -> Result<TrackingResult, RepositoryError> {
    let status = ResultStatus::from_str(&model.status).map_err(|_| {
        RepositoryError::Database(DbErr::Custom("Invalid tracking result status".to_string()))
    })?;

    Ok(TrackingResult {
        id: model.id,
        prompt_id: model.prompt_id,
        prompt_text: model.prompt_text,
        project_id: model.project_id,
        user_id: model.user_id,
        job_batch_id: model.job_batch_id,
        batch_number: model.batch_number,
        external_task_id: model.external_task_id,
        status,
        is_present: model.is_present,
        is_domain_present: model.is_domain_present,
        sentiment: model.sentiment,
        salience: model.salience,
        response: model.response,
        citations: model
            .citations
            .and_then(|c| serde_json::from_value(c).ok()),
        mention_count: model.mention_count,
        domain_mention_count: model.domain_mention_count,
        web_search: model.web_search,
        lcp: model.lcp,
        actionability: model.actionability,
        intent_classification: model
            .intent_classification
            .and_then(|i| i.parse().ok()),
        serp_features: model
            .serp_features
            .and_then(|f| serde_json::from_value(f).ok()),
        ai_search_volume: model.ai_search_volume,
        ai_monthly_trends: model
            .ai_monthly_trends
            .and_then(|t| serde_json::from_value(t).ok()),
        ai_volume_fetched_at: model.ai_volume_fetched_at,
        ai_volume_location_code: model.ai_volume_location_code,
        timestamp_ms: model.timestamp_ms,
        source: model.source.and_then(|s| s.parse().ok()),
        created_at: model.created_at,
    })
}

#[async_trait]
impl TrackingResultRepository for TrackingResultRepositoryImpl {
    async fn create(&self, result: &TrackingResult) -> Result<TrackingResult, RepositoryError> {
        to_active_model(result).insert(self.db.as_ref()).await?;
        Ok(result.clone())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<TrackingResult>, RepositoryError> {
        let model = result_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?;

        match model {
            Some(model) => Ok(Some(from_model(model)?)),
            None => Ok(None),
        }
    }

    async fn find_by_task_id(
        &self,
        task_id: &str,
    ) -> Result<Option<TrackingResult>, RepositoryError> {
        let model = result_entity::Entity::find()
            .filter(result_entity::Column::ExternalTaskId.eq(task_id))
            .one(self.db.as_ref())
            .await?;

        match model {
            Some(model) => Ok(Some(from_model(model)?)),
            None => Ok(None),
        }
    }

    async fn update(&self, result: &TrackingResult) -> Result<(), RepositoryError> {
        let model = to_active_model(result);
        model.update(self.db.as_ref()).await?;
        Ok(())
    }

    async fn stamp_task_id(&self, id: Uuid, task_id: &str) -> Result<(), RepositoryError> {
        let model = result_entity::ActiveModel {
            id: Set(id),
            external_task_id: Set(Some(task_id.to_string())),
            status: Set(ResultStatus::Processing.to_string()),
            timestamp_ms: Set(Utc::now().timestamp_millis()),
            ..Default::default()
        };

        model.update(self.db.as_ref()).await?;
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, reason: &str) -> Result<bool, RepositoryError> {
        // 迟到的失败回调不得降级已完成的行
        let updated = result_entity::Entity::update_many()
            .col_expr(
                result_entity::Column::Status,
                Expr::value(ResultStatus::Failed.to_string()),
            )
            .col_expr(
                result_entity::Column::Response,
                Expr::value(json!({ "error": reason })),
            )
            .col_expr(
                result_entity::Column::TimestampMs,
                Expr::value(Utc::now().timestamp_millis()),
            )
            .filter(result_entity::Column::Id.eq(id))
            .filter(result_entity::Column::Status.ne(ResultStatus::Fulfilled.to_string()))
            .exec(self.db.as_ref())
            .await?;

        Ok(updated.rows_affected > 0)
    }

    async fn mark_shard_failed(
        &self,
        job_batch_id: Uuid,
        batch_number: i32,
        reason: &str,
    ) -> Result<u64, RepositoryError> {
        let updated = result_entity::Entity::update_many()
            .col_expr(
                result_entity::Column::Status,
                Expr::value(ResultStatus::Failed.to_string()),
            )
            .col_expr(
                result_entity::Column::Response,
                Expr::value(json!({ "error": reason })),
            )
            .col_expr(
                result_entity::Column::TimestampMs,
                Expr::value(Utc::now().timestamp_millis()),
            )
            .filter(result_entity::Column::JobBatchId.eq(job_batch_id))
            .filter(result_entity::Column::BatchNumber.eq(batch_number))
            .filter(
                result_entity::Column::Status
                    .is_in([ResultStatus::Pending.to_string(), ResultStatus::Processing.to_string()]),
            )
            .exec(self.db.as_ref())
            .await?;

        Ok(updated.rows_affected)
    }

    async fn count_unfinished_in_shard(
        &self,
        job_batch_id: Uuid,
        batch_number: i32,
    ) -> Result<u64, RepositoryError> {
        let count = result_entity::Entity::find()
            .filter(result_entity::Column::JobBatchId.eq(job_batch_id))
            .filter(result_entity::Column::BatchNumber.eq(batch_number))
            .filter(
                result_entity::Column::Status
                    .is_in([ResultStatus::Pending.to_string(), ResultStatus::Processing.to_string()]),
            )
            .count(self.db.as_ref())
            .await?;

        Ok(count)
    }

    async fn exists_fulfilled_in_shard(
        &self,
        job_batch_id: Uuid,
        batch_number: i32,
    ) -> Result<bool, RepositoryError> {
        let count = result_entity::Entity::find()
            .filter(result_entity::Column::JobBatchId.eq(job_batch_id))
            .filter(result_entity::Column::BatchNumber.eq(batch_number))
            .filter(result_entity::Column::Status.eq(ResultStatus::Fulfilled.to_string()))
            .count(self.db.as_ref())
            .await?;

        Ok(count > 0)
    }
}
