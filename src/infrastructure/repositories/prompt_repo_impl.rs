// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::prompt::Prompt;
use crate::domain::repositories::job_batch_repository::RepositoryError;
use crate::domain::repositories::prompt_repository::PromptRepository;
use crate::infrastructure::database::entities::prompt as prompt_entity;
use async_trait::async_trait;
use sea_orm::*;
use std::sync::Arc;
use uuid::Uuid;

/// Prompt仓库实现
pub struct PromptRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl PromptRepositoryImpl {
    /// 创建新的Prompt仓库实例
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

/// 领域模型转ActiveModel（批量插入时由批次仓库复用）
pub fn to_active_model(prompt: &Prompt) -> prompt_entity::ActiveModel {
    prompt_entity::ActiveModel {
        id: Set(prompt.id),
        project_id: Set(prompt.project_id),
        user_id: Set(prompt.user_id),
        text: Set(prompt.text.clone()),
        enabled: Set(prompt.enabled),
        brand_mentions: Set(serde_json::to_value(&prompt.brand_mentions).unwrap_or_default()),
        domain_mentions: Set(serde_json::to_value(&prompt.domain_mentions).unwrap_or_default()),
        country: Set(prompt.country.clone()),
        created_at: Set(prompt.created_at),
        updated_at: Set(prompt.updated_at),
    }
}

fn from_model(model: prompt_entity::Model) -> Prompt {
    Prompt {
        id: model.id,
        project_id: model.project_id,
        user_id: model.user_id,
        text: model.text,
        enabled: model.enabled,
        brand_mentions: serde_json::from_value(model.brand_mentions).unwrap_or_default(),
        domain_mentions: serde_json::from_value(model.domain_mentions).unwrap_or_default(),
        country: model.country,
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

#[async_trait]
impl PromptRepository for PromptRepositoryImpl {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Prompt>, RepositoryError> {
        let model = prompt_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?;
        Ok(model.map(from_model))
    }

    async fn find_enabled_by_project(
        &self,
        project_id: Uuid,
    ) -> Result<Vec<Prompt>, RepositoryError> {
        let models = prompt_entity::Entity::find()
            .filter(prompt_entity::Column::ProjectId.eq(project_id))
            .filter(prompt_entity::Column::Enabled.eq(true))
            .all(self.db.as_ref())
            .await?;

        Ok(models.into_iter().map(from_model).collect())
    }
}
