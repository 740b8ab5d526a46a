// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::repositories::job_batch_repository::RepositoryError;
use crate::domain::repositories::user_settings_repository::UserSettingsRepository;
use crate::infrastructure::database::entities::user_settings as settings_entity;
use async_trait::async_trait;
use sea_orm::*;
use std::sync::Arc;
use uuid::Uuid;

/// 用户设置仓库实现
pub struct UserSettingsRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl UserSettingsRepositoryImpl {
    /// 创建新的用户设置仓库实例
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserSettingsRepository for UserSettingsRepositoryImpl {
    async fn find_openai_key(&self, user_id: Uuid) -> Result<Option<String>, RepositoryError> {
        let model = settings_entity::Entity::find_by_id(user_id)
            .one(self.db.as_ref())
            .await?;

        Ok(model.and_then(|m| m.openai_key))
    }
}
