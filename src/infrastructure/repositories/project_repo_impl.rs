// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::project::Project;
use crate::domain::repositories::job_batch_repository::RepositoryError;
use crate::domain::repositories::project_repository::ProjectRepository;
use crate::infrastructure::database::entities::project as project_entity;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::*;
use std::sync::Arc;
use uuid::Uuid;

/// 项目仓库实现
pub struct ProjectRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl ProjectRepositoryImpl {
    /// 创建新的项目仓库实例
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    fn from_model(model: project_entity::Model) -> Project {
        Project {
            id: model.id,
            user_id: model.user_id,
            name: model.name,
            scheduler_frequency: model
                .scheduler_frequency
                .and_then(|f| f.parse().ok()),
            last_nightly_run_at: model.last_nightly_run_at,
        }
    }
}

#[async_trait]
impl ProjectRepository for ProjectRepositoryImpl {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Project>, RepositoryError> {
        let model = project_entity::Entity::find_by_id(id)
            .one(self.db.as_ref())
            .await?;
        Ok(model.map(Self::from_model))
    }

    async fn find_scheduled(&self) -> Result<Vec<Project>, RepositoryError> {
        let models = project_entity::Entity::find()
            .filter(project_entity::Column::SchedulerFrequency.is_not_null())
            .all(self.db.as_ref())
            .await?;

        Ok(models.into_iter().map(Self::from_model).collect())
    }

    async fn stamp_nightly_run(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let model = project_entity::ActiveModel {
            id: Set(id),
            last_nightly_run_at: Set(Some(at.into())),
            ..Default::default()
        };

        model.update(self.db.as_ref()).await?;
        Ok(())
    }
}
