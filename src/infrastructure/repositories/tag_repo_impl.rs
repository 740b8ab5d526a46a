// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::tag::Tag;
use crate::domain::repositories::job_batch_repository::RepositoryError;
use crate::domain::repositories::tag_repository::TagRepository;
use crate::infrastructure::database::entities::prompt_tag as prompt_tag_entity;
use crate::infrastructure::database::entities::tag as tag_entity;
use async_trait::async_trait;
use sea_orm::sea_query::{Expr, Func};
use sea_orm::*;
use std::sync::Arc;
use uuid::Uuid;

/// 标签仓库实现
pub struct TagRepositoryImpl {
    /// 数据库连接
    db: Arc<DatabaseConnection>,
}

impl TagRepositoryImpl {
    /// 创建新的标签仓库实例
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    fn from_model(model: tag_entity::Model) -> Tag {
        Tag {
            id: model.id,
            project_id: model.project_id,
            name: model.name,
            color: model.color,
            created_at: model.created_at,
        }
    }
}

#[async_trait]
impl TagRepository for TagRepositoryImpl {
    async fn find_by_name_ci(
        &self,
        project_id: Uuid,
        name: &str,
    ) -> Result<Option<Tag>, RepositoryError> {
        let model = tag_entity::Entity::find()
            .filter(tag_entity::Column::ProjectId.eq(project_id))
            .filter(
                Expr::expr(Func::lower(Expr::col(tag_entity::Column::Name)))
                    .eq(name.to_lowercase()),
            )
            .one(self.db.as_ref())
            .await?;

        Ok(model.map(Self::from_model))
    }

    async fn create(&self, tag: &Tag) -> Result<Tag, RepositoryError> {
        let model = tag_entity::ActiveModel {
            id: Set(tag.id),
            project_id: Set(tag.project_id),
            name: Set(tag.name.clone()),
            color: Set(tag.color.clone()),
            created_at: Set(tag.created_at),
        };

        model.insert(self.db.as_ref()).await?;
        Ok(tag.clone())
    }

    async fn link_prompt(&self, tag_id: Uuid, prompt_id: Uuid) -> Result<(), RepositoryError> {
        let model = prompt_tag_entity::ActiveModel {
            prompt_id: Set(prompt_id),
            tag_id: Set(tag_id),
        };

        // 重复关联不是错误
        if let Err(e) = model.insert(self.db.as_ref()).await {
            if !matches!(e, DbErr::RecordNotInserted) {
                return Err(RepositoryError::Database(e));
            }
        }
        Ok(())
    }
}
