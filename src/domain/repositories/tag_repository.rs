// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::tag::Tag;
use crate::domain::repositories::job_batch_repository::RepositoryError;
use async_trait::async_trait;
use uuid::Uuid;

/// 标签仓库特质
#[async_trait]
pub trait TagRepository: Send + Sync {
    /// 项目范围内按名称查找标签（不区分大小写）
    async fn find_by_name_ci(
        &self,
        project_id: Uuid,
        name: &str,
    ) -> Result<Option<Tag>, RepositoryError>;
    /// 创建新标签
    async fn create(&self, tag: &Tag) -> Result<Tag, RepositoryError>;
    /// 建立Prompt与标签的关联
    async fn link_prompt(&self, tag_id: Uuid, prompt_id: Uuid) -> Result<(), RepositoryError>;
}
