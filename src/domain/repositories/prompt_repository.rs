// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::prompt::Prompt;
use crate::domain::repositories::job_batch_repository::RepositoryError;
use async_trait::async_trait;
use uuid::Uuid;

/// Prompt仓库特质
#[async_trait]
pub trait PromptRepository: Send + Sync {
    /// 根据ID查找
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Prompt>, RepositoryError>;
    /// 查找项目下所有启用的Prompt
    async fn find_enabled_by_project(
        &self,
        project_id: Uuid,
    ) -> Result<Vec<Prompt>, RepositoryError>;
}
