// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::models::project::Project;
use crate::domain::repositories::job_batch_repository::RepositoryError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// 项目仓库特质
#[async_trait]
pub trait ProjectRepository: Send + Sync {
    /// 根据ID查找项目
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Project>, RepositoryError>;
    /// 查找所有配置了夜间调度频率的项目
    async fn find_scheduled(&self) -> Result<Vec<Project>, RepositoryError>;
    /// 盖上夜间调度的启动时间
    async fn stamp_nightly_run(
        &self,
        id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;
}
