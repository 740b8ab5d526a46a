// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::repositories::job_batch_repository::RepositoryError;
use async_trait::async_trait;
use uuid::Uuid;

/// 用户设置仓库特质
///
/// 只暴露核心管线需要的列
#[async_trait]
pub trait UserSettingsRepository: Send + Sync {
    /// 读取用户的OpenAI密钥
    async fn find_openai_key(&self, user_id: Uuid) -> Result<Option<String>, RepositoryError>;
}
