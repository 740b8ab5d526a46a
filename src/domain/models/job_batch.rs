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

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 作业批次实体
///
/// 表示一次 API 提交产生的整批 Prompt 作业，按分片推进计数
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobBatch {
    /// 批次唯一标识符
    pub id: Uuid,
    /// 所属用户ID
    pub user_id: Uuid,
    /// 所属项目ID
    pub project_id: Uuid,
    /// 通知邮箱
    pub email: Option<String>,
    /// Prompt总数
    pub total_prompts: i32,
    /// 分片总数
    pub total_batches: i32,
    /// 已成功分片数
    pub completed_batches: i32,
    /// 已失败分片数
    pub failed_batches: i32,
    /// 批次状态
    pub status: JobBatchStatus,
    /// OpenAI API密钥
    pub openai_key: String,
    /// OpenAI 模型名
    pub openai_model: String,
    /// 是否启用联网搜索
    pub web_search: bool,
    /// 地区提示
    pub country: Option<String>,
    /// 品牌提及快照
    pub brand_mentions: Vec<String>,
    /// 域名提及快照
    pub domain_mentions: Vec<String>,
    /// 标签
    pub tags: Vec<String>,
    /// 错误信息
    pub error_message: Option<String>,
    /// 创建时间
    pub created_at: DateTime<FixedOffset>,
    /// 更新时间
    pub updated_at: DateTime<FixedOffset>,
    /// 完成时间，仅终态时有值
    pub completed_at: Option<DateTime<FixedOffset>>,
}

/// 批次状态枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum JobBatchStatus {
    /// 待处理
    #[default]
    Pending,
    /// 处理中
    Processing,
    /// 全部成功
    Completed,
    /// 部分失败
    CompletedWithErrors,
    /// 全部失败
    Failed,
}

impl fmt::Display for JobBatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            JobBatchStatus::Pending => write!(f, "pending"),
            JobBatchStatus::Processing => write!(f, "processing"),
            JobBatchStatus::Completed => write!(f, "completed"),
            JobBatchStatus::CompletedWithErrors => write!(f, "completed_with_errors"),
            JobBatchStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for JobBatchStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobBatchStatus::Pending),
            "processing" => Ok(JobBatchStatus::Processing),
            "completed" => Ok(JobBatchStatus::Completed),
            "completed_with_errors" => Ok(JobBatchStatus::CompletedWithErrors),
            "failed" => Ok(JobBatchStatus::Failed),
            _ => Err(()),
        }
    }
}

impl JobBatchStatus {
    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobBatchStatus::Completed | JobBatchStatus::CompletedWithErrors | JobBatchStatus::Failed
        )
    }

    /// 根据计数推导终态
    ///
    /// 仅当 completed + failed == total 时调用
    pub fn terminal_from_counts(completed: i32, failed: i32) -> JobBatchStatus {
        if failed == 0 {
            JobBatchStatus::Completed
        } else if completed == 0 {
            JobBatchStatus::Failed
        } else {
            JobBatchStatus::CompletedWithErrors
        }
    }
}

impl JobBatch {
    /// 创建一个新的待处理批次
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: Uuid,
        project_id: Uuid,
        email: Option<String>,
        total_prompts: i32,
        total_batches: i32,
        openai_key: String,
        openai_model: String,
        web_search: bool,
        country: Option<String>,
        brand_mentions: Vec<String>,
        domain_mentions: Vec<String>,
        tags: Vec<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            project_id,
            email,
            total_prompts,
            total_batches,
            completed_batches: 0,
            failed_batches: 0,
            status: JobBatchStatus::Pending,
            openai_key,
            openai_model,
            web_search,
            country,
            brand_mentions,
            domain_mentions,
            tags,
            error_message: None,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
            completed_at: None,
        }
    }

    /// 所有分片是否已计数完毕
    pub fn all_shards_accounted(&self) -> bool {
        self.completed_batches + self.failed_batches >= self.total_batches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_from_counts() {
        assert_eq!(
            JobBatchStatus::terminal_from_counts(3, 0),
            JobBatchStatus::Completed
        );
        assert_eq!(
            JobBatchStatus::terminal_from_counts(0, 3),
            JobBatchStatus::Failed
        );
        assert_eq!(
            JobBatchStatus::terminal_from_counts(2, 1),
            JobBatchStatus::CompletedWithErrors
        );
    }

    #[test]
    fn test_status_roundtrip() {
        for status in [
            JobBatchStatus::Pending,
            JobBatchStatus::Processing,
            JobBatchStatus::Completed,
            JobBatchStatus::CompletedWithErrors,
            JobBatchStatus::Failed,
        ] {
            assert_eq!(status.to_string().parse::<JobBatchStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_is_terminal() {
        assert!(!JobBatchStatus::Pending.is_terminal());
        assert!(!JobBatchStatus::Processing.is_terminal());
        assert!(JobBatchStatus::Completed.is_terminal());
        assert!(JobBatchStatus::CompletedWithErrors.is_terminal());
        assert!(JobBatchStatus::Failed.is_terminal());
    }
}
