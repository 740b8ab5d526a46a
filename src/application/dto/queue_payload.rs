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

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::providers::traits::ScrapeService;

/// 分片消息载荷
///
/// 队列主题消息的JSON体；`service` 与主题冗余携带，
/// 工作器据此丢弃发错主题的消息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShardPayload {
    /// 目标供应商
    pub service: ScrapeService,
    /// 批次ID（夜间任务为空）
    pub job_batch_id: Option<Uuid>,
    /// 分片编号（0起始）
    pub batch_number: i32,
    /// 分片总数
    pub total_batches: i32,
    /// 用户ID
    pub user_id: Uuid,
    /// 项目ID
    pub project_id: Uuid,
    /// 通知邮箱（夜间任务为空）
    pub email: Option<String>,
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
    /// 分片内的Prompt记录
    pub prompts: Vec<PromptJob>,
    /// 是否为夜间任务
    pub is_nightly: bool,
    /// 重投时携带的快照ID（仅轮询式供应商）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<String>,
}

/// 分片内的单条Prompt记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptJob {
    /// Prompt ID
    pub prompt_id: Uuid,
    /// 结果行ID（夜间任务为空，回调时新建行）
    pub tracking_result_id: Option<Uuid>,
    /// Prompt文本
    pub text: String,
}

/// 按数量规则计算分片大小
///
/// `<5` 全部放一个分片，`5-10` 每片5条，`>10` 每片10条
pub fn batch_size_for(total: usize) -> usize {
    if total < 5 {
        total.max(1)
    } else if total <= 10 {
        5
    } else {
        10
    }
}

/// 把序列切成分片，返回 (分片大小, 分片数)
pub fn shard_counts(total: usize) -> (usize, usize) {
    let size = batch_size_for(total);
    (size, total.div_ceil(size))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_size_boundaries() {
        assert_eq!(shard_counts(1), (1, 1));
        assert_eq!(shard_counts(4), (4, 1));
        assert_eq!(shard_counts(5), (5, 1));
        assert_eq!(shard_counts(10), (5, 2));
        assert_eq!(shard_counts(11), (10, 2));
        assert_eq!(shard_counts(20), (10, 2));
        assert_eq!(shard_counts(21), (10, 3));
    }

    #[test]
    fn test_payload_roundtrip() {
        let payload = ShardPayload {
            service: ScrapeService::Dataforseo,
            job_batch_id: Some(Uuid::new_v4()),
            batch_number: 1,
            total_batches: 2,
            user_id: Uuid::new_v4(),
            project_id: Uuid::new_v4(),
            email: Some("user@example.com".to_string()),
            openai_key: "sk-test".to_string(),
            openai_model: "gpt-4o-mini".to_string(),
            web_search: true,
            country: Some("US".to_string()),
            brand_mentions: vec!["Acme".to_string()],
            domain_mentions: vec!["acme.com".to_string()],
            prompts: vec![PromptJob {
                prompt_id: Uuid::new_v4(),
                tracking_result_id: Some(Uuid::new_v4()),
                text: "best crm".to_string(),
            }],
            is_nightly: false,
            snapshot_id: None,
        };

        let value = serde_json::to_value(&payload).unwrap();
        let parsed: ShardPayload = serde_json::from_value(value).unwrap();
        assert_eq!(parsed.batch_number, 1);
        assert_eq!(parsed.service, ScrapeService::Dataforseo);
        assert_eq!(parsed.prompts.len(), 1);
    }
}
