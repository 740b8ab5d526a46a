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

/// 队列消息实体
///
/// 每个分片对应一条消息，按主题投递给对应供应商的工作器
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueMessage {
    /// 消息唯一标识符
    pub id: Uuid,
    /// 主题（每个供应商一个主题）
    pub topic: String,
    /// 消息载荷
    pub payload: serde_json::Value,
    /// 消息状态
    pub status: MessageStatus,
    /// 已投递次数
    pub attempt_count: i32,
    /// 最大投递次数
    pub max_retries: i32,
    /// 计划投递时间
    pub scheduled_at: Option<DateTime<FixedOffset>>,
    /// 锁定令牌
    pub lock_token: Option<Uuid>,
    /// 锁定过期时间
    pub lock_expires_at: Option<DateTime<FixedOffset>>,
    /// 创建时间
    pub created_at: DateTime<FixedOffset>,
    /// 更新时间
    pub updated_at: DateTime<FixedOffset>,
}

/// 消息状态枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    /// 已入队
    #[default]
    Queued,
    /// 投递中
    Active,
    /// 已确认
    Completed,
    /// 等待重投
    Failed,
    /// 投递次数耗尽
    Dead,
}

impl fmt::Display for MessageStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MessageStatus::Queued => write!(f, "queued"),
            MessageStatus::Active => write!(f, "active"),
            MessageStatus::Completed => write!(f, "completed"),
            MessageStatus::Failed => write!(f, "failed"),
            MessageStatus::Dead => write!(f, "dead"),
        }
    }
}

impl FromStr for MessageStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(MessageStatus::Queued),
            "active" => Ok(MessageStatus::Active),
            "completed" => Ok(MessageStatus::Completed),
            "failed" => Ok(MessageStatus::Failed),
            "dead" => Ok(MessageStatus::Dead),
            _ => Err(()),
        }
    }
}

impl QueueMessage {
    /// 创建一条新的入队消息
    pub fn new(topic: String, payload: serde_json::Value, max_retries: i32) -> Self {
        Self {
            id: Uuid::new_v4(),
            topic,
            payload,
            status: MessageStatus::Queued,
            attempt_count: 0,
            max_retries,
            scheduled_at: None,
            lock_token: None,
            lock_expires_at: None,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }

    /// 判断消息是否还可重投
    pub fn can_retry(&self) -> bool {
        self.attempt_count < self.max_retries
    }
}
