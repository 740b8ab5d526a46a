// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Prompt实体
///
/// 用户配置的追踪问题，由提交接口或管理端创建，被调度器与派发器消费
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompt {
    /// Prompt唯一标识符
    pub id: Uuid,
    /// 所属项目ID
    pub project_id: Uuid,
    /// 所属用户ID
    pub user_id: Uuid,
    /// 文本内容
    pub text: String,
    /// 是否启用
    pub enabled: bool,
    /// 品牌提及（有序）
    pub brand_mentions: Vec<String>,
    /// 域名提及（有序，裸域名）
    pub domain_mentions: Vec<String>,
    /// 地区提示
    pub country: Option<String>,
    /// 创建时间
    pub created_at: DateTime<FixedOffset>,
    /// 更新时间
    pub updated_at: DateTime<FixedOffset>,
}

impl Prompt {
    /// 创建一个新的启用状态Prompt
    pub fn new(
        project_id: Uuid,
        user_id: Uuid,
        text: String,
        brand_mentions: Vec<String>,
        domain_mentions: Vec<String>,
        country: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            user_id,
            text,
            enabled: true,
            brand_mentions,
            domain_mentions,
            country,
            created_at: Utc::now().into(),
            updated_at: Utc::now().into(),
        }
    }
}
