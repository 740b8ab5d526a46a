// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 新建标签的默认颜色
pub const DEFAULT_TAG_COLOR: &str = "#6B7280";

/// 标签实体
///
/// 项目范围内按名称（不区分大小写）去重
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tag {
    /// 标签唯一标识符
    pub id: Uuid,
    /// 所属项目ID
    pub project_id: Uuid,
    /// 标签名
    pub name: String,
    /// 颜色
    pub color: String,
    /// 创建时间
    pub created_at: DateTime<FixedOffset>,
}

impl Tag {
    /// 使用默认颜色创建新标签
    pub fn new(project_id: Uuid, name: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            name,
            color: DEFAULT_TAG_COLOR.to_string(),
            created_at: Utc::now().into(),
        }
    }
}
