// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::Deserialize;
use uuid::Uuid;

/// 提交请求DTO
///
/// `POST /enqueue` 的请求体
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueRequestDto {
    /// 项目ID
    pub project: Option<Uuid>,
    /// 用户ID
    pub user: Option<Uuid>,
    /// 通知邮箱
    pub email: Option<String>,
    /// Prompt文本列表
    #[serde(default)]
    pub prompts: Vec<String>,
    /// 品牌提及（单个字符串或数组）
    #[serde(default)]
    pub brand_mentions: MentionList,
    /// 域名提及（单个字符串或数组）
    #[serde(default)]
    pub domain_mentions: MentionList,
    /// 地区提示
    pub geo: Option<String>,
    /// OpenAI API密钥
    pub openai_key: Option<String>,
    /// OpenAI 模型名
    pub openai_model: Option<String>,
    /// 是否启用联网搜索
    #[serde(default)]
    pub web_search: bool,
    /// 标签名列表
    #[serde(default)]
    pub tags: Vec<String>,
}

/// 提及词列表的入站形态
///
/// 历史客户端有时发送单个字符串，有时发送数组；
/// 在API边界立即归一化为有序字符串序列
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MentionList {
    /// 单个字符串
    One(String),
    /// 字符串数组
    Many(Vec<String>),
}

impl Default for MentionList {
    fn default() -> Self {
        MentionList::Many(Vec::new())
    }
}

impl MentionList {
    /// 归一化为有序字符串序列，去掉空白项
    pub fn into_vec(self) -> Vec<String> {
        let items = match self {
            MentionList::One(s) => vec![s],
            MentionList::Many(items) => items,
        };

        items
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}
