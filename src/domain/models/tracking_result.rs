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
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::domain::models::volume::MonthlyTrend;

/// 追踪结果实体
///
/// 每次提交中的每条 Prompt 对应一行，承载抓取回答与富化评分
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackingResult {
    /// 结果唯一标识符
    pub id: Uuid,
    /// 关联的Prompt ID
    pub prompt_id: Uuid,
    /// Prompt文本快照
    pub prompt_text: String,
    /// 所属项目ID
    pub project_id: Uuid,
    /// 所属用户ID
    pub user_id: Uuid,
    /// 所属批次ID（夜间任务为空）
    pub job_batch_id: Option<Uuid>,
    /// 分片编号（0起始）
    pub batch_number: i32,
    /// 供应商任务ID（派发前为空）
    pub external_task_id: Option<String>,
    /// 结果状态
    pub status: ResultStatus,
    /// 品牌是否出现在回答中
    pub is_present: Option<bool>,
    /// 目标域名是否出现在引用中
    pub is_domain_present: Option<bool>,
    /// 情感评分 0-100
    pub sentiment: Option<i32>,
    /// 显著度评分 0-100
    pub salience: Option<i32>,
    /// 规范化后的回答内容
    pub response: Option<serde_json::Value>,
    /// 引用列表
    pub citations: Option<Vec<Citation>>,
    /// 品牌提及次数
    pub mention_count: Option<i32>,
    /// 域名提及次数
    pub domain_mention_count: Option<i32>,
    /// 实际是否走了联网搜索
    pub web_search: Option<bool>,
    /// 引用链接潜力评分 0-100
    pub lcp: Option<i32>,
    /// 可行动性评分 0-100
    pub actionability: Option<i32>,
    /// 意图分类
    pub intent_classification: Option<Intent>,
    /// 检出特征 -> 出现次数
    pub serp_features: Option<BTreeMap<String, u32>>,
    /// AI搜索热度
    pub ai_search_volume: Option<i64>,
    /// 按月热度走势（新在前，最多12个月）
    pub ai_monthly_trends: Option<Vec<MonthlyTrend>>,
    /// 热度抓取时间
    pub ai_volume_fetched_at: Option<DateTime<FixedOffset>>,
    /// 热度查询的地区代码
    pub ai_volume_location_code: Option<i32>,
    /// 最近一次变更的毫秒时间戳
    pub timestamp_ms: i64,
    /// 结果来源
    pub source: Option<Source>,
    /// 创建时间
    pub created_at: DateTime<FixedOffset>,
}

/// 引用条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    /// 标题
    pub title: String,
    /// 裸域名
    pub domain: String,
    /// 规范化URL（去协议/www/查询串/片段）
    pub url: String,
}

/// 结果状态枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ResultStatus {
    /// 待处理
    #[default]
    Pending,
    /// 处理中
    Processing,
    /// 已完成
    Fulfilled,
    /// 已失败
    Failed,
}

impl fmt::Display for ResultStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ResultStatus::Pending => write!(f, "pending"),
            ResultStatus::Processing => write!(f, "processing"),
            ResultStatus::Fulfilled => write!(f, "fulfilled"),
            ResultStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for ResultStatus {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(ResultStatus::Pending),
            "processing" => Ok(ResultStatus::Processing),
            "fulfilled" => Ok(ResultStatus::Fulfilled),
            "failed" => Ok(ResultStatus::Failed),
            _ => Err(()),
        }
    }
}

impl ResultStatus {
    /// 是否为终态
    pub fn is_terminal(&self) -> bool {
        matches!(self, ResultStatus::Fulfilled | ResultStatus::Failed)
    }
}

/// 结果来源枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Source {
    /// Bright Data 派发
    Brightdata,
    /// DataForSEO 派发
    Dataforseo,
    /// Bright Data 夜间任务
    BrightdataNightly,
    /// DataForSEO 夜间任务
    DataforseoNightly,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Source::Brightdata => write!(f, "brightdata"),
            Source::Dataforseo => write!(f, "dataforseo"),
            Source::BrightdataNightly => write!(f, "brightdata-nightly"),
            Source::DataforseoNightly => write!(f, "dataforseo-nightly"),
        }
    }
}

impl FromStr for Source {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "brightdata" => Ok(Source::Brightdata),
            "dataforseo" => Ok(Source::Dataforseo),
            "brightdata-nightly" => Ok(Source::BrightdataNightly),
            "dataforseo-nightly" => Ok(Source::DataforseoNightly),
            _ => Err(()),
        }
    }
}

/// 意图分类枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// 信息型
    Informational,
    /// 商业型
    Commercial,
    /// 交易型
    Transactional,
    /// 本地型
    Local,
    /// 导航型
    Navigational,
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Intent::Informational => write!(f, "informational"),
            Intent::Commercial => write!(f, "commercial"),
            Intent::Transactional => write!(f, "transactional"),
            Intent::Local => write!(f, "local"),
            Intent::Navigational => write!(f, "navigational"),
        }
    }
}

impl FromStr for Intent {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "informational" => Ok(Intent::Informational),
            "commercial" => Ok(Intent::Commercial),
            "transactional" => Ok(Intent::Transactional),
            "local" => Ok(Intent::Local),
            "navigational" => Ok(Intent::Navigational),
            _ => Err(()),
        }
    }
}

impl TrackingResult {
    /// 创建一个新的待处理结果行
    pub fn new_pending(
        prompt_id: Uuid,
        prompt_text: String,
        project_id: Uuid,
        user_id: Uuid,
        job_batch_id: Option<Uuid>,
        batch_number: i32,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            prompt_id,
            prompt_text,
            project_id,
            user_id,
            job_batch_id,
            batch_number,
            external_task_id: None,
            status: ResultStatus::Pending,
            is_present: None,
            is_domain_present: None,
            sentiment: None,
            salience: None,
            response: None,
            citations: None,
            mention_count: None,
            domain_mention_count: None,
            web_search: None,
            lcp: None,
            actionability: None,
            intent_classification: None,
            serp_features: None,
            ai_search_volume: None,
            ai_monthly_trends: None,
            ai_volume_fetched_at: None,
            ai_volume_location_code: None,
            timestamp_ms: Utc::now().timestamp_millis(),
            source: None,
            created_at: Utc::now().into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip() {
        for status in [
            ResultStatus::Pending,
            ResultStatus::Processing,
            ResultStatus::Fulfilled,
            ResultStatus::Failed,
        ] {
            assert_eq!(status.to_string().parse::<ResultStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_source_roundtrip() {
        for source in [
            Source::Brightdata,
            Source::Dataforseo,
            Source::BrightdataNightly,
            Source::DataforseoNightly,
        ] {
            assert_eq!(source.to_string().parse::<Source>().unwrap(), source);
        }
    }

    #[test]
    fn test_new_pending_has_null_scores() {
        let result = TrackingResult::new_pending(
            Uuid::new_v4(),
            "best crm for startups".to_string(),
            Uuid::new_v4(),
            Uuid::new_v4(),
            Some(Uuid::new_v4()),
            0,
        );

        assert_eq!(result.status, ResultStatus::Pending);
        assert!(result.sentiment.is_none());
        assert!(result.salience.is_none());
        assert!(result.lcp.is_none());
        assert!(result.actionability.is_none());
        assert!(result.mention_count.is_none());
        assert!(result.external_task_id.is_none());
    }
}
