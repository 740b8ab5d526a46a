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

use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

use crate::config::settings::DataForSeoSettings;
use crate::domain::models::volume::{MonthlyTrend, VolumeData};

/// 单次批量查询的关键词上限
const MAX_KEYWORDS: usize = 50;
/// 保留的月度走势条数
const MAX_MONTHS: usize = 12;
/// 查询超时
const LOOKUP_TIMEOUT: Duration = Duration::from_secs(30);

/// 热度查询错误类型
#[derive(Error, Debug)]
pub enum VolumeError {
    #[error("volume lookup authentication failed")]
    Auth,

    #[error("volume lookup credits exhausted")]
    CreditsExhausted,

    #[error("volume lookup rate limited")]
    RateLimited,
}

/// 供应商返回的单个关键词条目
#[derive(Debug, Clone, Deserialize)]
pub struct VolumeItem {
    /// 关键词
    pub keyword: String,
    /// 当前热度
    #[serde(default)]
    pub ai_search_volume: Option<i64>,
    /// 按月热度
    #[serde(default)]
    pub ai_monthly_searches: Option<Vec<MonthlySearch>>,
}

/// 供应商返回的单月热度
#[derive(Debug, Clone, Deserialize)]
pub struct MonthlySearch {
    pub year: i32,
    pub month: u32,
    #[serde(default)]
    pub ai_search_volume: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct VolumeApiResponse {
    #[serde(default)]
    tasks: Option<Vec<VolumeApiTask>>,
}

#[derive(Debug, Deserialize)]
struct VolumeApiTask {
    #[serde(default)]
    result: Option<Vec<VolumeApiResult>>,
}

#[derive(Debug, Deserialize)]
struct VolumeApiResult {
    #[serde(default)]
    items: Option<Vec<VolumeItem>>,
}

/// 关键词AI搜索热度客户端
///
/// 每个分片发起一次批量查询，结果与输入按下标对齐；
/// 零热度是有效数据，不折叠为空
pub struct VolumeTrendsClient {
    client: reqwest::Client,
    login: String,
    password: String,
    base_url: String,
}

impl VolumeTrendsClient {
    /// 创建新的客户端实例
    pub fn new(settings: &DataForSeoSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            login: settings.login.clone(),
            password: settings.password.clone(),
            base_url: settings.base_url.clone(),
        }
    }

    /// 批量查询热度，返回与输入逐下标对齐的序列
    ///
    /// # 错误映射
    ///
    /// * 401 -> `Auth`
    /// * 402 -> `CreditsExhausted`
    /// * 429 -> `RateLimited`
    /// * 其他失败按输入返回全空对齐序列，单个元素独立可空
    pub async fn batch_volumes(
        &self,
        prompts: &[String],
        location_code: i32,
    ) -> Result<Vec<Option<VolumeData>>, VolumeError> {
        if prompts.is_empty() {
            return Ok(Vec::new());
        }

        // 小写去重，封顶50个
        let mut seen = std::collections::BTreeSet::new();
        let keywords: Vec<String> = prompts
            .iter()
            .map(|p| p.to_lowercase())
            .filter(|p| seen.insert(p.clone()))
            .take(MAX_KEYWORDS)
            .collect();

        let url = format!(
            "{}/v3/ai_optimization/ai_keyword_data/keywords_search_volume/live",
            self.base_url
        );
        let body = json!([{
            "keywords": keywords,
            "location_code": location_code,
            "language_code": "en"
        }]);

        let response = match self
            .client
            .post(&url)
            .basic_auth(&self.login, Some(&self.password))
            .timeout(LOOKUP_TIMEOUT)
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!("Volume lookup request failed: {}", e);
                return Ok(vec![None; prompts.len()]);
            }
        };

        match response.status().as_u16() {
            401 => return Err(VolumeError::Auth),
            402 => return Err(VolumeError::CreditsExhausted),
            429 => return Err(VolumeError::RateLimited),
            status if !(200..=299).contains(&status) => {
                warn!("Volume lookup returned HTTP {}", status);
                return Ok(vec![None; prompts.len()]);
            }
            _ => {}
        }

        let parsed: VolumeApiResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!("Volume lookup body parse failed: {}", e);
                return Ok(vec![None; prompts.len()]);
            }
        };

        let items: Vec<VolumeItem> = parsed
            .tasks
            .unwrap_or_default()
            .into_iter()
            .filter_map(|t| t.result)
            .flatten()
            .filter_map(|r| r.items)
            .flatten()
            .collect();

        Ok(prompts
            .iter()
            .map(|prompt| aggregate_for_prompt(&prompt.to_lowercase(), &items))
            .collect())
    }
}

/// 聚合单条 Prompt 的匹配条目
///
/// 当前热度为条目求和；月度走势按 (年,月) 分组求和，新在前，
/// 最多12个月；均值与峰值从保留的月度序列计算
pub fn aggregate_for_prompt(prompt_lower: &str, items: &[VolumeItem]) -> Option<VolumeData> {
    let matched: Vec<&VolumeItem> = items
        .iter()
        .filter(|item| item.keyword.to_lowercase() == prompt_lower)
        .collect();

    if matched.is_empty() {
        return None;
    }

    let current_volume: i64 = matched
        .iter()
        .map(|item| item.ai_search_volume.unwrap_or(0))
        .sum();

    // (year, month) -> 求和
    let mut grouped: BTreeMap<(i32, u32), i64> = BTreeMap::new();
    for item in &matched {
        for monthly in item.ai_monthly_searches.as_deref().unwrap_or(&[]) {
            *grouped.entry((monthly.year, monthly.month)).or_insert(0) +=
                monthly.ai_search_volume.unwrap_or(0);
        }
    }

    let mut monthly_trends: Vec<MonthlyTrend> = grouped
        .into_iter()
        .rev()
        .take(MAX_MONTHS)
        .map(|((year, month), volume)| MonthlyTrend {
            year,
            month,
            volume,
        })
        .collect();
    monthly_trends.shrink_to_fit();

    let average_volume = if monthly_trends.is_empty() {
        0
    } else {
        monthly_trends.iter().map(|t| t.volume).sum::<i64>() / monthly_trends.len() as i64
    };
    let peak_volume = monthly_trends.iter().map(|t| t.volume).max().unwrap_or(0);

    Some(VolumeData {
        current_volume,
        monthly_trends,
        average_volume,
        peak_volume,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(keyword: &str, volume: i64, months: &[(i32, u32, i64)]) -> VolumeItem {
        VolumeItem {
            keyword: keyword.to_string(),
            ai_search_volume: Some(volume),
            ai_monthly_searches: Some(
                months
                    .iter()
                    .map(|(year, month, volume)| MonthlySearch {
                        year: *year,
                        month: *month,
                        ai_search_volume: Some(*volume),
                    })
                    .collect(),
            ),
        }
    }

    #[test]
    fn test_no_match_returns_none() {
        let items = vec![item("other keyword", 10, &[])];
        assert!(aggregate_for_prompt("best crm", &items).is_none());
    }

    #[test]
    fn test_zero_volume_is_valid() {
        let items = vec![item("best crm", 0, &[(2025, 6, 0)])];
        let data = aggregate_for_prompt("best crm", &items).unwrap();
        assert_eq!(data.current_volume, 0);
        assert_eq!(data.peak_volume, 0);
    }

    #[test]
    fn test_case_insensitive_match_and_sum() {
        let items = vec![
            item("Best CRM", 100, &[(2025, 6, 100)]),
            item("best crm", 50, &[(2025, 6, 50)]),
        ];
        let data = aggregate_for_prompt("best crm", &items).unwrap();
        assert_eq!(data.current_volume, 150);
        // 同月条目分组求和
        assert_eq!(data.monthly_trends.len(), 1);
        assert_eq!(data.monthly_trends[0].volume, 150);
    }

    #[test]
    fn test_monthly_sorted_newest_first_capped() {
        let months: Vec<(i32, u32, i64)> = (1..=14).map(|m| {
            if m <= 12 {
                (2024, m as u32, m as i64)
            } else {
                (2025, (m - 12) as u32, m as i64)
            }
        }).collect();
        let items = vec![item("k", 1, &months)];
        let data = aggregate_for_prompt("k", &items).unwrap();

        assert_eq!(data.monthly_trends.len(), 12);
        // 新在前
        assert_eq!(data.monthly_trends[0].year, 2025);
        assert_eq!(data.monthly_trends[0].month, 2);
        assert_eq!(data.monthly_trends[1].year, 2025);
        assert_eq!(data.monthly_trends[1].month, 1);
        assert_eq!(data.monthly_trends[2].year, 2024);
        assert_eq!(data.monthly_trends[2].month, 12);
    }

    #[test]
    fn test_average_and_peak() {
        let items = vec![item("k", 30, &[(2025, 5, 10), (2025, 6, 30), (2025, 7, 20)])];
        let data = aggregate_for_prompt("k", &items).unwrap();
        assert_eq!(data.average_volume, 20);
        assert_eq!(data.peak_volume, 30);
    }
}
