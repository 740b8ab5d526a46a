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
use serde_json::Value;
use std::time::Duration;
use uuid::Uuid;

use crate::config::settings::BrightDataSettings;
use crate::domain::services::enrichment_service::{NormalizedResponse, RawCitation};
use crate::providers::parse_flexible_date;
use crate::providers::traits::ProviderError;
use crate::utils::url_utils;

/// 数据抓取请求的目标入口
const CHAT_URL: &str = "https://chatgpt.com/";
/// 快照拉取超时
const FETCH_TIMEOUT: Duration = Duration::from_secs(30);
/// 触发抓取超时
const TRIGGER_TIMEOUT: Duration = Duration::from_secs(60);

/// 单条 Prompt 的抓取输入
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeInput {
    /// 目标入口URL
    pub url: String,
    /// Prompt文本
    pub prompt: String,
    /// 结果行ID，结果匹配用的相关ID
    pub prompt_id: Uuid,
    /// 地区提示
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// 是否启用联网搜索
    pub web_search: bool,
}

impl ScrapeInput {
    pub fn new(prompt: String, prompt_id: Uuid, country: Option<String>, web_search: bool) -> Self {
        Self {
            url: CHAT_URL.to_string(),
            prompt,
            prompt_id,
            country,
            web_search,
        }
    }
}

/// 快照的当前状态
#[derive(Debug)]
pub enum SnapshotState {
    /// 结果就绪，返回原始条目
    Ready(Vec<Value>),
    /// 仍在构建中（running/building/pending）
    Running,
}

#[derive(Debug, Deserialize)]
struct TriggerResponse {
    snapshot_id: String,
}

/// Bright Data 数据集客户端
///
/// 触发一次抓取覆盖整个分片，之后按快照ID轮询取回
pub struct BrightDataClient {
    client: reqwest::Client,
    api_key: String,
    dataset_id: String,
    base_url: String,
}

impl BrightDataClient {
    /// 创建新的客户端实例
    pub fn new(settings: &BrightDataSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: settings.api_key.clone(),
            dataset_id: settings.dataset_id.clone(),
            base_url: settings.base_url.clone(),
        }
    }

    /// 为一个分片触发抓取，返回覆盖全分片的快照ID
    pub async fn trigger_scrape(&self, inputs: &[ScrapeInput]) -> Result<String, ProviderError> {
        let url = format!(
            "{}/datasets/v3/trigger?dataset_id={}&include_errors=true",
            self.base_url, self.dataset_id
        );

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .timeout(TRIGGER_TIMEOUT)
            .json(inputs)
            .send()
            .await
            .map_err(ProviderError::from_request)?;

        let status = response.status().as_u16();
        if !(200..=299).contains(&status) {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, body));
        }

        let trigger: TriggerResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Other(format!("invalid trigger response: {}", e)))?;
        Ok(trigger.snapshot_id)
    }

    /// 拉取快照的当前状态
    ///
    /// 响应为JSON数组时结果就绪；`.status == failed` 视为致命失败；
    /// running/building/pending 继续轮询
    pub async fn fetch_snapshot(&self, snapshot_id: &str) -> Result<SnapshotState, ProviderError> {
        let url = format!(
            "{}/datasets/v3/snapshot/{}?format=json",
            self.base_url, snapshot_id
        );

        let response = self
            .client
            .get(&url)
            .bearer_auth(&self.api_key)
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
            .map_err(ProviderError::from_request)?;

        let status = response.status().as_u16();
        if !(200..=299).contains(&status) {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, body));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| ProviderError::Other(format!("invalid snapshot body: {}", e)))?;

        parse_snapshot_body(body)
    }
}

/// 解析快照响应体
pub fn parse_snapshot_body(body: Value) -> Result<SnapshotState, ProviderError> {
    match body {
        Value::Array(entries) => Ok(SnapshotState::Ready(entries)),
        Value::Object(ref map) => match map.get("status").and_then(|s| s.as_str()) {
            Some("failed") => Err(ProviderError::UpstreamFailed(
                map.get("error_message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("snapshot failed")
                    .to_string(),
            )),
            Some("running") | Some("building") | Some("pending") => Ok(SnapshotState::Running),
            other => Err(ProviderError::Other(format!(
                "unexpected snapshot status: {:?}",
                other
            ))),
        },
        _ => Err(ProviderError::Other("unexpected snapshot body".to_string())),
    }
}

/// 从快照条目中提取用于匹配的相关ID
pub fn entry_prompt_id(entry: &Value) -> Option<Uuid> {
    entry["input"]["prompt_id"]
        .as_str()
        .and_then(|s| Uuid::parse_str(s).ok())
}

/// 从快照条目中提取Prompt文本
pub fn entry_prompt_text(entry: &Value) -> Option<&str> {
    entry["input"]["prompt"]
        .as_str()
        .or_else(|| entry["prompt"].as_str())
}

/// 把快照条目归一化为供应商无关的响应信封
pub fn normalize_entry(entry: &Value) -> NormalizedResponse {
    let answer_text = entry["answer_text"]
        .as_str()
        .or_else(|| entry["answer_text_markdown"].as_str())
        .or_else(|| entry["answer"].as_str())
        .unwrap_or_default()
        .to_string();

    let citations: Vec<RawCitation> = entry["citations"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|c| {
                    c["url"].as_str().map(|url| RawCitation {
                        title: c["title"].as_str().unwrap_or_default().to_string(),
                        url: url.to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let links: Vec<&str> = entry["links_attached"]
        .as_array()
        .map(|arr| arr.iter().filter_map(|l| l["url"].as_str()).collect())
        .unwrap_or_default();
    let link_hosts: Vec<String> = links
        .iter()
        .filter_map(|l| url_utils::bare_host(l))
        .collect();

    let citation_dates = entry["citations"]
        .as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|c| c["date"].as_str().or_else(|| c["published_date"].as_str()))
                .filter_map(parse_flexible_date)
                .collect()
        })
        .unwrap_or_default();

    NormalizedResponse {
        answer_text,
        citations,
        link_count: links.len(),
        link_hosts,
        has_sources_list: entry["sources"]
            .as_array()
            .map(|a| !a.is_empty())
            .unwrap_or(false),
        product_count: nested_count(entry, &["products", "product_results"]),
        image_item_count: nested_count(entry, &["images", "image_results"]),
        local_item_count: nested_count(entry, &["local_results", "map_results"]),
        citation_dates,
        web_search: entry["web_search"].as_bool().unwrap_or(false),
        raw: entry.clone(),
    }
}

fn nested_count(entry: &Value, keys: &[&str]) -> u32 {
    keys.iter()
        .filter_map(|key| entry[*key].as_array())
        .map(|arr| arr.len() as u32)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_snapshot_ready() {
        let body = json!([{"answer_text": "hi"}]);
        match parse_snapshot_body(body).unwrap() {
            SnapshotState::Ready(entries) => assert_eq!(entries.len(), 1),
            _ => panic!("expected ready"),
        }
    }

    #[test]
    fn test_parse_snapshot_running_states() {
        for status in ["running", "building", "pending"] {
            let body = json!({ "status": status });
            assert!(matches!(
                parse_snapshot_body(body).unwrap(),
                SnapshotState::Running
            ));
        }
    }

    #[test]
    fn test_parse_snapshot_failed() {
        let body = json!({ "status": "failed", "error_message": "boom" });
        match parse_snapshot_body(body) {
            Err(ProviderError::UpstreamFailed(msg)) => assert_eq!(msg, "boom"),
            other => panic!("expected UpstreamFailed, got {:?}", other.err()),
        }
    }

    #[test]
    fn test_normalize_entry_full() {
        let prompt_id = Uuid::new_v4();
        let entry = json!({
            "input": { "prompt": "best crm", "prompt_id": prompt_id.to_string() },
            "answer_text": "Acme is solid",
            "citations": [
                { "title": "Review", "url": "https://www.reviews.com/acme", "date": "2025-06-01" }
            ],
            "links_attached": [
                { "url": "https://a.com/1" }, { "url": "https://b.com/2" }
            ],
            "web_search": true
        });

        let normalized = normalize_entry(&entry);
        assert_eq!(normalized.answer_text, "Acme is solid");
        assert_eq!(normalized.citations.len(), 1);
        assert_eq!(normalized.link_count, 2);
        assert_eq!(normalized.link_hosts, vec!["a.com", "b.com"]);
        assert_eq!(normalized.citation_dates.len(), 1);
        assert!(normalized.web_search);
        assert_eq!(entry_prompt_id(&entry), Some(prompt_id));
        assert_eq!(entry_prompt_text(&entry), Some("best crm"));
    }

    #[test]
    fn test_normalize_entry_minimal() {
        let entry = json!({ "answer_text": "" });
        let normalized = normalize_entry(&entry);
        assert!(normalized.answer_text.is_empty());
        assert!(normalized.citations.is_empty());
        assert_eq!(normalized.link_count, 0);
        assert!(!normalized.web_search);
    }
}
