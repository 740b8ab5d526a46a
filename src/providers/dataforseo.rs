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

use crate::config::settings::DataForSeoSettings;
use crate::domain::services::enrichment_service::{NormalizedResponse, RawCitation};
use crate::providers::parse_flexible_date;
use crate::providers::traits::ProviderError;
use crate::utils::url_utils;

/// 任务提交超时
const SUBMIT_TIMEOUT: Duration = Duration::from_secs(60);

/// 回调中表示任务成功的状态码
pub const TASK_STATUS_OK: i32 = 20000;
/// 提交响应中表示任务已创建的状态码
const TASK_STATUS_CREATED: i32 = 20100;

/// LLM抓取任务请求
#[derive(Debug, Clone, Serialize)]
pub struct LlmTaskRequest {
    /// Prompt文本
    pub user_prompt: String,
    /// 模型名
    pub llm_model_name: String,
    /// 是否启用联网搜索
    pub web_search: bool,
    /// 地区名称
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_name: Option<String>,
    /// 回调地址，查询串承载相关上下文
    pub postback_url: String,
}

#[derive(Debug, Deserialize)]
struct TaskPostResponse {
    tasks: Option<Vec<TaskPostEntry>>,
}

#[derive(Debug, Deserialize)]
struct TaskPostEntry {
    id: String,
    status_code: i32,
    status_message: Option<String>,
}

/// 回调请求体信封
///
/// 至少包含 tasks[0].{id, status_code, result[0].{markdown, items, sources}}
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackEnvelope {
    pub tasks: Vec<CallbackTask>,
}

/// 回调中的单个任务
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackTask {
    /// 任务ID，与提交时返回的ID一致
    pub id: String,
    /// 任务状态码，20000为成功
    pub status_code: i32,
    /// 状态消息
    #[serde(default)]
    pub status_message: Option<String>,
    /// 任务结果
    #[serde(default)]
    pub result: Option<Vec<CallbackResult>>,
    /// 任务附带数据（含location_name）
    #[serde(default)]
    pub data: Option<Value>,
}

/// 回调中的单条结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackResult {
    /// 回答的Markdown全文
    #[serde(default)]
    pub markdown: Option<String>,
    /// 结构化条目
    #[serde(default)]
    pub items: Option<Vec<Value>>,
    /// 引用来源
    #[serde(default)]
    pub sources: Option<Vec<CallbackSource>>,
    /// 供应商报告的联网搜索标志
    #[serde(default)]
    pub web_search: Option<bool>,
    /// 结果时间
    #[serde(default)]
    pub datetime: Option<String>,
}

/// 回调中的引用来源
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackSource {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
}

impl CallbackTask {
    /// 任务是否成功且带有结果
    pub fn is_success(&self) -> bool {
        self.status_code == TASK_STATUS_OK
            && self
                .result
                .as_ref()
                .map(|r| !r.is_empty())
                .unwrap_or(false)
    }
}

/// DataForSEO LLM响应客户端
///
/// 每条 Prompt 提交一个任务，结果经 postback 回调送达
pub struct DataForSeoClient {
    client: reqwest::Client,
    login: String,
    password: String,
    base_url: String,
}

impl DataForSeoClient {
    /// 创建新的客户端实例
    pub fn new(settings: &DataForSeoSettings) -> Self {
        Self {
            client: reqwest::Client::new(),
            login: settings.login.clone(),
            password: settings.password.clone(),
            base_url: settings.base_url.clone(),
        }
    }

    /// 提交一个LLM抓取任务，返回任务ID
    pub async fn post_llm_task(&self, request: &LlmTaskRequest) -> Result<String, ProviderError> {
        let url = format!(
            "{}/v3/ai_optimization/chat_gpt/llm_responses/task_post",
            self.base_url
        );

        let response = self
            .client
            .post(&url)
            .basic_auth(&self.login, Some(&self.password))
            .timeout(SUBMIT_TIMEOUT)
            .json(&[request])
            .send()
            .await
            .map_err(ProviderError::from_request)?;

        let status = response.status().as_u16();
        if !(200..=299).contains(&status) {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, body));
        }

        let body: TaskPostResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Other(format!("invalid task_post response: {}", e)))?;

        let task = body
            .tasks
            .and_then(|mut tasks| {
                if tasks.is_empty() {
                    None
                } else {
                    Some(tasks.remove(0))
                }
            })
            .ok_or_else(|| ProviderError::Other("task_post returned no tasks".to_string()))?;

        if task.status_code != TASK_STATUS_CREATED && task.status_code != TASK_STATUS_OK {
            return Err(ProviderError::UpstreamFailed(format!(
                "task_post status {}: {}",
                task.status_code,
                task.status_message.unwrap_or_default()
            )));
        }

        Ok(task.id)
    }
}

/// 把回调结果归一化为供应商无关的响应信封
///
/// 带有来源列表时无条件视为走了联网搜索，覆盖请求侧的标志
pub fn normalize_callback(result: &CallbackResult) -> NormalizedResponse {
    let answer_text = result
        .markdown
        .clone()
        .or_else(|| extract_items_text(result))
        .unwrap_or_default();

    let sources = result.sources.as_deref().unwrap_or(&[]);
    let citations: Vec<RawCitation> = sources
        .iter()
        .filter_map(|s| {
            s.url.as_ref().map(|url| RawCitation {
                title: s.title.clone().unwrap_or_default(),
                url: url.clone(),
            })
        })
        .collect();

    let citation_dates = sources
        .iter()
        .filter_map(|s| s.date.as_deref())
        .filter_map(parse_flexible_date)
        .collect();

    let link_hosts: Vec<String> = sources
        .iter()
        .filter_map(|s| {
            s.domain
                .as_deref()
                .or(s.url.as_deref())
                .and_then(url_utils::bare_host)
        })
        .collect();

    let has_sources = !sources.is_empty();

    NormalizedResponse {
        answer_text,
        citations,
        link_count: sources.len(),
        link_hosts,
        has_sources_list: has_sources,
        product_count: count_items_of_type(result, &["products", "product"]),
        image_item_count: count_items_of_type(result, &["images", "image"]),
        local_item_count: count_items_of_type(result, &["local_pack", "map", "local_businesses"]),
        citation_dates,
        web_search: has_sources || result.web_search.unwrap_or(false),
        raw: serde_json::to_value(result).unwrap_or(Value::Null),
    }
}

fn extract_items_text(result: &CallbackResult) -> Option<String> {
    let items = result.items.as_ref()?;
    let joined: Vec<&str> = items
        .iter()
        .filter_map(|item| {
            item["text"]
                .as_str()
                .or_else(|| item["sections"][0]["text"].as_str())
        })
        .collect();

    if joined.is_empty() {
        None
    } else {
        Some(joined.join("\n\n"))
    }
}

fn count_items_of_type(result: &CallbackResult, types: &[&str]) -> u32 {
    result
        .items
        .as_ref()
        .map(|items| {
            items
                .iter()
                .filter(|item| {
                    item["type"]
                        .as_str()
                        .map(|t| types.contains(&t))
                        .unwrap_or(false)
                })
                .count() as u32
        })
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn result_with_sources(count: usize) -> CallbackResult {
        CallbackResult {
            markdown: Some("Acme answer".to_string()),
            items: None,
            sources: Some(
                (0..count)
                    .map(|i| CallbackSource {
                        title: Some(format!("src {}", i)),
                        url: Some(format!("https://site{}.com/page", i)),
                        domain: None,
                        date: None,
                    })
                    .collect(),
            ),
            web_search: Some(false),
            datetime: None,
        }
    }

    #[test]
    fn test_sources_force_web_search_flag() {
        // 请求侧 web_search=false，但带来源列表时结果仍记为联网
        let normalized = normalize_callback(&result_with_sources(2));
        assert!(normalized.web_search);
        assert!(normalized.has_sources_list);
        assert_eq!(normalized.citations.len(), 2);
    }

    #[test]
    fn test_no_sources_keeps_request_flag() {
        let normalized = normalize_callback(&result_with_sources(0));
        assert!(!normalized.web_search);
        assert!(!normalized.has_sources_list);
    }

    #[test]
    fn test_items_text_fallback() {
        let result = CallbackResult {
            markdown: None,
            items: Some(vec![
                json!({ "type": "message", "text": "part one" }),
                json!({ "type": "message", "sections": [{ "text": "part two" }] }),
            ]),
            sources: None,
            web_search: None,
            datetime: None,
        };
        let normalized = normalize_callback(&result);
        assert_eq!(normalized.answer_text, "part one\n\npart two");
    }

    #[test]
    fn test_item_type_counts() {
        let result = CallbackResult {
            markdown: Some("x".to_string()),
            items: Some(vec![
                json!({ "type": "products" }),
                json!({ "type": "products" }),
                json!({ "type": "images" }),
                json!({ "type": "local_pack" }),
                json!({ "type": "message" }),
            ]),
            sources: None,
            web_search: None,
            datetime: None,
        };
        let normalized = normalize_callback(&result);
        assert_eq!(normalized.product_count, 2);
        assert_eq!(normalized.image_item_count, 1);
        assert_eq!(normalized.local_item_count, 1);
    }

    #[test]
    fn test_task_is_success() {
        let task = CallbackTask {
            id: "t1".to_string(),
            status_code: TASK_STATUS_OK,
            status_message: None,
            result: Some(vec![result_with_sources(1)]),
            data: None,
        };
        assert!(task.is_success());

        let failed = CallbackTask {
            id: "t2".to_string(),
            status_code: 40501,
            status_message: Some("error".to_string()),
            result: None,
            data: None,
        };
        assert!(!failed.is_success());

        let empty = CallbackTask {
            id: "t3".to_string(),
            status_code: TASK_STATUS_OK,
            status_message: None,
            result: Some(vec![]),
            data: None,
        };
        assert!(!empty.is_success());
    }

    #[test]
    fn test_callback_envelope_parses() {
        let body = json!({
            "tasks": [{
                "id": "0123",
                "status_code": 20000,
                "result": [{
                    "markdown": "hello",
                    "sources": [{ "title": "a", "url": "https://a.com" }]
                }],
                "data": { "location_name": "United States" }
            }]
        });
        let envelope: CallbackEnvelope = serde_json::from_value(body).unwrap();
        assert_eq!(envelope.tasks.len(), 1);
        assert!(envelope.tasks[0].is_success());
    }
}
