// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;

/// LLM调用错误类型
///
/// 校验探针把上游状态码映射为类型化错误，提交接口据此返回 400
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("OpenAI authentication failed")]
    AuthFailed,

    #[error("OpenAI quota exceeded")]
    QuotaExceeded,

    #[error("model access forbidden")]
    ModelForbidden,

    #[error("model not found")]
    ModelNotFound,

    #[error("OpenAI upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("OpenAI request failed: {0}")]
    Other(String),
}

#[async_trait]
pub trait LlmServiceTrait: Send + Sync {
    /// 以 1-token 探针校验密钥与模型
    async fn validate_key(&self) -> Result<(), LlmError>;

    /// 发起一次补全，返回首个choice的文本
    async fn completion(
        &self,
        system: &str,
        user: &str,
        temperature: f64,
        max_tokens: u32,
    ) -> Result<String>;
}

/// LLM服务 - 处理与OpenAI的交互
///
/// 客户端由队列消息携带的密钥逐条构造，不跨消息共享
pub struct LlmService {
    api_key: String,
    model: String,
    api_base_url: String,
    client: reqwest::Client,
}

impl LlmService {
    pub fn new(api_key: String, model: String, api_base_url: String) -> Self {
        Self {
            api_key,
            model,
            api_base_url,
            client: reqwest::Client::new(),
        }
    }

    async fn chat(&self, body: Value) -> Result<(u16, Value), LlmError> {
        let url = format!("{}/chat/completions", self.api_base_url);
        let response = self
            .client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Other(e.to_string()))?;

        let status = response.status().as_u16();
        let body: Value = response
            .json()
            .await
            .unwrap_or_else(|_| json!({}));
        Ok((status, body))
    }
}

#[async_trait]
impl LlmServiceTrait for LlmService {
    /// 以 1-token 探针校验密钥与模型
    ///
    /// # 错误映射
    ///
    /// * 401 -> `AuthFailed`
    /// * 403 -> `ModelForbidden`
    /// * 404 -> `ModelNotFound`
    /// * 429 -> `QuotaExceeded`
    /// * 5xx -> `UpstreamUnavailable`
    async fn validate_key(&self) -> Result<(), LlmError> {
        let request_body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": "ping" }],
            "max_tokens": 1
        });

        let (status, body) = self.chat(request_body).await?;

        match status {
            200..=299 => Ok(()),
            401 => Err(LlmError::AuthFailed),
            403 => Err(LlmError::ModelForbidden),
            404 => Err(LlmError::ModelNotFound),
            429 => Err(LlmError::QuotaExceeded),
            500..=599 => Err(LlmError::UpstreamUnavailable(format!("HTTP {}", status))),
            _ => Err(LlmError::Other(format!(
                "HTTP {}: {}",
                status,
                body["error"]["message"].as_str().unwrap_or("unknown")
            ))),
        }
    }

    /// 发起一次补全
    ///
    /// # 参数
    /// * `system` - 系统提示（评分量表属于二进制契约的一部分）
    /// * `user` - 用户内容
    /// * `temperature` - 采样温度
    /// * `max_tokens` - 输出token上限
    ///
    /// # 返回值
    /// * `Result<String>` - 首个choice的文本内容
    async fn completion(
        &self,
        system: &str,
        user: &str,
        temperature: f64,
        max_tokens: u32,
    ) -> Result<String> {
        let request_body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user }
            ],
            "temperature": temperature,
            "max_tokens": max_tokens
        });

        let (status, body) = self
            .chat(request_body)
            .await
            .map_err(|e| anyhow::anyhow!(e.to_string()))?;

        if !(200..=299).contains(&status) {
            return Err(anyhow::anyhow!(
                "OpenAI API returned error: {} - {}",
                status,
                body["error"]["message"].as_str().unwrap_or("unknown")
            ));
        }

        body["choices"][0]["message"]["content"]
            .as_str()
            .map(|s| s.trim().to_string())
            .context("Invalid response format from OpenAI API")
    }
}

/// 从LLM输出中解析首个整数并夹到 [0,100]
pub fn parse_score(raw: &str) -> Option<i32> {
    let digits: String = raw
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();

    digits.parse::<i32>().ok().map(|n| n.clamp(0, 100))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_score_plain() {
        assert_eq!(parse_score("85"), Some(85));
        assert_eq!(parse_score(" 42 "), Some(42));
    }

    #[test]
    fn test_parse_score_embedded() {
        assert_eq!(parse_score("score: 73/100"), Some(73));
        assert_eq!(parse_score("Sentiment is 90."), Some(90));
    }

    #[test]
    fn test_parse_score_clamps() {
        assert_eq!(parse_score("250"), Some(100));
        assert_eq!(parse_score("0"), Some(0));
    }

    #[test]
    fn test_parse_score_garbage() {
        assert_eq!(parse_score("no number here"), None);
        assert_eq!(parse_score(""), None);
    }
}
