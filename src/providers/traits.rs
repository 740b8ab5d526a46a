// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

use crate::utils::retry_policy::RetryPolicy;

/// 抓取供应商标识
///
/// 同时充当队列主题名：每个供应商一个主题
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeService {
    /// Bright Data，快照轮询式
    Brightdata,
    /// DataForSEO，回调式
    Dataforseo,
}

impl ScrapeService {
    /// 该供应商的队列主题名
    pub fn topic(&self) -> &'static str {
        match self {
            ScrapeService::Brightdata => "brightdata",
            ScrapeService::Dataforseo => "dataforseo",
        }
    }
}

impl fmt::Display for ScrapeService {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.topic())
    }
}

impl FromStr for ScrapeService {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "brightdata" => Ok(ScrapeService::Brightdata),
            "dataforseo" => Ok(ScrapeService::Dataforseo),
            _ => Err(()),
        }
    }
}

/// 供应商调用错误类型
///
/// `Retryable` 触发消息重投；其余错误确认消息并把结果行置为失败
#[derive(Error, Debug)]
pub enum ProviderError {
    /// 可重试的上游错误（429、5xx、网络、超时）
    #[error("retryable upstream error: {0}")]
    Retryable(String),

    /// 供应商明确报告失败
    #[error("upstream reported failure: {0}")]
    UpstreamFailed(String),

    /// 供应商返回空结果集
    #[error("upstream returned empty results")]
    UpstreamEmpty,

    /// 其他不可重试错误（载荷解析等）
    #[error("provider error: {0}")]
    Other(String),
}

impl ProviderError {
    /// 是否应当把消息重新投递
    pub fn is_retryable(&self) -> bool {
        matches!(self, ProviderError::Retryable(_))
    }

    /// 根据HTTP状态码分类上游错误
    pub fn from_status(status: u16, body: String) -> Self {
        if status == 429 || (500..=599).contains(&status) {
            ProviderError::Retryable(format!("HTTP {}: {}", status, body))
        } else {
            ProviderError::Other(format!("HTTP {}: {}", status, body))
        }
    }

    /// 根据reqwest错误分类
    pub fn from_request(error: reqwest::Error) -> Self {
        if error.is_timeout() || error.is_connect() {
            ProviderError::Retryable(error.to_string())
        } else {
            ProviderError::Other(error.to_string())
        }
    }
}

/// 带指数退避地执行一次供应商调用
///
/// 只重试 `Retryable` 错误；429 切到限流退避曲线。
/// 尝试耗尽后原样返回最后的错误，由调用方决定消息去向
pub async fn with_retries<T, F, Fut>(label: &str, mut op: F) -> Result<T, ProviderError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let policy = RetryPolicy::standard();
    let rate_limited = RetryPolicy::rate_limited();
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                if !e.is_retryable() || !policy.should_retry(attempt) {
                    return Err(e);
                }

                let message = e.to_string();
                let backoff = if message.contains("429") || message.contains("rate limit") {
                    rate_limited.calculate_backoff(attempt)
                } else {
                    policy.calculate_backoff(attempt)
                };
                warn!(
                    "{} failed (attempt {}/{}), retrying in {:?}: {}",
                    label, attempt, policy.max_attempts, backoff, e
                );
                tokio::time::sleep(backoff).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_retries_passes_through_fatal() {
        let mut calls = 0u32;
        let result: Result<(), ProviderError> = with_retries("probe", || {
            calls += 1;
            async { Err(ProviderError::UpstreamEmpty) }
        })
        .await;

        assert!(matches!(result, Err(ProviderError::UpstreamEmpty)));
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_with_retries_retries_transient() {
        let mut calls = 0u32;
        let result = with_retries("probe", || {
            calls += 1;
            let n = calls;
            async move {
                if n < 2 {
                    Err(ProviderError::Retryable("connection reset".to_string()))
                } else {
                    Ok(n)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result, 2);
    }

    #[test]
    fn test_service_roundtrip() {
        for service in [ScrapeService::Brightdata, ScrapeService::Dataforseo] {
            assert_eq!(service.topic().parse::<ScrapeService>().unwrap(), service);
        }
    }

    #[test]
    fn test_status_classification() {
        assert!(ProviderError::from_status(429, String::new()).is_retryable());
        assert!(ProviderError::from_status(503, String::new()).is_retryable());
        assert!(!ProviderError::from_status(400, String::new()).is_retryable());
        assert!(!ProviderError::from_status(404, String::new()).is_retryable());
    }
}
