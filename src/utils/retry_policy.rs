// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

/// 重试策略配置
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// 最大尝试次数
    pub max_attempts: u32,
    /// 初始退避时间
    pub initial_backoff: Duration,
    /// 最大退避时间
    pub max_backoff: Duration,
    /// 退避乘数
    pub backoff_multiplier: f64,
    /// 抖动因子 (0.0-1.0)
    pub jitter_factor: f64,
    /// 是否启用抖动
    pub enable_jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::standard()
    }
}

impl RetryPolicy {
    /// 通用外部调用策略：1s 起步，翻倍，封顶 10s
    pub fn standard() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
            enable_jitter: true,
        }
    }

    /// 限流（429）专用策略：2s 起步，翻倍，封顶 30s
    pub fn rate_limited() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(2),
            max_backoff: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
            enable_jitter: true,
        }
    }

    /// 计算第 attempt 次重试的退避时间 (attempt 从 1 开始)
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let backoff_secs = self.initial_backoff.as_secs_f64()
            * self.backoff_multiplier.powi(attempt.saturating_sub(1) as i32);

        let capped_backoff = backoff_secs.min(self.max_backoff.as_secs_f64());

        let final_backoff = if self.enable_jitter {
            let jitter_range = capped_backoff * self.jitter_factor;
            let jitter = rand::random_range(-jitter_range..=jitter_range);
            (capped_backoff + jitter).max(0.0)
        } else {
            capped_backoff
        };

        Duration::from_secs_f64(final_backoff)
    }

    /// 是否还应继续重试
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// 带退避的执行循环
    ///
    /// 对可重试错误按策略退避后重试，对不可重试错误立即返回。
    /// 429 错误切换到限流策略的退避曲线。
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> anyhow::Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let rate_limited = RetryPolicy::rate_limited();
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    if !is_retryable_error(&e) || !self.should_retry(attempt) {
                        return Err(e);
                    }

                    // 429 走更保守的退避曲线
                    let backoff = if is_rate_limit_error(&e) {
                        rate_limited.calculate_backoff(attempt)
                    } else {
                        self.calculate_backoff(attempt)
                    };

                    warn!(
                        "{} failed (attempt {}/{}), retrying in {:?}: {}",
                        label, attempt, self.max_attempts, backoff, e
                    );
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }
}

/// 判断错误是否可重试
pub fn is_retryable_error(error: &anyhow::Error) -> bool {
    let error_string = error.to_string().to_lowercase();

    // 网络相关错误可重试
    let retryable_patterns = [
        "timeout",
        "timed out",
        "connection reset",
        "connection refused",
        "dns error",
        "429",
        "500 internal server error",
        "502 bad gateway",
        "503 service unavailable",
        "504 gateway timeout",
        "network is unreachable",
        "broken pipe",
        "too many connections",
        "rate limit",
        "network",
    ];

    retryable_patterns.iter().any(|&p| error_string.contains(p))
}

/// 判断错误是否为限流错误
pub fn is_rate_limit_error(error: &anyhow::Error) -> bool {
    let error_string = error.to_string().to_lowercase();
    error_string.contains("429") || error_string.contains("rate limit")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_calculate_backoff_exponential() {
        let mut policy = RetryPolicy::standard();
        policy.enable_jitter = false; // 禁用抖动以获得精确值

        assert_eq!(policy.calculate_backoff(1), Duration::from_secs(1));
        assert_eq!(policy.calculate_backoff(2), Duration::from_secs(2));
        assert_eq!(policy.calculate_backoff(3), Duration::from_secs(4));
        assert_eq!(policy.calculate_backoff(4), Duration::from_secs(8));
    }

    #[test]
    fn test_calculate_backoff_caps_at_max() {
        let mut policy = RetryPolicy::standard();
        policy.enable_jitter = false;

        // 1 * 2^9 远超上限
        assert_eq!(policy.calculate_backoff(10), Duration::from_secs(10));
    }

    #[test]
    fn test_rate_limited_profile() {
        let mut policy = RetryPolicy::rate_limited();
        policy.enable_jitter = false;

        assert_eq!(policy.calculate_backoff(1), Duration::from_secs(2));
        assert_eq!(policy.calculate_backoff(2), Duration::from_secs(4));
        assert_eq!(policy.calculate_backoff(5), Duration::from_secs(30));
        assert_eq!(policy.calculate_backoff(8), Duration::from_secs(30));
    }

    #[test]
    fn test_should_retry() {
        let policy = RetryPolicy::standard();

        assert!(policy.should_retry(1));
        assert!(policy.should_retry(4));
        assert!(!policy.should_retry(5));
        assert!(!policy.should_retry(6));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(is_retryable_error(&anyhow::anyhow!("connection reset by peer")));
        assert!(is_retryable_error(&anyhow::anyhow!("HTTP 429 Too Many Requests")));
        assert!(is_retryable_error(&anyhow::anyhow!("request timed out")));
        assert!(!is_retryable_error(&anyhow::anyhow!("invalid payload shape")));
    }

    #[tokio::test]
    async fn test_run_gives_up_on_non_retryable() {
        let policy = RetryPolicy::standard();
        let mut calls = 0u32;
        let result: anyhow::Result<()> = policy
            .run("probe", || {
                calls += 1;
                async { Err(anyhow::anyhow!("invalid payload shape")) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_run_retries_then_succeeds() {
        let mut policy = RetryPolicy::standard();
        policy.initial_backoff = Duration::from_millis(1);
        policy.max_backoff = Duration::from_millis(2);

        let mut calls = 0u32;
        let result = policy
            .run("probe", || {
                calls += 1;
                let n = calls;
                async move {
                    if n < 3 {
                        Err(anyhow::anyhow!("connection reset"))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await
            .unwrap();

        assert_eq!(result, 3);
    }
}
