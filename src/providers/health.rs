// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::config::settings::Settings;
use crate::providers::traits::ScrapeService;

/// 探测间隔
const PROBE_INTERVAL: Duration = Duration::from_secs(60);
/// 单次探测超时
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// 一轮探测的结果
#[derive(Debug, Clone, Copy)]
pub struct ProviderHealth {
    /// 最近一次探测时间
    pub last_checked: DateTime<Utc>,
    /// 当前活跃供应商，两者都不可用时为空
    pub active: Option<ScrapeService>,
    /// Bright Data 探测结果
    pub brightdata_healthy: bool,
    /// DataForSEO 探测结果
    pub dataforseo_healthy: bool,
}

/// 供应商健康选择控制器
///
/// 单写者（探测循环）多读者；读者只读最近一次提交的探测结果，
/// 陈旧度由探测间隔界定。首个调用方会阻塞在初始探测上
pub struct ProviderHealthController {
    client: reqwest::Client,
    brightdata_health_url: String,
    dataforseo_health_url: String,
    cache: RwLock<Option<ProviderHealth>>,
}

impl ProviderHealthController {
    /// 创建新的健康控制器
    pub fn new(settings: &Settings) -> Self {
        Self {
            client: reqwest::Client::new(),
            brightdata_health_url: settings.brightdata.health_url.clone(),
            dataforseo_health_url: settings.dataforseo.health_url.clone(),
            cache: RwLock::new(None),
        }
    }

    /// 获取当前活跃供应商
    ///
    /// 首次调用阻塞到初始探测完成；之后读取缓存，O(1)。
    /// 返回值保证不会是最近一次探测失败的供应商
    pub async fn get_active(&self) -> Option<ScrapeService> {
        if let Some(health) = *self.cache.read().await {
            return health.active;
        }

        self.probe_all().await.active
    }

    /// 探测两个供应商并刷新缓存
    ///
    /// 偏好顺序：DataForSEO 优先，其次 Bright Data，先健康者当选
    pub async fn probe_all(&self) -> ProviderHealth {
        let (dataforseo_healthy, brightdata_healthy) = futures::future::join(
            self.probe(&self.dataforseo_health_url),
            self.probe(&self.brightdata_health_url),
        )
        .await;

        let active = if dataforseo_healthy {
            Some(ScrapeService::Dataforseo)
        } else if brightdata_healthy {
            Some(ScrapeService::Brightdata)
        } else {
            None
        };

        let health = ProviderHealth {
            last_checked: Utc::now(),
            active,
            brightdata_healthy,
            dataforseo_healthy,
        };

        if active.is_none() {
            warn!("All scrape providers failed their health probes");
        }

        *self.cache.write().await = Some(health);
        health
    }

    /// 单个端点的健康探测
    ///
    /// 2xx 与 429 视为健康（429 = 被限流但存活）
    async fn probe(&self, url: &str) -> bool {
        match self
            .client
            .get(url)
            .timeout(PROBE_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => {
                let status = response.status();
                status.is_success() || status.as_u16() == 429
            }
            Err(e) => {
                warn!("Health probe for {} failed: {}", url, e);
                false
            }
        }
    }

    /// 启动后台探测循环
    pub fn start(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(PROBE_INTERVAL);

            loop {
                interval.tick().await;
                let health = self.probe_all().await;
                info!(
                    "Provider probe: dataforseo={} brightdata={} active={:?}",
                    health.dataforseo_healthy, health.brightdata_healthy, health.active
                );
            }
        })
    }
}
