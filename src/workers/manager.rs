// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use std::sync::Arc;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::settings::Settings;
use crate::domain::repositories::job_batch_repository::JobBatchRepository;
use crate::domain::repositories::tracking_result_repository::TrackingResultRepository;
use crate::domain::services::notifier::Notifier;
use crate::providers::brightdata::BrightDataClient;
use crate::providers::dataforseo::DataForSeoClient;
use crate::providers::volume_trends::VolumeTrendsClient;
use crate::queue::task_queue::TaskQueue;
use crate::workers::brightdata_worker::BrightDataWorker;
use crate::workers::dataforseo_worker::DataForSeoWorker;

/// 工作管理器
///
/// 为每个供应商主题启动若干派发工作器
pub struct WorkerManager<Q, B, T>
where
    Q: TaskQueue + 'static,
    B: JobBatchRepository + 'static,
    T: TrackingResultRepository + 'static,
{
    queue: Arc<Q>,
    batch_repository: Arc<B>,
    result_repository: Arc<T>,
    brightdata_client: Arc<BrightDataClient>,
    dataforseo_client: Arc<DataForSeoClient>,
    volume_client: Arc<VolumeTrendsClient>,
    notifier: Arc<dyn Notifier>,
    settings: Arc<Settings>,
    handles: Vec<JoinHandle<()>>,
}

impl<Q, B, T> WorkerManager<Q, B, T>
where
    Q: TaskQueue + Send + Sync,
    B: JobBatchRepository + Send + Sync,
    T: TrackingResultRepository + Send + Sync,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        queue: Arc<Q>,
        batch_repository: Arc<B>,
        result_repository: Arc<T>,
        brightdata_client: Arc<BrightDataClient>,
        dataforseo_client: Arc<DataForSeoClient>,
        volume_client: Arc<VolumeTrendsClient>,
        notifier: Arc<dyn Notifier>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            queue,
            batch_repository,
            result_repository,
            brightdata_client,
            dataforseo_client,
            volume_client,
            notifier,
            settings,
            handles: Vec::new(),
        }
    }

    /// 启动工作进程
    ///
    /// 每个供应商主题各启动 `count` 个消费者
    ///
    /// # 参数
    ///
    /// * `count` - 每个主题的工作进程数量
    pub async fn start_workers(&mut self, count: usize) {
        for _ in 0..count {
            let worker = BrightDataWorker::new(
                self.batch_repository.clone(),
                self.result_repository.clone(),
                self.brightdata_client.clone(),
                self.volume_client.clone(),
                self.notifier.clone(),
                self.settings.clone(),
            );
            let queue = self.queue.clone();
            let handle = tokio::spawn(async move {
                worker.run(queue).await;
            });
            self.handles.push(handle);

            let worker = DataForSeoWorker::new(
                self.batch_repository.clone(),
                self.result_repository.clone(),
                self.dataforseo_client.clone(),
                self.notifier.clone(),
                self.settings.clone(),
            );
            let queue = self.queue.clone();
            let handle = tokio::spawn(async move {
                worker.run(queue).await;
            });
            self.handles.push(handle);
        }

        info!("Started {} workers per provider topic", count);
    }

    /// 等待关闭信号并关闭工作进程
    ///
    /// 监听关闭信号并优雅地关闭所有工作进程；
    /// 在途消息由锁过期回收机制兜底重投
    pub async fn wait_for_shutdown(&mut self) {
        match signal::ctrl_c().await {
            Ok(()) => info!("Shutdown signal received"),
            Err(err) => error!("Unable to listen for shutdown signal: {}", err),
        }

        info!("Shutting down workers...");
        for handle in &self.handles {
            handle.abort();
        }

        info!("Workers shut down successfully");
    }
}
