// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use crate::domain::repositories::queue_repository::QueueRepository;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::{error, info};

/// 队列维护循环
///
/// 回收锁已过期的投递中消息，使崩溃工作器持有的分片可以被重投。
/// 这是队列 at-least-once 语义的另一半
pub struct QueueMaintenance<R: QueueRepository + 'static> {
    /// 队列仓库
    repository: Arc<R>,
}

impl<R: QueueRepository + 'static> QueueMaintenance<R> {
    /// 创建新的维护循环实例
    pub fn new(repository: Arc<R>) -> Self {
        Self { repository }
    }

    /// 启动维护后台任务
    ///
    /// # 返回值
    ///
    /// 返回后台任务的句柄
    pub fn start(&self) -> JoinHandle<()> {
        let repository = self.repository.clone();

        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(60)); // 每分钟检查一次

            loop {
                interval.tick().await;

                match repository.reclaim_expired().await {
                    Ok(count) => {
                        if count > 0 {
                            info!("Reclaimed {} expired queue messages", count);
                        }
                    }
                    Err(e) => {
                        error!("Failed to reclaim expired queue messages: {}", e);
                    }
                }
            }
        })
    }
}
