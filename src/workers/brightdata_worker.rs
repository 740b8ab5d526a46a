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

use anyhow::Result;
use chrono::Utc;
use metrics::counter;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::application::dto::queue_payload::{PromptJob, ShardPayload};
use crate::config::settings::Settings;
use crate::domain::models::queue_message::QueueMessage;
use crate::domain::models::tracking_result::{Source, TrackingResult};
use crate::domain::models::volume::VolumeData;
use crate::domain::repositories::job_batch_repository::JobBatchRepository;
use crate::domain::repositories::tracking_result_repository::TrackingResultRepository;
use crate::domain::services::enrichment_service;
use crate::domain::services::llm_service::LlmService;
use crate::domain::services::notifier::Notifier;
use crate::providers::brightdata::{self, BrightDataClient, ScrapeInput, SnapshotState};
use crate::providers::traits::{with_retries, ProviderError, ScrapeService};
use crate::providers::volume_trends::VolumeTrendsClient;
use crate::queue::task_queue::TaskQueue;
use crate::utils::errors::FailureReason;
use crate::workers::shard_progress::{self, ShardOutcome};

/// 快照轮询间隔
const POLL_INTERVAL: Duration = Duration::from_secs(30);
/// 快照轮询的墙钟上限，超时按上游失败处理
const POLL_DEADLINE: Duration = Duration::from_secs(30 * 60);
/// 队列空轮询的休眠
const IDLE_SLEEP: Duration = Duration::from_secs(1);

/// Bright Data 派发工作器
///
/// 消费 brightdata 主题：触发整分片抓取，轮询快照，
/// 逐条富化并回写结果行
pub struct BrightDataWorker<B, T>
where
    B: JobBatchRepository + Send + Sync,
    T: TrackingResultRepository + Send + Sync,
{
    batch_repository: Arc<B>,
    result_repository: Arc<T>,
    client: Arc<BrightDataClient>,
    volume_client: Arc<VolumeTrendsClient>,
    notifier: Arc<dyn Notifier>,
    settings: Arc<Settings>,
    worker_id: Uuid,
}

impl<B, T> BrightDataWorker<B, T>
where
    B: JobBatchRepository + Send + Sync,
    T: TrackingResultRepository + Send + Sync,
{
    /// 创建新的工作器实例
    pub fn new(
        batch_repository: Arc<B>,
        result_repository: Arc<T>,
        client: Arc<BrightDataClient>,
        volume_client: Arc<VolumeTrendsClient>,
        notifier: Arc<dyn Notifier>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            batch_repository,
            result_repository,
            client,
            volume_client,
            notifier,
            settings,
            worker_id: Uuid::new_v4(),
        }
    }

    /// 运行工作器主循环
    pub async fn run<Q>(&self, queue: Arc<Q>)
    where
        Q: TaskQueue + Send + Sync,
    {
        info!("BrightData worker {} started", self.worker_id);

        loop {
            match queue
                .dequeue(ScrapeService::Brightdata.topic(), self.worker_id)
                .await
            {
                Ok(Some(message)) => {
                    if let Err(e) = self.process_message(queue.as_ref(), &message).await {
                        error!("Error processing message {}: {}", message.id, e);
                    }
                }
                Ok(None) => sleep(IDLE_SLEEP).await,
                Err(e) => {
                    error!("Error dequeuing message: {}", e);
                    sleep(IDLE_SLEEP).await;
                }
            }
        }
    }

    #[instrument(skip(self, queue, message), fields(message_id = %message.id))]
    async fn process_message<Q>(&self, queue: &Q, message: &QueueMessage) -> Result<()>
    where
        Q: TaskQueue + Send + Sync,
    {
        let payload = match serde_json::from_value::<ShardPayload>(message.payload.clone()) {
            Ok(payload) => payload,
            Err(e) => {
                // 载荷坏消息确认掉，避免毒丸循环
                error!("Failed to deserialize shard payload: {}", e);
                queue.complete(message.id).await?;
                return Ok(());
            }
        };

        // 服务标不符的消息直接确认丢弃
        if payload.service != ScrapeService::Brightdata {
            warn!(
                "Dropping message {} addressed to {}",
                message.id, payload.service
            );
            queue.complete(message.id).await?;
            return Ok(());
        }

        match self.process_shard(&payload).await {
            Ok(()) => {
                counter!("shards_processed_total", "service" => "brightdata").increment(1);
                queue.complete(message.id).await?;
            }
            Err(e) if e.is_retryable() => {
                warn!("Retryable upstream error, nacking message: {}", e);
                counter!("shards_retried_total", "service" => "brightdata").increment(1);
                queue.fail(message).await?;
            }
            Err(e) => {
                error!("Shard processing failed permanently: {}", e);
                counter!("shards_failed_total", "service" => "brightdata").increment(1);
                self.fail_shard(&payload, &e.to_string()).await;
                queue.complete(message.id).await?;
            }
        }

        Ok(())
    }

    /// 处理一个分片：触发、轮询、富化、回写
    async fn process_shard(&self, payload: &ShardPayload) -> Result<(), ProviderError> {
        let snapshot_id = match &payload.snapshot_id {
            Some(id) => id.clone(),
            None => {
                let inputs: Vec<ScrapeInput> = payload
                    .prompts
                    .iter()
                    .map(|job| {
                        ScrapeInput::new(
                            job.text.clone(),
                            job.prompt_id,
                            payload.country.clone(),
                            payload.web_search,
                        )
                    })
                    .collect();
                with_retries("brightdata trigger", || self.client.trigger_scrape(&inputs))
                    .await?
            }
        };
        info!("Snapshot {} triggered for shard {}", snapshot_id, payload.batch_number);

        // 把快照ID盖到结果行上作为相关令牌
        if !payload.is_nightly {
            for job in &payload.prompts {
                if let Some(result_id) = job.tracking_result_id {
                    if let Err(e) = self
                        .result_repository
                        .stamp_task_id(result_id, &snapshot_id)
                        .await
                    {
                        error!("Failed to stamp snapshot id on result {}: {}", result_id, e);
                    }
                }
            }
        }

        let entries = self.poll_snapshot(&snapshot_id).await?;

        if entries.is_empty() {
            return Err(ProviderError::UpstreamEmpty);
        }
        if entries.len() < payload.prompts.len() {
            warn!(
                "Snapshot {} returned {} entries for {} prompts",
                snapshot_id,
                entries.len(),
                payload.prompts.len()
            );
        }

        self.enrich_shard(payload, &entries).await;

        if let Err(e) = shard_progress::finalize_shard(
            self.batch_repository.as_ref(),
            self.result_repository.as_ref(),
            self.notifier.as_ref(),
            payload.job_batch_id,
            payload.batch_number,
            payload.is_nightly,
            ShardOutcome::Completed,
        )
        .await
        {
            error!("Failed to finalize shard: {}", e);
        }

        Ok(())
    }

    /// 每30秒轮询一次快照，30分钟墙钟上限
    async fn poll_snapshot(&self, snapshot_id: &str) -> Result<Vec<Value>, ProviderError> {
        let started = std::time::Instant::now();

        loop {
            match self.client.fetch_snapshot(snapshot_id).await {
                Ok(SnapshotState::Ready(entries)) => return Ok(entries),
                Ok(SnapshotState::Running) => {}
                // 轮询中的瞬时错误留在循环内消化，不触发重投
                Err(ProviderError::Retryable(e)) => {
                    warn!("Transient error polling snapshot {}: {}", snapshot_id, e);
                }
                Err(e) => return Err(e),
            }

            if started.elapsed() >= POLL_DEADLINE {
                return Err(ProviderError::UpstreamFailed(format!(
                    "snapshot {} still running after {} minutes",
                    snapshot_id,
                    POLL_DEADLINE.as_secs() / 60
                )));
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    /// 逐条匹配、富化并回写分片内的结果
    async fn enrich_shard(&self, payload: &ShardPayload, entries: &[Value]) {
        let llm = LlmService::new(
            payload.openai_key.clone(),
            payload.openai_model.clone(),
            self.settings.openai.base_url.clone(),
        );

        // 整个分片一次批量热度查询
        let texts: Vec<String> = payload.prompts.iter().map(|j| j.text.clone()).collect();
        let location_code = self.settings.dataforseo.default_location_code;
        let volumes: Vec<Option<VolumeData>> = match self
            .volume_client
            .batch_volumes(&texts, location_code)
            .await
        {
            Ok(volumes) => volumes,
            Err(e) => {
                warn!("Volume lookup failed for shard: {}", e);
                vec![None; payload.prompts.len()]
            }
        };

        let source = if payload.is_nightly {
            Source::BrightdataNightly
        } else {
            Source::Brightdata
        };

        for (job, volume) in payload.prompts.iter().zip(volumes.iter()) {
            let Some(entry) = find_entry(entries, job) else {
                info!("No snapshot entry for prompt {}", job.prompt_id);
                self.fail_prompt(payload, job, FailureReason::NoResponse).await;
                continue;
            };

            let normalized = brightdata::normalize_entry(entry);
            let enrichment = enrichment_service::enrich(
                &normalized,
                &payload.brand_mentions,
                &payload.domain_mentions,
                Utc::now(),
            );
            let (sentiment, salience) =
                enrichment_service::score_with_llm(&llm, &enrichment).await;

            let mut result = match self.load_or_build_result(payload, job).await {
                Some(result) => result,
                None => continue,
            };

            enrichment_service::apply_to_result(
                &mut result,
                &normalized,
                &enrichment,
                sentiment,
                salience,
                volume.as_ref(),
                location_code,
                source,
            );

            let write = if payload.is_nightly {
                self.result_repository.create(&result).await.map(|_| ())
            } else {
                self.result_repository.update(&result).await
            };
            if let Err(e) = write {
                error!("Failed to persist result {}: {}", result.id, e);
            }
        }
    }

    /// 非夜间读取既有行，夜间构造新行
    async fn load_or_build_result(
        &self,
        payload: &ShardPayload,
        job: &PromptJob,
    ) -> Option<TrackingResult> {
        if payload.is_nightly {
            return Some(TrackingResult::new_pending(
                job.prompt_id,
                job.text.clone(),
                payload.project_id,
                payload.user_id,
                None,
                payload.batch_number,
            ));
        }

        let result_id = job.tracking_result_id?;
        match self.result_repository.find_by_id(result_id).await {
            Ok(Some(result)) => Some(result),
            Ok(None) => {
                warn!("Tracking result {} disappeared", result_id);
                None
            }
            Err(e) => {
                error!("Failed to load tracking result {}: {}", result_id, e);
                None
            }
        }
    }

    async fn fail_prompt(&self, payload: &ShardPayload, job: &PromptJob, reason: FailureReason) {
        if payload.is_nightly {
            return;
        }
        let Some(result_id) = job.tracking_result_id else {
            return;
        };

        if let Err(e) = self
            .result_repository
            .mark_failed(result_id, reason.as_str())
            .await
        {
            error!("Failed to mark result {} failed: {}", result_id, e);
        }
    }

    /// 整个分片不可恢复失败：行置失败、计数、通知
    async fn fail_shard(&self, payload: &ShardPayload, reason: &str) {
        if let Some(batch_id) = payload.job_batch_id {
            if let Err(e) = self
                .result_repository
                .mark_shard_failed(batch_id, payload.batch_number, reason)
                .await
            {
                error!("Failed to mark shard rows failed: {}", e);
            }
        }

        if let Err(e) = shard_progress::finalize_shard(
            self.batch_repository.as_ref(),
            self.result_repository.as_ref(),
            self.notifier.as_ref(),
            payload.job_batch_id,
            payload.batch_number,
            payload.is_nightly,
            ShardOutcome::Failed(reason.to_string()),
        )
        .await
        {
            error!("Failed to finalize failed shard: {}", e);
        }
    }
}

/// 按相关ID匹配快照条目，退回文本相等匹配
fn find_entry<'a>(entries: &'a [Value], job: &PromptJob) -> Option<&'a Value> {
    entries
        .iter()
        .find(|entry| brightdata::entry_prompt_id(entry) == Some(job.prompt_id))
        .or_else(|| {
            entries.iter().find(|entry| {
                brightdata::entry_prompt_text(entry)
                    .map(|text| text.trim() == job.text.trim())
                    .unwrap_or(false)
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn job(text: &str) -> PromptJob {
        PromptJob {
            prompt_id: Uuid::new_v4(),
            tracking_result_id: Some(Uuid::new_v4()),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_find_entry_by_prompt_id() {
        let job = job("best crm");
        let entries = vec![
            json!({ "input": { "prompt_id": Uuid::new_v4().to_string(), "prompt": "other" } }),
            json!({ "input": { "prompt_id": job.prompt_id.to_string(), "prompt": "best crm" } }),
        ];

        let found = find_entry(&entries, &job).unwrap();
        assert_eq!(
            found["input"]["prompt_id"].as_str().unwrap(),
            job.prompt_id.to_string()
        );
    }

    #[test]
    fn test_find_entry_falls_back_to_text() {
        let job = job("best crm");
        let entries = vec![
            json!({ "prompt": "unrelated" }),
            json!({ "prompt": " best crm " }),
        ];

        assert!(find_entry(&entries, &job).is_some());
    }

    #[test]
    fn test_find_entry_missing() {
        let job = job("best crm");
        let entries = vec![json!({ "prompt": "unrelated" })];
        assert!(find_entry(&entries, &job).is_none());
    }
}
