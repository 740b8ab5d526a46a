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
use metrics::counter;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::application::dto::callback::CallbackContext;
use crate::application::dto::queue_payload::ShardPayload;
use crate::config::settings::Settings;
use crate::domain::models::job_batch::JobBatchStatus;
use crate::domain::models::queue_message::QueueMessage;
use crate::domain::repositories::job_batch_repository::JobBatchRepository;
use crate::domain::repositories::tracking_result_repository::TrackingResultRepository;
use crate::domain::services::notifier::{EmailKind, Notifier};
use crate::providers::dataforseo::{DataForSeoClient, LlmTaskRequest};
use crate::providers::traits::{with_retries, ProviderError, ScrapeService};
use crate::queue::task_queue::TaskQueue;
use crate::utils::errors::FailureReason;

/// 同分片相邻两次任务提交的间隔，避让上游限流
const SUBMISSION_SPACER: Duration = Duration::from_secs(1);
/// 队列空轮询的休眠
const IDLE_SLEEP: Duration = Duration::from_secs(1);

/// DataForSEO 派发工作器
///
/// 消费 dataforseo 主题：为分片内每条 Prompt 提交一个带
/// postback 地址的任务；结果由回调处理器落库
pub struct DataForSeoWorker<B, T>
where
    B: JobBatchRepository + Send + Sync,
    T: TrackingResultRepository + Send + Sync,
{
    batch_repository: Arc<B>,
    result_repository: Arc<T>,
    client: Arc<DataForSeoClient>,
    notifier: Arc<dyn Notifier>,
    settings: Arc<Settings>,
    worker_id: Uuid,
}

impl<B, T> DataForSeoWorker<B, T>
where
    B: JobBatchRepository + Send + Sync,
    T: TrackingResultRepository + Send + Sync,
{
    /// 创建新的工作器实例
    pub fn new(
        batch_repository: Arc<B>,
        result_repository: Arc<T>,
        client: Arc<DataForSeoClient>,
        notifier: Arc<dyn Notifier>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            batch_repository,
            result_repository,
            client,
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
        info!("DataForSEO worker {} started", self.worker_id);

        loop {
            match queue
                .dequeue(ScrapeService::Dataforseo.topic(), self.worker_id)
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
                error!("Failed to deserialize shard payload: {}", e);
                queue.complete(message.id).await?;
                return Ok(());
            }
        };

        if payload.service != ScrapeService::Dataforseo {
            warn!(
                "Dropping message {} addressed to {}",
                message.id, payload.service
            );
            queue.complete(message.id).await?;
            return Ok(());
        }

        match self.submit_shard(&payload).await {
            Ok(()) => {
                queue.complete(message.id).await?;
            }
            Err(e) if e.is_retryable() => {
                warn!("Retryable upstream error, nacking message: {}", e);
                queue.fail(message).await?;
            }
            Err(e) => {
                error!("Shard submission failed permanently: {}", e);
                self.fail_unsubmitted(&payload, &e.to_string()).await;
                queue.complete(message.id).await?;
            }
        }

        Ok(())
    }

    /// 为分片内每条 Prompt 提交一个抓取任务
    async fn submit_shard(&self, payload: &ShardPayload) -> Result<(), ProviderError> {
        let location_name = payload.country.as_ref().map(|c| country_to_location(c));

        for (index, job) in payload.prompts.iter().enumerate() {
            if index > 0 {
                // 同一分片内限速提交
                sleep(SUBMISSION_SPACER).await;
            }

            let context = CallbackContext {
                user_id: payload.user_id,
                openai_model: Some(payload.openai_model.clone()),
                is_nightly: payload.is_nightly,
                prompt_id: Some(job.prompt_id),
                project_id: Some(payload.project_id),
            };
            let postback_url = format!(
                "{}/api/dataforseo/callback?{}",
                self.settings.app.url.trim_end_matches('/'),
                context.to_query()
            );

            let request = LlmTaskRequest {
                user_prompt: job.text.clone(),
                llm_model_name: payload.openai_model.clone(),
                web_search: payload.web_search,
                location_name: location_name.clone(),
                postback_url,
            };

            let task_id =
                with_retries("dataforseo task_post", || self.client.post_llm_task(&request))
                    .await?;
            info!("Task {} submitted for prompt {}", task_id, job.prompt_id);
            counter!("scrape_tasks_submitted_total", "service" => "dataforseo").increment(1);

            // 夜间任务没有既有行，任务ID本身就是唯一的相关令牌
            if !payload.is_nightly {
                if let Some(result_id) = job.tracking_result_id {
                    if let Err(e) = self
                        .result_repository
                        .stamp_task_id(result_id, &task_id)
                        .await
                    {
                        error!("Failed to stamp task id on result {}: {}", result_id, e);
                    }
                }
            }
        }

        if !payload.is_nightly {
            if let Some(batch_id) = payload.job_batch_id {
                if let Err(e) = self
                    .batch_repository
                    .update_status(batch_id, JobBatchStatus::Processing)
                    .await
                {
                    error!("Failed to move batch {} to processing: {}", batch_id, e);
                }
            }
            self.send_submitted_email(payload).await;
        }

        Ok(())
    }

    async fn send_submitted_email(&self, payload: &ShardPayload) {
        let Some(email) = &payload.email else {
            return;
        };

        let mut vars: BTreeMap<String, String> = BTreeMap::new();
        if let Some(batch_id) = payload.job_batch_id {
            vars.insert("job_batch_id".to_string(), batch_id.to_string());
        }
        vars.insert(
            "batch_number".to_string(),
            (payload.batch_number + 1).to_string(),
        );
        vars.insert(
            "total_batches".to_string(),
            payload.total_batches.to_string(),
        );
        vars.insert(
            "prompt_count".to_string(),
            payload.prompts.len().to_string(),
        );

        if let Err(e) = self.notifier.send(EmailKind::Submitted, email, &vars).await {
            error!("Failed to send submitted email: {}", e);
        }
    }

    /// 提交阶段不可恢复失败：把尚未拿到任务ID的行置为失败
    async fn fail_unsubmitted(&self, payload: &ShardPayload, reason: &str) {
        if payload.is_nightly {
            return;
        }

        for job in &payload.prompts {
            let Some(result_id) = job.tracking_result_id else {
                continue;
            };
            match self.result_repository.find_by_id(result_id).await {
                Ok(Some(result)) if result.external_task_id.is_none() => {
                    if let Err(e) = self
                        .result_repository
                        .mark_failed(
                            result_id,
                            FailureReason::Other(reason.to_string()).as_str(),
                        )
                        .await
                    {
                        error!("Failed to mark result {} failed: {}", result_id, e);
                    }
                }
                Ok(_) => {}
                Err(e) => error!("Failed to load result {}: {}", result_id, e),
            }
        }
    }
}

/// 地区代码转 DataForSEO 的 location_name
fn country_to_location(country: &str) -> String {
    match country.to_uppercase().as_str() {
        "US" => "United States".to_string(),
        "GB" | "UK" => "United Kingdom".to_string(),
        "DE" => "Germany".to_string(),
        "FR" => "France".to_string(),
        "CA" => "Canada".to_string(),
        "AU" => "Australia".to_string(),
        _ => country.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_country_to_location() {
        assert_eq!(country_to_location("us"), "United States");
        assert_eq!(country_to_location("UK"), "United Kingdom");
        assert_eq!(country_to_location("Sweden"), "Sweden");
    }
}
