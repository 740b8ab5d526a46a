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

use axum::{
    extract::{Extension, Json},
    http::StatusCode,
    response::IntoResponse,
};
use std::sync::Arc;
use tracing::{error, info};

use crate::application::dto::enqueue_request::EnqueueRequestDto;
use crate::application::dto::enqueue_response::EnqueueResponseDto;
use crate::application::dto::queue_payload::{shard_counts, PromptJob, ShardPayload};
use crate::config::settings::Settings;
use crate::domain::models::job_batch::{JobBatch, JobBatchStatus};
use crate::domain::models::prompt::Prompt;
use crate::domain::models::tag::Tag;
use crate::domain::models::tracking_result::TrackingResult;
use crate::domain::repositories::job_batch_repository::JobBatchRepository;
use crate::domain::repositories::tag_repository::TagRepository;
use crate::domain::services::llm_service::{LlmService, LlmServiceTrait};
use crate::infrastructure::repositories::job_batch_repo_impl::JobBatchRepositoryImpl;
use crate::infrastructure::repositories::queue_repo_impl::QueueRepositoryImpl;
use crate::infrastructure::repositories::tag_repo_impl::TagRepositoryImpl;
use crate::presentation::errors::{ApiError, AppError};
use crate::providers::health::ProviderHealthController;
use crate::queue::task_queue::{PostgresTaskQueue, TaskQueue};

/// 提交Prompt批次
///
/// 校验、选供应商、落库、按分片扇出到队列。
/// 批次与结果行的插入是单个事务；分片发布是尽力而为，
/// 单个分片发布失败不回滚其余分片
pub async fn enqueue(
    Extension(batch_repository): Extension<Arc<JobBatchRepositoryImpl>>,
    Extension(tag_repository): Extension<Arc<TagRepositoryImpl>>,
    Extension(queue): Extension<Arc<PostgresTaskQueue<QueueRepositoryImpl>>>,
    Extension(health): Extension<Arc<ProviderHealthController>>,
    Extension(settings): Extension<Arc<Settings>>,
    Json(payload): Json<EnqueueRequestDto>,
) -> Result<impl IntoResponse, AppError> {
    // 1. 必填字段
    let project_id = payload
        .project
        .ok_or_else(|| ApiError::InvalidRequest("project is required".to_string()))?;
    let user_id = payload
        .user
        .ok_or_else(|| ApiError::InvalidRequest("user is required".to_string()))?;
    if payload.prompts.is_empty() {
        return Err(ApiError::InvalidRequest("at least one prompt is required".to_string()).into());
    }
    let openai_key = payload
        .openai_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| ApiError::InvalidRequest("openaiKey is required".to_string()))?;

    let openai_model = payload
        .openai_model
        .clone()
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| settings.openai.default_model.clone());

    // 2. 1-token 探针校验密钥与模型
    let llm = LlmService::new(
        openai_key.clone(),
        openai_model.clone(),
        settings.openai.base_url.clone(),
    );
    llm.validate_key().await.map_err(ApiError::from)?;

    // 3. 供应商选择，两个都挂直接503，不留任何记录
    let service = health.get_active().await.ok_or(ApiError::AllProvidersDown)?;

    let brand_mentions = payload.brand_mentions.clone().into_vec();
    let domain_mentions = payload.domain_mentions.clone().into_vec();

    // 4. 标签按项目范围不区分大小写地 upsert
    let mut tag_ids = Vec::with_capacity(payload.tags.len());
    for name in payload.tags.iter().filter(|n| !n.trim().is_empty()) {
        let tag = match tag_repository.find_by_name_ci(project_id, name.trim()).await? {
            Some(tag) => tag,
            None => {
                tag_repository
                    .create(&Tag::new(project_id, name.trim().to_string()))
                    .await?
            }
        };
        tag_ids.push(tag.id);
    }

    // 5. 分片尺寸
    let total_prompts = payload.prompts.len();
    let (shard_size, shard_count) = shard_counts(total_prompts);

    // 6. 单事务落库：批次 + Prompt + 待处理结果行
    let batch = JobBatch::new(
        user_id,
        project_id,
        payload.email.clone(),
        total_prompts as i32,
        shard_count as i32,
        openai_key.clone(),
        openai_model.clone(),
        payload.web_search,
        payload.geo.clone(),
        brand_mentions.clone(),
        domain_mentions.clone(),
        payload.tags.clone(),
    );

    let mut prompts = Vec::with_capacity(total_prompts);
    let mut results = Vec::with_capacity(total_prompts);
    for (index, text) in payload.prompts.iter().enumerate() {
        let prompt = Prompt::new(
            project_id,
            user_id,
            text.clone(),
            brand_mentions.clone(),
            domain_mentions.clone(),
            payload.geo.clone(),
        );
        let result = TrackingResult::new_pending(
            prompt.id,
            text.clone(),
            project_id,
            user_id,
            Some(batch.id),
            (index / shard_size) as i32,
        );
        prompts.push(prompt);
        results.push(result);
    }

    batch_repository
        .create_with_results(&batch, &prompts, &results)
        .await?;

    for prompt in &prompts {
        for tag_id in &tag_ids {
            if let Err(e) = tag_repository.link_prompt(*tag_id, prompt.id).await {
                error!("Failed to link tag {} to prompt {}: {}", tag_id, prompt.id, e);
            }
        }
    }

    // 7. 批次进入处理中
    batch_repository
        .update_status(batch.id, JobBatchStatus::Processing)
        .await?;

    // 8. 逐分片发布队列消息（尽力而为）
    for batch_number in 0..shard_count {
        let shard_start = batch_number * shard_size;
        let shard_end = (shard_start + shard_size).min(total_prompts);

        let shard_jobs: Vec<PromptJob> = (shard_start..shard_end)
            .map(|i| PromptJob {
                prompt_id: prompts[i].id,
                tracking_result_id: Some(results[i].id),
                text: prompts[i].text.clone(),
            })
            .collect();

        let shard_payload = ShardPayload {
            service,
            job_batch_id: Some(batch.id),
            batch_number: batch_number as i32,
            total_batches: shard_count as i32,
            user_id,
            project_id,
            email: payload.email.clone(),
            openai_key: openai_key.clone(),
            openai_model: openai_model.clone(),
            web_search: payload.web_search,
            country: payload.geo.clone(),
            brand_mentions: brand_mentions.clone(),
            domain_mentions: domain_mentions.clone(),
            prompts: shard_jobs,
            is_nightly: false,
            snapshot_id: None,
        };

        let payload_json = serde_json::to_value(&shard_payload)?;
        if let Err(e) = queue.publish(service.topic(), payload_json).await {
            // 发布失败的分片会留在 pending，由运维补偿
            error!(
                "Failed to publish shard {} of batch {}: {}",
                batch_number, batch.id, e
            );
        }
    }

    info!(
        "Batch {} accepted: {} prompts in {} shard(s) on {}",
        batch.id, total_prompts, shard_count, service
    );

    let response = EnqueueResponseDto {
        success: true,
        job_batch_id: batch.id,
        total_prompts: total_prompts as i32,
        total_batches: shard_count as i32,
        service: service.to_string(),
    };
    Ok((StatusCode::OK, Json(response)))
}
