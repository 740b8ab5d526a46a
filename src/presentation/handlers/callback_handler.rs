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
    extract::{Extension, Json, Query},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::Utc;
use metrics::counter;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::application::dto::callback::CallbackContext;
use crate::config::settings::Settings;
use crate::domain::models::tracking_result::{Source, TrackingResult};
use crate::domain::repositories::job_batch_repository::JobBatchRepository;
use crate::domain::repositories::prompt_repository::PromptRepository;
use crate::domain::repositories::tracking_result_repository::TrackingResultRepository;
use crate::domain::repositories::user_settings_repository::UserSettingsRepository;
use crate::domain::services::enrichment_service;
use crate::domain::services::llm_service::LlmService;
use crate::domain::services::notifier::Notifier;
use crate::infrastructure::repositories::job_batch_repo_impl::JobBatchRepositoryImpl;
use crate::infrastructure::repositories::prompt_repo_impl::PromptRepositoryImpl;
use crate::infrastructure::repositories::tracking_result_repo_impl::TrackingResultRepositoryImpl;
use crate::infrastructure::repositories::user_settings_repo_impl::UserSettingsRepositoryImpl;
use crate::presentation::errors::AppError;
use crate::providers::dataforseo::{self, CallbackEnvelope, CallbackTask};
use crate::providers::volume_trends::VolumeTrendsClient;
use crate::workers::shard_progress::{self, ShardOutcome};

/// DataForSEO 结果回调
///
/// 查询串承载相关上下文；逻辑失败也回 200，只有真正意外的
/// 故障才回 4xx/5xx。迟到的失败回调不降级已完成的行
pub async fn dataforseo_callback(
    Query(context): Query<CallbackContext>,
    Extension(batch_repository): Extension<Arc<JobBatchRepositoryImpl>>,
    Extension(result_repository): Extension<Arc<TrackingResultRepositoryImpl>>,
    Extension(prompt_repository): Extension<Arc<PromptRepositoryImpl>>,
    Extension(user_settings_repository): Extension<Arc<UserSettingsRepositoryImpl>>,
    Extension(volume_client): Extension<Arc<VolumeTrendsClient>>,
    Extension(notifier): Extension<Arc<dyn Notifier>>,
    Extension(settings): Extension<Arc<Settings>>,
    Json(envelope): Json<CallbackEnvelope>,
) -> Result<impl IntoResponse, AppError> {
    let Some(task) = envelope.tasks.first() else {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(json!({ "success": false, "error": "callback carried no tasks" })),
        ));
    };
    info!(
        "Callback for task {} (status {}, nightly={})",
        task.id, task.status_code, context.is_nightly
    );
    counter!("scrape_callbacks_total", "service" => "dataforseo").increment(1);

    if context.is_nightly {
        handle_nightly_callback(
            &context,
            task,
            prompt_repository.as_ref(),
            result_repository.as_ref(),
            user_settings_repository.as_ref(),
            volume_client.as_ref(),
            settings.as_ref(),
        )
        .await?;
        return Ok((StatusCode::OK, Json(json!({ "success": true }))));
    }

    // 常规路径：按任务ID找到派发时盖章的行
    let Some(result) = result_repository.find_by_task_id(&task.id).await? else {
        warn!("No tracking result for task {}", task.id);
        return Ok((
            StatusCode::NOT_FOUND,
            Json(json!({ "success": false, "error": "unknown task id" })),
        ));
    };
    let result_id = result.id;
    let job_batch_id = result.job_batch_id;
    let batch_number = result.batch_number;

    if task.is_success() {
        fulfil_result(
            result,
            task,
            &context,
            batch_repository.as_ref(),
            result_repository.as_ref(),
            volume_client.as_ref(),
            settings.as_ref(),
        )
        .await?;
    } else {
        // 迟到失败保护：已完成的行保持不变，照常 200
        let wrote = result_repository
            .mark_failed(
                result_id,
                &format!(
                    "upstream reported failure (status {}): {}",
                    task.status_code,
                    task.status_message.as_deref().unwrap_or("")
                ),
            )
            .await?;
        if !wrote {
            info!(
                "Late failure callback for fulfilled result {}, ignoring",
                result_id
            );
            return Ok((StatusCode::OK, Json(json!({ "success": true }))));
        }
    }

    // 分片内全部到达终态后推进批次计数
    if let Some(batch_id) = job_batch_id {
        let unfinished = result_repository
            .count_unfinished_in_shard(batch_id, batch_number)
            .await?;
        if unfinished == 0 {
            let outcome = if result_repository
                .exists_fulfilled_in_shard(batch_id, batch_number)
                .await?
            {
                ShardOutcome::Completed
            } else {
                ShardOutcome::Failed("all prompts in shard failed".to_string())
            };

            if let Err(e) = shard_progress::finalize_shard(
                batch_repository.as_ref(),
                result_repository.as_ref(),
                notifier.as_ref(),
                Some(batch_id),
                batch_number,
                false,
                outcome,
            )
            .await
            {
                error!("Failed to finalize shard after callback: {}", e);
            }
        }
    }

    Ok((StatusCode::OK, Json(json!({ "success": true }))))
}

/// 常规回调：富化并把既有行写为完成
async fn fulfil_result(
    mut result: TrackingResult,
    task: &CallbackTask,
    context: &CallbackContext,
    batch_repository: &JobBatchRepositoryImpl,
    result_repository: &TrackingResultRepositoryImpl,
    volume_client: &VolumeTrendsClient,
    settings: &Settings,
) -> Result<(), AppError> {
    let Some(callback_result) = task.result.as_ref().and_then(|r| r.first()) else {
        return Ok(());
    };
    let normalized = dataforseo::normalize_callback(callback_result);

    // 品牌/域名快照与密钥取自所属批次
    let batch = match result.job_batch_id {
        Some(batch_id) => batch_repository.find_by_id(batch_id).await?,
        None => None,
    };
    let (brand_mentions, domain_mentions, openai_key, openai_model) = match &batch {
        Some(batch) => (
            batch.brand_mentions.clone(),
            batch.domain_mentions.clone(),
            batch.openai_key.clone(),
            batch.openai_model.clone(),
        ),
        None => (
            Vec::new(),
            Vec::new(),
            String::new(),
            context
                .openai_model
                .clone()
                .unwrap_or_else(|| settings.openai.default_model.clone()),
        ),
    };

    let enrichment =
        enrichment_service::enrich(&normalized, &brand_mentions, &domain_mentions, Utc::now());

    let llm = LlmService::new(openai_key, openai_model, settings.openai.base_url.clone());
    let (sentiment, salience) = enrichment_service::score_with_llm(&llm, &enrichment).await;

    let location_code = settings.dataforseo.default_location_code;
    let volume = match volume_client
        .batch_volumes(std::slice::from_ref(&result.prompt_text), location_code)
        .await
    {
        Ok(mut volumes) => volumes.pop().flatten(),
        Err(e) => {
            warn!("Volume lookup failed for callback: {}", e);
            None
        }
    };

    enrichment_service::apply_to_result(
        &mut result,
        &normalized,
        &enrichment,
        sentiment,
        salience,
        volume.as_ref(),
        location_code,
        Source::Dataforseo,
    );

    result_repository.update(&result).await?;
    Ok(())
}

/// 夜间回调：没有预置行，成功时新建并插入
async fn handle_nightly_callback(
    context: &CallbackContext,
    task: &CallbackTask,
    prompt_repository: &PromptRepositoryImpl,
    result_repository: &TrackingResultRepositoryImpl,
    user_settings_repository: &UserSettingsRepositoryImpl,
    volume_client: &VolumeTrendsClient,
    settings: &Settings,
) -> Result<(), AppError> {
    if !task.is_success() {
        // 失败的夜间任务不产生行
        info!("Nightly task {} failed upstream, no row created", task.id);
        return Ok(());
    }

    let Some(prompt_id) = context.prompt_id else {
        warn!("Nightly callback without promptId, dropping");
        return Ok(());
    };
    let Some(prompt) = prompt_repository.find_by_id(prompt_id).await? else {
        warn!("Nightly callback for unknown prompt {}", prompt_id);
        return Ok(());
    };

    let Some(callback_result) = task.result.as_ref().and_then(|r| r.first()) else {
        return Ok(());
    };
    let normalized = dataforseo::normalize_callback(callback_result);

    let enrichment = enrichment_service::enrich(
        &normalized,
        &prompt.brand_mentions,
        &prompt.domain_mentions,
        Utc::now(),
    );

    let openai_key = user_settings_repository
        .find_openai_key(context.user_id)
        .await?
        .unwrap_or_default();
    let openai_model = context
        .openai_model
        .clone()
        .unwrap_or_else(|| settings.openai.default_model.clone());
    let llm = LlmService::new(openai_key, openai_model, settings.openai.base_url.clone());
    let (sentiment, salience) = enrichment_service::score_with_llm(&llm, &enrichment).await;

    let location_code = settings.dataforseo.default_location_code;
    let volume = match volume_client
        .batch_volumes(std::slice::from_ref(&prompt.text), location_code)
        .await
    {
        Ok(mut volumes) => volumes.pop().flatten(),
        Err(e) => {
            warn!("Volume lookup failed for nightly callback: {}", e);
            None
        }
    };

    let mut result = TrackingResult::new_pending(
        prompt.id,
        prompt.text.clone(),
        context.project_id.unwrap_or(prompt.project_id),
        context.user_id,
        None,
        0,
    );
    result.external_task_id = Some(task.id.clone());

    enrichment_service::apply_to_result(
        &mut result,
        &normalized,
        &enrichment,
        sentiment,
        salience,
        volume.as_ref(),
        location_code,
        Source::DataforseoNightly,
    );

    result_repository.create(&result).await?;
    info!("Nightly result {} inserted for prompt {}", result.id, prompt.id);
    Ok(())
}
