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
use std::collections::BTreeMap;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::domain::models::job_batch::JobBatchStatus;
use crate::domain::repositories::job_batch_repository::JobBatchRepository;
use crate::domain::repositories::tracking_result_repository::TrackingResultRepository;
use crate::domain::services::notifier::{EmailKind, Notifier};

/// 分片处理的最终结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShardOutcome {
    /// 分片处理成功
    Completed,
    /// 分片处理失败，携带简短原因
    Failed(String),
}

/// 推进批次状态机并发出分片通知
///
/// 约束（重投安全）：
/// * 先读当前计数，`completed + failed >= total` 时跳过递增，
///   重复投递不会二次计数
/// * 递增由存储层线性化；使本轮计数凑满总数的那一次写终态
/// * 每个分片恰好发出一封通知，以 (批次ID, 分片号) 为键；
///   成功通知额外检查分片内存在已完成行
/// * 夜间分片没有批次，直接跳过
#[allow(clippy::too_many_arguments)]
pub async fn finalize_shard(
    batch_repo: &dyn JobBatchRepository,
    result_repo: &dyn TrackingResultRepository,
    notifier: &dyn Notifier,
    job_batch_id: Option<Uuid>,
    batch_number: i32,
    is_nightly: bool,
    outcome: ShardOutcome,
) -> Result<()> {
    // 夜间任务没有批次聚合，也从不发邮件
    let Some(batch_id) = job_batch_id else {
        return Ok(());
    };
    if is_nightly {
        return Ok(());
    }

    let Some(batch) = batch_repo.find_by_id(batch_id).await? else {
        warn!("Job batch {} not found while finalizing shard", batch_id);
        return Ok(());
    };

    // 重投保护：所有分片都已计数时直接跳过
    if batch.all_shards_accounted() {
        info!(
            "Batch {} already fully accounted ({}+{}/{}), skipping increment for shard {}",
            batch_id,
            batch.completed_batches,
            batch.failed_batches,
            batch.total_batches,
            batch_number
        );
        return Ok(());
    }

    let progress = match &outcome {
        ShardOutcome::Completed => batch_repo.increment_completed(batch_id).await?,
        ShardOutcome::Failed(reason) => {
            if let Err(e) = batch_repo.set_error(batch_id, reason).await {
                warn!("Failed to record batch error message: {}", e);
            }
            batch_repo.increment_failed(batch_id).await?
        }
    };

    if progress.completed_batches + progress.failed_batches == batch.total_batches {
        let terminal = JobBatchStatus::terminal_from_counts(
            progress.completed_batches,
            progress.failed_batches,
        );
        batch_repo.set_terminal(batch_id, terminal).await?;
        info!(
            "Batch {} reached terminal status {} ({}/{} shards ok)",
            batch_id, terminal, progress.completed_batches, batch.total_batches
        );
    }

    // 通知：递增成功即本分片首次计数，保证每分片恰好一封
    let Some(email) = batch.email.clone() else {
        return Ok(());
    };

    let mut vars: BTreeMap<String, String> = BTreeMap::new();
    vars.insert("job_batch_id".to_string(), batch_id.to_string());
    vars.insert("batch_number".to_string(), (batch_number + 1).to_string());
    vars.insert("total_batches".to_string(), batch.total_batches.to_string());
    vars.insert("total_prompts".to_string(), batch.total_prompts.to_string());

    let kind = match &outcome {
        ShardOutcome::Completed => {
            // 成功邮件按分片相关ID去重，防回调重试造成重复
            let has_results = result_repo
                .exists_fulfilled_in_shard(batch_id, batch_number)
                .await?;
            if !has_results {
                warn!(
                    "Shard {}/{} completed without fulfilled rows, skipping success email",
                    batch_id, batch_number
                );
                return Ok(());
            }
            EmailKind::Succeeded
        }
        ShardOutcome::Failed(reason) => {
            vars.insert("reason".to_string(), reason.clone());
            EmailKind::Failed
        }
    };

    if let Err(e) = notifier.send(kind, &email, &vars).await {
        error!(
            "Failed to send {} email for shard {}/{}: {}",
            kind, batch_id, batch_number, e
        );
    }

    Ok(())
}
