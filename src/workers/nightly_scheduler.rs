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

use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::application::dto::queue_payload::{batch_size_for, PromptJob, ShardPayload};
use crate::config::settings::Settings;
use crate::domain::models::project::Project;
use crate::domain::models::prompt::Prompt;
use crate::domain::repositories::project_repository::ProjectRepository;
use crate::domain::repositories::prompt_repository::PromptRepository;
use crate::domain::repositories::user_settings_repository::UserSettingsRepository;
use crate::domain::services::llm_service::{LlmService, LlmServiceTrait};
use crate::providers::health::ProviderHealthController;
use crate::providers::traits::ScrapeService;
use crate::queue::task_queue::TaskQueue;

/// 调度器进程级单例锁
///
/// `try_acquire` 返回的守卫在所有退出路径上自动释放
pub struct NightlyLock {
    running: AtomicBool,
}

impl Default for NightlyLock {
    fn default() -> Self {
        Self::new()
    }
}

impl NightlyLock {
    pub fn new() -> Self {
        Self {
            running: AtomicBool::new(false),
        }
    }

    /// 尝试取锁，已被持有时返回None
    pub fn try_acquire(&self) -> Option<NightlyLockGuard<'_>> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            Some(NightlyLockGuard { lock: self })
        } else {
            None
        }
    }

    /// 当前是否有调度在运行
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// 锁守卫，Drop 时释放
pub struct NightlyLockGuard<'a> {
    lock: &'a NightlyLock,
}

impl Drop for NightlyLockGuard<'_> {
    fn drop(&mut self) {
        self.lock.running.store(false, Ordering::SeqCst);
    }
}

/// 夜间调度器
///
/// 按项目配置的频率（daily/weekly/monthly）重新入队启用的Prompt；
/// 夜间分片不挂批次、不发邮件、不走联网搜索
pub struct NightlyScheduler<P, R, U, Q>
where
    P: ProjectRepository + 'static,
    R: PromptRepository + 'static,
    U: UserSettingsRepository + 'static,
    Q: TaskQueue + 'static,
{
    project_repository: Arc<P>,
    prompt_repository: Arc<R>,
    user_settings_repository: Arc<U>,
    queue: Arc<Q>,
    health: Arc<ProviderHealthController>,
    settings: Arc<Settings>,
    lock: Arc<NightlyLock>,
}

impl<P, R, U, Q> NightlyScheduler<P, R, U, Q>
where
    P: ProjectRepository + Send + Sync,
    R: PromptRepository + Send + Sync,
    U: UserSettingsRepository + Send + Sync,
    Q: TaskQueue + Send + Sync,
{
    /// 创建新的调度器实例
    pub fn new(
        project_repository: Arc<P>,
        prompt_repository: Arc<R>,
        user_settings_repository: Arc<U>,
        queue: Arc<Q>,
        health: Arc<ProviderHealthController>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            project_repository,
            prompt_repository,
            user_settings_repository,
            queue,
            health,
            settings,
            lock: Arc::new(NightlyLock::new()),
        }
    }

    /// 注册cron任务并启动调度循环
    ///
    /// 配置的5段cron表达式前面补秒位；表达式非法时返回错误，
    /// 进程应以非零码退出
    pub async fn start(self: Arc<Self>) -> Result<JobScheduler> {
        let cron = format!("0 {}", self.settings.scheduler.cron.trim());
        info!("Nightly scheduler registered with cron '{}'", cron);

        let scheduler = JobScheduler::new().await?;
        let runner = self.clone();
        let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
            let runner = runner.clone();
            Box::pin(async move {
                if let Err(e) = runner.run_once().await {
                    error!("Nightly scheduler run failed: {}", e);
                }
            })
        })
        .context("invalid nightly cron expression")?;

        scheduler.add(job).await?;
        scheduler.start().await?;
        Ok(scheduler)
    }

    /// 执行一轮夜间调度
    pub async fn run_once(&self) -> Result<()> {
        let Some(_guard) = self.lock.try_acquire() else {
            warn!("Nightly scheduler already running, skipping this tick");
            return Ok(());
        };
        let run_started_at = Utc::now();
        info!("Nightly scheduler tick started");

        let Some(service) = self.health.get_active().await else {
            warn!("No scrape provider available, skipping nightly run");
            return Ok(());
        };

        let mut projects = self.project_repository.find_scheduled().await?;

        // 测试模式信封：收窄到指定的项目与用户
        if let Some((test_user, test_project)) = testing_filter() {
            projects.retain(|p| p.id == test_project && p.user_id == test_user);
            info!("TESTING_MODE active, {} project(s) retained", projects.len());
        }

        let due_projects: Vec<Project> = projects
            .into_iter()
            .filter(|p| p.is_due(run_started_at))
            .collect();
        if due_projects.is_empty() {
            info!("No projects due for nightly re-run");
            return Ok(());
        }

        // 按用户分组，每个用户只做一次密钥校验
        let mut by_user: BTreeMap<Uuid, Vec<Project>> = BTreeMap::new();
        for project in due_projects {
            by_user.entry(project.user_id).or_default().push(project);
        }

        for (user_id, user_projects) in by_user {
            let Some(openai_key) = self
                .user_settings_repository
                .find_openai_key(user_id)
                .await?
            else {
                // 没有密钥的用户静默跳过
                continue;
            };

            let llm = LlmService::new(
                openai_key.clone(),
                self.settings.openai.default_model.clone(),
                self.settings.openai.base_url.clone(),
            );
            if let Err(e) = llm.validate_key().await {
                warn!("Skipping user {}: key validation failed ({})", user_id, e);
                continue;
            }

            for project in user_projects {
                if let Err(e) = self
                    .enqueue_project(service, &project, &openai_key, run_started_at)
                    .await
                {
                    error!("Failed to enqueue project {}: {}", project.id, e);
                }
            }
        }

        info!("Nightly scheduler tick finished");
        Ok(())
    }

    /// 为一个项目入队全部启用的Prompt
    async fn enqueue_project(
        &self,
        service: ScrapeService,
        project: &Project,
        openai_key: &str,
        run_started_at: chrono::DateTime<Utc>,
    ) -> Result<()> {
        let prompts = self
            .prompt_repository
            .find_enabled_by_project(project.id)
            .await?;
        if prompts.is_empty() {
            return Ok(());
        }

        let size = batch_size_for(prompts.len());
        let total_batches = prompts.len().div_ceil(size) as i32;
        let shards: Vec<&[Prompt]> = prompts.chunks(size).collect();

        // 先盖运行时间戳：崩溃时宁可漏跑也不重跑
        self.project_repository
            .stamp_nightly_run(project.id, run_started_at)
            .await?;

        for (batch_number, shard) in shards.iter().enumerate() {
            let payload = ShardPayload {
                service,
                job_batch_id: None,
                batch_number: batch_number as i32,
                total_batches,
                user_id: project.user_id,
                project_id: project.id,
                email: None,
                openai_key: openai_key.to_string(),
                openai_model: self.settings.openai.default_model.clone(),
                web_search: false,
                country: shard.first().and_then(|p| p.country.clone()),
                brand_mentions: shard
                    .first()
                    .map(|p| p.brand_mentions.clone())
                    .unwrap_or_default(),
                domain_mentions: shard
                    .first()
                    .map(|p| p.domain_mentions.clone())
                    .unwrap_or_default(),
                prompts: shard
                    .iter()
                    .map(|p| PromptJob {
                        prompt_id: p.id,
                        tracking_result_id: None,
                        text: p.text.clone(),
                    })
                    .collect(),
                is_nightly: true,
                snapshot_id: None,
            };

            let payload_json = serde_json::to_value(&payload)?;
            if let Err(e) = self.queue.publish(service.topic(), payload_json).await {
                // 发布失败只记录，时间戳已盖上，同一周期内不会重跑
                error!(
                    "Failed to publish nightly shard {} for project {}: {}",
                    batch_number, project.id, e
                );
            }
        }

        info!(
            "Project {} queued {} nightly shard(s) on {}",
            project.id,
            shards.len(),
            service
        );
        Ok(())
    }
}

/// 读取测试模式信封
///
/// `TESTING_MODE` 与 `TEST_USER_ID`、`TEST_PROJECT_ID` 同时设置时生效
fn testing_filter() -> Option<(Uuid, Uuid)> {
    let testing = std::env::var("TESTING_MODE")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if !testing {
        return None;
    }

    let user = std::env::var("TEST_USER_ID").ok()?.parse().ok()?;
    let project = std::env::var("TEST_PROJECT_ID").ok()?.parse().ok()?;
    Some((user, project))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lock_exclusive() {
        let lock = NightlyLock::new();
        let guard = lock.try_acquire();
        assert!(guard.is_some());
        assert!(lock.is_running());

        // 持有期间二次取锁失败
        assert!(lock.try_acquire().is_none());

        drop(guard);
        assert!(!lock.is_running());
        assert!(lock.try_acquire().is_some());
    }

    #[test]
    fn test_lock_released_on_early_exit() {
        let lock = NightlyLock::new();
        {
            let _guard = lock.try_acquire().unwrap();
            // 提前返回路径
        }
        assert!(!lock.is_running());
    }
}
