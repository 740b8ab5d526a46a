// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use axum::Extension;
use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use trackrs::config::settings::Settings;
use trackrs::domain::services::notifier::Notifier;
use trackrs::infrastructure::database::connection;
use trackrs::infrastructure::email::mailgun::MailgunNotifier;
use trackrs::infrastructure::repositories::job_batch_repo_impl::JobBatchRepositoryImpl;
use trackrs::infrastructure::repositories::project_repo_impl::ProjectRepositoryImpl;
use trackrs::infrastructure::repositories::prompt_repo_impl::PromptRepositoryImpl;
use trackrs::infrastructure::repositories::queue_repo_impl::QueueRepositoryImpl;
use trackrs::infrastructure::repositories::tag_repo_impl::TagRepositoryImpl;
use trackrs::infrastructure::repositories::tracking_result_repo_impl::TrackingResultRepositoryImpl;
use trackrs::infrastructure::repositories::user_settings_repo_impl::UserSettingsRepositoryImpl;
use trackrs::presentation::handlers::{callback_handler, enqueue_handler, snapshot_handler};
use trackrs::presentation::routes;
use trackrs::providers::brightdata::BrightDataClient;
use trackrs::providers::dataforseo::DataForSeoClient;
use trackrs::providers::health::ProviderHealthController;
use trackrs::providers::volume_trends::VolumeTrendsClient;
use trackrs::queue::maintenance::QueueMaintenance;
use trackrs::queue::task_queue::PostgresTaskQueue;
use trackrs::utils::telemetry;
use trackrs::workers::manager::WorkerManager;
use trackrs::workers::nightly_scheduler::NightlyScheduler;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. 初始化日志系统
    telemetry::init_telemetry();
    info!("Starting trackrs...");

    // 2. 加载应用程序配置
    let settings = Arc::new(Settings::new()?);
    info!("Configuration loaded");

    // 3. 建立数据库连接
    let db = Arc::new(connection::create_pool(&settings.database).await?);
    info!("Database connection established");

    // 4. 初始化核心组件
    let batch_repo = Arc::new(JobBatchRepositoryImpl::new(db.clone()));
    let result_repo = Arc::new(TrackingResultRepositoryImpl::new(db.clone()));
    let prompt_repo = Arc::new(PromptRepositoryImpl::new(db.clone()));
    let project_repo = Arc::new(ProjectRepositoryImpl::new(db.clone()));
    let tag_repo = Arc::new(TagRepositoryImpl::new(db.clone()));
    let user_settings_repo = Arc::new(UserSettingsRepositoryImpl::new(db.clone()));
    let queue_repo = Arc::new(QueueRepositoryImpl::new(db.clone()));
    let queue = Arc::new(PostgresTaskQueue::new(
        queue_repo.clone(),
        settings.queue.lock_duration_seconds,
        settings.queue.max_retries,
    ));

    let brightdata_client = Arc::new(BrightDataClient::new(&settings.brightdata));
    let dataforseo_client = Arc::new(DataForSeoClient::new(&settings.dataforseo));
    let volume_client = Arc::new(VolumeTrendsClient::new(&settings.dataforseo));
    let notifier: Arc<dyn Notifier> = Arc::new(MailgunNotifier::new(&settings.email));
    let health = Arc::new(ProviderHealthController::new(&settings));

    // 5. 根据启动参数选择服务类型
    let args: Vec<String> = std::env::args().collect();
    let service_type = args.get(1).map(String::as_str).unwrap_or("api");

    match service_type {
        "api" => {
            info!("Starting API service...");

            let _probe_handle = health.clone().start();

            let public_routes = Router::new()
                .route("/health", get(routes::health_check))
                .route("/v1/version", get(routes::version));

            let app = Router::new()
                .merge(public_routes)
                .route("/enqueue", post(enqueue_handler::enqueue))
                .route(
                    "/api/dataforseo/callback",
                    post(callback_handler::dataforseo_callback),
                )
                .route(
                    "/snapshot-data/{snapshot_id}",
                    get(snapshot_handler::get_snapshot_data),
                )
                .layer(Extension(batch_repo))
                .layer(Extension(result_repo))
                .layer(Extension(prompt_repo))
                .layer(Extension(tag_repo))
                .layer(Extension(user_settings_repo))
                .layer(Extension(queue))
                .layer(Extension(brightdata_client))
                .layer(Extension(volume_client))
                .layer(Extension(notifier))
                .layer(Extension(health))
                .layer(Extension(settings.clone()));

            let addr = format!("{}:{}", settings.server.host, settings.server.port);
            let listener = TcpListener::bind(&addr).await?;
            info!("Server listening on {}", addr);
            axum::serve(listener, app).await?;
        }
        "worker" => {
            info!("Starting Worker service...");

            // 锁过期回收是队列 at-least-once 语义的一部分
            let maintenance = QueueMaintenance::new(queue_repo.clone());
            let _maintenance_handle = maintenance.start();

            let mut worker_manager = WorkerManager::new(
                queue.clone(),
                batch_repo.clone(),
                result_repo.clone(),
                brightdata_client.clone(),
                dataforseo_client.clone(),
                volume_client.clone(),
                notifier.clone(),
                settings.clone(),
            );

            worker_manager
                .start_workers(settings.queue.workers_per_topic)
                .await;
            worker_manager.wait_for_shutdown().await;
        }
        "scheduler" => {
            info!("Starting Scheduler service...");

            let scheduler = Arc::new(NightlyScheduler::new(
                project_repo.clone(),
                prompt_repo.clone(),
                user_settings_repo.clone(),
                queue.clone(),
                health.clone(),
                settings.clone(),
            ));

            // cron 表达式非法时以非零码退出
            let _job_scheduler = match scheduler.start().await {
                Ok(handle) => handle,
                Err(e) => {
                    error!("Failed to start nightly scheduler: {}", e);
                    std::process::exit(1);
                }
            };

            tokio::signal::ctrl_c().await?;
            info!("Scheduler shutting down");
        }
        _ => {
            error!(
                "Invalid service type: '{}'. Use 'api', 'worker' or 'scheduler'.",
                service_type
            );
            std::process::exit(1);
        }
    }

    Ok(())
}
