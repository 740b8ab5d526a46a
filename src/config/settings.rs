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

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// 应用程序配置设置
///
/// 包含数据库、供应商凭据、邮件、调度器与队列等所有配置项
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// 数据库配置
    pub database: DatabaseSettings,
    /// 服务器配置
    pub server: ServerSettings,
    /// Bright Data 供应商配置
    pub brightdata: BrightDataSettings,
    /// DataForSEO 供应商配置
    pub dataforseo: DataForSeoSettings,
    /// OpenAI 配置
    pub openai: OpenAiSettings,
    /// 邮件通知配置
    pub email: EmailSettings,
    /// 夜间调度器配置
    pub scheduler: SchedulerSettings,
    /// 队列配置
    pub queue: QueueSettings,
    /// 应用外部地址配置
    pub app: AppSettings,
}

/// 数据库配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    /// 数据库连接URL
    pub url: String,
    /// 最大连接数
    pub max_connections: Option<u32>,
    /// 最小连接数
    pub min_connections: Option<u32>,
    /// 连接超时时间（秒）
    pub connect_timeout: Option<u64>,
    /// 空闲连接超时时间（秒）
    pub idle_timeout: Option<u64>,
}

/// 服务器配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// 服务器监听主机地址
    pub host: String,
    /// 服务器监听端口
    pub port: u16,
}

/// Bright Data 配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct BrightDataSettings {
    /// API密钥
    pub api_key: String,
    /// 数据集ID
    pub dataset_id: String,
    /// API基础URL
    pub base_url: String,
    /// 健康检查URL
    pub health_url: String,
}

/// DataForSEO 配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct DataForSeoSettings {
    /// 账号
    pub login: String,
    /// 密码
    pub password: String,
    /// API基础URL
    pub base_url: String,
    /// 健康检查URL
    pub health_url: String,
    /// 关键词热度查询的默认地区代码
    pub default_location_code: i32,
}

/// OpenAI 配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct OpenAiSettings {
    /// 默认模型（DEFAULT_OPENAI_MODEL）
    pub default_model: String,
    /// API基础URL
    pub base_url: String,
}

/// 邮件通知配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct EmailSettings {
    /// Mailgun API密钥
    pub api_key: String,
    /// 发信域名
    pub domain: String,
    /// API基础URL
    pub base_url: String,
    /// 发件人地址
    pub from: String,
    /// 提交通知模板名
    pub template_submitted: String,
    /// 成功通知模板名
    pub template_succeeded: String,
    /// 失败通知模板名
    pub template_failed: String,
    /// 退订链接（UNSUBSCRIBE_URL）
    pub unsubscribe_url: String,
}

/// 调度器配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerSettings {
    /// 5段cron表达式（NIGHTLY_CRON_SCHEDULE）
    pub cron: String,
}

/// 队列配置设置
#[derive(Debug, Clone, Deserialize)]
pub struct QueueSettings {
    /// 每个主题的工作器数量
    pub workers_per_topic: usize,
    /// 消息锁定时长（秒）
    pub lock_duration_seconds: i64,
    /// 消息最大投递次数
    pub max_retries: i32,
}

/// 应用外部地址配置
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    /// 对外可达的基础URL（APP_URL），用于拼接回调地址
    pub url: String,
}

impl Settings {
    /// 创建新的配置实例
    ///
    /// 从环境变量加载配置，支持默认值
    ///
    /// # Returns
    ///
    /// * `Ok(Settings)` - 成功加载的配置
    /// * `Err(ConfigError)` - 配置加载失败
    pub fn new() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENVIRONMENT").unwrap_or_else(|_| "default".to_string());
        let builder = Config::builder()
            // Start with default settings
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 3000)?
            // Default DB pool settings
            .set_default("database.max_connections", 100)?
            .set_default("database.min_connections", 10)?
            .set_default("database.connect_timeout", 10)?
            .set_default("database.idle_timeout", 300)?
            // Provider endpoints
            .set_default("brightdata.base_url", "https://api.brightdata.com")?
            .set_default("brightdata.health_url", "https://api.brightdata.com/status")?
            .set_default("dataforseo.base_url", "https://api.dataforseo.com")?
            .set_default(
                "dataforseo.health_url",
                "https://api.dataforseo.com/v3/appendix/status",
            )?
            .set_default("dataforseo.default_location_code", 2840)?
            // OpenAI
            .set_default("openai.default_model", "gpt-4o-mini")?
            .set_default("openai.base_url", "https://api.openai.com/v1")?
            // Email
            .set_default("email.base_url", "https://api.mailgun.net/v3")?
            .set_default("email.template_submitted", "prompts-submitted")?
            .set_default("email.template_succeeded", "prompts-succeeded")?
            .set_default("email.template_failed", "prompts-failed")?
            .set_default("email.unsubscribe_url", "")?
            // Scheduler: 默认每天 04:00 UTC
            .set_default("scheduler.cron", "0 4 * * *")?
            // Queue
            .set_default("queue.workers_per_topic", 3)?
            .set_default("queue.lock_duration_seconds", 600)?
            .set_default("queue.max_retries", 5)?
            // App
            .set_default("app.url", "http://localhost:3000")?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            .add_source(Environment::with_prefix("TRACKRS").separator("__"));

        let mut settings: Settings = builder.build()?.try_deserialize()?;

        // 文档化的裸环境变量优先于配置文件
        if let Ok(model) = std::env::var("DEFAULT_OPENAI_MODEL") {
            settings.openai.default_model = model;
        }
        if let Ok(cron) = std::env::var("NIGHTLY_CRON_SCHEDULE") {
            settings.scheduler.cron = cron;
        }
        if let Ok(url) = std::env::var("APP_URL") {
            settings.app.url = url;
        }
        if let Ok(url) = std::env::var("UNSUBSCRIBE_URL") {
            settings.email.unsubscribe_url = url;
        }

        Ok(settings)
    }
}
