// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{error, info};

use crate::config::settings::EmailSettings;
use crate::domain::services::notifier::{EmailKind, Notifier};

/// 发送超时
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Mailgun 邮件通知器
///
/// 模板渲染由 Mailgun 侧完成，这里只投递模板名与变量
#[derive(Clone)]
pub struct MailgunNotifier {
    client: Client,
    api_key: String,
    domain: String,
    base_url: String,
    from: String,
    template_submitted: String,
    template_succeeded: String,
    template_failed: String,
    unsubscribe_url: String,
}

impl MailgunNotifier {
    /// 创建新的通知器实例
    pub fn new(settings: &EmailSettings) -> Self {
        Self {
            client: Client::new(),
            api_key: settings.api_key.clone(),
            domain: settings.domain.clone(),
            base_url: settings.base_url.clone(),
            from: settings.from.clone(),
            template_submitted: settings.template_submitted.clone(),
            template_succeeded: settings.template_succeeded.clone(),
            template_failed: settings.template_failed.clone(),
            unsubscribe_url: settings.unsubscribe_url.clone(),
        }
    }

    fn template_for(&self, kind: EmailKind) -> &str {
        match kind {
            EmailKind::Submitted => &self.template_submitted,
            EmailKind::Succeeded => &self.template_succeeded,
            EmailKind::Failed => &self.template_failed,
        }
    }

    fn subject_for(kind: EmailKind) -> &'static str {
        match kind {
            EmailKind::Submitted => "Your prompts were submitted",
            EmailKind::Succeeded => "Your prompt results are ready",
            EmailKind::Failed => "Some of your prompts failed",
        }
    }
}

#[async_trait]
impl Notifier for MailgunNotifier {
    async fn send(
        &self,
        kind: EmailKind,
        to: &str,
        vars: &BTreeMap<String, String>,
    ) -> Result<()> {
        let url = format!("{}/{}/messages", self.base_url, self.domain);

        let mut all_vars = vars.clone();
        if !self.unsubscribe_url.is_empty() {
            all_vars.insert("unsubscribe_url".to_string(), self.unsubscribe_url.clone());
        }
        let vars_json =
            serde_json::to_string(&all_vars).context("Failed to serialize template vars")?;

        let mut form: Vec<(&str, &str)> = Vec::with_capacity(5);
        form.push(("from", self.from.as_str()));
        form.push(("to", to));
        form.push(("subject", Self::subject_for(kind)));
        let template = self.template_for(kind);
        form.push(("template", template));
        form.push(("h:X-Mailgun-Variables", vars_json.as_str()));

        let response = self
            .client
            .post(&url)
            .basic_auth("api", Some(&self.api_key))
            .timeout(SEND_TIMEOUT)
            .form(&form)
            .send()
            .await
            .context("Failed to reach email service")?;

        if response.status().is_success() {
            info!("Sent {} email to {}", kind, to);
            Ok(())
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("Email service returned {}: {}", status, body);
            Err(anyhow::anyhow!("email service returned {}", status))
        }
    }
}
