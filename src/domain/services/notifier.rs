// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;

/// 通知邮件的种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailKind {
    /// 分片已提交
    Submitted,
    /// 分片处理成功
    Succeeded,
    /// 分片处理失败
    Failed,
}

impl fmt::Display for EmailKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EmailKind::Submitted => write!(f, "submitted"),
            EmailKind::Succeeded => write!(f, "succeeded"),
            EmailKind::Failed => write!(f, "failed"),
        }
    }
}

/// 邮件通知特质
///
/// 提交与失败通知每分片保证一封；成功通知由调用方按分片相关ID去重。
/// 夜间任务不产生任何邮件
#[async_trait]
pub trait Notifier: Send + Sync {
    /// 发送一封模板邮件
    ///
    /// # 参数
    /// * `kind` - 邮件种类，映射到模板
    /// * `to` - 收件人
    /// * `vars` - 模板变量
    async fn send(
        &self,
        kind: EmailKind,
        to: &str,
        vars: &BTreeMap<String, String>,
    ) -> Result<()>;
}
