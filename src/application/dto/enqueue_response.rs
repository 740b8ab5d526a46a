// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::Serialize;
use uuid::Uuid;

/// 提交响应DTO
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueResponseDto {
    /// 是否受理
    pub success: bool,
    /// 批次ID
    pub job_batch_id: Uuid,
    /// Prompt总数
    pub total_prompts: i32,
    /// 分片总数
    pub total_batches: i32,
    /// 当选的抓取供应商
    pub service: String,
}
