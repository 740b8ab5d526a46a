// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use serde::{Deserialize, Serialize};

/// 单月搜索热度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyTrend {
    /// 年
    pub year: i32,
    /// 月（1-12）
    pub month: u32,
    /// 当月热度
    pub volume: i64,
}

/// 单条 Prompt 的聚合搜索热度
///
/// 热度为零是有效数据，不得折叠为空值
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeData {
    /// 当前热度（匹配条目求和）
    pub current_volume: i64,
    /// 按月走势，新在前，最多12个月
    pub monthly_trends: Vec<MonthlyTrend>,
    /// 月均热度
    pub average_volume: i64,
    /// 峰值热度
    pub peak_volume: i64,
}
