// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

/// Bright Data 客户端（轮询式）
pub mod brightdata;

/// DataForSEO 客户端（回调式）
pub mod dataforseo;

/// 供应商健康选择控制器
pub mod health;

/// 供应商公共类型
pub mod traits;

/// 关键词热度客户端
pub mod volume_trends;

use chrono::{DateTime, NaiveDate, Utc};

/// 宽松解析供应商返回的日期串
///
/// 支持 RFC3339 与裸日期两种形态
pub(crate) fn parse_flexible_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rfc3339() {
        assert!(parse_flexible_date("2025-01-15T10:30:00Z").is_some());
    }

    #[test]
    fn test_parse_bare_date() {
        assert!(parse_flexible_date("2025-01-15").is_some());
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse_flexible_date("last tuesday").is_none());
    }
}
