// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 项目实体
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// 项目唯一标识符
    pub id: Uuid,
    /// 所属用户ID
    pub user_id: Uuid,
    /// 项目名称
    pub name: String,
    /// 夜间调度频率，为空表示不参与夜间调度
    pub scheduler_frequency: Option<SchedulerFrequency>,
    /// 上次夜间调度的启动时间
    pub last_nightly_run_at: Option<DateTime<FixedOffset>>,
}

/// 夜间调度频率枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerFrequency {
    /// 每天
    Daily,
    /// 每周
    Weekly,
    /// 每月
    Monthly,
}

impl fmt::Display for SchedulerFrequency {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SchedulerFrequency::Daily => write!(f, "daily"),
            SchedulerFrequency::Weekly => write!(f, "weekly"),
            SchedulerFrequency::Monthly => write!(f, "monthly"),
        }
    }
}

impl FromStr for SchedulerFrequency {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(SchedulerFrequency::Daily),
            "weekly" => Ok(SchedulerFrequency::Weekly),
            "monthly" => Ok(SchedulerFrequency::Monthly),
            _ => Err(()),
        }
    }
}

impl SchedulerFrequency {
    /// 该频率对应的最小间隔
    pub fn interval(&self) -> Duration {
        match self {
            SchedulerFrequency::Daily => Duration::hours(24),
            SchedulerFrequency::Weekly => Duration::days(7),
            SchedulerFrequency::Monthly => Duration::days(30),
        }
    }
}

impl Project {
    /// 判断项目在本轮夜间调度中是否应当执行
    ///
    /// 从未运行过的项目立即执行；否则要求距上次启动至少一个完整间隔
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        let Some(frequency) = self.scheduler_frequency else {
            return false;
        };

        match self.last_nightly_run_at {
            None => true,
            Some(last_run) => now.signed_duration_since(last_run) >= frequency.interval(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project_with(
        frequency: Option<SchedulerFrequency>,
        last_run_hours_ago: Option<i64>,
    ) -> Project {
        let now = Utc::now();
        Project {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            name: "p".to_string(),
            scheduler_frequency: frequency,
            last_nightly_run_at: last_run_hours_ago.map(|h| (now - Duration::hours(h)).into()),
        }
    }

    #[test]
    fn test_no_frequency_never_due() {
        let project = project_with(None, None);
        assert!(!project.is_due(Utc::now()));
    }

    #[test]
    fn test_never_run_is_due() {
        let project = project_with(Some(SchedulerFrequency::Monthly), None);
        assert!(project.is_due(Utc::now()));
    }

    #[test]
    fn test_daily_cadence() {
        let due = project_with(Some(SchedulerFrequency::Daily), Some(25));
        let not_due = project_with(Some(SchedulerFrequency::Daily), Some(23));
        assert!(due.is_due(Utc::now()));
        assert!(!not_due.is_due(Utc::now()));
    }

    #[test]
    fn test_weekly_cadence() {
        let due = project_with(Some(SchedulerFrequency::Weekly), Some(24 * 8));
        let not_due = project_with(Some(SchedulerFrequency::Weekly), Some(24 * 6));
        assert!(due.is_due(Utc::now()));
        assert!(!not_due.is_due(Utc::now()));
    }

    #[test]
    fn test_monthly_cadence() {
        let due = project_with(Some(SchedulerFrequency::Monthly), Some(24 * 31));
        let not_due = project_with(Some(SchedulerFrequency::Monthly), Some(24 * 29));
        assert!(due.is_due(Utc::now()));
        assert!(!not_due.is_due(Utc::now()));
    }
}
