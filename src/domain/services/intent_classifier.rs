// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::models::tracking_result::Intent;

/// 每个关键词命中的加分
const KEYWORD_POINTS: u32 = 5;
/// 单类别关键词加分上限
const KEYWORD_CAP: u32 = 30;
/// 信息型基线分
const INFORMATIONAL_BASELINE: u32 = 20;

static COMMERCIAL_KEYWORDS: &[&str] = &[
    "compare", "review", "rating", "best", "top", "price", "cost", "features", "vs", "versus",
    "pros", "cons", "recommendation", "brand", "model",
];

static LOCAL_KEYWORDS: &[&str] = &[
    "near me", "nearby", "local", "address", "location", "directions", "hours", "map",
    "restaurant", "store", "business", "service area", "city", "town",
];

static TRANSACTIONAL_KEYWORDS: &[&str] = &[
    "buy", "purchase", "order", "booking", "reservation", "hire", "contact", "call", "quote",
    "estimate", "appointment", "schedule", "book now",
];

static NAVIGATIONAL_KEYWORDS: &[&str] = &[
    "website", "homepage", "official site", "main page", "portal", "directory", "login",
    "sign in", "dashboard", "menu", "navigation", "sitemap",
];

static INFORMATIONAL_KEYWORDS: &[&str] = &[
    "what", "why", "how", "when", "where", "definition", "meaning", "explain", "guide",
    "tutorial", "learn", "understand", "compare", "difference", "overview",
];

static KEYWORD_REGEXES: Lazy<Vec<(Intent, Vec<Regex>)>> = Lazy::new(|| {
    let compile = |words: &[&str]| {
        words
            .iter()
            .map(|w| Regex::new(&format!(r"(?i)\b{}\b", regex::escape(w))).unwrap())
            .collect::<Vec<_>>()
    };

    vec![
        (Intent::Commercial, compile(COMMERCIAL_KEYWORDS)),
        (Intent::Transactional, compile(TRANSACTIONAL_KEYWORDS)),
        (Intent::Local, compile(LOCAL_KEYWORDS)),
        (Intent::Navigational, compile(NAVIGATIONAL_KEYWORDS)),
        (Intent::Informational, compile(INFORMATIONAL_KEYWORDS)),
    ]
});

/// 分类输入信号：清洗后的文本加特征位
#[derive(Debug, Clone, Copy, Default)]
pub struct IntentSignals<'a> {
    /// 清洗后的回答文本
    pub text: &'a str,
    /// 是否检出产品
    pub has_products: bool,
    /// 是否检出表格
    pub has_table: bool,
    /// 是否检出本地商户
    pub has_local: bool,
    /// 是否检出导航列表
    pub has_navigation_list: bool,
    /// 是否有正文
    pub has_text: bool,
}

/// 分类结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentClassification {
    /// 主意图
    pub primary: Intent,
    /// 置信度 0-100
    pub confidence: i32,
    /// 五个类别的得分（按裁决顺序）
    pub scores: Vec<(Intent, u32)>,
}

/// 特征存在时的固定加分
fn feature_score(intent: Intent, signals: &IntentSignals) -> u32 {
    let mut score = 0;
    match intent {
        Intent::Commercial => {
            if signals.has_products {
                score += 25;
            }
            if signals.has_table {
                score += 20;
            }
        }
        Intent::Transactional => {
            if signals.has_products {
                score += 20;
            }
            if signals.has_local {
                score += 10;
            }
        }
        Intent::Local => {
            if signals.has_local {
                score += 30;
            }
        }
        Intent::Navigational => {
            if signals.has_navigation_list {
                score += 25;
            }
        }
        Intent::Informational => {
            if signals.has_text {
                score += 10;
            }
        }
    }
    score
}

/// 对一条回答做五分类意图裁决
///
/// 得分 = 特征加分 + 关键词加分（封顶）+ 信息型基线；
/// 并列时按 商业 > 交易 > 本地 > 导航 > 信息 裁决
pub fn classify(signals: &IntentSignals) -> IntentClassification {
    let mut scores: Vec<(Intent, u32)> = Vec::with_capacity(5);

    for (intent, regexes) in KEYWORD_REGEXES.iter() {
        let keyword_hits: u32 = regexes
            .iter()
            .map(|re| re.find_iter(signals.text).count() as u32)
            .sum();
        let keyword_score = (keyword_hits * KEYWORD_POINTS).min(KEYWORD_CAP);

        let mut score = feature_score(*intent, signals) + keyword_score;
        if *intent == Intent::Informational {
            score += INFORMATIONAL_BASELINE;
        }

        scores.push((*intent, score));
    }

    // 按裁决顺序遍历，严格大于才换主意图，天然实现并列裁决
    let mut primary = scores[0].0;
    let mut top = scores[0].1;
    for (intent, score) in scores.iter().skip(1) {
        if *score > top {
            primary = *intent;
            top = *score;
        }
    }

    let second = scores
        .iter()
        .filter(|(intent, _)| *intent != primary)
        .map(|(_, score)| *score)
        .max()
        .unwrap_or(0);

    let confidence = if top > 0 {
        (((top - second) as f64 / top as f64) * 100.0).floor() as i32
    } else {
        0
    };

    IntentClassification {
        primary,
        confidence,
        scores,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_answer_defaults_informational() {
        let signals = IntentSignals {
            text: "the sky appears blue because of light scattering",
            has_text: true,
            ..Default::default()
        };
        let result = classify(&signals);
        assert_eq!(result.primary, Intent::Informational);
        assert!(result.confidence > 0);
    }

    #[test]
    fn test_commercial_keywords_win() {
        let signals = IntentSignals {
            text: "compare the best price and top review ratings, pros and cons of each brand",
            has_text: true,
            has_table: true,
            ..Default::default()
        };
        let result = classify(&signals);
        assert_eq!(result.primary, Intent::Commercial);
    }

    #[test]
    fn test_local_features_win() {
        let signals = IntentSignals {
            text: "the restaurant near me with directions and hours",
            has_text: true,
            has_local: true,
            ..Default::default()
        };
        let result = classify(&signals);
        assert_eq!(result.primary, Intent::Local);
    }

    #[test]
    fn test_keyword_cap_applies() {
        // 超过6个命中也只记30分
        let text = "buy buy buy buy buy buy buy buy buy buy";
        let signals = IntentSignals {
            text,
            has_text: true,
            ..Default::default()
        };
        let result = classify(&signals);
        let transactional = result
            .scores
            .iter()
            .find(|(i, _)| *i == Intent::Transactional)
            .unwrap()
            .1;
        assert_eq!(transactional, KEYWORD_CAP);
    }

    #[test]
    fn test_tie_break_prefers_commercial() {
        // 构造商业与交易同分的场景
        let signals = IntentSignals {
            text: "",
            has_products: true,
            has_text: false,
            ..Default::default()
        };
        let result = classify(&signals);
        // commercial 25 vs transactional 20 vs informational 20
        assert_eq!(result.primary, Intent::Commercial);
    }

    #[test]
    fn test_confidence_formula() {
        let signals = IntentSignals {
            text: "",
            has_local: true,
            ..Default::default()
        };
        let result = classify(&signals);
        // local 30, informational 20 -> floor(10/30*100) = 33
        assert_eq!(result.primary, Intent::Local);
        assert_eq!(result.confidence, 33);
    }

    #[test]
    fn test_empty_everything() {
        let signals = IntentSignals::default();
        let result = classify(&signals);
        // 只剩信息型基线
        assert_eq!(result.primary, Intent::Informational);
        assert_eq!(result.confidence, 100);
    }
}
