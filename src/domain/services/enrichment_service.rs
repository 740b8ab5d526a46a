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

use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

use crate::domain::models::tracking_result::Citation;
use crate::domain::services::brand_matcher;
use crate::domain::services::intent_classifier::{self, IntentClassification, IntentSignals};
use crate::domain::services::llm_service::{parse_score, LlmServiceTrait};
use crate::utils::retry_policy::RetryPolicy;
use crate::utils::text_sanitizer;
use crate::utils::url_utils;

/// 特征名：正文
pub const FEATURE_TEXT: &str = "text";
/// 特征名：产品
pub const FEATURE_PRODUCTS: &str = "products";
/// 特征名：图片
pub const FEATURE_IMAGES: &str = "images";
/// 特征名：表格
pub const FEATURE_TABLE: &str = "table";
/// 特征名：导航列表
pub const FEATURE_NAVIGATION_LIST: &str = "navigation_list";
/// 特征名：本地商户
pub const FEATURE_LOCAL_BUSINESSES: &str = "local_businesses";

/// 分析失败时的情感兜底值（中性）
pub const DEFAULT_SENTIMENT: i32 = 50;
/// 分析失败时的显著度兜底值
pub const DEFAULT_SALIENCE: i32 = 0;

/// 情感与显著度调用之间的间隔
const ANALYSIS_SPACER_MS: u64 = 300;

// 评分量表是二进制契约的一部分，改动即改变分数分布，必须连带版本号一起变
const SENTIMENT_RUBRIC: &str = "You rate brand sentiment in an AI answer on a 0-100 scale. \
0 means strongly negative, 50 means neutral, 100 means strongly positive. \
Consider only how the brand is portrayed. Respond with a single integer and nothing else.";

const SALIENCE_RUBRIC: &str = "You rate brand salience in an AI answer on a 0-100 scale. \
0 means the brand is a passing mention, 100 means the brand is the central subject of the answer. \
Respond with a single integer and nothing else.";

static MARKDOWN_IMAGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"!\[[^\]]*\]\([^)]*\)").unwrap());
static TABLE_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^\s*\|.+\|\s*$").unwrap());

/// 供应商无关的响应信封
///
/// 由各派发器从供应商原始载荷归一化而来，富化引擎不感知供应商
#[derive(Debug, Clone, Default)]
pub struct NormalizedResponse {
    /// 回答文本（Markdown原文）
    pub answer_text: String,
    /// 引用（原始标题与URL）
    pub citations: Vec<RawCitation>,
    /// 随附链接的主机名
    pub link_hosts: Vec<String>,
    /// 随附链接数
    pub link_count: usize,
    /// 是否带有来源列表
    pub has_sources_list: bool,
    /// 嵌套产品条目数
    pub product_count: u32,
    /// 嵌套图片条目数
    pub image_item_count: u32,
    /// 本地商户条目数
    pub local_item_count: u32,
    /// 引用的发布日期
    pub citation_dates: Vec<DateTime<Utc>>,
    /// 实际是否走了联网搜索
    pub web_search: bool,
    /// 供应商原始载荷
    pub raw: serde_json::Value,
}

/// 原始引用条目
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawCitation {
    /// 标题
    pub title: String,
    /// 原始URL
    pub url: String,
}

/// 确定性富化的产出
#[derive(Debug, Clone)]
pub struct Enrichment {
    /// 清洗后的回答文本
    pub sanitized_text: String,
    /// 品牌是否命中
    pub is_present: bool,
    /// 品牌命中总数
    pub mention_count: u32,
    /// 命中的品牌名（保持输入顺序）
    pub matched_brands: Vec<String>,
    /// 域名是否命中
    pub is_domain_present: bool,
    /// 域名命中总数
    pub domain_mention_count: u32,
    /// 检出特征 -> 次数（只含检出的特征）
    pub features: BTreeMap<String, u32>,
    /// 引用链接潜力 0-100
    pub lcp: i32,
    /// 可行动性 0-100
    pub actionability: i32,
    /// 意图分类
    pub intent: IntentClassification,
    /// 规范化后的引用
    pub citations: Vec<Citation>,
}

/// 对归一化响应做确定性富化
///
/// 纯CPU路径，任何失败都不会传播：评分器内部兜底为零分
pub fn enrich(
    response: &NormalizedResponse,
    brand_mentions: &[String],
    domain_mentions: &[String],
    now: DateTime<Utc>,
) -> Enrichment {
    let sanitized_text = text_sanitizer::sanitize(&response.answer_text);

    let brand_stats = brand_matcher::count_brand_mentions(&sanitized_text, brand_mentions);

    let citation_hosts = distinct_hosts(response);
    let domain_stats = brand_matcher::count_domain_mentions(&citation_hosts, domain_mentions);

    let features = detect_features(response);
    let lcp = score_lcp(response, &citation_hosts, &features, now);
    let actionability = score_actionability(response, &features, now);

    let signals = IntentSignals {
        text: &sanitized_text,
        has_products: features.contains_key(FEATURE_PRODUCTS),
        has_table: features.contains_key(FEATURE_TABLE),
        has_local: features.contains_key(FEATURE_LOCAL_BUSINESSES),
        has_navigation_list: features.contains_key(FEATURE_NAVIGATION_LIST),
        has_text: features.contains_key(FEATURE_TEXT),
    };
    let intent = intent_classifier::classify(&signals);

    let matched_brands = brand_stats
        .per_term
        .iter()
        .filter(|(_, count)| *count > 0)
        .map(|(term, _)| term.clone())
        .collect();

    Enrichment {
        sanitized_text,
        is_present: brand_stats.any,
        mention_count: brand_stats.total,
        matched_brands,
        is_domain_present: domain_stats.any,
        domain_mention_count: domain_stats.total,
        features,
        lcp,
        actionability,
        intent,
        citations: normalize_citations(&response.citations),
    }
}

/// 特征检测：返回 检出特征 -> 出现次数
pub fn detect_features(response: &NormalizedResponse) -> BTreeMap<String, u32> {
    let mut features = BTreeMap::new();

    if !response.answer_text.trim().is_empty() {
        features.insert(FEATURE_TEXT.to_string(), 1);
    }

    if response.product_count > 0 {
        features.insert(FEATURE_PRODUCTS.to_string(), response.product_count);
    }

    let markdown_images = MARKDOWN_IMAGE.find_iter(&response.answer_text).count() as u32;
    let image_count = markdown_images + response.image_item_count;
    if image_count > 0 {
        features.insert(FEATURE_IMAGES.to_string(), image_count);
    }

    // 表头 + 分隔行 + 至少一行数据
    let table_lines = TABLE_LINE.find_iter(&response.answer_text).count() as u32;
    if table_lines >= 3 {
        features.insert(FEATURE_TABLE.to_string(), table_lines);
    }

    if response.link_count > 3 {
        features.insert(FEATURE_NAVIGATION_LIST.to_string(), response.link_count as u32);
    } else if response.has_sources_list {
        features.insert(FEATURE_NAVIGATION_LIST.to_string(), 1);
    }

    if response.local_item_count > 0 {
        features.insert(
            FEATURE_LOCAL_BUSINESSES.to_string(),
            response.local_item_count,
        );
    }

    features
}

/// 去重后的引用主机集合：引用主机并上随附链接主机
fn distinct_hosts(response: &NormalizedResponse) -> Vec<String> {
    let mut hosts = BTreeSet::new();

    for citation in &response.citations {
        if let Some(host) = url_utils::bare_host(&citation.url) {
            hosts.insert(host);
        }
    }
    for link_host in &response.link_hosts {
        if let Some(host) = url_utils::bare_host(link_host) {
            hosts.insert(host);
        }
    }

    hosts.into_iter().collect()
}

/// 引用链接潜力评分
///
/// 域名多样性（封顶8个，每个8分）+ 新鲜度 + 结构多样性 + 导航列表
fn score_lcp(
    response: &NormalizedResponse,
    citation_hosts: &[String],
    features: &BTreeMap<String, u32>,
    now: DateTime<Utc>,
) -> i32 {
    let mut score = (citation_hosts.len().min(8) * 8) as i32;

    let ninety_days_ago = now - Duration::days(90);
    if response
        .citation_dates
        .iter()
        .any(|date| *date >= ninety_days_ago)
    {
        score += 10;
    }

    if features.len() >= 2 {
        score += 10;
    }

    if features.contains_key(FEATURE_NAVIGATION_LIST) {
        score += 6;
    }

    score.clamp(0, 100)
}

/// 可行动性评分
///
/// 决策支撑结构的加分和，外加引用陈旧的机会加分
fn score_actionability(
    response: &NormalizedResponse,
    features: &BTreeMap<String, u32>,
    now: DateTime<Utc>,
) -> i32 {
    let mut score = 0;

    if features.contains_key(FEATURE_TABLE) {
        score += 30;
    }
    if features.contains_key(FEATURE_PRODUCTS) {
        score += 20;
    }
    if features.contains_key(FEATURE_LOCAL_BUSINESSES) {
        score += 20;
    }
    if features.contains_key(FEATURE_IMAGES) {
        score += 10;
    }
    if features.contains_key(FEATURE_NAVIGATION_LIST) {
        score += 10;
    }

    // 最近的引用也已超过一年，属于"可抢占的陈旧内容"
    if let Some(most_recent) = response.citation_dates.iter().max() {
        if *most_recent < now - Duration::days(365) {
            score += 10;
        }
    }

    score.clamp(0, 100)
}

/// 引用规范化为 {title, domain, url}
pub fn normalize_citations(raw: &[RawCitation]) -> Vec<Citation> {
    raw.iter()
        .map(|citation| Citation {
            title: citation.title.clone(),
            domain: url_utils::bare_host(&citation.url).unwrap_or_default(),
            url: url_utils::normalize_citation_url(&citation.url),
        })
        .collect()
}

/// 通过LLM为命中品牌的回答打情感与显著度分
///
/// 品牌未命中时不调用LLM，直接返回默认值 (50/0)。
/// 两次调用之间有 300ms 间隔；重试耗尽时同样回落到默认值，
/// 分析失败不影响记录本身的完成状态
pub async fn score_with_llm(llm: &dyn LlmServiceTrait, enrichment: &Enrichment) -> (i32, i32) {
    // 品牌未命中的行不消耗LLM调用，两项都记零
    if !enrichment.is_present {
        return (0, 0);
    }

    let brand_list = enrichment.matched_brands.join(", ");
    let sanitized_text = &enrichment.sanitized_text;
    let policy = RetryPolicy::standard();

    let sentiment_prompt = format!("Brand: {}\n\nAnswer:\n{}", brand_list, sanitized_text);
    let sentiment = match policy
        .run("sentiment analysis", || {
            llm.completion(SENTIMENT_RUBRIC, &sentiment_prompt, 0.1, 3)
        })
        .await
    {
        Ok(raw) => parse_score(&raw).unwrap_or(DEFAULT_SENTIMENT),
        Err(e) => {
            warn!("Sentiment analysis failed after retries: {}", e);
            DEFAULT_SENTIMENT
        }
    };

    tokio::time::sleep(std::time::Duration::from_millis(ANALYSIS_SPACER_MS)).await;

    let salience_prompt = format!("Brand: {}\n\nAnswer:\n{}", brand_list, sanitized_text);
    let salience = match policy
        .run("salience analysis", || {
            llm.completion(SALIENCE_RUBRIC, &salience_prompt, 0.2, 4)
        })
        .await
    {
        Ok(raw) => parse_score(&raw).unwrap_or(DEFAULT_SALIENCE),
        Err(e) => {
            warn!("Salience analysis failed after retries: {}", e);
            DEFAULT_SALIENCE
        }
    };

    (sentiment, salience)
}

/// 把富化产出写入结果行并置为完成
///
/// 存储的 `response` 形态固定为 `{"answer_text", "raw_response"}`，
/// 清洗后的回答始终可以从 `answer_text` 取回
#[allow(clippy::too_many_arguments)]
pub fn apply_to_result(
    result: &mut crate::domain::models::tracking_result::TrackingResult,
    response: &NormalizedResponse,
    enrichment: &Enrichment,
    sentiment: i32,
    salience: i32,
    volume: Option<&crate::domain::models::volume::VolumeData>,
    volume_location_code: i32,
    source: crate::domain::models::tracking_result::Source,
) {
    use crate::domain::models::tracking_result::ResultStatus;

    result.status = ResultStatus::Fulfilled;
    result.is_present = Some(enrichment.is_present);
    result.is_domain_present = Some(enrichment.is_domain_present);
    result.sentiment = Some(sentiment);
    result.salience = Some(salience);
    result.response = Some(serde_json::json!({
        "answer_text": enrichment.sanitized_text,
        "raw_response": response.raw,
    }));
    result.citations = Some(enrichment.citations.clone());
    result.mention_count = Some(enrichment.mention_count as i32);
    result.domain_mention_count = Some(enrichment.domain_mention_count as i32);
    result.web_search = Some(response.web_search);
    result.lcp = Some(enrichment.lcp);
    result.actionability = Some(enrichment.actionability);
    result.intent_classification = Some(enrichment.intent.primary);
    result.serp_features = Some(enrichment.features.clone());

    if let Some(volume) = volume {
        result.ai_search_volume = Some(volume.current_volume);
        result.ai_monthly_trends = Some(volume.monthly_trends.clone());
        result.ai_volume_fetched_at = Some(Utc::now().into());
        result.ai_volume_location_code = Some(volume_location_code);
    }

    result.timestamp_ms = Utc::now().timestamp_millis();
    result.source = Some(source);
}
