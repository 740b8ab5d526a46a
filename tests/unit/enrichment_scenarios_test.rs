// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use chrono::Utc;
use trackrs::domain::models::tracking_result::{Intent, ResultStatus, Source, TrackingResult};
use trackrs::domain::services::enrichment_service::{
    self, NormalizedResponse, RawCitation, FEATURE_TEXT,
};
use uuid::Uuid;

fn brands(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn response_with(answer: &str, hosts: &[&str]) -> NormalizedResponse {
    NormalizedResponse {
        answer_text: answer.to_string(),
        citations: hosts
            .iter()
            .map(|h| RawCitation {
                title: "ref".to_string(),
                url: format!("https://www.{}/article", h),
            })
            .collect(),
        ..Default::default()
    }
}

/// 快乐路径：品牌两次命中，5个不同引用域名
#[test]
fn test_mentioned_prompt_scores() {
    let response = response_with(
        "Acme is the leading choice. Many teams pick Acme over rivals.",
        &["a.com", "b.com", "c.com", "d.com", "e.com"],
    );

    let enrichment = enrichment_service::enrich(
        &response,
        &brands(&["Acme"]),
        &brands(&["acme.com"]),
        Utc::now(),
    );

    assert!(enrichment.is_present);
    assert_eq!(enrichment.mention_count, 2);
    assert_eq!(enrichment.matched_brands, vec!["Acme"]);
    // 5个不同域名 -> 至少40分
    assert!(enrichment.lcp >= 40);
    assert!(enrichment.lcp <= 100);
    assert!(!enrichment.is_domain_present);
}

/// 未命中品牌的行不会出现正的命中计数
#[test]
fn test_unmentioned_prompt_scores() {
    let response = response_with("Some other vendor dominates here.", &["a.com"]);

    let enrichment =
        enrichment_service::enrich(&response, &brands(&["Acme"]), &[], Utc::now());

    assert!(!enrichment.is_present);
    assert_eq!(enrichment.mention_count, 0);
    assert!(enrichment.matched_brands.is_empty());
}

/// 富化产出写入行后的不变量：完成行的分数都在 [0,100]
#[test]
fn test_apply_to_result_invariants() {
    let response = response_with(
        "Acme wins. | a | b |\n|---|---|\n| 1 | 2 |",
        &["a.com", "b.com"],
    );
    let enrichment = enrichment_service::enrich(
        &response,
        &brands(&["Acme"]),
        &brands(&["a.com"]),
        Utc::now(),
    );

    let mut result = TrackingResult::new_pending(
        Uuid::new_v4(),
        "best crm".to_string(),
        Uuid::new_v4(),
        Uuid::new_v4(),
        Some(Uuid::new_v4()),
        0,
    );

    enrichment_service::apply_to_result(
        &mut result,
        &response,
        &enrichment,
        72,
        35,
        None,
        2840,
        Source::Brightdata,
    );

    assert_eq!(result.status, ResultStatus::Fulfilled);
    for score in [
        result.sentiment.unwrap(),
        result.salience.unwrap(),
        result.lcp.unwrap(),
        result.actionability.unwrap(),
    ] {
        assert!((0..=100).contains(&score));
    }
    assert!(result.is_present.unwrap());
    assert!(result.mention_count.unwrap() >= 1);
    assert!(result.is_domain_present.unwrap());
    assert_eq!(result.source, Some(Source::Brightdata));

    // 清洗后的回答必须能从 response.answer_text 取回
    let stored = result.response.unwrap();
    assert_eq!(
        stored["answer_text"].as_str().unwrap(),
        enrichment.sanitized_text
    );
}

/// is_present=false 隐含 mention_count=0，反之命中行至少1次
#[test]
fn test_presence_count_consistency() {
    let cases = [
        ("no brands here at all", 0u32, false),
        ("Acme once", 1, true),
        ("Acme and Acme and Acme", 3, true),
    ];

    for (answer, expected_count, expected_present) in cases {
        let response = response_with(answer, &[]);
        let enrichment =
            enrichment_service::enrich(&response, &brands(&["Acme"]), &[], Utc::now());
        assert_eq!(enrichment.is_present, expected_present, "answer: {}", answer);
        assert_eq!(enrichment.mention_count, expected_count, "answer: {}", answer);
    }
}

/// LCP 域名计数的边界：9个域名按8个封顶
#[test]
fn test_lcp_domain_clamp_boundary() {
    let hosts: Vec<String> = (0..9).map(|i| format!("host{}.com", i)).collect();
    let host_refs: Vec<&str> = hosts.iter().map(|s| s.as_str()).collect();
    let mut response = response_with("", &host_refs);
    response.answer_text = String::new();

    let enrichment = enrichment_service::enrich(&response, &[], &[], Utc::now());
    assert_eq!(enrichment.lcp, 64);
}

/// 空回答只有引用时没有 text 特征
#[test]
fn test_empty_answer_has_no_text_feature() {
    let mut response = response_with("", &["a.com"]);
    response.answer_text = "   ".to_string();

    let enrichment = enrichment_service::enrich(&response, &[], &[], Utc::now());
    assert!(!enrichment.features.contains_key(FEATURE_TEXT));
}

/// 意图落点跟随内容形态
#[test]
fn test_intent_follows_content() {
    let commercial = response_with(
        "Compare the best price, pros and cons for each brand model.\n\
         | brand | price |\n|---|---|\n| A | $10 |\n| B | $12 |",
        &[],
    );
    let enrichment = enrichment_service::enrich(&commercial, &[], &[], Utc::now());
    assert_eq!(enrichment.intent.primary, Intent::Commercial);

    let informational = response_with("The sky is blue due to Rayleigh scattering.", &[]);
    let enrichment = enrichment_service::enrich(&informational, &[], &[], Utc::now());
    assert_eq!(enrichment.intent.primary, Intent::Informational);
}
