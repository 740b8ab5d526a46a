// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// 一组提及词的匹配统计
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MentionStats {
    /// 每个词的命中次数（保持输入顺序）
    pub per_term: Vec<(String, u32)>,
    /// 总命中次数
    pub total: u32,
    /// 是否至少命中一个词
    pub any: bool,
}

impl MentionStats {
    fn empty() -> Self {
        Self {
            per_term: Vec::new(),
            total: 0,
            any: false,
        }
    }
}

/// 规范化文本用于匹配
///
/// NFD 分解后丢弃组合符号（去重音），并把弯引号折叠为直引号。
/// 匹配在两侧都做同样的规范化，保证对 NFD 与引号替换不变
pub fn normalize_text(text: &str) -> String {
    text.nfd()
        .filter(|c| !is_combining_mark(*c))
        .map(fold_quote)
        .collect()
}

fn fold_quote(c: char) -> char {
    match c {
        '\u{2018}' | '\u{2019}' => '\'',
        '\u{201C}' | '\u{201D}' => '"',
        _ => c,
    }
}

/// 统计各品牌名在回答文本中的词边界命中
pub fn count_brand_mentions(answer: &str, brands: &[String]) -> MentionStats {
    if brands.is_empty() || answer.is_empty() {
        return MentionStats::empty();
    }

    let normalized_answer = normalize_text(answer);
    count_terms(&normalized_answer, brands)
}

/// 统计各目标域名在引用主机列表中的词边界命中
pub fn count_domain_mentions(citation_hosts: &[String], domains: &[String]) -> MentionStats {
    if domains.is_empty() || citation_hosts.is_empty() {
        return MentionStats::empty();
    }

    let haystack = citation_hosts.join(" ");
    count_terms(&haystack, domains)
}

fn count_terms(haystack: &str, terms: &[String]) -> MentionStats {
    let mut per_term = Vec::with_capacity(terms.len());
    let mut total = 0u32;

    for term in terms {
        let normalized_term = normalize_text(term);
        let count = if normalized_term.trim().is_empty() {
            0
        } else {
            let pattern = format!(r"(?i)\b{}\b", regex::escape(normalized_term.trim()));
            match Regex::new(&pattern) {
                Ok(re) => re.find_iter(haystack).count() as u32,
                Err(_) => 0,
            }
        };
        total += count;
        per_term.push((term.clone(), count));
    }

    MentionStats {
        per_term,
        total,
        any: total > 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn brands(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_simple_match_counts() {
        let stats = count_brand_mentions("Acme is great. I love Acme.", &brands(&["Acme"]));
        assert!(stats.any);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.per_term, vec![("Acme".to_string(), 2)]);
    }

    #[test]
    fn test_case_insensitive() {
        let stats = count_brand_mentions("ACME and acme and AcMe", &brands(&["Acme"]));
        assert_eq!(stats.total, 3);
    }

    #[test]
    fn test_word_boundary_no_substring_hit() {
        let stats = count_brand_mentions("Acmeta is not the same", &brands(&["Acme"]));
        assert!(!stats.any);
        assert_eq!(stats.total, 0);
    }

    #[test]
    fn test_accent_insensitive() {
        // 回答里是带重音的变体，品牌表里是裸写法
        let stats = count_brand_mentions("Café Rústico wins", &brands(&["Cafe Rustico"]));
        assert_eq!(stats.total, 1);

        // 反方向同样成立
        let stats = count_brand_mentions("Cafe Rustico wins", &brands(&["Café Rústico"]));
        assert_eq!(stats.total, 1);
    }

    #[test]
    fn test_curly_quote_folding() {
        let stats = count_brand_mentions("Joe\u{2019}s Diner is open", &brands(&["Joe's Diner"]));
        assert_eq!(stats.total, 1);
    }

    #[test]
    fn test_nfd_invariance() {
        // é 的两种写法：预组合与组合符号
        let precomposed = "Caf\u{e9} noir";
        let decomposed = "Cafe\u{301} noir";
        let brand = brands(&["café"]);

        assert_eq!(
            count_brand_mentions(precomposed, &brand).total,
            count_brand_mentions(decomposed, &brand).total
        );
    }

    #[test]
    fn test_domain_mentions() {
        let hosts = vec![
            "example.com".to_string(),
            "blog.example.com".to_string(),
            "other.org".to_string(),
        ];
        let stats = count_domain_mentions(&hosts, &brands(&["example.com"]));
        assert!(stats.any);
        assert_eq!(stats.total, 2);

        let stats = count_domain_mentions(&hosts, &brands(&["example.co"]));
        assert_eq!(stats.total, 0);
    }

    #[test]
    fn test_empty_inputs() {
        assert!(!count_brand_mentions("text", &[]).any);
        assert!(!count_brand_mentions("", &brands(&["Acme"])).any);
        assert!(!count_domain_mentions(&[], &brands(&["a.com"])).any);
    }
}
