// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use once_cell::sync::Lazy;
use regex::Regex;

/// 文本清洗配置
#[derive(Debug, Clone)]
pub struct SanitizeOptions {
    /// 是否保留列表结构（保留时统一为 "- " 前缀，否则去掉列表标记）
    pub preserve_lists: bool,
    /// 连续空行的最大数量
    pub max_blank_lines: usize,
}

impl Default for SanitizeOptions {
    fn default() -> Self {
        Self {
            preserve_lists: true,
            max_blank_lines: 1,
        }
    }
}

static MARKDOWN_LINK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]*)\]\(([^)]*)\)").unwrap());
static CODE_FENCE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^```[^\n]*$").unwrap());
static INLINE_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"`([^`]*)`").unwrap());
static HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#{1,6}\s+").unwrap());
static BOLD_ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*{1,3}([^*\n]+)\*{1,3}").unwrap());
static UNDERSCORE_EMPHASIS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"_{1,3}([^_\n]+)_{1,3}").unwrap());
static BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^[ \t]*(?:[*•-]|\d+\.)\s+").unwrap());
static HTML_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"</?[a-zA-Z][^>]*>").unwrap());
static SENTENCE_SPACING: Lazy<Regex> = Lazy::new(|| Regex::new(r"([.?!;:])([^\s.?!;:)])").unwrap());
static SPACE_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]{2,}").unwrap());

/// 将 LLM 回答中的 Markdown/HTML 噪声清洗为纯文本
///
/// 输出保证是不动点：`sanitize(sanitize(x)) == sanitize(x)`
pub fn sanitize(text: &str) -> String {
    sanitize_with(text, &SanitizeOptions::default())
}

/// 使用指定配置清洗文本
pub fn sanitize_with(text: &str, options: &SanitizeOptions) -> String {
    // 实体解码可能暴露新的标签/实体，循环到不动点为止
    let mut current = sanitize_pass(text, options);
    for _ in 0..4 {
        let next = sanitize_pass(&current, options);
        if next == current {
            break;
        }
        current = next;
    }
    current
}

fn sanitize_pass(text: &str, options: &SanitizeOptions) -> String {
    // 1. 还原字面 \n
    let mut out = text.replace("\\n", "\n");

    // 2. [text](url) -> text (url)
    out = MARKDOWN_LINK.replace_all(&out, "$1 ($2)").into_owned();

    // 3. 去掉代码围栏与行内代码标记，保留内容
    out = CODE_FENCE.replace_all(&out, "").into_owned();
    out = INLINE_CODE.replace_all(&out, "$1").into_owned();

    // 4. 去掉行首标题标记
    out = HEADING.replace_all(&out, "").into_owned();

    // 5. 去掉强调标记，保留内容
    out = BOLD_ITALIC.replace_all(&out, "$1").into_owned();
    out = UNDERSCORE_EMPHASIS.replace_all(&out, "$1").into_owned();

    // 6. 列表标记统一或丢弃
    if options.preserve_lists {
        out = BULLET.replace_all(&out, "- ").into_owned();
    } else {
        out = BULLET.replace_all(&out, "").into_owned();
    }

    // 7. 去掉反斜杠转义
    out = out.replace('\\', "");

    // 8. 去掉HTML标签
    out = HTML_TAG.replace_all(&out, "").into_owned();

    // 9. 解码常见命名实体
    out = decode_entities(&out);

    // 10. 句读后补一个空格
    out = SENTENCE_SPACING.replace_all(&out, "$1 $2").into_owned();

    // 11. 折叠空白
    out = SPACE_RUN.replace_all(&out, " ").into_owned();
    collapse_lines(&out, options.max_blank_lines)
}

fn decode_entities(text: &str) -> String {
    let mut out = text.to_string();
    // &amp; 最后处理，避免把 &amp;lt; 一步解成 <
    let replacements: [(&str, &str); 13] = [
        ("&lt;", "<"),
        ("&gt;", ">"),
        ("&quot;", "\""),
        ("&#39;", "'"),
        ("&apos;", "'"),
        ("&nbsp;", " "),
        ("&mdash;", "—"),
        ("&ndash;", "–"),
        ("&hellip;", "…"),
        ("&lsquo;", "'"),
        ("&rsquo;", "'"),
        ("&ldquo;", "\""),
        ("&rdquo;", "\""),
    ];
    for (entity, plain) in replacements {
        out = out.replace(entity, plain);
    }
    out.replace("&amp;", "&")
}

fn collapse_lines(text: &str, max_blank_lines: usize) -> String {
    let mut lines: Vec<&str> = Vec::new();
    let mut blank_run = 0usize;

    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            blank_run += 1;
            if blank_run <= max_blank_lines {
                lines.push("");
            }
        } else {
            blank_run = 0;
            lines.push(trimmed);
        }
    }

    lines.join("\n").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unescapes_literal_newlines() {
        assert_eq!(sanitize("one\\ntwo"), "one\ntwo");
    }

    #[test]
    fn test_rewrites_markdown_links() {
        let out = sanitize("see [docs](https://docs.rs) here");
        assert!(out.starts_with("see docs (https:"));
    }

    #[test]
    fn test_strips_code_and_headings() {
        let input = "## Title\n```rust\nlet x = 1;\n```\nuse `cargo` here";
        let out = sanitize(input);
        assert!(!out.contains('#'));
        assert!(!out.contains("```"));
        assert!(!out.contains('`'));
        assert!(out.contains("let x = 1;"));
        assert!(out.contains("cargo"));
    }

    #[test]
    fn test_strips_emphasis() {
        assert_eq!(sanitize("this is **bold** and *italic*"), "this is bold and italic");
        assert_eq!(sanitize("also __strong__ text"), "also strong text");
    }

    #[test]
    fn test_normalizes_bullets() {
        let input = "* one\n• two\n- three\n1. four";
        assert_eq!(sanitize(input), "- one\n- two\n- three\n- four");
    }

    #[test]
    fn test_drops_bullets_when_lists_not_preserved() {
        let options = SanitizeOptions {
            preserve_lists: false,
            max_blank_lines: 1,
        };
        assert_eq!(sanitize_with("* one\n* two", &options), "one\ntwo");
    }

    #[test]
    fn test_strips_html_and_decodes_entities() {
        let out = sanitize("<p>fish &amp; chips</p>");
        assert_eq!(out, "fish & chips");
    }

    #[test]
    fn test_sentence_spacing() {
        assert_eq!(sanitize("First.Second"), "First. Second");
        // 已有空格时不再追加
        assert_eq!(sanitize("First. Second"), "First. Second");
    }

    #[test]
    fn test_collapses_whitespace() {
        let input = "a   b\n\n\n\nc\n  d  ";
        assert_eq!(sanitize(input), "a b\n\nc\nd");
    }

    #[test]
    fn test_idempotent_on_plain_text() {
        let input = "Plain sentence. Nothing to do here.";
        let once = sanitize(input);
        assert_eq!(sanitize(&once), once);
    }

    #[test]
    fn test_idempotent_on_messy_markdown() {
        let input = "## Head\\n**bold** [x](http://a.b/c)\n\n\n* item\n<b>tag&amp;lt;</b>";
        let once = sanitize(input);
        assert_eq!(sanitize(&once), once);
    }

    #[test]
    fn test_idempotent_on_nested_entities() {
        // &amp;lt; 需要两轮才能稳定，fixpoint 循环吸收掉差异
        let input = "&amp;lt;div&amp;gt;content&amp;lt;/div&amp;gt;";
        let once = sanitize(input);
        assert_eq!(sanitize(&once), once);
    }
}
