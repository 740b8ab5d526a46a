// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use trackrs::domain::services::brand_matcher;
use trackrs::utils::text_sanitizer::sanitize;

/// 清洗器对任意输入都必须是不动点
#[test]
fn test_sanitize_idempotent_over_corpus() {
    let corpus = [
        "",
        "plain text, nothing special",
        "## Heading\nBody **bold** _em_ `code`",
        "[link](https://example.com/path?q=1) trailing",
        "* bullet one\n* bullet two\n1. numbered",
        "```js\nconsole.log(1)\n```",
        "<div><p>html &amp; entities &lt;kept&gt;</p></div>",
        "&amp;lt;double-encoded&amp;gt;",
        "line\\nbreaks\\nliteral",
        "spaced.sentences!here?and:there",
        "a    lot     of   spaces\n\n\n\n\nand blank lines",
        "escaped \\* star \\_ underscore \\\\ backslash",
        "| col a | col b |\n|---|---|\n| 1 | 2 |",
        "mixed ![img](http://x/y.png) and [txt](http://a/b) **bold [l](u)**",
    ];

    for input in corpus {
        let once = sanitize(input);
        let twice = sanitize(&once);
        assert_eq!(once, twice, "not idempotent for input: {:?}", input);
    }
}

/// 品牌匹配对 NFD 规范化与弯引号替换不变
#[test]
fn test_brand_match_invariance_laws() {
    let brand_nfc = vec!["Caf\u{e9} Joe\u{2019}s".to_string()];
    let brand_nfd = vec!["Cafe\u{301} Joe's".to_string()];

    let text_nfc = "Everyone loves Caf\u{e9} Joe\u{2019}s downtown.";
    let text_nfd = "Everyone loves Cafe\u{301} Joe's downtown.";

    // 四种组合的命中次数必须一致
    let counts = [
        brand_matcher::count_brand_mentions(text_nfc, &brand_nfc).total,
        brand_matcher::count_brand_mentions(text_nfc, &brand_nfd).total,
        brand_matcher::count_brand_mentions(text_nfd, &brand_nfc).total,
        brand_matcher::count_brand_mentions(text_nfd, &brand_nfd).total,
    ];

    assert_eq!(counts, [1, 1, 1, 1]);
}

/// 清洗后的文本再匹配品牌，结果与直接匹配一致
#[test]
fn test_sanitize_then_match() {
    let markdown = "**Acme** is [great](https://example.com). <b>Acme</b> again.";
    let sanitized = sanitize(markdown);

    let stats = brand_matcher::count_brand_mentions(&sanitized, &["Acme".to_string()]);
    assert_eq!(stats.total, 2);
}
