// Copyright (c) 2025 Kirky.X
//
// Licensed under the MIT License
// See LICENSE file in the project root for full license information.

use url::Url;

/// 提取URL的裸主机名（去掉协议与 www. 前缀）
pub fn bare_host(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let parsed = Url::parse(&with_scheme).ok()?;
    let host = parsed.host_str()?;
    let host = host.strip_prefix("www.").unwrap_or(host);
    if host.is_empty() {
        None
    } else {
        Some(host.to_lowercase())
    }
}

/// 规范化引用URL：去协议、www、查询串与片段，保留路径
pub fn normalize_citation_url(raw: &str) -> String {
    let trimmed = raw.trim();
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    match Url::parse(&with_scheme) {
        Ok(parsed) => {
            let host = parsed
                .host_str()
                .map(|h| h.strip_prefix("www.").unwrap_or(h).to_lowercase())
                .unwrap_or_default();
            let path = parsed.path().trim_end_matches('/');
            format!("{}{}", host, path)
        }
        Err(_) => trimmed.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bare_host_strips_scheme_and_www() {
        assert_eq!(bare_host("https://www.example.com/a/b"), Some("example.com".to_string()));
        assert_eq!(bare_host("http://Example.COM"), Some("example.com".to_string()));
    }

    #[test]
    fn test_bare_host_without_scheme() {
        assert_eq!(bare_host("www.example.com/path"), Some("example.com".to_string()));
        assert_eq!(bare_host("example.com"), Some("example.com".to_string()));
    }

    #[test]
    fn test_bare_host_invalid() {
        assert_eq!(bare_host(""), None);
        assert_eq!(bare_host("   "), None);
    }

    #[test]
    fn test_normalize_citation_url() {
        assert_eq!(
            normalize_citation_url("https://www.example.com/a/b?q=1#frag"),
            "example.com/a/b"
        );
        assert_eq!(normalize_citation_url("https://example.com/"), "example.com");
        assert_eq!(
            normalize_citation_url("example.com/path?utm=x"),
            "example.com/path"
        );
    }
}
