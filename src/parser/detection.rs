//! Subscription format detection
//!
//! This module detects whether subscription content is a Base64 blob of links,
//! a plain list of links, or a canonical Clash/mihomo YAML document.

use tracing::debug;

use super::base64::decode_base64;

// ============================================================================
// Subscription Type Detection
// ============================================================================

/// Schemes the decoder understands
pub const PROXY_SCHEMES: [&str; 16] = [
    "ss://",
    "ssr://",
    "vmess://",
    "vless://",
    "trojan://",
    "hysteria://",
    "hysteria2://",
    "hy2://",
    "tuic://",
    "anytls://",
    "socks://",
    "socks5://",
    "wireguard://",
    "wg://",
    "http://",
    "https://",
];

/// Detected subscription content type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriptionType {
    /// Base64 encoded URI list
    Base64UriList,
    /// Plain text URI list (one URI per line)
    PlainUriList,
    /// Clash YAML format
    ClashYaml,
    /// Unknown format
    Unknown,
}

impl std::fmt::Display for SubscriptionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubscriptionType::Base64UriList => write!(f, "Base64 URI List"),
            SubscriptionType::PlainUriList => write!(f, "Plain URI List"),
            SubscriptionType::ClashYaml => write!(f, "Clash YAML"),
            SubscriptionType::Unknown => write!(f, "Unknown"),
        }
    }
}

/// Detects the type of subscription content
pub fn detect_subscription_type(content: &str) -> SubscriptionType {
    let trimmed = content.trim();
    let content_preview: String = trimmed.chars().take(100).collect();
    debug!(
        "Detecting subscription type, content length: {} bytes, preview: {:?}...",
        content.len(),
        content_preview
    );

    if is_clash_yaml(trimmed) {
        debug!("Detected Clash YAML format (contains proxy definitions)");
        return SubscriptionType::ClashYaml;
    }

    if is_plain_uri_list(trimmed) {
        debug!("Detected plain URI list format");
        return SubscriptionType::PlainUriList;
    }

    if is_base64_content(trimmed) {
        debug!("Detected Base64 encoded URI list format");
        return SubscriptionType::Base64UriList;
    }

    debug!("Unable to detect subscription format");
    SubscriptionType::Unknown
}

/// Checks if content is Clash YAML format
pub fn is_clash_yaml(content: &str) -> bool {
    let trimmed = content.trim();

    trimmed.starts_with("proxies:")
        || trimmed.starts_with("proxy-groups:")
        || trimmed.starts_with("port:")
        || trimmed.starts_with("mixed-port:")
        || (trimmed.contains("proxies:") && trimmed.contains("- name:"))
}

/// Checks if content is a plain URI list
///
/// Leading blank lines and `#` comments are skipped.
pub fn is_plain_uri_list(content: &str) -> bool {
    content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty() && !line.starts_with('#'))
        .is_some_and(is_proxy_uri)
}

/// Checks if a string looks like a proxy URI
pub fn is_proxy_uri(s: &str) -> bool {
    let lower = s.get(..16.min(s.len())).unwrap_or(s).to_ascii_lowercase();
    PROXY_SCHEMES.iter().any(|p| lower.starts_with(p))
}

/// Checks if content appears to be Base64 encoded
///
/// The content must decode and the decoded text must contain at least one link.
pub fn is_base64_content(content: &str) -> bool {
    let trimmed = content.trim();

    let cleaned: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
    if cleaned.len() < 4 {
        return false;
    }

    let is_valid_base64 = cleaned.chars().all(|c| {
        c.is_ascii_alphanumeric() || c == '+' || c == '/' || c == '=' || c == '-' || c == '_'
    });
    if !is_valid_base64 {
        return false;
    }

    if let Ok(decoded) = decode_base64(&cleaned)
        && let Ok(decoded_str) = String::from_utf8(decoded)
    {
        return decoded_str.contains("://")
            && decoded_str.lines().any(|line| is_proxy_uri(line.trim()));
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD;

    #[test]
    fn test_detect_plain_uri_list() {
        let content = "ss://YWVzLTI1Ni1nY206cGFzc3dvcmQ@example.com:8388#tag\nvmess://...";
        assert_eq!(
            detect_subscription_type(content),
            SubscriptionType::PlainUriList
        );
    }

    #[test]
    fn test_detect_plain_uri_list_after_comment() {
        let content = "# exported\n\ntrojan://pw@example.com:443#t";
        assert_eq!(
            detect_subscription_type(content),
            SubscriptionType::PlainUriList
        );
    }

    #[test]
    fn test_detect_base64_uri_list() {
        let content = STANDARD.encode("vless://uuid@example.com:443#a\ntrojan://pw@b.com:443#b");
        assert_eq!(
            detect_subscription_type(&content),
            SubscriptionType::Base64UriList
        );
    }

    #[test]
    fn test_detect_clash_yaml() {
        let content = "proxies:\n  - name: test\n    type: ss";
        assert_eq!(
            detect_subscription_type(content),
            SubscriptionType::ClashYaml
        );
    }

    #[test]
    fn test_detect_unknown() {
        assert_eq!(detect_subscription_type("hello world"), SubscriptionType::Unknown);
        assert_eq!(detect_subscription_type(""), SubscriptionType::Unknown);
        // Valid Base64 but no links inside
        let content = STANDARD.encode("just some text");
        assert_eq!(detect_subscription_type(&content), SubscriptionType::Unknown);
    }

    #[test]
    fn test_is_clash_yaml_invalid() {
        assert!(!is_clash_yaml("not yaml"));
        assert!(!is_clash_yaml(r#"{"json": true}"#));
    }

    #[test]
    fn test_is_proxy_uri() {
        assert!(is_proxy_uri("ss://abc"));
        assert!(is_proxy_uri("VMESS://xyz"));
        assert!(is_proxy_uri("hy2://auth@host:port"));
        assert!(is_proxy_uri("wg://key@host:1"));
        assert!(is_proxy_uri("anytls://pw@host:1"));
        assert!(!is_proxy_uri("not a uri"));
        assert!(!is_proxy_uri("ftp://example.com"));
        assert!(!is_proxy_uri(""));
    }

    #[test]
    fn test_subscription_type_display() {
        assert_eq!(
            format!("{}", SubscriptionType::Base64UriList),
            "Base64 URI List"
        );
        assert_eq!(format!("{}", SubscriptionType::ClashYaml), "Clash YAML");
        assert_eq!(format!("{}", SubscriptionType::Unknown), "Unknown");
    }
}
