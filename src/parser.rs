//! Subscription and Protocol Parsing Module
//!
//! This module provides functionality for:
//! - Detecting subscription content types (Base64 URI list, plain URI list, Clash YAML)
//! - Decoding content (handling Base64 encoding with various line break scenarios)
//! - Parsing share links for every supported protocol into canonical nodes
//! - Dynamic dispatch to appropriate parsers based on detected type
//!
//! Decoding never aborts a batch: a malformed line is skipped and recorded as a
//! [`DecodeFailure`] next to the nodes that did decode.

pub mod base64;
pub mod detection;
pub mod protocols;

pub use self::base64::{decode_base64, decode_subscription_content};
pub use detection::{SubscriptionType, detect_subscription_type};
pub use protocols::{DecodeFailure, DecodeReport, ProtocolParser, ProtocolRegistry};

use anyhow::{Context, Result};
use tracing::{debug, trace, warn};

use crate::model::{ClashDocument, ProxyGroup, ProxyNode};
use crate::normalize::normalize;

// ============================================================================
// Subscription Parser Trait
// ============================================================================

/// Trait for parsing different subscription formats
pub trait SubscriptionParser: Send + Sync {
    /// Returns the subscription type this parser handles
    fn subscription_type(&self) -> SubscriptionType;

    /// Parses subscription content into nodes, groups and rules
    fn parse(&self, content: &str, registry: &ProtocolRegistry) -> Result<DecodeReport>;
}

/// Parser for plain URI list subscriptions
pub struct UriListParser;

impl SubscriptionParser for UriListParser {
    fn subscription_type(&self) -> SubscriptionType {
        SubscriptionType::PlainUriList
    }

    fn parse(&self, content: &str, registry: &ProtocolRegistry) -> Result<DecodeReport> {
        debug!("Parsing plain URI list subscription");
        let report = registry.decode_lines(content);
        debug!(
            "Plain URI list parsing complete: {} nodes",
            report.nodes.len()
        );
        Ok(report)
    }
}

/// Parser for Base64 encoded URI lists
pub struct Base64UriListParser;

impl SubscriptionParser for Base64UriListParser {
    fn subscription_type(&self) -> SubscriptionType {
        SubscriptionType::Base64UriList
    }

    fn parse(&self, content: &str, registry: &ProtocolRegistry) -> Result<DecodeReport> {
        debug!("Parsing Base64 encoded URI list subscription");
        let decoded = decode_subscription_content(content)?;
        debug!("Base64 decoded content length: {} bytes", decoded.len());
        let report = registry.decode_lines(&decoded);
        debug!(
            "Base64 URI list parsing complete: {} nodes",
            report.nodes.len()
        );
        Ok(report)
    }
}

/// Parser for canonical Clash/mihomo YAML documents
///
/// Proxies are read as-is and normalized; groups and rules are carried along.
pub struct ClashYamlParser;

impl SubscriptionParser for ClashYamlParser {
    fn subscription_type(&self) -> SubscriptionType {
        SubscriptionType::ClashYaml
    }

    fn parse(&self, content: &str, _registry: &ProtocolRegistry) -> Result<DecodeReport> {
        debug!("Parsing Clash YAML subscription");
        let document = ClashDocument::from_yaml(content).context("Invalid Clash YAML subscription")?;

        let mut report = DecodeReport::default();
        for (idx, mapping) in document.proxies.iter().enumerate() {
            match ProxyNode::from_mapping(mapping) {
                Ok(mut node) => {
                    normalize(&mut node);
                    trace!("  - Proxy: {}", node.name);
                    report.nodes.push(node);
                }
                Err(e) => {
                    warn!("Skipping proxy entry {}: {:#}", idx + 1, e);
                    report.failures.push(DecodeFailure {
                        line: idx + 1,
                        reason: format!("{:#}", e),
                    });
                }
            }
        }

        for (idx, mapping) in document.proxy_groups.iter().enumerate() {
            match ProxyGroup::from_mapping(mapping) {
                Ok(group) => {
                    trace!("  - Group: {}", group.name);
                    report.groups.push(group);
                }
                Err(e) => {
                    warn!("Skipping proxy group entry {}: {:#}", idx + 1, e);
                    report.failures.push(DecodeFailure {
                        line: idx + 1,
                        reason: format!("proxy-groups: {:#}", e),
                    });
                }
            }
        }

        let (rules, invalid) = document.parsed_rules();
        for rule in invalid {
            warn!("Ignoring malformed rule: {}", rule);
        }
        report.rules = rules;

        debug!(
            "Clash YAML parsing complete: {} proxies, {} groups, {} rules",
            report.nodes.len(),
            report.groups.len(),
            report.rules.len()
        );
        Ok(report)
    }
}

// ============================================================================
// Unified Subscription Parsing
// ============================================================================

/// Parses subscription content with automatic type detection
pub fn parse_subscription(content: &str) -> Result<DecodeReport> {
    let registry = ProtocolRegistry::with_builtin_parsers();
    parse_subscription_with_registry(content, &registry)
}

/// Parses subscription content using a custom registry
///
/// Content that matches no known layout falls back to literal line splitting, so
/// every line is still attempted and reported.
pub fn parse_subscription_with_registry(
    content: &str,
    registry: &ProtocolRegistry,
) -> Result<DecodeReport> {
    let subscription_type = detect_subscription_type(content);
    debug!("Detected subscription type: {}", subscription_type);

    match subscription_type {
        SubscriptionType::PlainUriList | SubscriptionType::Unknown => {
            UriListParser.parse(content, registry)
        }
        SubscriptionType::Base64UriList => Base64UriListParser.parse(content, registry),
        SubscriptionType::ClashYaml => ClashYamlParser.parse(content, registry),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProxyType;
    use ::base64::Engine;
    use ::base64::engine::general_purpose::STANDARD;

    const LINKS: &str = "ss://YWVzLTI1Ni1nY206cGFzc3dvcmQ=@example.com:8388#A\n\
                         trojan://pw@t.example.com:443#B";

    #[test]
    fn test_parse_plain_list() {
        let report = parse_subscription(LINKS).unwrap();
        assert_eq!(report.nodes.len(), 2);
        assert!(report.failures.is_empty());
    }

    #[test]
    fn test_parse_base64_blob() {
        let report = parse_subscription(&STANDARD.encode(LINKS)).unwrap();
        let names: Vec<&str> = report.nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["A", "B"]);
    }

    #[test]
    fn test_parse_clash_yaml() {
        let yaml = r#"
proxies:
  - name: hk
    type: vless
    server: hk.example.com
    port: 443
    uuid: abc
    sni: hk.example.com
  - name: broken
    type: ss
proxy-groups:
  - name: Proxy
    type: select
    proxies: [hk]
rules:
  - MATCH,Proxy
  - not a rule
"#;
        let report = parse_subscription(yaml).unwrap();
        assert_eq!(report.nodes.len(), 1);
        assert_eq!(report.nodes[0].proxy_type, ProxyType::VLess);
        // sni is folded into servername for vless
        assert_eq!(report.nodes[0].get_str("servername"), Some("hk.example.com"));
        // YAML input keeps its own udp setting
        assert!(!report.nodes[0].contains("udp"));
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].line, 2);
        assert_eq!(report.groups.len(), 1);
        assert_eq!(report.rules.len(), 1);
    }

    #[test]
    fn test_parse_clash_yaml_skips_bad_groups() {
        let yaml = r#"
proxies:
  - {name: a, type: trojan, server: a.example.com, port: 443, password: pw}
  - {name: b, type: trojan, server: b.example.com, port: 443, password: pw}
proxy-groups:
  - {name: Auto, type: url-test, proxies: [a, b], interval: '300', tolerance: "50"}
  - {name: Smart, type: smart, proxies: [a]}
rules:
  - MATCH,Auto
  - [not, a, string]
"#;
        let report = parse_subscription(yaml).unwrap();
        assert_eq!(report.nodes.len(), 2);
        assert_eq!(report.groups.len(), 1);
        assert_eq!(report.groups[0].interval, Some(300));
        assert_eq!(report.groups[0].tolerance, Some(50));
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].line, 2);
        assert!(report.failures[0].reason.starts_with("proxy-groups"));
        assert_eq!(report.rules.len(), 1);
    }

    #[test]
    fn test_unknown_content_reports_each_line() {
        let report = parse_subscription("hello\nworld").unwrap();
        assert!(report.nodes.is_empty());
        assert_eq!(report.failures.len(), 2);
    }
}
