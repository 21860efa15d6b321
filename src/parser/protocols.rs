//! Protocol parsers module
//!
//! This module contains parsers for the share-link formats of every supported
//! protocol. Each parser implements the `ProtocolParser` trait and produces a raw
//! [`ProxyNode`]; the registry then runs the field normalizer over it.

mod anytls;
mod http;
mod hysteria;
mod hysteria2;
mod shadowsocks;
mod shadowsocksr;
mod socks;
mod trojan;
mod tuic;
mod vless;
mod vmess;
mod wireguard;

pub use anytls::AnyTlsParser;
pub use http::HttpParser;
pub use hysteria::HysteriaParser;
pub use hysteria2::Hysteria2Parser;
pub use shadowsocks::ShadowsocksParser;
pub use shadowsocksr::ShadowsocksRParser;
pub use socks::SocksParser;
pub use trojan::TrojanParser;
pub use tuic::TuicParser;
pub use vless::VLessParser;
pub use vmess::VMessParser;
pub use wireguard::WireGuardParser;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use anyhow::{Result, anyhow, bail};
use tracing::{debug, warn};
use url::Url;

use crate::model::{ProxyGroup, ProxyNode, Rule};
use crate::normalize::{normalize_decoded, percent_decode};

// ============================================================================
// Protocol Parser Trait
// ============================================================================

/// Trait for parsing individual protocol URIs
pub trait ProtocolParser: Send + Sync {
    /// Returns the protocol scheme this parser handles (e.g., "ss", "vmess")
    fn scheme(&self) -> &str;

    /// Parses a URI string into a raw, not yet normalized node
    fn parse(&self, uri: &str) -> Result<ProxyNode>;

    /// Checks if this parser can handle the given URI
    fn can_parse(&self, uri: &str) -> bool {
        uri.starts_with(&format!("{}://", self.scheme()))
    }
}

// ============================================================================
// Decode Results
// ============================================================================

/// A line that could not be decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeFailure {
    /// 1-based line (or entry) number in the decoded input
    pub line: usize,
    pub reason: String,
}

impl fmt::Display for DecodeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {}: {}", self.line, self.reason)
    }
}

/// Result of decoding a batch of links or a whole subscription
#[derive(Debug, Clone, Default)]
pub struct DecodeReport {
    /// Decoded nodes in input order
    pub nodes: Vec<ProxyNode>,
    /// Groups carried by a YAML input
    pub groups: Vec<ProxyGroup>,
    /// Rules carried by a YAML input
    pub rules: Vec<Rule>,
    /// Skipped lines and why
    pub failures: Vec<DecodeFailure>,
}

impl DecodeReport {
    /// Appends another report, keeping input order
    pub fn merge(&mut self, other: DecodeReport) {
        self.nodes.extend(other.nodes);
        self.groups.extend(other.groups);
        self.rules.extend(other.rules);
        self.failures.extend(other.failures);
    }
}

// ============================================================================
// Protocol Registry
// ============================================================================

/// Registry for protocol parsers with dynamic dispatch
#[derive(Default)]
pub struct ProtocolRegistry {
    parsers: HashMap<String, Arc<dyn ProtocolParser>>,
}

impl ProtocolRegistry {
    /// Creates a new empty registry
    pub fn new() -> Self {
        Self {
            parsers: HashMap::new(),
        }
    }

    /// Creates a registry with all built-in parsers registered
    pub fn with_builtin_parsers() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ShadowsocksParser));
        registry.register(Arc::new(ShadowsocksRParser));
        registry.register(Arc::new(VMessParser));
        registry.register(Arc::new(VLessParser));
        registry.register(Arc::new(TrojanParser));
        registry.register(Arc::new(HysteriaParser));
        registry.register(Arc::new(Hysteria2Parser::new("hysteria2")));
        registry.register(Arc::new(Hysteria2Parser::new("hy2")));
        registry.register(Arc::new(TuicParser));
        registry.register(Arc::new(AnyTlsParser));
        registry.register(Arc::new(SocksParser::new("socks")));
        registry.register(Arc::new(SocksParser::new("socks5")));
        registry.register(Arc::new(WireGuardParser::new("wireguard")));
        registry.register(Arc::new(WireGuardParser::new("wg")));
        registry.register(Arc::new(HttpParser::new("http")));
        registry.register(Arc::new(HttpParser::new("https")));
        registry
    }

    /// Registers a protocol parser
    pub fn register(&mut self, parser: Arc<dyn ProtocolParser>) {
        self.parsers.insert(parser.scheme().to_string(), parser);
    }

    /// Gets a parser for the given scheme
    pub fn get(&self, scheme: &str) -> Option<&Arc<dyn ProtocolParser>> {
        self.parsers.get(scheme)
    }

    /// Parses one link into a normalized node
    pub fn parse_uri(&self, uri: &str) -> Result<ProxyNode> {
        let uri = uri.trim();
        let scheme = extract_scheme(uri)?.to_ascii_lowercase();
        debug!("Parsing URI with scheme '{}'", scheme);

        let parser = self
            .parsers
            .get(&scheme)
            .ok_or_else(|| anyhow!("No parser registered for scheme: {}", scheme))?;

        match parser.parse(uri) {
            Ok(mut node) => {
                normalize_decoded(&mut node);
                debug!("Successfully parsed {} URI -> node '{}'", scheme, node.name);
                Ok(node)
            }
            Err(e) => {
                debug!("Failed to parse {} URI: {}", scheme, e);
                Err(e)
            }
        }
    }

    /// Parses multiple URIs from content (one per line)
    ///
    /// Empty lines and `#` comments are skipped; each result carries its 1-based
    /// line number.
    pub fn parse_uri_list(&self, content: &str) -> Vec<(usize, Result<ProxyNode>)> {
        let lines: Vec<(usize, &str)> = content
            .lines()
            .enumerate()
            .map(|(idx, line)| (idx + 1, line.trim()))
            .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
            .collect();

        debug!("Parsing {} URI lines from content", lines.len());

        lines
            .into_iter()
            .map(|(line_no, line)| (line_no, self.parse_uri(line)))
            .collect()
    }

    /// Parses multiple URIs, keeping the nodes and recording every failure
    pub fn decode_lines(&self, content: &str) -> DecodeReport {
        let mut report = DecodeReport::default();
        for (line, result) in self.parse_uri_list(content) {
            match result {
                Ok(node) => report.nodes.push(node),
                Err(e) => {
                    warn!("Skipping line {}: {:#}", line, e);
                    report.failures.push(DecodeFailure {
                        line,
                        reason: format!("{:#}", e),
                    });
                }
            }
        }

        debug!(
            "URI list parsing complete: {} successful, {} failed",
            report.nodes.len(),
            report.failures.len()
        );
        report
    }

    /// Parses multiple URIs, collecting only successful results
    pub fn parse_uri_list_lossy(&self, content: &str) -> Vec<ProxyNode> {
        self.decode_lines(content).nodes
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Parses host:port string, handling IPv6 addresses in brackets
pub fn parse_host_port(hostport: &str) -> Result<(String, u16)> {
    // Handle IPv6 addresses: [::1]:8080
    if hostport.starts_with('[') {
        let bracket_end = hostport
            .find(']')
            .ok_or_else(|| anyhow!("Invalid IPv6 address: missing closing bracket"))?;

        let host = hostport[1..bracket_end].to_string();
        let port_str = hostport
            .get(bracket_end + 2..)
            .ok_or_else(|| anyhow!("Missing port after IPv6 address"))?;

        let port = parse_port(port_str)?;
        return Ok((host, port));
    }

    // Handle regular host:port
    let colon_pos = hostport
        .rfind(':')
        .ok_or_else(|| anyhow!("Invalid host:port format: missing colon"))?;

    let host = hostport[..colon_pos].to_string();
    if host.is_empty() {
        bail!("Invalid host:port format: missing host");
    }
    let port = parse_port(&hostport[colon_pos + 1..])?;

    Ok((host, port))
}

/// Parses a port number, rejecting 0
pub fn parse_port(s: &str) -> Result<u16> {
    match s.trim().parse::<u16>() {
        Ok(0) | Err(_) => bail!("Invalid port number: {}", s),
        Ok(port) => Ok(port),
    }
}

/// Extracts the scheme from a URI
pub fn extract_scheme(uri: &str) -> Result<&str> {
    // First check that :// actually exists in the URI
    if !uri.contains("://") {
        bail!("Invalid URI: missing scheme separator ://");
    }
    uri.split("://")
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| anyhow!("Invalid URI: missing scheme"))
}

/// Splits `#name` off a link, percent-decoding the name
pub fn split_fragment(uri: &str) -> (&str, Option<String>) {
    match uri.split_once('#') {
        Some((main, fragment)) => (main, Some(percent_decode(fragment))),
        None => (uri, None),
    }
}

/// Splits `?query` off a link body, dropping a `/` before the query
pub fn split_query(body: &str) -> (&str, &str) {
    match body.split_once('?') {
        Some((main, query)) => (main.trim_end_matches('/'), query),
        None => (body.trim_end_matches('/'), ""),
    }
}

/// Server address of a parsed URL
///
/// The `url` crate keeps IPv6 literals bracketed; brackets are stripped unless the
/// target client needs them.
pub fn url_server(url: &Url, keep_brackets: bool) -> Result<String> {
    let host = url
        .host_str()
        .filter(|h| !h.is_empty())
        .ok_or_else(|| anyhow!("URI missing host"))?;
    if keep_brackets {
        return Ok(host.to_string());
    }
    Ok(host.trim_start_matches('[').trim_end_matches(']').to_string())
}

/// Port of a parsed URL, falling back to `default` when the link omits it
pub fn url_port(url: &Url, default: Option<u16>) -> Result<u16> {
    url.port_or_known_default()
        .or(default)
        .filter(|p| *p != 0)
        .ok_or_else(|| anyhow!("URI missing port"))
}

/// Percent-decoded fragment of a parsed URL, or an empty name
pub fn url_name(url: &Url) -> String {
    url.fragment().map(percent_decode).unwrap_or_default()
}

/// Percent-decoded user part of a parsed URL
pub fn url_username(url: &Url) -> String {
    percent_decode(url.username())
}
