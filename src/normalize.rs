//! Field normalizer
//!
//! Decoders copy protocol-native keys (`pbk`, `sid`, `fp`, `security`, ...) onto the
//! node more or less as they appear in the link. [`normalize`] then folds them onto
//! the canonical mihomo-style field names, groups them into nested option blocks,
//! applies protocol defaults and scrubs every intermediate key so it never shows up
//! next to its canonical counterpart.

use serde_yaml::{Mapping, Value};
use tracing::trace;
use url::Url;

use crate::model::{ProxyNode, ProxyType, parse_bool_flag, split_list};

// ============================================================================
// Alias Table
// ============================================================================

/// Where an aliased key ends up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AliasTarget {
    /// Top-level field
    TopLevel,
    /// Field inside `reality-opts`, only when Reality is enabled
    Reality,
    /// `servername` for protocols whose TLS name lives there
    ServerName,
    /// Top-level boolean field
    Flag,
}

/// Abbreviated or protocol-native keys and their canonical names
const FIELD_ALIASES: [(&str, &str, AliasTarget); 7] = [
    ("pbk", "public-key", AliasTarget::Reality),
    ("sid", "short-id", AliasTarget::Reality),
    ("spx", "spider-x", AliasTarget::Reality),
    ("fp", "client-fingerprint", AliasTarget::TopLevel),
    ("sni", "servername", AliasTarget::ServerName),
    ("allowInsecure", "skip-cert-verify", AliasTarget::Flag),
    ("insecure", "skip-cert-verify", AliasTarget::Flag),
];

/// Intermediate keys that must never reach the output
pub const EXCLUDED_KEYS: [&str; 16] = [
    "pbk",
    "sid",
    "spx",
    "fp",
    "security",
    "allowInsecure",
    "insecure",
    "headerType",
    "serviceName",
    "encryption",
    "packetEncoding",
    "obfsParam",
    "peer",
    "mport",
    "ws-path",
    "ws-headers",
];

/// Option block keys, in the order producers look for them
pub const OPTION_BLOCKS: [&str; 4] = ["ws-opts", "grpc-opts", "h2-opts", "reality-opts"];

// ============================================================================
// Query Parameters
// ============================================================================

/// Percent-decoded query parameters in link order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryParams {
    pairs: Vec<(String, String)>,
}

impl QueryParams {
    /// Parses a raw query string (`a=1&b=2`)
    ///
    /// Only percent escapes are decoded; `+` stays literal because Base64 keys in
    /// hand-written links are rarely escaped.
    pub fn parse(query: &str) -> Self {
        let pairs = query
            .trim_start_matches('?')
            .split('&')
            .filter(|pair| !pair.is_empty())
            .map(|pair| {
                let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
                (percent_decode(key), percent_decode(value))
            })
            .collect();
        Self { pairs }
    }

    pub fn from_url(url: &Url) -> Self {
        Self {
            pairs: url.query_pairs().into_owned().collect(),
        }
    }

    /// First value for `key`, ignoring empty values
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(k, v)| k == key && !v.is_empty())
            .map(|(_, v)| v.as_str())
    }

    /// First non-empty value among several spellings of the same key
    pub fn get_any(&self, keys: &[&str]) -> Option<&str> {
        keys.iter().find_map(|key| self.get(key))
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(parse_bool_flag)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.get(key).and_then(|v| v.trim().parse().ok())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

// ============================================================================
// Decoder Helpers
// ============================================================================

/// Copies the TLS and Reality related query parameters onto a node verbatim
///
/// The keys keep their link spelling here; [`normalize`] renames them.
pub fn copy_tls_params(node: &mut ProxyNode, params: &QueryParams) {
    for key in ["security", "sni", "fp", "pbk", "sid", "spx", "allowInsecure", "insecure"] {
        if let Some(value) = params.get(key) {
            node.set(key, value);
        }
    }
    if let Some(alpn) = params.get("alpn") {
        node.set("alpn", string_list(&split_list(alpn)));
    }
    if let Some(flow) = params.get("flow") {
        node.set("flow", flow);
    }
}

/// Maps the V2Ray transport query parameters (`type`, `path`, `host`,
/// `serviceName`) onto `network` and the matching option block
pub fn apply_transport_params(node: &mut ProxyNode, params: &QueryParams) {
    let network = params.get_any(&["type", "net"]).unwrap_or("tcp");
    apply_transport(
        node,
        network,
        params.get("path"),
        params.get("host"),
        params.get_any(&["serviceName", "service_name"]),
    );
}

/// Sets `network` and builds its option block from already-extracted values
pub fn apply_transport(
    node: &mut ProxyNode,
    network: &str,
    path: Option<&str>,
    host: Option<&str>,
    service_name: Option<&str>,
) {
    let path = path.filter(|p| !p.is_empty());
    let host = host.filter(|h| !h.is_empty());
    match network.to_ascii_lowercase().as_str() {
        "ws" | "websocket" | "httpupgrade" => {
            let mut opts = Mapping::new();
            if let Some(path) = path {
                opts.insert("path".into(), path.into());
            }
            if let Some(host) = host {
                let mut headers = Mapping::new();
                headers.insert("Host".into(), host.into());
                opts.insert("headers".into(), Value::Mapping(headers));
            }
            if network.eq_ignore_ascii_case("httpupgrade") {
                opts.insert("v2ray-http-upgrade".into(), true.into());
            }
            node.set("network", "ws");
            if !opts.is_empty() {
                node.set("ws-opts", Value::Mapping(opts));
            }
        }
        "grpc" | "gun" => {
            let mut opts = Mapping::new();
            if let Some(service_name) = service_name.or(path).filter(|s| !s.is_empty()) {
                opts.insert("grpc-service-name".into(), service_name.into());
            }
            node.set("network", "grpc");
            node.set("grpc-opts", Value::Mapping(opts));
        }
        "h2" | "http" => {
            let mut opts = Mapping::new();
            if let Some(host) = host {
                opts.insert("host".into(), string_list(&split_list(host)));
            }
            if let Some(path) = path {
                opts.insert("path".into(), path.into());
            }
            node.set("network", "h2");
            if !opts.is_empty() {
                node.set("h2-opts", Value::Mapping(opts));
            }
        }
        "" | "tcp" | "none" => {}
        other => {
            trace!("Keeping unrecognised transport '{}' as network", other);
            node.set("network", other);
        }
    }
}

/// Percent-decodes a link component, keeping the raw text when it is not valid UTF-8
pub fn percent_decode(s: &str) -> String {
    urlencoding::decode(s)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| s.to_string())
}

/// Builds a YAML sequence of strings
pub fn string_list(items: &[String]) -> Value {
    Value::Sequence(items.iter().map(|s| Value::from(s.as_str())).collect())
}

// ============================================================================
// Normalization
// ============================================================================

/// Rewrites a node onto canonical field names and applies protocol defaults
pub fn normalize(node: &mut ProxyNode) {
    apply_security(node);
    fold_aliases(node);
    fold_legacy_ws_keys(node);
    coerce_reality_strings(node);

    if let Some(Value::String(alpn)) = node.get("alpn").cloned() {
        node.set("alpn", string_list(&split_list(&alpn)));
    }

    apply_defaults(node);

    for key in EXCLUDED_KEYS {
        if node.remove(key).is_some() {
            trace!("Scrubbed intermediate key '{}' from '{}'", key, node.name);
        }
    }
}

/// Normalizes a node that came from a share link
///
/// UDP relay is assumed on unless the link said otherwise.
pub fn normalize_decoded(node: &mut ProxyNode) {
    normalize(node);
    node.set_default("udp", true);
}

fn apply_security(node: &mut ProxyNode) {
    let Some(security) = node.get_str("security").map(str::to_ascii_lowercase) else {
        return;
    };
    match security.as_str() {
        "tls" | "xtls" => node.set("tls", true),
        "reality" => {
            node.set("tls", true);
            if !node.has_reality() {
                node.set("reality-opts", Value::Mapping(Mapping::new()));
            }
        }
        _ => {}
    }
}

fn fold_aliases(node: &mut ProxyNode) {
    let reality = node.has_reality();
    let uses_servername = matches!(node.proxy_type, ProxyType::VMess | ProxyType::VLess);

    for (raw, canonical, target) in FIELD_ALIASES {
        let Some(value) = node.get(raw).cloned() else {
            continue;
        };
        match target {
            AliasTarget::TopLevel => {
                node.remove(raw);
                node.set_default(canonical, value);
            }
            AliasTarget::Reality => {
                node.remove(raw);
                if !reality {
                    trace!("Dropping '{}' from '{}': Reality is not enabled", raw, node.name);
                    continue;
                }
                if let Some(Value::Mapping(opts)) = node.extra.get_mut("reality-opts") {
                    let key = Value::from(canonical);
                    if !opts.contains_key(&key) {
                        opts.insert(key, value);
                    }
                }
            }
            AliasTarget::ServerName => {
                if uses_servername {
                    node.remove(raw);
                    node.set_default(canonical, value);
                }
            }
            AliasTarget::Flag => {
                node.remove(raw);
                let flag = match &value {
                    Value::Bool(b) => *b,
                    Value::String(s) => parse_bool_flag(s).unwrap_or(false),
                    Value::Number(n) => n.as_u64().is_some_and(|v| v != 0),
                    _ => false,
                };
                if flag {
                    node.set(canonical, true);
                }
            }
        }
    }
}

/// Folds the pre-`ws-opts` keys older configs still carry
fn fold_legacy_ws_keys(node: &mut ProxyNode) {
    if node.contains("ws-opts") {
        return;
    }
    let path = node.get("ws-path").cloned();
    let headers = node.get("ws-headers").cloned();
    if path.is_none() && headers.is_none() {
        return;
    }
    let mut opts = Mapping::new();
    if let Some(path) = path {
        opts.insert("path".into(), path);
    }
    if let Some(headers) = headers {
        opts.insert("headers".into(), headers);
    }
    node.set("ws-opts", Value::Mapping(opts));
}

/// Keeps Reality keys as strings even when YAML read them as numbers
fn coerce_reality_strings(node: &mut ProxyNode) {
    let Some(Value::Mapping(opts)) = node.extra.get_mut("reality-opts") else {
        return;
    };
    for key in ["short-id", "public-key"] {
        if let Some(value) = opts.get_mut(key) {
            if let Value::Number(n) = value {
                *value = Value::String(n.to_string());
            }
        }
    }
}

fn apply_defaults(node: &mut ProxyNode) {
    match node.proxy_type {
        ProxyType::Trojan => node.set_default("tls", true),
        ProxyType::VMess => {
            node.set_default("alterId", 0);
            node.set_default("cipher", "auto");
            node.set_default("tfo", false);
        }
        _ => {}
    }
    if node.has_reality() {
        node.set("tls", true);
        node.set_default("skip-cert-verify", true);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(proxy_type: ProxyType) -> ProxyNode {
        ProxyNode::new("n", proxy_type, "example.com", 443).unwrap()
    }

    #[test]
    fn test_reality_keys_fold_into_block() {
        let mut n = node(ProxyType::VLess);
        n.set("security", "reality");
        n.set("pbk", "PUBKEY");
        n.set("sid", "ABCD");
        n.set("sni", "sni.example.com");
        n.set("fp", "chrome");
        normalize(&mut n);

        assert_eq!(n.nested_str("reality-opts", "public-key"), Some("PUBKEY"));
        assert_eq!(n.nested_str("reality-opts", "short-id"), Some("ABCD"));
        assert_eq!(n.get_str("servername"), Some("sni.example.com"));
        assert_eq!(n.get_str("client-fingerprint"), Some("chrome"));
        assert!(n.skip_cert_verify());
        assert!(n.tls());
        for key in ["pbk", "sid", "sni", "fp", "security"] {
            assert!(!n.contains(key), "{} leaked", key);
        }
    }

    #[test]
    fn test_reality_keys_dropped_without_reality() {
        let mut n = node(ProxyType::VLess);
        n.set("security", "tls");
        n.set("pbk", "PUBKEY");
        normalize(&mut n);
        assert!(!n.has_reality());
        assert!(!n.contains("pbk"));
        assert!(!n.skip_cert_verify());
    }

    #[test]
    fn test_sni_kept_for_trojan() {
        let mut n = node(ProxyType::Trojan);
        n.set("sni", "t.example.com");
        normalize(&mut n);
        assert_eq!(n.get_str("sni"), Some("t.example.com"));
        assert!(!n.contains("servername"));
        assert!(n.tls());
    }

    #[test]
    fn test_vmess_defaults() {
        let mut n = node(ProxyType::VMess);
        normalize(&mut n);
        assert_eq!(n.get_bool("tfo"), Some(false));
        assert_eq!(n.get_str("cipher"), Some("auto"));
    }

    #[test]
    fn test_insecure_flag_becomes_skip_cert_verify() {
        let mut n = node(ProxyType::Hysteria2);
        n.set("insecure", "1");
        normalize(&mut n);
        assert!(n.skip_cert_verify());
        assert!(!n.contains("insecure"));
    }

    #[test]
    fn test_numeric_short_id_becomes_string() {
        let mut reality = Mapping::new();
        reality.insert("short-id".into(), 1234.into());
        let mut n = node(ProxyType::VLess);
        n.set("reality-opts", Value::Mapping(reality));
        normalize(&mut n);
        assert_eq!(n.nested_str("reality-opts", "short-id"), Some("1234"));
    }

    #[test]
    fn test_transport_blocks() {
        let mut n = node(ProxyType::VLess);
        apply_transport_params(&mut n, &QueryParams::parse("type=ws&path=%2Fws&host=cdn.example.com"));
        assert_eq!(n.network(), Some("ws"));
        assert_eq!(n.nested_str("ws-opts", "path"), Some("/ws"));

        let mut n = node(ProxyType::VLess);
        apply_transport_params(&mut n, &QueryParams::parse("type=grpc&serviceName=svc"));
        assert_eq!(n.nested_str("grpc-opts", "grpc-service-name"), Some("svc"));

        let mut n = node(ProxyType::VLess);
        apply_transport_params(&mut n, &QueryParams::parse("type=tcp"));
        assert!(n.network().is_none());
    }

    #[test]
    fn test_legacy_ws_keys_folded() {
        let mut n = node(ProxyType::VMess);
        n.set("network", "ws");
        n.set("ws-path", "/old");
        normalize(&mut n);
        assert_eq!(n.nested_str("ws-opts", "path"), Some("/old"));
        assert!(!n.contains("ws-path"));
    }

    #[test]
    fn test_decoded_nodes_default_udp() {
        let mut n = node(ProxyType::Shadowsocks);
        normalize_decoded(&mut n);
        assert!(n.udp());

        let mut n = node(ProxyType::Shadowsocks);
        n.set("udp", false);
        normalize_decoded(&mut n);
        assert!(!n.udp());
    }

    #[test]
    fn test_query_params_keep_plus() {
        let params = QueryParams::parse("publickey=ab+cd%3D");
        assert_eq!(params.get("publickey"), Some("ab+cd="));
    }

    #[test]
    fn test_query_params_skip_empty_values() {
        let params = QueryParams::parse("?sni=&host=a.com&peer=b.com");
        assert_eq!(params.get("sni"), None);
        assert_eq!(params.get_any(&["sni", "peer"]), Some("b.com"));
        assert!(params.contains("host"));
    }
}
