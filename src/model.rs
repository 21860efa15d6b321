//! Canonical proxy model
//!
//! Every decoder produces [`ProxyNode`]s and every producer consumes them. The
//! record keeps the four keys all protocols share as typed fields and carries the
//! protocol-specific rest in an insertion-ordered YAML mapping, so new protocol
//! fields never require touching the producers that do not care about them.

use std::fmt;
use std::str::FromStr;

use anyhow::{Result, anyhow, bail};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_yaml::{Mapping, Value};

// ============================================================================
// Proxy Type
// ============================================================================

/// Closed set of proxy protocols known to the codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyType {
    Shadowsocks,
    ShadowsocksR,
    VMess,
    VLess,
    Trojan,
    Hysteria,
    Hysteria2,
    Tuic,
    Socks5,
    WireGuard,
    AnyTls,
    Snell,
    Http,
}

impl ProxyType {
    /// All protocol types, in canonical order
    pub const ALL: [ProxyType; 13] = [
        ProxyType::Shadowsocks,
        ProxyType::ShadowsocksR,
        ProxyType::VMess,
        ProxyType::VLess,
        ProxyType::Trojan,
        ProxyType::Hysteria,
        ProxyType::Hysteria2,
        ProxyType::Tuic,
        ProxyType::Socks5,
        ProxyType::WireGuard,
        ProxyType::AnyTls,
        ProxyType::Snell,
        ProxyType::Http,
    ];

    /// Canonical `type` value as written in mihomo-style YAML
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyType::Shadowsocks => "ss",
            ProxyType::ShadowsocksR => "ssr",
            ProxyType::VMess => "vmess",
            ProxyType::VLess => "vless",
            ProxyType::Trojan => "trojan",
            ProxyType::Hysteria => "hysteria",
            ProxyType::Hysteria2 => "hysteria2",
            ProxyType::Tuic => "tuic",
            ProxyType::Socks5 => "socks5",
            ProxyType::WireGuard => "wireguard",
            ProxyType::AnyTls => "anytls",
            ProxyType::Snell => "snell",
            ProxyType::Http => "http",
        }
    }
}

impl fmt::Display for ProxyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProxyType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let proxy_type = match s.trim().to_ascii_lowercase().as_str() {
            "ss" | "shadowsocks" => ProxyType::Shadowsocks,
            "ssr" | "shadowsocksr" => ProxyType::ShadowsocksR,
            "vmess" => ProxyType::VMess,
            "vless" => ProxyType::VLess,
            "trojan" => ProxyType::Trojan,
            "hysteria" => ProxyType::Hysteria,
            "hysteria2" | "hy2" => ProxyType::Hysteria2,
            "tuic" => ProxyType::Tuic,
            "socks5" | "socks" => ProxyType::Socks5,
            "wireguard" | "wg" => ProxyType::WireGuard,
            "anytls" => ProxyType::AnyTls,
            "snell" => ProxyType::Snell,
            "http" | "https" => ProxyType::Http,
            other => bail!("Unknown proxy type: {}", other),
        };
        Ok(proxy_type)
    }
}

impl Serialize for ProxyType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ProxyType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Proxy Node
// ============================================================================

/// Canonical proxy node: typed common keys plus an open, ordered field map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProxyNode {
    /// Display name, never empty
    pub name: String,

    /// Protocol
    #[serde(rename = "type")]
    pub proxy_type: ProxyType,

    /// Server address (hostname or IP literal)
    pub server: String,

    /// Server port, 1-65535
    #[serde(deserialize_with = "deserialize_port")]
    pub port: u16,

    /// Protocol-specific fields in insertion order
    #[serde(flatten)]
    pub extra: Mapping,
}

impl ProxyNode {
    /// Creates a node, rejecting an empty server or a zero port.
    ///
    /// An empty name falls back to `server:port`.
    pub fn new(
        name: impl Into<String>,
        proxy_type: ProxyType,
        server: impl Into<String>,
        port: u16,
    ) -> Result<Self> {
        let server = server.into();
        if server.is_empty() {
            bail!("{} node is missing a server address", proxy_type);
        }
        if port == 0 {
            bail!("{} node has invalid port 0", proxy_type);
        }
        let mut name = name.into().trim().to_string();
        if name.is_empty() {
            name = format!("{}:{}", server, port);
        }
        Ok(Self {
            name,
            proxy_type,
            server,
            port,
            extra: Mapping::new(),
        })
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }

    /// Reads a boolean, accepting the `"true"`/`"1"` strings some links carry
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.extra.get(key)? {
            Value::Bool(b) => Some(*b),
            Value::String(s) => parse_bool_flag(s),
            Value::Number(n) => n.as_u64().map(|v| v != 0),
            _ => None,
        }
    }

    /// Reads an unsigned number, accepting numeric strings
    pub fn get_u64(&self, key: &str) -> Option<u64> {
        match self.extra.get(key)? {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn get_mapping(&self, key: &str) -> Option<&Mapping> {
        self.extra.get(key).and_then(Value::as_mapping)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.extra.contains_key(key)
    }

    /// Inserts or replaces a field, keeping the position of an existing key
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.extra.insert(Value::from(key), value.into());
    }

    /// Inserts a field only when it is not present yet
    pub fn set_default(&mut self, key: &str, value: impl Into<Value>) {
        if !self.contains(key) {
            self.set(key, value);
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.extra.remove(key)
    }

    pub fn udp(&self) -> bool {
        self.get_bool("udp").unwrap_or(false)
    }

    pub fn tls(&self) -> bool {
        self.get_bool("tls").unwrap_or(false)
    }

    pub fn network(&self) -> Option<&str> {
        self.get_str("network")
    }

    /// TLS server name, whichever of `servername`/`sni` the protocol uses
    pub fn server_name(&self) -> Option<&str> {
        self.get_str("servername").or_else(|| self.get_str("sni"))
    }

    pub fn skip_cert_verify(&self) -> bool {
        self.get_bool("skip-cert-verify").unwrap_or(false)
    }

    pub fn alpn(&self) -> Vec<String> {
        match self.extra.get("alpn") {
            Some(Value::Sequence(items)) => items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect(),
            Some(Value::String(s)) => split_list(s),
            _ => Vec::new(),
        }
    }

    pub fn has_reality(&self) -> bool {
        self.get_mapping("reality-opts").is_some()
    }

    /// Reads a string from a nested option block, e.g. `ws-opts.path`
    pub fn nested_str(&self, block: &str, key: &str) -> Option<&str> {
        self.get_mapping(block)
            .and_then(|m| m.get(key))
            .and_then(Value::as_str)
    }

    /// Returns the mapping form with `name, type, server, port` leading
    pub fn to_mapping(&self) -> Mapping {
        let mut mapping = Mapping::new();
        mapping.insert("name".into(), self.name.clone().into());
        mapping.insert("type".into(), self.proxy_type.as_str().into());
        mapping.insert("server".into(), self.server.clone().into());
        mapping.insert("port".into(), u64::from(self.port).into());
        for (key, value) in &self.extra {
            mapping.insert(key.clone(), value.clone());
        }
        mapping
    }

    /// Builds a node from a YAML mapping such as a `proxies:` entry
    pub fn from_mapping(mapping: &Mapping) -> Result<Self> {
        serde_yaml::from_value(Value::Mapping(mapping.clone()))
            .map_err(|e| anyhow!("Invalid proxy entry: {}", e))
    }
}

// ============================================================================
// Proxy Group
// ============================================================================

/// Reserved member tokens that never resolve to a node or a group
pub const SENTINELS: [&str; 4] = ["DIRECT", "REJECT", "PROXY", "PASS"];

pub fn is_sentinel(name: &str) -> bool {
    SENTINELS.contains(&name)
}

/// Group selection policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GroupType {
    Select,
    UrlTest,
    Fallback,
    LoadBalance,
    Relay,
}

impl GroupType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GroupType::Select => "select",
            GroupType::UrlTest => "url-test",
            GroupType::Fallback => "fallback",
            GroupType::LoadBalance => "load-balance",
            GroupType::Relay => "relay",
        }
    }

    /// Whether the group probes its members with a test URL
    pub fn is_tested(&self) -> bool {
        matches!(
            self,
            GroupType::UrlTest | GroupType::Fallback | GroupType::LoadBalance
        )
    }
}

impl FromStr for GroupType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "select" => Ok(GroupType::Select),
            "url-test" => Ok(GroupType::UrlTest),
            "fallback" => Ok(GroupType::Fallback),
            "load-balance" => Ok(GroupType::LoadBalance),
            "relay" => Ok(GroupType::Relay),
            other => bail!("Unknown proxy group type: {}", other),
        }
    }
}

impl fmt::Display for GroupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named selection policy over proxies and other groups
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ProxyGroup {
    pub name: String,

    #[serde(rename = "type")]
    pub group_type: GroupType,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub proxies: Vec<String>,

    /// Proxy provider names
    #[serde(default, rename = "use", skip_serializing_if = "Vec::is_empty")]
    pub use_providers: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    #[serde(
        default,
        deserialize_with = "deserialize_opt_u32",
        skip_serializing_if = "Option::is_none"
    )]
    pub interval: Option<u32>,

    #[serde(
        default,
        deserialize_with = "deserialize_opt_u32",
        skip_serializing_if = "Option::is_none"
    )]
    pub tolerance: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lazy: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hidden: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_filter: Option<String>,

    #[serde(default, skip_serializing_if = "crate::singbox::util::is_false")]
    pub include_all: bool,

    #[serde(default, skip_serializing_if = "crate::singbox::util::is_false")]
    pub include_all_proxies: bool,

    #[serde(default, skip_serializing_if = "crate::singbox::util::is_false")]
    pub include_all_providers: bool,

    #[serde(flatten)]
    pub extra: Mapping,
}

impl ProxyGroup {
    pub fn new(name: impl Into<String>, group_type: GroupType, proxies: Vec<String>) -> Self {
        Self {
            name: name.into(),
            group_type,
            proxies,
            use_providers: Vec::new(),
            url: None,
            interval: None,
            tolerance: None,
            strategy: None,
            lazy: None,
            hidden: None,
            filter: None,
            exclude_filter: None,
            include_all: false,
            include_all_proxies: false,
            include_all_providers: false,
            extra: Mapping::new(),
        }
    }

    /// Whether the group pulls in every proxy implicitly
    pub fn includes_all_proxies(&self) -> bool {
        self.include_all || self.include_all_proxies
    }

    /// Builds a group from a YAML mapping such as a `proxy-groups:` entry
    pub fn from_mapping(mapping: &Mapping) -> Result<Self> {
        serde_yaml::from_value(Value::Mapping(mapping.clone()))
            .map_err(|e| anyhow!("Invalid proxy group entry: {}", e))
    }

    pub fn to_mapping(&self) -> Result<Mapping> {
        match serde_yaml::to_value(self)? {
            Value::Mapping(mapping) => Ok(mapping),
            _ => bail!("Proxy group '{}' did not serialize to a mapping", self.name),
        }
    }
}

// ============================================================================
// Rule
// ============================================================================

/// One routing directive in Clash one-line syntax
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// Upper-case rule type, e.g. `DOMAIN-SUFFIX`
    pub kind: String,
    /// Match payload; empty for `MATCH`
    pub payload: String,
    /// Action target: a group, proxy or sentinel name
    pub target: String,
    /// Trailing options such as `no-resolve`
    pub options: Vec<String>,
}

impl Rule {
    pub fn new(kind: &str, payload: &str, target: &str) -> Self {
        Self {
            kind: kind.to_ascii_uppercase(),
            payload: payload.to_string(),
            target: target.to_string(),
            options: Vec::new(),
        }
    }

    pub fn is_match(&self) -> bool {
        self.kind == "MATCH" || self.kind == "FINAL"
    }
}

impl FromStr for Rule {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        let kind = parts
            .first()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| anyhow!("Empty rule"))?
            .to_ascii_uppercase();

        if kind == "MATCH" || kind == "FINAL" {
            let target = parts
                .get(1)
                .filter(|t| !t.is_empty())
                .ok_or_else(|| anyhow!("MATCH rule is missing a target: {}", s))?;
            return Ok(Rule {
                kind: "MATCH".to_string(),
                payload: String::new(),
                target: target.to_string(),
                options: parts[2..].iter().map(|o| o.to_string()).collect(),
            });
        }

        if parts.len() < 3 || parts[1].is_empty() || parts[2].is_empty() {
            bail!("Rule must have the form TYPE,PAYLOAD,TARGET: {}", s);
        }
        Ok(Rule {
            kind,
            payload: parts[1].to_string(),
            target: parts[2].to_string(),
            options: parts[3..].iter().map(|o| o.to_string()).collect(),
        })
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_match() {
            write!(f, "MATCH,{}", self.target)?;
        } else {
            write!(f, "{},{},{}", self.kind, self.payload, self.target)?;
        }
        for option in &self.options {
            write!(f, ",{}", option)?;
        }
        Ok(())
    }
}

// ============================================================================
// Canonical Document
// ============================================================================

/// Canonical YAML document: the `proxies`, `proxy-groups` and `rules` sections
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ClashDocument {
    #[serde(default)]
    pub proxies: Vec<Mapping>,

    #[serde(default, rename = "proxy-groups")]
    pub proxy_groups: Vec<Mapping>,

    #[serde(default)]
    pub rules: Vec<Value>,
}

impl ClashDocument {
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| anyhow!("Failed to parse YAML document: {}", e))
    }

    /// Parses the rule strings, returning the malformed ones separately
    pub fn parsed_rules(&self) -> (Vec<Rule>, Vec<String>) {
        let mut rules = Vec::new();
        let mut invalid = Vec::new();
        for entry in &self.rules {
            match entry.as_str().map(str::parse::<Rule>) {
                Some(Ok(rule)) => rules.push(rule),
                Some(Err(_)) => invalid.push(entry.as_str().unwrap_or_default().to_string()),
                None => invalid.push(format!("{:?}", entry)),
            }
        }
        (rules, invalid)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Parses the boolean spellings found in share links
pub fn parse_bool_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

/// Splits a comma-separated list, dropping empty entries
pub fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Accepts `300` and `'300'` for numeric group options
fn deserialize_opt_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberValue {
        Number(u32),
        String(String),
    }

    match Option::<NumberValue>::deserialize(deserializer)? {
        None => Ok(None),
        Some(NumberValue::Number(n)) => Ok(Some(n)),
        Some(NumberValue::String(s)) => s.trim().parse().map(Some).map_err(serde::de::Error::custom),
    }
}

/// Custom deserializer for port (handles both string and number)
fn deserialize_port<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PortValue {
        Number(u64),
        String(String),
    }

    let port = match PortValue::deserialize(deserializer)? {
        PortValue::Number(n) => n,
        PortValue::String(s) => s.trim().parse().map_err(serde::de::Error::custom)?,
    };
    match u16::try_from(port) {
        Ok(p) if p > 0 => Ok(p),
        _ => Err(serde::de::Error::custom(format!(
            "port {} is out of range 1-65535",
            port
        ))),
    }
}
