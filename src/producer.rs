//! Format producer registry
//!
//! One [`Producer`] per target client turns canonical nodes, groups and rules into
//! that client's subscription format. The shared driver in
//! [`ProducerRegistry::produce`] does everything the clients have in common:
//! dropping or downgrading nodes a client cannot express, pruning group members
//! that point at dropped nodes, and expanding `include-all`/`filter` switches for
//! clients that lack them.

mod clash;
mod egern;
mod loon;
mod quanx;
mod sing_box;
mod surge;
mod uri;

pub use clash::{ClashFlavor, ClashProducer};
pub use egern::EgernProducer;
pub use loon::LoonProducer;
pub use quanx::QuantumultXProducer;
pub use sing_box::SingBoxProducer;
pub use surge::{SurgeFlavor, SurgeProducer};
pub use uri::{UriProducer, encode_uri};

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Result;
use regex::Regex;
use serde_yaml::Value;
use tracing::{debug, warn};

use crate::emit::emit_document;
use crate::model::{ProxyGroup, ProxyNode, ProxyType, Rule, is_sentinel};

pub const CONTENT_TYPE_YAML: &str = "text/yaml; charset=utf-8";
pub const CONTENT_TYPE_JSON: &str = "application/json; charset=utf-8";
pub const CONTENT_TYPE_TEXT: &str = "text/plain; charset=utf-8";

/// Probe URL for tested groups that do not carry one
pub const DEFAULT_TEST_URL: &str = "https://www.gstatic.com/generate_204";

/// Probe interval in seconds for tested groups that do not carry one
pub const DEFAULT_TEST_INTERVAL: u32 = 300;

// ============================================================================
// Output Format
// ============================================================================

/// Target client format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Clash,
    ClashMeta,
    Stash,
    Shadowrocket,
    Surfboard,
    Surge,
    SurgeMac,
    Loon,
    QuantumultX,
    Egern,
    SingBox,
    V2Ray,
    Uri,
}

impl Format {
    pub const ALL: [Format; 13] = [
        Format::Clash,
        Format::ClashMeta,
        Format::Stash,
        Format::Shadowrocket,
        Format::Surfboard,
        Format::Surge,
        Format::SurgeMac,
        Format::Loon,
        Format::QuantumultX,
        Format::Egern,
        Format::SingBox,
        Format::V2Ray,
        Format::Uri,
    ];

    /// Selector value as accepted on the command line and in config files
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Clash => "clash",
            Format::ClashMeta => "clashmeta",
            Format::Stash => "stash",
            Format::Shadowrocket => "shadowrocket",
            Format::Surfboard => "surfboard",
            Format::Surge => "surge",
            Format::SurgeMac => "surgemac",
            Format::Loon => "loon",
            Format::QuantumultX => "qx",
            Format::Egern => "egern",
            Format::SingBox => "sing-box",
            Format::V2Ray => "v2ray",
            Format::Uri => "uri",
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned for an unknown format selector
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormatParseError(pub String);

impl fmt::Display for FormatParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let known: Vec<&str> = Format::ALL.iter().map(Format::as_str).collect();
        write!(
            f,
            "unknown output format '{}', expected one of: {}",
            self.0,
            known.join(", ")
        )
    }
}

impl std::error::Error for FormatParseError {}

impl FromStr for Format {
    type Err = FormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let format = match s.trim().to_ascii_lowercase().as_str() {
            "clash" => Format::Clash,
            "clashmeta" | "clash-meta" | "meta" | "mihomo" => Format::ClashMeta,
            "stash" => Format::Stash,
            "shadowrocket" => Format::Shadowrocket,
            "surfboard" => Format::Surfboard,
            "surge" => Format::Surge,
            "surgemac" => Format::SurgeMac,
            "loon" => Format::Loon,
            "qx" | "quanx" | "quantumultx" => Format::QuantumultX,
            "egern" => Format::Egern,
            "sing-box" | "singbox" => Format::SingBox,
            "v2ray" => Format::V2Ray,
            "uri" => Format::Uri,
            _ => return Err(FormatParseError(s.to_string())),
        };
        Ok(format)
    }
}

// ============================================================================
// Errors and Results
// ============================================================================

/// Producer failures callers may want to match on
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProduceError {
    /// Every node was dropped as unsupported (or there were none)
    NothingToExport { format: Format },
    /// No producer is registered for the format
    MissingProducer { format: Format },
}

impl fmt::Display for ProduceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProduceError::NothingToExport { format } => {
                write!(f, "nothing to export: no proxy is supported by {}", format)
            }
            ProduceError::MissingProducer { format } => {
                write!(f, "no producer registered for format '{}'", format)
            }
        }
    }
}

impl std::error::Error for ProduceError {}

/// Serialized subscription plus anything that was dropped or downgraded on the way
#[derive(Debug, Clone, PartialEq)]
pub struct Produced {
    pub content: String,
    pub content_type: &'static str,
    pub warnings: Vec<String>,
}

/// Nodes, groups and rules after the shared preparation pass
#[derive(Debug, Clone, Default)]
pub struct ExportSet {
    pub nodes: Vec<ProxyNode>,
    pub groups: Vec<ProxyGroup>,
    pub rules: Vec<Rule>,
}

/// Outcome of fitting a node to a client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Adaptation {
    /// Exported unchanged
    Keep,
    /// Exported with some options removed; the reason becomes a warning
    Downgraded(String),
    /// Not exported; the reason becomes a warning
    Dropped(String),
}

// ============================================================================
// Producer Trait
// ============================================================================

/// Serializer for one client format
pub trait Producer: Send + Sync {
    fn format(&self) -> Format;

    fn content_type(&self) -> &'static str;

    /// Whether the client understands this proxy type at all
    fn supports(&self, proxy_type: ProxyType) -> bool;

    /// Whether groups may keep `include-all`/`filter`/`use` instead of explicit members
    fn keeps_group_filters(&self) -> bool {
        false
    }

    /// Fits a supported node to what the client can express
    fn adapt(&self, _node: &mut ProxyNode) -> Adaptation {
        Adaptation::Keep
    }

    /// Serializes the prepared set
    fn render(&self, set: &ExportSet, warnings: &mut Vec<String>) -> Result<String>;
}

// ============================================================================
// Producer Registry
// ============================================================================

/// Registry for format producers with dynamic dispatch
#[derive(Default)]
pub struct ProducerRegistry {
    producers: HashMap<Format, Arc<dyn Producer>>,
}

impl ProducerRegistry {
    pub fn new() -> Self {
        Self {
            producers: HashMap::new(),
        }
    }

    /// Creates a registry with a producer for every format
    pub fn with_builtin_producers() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ClashProducer::new(ClashFlavor::Clash)));
        registry.register(Arc::new(ClashProducer::new(ClashFlavor::Meta)));
        registry.register(Arc::new(ClashProducer::new(ClashFlavor::Stash)));
        registry.register(Arc::new(ClashProducer::new(ClashFlavor::Shadowrocket)));
        registry.register(Arc::new(SurgeProducer::new(SurgeFlavor::Surge)));
        registry.register(Arc::new(SurgeProducer::new(SurgeFlavor::SurgeMac)));
        registry.register(Arc::new(SurgeProducer::new(SurgeFlavor::Surfboard)));
        registry.register(Arc::new(LoonProducer));
        registry.register(Arc::new(QuantumultXProducer));
        registry.register(Arc::new(EgernProducer));
        registry.register(Arc::new(SingBoxProducer));
        registry.register(Arc::new(UriProducer::new(Format::Uri)));
        registry.register(Arc::new(UriProducer::new(Format::V2Ray)));
        registry
    }

    pub fn register(&mut self, producer: Arc<dyn Producer>) {
        self.producers.insert(producer.format(), producer);
    }

    pub fn get(&self, format: Format) -> Option<&Arc<dyn Producer>> {
        self.producers.get(&format)
    }

    /// Serializes nodes, groups and rules for `format`
    ///
    /// Without a format the canonical YAML document is returned as-is.
    pub fn produce(
        &self,
        format: Option<Format>,
        nodes: &[ProxyNode],
        groups: &[ProxyGroup],
        rules: &[Rule],
    ) -> Result<Produced> {
        let Some(format) = format else {
            debug!("No output format requested, emitting canonical YAML");
            return Ok(Produced {
                content: emit_document(nodes, groups, rules)?,
                content_type: CONTENT_TYPE_YAML,
                warnings: Vec::new(),
            });
        };

        let producer = self
            .get(format)
            .ok_or(ProduceError::MissingProducer { format })?;

        let mut warnings = Vec::new();
        let kept = select_nodes(producer.as_ref(), nodes, &mut warnings);
        if kept.is_empty() {
            return Err(ProduceError::NothingToExport { format }.into());
        }

        let set = ExportSet {
            groups: prepare_groups(groups, &kept, producer.keeps_group_filters(), &mut warnings),
            rules: rules.to_vec(),
            nodes: kept,
        };
        let content = producer.render(&set, &mut warnings)?;

        debug!(
            "Produced {} output: {} proxies, {} groups, {} rules, {} warnings",
            format,
            set.nodes.len(),
            set.groups.len(),
            set.rules.len(),
            warnings.len()
        );
        Ok(Produced {
            content,
            content_type: producer.content_type(),
            warnings,
        })
    }
}

/// Serializes with the built-in producers
pub fn produce(
    format: Option<Format>,
    nodes: &[ProxyNode],
    groups: &[ProxyGroup],
    rules: &[Rule],
) -> Result<Produced> {
    ProducerRegistry::with_builtin_producers().produce(format, nodes, groups, rules)
}

// ============================================================================
// Shared Preparation
// ============================================================================

fn select_nodes(producer: &dyn Producer, nodes: &[ProxyNode], warnings: &mut Vec<String>) -> Vec<ProxyNode> {
    let format = producer.format();
    let mut kept = Vec::with_capacity(nodes.len());
    for node in nodes {
        if !producer.supports(node.proxy_type) {
            let message = format!(
                "{}: {} proxies are not supported by {}",
                node.name, node.proxy_type, format
            );
            warn!("Dropping proxy {}", message);
            warnings.push(message);
            continue;
        }
        let mut node = node.clone();
        match producer.adapt(&mut node) {
            Adaptation::Keep => kept.push(node),
            Adaptation::Downgraded(reason) => {
                warn!("Downgrading proxy {}: {}", node.name, reason);
                warnings.push(format!("{}: {}", node.name, reason));
                kept.push(node);
            }
            Adaptation::Dropped(reason) => {
                warn!("Dropping proxy {}: {}", node.name, reason);
                warnings.push(format!("{}: {}", node.name, reason));
            }
        }
    }
    kept
}

/// Expands group switches where needed and prunes members that do not resolve
/// against the exported nodes
fn prepare_groups(
    groups: &[ProxyGroup],
    nodes: &[ProxyNode],
    keep_filters: bool,
    warnings: &mut Vec<String>,
) -> Vec<ProxyGroup> {
    let node_names: Vec<&str> = nodes.iter().map(|n| n.name.as_str()).collect();
    let node_set: HashSet<&str> = node_names.iter().copied().collect();
    let group_set: HashSet<&str> = groups.iter().map(|g| g.name.as_str()).collect();

    let mut prepared = Vec::with_capacity(groups.len());
    for group in groups {
        let mut group = group.clone();
        if !keep_filters {
            expand_group(&mut group, &node_names, warnings);
        }

        let name = group.name.clone();
        let mut seen = HashSet::new();
        group.proxies.retain(|member| {
            if !seen.insert(member.clone()) {
                return false;
            }
            let resolves = is_sentinel(member)
                || node_set.contains(member.as_str())
                || (group_set.contains(member.as_str()) && *member != name);
            if !resolves {
                warnings.push(format!("group '{}': removed member '{}'", name, member));
            }
            resolves
        });

        let selects_otherwise = keep_filters
            && (!group.use_providers.is_empty()
                || group.includes_all_proxies()
                || group.include_all_providers
                || group.filter.as_deref().is_some_and(|f| !f.is_empty()));
        if group.proxies.is_empty() && !selects_otherwise {
            warnings.push(format!("group '{}': no members left, falling back to DIRECT", name));
            group.proxies.push("DIRECT".to_string());
        }
        prepared.push(group);
    }
    prepared
}

/// Replaces `include-all`/`filter` with the explicit list of matching node names
pub fn expand_group(group: &mut ProxyGroup, node_names: &[&str], warnings: &mut Vec<String>) {
    let filter = group.filter.as_deref().filter(|f| !f.is_empty());
    if group.includes_all_proxies() || filter.is_some() {
        let include = compile_filter(&group.name, filter, warnings);
        let exclude = compile_filter(&group.name, group.exclude_filter.as_deref(), warnings);
        for name in node_names {
            let included = include.as_ref().is_none_or(|re| re.is_match(name));
            let excluded = exclude.as_ref().is_some_and(|re| re.is_match(name));
            if included && !excluded && !group.proxies.iter().any(|p| p == name) {
                group.proxies.push(name.to_string());
            }
        }
    }
    if !group.use_providers.is_empty() {
        warnings.push(format!(
            "group '{}': proxy providers are not supported by this format",
            group.name
        ));
    }

    group.include_all = false;
    group.include_all_proxies = false;
    group.include_all_providers = false;
    group.filter = None;
    group.exclude_filter = None;
    group.use_providers.clear();
}

fn compile_filter(group: &str, pattern: Option<&str>, warnings: &mut Vec<String>) -> Option<Regex> {
    let pattern = pattern.filter(|p| !p.is_empty())?;
    match Regex::new(pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            warnings.push(format!("group '{}': ignoring invalid filter '{}': {}", group, pattern, e));
            None
        }
    }
}

// ============================================================================
// Helpers for Producers
// ============================================================================

/// Server address without IPv6 brackets
pub fn bare_server(server: &str) -> &str {
    server.trim_start_matches('[').trim_end_matches(']')
}

/// Renders a scalar field value as plain text
pub fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Sequence(items) => {
            let parts: Vec<String> = items.iter().filter_map(value_text).collect();
            (!parts.is_empty()).then(|| parts.join(","))
        }
        _ => None,
    }
}

/// Maps canonical field names onto a client's option names as `key=value` pairs
///
/// Fields absent on the node are skipped.
pub fn mapped_fields(node: &ProxyNode, table: &[(&str, &str)]) -> Vec<String> {
    table
        .iter()
        .filter_map(|(canonical, target)| {
            node.get(canonical)
                .and_then(value_text)
                .map(|value| format!("{}={}", target, value))
        })
        .collect()
}

/// Transport settings pulled out of `network` and its option block
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransportView {
    /// `tcp` when the node declares no network
    pub network: String,
    pub path: Option<String>,
    pub host: Option<String>,
    pub service_name: Option<String>,
    pub http_upgrade: bool,
}

impl TransportView {
    pub fn of(node: &ProxyNode) -> Self {
        let network = node.network().unwrap_or("tcp").to_string();
        let mut view = TransportView {
            network,
            ..Default::default()
        };
        match view.network.as_str() {
            "ws" => {
                view.path = node.nested_str("ws-opts", "path").map(str::to_string);
                view.host = node
                    .get_mapping("ws-opts")
                    .and_then(|o| o.get("headers"))
                    .and_then(Value::as_mapping)
                    .and_then(|h| h.get("Host").or_else(|| h.get("host")))
                    .and_then(Value::as_str)
                    .map(str::to_string);
                view.http_upgrade = node
                    .get_mapping("ws-opts")
                    .and_then(|o| o.get("v2ray-http-upgrade"))
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
            }
            "grpc" => {
                view.service_name = node
                    .nested_str("grpc-opts", "grpc-service-name")
                    .map(str::to_string);
            }
            "h2" => {
                view.path = node.nested_str("h2-opts", "path").map(str::to_string);
                view.host = node
                    .get_mapping("h2-opts")
                    .and_then(|o| o.get("host"))
                    .and_then(value_text);
            }
            _ => {}
        }
        view
    }

    pub fn is_tcp(&self) -> bool {
        self.network == "tcp"
    }
}

/// Parses bandwidth values such as `100`, `100 Mbps` or `"50mbps"` into Mbps
pub fn parse_mbps(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|v| u32::try_from(v).ok()),
        Value::String(s) => {
            let digits: String = s.trim().chars().take_while(char::is_ascii_digit).collect();
            digits.parse().ok()
        }
        _ => None,
    }
}

/// Sentinel members a text client cannot express
pub fn is_clash_only_sentinel(member: &str) -> bool {
    member == "PASS" || member == "PROXY"
}

/// Explicit member names of a group for clients without `PASS`/`PROXY`,
/// keeping a member that happens to be a real group or node of that name
pub fn text_members<'a>(group: &'a ProxyGroup, set: &ExportSet) -> Vec<&'a str> {
    group
        .proxies
        .iter()
        .map(String::as_str)
        .filter(|m| {
            !is_clash_only_sentinel(m)
                || set.groups.iter().any(|g| g.name == *m)
                || set.nodes.iter().any(|n| n.name == *m)
        })
        .collect()
}

/// Name usable inside comma-separated text directives
pub fn text_label(name: &str) -> String {
    name.replace([',', '='], " ").trim().to_string()
}

/// `host:port`, bracketing IPv6 literals
pub fn host_port(server: &str, port: u16) -> String {
    let host = bare_server(server);
    if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

/// Rule kinds the Surge-style text clients share with Clash
pub const TEXT_RULE_KINDS: [&str; 11] = [
    "DOMAIN",
    "DOMAIN-SUFFIX",
    "DOMAIN-KEYWORD",
    "DOMAIN-SET",
    "RULE-SET",
    "IP-CIDR",
    "IP-CIDR6",
    "GEOIP",
    "IP-ASN",
    "USER-AGENT",
    "URL-REGEX",
];

/// Renders rules as `TYPE,payload,target` lines with `terminal` in place of `MATCH`;
/// rule kinds the client lacks are skipped with a warning
pub fn text_rules(
    rules: &[Rule],
    terminal: &str,
    format: Format,
    warnings: &mut Vec<String>,
) -> Vec<String> {
    let mut lines = Vec::with_capacity(rules.len());
    for rule in rules {
        let target = text_label(&rule.target);
        let mut line = if rule.is_match() {
            format!("{},{}", terminal, target)
        } else if TEXT_RULE_KINDS.contains(&rule.kind.as_str()) {
            format!("{},{},{}", rule.kind, rule.payload, target)
        } else {
            warnings.push(format!("rule '{}' is not supported by {}", rule, format));
            continue;
        };
        for option in &rule.options {
            line.push(',');
            line.push_str(option);
        }
        lines.push(line);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::GroupType;

    fn node(name: &str, proxy_type: ProxyType) -> ProxyNode {
        let mut node = ProxyNode::new(name, proxy_type, "example.com", 443).unwrap();
        node.set("password", "pw");
        node.set("uuid", "uuid");
        node.set("cipher", "aes-128-gcm");
        node
    }

    #[test]
    fn test_format_from_str() {
        assert_eq!("sing-box".parse::<Format>().unwrap(), Format::SingBox);
        assert_eq!("singbox".parse::<Format>().unwrap(), Format::SingBox);
        assert_eq!("QX".parse::<Format>().unwrap(), Format::QuantumultX);
        for format in Format::ALL {
            assert_eq!(format.as_str().parse::<Format>().unwrap(), format);
        }
        let err = "xray".parse::<Format>().unwrap_err();
        assert!(err.to_string().contains("xray"));
    }

    #[test]
    fn test_registry_has_every_format() {
        let registry = ProducerRegistry::with_builtin_producers();
        for format in Format::ALL {
            assert!(registry.get(format).is_some(), "missing producer for {}", format);
        }
    }

    #[test]
    fn test_no_format_returns_canonical_yaml() {
        let nodes = vec![node("a", ProxyType::Shadowsocks)];
        let produced = produce(None, &nodes, &[], &[]).unwrap();
        assert_eq!(produced.content_type, CONTENT_TYPE_YAML);
        assert!(produced.content.starts_with("proxies:\n  - name: a\n    type: ss\n"));
    }

    #[test]
    fn test_nothing_to_export_is_typed() {
        let nodes = vec![node("a", ProxyType::AnyTls)];
        let err = produce(Some(Format::Clash), &nodes, &[], &[]).unwrap_err();
        let Some(ProduceError::NothingToExport { format }) = err.downcast_ref::<ProduceError>()
        else {
            panic!("Expected NothingToExport, got {:?}", err);
        };
        assert_eq!(*format, Format::Clash);

        assert!(produce(Some(Format::Uri), &[], &[], &[]).is_err());
    }

    #[test]
    fn test_unsupported_nodes_dropped_and_members_pruned() {
        let nodes = vec![node("ss", ProxyType::Shadowsocks), node("any", ProxyType::AnyTls)];
        let groups = vec![ProxyGroup::new(
            "Select",
            GroupType::Select,
            vec!["ss".into(), "any".into(), "DIRECT".into()],
        )];
        let produced = produce(Some(Format::Clash), &nodes, &groups, &[]).unwrap();
        assert_eq!(produced.warnings.len(), 2);
        let parsed: Value = serde_yaml::from_str(&produced.content).unwrap();
        let members = parsed["proxy-groups"][0]["proxies"].as_sequence().unwrap();
        assert_eq!(members.len(), 2);
        assert!(!produced.content.contains("name: any"));
    }

    #[test]
    fn test_expand_group_with_filter() {
        let mut group = ProxyGroup::new("HK", GroupType::UrlTest, Vec::new());
        group.include_all = true;
        group.filter = Some("(?i)hk|hong kong".to_string());
        group.exclude_filter = Some("expire".to_string());
        let mut warnings = Vec::new();
        expand_group(
            &mut group,
            &["HK 01", "hong kong 02", "HK expire", "US 01"],
            &mut warnings,
        );
        assert_eq!(group.proxies, vec!["HK 01", "hong kong 02"]);
        assert!(!group.include_all);
        assert!(group.filter.is_none());
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_empty_group_falls_back_to_direct() {
        let nodes = vec![node("a", ProxyType::Shadowsocks)];
        let groups = vec![ProxyGroup::new("G", GroupType::Select, vec!["gone".into()])];
        let mut warnings = Vec::new();
        let prepared = prepare_groups(&groups, &nodes, false, &mut warnings);
        assert_eq!(prepared[0].proxies, vec!["DIRECT"]);
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn test_keep_filters_for_meta() {
        let nodes = vec![node("a", ProxyType::Shadowsocks)];
        let mut group = ProxyGroup::new("All", GroupType::Select, Vec::new());
        group.include_all = true;
        let mut warnings = Vec::new();
        let prepared = prepare_groups(&[group], &nodes, true, &mut warnings);
        assert!(prepared[0].proxies.is_empty());
        assert!(prepared[0].include_all);
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_parse_mbps() {
        assert_eq!(parse_mbps(&Value::from(100)), Some(100));
        assert_eq!(parse_mbps(&Value::from("50 Mbps")), Some(50));
        assert_eq!(parse_mbps(&Value::from("fast")), None);
    }
}
