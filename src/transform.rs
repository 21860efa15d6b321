//! Node list transformation utilities
//!
//! This module provides the transforms the converter applies between decoding
//! and producing:
//! - IPv6 server filtering
//! - Country code extraction from flag emojis
//! - Name de-duplication
//! - Default group generation (country-based and catch-all)

use std::collections::{BTreeMap, HashSet};
use std::net::Ipv6Addr;

use tracing::{debug, info};

use crate::model::{GroupType, ProxyGroup, ProxyNode, Rule};
use crate::producer::{DEFAULT_TEST_INTERVAL, DEFAULT_TEST_URL};

/// Name of the generated catch-all selector
pub const SELECT_GROUP_NAME: &str = "Select";

/// Name of the generated latency-tested group
pub const AUTO_GROUP_NAME: &str = "Auto";

// ============================================================================
// IPv6 Filtering
// ============================================================================

/// Check if a server address is an IPv6 address.
///
/// Handles both raw IPv6 addresses (e.g., "::1", "2001:db8::1")
/// and bracketed IPv6 addresses (e.g., "[::1]", "[2001:db8::1]").
pub fn is_ipv6_address(server: &str) -> bool {
    let addr = server.trim_start_matches('[').trim_end_matches(']');
    addr.parse::<Ipv6Addr>().is_ok()
}

/// Filter out nodes that have IPv6 server addresses.
///
/// Returns a new vector containing only nodes with IPv4 or hostname servers.
pub fn filter_ipv6_nodes(nodes: Vec<ProxyNode>) -> Vec<ProxyNode> {
    let original_count = nodes.len();
    let filtered: Vec<ProxyNode> = nodes
        .into_iter()
        .filter(|node| {
            if is_ipv6_address(&node.server) {
                debug!("Filtering out IPv6 node: {} (server={})", node.name, node.server);
                return false;
            }
            true
        })
        .collect();

    let removed_count = original_count - filtered.len();
    if removed_count > 0 {
        info!("Filtered out {} IPv6 nodes", removed_count);
    }

    filtered
}

// ============================================================================
// Country Code Extraction
// ============================================================================

/// Extract a country code from a flag emoji in a string.
///
/// Flag emojis are composed of two Regional Indicator Symbols, ranging from
/// U+1F1E6 (A) to U+1F1FF (Z). Returns the two-letter ISO 3166-1 alpha-2 code
/// of the first flag found.
pub fn extract_country_code(text: &str) -> Option<String> {
    let chars: Vec<char> = text.chars().collect();

    for pair in chars.windows(2) {
        if let (Some(a), Some(b)) = (
            regional_indicator_to_letter(pair[0]),
            regional_indicator_to_letter(pair[1]),
        ) {
            return Some(format!("{}{}", a, b));
        }
    }

    None
}

fn regional_indicator_to_letter(c: char) -> Option<char> {
    let code = c as u32;
    if (0x1F1E6..=0x1F1FF).contains(&code) {
        let offset = (code - 0x1F1E6) as u8;
        Some((b'A' + offset) as char)
    } else {
        None
    }
}

fn letter_to_regional_indicator(c: char) -> Option<char> {
    let upper = c.to_ascii_uppercase();
    if upper.is_ascii_uppercase() {
        char::from_u32(0x1F1E6 + (upper as u32 - 'A' as u32))
    } else {
        None
    }
}

/// Convert a two-letter country code to a flag emoji.
///
/// For example, "US" becomes "🇺🇸", "JP" becomes "🇯🇵".
pub fn country_code_to_flag(code: &str) -> Option<String> {
    let chars: Vec<char> = code.chars().collect();
    if chars.len() != 2 {
        return None;
    }

    let ri1 = letter_to_regional_indicator(chars[0])?;
    let ri2 = letter_to_regional_indicator(chars[1])?;

    Some(format!("{}{}", ri1, ri2))
}

/// Format a country code with its flag emoji, e.g. "🇺🇸 US"
pub fn format_country_code_with_flag(code: &str) -> String {
    match country_code_to_flag(code) {
        Some(flag) => format!("{} {}", flag, code),
        None => code.to_string(),
    }
}

// ============================================================================
// Name De-duplication
// ============================================================================

/// Renames repeated node names to `name 2`, `name 3`, ... in input order.
///
/// Returns the number of renamed nodes.
pub fn dedupe_names(nodes: &mut [ProxyNode]) -> usize {
    let mut taken: HashSet<String> = nodes.iter().map(|n| n.name.clone()).collect();
    let mut seen: HashSet<String> = HashSet::new();
    let mut renamed = 0;

    for node in nodes.iter_mut() {
        if seen.insert(node.name.clone()) {
            continue;
        }
        let mut suffix = 2;
        let unique = loop {
            let candidate = format!("{} {}", node.name, suffix);
            if !taken.contains(&candidate) {
                break candidate;
            }
            suffix += 1;
        };
        debug!("Renamed duplicate node '{}' to '{}'", node.name, unique);
        taken.insert(unique.clone());
        seen.insert(unique.clone());
        node.name = unique;
        renamed += 1;
    }

    if renamed > 0 {
        info!("Renamed {} duplicate node names", renamed);
    }
    renamed
}

// ============================================================================
// Group Generation
// ============================================================================

/// Options for [`generate_default_groups`]
#[derive(Debug, Clone)]
pub struct GroupOptions {
    /// Add one selector per flag found in node names
    pub country_groups: bool,
    /// Country codes to keep; empty keeps all
    pub country_codes: Vec<String>,
    pub test_url: String,
    pub test_interval: u32,
}

impl Default for GroupOptions {
    fn default() -> Self {
        Self {
            country_groups: true,
            country_codes: Vec::new(),
            test_url: DEFAULT_TEST_URL.to_string(),
            test_interval: DEFAULT_TEST_INTERVAL,
        }
    }
}

/// Group node names by the country code of their flag emoji, sorted by code
pub fn group_nodes_by_country(nodes: &[ProxyNode]) -> BTreeMap<String, Vec<String>> {
    let mut groups: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for node in nodes {
        if let Some(code) = extract_country_code(&node.name) {
            groups.entry(code).or_default().push(node.name.clone());
        }
    }
    groups
}

/// Generate one select group per country code, named like "🇺🇸 US".
///
/// If `allowed_codes` is empty every code found is kept; otherwise only the
/// listed codes (case-insensitive).
pub fn generate_country_groups(nodes: &[ProxyNode], allowed_codes: &[String]) -> Vec<ProxyGroup> {
    let allowed: HashSet<String> = allowed_codes.iter().map(|c| c.to_uppercase()).collect();

    let groups: Vec<ProxyGroup> = group_nodes_by_country(nodes)
        .into_iter()
        .filter(|(code, _)| allowed.is_empty() || allowed.contains(code))
        .map(|(code, members)| {
            let name = format_country_code_with_flag(&code);
            debug!("Generated country group: {} with {} nodes", name, members.len());
            ProxyGroup::new(name, GroupType::Select, members)
        })
        .collect();

    info!("Generated {} country groups", groups.len());
    groups
}

/// Generate the default group layout and its catch-all rule.
///
/// `Select` offers `Auto`, the country groups, every node and `DIRECT`;
/// `Auto` latency-tests every node. The single rule is `MATCH,Select`.
pub fn generate_default_groups(nodes: &[ProxyNode], options: &GroupOptions) -> (Vec<ProxyGroup>, Vec<Rule>) {
    let node_names: Vec<String> = nodes.iter().map(|n| n.name.clone()).collect();

    let country_groups = if options.country_groups {
        generate_country_groups(nodes, &options.country_codes)
    } else {
        Vec::new()
    };

    let mut select_members = vec![AUTO_GROUP_NAME.to_string()];
    select_members.extend(country_groups.iter().map(|g| g.name.clone()));
    select_members.extend(node_names.iter().cloned());
    select_members.push("DIRECT".to_string());

    let mut auto = ProxyGroup::new(AUTO_GROUP_NAME, GroupType::UrlTest, node_names);
    auto.url = Some(options.test_url.clone());
    auto.interval = Some(options.test_interval);

    let mut groups = vec![
        ProxyGroup::new(SELECT_GROUP_NAME, GroupType::Select, select_members),
        auto,
    ];
    groups.extend(country_groups);

    info!("Generated {} default groups", groups.len());
    (groups, vec![Rule::new("MATCH", "", SELECT_GROUP_NAME)])
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProxyType;

    fn node(name: &str, server: &str) -> ProxyNode {
        ProxyNode::new(name, ProxyType::Socks5, server, 1080).unwrap()
    }

    // ------------------------------------------------------------------------
    // IPv6 Filtering Tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_is_ipv6_address() {
        assert!(is_ipv6_address("::1"));
        assert!(is_ipv6_address("2001:db8::1"));
        assert!(is_ipv6_address("[2001:db8::1]"));
        assert!(!is_ipv6_address("192.168.1.1"));
        assert!(!is_ipv6_address("example.com"));
    }

    #[test]
    fn test_filter_ipv6_nodes() {
        let nodes = vec![
            node("v4", "192.168.1.1"),
            node("v6", "::1"),
            node("v6-bracketed", "[2001:db8::1]"),
            node("host", "proxy.example.com"),
        ];
        let names: Vec<String> = filter_ipv6_nodes(nodes).into_iter().map(|n| n.name).collect();
        assert_eq!(names, vec!["v4", "host"]);
    }

    // ------------------------------------------------------------------------
    // Country Code Tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_extract_country_code() {
        assert_eq!(extract_country_code("🇺🇸 US Server"), Some("US".to_string()));
        assert_eq!(extract_country_code("Server 🇬🇧 London"), Some("GB".to_string()));
        assert_eq!(extract_country_code("🇺🇸 to 🇯🇵"), Some("US".to_string()));
        assert_eq!(extract_country_code("No flag here"), None);
        assert_eq!(extract_country_code(""), None);
    }

    #[test]
    fn test_extract_country_code_single_regional_indicator() {
        assert_eq!(extract_country_code("🇺 incomplete"), None);
    }

    #[test]
    fn test_country_code_to_flag() {
        assert_eq!(country_code_to_flag("JP"), Some("🇯🇵".to_string()));
        assert_eq!(country_code_to_flag("gb"), Some("🇬🇧".to_string()));
        assert_eq!(country_code_to_flag("USA"), None);
        assert_eq!(country_code_to_flag(""), None);
        assert_eq!(format_country_code_with_flag("HK"), "🇭🇰 HK");
    }

    // ------------------------------------------------------------------------
    // De-duplication Tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_dedupe_names() {
        let mut nodes = vec![
            node("hk", "1.1.1.1"),
            node("hk", "1.1.1.2"),
            node("hk 2", "1.1.1.3"),
            node("hk", "1.1.1.4"),
        ];
        assert_eq!(dedupe_names(&mut nodes), 2);
        let names: Vec<&str> = nodes.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["hk", "hk 3", "hk 2", "hk 4"]);
    }

    #[test]
    fn test_dedupe_names_unique_input() {
        let mut nodes = vec![node("a", "1.1.1.1"), node("b", "1.1.1.2")];
        assert_eq!(dedupe_names(&mut nodes), 0);
    }

    // ------------------------------------------------------------------------
    // Group Generation Tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_generate_country_groups() {
        let nodes = vec![
            node("🇺🇸 US 1", "1.1.1.1"),
            node("🇺🇸 US 2", "1.1.1.2"),
            node("🇯🇵 JP", "2.2.2.2"),
            node("plain", "3.3.3.3"),
        ];
        let groups = generate_country_groups(&nodes, &[]);
        let names: Vec<&str> = groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["🇯🇵 JP", "🇺🇸 US"]);
        assert_eq!(groups[1].proxies, vec!["🇺🇸 US 1", "🇺🇸 US 2"]);

        let filtered = generate_country_groups(&nodes, &["us".to_string()]);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].name, "🇺🇸 US");
    }

    #[test]
    fn test_generate_default_groups() {
        let nodes = vec![node("🇭🇰 Hong Kong", "1.1.1.1"), node("plain", "2.2.2.2")];
        let (groups, rules) = generate_default_groups(&nodes, &GroupOptions::default());

        let names: Vec<&str> = groups.iter().map(|g| g.name.as_str()).collect();
        assert_eq!(names, vec!["Select", "Auto", "🇭🇰 HK"]);
        assert_eq!(groups[0].proxies, vec!["Auto", "🇭🇰 HK", "🇭🇰 Hong Kong", "plain", "DIRECT"]);
        assert_eq!(groups[2].proxies, vec!["🇭🇰 Hong Kong"]);
        assert_eq!(groups[1].group_type, GroupType::UrlTest);
        assert_eq!(groups[1].interval, Some(300));
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].to_string(), "MATCH,Select");
    }

    #[test]
    fn test_generate_default_groups_without_countries() {
        let nodes = vec![node("🇭🇰 Hong Kong", "1.1.1.1")];
        let options = GroupOptions {
            country_groups: false,
            ..GroupOptions::default()
        };
        let (groups, _) = generate_default_groups(&nodes, &options);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].proxies, vec!["Auto", "🇭🇰 Hong Kong", "DIRECT"]);
    }
}
