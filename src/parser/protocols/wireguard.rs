//! WireGuard protocol parser
//!
//! Format: wireguard://private-key@host:port/?publickey=..&address=..&reserved=a,b,c&mtu=..#tag

use std::net::IpAddr;

use anyhow::{Result, anyhow, bail};
use serde_yaml::Value;
use tracing::trace;

use crate::model::{ProxyNode, ProxyType, split_list};
use crate::normalize::{QueryParams, percent_decode, string_list};

use super::{ProtocolParser, parse_host_port, split_fragment, split_query};

/// Parser for WireGuard (wireguard:// or wg://) URIs
///
/// Keys are Base64 and frequently left unescaped, so the link is split by hand
/// instead of going through a URL parser.
pub struct WireGuardParser {
    scheme: &'static str,
}

impl WireGuardParser {
    pub fn new(scheme: &'static str) -> Self {
        Self { scheme }
    }
}

impl ProtocolParser for WireGuardParser {
    fn scheme(&self) -> &str {
        self.scheme
    }

    fn parse(&self, uri: &str) -> Result<ProxyNode> {
        trace!("Parsing WireGuard URI (scheme: {})", self.scheme);
        let without_scheme = uri
            .split_once("://")
            .map(|(_, rest)| rest)
            .ok_or_else(|| anyhow!("Invalid WireGuard URI: missing scheme"))?;

        let (body, name) = split_fragment(without_scheme);
        let (main_part, query) = split_query(body);
        let at_pos = main_part
            .rfind('@')
            .ok_or_else(|| anyhow!("WireGuard URI missing private key"))?;
        let private_key = percent_decode(&main_part[..at_pos]);
        if private_key.is_empty() {
            bail!("WireGuard URI missing private key");
        }
        let (server, port) = parse_host_port(&main_part[at_pos + 1..])?;
        let params = QueryParams::parse(query);

        let mut node = ProxyNode::new(name.unwrap_or_default(), ProxyType::WireGuard, server, port)?;
        node.set("private-key", private_key);
        if let Some(public_key) = params.get_any(&["publickey", "public-key", "peer-public-key"]) {
            node.set("public-key", public_key);
        }
        if let Some(psk) = params.get_any(&["presharedkey", "pre-shared-key", "psk"]) {
            node.set("pre-shared-key", psk);
        }

        if let Some(address) = params.get_any(&["address", "ip"]) {
            let (ipv4, ipv6) = split_addresses(address);
            if let Some(ip) = ipv4 {
                node.set("ip", ip);
            }
            if let Some(ip) = ipv6 {
                node.set("ipv6", ip);
            }
        }

        if let Some(reserved) = params.get("reserved") {
            match parse_reserved(reserved) {
                Some(bytes) => {
                    let values = bytes.iter().map(|b| Value::from(u64::from(*b))).collect();
                    node.set("reserved", Value::Sequence(values));
                }
                None => trace!("Dropping malformed reserved value '{}'", reserved),
            }
        }

        if let Some(mtu) = params.get_u64("mtu") {
            node.set("mtu", mtu);
        }
        if let Some(allowed) = params.get_any(&["allowed-ips", "allowedips"]) {
            node.set("allowed-ips", string_list(&split_list(allowed)));
        }
        if let Some(udp) = params.get_bool("udp") {
            node.set("udp", udp);
        }

        Ok(node)
    }
}

/// Routes the first IPv4 and the first IPv6 address of a comma list to separate
/// fields, dropping any prefix length
fn split_addresses(address: &str) -> (Option<String>, Option<String>) {
    let mut ipv4 = None;
    let mut ipv6 = None;
    for entry in split_list(address) {
        let bare = entry
            .split('/')
            .next()
            .unwrap_or_default()
            .trim_start_matches('[')
            .trim_end_matches(']');
        match bare.parse::<IpAddr>() {
            Ok(IpAddr::V4(ip)) if ipv4.is_none() => ipv4 = Some(ip.to_string()),
            Ok(IpAddr::V6(ip)) if ipv6.is_none() => ipv6 = Some(ip.to_string()),
            Ok(_) => {}
            Err(_) => trace!("Ignoring invalid WireGuard address '{}'", entry),
        }
    }
    (ipv4, ipv6)
}

/// `reserved` must be exactly three byte values
fn parse_reserved(raw: &str) -> Option<[u8; 3]> {
    let values: Vec<u8> = raw
        .split(',')
        .map(|v| v.trim().parse::<u8>())
        .collect::<Result<_, _>>()
        .ok()?;
    values.try_into().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(uri: &str) -> ProxyNode {
        WireGuardParser::new("wireguard").parse(uri).unwrap()
    }

    #[test]
    fn test_wireguard_basic() {
        let node = parse(
            "wireguard://cPr1v+KeY%3D@162.159.192.1:2408/?publickey=bmXOC+F1FxEMF9dyiK2H5/1SUtzH0JuVo51h2wPfgyo=&address=172.16.0.2/32,2606:4700:110:8a36::2/128&reserved=209,98,59&mtu=1280#warp",
        );
        assert_eq!(node.name, "warp");
        assert_eq!(node.port, 2408);
        assert_eq!(node.get_str("private-key"), Some("cPr1v+KeY="));
        assert_eq!(
            node.get_str("public-key"),
            Some("bmXOC+F1FxEMF9dyiK2H5/1SUtzH0JuVo51h2wPfgyo=")
        );
        assert_eq!(node.get_str("ip"), Some("172.16.0.2"));
        assert_eq!(node.get_str("ipv6"), Some("2606:4700:110:8a36::2"));
        let reserved: Vec<u64> = node
            .get("reserved")
            .and_then(Value::as_sequence)
            .unwrap()
            .iter()
            .filter_map(Value::as_u64)
            .collect();
        assert_eq!(reserved, vec![209, 98, 59]);
        assert_eq!(node.get_u64("mtu"), Some(1280));
    }

    #[test]
    fn test_wireguard_reserved_must_have_three_values() {
        let node = parse("wg://key@1.1.1.1:51820?reserved=1,2#a");
        assert!(!node.contains("reserved"));
        let node = parse("wg://key@1.1.1.1:51820?reserved=1,2,300#a");
        assert!(!node.contains("reserved"));
        let node = parse("wg://key@1.1.1.1:51820?reserved=1,2,3,4#a");
        assert!(!node.contains("reserved"));
    }

    #[test]
    fn test_wireguard_ipv6_only_address() {
        let node = parse("wireguard://key@1.1.1.1:51820?address=fd00::2#v6");
        assert!(!node.contains("ip"));
        assert_eq!(node.get_str("ipv6"), Some("fd00::2"));
    }

    #[test]
    fn test_wireguard_missing_key() {
        assert!(WireGuardParser::new("wireguard").parse("wireguard://1.1.1.1:51820").is_err());
        assert!(WireGuardParser::new("wireguard").parse("wireguard://@1.1.1.1:51820").is_err());
    }
}
