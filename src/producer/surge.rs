//! Surge family producer
//!
//! Surge, Surge for Mac and Surfboard share the INI-like `[Proxy]` /
//! `[Proxy Group]` / `[Rule]` layout. WireGuard peers live in their own
//! `[WireGuard name]` sections referenced from the proxy line.

use anyhow::Result;
use serde_yaml::Value;

use crate::model::{GroupType, ProxyGroup, ProxyNode, ProxyType};

use super::{
    Adaptation, CONTENT_TYPE_TEXT, DEFAULT_TEST_INTERVAL, DEFAULT_TEST_URL, ExportSet, Format,
    Producer, TransportView, bare_server, host_port, mapped_fields, parse_mbps, text_label,
    text_members, text_rules, value_text,
};

/// Options every TLS-capable proxy line may carry
const TLS_FIELDS: [(&str, &str); 2] = [
    ("skip-cert-verify", "skip-cert-verify"),
    ("client-fingerprint", "client-fingerprint"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurgeFlavor {
    Surge,
    SurgeMac,
    Surfboard,
}

pub struct SurgeProducer {
    flavor: SurgeFlavor,
}

impl SurgeProducer {
    pub fn new(flavor: SurgeFlavor) -> Self {
        Self { flavor }
    }

    fn proxy_line(&self, node: &ProxyNode) -> String {
        let name = text_label(&node.name);
        let server = bare_server(&node.server);
        let mut parts: Vec<String> = Vec::new();

        match node.proxy_type {
            ProxyType::Shadowsocks => {
                parts.push(format!("ss, {}, {}", server, node.port));
                parts.extend(mapped_fields(
                    node,
                    &[("cipher", "encrypt-method"), ("password", "password")],
                ));
                if let Some(opts) = node.get_mapping("plugin-opts") {
                    match node.get_str("plugin") {
                        Some("obfs") => {
                            push_opt(&mut parts, "obfs", opts.get("mode"));
                            push_opt(&mut parts, "obfs-host", opts.get("host"));
                        }
                        Some("shadow-tls") => {
                            push_opt(&mut parts, "shadow-tls-password", opts.get("password"));
                            push_opt(&mut parts, "shadow-tls-sni", opts.get("host"));
                            push_opt(&mut parts, "shadow-tls-version", opts.get("version"));
                        }
                        _ => {}
                    }
                }
                parts.push(format!("udp-relay={}", node.udp()));
            }
            ProxyType::VMess => {
                parts.push(format!("vmess, {}, {}", server, node.port));
                parts.extend(mapped_fields(node, &[("uuid", "username")]));
                if node.get_u64("alterId").unwrap_or(0) == 0 {
                    parts.push("vmess-aead=true".to_string());
                }
                push_ws(&mut parts, node);
                push_tls(&mut parts, node);
            }
            ProxyType::Trojan => {
                parts.push(format!("trojan, {}, {}", server, node.port));
                parts.extend(mapped_fields(node, &[("password", "password")]));
                push_ws(&mut parts, node);
                push_tls(&mut parts, node);
            }
            ProxyType::Hysteria2 => {
                parts.push(format!("hysteria2, {}, {}", server, node.port));
                parts.extend(mapped_fields(node, &[("password", "password")]));
                if let Some(down) = node.get("down").and_then(parse_mbps) {
                    parts.push(format!("download-bandwidth={}", down));
                }
                push_tls(&mut parts, node);
            }
            ProxyType::Tuic => {
                parts.push(format!("tuic-v5, {}, {}", server, node.port));
                parts.extend(mapped_fields(node, &[("uuid", "uuid"), ("password", "password")]));
                let alpn = node.alpn();
                parts.push(format!(
                    "alpn={}",
                    alpn.first().map(String::as_str).unwrap_or("h3")
                ));
                push_tls(&mut parts, node);
            }
            ProxyType::Socks5 | ProxyType::Http => {
                let kind = match (node.proxy_type, node.tls()) {
                    (ProxyType::Socks5, false) => "socks5",
                    (ProxyType::Socks5, true) => "socks5-tls",
                    (_, false) => "http",
                    (_, true) => "https",
                };
                parts.push(format!("{}, {}, {}", kind, server, node.port));
                if let Some(username) = node.get_str("username") {
                    parts.push(username.to_string());
                    parts.push(node.get_str("password").unwrap_or_default().to_string());
                }
                if node.tls() {
                    push_tls(&mut parts, node);
                }
            }
            ProxyType::Snell => {
                parts.push(format!("snell, {}, {}", server, node.port));
                parts.extend(mapped_fields(node, &[("psk", "psk"), ("version", "version")]));
                if let Some(opts) = node.get_mapping("obfs-opts") {
                    push_opt(&mut parts, "obfs", opts.get("mode"));
                    push_opt(&mut parts, "obfs-host", opts.get("host"));
                }
            }
            ProxyType::WireGuard => {
                parts.push(format!("wireguard, section-name={}", name));
            }
            // Filtered out by `supports`
            _ => {}
        }

        if node.get_bool("tfo") == Some(true) {
            parts.push("tfo=true".to_string());
        }
        format!("{} = {}", name, parts.join(", "))
    }

    fn group_line(&self, group: &ProxyGroup, set: &ExportSet, warnings: &mut Vec<String>) -> String {
        let kind = match group.group_type {
            GroupType::Select => "select",
            GroupType::UrlTest => "url-test",
            GroupType::Fallback => "fallback",
            GroupType::LoadBalance => "load-balance",
            GroupType::Relay => {
                warnings.push(format!(
                    "group '{}': relay groups are not supported by {}, exported as select",
                    group.name,
                    self.format()
                ));
                "select"
            }
        };

        let mut parts = vec![kind.to_string()];
        let members = text_members(group, set);
        if members.is_empty() {
            parts.push("DIRECT".to_string());
        }
        parts.extend(members.into_iter().map(text_label));

        if group.group_type.is_tested() {
            parts.push(format!("url={}", group.url.as_deref().unwrap_or(DEFAULT_TEST_URL)));
            parts.push(format!(
                "interval={}",
                group.interval.unwrap_or(DEFAULT_TEST_INTERVAL)
            ));
            if let Some(tolerance) = group.tolerance {
                parts.push(format!("tolerance={}", tolerance));
            }
        }
        format!("{} = {}", text_label(&group.name), parts.join(", "))
    }
}

impl Producer for SurgeProducer {
    fn format(&self) -> Format {
        match self.flavor {
            SurgeFlavor::Surge => Format::Surge,
            SurgeFlavor::SurgeMac => Format::SurgeMac,
            SurgeFlavor::Surfboard => Format::Surfboard,
        }
    }

    fn content_type(&self) -> &'static str {
        CONTENT_TYPE_TEXT
    }

    fn supports(&self, proxy_type: ProxyType) -> bool {
        match self.flavor {
            SurgeFlavor::Surge | SurgeFlavor::SurgeMac => matches!(
                proxy_type,
                ProxyType::Shadowsocks
                    | ProxyType::VMess
                    | ProxyType::Trojan
                    | ProxyType::Hysteria2
                    | ProxyType::Tuic
                    | ProxyType::Socks5
                    | ProxyType::Http
                    | ProxyType::Snell
                    | ProxyType::WireGuard
            ),
            SurgeFlavor::Surfboard => matches!(
                proxy_type,
                ProxyType::Shadowsocks
                    | ProxyType::VMess
                    | ProxyType::Trojan
                    | ProxyType::Socks5
                    | ProxyType::Http
                    | ProxyType::WireGuard
            ),
        }
    }

    fn adapt(&self, node: &mut ProxyNode) -> Adaptation {
        if let Some(plugin) = node.get_str("plugin") {
            let supported = plugin == "obfs"
                || (plugin == "shadow-tls" && self.flavor != SurgeFlavor::Surfboard);
            if !supported {
                return Adaptation::Dropped(format!(
                    "plugin {} is not supported by {}",
                    plugin,
                    self.format()
                ));
            }
        }

        let transport = TransportView::of(node);
        if !transport.is_tcp() && (transport.network != "ws" || transport.http_upgrade) {
            return Adaptation::Dropped(format!(
                "{} transport is not supported by {}",
                transport.network,
                self.format()
            ));
        }

        if node.remove("reality-opts").is_some() {
            return Adaptation::Downgraded("Reality downgraded to plain TLS".to_string());
        }
        Adaptation::Keep
    }

    fn render(&self, set: &ExportSet, warnings: &mut Vec<String>) -> Result<String> {
        let mut out = String::from("[Proxy]\n");
        for node in &set.nodes {
            out.push_str(&self.proxy_line(node));
            out.push('\n');
        }

        if !set.groups.is_empty() {
            out.push_str("\n[Proxy Group]\n");
            for group in &set.groups {
                out.push_str(&self.group_line(group, set, warnings));
                out.push('\n');
            }
        }

        if !set.rules.is_empty() {
            out.push_str("\n[Rule]\n");
            for line in text_rules(&set.rules, "FINAL", self.format(), warnings) {
                out.push_str(&line);
                out.push('\n');
            }
        }

        for node in set.nodes.iter().filter(|n| n.proxy_type == ProxyType::WireGuard) {
            out.push('\n');
            out.push_str(&wireguard_section(node));
        }
        Ok(out)
    }
}

fn push_opt(parts: &mut Vec<String>, key: &str, value: Option<&Value>) {
    if let Some(value) = value.and_then(value_text) {
        parts.push(format!("{}={}", key, value));
    }
}

fn push_ws(parts: &mut Vec<String>, node: &ProxyNode) {
    let transport = TransportView::of(node);
    if transport.network != "ws" {
        return;
    }
    parts.push("ws=true".to_string());
    if let Some(path) = transport.path {
        parts.push(format!("ws-path={}", path));
    }
    if let Some(host) = transport.host {
        parts.push(format!("ws-headers=Host:\"{}\"", host));
    }
}

fn push_tls(parts: &mut Vec<String>, node: &ProxyNode) {
    if node.proxy_type == ProxyType::VMess && node.tls() {
        parts.push("tls=true".to_string());
    }
    if let Some(sni) = node.server_name() {
        parts.push(format!("sni={}", sni));
    }
    parts.extend(mapped_fields(node, &TLS_FIELDS));
}

fn wireguard_section(node: &ProxyNode) -> String {
    let mut lines = vec![format!("[WireGuard {}]", text_label(&node.name))];
    let fields = [
        ("private-key", "private-key"),
        ("ip", "self-ip"),
        ("ipv6", "self-ip-v6"),
        ("mtu", "mtu"),
    ];
    for (canonical, target) in fields {
        if let Some(value) = node.get(canonical).and_then(value_text) {
            lines.push(format!("{} = {}", target, value));
        }
    }

    let mut peer = Vec::new();
    if let Some(key) = node.get_str("public-key") {
        peer.push(format!("public-key = {}", key));
    }
    let allowed = node
        .get("allowed-ips")
        .and_then(value_text)
        .unwrap_or_else(|| "0.0.0.0/0,::/0".to_string());
    peer.push(format!("allowed-ips = \"{}\"", allowed.replace(',', ", ")));
    peer.push(format!("endpoint = {}", host_port(&node.server, node.port)));
    if let Some(psk) = node.get_str("pre-shared-key") {
        peer.push(format!("preshared-key = {}", psk));
    }
    if let Some(Value::Sequence(reserved)) = node.get("reserved") {
        let ids: Vec<String> = reserved.iter().filter_map(value_text).collect();
        peer.push(format!("client-id = {}", ids.join("/")));
    }
    lines.push(format!("peer = ({})", peer.join(", ")));

    let mut section = lines.join("\n");
    section.push('\n');
    section
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Rule;
    use crate::producer::produce;

    fn ss() -> ProxyNode {
        let mut node = ProxyNode::new("HK 01", ProxyType::Shadowsocks, "hk.example.com", 8388).unwrap();
        node.set("cipher", "aes-256-gcm");
        node.set("password", "secret");
        node.set("udp", true);
        node
    }

    #[test]
    fn test_surge_sections() {
        let groups = vec![ProxyGroup::new(
            "Proxy",
            GroupType::Select,
            vec!["HK 01".into(), "DIRECT".into(), "PASS".into()],
        )];
        let rules = vec![
            "DOMAIN-SUFFIX,google.com,Proxy".parse::<Rule>().unwrap(),
            "GEOSITE,cn,DIRECT".parse::<Rule>().unwrap(),
            "MATCH,Proxy".parse::<Rule>().unwrap(),
        ];
        let produced = produce(Some(Format::Surge), &[ss()], &groups, &rules).unwrap();
        let text = produced.content;
        assert!(text.starts_with("[Proxy]\nHK 01 = ss, hk.example.com, 8388, encrypt-method=aes-256-gcm, password=secret, udp-relay=true\n"));
        assert!(text.contains("[Proxy Group]\nProxy = select, HK 01, DIRECT\n"));
        assert!(text.contains("DOMAIN-SUFFIX,google.com,Proxy\n"));
        assert!(text.contains("FINAL,Proxy\n"));
        assert!(!text.contains("GEOSITE"));
        assert_eq!(produced.warnings.len(), 1);
    }

    #[test]
    fn test_surge_vmess_ws() {
        let mut node = ProxyNode::new("vm", ProxyType::VMess, "a.com", 443).unwrap();
        node.set("uuid", "uuid-1");
        node.set("alterId", 0);
        node.set("tls", true);
        node.set("servername", "sni.a.com");
        crate::normalize::apply_transport(&mut node, "ws", Some("/ws"), Some("cdn.a.com"), None);
        let produced = produce(Some(Format::Surge), &[node], &[], &[]).unwrap();
        assert_eq!(
            produced.content.lines().nth(1),
            Some("vm = vmess, a.com, 443, username=uuid-1, vmess-aead=true, ws=true, ws-path=/ws, ws-headers=Host:\"cdn.a.com\", tls=true, sni=sni.a.com")
        );
    }

    #[test]
    fn test_surge_drops_grpc() {
        let mut node = ProxyNode::new("g", ProxyType::Trojan, "a.com", 443).unwrap();
        node.set("password", "pw");
        crate::normalize::apply_transport(&mut node, "grpc", None, None, Some("svc"));
        let producer = SurgeProducer::new(SurgeFlavor::Surge);
        assert!(matches!(producer.adapt(&mut node), Adaptation::Dropped(_)));
    }

    #[test]
    fn test_surge_wireguard_section() {
        let mut node = ProxyNode::new("wg", ProxyType::WireGuard, "162.159.192.1", 2408).unwrap();
        node.set("private-key", "PRIV");
        node.set("public-key", "PUB");
        node.set("ip", "172.16.0.2");
        node.set("reserved", Value::Sequence(vec![1.into(), 2.into(), 3.into()]));
        let produced = produce(Some(Format::Surge), &[node], &[], &[]).unwrap();
        assert!(produced.content.contains("wg = wireguard, section-name=wg\n"));
        assert!(produced.content.contains("[WireGuard wg]\nprivate-key = PRIV\nself-ip = 172.16.0.2\n"));
        assert!(produced.content.contains(
            "peer = (public-key = PUB, allowed-ips = \"0.0.0.0/0, ::/0\", endpoint = 162.159.192.1:2408, client-id = 1/2/3)"
        ));
    }

    #[test]
    fn test_surfboard_rejects_hysteria2() {
        let producer = SurgeProducer::new(SurgeFlavor::Surfboard);
        assert!(!producer.supports(ProxyType::Hysteria2));
        assert!(SurgeProducer::new(SurgeFlavor::SurgeMac).supports(ProxyType::Tuic));
    }

    #[test]
    fn test_relay_group_downgraded() {
        let groups = vec![ProxyGroup::new("Chain", GroupType::Relay, vec!["HK 01".into()])];
        let produced = produce(Some(Format::Surge), &[ss()], &groups, &[]).unwrap();
        assert!(produced.content.contains("Chain = select, HK 01\n"));
        assert_eq!(produced.warnings.len(), 1);
    }
}
