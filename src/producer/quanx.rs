//! Quantumult X producer

use anyhow::Result;

use crate::model::{GroupType, ProxyGroup, ProxyNode, ProxyType, Rule};

use super::{
    Adaptation, CONTENT_TYPE_TEXT, DEFAULT_TEST_INTERVAL, DEFAULT_TEST_URL, ExportSet, Format,
    Producer, TransportView, host_port, text_label, text_members, value_text,
};

pub struct QuantumultXProducer;

impl QuantumultXProducer {
    fn server_line(&self, node: &ProxyNode) -> String {
        let mut parts: Vec<String> = Vec::new();
        let transport = TransportView::of(node);
        let endpoint = host_port(&node.server, node.port);

        match node.proxy_type {
            ProxyType::Shadowsocks => {
                parts.push(format!("shadowsocks={}", endpoint));
                parts.push(format!("method={}", node.get_str("cipher").unwrap_or_default()));
                parts.push(format!("password={}", node.get_str("password").unwrap_or_default()));
                match node.get_str("plugin") {
                    Some("obfs") => {
                        let opts = node.get_mapping("plugin-opts");
                        let mode = opts
                            .and_then(|o| o.get("mode"))
                            .and_then(value_text)
                            .unwrap_or_else(|| "http".to_string());
                        parts.push(format!("obfs={}", mode));
                        if let Some(host) = opts.and_then(|o| o.get("host")).and_then(value_text) {
                            parts.push(format!("obfs-host={}", host));
                        }
                    }
                    Some("v2ray-plugin") => {
                        let opts = node.get_mapping("plugin-opts");
                        let tls = opts
                            .and_then(|o| o.get("tls"))
                            .and_then(|v| v.as_bool())
                            .unwrap_or(false);
                        parts.push(format!("obfs={}", if tls { "wss" } else { "ws" }));
                        if let Some(host) = opts.and_then(|o| o.get("host")).and_then(value_text) {
                            parts.push(format!("obfs-host={}", host));
                        }
                        if let Some(path) = opts.and_then(|o| o.get("path")).and_then(value_text) {
                            parts.push(format!("obfs-uri={}", path));
                        }
                    }
                    _ => {}
                }
            }
            ProxyType::ShadowsocksR => {
                parts.push(format!("shadowsocks={}", endpoint));
                parts.push(format!("method={}", node.get_str("cipher").unwrap_or_default()));
                parts.push(format!("password={}", node.get_str("password").unwrap_or_default()));
                parts.push(format!(
                    "ssr-protocol={}",
                    node.get_str("protocol").unwrap_or("origin")
                ));
                if let Some(param) = node.get_str("protocol-param") {
                    parts.push(format!("ssr-protocol-param={}", param));
                }
                parts.push(format!("obfs={}", node.get_str("obfs").unwrap_or("plain")));
                if let Some(param) = node.get_str("obfs-param") {
                    parts.push(format!("obfs-host={}", param));
                }
            }
            ProxyType::VMess | ProxyType::VLess => {
                let kind = if node.proxy_type == ProxyType::VMess {
                    "vmess"
                } else {
                    "vless"
                };
                parts.push(format!("{}={}", kind, endpoint));
                let method = match node.proxy_type {
                    ProxyType::VLess => "none",
                    _ => match node.get_str("cipher").unwrap_or("auto") {
                        "auto" => "chacha20-poly1305",
                        other => other,
                    },
                };
                parts.push(format!("method={}", method));
                parts.push(format!("password={}", node.get_str("uuid").unwrap_or_default()));
                push_obfs(&mut parts, node, &transport);
                if let Some(reality) = node.get_mapping("reality-opts") {
                    if let Some(key) = reality.get("public-key").and_then(value_text) {
                        parts.push(format!("reality-base64-pubkey={}", key));
                    }
                    if let Some(id) = reality.get("short-id").and_then(value_text) {
                        parts.push(format!("reality-hex-shortid={}", id));
                    }
                }
                if let Some(flow) = node.get_str("flow") {
                    parts.push(format!("vless-flow={}", flow));
                }
            }
            ProxyType::Trojan => {
                parts.push(format!("trojan={}", endpoint));
                parts.push(format!("password={}", node.get_str("password").unwrap_or_default()));
                if transport.network == "ws" {
                    push_obfs(&mut parts, node, &transport);
                } else {
                    parts.push("over-tls=true".to_string());
                    push_tls_options(&mut parts, node);
                }
            }
            ProxyType::Socks5 | ProxyType::Http => {
                let kind = if node.proxy_type == ProxyType::Socks5 {
                    "socks5"
                } else {
                    "http"
                };
                parts.push(format!("{}={}", kind, endpoint));
                if let Some(username) = node.get_str("username") {
                    parts.push(format!("username={}", username));
                    parts.push(format!(
                        "password={}",
                        node.get_str("password").unwrap_or_default()
                    ));
                }
                if node.tls() {
                    parts.push("over-tls=true".to_string());
                    push_tls_options(&mut parts, node);
                }
            }
            // Filtered out by `supports`
            _ => {}
        }

        if node.get_bool("tfo") == Some(true) {
            parts.push("fast-open=true".to_string());
        }
        parts.push(format!("udp-relay={}", node.udp()));
        parts.push(format!("tag={}", text_label(&node.name)));
        parts.join(", ")
    }

    fn policy_line(&self, group: &ProxyGroup, set: &ExportSet, warnings: &mut Vec<String>) -> String {
        let kind = match group.group_type {
            GroupType::Select => "static",
            GroupType::UrlTest => "url-latency-benchmark",
            GroupType::Fallback => "available",
            GroupType::LoadBalance => "round-robin",
            GroupType::Relay => {
                warnings.push(format!(
                    "group '{}': relay groups are not supported by qx, exported as static",
                    group.name
                ));
                "static"
            }
        };

        let mut parts = vec![format!("{}={}", kind, text_label(&group.name))];
        let members = text_members(group, set);
        if members.is_empty() {
            parts.push("direct".to_string());
        }
        parts.extend(members.into_iter().map(policy_name));
        if matches!(group.group_type, GroupType::UrlTest | GroupType::Fallback) {
            parts.push(format!(
                "check-interval={}",
                group.interval.unwrap_or(DEFAULT_TEST_INTERVAL)
            ));
            if let Some(tolerance) = group.tolerance {
                parts.push(format!("tolerance={}", tolerance));
            }
            if let Some(url) = group.url.as_deref().filter(|u| *u != DEFAULT_TEST_URL) {
                parts.push(format!("server-check-url={}", url));
            }
        }
        parts.join(", ")
    }
}

impl Producer for QuantumultXProducer {
    fn format(&self) -> Format {
        Format::QuantumultX
    }

    fn content_type(&self) -> &'static str {
        CONTENT_TYPE_TEXT
    }

    fn supports(&self, proxy_type: ProxyType) -> bool {
        matches!(
            proxy_type,
            ProxyType::Shadowsocks
                | ProxyType::ShadowsocksR
                | ProxyType::VMess
                | ProxyType::VLess
                | ProxyType::Trojan
                | ProxyType::Socks5
                | ProxyType::Http
        )
    }

    fn adapt(&self, node: &mut ProxyNode) -> Adaptation {
        if let Some(plugin) = node.get_str("plugin")
            && !matches!(plugin, "obfs" | "v2ray-plugin")
        {
            return Adaptation::Dropped(format!("plugin {} is not supported by qx", plugin));
        }
        let transport = TransportView::of(node);
        if !matches!(transport.network.as_str(), "tcp" | "ws") {
            return Adaptation::Dropped(format!(
                "{} transport is not supported by qx",
                transport.network
            ));
        }
        Adaptation::Keep
    }

    fn render(&self, set: &ExportSet, warnings: &mut Vec<String>) -> Result<String> {
        let mut out = String::from("[server_local]\n");
        for node in &set.nodes {
            out.push_str(&self.server_line(node));
            out.push('\n');
        }

        if !set.groups.is_empty() {
            out.push_str("\n[policy]\n");
            for group in &set.groups {
                out.push_str(&self.policy_line(group, set, warnings));
                out.push('\n');
            }
        }

        if !set.rules.is_empty() {
            out.push_str("\n[filter_local]\n");
            for rule in &set.rules {
                if let Some(line) = filter_line(rule) {
                    out.push_str(&line);
                    out.push('\n');
                } else {
                    warnings.push(format!("rule '{}' is not supported by qx", rule));
                }
            }
        }
        Ok(out)
    }
}

/// WebSocket / TLS obfuscation options shared by vmess, vless and trojan-over-ws
fn push_obfs(parts: &mut Vec<String>, node: &ProxyNode, transport: &TransportView) {
    let tls = node.tls() || node.proxy_type == ProxyType::Trojan;
    if transport.network == "ws" {
        parts.push(format!("obfs={}", if tls { "wss" } else { "ws" }));
        if let Some(host) = transport.host.as_deref().or_else(|| node.server_name()) {
            parts.push(format!("obfs-host={}", host));
        }
        if let Some(path) = &transport.path {
            parts.push(format!("obfs-uri={}", path));
        }
    } else if tls {
        parts.push("obfs=over-tls".to_string());
        if let Some(sni) = node.server_name() {
            parts.push(format!("obfs-host={}", sni));
        }
    }
    if tls {
        parts.push(format!("tls-verification={}", !node.skip_cert_verify()));
    }
}

fn push_tls_options(parts: &mut Vec<String>, node: &ProxyNode) {
    if let Some(sni) = node.server_name() {
        parts.push(format!("tls-host={}", sni));
    }
    parts.push(format!("tls-verification={}", !node.skip_cert_verify()));
}

fn policy_name(member: &str) -> String {
    match member {
        "DIRECT" => "direct".to_string(),
        "REJECT" => "reject".to_string(),
        other => text_label(other),
    }
}

fn filter_line(rule: &Rule) -> Option<String> {
    let target = policy_name(&rule.target);
    if rule.is_match() {
        return Some(format!("final, {}", target));
    }
    let kind = match rule.kind.as_str() {
        "DOMAIN" => "host",
        "DOMAIN-SUFFIX" => "host-suffix",
        "DOMAIN-KEYWORD" => "host-keyword",
        "IP-CIDR" => "ip-cidr",
        "IP-CIDR6" => "ip6-cidr",
        "GEOIP" => "geoip",
        "USER-AGENT" => "user-agent",
        _ => return None,
    };
    Some(format!("{}, {}, {}", kind, rule.payload, target))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::producer::produce;

    #[test]
    fn test_qx_vmess_ws_tls() {
        let mut node = ProxyNode::new("v", ProxyType::VMess, "a.com", 443).unwrap();
        node.set("uuid", "uuid-1");
        node.set("cipher", "auto");
        node.set("tls", true);
        node.set("udp", true);
        crate::normalize::apply_transport(&mut node, "ws", Some("/ray"), Some("cdn.a.com"), None);
        let produced = produce(Some(Format::QuantumultX), &[node], &[], &[]).unwrap();
        assert_eq!(
            produced.content,
            "[server_local]\nvmess=a.com:443, method=chacha20-poly1305, password=uuid-1, obfs=wss, obfs-host=cdn.a.com, obfs-uri=/ray, tls-verification=true, udp-relay=true, tag=v\n"
        );
    }

    #[test]
    fn test_qx_policies_and_filters() {
        let mut node = ProxyNode::new("t", ProxyType::Trojan, "b.com", 443).unwrap();
        node.set("password", "pw");
        node.set("sni", "b.com");
        let groups = vec![
            ProxyGroup::new("Proxy", GroupType::Select, vec!["Auto".into(), "DIRECT".into()]),
            ProxyGroup::new("Auto", GroupType::UrlTest, vec!["t".into()]),
        ];
        let rules = vec![
            "DOMAIN-SUFFIX,google.com,Proxy".parse::<Rule>().unwrap(),
            "PROCESS-NAME,curl,DIRECT".parse::<Rule>().unwrap(),
            "MATCH,DIRECT".parse::<Rule>().unwrap(),
        ];
        let produced = produce(Some(Format::QuantumultX), &[node], &groups, &rules).unwrap();
        assert!(produced.content.contains(
            "trojan=b.com:443, password=pw, over-tls=true, tls-host=b.com, tls-verification=true, udp-relay=false, tag=t\n"
        ));
        assert!(produced.content.contains("static=Proxy, Auto, direct\n"));
        assert!(produced.content.contains("url-latency-benchmark=Auto, t, check-interval=300\n"));
        assert!(produced.content.contains("host-suffix, google.com, Proxy\n"));
        assert!(produced.content.ends_with("final, direct\n"));
        assert_eq!(produced.warnings.len(), 1);
    }

    #[test]
    fn test_qx_drops_grpc_and_hysteria() {
        let mut node = ProxyNode::new("g", ProxyType::VLess, "a.com", 443).unwrap();
        crate::normalize::apply_transport(&mut node, "grpc", None, None, Some("svc"));
        assert!(matches!(QuantumultXProducer.adapt(&mut node), Adaptation::Dropped(_)));
        assert!(!QuantumultXProducer.supports(ProxyType::Hysteria2));
    }
}
