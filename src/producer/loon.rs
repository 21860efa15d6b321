//! Loon producer

use anyhow::Result;
use serde_yaml::Value;

use crate::model::{GroupType, ProxyGroup, ProxyNode, ProxyType};

use super::{
    Adaptation, CONTENT_TYPE_TEXT, DEFAULT_TEST_INTERVAL, DEFAULT_TEST_URL, ExportSet, Format,
    Producer, TransportView, bare_server, host_port, mapped_fields, parse_mbps, text_label,
    text_members, text_rules, value_text,
};

pub struct LoonProducer;

impl LoonProducer {
    fn proxy_line(&self, node: &ProxyNode) -> String {
        let server = bare_server(&node.server);
        let secret = |key: &str| format!("\"{}\"", node.get_str(key).unwrap_or_default());
        let mut parts: Vec<String> = Vec::new();

        match node.proxy_type {
            ProxyType::Shadowsocks => {
                parts.push(format!(
                    "Shadowsocks,{},{},{},{}",
                    server,
                    node.port,
                    node.get_str("cipher").unwrap_or_default(),
                    secret("password")
                ));
                if node.get_str("plugin") == Some("obfs")
                    && let Some(opts) = node.get_mapping("plugin-opts")
                {
                    if let Some(mode) = opts.get("mode").and_then(value_text) {
                        parts.push(format!("obfs-name={}", mode));
                    }
                    if let Some(host) = opts.get("host").and_then(value_text) {
                        parts.push(format!("obfs-host={}", host));
                    }
                }
            }
            ProxyType::ShadowsocksR => {
                parts.push(format!(
                    "ShadowsocksR,{},{},{},{}",
                    server,
                    node.port,
                    node.get_str("cipher").unwrap_or_default(),
                    secret("password")
                ));
                parts.extend(mapped_fields(
                    node,
                    &[
                        ("protocol", "protocol"),
                        ("protocol-param", "protocol-param"),
                        ("obfs", "obfs"),
                        ("obfs-param", "obfs-param"),
                    ],
                ));
            }
            ProxyType::VMess => {
                parts.push(format!(
                    "vmess,{},{},{},{}",
                    server,
                    node.port,
                    node.get_str("cipher").unwrap_or("auto"),
                    secret("uuid")
                ));
                push_transport(&mut parts, node);
                parts.push(format!("alterId={}", node.get_u64("alterId").unwrap_or(0)));
                push_tls(&mut parts, node);
            }
            ProxyType::VLess => {
                parts.push(format!("VLESS,{},{},{}", server, node.port, secret("uuid")));
                push_transport(&mut parts, node);
                parts.extend(mapped_fields(node, &[("flow", "flow")]));
                push_tls(&mut parts, node);
                if let Some(reality) = node.get_mapping("reality-opts") {
                    if let Some(key) = reality.get("public-key").and_then(value_text) {
                        parts.push(format!("public-key=\"{}\"", key));
                    }
                    if let Some(id) = reality.get("short-id").and_then(value_text) {
                        parts.push(format!("short-id={}", id));
                    }
                }
            }
            ProxyType::Trojan => {
                parts.push(format!("trojan,{},{},{}", server, node.port, secret("password")));
                push_transport(&mut parts, node);
                push_tls(&mut parts, node);
            }
            ProxyType::Hysteria2 => {
                parts.push(format!("Hysteria2,{},{},{}", server, node.port, secret("password")));
                if let Some(down) = node.get("down").and_then(parse_mbps) {
                    parts.push(format!("download-bandwidth={}", down));
                }
                push_tls(&mut parts, node);
            }
            ProxyType::Socks5 | ProxyType::Http => {
                let kind = if node.proxy_type == ProxyType::Socks5 {
                    "socks5"
                } else if node.tls() {
                    "https"
                } else {
                    "http"
                };
                let mut head = format!("{},{},{}", kind, server, node.port);
                if let Some(username) = node.get_str("username") {
                    head.push_str(&format!(",{},{}", username, secret("password")));
                }
                parts.push(head);
                if node.tls() {
                    push_tls(&mut parts, node);
                }
            }
            ProxyType::WireGuard => {
                parts.push("wireguard".to_string());
                parts.extend(mapped_fields(
                    node,
                    &[
                        ("ip", "interface-ip"),
                        ("ipv6", "interface-ipv6"),
                        ("private-key", "private-key"),
                        ("mtu", "mtu"),
                    ],
                ));
                parts.push(format!("peers=[{{{}}}]", wireguard_peer(node)));
            }
            // Filtered out by `supports`
            _ => {}
        }

        if node.proxy_type != ProxyType::WireGuard {
            parts.push(format!("udp={}", node.udp()));
        }
        if node.get_bool("tfo") == Some(true) {
            parts.push("fast-open=true".to_string());
        }
        format!("{} = {}", text_label(&node.name), parts.join(","))
    }

    fn group_line(&self, group: &ProxyGroup, set: &ExportSet, warnings: &mut Vec<String>) -> String {
        let kind = match group.group_type {
            GroupType::Select => "select",
            GroupType::UrlTest => "url-test",
            GroupType::Fallback => "fallback",
            GroupType::LoadBalance => "load-balance",
            GroupType::Relay => {
                warnings.push(format!(
                    "group '{}': relay groups are not supported by loon, exported as select",
                    group.name
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
        }
        if group.group_type == GroupType::UrlTest
            && let Some(tolerance) = group.tolerance
        {
            parts.push(format!("tolerance={}", tolerance));
        }
        if group.group_type == GroupType::LoadBalance {
            parts.push("algorithm=pcc".to_string());
        }
        format!("{} = {}", text_label(&group.name), parts.join(","))
    }
}

impl Producer for LoonProducer {
    fn format(&self) -> Format {
        Format::Loon
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
                | ProxyType::Hysteria2
                | ProxyType::Socks5
                | ProxyType::Http
                | ProxyType::WireGuard
        )
    }

    fn adapt(&self, node: &mut ProxyNode) -> Adaptation {
        if let Some(plugin) = node.get_str("plugin")
            && plugin != "obfs"
        {
            return Adaptation::Dropped(format!("plugin {} is not supported by loon", plugin));
        }
        let transport = TransportView::of(node);
        if transport.network == "grpc" || transport.network == "h2" {
            return Adaptation::Dropped(format!(
                "{} transport is not supported by loon",
                transport.network
            ));
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
            for line in text_rules(&set.rules, "FINAL", Format::Loon, warnings) {
                out.push_str(&line);
                out.push('\n');
            }
        }
        Ok(out)
    }
}

fn push_transport(parts: &mut Vec<String>, node: &ProxyNode) {
    let transport = TransportView::of(node);
    match transport.network.as_str() {
        "ws" => {
            parts.push("transport=ws".to_string());
            if let Some(path) = transport.path {
                parts.push(format!("path={}", path));
            }
            if let Some(host) = transport.host {
                parts.push(format!("host={}", host));
            }
        }
        "http" => parts.push("transport=http".to_string()),
        _ => parts.push("transport=tcp".to_string()),
    }
}

fn push_tls(parts: &mut Vec<String>, node: &ProxyNode) {
    let tls = node.tls() || node.proxy_type == ProxyType::Trojan;
    if matches!(node.proxy_type, ProxyType::VMess | ProxyType::VLess | ProxyType::Trojan | ProxyType::Socks5) {
        parts.push(format!("over-tls={}", tls));
    }
    if let Some(sni) = node.server_name() {
        parts.push(format!("sni={}", sni));
    }
    parts.push(format!("skip-cert-verify={}", node.skip_cert_verify()));
}

fn wireguard_peer(node: &ProxyNode) -> String {
    let mut fields = Vec::new();
    if let Some(key) = node.get_str("public-key") {
        fields.push(format!("public-key={}", key));
    }
    let allowed = node
        .get("allowed-ips")
        .and_then(value_text)
        .unwrap_or_else(|| "0.0.0.0/0,::/0".to_string());
    fields.push(format!("allowed-ips=\"{}\"", allowed));
    fields.push(format!("endpoint={}", host_port(&node.server, node.port)));
    if let Some(psk) = node.get_str("pre-shared-key") {
        fields.push(format!("preshared-key={}", psk));
    }
    if let Some(Value::Sequence(reserved)) = node.get("reserved") {
        let bytes: Vec<String> = reserved.iter().filter_map(value_text).collect();
        fields.push(format!("reserved=[{}]", bytes.join(",")));
    }
    fields.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Rule;
    use crate::producer::produce;
    use serde_yaml::Mapping;

    #[test]
    fn test_loon_vless_reality() {
        let mut reality = Mapping::new();
        reality.insert("public-key".into(), "PUBKEY".into());
        reality.insert("short-id".into(), "ABCD".into());
        let mut node = ProxyNode::new("v", ProxyType::VLess, "a.com", 443).unwrap();
        node.set("uuid", "uuid-1");
        node.set("tls", true);
        node.set("servername", "sni.a.com");
        node.set("reality-opts", Value::Mapping(reality));
        node.set("skip-cert-verify", true);
        node.set("udp", true);
        let produced = produce(Some(Format::Loon), &[node], &[], &[]).unwrap();
        assert_eq!(
            produced.content.lines().nth(1),
            Some("v = VLESS,a.com,443,\"uuid-1\",transport=tcp,over-tls=true,sni=sni.a.com,skip-cert-verify=true,public-key=\"PUBKEY\",short-id=ABCD,udp=true")
        );
    }

    #[test]
    fn test_loon_ss_obfs_and_rules() {
        let mut opts = Mapping::new();
        opts.insert("mode".into(), "http".into());
        opts.insert("host".into(), "bing.com".into());
        let mut node = ProxyNode::new("s", ProxyType::Shadowsocks, "a.com", 8388).unwrap();
        node.set("cipher", "aes-128-gcm");
        node.set("password", "pw");
        node.set("plugin", "obfs");
        node.set("plugin-opts", Value::Mapping(opts));
        let groups = vec![ProxyGroup::new("Auto", GroupType::UrlTest, vec!["s".into()])];
        let rules = vec!["MATCH,Auto".parse::<Rule>().unwrap()];
        let produced = produce(Some(Format::Loon), &[node], &groups, &rules).unwrap();
        assert!(produced.content.contains(
            "s = Shadowsocks,a.com,8388,aes-128-gcm,\"pw\",obfs-name=http,obfs-host=bing.com,udp=false\n"
        ));
        assert!(produced.content.contains(
            "Auto = url-test,s,url=https://www.gstatic.com/generate_204,interval=300\n"
        ));
        assert!(produced.content.ends_with("[Rule]\nFINAL,Auto\n"));
    }

    #[test]
    fn test_loon_drops_grpc() {
        let mut node = ProxyNode::new("g", ProxyType::VLess, "a.com", 443).unwrap();
        crate::normalize::apply_transport(&mut node, "grpc", None, None, Some("svc"));
        assert!(matches!(LoonProducer.adapt(&mut node), Adaptation::Dropped(_)));
        assert!(!LoonProducer.supports(ProxyType::Tuic));
    }
}
