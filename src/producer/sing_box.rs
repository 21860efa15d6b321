//! sing-box producer
//!
//! Nodes become typed outbounds from [`crate::singbox`], groups become
//! `selector`/`urltest` outbounds, and the result is serialized as
//! `{"outbounds": [...]}`. Routing rules have no place in an outbound list and
//! are not carried.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use serde_yaml::Value;
use tracing::debug;

use crate::model::{GroupType, ProxyGroup, ProxyNode, ProxyType};
use crate::singbox::SingBoxOutbounds;
use crate::singbox::outbound::{
    AnyTlsOutbound, BlockOutbound, DirectOutbound, GrpcTransport, HttpOutbound, HttpTransport,
    HttpUpgradeTransport, Hysteria2Obfs, Hysteria2Outbound, HysteriaOutbound, Outbound,
    OutboundMultiplex, SelectorOutbound, ShadowTlsOutbound, ShadowsocksOutbound, SocksOutbound, TrojanOutbound,
    TuicOutbound, UrlTestOutbound, V2RayTransport, VLessOutbound, VMessOutbound,
    WebSocketTransport, WireGuardOutbound,
};
use crate::singbox::shared::{DialFields, OutboundRealityConfig, OutboundTlsConfig, UtlsConfig};
use crate::singbox::util::default_wireguard_mtu;

use super::{
    Adaptation, CONTENT_TYPE_JSON, DEFAULT_TEST_INTERVAL, DEFAULT_TEST_URL, ExportSet, Format,
    Producer, TransportView, bare_server, parse_mbps, text_members, value_text,
};

pub struct SingBoxProducer;

impl SingBoxProducer {
    /// Builds the outbound for a node, plus the shadow-tls outbound it detours through
    fn node_outbounds(&self, node: &ProxyNode) -> Vec<Outbound> {
        let tag = Some(node.name.clone());
        let server = Some(bare_server(&node.server).to_string());
        let server_port = Some(node.port);
        let dial = dial_fields(node);

        let outbound = match node.proxy_type {
            ProxyType::Shadowsocks => {
                let mut outbound = ShadowsocksOutbound {
                    tag,
                    server,
                    server_port,
                    method: string_field(node, "cipher"),
                    password: string_field(node, "password"),
                    network: tcp_only(node),
                    multiplex: multiplex(node),
                    dial,
                    ..Default::default()
                };
                match node.get_str("plugin") {
                    Some("shadow-tls") => {
                        let chained = shadow_tls_outbound(node);
                        outbound.dial.detour = chained.tag().map(str::to_string);
                        return vec![Outbound::Shadowsocks(outbound), chained];
                    }
                    Some(plugin) => {
                        let (name, opts) = sip003_plugin(node, plugin);
                        outbound.plugin = Some(name);
                        outbound.plugin_opts = opts;
                    }
                    None => {}
                }
                Outbound::Shadowsocks(outbound)
            }
            ProxyType::VMess => Outbound::VMess(VMessOutbound {
                tag,
                server,
                server_port,
                uuid: string_field(node, "uuid"),
                security: Some(node.get_str("cipher").unwrap_or("auto").to_string()),
                alter_id: node
                    .get_u64("alterId")
                    .and_then(|v| u32::try_from(v).ok())
                    .unwrap_or(0),
                network: tcp_only(node),
                tls: tls_config(node, false),
                packet_encoding: string_field(node, "packet-encoding"),
                transport: transport(node),
                dial,
            }),
            ProxyType::VLess => Outbound::VLess(VLessOutbound {
                tag,
                server,
                server_port,
                uuid: string_field(node, "uuid"),
                flow: string_field(node, "flow"),
                network: tcp_only(node),
                tls: tls_config(node, false),
                packet_encoding: string_field(node, "packet-encoding"),
                transport: transport(node),
                dial,
            }),
            ProxyType::Trojan => Outbound::Trojan(TrojanOutbound {
                tag,
                server,
                server_port,
                password: string_field(node, "password"),
                network: tcp_only(node),
                tls: tls_config(node, true),
                transport: transport(node),
                dial,
            }),
            ProxyType::Hysteria => Outbound::Hysteria(HysteriaOutbound {
                tag,
                server,
                server_port,
                up_mbps: node.get("up").and_then(parse_mbps),
                down_mbps: node.get("down").and_then(parse_mbps),
                obfs: string_field(node, "obfs"),
                auth_str: string_field(node, "auth-str"),
                tls: tls_config(node, true),
                dial,
            }),
            ProxyType::Hysteria2 => Outbound::Hysteria2(Hysteria2Outbound {
                tag,
                server,
                server_port,
                server_ports: node.get_str("ports").map(port_ranges).unwrap_or_default(),
                up_mbps: node.get("up").and_then(parse_mbps),
                down_mbps: node.get("down").and_then(parse_mbps),
                obfs: node.get_str("obfs").map(|obfs| Hysteria2Obfs {
                    obfs_type: Some(obfs.to_string()),
                    password: string_field(node, "obfs-password"),
                }),
                password: string_field(node, "password"),
                tls: tls_config(node, true),
                dial,
            }),
            ProxyType::Tuic => Outbound::Tuic(TuicOutbound {
                tag,
                server,
                server_port,
                uuid: string_field(node, "uuid"),
                password: string_field(node, "password"),
                congestion_control: string_field(node, "congestion-controller"),
                udp_relay_mode: string_field(node, "udp-relay-mode"),
                zero_rtt_handshake: node.get_bool("reduce-rtt").unwrap_or(false),
                tls: tls_config(node, true),
                dial,
            }),
            ProxyType::AnyTls => Outbound::AnyTls(AnyTlsOutbound {
                tag,
                server,
                server_port,
                password: string_field(node, "password"),
                idle_session_check_interval: seconds_field(node, "idle-session-check-interval"),
                idle_session_timeout: seconds_field(node, "idle-session-timeout"),
                min_idle_session: node
                    .get_u64("min-idle-session")
                    .and_then(|v| u32::try_from(v).ok()),
                tls: tls_config(node, true),
                dial,
            }),
            ProxyType::Socks5 => Outbound::Socks(SocksOutbound {
                tag,
                server,
                server_port,
                version: Some("5".to_string()),
                username: string_field(node, "username"),
                password: string_field(node, "password"),
                network: tcp_only(node),
                dial,
            }),
            ProxyType::Http => Outbound::Http(HttpOutbound {
                tag,
                server,
                server_port,
                username: string_field(node, "username"),
                password: string_field(node, "password"),
                tls: tls_config(node, false),
                dial,
            }),
            ProxyType::WireGuard => Outbound::WireGuard(WireGuardOutbound {
                tag,
                mtu: node
                    .get_u64("mtu")
                    .and_then(|v| u32::try_from(v).ok())
                    .unwrap_or_else(default_wireguard_mtu),
                local_address: wireguard_addresses(node),
                private_key: string_field(node, "private-key"),
                server,
                server_port,
                peer_public_key: string_field(node, "public-key"),
                pre_shared_key: string_field(node, "pre-shared-key"),
                reserved: reserved_bytes(node),
                dial,
            }),
            // Filtered out by `supports`
            ProxyType::ShadowsocksR | ProxyType::Snell => return Vec::new(),
        };
        vec![outbound]
    }

    fn group_outbound(&self, group: &ProxyGroup, set: &ExportSet, warnings: &mut Vec<String>) -> Outbound {
        let mut outbounds: Vec<String> = text_members(group, set)
            .into_iter()
            .map(str::to_string)
            .collect();
        if outbounds.is_empty() {
            outbounds.push("DIRECT".to_string());
        }

        let tested = match group.group_type {
            GroupType::Select => false,
            GroupType::UrlTest => true,
            GroupType::Fallback | GroupType::LoadBalance => {
                warnings.push(format!(
                    "group '{}': {} groups are not supported by sing-box, exported as urltest",
                    group.name, group.group_type
                ));
                true
            }
            GroupType::Relay => {
                warnings.push(format!(
                    "group '{}': relay groups are not supported by sing-box, exported as selector",
                    group.name
                ));
                false
            }
        };

        if tested {
            Outbound::UrlTest(UrlTestOutbound {
                tag: Some(group.name.clone()),
                outbounds,
                url: Some(group.url.clone().unwrap_or_else(|| DEFAULT_TEST_URL.to_string())),
                interval: Some(format!(
                    "{}s",
                    group.interval.unwrap_or(DEFAULT_TEST_INTERVAL)
                )),
                tolerance: group.tolerance.unwrap_or(0),
                interrupt_exist_connections: false,
            })
        } else {
            Outbound::Selector(SelectorOutbound {
                tag: Some(group.name.clone()),
                outbounds,
                ..Default::default()
            })
        }
    }
}

impl Producer for SingBoxProducer {
    fn format(&self) -> Format {
        Format::SingBox
    }

    fn content_type(&self) -> &'static str {
        CONTENT_TYPE_JSON
    }

    fn supports(&self, proxy_type: ProxyType) -> bool {
        !matches!(proxy_type, ProxyType::ShadowsocksR | ProxyType::Snell)
    }

    fn adapt(&self, node: &mut ProxyNode) -> Adaptation {
        if let Some(plugin) = node.get_str("plugin")
            && matches!(plugin, "restls" | "kcptun")
        {
            return Adaptation::Dropped(format!("plugin {} is not supported by sing-box", plugin));
        }
        Adaptation::Keep
    }

    fn render(&self, set: &ExportSet, warnings: &mut Vec<String>) -> Result<String> {
        let mut document = SingBoxOutbounds::default();
        for node in &set.nodes {
            document.outbounds.extend(self.node_outbounds(node));
        }
        for group in &set.groups {
            let outbound = self.group_outbound(group, set, warnings);
            document.outbounds.push(outbound);
        }

        // Built-in policies referenced by groups need an outbound of their own
        for (name, outbound) in [
            (
                "DIRECT",
                Outbound::Direct(DirectOutbound {
                    tag: Some("DIRECT".to_string()),
                }),
            ),
            (
                "REJECT",
                Outbound::Block(BlockOutbound {
                    tag: Some("REJECT".to_string()),
                }),
            ),
        ] {
            let referenced = document.outbounds.iter().any(|o| match o {
                Outbound::Selector(s) => s.outbounds.iter().any(|m| m == name),
                Outbound::UrlTest(u) => u.outbounds.iter().any(|m| m == name),
                _ => false,
            });
            let defined = document.outbounds.iter().any(|o| o.tag() == Some(name));
            if referenced && !defined {
                document.outbounds.push(outbound);
            }
        }

        if !set.rules.is_empty() {
            debug!("sing-box outbounds carry no routing rules, skipping {}", set.rules.len());
        }

        serde_json::to_string_pretty(&document).context("Failed to serialize sing-box outbounds")
    }
}

fn string_field(node: &ProxyNode, key: &str) -> Option<String> {
    node.get(key).and_then(value_text)
}

fn seconds_field(node: &ProxyNode, key: &str) -> Option<String> {
    node.get_u64(key).map(|secs| format!("{}s", secs))
}

/// Restricts the outbound to TCP when the node does not relay UDP
fn tcp_only(node: &ProxyNode) -> Option<String> {
    (!node.udp()).then(|| "tcp".to_string())
}

/// mihomo `smux` block
fn multiplex(node: &ProxyNode) -> Option<OutboundMultiplex> {
    let smux = node.get_mapping("smux")?;
    let flag = |key: &str| smux.get(key).and_then(Value::as_bool) == Some(true);
    if !flag("enabled") {
        return None;
    }
    Some(OutboundMultiplex {
        enabled: true,
        protocol: smux.get("protocol").and_then(value_text),
        max_connections: smux
            .get("max-connections")
            .and_then(Value::as_u64)
            .and_then(|n| u32::try_from(n).ok()),
        padding: flag("padding"),
    })
}

fn dial_fields(node: &ProxyNode) -> DialFields {
    DialFields {
        tcp_fast_open: node.get_bool("tfo").unwrap_or(false)
            || node.get_bool("fast-open").unwrap_or(false),
        tcp_multi_path: node.get_bool("mptcp").unwrap_or(false),
        ..Default::default()
    }
}

fn tls_config(node: &ProxyNode, always: bool) -> Option<OutboundTlsConfig> {
    if !always && !node.tls() {
        return None;
    }
    let reality = node.get_mapping("reality-opts").map(|opts| OutboundRealityConfig {
        enabled: true,
        public_key: opts.get("public-key").and_then(value_text),
        short_id: opts.get("short-id").and_then(value_text),
    });
    let fingerprint = node
        .get_str("client-fingerprint")
        .map(str::to_string)
        // Reality handshakes require uTLS
        .or_else(|| reality.as_ref().map(|_| "chrome".to_string()));

    Some(OutboundTlsConfig {
        enabled: true,
        disable_sni: node.get_bool("disable-sni").unwrap_or(false),
        server_name: node.server_name().map(str::to_string),
        insecure: node.skip_cert_verify(),
        alpn: node.alpn(),
        utls: fingerprint.map(|fingerprint| UtlsConfig {
            enabled: true,
            fingerprint: Some(fingerprint),
        }),
        reality,
        ..Default::default()
    })
}

fn transport(node: &ProxyNode) -> Option<V2RayTransport> {
    let view = TransportView::of(node);
    match view.network.as_str() {
        "ws" if view.http_upgrade => Some(V2RayTransport::HttpUpgrade(HttpUpgradeTransport {
            host: view.host,
            path: view.path,
        })),
        "ws" => {
            let mut headers = BTreeMap::new();
            if let Some(host) = view.host {
                headers.insert("Host".to_string(), host);
            }
            Some(V2RayTransport::WebSocket(WebSocketTransport {
                path: view.path,
                headers,
                ..Default::default()
            }))
        }
        "grpc" => Some(V2RayTransport::Grpc(GrpcTransport {
            service_name: view.service_name,
        })),
        "h2" => Some(V2RayTransport::Http(HttpTransport {
            host: view
                .host
                .map(|h| h.split(',').map(str::to_string).collect())
                .unwrap_or_default(),
            path: view.path,
        })),
        _ => None,
    }
}

/// `obfs` and `v2ray-plugin` options in SIP003 argument form
fn sip003_plugin(node: &ProxyNode, plugin: &str) -> (String, Option<String>) {
    let opts = node.get_mapping("plugin-opts");
    let opt = |key: &str| opts.and_then(|o| o.get(key)).and_then(value_text);
    match plugin {
        "obfs" => {
            let mut args = vec![format!("obfs={}", opt("mode").unwrap_or_else(|| "http".to_string()))];
            if let Some(host) = opt("host") {
                args.push(format!("obfs-host={}", host));
            }
            ("obfs-local".to_string(), Some(args.join(";")))
        }
        other => {
            let mut args = Vec::new();
            if opt("tls").as_deref() == Some("true") {
                args.push("tls".to_string());
            }
            for key in ["mode", "host", "path"] {
                if let Some(value) = opt(key) {
                    args.push(format!("{}={}", key, value));
                }
            }
            if opt("mux").as_deref() == Some("true") {
                args.push("mux=4".to_string());
            }
            (other.to_string(), (!args.is_empty()).then(|| args.join(";")))
        }
    }
}

fn shadow_tls_outbound(node: &ProxyNode) -> Outbound {
    let opts = node.get_mapping("plugin-opts");
    let opt = |key: &str| opts.and_then(|o| o.get(key));
    let fingerprint = node.get_str("client-fingerprint").map(|fp| UtlsConfig {
        enabled: true,
        fingerprint: Some(fp.to_string()),
    });

    Outbound::ShadowTls(ShadowTlsOutbound {
        tag: Some(format!("{}-shadowtls", node.name)),
        server: Some(bare_server(&node.server).to_string()),
        server_port: Some(node.port),
        version: opt("version")
            .and_then(Value::as_u64)
            .and_then(|v| u8::try_from(v).ok()),
        password: opt("password").and_then(value_text),
        tls: Some(OutboundTlsConfig {
            enabled: true,
            server_name: opt("host").and_then(value_text),
            utls: fingerprint,
            ..Default::default()
        }),
        dial: DialFields::default(),
    })
}

/// Turns `20000-30000,443` into sing-box `server_ports` entries
fn port_ranges(ports: &str) -> Vec<String> {
    ports
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| {
            if p.contains('-') {
                p.replacen('-', ":", 1)
            } else {
                format!("{}:{}", p, p)
            }
        })
        .collect()
}

fn wireguard_addresses(node: &ProxyNode) -> Vec<String> {
    let mut addresses = Vec::new();
    if let Some(ip) = node.get_str("ip") {
        addresses.push(format!("{}/32", ip));
    }
    if let Some(ip) = node.get_str("ipv6") {
        addresses.push(format!("{}/128", ip));
    }
    addresses
}

fn reserved_bytes(node: &ProxyNode) -> Option<[u8; 3]> {
    let Some(Value::Sequence(items)) = node.get("reserved") else {
        return None;
    };
    let bytes: Vec<u8> = items
        .iter()
        .filter_map(Value::as_u64)
        .filter_map(|v| u8::try_from(v).ok())
        .collect();
    <[u8; 3]>::try_from(bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Rule;
    use crate::producer::produce;
    use serde_json::Value as Json;
    use serde_yaml::Mapping;

    fn outbounds(content: &str) -> Vec<Json> {
        let doc: Json = serde_json::from_str(content).unwrap();
        doc["outbounds"].as_array().unwrap().clone()
    }

    #[test]
    fn test_dial_fields_from_node() {
        let mut node = ProxyNode::new("t", ProxyType::Trojan, "a.com", 443).unwrap();
        node.set("password", "pw");
        node.set("fast-open", true);
        node.set("mptcp", true);
        let json = serde_json::to_value(dial_fields(&node)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"tcp_fast_open": true, "tcp_multi_path": true})
        );
    }

    #[test]
    fn test_vless_reality_outbound() {
        let mut reality = Mapping::new();
        reality.insert("public-key".into(), "PUBKEY".into());
        reality.insert("short-id".into(), "0123".into());
        let mut node = ProxyNode::new("v", ProxyType::VLess, "a.com", 443).unwrap();
        node.set("uuid", "uuid-1");
        node.set("tls", true);
        node.set("udp", true);
        node.set("servername", "www.microsoft.com");
        node.set("flow", "xtls-rprx-vision");
        node.set("reality-opts", Value::Mapping(reality));

        let produced = produce(Some(Format::SingBox), &[node], &[], &[]).unwrap();
        assert_eq!(produced.content_type, CONTENT_TYPE_JSON);
        let outbounds = outbounds(&produced.content);
        assert_eq!(outbounds.len(), 1);
        let vless = &outbounds[0];
        assert_eq!(vless["type"], "vless");
        assert_eq!(vless["server_port"], 443);
        assert_eq!(vless["flow"], "xtls-rprx-vision");
        assert_eq!(vless["tls"]["server_name"], "www.microsoft.com");
        assert_eq!(vless["tls"]["reality"]["public_key"], "PUBKEY");
        assert_eq!(vless["tls"]["utls"]["fingerprint"], "chrome");
        assert!(vless.get("network").is_none());
    }

    #[test]
    fn test_groups_and_builtin_outbounds() {
        let mut node = ProxyNode::new("t", ProxyType::Trojan, "b.com", 443).unwrap();
        node.set("password", "pw");
        let groups = vec![
            ProxyGroup::new("Proxy", GroupType::Select, vec!["Auto".into(), "DIRECT".into()]),
            ProxyGroup::new("Auto", GroupType::Fallback, vec!["t".into()]),
        ];
        let rules = vec!["MATCH,Proxy".parse::<Rule>().unwrap()];
        let produced = produce(Some(Format::SingBox), &[node], &groups, &rules).unwrap();
        let outbounds = outbounds(&produced.content);
        let tags: Vec<&str> = outbounds.iter().map(|o| o["tag"].as_str().unwrap()).collect();
        assert_eq!(tags, vec!["t", "Proxy", "Auto", "DIRECT"]);
        assert_eq!(outbounds[0]["tls"]["enabled"], true);
        assert_eq!(outbounds[0]["network"], "tcp");
        assert_eq!(outbounds[1]["type"], "selector");
        assert_eq!(outbounds[2]["type"], "urltest");
        assert_eq!(outbounds[2]["interval"], "300s");
        assert_eq!(outbounds[3]["type"], "direct");
        assert_eq!(produced.warnings.len(), 1);
    }

    #[test]
    fn test_shadow_tls_plugin_chains_outbound() {
        let mut opts = Mapping::new();
        opts.insert("host".into(), "cloud.tencent.com".into());
        opts.insert("password".into(), "stls".into());
        opts.insert("version".into(), 3.into());
        let mut node = ProxyNode::new("s", ProxyType::Shadowsocks, "a.com", 443).unwrap();
        node.set("cipher", "2022-blake3-aes-128-gcm");
        node.set("password", "pw");
        node.set("plugin", "shadow-tls");
        node.set("plugin-opts", Value::Mapping(opts));

        let produced = produce(Some(Format::SingBox), &[node], &[], &[]).unwrap();
        let outbounds = outbounds(&produced.content);
        assert_eq!(outbounds.len(), 2);
        assert_eq!(outbounds[0]["detour"], "s-shadowtls");
        assert!(outbounds[0].get("plugin").is_none());
        assert_eq!(outbounds[1]["type"], "shadowtls");
        assert_eq!(outbounds[1]["version"], 3);
        assert_eq!(outbounds[1]["tls"]["server_name"], "cloud.tencent.com");
    }

    #[test]
    fn test_smux_becomes_multiplex() {
        let mut smux = Mapping::new();
        smux.insert("enabled".into(), true.into());
        smux.insert("protocol".into(), "h2mux".into());
        smux.insert("max-connections".into(), 4.into());
        let mut node = ProxyNode::new("s", ProxyType::Shadowsocks, "a.com", 8388).unwrap();
        node.set("cipher", "aes-128-gcm");
        node.set("password", "pw");
        node.set("smux", Value::Mapping(smux));

        let produced = produce(Some(Format::SingBox), &[node], &[], &[]).unwrap();
        let outbounds = outbounds(&produced.content);
        assert_eq!(outbounds[0]["multiplex"]["enabled"], true);
        assert_eq!(outbounds[0]["multiplex"]["protocol"], "h2mux");
        assert_eq!(outbounds[0]["multiplex"]["max_connections"], 4);
    }

    #[test]
    fn test_hysteria2_and_wireguard_fields() {
        let mut hy2 = ProxyNode::new("h", ProxyType::Hysteria2, "c.com", 443).unwrap();
        hy2.set("password", "pw");
        hy2.set("ports", "20000-30000");
        hy2.set("obfs", "salamander");
        hy2.set("obfs-password", "secret");
        hy2.set("down", "100 Mbps");

        let mut wg = ProxyNode::new("w", ProxyType::WireGuard, "d.com", 51820).unwrap();
        wg.set("private-key", "PRIV");
        wg.set("public-key", "PUB");
        wg.set("ip", "172.16.0.2");
        wg.set(
            "reserved",
            Value::Sequence(vec![1.into(), 2.into(), 3.into()]),
        );

        let produced = produce(Some(Format::SingBox), &[hy2, wg], &[], &[]).unwrap();
        let outbounds = outbounds(&produced.content);
        assert_eq!(outbounds[0]["server_ports"][0], "20000:30000");
        assert_eq!(outbounds[0]["obfs"]["type"], "salamander");
        assert_eq!(outbounds[0]["down_mbps"], 100);
        assert_eq!(outbounds[1]["local_address"][0], "172.16.0.2/32");
        assert_eq!(outbounds[1]["reserved"], serde_json::json!([1, 2, 3]));
        assert_eq!(outbounds[1]["peer_public_key"], "PUB");
    }

    #[test]
    fn test_ssr_is_dropped() {
        let mut node = ProxyNode::new("r", ProxyType::ShadowsocksR, "a.com", 443).unwrap();
        node.set("cipher", "aes-256-cfb");
        let err = produce(Some(Format::SingBox), &[node], &[], &[]).unwrap_err();
        assert!(err.to_string().contains("nothing to export"));
    }
}
