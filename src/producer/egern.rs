//! Egern producer
//!
//! Egern reads YAML, but every record is keyed by its kind
//! (`- shadowsocks: {...}`, `- select: {...}`) and option names use underscores.

use anyhow::Result;
use serde_yaml::{Mapping, Value};

use crate::emit::to_yaml_string;
use crate::model::{GroupType, ProxyGroup, ProxyNode, ProxyType, Rule};

use super::{
    Adaptation, CONTENT_TYPE_YAML, DEFAULT_TEST_INTERVAL, DEFAULT_TEST_URL, ExportSet, Format,
    Producer, TransportView, bare_server, parse_mbps, text_members, value_text,
};

pub struct EgernProducer;

impl EgernProducer {
    fn proxy_record(&self, node: &ProxyNode) -> Value {
        let mut body = Mapping::new();
        insert(&mut body, "name", node.name.as_str());
        insert(&mut body, "server", bare_server(&node.server));
        insert(&mut body, "port", u64::from(node.port));

        let kind = match node.proxy_type {
            ProxyType::Shadowsocks => {
                copy(&mut body, node, "cipher", "method");
                copy(&mut body, node, "password", "password");
                if node.get_str("plugin") == Some("obfs")
                    && let Some(opts) = node.get_mapping("plugin-opts")
                {
                    if let Some(mode) = opts.get("mode").and_then(value_text) {
                        insert(&mut body, "obfs", mode);
                    }
                    if let Some(host) = opts.get("host").and_then(value_text) {
                        insert(&mut body, "obfs_host", host);
                    }
                }
                "shadowsocks"
            }
            ProxyType::VMess => {
                copy(&mut body, node, "uuid", "user_id");
                insert(&mut body, "security", node.get_str("cipher").unwrap_or("auto"));
                insert_transport(&mut body, node);
                insert_tls(&mut body, node);
                "vmess"
            }
            ProxyType::VLess => {
                copy(&mut body, node, "uuid", "user_id");
                copy(&mut body, node, "flow", "flow");
                insert_transport(&mut body, node);
                insert_tls(&mut body, node);
                "vless"
            }
            ProxyType::Trojan => {
                copy(&mut body, node, "password", "password");
                insert_transport(&mut body, node);
                insert_tls(&mut body, node);
                "trojan"
            }
            ProxyType::Hysteria2 => {
                copy(&mut body, node, "password", "auth");
                if let Some(down) = node.get("down").and_then(parse_mbps) {
                    insert(&mut body, "bandwidth", u64::from(down));
                }
                copy(&mut body, node, "obfs-password", "obfs_password");
                insert_tls(&mut body, node);
                "hysteria2"
            }
            ProxyType::Tuic => {
                copy(&mut body, node, "uuid", "uuid");
                copy(&mut body, node, "password", "password");
                copy(&mut body, node, "alpn", "alpn");
                insert_tls(&mut body, node);
                "tuic"
            }
            ProxyType::Socks5 => {
                copy(&mut body, node, "username", "username");
                copy(&mut body, node, "password", "password");
                "socks5"
            }
            // http is the last type `supports` lets through
            _ => {
                copy(&mut body, node, "username", "username");
                copy(&mut body, node, "password", "password");
                if node.tls() {
                    insert_tls(&mut body, node);
                    "https"
                } else {
                    "http"
                }
            }
        };

        if !matches!(node.proxy_type, ProxyType::Http) {
            insert(&mut body, "udp_relay", node.udp());
        }
        if node.get_bool("tfo") == Some(true) {
            insert(&mut body, "tfo", true);
        }
        record(kind, body)
    }

    fn group_record(&self, group: &ProxyGroup, set: &ExportSet, warnings: &mut Vec<String>) -> Value {
        let kind = match group.group_type {
            GroupType::Select => "select",
            GroupType::UrlTest => "auto_test",
            GroupType::Fallback => "fallback",
            GroupType::LoadBalance => "load_balance",
            GroupType::Relay => {
                warnings.push(format!(
                    "group '{}': relay groups are not supported by egern, exported as select",
                    group.name
                ));
                "select"
            }
        };

        let mut members: Vec<Value> = text_members(group, set).into_iter().map(Value::from).collect();
        if members.is_empty() {
            members.push("DIRECT".into());
        }

        let mut body = Mapping::new();
        insert(&mut body, "name", group.name.as_str());
        insert(&mut body, "policies", Value::Sequence(members));
        if group.group_type.is_tested() {
            insert(&mut body, "url", group.url.as_deref().unwrap_or(DEFAULT_TEST_URL));
            insert(
                &mut body,
                "interval",
                u64::from(group.interval.unwrap_or(DEFAULT_TEST_INTERVAL)),
            );
        }
        if group.group_type == GroupType::UrlTest
            && let Some(tolerance) = group.tolerance
        {
            insert(&mut body, "tolerance", u64::from(tolerance));
        }
        record(kind, body)
    }
}

impl Producer for EgernProducer {
    fn format(&self) -> Format {
        Format::Egern
    }

    fn content_type(&self) -> &'static str {
        CONTENT_TYPE_YAML
    }

    fn supports(&self, proxy_type: ProxyType) -> bool {
        matches!(
            proxy_type,
            ProxyType::Shadowsocks
                | ProxyType::VMess
                | ProxyType::VLess
                | ProxyType::Trojan
                | ProxyType::Hysteria2
                | ProxyType::Tuic
                | ProxyType::Socks5
                | ProxyType::Http
        )
    }

    fn adapt(&self, node: &mut ProxyNode) -> Adaptation {
        if let Some(plugin) = node.get_str("plugin")
            && plugin != "obfs"
        {
            return Adaptation::Dropped(format!("plugin {} is not supported by egern", plugin));
        }
        let transport = TransportView::of(node);
        if !matches!(transport.network.as_str(), "tcp" | "ws") {
            return Adaptation::Dropped(format!(
                "{} transport is not supported by egern",
                transport.network
            ));
        }
        if node.remove("reality-opts").is_some() {
            return Adaptation::Downgraded("reality downgraded to plain tls (not supported by egern)".to_string());
        }
        Adaptation::Keep
    }

    fn render(&self, set: &ExportSet, warnings: &mut Vec<String>) -> Result<String> {
        let mut root = Mapping::new();

        let proxies = set.nodes.iter().map(|n| self.proxy_record(n)).collect();
        insert(&mut root, "proxies", Value::Sequence(proxies));

        if !set.groups.is_empty() {
            let groups = set
                .groups
                .iter()
                .map(|g| self.group_record(g, set, warnings))
                .collect();
            insert(&mut root, "policy_groups", Value::Sequence(groups));
        }

        if !set.rules.is_empty() {
            let mut rules = Vec::with_capacity(set.rules.len());
            for rule in &set.rules {
                match rule_record(rule) {
                    Some(value) => rules.push(value),
                    None => warnings.push(format!("rule '{}' is not supported by egern", rule)),
                }
            }
            insert(&mut root, "rules", Value::Sequence(rules));
        }

        Ok(to_yaml_string(&Value::Mapping(root)))
    }
}

fn insert(mapping: &mut Mapping, key: &str, value: impl Into<Value>) {
    mapping.insert(Value::from(key), value.into());
}

fn copy(mapping: &mut Mapping, node: &ProxyNode, from: &str, to: &str) {
    if let Some(value) = node.get(from) {
        mapping.insert(Value::from(to), value.clone());
    }
}

fn record(kind: &str, body: Mapping) -> Value {
    let mut outer = Mapping::new();
    outer.insert(Value::from(kind), Value::Mapping(body));
    Value::Mapping(outer)
}

fn insert_tls(body: &mut Mapping, node: &ProxyNode) {
    if matches!(node.proxy_type, ProxyType::VMess | ProxyType::VLess) {
        insert(body, "tls", node.tls());
    }
    if let Some(sni) = node.server_name() {
        insert(body, "sni", sni);
    }
    if node.skip_cert_verify() {
        insert(body, "skip_tls_verify", true);
    }
}

fn insert_transport(body: &mut Mapping, node: &ProxyNode) {
    let transport = TransportView::of(node);
    if transport.network != "ws" {
        return;
    }
    let mut ws = Mapping::new();
    if let Some(path) = transport.path {
        insert(&mut ws, "path", path);
    }
    if let Some(host) = transport.host {
        let mut headers = Mapping::new();
        insert(&mut headers, "Host", host);
        insert(&mut ws, "headers", Value::Mapping(headers));
    }
    if node.proxy_type == ProxyType::Trojan {
        insert(body, "websocket", Value::Mapping(ws));
    } else {
        let mut transport = Mapping::new();
        insert(&mut transport, "ws", Value::Mapping(ws));
        insert(body, "transport", Value::Mapping(transport));
    }
}

fn rule_record(rule: &Rule) -> Option<Value> {
    let mut body = Mapping::new();
    if rule.is_match() {
        insert(&mut body, "policy", rule.target.as_str());
        return Some(record("default", body));
    }
    let kind = match rule.kind.as_str() {
        "DOMAIN" => "domain",
        "DOMAIN-SUFFIX" => "domain_suffix",
        "DOMAIN-KEYWORD" => "domain_keyword",
        "IP-CIDR" | "IP-CIDR6" => "ip_cidr",
        "GEOIP" => "geoip",
        "RULE-SET" => "rule_set",
        _ => return None,
    };
    insert(&mut body, "match", rule.payload.as_str());
    insert(&mut body, "policy", rule.target.as_str());
    if rule.options.iter().any(|o| o == "no-resolve") {
        insert(&mut body, "no_resolve", true);
    }
    Some(record(kind, body))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::producer::produce;

    #[test]
    fn test_egern_document_shape() {
        let mut node = ProxyNode::new("hk", ProxyType::Shadowsocks, "a.com", 8388).unwrap();
        node.set("cipher", "aes-256-gcm");
        node.set("password", "pw");
        node.set("udp", true);
        let groups = vec![ProxyGroup::new("Auto", GroupType::UrlTest, vec!["hk".into()])];
        let rules = vec![
            "DOMAIN-SUFFIX,google.com,Auto".parse::<Rule>().unwrap(),
            "MATCH,DIRECT".parse::<Rule>().unwrap(),
        ];
        let produced = produce(Some(Format::Egern), &[node], &groups, &rules).unwrap();
        let doc: Value = serde_yaml::from_str(&produced.content).unwrap();

        let ss = &doc["proxies"][0]["shadowsocks"];
        assert_eq!(ss["name"].as_str(), Some("hk"));
        assert_eq!(ss["method"].as_str(), Some("aes-256-gcm"));
        assert_eq!(ss["udp_relay"].as_bool(), Some(true));

        let auto = &doc["policy_groups"][0]["auto_test"];
        assert_eq!(auto["policies"][0].as_str(), Some("hk"));
        assert_eq!(auto["interval"].as_u64(), Some(300));

        assert_eq!(doc["rules"][0]["domain_suffix"]["match"].as_str(), Some("google.com"));
        assert_eq!(doc["rules"][1]["default"]["policy"].as_str(), Some("DIRECT"));
    }

    #[test]
    fn test_egern_downgrades_reality() {
        let mut node = ProxyNode::new("v", ProxyType::VLess, "a.com", 443).unwrap();
        node.set("uuid", "uuid-1");
        node.set("tls", true);
        node.set("reality-opts", Value::Mapping(Mapping::new()));
        let produced = produce(Some(Format::Egern), &[node], &[], &[]).unwrap();
        assert_eq!(produced.warnings.len(), 1);
        let doc: Value = serde_yaml::from_str(&produced.content).unwrap();
        assert_eq!(doc["proxies"][0]["vless"]["tls"].as_bool(), Some(true));
        assert!(!produced.content.contains("reality"));
    }
}
