//! Field-order and quoting behavior of emitted documents.

use subforge::emit::emit_config;
use subforge::model::{GroupType, ProxyGroup};
use subforge::parser::ProtocolRegistry;
use subforge::producer::{Format, produce};

fn leading_keys(record: &serde_yaml::Value, count: usize) -> Vec<String> {
    record
        .as_mapping()
        .unwrap()
        .keys()
        .take(count)
        .filter_map(|k| k.as_str().map(str::to_string))
        .collect()
}

#[test]
fn test_emitted_proxies_lead_with_common_keys() {
    let registry = ProtocolRegistry::with_builtin_parsers();
    let links = [
        "ss://YWVzLTI1Ni1nY206cGFzc3dvcmQ=@example.com:8388#MyNode",
        "vless://uuid-1@vl.example.com:443?security=reality&pbk=PUBKEY&sid=1234&sni=sni.example.com#Node1",
        "tuic://uuid-2:pw@tuic.example.com:443?congestion_control=bbr#tuic",
    ];
    let nodes: Vec<_> = links.iter().map(|l| registry.parse_uri(l).unwrap()).collect();
    let mut group = ProxyGroup::new("Auto", GroupType::UrlTest, vec!["MyNode".into(), "Node1".into()]);
    group.interval = Some(300);
    group.url = Some("https://www.gstatic.com/generate_204".into());

    let produced = produce(Some(Format::ClashMeta), &nodes, &[group], &[]).unwrap();
    let doc: serde_yaml::Value = serde_yaml::from_str(&produced.content).unwrap();

    for proxy in doc["proxies"].as_sequence().unwrap() {
        assert_eq!(leading_keys(proxy, 4), vec!["name", "type", "server", "port"]);
    }
    assert_eq!(
        leading_keys(&doc["proxy-groups"][0], 5),
        vec!["name", "type", "proxies", "url", "interval"]
    );

    // an all-digit short-id stays a string
    assert!(produced.content.contains("short-id: \"1234\""));
    assert_eq!(doc["proxies"][1]["reality-opts"]["short-id"].as_str(), Some("1234"));
}

#[test]
fn test_emit_config_reorders_and_quotes() {
    let config: serde_yaml::Value = serde_yaml::from_str(
        r##"
mixed-port: 7890
proxies:
  - {port: 443, password: "a:b", server: a.com, type: trojan, name: "#1", sni: ""}
proxy-groups:
  - {proxies: ["#1"], type: select, name: "@home"}
"##,
    )
    .unwrap();
    let emitted = emit_config(&config);
    let again: serde_yaml::Value = serde_yaml::from_str(&emitted).unwrap();
    // mapping equality ignores key order
    assert_eq!(again, config);
    assert_eq!(leading_keys(&again["proxies"][0], 4), vec!["name", "type", "server", "port"]);
    assert_eq!(leading_keys(&again["proxy-groups"][0], 3), vec!["name", "type", "proxies"]);
    assert!(emitted.contains("sni: \"\""));
    assert_eq!(again["mixed-port"].as_u64(), Some(7890));
}
