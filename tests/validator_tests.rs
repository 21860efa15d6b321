//! Group validator scenarios over whole configuration documents.

use subforge::emit::emit_config;
use subforge::validator::{IssueLevel, validate, validate_yaml};

fn group_cycle(names: &[&str]) -> String {
    let mut yaml = String::from("proxy-groups:\n");
    for (idx, name) in names.iter().enumerate() {
        let next = names[(idx + 1) % names.len()];
        yaml.push_str(&format!("  - {{name: {}, type: select, proxies: [{}]}}\n", name, next));
    }
    yaml
}

#[test]
fn test_cycles_of_any_length_reported_once() {
    for len in 2..=6 {
        let names: Vec<String> = (0..len).map(|i| format!("G{}", i)).collect();
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        let result = validate_yaml(&group_cycle(&names)).unwrap();

        let errors: Vec<_> = result.issues.iter().filter(|i| i.level == IssueLevel::Error).collect();
        assert_eq!(errors.len(), 1, "cycle of {}", len);

        let mut expected: Vec<String> = names.iter().map(|n| n.to_string()).collect();
        expected.push(names[0].to_string());
        assert_eq!(errors[0].path.as_ref(), Some(&expected));
        assert_eq!(
            errors[0].message,
            format!("circular group reference detected: {}", expected.join(" → "))
        );
    }
}

#[test]
fn test_cycle_through_mixed_members() {
    let yaml = r#"
proxies:
  - {name: hk, type: trojan, server: a.com, port: 443, password: pw}
proxy-groups:
  - {name: Proxy, type: select, proxies: [Auto, hk, DIRECT]}
  - {name: Auto, type: url-test, proxies: [hk, Fallback]}
  - {name: Fallback, type: fallback, proxies: [Proxy, REJECT]}
"#;
    let result = validate_yaml(yaml).unwrap();
    assert!(!result.valid);
    assert_eq!(result.issues.len(), 1);
    assert_eq!(
        result.issues[0].path.as_deref(),
        Some(&["Proxy", "Auto", "Fallback", "Proxy"].map(String::from)[..])
    );
}

#[test]
fn test_repeated_runs_are_deterministic() {
    let yaml = group_cycle(&["C", "A", "B"]);
    let first = validate_yaml(&yaml).unwrap();
    for _ in 0..5 {
        assert_eq!(validate_yaml(&yaml).unwrap(), first);
    }
    assert_eq!(first.issues[0].path.as_ref().unwrap()[0], "C");
}

#[test]
fn test_fixed_config_survives_emit_and_revalidation() {
    let yaml = r#"
proxies:
  - {type: ss, name: hk, server: a.com, port: 8388, cipher: aes-128-gcm, password: pw}
  - {name: hk, type: ss, server: b.com, port: 8388, cipher: aes-128-gcm, password: pw}
  - {name: jp, type: trojan, server: c.com, port: 443, password: pw}
proxy-groups:
  - {name: Proxy, type: select, proxies: [hk, jp, DIRCT, jp, ghost]}
  - {name: Block, type: select, proxies: [REJET]}
rules:
  - DOMAIN-SUFFIX,ads.example.com,Block
  - MATCH,Proxy
  - GEOIP,CN,DIRECT
"#;
    let first = validate_yaml(yaml).unwrap();
    assert!(!first.valid);
    assert!(first.issues.iter().any(|i| i.auto_fixed));
    let fixed = first.fixed_config.unwrap();

    let emitted = emit_config(&fixed);
    let second = validate_yaml(&emitted).unwrap();
    assert!(second.valid, "{:?}", second.issues);
    assert!(second.issues.is_empty(), "{:?}", second.issues);
    assert!(second.fixed_config.is_none());

    let reparsed: serde_yaml::Value = serde_yaml::from_str(&emitted).unwrap();
    assert_eq!(validate(&reparsed), second);
    let members: Vec<&str> = reparsed["proxy-groups"][0]["proxies"]
        .as_sequence()
        .unwrap()
        .iter()
        .filter_map(|v| v.as_str())
        .collect();
    assert_eq!(members, vec!["hk", "jp", "DIRECT"]);
    assert_eq!(reparsed["rules"].as_sequence().unwrap().len(), 2);
}

#[test]
fn test_dynamic_groups_need_no_static_members() {
    let yaml = r#"
proxies:
  - {name: hk, type: trojan, server: a.com, port: 443, password: pw}
proxy-groups:
  - {name: All, type: select, include-all: true}
  - {name: HK, type: url-test, filter: "(?i)hk"}
  - {name: Remote, type: select, use: [provider-a]}
  - {name: Mixed, type: select, use: [provider-a], proxies: [gone]}
"#;
    let result = validate_yaml(yaml).unwrap();
    let errors: Vec<_> = result.issues.iter().filter(|i| i.level == IssueLevel::Error).collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].location, "proxy-groups[3].proxies[0]");
    assert!(errors[0].auto_fixed);
}

#[test]
fn test_non_mapping_root() {
    let result = validate_yaml("- just\n- a list\n").unwrap();
    assert!(!result.valid);
    assert_eq!(result.issues[0].location, "$");
}

#[test]
fn test_invalid_yaml_is_an_error() {
    assert!(validate_yaml("proxies: [unclosed").is_err());
}

#[test]
fn test_json_shape() {
    let result = validate_yaml(&group_cycle(&["A", "B"])).unwrap();
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["valid"], false);
    assert_eq!(json["issues"][0]["level"], "error");
    assert_eq!(json["issues"][0]["autoFixed"], false);
    assert_eq!(json["issues"][0]["path"], serde_json::json!(["A", "B", "A"]));
    assert!(json.get("fixedConfig").is_none());
}
