//! Field-order emitter
//!
//! Writes block-style YAML with a fixed leading key order for proxy and group
//! records, so regenerated subscriptions diff cleanly. String scalars are quoted
//! whenever a plain scalar could be read back as something else.

use anyhow::Result;
use serde_yaml::{Mapping, Value};

use crate::model::{ProxyGroup, ProxyNode, Rule};

/// Leading keys of every proxy record
pub const PROXY_KEY_ORDER: [&str; 4] = ["name", "type", "server", "port"];

/// Leading keys of every proxy group record
pub const GROUP_KEY_ORDER: [&str; 9] = [
    "name", "type", "proxies", "use", "url", "interval", "strategy", "lazy", "hidden",
];

/// Values of these keys are always double-quoted
const ALWAYS_QUOTED_KEYS: [&str; 1] = ["short-id"];

/// Characters that force quoting anywhere in a string
const SPECIAL_CHARS: [char; 5] = [':', '#', '[', ']', ','];

/// YAML 1.1 scalars some clients still load as booleans or null
const AMBIGUOUS_WORDS: [&str; 9] = ["y", "n", "yes", "no", "on", "off", "true", "false", "null"];

/// Characters that force quoting at the start of a string
const LEADING_INDICATORS: [char; 14] = [
    '@', '`', '-', '?', '!', '&', '*', '|', '>', '\'', '"', '%', '{', '}',
];

// ============================================================================
// Key Ordering
// ============================================================================

/// Reorders `mapping` so the keys in `order` come first, the rest keep their order
pub fn reorder_fields(mapping: &Mapping, order: &[&str]) -> Mapping {
    let mut ordered = Mapping::with_capacity(mapping.len());
    for key in order {
        if let Some(value) = mapping.get(*key) {
            ordered.insert(Value::from(*key), value.clone());
        }
    }
    for (key, value) in mapping {
        let leading = key.as_str().is_some_and(|k| order.contains(&k));
        if !leading {
            ordered.insert(key.clone(), value.clone());
        }
    }
    ordered
}

pub fn order_proxy_fields(mapping: &Mapping) -> Mapping {
    reorder_fields(mapping, &PROXY_KEY_ORDER)
}

pub fn order_group_fields(mapping: &Mapping) -> Mapping {
    reorder_fields(mapping, &GROUP_KEY_ORDER)
}

// ============================================================================
// Document Emission
// ============================================================================

/// Emits a whole configuration, ordering the records under `proxies` and
/// `proxy-groups`; every other top-level key is written as-is
pub fn emit_config(config: &Value) -> String {
    let Value::Mapping(root) = config else {
        return to_yaml_string(config);
    };

    let mut ordered = Mapping::with_capacity(root.len());
    for (key, value) in root {
        let value = match (key.as_str(), value) {
            (Some("proxies"), Value::Sequence(items)) => {
                Value::Sequence(reorder_records(items, order_proxy_fields))
            }
            (Some("proxy-groups"), Value::Sequence(items)) => {
                Value::Sequence(reorder_records(items, order_group_fields))
            }
            _ => value.clone(),
        };
        ordered.insert(key.clone(), value);
    }
    to_yaml_string(&Value::Mapping(ordered))
}

/// Emits the canonical `proxies` / `proxy-groups` / `rules` document
///
/// Empty sections are left out.
pub fn emit_document(nodes: &[ProxyNode], groups: &[ProxyGroup], rules: &[Rule]) -> Result<String> {
    let mut root = Mapping::new();
    if !nodes.is_empty() {
        let proxies = nodes.iter().map(|n| Value::Mapping(n.to_mapping())).collect();
        root.insert("proxies".into(), Value::Sequence(proxies));
    }
    if !groups.is_empty() {
        let mut items = Vec::with_capacity(groups.len());
        for group in groups {
            items.push(Value::Mapping(group.to_mapping()?));
        }
        root.insert("proxy-groups".into(), Value::Sequence(items));
    }
    if !rules.is_empty() {
        let rules = rules.iter().map(|r| Value::from(r.to_string())).collect();
        root.insert("rules".into(), Value::Sequence(rules));
    }
    Ok(emit_config(&Value::Mapping(root)))
}

fn reorder_records(items: &[Value], order: fn(&Mapping) -> Mapping) -> Vec<Value> {
    items
        .iter()
        .map(|item| match item {
            Value::Mapping(mapping) => Value::Mapping(order(mapping)),
            other => other.clone(),
        })
        .collect()
}

// ============================================================================
// YAML Writer
// ============================================================================

/// Writes a value as block-style YAML
pub fn to_yaml_string(value: &Value) -> String {
    let mut out = String::new();
    match value {
        Value::Mapping(m) if !m.is_empty() => write_mapping(&mut out, m, 0),
        Value::Sequence(s) if !s.is_empty() => write_sequence(&mut out, s, 0, None),
        other => {
            out.push_str(&scalar(other, None));
            out.push('\n');
        }
    }
    out
}

fn write_mapping(out: &mut String, mapping: &Mapping, indent: usize) {
    for (key, value) in mapping {
        let key_text = match key {
            Value::String(s) => quote_if_needed(s, None),
            other => scalar(other, None),
        };
        push_indent(out, indent);
        out.push_str(&key_text);
        out.push(':');

        let field = key.as_str();
        match untag(value) {
            Value::Mapping(m) if !m.is_empty() => {
                out.push('\n');
                write_mapping(out, m, indent + 2);
            }
            Value::Sequence(s) if !s.is_empty() => {
                out.push('\n');
                write_sequence(out, s, indent + 2, field);
            }
            other => {
                out.push(' ');
                out.push_str(&scalar(other, field));
                out.push('\n');
            }
        }
    }
}

fn write_sequence(out: &mut String, items: &[Value], indent: usize, field: Option<&str>) {
    for item in items {
        push_indent(out, indent);
        out.push_str("- ");
        match untag(item) {
            Value::Mapping(m) if !m.is_empty() => {
                // First entry shares the dash line
                let mut nested = String::new();
                write_mapping(&mut nested, m, indent + 2);
                out.push_str(&nested[indent + 2..]);
            }
            Value::Sequence(s) if !s.is_empty() => {
                let mut nested = String::new();
                write_sequence(&mut nested, s, indent + 2, field);
                out.push_str(&nested[indent + 2..]);
            }
            other => {
                out.push_str(&scalar(other, field));
                out.push('\n');
            }
        }
    }
}

fn untag(value: &Value) -> &Value {
    match value {
        Value::Tagged(tagged) => untag(&tagged.value),
        other => other,
    }
}

fn push_indent(out: &mut String, indent: usize) {
    out.extend(std::iter::repeat_n(' ', indent));
}

/// Renders a scalar (or an empty collection) on one line
fn scalar(value: &Value, field: Option<&str>) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => quote_if_needed(s, field),
        Value::Sequence(_) => "[]".to_string(),
        Value::Mapping(_) => "{}".to_string(),
        Value::Tagged(tagged) => scalar(&tagged.value, field),
    }
}

// ============================================================================
// Quoting
// ============================================================================

/// Whether a string value must be double-quoted
pub fn needs_quotes(s: &str, field: Option<&str>) -> bool {
    if s.is_empty() || field.is_some_and(|f| ALWAYS_QUOTED_KEYS.contains(&f)) {
        return true;
    }
    if s.contains(SPECIAL_CHARS) || s.starts_with(LEADING_INDICATORS) {
        return true;
    }
    if s.trim() != s || s.contains(['{', '}']) || s.chars().any(char::is_control) {
        return true;
    }
    if s == "~" || AMBIGUOUS_WORDS.contains(&s.to_ascii_lowercase().as_str()) {
        return true;
    }
    // Anything a YAML reader would not load back as this exact string
    !matches!(serde_yaml::from_str::<Value>(s), Ok(Value::String(ref parsed)) if parsed == s)
}

fn quote_if_needed(s: &str, field: Option<&str>) -> String {
    if needs_quotes(s, field) {
        double_quote(s)
    } else {
        s.to_string()
    }
}

fn double_quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c.is_control() => out.push_str(&format!("\\u{:04X}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}
