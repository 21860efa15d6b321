//! VMess protocol parser
//!
//! This module provides parsing for VMess (vmess://) URIs.
//! VMess URIs are Base64 encoded JSON containing connection details.

use anyhow::{Context, Result, anyhow};
use serde::Deserialize;
use tracing::trace;

use crate::model::{ProxyNode, ProxyType, parse_bool_flag, split_list};
use crate::normalize::{apply_transport, string_list};
use crate::parser::base64::decode_base64;

use super::{ProtocolParser, parse_port};

// ============================================================================
// VMess Parser
// ============================================================================

/// Parser for VMess (vmess://) URIs
///
/// vmess://BASE64({ "v": "2", "ps": "name", "add": "host", "port": 443, ... })
pub struct VMessParser;

/// VMess URI JSON structure
///
/// Generators disagree on whether numbers are quoted, so every field is read
/// leniently as text.
#[derive(Deserialize, Debug, Default)]
#[serde(default)]
struct VMessJson {
    #[serde(deserialize_with = "lenient_string")]
    ps: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    name: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    add: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    port: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    id: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    aid: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    scy: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    net: Option<String>,
    #[serde(rename = "type", deserialize_with = "lenient_string")]
    header_type: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    host: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    path: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    tls: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    sni: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    alpn: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    fp: Option<String>,
    #[serde(rename = "serviceName", deserialize_with = "lenient_string")]
    service_name: Option<String>,
    #[serde(deserialize_with = "lenient_string")]
    udp: Option<String>,
    #[serde(rename = "skip-cert-verify", deserialize_with = "lenient_string")]
    skip_cert_verify: Option<String>,
}

impl ProtocolParser for VMessParser {
    fn scheme(&self) -> &str {
        "vmess"
    }

    fn parse(&self, uri: &str) -> Result<ProxyNode> {
        trace!("Parsing VMess URI");
        let encoded = uri
            .trim()
            .strip_prefix("vmess://")
            .ok_or_else(|| anyhow!("Invalid VMess URI: missing vmess:// prefix"))?;
        let encoded = encoded.split('#').next().unwrap_or_default();

        let decoded = decode_base64(encoded)
            .and_then(|b| String::from_utf8(b).context("Invalid UTF-8"))
            .context("Failed to decode VMess URI")?;
        trace!("Decoded VMess JSON: {}", decoded);

        let json: VMessJson =
            serde_json::from_str(&decoded).context("Failed to parse VMess JSON")?;

        let server = json
            .add
            .as_deref()
            .ok_or_else(|| anyhow!("VMess URI missing server address"))?;
        let port = parse_port(json.port.as_deref().unwrap_or_default())?;
        let uuid = json
            .id
            .as_deref()
            .ok_or_else(|| anyhow!("VMess URI missing UUID"))?;
        let name = json.ps.as_deref().or(json.name.as_deref()).unwrap_or_default();

        trace!(
            "VMess config: server={}:{}, net={:?}, tls={:?}",
            server, port, json.net, json.tls
        );

        let mut node = ProxyNode::new(name, ProxyType::VMess, server, port)?;
        node.set("uuid", uuid);
        let alter_id = json
            .aid
            .as_deref()
            .and_then(|a| a.trim().parse::<u64>().ok())
            .unwrap_or(0);
        node.set("alterId", alter_id);
        node.set("cipher", json.scy.as_deref().unwrap_or("auto"));

        if let Some(udp) = json.udp.as_deref().and_then(parse_bool_flag) {
            node.set("udp", udp);
        }

        match json.tls.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("tls") | Some("true") | Some("1") => node.set("tls", true),
            Some("reality") => node.set("security", "reality"),
            _ => {}
        }
        if let Some(sni) = &json.sni {
            node.set("sni", sni.as_str());
        }
        if let Some(alpn) = &json.alpn {
            node.set("alpn", string_list(&split_list(alpn)));
        }
        if let Some(fp) = &json.fp {
            node.set("fp", fp.as_str());
        }
        if json.skip_cert_verify.as_deref().and_then(parse_bool_flag) == Some(true) {
            node.set("skip-cert-verify", true);
        }

        // Transport blocks are built only for the declared network
        let network = json.net.as_deref().unwrap_or("tcp");
        if network == "tcp" && json.header_type.as_deref() == Some("http") {
            node.set("network", "http");
        } else {
            apply_transport(
                &mut node,
                network,
                json.path.as_deref(),
                json.host.as_deref(),
                json.service_name.as_deref(),
            );
        }

        Ok(node)
    }
}

// ============================================================================
// Deserialization Helpers
// ============================================================================

/// Reads a string, number or boolean as optional text; empty strings become `None`
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(serde_json::Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}
