//! Shadowsocks protocol parser
//!
//! This module provides parsing for Shadowsocks (ss://) URIs.
//! Supports both SIP002 format and legacy format, as well as SIP003 plugins.

use anyhow::{Context, Result, anyhow};
use serde_yaml::{Mapping, Value};
use tracing::{trace, warn};

use crate::model::{ProxyNode, ProxyType, parse_bool_flag};
use crate::normalize::{QueryParams, percent_decode};
use crate::parser::base64::decode_base64;

use super::{ProtocolParser, parse_host_port, split_fragment, split_query};

// ============================================================================
// Shadowsocks Parser
// ============================================================================

/// Parser for Shadowsocks (ss://) URIs
///
/// - SIP002: ss://BASE64(method:password)@host:port#tag
/// - SIP002 with userinfo: ss://method:password@host:port#tag
/// - SIP002 with SIP003 plugin: ss://userinfo@host:port/?plugin=plugin-name;plugin-opts#tag
/// - Legacy: ss://BASE64(method:password@host:port)#tag
pub struct ShadowsocksParser;

impl ProtocolParser for ShadowsocksParser {
    fn scheme(&self) -> &str {
        "ss"
    }

    fn parse(&self, uri: &str) -> Result<ProxyNode> {
        trace!("Parsing Shadowsocks URI");
        let without_scheme = uri
            .strip_prefix("ss://")
            .ok_or_else(|| anyhow!("Invalid Shadowsocks URI: missing ss:// prefix"))?;

        let (body, name) = split_fragment(without_scheme);
        let (main_part, query) = split_query(body);

        let (method, password, server, port) = match main_part.rfind('@') {
            Some(at_pos) => {
                trace!("Parsing as SIP002 format (found @ separator)");
                let (method, password) = parse_userinfo(&main_part[..at_pos])?;
                let (server, port) = parse_host_port(&main_part[at_pos + 1..])?;
                (method, password, server, port)
            }
            None => {
                trace!("Parsing as legacy Base64 format");
                parse_legacy(main_part)?
            }
        };

        if method.is_empty() {
            anyhow::bail!("Shadowsocks URI missing cipher");
        }

        let mut node = ProxyNode::new(
            name.unwrap_or_default(),
            ProxyType::Shadowsocks,
            server,
            port,
        )?;
        node.set("cipher", method);
        node.set("password", password);

        let params = QueryParams::parse(query);
        if let Some(plugin) = params.get("plugin") {
            apply_plugin(&mut node, plugin);
        }
        if params.get_bool("uot") == Some(true) || params.get_bool("udp-over-tcp") == Some(true) {
            node.set("udp-over-tcp", true);
        }
        if let Some(udp) = params.get_bool("udp") {
            node.set("udp", udp);
        }

        Ok(node)
    }
}

/// Parses userinfo which can be Base64(method:password) or method:password
fn parse_userinfo(userinfo: &str) -> Result<(String, String)> {
    let plain = percent_decode(userinfo);
    if let Some((method, password)) = plain.split_once(':') {
        return Ok((method.to_string(), password.to_string()));
    }

    let decoded = decode_base64(&plain)
        .and_then(|b| String::from_utf8(b).context("Invalid UTF-8 in Shadowsocks userinfo"))
        .context("Failed to decode Shadowsocks userinfo")?;
    let (method, password) = decoded
        .split_once(':')
        .ok_or_else(|| anyhow!("Invalid Shadowsocks userinfo: missing method:password separator"))?;
    Ok((method.to_string(), password.to_string()))
}

/// Parses legacy format: BASE64(method:password@host:port)
fn parse_legacy(main_part: &str) -> Result<(String, String, String, u16)> {
    let decoded = decode_base64(main_part)
        .and_then(|b| String::from_utf8(b).context("Invalid UTF-8 in Shadowsocks URI"))
        .context("Failed to decode legacy Shadowsocks URI")?;

    let at_pos = decoded
        .rfind('@')
        .ok_or_else(|| anyhow!("Invalid legacy Shadowsocks format: missing @"))?;
    let (server, port) = parse_host_port(&decoded[at_pos + 1..])?;
    let (method, password) = decoded[..at_pos]
        .split_once(':')
        .ok_or_else(|| anyhow!("Invalid Shadowsocks userinfo: missing method:password separator"))?;

    Ok((method.to_string(), password.to_string(), server, port))
}

// ============================================================================
// SIP003 Plugins
// ============================================================================

/// Splits a plugin argument string on `;` into `key=value` pairs and bare flags
fn plugin_args(opts: &str) -> Vec<(String, Option<String>)> {
    opts.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|arg| match arg.split_once('=') {
            Some((k, v)) => (k.trim().to_string(), Some(v.trim().to_string())),
            None => (arg.to_string(), None),
        })
        .collect()
}

fn arg<'a>(args: &'a [(String, Option<String>)], key: &str) -> Option<&'a str> {
    args.iter()
        .find(|(k, _)| k == key)
        .and_then(|(_, v)| v.as_deref())
        .filter(|v| !v.is_empty())
}

fn has_flag(args: &[(String, Option<String>)], key: &str) -> bool {
    args.iter().any(|(k, v)| {
        k == key && v.as_deref().is_none_or(|v| parse_bool_flag(v).unwrap_or(false))
    })
}

/// Turns a scalar plugin argument into a YAML value, keeping numbers and booleans typed
fn typed_value(raw: &str) -> Value {
    if let Ok(n) = raw.parse::<u64>() {
        return Value::from(n);
    }
    match raw {
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => Value::from(raw),
    }
}

/// Parses `plugin=name;opts` into `plugin` and `plugin-opts`
///
/// `shadow-tls` and `restls` carry a TLS fingerprint that belongs on the node itself,
/// so it is promoted to `client-fingerprint`.
fn apply_plugin(node: &mut ProxyNode, raw: &str) {
    let (name, opts) = raw.split_once(';').unwrap_or((raw, ""));
    let args = plugin_args(opts);
    let mut plugin_opts = Mapping::new();

    let plugin = match name.trim() {
        "obfs-local" | "simple-obfs" | "obfs" => {
            if let Some(mode) = arg(&args, "obfs").or_else(|| arg(&args, "mode")) {
                plugin_opts.insert("mode".into(), mode.into());
            }
            if let Some(host) = arg(&args, "obfs-host").or_else(|| arg(&args, "host")) {
                plugin_opts.insert("host".into(), host.into());
            }
            "obfs"
        }
        plugin @ ("v2ray-plugin" | "gost-plugin") => {
            plugin_opts.insert(
                "mode".into(),
                arg(&args, "mode").unwrap_or("websocket").into(),
            );
            if has_flag(&args, "tls") {
                plugin_opts.insert("tls".into(), true.into());
            }
            if let Some(host) = arg(&args, "host") {
                plugin_opts.insert("host".into(), host.into());
            }
            if let Some(path) = arg(&args, "path") {
                plugin_opts.insert("path".into(), path.into());
            }
            if has_flag(&args, "mux") {
                plugin_opts.insert("mux".into(), true.into());
            }
            if has_flag(&args, "skip-cert-verify") || has_flag(&args, "insecure") {
                plugin_opts.insert("skip-cert-verify".into(), true.into());
            }
            plugin
        }
        "shadow-tls" => {
            if let Some(host) = arg(&args, "host") {
                plugin_opts.insert("host".into(), host.into());
            }
            if let Some(password) = arg(&args, "password") {
                plugin_opts.insert("password".into(), password.into());
            }
            let version = arg(&args, "version").and_then(|v| v.parse::<u64>().ok());
            plugin_opts.insert("version".into(), version.unwrap_or(2).into());
            promote_fingerprint(node, &args);
            "shadow-tls"
        }
        "restls" => {
            if let Some(host) = arg(&args, "host") {
                plugin_opts.insert("host".into(), host.into());
            }
            if let Some(password) = arg(&args, "password") {
                plugin_opts.insert("password".into(), password.into());
            }
            if let Some(hint) = arg(&args, "version-hint") {
                plugin_opts.insert("version-hint".into(), hint.into());
            }
            if let Some(script) = arg(&args, "restls-script") {
                plugin_opts.insert("restls-script".into(), script.into());
            }
            promote_fingerprint(node, &args);
            "restls"
        }
        "kcptun" => {
            for (key, value) in &args {
                let value = value.as_deref().map(typed_value).unwrap_or(Value::Bool(true));
                plugin_opts.insert(key.as_str().into(), value);
            }
            "kcptun"
        }
        "" => return,
        other => {
            warn!(plugin = other, "Unknown SIP003 plugin; keeping its options verbatim");
            for (key, value) in &args {
                let value = value.as_deref().map(typed_value).unwrap_or(Value::Bool(true));
                plugin_opts.insert(key.as_str().into(), value);
            }
            node.set("plugin", other);
            node.set("plugin-opts", Value::Mapping(plugin_opts));
            return;
        }
    };

    trace!("Shadowsocks plugin '{}' with {} options", plugin, plugin_opts.len());
    node.set("plugin", plugin);
    node.set("plugin-opts", Value::Mapping(plugin_opts));
}

fn promote_fingerprint(node: &mut ProxyNode, args: &[(String, Option<String>)]) {
    if let Some(fp) = arg(args, "fingerprint").or_else(|| arg(args, "fp")) {
        node.set("client-fingerprint", fp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(uri: &str) -> ProxyNode {
        ShadowsocksParser.parse(uri).unwrap()
    }

    #[test]
    fn test_shadowsocks_sip002_base64_userinfo() {
        let node = parse("ss://YWVzLTI1Ni1nY206cGFzc3dvcmQ=@example.com:8388#MyNode");
        assert_eq!(node.name, "MyNode");
        assert_eq!(node.server, "example.com");
        assert_eq!(node.port, 8388);
        assert_eq!(node.get_str("cipher"), Some("aes-256-gcm"));
        assert_eq!(node.get_str("password"), Some("password"));
    }

    #[test]
    fn test_shadowsocks_plain_userinfo() {
        let node = parse("ss://2022-blake3-aes-128-gcm:c2VjcmV0%3D@1.2.3.4:443#2022");
        assert_eq!(node.get_str("cipher"), Some("2022-blake3-aes-128-gcm"));
        assert_eq!(node.get_str("password"), Some("c2VjcmV0="));
    }

    #[test]
    fn test_shadowsocks_legacy() {
        // aes-128-gcm:test@192.168.1.1:8388
        let node = parse("ss://YWVzLTEyOC1nY206dGVzdEAxOTIuMTY4LjEuMTo4Mzg4#legacy");
        assert_eq!(node.server, "192.168.1.1");
        assert_eq!(node.port, 8388);
        assert_eq!(node.get_str("password"), Some("test"));
    }

    #[test]
    fn test_shadowsocks_no_tag() {
        let node = parse("ss://YWVzLTI1Ni1nY206cGFzc3dvcmQ@example.com:8388");
        assert_eq!(node.name, "example.com:8388");
    }

    #[test]
    fn test_shadowsocks_obfs_plugin() {
        let node = parse(
            "ss://YWVzLTI1Ni1nY206cGFzc3dvcmQ@example.com:8388/?plugin=obfs-local%3Bobfs%3Dhttp%3Bobfs-host%3Dcdn.example.com#obfs",
        );
        assert_eq!(node.get_str("plugin"), Some("obfs"));
        assert_eq!(node.nested_str("plugin-opts", "mode"), Some("http"));
        assert_eq!(node.nested_str("plugin-opts", "host"), Some("cdn.example.com"));
    }

    #[test]
    fn test_shadowsocks_v2ray_plugin() {
        let node = parse(
            "ss://YWVzLTI1Ni1nY206cGFzc3dvcmQ@example.com:443?plugin=v2ray-plugin%3Btls%3Bhost%3Dws.example.com%3Bpath%3D%2Fws#v2",
        );
        assert_eq!(node.get_str("plugin"), Some("v2ray-plugin"));
        let opts = node.get_mapping("plugin-opts").unwrap();
        assert_eq!(opts.get("mode").and_then(Value::as_str), Some("websocket"));
        assert_eq!(opts.get("tls").and_then(Value::as_bool), Some(true));
        assert_eq!(opts.get("path").and_then(Value::as_str), Some("/ws"));
    }

    #[test]
    fn test_shadowsocks_shadow_tls_promotes_fingerprint() {
        let node = parse(
            "ss://YWVzLTI1Ni1nY206cGFzc3dvcmQ@example.com:443?plugin=shadow-tls%3Bhost%3Dcloud.tencent.com%3Bpassword%3Dstls%3Bversion%3D3%3Bfingerprint%3Dchrome#stls",
        );
        assert_eq!(node.get_str("plugin"), Some("shadow-tls"));
        assert_eq!(node.get_str("client-fingerprint"), Some("chrome"));
        let opts = node.get_mapping("plugin-opts").unwrap();
        assert_eq!(opts.get("version").and_then(Value::as_u64), Some(3));
        assert_eq!(opts.get("password").and_then(Value::as_str), Some("stls"));
        assert!(opts.get("fingerprint").is_none());
    }

    #[test]
    fn test_shadowsocks_restls_plugin() {
        let node = parse(
            "ss://YWVzLTI1Ni1nY206cGFzc3dvcmQ@example.com:443?plugin=restls%3Bhost%3Dwww.microsoft.com%3Bpassword%3Dpw%3Bversion-hint%3Dtls13%3Bfp%3Dsafari#r",
        );
        assert_eq!(node.get_str("plugin"), Some("restls"));
        assert_eq!(node.nested_str("plugin-opts", "version-hint"), Some("tls13"));
        assert_eq!(node.get_str("client-fingerprint"), Some("safari"));
    }

    #[test]
    fn test_shadowsocks_kcptun_plugin_typed_values() {
        let node = parse(
            "ss://YWVzLTI1Ni1nY206cGFzc3dvcmQ@example.com:443?plugin=kcptun%3Bkey%3Dit%27s%3Bmode%3Dfast%3Bmtu%3D1350%3Bnocomp%3Dtrue#k",
        );
        let opts = node.get_mapping("plugin-opts").unwrap();
        assert_eq!(opts.get("mtu").and_then(Value::as_u64), Some(1350));
        assert_eq!(opts.get("nocomp").and_then(Value::as_bool), Some(true));
        assert_eq!(opts.get("key").and_then(Value::as_str), Some("it's"));
    }

    #[test]
    fn test_shadowsocks_ipv6_server() {
        let node = parse("ss://YWVzLTI1Ni1nY206cGFzc3dvcmQ@[2001:db8::1]:8388#v6");
        assert_eq!(node.server, "2001:db8::1");
    }

    #[test]
    fn test_shadowsocks_invalid() {
        assert!(ShadowsocksParser.parse("ss://").is_err());
        assert!(ShadowsocksParser.parse("ss://!!!").is_err());
        assert!(ShadowsocksParser.parse("ss://YWVzLTI1Ni1nY206cGFzc3dvcmQ@example.com").is_err());
        assert!(ShadowsocksParser.parse("vmess://abc").is_err());
    }

    #[test]
    fn test_can_parse() {
        assert!(ShadowsocksParser.can_parse("ss://abc"));
        assert!(!ShadowsocksParser.can_parse("ssr://abc"));
    }
}
