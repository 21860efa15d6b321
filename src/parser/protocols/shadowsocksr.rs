//! ShadowsocksR protocol parser
//!
//! Format: ssr://BASE64(server:port:protocol:method:obfs:BASE64(password)/?obfsparam=..&protoparam=..&remarks=..)

use anyhow::{Context, Result, anyhow, bail};
use tracing::trace;

use crate::model::{ProxyNode, ProxyType};
use crate::normalize::QueryParams;
use crate::parser::base64::decode_base64;

use super::{ProtocolParser, parse_port};

/// Parser for ShadowsocksR (ssr://) URIs
pub struct ShadowsocksRParser;

impl ProtocolParser for ShadowsocksRParser {
    fn scheme(&self) -> &str {
        "ssr"
    }

    fn parse(&self, uri: &str) -> Result<ProxyNode> {
        trace!("Parsing ShadowsocksR URI");
        let encoded = uri
            .strip_prefix("ssr://")
            .ok_or_else(|| anyhow!("Invalid ShadowsocksR URI: missing ssr:// prefix"))?;

        let decoded = decode_text(encoded).context("Failed to decode ShadowsocksR URI")?;
        let (main, query) = match decoded.split_once('?') {
            Some((main, query)) => (main.trim_end_matches('/'), query),
            None => (decoded.trim_end_matches('/'), ""),
        };

        // The server may itself contain colons (IPv6), so split from the right
        let mut fields = main.rsplitn(6, ':');
        let password_b64 = fields.next().unwrap_or_default();
        let obfs = fields.next().unwrap_or_default();
        let method = fields.next().unwrap_or_default();
        let protocol = fields.next().unwrap_or_default();
        let port = fields.next().unwrap_or_default();
        let server = fields
            .next()
            .ok_or_else(|| anyhow!("Invalid ShadowsocksR URI: expected 6 fields"))?;

        if server.is_empty() || method.is_empty() {
            bail!("Invalid ShadowsocksR URI: missing server or cipher");
        }
        let port = parse_port(port)?;
        let server = server.trim_start_matches('[').trim_end_matches(']');
        let password = decode_text(password_b64).context("Invalid ShadowsocksR password")?;

        let params = QueryParams::parse(query);
        let param = |key: &str| -> Option<String> {
            params.get(key).and_then(|v| decode_text(v).ok())
        };

        let mut node = ProxyNode::new(
            param("remarks").unwrap_or_default(),
            ProxyType::ShadowsocksR,
            server,
            port,
        )?;
        node.set("cipher", method);
        node.set("password", password);
        node.set("protocol", protocol);
        node.set("obfs", obfs);
        if let Some(protocol_param) = param("protoparam") {
            node.set("protocol-param", protocol_param);
        }
        if let Some(obfs_param) = param("obfsparam") {
            node.set("obfs-param", obfs_param);
        }

        Ok(node)
    }
}

fn decode_text(s: &str) -> Result<String> {
    let bytes = decode_base64(s)?;
    String::from_utf8(bytes).context("Invalid UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;

    fn encode(s: &str) -> String {
        URL_SAFE_NO_PAD.encode(s)
    }

    #[test]
    fn test_ssr_basic() {
        let body = format!(
            "example.com:8443:auth_aes128_md5:aes-256-cfb:tls1.2_ticket_auth:{}/?obfsparam={}&protoparam={}&remarks={}",
            encode("secret"),
            encode("obfs.example.com"),
            encode("1234:abcd"),
            encode("香港 01"),
        );
        let node = ShadowsocksRParser
            .parse(&format!("ssr://{}", encode(&body)))
            .unwrap();
        assert_eq!(node.name, "香港 01");
        assert_eq!(node.server, "example.com");
        assert_eq!(node.port, 8443);
        assert_eq!(node.get_str("cipher"), Some("aes-256-cfb"));
        assert_eq!(node.get_str("password"), Some("secret"));
        assert_eq!(node.get_str("protocol"), Some("auth_aes128_md5"));
        assert_eq!(node.get_str("obfs"), Some("tls1.2_ticket_auth"));
        assert_eq!(node.get_str("obfs-param"), Some("obfs.example.com"));
        assert_eq!(node.get_str("protocol-param"), Some("1234:abcd"));
    }

    #[test]
    fn test_ssr_ipv6_server_split_from_right() {
        let body = format!("2001:db8::1:443:origin:aes-128-ctr:plain:{}", encode("pw"));
        let node = ShadowsocksRParser
            .parse(&format!("ssr://{}", encode(&body)))
            .unwrap();
        assert_eq!(node.server, "2001:db8::1");
        assert_eq!(node.port, 443);
        assert_eq!(node.name, "2001:db8::1:443");
    }

    #[test]
    fn test_ssr_invalid() {
        assert!(ShadowsocksRParser.parse("ssr://").is_err());
        assert!(ShadowsocksRParser
            .parse(&format!("ssr://{}", encode("host:443:origin")))
            .is_err());
        assert!(ShadowsocksRParser
            .parse(&format!("ssr://{}", encode("host:0:origin:aes-128-ctr:plain:cHc")))
            .is_err());
    }
}
