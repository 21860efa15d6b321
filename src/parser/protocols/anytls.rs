//! AnyTLS protocol parser
//!
//! Format: anytls://password@host:port?sni=..&insecure=1&fp=..#tag

use anyhow::{Result, anyhow, bail};
use tracing::trace;
use url::Url;

use crate::model::{ProxyNode, ProxyType};
use crate::normalize::{QueryParams, copy_tls_params};

use super::{ProtocolParser, url_name, url_port, url_server, url_username};

/// Idle-session tuning keys as written in links and in canonical form
const IDLE_SESSION_KEYS: [(&str, &str); 3] = [
    ("idle_session_check_interval", "idle-session-check-interval"),
    ("idle_session_timeout", "idle-session-timeout"),
    ("min_idle_session", "min-idle-session"),
];

/// Parser for AnyTLS (anytls://) URIs
pub struct AnyTlsParser;

impl ProtocolParser for AnyTlsParser {
    fn scheme(&self) -> &str {
        "anytls"
    }

    fn parse(&self, uri: &str) -> Result<ProxyNode> {
        trace!("Parsing AnyTLS URI");
        let url = Url::parse(uri).map_err(|e| anyhow!("Failed to parse AnyTLS URI: {}", e))?;

        let password = url_username(&url);
        if password.is_empty() {
            bail!("AnyTLS URI missing password");
        }
        let server = url_server(&url, false)?;
        let port = url_port(&url, Some(443))?;
        let params = QueryParams::from_url(&url);

        let mut node = ProxyNode::new(url_name(&url), ProxyType::AnyTls, server, port)?;
        node.set("password", password);
        copy_tls_params(&mut node, &params);
        for (raw, canonical) in IDLE_SESSION_KEYS {
            if let Some(value) = params.get_u64(raw).or_else(|| params.get_u64(canonical)) {
                node.set(canonical, value);
            }
        }

        Ok(node)
    }
}
