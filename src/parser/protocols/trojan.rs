//! Trojan protocol parser
//!
//! This module provides parsing for Trojan (trojan://) URIs.
//! Format: trojan://password@host:port?params#tag

use anyhow::{Result, anyhow, bail};
use tracing::trace;
use url::Url;

use crate::model::{ProxyNode, ProxyType};
use crate::normalize::{QueryParams, apply_transport_params, copy_tls_params};

use super::{ProtocolParser, url_name, url_port, url_server, url_username};

// ============================================================================
// Trojan Parser
// ============================================================================

/// Parser for Trojan (trojan://) URIs
pub struct TrojanParser;

impl ProtocolParser for TrojanParser {
    fn scheme(&self) -> &str {
        "trojan"
    }

    fn parse(&self, uri: &str) -> Result<ProxyNode> {
        trace!("Parsing Trojan URI");
        let url = Url::parse(uri).map_err(|e| anyhow!("Failed to parse Trojan URI: {}", e))?;

        let password = url_username(&url);
        if password.is_empty() {
            bail!("Trojan URI missing password");
        }
        let server = url_server(&url, false)?;
        let port = url_port(&url, Some(443))?;
        let params = QueryParams::from_url(&url);

        let mut node = ProxyNode::new(url_name(&url), ProxyType::Trojan, server, port)?;
        node.set("password", password);
        copy_tls_params(&mut node, &params);
        if !node.contains("sni")
            && let Some(peer) = params.get("peer")
        {
            node.set("sni", peer);
        }
        apply_transport_params(&mut node, &params);

        Ok(node)
    }
}
