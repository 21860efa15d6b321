//! VLESS protocol parser
//!
//! This module provides parsing for VLESS (vless://) URIs.
//! Format: vless://uuid@host:port?params#tag

use anyhow::{Result, anyhow, bail};
use tracing::trace;
use url::Url;

use crate::model::{ProxyNode, ProxyType};
use crate::normalize::{QueryParams, apply_transport_params, copy_tls_params};

use super::{ProtocolParser, url_name, url_port, url_server, url_username};

// ============================================================================
// VLESS Parser
// ============================================================================

/// Parser for VLESS (vless://) URIs
///
/// `security=reality` enables the Reality keys `pbk`, `sid` and `spx`.
pub struct VLessParser;

impl ProtocolParser for VLessParser {
    fn scheme(&self) -> &str {
        "vless"
    }

    fn parse(&self, uri: &str) -> Result<ProxyNode> {
        trace!("Parsing VLESS URI");
        let url = Url::parse(uri).map_err(|e| anyhow!("Failed to parse VLESS URI: {}", e))?;

        let uuid = url_username(&url);
        if uuid.is_empty() {
            bail!("VLESS URI missing UUID");
        }
        let server = url_server(&url, false)?;
        let port = url_port(&url, Some(443))?;
        let params = QueryParams::from_url(&url);

        let mut node = ProxyNode::new(url_name(&url), ProxyType::VLess, server, port)?;
        node.set("uuid", uuid);
        copy_tls_params(&mut node, &params);
        apply_transport_params(&mut node, &params);
        if let Some(encoding) = params.get("packetEncoding") {
            node.set("packet-encoding", encoding);
        }

        Ok(node)
    }
}
