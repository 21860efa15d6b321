//! Hysteria (v1) protocol parser
//!
//! Format: hysteria://host:port?protocol=udp&auth=..&peer=..&upmbps=..&downmbps=..&obfsParam=..#tag

use anyhow::{Result, anyhow};
use tracing::trace;
use url::Url;

use crate::model::{ProxyNode, ProxyType, split_list};
use crate::normalize::{QueryParams, string_list};

use super::{ProtocolParser, url_name, url_port, url_server, url_username};

/// Parser for Hysteria (hysteria://) URIs
pub struct HysteriaParser;

impl ProtocolParser for HysteriaParser {
    fn scheme(&self) -> &str {
        "hysteria"
    }

    fn parse(&self, uri: &str) -> Result<ProxyNode> {
        trace!("Parsing Hysteria URI");
        let url = Url::parse(uri).map_err(|e| anyhow!("Failed to parse Hysteria URI: {}", e))?;

        let server = url_server(&url, false)?;
        let port = url_port(&url, Some(443))?;
        let params = QueryParams::from_url(&url);

        let mut node = ProxyNode::new(url_name(&url), ProxyType::Hysteria, server, port)?;

        let user = url_username(&url);
        if let Some(auth) = params.get_any(&["auth", "auth_str", "auth-str"]) {
            node.set("auth-str", auth);
        } else if !user.is_empty() {
            node.set("auth-str", user);
        }
        if let Some(up) = params.get_any(&["upmbps", "up"]) {
            node.set("up", up);
        }
        if let Some(down) = params.get_any(&["downmbps", "down"]) {
            node.set("down", down);
        }
        if let Some(protocol) = params.get("protocol") {
            node.set("protocol", protocol);
        }
        if let Some(obfs) = params.get("obfsParam").or_else(|| {
            params.get("obfs").filter(|o| *o != "xplus" && *o != "none")
        }) {
            node.set("obfs", obfs);
        }
        if let Some(sni) = params.get_any(&["peer", "sni"]) {
            node.set("sni", sni);
        }
        if let Some(alpn) = params.get("alpn") {
            node.set("alpn", string_list(&split_list(alpn)));
        }
        if let Some(insecure) = params.get("insecure") {
            node.set("insecure", insecure);
        }
        if let Some(ports) = params.get("mport") {
            node.set("ports", ports);
        }
        if let Some(fast_open) = params.get_bool("fastopen") {
            node.set("fast-open", fast_open);
        }

        Ok(node)
    }
}
