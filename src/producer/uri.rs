//! Share-link producers
//!
//! `uri` writes one share link per line; `v2ray` wraps the same lines in Base64,
//! the way most subscription servers deliver them. Every link is written in the
//! form the decoders in [`crate::parser::protocols`] read back.

use anyhow::Result;
use serde_json::json;
use serde_yaml::Value;
use tracing::warn;
use urlencoding::encode;

use crate::model::{ProxyNode, ProxyType};
use crate::parser::base64::{encode_base64, encode_base64_url};

use super::{
    CONTENT_TYPE_TEXT, ExportSet, Format, Producer, TransportView, bare_server, host_port,
    value_text,
};

pub struct UriProducer {
    format: Format,
}

impl UriProducer {
    /// `format` is either [`Format::Uri`] or [`Format::V2Ray`]
    pub fn new(format: Format) -> Self {
        Self { format }
    }
}

impl Producer for UriProducer {
    fn format(&self) -> Format {
        self.format
    }

    fn content_type(&self) -> &'static str {
        CONTENT_TYPE_TEXT
    }

    fn supports(&self, proxy_type: ProxyType) -> bool {
        match self.format {
            Format::V2Ray => matches!(
                proxy_type,
                ProxyType::Shadowsocks
                    | ProxyType::ShadowsocksR
                    | ProxyType::VMess
                    | ProxyType::VLess
                    | ProxyType::Trojan
                    | ProxyType::Hysteria2
                    | ProxyType::Tuic
                    | ProxyType::Socks5
            ),
            _ => proxy_type != ProxyType::Snell,
        }
    }

    fn render(&self, set: &ExportSet, warnings: &mut Vec<String>) -> Result<String> {
        let mut lines = Vec::with_capacity(set.nodes.len());
        for node in &set.nodes {
            match encode_uri(node) {
                Some(link) => lines.push(link),
                None => {
                    warn!("No share link form for proxy {}", node.name);
                    warnings.push(format!("{}: cannot be written as a share link", node.name));
                }
            }
        }

        let text = lines.join("\n");
        Ok(match self.format {
            Format::V2Ray => encode_base64(&text),
            _ => text,
        })
    }
}

// ============================================================================
// Link Encoding
// ============================================================================

/// Writes a node as a share link
///
/// Returns `None` for types without a share-link form.
pub fn encode_uri(node: &ProxyNode) -> Option<String> {
    let link = match node.proxy_type {
        ProxyType::Shadowsocks => encode_shadowsocks(node),
        ProxyType::ShadowsocksR => encode_shadowsocksr(node),
        ProxyType::VMess => encode_vmess(node),
        ProxyType::VLess => encode_vless(node),
        ProxyType::Trojan => encode_trojan(node),
        ProxyType::Hysteria => encode_hysteria(node),
        ProxyType::Hysteria2 => encode_hysteria2(node),
        ProxyType::Tuic => encode_tuic(node),
        ProxyType::AnyTls => encode_anytls(node),
        ProxyType::Socks5 => encode_socks(node),
        ProxyType::Http => encode_http(node),
        ProxyType::WireGuard => encode_wireguard(node),
        ProxyType::Snell => return None,
    };
    Some(link)
}

/// Query string builder; values are percent-encoded, empty values skipped
#[derive(Default)]
struct LinkParams {
    pairs: Vec<(&'static str, String)>,
}

impl LinkParams {
    fn push(&mut self, key: &'static str, value: impl Into<String>) {
        let value = value.into();
        if !value.is_empty() {
            self.pairs.push((key, value));
        }
    }

    fn push_opt(&mut self, key: &'static str, value: Option<String>) {
        if let Some(value) = value {
            self.push(key, value);
        }
    }

    fn push_flag(&mut self, key: &'static str, on: bool) {
        if on {
            self.push(key, "1");
        }
    }

    fn query(&self) -> String {
        if self.pairs.is_empty() {
            return String::new();
        }
        let pairs: Vec<String> = self
            .pairs
            .iter()
            .map(|(key, value)| format!("{}={}", key, encode(value)))
            .collect();
        format!("?{}", pairs.join("&"))
    }
}

fn field(node: &ProxyNode, key: &str) -> Option<String> {
    node.get(key).and_then(value_text)
}

fn secret(node: &ProxyNode, key: &str) -> String {
    encode(node.get_str(key).unwrap_or_default()).into_owned()
}

fn fragment(node: &ProxyNode) -> String {
    format!("#{}", encode(&node.name))
}

/// TLS and Reality parameters in V2Ray link spelling
fn push_tls_params(params: &mut LinkParams, node: &ProxyNode) {
    if let Some(reality) = node.get_mapping("reality-opts") {
        params.push("security", "reality");
        params.push_opt("pbk", reality.get("public-key").and_then(value_text));
        params.push_opt("sid", reality.get("short-id").and_then(value_text));
        params.push_opt("spx", reality.get("spider-x").and_then(value_text));
    } else if node.tls() {
        params.push("security", "tls");
    }
    params.push_opt("sni", node.server_name().map(str::to_string));
    params.push_opt("fp", field(node, "client-fingerprint"));
    params.push_opt("alpn", field(node, "alpn"));
    params.push_flag("allowInsecure", node.skip_cert_verify());
}

fn push_transport_params(params: &mut LinkParams, node: &ProxyNode) {
    let transport = TransportView::of(node);
    match transport.network.as_str() {
        "tcp" => {}
        "ws" if transport.http_upgrade => params.push("type", "httpupgrade"),
        network => params.push("type", network),
    }
    params.push_opt("path", transport.path);
    params.push_opt("host", transport.host);
    params.push_opt("serviceName", transport.service_name);
}

fn encode_shadowsocks(node: &ProxyNode) -> String {
    let userinfo = encode_base64_url(&format!(
        "{}:{}",
        node.get_str("cipher").unwrap_or_default(),
        node.get_str("password").unwrap_or_default()
    ));
    let mut params = LinkParams::default();
    params.push_opt("plugin", sip003_argument(node));
    params.push_flag("uot", node.get_bool("udp-over-tcp") == Some(true));
    let query = params.query();
    let path = if query.is_empty() { "" } else { "/" };
    format!(
        "ss://{}@{}{}{}{}",
        userinfo,
        host_port(&node.server, node.port),
        path,
        query,
        fragment(node)
    )
}

/// `plugin=name;key=value;flag` argument for SIP002 links
fn sip003_argument(node: &ProxyNode) -> Option<String> {
    let plugin = node.get_str("plugin")?;
    let opts = node.get_mapping("plugin-opts");
    let opt = |key: &str| opts.and_then(|o| o.get(key)).and_then(value_text);
    let mut args: Vec<String> = Vec::new();

    let name = match plugin {
        "obfs" => {
            args.extend(opt("mode").map(|m| format!("obfs={}", m)));
            args.extend(opt("host").map(|h| format!("obfs-host={}", h)));
            "obfs-local"
        }
        "v2ray-plugin" | "gost-plugin" => {
            if opt("tls").as_deref() == Some("true") {
                args.push("tls".to_string());
            }
            for key in ["mode", "host", "path"] {
                args.extend(opt(key).map(|v| format!("{}={}", key, v)));
            }
            if opt("mux").as_deref() == Some("true") {
                args.push("mux".to_string());
            }
            plugin
        }
        other => {
            for (key, value) in opts.into_iter().flatten() {
                if let (Some(key), Some(value)) = (key.as_str(), value_text(value)) {
                    args.push(format!("{}={}", key, value));
                }
            }
            other
        }
    };

    let mut argument = name.to_string();
    for arg in args {
        argument.push(';');
        argument.push_str(&arg);
    }
    Some(argument)
}

fn encode_shadowsocksr(node: &ProxyNode) -> String {
    let b64 = |s: &str| encode_base64_url(s);
    let mut body = format!(
        "{}:{}:{}:{}:{}/?",
        host_port(&node.server, node.port),
        node.get_str("protocol").unwrap_or("origin"),
        node.get_str("cipher").unwrap_or_default(),
        node.get_str("obfs").unwrap_or("plain"),
        b64(node.get_str("password").unwrap_or_default())
    );
    let mut params = Vec::new();
    if let Some(param) = node.get_str("obfs-param") {
        params.push(format!("obfsparam={}", b64(param)));
    }
    if let Some(param) = node.get_str("protocol-param") {
        params.push(format!("protoparam={}", b64(param)));
    }
    params.push(format!("remarks={}", b64(&node.name)));
    body.push_str(&params.join("&"));
    format!("ssr://{}", b64(&body))
}

fn encode_vmess(node: &ProxyNode) -> String {
    let transport = TransportView::of(node);
    let (net, host, path) = match transport.network.as_str() {
        "grpc" => ("grpc", None, transport.service_name.clone()),
        "ws" if transport.http_upgrade => ("httpupgrade", transport.host, transport.path),
        other => (other, transport.host, transport.path),
    };
    let net = if node.network() == Some("http") { "tcp" } else { net };
    let header_type = if node.network() == Some("http") { "http" } else { "none" };

    let mut json = json!({
        "v": "2",
        "ps": node.name,
        "add": bare_server(&node.server),
        "port": node.port.to_string(),
        "id": node.get_str("uuid").unwrap_or_default(),
        "aid": node.get_u64("alterId").unwrap_or(0).to_string(),
        "scy": node.get_str("cipher").unwrap_or("auto"),
        "net": net,
        "type": header_type,
        "host": host.unwrap_or_default(),
        "path": path.unwrap_or_default(),
        "tls": if node.tls() { "tls" } else { "" },
    });
    if let Some(obj) = json.as_object_mut() {
        if let Some(sni) = node.server_name() {
            obj.insert("sni".to_string(), sni.into());
        }
        if let Some(alpn) = field(node, "alpn") {
            obj.insert("alpn".to_string(), alpn.into());
        }
        if let Some(fp) = node.get_str("client-fingerprint") {
            obj.insert("fp".to_string(), fp.into());
        }
        if let Some(service_name) = transport.service_name {
            obj.insert("serviceName".to_string(), service_name.into());
        }
        if node.skip_cert_verify() {
            obj.insert("skip-cert-verify".to_string(), true.into());
        }
    }
    format!("vmess://{}", encode_base64(&json.to_string()))
}

fn encode_vless(node: &ProxyNode) -> String {
    let mut params = LinkParams::default();
    params.push("encryption", "none");
    push_tls_params(&mut params, node);
    params.push_opt("flow", field(node, "flow"));
    push_transport_params(&mut params, node);
    params.push_opt("packetEncoding", field(node, "packet-encoding"));
    format!(
        "vless://{}@{}{}{}",
        secret(node, "uuid"),
        host_port(&node.server, node.port),
        params.query(),
        fragment(node)
    )
}

fn encode_trojan(node: &ProxyNode) -> String {
    let mut params = LinkParams::default();
    push_tls_params(&mut params, node);
    push_transport_params(&mut params, node);
    format!(
        "trojan://{}@{}{}{}",
        secret(node, "password"),
        host_port(&node.server, node.port),
        params.query(),
        fragment(node)
    )
}

fn encode_hysteria(node: &ProxyNode) -> String {
    let mut params = LinkParams::default();
    params.push_opt("protocol", field(node, "protocol"));
    params.push_opt("auth", field(node, "auth-str"));
    params.push_opt("peer", node.server_name().map(str::to_string));
    params.push_opt("upmbps", field(node, "up"));
    params.push_opt("downmbps", field(node, "down"));
    params.push_opt("obfsParam", field(node, "obfs"));
    params.push_opt("alpn", field(node, "alpn"));
    params.push_flag("insecure", node.skip_cert_verify());
    params.push_opt("mport", field(node, "ports"));
    params.push_flag("fastopen", node.get_bool("fast-open") == Some(true));
    format!(
        "hysteria://{}{}{}",
        host_port(&node.server, node.port),
        params.query(),
        fragment(node)
    )
}

fn encode_hysteria2(node: &ProxyNode) -> String {
    let mut params = LinkParams::default();
    params.push_opt("sni", node.server_name().map(str::to_string));
    params.push_opt("obfs", field(node, "obfs"));
    params.push_opt("obfs-password", field(node, "obfs-password"));
    params.push_flag("insecure", node.skip_cert_verify());
    params.push_opt("pinSHA256", field(node, "fingerprint"));
    params.push_opt("alpn", field(node, "alpn"));
    params.push_opt("mport", field(node, "ports"));
    params.push_opt("up", field(node, "up"));
    params.push_opt("down", field(node, "down"));
    let query = params.query();
    format!(
        "hysteria2://{}@{}{}{}{}",
        secret(node, "password"),
        host_port(&node.server, node.port),
        if query.is_empty() { "" } else { "/" },
        query,
        fragment(node)
    )
}

fn encode_tuic(node: &ProxyNode) -> String {
    let mut params = LinkParams::default();
    params.push_opt("sni", node.server_name().map(str::to_string));
    params.push_opt("alpn", field(node, "alpn"));
    params.push_opt("congestion_control", field(node, "congestion-controller"));
    params.push_opt("udp_relay_mode", field(node, "udp-relay-mode"));
    params.push_flag("disable_sni", node.get_bool("disable-sni") == Some(true));
    params.push_flag("reduce_rtt", node.get_bool("reduce-rtt") == Some(true));
    params.push_flag("allow_insecure", node.skip_cert_verify());
    let userinfo = match node.get_str("password") {
        Some(_) => format!("{}:{}", secret(node, "uuid"), secret(node, "password")),
        None => secret(node, "uuid"),
    };
    format!(
        "tuic://{}@{}{}{}",
        userinfo,
        host_port(&node.server, node.port),
        params.query(),
        fragment(node)
    )
}

fn encode_anytls(node: &ProxyNode) -> String {
    let mut params = LinkParams::default();
    params.push_opt("sni", node.server_name().map(str::to_string));
    params.push_opt("fp", field(node, "client-fingerprint"));
    params.push_opt("alpn", field(node, "alpn"));
    params.push_flag("insecure", node.skip_cert_verify());
    for (canonical, link_key) in [
        ("idle-session-check-interval", "idle_session_check_interval"),
        ("idle-session-timeout", "idle_session_timeout"),
        ("min-idle-session", "min_idle_session"),
    ] {
        params.push_opt(link_key, node.get_u64(canonical).map(|v| v.to_string()));
    }
    format!(
        "anytls://{}@{}{}{}",
        secret(node, "password"),
        host_port(&node.server, node.port),
        params.query(),
        fragment(node)
    )
}

fn credentials(node: &ProxyNode) -> String {
    match node.get_str("username") {
        Some(username) => format!("{}:{}@", encode(username), secret(node, "password")),
        None => String::new(),
    }
}

fn encode_socks(node: &ProxyNode) -> String {
    let mut params = LinkParams::default();
    if node.tls() {
        params.push("tls", "1");
        params.push_opt("sni", node.server_name().map(str::to_string));
    }
    format!(
        "socks5://{}{}{}{}",
        credentials(node),
        host_port(&node.server, node.port),
        params.query(),
        fragment(node)
    )
}

fn encode_http(node: &ProxyNode) -> String {
    let mut params = LinkParams::default();
    let scheme = if node.tls() {
        params.push_opt("sni", node.server_name().map(str::to_string));
        "https"
    } else {
        "http"
    };
    format!(
        "{}://{}{}{}{}",
        scheme,
        credentials(node),
        host_port(&node.server, node.port),
        params.query(),
        fragment(node)
    )
}

fn encode_wireguard(node: &ProxyNode) -> String {
    let mut params = LinkParams::default();
    params.push_opt("publickey", field(node, "public-key"));
    params.push_opt("presharedkey", field(node, "pre-shared-key"));
    let addresses: Vec<String> = ["ip", "ipv6"].iter().filter_map(|k| field(node, k)).collect();
    params.push("address", addresses.join(","));
    if let Some(Value::Sequence(reserved)) = node.get("reserved") {
        let bytes: Vec<String> = reserved.iter().filter_map(value_text).collect();
        params.push("reserved", bytes.join(","));
    }
    params.push_opt("mtu", field(node, "mtu"));
    params.push_opt("allowed-ips", field(node, "allowed-ips"));
    format!(
        "wireguard://{}@{}{}{}",
        secret(node, "private-key"),
        host_port(&node.server, node.port),
        params.query(),
        fragment(node)
    )
}
