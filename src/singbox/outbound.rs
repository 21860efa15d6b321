use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::singbox::shared::{DialFields, OutboundTlsConfig};
use crate::singbox::util::{default_wireguard_mtu, is_default_wireguard_mtu, is_false, is_zero_u32};

// ============================================================================
// Outbound Enum
// ============================================================================

/// Outbound configuration enum
///
/// Represents the sing-box outbound types a canonical node or group can map to.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Outbound {
    /// Direct outbound (send requests directly)
    Direct(DirectOutbound),
    /// Block outbound (block requests)
    Block(BlockOutbound),
    /// SOCKS outbound (SOCKS4/4a/5 client)
    #[serde(rename = "socks")]
    Socks(SocksOutbound),
    /// HTTP outbound (HTTP CONNECT proxy client)
    #[serde(rename = "http")]
    Http(HttpOutbound),
    /// Shadowsocks outbound
    Shadowsocks(ShadowsocksOutbound),
    /// VMess outbound
    #[serde(rename = "vmess")]
    VMess(VMessOutbound),
    /// Trojan outbound
    Trojan(TrojanOutbound),
    /// WireGuard outbound
    #[serde(rename = "wireguard")]
    WireGuard(WireGuardOutbound),
    /// Hysteria outbound
    Hysteria(HysteriaOutbound),
    /// VLESS outbound
    #[serde(rename = "vless")]
    VLess(VLessOutbound),
    /// ShadowTLS outbound
    #[serde(rename = "shadowtls")]
    ShadowTls(ShadowTlsOutbound),
    /// TUIC outbound
    #[serde(rename = "tuic")]
    Tuic(TuicOutbound),
    /// Hysteria2 outbound
    Hysteria2(Hysteria2Outbound),
    /// AnyTLS outbound
    #[serde(rename = "anytls")]
    AnyTls(AnyTlsOutbound),
    /// Selector outbound (manual selection)
    Selector(SelectorOutbound),
    /// URLTest outbound (automatic selection)
    #[serde(rename = "urltest")]
    UrlTest(UrlTestOutbound),
}

impl Outbound {
    /// Get the tag of any outbound variant
    pub fn tag(&self) -> Option<&str> {
        match self {
            Outbound::Direct(o) => o.tag.as_deref(),
            Outbound::Block(o) => o.tag.as_deref(),
            Outbound::Socks(o) => o.tag.as_deref(),
            Outbound::Http(o) => o.tag.as_deref(),
            Outbound::Shadowsocks(o) => o.tag.as_deref(),
            Outbound::VMess(o) => o.tag.as_deref(),
            Outbound::Trojan(o) => o.tag.as_deref(),
            Outbound::WireGuard(o) => o.tag.as_deref(),
            Outbound::Hysteria(o) => o.tag.as_deref(),
            Outbound::VLess(o) => o.tag.as_deref(),
            Outbound::ShadowTls(o) => o.tag.as_deref(),
            Outbound::Tuic(o) => o.tag.as_deref(),
            Outbound::Hysteria2(o) => o.tag.as_deref(),
            Outbound::AnyTls(o) => o.tag.as_deref(),
            Outbound::Selector(o) => o.tag.as_deref(),
            Outbound::UrlTest(o) => o.tag.as_deref(),
        }
    }
}

// ============================================================================
// Common Types
// ============================================================================

/// Multiplex configuration for outbound
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct OutboundMultiplex {
    /// Enable multiplex
    #[serde(default, skip_serializing_if = "is_false")]
    pub enabled: bool,

    /// Multiplex protocol: smux, yamux or h2mux
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,

    /// Maximum connections
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,

    /// Enable padding
    #[serde(default, skip_serializing_if = "is_false")]
    pub padding: bool,
}

/// V2Ray transport configuration
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum V2RayTransport {
    /// HTTP/2 transport
    Http(HttpTransport),
    /// WebSocket transport
    #[serde(rename = "ws")]
    WebSocket(WebSocketTransport),
    /// gRPC transport
    #[serde(rename = "grpc")]
    Grpc(GrpcTransport),
    /// HTTPUpgrade transport
    #[serde(rename = "httpupgrade")]
    HttpUpgrade(HttpUpgradeTransport),
}

/// HTTP transport configuration
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct HttpTransport {
    /// Host domain list
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub host: Vec<String>,

    /// HTTP request path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// WebSocket transport configuration
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct WebSocketTransport {
    /// HTTP request path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// Extra headers
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// Max early data size
    #[serde(default, skip_serializing_if = "is_zero_u32")]
    pub max_early_data: u32,

    /// Early data header name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub early_data_header_name: Option<String>,
}

/// gRPC transport configuration
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct GrpcTransport {
    /// Service name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_name: Option<String>,
}

/// HTTPUpgrade transport configuration
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct HttpUpgradeTransport {
    /// Host domain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,

    /// HTTP request path
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

// ============================================================================
// Outbound Types
// ============================================================================

/// Direct outbound configuration
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct DirectOutbound {
    /// Tag of the outbound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

/// Block outbound configuration
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct BlockOutbound {
    /// Tag of the outbound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

/// SOCKS outbound configuration
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct SocksOutbound {
    /// Tag of the outbound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    /// Server address (required)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,

    /// Server port (required)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_port: Option<u16>,

    /// SOCKS version: 4, 4a, 5 (default: 5)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    /// SOCKS username
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// SOCKS5 password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Enabled network: tcp or udp (default: both)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,

    /// Dial fields
    #[serde(flatten)]
    pub dial: DialFields,
}

/// HTTP outbound configuration
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct HttpOutbound {
    /// Tag of the outbound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    /// Server address (required)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,

    /// Server port (required)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_port: Option<u16>,

    /// Basic authorization username
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    /// Basic authorization password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// TLS configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<OutboundTlsConfig>,

    /// Dial fields
    #[serde(flatten)]
    pub dial: DialFields,
}

/// Shadowsocks outbound configuration
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ShadowsocksOutbound {
    /// Tag of the outbound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    /// Server address (required)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,

    /// Server port (required)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_port: Option<u16>,

    /// Encryption method (required)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,

    /// Password (required)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Shadowsocks SIP003 plugin (obfs-local, v2ray-plugin)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin: Option<String>,

    /// Shadowsocks SIP003 plugin options
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plugin_opts: Option<String>,

    /// Enabled network: tcp or udp (default: both)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,

    /// Multiplex configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multiplex: Option<OutboundMultiplex>,

    /// Dial fields
    #[serde(flatten)]
    pub dial: DialFields,
}

/// VMess outbound configuration
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct VMessOutbound {
    /// Tag of the outbound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    /// Server address (required)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,

    /// Server port (required)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_port: Option<u16>,

    /// VMess user UUID (required)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,

    /// Encryption method: auto, none, zero, aes-128-gcm, chacha20-poly1305
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security: Option<String>,

    /// Alter ID (0 = VMessAEAD)
    #[serde(default, skip_serializing_if = "is_zero_u32")]
    pub alter_id: u32,

    /// Enabled network: tcp or udp (default: both)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,

    /// TLS configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<OutboundTlsConfig>,

    /// UDP packet encoding: packetaddr or xudp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packet_encoding: Option<String>,

    /// V2Ray transport configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<V2RayTransport>,

    /// Dial fields
    #[serde(flatten)]
    pub dial: DialFields,
}

/// Trojan outbound configuration
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct TrojanOutbound {
    /// Tag of the outbound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    /// Server address (required)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,

    /// Server port (required)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_port: Option<u16>,

    /// Trojan password (required)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Enabled network: tcp or udp (default: both)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,

    /// TLS configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<OutboundTlsConfig>,

    /// V2Ray transport configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<V2RayTransport>,

    /// Dial fields
    #[serde(flatten)]
    pub dial: DialFields,
}

/// WireGuard outbound configuration
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct WireGuardOutbound {
    /// Tag of the outbound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    /// WireGuard MTU (default: 1408)
    #[serde(
        default = "default_wireguard_mtu",
        skip_serializing_if = "is_default_wireguard_mtu"
    )]
    pub mtu: u32,

    /// Local addresses (required)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub local_address: Vec<String>,

    /// Private key (required)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_key: Option<String>,

    /// Server address (single peer shorthand)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,

    /// Server port (single peer shorthand)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_port: Option<u16>,

    /// Peer public key (single peer shorthand)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peer_public_key: Option<String>,

    /// Pre-shared key (single peer shorthand)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pre_shared_key: Option<String>,

    /// Reserved bytes (single peer shorthand)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reserved: Option<[u8; 3]>,

    /// Dial fields
    #[serde(flatten)]
    pub dial: DialFields,
}

impl Default for WireGuardOutbound {
    fn default() -> Self {
        Self {
            tag: None,
            mtu: default_wireguard_mtu(),
            local_address: Vec::new(),
            private_key: None,
            server: None,
            server_port: None,
            peer_public_key: None,
            pre_shared_key: None,
            reserved: None,
            dial: DialFields::default(),
        }
    }
}

/// Hysteria outbound configuration
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct HysteriaOutbound {
    /// Tag of the outbound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    /// Server address (required)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,

    /// Server port (required)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_port: Option<u16>,

    /// Upload bandwidth in Mbps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub up_mbps: Option<u32>,

    /// Download bandwidth in Mbps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub down_mbps: Option<u32>,

    /// Obfuscation password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obfs: Option<String>,

    /// Authentication password string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_str: Option<String>,

    /// TLS configuration (required)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<OutboundTlsConfig>,

    /// Dial fields
    #[serde(flatten)]
    pub dial: DialFields,
}

/// VLESS outbound configuration
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct VLessOutbound {
    /// Tag of the outbound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    /// Server address (required)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,

    /// Server port (required)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_port: Option<u16>,

    /// VLESS user UUID (required)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,

    /// VLESS sub-protocol: xtls-rprx-vision
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flow: Option<String>,

    /// Enabled network: tcp or udp (default: both)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network: Option<String>,

    /// TLS configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<OutboundTlsConfig>,

    /// UDP packet encoding: packetaddr or xudp (default: xudp)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub packet_encoding: Option<String>,

    /// V2Ray transport configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transport: Option<V2RayTransport>,

    /// Dial fields
    #[serde(flatten)]
    pub dial: DialFields,
}

/// ShadowTLS outbound configuration
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ShadowTlsOutbound {
    /// Tag of the outbound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    /// Server address (required)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,

    /// Server port (required)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_port: Option<u16>,

    /// ShadowTLS protocol version: 1, 2, or 3 (default: 1)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u8>,

    /// Authentication password (v2 and v3 only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// TLS configuration (required)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<OutboundTlsConfig>,

    /// Dial fields
    #[serde(flatten)]
    pub dial: DialFields,
}

/// TUIC outbound configuration
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct TuicOutbound {
    /// Tag of the outbound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    /// Server address (required)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,

    /// Server port (required)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_port: Option<u16>,

    /// TUIC user UUID (required)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,

    /// TUIC user password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// QUIC congestion control: cubic, new_reno, bbr (default: cubic)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub congestion_control: Option<String>,

    /// UDP packet relay mode: native or quic (default: native)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub udp_relay_mode: Option<String>,

    /// Enable 0-RTT QUIC connection handshake
    #[serde(default, skip_serializing_if = "is_false")]
    pub zero_rtt_handshake: bool,

    /// TLS configuration (required)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<OutboundTlsConfig>,

    /// Dial fields
    #[serde(flatten)]
    pub dial: DialFields,
}

/// Hysteria2 outbound configuration
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Hysteria2Outbound {
    /// Tag of the outbound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    /// Server address (required)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,

    /// Server port (required)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_port: Option<u16>,

    /// Server port range list (conflicts with server_port)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub server_ports: Vec<String>,

    /// Max upload bandwidth in Mbps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub up_mbps: Option<u32>,

    /// Max download bandwidth in Mbps
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub down_mbps: Option<u32>,

    /// QUIC traffic obfuscator
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obfs: Option<Hysteria2Obfs>,

    /// Authentication password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// TLS configuration (required)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<OutboundTlsConfig>,

    /// Dial fields
    #[serde(flatten)]
    pub dial: DialFields,
}

/// Hysteria2 obfuscation configuration
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Hysteria2Obfs {
    /// Obfuscation type: salamander
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub obfs_type: Option<String>,

    /// Obfuscation password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

/// AnyTLS outbound configuration
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct AnyTlsOutbound {
    /// Tag of the outbound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    /// Server address (required)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,

    /// Server port (required)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_port: Option<u16>,

    /// AnyTLS password (required)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Interval checking for idle sessions
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_session_check_interval: Option<String>,

    /// Idle session timeout
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub idle_session_timeout: Option<String>,

    /// Minimum number of idle sessions kept open
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_idle_session: Option<u32>,

    /// TLS configuration (required)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls: Option<OutboundTlsConfig>,

    /// Dial fields
    #[serde(flatten)]
    pub dial: DialFields,
}

/// Selector outbound configuration (manual selection)
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct SelectorOutbound {
    /// Tag of the outbound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    /// List of outbound tags to select from (required)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outbounds: Vec<String>,

    /// Default outbound tag
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<String>,

    /// Interrupt existing connections when selection changes
    #[serde(default, skip_serializing_if = "is_false")]
    pub interrupt_exist_connections: bool,
}

/// URLTest outbound configuration (automatic selection)
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct UrlTestOutbound {
    /// Tag of the outbound
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,

    /// List of outbound tags to test (required)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub outbounds: Vec<String>,

    /// Test URL (default: https://www.gstatic.com/generate_204)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Test interval (default: 3m)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<String>,

    /// Tolerance in milliseconds (default: 50)
    #[serde(default, skip_serializing_if = "is_zero_u32")]
    pub tolerance: u32,

    /// Interrupt existing connections when selection changes
    #[serde(default, skip_serializing_if = "is_false")]
    pub interrupt_exist_connections: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outbound_type_tags() {
        let outbound = Outbound::UrlTest(UrlTestOutbound {
            tag: Some("auto".to_string()),
            outbounds: vec!["a".to_string()],
            ..Default::default()
        });
        let json = serde_json::to_value(&outbound).unwrap();
        assert_eq!(json["type"], "urltest");
        assert_eq!(json["tag"], "auto");
        assert_eq!(outbound.tag(), Some("auto"));
    }

    #[test]
    fn test_vmess_transport_serialization() {
        let mut headers = BTreeMap::new();
        headers.insert("Host".to_string(), "cdn.example.com".to_string());
        let outbound = Outbound::VMess(VMessOutbound {
            tag: Some("vm".to_string()),
            server: Some("example.com".to_string()),
            server_port: Some(443),
            uuid: Some("uuid".to_string()),
            security: Some("auto".to_string()),
            transport: Some(V2RayTransport::WebSocket(WebSocketTransport {
                path: Some("/ws".to_string()),
                headers,
                ..Default::default()
            })),
            ..Default::default()
        });
        let json = serde_json::to_value(&outbound).unwrap();
        assert_eq!(json["type"], "vmess");
        assert_eq!(json["transport"]["type"], "ws");
        assert_eq!(json["transport"]["headers"]["Host"], "cdn.example.com");
        assert!(json.get("alter_id").is_none());
    }

    #[test]
    fn test_wireguard_default_mtu_omitted() {
        let outbound = Outbound::WireGuard(WireGuardOutbound {
            tag: Some("wg".to_string()),
            reserved: Some([1, 2, 3]),
            ..Default::default()
        });
        let json = serde_json::to_value(&outbound).unwrap();
        assert!(json.get("mtu").is_none());
        assert_eq!(json["reserved"], serde_json::json!([1, 2, 3]));
    }

    #[test]
    fn test_shadowtls_detour_flattened() {
        let outbound = Outbound::Shadowsocks(ShadowsocksOutbound {
            tag: Some("ss".to_string()),
            dial: DialFields {
                detour: Some("ss-shadowtls".to_string()),
                ..Default::default()
            },
            ..Default::default()
        });
        let json = serde_json::to_value(&outbound).unwrap();
        assert_eq!(json["detour"], "ss-shadowtls");
    }
}
