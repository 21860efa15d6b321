//! Shared field structures for sing-box outbounds.
//!
//! This module contains the dial and TLS structures that are embedded in
//! multiple outbound types.

use serde::{Deserialize, Serialize};

use crate::singbox::util::is_false;

// ============================================================================
// Dial Fields
// ============================================================================

/// Dial fields for outbound connections.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct DialFields {
    /// The tag of the upstream outbound.
    /// If enabled, all other fields will be ignored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detour: Option<String>,

    /// Enable TCP Fast Open
    #[serde(default, skip_serializing_if = "is_false")]
    pub tcp_fast_open: bool,

    /// Enable TCP Multi Path (Go 1.21 required)
    #[serde(default, skip_serializing_if = "is_false")]
    pub tcp_multi_path: bool,
}

// ============================================================================
// TLS Fields
// ============================================================================

/// TLS configuration for outbound (client) connections.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct OutboundTlsConfig {
    /// Enable TLS
    #[serde(default, skip_serializing_if = "is_false")]
    pub enabled: bool,

    /// Do not send server name in ClientHello
    #[serde(default, skip_serializing_if = "is_false")]
    pub disable_sni: bool,

    /// Server name for verification and SNI
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,

    /// Accept any server certificate (insecure)
    #[serde(default, skip_serializing_if = "is_false")]
    pub insecure: bool,

    /// List of supported ALPN protocols
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alpn: Vec<String>,

    /// uTLS configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub utls: Option<UtlsConfig>,

    /// Reality configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reality: Option<OutboundRealityConfig>,
}

/// uTLS configuration for TLS fingerprint resistance.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct UtlsConfig {
    /// Enable uTLS
    #[serde(default, skip_serializing_if = "is_false")]
    pub enabled: bool,

    /// Fingerprint to use: chrome, firefox, edge, safari, 360, qq, ios, android, random, randomized
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,
}

/// Reality configuration for outbound (client).
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct OutboundRealityConfig {
    /// Enable Reality
    #[serde(default, skip_serializing_if = "is_false")]
    pub enabled: bool,

    /// Public key (generated by `sing-box generate reality-keypair`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,

    /// Short ID (hex string, 0-8 digits)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tls_config_skips_defaults() {
        let tls = OutboundTlsConfig {
            enabled: true,
            server_name: Some("example.com".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_value(&tls).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"enabled": true, "server_name": "example.com"})
        );
    }

    #[test]
    fn test_reality_config_serialization() {
        let tls = OutboundTlsConfig {
            enabled: true,
            utls: Some(UtlsConfig {
                enabled: true,
                fingerprint: Some("chrome".to_string()),
            }),
            reality: Some(OutboundRealityConfig {
                enabled: true,
                public_key: Some("PUBKEY".to_string()),
                short_id: Some("0123".to_string()),
            }),
            ..Default::default()
        };
        let json = serde_json::to_value(&tls).unwrap();
        assert_eq!(json["reality"]["public_key"], "PUBKEY");
        assert_eq!(json["reality"]["short_id"], "0123");
        assert_eq!(json["utls"]["fingerprint"], "chrome");
    }

    #[test]
    fn test_dial_fields_default_is_empty() {
        let json = serde_json::to_value(DialFields::default()).unwrap();
        assert_eq!(json, serde_json::json!({}));
    }
}
