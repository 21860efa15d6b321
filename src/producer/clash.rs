//! Clash family producer
//!
//! Clash, mihomo (Clash.Meta), Stash and Shadowrocket all read the canonical YAML
//! layout; they differ only in which proxy types and options they understand.

use anyhow::Result;

use crate::emit::emit_document;
use crate::model::{ProxyNode, ProxyType};

use super::{Adaptation, CONTENT_TYPE_YAML, ExportSet, Format, Producer};

/// Keys only the mihomo core understands
const META_ONLY_KEYS: [&str; 3] = ["reality-opts", "client-fingerprint", "flow"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClashFlavor {
    /// Clash Premium core
    Clash,
    /// mihomo
    Meta,
    Stash,
    Shadowrocket,
}

pub struct ClashProducer {
    flavor: ClashFlavor,
}

impl ClashProducer {
    pub fn new(flavor: ClashFlavor) -> Self {
        Self { flavor }
    }
}

impl Producer for ClashProducer {
    fn format(&self) -> Format {
        match self.flavor {
            ClashFlavor::Clash => Format::Clash,
            ClashFlavor::Meta => Format::ClashMeta,
            ClashFlavor::Stash => Format::Stash,
            ClashFlavor::Shadowrocket => Format::Shadowrocket,
        }
    }

    fn content_type(&self) -> &'static str {
        CONTENT_TYPE_YAML
    }

    fn supports(&self, proxy_type: ProxyType) -> bool {
        match self.flavor {
            ClashFlavor::Clash => matches!(
                proxy_type,
                ProxyType::Shadowsocks
                    | ProxyType::ShadowsocksR
                    | ProxyType::VMess
                    | ProxyType::Trojan
                    | ProxyType::Socks5
                    | ProxyType::Http
                    | ProxyType::Snell
            ),
            ClashFlavor::Meta => true,
            ClashFlavor::Stash => proxy_type != ProxyType::AnyTls,
            ClashFlavor::Shadowrocket => proxy_type != ProxyType::Snell,
        }
    }

    fn keeps_group_filters(&self) -> bool {
        self.flavor == ClashFlavor::Meta
    }

    fn adapt(&self, node: &mut ProxyNode) -> Adaptation {
        if self.flavor != ClashFlavor::Clash {
            return Adaptation::Keep;
        }

        if let Some(plugin) = node.get_str("plugin")
            && matches!(plugin, "shadow-tls" | "restls" | "kcptun")
        {
            return Adaptation::Dropped(format!("plugin {} is not supported by clash", plugin));
        }

        let removed: Vec<&str> = META_ONLY_KEYS
            .into_iter()
            .filter(|key| node.remove(key).is_some())
            .collect();
        if removed.is_empty() {
            Adaptation::Keep
        } else {
            Adaptation::Downgraded(format!("removed {} (not supported by clash)", removed.join(", ")))
        }
    }

    fn render(&self, set: &ExportSet, _warnings: &mut Vec<String>) -> Result<String> {
        emit_document(&set.nodes, &set.groups, &set.rules)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::producer::produce;
    use serde_yaml::{Mapping, Value};

    fn reality_node() -> ProxyNode {
        let mut reality = Mapping::new();
        reality.insert("public-key".into(), "PUBKEY".into());
        let mut node = ProxyNode::new("r", ProxyType::VMess, "a.com", 443).unwrap();
        node.set("uuid", "uuid");
        node.set("tls", true);
        node.set("client-fingerprint", "chrome");
        node.set("reality-opts", Value::Mapping(reality));
        node
    }

    #[test]
    fn test_clash_strips_reality() {
        let produced = produce(Some(Format::Clash), &[reality_node()], &[], &[]).unwrap();
        assert!(!produced.content.contains("reality-opts"));
        assert!(!produced.content.contains("client-fingerprint"));
        assert_eq!(produced.warnings.len(), 1);
    }

    #[test]
    fn test_meta_keeps_reality() {
        let produced = produce(Some(Format::ClashMeta), &[reality_node()], &[], &[]).unwrap();
        assert!(produced.content.contains("public-key: PUBKEY"));
        assert!(produced.warnings.is_empty());
    }

    #[test]
    fn test_clash_drops_shadow_tls_plugin() {
        let mut node = ProxyNode::new("s", ProxyType::Shadowsocks, "a.com", 443).unwrap();
        node.set("cipher", "aes-128-gcm");
        node.set("password", "pw");
        node.set("plugin", "shadow-tls");
        let producer = ClashProducer::new(ClashFlavor::Clash);
        assert!(matches!(producer.adapt(&mut node), Adaptation::Dropped(_)));
    }

    #[test]
    fn test_support_matrix() {
        let stash = ClashProducer::new(ClashFlavor::Stash);
        assert!(stash.supports(ProxyType::Hysteria2));
        assert!(!stash.supports(ProxyType::AnyTls));
        let rocket = ClashProducer::new(ClashFlavor::Shadowrocket);
        assert!(!rocket.supports(ProxyType::Snell));
        let clash = ClashProducer::new(ClashFlavor::Clash);
        assert!(!clash.supports(ProxyType::VLess));
    }
}
