//! Typed sing-box outbound schema
//!
//! The sing-box producer maps canonical nodes and groups onto these structures and
//! serializes them with `serde_json`, so the JSON it emits always matches the
//! field names and shapes sing-box expects.

pub mod outbound;
pub mod shared;
pub mod util;

use serde::{Deserialize, Serialize};

use crate::singbox::outbound::Outbound;

/// Subscription document holding only an `outbounds` array
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct SingBoxOutbounds {
    #[serde(default)]
    pub outbounds: Vec<Outbound>,
}
