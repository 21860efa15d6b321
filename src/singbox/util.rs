//! Utility functions for serde serialization.
//!
//! This module contains helper functions commonly used with serde's
//! `skip_serializing_if` and `default` attributes.

// ============================================================================
// Boolean Helpers
// ============================================================================

/// Returns `true` if the boolean value is `false`.
///
/// Used with `#[serde(skip_serializing_if = "is_false")]` to omit false values.
#[inline]
pub fn is_false(b: &bool) -> bool {
    !*b
}

// ============================================================================
// Numeric Zero Helpers
// ============================================================================

/// Returns `true` if the u32 value is zero.
///
/// Used with `#[serde(skip_serializing_if = "is_zero_u32")]` to omit zero values.
#[inline]
pub fn is_zero_u32(v: &u32) -> bool {
    *v == 0
}

// ============================================================================
// WireGuard MTU Helpers
// ============================================================================

/// Default WireGuard MTU value (1408).
pub const DEFAULT_WIREGUARD_MTU: u32 = 1408;

/// Returns the default WireGuard MTU value.
#[inline]
pub fn default_wireguard_mtu() -> u32 {
    DEFAULT_WIREGUARD_MTU
}

/// Returns `true` if the MTU value is the default WireGuard MTU (1408).
#[inline]
pub fn is_default_wireguard_mtu(v: &u32) -> bool {
    *v == DEFAULT_WIREGUARD_MTU
}
