//! Base64 decoding utilities
//!
//! Subscriptions and share links use every Base64 flavour in the wild: standard
//! or URL-safe alphabets, with or without padding, wrapped across lines. The
//! decoder accepts all of them; the encoders produce the forms clients expect.

use anyhow::{Context, Result, bail};
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE, URL_SAFE_NO_PAD};
use tracing::trace;

// ============================================================================
// Base64 Decoding
// ============================================================================

/// Decodes Base64 content, trying multiple variants
///
/// Attempts to decode the content using:
/// 1. Standard Base64
/// 2. URL-safe Base64
/// 3. URL-safe Base64 without padding
/// 4. Standard/URL-safe with padding added
///
/// Whitespace in the input is automatically removed before decoding.
pub fn decode_base64(content: &str) -> Result<Vec<u8>> {
    // Remove all whitespace (handles line breaks within Base64)
    let cleaned: String = content.chars().filter(|c| !c.is_whitespace()).collect();
    trace!(
        "Attempting Base64 decode, cleaned length: {} bytes",
        cleaned.len()
    );

    // Try standard Base64 first
    if let Ok(decoded) = STANDARD.decode(&cleaned) {
        trace!("Decoded using standard Base64");
        return Ok(decoded);
    }

    // Try URL-safe Base64
    if let Ok(decoded) = URL_SAFE.decode(&cleaned) {
        trace!("Decoded using URL-safe Base64");
        return Ok(decoded);
    }

    // Try URL-safe Base64 without padding
    if let Ok(decoded) = URL_SAFE_NO_PAD.decode(&cleaned) {
        trace!("Decoded using URL-safe Base64 without padding");
        return Ok(decoded);
    }

    // Try with padding added if needed
    let padded = add_base64_padding(&cleaned);
    if let Ok(decoded) = STANDARD.decode(&padded) {
        trace!("Decoded using standard Base64 with added padding");
        return Ok(decoded);
    }
    if let Ok(decoded) = URL_SAFE.decode(&padded) {
        trace!("Decoded using URL-safe Base64 with added padding");
        return Ok(decoded);
    }

    bail!("Failed to decode Base64 content")
}

/// Adds proper padding to Base64 string if missing
///
/// Base64 strings should have a length that is a multiple of 4.
/// This function adds '=' padding characters as needed.
pub fn add_base64_padding(s: &str) -> String {
    let mut result = s.to_string();
    while !result.len().is_multiple_of(4) {
        result.push('=');
    }
    result
}

/// Decodes Base64 into UTF-8 text
pub fn decode_base64_text(content: &str) -> Result<String> {
    let decoded = decode_base64(content)?;
    String::from_utf8(decoded).context("Decoded Base64 content is not valid UTF-8")
}

/// Encodes text as standard, padded Base64
pub fn encode_base64(content: &str) -> String {
    STANDARD.encode(content)
}

/// Encodes text as URL-safe Base64 without padding, as share links embed it
pub fn encode_base64_url(content: &str) -> String {
    URL_SAFE_NO_PAD.encode(content)
}

/// Decodes subscription content, automatically handling Base64 if needed
///
/// Content that is not a Base64 blob of links is returned as-is.
pub fn decode_subscription_content(content: &str) -> Result<String> {
    use super::detection::SubscriptionType;
    use super::detection::detect_subscription_type;

    match detect_subscription_type(content) {
        SubscriptionType::Base64UriList => decode_base64_text(content.trim()),
        _ => Ok(content.to_string()),
    }
}
