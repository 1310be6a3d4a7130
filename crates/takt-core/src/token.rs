//! Opaque token minting seam.
//!
//! Session tokens are bearer strings with no embedded data. The store
//! treats them as opaque keys; the only requirement is collision
//! resistance among live tokens, which [`UuidTokens`] provides and the
//! store's create loop enforces outright.

use uuid::Uuid;

/// Mints opaque unique strings for session tokens.
pub trait TokenSource: Send + Sync {
    /// Produce one fresh token.
    fn mint(&self) -> String;
}

/// UUIDv4-backed token source.
///
/// Format: `tk-{uuid}`. Random, no user data, safe to log prefixes of.
#[derive(Debug, Clone, Copy, Default)]
pub struct UuidTokens;

impl TokenSource for UuidTokens {
    fn mint(&self) -> String {
        format!("tk-{}", Uuid::new_v4())
    }
}
