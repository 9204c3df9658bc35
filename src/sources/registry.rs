//! Known-bad-actor registry
//!
//! Read-mostly service injected into each assessment call. The engine never
//! owns or mutates it.

use parking_lot::RwLock;
use std::collections::HashSet;

/// Lookup of addresses with a scam history
pub trait KnownBadActorRegistry: Send + Sync {
    fn is_flagged(&self, address: &str) -> bool;
}

/// In-memory registry seeded from configuration
#[derive(Debug, Default)]
pub struct StaticBadActorRegistry {
    addresses: RwLock<HashSet<String>>,
}

impl StaticBadActorRegistry {
    pub fn new<I, S>(addresses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            addresses: RwLock::new(addresses.into_iter().map(|a| normalize(a.as_ref())).collect()),
        }
    }

    /// Add an address; returns false if it was already flagged
    pub fn flag(&self, address: &str) -> bool {
        self.addresses.write().insert(normalize(address))
    }

    pub fn len(&self) -> usize {
        self.addresses.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.addresses.read().is_empty()
    }
}

impl KnownBadActorRegistry for StaticBadActorRegistry {
    fn is_flagged(&self, address: &str) -> bool {
        self.addresses.read().contains(&normalize(address))
    }
}

/// EVM addresses compare case-insensitively; base58 keys are case-sensitive
fn normalize(address: &str) -> String {
    let address = address.trim();
    if address.starts_with("0x") || address.starts_with("0X") {
        address.to_ascii_lowercase()
    } else {
        address.to_string()
    }
}
