//! Content-addressed configuration keys.
//!
//! Two structurally equal configuration descriptors always produce the same
//! key, independent of which process or registry built them. Keys identify
//! derived mixin runtime types and let a flat record prove it was captured
//! from the configuration it names.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// SHA-256 of a descriptor's canonical field stream, lowercase hex.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConfigurationKey(pub String);

impl ConfigurationKey {
    pub fn builder() -> ConfigurationKeyBuilder {
        ConfigurationKeyBuilder {
            hasher: Sha256::new(),
        }
    }

    /// First 12 hex digits, for log lines.
    pub fn short(&self) -> &str {
        self.0.get(..12).unwrap_or(&self.0)
    }
}

impl fmt::Display for ConfigurationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Incremental key builder.
///
/// Fields must be fed in a stable order.
pub struct ConfigurationKeyBuilder {
    hasher: Sha256,
}

impl ConfigurationKeyBuilder {
    pub fn field(mut self, name: &str, value: &str) -> Self {
        self.hasher.update(name.as_bytes());
        self.hasher.update(b":");
        self.hasher.update(value.as_bytes());
        self.hasher.update(b"\n");
        self
    }

    pub fn field_int(self, name: &str, value: u64) -> Self {
        self.field(name, &value.to_string())
    }

    pub fn finish(self) -> ConfigurationKey {
        let hash = self.hasher.finalize();
        ConfigurationKey(format!("{hash:x}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_determinism() {
        let a = ConfigurationKey::builder()
            .field("target", "Order")
            .field_int("mixins", 2)
            .finish();
        let b = ConfigurationKey::builder()
            .field("target", "Order")
            .field_int("mixins", 2)
            .finish();
        assert_eq!(a, b);
        assert_eq!(a.0.len(), 64);
        assert_eq!(a.short().len(), 12);
    }

    #[test]
    fn key_sensitivity() {
        let a = ConfigurationKey::builder().field("target", "Order").finish();
        let b = ConfigurationKey::builder().field("target", "Invoice").finish();
        assert_ne!(a, b);
    }
}
