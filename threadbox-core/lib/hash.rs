//! Config hashing.
//!
//! The config hash is the cache key of the process registry: two requests for the same
//! provider with structurally equal configs share one sandbox, whichever orb they come from.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Hex-encoded SHA-256 of a provider id and its canonicalized config.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigHash(String);

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Hashes a provider id together with its thread config.
///
/// Object keys are sorted at every depth before serialization, so key order never changes
/// the result. The provider id and the config are separated by a NUL byte so that no
/// provider id can run into the serialized config.
pub fn config_hash(provider_id: &str, config: &Value) -> ConfigHash {
    let canonical = canonicalize(config);

    let mut hasher = Sha256::new();
    hasher.update(provider_id.as_bytes());
    hasher.update([0u8]);
    hasher.update(canonical.to_string().as_bytes());

    ConfigHash(hex::encode(hasher.finalize()))
}

/// Returns a copy of `value` whose objects have their keys inserted in sorted order.
pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();

            let mut sorted = Map::with_capacity(map.len());
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }

            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ConfigHash {
    /// The hex digest.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// A short prefix of the digest for log lines.
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl fmt::Display for ConfigHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_config_hash_ignores_key_order() {
        let a = json!({"slippage": 0.5, "gas": "fast", "route": {"hops": 2, "via": "weth"}});
        let b = json!({"route": {"via": "weth", "hops": 2}, "gas": "fast", "slippage": 0.5});

        assert_eq!(config_hash("uniswap", &a), config_hash("uniswap", &b));
    }

    #[test]
    fn test_config_hash_changes_with_inputs() {
        let config = json!({"slippage": 0.5});

        let base = config_hash("uniswap", &config);
        assert_ne!(base, config_hash("sushiswap", &config));
        assert_ne!(base, config_hash("uniswap", &json!({"slippage": 0.6})));
        assert_ne!(base, config_hash("uniswap", &json!({"slippage": 0.5, "gas": "slow"})));
        assert_ne!(base, config_hash("uniswap", &json!({})));
    }

    #[test]
    fn test_config_hash_array_order_matters() {
        assert_ne!(
            config_hash("p", &json!({"tokens": ["a", "b"]})),
            config_hash("p", &json!({"tokens": ["b", "a"]}))
        );
    }

    #[test]
    fn test_config_hash_is_hex_sha256() {
        let hash = config_hash("p", &json!({}));
        assert_eq!(hash.as_str().len(), 64);
        assert!(hash.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(hash.short().len(), 12);
        assert_eq!(hash, config_hash("p", &json!({})));
    }
}
