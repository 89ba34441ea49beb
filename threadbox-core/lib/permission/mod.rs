//! Permission model for thread providers.
//!
//! A permission is a string of the form `resource::scope[::identifier]`. The valid forms are:
//!
//! - `storage::isolated` - private key/value state for one (orb, provider) pair
//! - `storage::network::<identifier>` - state shared by every orb of a sector on one chain
//! - `wallet::read` - read-only wallet access
//! - `wallet::sign` - wallet access including signing and sending
//!
//! The free functions in this module never fail: invalid input yields `None` fields or
//! `false`, so callers can filter permission lists without error plumbing. [`Capability`]
//! and [`PermissionSet`] are the validated forms the descriptor builder consumes.

mod set;

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::ThreadboxError;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use set::*;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Separator between the parts of a permission string.
pub const PERMISSION_SEPARATOR: &str = "::";

/// The storage resource.
pub const STORAGE_RESOURCE: &str = "storage";

/// The wallet resource.
pub const WALLET_RESOURCE: &str = "wallet";

/// Scope of per-orb storage.
pub const ISOLATED_SCOPE: &str = "isolated";

/// Scope of per-sector storage.
pub const NETWORK_SCOPE: &str = "network";

/// Scope of read-only wallet access.
pub const READ_SCOPE: &str = "read";

/// Scope of signing wallet access.
pub const SIGN_SCOPE: &str = "sign";

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// A permission string split into its parts, without any validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParsedPermission<'a> {
    /// The resource, e.g. `storage`.
    pub resource: Option<&'a str>,

    /// The scope, e.g. `isolated`.
    pub scope: Option<&'a str>,

    /// The identifier, only present for three-part permissions.
    pub identifier: Option<&'a str>,

    /// How many `::`-separated parts the string has.
    pub part_count: usize,
}

/// A validated permission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Capability {
    /// `storage::isolated`
    IsolatedStorage,

    /// `storage::network::<identifier>`
    NetworkStorage {
        /// The network identifier.
        identifier: String,
    },

    /// `wallet::read`
    WalletRead,

    /// `wallet::sign`
    WalletSign,
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Splits a permission string on `::`.
///
/// Empty resource or scope parts are reported as `None`.
pub fn parse_permission(permission: &str) -> ParsedPermission<'_> {
    let parts: Vec<&str> = permission.split(PERMISSION_SEPARATOR).collect();
    ParsedPermission {
        resource: non_empty(parts.first()),
        scope: non_empty(parts.get(1)),
        identifier: parts.get(2).copied(),
        part_count: parts.len(),
    }
}

fn non_empty<'a>(part: Option<&&'a str>) -> Option<&'a str> {
    part.copied().filter(|p| !p.is_empty())
}

/// Checks whether a permission string is one of the valid forms.
pub fn validate_permission(permission: &str) -> bool {
    let parsed = parse_permission(permission);
    match (parsed.resource, parsed.scope) {
        (Some(STORAGE_RESOURCE), Some(ISOLATED_SCOPE)) => parsed.part_count == 2,
        (Some(STORAGE_RESOURCE), Some(NETWORK_SCOPE)) => {
            parsed.part_count == 3 && parsed.identifier.is_some_and(|id| !id.is_empty())
        }
        (Some(WALLET_RESOURCE), Some(READ_SCOPE | SIGN_SCOPE)) => parsed.part_count == 2,
        _ => false,
    }
}

/// Whether the permission names isolated storage.
pub fn is_isolated_storage(permission: &str) -> bool {
    let parsed = parse_permission(permission);
    parsed.resource == Some(STORAGE_RESOURCE) && parsed.scope == Some(ISOLATED_SCOPE)
}

/// Whether the permission names network storage.
pub fn is_network_storage(permission: &str) -> bool {
    let parsed = parse_permission(permission);
    parsed.resource == Some(STORAGE_RESOURCE) && parsed.scope == Some(NETWORK_SCOPE)
}

/// Whether the permission names the wallet.
pub fn is_wallet(permission: &str) -> bool {
    parse_permission(permission).resource == Some(WALLET_RESOURCE)
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Capability {
    /// Whether this capability grants storage of either scope.
    pub fn is_storage(&self) -> bool {
        matches!(
            self,
            Capability::IsolatedStorage | Capability::NetworkStorage { .. }
        )
    }

    /// Whether this capability grants wallet access.
    pub fn is_wallet(&self) -> bool {
        matches!(self, Capability::WalletRead | Capability::WalletSign)
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl FromStr for Capability {
    type Err = ThreadboxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if !validate_permission(s) {
            return Err(ThreadboxError::InvalidPermission(s.to_string()));
        }

        let parsed = parse_permission(s);
        let capability = match (parsed.resource, parsed.scope, parsed.identifier) {
            (Some(STORAGE_RESOURCE), Some(ISOLATED_SCOPE), _) => Capability::IsolatedStorage,
            (Some(STORAGE_RESOURCE), Some(NETWORK_SCOPE), Some(identifier)) => {
                Capability::NetworkStorage {
                    identifier: identifier.to_string(),
                }
            }
            (Some(WALLET_RESOURCE), Some(READ_SCOPE), _) => Capability::WalletRead,
            (Some(WALLET_RESOURCE), Some(SIGN_SCOPE), _) => Capability::WalletSign,
            _ => return Err(ThreadboxError::InvalidPermission(s.to_string())),
        };

        Ok(capability)
    }
}

impl TryFrom<String> for Capability {
    type Error = ThreadboxError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Capability> for String {
    fn from(value: Capability) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::IsolatedStorage => write!(f, "{STORAGE_RESOURCE}::{ISOLATED_SCOPE}"),
            Capability::NetworkStorage { identifier } => {
                write!(f, "{STORAGE_RESOURCE}::{NETWORK_SCOPE}::{identifier}")
            }
            Capability::WalletRead => write!(f, "{WALLET_RESOURCE}::{READ_SCOPE}"),
            Capability::WalletSign => write!(f, "{WALLET_RESOURCE}::{SIGN_SCOPE}"),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
