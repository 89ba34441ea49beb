use serde::{Deserialize, Serialize};

use crate::{ThreadboxError, ThreadboxResult};

use super::Capability;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The storage scope a provider has been granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageScope {
    /// Keyed by (orb, provider).
    Isolated,

    /// Keyed by (sector, chain, provider).
    Network,
}

/// The wallet access level a provider has been granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletAccess {
    /// Address and balance lookups.
    Read,

    /// Reads plus signing and sending.
    Sign,
}

/// The validated grants of one provider.
///
/// A `PermissionSet` can only be built from a permission list in which every entry is valid,
/// so holding one proves the list was checked. Any invalid entry rejects the whole list.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PermissionSet {
    capabilities: Vec<Capability>,
    storage: Option<StorageScope>,
    wallet: Option<WalletAccess>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl PermissionSet {
    /// Validates a provider's permission list.
    ///
    /// Fails on the first invalid string, and when the list asks for both isolated and
    /// network storage.
    pub fn from_permissions<S: AsRef<str>>(
        provider_id: &str,
        permissions: &[S],
    ) -> ThreadboxResult<Self> {
        let mut set = PermissionSet::default();

        for permission in permissions {
            let capability: Capability = permission.as_ref().parse()?;

            match &capability {
                Capability::IsolatedStorage => set.grant_storage(provider_id, StorageScope::Isolated)?,
                Capability::NetworkStorage { .. } => {
                    set.grant_storage(provider_id, StorageScope::Network)?
                }
                Capability::WalletRead => set.grant_wallet(WalletAccess::Read),
                Capability::WalletSign => set.grant_wallet(WalletAccess::Sign),
            }

            if !set.capabilities.contains(&capability) {
                set.capabilities.push(capability);
            }
        }

        Ok(set)
    }

    /// The storage scope granted, if any.
    pub fn storage(&self) -> Option<StorageScope> {
        self.storage
    }

    /// The wallet access granted, if any.
    pub fn wallet(&self) -> Option<WalletAccess> {
        self.wallet
    }

    /// The distinct capabilities, in declaration order.
    pub fn capabilities(&self) -> &[Capability] {
        &self.capabilities
    }

    /// Whether nothing at all was granted.
    pub fn is_empty(&self) -> bool {
        self.capabilities.is_empty()
    }

    fn grant_storage(&mut self, provider_id: &str, scope: StorageScope) -> ThreadboxResult<()> {
        match self.storage {
            None => {
                self.storage = Some(scope);
                Ok(())
            }
            Some(existing) if existing == scope => Ok(()),
            Some(_) => Err(ThreadboxError::ConflictingPermissions {
                provider_id: provider_id.to_string(),
                reason: "isolated and network storage are mutually exclusive".to_string(),
            }),
        }
    }

    fn grant_wallet(&mut self, access: WalletAccess) {
        self.wallet = Some(self.wallet.map_or(access, |existing| existing.max(access)));
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
