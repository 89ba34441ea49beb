use std::{collections::HashMap, sync::Arc};

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{permission::WalletAccess, ThreadboxError, ThreadboxResult};

use super::{
    GET_ADDRESS_OPERATION, GET_BALANCE_OPERATION, SEND_TRANSACTION_OPERATION,
    SIGN_MESSAGE_OPERATION, SIGN_TRANSACTION_OPERATION,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// What a wallet grant lets its holder do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletGrant {
    /// Granted access level.
    pub access: WalletAccess,

    /// Orb the grant is bound to.
    pub orb_id: i64,

    /// Sector of that orb.
    pub sector_id: i64,

    /// Chain of that orb.
    pub chain: String,
}

/// Host-side record of the wallet grants handed to running threads.
///
/// A grant id is issued when a thread with wallet access is spawned and written into its
/// wallet binding. Wallet calls must present it; the host, not the thread, decides what the
/// id allows. Ids are revoked when the thread is retired.
#[derive(Debug, Clone, Default)]
pub struct WalletGrants {
    grants: Arc<RwLock<HashMap<String, WalletGrant>>>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl WalletGrants {
    /// Creates an empty grant table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `grant` and returns its id.
    pub async fn issue(&self, grant: WalletGrant) -> String {
        let id = Uuid::new_v4().simple().to_string();
        self.grants.write().await.insert(id.clone(), grant);
        id
    }

    /// Forgets a grant. Unknown ids are ignored.
    pub async fn revoke(&self, id: &str) {
        self.grants.write().await.remove(id);
    }

    /// Number of live grants.
    pub async fn len(&self) -> usize {
        self.grants.read().await.len()
    }

    /// Whether no grant is live.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Checks that grant `id` covers `operation` on the claimed orb, sector and chain.
    ///
    /// Read operations need any live grant. Signing and sending need sign access.
    pub async fn authorize(
        &self,
        id: Option<&str>,
        operation: &str,
        orb_id: i64,
        sector_id: i64,
        chain: &str,
    ) -> ThreadboxResult<()> {
        let denied = || ThreadboxError::AccessDenied {
            operation: operation.to_string(),
        };

        let grants = self.grants.read().await;
        let grant = id.and_then(|id| grants.get(id)).ok_or_else(denied)?;

        if grant.orb_id != orb_id || grant.sector_id != sector_id || grant.chain != chain {
            return Err(ThreadboxError::OwnershipMismatch {
                orb_id,
                sector_id,
                chain: chain.to_string(),
            });
        }

        match operation {
            GET_ADDRESS_OPERATION | GET_BALANCE_OPERATION => Ok(()),
            SIGN_TRANSACTION_OPERATION | SEND_TRANSACTION_OPERATION | SIGN_MESSAGE_OPERATION
                if grant.access == WalletAccess::Sign =>
            {
                Ok(())
            }
            _ => Err(denied()),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn grant(access: WalletAccess) -> WalletGrant {
        WalletGrant {
            access,
            orb_id: 1,
            sector_id: 10,
            chain: "ethereum".to_string(),
        }
    }

    #[tokio::test]
    async fn test_read_grant_cannot_sign_or_send() -> anyhow::Result<()> {
        let grants = WalletGrants::new();
        let id = grants.issue(grant(WalletAccess::Read)).await;

        grants
            .authorize(Some(&id), GET_ADDRESS_OPERATION, 1, 10, "ethereum")
            .await?;
        grants
            .authorize(Some(&id), GET_BALANCE_OPERATION, 1, 10, "ethereum")
            .await?;

        for operation in [
            SIGN_TRANSACTION_OPERATION,
            SEND_TRANSACTION_OPERATION,
            SIGN_MESSAGE_OPERATION,
        ] {
            let result = grants.authorize(Some(&id), operation, 1, 10, "ethereum").await;
            assert!(matches!(result, Err(ThreadboxError::AccessDenied { .. })));
        }
        Ok(())
    }

    #[tokio::test]
    async fn test_sign_grant_is_bound_to_its_orb() -> anyhow::Result<()> {
        let grants = WalletGrants::new();
        let id = grants.issue(grant(WalletAccess::Sign)).await;

        grants
            .authorize(Some(&id), SEND_TRANSACTION_OPERATION, 1, 10, "ethereum")
            .await?;

        let other_orb = grants
            .authorize(Some(&id), SEND_TRANSACTION_OPERATION, 2, 10, "ethereum")
            .await;
        assert!(matches!(other_orb, Err(ThreadboxError::OwnershipMismatch { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_missing_unknown_and_revoked_grants_are_denied() {
        let grants = WalletGrants::new();
        let id = grants.issue(grant(WalletAccess::Sign)).await;
        assert_eq!(grants.len().await, 1);

        let missing = grants
            .authorize(None, GET_ADDRESS_OPERATION, 1, 10, "ethereum")
            .await;
        assert!(matches!(missing, Err(ThreadboxError::AccessDenied { .. })));

        let forged = grants
            .authorize(Some("forged"), GET_ADDRESS_OPERATION, 1, 10, "ethereum")
            .await;
        assert!(matches!(forged, Err(ThreadboxError::AccessDenied { .. })));

        grants.revoke(&id).await;
        assert!(grants.is_empty().await);
        let revoked = grants
            .authorize(Some(&id), GET_ADDRESS_OPERATION, 1, 10, "ethereum")
            .await;
        assert!(matches!(revoked, Err(ThreadboxError::AccessDenied { .. })));
    }
}
