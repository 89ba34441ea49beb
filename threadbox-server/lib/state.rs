//! Application state shared by every route.

use std::sync::Arc;

use getset::Getters;
use threadbox_core::{
    service::ThreadService,
    target::{StorageTarget, WalletTarget},
};

use crate::config::Config;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Application state structure
#[derive(Debug, Clone, Getters)]
#[getset(get = "pub with_prefix")]
pub struct AppState {
    /// The server configuration
    config: Arc<Config>,

    /// The thread facade
    threads: Arc<ThreadService>,

    /// The storage capability target
    storage: StorageTarget,

    /// The wallet capability target
    wallet: WalletTarget,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl AppState {
    /// Create a new application state instance
    pub fn new(
        config: Arc<Config>,
        threads: Arc<ThreadService>,
        storage: StorageTarget,
        wallet: WalletTarget,
    ) -> Self {
        Self {
            config,
            threads,
            storage,
            wallet,
        }
    }
}
