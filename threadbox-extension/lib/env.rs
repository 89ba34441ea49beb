use std::path::{Path, PathBuf};

use serde_json::Value;
use threadbox_core::descriptor::ThreadDescriptor;
use threadbox_utils::env::{DESCRIPTOR_ENV_VAR, THREAD_PORT_ENV_VAR};

use crate::{ExtensionError, ExtensionResult, StorageExtension, WalletExtension};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// What a running thread knows about itself: its descriptor and the extensions it grants.
#[derive(Debug, Clone)]
pub struct ThreadEnv {
    descriptor: ThreadDescriptor,
    port: u16,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ThreadEnv {
    /// Loads the environment the runtime set up for this thread.
    ///
    /// The descriptor path comes from `THREADBOX_DESCRIPTOR`. `THREADBOX_PORT` overrides the
    /// descriptor's socket port when set.
    pub fn from_env() -> ExtensionResult<Self> {
        let path = std::env::var_os(DESCRIPTOR_ENV_VAR)
            .map(PathBuf::from)
            .ok_or_else(|| {
                ExtensionError::Environment(format!("{} is not set", DESCRIPTOR_ENV_VAR))
            })?;

        let mut env = Self::from_path(&path)?;

        if let Ok(port) = std::env::var(THREAD_PORT_ENV_VAR) {
            env.port = port.parse().map_err(|_| {
                ExtensionError::Environment(format!(
                    "{} is not a port: {}",
                    THREAD_PORT_ENV_VAR, port
                ))
            })?;
        }

        Ok(env)
    }

    /// Loads a descriptor file.
    pub fn from_path(path: impl AsRef<Path>) -> ExtensionResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let descriptor = ThreadDescriptor::from_yaml(&content)?;
        tracing::debug!(
            "loaded thread descriptor from {}",
            path.as_ref().display()
        );
        Ok(Self::from_descriptor(descriptor))
    }

    /// Wraps an already parsed descriptor.
    pub fn from_descriptor(descriptor: ThreadDescriptor) -> Self {
        let port = descriptor.socket.address.port();
        Self { descriptor, port }
    }

    /// The descriptor.
    pub fn descriptor(&self) -> &ThreadDescriptor {
        &self.descriptor
    }

    /// The port the thread serves on.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The thread config passed in the spawn request.
    pub fn config(&self) -> &Value {
        &self.descriptor.config
    }

    /// The storage extension, if the provider declared storage.
    pub fn storage(&self) -> ExtensionResult<Option<StorageExtension>> {
        self.descriptor
            .storage_binding()
            .map(StorageExtension::from_binding)
            .transpose()
    }

    /// The wallet extension, if the provider declared wallet access.
    pub fn wallet(&self) -> Option<WalletExtension> {
        self.descriptor
            .wallet_binding()
            .map(WalletExtension::from_binding)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serde_json::json;
    use serial_test::serial;
    use threadbox_core::permission::{StorageScope, WalletAccess};

    use super::*;
    use crate::testing::{descriptor, TestHost};

    #[tokio::test]
    async fn test_from_path_exposes_granted_extensions_only() -> anyhow::Result<()> {
        let host = TestHost::start().await?;
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("thread.yaml");

        let descriptor = descriptor(&host, "uniswap", &["storage::isolated"], 1, "ethereum").await?;
        std::fs::write(&path, descriptor.to_yaml()?)?;

        let env = ThreadEnv::from_path(&path)?;
        assert_eq!(env.port(), 9100);
        assert!(env.wallet().is_none());

        let storage = env.storage()?.expect("storage extension");
        assert_eq!(storage.scope(), StorageScope::Isolated);
        storage.set(&json!({ "ok": true })).await?;
        assert_eq!(storage.get().await?, Some(json!({ "ok": true })));
        Ok(())
    }

    #[tokio::test]
    #[serial]
    async fn test_from_env_reads_descriptor_and_port() -> anyhow::Result<()> {
        let host = TestHost::start().await?;
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("thread.yaml");

        let descriptor = descriptor(&host, "aave", &["wallet::sign"], 2, "ethereum").await?;
        std::fs::write(&path, descriptor.to_yaml()?)?;

        std::env::set_var(DESCRIPTOR_ENV_VAR, &path);
        std::env::set_var(THREAD_PORT_ENV_VAR, "9200");
        let env = ThreadEnv::from_env();
        std::env::remove_var(DESCRIPTOR_ENV_VAR);
        std::env::remove_var(THREAD_PORT_ENV_VAR);

        let env = env?;
        assert_eq!(env.port(), 9200);
        assert!(env.storage()?.is_none());

        let wallet = env.wallet().expect("wallet extension");
        assert_eq!(wallet.access(), WalletAccess::Sign);
        assert_eq!(wallet.get_address().await?, format!("0x{:040}", 2));
        Ok(())
    }

    #[test]
    #[serial]
    fn test_from_env_without_descriptor_fails() {
        std::env::remove_var(DESCRIPTOR_ENV_VAR);

        let error = ThreadEnv::from_env().unwrap_err();
        assert!(matches!(error, ExtensionError::Environment(_)));
    }
}
