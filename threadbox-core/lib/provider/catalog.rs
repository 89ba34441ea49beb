use std::{
    collections::HashMap,
    path::{Path, PathBuf},
    sync::Arc,
};

use serde::Deserialize;
use tokio::fs;

use crate::{permission::PermissionSet, ThreadboxError, ThreadboxResult};

use super::{ExecutionKind, ProviderRegistry, ThreadProvider, ThreadType};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The provider registry: every provider in it has passed permission validation.
#[derive(Debug, Default)]
pub struct ProviderCatalog {
    providers: HashMap<String, Arc<ThreadProvider>>,
}

/// A provider manifest as written on disk.
///
/// ```yaml
/// id: uniswap-v3
/// thread_type: dex
/// execution_kind: module
/// permissions:
///   - storage::isolated
///   - wallet::sign
/// source_file: uniswap-v3.js
/// ```
#[derive(Debug, Deserialize)]
pub struct ProviderManifest {
    /// Stable provider id.
    pub id: String,

    /// The venue kind.
    pub thread_type: ThreadType,

    /// How the program is loaded.
    #[serde(default)]
    pub execution_kind: ExecutionKind,

    /// Declared permission strings.
    #[serde(default)]
    pub permissions: Vec<String>,

    /// Program file, relative to the manifest.
    pub source_file: PathBuf,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl ProviderCatalog {
    /// Creates an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a provider after validating its permissions.
    ///
    /// A provider with any invalid permission, or with both isolated and network storage,
    /// is rejected outright rather than registered with a reduced grant.
    pub fn register(&mut self, provider: ThreadProvider) -> ThreadboxResult<()> {
        if provider.get_id().trim().is_empty() {
            return Err(ThreadboxError::InvalidManifest {
                path: "<inline>".to_string(),
                reason: "provider id cannot be empty".to_string(),
            });
        }

        PermissionSet::from_permissions(provider.get_id(), provider.get_permissions())?;

        if self.providers.contains_key(provider.get_id()) {
            return Err(ThreadboxError::ProviderAlreadyRegistered(
                provider.get_id().clone(),
            ));
        }

        tracing::info!(
            "registered thread provider {} ({}) with permissions {:?}",
            provider.get_id(),
            provider.get_thread_type(),
            provider.get_permissions()
        );

        self.providers
            .insert(provider.get_id().clone(), Arc::new(provider));

        Ok(())
    }

    /// Loads every `*.yaml` / `*.yml` manifest in `dir`.
    ///
    /// A missing directory yields an empty catalog. An invalid manifest fails the whole load.
    pub async fn load_dir(dir: impl AsRef<Path>) -> ThreadboxResult<Self> {
        let dir = dir.as_ref();
        let mut catalog = Self::new();

        if !dir.exists() {
            tracing::warn!("provider directory {} does not exist", dir.display());
            return Ok(catalog);
        }

        let mut manifests = Vec::new();
        let mut entries = fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_manifest = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext == "yaml" || ext == "yml");

            if is_manifest && path.is_file() {
                manifests.push(path);
            }
        }

        // Directory order is unspecified; keep loading deterministic.
        manifests.sort();

        for path in manifests {
            let provider = Self::read_manifest(&path).await?;
            catalog.register(provider)?;
        }

        Ok(catalog)
    }

    /// Number of registered providers.
    pub fn len(&self) -> usize {
        self.providers.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// Registered provider ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.providers.keys().cloned().collect();
        ids.sort();
        ids
    }

    async fn read_manifest(path: &Path) -> ThreadboxResult<ThreadProvider> {
        let invalid = |reason: String| ThreadboxError::InvalidManifest {
            path: path.display().to_string(),
            reason,
        };

        let content = fs::read_to_string(path).await?;
        let manifest: ProviderManifest =
            serde_yaml::from_str(&content).map_err(|e| invalid(e.to_string()))?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        let source_path = base.join(&manifest.source_file);
        let source = fs::read_to_string(&source_path).await.map_err(|e| {
            invalid(format!(
                "failed to read source file {}: {}",
                source_path.display(),
                e
            ))
        })?;

        Ok(ThreadProvider::builder()
            .id(manifest.id)
            .source(source)
            .execution_kind(manifest.execution_kind)
            .thread_type(manifest.thread_type)
            .permissions(manifest.permissions)
            .build())
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl ProviderRegistry for ProviderCatalog {
    fn get_provider(&self, id: &str) -> Option<Arc<ThreadProvider>> {
        self.providers.get(id).cloned()
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
