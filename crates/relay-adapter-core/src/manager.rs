// SPDX-License-Identifier: MIT OR Apache-2.0
//! [`AdapterManager`] — owns adapter manifests, persisted configuration,
//! and the running set of started [`Adapter`] instances.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::adapter::{Adapter, AdapterFactory, AdapterStatus, PublishSink};
use crate::config::{self, AdapterConfig, AdaptersFile};
use crate::error::AdapterError;
use crate::manifest::AdapterManifest;
use crate::masking::{mask_config, merge_config};

/// A masked config paired with its current runtime status, as returned by
/// `getCatalog()`.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CatalogEntry {
    /// The adapter's persisted config, with password fields masked.
    pub config: AdapterConfig,
    /// Current runtime status. Adapters unknown to the running set (not
    /// started, or stopped) report the default `disconnected` status.
    pub status: AdapterStatus,
}

/// Owns every configured adapter's persisted config and, for enabled
/// adapters, the running instance.
pub struct AdapterManager {
    data_dir: PathBuf,
    sink: Arc<dyn PublishSink>,
    manifests: RwLock<HashMap<String, AdapterManifest>>,
    factories: RwLock<HashMap<String, AdapterFactory>>,
    configs: RwLock<Vec<AdapterConfig>>,
    running: RwLock<HashMap<String, Arc<dyn Adapter>>>,
}

impl AdapterManager {
    /// A manager rooted at `data_dir`, publishing inbound events through
    /// `sink`. Call [`Self::register_manifest`] for each built-in adapter
    /// type before [`Self::initialize`].
    #[must_use]
    pub fn new(data_dir: PathBuf, sink: Arc<dyn PublishSink>) -> Self {
        Self {
            data_dir,
            sink,
            manifests: RwLock::new(HashMap::new()),
            factories: RwLock::new(HashMap::new()),
            configs: RwLock::new(Vec::new()),
            running: RwLock::new(HashMap::new()),
        }
    }

    /// Register a built-in adapter type's manifest and factory.
    pub async fn register_manifest(&self, manifest: AdapterManifest, factory: AdapterFactory) {
        let type_name = manifest.type_name.clone();
        self.manifests.write().await.insert(type_name.clone(), manifest);
        self.factories.write().await.insert(type_name, factory);
    }

    /// Load `adapters.json` (writing a default if absent) and start every
    /// enabled adapter, best-effort.
    pub async fn initialize(&self) -> Result<(), AdapterError> {
        std::fs::create_dir_all(&self.data_dir).map_err(|e| AdapterError::Io(e.to_string()))?;

        let path = self.data_dir.join("adapters.json");
        if !path.exists() {
            config::save(&self.data_dir, &config::default_adapters_file())?;
        }

        let file = config::load(&self.data_dir);
        *self.configs.write().await = file.adapters;

        let ids: Vec<String> = self
            .configs
            .read()
            .await
            .iter()
            .filter(|c| c.enabled)
            .map(|c| c.id.clone())
            .collect();
        for id in ids {
            if let Err(e) = self.start_adapter(&id).await {
                warn!(target: "relay.adapter", id, error = %e, "adapter failed to start during initialize, continuing");
            }
        }
        info!(target: "relay.adapter", count = self.configs.read().await.len(), "adapter manager initialized");
        Ok(())
    }

    fn persist(&self, configs: &[AdapterConfig]) -> Result<(), AdapterError> {
        config::save(
            &self.data_dir,
            &AdaptersFile {
                adapters: configs.to_vec(),
            },
        )
    }

    async fn build(&self, type_name: &str, cfg: &serde_json::Value) -> Result<Arc<dyn Adapter>, AdapterError> {
        let factories = self.factories.read().await;
        let factory = factories
            .get(type_name)
            .ok_or_else(|| AdapterError::UnknownType(type_name.to_string()))?;
        factory(cfg).map_err(|e| AdapterError::Runtime {
            id: type_name.to_string(),
            reason: e.to_string(),
        })
    }

    async fn start_adapter(&self, id: &str) -> Result<(), AdapterError> {
        let cfg = self
            .configs
            .read()
            .await
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| AdapterError::NotFound(id.to_string()))?;
        let adapter = self.build(&cfg.type_name, &cfg.config).await?;
        adapter
            .start(Arc::clone(&self.sink))
            .await
            .map_err(|e| AdapterError::Runtime {
                id: id.to_string(),
                reason: e.to_string(),
            })?;
        self.running.write().await.insert(id.to_string(), adapter);
        info!(target: "relay.adapter", id, "adapter started");
        Ok(())
    }

    async fn stop_adapter(&self, id: &str) {
        if let Some(adapter) = self.running.write().await.remove(id) {
            if let Err(e) = adapter.stop().await {
                warn!(target: "relay.adapter", id, error = %e, "adapter stop failed");
            }
            info!(target: "relay.adapter", id, "adapter stopped");
        }
    }

    /// Register and (if `enabled`) start a new adapter instance.
    pub async fn add_adapter(
        &self,
        type_name: &str,
        id: &str,
        config: serde_json::Value,
        enabled: bool,
    ) -> Result<(), AdapterError> {
        let mut configs = self.configs.write().await;
        if configs.iter().any(|c| c.id == id) {
            return Err(AdapterError::DuplicateId(id.to_string()));
        }

        let manifests = self.manifests.read().await;
        let manifest = manifests
            .get(type_name)
            .ok_or_else(|| AdapterError::UnknownType(type_name.to_string()))?;
        if !manifest.multi_instance && configs.iter().any(|c| c.type_name == type_name) {
            return Err(AdapterError::MultiInstanceDenied(type_name.to_string()));
        }
        drop(manifests);

        configs.push(AdapterConfig {
            id: id.to_string(),
            type_name: type_name.to_string(),
            enabled,
            builtin: false,
            config,
            plugin: None,
        });
        self.persist(&configs)?;
        drop(configs);

        if enabled {
            self.start_adapter(id).await?;
        }
        Ok(())
    }

    /// Stop and remove an adapter. Refuses to remove the built-in
    /// `claude-code` adapter.
    pub async fn remove_adapter(&self, id: &str) -> Result<(), AdapterError> {
        let mut configs = self.configs.write().await;
        let Some(pos) = configs.iter().position(|c| c.id == id) else {
            return Err(AdapterError::NotFound(id.to_string()));
        };
        if configs[pos].builtin && configs[pos].type_name == "claude-code" {
            return Err(AdapterError::RemoveBuiltinDenied(id.to_string()));
        }
        configs.remove(pos);
        self.persist(&configs)?;
        drop(configs);

        self.stop_adapter(id).await;
        Ok(())
    }

    /// Enable and start a previously disabled adapter.
    pub async fn enable(&self, id: &str) -> Result<(), AdapterError> {
        self.set_enabled(id, true).await?;
        self.start_adapter(id).await
    }

    /// Disable and stop a running adapter.
    pub async fn disable(&self, id: &str) -> Result<(), AdapterError> {
        self.set_enabled(id, false).await?;
        self.stop_adapter(id).await;
        Ok(())
    }

    async fn set_enabled(&self, id: &str, enabled: bool) -> Result<(), AdapterError> {
        let mut configs = self.configs.write().await;
        let cfg = configs
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| AdapterError::NotFound(id.to_string()))?;
        cfg.enabled = enabled;
        self.persist(&configs)
    }

    /// Merge `new_config` into the adapter's persisted config (preserving
    /// password fields per §4.8), then restart it if currently running.
    pub async fn update_config(&self, id: &str, new_config: serde_json::Value) -> Result<(), AdapterError> {
        let mut configs = self.configs.write().await;
        let cfg = configs
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or_else(|| AdapterError::NotFound(id.to_string()))?;
        let type_name = cfg.type_name.clone();
        let was_enabled = cfg.enabled;

        let manifests = self.manifests.read().await;
        let merged = match manifests.get(&type_name) {
            Some(manifest) => merge_config(manifest, &cfg.config, &new_config),
            None => new_config,
        };
        drop(manifests);
        cfg.config = merged;
        self.persist(&configs)?;
        drop(configs);

        if was_enabled {
            self.stop_adapter(id).await;
            self.start_adapter(id).await?;
        }
        Ok(())
    }

    /// Build a throwaway instance of `type_name` with `config` and probe
    /// connectivity, bounded by a 15s timeout. Always stops the instance.
    pub async fn test_connection(&self, type_name: &str, config: &serde_json::Value) -> Result<(), AdapterError> {
        let adapter = self.build(type_name, config).await?;
        let result = tokio::time::timeout(Duration::from_secs(15), adapter.test_connection(Arc::clone(&self.sink))).await;
        match result {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(AdapterError::Runtime {
                id: type_name.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(AdapterError::Runtime {
                id: type_name.to_string(),
                reason: "Connection test timed out".to_string(),
            }),
        }
    }

    /// Every configured adapter's id.
    pub async fn adapter_ids(&self) -> Vec<String> {
        self.configs.read().await.iter().map(|c| c.id.clone()).collect()
    }

    /// A single adapter's config, password fields masked.
    pub async fn get_adapter(&self, id: &str) -> Option<AdapterConfig> {
        let configs = self.configs.read().await;
        let cfg = configs.iter().find(|c| c.id == id)?;
        let manifests = self.manifests.read().await;
        Some(self.masked(cfg, &manifests))
    }

    /// Every adapter's config, password fields masked.
    pub async fn list_adapters(&self) -> Vec<AdapterConfig> {
        let configs = self.configs.read().await;
        let manifests = self.manifests.read().await;
        configs.iter().map(|c| self.masked(c, &manifests)).collect()
    }

    fn masked(&self, cfg: &AdapterConfig, manifests: &HashMap<String, AdapterManifest>) -> AdapterConfig {
        let mut out = cfg.clone();
        if let Some(manifest) = manifests.get(&cfg.type_name) {
            out.config = mask_config(manifest, &cfg.config);
        }
        out
    }

    /// Masked configs paired with current runtime status for every
    /// configured adapter.
    pub async fn get_catalog(&self) -> Vec<CatalogEntry> {
        let configs = self.configs.read().await;
        let manifests = self.manifests.read().await;
        let running = self.running.read().await;
        configs
            .iter()
            .map(|c| CatalogEntry {
                config: self.masked(c, &manifests),
                status: running.get(&c.id).map(|a| a.status()).unwrap_or_default(),
            })
            .collect()
    }

    /// Reconcile the running set against the current `adapters.json` on
    /// disk: stop adapters removed or disabled, start adapters newly
    /// enabled, leave everything else untouched. Intended to be called
    /// from a file watcher on `data_dir`.
    pub async fn reload(&self) -> Result<(), AdapterError> {
        let file = config::load(&self.data_dir);
        let previous: HashMap<String, AdapterConfig> = self
            .configs
            .read()
            .await
            .iter()
            .map(|c| (c.id.clone(), c.clone()))
            .collect();

        for (id, old) in &previous {
            let still_present = file.adapters.iter().any(|c| &c.id == id && c.enabled);
            if old.enabled && !still_present {
                self.stop_adapter(id).await;
            }
        }

        *self.configs.write().await = file.adapters.clone();

        for cfg in &file.adapters {
            let was_enabled = previous.get(&cfg.id).map(|c| c.enabled).unwrap_or(false);
            if cfg.enabled && !was_enabled {
                if let Err(e) = self.start_adapter(&cfg.id).await {
                    warn!(target: "relay.adapter", id = %cfg.id, error = %e, "adapter failed to start on hot-reload");
                }
            }
        }
        Ok(())
    }

    /// Root directory this manager persists `adapters.json` under, for a
    /// caller wiring up a filesystem watcher.
    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Every currently running adapter instance, paired with its
    /// configured id. Used by the daemon to subscribe each adapter's
    /// `outbound_pattern()` against the relay core after startup.
    pub async fn running_adapters(&self) -> Vec<(String, Arc<dyn Adapter>)> {
        self.running
            .read()
            .await
            .iter()
            .map(|(id, adapter)| (id.clone(), Arc::clone(adapter)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::ConfigField;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use tempfile::TempDir;

    struct NullSink;
    #[async_trait]
    impl PublishSink for NullSink {
        async fn publish(&self, _subject: &str, _payload: serde_json::Value, _from: &str) -> anyhow::Result<()> {
            Ok(())
        }
    }

    struct TestAdapter {
        started: Arc<AtomicBool>,
        start_count: Arc<AtomicU64>,
    }
    #[async_trait]
    impl Adapter for TestAdapter {
        async fn start(&self, _sink: Arc<dyn PublishSink>) -> anyhow::Result<()> {
            self.started.store(true, Ordering::SeqCst);
            self.start_count.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn stop(&self) -> anyhow::Result<()> {
            self.started.store(false, Ordering::SeqCst);
            Ok(())
        }
        fn status(&self) -> AdapterStatus {
            AdapterStatus {
                state: if self.started.load(Ordering::SeqCst) {
                    crate::adapter::AdapterState::Connected
                } else {
                    crate::adapter::AdapterState::Disconnected
                },
                ..Default::default()
            }
        }
    }

    async fn manager(dir: &Path) -> (AdapterManager, Arc<AtomicU64>) {
        let manager = AdapterManager::new(dir.to_path_buf(), Arc::new(NullSink));
        let start_count = Arc::new(AtomicU64::new(0));
        let start_count_clone = Arc::clone(&start_count);
        manager
            .register_manifest(
                AdapterManifest {
                    type_name: "test".to_string(),
                    display_name: "Test".to_string(),
                    builtin: false,
                    multi_instance: true,
                    config_fields: vec![ConfigField::password("secret")],
                },
                Arc::new(move |_cfg| {
                    Ok(Arc::new(TestAdapter {
                        started: Arc::new(AtomicBool::new(false)),
                        start_count: Arc::clone(&start_count_clone),
                    }) as Arc<dyn Adapter>)
                }),
            )
            .await;
        (manager, start_count)
    }

    #[tokio::test]
    async fn add_adapter_rejects_duplicate_id() {
        let dir = TempDir::new().unwrap();
        let (manager, _) = manager(dir.path()).await;
        manager.add_adapter("test", "a1", serde_json::json!({}), true).await.unwrap();
        let err = manager.add_adapter("test", "a1", serde_json::json!({}), true).await.unwrap_err();
        assert!(matches!(err, AdapterError::DuplicateId(_)));
    }

    #[tokio::test]
    async fn add_adapter_rejects_unknown_type() {
        let dir = TempDir::new().unwrap();
        let (manager, _) = manager(dir.path()).await;
        let err = manager.add_adapter("ghost", "a1", serde_json::json!({}), true).await.unwrap_err();
        assert!(matches!(err, AdapterError::UnknownType(_)));
    }

    #[tokio::test]
    async fn remove_builtin_claude_code_is_denied() {
        let dir = TempDir::new().unwrap();
        let (manager, _) = manager(dir.path()).await;
        manager.initialize().await.unwrap();
        let err = manager.remove_adapter("claude-code").await.unwrap_err();
        assert!(matches!(err, AdapterError::RemoveBuiltinDenied(_)));
    }

    #[tokio::test]
    async fn catalog_masks_password_field() {
        let dir = TempDir::new().unwrap();
        let (manager, _) = manager(dir.path()).await;
        manager
            .add_adapter("test", "a1", serde_json::json!({"secret": "hunter2"}), false)
            .await
            .unwrap();
        let catalog = manager.get_catalog().await;
        assert_eq!(catalog[0].config.config["secret"], "***");
    }

    #[tokio::test]
    async fn reload_starts_newly_enabled_adapter() {
        let dir = TempDir::new().unwrap();
        let (manager, start_count) = manager(dir.path()).await;
        manager.add_adapter("test", "a1", serde_json::json!({}), false).await.unwrap();
        assert_eq!(start_count.load(Ordering::SeqCst), 0);

        let mut file = config::load(dir.path());
        file.adapters.iter_mut().find(|c| c.id == "a1").unwrap().enabled = true;
        config::save(dir.path(), &file).unwrap();

        manager.reload().await.unwrap();
        assert_eq!(start_count.load(Ordering::SeqCst), 1);
    }
}
