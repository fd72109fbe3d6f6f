//! Configuration file watcher for access-policy hot reload.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};

use crate::config::loader::{load, ConfigError, ConfigOverrides, EnvSnapshot};
use crate::security::{AccessPolicy, PolicyStore};

/// Watches the config file and swaps in a new access policy on change.
pub struct PolicyWatcher {
    path: PathBuf,
    env: EnvSnapshot,
    overrides: ConfigOverrides,
    store: Arc<PolicyStore>,
}

impl PolicyWatcher {
    pub fn new(
        path: &Path,
        env: EnvSnapshot,
        overrides: ConfigOverrides,
        store: Arc<PolicyStore>,
    ) -> Self {
        Self {
            path: path.to_path_buf(),
            env,
            overrides,
            store,
        }
    }

    /// Reload once. On error the current policy stays in place.
    pub fn reload(&self) -> Result<(), ConfigError> {
        reload_into(&self.path, &self.env, &self.overrides, &self.store)
    }

    /// Start watching. The returned watcher must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let path = self.path.clone();
        let env = self.env;
        let overrides = self.overrides;
        let store = self.store;

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    if event.kind.is_modify() || event.kind.is_create() {
                        tracing::info!("Config file change detected, reloading access policy");
                        if let Err(e) = reload_into(&path, &env, &overrides, &store) {
                            tracing::error!(
                                "Failed to reload config: {}. Keeping current access policy.",
                                e
                            );
                        }
                    }
                }
                Err(e) => tracing::error!("Watch error: {:?}", e),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&self.path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?self.path, "Config watcher started");
        Ok(watcher)
    }
}

fn reload_into(
    path: &Path,
    env: &EnvSnapshot,
    overrides: &ConfigOverrides,
    store: &PolicyStore,
) -> Result<(), ConfigError> {
    let config = load(Some(path), env, overrides)?;
    store.replace(AccessPolicy::from_config(&config.cors));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CorsConfig;

    fn watcher_for(path: &Path, store: Arc<PolicyStore>) -> PolicyWatcher {
        PolicyWatcher::new(path, EnvSnapshot::default(), ConfigOverrides::default(), store)
    }

    #[test]
    fn reload_swaps_policy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transport.toml");
        std::fs::write(
            &path,
            "[cors]\nallowed_origins = [\"https://app.example.com\"]\n",
        )
        .unwrap();

        let store = Arc::new(PolicyStore::new(AccessPolicy::from_config(&CorsConfig::default())));
        watcher_for(&path, Arc::clone(&store)).reload().unwrap();

        let policy = store.load();
        assert!(policy.matching_pattern("https://app.example.com").is_some());
    }

    #[test]
    fn failed_reload_keeps_current_policy() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transport.toml");
        std::fs::write(&path, "[cors\nbroken").unwrap();

        let mut cors = CorsConfig::default();
        cors.allowed_origins = vec!["https://keep.example.com".into()];
        let store = Arc::new(PolicyStore::new(AccessPolicy::from_config(&cors)));

        assert!(watcher_for(&path, Arc::clone(&store)).reload().is_err());
        assert!(store.load().matching_pattern("https://keep.example.com").is_some());
    }
}
