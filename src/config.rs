use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use spawnsync_core::{ItemDefinition, ItemTypeId, ItemTypeRegistry, RegistryKey};
use spawnsync_net::RetryPolicy;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::warn;

pub const DEFAULT_CONFIG_PATH: &str = "config/spawnsync.toml";

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Tracing filter used when `RUST_LOG` is unset.
    pub log_filter: String,
    /// Observers that join the session late.
    pub observers: u32,
    pub seed: u64,
    /// Simulation steps after the initial spawn.
    pub ticks: u32,
    pub tick_seconds: f32,
    /// Re-request policy for observers; none by default.
    pub retry: Option<RetryPolicy>,
    /// Item types. The built-in set is used when empty.
    pub items: Vec<ItemDefinition>,
    /// Where to write the JSONL event log, if anywhere.
    pub event_log: Option<PathBuf>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            observers: 2,
            seed: 0,
            ticks: 60,
            tick_seconds: 0.05,
            retry: None,
            items: Vec::new(),
            event_log: None,
        }
    }
}

impl SyncConfig {
    /// Read and parse `path`, failing on any error.
    pub fn read(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
    }

    /// Load configuration from `path`, falling back to defaults on errors.
    pub fn load_from_path(path: &Path) -> Self {
        match Self::read(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                warn!("{err:#}. Using defaults");
                Self::default()
            }
        }
    }

    /// Item registry from `items`, or the built-in set.
    pub fn item_registry(&self) -> Result<ItemTypeRegistry> {
        let definitions = if self.items.is_empty() {
            builtin_items()?
        } else {
            self.items.clone()
        };
        ItemTypeRegistry::new(definitions).context("building item registry")
    }
}

fn builtin_items() -> Result<Vec<ItemDefinition>> {
    [("arrow", 64), ("bandage", 16), ("mana_potion", 8), ("gold_coin", 99)]
        .into_iter()
        .enumerate()
        .map(|(i, (key, max_stack))| {
            Ok(ItemDefinition {
                id: ItemTypeId(i as u32 + 1),
                key: RegistryKey::parse(key)?,
                max_stack,
            })
        })
        .collect()
}
