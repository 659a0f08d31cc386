//! Application state: challenge catalog, tracker settings, and the store handle.
//!
//! This module owns:
//!   - the challenge catalog (TOML entries merged over built-in seeds)
//!   - the tracker settings (cooldown, commit retries, signup grant)
//!   - the store handle the lifecycle controller commits against
//!
//! State is explicitly constructed in main and passed by Arc to handlers;
//! there are no process-wide singletons.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::config::{load_catalog_from_env, TrackerSettings};
use crate::domain::{ChallengeConfig, UserRecord};
use crate::seeds::seed_catalog;
use crate::store::{ChallengeStore, MemoryStore};

#[derive(Clone)]
pub struct AppState {
    pub catalog: Arc<HashMap<String, ChallengeConfig>>,
    pub settings: TrackerSettings,
    pub store: Arc<dyn ChallengeStore>,
}

impl AppState {
    /// Build state from env: load the TOML catalog, merge over built-in
    /// seeds, and wire the in-memory store.
    #[instrument(level = "info", skip_all)]
    pub fn new() -> Self {
        let cfg_opt = load_catalog_from_env();
        let settings = cfg_opt.as_ref().map(|c| c.settings.clone()).unwrap_or_default();

        let mut catalog = HashMap::<String, ChallengeConfig>::new();
        if let Some(cfg) = &cfg_opt {
            for cc in &cfg.challenges {
                let c = cc.clone().into_domain();
                if c.daily_goals.is_empty() {
                    warn!(target: "challenge", id = %c.id, "Catalog entry has no daily goals; every day will trivially pass");
                }
                catalog.insert(c.id.clone(), c);
            }
        }

        // Built-in seeds never overwrite catalog entries with the same id.
        for c in seed_catalog() {
            catalog.entry(c.id.clone()).or_insert(c);
        }

        let locked = catalog.values().filter(|c| c.locked).count();
        info!(
            target: "challenge",
            total = catalog.len(),
            locked,
            cooldown_days = settings.cooldown_days,
            "Startup challenge catalog"
        );

        Self {
            catalog: Arc::new(catalog),
            settings,
            store: Arc::new(MemoryStore::new()),
        }
    }

    /// Same state wired to a caller-supplied store (remote-backed
    /// deployments, or tests that want to inject failures).
    pub fn with_store(store: Arc<dyn ChallengeStore>) -> Self {
        let mut state = Self::new();
        state.store = store;
        state
    }

    /// Look up a challenge config by id.
    pub fn config(&self, id: &str) -> Option<&ChallengeConfig> {
        self.catalog.get(id)
    }

    /// Catalog entries in a stable order for listing endpoints.
    pub fn catalog_sorted(&self) -> Vec<ChallengeConfig> {
        let mut all: Vec<ChallengeConfig> = self.catalog.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        all
    }

    /// Fresh record for a first-seen user, carrying the configured signup grant.
    pub fn new_user_record(&self) -> UserRecord {
        UserRecord { balance: self.settings.starting_balance, ..UserRecord::default() }
    }
}
