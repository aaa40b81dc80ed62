//! Process assembly for the stat rules engine
//!
//! Wires the configuration, the Home Assistant client, the entities and the
//! evaluation loop together. The `ha-rules` binary is a thin shell around
//! [`assemble`].

mod manager;

pub use manager::{HomeManager, LoadReport, ManagerSettings};

use anyhow::{Context, Result};
use ha_client::HaClient;
use ha_config::{load_rules, ServerConfig};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// Build a ready-to-run manager from a loaded server configuration
///
/// A missing or unparseable rules file is fatal; individual entries that
/// cannot be used are skipped and listed in the report.
pub async fn assemble(config: &ServerConfig) -> Result<(HomeManager, LoadReport)> {
    let client = Arc::new(
        HaClient::new(
            &config.homeassistant.url,
            &config.homeassistant.token,
            config.action_timeout(),
        )
        .context("failed to create Home Assistant client")?,
    );

    let rules_path = config.rules_path();
    let rules = load_rules(&rules_path)
        .with_context(|| format!("failed to load rules from {}", rules_path.display()))?;

    let known = if config.verify_entities {
        let states = client
            .states()
            .await
            .context("failed to fetch entity states from Home Assistant")?;

        for state in states.iter().filter(|s| !s.is_available()) {
            warn!(entity_id = %state.entity_id, "Entity is currently unavailable");
        }
        Some(
            states
                .into_iter()
                .map(|s| s.entity_id)
                .collect::<HashSet<_>>(),
        )
    } else {
        None
    };

    let settings = ManagerSettings {
        interval: config.interval(),
        action_timeout: config.action_timeout(),
    };
    let mut manager =
        HomeManager::new(client, settings).context("invalid evaluation settings")?;
    let report = manager.load_rules(rules, known.as_ref());

    info!(
        loaded = report.loaded.len(),
        skipped = report.skipped.len(),
        "Home manager assembled"
    );
    Ok((manager, report))
}
