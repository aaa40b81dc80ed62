//! The home manager
//!
//! Owns the stat registry, the entities built from the rules file and the
//! evaluation loop that drives them.

use ha_config::{EntityRules, RulesFile, SkippedEntry};
use ha_core::{EntityId, TIME_STAT};
use ha_entity::{build_entity, Controllable, EntityResult, RemoteActuator};
use ha_stats::{time_of_day, Clock, EvaluationLoop, LocalClock, StatRegistry, StatResult};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Timing knobs for the manager
#[derive(Debug, Clone, Copy)]
pub struct ManagerSettings {
    pub interval: Duration,
    pub action_timeout: Duration,
}

/// Which rules file entries became entities
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub loaded: Vec<EntityId>,
    pub skipped: Vec<SkippedEntry>,
}

pub struct HomeManager {
    registry: Arc<StatRegistry>,
    actuator: Arc<dyn RemoteActuator>,
    entities: Vec<Arc<dyn Controllable>>,
    evaluation: EvaluationLoop,
}

impl HomeManager {
    /// Create a manager whose `time` stat reads the local clock
    pub fn new(actuator: Arc<dyn RemoteActuator>, settings: ManagerSettings) -> StatResult<Self> {
        Self::with_clock(actuator, settings, LocalClock)
    }

    pub fn with_clock<C>(
        actuator: Arc<dyn RemoteActuator>,
        settings: ManagerSettings,
        clock: C,
    ) -> StatResult<Self>
    where
        C: Clock + 'static,
    {
        let registry = Arc::new(StatRegistry::with_action_timeout(settings.action_timeout));
        registry.register_stat(TIME_STAT, time_of_day(clock))?;

        let evaluation = EvaluationLoop::new(registry.clone(), settings.interval)?;

        Ok(Self {
            registry,
            actuator,
            entities: Vec::new(),
            evaluation,
        })
    }

    pub fn registry(&self) -> &Arc<StatRegistry> {
        &self.registry
    }

    pub fn entities(&self) -> &[Arc<dyn Controllable>] {
        &self.entities
    }

    pub fn entity(&self, entity_id: &str) -> Option<&Arc<dyn Controllable>> {
        self.entities
            .iter()
            .find(|e| e.entity_id().to_string() == entity_id)
    }

    /// Build one entity and register its rules
    ///
    /// Nothing is added if any rule is rejected.
    pub fn add_entity(&mut self, entry: &EntityRules) -> EntityResult<()> {
        let entity = build_entity(
            entry.entity_id.clone(),
            self.actuator.clone(),
            self.registry.clone(),
        )?;

        let mut seen = HashSet::new();
        for rule in &entry.rules {
            if !seen.insert(rule.stat_name.as_str()) || self.registry.is_bound(&rule.stat_name) {
                warn!(
                    entity_id = %entry.entity_id,
                    stat = %rule.stat_name,
                    action = %rule.action,
                    "Rule replaces the existing binding for this stat"
                );
            }
        }

        entity.register_rules(&entry.rules)?;
        info!(
            entity_id = %entry.entity_id,
            rules = entry.rules.len(),
            "Entity added"
        );
        self.entities.push(entity);
        Ok(())
    }

    /// Add every entity of a rules file, skipping the ones that fail
    ///
    /// With `known` set, entities missing from it are skipped too.
    pub fn load_rules(&mut self, rules: RulesFile, known: Option<&HashSet<String>>) -> LoadReport {
        let mut report = LoadReport {
            loaded: Vec::new(),
            skipped: rules.skipped,
        };

        for entry in &rules.entities {
            let key = entry.entity_id.to_string();

            if let Some(known) = known {
                if !known.contains(&key) {
                    warn!(entity_id = %key, "Entity not known to Home Assistant, skipping");
                    report.skipped.push(SkippedEntry {
                        key,
                        reason: "entity not known to Home Assistant".to_string(),
                    });
                    continue;
                }
            }

            match self.add_entity(entry) {
                Ok(()) => report.loaded.push(entry.entity_id.clone()),
                Err(e) => {
                    warn!(entity_id = %key, error = %e, "Skipping entity");
                    report.skipped.push(SkippedEntry {
                        key,
                        reason: e.to_string(),
                    });
                }
            }
        }

        debug!(
            loaded = report.loaded.len(),
            skipped = report.skipped.len(),
            bindings = self.registry.binding_count(),
            "Rules loaded"
        );
        report
    }

    pub fn evaluation_loop(&self) -> &EvaluationLoop {
        &self.evaluation
    }

    /// Spawn the evaluation loop; `None` if it is already running
    pub fn start(&self) -> Option<JoinHandle<()>> {
        info!(
            entities = self.entities.len(),
            interval = ?self.evaluation.interval(),
            "Starting home manager"
        );
        self.evaluation.start()
    }

    pub fn stop(&self) {
        self.evaluation.stop();
    }
}
