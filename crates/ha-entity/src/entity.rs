//! Controllable entities
//!
//! An [`Entity`] is a remote device addressed by its entity id, with the
//! closed action set of its kind. Entities perform actions on demand and bind
//! rules into the shared [`StatRegistry`] so the evaluation loop can perform
//! them when a stat matches.

use async_trait::async_trait;
use chrono::Utc;
use ha_core::{EntityId, Rule, ServiceCall, StatValue};
use ha_stats::{ActionError, StatError, StatRegistry};
use serde_json::{Map, Value};
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::action::{CoverAction, EntityAction, LightAction, SwitchAction};
use crate::actuator::RemoteActuator;
use crate::error::{EntityError, EntityResult};
use crate::log::{LogEntry, OperationLog, Outcome};

/// Polymorphic interface over every entity kind
///
/// Actions are addressed by name here; names outside the kind's action set
/// are rejected with [`EntityError::UnknownAction`] before anything is sent.
#[async_trait]
pub trait Controllable: Send + Sync {
    fn entity_id(&self) -> &EntityId;

    /// Names of the actions this entity understands
    fn actions(&self) -> Vec<&'static str>;

    /// Perform an action now
    async fn perform(&self, action_name: &str) -> EntityResult<()> {
        self.perform_with(action_name, Map::new()).await
    }

    /// Perform an action now with extra service data
    async fn perform_with(&self, action_name: &str, data: Map<String, Value>)
        -> EntityResult<()>;

    /// Bind `action_name` to fire when `stat_name` samples to `value`
    fn register_rule(
        &self,
        stat_name: &str,
        value: StatValue,
        action_name: &str,
    ) -> EntityResult<()>;

    /// Bind several rules, all or none
    ///
    /// Every rule is checked (action name, stat registered) before the first
    /// one is bound.
    fn register_rules(&self, rules: &[Rule]) -> EntityResult<()>;

    /// Snapshot of the operation log
    fn operation_log(&self) -> Vec<LogEntry>;
}

/// A controllable entity of kind `A`
pub struct Entity<A: EntityAction> {
    entity_id: EntityId,
    actuator: Arc<dyn RemoteActuator>,
    registry: Arc<StatRegistry>,
    log: OperationLog,
    _kind: PhantomData<fn() -> A>,
}

pub type SwitchEntity = Entity<SwitchAction>;
pub type LightEntity = Entity<LightAction>;
pub type CoverEntity = Entity<CoverAction>;

impl<A: EntityAction> Entity<A> {
    /// Create an entity; its id must belong to the kind's domain
    pub fn new(
        entity_id: EntityId,
        actuator: Arc<dyn RemoteActuator>,
        registry: Arc<StatRegistry>,
    ) -> EntityResult<Self> {
        if entity_id.domain() != A::DOMAIN {
            return Err(EntityError::DomainMismatch {
                entity_id,
                expected: A::DOMAIN,
            });
        }

        Ok(Self {
            entity_id,
            actuator,
            registry,
            log: OperationLog::new(),
            _kind: PhantomData,
        })
    }

    /// Perform a typed action now
    pub async fn perform_action_with(
        &self,
        action: A,
        data: Map<String, Value>,
    ) -> EntityResult<()> {
        execute(
            &self.entity_id,
            self.actuator.as_ref(),
            &self.log,
            action,
            data,
        )
        .await
    }

    /// Bind a typed action to a stat condition
    ///
    /// The bound closure captures the entity id, actuator and log, not the
    /// entity itself.
    pub fn bind_action(
        &self,
        stat_name: &str,
        value: impl Into<StatValue>,
        action: A,
    ) -> EntityResult<()> {
        let entity_id = self.entity_id.clone();
        let actuator = self.actuator.clone();
        let log = self.log.clone();
        let label = format!("{}:{}", self.entity_id, action.service());

        self.registry
            .bind_named(stat_name, value, label, move || {
                let entity_id = entity_id.clone();
                let actuator = actuator.clone();
                let log = log.clone();
                async move {
                    execute(&entity_id, actuator.as_ref(), &log, action, Map::new())
                        .await
                        .map_err(|e| ActionError::new(e.to_string()))
                }
            })
            .map_err(EntityError::from)
    }

    /// Shared handle to this entity's log
    pub fn log(&self) -> &OperationLog {
        &self.log
    }
}

#[async_trait]
impl<A: EntityAction> Controllable for Entity<A> {
    fn entity_id(&self) -> &EntityId {
        &self.entity_id
    }

    fn actions(&self) -> Vec<&'static str> {
        A::names()
    }

    async fn perform_with(
        &self,
        action_name: &str,
        data: Map<String, Value>,
    ) -> EntityResult<()> {
        let action = A::parse(action_name)?;
        self.perform_action_with(action, data).await
    }

    fn register_rule(
        &self,
        stat_name: &str,
        value: StatValue,
        action_name: &str,
    ) -> EntityResult<()> {
        let action = A::parse(action_name)?;
        self.bind_action(stat_name, value, action)?;
        debug!(
            entity_id = %self.entity_id,
            stat = stat_name,
            action = action_name,
            "Registered rule"
        );
        Ok(())
    }

    fn register_rules(&self, rules: &[Rule]) -> EntityResult<()> {
        let mut checked = Vec::with_capacity(rules.len());
        for rule in rules {
            let action = A::parse(&rule.action)?;
            if !self.registry.has_stat(&rule.stat_name) {
                return Err(StatError::UnknownStat(rule.stat_name.clone()).into());
            }
            checked.push((rule, action));
        }

        for (rule, action) in checked {
            self.bind_action(&rule.stat_name, rule.value.clone(), action)?;
        }

        debug!(entity_id = %self.entity_id, count = rules.len(), "Registered rules");
        Ok(())
    }

    fn operation_log(&self) -> Vec<LogEntry> {
        self.log.entries()
    }
}

/// A log entry written before its remote call and resolved afterwards
///
/// Dropping it unresolved, as happens when the caller's timeout fires, marks
/// the entry cancelled.
struct PendingEntry<'a> {
    log: &'a OperationLog,
    index: usize,
    resolved: bool,
}

impl<'a> PendingEntry<'a> {
    fn open(log: &'a OperationLog, entity_id: &EntityId, service: &str) -> Self {
        let index = log.append(LogEntry {
            action: service.to_string(),
            entity_id: entity_id.clone(),
            timestamp: Utc::now(),
            outcome: Outcome::Pending,
        });
        Self {
            log,
            index,
            resolved: false,
        }
    }

    fn resolve(mut self, outcome: Outcome) {
        self.log.resolve(self.index, outcome);
        self.resolved = true;
    }
}

impl Drop for PendingEntry<'_> {
    fn drop(&mut self) {
        if !self.resolved {
            self.log.resolve(self.index, Outcome::Cancelled);
        }
    }
}

/// Send one service call and log it
async fn execute<A: EntityAction>(
    entity_id: &EntityId,
    actuator: &dyn RemoteActuator,
    log: &OperationLog,
    action: A,
    data: Map<String, Value>,
) -> EntityResult<()> {
    let call = ServiceCall::new(A::DOMAIN, action.service(), entity_id.clone()).with_data(data);
    let entry = PendingEntry::open(log, entity_id, action.service());
    let result = actuator.invoke(&call).await;

    entry.resolve(match &result {
        Ok(()) => Outcome::Succeeded,
        Err(e) => Outcome::Failed(e.to_string()),
    });

    match result {
        Ok(()) => {
            info!(entity_id = %entity_id, service = %call.service_id(), "Called service");
            Ok(())
        }
        Err(source) => {
            warn!(
                entity_id = %entity_id,
                service = %call.service_id(),
                error = %source,
                "Service call failed"
            );
            Err(EntityError::RemoteCallFailure {
                entity_id: entity_id.clone(),
                service: call.service_id(),
                source,
            })
        }
    }
}

/// Build the entity kind matching the entity id's domain
pub fn build_entity(
    entity_id: EntityId,
    actuator: Arc<dyn RemoteActuator>,
    registry: Arc<StatRegistry>,
) -> EntityResult<Arc<dyn Controllable>> {
    let domain = entity_id.domain().to_string();
    let entity: Arc<dyn Controllable> = if domain == SwitchAction::DOMAIN {
        Arc::new(SwitchEntity::new(entity_id, actuator, registry)?)
    } else if domain == LightAction::DOMAIN {
        Arc::new(LightEntity::new(entity_id, actuator, registry)?)
    } else if domain == CoverAction::DOMAIN {
        Arc::new(CoverEntity::new(entity_id, actuator, registry)?)
    } else {
        return Err(EntityError::UnsupportedDomain(domain));
    };
    Ok(entity)
}
