//! Stat registry: named producers, condition/action bindings, evaluation
//!
//! The registry owns two maps. Stats map a name to a producer that samples
//! the current value. Bindings map a stat name to one condition value and the
//! action to run when the sampled value equals that condition.

use dashmap::DashMap;
use futures::future::join_all;
use futures::FutureExt;
use ha_core::StatValue;
use std::any::Any;
use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, error, info, instrument, trace, warn};

use crate::error::{ActionError, ProducerError, StatError, StatResult};

/// Result of sampling a stat
pub type ProducerResult = Result<StatValue, ProducerError>;

/// Stat producer function type
pub type Producer = Arc<dyn Fn() -> ProducerResult + Send + Sync>;

/// Result of running a bound action
pub type ActionResult = Result<(), ActionError>;

/// Future type for bound actions
pub type ActionFuture = Pin<Box<dyn Future<Output = ActionResult> + Send>>;

/// Bound action function type
pub type Action = Arc<dyn Fn() -> ActionFuture + Send + Sync>;

/// Default upper bound for a single action invocation
pub const DEFAULT_ACTION_TIMEOUT: Duration = Duration::from_secs(10);

/// Label used for actions bound without a name
const ANONYMOUS_ACTION: &str = "action";

/// A condition value and the action it triggers
///
/// Stored behind an `Arc` and replaced as a whole, so an evaluation pass sees
/// either the old binding or the new one, never a mix.
struct Binding {
    condition: StatValue,
    label: String,
    action: Action,
}

/// Outcome of one evaluation pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EvaluationSummary {
    /// Bindings looked at during the pass
    pub evaluated: usize,
    /// Actions invoked because their condition matched
    pub fired: usize,
    /// Per-binding failures; none of them interrupted the pass
    pub failures: Vec<StatError>,
}

impl EvaluationSummary {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

struct BindingOutcome {
    fired: bool,
    failure: Option<StatError>,
}

enum ActionRun {
    Completed,
    Failed(String),
    TimedOut,
}

/// The stat registry
///
/// One registry is created by the process and shared (`Arc<StatRegistry>`)
/// between the entities that bind rules and the loop that evaluates them.
/// Registration is safe while an evaluation pass is running.
pub struct StatRegistry {
    stats: DashMap<String, Producer>,
    bindings: DashMap<String, Arc<Binding>>,
    action_timeout: Duration,
}

impl StatRegistry {
    pub fn new() -> Self {
        Self::with_action_timeout(DEFAULT_ACTION_TIMEOUT)
    }

    /// Create a registry that cuts off actions running longer than `action_timeout`
    pub fn with_action_timeout(action_timeout: Duration) -> Self {
        Self {
            stats: DashMap::new(),
            bindings: DashMap::new(),
            action_timeout,
        }
    }

    pub fn action_timeout(&self) -> Duration {
        self.action_timeout
    }

    /// Register or replace the producer for a stat
    ///
    /// Existing bindings for `name` are kept and will sample the new producer.
    pub fn register_stat<F>(&self, name: impl Into<String>, producer: F) -> StatResult<()>
    where
        F: Fn() -> ProducerResult + Send + Sync + 'static,
    {
        let name = validate_name(name.into())?;
        let replaced = self.stats.insert(name.clone(), Arc::new(producer)).is_some();
        debug!(stat = %name, replaced, "Registered stat");
        Ok(())
    }

    /// Bind an action to fire when `name` samples to `condition`
    pub fn bind<F, Fut>(
        &self,
        name: impl Into<String>,
        condition: impl Into<StatValue>,
        action: F,
    ) -> StatResult<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ActionResult> + Send + 'static,
    {
        self.bind_named(name, condition, ANONYMOUS_ACTION, action)
    }

    /// Like [`StatRegistry::bind`], with a label that identifies the action in logs
    ///
    /// A previous binding for the same stat is replaced.
    pub fn bind_named<F, Fut>(
        &self,
        name: impl Into<String>,
        condition: impl Into<StatValue>,
        label: impl Into<String>,
        action: F,
    ) -> StatResult<()>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ActionResult> + Send + 'static,
    {
        let name = validate_name(name.into())?;
        if !self.stats.contains_key(&name) {
            warn!(stat = %name, "Cannot bind action to unregistered stat");
            return Err(StatError::UnknownStat(name));
        }

        let action: Action = Arc::new(move || Box::pin(action()) as ActionFuture);
        let binding = Arc::new(Binding {
            condition: condition.into(),
            label: label.into(),
            action,
        });

        debug!(
            stat = %name,
            condition = %binding.condition,
            action = %binding.label,
            "Binding action to stat"
        );

        if let Some(previous) = self.bindings.insert(name.clone(), binding) {
            debug!(stat = %name, previous = %previous.label, "Replaced existing binding");
        }
        Ok(())
    }

    /// Remove the binding for a stat, returning whether one existed
    pub fn unbind(&self, name: &str) -> bool {
        let removed = self.bindings.remove(name).is_some();
        if removed {
            debug!(stat = %name, "Removed binding");
        }
        removed
    }

    pub fn has_stat(&self, name: &str) -> bool {
        self.stats.contains_key(name)
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Registered stat names, sorted
    pub fn stat_names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.stats.iter().map(|s| s.key().clone()).collect();
        names.sort();
        names
    }

    pub fn binding_count(&self) -> usize {
        self.bindings.len()
    }

    /// The condition value currently bound to a stat
    pub fn condition(&self, name: &str) -> Option<StatValue> {
        self.bindings.get(name).map(|b| b.condition.clone())
    }

    /// Sample one stat now
    #[instrument(skip(self))]
    pub fn read_stat(&self, name: &str) -> StatResult<StatValue> {
        // Clone the producer out so no map guard is held while it runs
        let producer = self
            .stats
            .get(name)
            .map(|p| p.value().clone())
            .ok_or_else(|| StatError::UnknownStat(name.to_string()))?;

        match catch_unwind(AssertUnwindSafe(|| producer())) {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(StatError::ProducerFailure {
                stat: name.to_string(),
                reason: e.to_string(),
            }),
            Err(panic) => Err(StatError::ProducerFailure {
                stat: name.to_string(),
                reason: panic_message(panic.as_ref()),
            }),
        }
    }

    /// Run one evaluation pass over every binding
    ///
    /// Each binding samples its stat and, on an exact match, runs its action
    /// once. Bindings are evaluated concurrently and in no particular order. A
    /// failure in one binding is logged and recorded in the summary; it never
    /// stops the others.
    #[instrument(skip(self))]
    pub async fn evaluate_all(&self) -> EvaluationSummary {
        let snapshot: Vec<(String, Arc<Binding>)> = self
            .bindings
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();

        let evaluated = snapshot.len();
        let outcomes = join_all(
            snapshot
                .into_iter()
                .map(|(stat, binding)| self.evaluate_binding(stat, binding)),
        )
        .await;

        let mut summary = EvaluationSummary {
            evaluated,
            ..Default::default()
        };
        for outcome in outcomes {
            if outcome.fired {
                summary.fired += 1;
            }
            if let Some(failure) = outcome.failure {
                summary.failures.push(failure);
            }
        }

        trace!(
            evaluated = summary.evaluated,
            fired = summary.fired,
            failed = summary.failures.len(),
            "Evaluation pass complete"
        );
        summary
    }

    async fn evaluate_binding(&self, stat: String, binding: Arc<Binding>) -> BindingOutcome {
        let value = match self.read_stat(&stat) {
            Ok(value) => value,
            Err(e) => {
                warn!(stat = %stat, error = %e, "Skipping binding, stat could not be read");
                return BindingOutcome {
                    fired: false,
                    failure: Some(e),
                };
            }
        };

        if value != binding.condition {
            trace!(stat = %stat, value = %value, condition = %binding.condition, "Condition not met");
            return BindingOutcome {
                fired: false,
                failure: None,
            };
        }

        info!(
            stat = %stat,
            value = %value,
            action = %binding.label,
            "Condition met, executing action"
        );

        let failure = match self.run_action(&binding).await {
            ActionRun::Completed => None,
            ActionRun::Failed(reason) => {
                error!(stat = %stat, action = %binding.label, error = %reason, "Action failed");
                Some(StatError::ActionFailure {
                    stat,
                    action: binding.label.clone(),
                    reason,
                })
            }
            ActionRun::TimedOut => {
                error!(
                    stat = %stat,
                    action = %binding.label,
                    timeout = ?self.action_timeout,
                    "Action timed out"
                );
                Some(StatError::ActionTimeout {
                    stat,
                    action: binding.label.clone(),
                    timeout: self.action_timeout,
                })
            }
        };

        BindingOutcome {
            fired: true,
            failure,
        }
    }

    /// Invoke an action under the timeout, turning panics into failures
    async fn run_action(&self, binding: &Binding) -> ActionRun {
        let future = match catch_unwind(AssertUnwindSafe(|| (binding.action)())) {
            Ok(future) => future,
            Err(panic) => return ActionRun::Failed(panic_message(panic.as_ref())),
        };

        match timeout(self.action_timeout, AssertUnwindSafe(future).catch_unwind()).await {
            Ok(Ok(Ok(()))) => ActionRun::Completed,
            Ok(Ok(Err(e))) => ActionRun::Failed(e.to_string()),
            Ok(Err(panic)) => ActionRun::Failed(panic_message(panic.as_ref())),
            Err(_) => ActionRun::TimedOut,
        }
    }
}

impl Default for StatRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Shared handle to the registry
pub type SharedStatRegistry = Arc<StatRegistry>;

fn validate_name(name: String) -> StatResult<String> {
    if name.trim().is_empty() {
        return Err(StatError::InvalidArgument(
            "stat name must not be empty".to_string(),
        ));
    }
    Ok(name)
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = panic.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::{ready, Ready};
    use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};

    fn constant(value: impl Into<StatValue>) -> impl Fn() -> ProducerResult + Send + Sync {
        let value = value.into();
        move || Ok(value.clone())
    }

    fn counting(counter: &Arc<AtomicUsize>) -> impl Fn() -> Ready<ActionResult> + Send + Sync {
        let counter = counter.clone();
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
            ready(Ok(()))
        }
    }

    #[test]
    fn test_register_and_read_stat() {
        let registry = StatRegistry::new();
        registry.register_stat("time", constant(905)).unwrap();

        assert!(registry.has_stat("time"));
        assert_eq!(registry.read_stat("time").unwrap(), StatValue::Int(905));
        assert_eq!(registry.stat_names(), vec!["time".to_string()]);
    }

    #[test]
    fn test_reregister_last_wins_and_keeps_binding() {
        let registry = StatRegistry::new();
        registry.register_stat("mode", constant("home")).unwrap();
        registry
            .bind("mode", "away", || ready(Ok(())))
            .unwrap();

        registry.register_stat("mode", constant("away")).unwrap();

        assert_eq!(registry.read_stat("mode").unwrap(), StatValue::from("away"));
        assert!(registry.is_bound("mode"));
    }

    #[test]
    fn test_empty_name_is_invalid() {
        let registry = StatRegistry::new();
        assert!(matches!(
            registry.register_stat("  ", constant(1)),
            Err(StatError::InvalidArgument(_))
        ));
        assert!(matches!(
            registry.bind("", 1, || ready(Ok(()))),
            Err(StatError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_bind_unknown_stat_has_no_effect() {
        let registry = StatRegistry::new();
        registry.register_stat("time", constant(905)).unwrap();

        let result = registry.bind("temperature", 20, || ready(Ok(())));

        assert_eq!(
            result,
            Err(StatError::UnknownStat("temperature".to_string()))
        );
        assert_eq!(registry.binding_count(), 0);
        assert!(!registry.is_bound("temperature"));
    }

    #[tokio::test]
    async fn test_fires_once_per_pass_on_match() {
        let registry = StatRegistry::new();
        let fired = Arc::new(AtomicUsize::new(0));
        registry.register_stat("time", constant(905)).unwrap();
        registry.bind("time", 905, counting(&fired)).unwrap();

        let summary = registry.evaluate_all().await;
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(summary.evaluated, 1);
        assert_eq!(summary.fired, 1);
        assert!(summary.is_clean());

        registry.evaluate_all().await;
        assert_eq!(fired.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_no_fire_on_mismatch() {
        let registry = StatRegistry::new();
        let fired = Arc::new(AtomicUsize::new(0));
        registry.register_stat("time", constant(906)).unwrap();
        registry.bind("time", 905, counting(&fired)).unwrap();

        let summary = tokio_test::block_on(registry.evaluate_all());
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(summary.fired, 0);
        assert_eq!(summary.evaluated, 1);
    }

    #[tokio::test]
    async fn test_variant_mismatch_does_not_fire() {
        let registry = StatRegistry::new();
        let fired = Arc::new(AtomicUsize::new(0));
        registry.register_stat("time", constant(905)).unwrap();
        registry.bind("time", "905", counting(&fired)).unwrap();

        registry.evaluate_all().await;
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rebind_replaces_previous_binding() {
        let registry = StatRegistry::new();
        let old = Arc::new(AtomicUsize::new(0));
        let new = Arc::new(AtomicUsize::new(0));
        registry.register_stat("time", constant(1200)).unwrap();

        registry.bind("time", 1200, counting(&old)).unwrap();
        registry.bind("time", 1200, counting(&new)).unwrap();
        assert_eq!(registry.binding_count(), 1);

        registry.evaluate_all().await;
        assert_eq!(old.load(Ordering::SeqCst), 0);
        assert_eq!(new.load(Ordering::SeqCst), 1);

        // New condition no longer matches; neither action fires
        registry.bind("time", 1300, counting(&old)).unwrap();
        registry.evaluate_all().await;
        assert_eq!(old.load(Ordering::SeqCst), 0);
        assert_eq!(new.load(Ordering::SeqCst), 1);
        assert_eq!(registry.condition("time"), Some(StatValue::Int(1300)));
    }

    #[tokio::test]
    async fn test_failing_producer_is_isolated() {
        let registry = StatRegistry::new();
        let fired = Arc::new(AtomicUsize::new(0));

        registry
            .register_stat("broken", || Err(ProducerError::new("sensor offline")))
            .unwrap();
        registry.register_stat("time", constant(905)).unwrap();
        registry.bind("broken", 1, counting(&fired)).unwrap();
        registry.bind("time", 905, counting(&fired)).unwrap();

        let summary = registry.evaluate_all().await;

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(summary.fired, 1);
        assert_eq!(
            summary.failures,
            vec![StatError::ProducerFailure {
                stat: "broken".to_string(),
                reason: "sensor offline".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn test_panicking_producer_is_isolated() {
        let registry = StatRegistry::new();
        let fired = Arc::new(AtomicUsize::new(0));

        registry
            .register_stat("explodes", || panic!("boom"))
            .unwrap();
        registry.register_stat("time", constant(905)).unwrap();
        registry.bind("explodes", 1, counting(&fired)).unwrap();
        registry.bind("time", 905, counting(&fired)).unwrap();

        let summary = registry.evaluate_all().await;

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(summary.failures.len(), 1);
        match &summary.failures[0] {
            StatError::ProducerFailure { stat, reason } => {
                assert_eq!(stat, "explodes");
                assert!(reason.contains("boom"));
            }
            other => panic!("unexpected failure: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_action_failure_is_reported() {
        let registry = StatRegistry::new();
        registry.register_stat("time", constant(905)).unwrap();
        registry
            .bind_named("time", 905, "switch.kitchen:turn_on", || {
                ready(Err(ActionError::new("connection refused")))
            })
            .unwrap();

        let summary = registry.evaluate_all().await;

        assert_eq!(summary.fired, 1);
        assert_eq!(
            summary.failures,
            vec![StatError::ActionFailure {
                stat: "time".to_string(),
                action: "switch.kitchen:turn_on".to_string(),
                reason: "connection refused".to_string(),
            }]
        );
    }

    fn panics_when_called() -> Ready<ActionResult> {
        panic!("action boom")
    }

    async fn panics_when_polled() -> ActionResult {
        panic!("future boom")
    }

    #[tokio::test]
    async fn test_panicking_actions_are_isolated() {
        let registry = Arc::new(StatRegistry::new());
        let fired = Arc::new(AtomicUsize::new(0));
        for name in ["a", "b", "c"] {
            registry.register_stat(name, constant(1)).unwrap();
        }
        registry.bind("a", 1, panics_when_called).unwrap();
        registry.bind("b", 1, panics_when_polled).unwrap();
        registry.bind("c", 1, counting(&fired)).unwrap();

        // Run on a spawned task as the evaluation loop does
        let task_registry = registry.clone();
        let summary = tokio::spawn(async move { task_registry.evaluate_all().await })
            .await
            .unwrap();

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(summary.fired, 3);

        let mut reasons: Vec<(String, String)> = summary
            .failures
            .into_iter()
            .map(|f| match f {
                StatError::ActionFailure { stat, reason, .. } => (stat, reason),
                other => panic!("unexpected failure {other:?}"),
            })
            .collect();
        reasons.sort();
        assert_eq!(
            reasons,
            vec![
                ("a".to_string(), "panicked: action boom".to_string()),
                ("b".to_string(), "panicked: future boom".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_slow_action_times_out() {
        let registry = StatRegistry::with_action_timeout(Duration::from_millis(50));
        let fired = Arc::new(AtomicUsize::new(0));
        registry.register_stat("time", constant(905)).unwrap();
        registry.register_stat("mode", constant("home")).unwrap();
        registry
            .bind("time", 905, || async {
                tokio::time::sleep(Duration::from_secs(30)).await;
                Ok(())
            })
            .unwrap();
        registry.bind("mode", "home", counting(&fired)).unwrap();

        let summary = registry.evaluate_all().await;

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert_eq!(summary.fired, 2);
        assert!(matches!(
            summary.failures.as_slice(),
            [StatError::ActionTimeout { stat, .. }] if stat == "time"
        ));
    }

    #[tokio::test]
    async fn test_producer_sampled_each_pass() {
        let registry = StatRegistry::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let now = Arc::new(AtomicI64::new(905));

        let clock = now.clone();
        registry
            .register_stat("time", move || Ok(StatValue::Int(clock.load(Ordering::SeqCst))))
            .unwrap();
        registry.bind("time", 905, counting(&fired)).unwrap();

        registry.evaluate_all().await;
        now.store(906, Ordering::SeqCst);
        registry.evaluate_all().await;

        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unbind() {
        let registry = StatRegistry::new();
        let fired = Arc::new(AtomicUsize::new(0));
        registry.register_stat("time", constant(905)).unwrap();
        registry.bind("time", 905, counting(&fired)).unwrap();

        assert!(registry.unbind("time"));
        assert!(!registry.unbind("time"));

        let summary = registry.evaluate_all().await;
        assert_eq!(summary.evaluated, 0);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_read_unknown_stat() {
        let registry = StatRegistry::new();
        assert_eq!(
            registry.read_stat("nope"),
            Err(StatError::UnknownStat("nope".to_string()))
        );
    }
}
