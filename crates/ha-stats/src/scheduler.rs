//! Periodic evaluation loop
//!
//! The `EvaluationLoop` runs [`StatRegistry::evaluate_all`] and then sleeps
//! for a fixed interval, until it is told to stop. A stop request is honoured
//! at the top of every iteration and also cuts the sleep short; a pass that
//! has already started always runs to completion.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::TryRecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{StatError, StatResult};
use crate::registry::StatRegistry;

/// Clears the running flag when the loop ends, however it ends
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Drives periodic evaluation of a [`StatRegistry`]
pub struct EvaluationLoop {
    registry: Arc<StatRegistry>,
    interval: Duration,
    running: Arc<AtomicBool>,
    shutdown_tx: broadcast::Sender<()>,
    iterations: Arc<AtomicU64>,
}

impl EvaluationLoop {
    /// Create a loop that evaluates `registry` every `interval`
    pub fn new(registry: Arc<StatRegistry>, interval: Duration) -> StatResult<Self> {
        if interval.is_zero() {
            return Err(StatError::InvalidArgument(
                "evaluation interval must be greater than zero".to_string(),
            ));
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            registry,
            interval,
            running: Arc::new(AtomicBool::new(false)),
            shutdown_tx,
            iterations: Arc::new(AtomicU64::new(0)),
        })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Run the loop on the current task until [`EvaluationLoop::stop`] is called
    pub async fn run(&self) {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Evaluation loop already running");
            return;
        }

        let _running = RunningGuard(self.running.clone());
        let shutdown_rx = self.shutdown_tx.subscribe();
        Self::run_loop(
            self.registry.clone(),
            self.interval,
            shutdown_rx,
            self.iterations.clone(),
        )
        .await;
    }

    /// Spawn the loop onto the tokio runtime
    ///
    /// Returns `None` if the loop is already running.
    pub fn start(&self) -> Option<JoinHandle<()>> {
        if self.running.swap(true, Ordering::SeqCst) {
            warn!("Evaluation loop already running");
            return None;
        }

        // Subscribe before spawning so a stop() issued right after start()
        // is seen by the first iteration.
        let shutdown_rx = self.shutdown_tx.subscribe();
        let registry = self.registry.clone();
        let interval = self.interval;
        let iterations = self.iterations.clone();
        let running = RunningGuard(self.running.clone());

        Some(tokio::spawn(async move {
            let _running = running;
            Self::run_loop(registry, interval, shutdown_rx, iterations).await;
        }))
    }

    /// Ask the loop to stop after the current pass
    pub fn stop(&self) {
        if !self.running.load(Ordering::SeqCst) {
            return;
        }

        info!("Stopping evaluation loop");
        let _ = self.shutdown_tx.send(());
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Number of completed evaluation passes
    pub fn iterations(&self) -> u64 {
        self.iterations.load(Ordering::SeqCst)
    }

    async fn run_loop(
        registry: Arc<StatRegistry>,
        interval: Duration,
        mut shutdown_rx: broadcast::Receiver<()>,
        iterations: Arc<AtomicU64>,
    ) {
        info!(interval = ?interval, "Evaluation loop started");

        loop {
            match shutdown_rx.try_recv() {
                Err(TryRecvError::Empty) => {}
                _ => break,
            }

            let summary = registry.evaluate_all().await;
            let pass = iterations.fetch_add(1, Ordering::SeqCst) + 1;
            if !summary.is_clean() {
                warn!(
                    pass,
                    failed = summary.failures.len(),
                    "Evaluation pass finished with failures"
                );
            }

            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                _ = shutdown_rx.recv() => {
                    debug!("Shutdown received while sleeping");
                    break;
                }
            }
        }

        info!("Evaluation loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::ready;
    use std::sync::atomic::AtomicUsize;

    fn registry_with_counter(counter: &Arc<AtomicUsize>) -> Arc<StatRegistry> {
        let registry = Arc::new(StatRegistry::new());
        registry
            .register_stat("always", || Ok(true.into()))
            .unwrap();
        let counter = counter.clone();
        registry
            .bind("always", true, move || {
                counter.fetch_add(1, Ordering::SeqCst);
                ready(Ok(()))
            })
            .unwrap();
        registry
    }

    async fn wait_for_iterations(evaluation: &EvaluationLoop, n: u64) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while evaluation.iterations() < n {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("loop did not reach the expected number of passes");
    }

    #[test]
    fn test_zero_interval_rejected() {
        let registry = Arc::new(StatRegistry::new());
        assert!(matches!(
            EvaluationLoop::new(registry, Duration::ZERO),
            Err(StatError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn test_runs_until_stopped() {
        let fired = Arc::new(AtomicUsize::new(0));
        let evaluation =
            EvaluationLoop::new(registry_with_counter(&fired), Duration::from_millis(10)).unwrap();

        let handle = evaluation.start().unwrap();
        assert!(evaluation.is_running());
        wait_for_iterations(&evaluation, 3).await;

        evaluation.stop();
        handle.await.unwrap();

        assert!(!evaluation.is_running());
        let passes = evaluation.iterations();
        assert!(passes >= 3);
        assert_eq!(fired.load(Ordering::SeqCst) as u64, passes);

        // No further passes once stopped
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(evaluation.iterations(), passes);
    }

    #[tokio::test]
    async fn test_stop_before_first_pass() {
        let fired = Arc::new(AtomicUsize::new(0));
        let evaluation =
            EvaluationLoop::new(registry_with_counter(&fired), Duration::from_millis(10)).unwrap();

        let handle = evaluation.start().unwrap();
        evaluation.stop();
        handle.await.unwrap();

        assert_eq!(evaluation.iterations(), 0);
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_stop_interrupts_long_sleep() {
        let fired = Arc::new(AtomicUsize::new(0));
        let evaluation =
            EvaluationLoop::new(registry_with_counter(&fired), Duration::from_secs(3600)).unwrap();

        let handle = evaluation.start().unwrap();
        wait_for_iterations(&evaluation, 1).await;
        evaluation.stop();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("loop kept sleeping after stop")
            .unwrap();
        assert_eq!(evaluation.iterations(), 1);
    }

    #[tokio::test]
    async fn test_start_twice() {
        let fired = Arc::new(AtomicUsize::new(0));
        let evaluation =
            EvaluationLoop::new(registry_with_counter(&fired), Duration::from_millis(10)).unwrap();

        let handle = evaluation.start().unwrap();
        assert!(evaluation.start().is_none());

        evaluation.stop();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_restart_after_task_is_aborted() {
        let fired = Arc::new(AtomicUsize::new(0));
        let evaluation =
            EvaluationLoop::new(registry_with_counter(&fired), Duration::from_millis(10)).unwrap();

        let handle = evaluation.start().unwrap();
        wait_for_iterations(&evaluation, 1).await;
        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
        assert!(!evaluation.is_running());

        let passes = evaluation.iterations();
        let handle = evaluation.start().unwrap();
        wait_for_iterations(&evaluation, passes + 1).await;
        evaluation.stop();
        handle.await.unwrap();
        assert!(!evaluation.is_running());
    }

    #[tokio::test]
    async fn test_run_on_current_task() {
        let fired = Arc::new(AtomicUsize::new(0));
        let evaluation = Arc::new(
            EvaluationLoop::new(registry_with_counter(&fired), Duration::from_millis(10)).unwrap(),
        );

        let runner = evaluation.clone();
        let handle = tokio::spawn(async move { runner.run().await });

        wait_for_iterations(&evaluation, 2).await;
        evaluation.stop();
        handle.await.unwrap();

        assert!(!evaluation.is_running());
        assert!(fired.load(Ordering::SeqCst) >= 2);
    }
}
