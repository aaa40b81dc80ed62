//! Test doubles for the remote actuator

use async_trait::async_trait;
use ha_core::ServiceCall;
use std::sync::Mutex;
use std::time::Duration;

use crate::actuator::{ActuatorError, RemoteActuator};

/// Records every call; optionally fails or stalls
#[derive(Debug, Default)]
pub struct RecordingActuator {
    calls: Mutex<Vec<ServiceCall>>,
    failure: Option<ActuatorError>,
    delay: Option<Duration>,
}

impl RecordingActuator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call is recorded and then answered with `status`
    pub fn failing(status: u16, body: &str) -> Self {
        Self {
            failure: Some(ActuatorError::Status {
                status,
                body: body.to_string(),
            }),
            ..Self::default()
        }
    }

    /// Every call is recorded and then takes `delay` to complete
    pub fn stalling(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<ServiceCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl RemoteActuator for RecordingActuator {
    async fn invoke(&self, call: &ServiceCall) -> Result<(), ActuatorError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call.clone());

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match &self.failure {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}
