//! Host capabilities for headless runs.
//!
//! There is no live node graph behind the CLI, so every capability call is
//! traced and recorded. The recorded calls become part of the command output.

use std::sync::Mutex;

use a2ui_core::{HostCapabilities, HostError, RunOutcome};
use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::info;

#[derive(Debug, Default)]
pub struct RecordingHost {
    calls: Mutex<Vec<Value>>,
}

impl RecordingHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, call: Value) -> Result<(), HostError> {
        let mut calls = self
            .calls
            .lock()
            .map_err(|_| HostError::new("record", "call log poisoned"))?;
        calls.push(call);
        Ok(())
    }

    /// Calls in the order they were made.
    pub fn into_calls(self) -> Vec<Value> {
        self.calls.into_inner().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl HostCapabilities for RecordingHost {
    async fn update_node_param(
        &self,
        node_id: &str,
        key: &str,
        value: Value,
    ) -> Result<(), HostError> {
        info!(node_id, key, %value, "updateNodeParam");
        self.record(json!({
            "capability": "updateNodeParam",
            "nodeId": node_id,
            "key": key,
            "value": value,
        }))
    }

    async fn update_node_input(
        &self,
        node_id: &str,
        key: &str,
        value: Value,
    ) -> Result<(), HostError> {
        info!(node_id, key, %value, "updateNodeInput");
        self.record(json!({
            "capability": "updateNodeInput",
            "nodeId": node_id,
            "key": key,
            "value": value,
        }))
    }

    async fn run_plugin_node(&self, node_id: &str) -> Result<RunOutcome, HostError> {
        info!(node_id, "runPluginNode");
        self.record(json!({"capability": "runPluginNode", "nodeId": node_id}))?;
        Ok(RunOutcome::ok())
    }

    fn log(&self, message: &str) {
        info!(message, "toast");
        let _ = self.record(json!({"capability": "log", "message": message}));
    }
}
