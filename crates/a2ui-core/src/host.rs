//! Host-side collaborators.
//!
//! The interpreter never touches node state or the filesystem directly. It
//! goes through two narrow async traits: [`HostCapabilities`] for the action
//! dispatcher and [`FsProbe`] for the query runtime.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Failure reported by a host capability. Propagated out of `dispatch`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("host capability '{capability}' failed: {message}")]
pub struct HostError {
    pub capability: String,
    pub message: String,
}

impl HostError {
    pub fn new(capability: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            capability: capability.into(),
            message: message.into(),
        }
    }
}

/// Outcome of `runPluginNode` as the host reports it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RunOutcome {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RunOutcome {
    pub fn ok() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
        }
    }
}

#[async_trait]
pub trait HostCapabilities: Send + Sync {
    async fn update_node_param(&self, node_id: &str, key: &str, value: Value)
    -> Result<(), HostError>;

    async fn update_node_input(&self, node_id: &str, key: &str, value: Value)
    -> Result<(), HostError>;

    async fn run_plugin_node(&self, node_id: &str) -> Result<RunOutcome, HostError>;

    /// Optional sink for `ui.toast` messages.
    fn log(&self, _message: &str) {}
}

/// Failure reported by a filesystem probe. Never reaches the document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid probe input: {0}")]
    InvalidInput(String),
    #[error("probe failed: {0}")]
    Failed(String),
}

/// Node of a fetched file tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TreeNode {
    File {
        name: String,
        path: String,
    },
    Dir {
        name: String,
        path: String,
        #[serde(default)]
        children: Vec<TreeNode>,
    },
}

impl TreeNode {
    pub fn name(&self) -> &str {
        match self {
            Self::File { name, .. } | Self::Dir { name, .. } => name,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            Self::File { path, .. } | Self::Dir { path, .. } => path,
        }
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Self::File { .. })
    }

    pub fn children(&self) -> &[TreeNode] {
        match self {
            Self::File { .. } => &[],
            Self::Dir { children, .. } => children,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileContent {
    pub path: String,
    pub content: String,
}

#[async_trait]
pub trait FsProbe: Send + Sync {
    async fn fetch_tree(&self, root: &str, depth: u32) -> Result<TreeNode, ProbeError>;

    /// Must fail (typically [`ProbeError::NotFound`]) when `path` is missing.
    async fn fetch_file(&self, path: &str) -> Result<FileContent, ProbeError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tree_node_uses_type_tag() {
        let raw = json!({
            "type": "dir", "name": "src", "path": "src",
            "children": [{"type": "file", "name": "main.rs", "path": "src/main.rs"}]
        });
        let tree: TreeNode = serde_json::from_value(raw.clone()).expect("tree");
        assert_eq!(tree.name(), "src");
        assert_eq!(tree.children().len(), 1);
        assert!(tree.children()[0].is_file());
        assert_eq!(tree.children()[0].path(), "src/main.rs");
        assert_eq!(serde_json::to_value(&tree).expect("serialize"), raw);
    }

    #[test]
    fn run_outcome_constructors() {
        assert!(RunOutcome::ok().ok);
        let failed = RunOutcome::failed("boom");
        assert!(!failed.ok);
        assert_eq!(failed.error.as_deref(), Some("boom"));
    }
}
