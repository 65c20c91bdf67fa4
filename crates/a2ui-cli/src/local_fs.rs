//! Filesystem probe backed by the local disk.
//!
//! Every probe path is relative to a configured root. Absolute paths and `..`
//! components are rejected before anything is touched. Reported paths use `/`
//! separators and stay relative to the root.

use std::future::Future;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::pin::Pin;

use a2ui_core::{FileContent, FsProbe, ProbeError, TreeNode};
use async_trait::async_trait;
use tracing::debug;

type WalkFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<TreeNode>, ProbeError>> + Send + 'a>>;

#[derive(Debug, Clone)]
pub struct LocalFs {
    root: PathBuf,
    max_depth: u32,
}

impl LocalFs {
    pub fn new(root: impl Into<PathBuf>, max_depth: u32) -> Self {
        Self {
            root: root.into(),
            max_depth,
        }
    }

    fn resolve(&self, rel: &str) -> Result<PathBuf, ProbeError> {
        let rel_path = Path::new(rel);
        for comp in rel_path.components() {
            if matches!(
                comp,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            ) {
                return Err(ProbeError::InvalidInput(format!(
                    "path '{rel}' escapes the probe root"
                )));
            }
        }
        Ok(self.root.join(rel_path))
    }

    fn walk<'a>(&'a self, dir: PathBuf, display: String, depth: u32) -> WalkFuture<'a> {
        Box::pin(async move {
            if depth == 0 {
                return Ok(Vec::new());
            }
            let mut entries = Vec::new();
            let mut reader = tokio::fs::read_dir(&dir)
                .await
                .map_err(|err| io_error(&display, err))?;
            while let Some(entry) = reader
                .next_entry()
                .await
                .map_err(|err| io_error(&display, err))?
            {
                entries.push(entry);
            }
            entries.sort_by_key(|entry| entry.file_name());

            let mut children = Vec::with_capacity(entries.len());
            for entry in entries {
                let name = entry.file_name().to_string_lossy().into_owned();
                let path = join_display(&display, &name);
                let meta = tokio::fs::metadata(entry.path())
                    .await
                    .map_err(|err| io_error(&path, err))?;
                if meta.is_dir() {
                    let nested = self.walk(entry.path(), path.clone(), depth - 1).await?;
                    children.push(TreeNode::Dir {
                        name,
                        path,
                        children: nested,
                    });
                } else {
                    children.push(TreeNode::File { name, path });
                }
            }
            Ok(children)
        })
    }
}

#[async_trait]
impl FsProbe for LocalFs {
    async fn fetch_tree(&self, root: &str, depth: u32) -> Result<TreeNode, ProbeError> {
        let full = self.resolve(root)?;
        let depth = depth.min(self.max_depth);
        let shown = normalize_display(root);
        let meta = tokio::fs::metadata(&full)
            .await
            .map_err(|err| io_error(&shown, err))?;
        let name = Path::new(&shown)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| shown.clone());
        debug!(root = %shown, depth, "fetching tree");
        if !meta.is_dir() {
            return Ok(TreeNode::File {
                name,
                path: shown,
            });
        }
        let children = self.walk(full, shown.clone(), depth).await?;
        Ok(TreeNode::Dir {
            name,
            path: shown,
            children,
        })
    }

    async fn fetch_file(&self, path: &str) -> Result<FileContent, ProbeError> {
        let full = self.resolve(path)?;
        let bytes = tokio::fs::read(&full)
            .await
            .map_err(|err| io_error(path, err))?;
        Ok(FileContent {
            path: normalize_display(path),
            content: String::from_utf8_lossy(&bytes).into_owned(),
        })
    }
}

fn io_error(path: &str, err: io::Error) -> ProbeError {
    match err.kind() {
        io::ErrorKind::NotFound => ProbeError::NotFound(path.to_string()),
        _ => ProbeError::Failed(format!("{path}: {err}")),
    }
}

fn normalize_display(rel: &str) -> String {
    let trimmed = rel.trim_end_matches('/');
    if trimmed.is_empty() {
        ".".to_string()
    } else {
        trimmed.to_string()
    }
}

fn join_display(parent: &str, name: &str) -> String {
    if parent == "." {
        name.to_string()
    } else {
        format!("{parent}/{name}")
    }
}
