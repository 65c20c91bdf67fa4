//! Query runtime.
//!
//! Queries are read-only probes whose boolean answers are folded into
//! `uiState`. A batch runs one query at a time, in the order given, against a
//! working copy of `uiState`, so a later query can read what an earlier one
//! wrote. The host only sees the final state, committed once at the end.
//!
//! Probe failures of any kind (missing path, permission error, transport
//! error) become `false`. Only evaluation faults in a query input abort the
//! batch, and then nothing is committed.

use crate::document::{QueryDef, QueryKind};
use crate::host::{FsProbe, ProbeError, TreeNode};
use crate::runtime::{Context, EvalError, evaluate, set_by_path, to_display_string};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

pub const DIR_NON_EMPTY_DEFAULT_DEPTH: u32 = 1;
pub const TREE_SEARCH_DEFAULT_DEPTH: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("query '{id}' input could not be evaluated: {source}")]
    Input {
        id: String,
        #[source]
        source: EvalError,
    },
    #[error("computed bindings could not be evaluated: {0}")]
    Computed(#[from] EvalError),
}

/// Read-only bindings a query batch starts from.
#[derive(Debug, Clone, Copy)]
pub struct QueryScope<'a> {
    pub node: &'a Value,
    pub computed: &'a Value,
    pub document: &'a Value,
    pub ui_state: &'a Value,
}

/// Run `ids` against `defs` in order.
///
/// `commit` receives the accumulated `uiState` once, after the last query.
/// `on_ran` is told about every query that ran, with its result.
pub async fn run_queries<S, C, R>(
    defs: &[QueryDef],
    ids: &[S],
    scope: QueryScope<'_>,
    probe: &dyn FsProbe,
    commit: C,
    mut on_ran: R,
) -> Result<(), QueryError>
where
    S: AsRef<str> + Sync,
    C: FnOnce(Value),
    R: FnMut(&str, bool),
{
    let mut working = scope.ui_state.clone();
    for id in ids {
        let id = id.as_ref();
        let Some(def) = defs.iter().find(|def| def.id == id) else {
            debug!(query = id, "skipping unknown query id");
            continue;
        };
        let input = {
            let ctx = Context::new(scope.node, scope.computed, &working, scope.document);
            evaluate(&def.input, &ctx, 0).map_err(|source| QueryError::Input {
                id: id.to_string(),
                source,
            })?
        };
        let result = run_probe(def.kind, input.as_ref(), probe).await;
        debug!(query = id, kind = ?def.kind, result, "query ran");
        if !def.output.into.is_empty() {
            set_by_path(&mut working, &def.output.into, Value::Bool(result));
        }
        on_ran(id, result);
    }
    commit(working);
    Ok(())
}

async fn run_probe(kind: QueryKind, input: Option<&Value>, probe: &dyn FsProbe) -> bool {
    let outcome = match kind {
        QueryKind::FileExists => file_exists(input, probe).await,
        QueryKind::DirNonEmpty => dir_non_empty(input, probe).await,
        QueryKind::TreeSearch => tree_search(input, probe).await,
    };
    outcome.unwrap_or_else(|err| {
        debug!(?kind, error = %err, "probe failed, folding to false");
        false
    })
}

async fn file_exists(input: Option<&Value>, probe: &dyn FsProbe) -> Result<bool, ProbeError> {
    let path = required_str(input, "path")?;
    probe.fetch_file(&path).await?;
    Ok(true)
}

async fn dir_non_empty(input: Option<&Value>, probe: &dyn FsProbe) -> Result<bool, ProbeError> {
    let root = required_str(input, "root")?;
    let depth = depth_or(input, DIR_NON_EMPTY_DEFAULT_DEPTH);
    let tree = probe.fetch_tree(&root, depth).await?;
    Ok(matches!(tree, TreeNode::Dir { ref children, .. } if !children.is_empty()))
}

async fn tree_search(input: Option<&Value>, probe: &dyn FsProbe) -> Result<bool, ProbeError> {
    let root = required_str(input, "root")?;
    let depth = depth_or(input, TREE_SEARCH_DEFAULT_DEPTH);
    let criteria = TreeMatch::from_input(field(input, "match"));
    let tree = probe.fetch_tree(&root, depth).await?;
    Ok(criteria.find_in(&tree))
}

/// `match` block of a `fsTreeSearch` query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct TreeMatch {
    node_type: Option<String>,
    name_ends_with: Option<String>,
}

impl TreeMatch {
    fn from_input(raw: Option<&Value>) -> Self {
        let text = |key: &str| field(raw, key).and_then(Value::as_str).map(ToString::to_string);
        Self {
            node_type: text("type"),
            name_ends_with: text("nameEndsWith"),
        }
    }

    fn matches(&self, node: &TreeNode) -> bool {
        if self.node_type.is_none() && self.name_ends_with.is_none() {
            return false;
        }
        if let Some(kind) = &self.node_type
            && (kind != "file" || !node.is_file())
        {
            return false;
        }
        if let Some(suffix) = &self.name_ends_with
            && !node.name().ends_with(suffix.as_str())
        {
            return false;
        }
        true
    }

    /// Depth-first, pre-order, children in listed order.
    fn find_in(&self, root: &TreeNode) -> bool {
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if self.matches(node) {
                return true;
            }
            stack.extend(node.children().iter().rev());
        }
        false
    }
}

fn field<'v>(input: Option<&'v Value>, key: &str) -> Option<&'v Value> {
    input?.as_object()?.get(key)
}

fn required_str(input: Option<&Value>, key: &str) -> Result<String, ProbeError> {
    let value = to_display_string(field(input, key));
    if value.is_empty() {
        return Err(ProbeError::InvalidInput(format!("missing '{key}'")));
    }
    Ok(value)
}

fn depth_or(input: Option<&Value>, default: u32) -> u32 {
    field(input, "depth")
        .and_then(Value::as_u64)
        .and_then(|d| u32::try_from(d).ok())
        .unwrap_or(default)
}
