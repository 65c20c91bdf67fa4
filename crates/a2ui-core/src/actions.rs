//! Action dispatcher.
//!
//! `dispatch` looks the identifier up in `document.actions` first. When no
//! document action matches, the identifier is run as a bare host kind with the
//! event as its input. Steps run strictly in declared order; the only
//! suspension points are the awaited host capability calls.
//!
//! Step contract summary:
//!
//! | kind | input | effect |
//! |---|---|---|
//! | `sequence` | - | run `steps` in order |
//! | `conditional` | `if` | run `then` in order when `if` is truthy |
//! | `state.updateNodeParam` / `setParam` | `{ nodeId?, key, value }` | host `update_node_param` |
//! | `state.updateNodeInput` | `{ nodeId?, key, value }` | host `update_node_input` |
//! | `state.setUiState` | `{ path, value }` | write into the instance `uiState` |
//! | `actions.runPluginNode` / `runNode` | `{ nodeId? }` | host `run_plugin_node` |
//! | `ui.toast` | `{ message }` | host `log` |
//!
//! Unknown kinds are skipped so older interpreters keep working when the
//! format grows new step kinds.

use crate::document::{ActionDef, Document};
use crate::expr::Expr;
use crate::host::{HostCapabilities, HostError};
use crate::runtime::{
    Context, EvalError, evaluate, get_by_path, set_by_path, to_display_string, truthy,
};
use futures::FutureExt;
use futures::future::BoxFuture;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Eval(#[from] EvalError),
    #[error(transparent)]
    Host(#[from] HostError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepKind {
    Sequence,
    Conditional,
    UpdateNodeParam,
    UpdateNodeInput,
    SetUiState,
    RunPluginNode,
    Toast,
    Unknown,
}

impl StepKind {
    pub fn from_kind(kind: &str) -> Self {
        match kind {
            "sequence" => Self::Sequence,
            "conditional" => Self::Conditional,
            "state.updateNodeParam" | "setParam" => Self::UpdateNodeParam,
            "state.updateNodeInput" => Self::UpdateNodeInput,
            "state.setUiState" => Self::SetUiState,
            "actions.runPluginNode" | "runNode" => Self::RunPluginNode,
            "ui.toast" => Self::Toast,
            _ => Self::Unknown,
        }
    }
}

/// State an action runs against.
///
/// `ui_state` is the instance's own scratch state; `state.setUiState` steps
/// write into it and later steps observe the write.
pub struct ActionScope<'a> {
    pub node: &'a Value,
    pub computed: &'a Value,
    pub document: &'a Value,
    pub ui_state: &'a mut Value,
}

pub async fn dispatch(
    action: &str,
    event: Option<&Value>,
    document: &Document,
    scope: ActionScope<'_>,
    host: &dyn HostCapabilities,
) -> Result<(), DispatchError> {
    let mut run = StepRunner { scope, event, host };
    match document.action(action) {
        Some(def) => {
            debug!(action, kind = %def.kind, "dispatching document action");
            run.exec(def, StepInput::Declared).await
        }
        None => {
            debug!(action, "dispatching host action kind");
            let step = ActionDef {
                id: String::new(),
                kind: action.to_string(),
                input: None,
                steps: Vec::new(),
                condition: None,
                then: Vec::new(),
            };
            run.exec(&step, StepInput::Resolved(event)).await
        }
    }
}

/// Where a step's input comes from. Host-kind fallbacks receive the event as
/// data; it is never evaluated as an expression.
#[derive(Clone, Copy)]
enum StepInput<'s> {
    Declared,
    Resolved(Option<&'s Value>),
}

struct StepRunner<'a> {
    scope: ActionScope<'a>,
    event: Option<&'a Value>,
    host: &'a dyn HostCapabilities,
}

impl<'a> StepRunner<'a> {
    fn exec<'s>(
        &'s mut self,
        step: &'s ActionDef,
        input: StepInput<'s>,
    ) -> BoxFuture<'s, Result<(), DispatchError>> {
        async move {
            let kind = StepKind::from_kind(&step.kind);
            debug!(id = %step.id, kind = %step.kind, "executing action step");
            match kind {
                StepKind::Sequence => {
                    for child in &step.steps {
                        self.exec(child, StepInput::Declared).await?;
                    }
                }
                StepKind::Conditional => {
                    let cond = match &step.condition {
                        Some(expr) => self.eval(expr)?,
                        None => None,
                    };
                    if truthy(cond.as_ref()) {
                        for child in &step.then {
                            self.exec(child, StepInput::Declared).await?;
                        }
                    }
                }
                StepKind::UpdateNodeParam | StepKind::UpdateNodeInput => {
                    let input = self.input(step, input)?;
                    let key = to_display_string(field(input.as_ref(), "key"));
                    if key.is_empty() {
                        debug!(kind = %step.kind, "skipping node update without key");
                        return Ok(());
                    }
                    let Some(node_id) = self.node_id(input.as_ref()) else {
                        debug!(kind = %step.kind, "skipping node update without node id");
                        return Ok(());
                    };
                    let value = field(input.as_ref(), "value")
                        .cloned()
                        .unwrap_or(Value::Null);
                    if kind == StepKind::UpdateNodeParam {
                        self.host.update_node_param(&node_id, &key, value).await?;
                    } else {
                        self.host.update_node_input(&node_id, &key, value).await?;
                    }
                }
                StepKind::SetUiState => {
                    let input = self.input(step, input)?;
                    let path = to_display_string(field(input.as_ref(), "path"));
                    if path.is_empty() {
                        return Ok(());
                    }
                    let value = field(input.as_ref(), "value")
                        .cloned()
                        .unwrap_or(Value::Null);
                    set_by_path(self.scope.ui_state, &path, value);
                }
                StepKind::RunPluginNode => {
                    let input = self.input(step, input)?;
                    let Some(node_id) = self.node_id(input.as_ref()) else {
                        debug!("skipping plugin run without node id");
                        return Ok(());
                    };
                    let outcome = self.host.run_plugin_node(&node_id).await?;
                    if !outcome.ok {
                        warn!(
                            node_id = %node_id,
                            error = outcome.error.as_deref().unwrap_or("unknown"),
                            "plugin node run reported failure"
                        );
                    }
                }
                StepKind::Toast => {
                    let input = self.input(step, input)?;
                    let message = to_display_string(field(input.as_ref(), "message"));
                    if !message.is_empty() {
                        self.host.log(&message);
                    }
                }
                StepKind::Unknown => {
                    debug!(kind = %step.kind, "ignoring unknown action kind");
                }
            }
            Ok(())
        }
        .boxed()
    }

    fn eval(&self, expr: &Expr) -> Result<Option<Value>, EvalError> {
        let ctx = Context::new(
            self.scope.node,
            self.scope.computed,
            &*self.scope.ui_state,
            self.scope.document,
        )
        .with_event(self.event);
        evaluate(expr, &ctx, 0)
    }

    fn input(&self, step: &ActionDef, input: StepInput<'_>) -> Result<Option<Value>, EvalError> {
        match input {
            StepInput::Resolved(value) => Ok(value.cloned()),
            StepInput::Declared => match &step.input {
                Some(expr) => self.eval(expr),
                None => Ok(None),
            },
        }
    }

    fn node_id(&self, input: Option<&Value>) -> Option<String> {
        let explicit = to_display_string(field(input, "nodeId"));
        if !explicit.is_empty() {
            return Some(explicit);
        }
        let fallback = to_display_string(get_by_path(self.scope.node, "id"));
        (!fallback.is_empty()).then_some(fallback)
    }
}

fn field<'v>(input: Option<&'v Value>, key: &str) -> Option<&'v Value> {
    input?.as_object()?.get(key)
}
