//! Document instance surface.
//!
//! [`Surface`] ties the layers together for one attached document: it keeps
//! the node snapshot and `uiState`, recomputes `computed` on demand and routes
//! evaluation, view resolution, actions and queries through them.

use crate::actions::{ActionScope, DispatchError, dispatch};
use crate::document::{Document, ValidationError, parse_document};
use crate::expr::Expr;
use crate::host::{FsProbe, HostCapabilities};
use crate::queries::{QueryError, QueryScope, run_queries};
use crate::render::{ResolvedNode, resolve_view};
use crate::runtime::{Context, EvalError, EvalResult, compute_bindings, evaluate};
use serde_json::{Map, Value};
use tracing::debug;

/// One attached document instance.
///
/// Owns the validated document, its JSON form (the `document` namespace),
/// the host-provided `node` snapshot and the instance `uiState`. Nothing
/// outside the surface mutates `uiState`; actions and query batches work on
/// a copy and commit it only when they finish without a fault.
#[derive(Debug, Clone)]
pub struct Surface {
    document: Document,
    document_value: Value,
    node: Value,
    ui_state: Value,
    last_action: Option<String>,
}

impl Surface {
    /// Validate `raw` and attach it. A `null` seed starts from `{}`.
    pub fn attach(raw: &Value, seed: Value) -> Result<Self, ValidationError> {
        let document = parse_document(raw)?;
        let document_value = document.to_value();
        let ui_state = match seed {
            Value::Null => Value::Object(Map::new()),
            seed => seed,
        };
        debug!(
            view = %document.view.node_type,
            actions = document.actions.len(),
            queries = document.queries.len(),
            "document attached"
        );
        Ok(Self {
            document,
            document_value,
            node: Value::Object(Map::new()),
            ui_state,
            last_action: None,
        })
    }

    /// Replace the host node snapshot.
    pub fn set_node(&mut self, node: Value) {
        self.node = node;
    }

    pub fn node(&self) -> &Value {
        &self.node
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn ui_state(&self) -> &Value {
        &self.ui_state
    }

    /// Evaluate `computed` against the current node and uiState.
    pub fn computed(&self) -> Result<Value, EvalError> {
        compute_bindings(
            &self.document.computed,
            &self.node,
            &self.ui_state,
            &self.document_value,
        )
    }

    pub fn evaluate(&self, expr: &Expr, event: Option<&Value>) -> EvalResult {
        let computed = self.computed()?;
        let ctx = Context::new(&self.node, &computed, &self.ui_state, &self.document_value)
            .with_event(event);
        evaluate(expr, &ctx, 0)
    }

    pub fn resolve_view(&self) -> Result<ResolvedNode, EvalError> {
        let computed = self.computed()?;
        let ctx = Context::new(&self.node, &computed, &self.ui_state, &self.document_value);
        resolve_view(&self.document.view, &ctx)
    }

    pub async fn dispatch(
        &mut self,
        action: &str,
        event: Option<&Value>,
        host: &dyn HostCapabilities,
    ) -> Result<(), DispatchError> {
        self.last_action = Some(action.to_string());
        let computed = self.computed()?;
        let mut working = self.ui_state.clone();
        let scope = ActionScope {
            node: &self.node,
            computed: &computed,
            document: &self.document_value,
            ui_state: &mut working,
        };
        dispatch(action, event, &self.document, scope, host).await?;
        self.ui_state = working;
        Ok(())
    }

    pub async fn run_queries<S, R>(
        &mut self,
        ids: &[S],
        probe: &dyn FsProbe,
        on_ran: R,
    ) -> Result<(), QueryError>
    where
        S: AsRef<str> + Sync,
        R: FnMut(&str, bool),
    {
        let computed = self.computed()?;
        let mut committed = None;
        let scope = QueryScope {
            node: &self.node,
            computed: &computed,
            document: &self.document_value,
            ui_state: &self.ui_state,
        };
        run_queries(
            &self.document.queries,
            ids,
            scope,
            probe,
            |state| committed = Some(state),
            on_ran,
        )
        .await?;
        if let Some(state) = committed {
            self.ui_state = state;
        }
        Ok(())
    }

    /// Identifier of the most recent dispatch. Inspection only.
    pub fn last_action(&self) -> Option<&str> {
        self.last_action.as_deref()
    }

    /// Drop the document and hand back the final uiState.
    pub fn detach(self) -> Value {
        debug!(view = %self.document.view.node_type, "document detached");
        self.ui_state
    }
}
