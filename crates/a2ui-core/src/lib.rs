//! A2UI Core crate.
//!
//! Interprets declarative A2UI documents: JSON descriptions of a widget view,
//! derived values, actions and read-only queries that a host attaches to a
//! node and renders. The crate separates concerns into layers:
//!
//! - `document`: wire contract and validation. A document is validated once,
//!   up front, and rejected with a structured [`ValidationError`] otherwise.
//! - `binding` + `expr` + `runtime`: the expression language. Expressions are
//!   lowered once into [`Expr`] and evaluated by a pure, depth-bounded
//!   evaluator.
//! - `actions`: ordered async step execution against [`HostCapabilities`].
//! - `queries`: filesystem probes through [`FsProbe`] whose answers are folded
//!   into `uiState`.
//! - `render`: view resolution and the component [`Registry`].
//! - `engine`: [`Surface`], one attached document instance owning its
//!   `uiState`.
//!
//! The interpreter never performs I/O on its own. Everything that touches the
//! outside world goes through the host-provided traits.

pub mod binding;
pub mod expr;
pub mod runtime;
pub mod document;
pub mod host;
pub mod actions;
pub mod queries;
pub mod render;
pub mod engine;

pub use actions::{ActionScope, DispatchError, StepKind, dispatch};
pub use binding::{Binding, CompareOp, Comparison};
pub use document::{
    ActionDef, Document, QueryDef, QueryKind, QueryOutput, SPEC_VERSION, ValidationError,
    ViewNode, parse_document, parse_document_str, validate_document,
};
pub use engine::Surface;
pub use expr::{Expr, ExprShapeError};
pub use host::{
    FileContent, FsProbe, HostCapabilities, HostError, ProbeError, RunOutcome, TreeNode,
};
pub use queries::{QueryError, QueryScope, run_queries};
pub use render::{Factory, Registry, ResolvedNode, resolve_view};
pub use runtime::{
    Context, EvalError, EvalResult, MAX_DEPTH, Operator, evaluate, evaluate_value,
    get_by_path, set_by_path,
};
