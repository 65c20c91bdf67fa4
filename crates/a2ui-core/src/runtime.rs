//! Expression evaluator.
//!
//! `evaluate` is pure and synchronous: it reads the five context namespaces
//! and never writes anything. Every recursive call carries an explicit depth
//! so hostile documents fail with [`EvalError::MaxDepthExceeded`] instead of
//! exhausting the stack.
//!
//! An evaluation yields `Option<Value>`; `None` is "undefined", a value that
//! is missing rather than `null`. Undefined collapses to JSON rules when it
//! lands in a container: `null` inside arrays, omitted inside objects.

use crate::binding::{Binding, CompareOp};
use crate::expr::Expr;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use thiserror::Error;

/// Deepest nesting level `evaluate` accepts.
pub const MAX_DEPTH: usize = 64;

pub type EvalResult = Result<Option<Value>, EvalError>;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    #[error("expression exceeds maximum nesting depth of {max}")]
    MaxDepthExceeded { max: usize },
    #[error("unknown operator '{0}'")]
    UnknownOperator(String),
}

/// The closed operator table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Concat,
    Trim,
    Lower,
    Upper,
    Len,
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    And,
    Or,
    Not,
    If,
}

impl Operator {
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "concat" => Self::Concat,
            "trim" => Self::Trim,
            "lower" => Self::Lower,
            "upper" => Self::Upper,
            "len" => Self::Len,
            "eq" => Self::Eq,
            "neq" => Self::Neq,
            "gt" => Self::Gt,
            "gte" => Self::Gte,
            "lt" => Self::Lt,
            "lte" => Self::Lte,
            "and" => Self::And,
            "or" => Self::Or,
            "not" => Self::Not,
            "if" => Self::If,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Concat => "concat",
            Self::Trim => "trim",
            Self::Lower => "lower",
            Self::Upper => "upper",
            Self::Len => "len",
            Self::Eq => "eq",
            Self::Neq => "neq",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::And => "and",
            Self::Or => "or",
            Self::Not => "not",
            Self::If => "if",
        }
    }
}

/// Read-only view handed to the evaluator.
///
/// `computed` is the object of already-evaluated computed bindings. `event`
/// is only set while an event-triggered action runs.
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    pub node: &'a Value,
    pub computed: &'a Value,
    pub ui_state: &'a Value,
    pub document: &'a Value,
    pub event: Option<&'a Value>,
}

impl<'a> Context<'a> {
    pub fn new(
        node: &'a Value,
        computed: &'a Value,
        ui_state: &'a Value,
        document: &'a Value,
    ) -> Self {
        Self {
            node,
            computed,
            ui_state,
            document,
            event: None,
        }
    }

    pub fn with_event(mut self, event: Option<&'a Value>) -> Self {
        self.event = event;
        self
    }

    fn namespace(&self, root: &str) -> Option<&'a Value> {
        match root {
            "node" => Some(self.node),
            "computed" => Some(self.computed),
            "uiState" => Some(self.ui_state),
            "document" => Some(self.document),
            "event" => self.event,
            _ => None,
        }
    }
}

pub fn evaluate(expr: &Expr, ctx: &Context, depth: usize) -> EvalResult {
    if depth > MAX_DEPTH {
        return Err(EvalError::MaxDepthExceeded { max: MAX_DEPTH });
    }
    match expr {
        Expr::Null => Ok(Some(Value::Null)),
        Expr::Bool(b) => Ok(Some(Value::Bool(*b))),
        Expr::Number(n) => Ok(Some(Value::Number(n.clone()))),
        Expr::Text(s) => Ok(Some(Value::String(s.clone()))),
        Expr::Binding(binding) => Ok(resolve_binding(binding, ctx)),
        Expr::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(evaluate(item, ctx, depth + 1)?.unwrap_or(Value::Null));
            }
            Ok(Some(Value::Array(out)))
        }
        Expr::Object(entries) => {
            let mut out = Map::new();
            for (key, item) in entries {
                if let Some(value) = evaluate(item, ctx, depth + 1)? {
                    out.insert(key.clone(), value);
                }
            }
            Ok(Some(Value::Object(out)))
        }
        Expr::Op { op, args } => {
            let operator =
                Operator::from_name(op).ok_or_else(|| EvalError::UnknownOperator(op.clone()))?;
            apply(operator, args, ctx, depth)
        }
    }
}

/// Evaluate at depth zero and map undefined to `null`.
pub fn evaluate_value(expr: &Expr, ctx: &Context) -> Result<Value, EvalError> {
    Ok(evaluate(expr, ctx, 0)?.unwrap_or(Value::Null))
}

fn arg(args: &[Expr], index: usize, ctx: &Context, depth: usize) -> EvalResult {
    match args.get(index) {
        Some(expr) => evaluate(expr, ctx, depth + 1),
        None => Ok(None),
    }
}

fn apply(operator: Operator, args: &[Expr], ctx: &Context, depth: usize) -> EvalResult {
    let value = match operator {
        Operator::Concat => {
            let mut out = String::new();
            for expr in args {
                out.push_str(&to_display_string(
                    evaluate(expr, ctx, depth + 1)?.as_ref(),
                ));
            }
            Value::String(out)
        }
        Operator::Trim => {
            let v = arg(args, 0, ctx, depth)?;
            Value::String(to_display_string(v.as_ref()).trim().to_string())
        }
        Operator::Lower => {
            let v = arg(args, 0, ctx, depth)?;
            Value::String(to_display_string(v.as_ref()).to_lowercase())
        }
        Operator::Upper => {
            let v = arg(args, 0, ctx, depth)?;
            Value::String(to_display_string(v.as_ref()).to_uppercase())
        }
        Operator::Len => {
            let n = match arg(args, 0, ctx, depth)? {
                Some(Value::Array(items)) => items.len(),
                other => to_display_string(other.as_ref()).chars().count(),
            };
            Value::from(n)
        }
        Operator::Eq | Operator::Neq => {
            let a = arg(args, 0, ctx, depth)?;
            let b = arg(args, 1, ctx, depth)?;
            let equal = strict_equals(a.as_ref(), b.as_ref());
            Value::Bool(if operator == Operator::Eq { equal } else { !equal })
        }
        Operator::Gt | Operator::Gte | Operator::Lt | Operator::Lte => {
            let a = to_number(arg(args, 0, ctx, depth)?.as_ref());
            let b = to_number(arg(args, 1, ctx, depth)?.as_ref());
            // NaN on either side makes every comparison false.
            Value::Bool(match operator {
                Operator::Gt => a > b,
                Operator::Gte => a >= b,
                Operator::Lt => a < b,
                _ => a <= b,
            })
        }
        Operator::And => {
            for expr in args {
                if !truthy(evaluate(expr, ctx, depth + 1)?.as_ref()) {
                    return Ok(Some(Value::Bool(false)));
                }
            }
            Value::Bool(true)
        }
        Operator::Or => {
            for expr in args {
                if truthy(evaluate(expr, ctx, depth + 1)?.as_ref()) {
                    return Ok(Some(Value::Bool(true)));
                }
            }
            Value::Bool(false)
        }
        Operator::Not => Value::Bool(!truthy(arg(args, 0, ctx, depth)?.as_ref())),
        Operator::If => {
            let cond = arg(args, 0, ctx, depth)?;
            let branch = if truthy(cond.as_ref()) { 1 } else { 2 };
            return arg(args, branch, ctx, depth);
        }
    };
    Ok(Some(value))
}

fn resolve_binding(binding: &Binding, ctx: &Context) -> Option<Value> {
    let resolved = resolve_path(ctx, binding.path());
    match binding.comparison() {
        None => resolved,
        Some(cmp) => {
            let equal = strict_equals(resolved.as_ref(), cmp.rhs.as_ref());
            Some(Value::Bool(match cmp.op {
                CompareOp::Eq => equal,
                CompareOp::Ne => !equal,
            }))
        }
    }
}

/// Resolve `root.seg.seg` against the context namespaces.
pub fn resolve_path(ctx: &Context, segments: &[String]) -> Option<Value> {
    let (root, rest) = segments.split_first()?;
    let mut current = ctx.namespace(root)?;
    for (idx, segment) in rest.iter().enumerate() {
        let is_last = idx + 1 == rest.len();
        current = match current {
            Value::Object(obj) => obj.get(segment)?,
            Value::Array(items) if segment == "length" => {
                return is_last.then(|| Value::from(items.len()));
            }
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            Value::String(s) if segment == "length" => {
                return is_last.then(|| Value::from(s.chars().count()));
            }
            _ => return None,
        };
    }
    Some(current.clone())
}

/// Read a dot-path below `root`. An empty path returns `root` itself.
pub fn get_by_path<'v>(root: &'v Value, path: &str) -> Option<&'v Value> {
    let mut current = root;
    for part in path.split('.').filter(|p| !p.is_empty()) {
        current = match current {
            Value::Object(obj) => obj.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Write `value` at a dot-path, creating (or replacing non-object)
/// intermediates with objects. An empty path is a no-op.
pub fn set_by_path(root: &mut Value, path: &str, value: Value) {
    let parts: Vec<&str> = path.split('.').filter(|p| !p.is_empty()).collect();
    let Some((last, parents)) = parts.split_last() else {
        return;
    };
    let mut cur = root;
    for part in parents {
        let map = ensure_object(cur);
        cur = map
            .entry((*part).to_string())
            .or_insert_with(|| Value::Object(Map::new()));
    }
    ensure_object(cur).insert((*last).to_string(), value);
}

fn ensure_object(value: &mut Value) -> &mut Map<String, Value> {
    if !value.is_object() {
        *value = Value::Object(Map::new());
    }
    match value {
        Value::Object(map) => map,
        _ => unreachable!("value was just replaced with an object"),
    }
}

/// Evaluate `computed` entries in declaration order. Each entry sees the
/// entries before it under `computed.*`.
pub fn compute_bindings(
    computed: &IndexMap<String, Expr>,
    node: &Value,
    ui_state: &Value,
    document: &Value,
) -> Result<Value, EvalError> {
    let mut out = Value::Object(Map::new());
    for (key, expr) in computed {
        let value = {
            let ctx = Context::new(node, &out, ui_state, document);
            evaluate(expr, &ctx, 0)?
        };
        if let (Some(value), Value::Object(map)) = (value, &mut out) {
            map.insert(key.clone(), value);
        }
    }
    Ok(out)
}

pub fn truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}

/// Numbers as-is, numeric strings parsed, everything else NaN.
pub fn to_number(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(f64::NAN),
        Some(Value::String(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return f64::NAN;
            }
            trimmed
                .parse::<f64>()
                .ok()
                .filter(|f| f.is_finite())
                .unwrap_or(f64::NAN)
        }
        _ => f64::NAN,
    }
}

pub fn to_display_string(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => match n.as_f64() {
            Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < 1e15 => {
                format!("{}", f as i64)
            }
            _ => n.to_string(),
        },
        Some(other) => other.to_string(),
    }
}

/// Undefined equals only undefined; numbers compare numerically; everything
/// else compares structurally.
pub fn strict_equals(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(Value::Number(x)), Some(Value::Number(y))) => x.as_f64() == y.as_f64(),
        (Some(x), Some(y)) => x == y,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn expr(raw: Value) -> Expr {
        Expr::from_value(&raw).expect("valid expression")
    }

    fn eval_with(raw: Value, node: Value) -> EvalResult {
        let empty = json!({});
        let ctx = Context::new(&node, &empty, &empty, &empty);
        evaluate(&expr(raw), &ctx, 0)
    }

    fn eval(raw: Value) -> Option<Value> {
        eval_with(raw, json!({})).expect("evaluation")
    }

    fn nest(levels: usize) -> Value {
        let mut raw = json!(true);
        for _ in 0..levels {
            raw = json!({"op": "not", "args": [raw]});
        }
        raw
    }

    #[test]
    fn primitives_evaluate_to_themselves() {
        assert_eq!(eval(json!(1.5)), Some(json!(1.5)));
        assert_eq!(eval(json!(false)), Some(json!(false)));
        assert_eq!(eval(Value::Null), Some(Value::Null));
        assert_eq!(eval(json!("text")), Some(json!("text")));
    }

    #[test]
    fn binding_comparison_against_string() {
        let raw = json!("${node.data.status == 'error'}");
        let hit = eval_with(raw.clone(), json!({"data": {"status": "error"}})).expect("eval");
        let miss = eval_with(raw, json!({"data": {"status": "ok"}})).expect("eval");
        assert_eq!(hit, Some(json!(true)));
        assert_eq!(miss, Some(json!(false)));
    }

    #[test]
    fn partial_bindings_stay_literal_strings() {
        let node = json!({"id": "n1", "root": "proj"});
        let check = |raw: &str| eval_with(json!(raw), node.clone()).expect("eval");
        assert_eq!(check("prefix ${node.id}"), Some(json!("prefix ${node.id}")));
        assert_eq!(check("${node.root}/config.toml"), Some(json!("${node.root}/config.toml")));
        assert_eq!(
            eval_with(
                json!({"op": "concat", "args": ["${node.root}", "/config.toml"]}),
                node.clone()
            )
            .expect("eval"),
            Some(json!("proj/config.toml"))
        );
    }

    #[test]
    fn binding_comparison_with_numbers_and_null() {
        let node = json!({"count": 3, "owner": null});
        let check = |raw: &str| eval_with(json!(raw), node.clone()).expect("eval");
        assert_eq!(check("${node.count == 3}"), Some(json!(true)));
        assert_eq!(check("${node.count == 3.0}"), Some(json!(true)));
        assert_eq!(check("${node.count != 4}"), Some(json!(true)));
        assert_eq!(check("${node.owner == null}"), Some(json!(true)));
        assert_eq!(check("${node.missing == null}"), Some(json!(false)));
        assert_eq!(check("${node.count == node.count}"), Some(json!(false)));
        assert_eq!(check("${node.missing == node.other}"), Some(json!(true)));
    }

    #[test]
    fn bare_paths_resolve_each_namespace() {
        let node = json!({"id": "n1"});
        let computed = json!({"title": "Hello"});
        let ui = json!({"open": true});
        let doc = json!({"specVersion": "0.1"});
        let event = json!({"value": "typed"});
        let ctx = Context::new(&node, &computed, &ui, &doc).with_event(Some(&event));
        let check = |raw: &str| evaluate(&expr(json!(raw)), &ctx, 0).expect("eval");
        assert_eq!(check("${node.id}"), Some(json!("n1")));
        assert_eq!(check("${computed.title}"), Some(json!("Hello")));
        assert_eq!(check("${uiState.open}"), Some(json!(true)));
        assert_eq!(check("${document.specVersion}"), Some(json!("0.1")));
        assert_eq!(check("${event.value}"), Some(json!("typed")));
        assert_eq!(check("${session.user}"), None);
    }

    #[test]
    fn event_namespace_is_undefined_outside_events() {
        assert_eq!(eval(json!("${event.value}")), None);
    }

    #[test]
    fn traversal_short_circuits_on_null() {
        let node = json!({"data": null, "items": [{"name": "a"}, {"name": "b"}]});
        let check = |raw: &str| eval_with(json!(raw), node.clone()).expect("eval");
        assert_eq!(check("${node.data.status}"), None);
        assert_eq!(check("${node.data}"), Some(Value::Null));
        assert_eq!(check("${node.items.1.name}"), Some(json!("b")));
        assert_eq!(check("${node.items.9.name}"), None);
        assert_eq!(check("${node.items.length}"), Some(json!(2)));
    }

    #[test]
    fn concat_len_and_case() {
        assert_eq!(
            eval(json!({"op": "concat", "args": ["a", "b", "c"]})),
            Some(json!("abc"))
        );
        assert_eq!(
            eval(json!({"op": "len", "args": [[1, 2, 3]]})),
            Some(json!(3))
        );
        assert_eq!(
            eval(json!({"op": "len", "args": ["hello"]})),
            Some(json!(5))
        );
        assert_eq!(
            eval(json!({"op": "upper", "args": [" Mixed "]})),
            Some(json!(" MIXED "))
        );
        assert_eq!(
            eval(json!({"op": "trim", "args": [{"op": "lower", "args": ["  AbC "]}]})),
            Some(json!("abc"))
        );
    }

    #[test]
    fn concat_stringifies_like_a_display_string() {
        let raw = json!({"op": "concat", "args": ["n=", 2.0, " ", true, null, "${node.none}", [1, 2]]});
        assert_eq!(eval(raw), Some(json!("n=2 true[1,2]")));
    }

    #[test]
    fn missing_args_are_undefined() {
        assert_eq!(eval(json!({"op": "len"})), Some(json!(0)));
        assert_eq!(eval(json!({"op": "upper"})), Some(json!("")));
        assert_eq!(eval(json!({"op": "eq"})), Some(json!(true)));
        assert_eq!(eval(json!({"op": "not"})), Some(json!(true)));
        assert_eq!(eval(json!({"op": "gt", "args": [1]})), Some(json!(false)));
        assert_eq!(eval(json!({"op": "if", "args": [true]})), None);
    }

    #[test]
    fn numeric_comparisons_coerce_or_fail_closed() {
        assert_eq!(eval(json!({"op": "gt", "args": ["x", 1]})), Some(json!(false)));
        assert_eq!(eval(json!({"op": "lte", "args": ["x", 1]})), Some(json!(false)));
        assert_eq!(eval(json!({"op": "gt", "args": ["10", 9]})), Some(json!(true)));
        assert_eq!(eval(json!({"op": "gte", "args": [2, 2]})), Some(json!(true)));
        assert_eq!(eval(json!({"op": "lt", "args": [true, 2]})), Some(json!(false)));
        assert_eq!(eval(json!({"op": "lt", "args": ["", 2]})), Some(json!(false)));
    }

    #[test]
    fn boolean_operators_short_circuit() {
        // The unknown operator after a falsy `and` argument is never reached.
        let and = json!({"op": "and", "args": [false, {"op": "bogus"}]});
        assert_eq!(eval(and), Some(json!(false)));
        let or = json!({"op": "or", "args": ["yes", {"op": "bogus"}]});
        assert_eq!(eval(or), Some(json!(true)));
        assert_eq!(eval(json!({"op": "and", "args": [1, "a", []]})), Some(json!(true)));
        assert_eq!(eval(json!({"op": "or", "args": [0, "", null]})), Some(json!(false)));
    }

    #[test]
    fn if_only_evaluates_the_chosen_branch() {
        let raw = json!({"op": "if", "args": ["${node.ok}", "yes", {"op": "bogus"}]});
        assert_eq!(
            eval_with(raw, json!({"ok": true})).expect("eval"),
            Some(json!("yes"))
        );
        let raw = json!({"op": "if", "args": [0, "yes", "no"]});
        assert_eq!(eval(raw), Some(json!("no")));
    }

    #[test]
    fn unknown_operator_fails_loudly() {
        let err = eval_with(json!({"op": "bogus"}), json!({})).expect_err("unknown op");
        assert_eq!(err, EvalError::UnknownOperator("bogus".to_string()));
    }

    #[test]
    fn depth_limit_is_exact() {
        assert_eq!(eval_with(nest(64), json!({})).expect("64 levels"), Some(json!(true)));
        let err = eval_with(nest(65), json!({})).expect_err("65 levels");
        assert_eq!(err, EvalError::MaxDepthExceeded { max: MAX_DEPTH });
    }

    #[test]
    fn depth_limit_covers_literal_containers() {
        let mut raw = json!(1);
        for _ in 0..70 {
            raw = json!([raw]);
        }
        let err = eval_with(raw, json!({})).expect_err("deep array");
        assert!(matches!(err, EvalError::MaxDepthExceeded { .. }));
    }

    #[test]
    fn containers_apply_json_rules_to_undefined() {
        let raw = json!({"a": "${node.missing}", "b": ["${node.missing}", 1]});
        assert_eq!(eval(raw), Some(json!({"b": [null, 1]})));
    }

    #[test]
    fn evaluation_is_repeatable_and_leaves_context_untouched() {
        let node = json!({"data": {"status": "error"}, "tags": ["x"]});
        let before = node.clone();
        let empty = json!({});
        let ctx = Context::new(&node, &empty, &empty, &empty);
        let e = expr(json!({
            "flag": "${node.data.status == 'error'}",
            "count": {"op": "len", "args": ["${node.tags}"]}
        }));
        let first = evaluate(&e, &ctx, 0).expect("first");
        let second = evaluate(&e, &ctx, 0).expect("second");
        assert_eq!(first, second);
        assert_eq!(first, Some(json!({"flag": true, "count": 1})));
        assert_eq!(node, before);
    }

    #[test]
    fn set_by_path_creates_and_replaces_intermediates() {
        let mut state = json!({"a": 1});
        set_by_path(&mut state, "a.b.c", json!(true));
        set_by_path(&mut state, "x", json!("y"));
        set_by_path(&mut state, "", json!("ignored"));
        assert_eq!(state, json!({"a": {"b": {"c": true}}, "x": "y"}));

        let mut scalar = Value::Null;
        set_by_path(&mut scalar, "flags.ready", json!(false));
        assert_eq!(scalar, json!({"flags": {"ready": false}}));
    }

    #[test]
    fn get_by_path_reads_objects_and_arrays() {
        let state = json!({"list": [{"ok": true}]});
        assert_eq!(get_by_path(&state, "list.0.ok"), Some(&json!(true)));
        assert_eq!(get_by_path(&state, "list.4"), None);
        assert_eq!(get_by_path(&state, ""), Some(&state));
    }

    #[test]
    fn computed_entries_see_earlier_entries() {
        let mut computed = IndexMap::new();
        computed.insert("name".to_string(), expr(json!({"op": "upper", "args": ["${node.name}"]})));
        computed.insert(
            "greeting".to_string(),
            expr(json!({"op": "concat", "args": ["Hi ", "${computed.name}"]})),
        );
        computed.insert("gone".to_string(), expr(json!("${node.missing}")));
        let node = json!({"name": "ada"});
        let out = compute_bindings(&computed, &node, &json!({}), &json!({})).expect("computed");
        assert_eq!(out, json!({"name": "ADA", "greeting": "Hi ADA"}));
    }

    #[test]
    fn operator_names_round_trip() {
        for name in [
            "concat", "trim", "lower", "upper", "len", "eq", "neq", "gt", "gte", "lt", "lte",
            "and", "or", "not", "if",
        ] {
            let op = Operator::from_name(name).expect(name);
            assert_eq!(op.name(), name);
        }
        assert_eq!(Operator::from_name("map"), None);
    }
}
