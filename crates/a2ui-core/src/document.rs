//! Document contract and validation.
//!
//! `parse_document` is the only way to obtain a [`Document`]. It walks the raw
//! JSON first so the first offending location can be reported as a path,
//! then deserializes. A document either passes completely or is rejected;
//! nothing partially validated is ever returned.
//!
//! Shape summary:
//!
//! | field | type | notes |
//! |---|---|---|
//! | `specVersion` | `"0.1"` | any other value is rejected |
//! | `view` | view node | `type` must be a non-empty string |
//! | `computed` | object of expressions | evaluated in declaration order |
//! | `actions` | action definitions | ids non-empty and unique |
//! | `queries` | query definitions | kind is one of the three probes |

use crate::expr::Expr;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use thiserror::Error;

pub const SPEC_VERSION: &str = "0.1";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub spec_version: String,
    pub view: ViewNode,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub computed: IndexMap<String, Expr>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<ActionDef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub queries: Vec<QueryDef>,
}

impl Document {
    pub fn action(&self, id: &str) -> Option<&ActionDef> {
        self.actions.iter().find(|action| action.id == id)
    }

    pub fn query(&self, id: &str) -> Option<&QueryDef> {
        self.queries.iter().find(|query| query.id == id)
    }

    /// JSON form exposed to expressions as the `document` namespace.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewNode {
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub props: IndexMap<String, Expr>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ViewNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<Expr>,
}

/// Action definition; steps share the same shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionDef {
    #[serde(default)]
    pub id: String,
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input: Option<Expr>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub steps: Vec<ActionDef>,
    #[serde(rename = "if", default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Expr>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub then: Vec<ActionDef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryKind {
    #[serde(rename = "fsTreeSearch")]
    TreeSearch,
    #[serde(rename = "fsDirNonEmpty")]
    DirNonEmpty,
    #[serde(rename = "fsFileExists")]
    FileExists,
}

impl QueryKind {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "fsTreeSearch" => Some(Self::TreeSearch),
            "fsDirNonEmpty" => Some(Self::DirNonEmpty),
            "fsFileExists" => Some(Self::FileExists),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryDef {
    pub id: String,
    pub kind: QueryKind,
    pub input: Expr,
    pub output: QueryOutput,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryOutput {
    pub into: String,
}

/// Structured validation error produced before anything is evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{code} at {path}: {message}")]
pub struct ValidationError {
    pub code: String,
    pub path: String,
    pub message: String,
}

impl ValidationError {
    fn new(code: impl Into<String>, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            path: path.into(),
            message: message.into(),
        }
    }
}

pub fn parse_document(raw: &Value) -> Result<Document, ValidationError> {
    validate_document(raw)?;
    serde_json::from_value(raw.clone()).map_err(|err| {
        ValidationError::new("A2UI_E_PARSE", "$", format!("invalid document: {err}"))
    })
}

/// Parse document text (JSON) and validate it.
pub fn parse_document_str(text: &str) -> Result<Document, ValidationError> {
    let raw: Value = serde_json::from_str(text).map_err(|err| {
        ValidationError::new("A2UI_E_PARSE", "$", format!("invalid JSON: {err}"))
    })?;
    parse_document(&raw)
}

pub fn validate_document(raw: &Value) -> Result<(), ValidationError> {
    let Some(root) = raw.as_object() else {
        return Err(ValidationError::new(
            "A2UI_E_ROOT",
            "$",
            "document must be a JSON object",
        ));
    };

    match root.get("specVersion") {
        Some(Value::String(v)) if v == SPEC_VERSION => {}
        Some(other) => {
            return Err(ValidationError::new(
                "A2UI_E_VERSION",
                "specVersion",
                format!("unsupported specVersion {other}; expected \"{SPEC_VERSION}\""),
            ));
        }
        None => {
            return Err(ValidationError::new(
                "A2UI_E_VERSION",
                "specVersion",
                "specVersion is required",
            ));
        }
    }

    let Some(view) = root.get("view") else {
        return Err(ValidationError::new(
            "A2UI_E_SHAPE",
            "view",
            "view is required",
        ));
    };
    validate_view(view, "view")?;

    if let Some(computed) = root.get("computed") {
        validate_expr_map(computed, "computed")?;
    }
    if let Some(actions) = root.get("actions") {
        validate_actions(actions)?;
    }
    if let Some(queries) = root.get("queries") {
        validate_queries(queries)?;
    }
    Ok(())
}

fn validate_view(node: &Value, path: &str) -> Result<(), ValidationError> {
    let Some(obj) = node.as_object() else {
        return Err(ValidationError::new(
            "A2UI_E_SHAPE",
            path,
            "view node must be an object",
        ));
    };
    match obj.get("type") {
        Some(Value::String(t)) if !t.is_empty() => {}
        _ => {
            return Err(ValidationError::new(
                "A2UI_E_VIEW_TYPE",
                format!("{path}.type"),
                "view node type must be a non-empty string",
            ));
        }
    }
    if let Some(props) = obj.get("props") {
        validate_expr_map(props, &format!("{path}.props"))?;
    }
    if let Some(text) = obj.get("text") {
        validate_expr(text, &format!("{path}.text"))?;
    }
    if let Some(children) = obj.get("children") {
        let Some(children) = children.as_array() else {
            return Err(ValidationError::new(
                "A2UI_E_SHAPE",
                format!("{path}.children"),
                "children must be an array",
            ));
        };
        for (idx, child) in children.iter().enumerate() {
            validate_view(child, &format!("{path}.children[{idx}]"))?;
        }
    }
    Ok(())
}

fn validate_expr_map(value: &Value, path: &str) -> Result<(), ValidationError> {
    let Some(map) = value.as_object() else {
        return Err(ValidationError::new(
            "A2UI_E_SHAPE",
            path,
            "must be an object of expressions",
        ));
    };
    for (key, expr) in map {
        validate_expr(expr, &format!("{path}.{key}"))?;
    }
    Ok(())
}

fn validate_expr(value: &Value, path: &str) -> Result<(), ValidationError> {
    Expr::from_value(value).map(|_| ()).map_err(|err| {
        ValidationError::new("A2UI_E_EXPR", format!("{path}{}", err.path), err.message)
    })
}

fn validate_actions(value: &Value) -> Result<(), ValidationError> {
    let Some(actions) = value.as_array() else {
        return Err(ValidationError::new(
            "A2UI_E_SHAPE",
            "actions",
            "actions must be an array",
        ));
    };
    let mut seen = HashSet::new();
    for (idx, action) in actions.iter().enumerate() {
        let path = format!("actions[{idx}]");
        let id = action.get("id").and_then(Value::as_str).unwrap_or_default();
        if id.is_empty() {
            return Err(ValidationError::new(
                "A2UI_E_ACTION",
                format!("{path}.id"),
                "action id must be a non-empty string",
            ));
        }
        if !seen.insert(id) {
            return Err(ValidationError::new(
                "A2UI_E_DUPLICATE_ID",
                format!("{path}.id"),
                format!("duplicate action id '{id}'"),
            ));
        }
        validate_step(action, &path)?;
    }
    Ok(())
}

fn validate_step(step: &Value, path: &str) -> Result<(), ValidationError> {
    let Some(obj) = step.as_object() else {
        return Err(ValidationError::new(
            "A2UI_E_ACTION",
            path,
            "action step must be an object",
        ));
    };
    match obj.get("id") {
        None | Some(Value::String(_)) => {}
        Some(_) => {
            return Err(ValidationError::new(
                "A2UI_E_ACTION",
                format!("{path}.id"),
                "step id must be a string",
            ));
        }
    }
    match obj.get("kind") {
        Some(Value::String(kind)) if !kind.is_empty() => {}
        _ => {
            return Err(ValidationError::new(
                "A2UI_E_ACTION",
                format!("{path}.kind"),
                "action kind must be a non-empty string",
            ));
        }
    }
    if let Some(input) = obj.get("input") {
        validate_expr(input, &format!("{path}.input"))?;
    }
    if let Some(condition) = obj.get("if") {
        validate_expr(condition, &format!("{path}.if"))?;
    }
    for field in ["steps", "then"] {
        validate_step_list(obj, field, path)?;
    }
    Ok(())
}

fn validate_step_list(
    obj: &Map<String, Value>,
    field: &str,
    path: &str,
) -> Result<(), ValidationError> {
    let Some(list) = obj.get(field) else {
        return Ok(());
    };
    let Some(steps) = list.as_array() else {
        return Err(ValidationError::new(
            "A2UI_E_ACTION",
            format!("{path}.{field}"),
            format!("{field} must be an array of steps"),
        ));
    };
    for (idx, step) in steps.iter().enumerate() {
        validate_step(step, &format!("{path}.{field}[{idx}]"))?;
    }
    Ok(())
}

fn validate_queries(value: &Value) -> Result<(), ValidationError> {
    let Some(queries) = value.as_array() else {
        return Err(ValidationError::new(
            "A2UI_E_SHAPE",
            "queries",
            "queries must be an array",
        ));
    };
    let mut seen = HashSet::new();
    for (idx, query) in queries.iter().enumerate() {
        let path = format!("queries[{idx}]");
        let Some(obj) = query.as_object() else {
            return Err(ValidationError::new(
                "A2UI_E_QUERY",
                path,
                "query must be an object",
            ));
        };
        let id = obj.get("id").and_then(Value::as_str).unwrap_or_default();
        if id.is_empty() {
            return Err(ValidationError::new(
                "A2UI_E_QUERY",
                format!("{path}.id"),
                "query id must be a non-empty string",
            ));
        }
        if !seen.insert(id) {
            return Err(ValidationError::new(
                "A2UI_E_DUPLICATE_ID",
                format!("{path}.id"),
                format!("duplicate query id '{id}'"),
            ));
        }
        let kind = obj.get("kind").and_then(Value::as_str).unwrap_or_default();
        if QueryKind::from_name(kind).is_none() {
            return Err(ValidationError::new(
                "A2UI_E_QUERY",
                format!("{path}.kind"),
                format!(
                    "unsupported query kind '{kind}'; expected fsTreeSearch, fsDirNonEmpty, or fsFileExists"
                ),
            ));
        }
        let Some(input) = obj.get("input") else {
            return Err(ValidationError::new(
                "A2UI_E_QUERY",
                format!("{path}.input"),
                "query input is required",
            ));
        };
        validate_expr(input, &format!("{path}.input"))?;
        let into = obj.get("output").and_then(|out| out.get("into"));
        if !matches!(into, Some(Value::String(_))) {
            return Err(ValidationError::new(
                "A2UI_E_QUERY",
                format!("{path}.output.into"),
                "query output.into must be a string",
            ));
        }
    }
    Ok(())
}
