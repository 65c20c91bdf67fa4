//! Expression tree.
//!
//! Documents carry expressions as plain JSON. They are lowered once, at
//! deserialization, into [`Expr`]: binding strings are pre-parsed and every
//! object with a string `op` field becomes [`Expr::Op`]. That single
//! discriminant is the whole literal-vs-operator rule; an object literal that
//! needs an `op` string field cannot be expressed.

use crate::binding::Binding;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Number, Value};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Null,
    Bool(bool),
    Number(Number),
    Text(String),
    Binding(Binding),
    Array(Vec<Expr>),
    Object(IndexMap<String, Expr>),
    Op { op: String, args: Vec<Expr> },
}

/// Shape error found while lowering JSON into an [`Expr`].
///
/// `path` is relative to the expression root (`""` for the root itself).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExprShapeError {
    pub path: String,
    pub message: String,
}

impl fmt::Display for ExprShapeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

impl std::error::Error for ExprShapeError {}

impl ExprShapeError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            path: String::new(),
            message: message.into(),
        }
    }

    fn within(mut self, segment: &str) -> Self {
        self.path = format!("{segment}{}", self.path);
        self
    }
}

impl Expr {
    /// Lower a JSON value into an expression.
    pub fn from_value(value: &Value) -> Result<Self, ExprShapeError> {
        match value {
            Value::Null => Ok(Self::Null),
            Value::Bool(b) => Ok(Self::Bool(*b)),
            Value::Number(n) => Ok(Self::Number(n.clone())),
            Value::String(s) => Ok(match Binding::parse(s) {
                Some(binding) => Self::Binding(binding),
                None => Self::Text(s.clone()),
            }),
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(idx, item)| {
                    Self::from_value(item).map_err(|err| err.within(&format!("[{idx}]")))
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Self::Array),
            Value::Object(obj) => {
                if let Some(op) = obj.get("op").and_then(Value::as_str) {
                    return Self::op_from_object(op, obj);
                }
                let mut out = IndexMap::with_capacity(obj.len());
                for (key, item) in obj {
                    let expr =
                        Self::from_value(item).map_err(|err| err.within(&format!(".{key}")))?;
                    out.insert(key.clone(), expr);
                }
                Ok(Self::Object(out))
            }
        }
    }

    fn op_from_object(op: &str, obj: &Map<String, Value>) -> Result<Self, ExprShapeError> {
        let args = match obj.get("args") {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items
                .iter()
                .enumerate()
                .map(|(idx, item)| {
                    Self::from_value(item)
                        .map_err(|err| err.within(&format!(".args[{idx}]")))
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) => {
                return Err(ExprShapeError::new(format!(
                    "operator '{op}' args must be an array"
                ))
                .within(".args"));
            }
        };
        Ok(Self::Op {
            op: op.to_string(),
            args,
        })
    }

    /// JSON form of the expression, as a document author would write it.
    pub fn to_value(&self) -> Value {
        match self {
            Self::Null => Value::Null,
            Self::Bool(b) => Value::Bool(*b),
            Self::Number(n) => Value::Number(n.clone()),
            Self::Text(s) => Value::String(s.clone()),
            Self::Binding(binding) => Value::String(binding.raw().to_string()),
            Self::Array(items) => Value::Array(items.iter().map(Self::to_value).collect()),
            Self::Object(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(key, expr)| (key.clone(), expr.to_value()))
                    .collect(),
            ),
            Self::Op { op, args } => {
                let mut obj = Map::new();
                obj.insert("op".to_string(), Value::String(op.clone()));
                if !args.is_empty() {
                    obj.insert(
                        "args".to_string(),
                        Value::Array(args.iter().map(Self::to_value).collect()),
                    );
                }
                Value::Object(obj)
            }
        }
    }
}

impl<'de> Deserialize<'de> for Expr {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(&value).map_err(serde::de::Error::custom)
    }
}

impl Serialize for Expr {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.to_value().serialize(serializer)
    }
}
