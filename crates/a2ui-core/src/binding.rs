//! `${...}` binding strings.
//!
//! A binding is the only way a document string reaches into the evaluation
//! context. The grammar is deliberately tiny:
//!
//! - `${path}`: a dot-path whose first segment names a context namespace.
//! - `${path == literal}` / `${path != literal}`: strict comparison against a
//!   quoted string, `true`, `false`, `null`, or a decimal number.
//!
//! Anything else is not a binding and stays a literal string.

use regex::Regex;
use serde_json::{Number, Value};
use std::sync::OnceLock;

static BINDING_RE: OnceLock<Regex> = OnceLock::new();
static NUMBER_RE: OnceLock<Regex> = OnceLock::new();

fn binding_re() -> &'static Regex {
    BINDING_RE.get_or_init(|| {
        Regex::new(r"^\$\{\s*([A-Za-z_$][\w$]*(?:\.[\w$]+)*)\s*(?:(==|!=)\s*(.*?)\s*)?\}$")
            .expect("binding grammar is a valid regex")
    })
}

fn number_re() -> &'static Regex {
    NUMBER_RE.get_or_init(|| Regex::new(r"^-?\d+(?:\.\d+)?$").expect("number literal is a valid regex"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
}

/// Right-hand side of a binding comparison.
///
/// `rhs` is `None` when the literal is not one of the accepted forms; such a
/// comparand only equals an undefined left-hand side.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub op: CompareOp,
    pub rhs: Option<Value>,
}

/// A parsed `${...}` string.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    raw: String,
    path: Vec<String>,
    compare: Option<Comparison>,
}

impl Binding {
    /// Parse a string as a binding. Returns `None` for literal strings.
    pub fn parse(raw: &str) -> Option<Self> {
        let caps = binding_re().captures(raw)?;
        let path = caps
            .get(1)?
            .as_str()
            .split('.')
            .map(ToString::to_string)
            .collect();
        let compare = caps.get(2).map(|op| Comparison {
            op: if op.as_str() == "==" {
                CompareOp::Eq
            } else {
                CompareOp::Ne
            },
            rhs: parse_literal(caps.get(3).map(|m| m.as_str()).unwrap_or_default()),
        });
        Some(Self {
            raw: raw.to_string(),
            path,
            compare,
        })
    }

    /// Original source text, used when the expression is serialized back.
    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn path(&self) -> &[String] {
        &self.path
    }

    pub fn comparison(&self) -> Option<&Comparison> {
        self.compare.as_ref()
    }
}

fn parse_literal(text: &str) -> Option<Value> {
    let text = text.trim();
    for quote in ['\'', '"'] {
        if text.len() >= 2
            && let Some(inner) = text
                .strip_prefix(quote)
                .and_then(|rest| rest.strip_suffix(quote))
        {
            return Some(Value::String(inner.to_string()));
        }
    }
    match text {
        "true" => return Some(Value::Bool(true)),
        "false" => return Some(Value::Bool(false)),
        "null" => return Some(Value::Null),
        _ => {}
    }
    if !number_re().is_match(text) {
        return None;
    }
    if let Ok(int) = text.parse::<i64>() {
        return Some(Value::Number(int.into()));
    }
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_bare_path() {
        let binding = Binding::parse("${node.data.status}").expect("binding");
        assert_eq!(binding.path(), ["node", "data", "status"]);
        assert!(binding.comparison().is_none());
    }

    #[test]
    fn tolerates_inner_whitespace() {
        let binding = Binding::parse("${  uiState.ready  }").expect("binding");
        assert_eq!(binding.path(), ["uiState", "ready"]);
    }

    #[test]
    fn literal_strings_are_not_bindings() {
        assert!(Binding::parse("hello").is_none());
        assert!(Binding::parse("${}").is_none());
        assert!(Binding::parse("prefix ${node.id}").is_none());
        assert!(Binding::parse("${node.id} suffix").is_none());
        assert!(Binding::parse("${node.id + 1}").is_none());
        assert!(Binding::parse("${.node}").is_none());
    }

    #[test]
    fn parses_comparison_literals() {
        let cases = [
            ("${node.x == 'error'}", Some(json!("error"))),
            ("${node.x == \"ok\"}", Some(json!("ok"))),
            ("${node.x != true}", Some(json!(true))),
            ("${node.x == false}", Some(json!(false))),
            ("${node.x == null}", Some(Value::Null)),
            ("${node.x == 42}", Some(json!(42))),
            ("${node.x == -1.5}", Some(json!(-1.5))),
        ];
        for (raw, rhs) in cases {
            let binding = Binding::parse(raw).expect(raw);
            assert_eq!(binding.comparison().expect(raw).rhs, rhs, "{raw}");
        }
    }

    #[test]
    fn unsupported_right_hand_side_is_undefined() {
        for raw in [
            "${node.x == node.y}",
            "${node.x == 1e3}",
            "${node.x == .5}",
            "${node.x == 'unterminated}",
            "${node.x == = 'a'}",
        ] {
            let binding = Binding::parse(raw).expect(raw);
            assert_eq!(binding.comparison().expect(raw).rhs, None, "{raw}");
        }
    }

    #[test]
    fn records_operator() {
        let eq = Binding::parse("${a.b == 1}").expect("eq");
        let ne = Binding::parse("${a.b != 1}").expect("ne");
        assert_eq!(eq.comparison().map(|c| c.op), Some(CompareOp::Eq));
        assert_eq!(ne.comparison().map(|c| c.op), Some(CompareOp::Ne));
    }
}
