//! View resolution and the component registry.
//!
//! Rendering happens in two passes. [`resolve_view`] evaluates every `props`
//! and `text` expression of the view tree against one [`Context`], then a
//! [`Registry`] folds the resolved tree into whatever output type the host
//! renders to. Factories only ever see resolved values.

use crate::document::ViewNode;
use crate::runtime::{Context, EvalError, evaluate};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::warn;

/// View node with every expression evaluated. Undefined props are omitted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedNode {
    #[serde(rename = "type")]
    pub node_type: String,
    pub props: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<ResolvedNode>,
}

impl ResolvedNode {
    pub fn prop(&self, key: &str) -> Option<&Value> {
        self.props.get(key)
    }
}

pub fn resolve_view(view: &ViewNode, ctx: &Context) -> Result<ResolvedNode, EvalError> {
    let mut props = Map::new();
    for (key, expr) in &view.props {
        if let Some(value) = evaluate(expr, ctx, 0)? {
            props.insert(key.clone(), value);
        }
    }
    let text = match &view.text {
        Some(expr) => evaluate(expr, ctx, 0)?,
        None => None,
    };
    let children = view
        .children
        .iter()
        .map(|child| resolve_view(child, ctx))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ResolvedNode {
        node_type: view.node_type.clone(),
        props,
        text,
        children,
    })
}

/// Builds one output value from a resolved node and its rendered children.
pub type Factory<R> = fn(&ResolvedNode, Vec<R>) -> R;

/// Component registry keyed by view node `type`.
///
/// Registration is instance-local, so two hosts can map the same type name
/// to different components.
pub struct Registry<R> {
    factories: HashMap<String, Factory<R>>,
    fallback: Factory<R>,
}

impl<R> Registry<R> {
    /// `fallback` renders nodes whose type has no factory. It receives no
    /// children; the subtree below an unknown node is skipped.
    pub fn new(fallback: Factory<R>) -> Self {
        Self {
            factories: HashMap::new(),
            fallback,
        }
    }

    /// Register or replace a factory.
    pub fn register(&mut self, name: impl Into<String>, factory: Factory<R>) -> Option<Factory<R>> {
        self.factories.insert(name.into(), factory)
    }

    pub fn get(&self, name: &str) -> Option<Factory<R>> {
        self.factories.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    pub fn render(&self, node: &ResolvedNode) -> R {
        match self.factories.get(&node.node_type) {
            Some(factory) => {
                let children = node.children.iter().map(|child| self.render(child)).collect();
                factory(node, children)
            }
            None => {
                warn!(node_type = %node.node_type, "no component registered, using fallback");
                (self.fallback)(node, Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::to_display_string;
    use serde_json::json;

    fn view(raw: Value) -> ViewNode {
        serde_json::from_value(raw).expect("view node")
    }

    fn stack(_node: &ResolvedNode, children: Vec<String>) -> String {
        format!("<stack>{}</stack>", children.concat())
    }

    fn text(node: &ResolvedNode, _children: Vec<String>) -> String {
        format!("<text>{}</text>", to_display_string(node.text.as_ref()))
    }

    fn unknown(node: &ResolvedNode, _children: Vec<String>) -> String {
        format!("<!-- {} -->", node.node_type)
    }

    #[test]
    fn resolves_props_and_text() {
        let root = view(json!({
            "type": "Stack",
            "props": {"gap": 4, "title": "${node.title}", "missing": "${node.nope}"},
            "children": [
                {"type": "Text", "text": {"op": "concat", "args": ["Status: ", "${computed.status}"]}},
                {"type": "Badge", "props": {"error": "${uiState.status == 'error'}"}}
            ]
        }));
        let node = json!({"title": "Build"});
        let computed = json!({"status": "error"});
        let ui = json!({"status": "error"});
        let doc = json!({});
        let ctx = Context::new(&node, &computed, &ui, &doc);
        let resolved = resolve_view(&root, &ctx).expect("resolve");
        assert_eq!(
            serde_json::to_value(&resolved).expect("serialize"),
            json!({
                "type": "Stack",
                "props": {"gap": 4, "title": "Build"},
                "children": [
                    {"type": "Text", "props": {}, "text": "Status: error"},
                    {"type": "Badge", "props": {"error": true}}
                ]
            })
        );
        assert_eq!(resolved.prop("gap"), Some(&json!(4)));
    }

    #[test]
    fn evaluation_fault_fails_the_render() {
        let root = view(json!({
            "type": "Stack",
            "children": [{"type": "Text", "text": {"op": "bogus"}}]
        }));
        let empty = json!({});
        let ctx = Context::new(&empty, &empty, &empty, &empty);
        assert_eq!(
            resolve_view(&root, &ctx),
            Err(EvalError::UnknownOperator("bogus".to_string()))
        );
    }

    #[test]
    fn registry_renders_tree_with_fallback() {
        let mut registry: Registry<String> = Registry::new(unknown);
        assert!(registry.register("Stack", stack).is_none());
        registry.register("Text", text);
        assert!(registry.contains("Text"));
        assert!(registry.get("Chart").is_none());

        let root = view(json!({
            "type": "Stack",
            "children": [
                {"type": "Text", "text": "hi"},
                {"type": "Chart", "children": [{"type": "Text", "text": "hidden"}]}
            ]
        }));
        let empty = json!({});
        let ctx = Context::new(&empty, &empty, &empty, &empty);
        let resolved = resolve_view(&root, &ctx).expect("resolve");
        assert_eq!(
            registry.render(&resolved),
            "<stack><text>hi</text><!-- Chart --></stack>"
        );
    }

    #[test]
    fn register_replaces_existing_factory() {
        let mut registry: Registry<String> = Registry::new(unknown);
        registry.register("Text", unknown);
        assert!(registry.register("Text", text).is_some());
        let node = ResolvedNode {
            node_type: "Text".to_string(),
            props: Map::new(),
            text: Some(json!(3)),
            children: Vec::new(),
        };
        assert_eq!(registry.render(&node), "<text>3</text>");
    }
}
