//! Headless driver for A2UI documents.
//!
//! Validates, evaluates, renders and drives actions and queries of a document
//! without a live host. Every command prints pretty JSON on stdout; tracing
//! goes to stderr.

pub mod config;
pub mod host;
pub mod local_fs;
pub mod logging;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use a2ui_core::{Context, Expr, Surface, evaluate_value, parse_document};
use anyhow::{Context as _, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::{Map, Value, json};

use crate::config::{CliConfig, DEFAULT_CONFIG_FILE, load_config};
use crate::host::RecordingHost;
use crate::local_fs::LocalFs;

#[derive(Debug, Parser)]
#[command(name = "a2ui", version, about = "Headless driver for A2UI documents")]
pub struct Cli {
    /// Config file (defaults to ./a2ui.toml when present).
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// JSON arguments take inline JSON or `@path` to a JSON file.
#[derive(Debug, Clone, Default, Args)]
pub struct StateArgs {
    /// Host node snapshot exposed as `node`.
    #[arg(long, value_name = "JSON")]
    pub node: Option<String>,

    /// Initial `uiState`.
    #[arg(long = "ui-state", value_name = "JSON")]
    pub ui_state: Option<String>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Validate a document.
    Check { doc: PathBuf },
    /// Evaluate one expression.
    Eval {
        expr: String,
        #[command(flatten)]
        state: StateArgs,
        #[arg(long, value_name = "JSON")]
        event: Option<String>,
    },
    /// Resolve the view tree and computed bindings.
    Render {
        doc: PathBuf,
        #[command(flatten)]
        state: StateArgs,
    },
    /// Run queries against the local filesystem.
    Query {
        doc: PathBuf,
        #[arg(long = "id", required = true, value_name = "QUERY")]
        ids: Vec<String>,
        #[command(flatten)]
        state: StateArgs,
    },
    /// Dispatch an action with a recording host.
    Dispatch {
        doc: PathBuf,
        action: String,
        #[arg(long, value_name = "JSON")]
        event: Option<String>,
        #[command(flatten)]
        state: StateArgs,
    },
}

pub async fn run_from_env() -> Result<()> {
    run(Cli::parse()).await
}

pub async fn run(cli: Cli) -> Result<()> {
    let cfg = match &cli.config {
        Some(path) => load_config(path)?,
        None => load_config(Path::new(DEFAULT_CONFIG_FILE))?,
    };
    logging::init(&cfg.log_filter);
    let output = execute(cli.command, &cfg).await?;
    let pretty = serde_json::to_string_pretty(&output).context("serialize output")?;
    println!("{pretty}");
    Ok(())
}

/// Run one command and return what it would print.
pub async fn execute(command: Command, cfg: &CliConfig) -> Result<Value> {
    match command {
        Command::Check { doc } => check(&doc),
        Command::Eval { expr, state, event } => eval(&expr, &state, event.as_deref()),
        Command::Render { doc, state } => render(&doc, &state),
        Command::Query { doc, ids, state } => query(&doc, &ids, &state, cfg).await,
        Command::Dispatch {
            doc,
            action,
            event,
            state,
        } => dispatch(&doc, &action, event.as_deref(), &state).await,
    }
}

fn check(doc: &Path) -> Result<Value> {
    let raw = read_json_file(doc)?;
    let document =
        parse_document(&raw).with_context(|| format!("invalid document {}", doc.display()))?;
    Ok(json!({
        "ok": true,
        "specVersion": document.spec_version,
        "view": document.view.node_type,
        "computed": document.computed.keys().collect::<Vec<_>>(),
        "actions": document.actions.iter().map(|a| a.id.as_str()).collect::<Vec<_>>(),
        "queries": document.queries.iter().map(|q| q.id.as_str()).collect::<Vec<_>>(),
    }))
}

fn eval(raw_expr: &str, state: &StateArgs, event: Option<&str>) -> Result<Value> {
    let raw = parse_json_arg(raw_expr, "expression")?;
    let expr = Expr::from_value(&raw).context("invalid expression")?;
    let node = optional_json(state.node.as_deref(), "--node")?;
    let ui_state = optional_json(state.ui_state.as_deref(), "--ui-state")?;
    let event = event.map(|e| parse_json_arg(e, "--event")).transpose()?;
    let empty = Value::Object(Map::new());
    let ctx = Context::new(&node, &empty, &ui_state, &empty).with_event(event.as_ref());
    evaluate_value(&expr, &ctx).context("evaluation failed")
}

fn render(doc: &Path, state: &StateArgs) -> Result<Value> {
    let surface = attach(doc, state)?;
    let computed = surface.computed().context("computed bindings failed")?;
    let view = surface.resolve_view().context("view resolution failed")?;
    Ok(json!({"computed": computed, "view": view}))
}

async fn query(doc: &Path, ids: &[String], state: &StateArgs, cfg: &CliConfig) -> Result<Value> {
    let mut surface = attach(doc, state)?;
    let probe = LocalFs::new(&cfg.fs.root, cfg.fs.max_tree_depth);
    let mut results = BTreeMap::new();
    surface
        .run_queries(ids, &probe, |id, found| {
            results.insert(id.to_string(), found);
        })
        .await
        .context("query batch failed")?;
    Ok(json!({"results": results, "uiState": surface.detach()}))
}

async fn dispatch(doc: &Path, action: &str, event: Option<&str>, state: &StateArgs) -> Result<Value> {
    let mut surface = attach(doc, state)?;
    let event = event.map(|e| parse_json_arg(e, "--event")).transpose()?;
    let host = RecordingHost::new();
    surface
        .dispatch(action, event.as_ref(), &host)
        .await
        .with_context(|| format!("action '{action}' failed"))?;
    let last_action = surface.last_action().map(ToString::to_string);
    Ok(json!({
        "action": last_action,
        "hostCalls": host.into_calls(),
        "uiState": surface.detach(),
    }))
}

fn attach(doc: &Path, state: &StateArgs) -> Result<Surface> {
    let raw = read_json_file(doc)?;
    let seed = optional_json(state.ui_state.as_deref(), "--ui-state")?;
    let mut surface =
        Surface::attach(&raw, seed).with_context(|| format!("invalid document {}", doc.display()))?;
    surface.set_node(optional_json(state.node.as_deref(), "--node")?);
    Ok(surface)
}

fn read_json_file(path: &Path) -> Result<Value> {
    let source = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&source).with_context(|| format!("parse {}", path.display()))
}

/// Inline JSON, or `@path` to read it from a file.
fn parse_json_arg(raw: &str, what: &str) -> Result<Value> {
    match raw.strip_prefix('@') {
        Some(path) => read_json_file(Path::new(path)).with_context(|| format!("load {what}")),
        None => serde_json::from_str(raw).with_context(|| format!("invalid {what} JSON")),
    }
}

fn optional_json(raw: Option<&str>, what: &str) -> Result<Value> {
    match raw {
        Some(raw) => parse_json_arg(raw, what),
        None => Ok(Value::Object(Map::new())),
    }
}
