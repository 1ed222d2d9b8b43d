//! `nodeflow` CLI entry-point.
//!
//! Available sub-commands:
//! - `run`:      execute a workflow definition and print the run result.
//! - `validate`: check a definition and print its execution order.
//! - `handlers`: list the node types the built-in registry provides.
//!
//! Logs go to stderr; stdout only ever carries the command's output.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

use engine::{RunResult, WorkflowDefinition, WorkflowExecutor};
use nodes::{NodeRegistry, NodesConfig};

#[derive(Parser)]
#[command(name = "nodeflow", about = "Run DAG workflow definitions", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute a workflow definition once.
    Run {
        /// Path to the workflow JSON file.
        path: PathBuf,
        /// Trigger payload as inline JSON.
        #[arg(long, conflicts_with = "trigger_file")]
        trigger: Option<String>,
        /// Read the trigger payload from a file.
        #[arg(long)]
        trigger_file: Option<PathBuf>,
        /// Identifier attached to logs and node metadata.
        #[arg(long, env = "NODEFLOW_WORKFLOW_ID")]
        workflow_id: Option<String>,
        #[command(flatten)]
        nodes: NodesArgs,
        /// Pretty-print the result.
        #[arg(long)]
        pretty: bool,
    },
    /// Validate a workflow definition JSON file.
    Validate {
        /// Path to the workflow JSON file.
        path: PathBuf,
    },
    /// List registered node types.
    Handlers {
        #[command(flatten)]
        nodes: NodesArgs,
    },
}

#[derive(Args)]
struct NodesArgs {
    /// Timeout for each outbound `http` node request.
    #[arg(
        long,
        env = "NODEFLOW_HTTP_TIMEOUT_SECS",
        default_value_t = 15,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    http_timeout_secs: u64,
    /// Register the `function` node type.
    #[arg(long, env = "NODEFLOW_ENABLE_FUNCTION")]
    enable_function: bool,
}

impl NodesArgs {
    fn config(&self) -> NodesConfig {
        NodesConfig {
            http_timeout: Duration::from_secs(self.http_timeout_secs),
            enable_function: self.enable_function,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("nodeflow=info,engine=info,nodes=info,warn")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Run {
            path,
            trigger,
            trigger_file,
            workflow_id,
            nodes,
            pretty,
        } => {
            let definition = load_definition(&path)?;
            let trigger = load_trigger(trigger.as_deref(), trigger_file.as_deref())?;

            info!("running {} ({} nodes)", path.display(), definition.nodes.len());
            let result = run_workflow(&definition, trigger, workflow_id.as_deref(), &nodes.config()).await;

            let rendered = if pretty {
                serde_json::to_string_pretty(&result)?
            } else {
                serde_json::to_string(&result)?
            };
            println!("{rendered}");

            Ok(Outcome::of_run(&result).into())
        }

        Command::Validate { path } => {
            let definition = load_definition(&path)?;
            Ok(validate_workflow(&definition).into())
        }

        Command::Handlers { nodes } => {
            let registry = NodeRegistry::with_builtins(&nodes.config());
            for node_type in registry.node_types() {
                println!("{node_type}");
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Whether a command succeeded; maps onto the process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Success,
    Failure,
}

impl Outcome {
    fn of_run(result: &RunResult) -> Self {
        if result.is_success() {
            Self::Success
        } else {
            Self::Failure
        }
    }
}

impl From<Outcome> for ExitCode {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Success => ExitCode::SUCCESS,
            Outcome::Failure => ExitCode::FAILURE,
        }
    }
}

async fn run_workflow(
    definition: &WorkflowDefinition,
    trigger: Value,
    workflow_id: Option<&str>,
    config: &NodesConfig,
) -> RunResult {
    let registry = NodeRegistry::with_builtins(config);
    let executor = WorkflowExecutor::new(Arc::new(registry));
    executor.run(definition, trigger, workflow_id).await
}

fn validate_workflow(definition: &WorkflowDefinition) -> Outcome {
    match engine::validate_dag(definition) {
        Ok(order) => {
            println!("workflow is valid; execution order: {}", order.join(" -> "));
            Outcome::Success
        }
        Err(e) => {
            eprintln!("validation failed: {e}");
            Outcome::Failure
        }
    }
}

// ---------------------------------------------------------------------------
// Input loading
// ---------------------------------------------------------------------------

fn load_definition(path: &Path) -> anyhow::Result<WorkflowDefinition> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read file {}", path.display()))?;
    let document: Value = serde_json::from_str(&content)
        .with_context(|| format!("{} is not valid JSON", path.display()))?;
    parse_definition(document).with_context(|| format!("{} is not a workflow definition", path.display()))
}

/// Accepts a bare `{nodes, edges}` document or a stored workflow record
/// carrying it under `definition`.
fn parse_definition(document: Value) -> anyhow::Result<WorkflowDefinition> {
    let document = match document {
        Value::Object(mut record) => match record.remove("definition") {
            Some(definition) => definition,
            None => Value::Object(record),
        },
        other => bail!("expected a JSON object, found {}", json_type(&other)),
    };
    Ok(serde_json::from_value(document)?)
}

fn load_trigger(inline: Option<&str>, file: Option<&Path>) -> anyhow::Result<Value> {
    if let Some(raw) = inline {
        return serde_json::from_str(raw).context("--trigger is not valid JSON");
    }
    if let Some(path) = file {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read trigger file {}", path.display()))?;
        return serde_json::from_str(&content)
            .with_context(|| format!("trigger file {} is not valid JSON", path.display()));
    }
    Ok(Value::Object(Default::default()))
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use serde_json::json;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn bare_definitions_and_records_both_load() {
        let bare = json!({ "nodes": [{ "id": "a", "type": "set" }], "edges": [] });
        let record = json!({ "id": "wf-1", "name": "demo", "definition": bare.clone() });

        let from_bare = parse_definition(bare).unwrap();
        let from_record = parse_definition(record).unwrap();
        assert_eq!(from_bare, from_record);
        assert_eq!(from_bare.nodes[0].id, "a");
    }

    #[test]
    fn non_object_documents_are_rejected() {
        let err = parse_definition(json!([1, 2])).unwrap_err();
        assert!(err.to_string().contains("an array"));
    }

    #[test]
    fn trigger_defaults_to_an_empty_object() {
        assert_eq!(load_trigger(None, None).unwrap(), json!({}));
        assert_eq!(load_trigger(Some(r#"{"id": 3}"#), None).unwrap(), json!({ "id": 3 }));
        assert!(load_trigger(Some("{nope"), None).is_err());
    }

    #[test]
    fn run_flags_map_onto_nodes_config() {
        let cli = Cli::try_parse_from([
            "nodeflow",
            "run",
            "wf.json",
            "--http-timeout-secs",
            "3",
            "--enable-function",
        ])
        .unwrap();
        match cli.command {
            Command::Run { path, nodes, pretty, .. } => {
                assert_eq!(path, PathBuf::from("wf.json"));
                assert!(!pretty);
                let config = nodes.config();
                assert_eq!(config.http_timeout, Duration::from_secs(3));
                assert!(config.enable_function);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn zero_http_timeout_is_rejected() {
        let parsed = Cli::try_parse_from(["nodeflow", "handlers", "--http-timeout-secs", "0"]);
        assert!(parsed.is_err());
    }

    #[test]
    fn environment_fills_in_missing_flags() {
        std::env::set_var("NODEFLOW_HTTP_TIMEOUT_SECS", "7");
        std::env::set_var("NODEFLOW_ENABLE_FUNCTION", "true");
        std::env::set_var("NODEFLOW_WORKFLOW_ID", "wf-env");

        let from_env = Cli::try_parse_from(["nodeflow", "run", "wf.json"]);
        let overridden = Cli::try_parse_from([
            "nodeflow",
            "run",
            "wf.json",
            "--http-timeout-secs",
            "2",
            "--workflow-id",
            "wf-flag",
        ]);

        std::env::remove_var("NODEFLOW_HTTP_TIMEOUT_SECS");
        std::env::remove_var("NODEFLOW_ENABLE_FUNCTION");
        std::env::remove_var("NODEFLOW_WORKFLOW_ID");

        match from_env.unwrap().command {
            Command::Run { workflow_id, nodes, .. } => {
                assert_eq!(workflow_id.as_deref(), Some("wf-env"));
                let config = nodes.config();
                assert_eq!(config.http_timeout, Duration::from_secs(7));
                assert!(config.enable_function);
            }
            _ => panic!("expected run"),
        }
        match overridden.unwrap().command {
            Command::Run { workflow_id, nodes, .. } => {
                assert_eq!(workflow_id.as_deref(), Some("wf-flag"));
                assert_eq!(nodes.config().http_timeout, Duration::from_secs(2));
            }
            _ => panic!("expected run"),
        }
    }

    fn definition(value: Value) -> WorkflowDefinition {
        parse_definition(value).unwrap()
    }

    #[tokio::test]
    async fn failed_runs_exit_with_failure() {
        let def = definition(json!({
            "nodes": [
                { "id": "a", "type": "set", "data": { "values": { "x": 1 } } },
                { "id": "b", "type": "teleport" }
            ],
            "edges": [{ "source": "a", "target": "b" }]
        }));

        let result = run_workflow(&def, json!({}), Some("wf-1"), &NodesConfig::default()).await;
        assert_eq!(Outcome::of_run(&result), Outcome::Failure);
        assert!(result.context.contains("a"));
    }

    #[tokio::test]
    async fn successful_runs_exit_with_success() {
        let def = definition(json!({
            "nodes": [{ "id": "a", "type": "set", "data": { "values": { "x": 1 } } }]
        }));

        let result = run_workflow(&def, json!({}), None, &NodesConfig::default()).await;
        assert_eq!(Outcome::of_run(&result), Outcome::Success);
    }

    #[tokio::test]
    async fn enable_function_reaches_the_registry() {
        let def = definition(json!({
            "nodes": [{ "id": "f", "type": "function", "data": { "expr": "1 + 1" } }]
        }));
        let enabled = NodesConfig {
            enable_function: true,
            ..NodesConfig::default()
        };

        let off = run_workflow(&def, json!({}), None, &NodesConfig::default()).await;
        let on = run_workflow(&def, json!({}), None, &enabled).await;
        assert_eq!(Outcome::of_run(&off), Outcome::Failure);
        assert_eq!(on.output("f"), Some(&json!(2)));
    }

    #[test]
    fn validate_fails_on_scheduling_errors() {
        let cyclic = definition(json!({
            "nodes": [{ "id": "a", "type": "set" }, { "id": "b", "type": "set" }],
            "edges": [{ "source": "a", "target": "b" }, { "source": "b", "target": "a" }]
        }));
        let dangling = definition(json!({
            "nodes": [{ "id": "a", "type": "set" }],
            "edges": [{ "source": "a", "target": "ghost" }]
        }));
        let valid = definition(json!({
            "nodes": [{ "id": "a", "type": "set" }, { "id": "b", "type": "set" }],
            "edges": [{ "source": "a", "target": "b" }]
        }));

        assert_eq!(validate_workflow(&cyclic), Outcome::Failure);
        assert_eq!(validate_workflow(&dangling), Outcome::Failure);
        assert_eq!(validate_workflow(&valid), Outcome::Success);
    }
}
