// SPDX-License-Identifier: MIT

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use weft_rs::adk::client::LlmClient;
use weft_rs::adk::model::anthropic::AnthropicModel;
use weft_rs::adk::model::scripted::ScriptedModel;
use weft_rs::adk::model::Model;
use weft_rs::weft::patterns::{augmented, research_scope, Pattern};
use weft_rs::weft::workflow::builder::WorkflowBuilder;
use weft_rs::weft::workflow::checkpoint::{Checkpointer, FileSaver, MemorySaver};
use weft_rs::weft::workflow::graph::{CompiledGraph, RunConfig, RunStatus};
use weft_rs::weft::workflow::state::StateUpdate;

const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Replay model replies from a JSON script instead of calling the API
    #[arg(long, global = true)]
    script: Option<PathBuf>,

    /// Model name; defaults to $MODEL_NAME
    #[arg(short, long, global = true)]
    model: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Send a single prompt
    Run {
        #[arg(short, long)]
        prompt: String,
    },
    /// Run one of the built-in patterns
    Pattern {
        /// augmented, chaining, routing, parallel, orchestrator, evaluator or research_scope
        name: String,

        /// Initial state as a JSON object; research_scope also takes {"message": "..."}
        #[arg(short, long, default_value = "{}")]
        input: String,

        #[command(flatten)]
        run: RunArgs,
    },
    /// Run a workflow from a YAML file
    Workflow {
        #[arg(short, long)]
        file: PathBuf,

        /// Initial state as a JSON object
        #[arg(short, long, default_value = "{}")]
        input: String,

        #[command(flatten)]
        run: RunArgs,
    },
    /// Print a graph as a Mermaid flowchart
    Graph {
        /// Workflow file to draw
        #[arg(short, long, conflicts_with = "pattern")]
        file: Option<PathBuf>,

        /// Built-in pattern to draw
        #[arg(short, long)]
        pattern: Option<String>,
    },
}

#[derive(clap::Args, Debug)]
struct RunArgs {
    /// Thread id; checkpoints are kept per thread
    #[arg(short, long)]
    thread: Option<String>,

    /// Store checkpoints as JSON files in this directory
    #[arg(long)]
    checkpoint_dir: Option<PathBuf>,

    /// Fail after this many supersteps
    #[arg(long)]
    recursion_limit: Option<usize>,
}

impl RunArgs {
    fn checkpointer(&self) -> Option<Arc<dyn Checkpointer>> {
        match (&self.checkpoint_dir, &self.thread) {
            (Some(dir), _) => Some(Arc::new(FileSaver::new(dir))),
            (None, Some(_)) => Some(Arc::new(MemorySaver::new())),
            (None, None) => None,
        }
    }

    fn config(&self) -> RunConfig {
        let config = match &self.thread {
            Some(thread) => RunConfig::thread(thread.clone()),
            None => RunConfig::default(),
        };
        match self.recursion_limit {
            Some(limit) => config.with_recursion_limit(limit),
            None => config,
        }
    }
}

fn client(script: Option<&Path>, model_name: Option<String>) -> anyhow::Result<LlmClient> {
    let model: Arc<dyn Model> = match script {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("cannot read script {}", path.display()))?;
            let script: Value = serde_json::from_str(&text)?;
            Arc::new(ScriptedModel::from_script(&script)?)
        }
        None => {
            let name = model_name
                .or_else(|| std::env::var("MODEL_NAME").ok())
                .unwrap_or_else(|| DEFAULT_MODEL.to_string());
            log::info!("Using Anthropic model {}", name);
            Arc::new(AnthropicModel::new(name)?)
        }
    };
    Ok(LlmClient::new(model))
}

fn parse_input(input: &str) -> anyhow::Result<Value> {
    let value: Value = serde_json::from_str(input).context("--input must be JSON")?;
    if !value.is_object() {
        bail!("--input must be a JSON object, got {}", value);
    }
    Ok(value)
}

async fn execute(graph: &CompiledGraph, input: Value, run: &RunArgs) -> anyhow::Result<()> {
    log::debug!("\n{}", graph.draw_mermaid());
    let update = StateUpdate::from_json(input).context("--input must be a JSON object")?;

    let outcome = match graph.invoke(update, &run.config()).await {
        Ok(outcome) => outcome,
        Err(err) => {
            log::error!("State at failure: {}", err.state.to_json());
            return Err(err.into());
        }
    };

    println!("{}", serde_json::to_string_pretty(&outcome.state.to_json())?);
    if let RunStatus::Interrupted { before } = &outcome.status {
        eprintln!(
            "Halted before '{}'; invoke again on the same thread to resume",
            before
        );
    }
    log::info!(
        "Finished after {} supersteps: {}",
        outcome.supersteps,
        outcome.trace.join(" -> ")
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();
    let script = args.script.as_deref();

    match args.command {
        Commands::Run { prompt } => {
            let client = client(script, args.model)?;
            println!("{}", client.prompt(prompt).await?);
        }
        Commands::Pattern { name, input, run } => {
            let pattern: Pattern = name.parse()?;
            let client = client(script, args.model)?;
            let mut input = parse_input(&input)?;

            if pattern == Pattern::Augmented {
                let out = augmented::run(client, &input).await?;
                println!("{}", serde_json::to_string_pretty(&out)?);
                return Ok(());
            }
            if pattern == Pattern::ResearchScope {
                let turn = input
                    .get("message")
                    .and_then(Value::as_str)
                    .map(research_scope::user_turn);
                if let Some(turn) = turn {
                    input = Value::Object(turn.into_map());
                }
            }

            let graph = pattern.graph(client, run.checkpointer())?;
            execute(&graph, input, &run).await?;
        }
        Commands::Workflow { file, input, run } => {
            let client = client(script, args.model)?;
            let mut builder = WorkflowBuilder::new(Some(client));
            if let Some(checkpointer) = run.checkpointer() {
                builder = builder.with_checkpointer(checkpointer);
            }
            let graph = builder.build_file(&file)?;
            execute(&graph, parse_input(&input)?, &run).await?;
        }
        Commands::Graph { file, pattern } => {
            let graph = match (file, pattern) {
                (Some(file), _) => WorkflowBuilder::new(None).build_file(&file)?,
                (None, Some(name)) => {
                    let offline = LlmClient::new(Arc::new(ScriptedModel::new(Vec::new())));
                    name.parse::<Pattern>()?.graph(offline, None)?
                }
                (None, None) => bail!("pass --file or --pattern"),
            };
            for warning in graph.warnings() {
                eprintln!("warning: {}", warning);
            }
            print!("{}", graph.draw_mermaid());
        }
    }

    Ok(())
}
