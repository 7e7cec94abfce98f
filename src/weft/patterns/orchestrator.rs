// SPDX-License-Identifier: MIT

//! Orchestrator-worker: a planner splits the report into sections, one
//! worker branch writes each section, a synthesizer stitches them together.
//!
//! Workers run in isolated branches and see only their `section` payload;
//! their output lands in the append-reduced `completed_sections`.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::adk::client::LlmClient;
use crate::adk::model::Content;
use crate::weft::workflow::graph::{
    CompiledGraph, Dispatch, GraphError, StateGraph, StepContext, StepError, StepOutput, END,
    START,
};
use crate::weft::workflow::state::{FieldType, ReducerType, StateSchema, StateUpdate, WorkflowState};

const SECTION_SEPARATOR: &str = "\n-----------\n";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Section {
    /// Name for this section of the report
    pub name: String,
    /// Brief overview of the main topics and concepts of the section
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Sections {
    /// Sections of the report
    pub sections: Vec<Section>,
}

pub fn schema() -> StateSchema {
    StateSchema::new()
        .field("topic", FieldType::String)
        .field("sections", FieldType::Array)
        .accumulate("completed_sections", FieldType::Array, ReducerType::Append)
        .field("final_report", FieldType::String)
}

async fn orchestrator(state: WorkflowState, ctx: StepContext) -> Result<StepOutput, StepError> {
    let topic = state.get_str("topic").unwrap_or_default();
    let plan: Sections = ctx
        .client()?
        .invoke_structured(&[
            Content::system("Generate a plan for the report."),
            Content::user(format!("Here is the topic of the report: {}", topic)),
        ])
        .await?;
    log::info!("Planned {} sections for '{}'", plan.sections.len(), topic);
    Ok(StateUpdate::new()
        .set("sections", serde_json::to_value(plan.sections)?)
        .into())
}

async fn llm_call(state: WorkflowState, ctx: StepContext) -> Result<StepOutput, StepError> {
    let section: Section = state
        .get_as("section")
        .ok_or("worker branch started without a section payload")?;
    let reply = ctx
        .client()?
        .invoke(&[
            Content::system(
                "Write a report section following the provided name and description. \
                 Include no preamble for each section. Use markdown formatting.",
            ),
            Content::user(format!(
                "Here is the section name: {} and the section description: {}",
                section.name, section.description
            )),
        ])
        .await?;
    Ok(StateUpdate::new()
        .set("completed_sections", vec![reply.text()])
        .into())
}

async fn synthesizer(state: WorkflowState, _ctx: StepContext) -> Result<StepOutput, StepError> {
    let report = state
        .get_array("completed_sections")
        .iter()
        .filter_map(|s| s.as_str())
        .collect::<Vec<_>>()
        .join(SECTION_SEPARATOR);
    Ok(StateUpdate::new().set("final_report", report).into())
}

/// One worker branch per planned section
pub fn assign_workers(state: &WorkflowState) -> Vec<Dispatch> {
    state
        .get_array("sections")
        .iter()
        .map(|section| Dispatch::with("llm_call", "section", section.clone()))
        .collect()
}

pub fn graph(client: LlmClient) -> Result<CompiledGraph, GraphError> {
    let mut graph = StateGraph::new(schema()).with_client(client);
    graph
        .add_fn("orchestrator", orchestrator)
        .add_fn("llm_call", llm_call)
        .add_fn("synthesizer", synthesizer)
        .add_edge(START, "orchestrator")
        .add_fan_out("orchestrator", ["llm_call"], assign_workers)
        .add_edge("llm_call", "synthesizer")
        .add_edge("synthesizer", END);
    graph.compile()
}
