// SPDX-License-Identifier: MIT

//! Evaluator-optimizer: one call writes, another grades and gives feedback,
//! and the loop repeats until the grade passes or the retries run out.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::adk::client::LlmClient;
use crate::adk::model::Content;
use crate::weft::workflow::graph::{
    CompiledGraph, GraphError, StateGraph, StepContext, StepError, StepOutput, END, START,
};
use crate::weft::workflow::state::{FieldType, StateSchema, StateUpdate, WorkflowState};

/// Writes allowed after the first one
pub const MAX_RETRIES: i64 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Grade {
    Funny,
    NotFunny,
}

/// Structured answer of the evaluator call
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Evaluate {
    /// Decide if the joke is funny or not
    pub grade: Grade,
    /// If the joke is not funny, provide feedback on how to improve it
    pub feedback: String,
}

pub fn schema() -> StateSchema {
    StateSchema::new()
        .field("topic", FieldType::String)
        .field("joke", FieldType::String)
        .field("evaluation", FieldType::Object)
        .field_with_default("retries", FieldType::Number, json!(-1))
}

async fn joke_writer(state: WorkflowState, ctx: StepContext) -> Result<StepOutput, StepError> {
    let topic = state.get_str("topic").unwrap_or_default();
    let previous: Option<Evaluate> = state.get_as("evaluation");
    let prompt = match previous {
        Some(Evaluate {
            grade: Grade::NotFunny,
            feedback,
        }) => format!(
            "Write a joke about {} but take into account the feedback: {}",
            topic, feedback
        ),
        _ => format!("Write a joke about {}", topic),
    };
    let joke = ctx.client()?.prompt(prompt).await?;
    let retries = state.get_i64("retries").unwrap_or(-1) + 1;
    Ok(StateUpdate::new()
        .set("joke", joke)
        .set("retries", retries)
        .into())
}

async fn joke_evaluator(state: WorkflowState, ctx: StepContext) -> Result<StepOutput, StepError> {
    let joke = state.get_str("joke").unwrap_or_default();
    let evaluation: Evaluate = ctx
        .client()?
        .invoke_structured(&[
            Content::system(
                "You are a strict comedy critic. Grade the joke as funny or not_funny \
                 and, if it is not funny, say how to improve it.",
            ),
            Content::user(format!("Grade the joke: {}", joke)),
        ])
        .await?;
    Ok(StateUpdate::new()
        .set("evaluation", serde_json::to_value(evaluation)?)
        .into())
}

/// Retry while the grade fails and the budget lasts
pub fn route_joke(state: &WorkflowState) -> String {
    let grade = state
        .get_as::<Evaluate>("evaluation")
        .map(|e| e.grade)
        .unwrap_or(Grade::NotFunny);
    let retries = state.get_i64("retries").unwrap_or(-1);
    if grade == Grade::NotFunny && retries < MAX_RETRIES {
        "Rejected + Feedback".to_string()
    } else {
        "Accepted".to_string()
    }
}

pub fn graph(client: LlmClient) -> Result<CompiledGraph, GraphError> {
    let mut graph = StateGraph::new(schema()).with_client(client);
    graph
        .add_fn("joke_writer", joke_writer)
        .add_fn("joke_evaluator", joke_evaluator)
        .add_edge(START, "joke_writer")
        .add_edge("joke_writer", "joke_evaluator")
        .add_conditional_edges(
            "joke_evaluator",
            route_joke,
            [("Accepted", END), ("Rejected + Feedback", "joke_writer")],
        )
        .loop_guard("retries", MAX_RETRIES as u64);
    graph.compile()
}
