// SPDX-License-Identifier: MIT

//! Prompt chaining: each call works on the previous call's output, with a
//! programmatic gate deciding whether the later calls are needed.
//!
//! `generate_joke -> gate(Pass: END, Fail: improve_joke -> polish_joke -> END)`

use crate::adk::client::LlmClient;
use crate::weft::workflow::graph::{
    CompiledGraph, GraphError, StateGraph, StepContext, StepError, StepOutput, END, START,
};
use crate::weft::workflow::state::{FieldType, StateSchema, StateUpdate, WorkflowState};

pub fn schema() -> StateSchema {
    StateSchema::new()
        .field("topic", FieldType::String)
        .field("joke", FieldType::String)
        .field("improve_joke", FieldType::String)
        .field("polished_joke", FieldType::String)
}

/// Gate: a joke with a punchline ends in `?` or `!` somewhere
pub fn check_punchline(state: &WorkflowState) -> String {
    let joke = state.get_str("joke").unwrap_or_default();
    if joke.contains('?') || joke.contains('!') {
        "Pass".to_string()
    } else {
        "Fail".to_string()
    }
}

async fn generate_joke(state: WorkflowState, ctx: StepContext) -> Result<StepOutput, StepError> {
    let topic = state.get_str("topic").unwrap_or_default();
    let joke = ctx.client()?.prompt(format!("Write a joke about {}", topic)).await?;
    Ok(StateUpdate::new().set("joke", joke).into())
}

async fn improve_joke(state: WorkflowState, ctx: StepContext) -> Result<StepOutput, StepError> {
    let joke = state.get_str("joke").unwrap_or_default();
    let improved = ctx
        .client()?
        .prompt(format!("Make this joke funnier by mocking the punchline: {}", joke))
        .await?;
    Ok(StateUpdate::new().set("improve_joke", improved).into())
}

async fn polish_joke(state: WorkflowState, ctx: StepContext) -> Result<StepOutput, StepError> {
    let improved = state.get_str("improve_joke").unwrap_or_default();
    let polished = ctx
        .client()?
        .prompt(format!("Add a surprising twist to the joke: {}", improved))
        .await?;
    Ok(StateUpdate::new().set("polished_joke", polished).into())
}

pub fn graph(client: LlmClient) -> Result<CompiledGraph, GraphError> {
    let mut graph = StateGraph::new(schema()).with_client(client);
    graph
        .add_fn("generate_joke", generate_joke)
        .add_fn("improve_joke", improve_joke)
        .add_fn("polish_joke", polish_joke)
        .add_edge(START, "generate_joke")
        .add_conditional_edges(
            "generate_joke",
            check_punchline,
            [("Pass", END), ("Fail", "improve_joke")],
        )
        .add_edge("improve_joke", "polish_joke")
        .add_edge("polish_joke", END);
    graph.compile()
}
