// SPDX-License-Identifier: MIT

//! Parallelization: three independent writers on one topic, combined by an
//! aggregator that waits for all of them.

use crate::adk::client::LlmClient;
use crate::weft::workflow::graph::{
    CompiledGraph, GraphError, StateGraph, StepContext, StepError, StepOutput, END, START,
};
use crate::weft::workflow::state::{FieldType, StateSchema, StateUpdate, WorkflowState};

pub const WRITERS: [(&str, &str, &str); 3] = [
    ("call_llm_1", "poem", "Write a poem about"),
    ("call_llm_2", "story", "Write a story about"),
    ("call_llm_3", "joke", "Write a joke about"),
];

pub fn schema() -> StateSchema {
    StateSchema::new()
        .field("topic", FieldType::String)
        .field("poem", FieldType::String)
        .field("story", FieldType::String)
        .field("joke", FieldType::String)
        .field("combined_result", FieldType::String)
}

pub fn combine(state: &WorkflowState) -> String {
    let field = |name: &str| state.get_str(name).unwrap_or_default();
    format!(
        "Here is the combined result on the topic {}: \n Poem: {} \n Story: {} \n Joke: {}",
        field("topic"),
        field("poem"),
        field("story"),
        field("joke")
    )
}

pub fn graph(client: LlmClient) -> Result<CompiledGraph, GraphError> {
    let mut graph = StateGraph::new(schema()).with_client(client);
    for (name, field, instruction) in WRITERS {
        graph.add_fn(name, move |state: WorkflowState, ctx: StepContext| async move {
            let topic = state.get_str("topic").unwrap_or_default();
            let text = ctx.client()?.prompt(format!("{} {}", instruction, topic)).await?;
            Ok::<StepOutput, StepError>(StateUpdate::new().set(field, text).into())
        });
        graph.add_edge(START, name);
    }
    graph.add_fn("aggregate_results", |state: WorkflowState, _| async move {
        Ok::<StepOutput, StepError>(StateUpdate::new().set("combined_result", combine(&state)).into())
    });
    graph
        .add_join(WRITERS.iter().map(|(name, _, _)| *name), "aggregate_results")
        .add_edge("aggregate_results", END);
    graph.compile()
}
