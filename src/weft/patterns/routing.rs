// SPDX-License-Identifier: MIT

//! Routing: classify the input once, then hand it to a specialised writer.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::adk::client::LlmClient;
use crate::adk::model::Content;
use crate::weft::workflow::graph::{
    route_on_field, CompiledGraph, GraphError, StateGraph, StepContext, StepError, StepOutput,
    END, START,
};
use crate::weft::workflow::state::{FieldType, StateSchema, StateUpdate, WorkflowState};

const ROUTER_PROMPT: &str =
    "You are a routing agent. You are given a user input and you need to decide which step to take.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RouteStep {
    Poem,
    Story,
    Joke,
}

impl RouteStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteStep::Poem => "poem",
            RouteStep::Story => "story",
            RouteStep::Joke => "joke",
        }
    }
}

/// Structured answer of the router call
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Route {
    /// The next step in the routing process
    pub step: RouteStep,
}

pub fn schema() -> StateSchema {
    StateSchema::new()
        .field("input", FieldType::String)
        .field("decision", FieldType::String)
        .field("output", FieldType::String)
}

async fn router(state: WorkflowState, ctx: StepContext) -> Result<StepOutput, StepError> {
    let input = state.get_str("input").unwrap_or_default();
    let route: Route = ctx
        .client()?
        .invoke_structured(&[Content::system(ROUTER_PROMPT), Content::user(input)])
        .await?;
    log::info!("Routing input to {}", route.step.as_str());
    Ok(StateUpdate::new().set("decision", route.step.as_str()).into())
}

/// The writers all answer the raw input; the route only picks which runs
async fn writer(state: WorkflowState, ctx: StepContext) -> Result<StepOutput, StepError> {
    let input = state.get_str("input").unwrap_or_default();
    let output = ctx.client()?.prompt(input).await?;
    Ok(StateUpdate::new().set("output", output).into())
}

pub fn graph(client: LlmClient) -> Result<CompiledGraph, GraphError> {
    let mut graph = StateGraph::new(schema()).with_client(client);
    graph
        .add_fn("router", router)
        .add_fn("poem_writer", writer)
        .add_fn("story_writer", writer)
        .add_fn("joke_writer", writer)
        .add_edge(START, "router")
        .add_conditional_edges(
            "router",
            route_on_field("decision"),
            [
                ("poem", "poem_writer"),
                ("story", "story_writer"),
                ("joke", "joke_writer"),
            ],
        )
        .add_edge("poem_writer", END)
        .add_edge("story_writer", END)
        .add_edge("joke_writer", END);
    graph.compile()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adk::model::scripted::ScriptedModel;
    use crate::weft::workflow::graph::RunConfig;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_routes_to_story_writer() {
        let model = Arc::new(ScriptedModel::new(vec![
            ScriptedModel::structured("Route", json!({"step": "story"})),
            Content::model("Once upon a time..."),
        ]));
        let graph = graph(LlmClient::new(model.clone())).unwrap();

        let outcome = graph
            .invoke(
                StateUpdate::new().set("input", "Write me a story about a lighthouse"),
                &RunConfig::default(),
            )
            .await
            .unwrap();
        assert_eq!(outcome.trace, vec!["router", "story_writer"]);
        assert_eq!(outcome.state.get_str("decision"), Some("story"));
        assert_eq!(outcome.state.get_str("output"), Some("Once upon a time..."));

        let requests = model.requests();
        assert_eq!(requests[0].schema.as_deref(), Some("Route"));
        assert_eq!(requests[0].history[0].role, "system");
        assert_eq!(requests[1].history[0].text(), "Write me a story about a lighthouse");
    }

    #[tokio::test]
    async fn test_invalid_route_is_a_step_failure() {
        let model = Arc::new(ScriptedModel::new(vec![ScriptedModel::structured(
            "Route",
            json!({"step": "limerick"}),
        )]));
        let graph = graph(LlmClient::new(model)).unwrap();

        let err = graph
            .invoke(StateUpdate::new().set("input", "x"), &RunConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err.kind, GraphError::StepFailure { ref step, .. } if step == "router"));
    }
}
