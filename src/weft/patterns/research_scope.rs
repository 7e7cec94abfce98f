// SPDX-License-Identifier: MIT

//! Research scoping: decide whether the request needs a clarifying question,
//! and once it does not, turn the conversation into a research brief.
//!
//! `clarify_with_user` is a fused route-and-act step: it returns a
//! [`StepOutput::Decision`] that either ends the turn with a question or
//! moves on to `write_research_brief`. With a checkpointer, the next
//! `invoke` on the same thread continues the conversation.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::adk::client::LlmClient;
use crate::adk::model::{buffer_string, Content};
use crate::weft::workflow::checkpoint::Checkpointer;
use crate::weft::workflow::graph::{
    CompiledGraph, GraphError, StateGraph, StepContext, StepError, StepOutput, END, START,
};
use crate::weft::workflow::state::{FieldType, ReducerType, StateSchema, StateUpdate, WorkflowState};

const CLARIFY_PROMPT: &str = "These are the messages exchanged so far with the user asking for the report:
<Messages>
{messages}
</Messages>

Today's date is {date}.

Assess whether you need to ask a clarifying question, or if the user has already given enough information to start research.
If there are acronyms, abbreviations or unknown terms, ask the user to clarify them.
If you have already asked a clarifying question, you almost always do not need to ask another one.

If you need to ask a question, set need_clarification to true, put a concise question in question and leave verification empty.
If you do not, set need_clarification to false, leave question empty, and put a short message in verification confirming that you will start research based on what the user asked for.";

const BRIEF_PROMPT: &str = "You will be given the messages exchanged so far between yourself and the user.
Translate them into a detailed and concrete research question that will guide the research.

<Messages>
{messages}
</Messages>

Today's date is {date}.

Include every preference and detail the user gave. Do not invent requirements the user did not state; mark unstated dimensions as open.
Phrase the brief in the first person, from the user's perspective.";

/// Structured answer of the clarification call
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClarifyWithUser {
    /// Whether the user needs to be asked a clarifying question
    pub need_clarification: bool,
    /// A question to ask the user to clarify the report scope
    pub question: String,
    /// Message confirming research will start once the user gave enough information
    pub verification: String,
}

/// Structured answer of the brief call
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ResearchQuestion {
    /// A research question that will be used to guide the research
    pub research_brief: String,
}

pub fn schema() -> StateSchema {
    StateSchema::new()
        .accumulate("messages", FieldType::Array, ReducerType::Messages)
        .field("research_brief", FieldType::String)
        .accumulate("supervisor_messages", FieldType::Array, ReducerType::Messages)
}

/// Input for one user turn
pub fn user_turn(text: &str) -> StateUpdate {
    StateUpdate::new().set("messages", Value::Array(vec![to_message(Content::user(text))]))
}

/// The latest message of the conversation
pub fn last_message(state: &WorkflowState) -> Option<Content> {
    state
        .get_as::<Vec<Content>>("messages")
        .and_then(|mut messages| messages.pop())
}

fn to_message(content: Content) -> Value {
    serde_json::to_value(content).unwrap_or(Value::Null)
}

fn today() -> String {
    chrono::Local::now().format("%a %b %-d, %Y").to_string()
}

fn fill(template: &str, state: &WorkflowState) -> String {
    let messages: Vec<Content> = state.get_as("messages").unwrap_or_default();
    template
        .replace("{messages}", &buffer_string(&messages))
        .replace("{date}", &today())
}

async fn clarify_with_user(state: WorkflowState, ctx: StepContext) -> Result<StepOutput, StepError> {
    let answer: ClarifyWithUser = ctx
        .client()?
        .invoke_structured(&[Content::user(fill(CLARIFY_PROMPT, &state))])
        .await?;

    if answer.need_clarification {
        log::info!("Asking the user to clarify: {}", answer.question);
        let update = StateUpdate::new().set(
            "messages",
            Value::Array(vec![to_message(Content::model(answer.question))]),
        );
        Ok(StepOutput::end(update))
    } else {
        let update = StateUpdate::new().set(
            "messages",
            Value::Array(vec![to_message(Content::model(answer.verification))]),
        );
        Ok(StepOutput::goto(update, "write_research_brief"))
    }
}

async fn write_research_brief(state: WorkflowState, ctx: StepContext) -> Result<StepOutput, StepError> {
    let brief: ResearchQuestion = ctx
        .client()?
        .invoke_structured(&[Content::user(fill(BRIEF_PROMPT, &state))])
        .await?;
    Ok(StateUpdate::new()
        .set(
            "supervisor_messages",
            Value::Array(vec![to_message(Content::user(brief.research_brief.clone()))]),
        )
        .set("research_brief", brief.research_brief)
        .into())
}

pub fn graph(
    client: LlmClient,
    checkpointer: Option<Arc<dyn Checkpointer>>,
) -> Result<CompiledGraph, GraphError> {
    let mut graph = StateGraph::new(schema()).with_client(client);
    if let Some(checkpointer) = checkpointer {
        graph = graph.with_checkpointer(checkpointer);
    }
    graph
        .add_fn("clarify_with_user", clarify_with_user)
        .add_fn("write_research_brief", write_research_brief)
        .add_edge(START, "clarify_with_user")
        .add_decision_targets("clarify_with_user", ["write_research_brief", END])
        .add_edge("write_research_brief", END);
    graph.compile()
}
