// SPDX-License-Identifier: MIT

//! Edge kinds and successor resolution

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::weft::workflow::state::WorkflowState;

use super::error::GraphError;
use super::step::Dispatch;
use super::END;

/// Pure routing function: state in, label out
pub type Router = Arc<dyn Fn(&WorkflowState) -> String + Send + Sync>;

/// Fan-out generator: state in, branches out
pub type FanOutFn = Arc<dyn Fn(&WorkflowState) -> Vec<Dispatch> + Send + Sync>;

/// Router plus the static label -> destination map
#[derive(Clone)]
pub struct ConditionalEdge {
    pub router: Router,
    pub path_map: BTreeMap<String, String>,
}

#[derive(Clone)]
pub struct FanOutEdge {
    pub generator: FanOutFn,
    /// Steps a dispatch may name
    pub targets: Vec<String>,
}

/// Outgoing edges of one source
#[derive(Clone)]
pub enum Edge {
    Direct(Vec<String>),
    Conditional(ConditionalEdge),
    FanOut(FanOutEdge),
}

/// A wait-for-all barrier: `target` fires once every source has completed
#[derive(Debug, Clone, PartialEq)]
pub struct JoinEdge {
    pub sources: Vec<String>,
    pub target: String,
}

/// What an edge resolved to for one completed invocation
#[derive(Debug, Clone, PartialEq)]
pub enum NextSpec {
    /// Fixed successors; END is dropped
    Steps(Vec<String>),
    /// Spawn these branches
    Branches(Vec<Dispatch>),
}

impl Edge {
    /// Every destination this edge can ever produce, END included
    pub fn destinations(&self) -> Vec<&str> {
        match self {
            Edge::Direct(targets) => targets.iter().map(String::as_str).collect(),
            Edge::Conditional(c) => c.path_map.values().map(String::as_str).collect(),
            Edge::FanOut(f) => f.targets.iter().map(String::as_str).collect(),
        }
    }

    /// Decide the successors of `step` given the state after its superstep
    pub fn resolve(&self, step: &str, state: &WorkflowState) -> Result<NextSpec, GraphError> {
        match self {
            Edge::Direct(targets) => Ok(NextSpec::Steps(live(targets.iter().cloned()))),
            Edge::Conditional(c) => {
                let label = (c.router)(state);
                let target = c.path_map.get(&label).ok_or_else(|| GraphError::UnknownLabel {
                    step: step.to_string(),
                    label: label.clone(),
                })?;
                log::debug!("Route from {} took '{}' -> {}", step, label, target);
                Ok(NextSpec::Steps(live([target.clone()])))
            }
            Edge::FanOut(f) => {
                let dispatches = (f.generator)(state);
                if let Some(bad) = dispatches.iter().find(|d| !f.targets.contains(&d.step)) {
                    return Err(GraphError::UnknownLabel {
                        step: step.to_string(),
                        label: bad.step.clone(),
                    });
                }
                Ok(NextSpec::Branches(dispatches))
            }
        }
    }
}

fn live(targets: impl IntoIterator<Item = String>) -> Vec<String> {
    targets.into_iter().filter(|t| t != END).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weft::workflow::state::{FieldType, StateSchema, StateUpdate};
    use serde_json::json;

    fn state(decision: &str) -> WorkflowState {
        WorkflowState::new(Arc::new(StateSchema::new().field("decision", FieldType::String)))
            .merge(&StateUpdate::new().set("decision", decision))
            .unwrap()
    }

    fn routing_edge() -> Edge {
        Edge::Conditional(ConditionalEdge {
            router: Arc::new(|s: &WorkflowState| s.get_str("decision").unwrap_or("").to_string()),
            path_map: [("poem", "write_poem"), ("done", END)]
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        })
    }

    #[test]
    fn test_conditional_resolves_through_path_map() {
        let next = routing_edge().resolve("router", &state("poem")).unwrap();
        assert_eq!(next, NextSpec::Steps(vec!["write_poem".to_string()]));

        let next = routing_edge().resolve("router", &state("done")).unwrap();
        assert_eq!(next, NextSpec::Steps(vec![]));
    }

    #[test]
    fn test_unknown_label() {
        let err = routing_edge().resolve("router", &state("limerick")).unwrap_err();
        assert!(matches!(err, GraphError::UnknownLabel { label, .. } if label == "limerick"));
    }

    #[test]
    fn test_fan_out_rejects_undeclared_target() {
        let edge = Edge::FanOut(FanOutEdge {
            generator: Arc::new(|_: &WorkflowState| {
                vec![
                    Dispatch::with("worker", "item", json!(1)),
                    Dispatch::with("stranger", "item", json!(2)),
                ]
            }),
            targets: vec!["worker".to_string()],
        });
        let err = edge.resolve("plan", &state("x")).unwrap_err();
        assert!(matches!(err, GraphError::UnknownLabel { label, .. } if label == "stranger"));
    }
}
