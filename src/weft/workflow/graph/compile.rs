// SPDX-License-Identifier: MIT

//! Structural validation run by `StateGraph::compile`

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::weft::workflow::state::FieldType;

use super::edge::Edge;
use super::error::{CompileError, GraphError, GraphWarning};
use super::state_graph::StateGraph;
use super::{END, START};

/// Check the builder and fold its raw edges into one [`Edge`] per source
pub(super) fn validate(
    graph: &StateGraph,
) -> Result<(BTreeMap<String, Edge>, Vec<GraphWarning>), GraphError> {
    if let Some(problem) = graph.schema.inconsistencies().into_iter().next() {
        return Err(CompileError::InvalidSchema(problem).into());
    }
    if let Some(name) = graph.reserved.first() {
        return Err(CompileError::ReservedName(name.clone()).into());
    }
    if let Some(name) = graph.duplicates.first() {
        return Err(CompileError::DuplicateStep(name.clone()).into());
    }

    let edges = fold_edges(graph)?;

    for (source, edge) in &edges {
        check_source(graph, source)?;
        for target in edge.destinations() {
            check_target(graph, source, target)?;
        }
    }
    for (step, targets) in &graph.decision_targets {
        if !graph.steps.contains_key(step) {
            return Err(CompileError::UnknownStep(step.clone()).into());
        }
        if edges.contains_key(step) {
            return Err(CompileError::ConflictingEdges {
                step: step.clone(),
                reason: "a deciding step chooses its own successor and cannot also have edges"
                    .to_string(),
            }
            .into());
        }
        for target in targets {
            check_target(graph, step, target)?;
        }
    }
    for join in &graph.joins {
        if join.sources.is_empty() {
            return Err(CompileError::InvalidEdge(format!("join into '{}' has no sources", join.target)).into());
        }
        for source in &join.sources {
            if source == START || source == END {
                return Err(CompileError::InvalidEdge(format!("'{}' cannot be a join source", source)).into());
            }
            check_source(graph, source)?;
        }
        check_target(graph, &join.sources[0], &join.target)?;
    }

    if !edges.contains_key(START) {
        return Err(CompileError::NoEntry.into());
    }

    let join_sources: BTreeSet<&str> = graph
        .joins
        .iter()
        .flat_map(|j| j.sources.iter().map(String::as_str))
        .collect();
    for step in &graph.order {
        let has_exit = edges.contains_key(step)
            || graph.decision_targets.contains_key(step)
            || join_sources.contains(step.as_str());
        if !has_exit {
            return Err(CompileError::DeadEnd(step.clone()).into());
        }
    }

    for step in &graph.interrupt_before {
        if !graph.steps.contains_key(step) {
            return Err(CompileError::UnknownStep(step.clone()).into());
        }
    }
    if !graph.interrupt_before.is_empty() && graph.checkpointer.is_none() {
        return Err(CompileError::MissingCheckpointer.into());
    }

    if let Some(guard) = &graph.loop_guard {
        let def = graph.schema.get(&guard.counter).ok_or_else(|| {
            CompileError::InvalidLoopGuard(format!("'{}' is not a state field", guard.counter))
        })?;
        if !matches!(def.field_type, FieldType::Number | FieldType::Any) {
            return Err(CompileError::InvalidLoopGuard(format!(
                "'{}' is a {} field, expected number",
                guard.counter,
                def.field_type.name()
            ))
            .into());
        }
        if guard.bound == 0 {
            return Err(CompileError::InvalidLoopGuard("bound must be positive".to_string()).into());
        }
    }

    let adjacency = adjacency(graph, &edges);
    let reached = reachable(&adjacency);
    if !reached.contains(END) {
        return Err(GraphError::UnreachableTerminal);
    }

    let mut warnings: Vec<GraphWarning> = graph
        .order
        .iter()
        .filter(|step| !reached.contains(step.as_str()))
        .map(|step| GraphWarning::UnreachableStep(step.clone()))
        .collect();
    if graph.loop_guard.is_none() {
        if let Some(steps) = find_cycle(&adjacency) {
            warnings.push(GraphWarning::UnguardedCycle { steps });
        }
    }

    Ok((edges, warnings))
}

fn fold_edges(graph: &StateGraph) -> Result<BTreeMap<String, Edge>, GraphError> {
    let conflict = |step: &str, reason: &str| -> GraphError {
        CompileError::ConflictingEdges {
            step: step.to_string(),
            reason: reason.to_string(),
        }
        .into()
    };

    let mut edges: BTreeMap<String, Edge> = graph
        .direct
        .iter()
        .map(|(source, targets)| {
            let mut unique: Vec<String> = Vec::new();
            for t in targets {
                if !unique.contains(t) {
                    unique.push(t.clone());
                }
            }
            (source.clone(), Edge::Direct(unique))
        })
        .collect();

    for (source, conditional) in &graph.conditional {
        if edges.contains_key(source) {
            return Err(conflict(source, "a conditional edge must be the only outgoing edge"));
        }
        edges.insert(source.clone(), Edge::Conditional(conditional.clone()));
    }
    for (source, fan_out) in &graph.fan_outs {
        if edges.contains_key(source) {
            return Err(conflict(source, "a fan-out must be the only outgoing edge"));
        }
        if fan_out.targets.is_empty() {
            return Err(CompileError::InvalidEdge(format!("fan-out from '{}' declares no targets", source)).into());
        }
        edges.insert(source.clone(), Edge::FanOut(fan_out.clone()));
    }
    Ok(edges)
}

fn check_source(graph: &StateGraph, source: &str) -> Result<(), GraphError> {
    if source == END {
        return Err(CompileError::InvalidEdge("END cannot have outgoing edges".to_string()).into());
    }
    if source != START && !graph.steps.contains_key(source) {
        return Err(CompileError::UnknownStep(source.to_string()).into());
    }
    Ok(())
}

fn check_target(graph: &StateGraph, source: &str, target: &str) -> Result<(), GraphError> {
    if target == START {
        return Err(CompileError::InvalidEdge(format!("'{}' routes back to START", source)).into());
    }
    if target != END && !graph.steps.contains_key(target) {
        return Err(CompileError::UnknownStep(target.to_string()).into());
    }
    Ok(())
}

/// Every static possibility: edge destinations, decision targets and joins
fn adjacency<'a>(
    graph: &'a StateGraph,
    edges: &'a BTreeMap<String, Edge>,
) -> BTreeMap<&'a str, BTreeSet<&'a str>> {
    let mut adj: BTreeMap<&str, BTreeSet<&str>> = BTreeMap::new();
    for (source, edge) in edges {
        adj.entry(source.as_str()).or_default().extend(edge.destinations());
    }
    for (step, targets) in &graph.decision_targets {
        adj.entry(step.as_str())
            .or_default()
            .extend(targets.iter().map(String::as_str));
    }
    for join in &graph.joins {
        for source in &join.sources {
            adj.entry(source.as_str()).or_default().insert(join.target.as_str());
        }
    }
    adj
}

fn reachable<'a>(adj: &BTreeMap<&'a str, BTreeSet<&'a str>>) -> BTreeSet<&'a str> {
    let mut seen: BTreeSet<&str> = BTreeSet::new();
    let mut queue: VecDeque<&str> = VecDeque::from([START]);
    while let Some(node) = queue.pop_front() {
        if !seen.insert(node) {
            continue;
        }
        if let Some(next) = adj.get(node) {
            queue.extend(next.iter().copied());
        }
    }
    seen
}

/// First cycle found by depth-first search, as the steps along it
fn find_cycle(adj: &BTreeMap<&str, BTreeSet<&str>>) -> Option<Vec<String>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Active,
        Done,
    }

    fn visit<'a>(
        node: &'a str,
        adj: &BTreeMap<&'a str, BTreeSet<&'a str>>,
        marks: &mut BTreeMap<&'a str, Mark>,
        path: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        marks.insert(node, Mark::Active);
        path.push(node);
        for &next in adj.get(node).into_iter().flatten() {
            match marks.get(next) {
                Some(Mark::Active) => {
                    let start = path.iter().position(|n| *n == next).unwrap_or(0);
                    return Some(path[start..].iter().map(|s| s.to_string()).collect());
                }
                Some(Mark::Done) => {}
                None => {
                    if let Some(cycle) = visit(next, adj, marks, path) {
                        return Some(cycle);
                    }
                }
            }
        }
        path.pop();
        marks.insert(node, Mark::Done);
        None
    }

    let mut marks = BTreeMap::new();
    let mut path = Vec::new();
    let roots: Vec<&str> = std::iter::once(START).chain(adj.keys().copied()).collect();
    for root in roots {
        if marks.contains_key(root) {
            continue;
        }
        if let Some(cycle) = visit(root, adj, &mut marks, &mut path) {
            return Some(cycle);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::weft::workflow::checkpoint::MemorySaver;
    use crate::weft::workflow::graph::step::StepOutput;
    use crate::weft::workflow::state::{StateSchema, StateUpdate};
    use std::sync::Arc;

    fn noop(graph: &mut StateGraph, name: &str) {
        graph.add_fn(name, |_, _| async { Ok(StepOutput::Update(StateUpdate::new())) });
    }

    fn schema() -> StateSchema {
        StateSchema::new()
            .field("grade", FieldType::String)
            .field_with_default("retries", FieldType::Number, serde_json::json!(0))
    }

    fn compile_err(graph: StateGraph) -> GraphError {
        match graph.compile() {
            Ok(_) => panic!("expected compile to fail"),
            Err(e) => e,
        }
    }

    #[test]
    fn test_linear_graph_compiles_without_warnings() {
        let mut graph = StateGraph::new(schema());
        noop(&mut graph, "a");
        noop(&mut graph, "b");
        graph.add_edge(START, "a").add_edge("a", "b").add_edge("b", END);

        let compiled = graph.compile().unwrap();
        assert!(compiled.warnings().is_empty());
    }

    #[test]
    fn test_unknown_step_in_edge() {
        let mut graph = StateGraph::new(schema());
        noop(&mut graph, "a");
        graph.add_edge(START, "a").add_edge("a", "ghost");
        assert!(matches!(
            compile_err(graph),
            GraphError::Compile(CompileError::UnknownStep(s)) if s == "ghost"
        ));
    }

    #[test]
    fn test_reserved_and_duplicate_names() {
        let mut graph = StateGraph::new(schema());
        noop(&mut graph, END);
        assert!(matches!(
            compile_err(graph),
            GraphError::Compile(CompileError::ReservedName(_))
        ));

        let mut graph = StateGraph::new(schema());
        noop(&mut graph, "a");
        noop(&mut graph, "a");
        graph.add_edge(START, "a").add_edge("a", END);
        assert!(matches!(
            compile_err(graph),
            GraphError::Compile(CompileError::DuplicateStep(_))
        ));
    }

    #[test]
    fn test_missing_entry() {
        let mut graph = StateGraph::new(schema());
        noop(&mut graph, "a");
        graph.add_edge("a", END);
        assert!(matches!(compile_err(graph), GraphError::Compile(CompileError::NoEntry)));
    }

    #[test]
    fn test_conflicting_edges() {
        let mut graph = StateGraph::new(schema());
        noop(&mut graph, "a");
        graph
            .add_edge(START, "a")
            .add_edge("a", END)
            .add_conditional_edges("a", |_| "x".to_string(), [("x", END)]);
        assert!(matches!(
            compile_err(graph),
            GraphError::Compile(CompileError::ConflictingEdges { .. })
        ));
    }

    #[test]
    fn test_dead_end() {
        let mut graph = StateGraph::new(schema());
        noop(&mut graph, "a");
        graph.add_edge(START, "a");
        assert!(matches!(
            compile_err(graph),
            GraphError::Compile(CompileError::DeadEnd(s)) if s == "a"
        ));
    }

    #[test]
    fn test_unreachable_terminal() {
        let mut graph = StateGraph::new(schema());
        noop(&mut graph, "a");
        noop(&mut graph, "b");
        graph.add_edge(START, "a").add_edge("a", "b").add_edge("b", "a");
        assert!(matches!(compile_err(graph), GraphError::UnreachableTerminal));
    }

    #[test]
    fn test_cycle_warns_unless_guarded() {
        let build = || {
            let mut graph = StateGraph::new(schema());
            noop(&mut graph, "write");
            noop(&mut graph, "evaluate");
            graph.add_edge(START, "write").add_edge("write", "evaluate");
            graph.add_conditional_edges(
                "evaluate",
                |s| s.get_str("grade").unwrap_or("").to_string(),
                [("bad", "write"), ("good", END)],
            );
            graph
        };

        let compiled = build().compile().unwrap();
        assert!(matches!(
            compiled.warnings(),
            [GraphWarning::UnguardedCycle { steps }] if steps.contains(&"write".to_string())
        ));

        let mut guarded = build();
        guarded.loop_guard("retries", 3);
        assert!(guarded.compile().unwrap().warnings().is_empty());
    }

    #[test]
    fn test_bad_loop_guard() {
        let mut graph = StateGraph::new(schema());
        noop(&mut graph, "a");
        graph.add_edge(START, "a").add_edge("a", END).loop_guard("grade", 3);
        assert!(matches!(
            compile_err(graph),
            GraphError::Compile(CompileError::InvalidLoopGuard(_))
        ));
    }

    #[test]
    fn test_decision_step_cannot_also_have_edges() {
        let mut graph = StateGraph::new(schema());
        noop(&mut graph, "clarify");
        graph
            .add_edge(START, "clarify")
            .add_edge("clarify", END)
            .add_decision_targets("clarify", [END]);
        assert!(matches!(
            compile_err(graph),
            GraphError::Compile(CompileError::ConflictingEdges { .. })
        ));
    }

    #[test]
    fn test_interrupt_needs_checkpointer() {
        let mut graph = StateGraph::new(schema());
        noop(&mut graph, "a");
        graph.add_edge(START, "a").add_edge("a", END).interrupt_before(["a"]);
        assert!(matches!(
            compile_err(graph),
            GraphError::Compile(CompileError::MissingCheckpointer)
        ));

        let mut graph = StateGraph::new(schema()).with_checkpointer(Arc::new(MemorySaver::new()));
        noop(&mut graph, "a");
        graph.add_edge(START, "a").add_edge("a", END).interrupt_before(["a"]);
        assert!(graph.compile().is_ok());
    }

    #[test]
    fn test_unreachable_step_warning() {
        let mut graph = StateGraph::new(schema());
        noop(&mut graph, "a");
        noop(&mut graph, "orphan");
        graph.add_edge(START, "a").add_edge("a", END).add_edge("orphan", END);
        let compiled = graph.compile().unwrap();
        assert_eq!(
            compiled.warnings(),
            &[GraphWarning::UnreachableStep("orphan".to_string())]
        );
    }
}
