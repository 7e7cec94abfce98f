// SPDX-License-Identifier: MIT

//! Mermaid flowchart rendering

use std::fmt::Write;

use super::edge::Edge;
use super::executor::CompiledGraph;
use super::{END, START};

impl CompiledGraph {
    /// Render the graph as a Mermaid flowchart.
    ///
    /// Direct edges are solid, conditional and decision edges dotted with
    /// their label, fan-outs dotted and marked `fan-out`, joins thick.
    pub fn draw_mermaid(&self) -> String {
        let mut out = String::from("graph TD;\n");
        let _ = writeln!(out, "\t{}([<p>{}</p>]):::first", START, START);
        for step in &self.order {
            let _ = writeln!(out, "\t{}({})", step, step);
        }
        let _ = writeln!(out, "\t{}([<p>{}</p>]):::last", END, END);

        let mut sources: Vec<&str> = vec![START];
        sources.extend(self.order.iter().map(String::as_str));
        for source in sources {
            match self.edges.get(source) {
                Some(Edge::Direct(targets)) => {
                    for target in targets {
                        let _ = writeln!(out, "\t{} --> {};", source, target);
                    }
                }
                Some(Edge::Conditional(c)) => {
                    for (label, target) in &c.path_map {
                        let _ = writeln!(out, "\t{} -. &nbsp;{}&nbsp; .-> {};", source, label, target);
                    }
                }
                Some(Edge::FanOut(f)) => {
                    for target in &f.targets {
                        let _ = writeln!(out, "\t{} -. &nbsp;fan-out&nbsp; .-> {};", source, target);
                    }
                }
                None => {}
            }
            if let Some(targets) = self.decision_targets.get(source) {
                for target in targets {
                    let _ = writeln!(out, "\t{} -.-> {};", source, target);
                }
            }
        }
        for join in &self.joins {
            for source in &join.sources {
                let _ = writeln!(out, "\t{} ==> {};", source, join.target);
            }
        }
        if let Some(guard) = &self.loop_guard {
            let _ = writeln!(out, "\t%% loop guard: {} <= {}", guard.counter, guard.bound);
        }

        out.push_str("\tclassDef default fill:#f2f0ff,line-height:1.2\n");
        out.push_str("\tclassDef first fill-opacity:0\n");
        out.push_str("\tclassDef last fill:#bfb6fc\n");
        out
    }
}
