// SPDX-License-Identifier: MIT

//! weft-rs - step graphs for orchestrating LLM calls
//!
//! - [`adk`] - the LLM client port, model providers and tool plumbing
//! - [`weft`] - the step graph engine, its YAML surface and the workflow patterns

pub mod adk;
pub mod weft;
