// SPDX-License-Identifier: MIT

//! State management for step graphs
//!
//! This module provides:
//! - `StateSchema` - the declared fields of a graph, their types and reducers
//! - `WorkflowState` - an immutable snapshot; `merge` returns a new one
//! - `StateUpdate` - the partial update a step returns

mod schema;
mod store;

pub use schema::{FieldType, ReducerType, StateFieldDef, StateSchema};
pub use store::{StateError, StateUpdate, WorkflowState};
