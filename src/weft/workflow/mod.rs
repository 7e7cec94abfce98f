// SPDX-License-Identifier: MIT

pub mod builder;
pub mod checkpoint;
pub mod condition;
pub mod graph;
pub mod loader;
pub mod state;
pub mod types;
