// SPDX-License-Identifier: MIT

//! Agent development kit: everything a step needs to talk to a model.

pub mod client;
pub mod error;
pub mod memory;
pub mod model;
pub mod registry;
pub mod tool;
