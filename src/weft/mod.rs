// SPDX-License-Identifier: MIT

pub mod patterns;
pub mod workflow;
