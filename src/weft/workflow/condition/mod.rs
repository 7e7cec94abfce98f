// SPDX-License-Identifier: MIT

//! Condition evaluation for routing
//!
//! Conditions are small boolean expressions over state fields:
//! - `grade == 'not_funny'`
//! - `retries < 3`
//! - `grade == 'not_funny' and not (retries >= 3)`

mod ast;
mod evaluator;
mod parser;

pub use ast::{CompareOp, Expression, Literal};
pub use evaluator::evaluate;
pub use parser::{parse, ConditionError};
