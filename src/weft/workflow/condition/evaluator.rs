// SPDX-License-Identifier: MIT

//! Condition expression evaluator

use super::ast::{CompareOp, Expression, Literal};
use crate::weft::workflow::state::WorkflowState;
use serde_json::Value;
use std::cmp::Ordering;

/// Evaluate a condition expression against a state snapshot.
///
/// Missing fields compare equal only to `null`; ordering comparisons on
/// non-numbers are false.
pub fn evaluate(expr: &Expression, state: &WorkflowState) -> bool {
    match expr {
        Expression::True => true,
        Expression::False => false,
        Expression::Truthy(path) => is_truthy(state.get_path(path)),
        Expression::Compare { left, op, right } => compare(state.get_path(left), *op, right),
        Expression::And(l, r) => evaluate(l, state) && evaluate(r, state),
        Expression::Or(l, r) => evaluate(l, state) || evaluate(r, state),
        Expression::Not(inner) => !evaluate(inner, state),
    }
}

fn compare(value: Option<&Value>, op: CompareOp, literal: &Literal) -> bool {
    match op {
        CompareOp::Eq => matches_literal(value, literal),
        CompareOp::NotEq => !matches_literal(value, literal),
        CompareOp::Contains => contains(value, literal),
        ordering => {
            let Some(ord) = numeric_order(value, literal) else {
                return false;
            };
            match ordering {
                CompareOp::Gt => ord == Ordering::Greater,
                CompareOp::Gte => ord != Ordering::Less,
                CompareOp::Lt => ord == Ordering::Less,
                CompareOp::Lte => ord != Ordering::Greater,
                _ => false,
            }
        }
    }
}

fn matches_literal(value: Option<&Value>, literal: &Literal) -> bool {
    match value {
        None | Some(Value::Null) => *literal == Literal::Null,
        Some(v) => literal_matches_value(literal, v),
    }
}

fn literal_matches_value(literal: &Literal, value: &Value) -> bool {
    match (literal, value) {
        (Literal::String(s), Value::String(v)) => s == v,
        (Literal::Number(n), Value::Number(v)) => v.as_f64().is_some_and(|v| (v - n).abs() < f64::EPSILON),
        (Literal::Boolean(b), Value::Bool(v)) => b == v,
        (Literal::Null, Value::Null) => true,
        _ => false,
    }
}

fn numeric_order(value: Option<&Value>, literal: &Literal) -> Option<Ordering> {
    let Literal::Number(rhs) = literal else {
        return None;
    };
    value?.as_f64()?.partial_cmp(rhs)
}

fn contains(value: Option<&Value>, literal: &Literal) -> bool {
    match (value, literal) {
        (Some(Value::String(haystack)), Literal::String(needle)) => haystack.contains(needle.as_str()),
        (Some(Value::Array(items)), _) => items.iter().any(|item| literal_matches_value(literal, item)),
        (Some(Value::Object(map)), Literal::String(key)) => map.contains_key(key),
        _ => false,
    }
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(map)) => !map.is_empty(),
    }
}
