// SPDX-License-Identifier: MIT

//! Runtime state storage for graph execution

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::sync::Arc;
use thiserror::Error;

use super::schema::{ReducerType, StateSchema};

/// Why an update was rejected by the schema
#[derive(Debug, Clone, Error, PartialEq)]
pub enum StateError {
    #[error("field '{field}' is not declared in the state schema")]
    UndeclaredField { field: String },

    #[error("field '{field}' expects {expected}, got {found}")]
    TypeMismatch {
        field: String,
        expected: String,
        found: Value,
    },
}

impl StateError {
    pub fn field(&self) -> &str {
        match self {
            StateError::UndeclaredField { field } | StateError::TypeMismatch { field, .. } => field,
        }
    }
}

/// A partial state update returned by a step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StateUpdate(Map<String, Value>);

impl StateUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Build from a JSON object; `None` for any other JSON value
    pub fn from_json(value: Value) -> Option<Self> {
        match value {
            Value::Object(map) => Some(Self(map)),
            _ => None,
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for StateUpdate {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Immutable state snapshot threaded through a run
///
/// Steps receive an owned clone; only the executor produces new snapshots,
/// via [`WorkflowState::merge`].
#[derive(Debug, Clone)]
pub struct WorkflowState {
    values: Map<String, Value>,
    schema: Arc<StateSchema>,
}

impl PartialEq for WorkflowState {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl WorkflowState {
    /// Create a state holding the schema's defaults
    pub fn new(schema: Arc<StateSchema>) -> Self {
        let values = schema
            .fields
            .iter()
            .filter_map(|(name, def)| def.default.clone().map(|d| (name.clone(), d)))
            .collect();
        Self { values, schema }
    }

    /// Create a state from previously saved values without re-validating them
    pub fn restore(schema: Arc<StateSchema>, values: Map<String, Value>) -> Self {
        Self { values, schema }
    }

    /// Create a branch-private state from a dispatch payload.
    ///
    /// Payload fields need not be declared: they are input to one branch only
    /// and are never merged back.
    pub fn detached(schema: Arc<StateSchema>, payload: Map<String, Value>) -> Self {
        Self {
            values: payload,
            schema,
        }
    }

    /// Check an update against the schema without applying it
    pub fn validate(&self, update: &StateUpdate) -> Result<(), StateError> {
        for (key, value) in update.iter() {
            let def = self
                .schema
                .get(key)
                .ok_or_else(|| StateError::UndeclaredField { field: key.clone() })?;

            let expected = match def.reducer {
                ReducerType::Overwrite if value.is_null() => None,
                ReducerType::Overwrite => {
                    (!def.field_type.accepts(value)).then(|| def.field_type.name().to_string())
                }
                ReducerType::Append => None,
                ReducerType::Max | ReducerType::Min | ReducerType::Sum => {
                    (!value.is_number()).then(|| "a number".to_string())
                }
                ReducerType::Merge => (!value.is_object()).then(|| "an object".to_string()),
                ReducerType::Messages => {
                    let ok = match value {
                        Value::Object(_) => true,
                        Value::Array(items) => items.iter().all(Value::is_object),
                        _ => false,
                    };
                    (!ok).then(|| "a message object or array of messages".to_string())
                }
            };

            if let Some(expected) = expected {
                return Err(StateError::TypeMismatch {
                    field: key.clone(),
                    expected,
                    found: value.clone(),
                });
            }
        }
        Ok(())
    }

    /// Return a new state with `update` folded in using each field's reducer.
    ///
    /// Validation runs before anything is applied, so an error leaves no
    /// partial merge behind.
    pub fn merge(&self, update: &StateUpdate) -> Result<WorkflowState, StateError> {
        self.validate(update)?;
        let mut next = self.clone();
        for (key, value) in update.iter() {
            next.apply(key, value.clone());
        }
        Ok(next)
    }

    /// Fold a validated value into this state
    fn apply(&mut self, key: &str, value: Value) {
        let reducer = self
            .schema
            .get(key)
            .map(|def| def.reducer)
            .unwrap_or_default();

        match reducer {
            ReducerType::Overwrite => {
                self.values.insert(key.to_string(), value);
            }
            ReducerType::Append => self.with_array(key, |slot| match value {
                Value::Array(new_items) => slot.extend(new_items),
                other => slot.push(other),
            }),
            ReducerType::Max | ReducerType::Min => {
                let current = self.values.get(key).and_then(Value::as_f64);
                let replace = match (current, value.as_f64()) {
                    (_, None) => false,
                    (None, Some(_)) => true,
                    (Some(c), Some(n)) if reducer == ReducerType::Max => n > c,
                    (Some(c), Some(n)) => n < c,
                };
                if replace {
                    self.values.insert(key.to_string(), value);
                }
            }
            ReducerType::Sum => {
                let total = add_numbers(self.values.get(key), &value);
                self.values.insert(key.to_string(), total);
            }
            ReducerType::Merge => {
                let current = self
                    .values
                    .entry(key.to_string())
                    .or_insert_with(|| Value::Object(Map::new()));
                if !current.is_object() {
                    *current = Value::Object(Map::new());
                }
                if let (Value::Object(current_obj), Value::Object(new_obj)) = (current, value) {
                    for (k, v) in new_obj {
                        current_obj.insert(k, v);
                    }
                }
            }
            ReducerType::Messages => {
                let incoming = match value {
                    Value::Array(items) => items,
                    other => vec![other],
                };
                self.with_array(key, |slot| {
                    for message in incoming {
                        let existing = message
                            .get("id")
                            .and_then(Value::as_str)
                            .and_then(|id| {
                                slot.iter()
                                    .position(|m| m.get("id").and_then(Value::as_str) == Some(id))
                            });
                        match existing {
                            Some(idx) => slot[idx] = message,
                            None => slot.push(message),
                        }
                    }
                });
            }
        }
    }

    /// Run `f` on the field as an array; a missing or null field starts
    /// empty and a scalar becomes the first element
    fn with_array(&mut self, key: &str, f: impl FnOnce(&mut Vec<Value>)) {
        let mut items = match self.values.remove(key) {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => Vec::new(),
            Some(other) => vec![other],
        };
        f(&mut items);
        self.values.insert(key.to_string(), Value::Array(items));
    }

    /// Get a field value
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(Value::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.values.get(key).and_then(Value::as_i64)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.values.get(key).and_then(Value::as_f64)
    }

    pub fn get_array(&self, key: &str) -> &[Value] {
        self.values
            .get(key)
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Get a nested field value using dot notation (e.g., "evaluation.grade")
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.values.get(parts.next()?)?;
        for part in parts {
            current = match current {
                Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
                other => other.get(part)?,
            };
        }
        Some(current)
    }

    /// Deserialize a field into a typed value
    pub fn get_as<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.values
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// Convert state to JSON object
    pub fn to_json(&self) -> Value {
        Value::Object(self.values.clone())
    }

    pub fn values(&self) -> &Map<String, Value> {
        &self.values
    }

    pub fn schema(&self) -> &Arc<StateSchema> {
        &self.schema
    }

    /// Get all field names
    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.values.keys()
    }
}

fn add_numbers(current: Option<&Value>, new: &Value) -> Value {
    match (current.and_then(Value::as_i64), new.as_i64()) {
        (Some(a), Some(b)) => return Value::from(a.saturating_add(b)),
        (None, Some(b)) if current.map_or(true, Value::is_null) => return Value::from(b),
        _ => {}
    }
    let total = current.and_then(Value::as_f64).unwrap_or(0.0) + new.as_f64().unwrap_or(0.0);
    Number::from_f64(total).map(Value::Number).unwrap_or(Value::Null)
}
