// SPDX-License-Identifier: MIT

//! State schema definitions

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Schema defining the workflow state structure
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq)]
pub struct StateSchema {
    /// Field definitions
    #[serde(flatten)]
    pub fields: BTreeMap<String, StateFieldDef>,
}

/// Definition of a single state field
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct StateFieldDef {
    /// Type of the field
    #[serde(rename = "type", default)]
    pub field_type: FieldType,
    /// Reducer for merging values
    #[serde(default)]
    pub reducer: ReducerType,
    /// Default value
    pub default: Option<Value>,
}

/// Supported field types
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Array,
    Object,
    /// Any JSON value
    #[default]
    Any,
}

/// Reducer types for merging values into state
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ReducerType {
    /// Replace the value (default)
    #[default]
    Overwrite,
    /// Append to array; arrays are concatenated, scalars pushed
    Append,
    /// Keep maximum value
    Max,
    /// Keep minimum value
    Min,
    /// Shallow-merge objects
    Merge,
    /// Add numbers
    Sum,
    /// Append chat messages, replacing any existing message with the same `id`
    Messages,
}

impl FieldType {
    /// Whether `value` has this JSON type
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            FieldType::Any => true,
            FieldType::String => value.is_string(),
            FieldType::Number => value.is_number(),
            FieldType::Boolean => value.is_boolean(),
            FieldType::Array => value.is_array(),
            FieldType::Object => value.is_object(),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Number => "number",
            FieldType::Boolean => "boolean",
            FieldType::Array => "array",
            FieldType::Object => "object",
            FieldType::Any => "any",
        }
    }
}

impl ReducerType {
    /// Accumulating reducers combine with the existing value instead of replacing it
    pub fn is_accumulating(&self) -> bool {
        !matches!(self, ReducerType::Overwrite)
    }

    /// Field types this reducer can operate on
    pub fn supports(&self, field_type: FieldType) -> bool {
        match self {
            ReducerType::Overwrite => true,
            ReducerType::Append | ReducerType::Messages => {
                matches!(field_type, FieldType::Array | FieldType::Any)
            }
            ReducerType::Max | ReducerType::Min | ReducerType::Sum => {
                matches!(field_type, FieldType::Number | FieldType::Any)
            }
            ReducerType::Merge => matches!(field_type, FieldType::Object | FieldType::Any),
        }
    }
}

impl StateSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an overwriting field
    pub fn field(self, name: &str, field_type: FieldType) -> Self {
        self.with_def(name, field_type, ReducerType::Overwrite, None)
    }

    /// Declare an accumulating field
    pub fn accumulate(self, name: &str, field_type: FieldType, reducer: ReducerType) -> Self {
        self.with_def(name, field_type, reducer, None)
    }

    /// Declare an overwriting field with a default value
    pub fn field_with_default(self, name: &str, field_type: FieldType, default: Value) -> Self {
        self.with_def(name, field_type, ReducerType::Overwrite, Some(default))
    }

    fn with_def(
        mut self,
        name: &str,
        field_type: FieldType,
        reducer: ReducerType,
        default: Option<Value>,
    ) -> Self {
        self.fields.insert(
            name.to_string(),
            StateFieldDef {
                field_type,
                reducer,
                default,
            },
        );
        self
    }

    pub fn get(&self, name: &str) -> Option<&StateFieldDef> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Fields whose reducer cannot work on their declared type, or whose
    /// default has the wrong type
    pub fn inconsistencies(&self) -> Vec<String> {
        let mut problems = Vec::new();
        for (name, def) in &self.fields {
            if !def.reducer.supports(def.field_type) {
                problems.push(format!(
                    "field '{}': reducer {:?} cannot operate on type {}",
                    name,
                    def.reducer,
                    def.field_type.name()
                ));
            }
            if let Some(default) = &def.default {
                if !default.is_null() && !def.field_type.accepts(default) {
                    problems.push(format!(
                        "field '{}': default {} is not of type {}",
                        name,
                        default,
                        def.field_type.name()
                    ));
                }
            }
        }
        problems
    }
}
