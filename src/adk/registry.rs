// SPDX-License-Identifier: MIT

//! Tool registry shared by every step of a run.

use crate::adk::model::Part;
use crate::adk::tool::{Tool, ToolCall, ToolSpec};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct ToolRegistry {
    tools: Arc<RwLock<HashMap<String, Arc<dyn Tool>>>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn register(&self, tool: Arc<dyn Tool>) {
        let mut tools = self.tools.write().await;
        tools.insert(tool.name().to_string(), tool);
    }

    pub async fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        let tools = self.tools.read().await;
        tools.get(name).cloned()
    }

    /// Specs of every registered tool, sorted by name
    pub async fn specs(&self) -> Vec<ToolSpec> {
        let tools = self.tools.read().await;
        let mut specs: Vec<ToolSpec> = tools.values().map(|t| t.spec()).collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    /// Execute a model-requested call and wrap the result for the history.
    ///
    /// Tool failures and unknown tools become `{"error": ...}` responses so
    /// the model can see them; they never abort the caller.
    pub async fn dispatch(&self, call: &ToolCall) -> Part {
        log::info!("Tool call: {} {}", call.name, call.args);

        let response = match self.get(&call.name).await {
            Some(tool) => match tool.execute(call.args.clone()).await {
                Ok(res) => res,
                Err(e) => {
                    log::error!("Tool {} failed: {}", call.name, e);
                    json!({ "error": e.to_string() })
                }
            },
            None => {
                log::error!("Tool {} not found", call.name);
                json!({ "error": format!("Tool {} not found", call.name) })
            }
        };

        Part::FunctionResponse {
            name: call.name.clone(),
            response,
            call_id: call.call_id.clone(),
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::error::Error;

    use once_cell::sync::Lazy;

    static MOCK_SCHEMA: Lazy<Value> = Lazy::new(|| {
        json!({
            "type": "object",
            "properties": {}
        })
    });

    /// A mock tool for testing
    struct MockTool {
        name: String,
        description: String,
        fail: bool,
    }

    impl MockTool {
        fn new(name: &str) -> Self {
            Self {
                name: name.to_string(),
                description: format!("Mock tool: {}", name),
                fail: false,
            }
        }

        fn failing(name: &str) -> Self {
            Self {
                fail: true,
                ..Self::new(name)
            }
        }
    }

    #[async_trait]
    impl Tool for MockTool {
        fn name(&self) -> &str {
            &self.name
        }

        fn description(&self) -> &str {
            &self.description
        }

        fn schema(&self) -> &Value {
            &MOCK_SCHEMA
        }

        async fn execute(&self, _input: Value) -> Result<Value, Box<dyn Error + Send + Sync>> {
            if self.fail {
                return Err("boom".into());
            }
            Ok(json!({"result": "mock"}))
        }
    }

    fn call(name: &str) -> ToolCall {
        ToolCall {
            name: name.to_string(),
            args: json!({}),
            call_id: Some("call_1".to_string()),
        }
    }

    #[tokio::test]
    async fn test_register_and_get_tool() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(MockTool::new("test_tool"))).await;

        let retrieved = registry.get("test_tool").await;
        assert!(retrieved.is_some());
        assert_eq!(retrieved.unwrap().name(), "test_tool");
        assert!(registry.get("nonexistent").await.is_none());
    }

    #[tokio::test]
    async fn test_specs_sorted_by_name() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(MockTool::new("zeta"))).await;
        registry.register(Arc::new(MockTool::new("alpha"))).await;

        let names: Vec<String> = registry.specs().await.into_iter().map(|s| s.name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
    }

    #[tokio::test]
    async fn test_registry_is_clone() {
        let registry = ToolRegistry::new();
        let cloned = registry.clone();

        // registering through a clone is visible through the first handle
        cloned.register(Arc::new(MockTool::new("tool2"))).await;
        assert!(registry.get("tool2").await.is_some());
    }

    #[tokio::test]
    async fn test_dispatch_success() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(MockTool::new("mock"))).await;

        match registry.dispatch(&call("mock")).await {
            Part::FunctionResponse {
                name,
                response,
                call_id,
            } => {
                assert_eq!(name, "mock");
                assert_eq!(response, json!({"result": "mock"}));
                assert_eq!(call_id.as_deref(), Some("call_1"));
            }
            other => panic!("Expected FunctionResponse, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_dispatch_unknown_and_failing_tools_report_errors() {
        let registry = ToolRegistry::new();
        registry.register(Arc::new(MockTool::failing("flaky"))).await;

        let Part::FunctionResponse { response, .. } = registry.dispatch(&call("missing")).await
        else {
            panic!("Expected FunctionResponse");
        };
        assert_eq!(response["error"], "Tool missing not found");

        let Part::FunctionResponse { response, .. } = registry.dispatch(&call("flaky")).await
        else {
            panic!("Expected FunctionResponse");
        };
        assert_eq!(response["error"], "boom");
    }
}
