//! Registry of worker tools, keyed by wire name.

use std::collections::HashMap;

use serde_json::{Map, Value};

use crate::bridge::types::{CallToolResult, Tool};

use super::base::WorkerContext;
use super::tools::{
    AuditIndexabilityTool, CrawlSiteTool, CrawlerHealthTool, EchoArgsTool, WorkerTool,
};

/// Registry of all tools the worker exposes.
pub struct WorkerRegistry {
    tools: HashMap<String, Box<dyn WorkerTool>>,
}

impl WorkerRegistry {
    /// Registry with the full built-in tool set.
    pub fn new() -> Self {
        let mut tools: HashMap<String, Box<dyn WorkerTool>> = HashMap::new();

        tools.insert("echo.args".to_string(), Box::new(EchoArgsTool));
        tools.insert("crawler.health".to_string(), Box::new(CrawlerHealthTool));
        tools.insert("crawl.site".to_string(), Box::new(CrawlSiteTool));
        tools.insert(
            "audit.indexability".to_string(),
            Box::new(AuditIndexabilityTool),
        );

        Self { tools }
    }

    /// Wire descriptors for every registered tool, sorted by name.
    pub fn list(&self) -> Vec<Tool> {
        let mut descriptors: Vec<Tool> = self.tools.values().map(|t| t.descriptor()).collect();
        descriptors.sort_by(|a, b| a.name.cmp(&b.name));
        descriptors
    }

    /// Whether a tool with this name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Dispatch a call to the named tool.
    ///
    /// Returns `None` for unknown tool names; the server turns that into a
    /// JSON-RPC error.
    pub async fn call(
        &self,
        ctx: &WorkerContext,
        name: &str,
        args: Map<String, Value>,
    ) -> Option<CallToolResult> {
        let tool = self.tools.get(name)?;
        Some(tool.call(ctx, args).await)
    }
}

impl Default for WorkerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_lists_all_tools_sorted() {
        let registry = WorkerRegistry::new();
        let names: Vec<String> = registry.list().into_iter().map(|t| t.name).collect();
        assert_eq!(
            names,
            vec!["audit.indexability", "crawl.site", "crawler.health", "echo.args"]
        );
    }

    #[tokio::test]
    async fn unknown_tool_is_none() {
        let registry = WorkerRegistry::new();
        let ctx = WorkerContext::new("http://localhost:0", "test-agent");
        let result = registry.call(&ctx, "no.such", Map::new()).await;
        assert!(result.is_none());
    }
}
