//! Built-in tool implementations for CodeCouncil.
//!
//! Tools let the agent gather evidence mid-run: search the web and run a
//! heuristic static check over a file from the audit context.

pub mod code_analysis;
pub mod web_search;

use codecouncil_core::tool::ToolRegistry;

/// Create a default tool registry with all built-in tools.
///
/// Web search runs offline with placeholder results.
pub fn default_registry() -> ToolRegistry {
    registry_with_search(None)
}

/// Create the built-in registry, optionally backed by a SearXNG-compatible
/// search endpoint.
pub fn registry_with_search(search_endpoint: Option<String>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    let search = match search_endpoint {
        Some(endpoint) => web_search::WebSearchTool::with_endpoint(endpoint),
        None => web_search::WebSearchTool::offline(),
    };
    registry.register(Box::new(search));
    registry.register(Box::new(code_analysis::CodeAnalysisTool::new()));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_both_tools() {
        let registry = default_registry();
        assert_eq!(registry.names(), vec!["code_analysis", "web_search"]);
    }

    #[test]
    fn definitions_carry_object_schemas() {
        for def in default_registry().definitions() {
            assert_eq!(def.parameters["type"], "object", "{}", def.name);
            assert!(!def.description.is_empty());
        }
    }
}
