//! Toolbox of tools available for one run

use std::sync::Arc;

use super::{Tool, ToolKind};
use crate::error::AgentError;

/// Ordered set of tools, looked up by name
#[derive(Default, Clone)]
pub struct Toolbox {
    tools: Vec<Arc<dyn Tool>>,
}

impl Toolbox {
    /// Create a new empty toolbox
    pub fn new() -> Self {
        Self { tools: Vec::new() }
    }

    /// Build a toolbox from the configured kinds, skipping duplicates
    pub fn from_kinds(kinds: &[ToolKind]) -> Self {
        let mut toolbox = Self::new();
        for kind in kinds {
            toolbox.register(kind.build());
        }
        toolbox
    }

    /// Register a tool; a tool with the same name replaces the old one
    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        if let Some(existing) = self.tools.iter_mut().find(|t| t.name() == tool.name()) {
            *existing = tool;
        } else {
            self.tools.push(tool);
        }
    }

    /// Resolve a tool by the name the model selected
    pub fn get(&self, name: &str) -> Result<Arc<dyn Tool>, AgentError> {
        let wanted = name.trim();
        self.tools
            .iter()
            .find(|t| t.name() == wanted || t.name().eq_ignore_ascii_case(wanted))
            .cloned()
            .ok_or_else(|| AgentError::ToolNotFound(wanted.to_string()))
    }

    /// List all registered tool names
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// `- name: description` lines for prompts
    pub fn describe(&self) -> String {
        self.tools
            .iter()
            .map(|t| format!("- {}: {}", t.name(), t.description()))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Number of registered tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Check if empty
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for Toolbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Toolbox")
            .field("tools", &self.names())
            .finish()
    }
}
