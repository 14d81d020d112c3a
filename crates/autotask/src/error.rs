//! Error taxonomy for the agent loop

use thiserror::Error;

/// Errors raised by the executor, reviewer and control loop
#[derive(Error, Debug)]
pub enum AgentError {
    /// The model selected a tool that is not in the toolbox
    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    /// A tool was invoked and failed
    #[error("Tool '{tool}' failed: {source}")]
    ToolExecution {
        tool: String,
        #[source]
        source: anyhow::Error,
    },

    /// Timeout, rate limit, transport failure or unusable completion
    #[error("Language model error: {0}")]
    LanguageModel(String),

    /// Reviewer response did not start with a review marker line
    #[error("Could not parse review response: {0}")]
    ReviewParse(String),

    #[error("Memory store error: {0}")]
    Memory(String),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Reached maximum iterations ({0})")]
    IterationLimit(usize),
}

impl AgentError {
    /// Errors the loop records as a failed task result instead of stopping
    pub fn is_task_recoverable(&self) -> bool {
        matches!(
            self,
            AgentError::ToolNotFound(_)
                | AgentError::ToolExecution { .. }
                | AgentError::LanguageModel(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_tool_execution_keeps_cause() {
        let err = AgentError::ToolExecution {
            tool: "terminal".to_string(),
            source: anyhow::anyhow!("exit status 127"),
        };
        assert_eq!(err.to_string(), "Tool 'terminal' failed: exit status 127");
        assert!(err.source().is_some());
    }

    #[test]
    fn test_recoverable_split() {
        assert!(AgentError::ToolNotFound("x".into()).is_task_recoverable());
        assert!(AgentError::LanguageModel("timeout".into()).is_task_recoverable());
        assert!(!AgentError::ReviewParse("empty".into()).is_task_recoverable());
        assert!(!AgentError::Cancelled.is_task_recoverable());
    }
}
