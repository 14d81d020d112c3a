//! Task execution: answer directly or pick a tool

use std::sync::Arc;

use tracing::{debug, info, instrument, warn};

use super::task::Task;
use crate::error::AgentError;
use crate::llm::LanguageModel;
use crate::memory::MemoryStore;
use crate::tools::{ToolContext, Toolbox};

// ANSI colors
const CYAN: &str = "\x1b[96m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

/// Context characters used when memory has nothing relevant
const CONTEXT_TAIL_CHARS: usize = 2000;

/// What the model asked for in one step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// `Final Answer:` line
    Final(String),
    /// `Action:` / `Action Input:` pair
    Action { tool: String, input: String },
    /// Neither marker; the whole response is the answer
    Direct(String),
}

/// Parse one executor response
pub fn parse_step(response: &str) -> Step {
    let action_at = find_marker(response, "Action:");
    let final_at = find_marker(response, "Final Answer:");

    match (action_at, final_at) {
        (Some(a), Some(f)) if f < a => Step::Final(response[f..].trim().to_string()),
        (Some(a), _) => {
            let after = &response[a..];
            let (tool_line, rest) = after.split_once('\n').unwrap_or((after, ""));
            let input = find_marker(rest, "Action Input:")
                .map(|i| {
                    let input = &rest[i..];
                    let end = input.find("\nObservation:").unwrap_or(input.len());
                    input[..end].trim().to_string()
                })
                .unwrap_or_default();
            Step::Action {
                tool: tool_line.trim().trim_matches('`').to_string(),
                input,
            }
        }
        (None, Some(f)) => Step::Final(response[f..].trim().to_string()),
        (None, None) => Step::Direct(response.trim().to_string()),
    }
}

/// Byte offset just past `marker` when it starts a line
fn find_marker(text: &str, marker: &str) -> Option<usize> {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let trimmed = line.trim_start();
        if trimmed.starts_with(marker) {
            return Some(offset + (line.len() - trimmed.len()) + marker.len());
        }
        offset += line.len();
    }
    None
}

/// Last `max_chars` characters of `text`
fn tail(text: &str, max_chars: usize) -> &str {
    let count = text.chars().count();
    if count <= max_chars {
        return text;
    }
    let start = text
        .char_indices()
        .nth(count - max_chars)
        .map(|(i, _)| i)
        .unwrap_or(0);
    &text[start..]
}

/// Runs a single task with the model and the toolbox
pub struct TaskExecutor {
    model: Arc<dyn LanguageModel>,
    memory: Arc<dyn MemoryStore>,
    toolbox: Toolbox,
    tool_ctx: ToolContext,
    memory_k: usize,
    max_tool_steps: usize,
    verbose: bool,
}

impl TaskExecutor {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        memory: Arc<dyn MemoryStore>,
        toolbox: Toolbox,
        tool_ctx: ToolContext,
    ) -> Self {
        Self {
            model,
            memory,
            toolbox,
            tool_ctx,
            memory_k: 4,
            max_tool_steps: 3,
            verbose: false,
        }
    }

    pub fn with_memory_k(mut self, k: usize) -> Self {
        self.memory_k = k;
        self
    }

    pub fn with_max_tool_steps(mut self, steps: usize) -> Self {
        self.max_tool_steps = steps.max(1);
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn toolbox(&self) -> &Toolbox {
        &self.toolbox
    }

    /// Execute `task`, returning the direct answer or the last tool output
    #[instrument(skip(self, objective, context), fields(task_id = task.task_id))]
    pub async fn execute(&self, task: &Task, objective: &str, context: &str) -> Result<String, AgentError> {
        let relevant = self.relevant_memory(task, context).await;
        let mut scratchpad = String::new();
        let mut last_observation = String::new();

        for step in 0..self.max_tool_steps {
            let prompt = self.build_prompt(task, objective, &relevant, &scratchpad);
            let response = self.model.complete(&prompt).await?;

            match parse_step(&response) {
                Step::Final(answer) | Step::Direct(answer) => {
                    debug!(step, "Task answered directly");
                    return Ok(answer);
                }
                Step::Action { tool, input } => {
                    let observation = self.invoke_tool(&tool, &input).await?;
                    scratchpad.push_str(&format!(
                        "Action: {}\nAction Input: {}\nObservation: {}\n",
                        tool, input, observation
                    ));
                    last_observation = observation;
                }
            }
        }

        debug!(steps = self.max_tool_steps, "Tool step limit reached");
        Ok(last_observation)
    }

    async fn invoke_tool(&self, name: &str, input: &str) -> Result<String, AgentError> {
        let tool = self.toolbox.get(name)?;

        info!(tool = %tool.name(), input_len = input.len(), "Invoking tool");
        if self.verbose {
            println!("{}[Tool: {}]{} {}{}{}", CYAN, tool.name(), RESET, DIM, input, RESET);
        }

        tool.invoke(input, &self.tool_ctx)
            .await
            .map_err(|source| AgentError::ToolExecution {
                tool: tool.name().to_string(),
                source,
            })
    }

    async fn relevant_memory(&self, task: &Task, context: &str) -> String {
        match self.memory.similarity_search(&task.task_name, self.memory_k).await {
            Ok(hits) if !hits.is_empty() => hits.join("\n"),
            Ok(_) => tail(context, CONTEXT_TAIL_CHARS).to_string(),
            Err(e) => {
                warn!(error = %e, "Memory lookup failed, using context tail");
                tail(context, CONTEXT_TAIL_CHARS).to_string()
            }
        }
    }

    fn build_prompt(&self, task: &Task, objective: &str, relevant: &str, scratchpad: &str) -> String {
        let relevant = if relevant.trim().is_empty() {
            "(nothing yet)"
        } else {
            relevant
        };

        format!(
            r#"You are an AI that performs one task toward an objective.
Objective: {objective}
Relevant information from earlier tasks:
{relevant}

You can use these tools:
{tools}

To use a tool, reply in this format:
Thought: what you need to find out
Action: the tool name, one of [{tool_names}]
Action Input: the input for the tool

If you can complete the task without a tool, reply with:
Final Answer: your result for the task

Task: {task}
{scratchpad}"#,
            objective = objective,
            relevant = relevant,
            tools = self.toolbox.describe(),
            tool_names = self.toolbox.names().join(", "),
            task = task.task_name,
            scratchpad = scratchpad,
        )
    }
}
