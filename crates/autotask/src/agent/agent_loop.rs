//! Control loop: execute, remember, review, repeat

use std::io::{stdout, Write};
use std::sync::Arc;

use anyhow::Result;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use super::executor::TaskExecutor;
use super::reviewer::{Decision, ReviewedTask, TaskReviewer};
use super::state::{AgentConfig, AgentState, LoopStatus};
use super::task::{Task, TaskId};
use crate::error::AgentError;
use crate::llm::LanguageModel;
use crate::memory::MemoryStore;

// ANSI colors
const GREEN: &str = "\x1b[92m";
const BLUE: &str = "\x1b[94m";
const YELLOW: &str = "\x1b[93m";
const MAGENTA: &str = "\x1b[95m";
const DIM: &str = "\x1b[2m";
const RESET: &str = "\x1b[0m";

/// Assign sequential ids starting after `current_task_id`.
///
/// Ids written by the model are only compared, never used.
pub fn renumber(current_task_id: TaskId, reviewed: Vec<ReviewedTask>) -> Vec<Task> {
    reviewed
        .into_iter()
        .zip(current_task_id + 1..)
        .map(|(task, id)| {
            match task.numeric_id() {
                Some(model_id) if model_id != id => {
                    warn!(model_id, assigned = id, task = %task.name, "Reviewer id out of sequence, renumbered");
                }
                None => debug!(token = %task.id_token, assigned = id, "Reviewer id not numeric"),
                _ => {}
            }
            Task::new(id, task.name)
        })
        .collect()
}

/// The agent loop orchestrator
pub struct AgentLoop {
    model: Arc<dyn LanguageModel>,
    executor: TaskExecutor,
    memory: Arc<dyn MemoryStore>,
    config: AgentConfig,
    cancel: CancellationToken,
}

impl AgentLoop {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        executor: TaskExecutor,
        memory: Arc<dyn MemoryStore>,
        config: AgentConfig,
    ) -> Self {
        Self {
            model,
            executor,
            memory,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop between iterations once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Run until the objective is answerable or the run terminates
    pub async fn run(&self, objective: &str) -> Result<AgentState> {
        self.run_with_state(AgentState::new(objective)).await
    }

    /// Continue a run from the given state
    #[instrument(skip_all, fields(max_iterations = ?self.config.max_iterations))]
    pub async fn run_with_state(&self, mut state: AgentState) -> Result<AgentState> {
        info!(objective_len = state.objective.len(), tools = ?self.executor.toolbox().names(), "Starting agent loop");
        let reviewer = TaskReviewer::new(Arc::clone(&self.model), state.objective.clone());
        if self.config.verbose {
            println!("{}[Objective]{} {}", MAGENTA, RESET, reviewer.objective());
        }

        while state.is_running() {
            if self.cancel.is_cancelled() {
                warn!(iteration = state.iteration, "Run cancelled");
                state.mark_terminated(AgentError::Cancelled.to_string());
                break;
            }

            if state.queue.is_empty() {
                info!(iteration = state.iteration, "Task queue empty, nothing left to do");
                state.mark_answerable();
                break;
            }

            if let Some(max) = self.config.max_iterations {
                if state.iteration >= max {
                    warn!(max_iterations = max, "Agent reached maximum iterations");
                    state.mark_terminated(AgentError::IterationLimit(max).to_string());
                    break;
                }
            }

            let Some(task) = state.queue.pop() else {
                break;
            };

            state.increment_iteration();
            debug!(iteration = state.iteration, task_id = task.task_id, "Starting iteration");
            if self.config.verbose {
                println!();
                println!("{}[Task {}]{} {}", BLUE, task.task_id, RESET, task.task_name);
                stdout().flush()?;
            }

            let result = match self
                .executor
                .execute(&task, &state.objective, &state.context)
                .await
            {
                Ok(result) => result,
                Err(e) if e.is_task_recoverable() => {
                    warn!(task_id = task.task_id, error = %e, "Task failed, continuing");
                    format!("Task failed: {}", e)
                }
                Err(e) => {
                    error!(task_id = task.task_id, error = %e, "Task execution aborted the run");
                    state.mark_terminated(e.to_string());
                    break;
                }
            };

            if self.config.verbose {
                println!("{}[Result]{} {}", GREEN, RESET, result);
            }

            state.record_result(&task, &result);
            if let Err(e) = self.memory.add(&result).await {
                warn!(task_id = task.task_id, error = %e, "Failed to store result in memory");
            }

            let pending = state.queue.to_vec();
            match reviewer
                .review(task.task_id, state.completed.names(), &pending, &state.context)
                .await
            {
                Ok(Decision::Answerable) => {
                    if self.config.verbose {
                        println!("{}[Review]{} Can answer", YELLOW, RESET);
                    }
                    state.mark_answerable();
                }
                Ok(Decision::Continue(reviewed)) => {
                    state.queue.replace(renumber(task.task_id, reviewed));
                    if self.config.verbose {
                        println!("{}[Review]{} Must continue", YELLOW, RESET);
                        for pending in state.queue.iter() {
                            println!("  {}{}{}", DIM, pending, RESET);
                        }
                    }
                }
                Err(e) => {
                    error!(task_id = task.task_id, error = %e, "Review failed");
                    state.mark_terminated(e.to_string());
                }
            }
        }

        if state.status == LoopStatus::Answerable {
            state.final_answer = Some(self.final_answer(&state).await);
            if self.config.verbose {
                if let Some(answer) = &state.final_answer {
                    println!();
                    println!("{}[Answer]{} {}", MAGENTA, RESET, answer);
                }
            }
        }

        info!(
            status = ?state.status,
            iterations = state.iteration,
            completed = state.completed.len(),
            error = ?state.error,
            "Agent loop completed"
        );

        Ok(state)
    }

    async fn final_answer(&self, state: &AgentState) -> String {
        if !self.config.compose_answer || state.context.trim().is_empty() {
            return state.context.clone();
        }

        let prompt = format!(
            "Answer the objective using only the information below.\n\
             Objective: {}\n\
             Information:\n{}\n\
             Answer:",
            state.objective, state.context
        );
        match self.model.complete(&prompt).await {
            Ok(answer) => answer.trim().to_string(),
            Err(e) => {
                warn!(error = %e, "Could not compose final answer, returning context");
                state.context.clone()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::reviewer::{CAN_ANSWER, MUST_CONTINUE};
    use crate::agent::task::TaskQueue;
    use crate::memory::VectorMemory;
    use crate::testing::{EchoTool, KeywordEmbedder, ScriptedModel};
    use crate::tools::{ToolContext, Toolbox};
    use async_trait::async_trait;

    /// Memory whose inserts always fail
    struct FullMemory;

    #[async_trait]
    impl MemoryStore for FullMemory {
        async fn add(&self, _text: &str) -> Result<String, AgentError> {
            Err(AgentError::Memory("disk full".into()))
        }

        async fn similarity_search(&self, _query: &str, _k: usize) -> Result<Vec<String>, AgentError> {
            Ok(Vec::new())
        }
    }

    const HAIKU: &str = "Salt wind on the swell\nblue depths hum an old lullaby\nfoam writes, then forgets";

    fn build(model: Arc<ScriptedModel>, config: AgentConfig) -> (AgentLoop, Arc<VectorMemory>) {
        let mut toolbox = Toolbox::new();
        toolbox.register(Arc::new(EchoTool));
        let memory = Arc::new(VectorMemory::new(Arc::new(KeywordEmbedder::new(&[
            "ocean", "haiku", "topic", "summary",
        ]))));
        let executor = TaskExecutor::new(model.clone(), memory.clone(), toolbox, ToolContext::default());
        let agent = AgentLoop::new(model, executor, memory.clone(), config.with_verbose(false));
        (agent, memory)
    }

    fn reviewed(id: &str, name: &str) -> ReviewedTask {
        ReviewedTask {
            id_token: id.to_string(),
            name: name.to_string(),
        }
    }

    #[test]
    fn test_renumber_ignores_model_ids() {
        let tasks = renumber(
            2,
            vec![reviewed("3", "Research topic X"), reviewed("5", "Draft summary"), reviewed("#", "Review")],
        );
        assert_eq!(
            tasks,
            vec![
                Task::new(3, "Research topic X"),
                Task::new(4, "Draft summary"),
                Task::new(5, "Review"),
            ]
        );
    }

    #[tokio::test]
    async fn test_haiku_scenario() {
        let objective = "Write a haiku about oceans";
        let model = Arc::new(ScriptedModel::new([format!("Final Answer: {}", HAIKU), CAN_ANSWER.to_string()]));
        let (agent, memory) = build(model.clone(), AgentConfig::default().with_compose_answer(false));

        let state = agent.run(objective).await.unwrap();

        assert_eq!(state.status, LoopStatus::Answerable);
        assert_eq!(state.iteration, 1);
        assert_eq!(state.completed.names(), &[objective.to_string()]);
        assert_eq!(state.context, HAIKU);
        assert_eq!(state.final_answer.as_deref(), Some(HAIKU));
        assert!(state.queue.is_empty());
        assert_eq!(memory.len(), 1);

        // Reviewer saw one completed task and nothing pending
        let review_prompt = &model.prompts()[1];
        assert!(review_prompt.contains(r#"Completed tasks: ["Write a haiku about oceans"]"#));
        assert!(review_prompt.contains("The pending tasks are: []."));
        assert!(review_prompt.contains(HAIKU));
    }

    #[tokio::test]
    async fn test_empty_queue_skips_executor() {
        let model = Arc::new(ScriptedModel::default());
        let (agent, _) = build(model.clone(), AgentConfig::default());

        let state = agent
            .run_with_state(AgentState::with_queue("anything", TaskQueue::new()))
            .await
            .unwrap();

        assert_eq!(state.status, LoopStatus::Answerable);
        assert_eq!(state.iteration, 0);
        assert_eq!(model.calls(), 0);
        assert_eq!(state.final_answer.as_deref(), Some(""));
    }

    #[tokio::test]
    async fn test_continue_replaces_queue_with_renumbered_tasks() {
        let model = Arc::new(ScriptedModel::new([
            "Final Answer: started".to_string(),
            format!("{}\n3. Research topic X\nno dot here\n5. Draft summary", MUST_CONTINUE),
            "Final Answer: topic X notes".to_string(),
            CAN_ANSWER.to_string(),
        ]));
        let (agent, _) = build(model.clone(), AgentConfig::default().with_compose_answer(false));

        let mut queue = TaskQueue::new();
        queue.push(Task::new(2, "Plan the research"));
        let state = agent
            .run_with_state(AgentState::with_queue("Explain X", queue))
            .await
            .unwrap();

        assert_eq!(state.status, LoopStatus::Answerable);
        assert_eq!(
            state.completed.names(),
            &["Plan the research".to_string(), "Research topic X".to_string()]
        );
        // The remaining task kept its loop-assigned id
        assert_eq!(state.queue.to_vec(), vec![Task::new(4, "Draft summary")]);
        assert_eq!(state.context, "started\ntopic X notes");

        // Second review asks for ids after the executed task 3
        assert!(model.prompts()[3].contains("numbered starting at 4"));
    }

    #[tokio::test]
    async fn test_empty_continue_ends_answerable() {
        let model = Arc::new(ScriptedModel::new(["Final Answer: done", MUST_CONTINUE]));
        let (agent, _) = build(model.clone(), AgentConfig::default().with_compose_answer(false));

        let state = agent.run("small job").await.unwrap();
        assert_eq!(state.status, LoopStatus::Answerable);
        assert_eq!(state.iteration, 1);
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test]
    async fn test_tool_failure_is_recorded_not_fatal() {
        let model = Arc::new(ScriptedModel::new([
            "Action: calculator\nAction Input: 2+2",
            CAN_ANSWER,
        ]));
        let (agent, _) = build(model, AgentConfig::default().with_compose_answer(false));

        let state = agent.run("add numbers").await.unwrap();
        assert_eq!(state.status, LoopStatus::Answerable);
        assert_eq!(state.context, "Task failed: Tool not found: calculator");
    }

    #[tokio::test]
    async fn test_garbled_review_terminates() {
        let model = Arc::new(ScriptedModel::new(["Final Answer: x", "Sure! Here are some tasks:\n1. foo"]));
        let (agent, _) = build(model, AgentConfig::default());

        let state = agent.run("anything").await.unwrap();
        assert_eq!(state.status, LoopStatus::Terminated);
        assert!(state.error.unwrap().contains("Could not parse review response"));
        assert!(state.final_answer.is_none());
    }

    #[tokio::test]
    async fn test_iteration_guard() {
        let model = Arc::new(ScriptedModel::new([
            "Final Answer: a".to_string(),
            format!("{}\n2. again", MUST_CONTINUE),
        ]));
        let (agent, _) = build(
            model.clone(),
            AgentConfig::default().with_max_iterations(Some(1)),
        );

        let state = agent.run("loop forever").await.unwrap();
        assert_eq!(state.status, LoopStatus::Terminated);
        assert_eq!(state.error.as_deref(), Some("Reached maximum iterations (1)"));
        assert_eq!(state.queue.to_vec(), vec![Task::new(2, "again")]);
        assert_eq!(model.calls(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let model = Arc::new(ScriptedModel::default());
        let (agent, _) = build(model.clone(), AgentConfig::default());
        let token = CancellationToken::new();
        token.cancel();
        let agent = agent.with_cancellation(token);

        let state = agent.run("anything").await.unwrap();
        assert_eq!(state.status, LoopStatus::Terminated);
        assert_eq!(state.error.as_deref(), Some("Run cancelled"));
        assert_eq!(model.calls(), 0);
    }

    #[tokio::test]
    async fn test_composed_final_answer() {
        let model = Arc::new(ScriptedModel::new([
            format!("Final Answer: {}", HAIKU).as_str(),
            CAN_ANSWER,
            "  Here is your haiku.  ",
        ]));
        let (agent, _) = build(model.clone(), AgentConfig::default());

        let state = agent.run("Write a haiku about oceans").await.unwrap();
        assert_eq!(state.final_answer.as_deref(), Some("Here is your haiku."));
        assert!(model.prompts()[2].contains(HAIKU));
    }

    #[tokio::test]
    async fn test_tool_result_flows_into_context() {
        let model = Arc::new(ScriptedModel::new([
            "Action: echo\nAction Input: ocean facts",
            "Final Answer: oceans are deep",
            CAN_ANSWER,
        ]));
        let (agent, _) = build(model, AgentConfig::default().with_compose_answer(false));

        let state = agent.run("Learn about the ocean").await.unwrap();
        assert_eq!(state.context, "oceans are deep");
    }

    #[tokio::test]
    async fn test_memory_failure_does_not_stop_run() {
        let model = Arc::new(ScriptedModel::new([
            "Final Answer: a".to_string(),
            format!("{}\n2. next", MUST_CONTINUE),
            "Final Answer: b".to_string(),
            CAN_ANSWER.to_string(),
        ]));
        let memory: Arc<dyn MemoryStore> = Arc::new(FullMemory);
        let executor = TaskExecutor::new(model.clone(), memory.clone(), Toolbox::new(), ToolContext::default());
        let agent = AgentLoop::new(
            model.clone(),
            executor,
            memory,
            AgentConfig::default().with_compose_answer(false).with_verbose(false),
        );

        let state = agent.run("two steps").await.unwrap();
        assert_eq!(state.status, LoopStatus::Answerable);
        assert_eq!(state.context, "a\nb");
        assert_eq!(state.completed.len(), 2);
        assert_eq!(model.calls(), 4);
    }

    #[tokio::test]
    async fn test_final_answer_falls_back_to_context() {
        let model = Arc::new(ScriptedModel::new(["Final Answer: a", CAN_ANSWER]));
        model.push_error("timed out after 120s");
        let (agent, _) = build(model.clone(), AgentConfig::default());

        let state = agent.run("anything").await.unwrap();
        assert_eq!(state.status, LoopStatus::Answerable);
        assert_eq!(state.final_answer.as_deref(), Some("a"));
        assert_eq!(model.calls(), 3);
    }

    #[tokio::test]
    async fn test_reviewer_model_error_terminates() {
        let model = Arc::new(ScriptedModel::new(["Final Answer: a"]));
        model.push_error("connection refused");
        let (agent, memory) = build(model.clone(), AgentConfig::default());

        let state = agent.run("anything").await.unwrap();
        assert_eq!(state.status, LoopStatus::Terminated);
        assert_eq!(
            state.error.as_deref(),
            Some("Language model error: connection refused")
        );
        assert!(state.final_answer.is_none());
        assert_eq!(state.context, "a");
        assert_eq!(memory.len(), 1);
        assert_eq!(model.calls(), 2);
    }
}
