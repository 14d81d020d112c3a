//! Agent state management

use super::task::{CompletedLog, Task, TaskQueue};

/// Configuration for the control loop
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Stop with an error after this many iterations (no cap when `None`)
    pub max_iterations: Option<usize>,
    /// Ask the model for a final answer once the reviewer is satisfied
    pub compose_answer: bool,
    /// Whether to print progress to stdout
    pub verbose: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: None,
            compose_answer: true,
            verbose: true,
        }
    }
}

impl AgentConfig {
    pub fn with_max_iterations(mut self, max: Option<usize>) -> Self {
        self.max_iterations = max;
        self
    }

    pub fn with_compose_answer(mut self, compose: bool) -> Self {
        self.compose_answer = compose;
        self
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

/// Control loop state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopStatus {
    Running,
    /// The reviewer judged the objective answerable, or nothing is left to do
    Answerable,
    /// Stopped by an error, cancellation or the iteration guard
    Terminated,
}

/// State of one run
#[derive(Debug)]
pub struct AgentState {
    pub objective: String,
    pub status: LoopStatus,
    /// Iterations started
    pub iteration: usize,
    pub queue: TaskQueue,
    pub completed: CompletedLog,
    /// All results so far, newline separated
    pub context: String,
    /// Final answer (if answerable)
    pub final_answer: Option<String>,
    /// Error message (if terminated)
    pub error: Option<String>,
}

impl AgentState {
    /// Fresh state with the objective as the first task
    pub fn new(objective: impl Into<String>) -> Self {
        let objective = objective.into();
        let queue = TaskQueue::seeded(Task::new(1, objective.clone()));
        Self::with_queue(objective, queue)
    }

    /// Fresh state with an explicit starting queue
    pub fn with_queue(objective: impl Into<String>, queue: TaskQueue) -> Self {
        Self {
            objective: objective.into(),
            status: LoopStatus::Running,
            iteration: 0,
            queue,
            completed: CompletedLog::new(),
            context: String::new(),
            final_answer: None,
            error: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == LoopStatus::Running
    }

    /// Record a finished task and its result
    pub fn record_result(&mut self, task: &Task, result: &str) {
        self.completed.record(task);
        if !self.context.is_empty() {
            self.context.push('\n');
        }
        self.context.push_str(result);
    }

    pub fn mark_answerable(&mut self) {
        self.status = LoopStatus::Answerable;
    }

    pub fn mark_terminated(&mut self, error: String) {
        self.status = LoopStatus::Terminated;
        self.error = Some(error);
    }

    pub fn increment_iteration(&mut self) {
        self.iteration += 1;
    }
}
