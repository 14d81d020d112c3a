//! Task review: decide whether the objective can be answered or the queue
//! must be rewritten
//!
//! The model answers in a small line protocol:
//!
//! ```text
//! Review: Must continue
//! 3. Research topic X
//! 4. Draft summary
//! ```
//!
//! or a single `Review: Can answer` line. The first non-blank line must be one
//! of the two markers; anything else is a parse error.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use super::task::{Task, TaskId};
use crate::error::AgentError;
use crate::llm::LanguageModel;

/// Marker ending the run
pub const CAN_ANSWER: &str = "Review: Can answer";
/// Marker introducing a new task list
pub const MUST_CONTINUE: &str = "Review: Must continue";

/// One `<id>. <description>` line as written by the model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewedTask {
    /// Text before the first `.`, trimmed; not trusted as an id
    pub id_token: String,
    /// Text after the first `.`, trimmed
    pub name: String,
}

impl ReviewedTask {
    /// The id token as a number, if it is one
    pub fn numeric_id(&self) -> Option<TaskId> {
        self.id_token.parse().ok()
    }
}

/// Outcome of a review
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Completed work is enough to answer the objective
    Answerable,
    /// Keep going with this prioritized list (possibly empty)
    Continue(Vec<ReviewedTask>),
}

/// Parse a reviewer response.
///
/// Blank lines are skipped. After `Review: Must continue`, each line is split
/// on its first `.`; lines without one are dropped.
pub fn parse_review(response: &str) -> Result<Decision, AgentError> {
    let mut lines = response.lines().map(str::trim).filter(|l| !l.is_empty());

    let marker = lines
        .next()
        .ok_or_else(|| AgentError::ReviewParse("empty response".to_string()))?;

    match marker {
        CAN_ANSWER => Ok(Decision::Answerable),
        MUST_CONTINUE => {
            let tasks = lines
                .filter_map(|line| {
                    let (id_token, name) = line.split_once('.')?;
                    Some(ReviewedTask {
                        id_token: id_token.trim().to_string(),
                        name: name.trim().to_string(),
                    })
                })
                .collect();
            Ok(Decision::Continue(tasks))
        }
        other => Err(AgentError::ReviewParse(format!(
            "expected '{}' or '{}', got '{}'",
            CAN_ANSWER,
            MUST_CONTINUE,
            other.chars().take(80).collect::<String>()
        ))),
    }
}

/// Asks the model to re-prioritize the pending tasks or stop
pub struct TaskReviewer {
    model: Arc<dyn LanguageModel>,
    objective: String,
}

impl TaskReviewer {
    pub fn new(model: Arc<dyn LanguageModel>, objective: impl Into<String>) -> Self {
        Self {
            model,
            objective: objective.into(),
        }
    }

    pub fn objective(&self) -> &str {
        &self.objective
    }

    /// Review after finishing `current_task_id`
    #[instrument(skip_all, fields(task_id = current_task_id, completed = completed.len(), pending = pending.len()))]
    pub async fn review(
        &self,
        current_task_id: TaskId,
        completed: &[String],
        pending: &[Task],
        context: &str,
    ) -> Result<Decision, AgentError> {
        let prompt = self.build_prompt(current_task_id + 1, completed, pending, context);
        let response = self.model.complete(&prompt).await?;
        debug!(response = %response, "Reviewer response");

        let decision = parse_review(&response)?;
        match &decision {
            Decision::Answerable => info!("Reviewer: objective can be answered"),
            Decision::Continue(tasks) => info!(tasks = tasks.len(), "Reviewer: must continue"),
        }
        Ok(decision)
    }

    fn build_prompt(
        &self,
        next_task_id: TaskId,
        completed: &[String],
        pending: &[Task],
        context: &str,
    ) -> String {
        let pending_names: Vec<&str> = pending.iter().map(|t| t.task_name.as_str()).collect();
        let pending_json = serde_json::to_string(&pending_names).unwrap_or_default();
        let completed_json = serde_json::to_string(completed).unwrap_or_default();

        format!(
            r#"You review and prioritize the task list of an autonomous agent. The pending tasks are: {pending}.
You are given the tasks already completed, the pending tasks, and the information gathered so far.

Decide whether the completed tasks and the information are enough to write a final answer to the objective. If they are, reply with exactly this line and nothing else:
{can_answer}

Never write the final answer yourself.
If more work is needed, reply with a new task list ordered by priority, most important first, numbered starting at {next_id}, in this format:
{must_continue}
{next_id}. First task
{after_next}. Second task

Build the list from the pending tasks. You may drop tasks that are no longer needed and add new ones only if strictly required.

The objective is: {objective}.
Completed tasks: {completed}.
Information gathered so far:
{context}
"#,
            pending = pending_json,
            can_answer = CAN_ANSWER,
            must_continue = MUST_CONTINUE,
            next_id = next_task_id,
            after_next = next_task_id + 1,
            objective = self.objective,
            completed = completed_json,
            context = context,
        )
    }
}
