//! Task-driven agent
//!
//! A control loop pops the highest-priority task, has the executor run it,
//! stores the result in memory and asks the reviewer whether the objective
//! can be answered or which tasks remain.

mod agent_loop;
pub mod executor;
pub mod reviewer;
mod state;
pub mod task;

pub use agent_loop::AgentLoop;
pub use executor::TaskExecutor;
pub use state::{AgentConfig, LoopStatus};
