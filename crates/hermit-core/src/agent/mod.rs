//! Agent orchestration
//!
//! - `Orchestrator` - the canonical turn loop: streaming, tool execution,
//!   sub-agent spawning, persistence
//! - `LoopEvent` - the event protocol consumers subscribe to
//! - `TaskSpawnRequest` - arguments of an intercepted `task` call
//! - repeated-failure fail-fast to stop unproductive retry loops

pub mod executor;
pub mod failure;
pub mod loop_events;
pub mod orchestrator;
pub mod spawn;
pub mod stream;

pub use loop_events::{EventSink, LoopEvent};
pub use orchestrator::{Orchestrator, OrchestratorServices, RunError, RunOptions, RunOutcome};
pub use spawn::TaskSpawnRequest;
