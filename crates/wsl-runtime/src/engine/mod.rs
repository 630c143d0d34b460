mod builtins;
mod callstack;
mod commands;
mod config;
mod control_flow;
mod host;
mod lifecycle;
mod matching;
mod rng;
mod scope;
mod signals;
mod step;
mod stream;
mod timer;

#[cfg(test)]
pub(crate) mod test_support;

pub use callstack::{subroutine_locals, CallFrame, CallStack};
pub use commands::{CommandHandler, CommandTable};
pub use config::ScriptConfig;
pub use control_flow::{first_executable_at, next_executable_line, resolve_jump, JumpTarget};
pub use host::{LiveValue, MemoryVariableStore, ScriptHost, VariableStore};
pub use lifecycle::{
    RunState, ScriptEngine, ScriptEngineOptions, ScriptEvent, ScriptHandle, ScriptRunner,
    POSITIONAL_ARGUMENTS,
};
pub use matching::{first_hit, MatchCoordinator, MatchHit, Matcher, PendingMatch};
pub use scope::{LocalScope, SpecialVariable, VariableEnvironment};
pub use signals::{CommandError, CommandResult, Interrupt};
pub use stream::{GameStream, StreamEvent, Subscription};
pub use timer::{Clock, ManualClock, ScriptTimer, SystemClock};
