use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info};
use wsl_core::{ScriptError, ScriptProgram};

use super::callstack::CallStack;
use super::commands::{CommandHandler, CommandTable};
use super::config::ScriptConfig;
use super::host::{ScriptHost, VariableStore};
use super::matching::MatchCoordinator;
use super::rng::seed_from_time;
use super::scope::VariableEnvironment;
use super::signals::{Control, Waiter};
use super::stream::GameStream;
use super::timer::{Clock, SystemClock};

/// Positional variables `1` through this always exist once a script starts.
pub const POSITIONAL_ARGUMENTS: usize = 9;

#[derive(Clone)]
pub struct ScriptEngineOptions {
    pub host: Arc<dyn ScriptHost>,
    pub globals: Arc<dyn VariableStore>,
    pub stream: GameStream,
    pub config: ScriptConfig,
    /// Extra commands. Names must not shadow a builtin.
    pub commands: Vec<(String, Arc<dyn CommandHandler>)>,
    pub clock: Option<Arc<dyn Clock>>,
}

impl ScriptEngineOptions {
    pub fn new(
        host: Arc<dyn ScriptHost>,
        globals: Arc<dyn VariableStore>,
        stream: GameStream,
    ) -> Self {
        Self {
            host,
            globals,
            stream,
            config: ScriptConfig::default(),
            commands: Vec::new(),
            clock: None,
        }
    }
}

/// Starts scripts against one client. Every script gets its own thread,
/// call stack, locals and match list; globals and the stream are shared.
pub struct ScriptEngine {
    host: Arc<dyn ScriptHost>,
    globals: Arc<dyn VariableStore>,
    stream: GameStream,
    config: ScriptConfig,
    commands: Arc<CommandTable>,
    clock: Arc<dyn Clock>,
}

impl ScriptEngine {
    pub fn new(options: ScriptEngineOptions) -> Result<Self, ScriptError> {
        let mut commands = CommandTable::builtin();
        for (name, handler) in options.commands {
            if name.trim().is_empty() || !name.chars().all(|ch| ch.is_alphanumeric() || ch == '_') {
                return Err(ScriptError::new(
                    "ENGINE_COMMAND_NAME_INVALID",
                    format!("Command name \"{}\" is not a single word.", name),
                ));
            }
            if commands.contains(&name) {
                return Err(ScriptError::new(
                    "ENGINE_COMMAND_RESERVED",
                    format!("Command \"{}\" is built in and cannot be replaced.", name),
                ));
            }
            commands.register_arc(&name, handler);
        }

        Ok(Self {
            host: options.host,
            globals: options.globals,
            stream: options.stream,
            config: options.config,
            commands: Arc::new(commands),
            clock: options.clock.unwrap_or_else(|| Arc::new(SystemClock)),
        })
    }

    pub fn stream(&self) -> &GameStream {
        &self.stream
    }

    pub fn config(&self) -> &ScriptConfig {
        &self.config
    }

    pub fn globals(&self) -> &Arc<dyn VariableStore> {
        &self.globals
    }

    pub fn start(
        &self,
        name: &str,
        program: ScriptProgram,
        args: &[String],
    ) -> Result<ScriptHandle, ScriptError> {
        let (control_tx, control_rx) = unbounded();
        let (events_tx, events_rx) = unbounded();
        let waiter = Waiter::new(control_rx);
        let shared = Arc::new(ScriptShared {
            name: name.to_string(),
            state: Mutex::new(RunState::Created),
            control: control_tx,
            events: events_tx,
            open_wait: waiter.open_wait_flag(),
        });

        let mut runner = ScriptRunner {
            name: name.to_string(),
            program: Arc::new(program),
            env: VariableEnvironment::new(
                self.host.clone(),
                self.globals.clone(),
                self.clock.clone(),
            ),
            call_stack: CallStack::new(),
            matches: MatchCoordinator::new(),
            waiter,
            commands: self.commands.clone(),
            host: self.host.clone(),
            stream: self.stream.clone(),
            shared: shared.clone(),
            script_prefix: self.config.script_prefix.clone(),
            debugging: self.config.debug,
            debug_level: self.config.debug_level,
            delay: self.config.delay,
            last_condition: false,
            current_line: None,
            next_line: None,
            current_text: String::new(),
            rng_state: self.config.random_seed.unwrap_or_else(seed_from_time),
        };
        runner.bind_arguments(args);

        shared.set_state(RunState::Running);
        let guard = StopOnUnwind(shared.clone());
        let thread = thread::Builder::new()
            .name(format!("script:{}", name))
            .spawn(move || {
                let _guard = guard;
                runner.run();
            })
            .map_err(|error| {
                shared.set_state(RunState::Stopped);
                ScriptError::new(
                    "ENGINE_THREAD_SPAWN",
                    format!("Could not start script \"{}\": {}", name, error),
                )
            })?;
        info!(target: "script", script = %name, args = args.len(), "script thread started");

        Ok(ScriptHandle {
            shared,
            events: events_rx,
            thread: Arc::new(Mutex::new(Some(thread))),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Created,
    Running,
    Suspended,
    Stopped,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScriptEvent {
    Started,
    Error(ScriptError),
    Stopped,
}

#[derive(Debug)]
pub(crate) struct ScriptShared {
    name: String,
    state: Mutex<RunState>,
    control: Sender<Control>,
    events: Sender<ScriptEvent>,
    open_wait: Arc<AtomicBool>,
}

impl ScriptShared {
    pub(crate) fn state(&self) -> RunState {
        *self.state.lock()
    }

    pub(crate) fn set_state(&self, state: RunState) {
        *self.state.lock() = state;
    }

    pub(crate) fn is_active(&self) -> bool {
        matches!(self.state(), RunState::Running | RunState::Suspended)
    }

    /// Returns `false` when the script had already stopped.
    pub(crate) fn mark_stopped(&self) -> bool {
        let mut state = self.state.lock();
        let was_stopped = *state == RunState::Stopped;
        *state = RunState::Stopped;
        !was_stopped
    }

    pub(crate) fn emit(&self, event: ScriptEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }

    fn send(&self, control: Control) {
        let _ = self.control.send(control);
    }
}

/// Leaves the script stopped, with a final error and `Stopped` event, if
/// its thread unwinds.
struct StopOnUnwind(Arc<ScriptShared>);

impl Drop for StopOnUnwind {
    fn drop(&mut self) {
        if !thread::panicking() {
            return;
        }
        error!(target: "script", script = %self.0.name, "script thread panicked");
        self.0.mark_stopped();
        self.0.emit(ScriptEvent::Error(ScriptError::new(
            "ENGINE_SCRIPT_PANIC",
            format!("Script \"{}\" ended unexpectedly.", self.0.name),
        )));
        self.0.emit(ScriptEvent::Stopped);
    }
}

/// Controls a running script from any thread. Cloning shares the script.
#[derive(Debug, Clone)]
pub struct ScriptHandle {
    shared: Arc<ScriptShared>,
    events: Receiver<ScriptEvent>,
    thread: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl ScriptHandle {
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn state(&self) -> RunState {
        self.shared.state()
    }

    pub fn is_running(&self) -> bool {
        self.shared.is_active()
    }

    /// True while the script blocks on game output with no timeout, so
    /// only new stream events can move it on.
    pub fn is_waiting_on_stream(&self) -> bool {
        self.shared.open_wait.load(Ordering::SeqCst)
    }

    /// Ends the script. Any blocking wait returns promptly.
    pub fn stop(&self) {
        if self.shared.mark_stopped() {
            debug!(target: "script", script = %self.shared.name, "stop requested");
            self.shared.send(Control::Stop);
        }
    }

    /// Parks the script before its next command. Returns `false` if the
    /// script was not running.
    pub fn suspend(&self) -> bool {
        let mut state = self.shared.state.lock();
        if *state != RunState::Running {
            return false;
        }
        *state = RunState::Suspended;
        debug!(target: "script", script = %self.shared.name, "suspended");
        true
    }

    pub fn resume(&self) -> bool {
        {
            let mut state = self.shared.state.lock();
            if *state != RunState::Suspended {
                return false;
            }
            *state = RunState::Running;
        }
        debug!(target: "script", script = %self.shared.name, "resumed");
        self.shared.send(Control::Resume);
        true
    }

    /// Asks the script to jump to `label`. The script thread applies the
    /// jump itself, cutting short whatever it is waiting on.
    pub fn goto_label(&self, label: &str) {
        if self.shared.is_active() {
            self.shared.send(Control::Goto(label.to_string()));
        }
    }

    pub fn events(&self) -> Receiver<ScriptEvent> {
        self.events.clone()
    }

    /// Waits for the script thread to finish. Later calls return at once.
    pub fn join(&self) {
        let thread = self.thread.lock().take();
        if let Some(thread) = thread {
            if thread.join().is_err() {
                self.shared.mark_stopped();
            }
        }
    }
}

/// State owned by one script thread.
pub struct ScriptRunner {
    pub(super) name: String,
    pub(super) program: Arc<ScriptProgram>,
    pub(super) env: VariableEnvironment,
    pub(super) call_stack: CallStack,
    pub(super) matches: MatchCoordinator,
    pub(super) waiter: Waiter,
    pub(super) commands: Arc<CommandTable>,
    pub(super) host: Arc<dyn ScriptHost>,
    pub(super) stream: GameStream,
    pub(super) shared: Arc<ScriptShared>,
    pub(super) script_prefix: String,
    pub(super) debugging: bool,
    pub(super) debug_level: u32,
    pub(super) delay: f64,
    pub(super) last_condition: bool,
    pub(super) current_line: Option<usize>,
    pub(super) next_line: Option<usize>,
    pub(super) current_text: String,
    pub(super) rng_state: u32,
}

impl ScriptRunner {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn host(&self) -> &Arc<dyn ScriptHost> {
        &self.host
    }

    pub fn stream(&self) -> &GameStream {
        &self.stream
    }

    pub fn variables(&self) -> &VariableEnvironment {
        &self.env
    }

    pub fn variables_mut(&mut self) -> &mut VariableEnvironment {
        &mut self.env
    }

    /// 1-based source line of the command being executed.
    pub fn current_line_number(&self) -> Option<usize> {
        self.current_line.map(|index| index + 1)
    }

    pub fn echo(&self, text: &str) {
        self.host.echo(text);
    }

    /// Echoes `message` when debugging is on at `level` or above.
    pub fn script_debug(&self, level: u32, message: &str) {
        if self.debugging && level <= self.debug_level {
            self.host.echo(message);
        }
    }

    /// Ends this script after the current command.
    pub fn stop(&mut self) {
        if self.shared.mark_stopped() {
            debug!(target: "script", script = %self.name, "script stopped itself");
        }
    }

    fn bind_arguments(&mut self, args: &[String]) {
        let joined = args.join(" ");
        self.env.set_local("0", joined.as_str());
        self.env.set_special_value("0", joined.as_str());
        for position in 1..=POSITIONAL_ARGUMENTS.max(args.len()) {
            let value = args.get(position - 1).map(String::as_str).unwrap_or("");
            let name = position.to_string();
            self.env.set_local(&name, value);
            self.env.set_special_value(&name, value);
        }
    }
}
