use std::fs;
use std::io::{self, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError};
use tracing::{info, warn};
use wsl_core::ScriptError;
use wsl_runtime::{
    GameStream, MemoryVariableStore, ScriptConfig, ScriptEngine, ScriptEngineOptions,
    ScriptEvent, ScriptHandle, ScriptHost, VariableStore,
};

use crate::console_host::{spawn_feeder, ConsoleHost, RunRequest};
use crate::state_store::JsonFileVariableStore;
use crate::{
    load_script, map_cli_config_invalid, map_cli_config_read, map_cli_io, resolve_script_path,
    RunArgs,
};

const SUPERVISOR_POLL: Duration = Duration::from_millis(50);
/// How long a script may sit blocked on the stream after input has ended.
const INPUT_DRAIN_GRACE: Duration = Duration::from_millis(250);

pub(crate) fn load_config(path: Option<&Path>) -> Result<ScriptConfig, ScriptError> {
    let Some(path) = path else {
        return Ok(ScriptConfig::default());
    };
    let raw = fs::read_to_string(path).map_err(map_cli_config_read)?;
    serde_json::from_str(&raw).map_err(map_cli_config_invalid)
}

pub(crate) fn apply_overrides(config: &mut ScriptConfig, args: &RunArgs) {
    if let Some(prefix) = &args.prefix {
        config.script_prefix = prefix.clone();
    }
    if args.debug {
        config.debug = true;
    }
    if let Some(seed) = args.seed {
        config.random_seed = Some(seed);
    }
}

pub(crate) fn run_session(args: RunArgs) -> Result<i32, ScriptError> {
    let mut config = load_config(args.config.as_deref().map(Path::new))?;
    apply_overrides(&mut config, &args);

    let globals: Arc<dyn VariableStore> = match &args.globals {
        Some(path) => Arc::new(JsonFileVariableStore::open(path)?),
        None => Arc::new(MemoryVariableStore::new()),
    };

    let path = resolve_script_path(&args.script, None)?;
    let loaded = load_script(&path)?;
    let base_dir = path.parent().map(Path::to_path_buf);

    let (run_tx, run_rx) = unbounded();
    let host = Arc::new(ConsoleHost::new(
        Box::new(io::stdout()),
        &config.script_prefix,
        run_tx,
    ));
    let stream = GameStream::new();
    let engine = ScriptEngine::new(ScriptEngineOptions {
        config,
        ..ScriptEngineOptions::new(host.clone(), globals, stream.clone())
    })?;

    let input_closed = Arc::new(AtomicBool::new(false));
    spawn_feeder(
        BufReader::new(io::stdin()),
        host.clone(),
        stream,
        input_closed.clone(),
    )
    .map_err(map_cli_io)?;

    let first = engine.start(&loaded.name, loaded.program, &args.args)?;
    let mut supervisor = Supervisor {
        engine,
        host,
        handles: vec![first],
        base_dir,
        input_closed,
        waiting_since: None,
        exit_code: 0,
    };
    Ok(supervisor.run(&run_rx))
}

struct Supervisor {
    engine: ScriptEngine,
    host: Arc<ConsoleHost>,
    handles: Vec<ScriptHandle>,
    base_dir: Option<PathBuf>,
    input_closed: Arc<AtomicBool>,
    waiting_since: Option<Instant>,
    exit_code: i32,
}

impl Supervisor {
    /// Runs until every script has stopped. Returns 1 if any script hit a
    /// fatal error.
    fn run(&mut self, run_requests: &Receiver<RunRequest>) -> i32 {
        loop {
            self.reap();
            if self.handles.is_empty() {
                return self.exit_code;
            }

            match run_requests.recv_timeout(SUPERVISOR_POLL) {
                Ok(request) => self.start(request),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => std::thread::sleep(SUPERVISOR_POLL),
            }
            self.stop_if_starved();
        }
    }

    fn reap(&mut self) {
        let exit_code = &mut self.exit_code;
        self.handles.retain(|handle| {
            // Errors are emitted before the state flips, so a stopped
            // script has nothing left to say after this drain.
            let running = handle.is_running();
            for event in handle.events().try_iter() {
                if let ScriptEvent::Error(error) = event {
                    if error.is_fatal() {
                        *exit_code = 1;
                    }
                }
            }
            if !running {
                handle.join();
                info!(script = %handle.name(), "script finished");
            }
            running
        });
    }

    fn start(&mut self, request: RunRequest) {
        let started = resolve_script_path(&request.name, self.base_dir.as_deref())
            .and_then(|path| load_script(&path))
            .and_then(|loaded| self.engine.start(&loaded.name, loaded.program, &request.args));
        match started {
            Ok(handle) => self.handles.push(handle),
            Err(error) => {
                warn!(script = %request.name, code = %error.code, "{}", error.message);
                self.host.echo(&format!(
                    "Could not run script \"{}\": {}",
                    request.name, error.message
                ));
            }
        }
    }

    /// Once input has ended, a script blocked on game output with no
    /// timeout can never be satisfied. Timed waits run to their timeout.
    fn stop_if_starved(&mut self) {
        let starved = self.input_closed.load(Ordering::SeqCst)
            && self.handles.iter().any(ScriptHandle::is_waiting_on_stream);
        if !starved {
            self.waiting_since = None;
            return;
        }
        let since = *self.waiting_since.get_or_insert_with(Instant::now);
        if since.elapsed() >= INPUT_DRAIN_GRACE {
            info!("game input ended, stopping scripts waiting on it");
            for handle in self.handles.iter().filter(|handle| handle.is_waiting_on_stream()) {
                handle.stop();
            }
            self.waiting_since = None;
        }
    }
}
