use std::collections::HashMap;
use std::io::{self, Read};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use wsl_core::{ScriptError, Value};
use wsl_parser::parse_script;

use super::commands::CommandHandler;
use super::config::ScriptConfig;
use super::host::{LiveValue, MemoryVariableStore, ScriptHost};
use super::lifecycle::{ScriptEngine, ScriptEngineOptions, ScriptEvent, ScriptHandle};
use super::stream::GameStream;
use super::timer::ManualClock;

#[derive(Debug, Default)]
pub(crate) struct RecordingHost {
    echoes: Mutex<Vec<String>>,
    sent: Mutex<Vec<String>>,
    runs: Mutex<Vec<(String, Vec<String>)>>,
    sounds: Mutex<Vec<Vec<u8>>>,
    live: Mutex<HashMap<LiveValue, Value>>,
    roundtime: AtomicU32,
}

impl RecordingHost {
    pub(crate) fn set_live(&self, key: LiveValue, value: Value) {
        self.live.lock().insert(key, value);
    }

    pub(crate) fn set_roundtime(&self, seconds: u32) {
        self.roundtime.store(seconds, Ordering::SeqCst);
    }

    pub(crate) fn echoes(&self) -> Vec<String> {
        self.echoes.lock().clone()
    }

    pub(crate) fn sent(&self) -> Vec<String> {
        self.sent.lock().clone()
    }

    pub(crate) fn runs(&self) -> Vec<(String, Vec<String>)> {
        self.runs.lock().clone()
    }

    pub(crate) fn sounds(&self) -> Vec<Vec<u8>> {
        self.sounds.lock().clone()
    }
}

impl ScriptHost for RecordingHost {
    fn live_value(&self, key: LiveValue) -> Option<Value> {
        self.live.lock().get(&key).cloned()
    }

    fn roundtime(&self) -> u32 {
        self.roundtime.load(Ordering::SeqCst)
    }

    fn send_command(&self, text: &str) -> io::Result<()> {
        self.sent.lock().push(text.to_string());
        self.set_live(LiveValue::LastCommand, Value::text(text));
        Ok(())
    }

    fn echo(&self, text: &str) {
        self.echoes.lock().push(text.to_string());
    }

    fn play_sound(&self, sound: &mut dyn Read) -> io::Result<()> {
        let mut bytes = Vec::new();
        sound.read_to_end(&mut bytes)?;
        self.sounds.lock().push(bytes);
        Ok(())
    }

    fn run_script(&self, name: &str, args: &[String]) -> Result<(), ScriptError> {
        if name == "missing" {
            return Err(ScriptError::new(
                "HOST_SCRIPT_MISSING",
                "Script \"missing\" not found.",
            ));
        }
        self.runs.lock().push((name.to_string(), args.to_vec()));
        Ok(())
    }
}

pub(crate) struct Harness {
    pub(crate) host: Arc<RecordingHost>,
    pub(crate) globals: Arc<MemoryVariableStore>,
    pub(crate) stream: GameStream,
    pub(crate) clock: Arc<ManualClock>,
    pub(crate) engine: ScriptEngine,
}

impl Harness {
    pub(crate) fn new() -> Self {
        Self::with_config(ScriptConfig::default())
    }

    pub(crate) fn with_config(config: ScriptConfig) -> Self {
        Self::build(config, Vec::new()).expect("default engine should build")
    }

    pub(crate) fn build(
        config: ScriptConfig,
        commands: Vec<(String, Arc<dyn CommandHandler>)>,
    ) -> Result<Self, ScriptError> {
        let host = Arc::new(RecordingHost::default());
        let globals = Arc::new(MemoryVariableStore::new());
        let stream = GameStream::new();
        let clock = Arc::new(ManualClock::new());
        let mut options = ScriptEngineOptions::new(host.clone(), globals.clone(), stream.clone());
        options.config = config;
        options.commands = commands;
        options.clock = Some(clock.clone());
        let engine = ScriptEngine::new(options)?;
        Ok(Self {
            host,
            globals,
            stream,
            clock,
            engine,
        })
    }

    pub(crate) fn start(&self, source: &str, args: &[&str]) -> ScriptHandle {
        let args = args.iter().map(ToString::to_string).collect::<Vec<_>>();
        self.engine
            .start("test", parse_script(source), &args)
            .expect("script should start")
    }

    /// Starts the script and waits for it to finish.
    pub(crate) fn run(&self, source: &str, args: &[&str]) -> ScriptHandle {
        let handle = self.start(source, args);
        handle.join();
        handle
    }

    pub(crate) fn wait_for_subscribers(&self, count: usize) {
        assert!(
            wait_until(|| self.stream.subscriber_count() == count),
            "script should subscribe to the stream"
        );
    }
}

pub(crate) fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    condition()
}

pub(crate) fn collected_events(handle: &ScriptHandle) -> Vec<ScriptEvent> {
    handle.events().try_iter().collect()
}
