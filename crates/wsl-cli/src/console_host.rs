use std::collections::HashMap;
use std::io::{self, BufRead, Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, trace, warn};
use wsl_core::{ScriptError, Value};
use wsl_runtime::{GameStream, LiveValue, ScriptHost, StreamEvent};

/// A bare `>` line stands for the game's prompt.
pub(crate) const PROMPT_LINE: &str = ">";
const FEED_POLL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RunRequest {
    pub(crate) name: String,
    pub(crate) args: Vec<String>,
}

/// Host backed by the terminal: commands and echoes go to `output`,
/// game text arrives line by line through [`ConsoleHost::ingest`].
pub(crate) struct ConsoleHost {
    output: Mutex<Box<dyn Write + Send>>,
    script_prefix: String,
    roundtime_until: Mutex<Option<Instant>>,
    live: RwLock<HashMap<LiveValue, Value>>,
    run_requests: Sender<RunRequest>,
}

impl ConsoleHost {
    pub(crate) fn new(
        output: Box<dyn Write + Send>,
        script_prefix: &str,
        run_requests: Sender<RunRequest>,
    ) -> Self {
        Self {
            output: Mutex::new(output),
            script_prefix: script_prefix.to_string(),
            roundtime_until: Mutex::new(None),
            live: RwLock::new(HashMap::new()),
            run_requests,
        }
    }

    fn write_line(&self, marker: &str, text: &str) -> io::Result<()> {
        let mut output = self.output.lock();
        writeln!(output, "{} {}", marker, text)?;
        output.flush()
    }

    pub(crate) fn set_live(&self, key: LiveValue, value: Value) {
        self.live.write().insert(key, value);
    }

    pub(crate) fn set_roundtime(&self, seconds: u32) {
        let deadline = Instant::now() + Duration::from_secs(u64::from(seconds));
        *self.roundtime_until.lock() = Some(deadline);
    }

    /// Updates client state from one line of game output and returns the
    /// stream events it produces.
    pub(crate) fn ingest(&self, raw: &str) -> Vec<StreamEvent> {
        let line = raw.trim_end_matches(['\r', '\n']);
        if line.trim() == PROMPT_LINE {
            return vec![StreamEvent::Prompt];
        }

        let mut events = vec![StreamEvent::Line(line.to_string())];
        if let Some(seconds) = parse_roundtime(line) {
            self.set_roundtime(seconds);
        } else if let Some(title) = parse_room_title(line) {
            self.set_live(LiveValue::RoomTitle, Value::text(title));
        } else if let Some(exits) = parse_room_exits(line) {
            self.set_live(LiveValue::RoomExits, Value::text(exits));
            events.push(StreamEvent::RoomChange);
        }
        events
    }

    fn request_run(&self, name: &str, args: Vec<String>) -> Result<(), ScriptError> {
        self.run_requests
            .send(RunRequest {
                name: name.to_string(),
                args,
            })
            .map_err(|_| {
                ScriptError::new(
                    "HOST_RUN_UNAVAILABLE",
                    format!("Cannot start script \"{}\" while shutting down.", name),
                )
            })
    }
}

impl ScriptHost for ConsoleHost {
    fn live_value(&self, key: LiveValue) -> Option<Value> {
        if key == LiveValue::RoundTime {
            return Some(Value::Number(f64::from(self.roundtime())));
        }
        self.live.read().get(&key).cloned()
    }

    fn roundtime(&self) -> u32 {
        let deadline = *self.roundtime_until.lock();
        deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
            .map(|remaining| remaining.as_millis().div_ceil(1000) as u32)
            .unwrap_or(0)
    }

    fn send_command(&self, text: &str) -> io::Result<()> {
        self.write_line(">", text)?;
        self.set_live(LiveValue::LastCommand, Value::text(text));
        if let Some(rest) = text
            .strip_prefix(self.script_prefix.as_str())
            .filter(|_| !self.script_prefix.is_empty())
        {
            let mut words = rest.split_whitespace();
            if let Some(name) = words.next() {
                self.request_run(name, words.map(ToString::to_string).collect())
                    .map_err(|error| io::Error::other(error.message))?;
            }
        }
        Ok(())
    }

    fn echo(&self, text: &str) {
        if let Err(error) = self.write_line("|", text) {
            warn!(%error, "echo could not be written");
        }
    }

    fn play_sound(&self, sound: &mut dyn Read) -> io::Result<()> {
        let mut bytes = Vec::new();
        sound.read_to_end(&mut bytes)?;
        debug!(bytes = bytes.len(), "sound played");
        Ok(())
    }

    fn run_script(&self, name: &str, args: &[String]) -> Result<(), ScriptError> {
        self.request_run(name, args.to_vec())
    }
}

fn parse_roundtime(line: &str) -> Option<u32> {
    let rest = line.strip_prefix("Roundtime:")?;
    let digits = rest
        .trim_start()
        .chars()
        .take_while(char::is_ascii_digit)
        .collect::<String>();
    digits.parse().ok()
}

fn parse_room_title(line: &str) -> Option<&str> {
    let title = line.strip_prefix('[')?.strip_suffix(']')?.trim();
    (!title.is_empty()).then_some(title)
}

fn parse_room_exits(line: &str) -> Option<&str> {
    let rest = line
        .strip_prefix("Obvious paths:")
        .or_else(|| line.strip_prefix("Obvious exits:"))?;
    Some(rest.trim().trim_end_matches('.'))
}

/// Feeds `input` into `stream` on a background thread. Each event waits
/// until some script is listening, so piped input is never published
/// into an empty stream. `input_closed` is raised at end of input.
pub(crate) fn spawn_feeder<R>(
    input: R,
    host: Arc<ConsoleHost>,
    stream: GameStream,
    input_closed: Arc<AtomicBool>,
) -> io::Result<JoinHandle<()>>
where
    R: BufRead + Send + 'static,
{
    thread::Builder::new()
        .name("game-feed".to_string())
        .spawn(move || {
            for line in input.lines() {
                let line = match line {
                    Ok(line) => line,
                    Err(error) => {
                        warn!(%error, "game input could not be read");
                        break;
                    }
                };
                for event in host.ingest(&line) {
                    while stream.subscriber_count() == 0 {
                        thread::sleep(FEED_POLL);
                    }
                    trace!(?event, "game event");
                    stream.publish(event);
                }
            }
            debug!("game input closed");
            input_closed.store(true, Ordering::SeqCst);
        })
}
