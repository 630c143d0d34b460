use std::sync::OnceLock;
use std::time::Duration;

use regex::Regex;
use tracing::{info, trace, warn};
use wsl_core::{Command, ScriptError};

use super::control_flow::{first_executable_at, next_executable_line, resolve_jump};
use super::lifecycle::{RunState, ScriptEvent, ScriptRunner};
use super::signals::{CommandError, CommandResult, Interrupt};
use crate::helpers::substitute::expand_variables;

const ROUNDTIME_POLL: Duration = Duration::from_millis(100);

fn command_line_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^(\w+)(?:\s+(.*))?$").expect("command line regex should compile"))
}

impl ScriptRunner {
    pub(super) fn run(mut self) {
        info!(target: "script", script = %self.name, "script running");
        self.shared.emit(ScriptEvent::Started);
        for warning in self.program.warnings.clone() {
            self.report(warning);
        }

        let mut current = first_executable_at(&self.program, 0);
        while self.shared.is_active() {
            if self.waiter.poll() == Err(Interrupt::Stop) {
                break;
            }
            if let Some(label) = self.waiter.take_pending_goto() {
                match resolve_jump(&self.program, &label) {
                    Ok(target) => current = target.line,
                    Err(error) => {
                        if self.handle_error(error) {
                            break;
                        }
                    }
                }
            }

            let Some(index) = current else {
                break;
            };
            let Some(command) = self.program.command(index).cloned() else {
                current = next_executable_line(&self.program, index);
                continue;
            };
            self.current_line = Some(index);
            self.current_text = command.text.clone();
            self.next_line = next_executable_line(&self.program, index);

            match self.execute_command(&command) {
                Ok(()) => {}
                Err(CommandError::Interrupted(interrupt)) => {
                    trace!(target: "script", script = %self.name, ?interrupt, "command interrupted");
                }
                Err(CommandError::Script(error)) => {
                    if self.handle_error(error) {
                        break;
                    }
                }
            }
            current = self.next_line;
        }

        self.matches.clear();
        self.shared.mark_stopped();
        info!(target: "script", script = %self.name, "script stopped");
        self.shared.emit(ScriptEvent::Stopped);
    }

    fn execute_command(&mut self, command: &Command) -> CommandResult {
        if !command.instant {
            self.wait_for_roundtime()?;
        }
        while self.shared.state() == RunState::Suspended {
            self.waiter.wait_resume()?;
            if !command.instant {
                self.wait_for_roundtime()?;
            }
        }
        if !self.shared.is_active() {
            return Err(CommandError::Interrupted(Interrupt::Stop));
        }

        let line = expand_variables(&command.text, &self.env);
        self.execute_line(&line)
    }

    /// Dispatches one already-expanded line. Conditionals use this to run
    /// their tail.
    pub fn execute_line(&mut self, line: &str) -> CommandResult {
        let line = line.trim();
        let Some(captures) = command_line_regex().captures(line) else {
            return Ok(());
        };
        let keyword = captures[1].to_lowercase();
        let arguments = captures.get(2).map_or("", |m| m.as_str());

        self.script_debug(2, &format!("Debug: {}", line));
        trace!(target: "script", script = %self.name, %keyword, "dispatch");
        match self.commands.get(&keyword) {
            Some(handler) => handler.execute(self, arguments),
            None => Err(ScriptError::warning(
                "ENGINE_COMMAND_UNKNOWN",
                format!("Invalid command \"{}\"", line),
            )
            .into()),
        }
    }

    fn wait_for_roundtime(&mut self) -> Result<(), Interrupt> {
        while self.host.roundtime() > 0 {
            self.waiter.sleep(ROUNDTIME_POLL)?;
        }
        if self.delay > 0.0 {
            self.waiter.sleep_seconds(self.delay)?;
        }
        Ok(())
    }

    /// Reports the error and returns `true` when the script must stop.
    fn handle_error(&mut self, error: ScriptError) -> bool {
        let fatal = error.is_fatal();
        self.report(error);
        if fatal {
            self.shared.mark_stopped();
        }
        fatal
    }

    fn report(&mut self, error: ScriptError) {
        let error = match self.current_line {
            Some(index) => error.at_line(index + 1),
            None => error,
        };
        let kind = if error.is_fatal() { "error" } else { "warning" };
        let text = match self.current_line {
            Some(_) if error.line == self.current_line_number() => self.current_text.clone(),
            _ => error
                .line
                .and_then(|line| line.checked_sub(1))
                .and_then(|index| self.program.command(index))
                .map(|command| command.text.clone())
                .unwrap_or_default(),
        };
        let line = error.line.map_or_else(|| "?".to_string(), |line| line.to_string());
        if text.is_empty() {
            self.host
                .echo(&format!("Script {} on line {}: {}", kind, line, error.message));
        } else {
            self.host.echo(&format!(
                "Script {} on line {} ({}): {}",
                kind, line, text, error.message
            ));
        }
        warn!(
            target: "script",
            script = %self.name,
            code = %error.code,
            line = ?error.line,
            fatal = error.is_fatal(),
            "{}",
            error.message
        );
        self.shared.emit(ScriptEvent::Error(error));
    }
}
