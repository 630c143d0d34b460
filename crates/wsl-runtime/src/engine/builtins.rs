use std::fs::File;
use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;
use wsl_core::{ScriptError, Severity, Value};

use super::lifecycle::ScriptRunner;
use super::matching::{wait_for_event, wait_for_line, Matcher};
use super::rng::next_random_in_range;
use super::scope::SpecialVariable;
use super::signals::{seconds_to_duration, CommandError, CommandResult};
use super::stream::StreamEvent;
use super::timer::ScriptTimer;

const DEFAULT_TIMER: &str = "t";
const COUNTER_VARIABLE: &str = "c";
const RANDOM_VARIABLE: &str = "r";
const SAVE_VARIABLE: &str = "s";

macro_rules! static_regex {
    ($name:ident, $pattern:expr) => {
        fn $name() -> &'static Regex {
            static REGEX: OnceLock<Regex> = OnceLock::new();
            REGEX.get_or_init(|| Regex::new($pattern).expect("builtin regex should compile"))
        }
    };
}

static_regex!(assignment_regex, r"^(\S+)(?:\s+(.+))?$");
static_regex!(gosub_regex, r"^(\S+)\s*(.*)$");
static_regex!(match_regex_args, r"^(\S+)\s+/(.*)/(\w*)\s*$");
static_regex!(match_text_args, r"^(\S+)\s+(.+)$");
static_regex!(waitforre_args, r"^/(.*)/(\w*)\s*$");
static_regex!(random_args, r"^(\d+)\s+(\d+)");
static_regex!(timer_args, r"^(\w+)(?:\s+(\S+))?");
static_regex!(debug_level_args, r"^(\d+)$");

fn fatal(code: &str, message: impl Into<String>) -> CommandError {
    ScriptError::new(code, message).into()
}

fn warning(code: &str, message: impl Into<String>) -> CommandError {
    ScriptError::warning(code, message).into()
}

fn first_word(arguments: &str) -> &str {
    arguments.split_whitespace().next().unwrap_or("")
}

fn parse_seconds(text: &str, command: &str) -> Result<f64, CommandError> {
    text.parse::<f64>()
        .ok()
        .filter(|seconds| seconds.is_finite() && *seconds >= 0.0)
        .ok_or_else(|| {
            fatal(
                "ENGINE_ARGUMENT_NUMBER",
                format!("Invalid argument to {}: \"{}\" is not a number of seconds.", command, text),
            )
        })
}

fn bind_groups(script: &mut ScriptRunner, groups: &[String]) {
    for (index, group) in groups.iter().enumerate() {
        script.env.set_local(&index.to_string(), group.as_str());
    }
}

pub(super) fn set_variable(script: &mut ScriptRunner, arguments: &str) -> CommandResult {
    let Some(captures) = assignment_regex().captures(arguments.trim()) else {
        return Err(warning(
            "ENGINE_SETVARIABLE_ARGS",
            "Invalid arguments to setvariable.",
        ));
    };
    let name = &captures[1];
    let value = captures.get(2).map_or("", |m| m.as_str());
    script.script_debug(1, &format!("setVariable: {}={}", name, value));
    script.env.set_global(name, &Value::text(value))?;
    Ok(())
}

pub(super) fn set_local_variable(script: &mut ScriptRunner, arguments: &str) -> CommandResult {
    let Some(captures) = assignment_regex().captures(arguments.trim()) else {
        return Err(fatal(
            "ENGINE_SETLOCALVARIABLE_ARGS",
            "Invalid arguments to setlocalvariable.",
        ));
    };
    let name = captures[1].to_string();
    let value = captures.get(2).map_or("", |m| m.as_str());
    script.script_debug(1, &format!("setLocalVariable: {}={}", name, value));
    script.env.set_local(&name, value);
    Ok(())
}

pub(super) fn delete_variable(script: &mut ScriptRunner, arguments: &str) -> CommandResult {
    let name = first_word(arguments);
    if name.is_empty() {
        return Err(warning(
            "ENGINE_DELETEVARIABLE_ARGS",
            "Invalid arguments to deletevariable.",
        ));
    }
    script.env.delete_variable(name);
    Ok(())
}

pub(super) fn delete_local_variable(script: &mut ScriptRunner, arguments: &str) -> CommandResult {
    let name = first_word(arguments);
    if name.is_empty() {
        return Err(warning(
            "ENGINE_DELETELOCALVARIABLE_ARGS",
            "Invalid arguments to deletelocalvariable.",
        ));
    }
    script.env.delete_local(name);
    Ok(())
}

pub(super) fn goto(script: &mut ScriptRunner, arguments: &str) -> CommandResult {
    let label = first_word(arguments);
    if label.is_empty() {
        return Err(fatal("ENGINE_GOTO_ARGS", "Invalid arguments to goto."));
    }
    script.goto_label(label)?;
    Ok(())
}

pub(super) fn gosub(script: &mut ScriptRunner, arguments: &str) -> CommandResult {
    let Some(captures) = gosub_regex().captures(arguments.trim()) else {
        return Err(fatal("ENGINE_GOSUB_ARGS", "Invalid arguments to gosub."));
    };
    let label = captures[1].to_string();
    let rest = captures.get(2).map_or("", |m| m.as_str());
    script.gosub(&label, rest)?;
    Ok(())
}

pub(super) fn return_command(script: &mut ScriptRunner, _arguments: &str) -> CommandResult {
    script.return_from_subroutine()?;
    Ok(())
}

pub(super) fn if_variable(script: &mut ScriptRunner, name: &str, arguments: &str) -> CommandResult {
    let fired = script
        .env
        .lookup_any(name)
        .is_some_and(|value| !value.is_empty());
    script.last_condition = fired;
    if fired {
        script.execute_line(arguments)?;
    }
    Ok(())
}

pub(super) fn else_command(script: &mut ScriptRunner, arguments: &str) -> CommandResult {
    if !script.last_condition {
        script.execute_line(arguments)?;
    }
    Ok(())
}

pub(super) fn match_text(script: &mut ScriptRunner, arguments: &str) -> CommandResult {
    let Some(captures) = match_text_args().captures(arguments.trim()) else {
        return Err(fatal("ENGINE_MATCH_ARGS", "Invalid arguments to match."));
    };
    let label = captures[1].to_string();
    let matcher = Matcher::text(&captures[2]);
    script.matches.register(matcher, label, &script.stream);
    Ok(())
}

pub(super) fn match_regex(script: &mut ScriptRunner, arguments: &str) -> CommandResult {
    let Some(captures) = match_regex_args().captures(arguments.trim()) else {
        return Err(fatal("ENGINE_MATCHRE_ARGS", "Invalid arguments to matchre."));
    };
    let label = captures[1].to_string();
    let case_insensitive = captures[3].contains('i');
    let matcher = Matcher::regex(&captures[2], case_insensitive)?;
    script.matches.register(matcher, label, &script.stream);
    Ok(())
}

pub(super) fn matchwait(script: &mut ScriptRunner, arguments: &str) -> CommandResult {
    let timeout = match first_word(arguments) {
        "" => None,
        text => {
            let seconds = parse_seconds(text, "matchwait")?;
            // Zero, or longer than can be scheduled, waits indefinitely.
            (seconds > 0.0)
                .then(|| seconds_to_duration(seconds))
                .flatten()
        }
    };
    if script.matches.pending_count() == 0 {
        script.matches.clear();
        return Err(warning(
            "ENGINE_MATCHWAIT_EMPTY",
            "matchwait called with no pending matches.",
        ));
    }

    let hit = script.matches.await_match(&mut script.waiter, timeout)?;
    let Some(hit) = hit else {
        script.script_debug(1, "matchwait timed out");
        return Ok(());
    };
    if let Some(groups) = &hit.groups {
        bind_groups(script, groups);
    }
    script.goto_label(&hit.label)?;
    Ok(())
}

pub(super) fn waitfor(script: &mut ScriptRunner, arguments: &str) -> CommandResult {
    let text = arguments.trim();
    if text.is_empty() {
        return Err(fatal("ENGINE_WAITFOR_ARGS", "Invalid arguments to waitfor."));
    }
    let subscription = script.stream.subscribe();
    let matcher = Matcher::text(text);
    script.script_debug(1, &format!("waitfor {}", text));
    wait_for_line(&mut script.waiter, &subscription, &matcher)?;
    Ok(())
}

pub(super) fn waitforre(script: &mut ScriptRunner, arguments: &str) -> CommandResult {
    let Some(captures) = waitforre_args().captures(arguments.trim()) else {
        return Err(fatal("ENGINE_WAITFORRE_ARGS", "Invalid arguments to waitforre."));
    };
    let matcher = Matcher::regex(&captures[1], captures[2].contains('i'))?;
    let subscription = script.stream.subscribe();
    let groups = wait_for_line(&mut script.waiter, &subscription, &matcher)?;
    bind_groups(script, &groups);
    Ok(())
}

pub(super) fn wait(script: &mut ScriptRunner, _arguments: &str) -> CommandResult {
    let subscription = script.stream.subscribe();
    wait_for_event(&mut script.waiter, &subscription, &StreamEvent::Prompt)?;
    Ok(())
}

pub(super) fn nextroom(script: &mut ScriptRunner, _arguments: &str) -> CommandResult {
    let subscription = script.stream.subscribe();
    wait_for_event(&mut script.waiter, &subscription, &StreamEvent::RoomChange)?;
    Ok(())
}

pub(super) fn move_command(script: &mut ScriptRunner, arguments: &str) -> CommandResult {
    let direction = arguments.trim();
    if direction.is_empty() {
        return Err(fatal("ENGINE_MOVE_ARGS", "Invalid arguments to move."));
    }
    // Subscribe before sending so a fast room change is not missed.
    let subscription = script.stream.subscribe();
    send(script, direction)?;
    wait_for_event(&mut script.waiter, &subscription, &StreamEvent::RoomChange)?;
    Ok(())
}

fn send(script: &ScriptRunner, text: &str) -> Result<(), CommandError> {
    script
        .host
        .send_command(text)
        .map_err(|error| warning("ENGINE_SEND_FAILED", format!("Could not send \"{}\": {}", text, error)))
}

pub(super) fn put(script: &mut ScriptRunner, arguments: &str) -> CommandResult {
    let text = arguments.trim();
    send(script, text)?;
    if !script.script_prefix.is_empty() && text.starts_with(script.script_prefix.as_str()) {
        debug!(target: "script", script = %script.name, "put started another script");
        script.stop();
    }
    Ok(())
}

pub(super) fn echo(script: &mut ScriptRunner, arguments: &str) -> CommandResult {
    script.echo(arguments);
    Ok(())
}

pub(super) fn pause(script: &mut ScriptRunner, arguments: &str) -> CommandResult {
    let seconds = match first_word(arguments) {
        "" => 1.0,
        text => parse_seconds(text, "pause")?,
    };
    script.waiter.sleep_seconds(seconds)?;
    Ok(())
}

pub(super) fn delay(script: &mut ScriptRunner, arguments: &str) -> CommandResult {
    script.delay = parse_seconds(first_word(arguments), "delay")?;
    Ok(())
}

fn math_operation(script: &mut ScriptRunner, target: &str, arguments: &str) -> CommandResult {
    let mut words = arguments.split_whitespace();
    let Some(operation) = words.next() else {
        return Err(fatal("ENGINE_MATH_ARGS", "Invalid arguments to math."));
    };
    let operand = match words.next() {
        Some(text) => text.parse::<f64>().map_err(|_| {
            fatal(
                "ENGINE_MATH_OPERAND",
                format!("Operand \"{}\" is not a number.", text),
            )
        })?,
        None => 1.0,
    };

    let operation = operation.to_lowercase();
    if operation == "set" {
        script.env.set_global(target, &Value::Number(operand))?;
        return Ok(());
    }

    let current = match script.env.get(target) {
        Some(value) => value.to_number().map_err(|_| {
            fatal(
                "ENGINE_MATH_NOT_NUMBER",
                format!("Variable \"{}\" is not a number.", target),
            )
        })?,
        None => 0.0,
    };
    let result = match operation.as_str() {
        "add" => current + operand,
        "subtract" => current - operand,
        "multiply" => current * operand,
        "divide" | "modulus" if operand == 0.0 => {
            return Err(fatal("ENGINE_MATH_DIVIDE_BY_ZERO", "Cannot divide by zero."));
        }
        "divide" => current / operand,
        "modulus" => current % operand,
        other => {
            return Err(fatal(
                "ENGINE_MATH_OPERATOR",
                format!("Unknown math operator \"{}\".", other),
            ));
        }
    };
    script.script_debug(1, &format!("math {}: {} -> {}", target, current, result));
    script.env.set_global(target, &Value::Number(result))?;
    Ok(())
}

pub(super) fn math(script: &mut ScriptRunner, arguments: &str) -> CommandResult {
    let arguments = arguments.trim();
    let (target, rest) = arguments
        .split_once(char::is_whitespace)
        .unwrap_or((arguments, ""));
    if target.is_empty() {
        return Err(fatal("ENGINE_MATH_ARGS", "Invalid arguments to math."));
    }
    math_operation(script, target, rest)
}

pub(super) fn counter(script: &mut ScriptRunner, arguments: &str) -> CommandResult {
    if arguments.trim().is_empty() {
        return Err(fatal("ENGINE_COUNTER_ARGS", "Invalid arguments to counter."));
    }
    math_operation(script, COUNTER_VARIABLE, arguments)
}

pub(super) fn random(script: &mut ScriptRunner, arguments: &str) -> CommandResult {
    let Some(captures) = random_args().captures(arguments.trim()) else {
        return Err(fatal("ENGINE_RANDOM_ARGS", "Invalid arguments to random."));
    };
    let bound = |text: &str| {
        text.parse::<u32>()
            .map_err(|_| fatal("ENGINE_RANDOM_ARGS", format!("Random bound \"{}\" is too large.", text)))
    };
    let min = bound(&captures[1])?;
    let max = bound(&captures[2])?;
    if min > max {
        return Err(fatal(
            "ENGINE_RANDOM_RANGE",
            format!("Invalid random range: {} is greater than {}.", min, max),
        ));
    }
    let value = next_random_in_range(&mut script.rng_state, min, max);
    script.env.set_special_value(RANDOM_VARIABLE, Value::Number(f64::from(value)));
    Ok(())
}

pub(super) fn timer(script: &mut ScriptRunner, arguments: &str) -> CommandResult {
    let Some(captures) = timer_args().captures(arguments.trim()) else {
        return Err(fatal("ENGINE_TIMER_ARGS", "Invalid arguments to timer."));
    };
    let action = captures[1].to_lowercase();
    let name = captures.get(2).map_or(DEFAULT_TIMER, |m| m.as_str()).to_string();

    let defined = match script.env.special(&name) {
        Some(SpecialVariable::Timer(_)) => true,
        None if !script.env.exists(&name) => false,
        _ => {
            return Err(fatal(
                "ENGINE_TIMER_NOT_TIMER",
                format!("Variable \"{}\" is not a timer.", name),
            ));
        }
    };
    let now = script.env.now();

    match action.as_str() {
        "start" => {
            if !defined {
                script.env.set_special(&name, SpecialVariable::Timer(ScriptTimer::new()));
            }
            if let Some(timer) = script.env.timer_mut(&name) {
                timer.start(now);
            }
        }
        "stop" | "clear" => {
            let Some(timer) = script.env.timer_mut(&name) else {
                return Err(warning(
                    "ENGINE_TIMER_UNDEFINED",
                    format!("Timer \"{}\" is not defined.", name),
                ));
            };
            if action == "stop" {
                timer.stop(now);
            } else {
                timer.clear();
            }
        }
        other => {
            return Err(fatal(
                "ENGINE_TIMER_COMMAND",
                format!("Invalid timer command \"{}\".", other),
            ));
        }
    }
    Ok(())
}

pub(super) fn shift(script: &mut ScriptRunner, arguments: &str) -> CommandResult {
    let local = first_word(arguments).eq_ignore_ascii_case("local");
    let mut shifted = Vec::new();
    let mut position = 1usize;
    loop {
        let current = position.to_string();
        let next = (position + 1).to_string();
        let next_exists = if local {
            script.env.local_exists(&next)
        } else {
            script.env.exists(&next)
        };

        if !next_exists {
            let joined = shifted
                .iter()
                .filter(|value: &&String| !value.is_empty())
                .cloned()
                .collect::<Vec<_>>()
                .join(" ");
            if local {
                script.env.set_local("0", joined);
                script.env.set_local(&current, "");
            } else {
                script.env.set_special_value("0", joined);
                script.env.set_special_value(&current, "");
            }
            return Ok(());
        }

        let value = if local {
            script.env.get_local(&next).cloned()
        } else {
            script.env.get(&next)
        };
        let Some(value) = value else {
            return Err(fatal(
                "ENGINE_SHIFT_MISSING",
                format!("Argument {} vanished while shifting.", next),
            ));
        };
        let text = value.to_string();
        if local {
            script.env.set_local(&current, text.as_str());
        } else {
            script.env.set_special_value(&current, text.as_str());
        }
        shifted.push(text);
        position += 1;
    }
}

pub(super) fn save(script: &mut ScriptRunner, arguments: &str) -> CommandResult {
    script.env.set_special_value(SAVE_VARIABLE, arguments.trim());
    Ok(())
}

pub(super) fn run(script: &mut ScriptRunner, arguments: &str) -> CommandResult {
    let mut words = arguments.split_whitespace();
    let Some(name) = words.next() else {
        return Err(fatal("ENGINE_RUN_ARGS", "Invalid arguments to run."));
    };
    let args = words.map(ToString::to_string).collect::<Vec<_>>();
    script.host.run_script(name, &args).map_err(|error| {
        CommandError::Script(ScriptError {
            severity: Severity::Warning,
            ..error
        })
    })
}

pub(super) fn playsound(script: &mut ScriptRunner, arguments: &str) -> CommandResult {
    let path = arguments.trim();
    if path.is_empty() {
        return Err(fatal("ENGINE_PLAYSOUND_ARGS", "Invalid arguments to playsound."));
    }
    let mut file = File::open(path).map_err(|error| {
        warning(
            "ENGINE_SOUND_MISSING",
            format!("Sound file \"{}\" could not be opened: {}", path, error),
        )
    })?;
    script
        .host
        .play_sound(&mut file)
        .map_err(|error| warning("ENGINE_SOUND_FAILED", format!("Could not play \"{}\": {}", path, error)))
}

pub(super) fn exit(script: &mut ScriptRunner, _arguments: &str) -> CommandResult {
    script.stop();
    Ok(())
}

pub(super) fn debug_command(script: &mut ScriptRunner, arguments: &str) -> CommandResult {
    script.debugging = match first_word(arguments).to_lowercase().as_str() {
        "" | "on" | "true" | "yes" => true,
        _ => false,
    };
    Ok(())
}

pub(super) fn debug_level(script: &mut ScriptRunner, arguments: &str) -> CommandResult {
    if let Some(captures) = debug_level_args().captures(arguments.trim()) {
        if let Ok(level) = captures[1].parse::<u32>() {
            script.debug_level = level;
        }
    }
    Ok(())
}
