use std::sync::OnceLock;

use regex::Regex;
use wsl_core::{Command, LabelTable, ScriptError, ScriptProgram};

/// Commands that talk to the game server and therefore wait out round-time.
pub const NON_INSTANT_COMMANDS: &[&str] = &["put", "move"];

fn label_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^([A-Za-z0-9_.\-]+):$").expect("label regex must compile"))
}

fn keyword_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"^(\w+)").expect("keyword regex must compile"))
}

fn conditional_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(?i)^(?:if_\d|else)\s+(.*)$").expect("conditional regex must compile")
    })
}

pub fn parse_script(source: &str) -> ScriptProgram {
    let mut commands = Vec::new();
    let mut labels = LabelTable::new();
    let mut warnings = Vec::new();

    for (index, raw) in source.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
            commands.push(None);
            continue;
        }

        if let Some(caps) = label_regex().captures(line) {
            let name = &caps[1];
            if !labels.insert(name, index) {
                warnings.push(
                    ScriptError::warning(
                        "PARSE_DUPLICATE_LABEL",
                        format!("Label \"{}\" is already defined.", name),
                    )
                    .at_line(index + 1),
                );
            }
            commands.push(None);
            continue;
        }

        let keyword = command_keyword(line);
        let instant = !NON_INSTANT_COMMANDS.contains(&effective_keyword(line).as_str());
        commands.push(Some(Command {
            line_number: index + 1,
            text: line.to_string(),
            keyword,
            instant,
        }));
    }

    ScriptProgram {
        commands,
        labels,
        warnings,
    }
}

pub fn command_keyword(line: &str) -> String {
    keyword_regex()
        .captures(line.trim())
        .map(|caps| caps[1].to_lowercase())
        .unwrap_or_default()
}

fn effective_keyword(line: &str) -> String {
    let mut rest = line.trim();
    while let Some(caps) = conditional_regex().captures(rest) {
        let Some(inner) = caps.get(1) else {
            break;
        };
        rest = inner.as_str().trim();
    }
    command_keyword(rest)
}
