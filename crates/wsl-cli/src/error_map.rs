use std::fmt::Display;

use wsl_core::ScriptError;

fn map_error(code: &'static str, error: impl Display) -> ScriptError {
    ScriptError::new(code, error.to_string())
}

/// Reports on stderr; stdout is the game transcript.
pub(crate) fn emit_error(error: ScriptError) -> i32 {
    eprintln!("RESULT:ERROR");
    eprintln!("ERROR_CODE:{}", error.code);
    eprintln!(
        "ERROR_MSG_JSON:{}",
        serde_json::to_string(&error.message).expect("string json")
    );
    1
}

pub(crate) fn map_cli_io(error: std::io::Error) -> ScriptError {
    map_error("CLI_IO", error)
}

pub(crate) fn map_cli_source_read(error: std::io::Error) -> ScriptError {
    map_error("CLI_SOURCE_READ", error)
}

pub(crate) fn map_cli_source_scan(error: walkdir::Error) -> ScriptError {
    map_error("CLI_SOURCE_SCAN", error)
}

pub(crate) fn map_cli_config_read(error: std::io::Error) -> ScriptError {
    map_error("CLI_CONFIG_READ", error)
}

pub(crate) fn map_cli_config_invalid(error: serde_json::Error) -> ScriptError {
    map_error("CLI_CONFIG_INVALID", error)
}

pub(crate) fn map_cli_state_write(error: std::io::Error) -> ScriptError {
    map_error("CLI_STATE_WRITE", error)
}

pub(crate) fn map_cli_state_read(error: std::io::Error) -> ScriptError {
    map_error("CLI_STATE_READ", error)
}

pub(crate) fn map_cli_state_invalid(error: serde_json::Error) -> ScriptError {
    map_error("CLI_STATE_INVALID", error)
}
