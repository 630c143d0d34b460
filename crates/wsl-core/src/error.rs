use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Fatal,
    Warning,
}

#[derive(Debug, Error, Clone, PartialEq)]
#[error("{code}: {message}")]
pub struct ScriptError {
    pub code: String,
    pub message: String,
    pub line: Option<usize>,
    pub severity: Severity,
}

impl ScriptError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            line: None,
            severity: Severity::Fatal,
        }
    }

    pub fn warning(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::new(code, message)
        }
    }

    pub fn with_line(
        code: impl Into<String>,
        message: impl Into<String>,
        line: usize,
    ) -> Self {
        Self {
            line: Some(line),
            ..Self::new(code, message)
        }
    }

    pub fn at_line(mut self, line: usize) -> Self {
        self.line.get_or_insert(line);
        self
    }

    pub fn is_fatal(&self) -> bool {
        self.severity == Severity::Fatal
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_uses_code_and_message() {
        let error = ScriptError::new("VAR_TYPE", "not a number");
        assert_eq!(error.to_string(), "VAR_TYPE: not a number");
        assert!(error.is_fatal());
    }

    #[test]
    fn warning_keeps_code_and_is_not_fatal() {
        let warning = ScriptError::warning("ENGINE_TIMER_UNDEFINED", "Timer \"t\" undefined.");
        assert_eq!(warning.code, "ENGINE_TIMER_UNDEFINED");
        assert!(!warning.is_fatal());
    }

    #[test]
    fn at_line_does_not_override_an_existing_line() {
        let error = ScriptError::with_line("PARSE_ERROR", "bad", 3).at_line(9);
        assert_eq!(error.line, Some(3));
        let error = ScriptError::new("PARSE_ERROR", "bad").at_line(9);
        assert_eq!(error.line, Some(9));
    }

    #[test]
    fn severity_serializes_snake_case() {
        let raw = serde_json::to_string(&Severity::Warning).expect("severity should serialize");
        assert_eq!(raw, "\"warning\"");
    }
}
