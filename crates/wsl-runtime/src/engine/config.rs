use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScriptConfig {
    /// Sending a line with this prefix starts another script, which
    /// ends the sending one.
    pub script_prefix: String,
    pub debug: bool,
    pub debug_level: u32,
    /// Seconds to wait before each non-instant command.
    pub delay: f64,
    pub random_seed: Option<u32>,
}

impl Default for ScriptConfig {
    fn default() -> Self {
        Self {
            script_prefix: ".".to_string(),
            debug: false,
            debug_level: 1,
            delay: 0.0,
            random_seed: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: ScriptConfig = serde_json::from_str(r#"{"scriptPrefix":";","delay":0.5}"#)
            .expect("config should parse");
        assert_eq!(config.script_prefix, ";");
        assert_eq!(config.delay, 0.5);
        assert_eq!(config.debug_level, 1);
        assert!(config.random_seed.is_none());
    }
}
