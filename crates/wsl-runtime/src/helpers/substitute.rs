use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::engine::VariableEnvironment;

fn variable_reference_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"%(\w+)%|%(\d)|\$(\w+)").expect("variable reference regex should compile")
    })
}

/// Expands `%name%` and `%N` (local, then special/global) and `$name`
/// (special/global only). Unknown references are left as written.
pub(crate) fn expand_variables(text: &str, env: &VariableEnvironment) -> String {
    if !text.contains(['%', '$']) {
        return text.to_string();
    }
    variable_reference_regex()
        .replace_all(text, |captures: &Captures<'_>| {
            let resolved = if let Some(name) = captures.get(1).or_else(|| captures.get(2)) {
                env.lookup_any(name.as_str())
            } else {
                captures.get(3).and_then(|name| env.get(name.as_str()))
            };
            resolved
                .map(|value| value.to_string())
                .unwrap_or_else(|| captures[0].to_string())
        })
        .into_owned()
}
