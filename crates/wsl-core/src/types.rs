use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ScriptError;

/// Fallback goto target used when a referenced label does not exist.
pub const LABEL_ERROR: &str = "labelerror";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Command {
    pub line_number: usize,
    pub text: String,
    pub keyword: String,
    pub instant: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabelTable {
    labels: BTreeMap<String, usize>,
}

impl LabelTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `false` when the label was already declared; the first
    /// declaration is kept.
    pub fn insert(&mut self, name: &str, index: usize) -> bool {
        let key = normalize_label(name);
        if self.labels.contains_key(&key) {
            return false;
        }
        self.labels.insert(key, index);
        true
    }

    pub fn get(&self, name: &str) -> Option<usize> {
        self.labels.get(&normalize_label(name)).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.labels.contains_key(&normalize_label(name))
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.labels.iter().map(|(name, index)| (name.as_str(), *index))
    }
}

pub fn normalize_label(name: &str) -> String {
    let name = name.trim();
    let name = match name.find(':') {
        Some(pos) => &name[..pos],
        None => name,
    };
    name.to_lowercase()
}

/// Sparse, line-indexed command arena plus its label table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScriptProgram {
    pub commands: Vec<Option<Command>>,
    pub labels: LabelTable,
    #[serde(skip)]
    pub warnings: Vec<ScriptError>,
}

impl ScriptProgram {
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn command(&self, index: usize) -> Option<&Command> {
        self.commands.get(index).and_then(Option::as_ref)
    }

    pub fn executable_count(&self) -> usize {
        self.commands.iter().filter(|command| command.is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_case_insensitive_and_strip_colon() {
        let mut labels = LabelTable::new();
        assert!(labels.insert("Start", 3));
        assert_eq!(labels.get("start"), Some(3));
        assert_eq!(labels.get("START:"), Some(3));
        assert!(!labels.insert("START", 9));
        assert_eq!(labels.get("start"), Some(3));
    }

    #[test]
    fn program_command_skips_holes() {
        let program = ScriptProgram {
            commands: vec![
                None,
                Some(Command {
                    line_number: 2,
                    text: "echo hi".to_string(),
                    keyword: "echo".to_string(),
                    instant: true,
                }),
            ],
            labels: LabelTable::new(),
            warnings: Vec::new(),
        };
        assert!(program.command(0).is_none());
        assert_eq!(program.command(1).map(|c| c.line_number), Some(2));
        assert!(program.command(7).is_none());
        assert_eq!(program.executable_count(), 1);
    }
}
