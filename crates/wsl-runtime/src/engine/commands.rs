use std::collections::BTreeMap;
use std::sync::Arc;

use super::builtins;
use super::lifecycle::ScriptRunner;
use super::signals::CommandResult;

/// A script command. `arguments` is everything after the keyword, with
/// variables already expanded.
pub trait CommandHandler: Send + Sync {
    fn execute(&self, script: &mut ScriptRunner, arguments: &str) -> CommandResult;
}

impl<F> CommandHandler for F
where
    F: Fn(&mut ScriptRunner, &str) -> CommandResult + Send + Sync,
{
    fn execute(&self, script: &mut ScriptRunner, arguments: &str) -> CommandResult {
        self(script, arguments)
    }
}

/// Lower-case keyword -> handler.
#[derive(Clone, Default)]
pub struct CommandTable {
    handlers: BTreeMap<String, Arc<dyn CommandHandler>>,
}

impl CommandTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        let mut table = Self::new();
        table.register("counter", builtins::counter);
        table.register("debug", builtins::debug_command);
        table.register("debuglevel", builtins::debug_level);
        table.register("delay", builtins::delay);
        table.register("deletelocalvariable", builtins::delete_local_variable);
        table.register("deletevariable", builtins::delete_variable);
        table.register("echo", builtins::echo);
        table.register("else", builtins::else_command);
        table.register("exit", builtins::exit);
        table.register("gosub", builtins::gosub);
        table.register("goto", builtins::goto);
        for digit in 0..=9 {
            let name = digit.to_string();
            table.register(&format!("if_{}", digit), move |script: &mut ScriptRunner, arguments: &str| {
                builtins::if_variable(script, &name, arguments)
            });
        }
        table.register("match", builtins::match_text);
        table.register("matchre", builtins::match_regex);
        table.register("matchwait", builtins::matchwait);
        table.register("math", builtins::math);
        table.register("move", builtins::move_command);
        table.register("nextroom", builtins::nextroom);
        table.register("pause", builtins::pause);
        table.register("playsound", builtins::playsound);
        table.register("put", builtins::put);
        table.register("random", builtins::random);
        table.register("return", builtins::return_command);
        table.register("run", builtins::run);
        table.register("save", builtins::save);
        table.register("setlocalvariable", builtins::set_local_variable);
        table.register("setvariable", builtins::set_variable);
        table.register("shift", builtins::shift);
        table.register("timer", builtins::timer);
        table.register("wait", builtins::wait);
        table.register("waitfor", builtins::waitfor);
        table.register("waitforre", builtins::waitforre);
        table
    }

    pub fn register<H>(&mut self, name: &str, handler: H)
    where
        H: CommandHandler + 'static,
    {
        self.register_arc(name, Arc::new(handler));
    }

    pub fn register_arc(&mut self, name: &str, handler: Arc<dyn CommandHandler>) {
        self.handlers.insert(name.to_lowercase(), handler);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn CommandHandler>> {
        self.handlers.get(&name.to_lowercase()).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(&name.to_lowercase())
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_covers_the_command_set() {
        let table = CommandTable::builtin();
        for name in [
            "counter", "deletevariable", "deletelocalvariable", "debug", "debuglevel", "delay",
            "echo", "else", "exit", "gosub", "goto", "if_0", "if_9", "match", "matchre",
            "matchwait", "math", "move", "nextroom", "pause", "put", "playsound", "random",
            "return", "run", "save", "setlocalvariable", "setvariable", "shift", "timer", "wait",
            "waitfor", "waitforre",
        ] {
            assert!(table.contains(name), "missing builtin {}", name);
        }
        assert!(table.contains("GOTO"));
        assert!(!table.contains("if_10"));
    }
}
