use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use wsl_core::{ScriptError, Value};

use super::host::{LiveValue, ScriptHost, VariableStore};
use super::timer::{Clock, ScriptTimer};

#[derive(Debug, Clone, PartialEq)]
pub enum SpecialVariable {
    Value(Value),
    Timer(ScriptTimer),
    Live(LiveValue),
}

pub type LocalScope = BTreeMap<String, Value>;

/// Special, global and local variables of one script.
///
/// Unqualified reads go special -> global. Locals are only reachable
/// through the `*_local` accessors.
pub struct VariableEnvironment {
    specials: BTreeMap<String, SpecialVariable>,
    locals: LocalScope,
    globals: Arc<dyn VariableStore>,
    host: Arc<dyn ScriptHost>,
    clock: Arc<dyn Clock>,
}

impl VariableEnvironment {
    pub fn new(
        host: Arc<dyn ScriptHost>,
        globals: Arc<dyn VariableStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let specials = LiveValue::ALL
            .iter()
            .map(|key| (key.variable_name().to_string(), SpecialVariable::Live(*key)))
            .collect();
        Self {
            specials,
            locals: LocalScope::new(),
            globals,
            host,
            clock,
        }
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(special) = self.specials.get(name) {
            return Some(self.resolve_special(special));
        }
        self.globals.get(name).map(Value::Text)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.specials.contains_key(name) || self.globals.contains(name)
    }

    pub fn special(&self, name: &str) -> Option<&SpecialVariable> {
        self.specials.get(name)
    }

    pub fn is_special(&self, name: &str) -> bool {
        self.specials.contains_key(name)
    }

    fn resolve_special(&self, special: &SpecialVariable) -> Value {
        match special {
            SpecialVariable::Value(value) => value.clone(),
            SpecialVariable::Timer(timer) => Value::Number(timer.seconds(self.clock.now())),
            SpecialVariable::Live(key) => match self.host.live_value(*key) {
                Some(value) => value,
                None if key.is_numeric() => Value::Number(0.0),
                None => Value::text(""),
            },
        }
    }

    pub fn set_global(&mut self, name: &str, value: &Value) -> Result<(), ScriptError> {
        if self.specials.contains_key(name) {
            return Err(ScriptError::new(
                "VAR_NAME_CONFLICT",
                format!("Cannot overwrite special variable \"{}\".", name),
            ));
        }
        self.globals.set(name, &value.to_string());
        Ok(())
    }

    /// A name lives in exactly one scope, so any global of the same name
    /// is dropped first.
    pub fn set_special(&mut self, name: &str, special: SpecialVariable) {
        self.globals.remove(name);
        self.specials.insert(name.to_string(), special);
    }

    pub fn set_special_value(&mut self, name: &str, value: impl Into<Value>) {
        self.set_special(name, SpecialVariable::Value(value.into()));
    }

    pub fn delete_global(&mut self, name: &str) -> bool {
        self.globals.remove(name).is_some()
    }

    /// Removes the global and any script-owned special of that name.
    /// Client-maintained live values cannot be deleted.
    pub fn delete_variable(&mut self, name: &str) -> bool {
        let removed_special = match self.specials.get(name) {
            Some(SpecialVariable::Live(_)) | None => false,
            Some(_) => self.specials.remove(name).is_some(),
        };
        let removed_global = self.delete_global(name);
        removed_special || removed_global
    }

    pub fn timer_mut(&mut self, name: &str) -> Option<&mut ScriptTimer> {
        match self.specials.get_mut(name) {
            Some(SpecialVariable::Timer(timer)) => Some(timer),
            _ => None,
        }
    }

    pub fn get_local(&self, name: &str) -> Option<&Value> {
        self.locals.get(name)
    }

    pub fn local_exists(&self, name: &str) -> bool {
        self.locals.contains_key(name)
    }

    pub fn set_local(&mut self, name: &str, value: impl Into<Value>) {
        self.locals.insert(name.to_string(), value.into());
    }

    pub fn delete_local(&mut self, name: &str) -> bool {
        self.locals.remove(name).is_some()
    }

    pub fn locals(&self) -> &LocalScope {
        &self.locals
    }

    /// Swaps in a new local scope and hands back the previous one.
    pub fn replace_locals(&mut self, locals: LocalScope) -> LocalScope {
        std::mem::replace(&mut self.locals, locals)
    }

    /// Local first, then special -> global.
    pub fn lookup_any(&self, name: &str) -> Option<Value> {
        self.locals.get(name).cloned().or_else(|| self.get(name))
    }
}
