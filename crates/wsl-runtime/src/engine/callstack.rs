use wsl_core::ScriptError;

use super::scope::LocalScope;

#[derive(Debug, Clone, PartialEq)]
pub struct CallFrame {
    /// Line index to resume from; absent commands are skipped on return.
    pub resume_line: usize,
    pub locals: LocalScope,
}

#[derive(Debug, Default)]
pub struct CallStack {
    frames: Vec<CallFrame>,
}

impl CallStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: CallFrame) {
        self.frames.push(frame);
    }

    pub fn pop(&mut self) -> Result<CallFrame, ScriptError> {
        self.frames.pop().ok_or_else(|| {
            ScriptError::warning(
                "ENGINE_RETURN_OUTSIDE_SUBROUTINE",
                "Invalid use of return, not in a subroutine.",
            )
        })
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Splits a gosub argument string into the subroutine's local scope:
/// the caller's locals as a base, `"0"` = raw string, `"1".."n"` = words.
pub fn subroutine_locals(caller: &LocalScope, arguments: &str) -> LocalScope {
    let mut locals = caller.clone();
    locals.insert("0".to_string(), arguments.trim().into());
    for (index, word) in arguments.split_whitespace().enumerate() {
        locals.insert((index + 1).to_string(), word.into());
    }
    locals
}

#[cfg(test)]
mod tests {
    use wsl_core::Value;

    use super::*;

    #[test]
    fn pop_on_empty_stack_is_a_warning() {
        let mut stack = CallStack::new();
        let error = stack.pop().expect_err("empty stack should not pop");
        assert_eq!(error.code, "ENGINE_RETURN_OUTSIDE_SUBROUTINE");
        assert!(!error.is_fatal());
    }

    #[test]
    fn frames_pop_in_lifo_order() {
        let mut stack = CallStack::new();
        stack.push(CallFrame {
            resume_line: 2,
            locals: LocalScope::new(),
        });
        stack.push(CallFrame {
            resume_line: 9,
            locals: LocalScope::new(),
        });
        assert_eq!(stack.depth(), 2);
        assert_eq!(stack.pop().expect("frame").resume_line, 9);
        assert_eq!(stack.pop().expect("frame").resume_line, 2);
        assert!(stack.is_empty());
    }

    #[test]
    fn subroutine_locals_shadow_caller_without_destroying_it() {
        let mut caller = LocalScope::new();
        caller.insert("target".to_string(), Value::text("rat"));
        caller.insert("1".to_string(), Value::text("outer"));

        let locals = subroutine_locals(&caller, "  kobold  north ");
        assert_eq!(locals.get("0"), Some(&Value::text("kobold  north")));
        assert_eq!(locals.get("1"), Some(&Value::text("kobold")));
        assert_eq!(locals.get("2"), Some(&Value::text("north")));
        assert_eq!(locals.get("target"), Some(&Value::text("rat")));
        assert_eq!(caller.get("1"), Some(&Value::text("outer")));
    }
}
