use wsl_core::{ScriptError, ScriptProgram, LABEL_ERROR};

use super::callstack::{subroutine_locals, CallFrame};
use super::lifecycle::ScriptRunner;

/// First line index `>= index` that holds a command.
pub fn first_executable_at(program: &ScriptProgram, index: usize) -> Option<usize> {
    (index..program.len()).find(|candidate| program.command(*candidate).is_some())
}

/// First line index after `index` that holds a command.
pub fn next_executable_line(program: &ScriptProgram, index: usize) -> Option<usize> {
    first_executable_at(program, index + 1)
}

/// Resolves a jump target, falling back to `labelerror` when the label is
/// unknown. `Ok(None)` means the label sits at the end of the script.
pub fn resolve_jump(program: &ScriptProgram, label: &str) -> Result<JumpTarget, ScriptError> {
    if let Some(index) = program.labels.get(label) {
        return Ok(JumpTarget {
            line: first_executable_at(program, index),
            fallback: false,
        });
    }
    if let Some(index) = program.labels.get(LABEL_ERROR) {
        return Ok(JumpTarget {
            line: first_executable_at(program, index),
            fallback: true,
        });
    }
    Err(ScriptError::new(
        "ENGINE_LABEL_UNDEFINED",
        format!("Label \"{}\" does not exist.", label),
    ))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JumpTarget {
    pub line: Option<usize>,
    pub fallback: bool,
}

impl ScriptRunner {
    /// Moves the program counter to `label` once the current command ends.
    pub fn goto_label(&mut self, label: &str) -> Result<(), ScriptError> {
        let target = resolve_jump(&self.program, label)?;
        if target.fallback {
            self.script_debug(
                1,
                &format!("Label \"{}\" not found, jumping to {}.", label, LABEL_ERROR),
            );
        }
        self.script_debug(1, &format!("goto {}", label));
        self.next_line = target.line;
        Ok(())
    }

    pub(super) fn gosub(&mut self, label: &str, arguments: &str) -> Result<(), ScriptError> {
        let target = resolve_jump(&self.program, label)?;
        let resume_line = self.current_line.map_or(0, |line| line + 1);
        let locals = subroutine_locals(self.env.locals(), arguments);
        let caller_locals = self.env.replace_locals(locals);
        self.call_stack.push(CallFrame {
            resume_line,
            locals: caller_locals,
        });
        self.script_debug(1, &format!("gosub {} {}", label, arguments.trim()));
        self.next_line = target.line;
        Ok(())
    }

    pub(super) fn return_from_subroutine(&mut self) -> Result<(), ScriptError> {
        let frame = self.call_stack.pop()?;
        self.env.replace_locals(frame.locals);
        self.next_line = first_executable_at(&self.program, frame.resume_line);
        self.script_debug(1, "return");
        Ok(())
    }
}
