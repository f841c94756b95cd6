use std::path::PathBuf;

use rustyline::{error::ReadlineError, DefaultEditor};

use crate::{
    diagnostics::{NumFuError, Result},
    runtime::Interpreter,
};

pub struct Repl {
    interpreter: Interpreter,
    cwd: PathBuf,
}

impl Repl {
    pub fn new(interpreter: Interpreter) -> Self {
        let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
        Self { interpreter, cwd }
    }

    /// Each input line is a new top-level statement in a persistent top
    /// frame, so `let` bindings carry over between lines.
    pub fn run(&mut self) -> Result<()> {
        let mut editor = DefaultEditor::new()
            .map_err(|err| NumFuError::from(std::io::Error::other(err)))?;
        loop {
            match editor.readline("numfu> ") {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed == ":quit" || trimmed == ":exit" || trimmed == "exit" {
                        break;
                    }
                    if trimmed.is_empty() {
                        continue;
                    }
                    editor.add_history_entry(trimmed).ok();
                    match self.interpreter.run_source(trimmed, &self.cwd) {
                        Ok(_) => {}
                        Err(NumFuError::Exit(_)) => break,
                        Err(NumFuError::Diagnostic(diag)) => {
                            eprintln!("{}", diag.render(Some(trimmed)));
                        }
                        Err(other) => eprintln!("error: {other}"),
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(err) => {
                    return Err(NumFuError::from(std::io::Error::other(err)));
                }
            }
        }
        Ok(())
    }
}
