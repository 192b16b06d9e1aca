//! Interactive Read-Eval-Print Loop with rustyline

use std::env;
use std::io::{self, Write};
use std::path::PathBuf;
use std::rc::Rc;

use rustyline::completion::Completer;
use rustyline::error::ReadlineError;
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::history::DefaultHistory;
use rustyline::validate::Validator;
use rustyline::{Config, Context, Editor, Helper};
use tracing::{debug, warn};

use crate::env::Environment;
use crate::{completion, create_global_env, rep};

const HISTORY_FILE_VAR: &str = "MALRS_HISTORY_FILE";
const HISTORY_SIZE_VAR: &str = "MALRS_HISTORY_SIZE";

/// Settings for the interactive loop.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplConfig {
    pub prompt: String,
    pub history_file: PathBuf,
    pub history_size: usize,
}

impl Default for ReplConfig {
    fn default() -> Self {
        ReplConfig {
            prompt: "user> ".to_owned(),
            history_file: PathBuf::from(".mal-history"),
            history_size: 100,
        }
    }
}

impl ReplConfig {
    /// Defaults overridden by `MALRS_HISTORY_FILE` and `MALRS_HISTORY_SIZE`.
    pub fn from_env() -> Self {
        Self::from_vars(|key| env::var(key).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = ReplConfig::default();

        if let Some(path) = var(HISTORY_FILE_VAR).filter(|p| !p.is_empty()) {
            config.history_file = PathBuf::from(path);
        }
        if let Some(size) = var(HISTORY_SIZE_VAR) {
            match size.trim().parse::<usize>() {
                Ok(n) if n > 0 => config.history_size = n,
                _ => warn!(value = %size, "ignoring invalid {HISTORY_SIZE_VAR}"),
            }
        }

        config
    }
}

/// Line-editor hooks: completes symbol names against the live environment.
struct ReplHelper {
    env: Rc<Environment>,
}

impl Completer for ReplHelper {
    type Candidate = String;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<String>)> {
        Ok(completion::complete(&line[..pos], &self.env))
    }
}

impl Hinter for ReplHelper {
    type Hint = String;
}

impl Highlighter for ReplHelper {}

impl Validator for ReplHelper {}

impl Helper for ReplHelper {}

/// Run the loop until end of input or interrupt.
pub fn run(config: ReplConfig) -> rustyline::Result<()> {
    let editor_config = Config::builder()
        .max_history_size(config.history_size)?
        .auto_add_history(true)
        .build();
    let mut rl: Editor<ReplHelper, DefaultHistory> = Editor::with_config(editor_config)?;

    let env = create_global_env().extend();
    rl.set_helper(Some(ReplHelper {
        env: Rc::clone(&env),
    }));

    if let Err(e) = rl.load_history(&config.history_file) {
        debug!(path = %config.history_file.display(), error = %e, "no history loaded");
    }

    loop {
        match rl.readline(&config.prompt) {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }
                match rep(&line, &env) {
                    Ok(output) => {
                        debug!(input = %line, "evaluated");
                        if let Err(e) = writeln!(io::stdout().lock(), "{output}") {
                            warn!(error = %e, "stdout closed");
                            break;
                        }
                    }
                    Err(e) => {
                        debug!(input = %line, kind = e.kind_name(), "evaluation failed");
                        eprintln!("{} : {e}", e.kind_name());
                    }
                }
            }
            Err(ReadlineError::Interrupted | ReadlineError::Eof) => break,
            Err(err) => {
                eprintln!("Error: {err:?}");
                break;
            }
        }
    }

    if let Err(e) = rl.save_history(&config.history_file) {
        warn!(path = %config.history_file.display(), error = %e, "failed to save history");
    }

    Ok(())
}
