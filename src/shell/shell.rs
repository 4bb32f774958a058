use log::{debug, error, info, warn};
use std::error::Error;
use std::fmt;
use std::io::Write;

use crate::shell::error::report;
use crate::shell::executor::{Executor, Outcome};
use crate::shell::job_manager::JobManager;
use crate::shell::parser;
use crate::shell::readline::{ReadlineError, ReadlineManager};
use crate::shell::signals;
use crate::utils::config::Config;
use crate::utils::theme::Theme;

pub struct Shell<'a> {
    theme: Theme,
    readline: ReadlineManager<'a>,
    executor: Executor,
}

impl<'a> Shell<'a> {
    pub fn new(config: &'a Config, theme: Theme) -> Result<Self, ReadlineError> {
        Ok(Self {
            theme,
            readline: ReadlineManager::new(config)?,
            executor: Executor::new(JobManager::new()),
        })
    }

    pub fn run(&mut self) -> Result<(), Box<dyn Error>> {
        debug!("starting pipesh");

        signals::ignore_interrupt();
        self.readline.load_history()?;

        if !self.theme.welcome_message.is_empty() {
            println!("{}", self.theme.welcome_message);
        }
        self.run_loop();
        self.readline.save_history()?;
        if !self.theme.exit_message.is_empty() {
            println!("{}", self.theme.exit_message);
        }

        debug!("leaving pipesh");
        Ok(())
    }

    fn run_loop(&mut self) {
        loop {
            for job in self.executor.jobs_mut().reap() {
                info!("job finished: {}", job);
            }

            keep_going("cannot flush stdout", std::io::stdout().flush());
            let line = match self
                .readline
                .read_logical_line(&self.theme.prompt, &self.theme.continuation_prompt)
            {
                Ok(line) => line,
                Err(ReadlineError::Eof) => {
                    debug!("EOF on input");
                    break;
                }
                Err(ReadlineError::Interrupted) => {
                    debug!("line discarded by interrupt");
                    continue;
                }
                Err(err) => {
                    error!("readline failed: {}", err);
                    self.print_error(&err.to_string());
                    break;
                }
            };

            if self.handle_input(&line) == Some(Outcome::Exit) {
                debug!("exit requested");
                break;
            }
        }
    }

    /// Parse and run one logical line. Fatal errors abandon the line only.
    fn handle_input(&mut self, line: &str) -> Option<Outcome> {
        if line.trim().is_empty() {
            return None;
        }
        keep_going(
            "cannot record history",
            self.readline.add_history(line.to_string()),
        );

        let parsed = match parser::parse(line) {
            Ok(parsed) => parsed,
            Err(e) => {
                error!("parse error in {:?}: {}", line, e);
                self.print_error(&e.to_string());
                return None;
            }
        };
        if let Some(tail) = &parsed.bad_tail {
            warn!("bad tail in {:?}: {}", line, tail);
            self.print_error(&format!("bad tail: unexpected {}", tail));
        }

        match self.executor.execute(&parsed.list) {
            Ok(outcome) => Some(outcome),
            Err(e) => {
                error!("execution of {:?} abandoned: {}", line, e);
                self.print_error(&e.to_string());
                None
            }
        }
    }

    fn print_error(&self, message: &str) {
        eprintln!(
            "{} {}",
            self.theme.error_symbol,
            (self.theme.error_style)(message.to_string())
        );
    }
}

/// Side chores of the session. A failure is reported and the session goes on.
fn keep_going<T, E: fmt::Display>(chore: &str, result: Result<T, E>) -> Option<T> {
    result.map_err(|e| report(format!("{}: {}", chore, e))).ok()
}
