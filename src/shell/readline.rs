use crate::utils::config::Config;
use log::{debug, error, warn};
pub use rustyline::error::ReadlineError;
use rustyline::history::FileHistory;
use rustyline::Editor;
use rustyline::{CompletionType, Config as RLConfig};

/// Whether a physical line completes a logical one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    Complete,
    /// Ends with an unescaped `\` outside quotes: join with the next line.
    Backslash,
    /// A quote is still open: the newline belongs to the quoted text.
    OpenQuote,
}

/// Scan `text` with the lexer's quoting rules and decide whether more input
/// is needed.
pub fn continuation(text: &str) -> Continuation {
    let mut quote: Option<char> = None;
    let mut chars = text.chars().peekable();
    let mut trailing_backslash = false;

    while let Some(c) = chars.next() {
        trailing_backslash = false;
        match (quote, c) {
            (_, '\\') => match chars.next() {
                Some(_) => {}
                None => trailing_backslash = quote.is_none(),
            },
            (None, '"' | '\'') => quote = Some(c),
            (None, '#') => {
                // a comment runs to the end of the line
                for c in chars.by_ref() {
                    if c == '\n' {
                        break;
                    }
                }
            }
            (Some(open), c) if c == open => quote = None,
            _ => {}
        }
    }

    if quote.is_some() {
        Continuation::OpenQuote
    } else if trailing_backslash {
        Continuation::Backslash
    } else {
        Continuation::Complete
    }
}

pub struct ReadlineManager<'a> {
    config: &'a Config,
    editor: Editor<(), FileHistory>,
}

impl<'a> ReadlineManager<'a> {
    pub fn new(config: &'a Config) -> Result<Self, ReadlineError> {
        let rl_config = RLConfig::builder()
            .history_ignore_space(true)
            .completion_type(CompletionType::List)
            .edit_mode(config.get_edit_mode())
            .build();

        let editor = Editor::with_config(rl_config).inspect_err(|err| {
            error!("cannot initialise readline: {}", err);
        })?;
        Ok(Self { config, editor })
    }

    pub fn load_history(&mut self) -> Result<(), ReadlineError> {
        if let Err(err) = self.editor.load_history(&self.config.history_file) {
            warn!(
                "cannot load history: {} {}",
                self.config.history_file.display(),
                err
            );
        } else {
            debug!("history loaded");
        }
        Ok(())
    }

    pub fn readline(&mut self, prompt: &str) -> Result<String, ReadlineError> {
        self.editor.readline(prompt)
    }

    /// Read physical lines until they form one balanced logical line.
    /// Backslash-newline is removed; a newline inside quotes is kept.
    pub fn read_logical_line(
        &mut self,
        prompt: &str,
        continuation_prompt: &str,
    ) -> Result<String, ReadlineError> {
        let mut line = self.readline(prompt)?;

        loop {
            match continuation(&line) {
                Continuation::Complete => return Ok(line),
                Continuation::Backslash => {
                    line.pop();
                }
                Continuation::OpenQuote => line.push('\n'),
            }
            let next = self.readline(continuation_prompt)?;
            line.push_str(&next);
        }
    }

    pub fn add_history(&mut self, line: String) -> Result<bool, ReadlineError> {
        self.editor.add_history_entry(line)
    }

    pub fn save_history(&mut self) -> Result<(), ReadlineError> {
        if let Err(err) = self.editor.save_history(&self.config.history_file) {
            error!("cannot save history: {}", err);
        } else {
            debug!("history saved");
        }
        Ok(())
    }
}
