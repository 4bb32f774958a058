use nix::errno::Errno;
use thiserror::Error;

/// Conditions that abandon the whole line while it is being parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("bad syntax: missing closing {0}")]
    UnterminatedQuote(char),
    #[error("empty command")]
    EmptyCommand,
    #[error("bracket imbalance")]
    BracketImbalance,
    #[error("too many input files")]
    TooManyInputFiles,
    #[error("too many output files")]
    TooManyOutputFiles,
    #[error("no file after `{0}`")]
    MissingRedirectTarget(&'static str),
}

/// Conditions that abandon the rest of the line while it is being executed.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("pipe error: {0}")]
    Pipe(#[source] Errno),
    #[error("fork error: {0}")]
    Fork(#[source] Errno),
}

/// Report a recoverable condition and carry on.
pub fn report(message: impl std::fmt::Display) {
    log::warn!("{}", message);
    eprintln!("pipesh: {}", message);
}
