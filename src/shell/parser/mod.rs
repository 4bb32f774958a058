pub mod ast;
pub mod lexer;
#[allow(clippy::module_inception)]
pub mod parser;

pub use ast::{Command, CommandList, Link, ListEntry, Pipeline, SimpleCommand};
pub use parser::{Parsed, Parser};

use crate::shell::error::ParseError;

/// Parse one logical line into a command tree.
pub fn parse(line: &str) -> Result<Parsed, ParseError> {
    Parser::new(line)?.parse()
}
