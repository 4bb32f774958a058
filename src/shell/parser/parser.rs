use log::debug;

use super::ast::{Command, CommandList, Link, ListEntry, Pipeline, SimpleCommand};
use super::lexer::{Lexer, RedirectOp, Token};
use crate::shell::error::ParseError;

/// Result of parsing one line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parsed {
    pub list: CommandList,
    /// First token left over after the list, e.g. a stray `)`.
    pub bad_tail: Option<Token>,
}

pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current_token: Token,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> Result<Self, ParseError> {
        let mut lexer = Lexer::new(input);
        let current_token = lexer.next_token()?;
        Ok(Parser {
            lexer,
            current_token,
        })
    }

    fn next_token(&mut self) -> Result<(), ParseError> {
        self.current_token = self.lexer.next_token()?;
        Ok(())
    }

    pub fn parse(mut self) -> Result<Parsed, ParseError> {
        if self.current_token == Token::EOF {
            return Ok(Parsed {
                list: CommandList::default(),
                bad_tail: None,
            });
        }

        let list = self.parse_list()?;
        let bad_tail = match self.current_token {
            Token::EOF => None,
            tail => Some(tail),
        };
        debug!("parsed: {}", list);
        Ok(Parsed { list, bad_tail })
    }

    // list := pipeline ( sep pipeline )*
    fn parse_list(&mut self) -> Result<CommandList, ParseError> {
        let mut entries = Vec::new();

        loop {
            let pipeline = self.parse_pipeline()?;
            let link = match self.current_token {
                Token::Semi => Link::Sequential,
                Token::Background => Link::Background,
                Token::And => Link::And,
                Token::Or => Link::Or,
                _ => {
                    entries.push(ListEntry {
                        pipeline,
                        link: Link::Sequential,
                    });
                    break;
                }
            };
            self.next_token()?;
            entries.push(ListEntry { pipeline, link });

            // a separator may close the list: `sleep 5 &`, `(a;)`
            if matches!(self.current_token, Token::RParen | Token::EOF) {
                break;
            }
        }

        Ok(CommandList { entries })
    }

    // pipeline := command ( '|' command )*
    fn parse_pipeline(&mut self) -> Result<Pipeline, ParseError> {
        let mut stages = vec![self.parse_command()?];

        while self.current_token == Token::Pipe {
            self.next_token()?;
            stages.push(self.parse_command()?);
        }

        Ok(Pipeline { stages })
    }

    // command := '(' list ')' | simple_command
    fn parse_command(&mut self) -> Result<Command, ParseError> {
        if self.current_token != Token::LParen {
            return self.parse_simple_command().map(Command::Simple);
        }

        self.next_token()?;
        let list = self.parse_list()?;
        if self.current_token != Token::RParen {
            return Err(ParseError::BracketImbalance);
        }
        self.next_token()?;
        Ok(Command::Group(list))
    }

    fn parse_simple_command(&mut self) -> Result<SimpleCommand, ParseError> {
        let mut command = SimpleCommand::default();

        match &mut self.current_token {
            Token::Word(word) if !word.is_empty() => {
                command.argv.push(std::mem::take(word));
                self.next_token()?;
            }
            _ => return Err(ParseError::EmptyCommand),
        }

        loop {
            match &mut self.current_token {
                Token::Word(word) => {
                    command.argv.push(std::mem::take(word));
                    self.next_token()?;
                }
                Token::Redirect(op) => {
                    let op = *op;
                    self.parse_redirection(op, &mut command)?;
                }
                _ => break,
            }
        }

        Ok(command)
    }

    fn parse_redirection(
        &mut self,
        operator: RedirectOp,
        command: &mut SimpleCommand,
    ) -> Result<(), ParseError> {
        self.next_token()?;

        let filename = match &mut self.current_token {
            Token::Word(filename) if !filename.is_empty() => std::mem::take(filename),
            _ => return Err(ParseError::MissingRedirectTarget(operator.as_str())),
        };
        self.next_token()?;

        match operator {
            RedirectOp::Input => {
                if command.input_file.is_some() {
                    return Err(ParseError::TooManyInputFiles);
                }
                command.input_file = Some(filename);
            }
            RedirectOp::Output | RedirectOp::Append => {
                if command.output_file.is_some() {
                    return Err(ParseError::TooManyOutputFiles);
                }
                command.output_file = Some(filename);
                command.append = operator == RedirectOp::Append;
            }
        }
        Ok(())
    }
}
