use std::fmt;
use std::iter::Peekable;
use std::str::Chars;

use crate::shell::error::ParseError;

#[derive(Debug, PartialEq, Eq, Clone)]
pub enum Token {
    Word(String),
    Pipe,
    Or,
    Background,
    And,
    Semi,
    LParen,
    RParen,
    Redirect(RedirectOp),
    /// End of line. Also produced for an unquoted newline, which is never consumed.
    EOF,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum RedirectOp {
    Input,  // <
    Output, // >
    Append, // >>
}

impl RedirectOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            RedirectOp::Input => "<",
            RedirectOp::Output => ">",
            RedirectOp::Append => ">>",
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Word(word) => write!(f, "{word}"),
            Token::Pipe => f.write_str("|"),
            Token::Or => f.write_str("||"),
            Token::Background => f.write_str("&"),
            Token::And => f.write_str("&&"),
            Token::Semi => f.write_str(";"),
            Token::LParen => f.write_str("("),
            Token::RParen => f.write_str(")"),
            Token::Redirect(op) => f.write_str(op.as_str()),
            Token::EOF => f.write_str("end of line"),
        }
    }
}

/// Characters that end an unquoted word.
fn is_separator(c: char) -> bool {
    c.is_whitespace() || ";&|()<>#".contains(c)
}

pub struct Lexer<'a> {
    input: Peekable<Chars<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Self {
            input: input.chars().peekable(),
        }
    }

    pub fn next_token(&mut self) -> Result<Token, ParseError> {
        self.skip_whitespace();

        let token = match self.peek_char() {
            None | Some('\n') => Token::EOF,
            Some(c) => match c {
                '#' => {
                    self.skip_comment();
                    Token::EOF
                }
                '|' => {
                    self.read_char();
                    if self.peek_char() == Some('|') {
                        self.read_char();
                        Token::Or
                    } else {
                        Token::Pipe
                    }
                }
                '&' => {
                    self.read_char();
                    if self.peek_char() == Some('&') {
                        self.read_char();
                        Token::And
                    } else {
                        Token::Background
                    }
                }
                ';' => {
                    self.read_char();
                    Token::Semi
                }
                '(' => {
                    self.read_char();
                    Token::LParen
                }
                ')' => {
                    self.read_char();
                    Token::RParen
                }
                '<' => {
                    self.read_char();
                    Token::Redirect(RedirectOp::Input)
                }
                '>' => {
                    self.read_char();
                    if self.peek_char() == Some('>') {
                        self.read_char();
                        Token::Redirect(RedirectOp::Append)
                    } else {
                        Token::Redirect(RedirectOp::Output)
                    }
                }
                _ => self.read_word()?,
            },
        };

        Ok(token)
    }

    fn read_char(&mut self) -> Option<char> {
        self.input.next()
    }

    fn peek_char(&mut self) -> Option<char> {
        self.input.peek().copied()
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek_char() {
            if c == '\n' || !c.is_whitespace() {
                break;
            }
            self.read_char();
        }
    }

    fn skip_comment(&mut self) {
        while let Some(c) = self.peek_char() {
            if c == '\n' {
                break;
            }
            self.read_char();
        }
    }

    fn read_word(&mut self) -> Result<Token, ParseError> {
        let mut word = String::new();

        while let Some(c) = self.peek_char() {
            match c {
                c if is_separator(c) => break,
                '\\' => {
                    self.read_char();
                    match self.peek_char() {
                        // `\ `, `\|`, `\"` and friends stand for the character itself
                        Some(next) if next != '\n' && (is_separator(next) || "\"'\\".contains(next)) => {
                            self.read_char();
                            word.push(next);
                        }
                        _ => word.push('\\'),
                    }
                }
                '"' | '\'' => self.read_quoted(&mut word)?,
                _ => {
                    self.read_char();
                    word.push(c);
                }
            }
        }

        Ok(Token::Word(word))
    }

    /// Append a quoted span to `word`, without its quotes. Everything up to the
    /// matching unescaped quote is taken verbatim, newlines included.
    fn read_quoted(&mut self, word: &mut String) -> Result<(), ParseError> {
        let quote = self.read_char().unwrap_or('"');

        loop {
            match self.read_char() {
                None => return Err(ParseError::UnterminatedQuote(quote)),
                Some('\\') => match self.peek_char() {
                    Some(next) if next == quote || next == '\\' => {
                        self.read_char();
                        word.push(next);
                    }
                    _ => word.push('\\'),
                },
                Some(c) if c == quote => return Ok(()),
                Some(c) => word.push(c),
            }
        }
    }
}
