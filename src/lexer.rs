use log::trace;
use logos::{Logos, Skip};
use std::fmt;
use thiserror::Error;

use crate::source::{Position, Span};

/// Line bookkeeping carried by the logos state machine.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LineTracker {
    pub newlines: usize,
    pub line_start: usize, // Byte offset of the first character of the current line
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(extras = LineTracker)]
#[logos(skip r"[ \t\r\f]+")] // Skip whitespace other than newlines
#[logos(error = LexerErrorKind)]
pub enum TokenKind {
    #[regex(r"[0-9]+", parse_integer)]
    Integer(i64),
    #[token("True", |_| true)]
    #[token("False", |_| false)]
    Boolean(bool),
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*", |lex| lex.slice().to_string())]
    Identifier(String),

    #[token("defun")]
    Defun,
    #[token("lambda")]
    Lambda,
    #[token("if")]
    If,
    #[token("else")]
    Else,
    #[token("print")]
    Print,

    #[token("+")]
    Plus,
    #[token("-")]
    Minus,
    #[token("*")]
    Star,
    #[token("/")]
    Slash,
    #[token("%")]
    Percent,
    #[token("&&")]
    And,
    #[token("||")]
    Or,
    #[token("!")]
    Bang,
    #[token("==")]
    EqualEqual,
    #[token("!=")]
    BangEqual,
    #[token(">")]
    Greater,
    #[token("<")]
    Less,
    #[token(">=")]
    GreaterEqual,
    #[token("<=")]
    LessEqual,

    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token(",")]
    Comma,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token(".")]
    Dot,

    /// Never emitted; advances the line counter.
    #[token("\n", newline)]
    Newline,
    /// Never emitted; `#` runs to the end of the line.
    #[token("#", comment)]
    Comment,

    /// Produced by [`Lexer::next_token`] once the input is exhausted.
    Eof,
}

fn newline(lex: &mut logos::Lexer<TokenKind>) -> Skip {
    lex.extras.newlines += 1;
    lex.extras.line_start = lex.span().end;
    Skip
}

fn comment(lex: &mut logos::Lexer<TokenKind>) -> Skip {
    let rest = lex.remainder();
    lex.bump(rest.find('\n').unwrap_or(rest.len()));
    Skip
}

fn parse_integer(lex: &mut logos::Lexer<TokenKind>) -> LexerResult<i64> {
    let slice = lex.slice();
    slice
        .parse::<i64>()
        .map_err(|_| LexerErrorKind::IntegerOutOfRange(slice.to_string()))
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
    pub position: Position,
}

// Implement Display for easy printing
impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::Integer(n) => return write!(f, "{}", n),
            TokenKind::Boolean(b) => return write!(f, "{}", if *b { "True" } else { "False" }),
            TokenKind::Identifier(name) => return write!(f, "{}", name),
            TokenKind::Defun => "defun",
            TokenKind::Lambda => "lambda",
            TokenKind::If => "if",
            TokenKind::Else => "else",
            TokenKind::Print => "print",
            TokenKind::Plus => "+",
            TokenKind::Minus => "-",
            TokenKind::Star => "*",
            TokenKind::Slash => "/",
            TokenKind::Percent => "%",
            TokenKind::And => "&&",
            TokenKind::Or => "||",
            TokenKind::Bang => "!",
            TokenKind::EqualEqual => "==",
            TokenKind::BangEqual => "!=",
            TokenKind::Greater => ">",
            TokenKind::Less => "<",
            TokenKind::GreaterEqual => ">=",
            TokenKind::LessEqual => "<=",
            TokenKind::LParen => "(",
            TokenKind::RParen => ")",
            TokenKind::Comma => ",",
            TokenKind::LBrace => "{",
            TokenKind::RBrace => "}",
            TokenKind::Dot => ".",
            TokenKind::Newline => "newline",
            TokenKind::Comment => "comment",
            TokenKind::Eof => "end of input",
        };
        f.write_str(text)
    }
}

#[derive(Default, Debug, Clone, PartialEq, Error)]
pub enum LexerErrorKind {
    #[error("Invalid character '{0}'")]
    InvalidCharacter(char),
    #[error("Incomplete operator '{0}', expected '{0}{0}'")]
    IncompleteOperator(char),
    #[error("Integer literal out of range: '{0}'")]
    IntegerOutOfRange(String),
    #[default]
    #[error("Invalid token")]
    InvalidToken,
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("Lexer error at {position}: {error}")]
pub struct LexerError {
    pub error: LexerErrorKind,
    pub span: Span,
    pub position: Position,
}

// Result type alias for convenience
type LexerResult<T> = Result<T, LexerErrorKind>;

// Result type alias for convenience
pub type LexerRangedResult<T> = Result<T, LexerError>;

/// Lazy tokenizer: each call to [`Lexer::next_token`] scans one token.
pub struct Lexer<'src> {
    inner: logos::Lexer<'src, TokenKind>,
    exhausted: bool,
}

impl<'src> Lexer<'src> {
    pub fn new(input: &'src str) -> Self {
        Lexer {
            inner: TokenKind::lexer(input),
            exhausted: false,
        }
    }

    /// Returns the next token, or an `Eof` token on every call once the
    /// input is used up.
    pub fn next_token(&mut self) -> LexerRangedResult<Token> {
        let next = if self.exhausted {
            None
        } else {
            self.inner.next()
        };
        match next {
            Some(Ok(kind)) => {
                let span = self.current_span();
                let position = self.position_of(span.start);
                trace!("token {:?} at {}", kind, position);
                Ok(Token {
                    kind,
                    span,
                    position,
                })
            }
            Some(Err(error)) => {
                let span = self.current_span();
                Err(LexerError {
                    error: self.refine(error),
                    span,
                    position: self.position_of(span.start),
                })
            }
            None => {
                self.exhausted = true;
                let end = self.inner.source().len();
                Ok(Token {
                    kind: TokenKind::Eof,
                    span: Span::new(end, end),
                    position: self.position_of(end),
                })
            }
        }
    }

    fn current_span(&self) -> Span {
        let range = self.inner.span();
        Span::new(range.start, range.end)
    }

    fn position_of(&self, offset: usize) -> Position {
        let extras = &self.inner.extras;
        let line_prefix = &self.inner.source()[extras.line_start..offset];
        Position::new(extras.newlines + 1, line_prefix.chars().count() + 1)
    }

    // logos reports unmatched input as the default error; name the culprit.
    fn refine(&self, error: LexerErrorKind) -> LexerErrorKind {
        match error {
            LexerErrorKind::InvalidToken => match self.inner.slice().chars().next() {
                Some(c @ ('&' | '|' | '=')) => LexerErrorKind::IncompleteOperator(c),
                Some(c) => LexerErrorKind::InvalidCharacter(c),
                None => LexerErrorKind::InvalidToken,
            },
            other => other,
        }
    }
}

impl Iterator for Lexer<'_> {
    type Item = LexerRangedResult<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.next_token() {
            Ok(Token {
                kind: TokenKind::Eof,
                ..
            }) => None,
            result => Some(result),
        }
    }
}

// Helper function to tokenize a string directly (useful for tests, benches and the REPL)
pub fn tokenize(input: &str) -> LexerRangedResult<Vec<Token>> {
    Lexer::new(input).collect()
}
