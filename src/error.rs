use crate::evaluator::EvalError;
use crate::lexer::LexerError;
use crate::parser::ParseError;
use crate::source::Span;
use thiserror::Error;

/// Coarse category of an [`Error`], for callers that branch on it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    Lexical,
    Syntax,
    Runtime,
}

/// Any failure while running a chunk of source.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error(transparent)]
    Lexer(LexerError),
    #[error(transparent)]
    Parse(ParseError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Lexer(_) => ErrorKind::Lexical,
            Error::Parse(_) => ErrorKind::Syntax,
            Error::Eval(_) => ErrorKind::Runtime,
        }
    }

    /// Source location the error points at, if it has one.
    pub fn span(&self) -> Option<Span> {
        match self {
            Error::Lexer(err) => Some(err.span),
            Error::Parse(ParseError::UnexpectedToken { found, .. }) => Some(found.span),
            Error::Parse(ParseError::UnexpectedEof { span, .. })
            | Error::Parse(ParseError::TooDeep { span, .. }) => Some(*span),
            Error::Parse(ParseError::LexerError(err)) => Some(err.span),
            Error::Eval(err) => err.span(),
        }
    }
}

impl From<LexerError> for Error {
    fn from(err: LexerError) -> Self {
        Error::Lexer(err)
    }
}

// Lexer errors raised while parsing keep their own category.
impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::LexerError(lex_err) => Error::Lexer(lex_err),
            other => Error::Parse(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Interpreter;

    fn run(input: &str) -> Error {
        Interpreter::new()
            .run(input)
            .expect_err("input should fail")
    }

    #[test]
    fn test_error_kinds() {
        assert_eq!(run("1 @ 2").kind(), ErrorKind::Lexical);
        assert_eq!(run("1 & 2").kind(), ErrorKind::Lexical);
        assert_eq!(run("(1 + 2").kind(), ErrorKind::Syntax);
        assert_eq!(run("defun (x) { x }").kind(), ErrorKind::Syntax);
        assert_eq!(run("x").kind(), ErrorKind::Runtime);
        assert_eq!(run("1 / 0").kind(), ErrorKind::Runtime);
    }

    #[test]
    fn test_error_spans() {
        assert_eq!(run("1 @ 2").span(), Some(Span::new(2, 3)));
        assert_eq!(run("1 +").span(), Some(Span::new(3, 3)));
        assert_eq!(run("2 + nope").span(), Some(Span::new(4, 8)));
        assert_eq!(run("4 / 0").span(), Some(Span::new(0, 5)));
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            run("1 @ 2").to_string(),
            "Lexer error at line 1, column 3: Invalid character '@'"
        );
        assert_eq!(run("nope").to_string(), "Unbound variable: 'nope'");
        assert_eq!(run("1 / 0").to_string(), "Division by zero");
        assert_eq!(run("1 % 0").to_string(), "Modulo by zero");
        assert_eq!(run("(3)(1)").to_string(), "Not a function: 3");
    }
}
