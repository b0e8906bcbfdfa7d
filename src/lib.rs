// Declare modules publicly so they are part of the library interface
pub mod ast;
pub mod environment;
pub mod error;
pub mod evaluator;
pub mod lexer;
pub mod parser;
pub mod pretty_print;
pub mod primitives;
pub mod repl;
pub mod source;
pub mod types;

pub use ast::{Expr, Node};
pub use environment::{EnvError, Environment};
pub use error::{Error, ErrorKind};
pub use evaluator::{Config, DEFAULT_MAX_DEPTH, EvalError, Interpreter};
pub use lexer::{Lexer, LexerError, Token, TokenKind, tokenize};
pub use parser::{ParseError, Parser, parse_str};
pub use source::{Position, Span};
pub use types::{Procedure, Value};
