use crate::environment::EnvError;
use crate::error::Error;
use crate::evaluator::EvalError;
use crate::lexer::LexerError;
use crate::parser::ParseError;
use ariadne::{Label, Report, ReportKind, Source};
use std::ops::Range;

type SourceReport<'a> = Report<'a, (&'a str, Range<usize>)>;

fn lexer_report<'a>(source_id: &'a str, err: &LexerError) -> SourceReport<'a> {
    let range = err.span.to_range();
    Report::build(ReportKind::Error, (source_id, range.clone()))
        .with_message(err.to_string())
        .with_label(Label::new((source_id, range)).with_message(err.error.to_string()))
        .finish()
}

fn parse_report<'a>(source_id: &'a str, err: &ParseError, input: &str) -> SourceReport<'a> {
    match err {
        ParseError::UnexpectedToken { found, expected } => {
            let range = found.span.to_range();
            Report::build(ReportKind::Error, (source_id, range.clone()))
                .with_message(err.to_string())
                .with_label(
                    Label::new((source_id, range)).with_message(format!("expected {expected}")),
                )
                .finish()
        }
        ParseError::UnexpectedEof { expected, .. } => {
            let idx = input.len();
            Report::build(ReportKind::Error, (source_id, idx..idx))
                .with_message(err.to_string())
                .with_label(Label::new((source_id, idx..idx)).with_message(expected))
                .finish()
        }
        ParseError::TooDeep { span, .. } => {
            let range = span.to_range();
            Report::build(ReportKind::Error, (source_id, range.clone()))
                .with_message(err.to_string())
                .with_label(
                    Label::new((source_id, range)).with_message("Nesting limit reached here"),
                )
                .finish()
        }
        ParseError::LexerError(lex_err) => lexer_report(source_id, lex_err),
    }
}

fn eval_report<'a>(source_id: &'a str, err: &EvalError) -> SourceReport<'a> {
    let range = err.span().map(|span| span.to_range()).unwrap_or(0..0);
    let note = match err {
        EvalError::EnvError(EnvError::UnboundVariable(..)) => {
            "This name is not defined in the current scope".to_string()
        }
        EvalError::DivisionByZero(_) | EvalError::ModuloByZero(_) => {
            "The right-hand side evaluated to 0".to_string()
        }
        EvalError::ArityMismatch {
            expected, found, ..
        } => format!("Called with {found} argument(s) instead of {expected}"),
        EvalError::NotAProcedure(..) => {
            "This expression cannot be called as a function".to_string()
        }
        EvalError::TypeMismatch {
            expected, found, ..
        } => format!("Expected {expected}, found {found}"),
        EvalError::IntegerOverflow(_) => "The result does not fit in 64 bits".to_string(),
        EvalError::RecursionLimit { .. } => "Evaluation nested too deeply here".to_string(),
        EvalError::Output(message) => message.clone(),
    };
    let mut report = Report::build(ReportKind::Error, (source_id, range.clone()))
        .with_message(err.to_string());
    if err.span().is_some() {
        report = report.with_label(Label::new((source_id, range)).with_message(note));
    }
    report.finish()
}

impl Error {
    /// Prints a source-annotated report of this error to stderr.
    /// `source_id` names the chunk (a file path, or `REPL`).
    pub fn pretty_print(&self, source_id: &str, input: &str) {
        let report = match self {
            Error::Lexer(err) => lexer_report(source_id, err),
            Error::Parse(err) => parse_report(source_id, err, input),
            Error::Eval(err) => eval_report(source_id, err),
        };
        // Reporting is best effort; the error itself has already been handled
        if report.eprint((source_id, Source::from(input))).is_err() {
            eprintln!("Error: {}", self);
        }
    }
}
