use crate::ast::{Expr, Node};
use crate::environment::{EnvError, Environment};
use crate::parser::Parser;
use crate::primitives;
use crate::source::Span;
use crate::types::{Procedure, Value};
use log::{debug, info};
use std::cell::RefCell;
use std::io::{self, Write};
use std::rc::Rc;
use thiserror::Error;

/// Default cap on nested evaluations before a runaway recursion is reported.
pub const DEFAULT_MAX_DEPTH: usize = 1000;

// --- Evaluation Error ---
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error(transparent)]
    EnvError(#[from] EnvError), // Errors from environment lookup
    #[error("Division by zero")]
    DivisionByZero(Span),
    #[error("Modulo by zero")]
    ModuloByZero(Span),
    #[error("'{callee}' expects {expected} argument(s), got {found}")]
    ArityMismatch {
        callee: String,
        expected: usize,
        found: usize,
        span: Span,
    },
    #[error("Not a function: {0}")]
    NotAProcedure(String, Span),
    #[error("Type mismatch: expected {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
        span: Span,
    },
    #[error("Integer overflow")]
    IntegerOverflow(Span),
    #[error("Maximum recursion depth of {limit} exceeded")]
    RecursionLimit { limit: usize, span: Span },
    #[error("Failed to write output: {0}")]
    Output(String),
}

impl EvalError {
    /// Source location the error points at, if it has one.
    pub fn span(&self) -> Option<Span> {
        match self {
            EvalError::EnvError(EnvError::UnboundVariable(_, span))
            | EvalError::DivisionByZero(span)
            | EvalError::ModuloByZero(span)
            | EvalError::ArityMismatch { span, .. }
            | EvalError::NotAProcedure(_, span)
            | EvalError::TypeMismatch { span, .. }
            | EvalError::IntegerOverflow(span)
            | EvalError::RecursionLimit { span, .. } => Some(*span),
            EvalError::Output(_) => None,
        }
    }
}

// Result type alias for convenience
pub type EvalResult<T = Value> = Result<T, EvalError>;

/// Tunables for an [`Interpreter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Nested evaluations allowed before `RecursionLimit` is raised.
    pub max_depth: usize,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Tree-walking evaluator. One instance keeps its global scope across
/// [`Interpreter::run`] calls, so definitions persist for a REPL session.
pub struct Interpreter {
    globals: Rc<RefCell<Environment>>,
    output: Box<dyn Write>,
    config: Config,
    depth: usize,
}

impl Default for Interpreter {
    fn default() -> Self {
        Interpreter::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Interpreter::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Interpreter {
            globals: Environment::new(),
            output: Box::new(io::stdout()),
            config,
            depth: 0,
        }
    }

    /// Redirects `print` output (stdout by default).
    pub fn with_output(mut self, output: impl Write + 'static) -> Self {
        self.output = Box::new(output);
        self
    }

    pub fn globals(&self) -> Rc<RefCell<Environment>> {
        self.globals.clone()
    }

    /// Tokenizes, parses and evaluates one chunk of source. The whole chunk
    /// is parsed before anything runs; the value of the last top-level
    /// construct is returned (`Void` for an empty chunk).
    pub fn run(&mut self, source: &str) -> Result<Value, crate::Error> {
        let program = Parser::with_max_depth(source, self.config.max_depth)?.parse_program()?;
        info!("evaluating {} top-level construct(s)", program.len());
        Ok(self.interpret(&program)?)
    }

    /// Evaluates parsed top-level nodes in order in the global scope.
    pub fn interpret(&mut self, program: &[Node]) -> EvalResult {
        let globals = self.globals.clone();
        self.evaluate_block(program, &globals)
    }

    /// Evaluates a single node within the given scope.
    pub fn evaluate(&mut self, node: &Node, env: &Rc<RefCell<Environment>>) -> EvalResult {
        if self.depth >= self.config.max_depth {
            return Err(EvalError::RecursionLimit {
                limit: self.config.max_depth,
                span: node.span,
            });
        }
        self.depth += 1;
        let result = self.evaluate_node(node, env);
        self.depth -= 1;
        result
    }

    fn evaluate_node(&mut self, node: &Node, env: &Rc<RefCell<Environment>>) -> EvalResult {
        match &node.kind {
            Expr::Literal(literal) => Ok(Value::from(*literal)),

            // Use the variable's span for error reporting if lookup fails
            Expr::Variable(name) => Ok(env.borrow().get(name, node.span)?),

            Expr::Unary { op, operand } => {
                let value = self.evaluate(operand, env)?;
                primitives::apply_unary(*op, &value, node.span)
            }

            // Both sides are always evaluated, `&&` and `||` included
            Expr::Binary { op, left, right } => {
                let left = self.evaluate(left, env)?;
                let right = self.evaluate(right, env)?;
                primitives::apply_binary(*op, &left, &right, node.span)
            }

            Expr::FunctionDef(def) => {
                debug!("defining function '{}'/{}", def.name, def.params.len());
                let procedure = Procedure::Function {
                    def: def.clone(),
                    env: env.clone(),
                };
                env.borrow_mut()
                    .define(def.name.clone(), Value::Procedure(procedure));
                Ok(Value::Void)
            }

            Expr::Lambda(def) => Ok(Value::Procedure(Procedure::Lambda {
                def: def.clone(),
                env: env.clone(),
            })),

            Expr::Apply { callee, args } => {
                let callee_value = self.evaluate(callee, env)?;
                let mut evaluated_args = Vec::with_capacity(args.len());
                for arg in args {
                    evaluated_args.push(self.evaluate(arg, env)?);
                }
                self.apply(callee_value, evaluated_args, node.span)
            }

            Expr::If {
                condition,
                then_block,
                else_block,
            } => {
                if self.evaluate(condition, env)?.is_truthy() {
                    self.evaluate_block(then_block, env)
                } else if let Some(else_block) = else_block {
                    self.evaluate_block(else_block, env)
                } else {
                    Ok(Value::Void)
                }
            }

            Expr::Print(expr) => {
                let value = self.evaluate(expr, env)?;
                writeln!(self.output, "{}", value)
                    .and_then(|_| self.output.flush())
                    .map_err(|err| EvalError::Output(err.to_string()))?;
                Ok(Value::Void)
            }
        }
    }

    // Evaluates statements in order; the last value wins.
    fn evaluate_block(&mut self, nodes: &[Node], env: &Rc<RefCell<Environment>>) -> EvalResult {
        let mut result = Value::Void;
        for node in nodes {
            result = self.evaluate(node, env)?;
        }
        Ok(result)
    }

    /// Calls `callee` with already evaluated arguments. The call gets a
    /// fresh frame whose parent is the scope the procedure captured.
    pub fn apply(&mut self, callee: Value, args: Vec<Value>, span: Span) -> EvalResult {
        let procedure = match callee {
            Value::Procedure(procedure) => procedure,
            other => return Err(EvalError::NotAProcedure(other.to_string(), span)),
        };

        let params = procedure.params();
        if params.len() != args.len() {
            return Err(EvalError::ArityMismatch {
                callee: procedure.name().to_string(),
                expected: params.len(),
                found: args.len(),
                span,
            });
        }

        debug!("calling {} with {} argument(s)", procedure, args.len());
        let frame = Environment::new_enclosed(procedure.env().clone());
        {
            let mut frame = frame.borrow_mut();
            for (param, arg) in params.iter().zip(args) {
                frame.define(param.clone(), arg);
            }
        }

        match &procedure {
            Procedure::Function { def, .. } => self.evaluate_block(&def.body, &frame),
            Procedure::Lambda { def, .. } => self.evaluate(&def.body, &frame),
        }
    }
}
