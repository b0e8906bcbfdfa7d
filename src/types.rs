use crate::ast::{FunctionDef, LambdaDef, Literal};
use crate::environment::Environment;
use std::cell::RefCell;
use std::fmt; // For custom display formatting
use std::rc::Rc;

/// A runtime value produced by evaluation.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Integer(i64),
    Boolean(bool),
    Procedure(Procedure),
    /// The "no result" marker of definitions, `print` and an `if` without `else`.
    Void,
}

impl Value {
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "integer",
            Value::Boolean(_) => "boolean",
            Value::Procedure(Procedure::Function { .. }) => "function",
            Value::Procedure(Procedure::Lambda { .. }) => "lambda",
            Value::Void => "void",
        }
    }

    /// `False`, `0` and `Void` are falsy; everything else is truthy.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Boolean(b) => *b,
            Value::Integer(n) => *n != 0,
            Value::Procedure(_) => true,
            Value::Void => false,
        }
    }

    pub fn is_void(&self) -> bool {
        matches!(self, Value::Void)
    }
}

impl From<Literal> for Value {
    fn from(literal: Literal) -> Self {
        match literal {
            Literal::Integer(n) => Value::Integer(n),
            Literal::Boolean(b) => Value::Boolean(b),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{}", n),
            Value::Boolean(b) => write!(f, "{}", if *b { "True" } else { "False" }),
            Value::Procedure(procedure) => write!(f, "{}", procedure),
            Value::Void => write!(f, "void"),
        }
    }
}

/// A callable value: a definition paired with the scope it was evaluated in.
#[derive(Clone)]
pub enum Procedure {
    Function {
        def: Rc<FunctionDef>,
        env: Rc<RefCell<Environment>>,
    },
    Lambda {
        def: Rc<LambdaDef>,
        env: Rc<RefCell<Environment>>,
    },
}

impl Procedure {
    pub fn params(&self) -> &[String] {
        match self {
            Procedure::Function { def, .. } => &def.params,
            Procedure::Lambda { def, .. } => &def.params,
        }
    }

    /// Name used in arity errors and debug logs.
    pub fn name(&self) -> &str {
        match self {
            Procedure::Function { def, .. } => &def.name,
            Procedure::Lambda { .. } => "lambda",
        }
    }

    pub fn env(&self) -> &Rc<RefCell<Environment>> {
        match self {
            Procedure::Function { env, .. } | Procedure::Lambda { env, .. } => env,
        }
    }
}

// Scopes can contain the procedure itself, so never descend into `env`.
impl fmt::Debug for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Procedure::Function { def, .. } => write!(f, "Function({})", def.name),
            Procedure::Lambda { def, .. } => write!(f, "Lambda({})", def.params.join(", ")),
        }
    }
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Procedure::Function { def, .. } => write!(f, "<function {}>", def.name),
            Procedure::Lambda { def, .. } => write!(f, "<lambda/{}>", def.params.len()),
        }
    }
}

// Procedures compare by identity: same definition captured in the same scope.
impl PartialEq for Procedure {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                Procedure::Function { def: d1, env: e1 },
                Procedure::Function { def: d2, env: e2 },
            ) => Rc::ptr_eq(d1, d2) && Rc::ptr_eq(e1, e2),
            (Procedure::Lambda { def: d1, env: e1 }, Procedure::Lambda { def: d2, env: e2 }) => {
                Rc::ptr_eq(d1, d2) && Rc::ptr_eq(e1, e2)
            }
            _ => false,
        }
    }
}
