use crate::source::Span;
use std::fmt;
use std::rc::Rc;

/// A parsed syntax node together with the source span it covers.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: Expr,
    pub span: Span,
}

impl Node {
    pub fn new(kind: Expr, span: Span) -> Self {
        Node { kind, span }
    }

    pub fn new_integer(n: i64, span: Span) -> Self {
        Node::new(Expr::Literal(Literal::Integer(n)), span)
    }

    pub fn new_bool(b: bool, span: Span) -> Self {
        Node::new(Expr::Literal(Literal::Boolean(b)), span)
    }

    pub fn new_variable(name: impl Into<String>, span: Span) -> Self {
        Node::new(Expr::Variable(name.into()), span)
    }

    pub fn new_unary(op: UnaryOp, operand: Node, span: Span) -> Self {
        Node::new(
            Expr::Unary {
                op,
                operand: Box::new(operand),
            },
            span,
        )
    }

    // The span of a binary node covers both operands.
    pub fn new_binary(op: BinaryOp, left: Node, right: Node) -> Self {
        let span = left.span.merge(right.span);
        Node::new(
            Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            span,
        )
    }

    pub fn new_apply(callee: Node, args: Vec<Node>, end: Span) -> Self {
        let span = callee.span.merge(end);
        Node::new(
            Expr::Apply {
                callee: Box::new(callee),
                args,
            },
            span,
        )
    }
}

/// The closed set of constructs the evaluator knows how to run.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Literal),
    Variable(String),
    Unary {
        op: UnaryOp,
        operand: Box<Node>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Node>,
        right: Box<Node>,
    },
    // Definitions are reference counted so procedures can outlive the parsed chunk.
    FunctionDef(Rc<FunctionDef>),
    Lambda(Rc<LambdaDef>),
    /// One application; `f(1)(2)` nests two of these.
    Apply {
        callee: Box<Node>,
        args: Vec<Node>,
    },
    If {
        condition: Box<Node>,
        then_block: Vec<Node>,
        else_block: Option<Vec<Node>>,
    },
    Print(Box<Node>),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Literal {
    Integer(i64),
    Boolean(bool),
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    And,
    Or,
    Eq,
    NotEq,
    Greater,
    Less,
    GreaterEq,
    LessEq,
}

/// `defun name(params) { body }`
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<String>,
    pub body: Vec<Node>,
}

/// `lambda params. body`
#[derive(Debug, Clone, PartialEq)]
pub struct LambdaDef {
    pub params: Vec<String>,
    pub body: Box<Node>,
}

impl fmt::Display for UnaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnaryOp::Not => write!(f, "!"),
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let symbol = match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
            BinaryOp::Eq => "==",
            BinaryOp::NotEq => "!=",
            BinaryOp::Greater => ">",
            BinaryOp::Less => "<",
            BinaryOp::GreaterEq => ">=",
            BinaryOp::LessEq => "<=",
        };
        f.write_str(symbol)
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, nodes: &[Node], separator: &str) -> fmt::Result {
    let mut first = true;
    for node in nodes {
        if !first {
            write!(f, "{}", separator)?;
        }
        write!(f, "{}", node)?;
        first = false;
    }
    Ok(())
}

// Fully parenthesized rendering, handy for checking the shape of a parse.
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            Expr::Literal(Literal::Integer(n)) => write!(f, "{}", n),
            Expr::Literal(Literal::Boolean(b)) => {
                write!(f, "{}", if *b { "True" } else { "False" })
            }
            Expr::Variable(name) => write!(f, "{}", name),
            Expr::Unary { op, operand } => write!(f, "({}{})", op, operand),
            Expr::Binary { op, left, right } => write!(f, "({} {} {})", left, op, right),
            Expr::FunctionDef(def) => {
                write!(f, "defun {}({}) {{ ", def.name, def.params.join(", "))?;
                write_joined(f, &def.body, " ")?;
                write!(f, " }}")
            }
            Expr::Lambda(def) => write!(f, "(lambda {}. {})", def.params.join(", "), def.body),
            Expr::Apply { callee, args } => {
                write!(f, "{}(", callee)?;
                write_joined(f, args, ", ")?;
                write!(f, ")")
            }
            Expr::If {
                condition,
                then_block,
                else_block,
            } => {
                write!(f, "if ({}) {{ ", condition)?;
                write_joined(f, then_block, " ")?;
                write!(f, " }}")?;
                if let Some(else_block) = else_block {
                    write!(f, " else {{ ")?;
                    write_joined(f, else_block, " ")?;
                    write!(f, " }}")?;
                }
                Ok(())
            }
            Expr::Print(expr) => write!(f, "print {}", expr),
        }
    }
}
