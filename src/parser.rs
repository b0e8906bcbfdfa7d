use crate::ast::{BinaryOp, Expr, FunctionDef, LambdaDef, Node, UnaryOp};
use crate::lexer::{Lexer, LexerError, Token, TokenKind};
use crate::source::{Position, Span};
use std::rc::Rc;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParseError {
    #[error("Syntax error at {}: expected {expected}, found '{}'", .found.position, .found.kind)]
    UnexpectedToken { found: Token, expected: String },
    #[error("Syntax error at {position}: unexpected end of input, expected {expected}")]
    UnexpectedEof {
        expected: String,
        span: Span,
        position: Position,
    },
    #[error("Syntax error at {position}: nesting deeper than {limit} levels")]
    TooDeep {
        limit: usize,
        span: Span,
        position: Position,
    },
    // Tokens are pulled lazily, so lexer errors surface while parsing
    #[error(transparent)]
    LexerError(#[from] LexerError),
}

// Result type alias for convenience
pub type ParseResult<T> = Result<T, ParseError>;

/// Default cap on syntactic nesting, matching the evaluator's depth limit.
pub const DEFAULT_MAX_NESTING: usize = 1000;

/// Recursive-descent parser pulling tokens from a [`Lexer`] on demand.
pub struct Parser<'src> {
    lexer: Lexer<'src>,
    current: Token,
    lookahead: Option<Token>,
    depth: usize,
    max_depth: usize,
}

impl<'src> Parser<'src> {
    pub fn new(input: &'src str) -> ParseResult<Self> {
        Parser::with_max_depth(input, DEFAULT_MAX_NESTING)
    }

    /// Parser that fails with [`ParseError::TooDeep`] once constructs nest
    /// more than `max_depth` levels.
    pub fn with_max_depth(input: &'src str, max_depth: usize) -> ParseResult<Self> {
        let mut lexer = Lexer::new(input);
        let current = lexer.next_token()?;
        Ok(Parser {
            lexer,
            current,
            lookahead: None,
            depth: 0,
            max_depth,
        })
    }

    // Claims one level of nesting. Every recursive path goes through
    // `parse_factor`; each operator or call suffix also deepens the tree.
    fn descend(&mut self) -> ParseResult<()> {
        if self.depth >= self.max_depth {
            return Err(ParseError::TooDeep {
                limit: self.max_depth,
                span: self.current.span,
                position: self.current.position,
            });
        }
        self.depth += 1;
        Ok(())
    }

    // Consumes the current token and returns it.
    fn advance(&mut self) -> ParseResult<Token> {
        let next = match self.lookahead.take() {
            Some(token) => token,
            None => self.lexer.next_token()?,
        };
        Ok(std::mem::replace(&mut self.current, next))
    }

    // Peeks at the token after the current one without consuming either.
    fn peek(&mut self) -> ParseResult<&TokenKind> {
        let token = match self.lookahead.take() {
            Some(token) => token,
            None => self.lexer.next_token()?,
        };
        Ok(&self.lookahead.insert(token).kind)
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.current.kind == *kind
    }

    fn unexpected(&self, expected: impl Into<String>) -> ParseError {
        match self.current.kind {
            TokenKind::Eof => ParseError::UnexpectedEof {
                expected: expected.into(),
                span: self.current.span,
                position: self.current.position,
            },
            _ => ParseError::UnexpectedToken {
                found: self.current.clone(),
                expected: expected.into(),
            },
        }
    }

    /// Consumes a token of exactly `kind` or fails naming it.
    fn expect(&mut self, kind: TokenKind) -> ParseResult<Token> {
        if self.check(&kind) {
            self.advance()
        } else {
            Err(self.unexpected(format!("'{}'", kind)))
        }
    }

    fn expect_identifier(&mut self, what: &str) -> ParseResult<(String, Span)> {
        match &self.current.kind {
            TokenKind::Identifier(name) => {
                let name = name.clone();
                let token = self.advance()?;
                Ok((name, token.span))
            }
            _ => Err(self.unexpected(what)),
        }
    }

    /// Parses every top-level construct up to the end of input.
    pub fn parse_program(&mut self) -> ParseResult<Vec<Node>> {
        let mut nodes = Vec::new();
        while !self.check(&TokenKind::Eof) {
            nodes.push(self.parse_expr()?);
        }
        Ok(nodes)
    }

    /// `expr := term (('+' | '-' | '&&' | '||' | '==' | '!=' | '>' | '<' | '>=' | '<=') term)*`
    pub fn parse_expr(&mut self) -> ParseResult<Node> {
        let saved = self.depth;
        let result = self.parse_expr_chain();
        self.depth = saved;
        result
    }

    fn parse_expr_chain(&mut self) -> ParseResult<Node> {
        let mut node = self.parse_term()?;
        while let Some(op) = low_precedence_op(&self.current.kind) {
            self.descend()?;
            self.advance()?;
            let right = self.parse_term()?;
            node = Node::new_binary(op, node, right);
        }
        Ok(node)
    }

    /// `term := factor (('*' | '/' | '%') factor)*`
    fn parse_term(&mut self) -> ParseResult<Node> {
        let saved = self.depth;
        let result = self.parse_term_chain();
        self.depth = saved;
        result
    }

    fn parse_term_chain(&mut self) -> ParseResult<Node> {
        let mut node = self.parse_factor()?;
        while let Some(op) = high_precedence_op(&self.current.kind) {
            self.descend()?;
            self.advance()?;
            let right = self.parse_factor()?;
            node = Node::new_binary(op, node, right);
        }
        Ok(node)
    }

    fn parse_factor(&mut self) -> ParseResult<Node> {
        self.descend()?;
        let saved = self.depth;
        let result = self.parse_factor_inner();
        self.depth = saved - 1;
        result
    }

    fn parse_factor_inner(&mut self) -> ParseResult<Node> {
        match self.current.kind {
            TokenKind::Integer(n) => {
                let token = self.advance()?;
                Ok(Node::new_integer(n, token.span))
            }
            TokenKind::Boolean(b) => {
                let token = self.advance()?;
                Ok(Node::new_bool(b, token.span))
            }
            TokenKind::LParen => {
                self.advance()?;
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                self.parse_applications(inner)
            }
            TokenKind::Bang => {
                let bang = self.advance()?;
                let operand = self.parse_factor()?;
                let span = bang.span.merge(operand.span);
                Ok(Node::new_unary(UnaryOp::Not, operand, span))
            }
            TokenKind::Identifier(_) => {
                if *self.peek()? == TokenKind::LParen {
                    let (name, span) = self.expect_identifier("a function name")?;
                    self.parse_applications(Node::new_variable(name, span))
                } else {
                    let (name, span) = self.expect_identifier("a variable")?;
                    Ok(Node::new_variable(name, span))
                }
            }
            TokenKind::Defun => self.parse_function_def(),
            TokenKind::Lambda => self.parse_lambda(),
            TokenKind::If => self.parse_if(),
            TokenKind::Print => self.parse_print(),
            _ => Err(self.unexpected("an expression")),
        }
    }

    // Wraps `callee` in one `Apply` per `(args)` suffix, so `f(a)(b)` curries.
    fn parse_applications(&mut self, mut callee: Node) -> ParseResult<Node> {
        while self.check(&TokenKind::LParen) {
            self.descend()?;
            let (args, close) = self.parse_arguments()?;
            callee = Node::new_apply(callee, args, close);
        }
        Ok(callee)
    }

    fn parse_arguments(&mut self) -> ParseResult<(Vec<Node>, Span)> {
        self.expect(TokenKind::LParen)?;
        let mut args = Vec::new();
        if !self.check(&TokenKind::RParen) {
            loop {
                args.push(self.parse_expr()?);
                if self.check(&TokenKind::Comma) {
                    self.advance()?;
                } else {
                    break;
                }
            }
        }
        let close = self.expect(TokenKind::RParen)?;
        Ok((args, close.span))
    }

    // Comma separated identifiers up to (and including) `terminator`.
    fn parse_params(&mut self, terminator: TokenKind) -> ParseResult<Vec<String>> {
        let mut params = Vec::new();
        if !self.check(&terminator) {
            loop {
                let (name, _) = self.expect_identifier("a parameter name")?;
                params.push(name);
                if self.check(&TokenKind::Comma) {
                    self.advance()?;
                } else {
                    break;
                }
            }
        }
        self.expect(terminator)?;
        Ok(params)
    }

    /// `{ stmt* }`
    fn parse_block(&mut self) -> ParseResult<(Vec<Node>, Span)> {
        self.expect(TokenKind::LBrace)?;
        let mut statements = Vec::new();
        while !self.check(&TokenKind::RBrace) && !self.check(&TokenKind::Eof) {
            statements.push(self.parse_expr()?);
        }
        let close = self.expect(TokenKind::RBrace)?;
        Ok((statements, close.span))
    }

    /// `defun NAME(params) { stmt* }`
    fn parse_function_def(&mut self) -> ParseResult<Node> {
        let keyword = self.expect(TokenKind::Defun)?;
        let (name, _) = self.expect_identifier("a function name")?;
        self.expect(TokenKind::LParen)?;
        let params = self.parse_params(TokenKind::RParen)?;
        let (body, close) = self.parse_block()?;
        Ok(Node::new(
            Expr::FunctionDef(Rc::new(FunctionDef { name, params, body })),
            keyword.span.merge(close),
        ))
    }

    /// `lambda params. expr`, optionally applied straight away.
    fn parse_lambda(&mut self) -> ParseResult<Node> {
        let keyword = self.expect(TokenKind::Lambda)?;
        let params = self.parse_params(TokenKind::Dot)?;
        let body = self.parse_expr()?;
        let span = keyword.span.merge(body.span);
        let lambda = Node::new(
            Expr::Lambda(Rc::new(LambdaDef {
                params,
                body: Box::new(body),
            })),
            span,
        );
        self.parse_applications(lambda)
    }

    /// `if (expr) { stmt* } [else { stmt* }]`
    fn parse_if(&mut self) -> ParseResult<Node> {
        let keyword = self.expect(TokenKind::If)?;
        self.expect(TokenKind::LParen)?;
        let condition = self.parse_expr()?;
        self.expect(TokenKind::RParen)?;
        let (then_block, mut end) = self.parse_block()?;
        let else_block = if self.check(&TokenKind::Else) {
            self.advance()?;
            let (block, close) = self.parse_block()?;
            end = close;
            Some(block)
        } else {
            None
        };
        Ok(Node::new(
            Expr::If {
                condition: Box::new(condition),
                then_block,
                else_block,
            },
            keyword.span.merge(end),
        ))
    }

    /// `print expr`
    fn parse_print(&mut self) -> ParseResult<Node> {
        let keyword = self.expect(TokenKind::Print)?;
        let expr = self.parse_expr()?;
        let span = keyword.span.merge(expr.span);
        Ok(Node::new(Expr::Print(Box::new(expr)), span))
    }
}

// Additive, logical and relational operators all share one level.
fn low_precedence_op(kind: &TokenKind) -> Option<BinaryOp> {
    match kind {
        TokenKind::Plus => Some(BinaryOp::Add),
        TokenKind::Minus => Some(BinaryOp::Sub),
        TokenKind::And => Some(BinaryOp::And),
        TokenKind::Or => Some(BinaryOp::Or),
        TokenKind::EqualEqual => Some(BinaryOp::Eq),
        TokenKind::BangEqual => Some(BinaryOp::NotEq),
        TokenKind::Greater => Some(BinaryOp::Greater),
        TokenKind::Less => Some(BinaryOp::Less),
        TokenKind::GreaterEqual => Some(BinaryOp::GreaterEq),
        TokenKind::LessEqual => Some(BinaryOp::LessEq),
        _ => None,
    }
}

fn high_precedence_op(kind: &TokenKind) -> Option<BinaryOp> {
    match kind {
        TokenKind::Star => Some(BinaryOp::Mul),
        TokenKind::Slash => Some(BinaryOp::Div),
        TokenKind::Percent => Some(BinaryOp::Mod),
        _ => None,
    }
}

// Helper function to lex and parse a whole chunk (useful for tests and the REPL)
pub fn parse_str(input: &str) -> ParseResult<Vec<Node>> {
    Parser::new(input)?.parse_program()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Literal;
    use crate::lexer::LexerErrorKind;
    use crate::source::Position;

    // Parses a chunk holding exactly one construct.
    fn parse_one(input: &str) -> Node {
        match parse_str(input) {
            Ok(mut nodes) if nodes.len() == 1 => nodes.remove(0),
            Ok(nodes) => panic!("Expected one node for '{}', got {:?}", input, nodes),
            Err(e) => panic!("Parsing failed for input '{}': {}", input, e),
        }
    }

    // Compares the fully parenthesized rendering, which ignores spans.
    fn assert_parsed(input: &str, expected_output: &str) {
        assert_eq!(parse_one(input).to_string(), expected_output, "Input: '{}'", input);
    }

    // Helper for asserting parse errors
    fn assert_parse_error(input: &str, expected_error_variant: ParseError) {
        match parse_str(input) {
            Ok(result) => panic!(
                "Expected parsing to fail for input '{}', but got: {:?}",
                input, result
            ),
            Err(e) => {
                // Compare enum variants, ignoring specific content for simplicity
                assert_eq!(
                    std::mem::discriminant(&e),
                    std::mem::discriminant(&expected_error_variant),
                    "Input: '{}', Expected error variant like {:?}, got: {:?}",
                    input,
                    expected_error_variant,
                    e
                );
            }
        }
    }

    fn unexpected_token() -> ParseError {
        ParseError::UnexpectedToken {
            found: Token {
                kind: TokenKind::Eof,
                span: Span::default(),
                position: Position::default(),
            },
            expected: String::new(),
        }
    }

    fn unexpected_eof() -> ParseError {
        ParseError::UnexpectedEof {
            expected: String::new(),
            span: Span::default(),
            position: Position::default(),
        }
    }

    fn too_deep() -> ParseError {
        ParseError::TooDeep {
            limit: 0,
            span: Span::default(),
            position: Position::default(),
        }
    }

    fn nested_parens(levels: usize) -> String {
        format!("{}1{}", "(".repeat(levels), ")".repeat(levels))
    }

    fn parse_with_limit(input: &str, max_depth: usize) -> ParseResult<Vec<Node>> {
        Parser::with_max_depth(input, max_depth)?.parse_program()
    }

    #[test]
    fn test_parse_literals() {
        assert_eq!(parse_one("42"), Node::new_integer(42, Span::new(0, 2)));
        assert_eq!(parse_one("True"), Node::new_bool(true, Span::new(0, 4)));
        assert_eq!(parse_one(" False"), Node::new_bool(false, Span::new(1, 6)));
        assert_eq!(parse_one("x"), Node::new_variable("x", Span::new(0, 1)));
    }

    #[test]
    fn test_parse_precedence() {
        assert_parsed("3 + 4 * 5", "(3 + (4 * 5))");
        assert_parsed("(3 + 4) * 5", "((3 + 4) * 5)");
        assert_parsed("10 - 4 - 3", "((10 - 4) - 3)");
        assert_parsed("8 / 2 % 3", "((8 / 2) % 3)");
    }

    #[test]
    fn test_parse_single_low_precedence_level() {
        // Relational and logical operators bind like '+', strictly left to right
        assert_parsed("1 + 2 == 3", "((1 + 2) == 3)");
        assert_parsed("1 == 1 && 2 < 3", "(((1 == 1) && 2) < 3)");
        assert_parsed("a || b && c", "((a || b) && c)");
        assert_parsed("x * 2 >= y", "((x * 2) >= y)");
    }

    #[test]
    fn test_parse_unary_not() {
        assert_parsed("!True", "(!True)");
        assert_parsed("!!x", "(!(!x))");
        assert_parsed("!a && b", "((!a) && b)");
        assert_parsed("!(a && b)", "(!(a && b))");
    }

    #[test]
    fn test_parse_application() {
        assert_parsed("f()", "f()");
        assert_parsed("add(1, 2)", "add(1, 2)");
        assert_parsed("add(1 + 2, g(3))", "add((1 + 2), g(3))");
    }

    #[test]
    fn test_parse_curried_application() {
        let node = parse_one("f(3)(4)");
        match node.kind {
            Expr::Apply { callee, args } => {
                assert_eq!(args, vec![Node::new_integer(4, Span::new(5, 6))]);
                match callee.kind {
                    Expr::Apply { callee, args } => {
                        assert_eq!(*callee, Node::new_variable("f", Span::new(0, 1)));
                        assert_eq!(args, vec![Node::new_integer(3, Span::new(2, 3))]);
                    }
                    other => panic!("Expected inner application, got {:?}", other),
                }
            }
            other => panic!("Expected application, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_parenthesized_callee() {
        assert_parsed(
            "(lambda x. (lambda y. (x + y)))(3)(4)",
            "(lambda x. (lambda y. (x + y)))(3)(4)",
        );
        assert_parsed("(f)(1)", "f(1)");
    }

    #[test]
    fn test_parse_lambda() {
        assert_parsed("lambda x, y. x + y", "(lambda x, y. (x + y))");
        assert_parsed("lambda . 1", "(lambda . 1)");
        let node = parse_one("lambda n. n * 2");
        match node.kind {
            Expr::Lambda(def) => {
                assert_eq!(def.params, vec!["n".to_string()]);
                assert_eq!(def.body.to_string(), "(n * 2)");
            }
            other => panic!("Expected lambda, got {:?}", other),
        }
        assert_eq!(node.span, Span::new(0, 15));
    }

    #[test]
    fn test_parse_function_def() {
        let node = parse_one("defun add(x, y) { print x x + y }");
        assert_eq!(node.span, Span::new(0, 33));
        match node.kind {
            Expr::FunctionDef(def) => {
                assert_eq!(def.name, "add");
                assert_eq!(def.params, vec!["x".to_string(), "y".to_string()]);
                assert_eq!(def.body.len(), 2);
                assert_eq!(def.body[0].to_string(), "print x");
                assert_eq!(def.body[1].to_string(), "(x + y)");
            }
            other => panic!("Expected function definition, got {:?}", other),
        }
        assert_parsed("defun nothing() { }", "defun nothing() {  }");
    }

    #[test]
    fn test_parse_if() {
        assert_parsed("if (True) { 1 } else { 2 }", "if (True) { 1 } else { 2 }");
        assert_parsed("if (x > 1) { x }", "if ((x > 1)) { x }");
        let node = parse_one("if (c) { 1 2 }");
        match node.kind {
            Expr::If {
                condition,
                then_block,
                else_block,
            } => {
                assert_eq!(*condition, Node::new_variable("c", Span::new(4, 5)));
                assert_eq!(then_block.len(), 2);
                assert_eq!(else_block, None);
            }
            other => panic!("Expected if, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_print() {
        assert_parsed("print 1 + 2", "print (1 + 2)");
        let node = parse_one("print x");
        assert!(matches!(node.kind, Expr::Print(ref inner) if inner.kind == Expr::Variable("x".into())));
    }

    #[test]
    fn test_parse_program_sequence() {
        let nodes = parse_str("defun sq(x) { x * x }\nsq(3)\nprint sq(4)").unwrap();
        let rendered: Vec<String> = nodes.iter().map(|n| n.to_string()).collect();
        assert_eq!(
            rendered,
            vec!["defun sq(x) { (x * x) }", "sq(3)", "print sq(4)"]
        );
        assert_eq!(parse_str("").unwrap(), vec![]);
        assert_eq!(parse_str("  # nothing here\n").unwrap(), vec![]);
    }

    #[test]
    fn test_parse_binary_spans() {
        let node = parse_one("1 + 22");
        assert_eq!(node.span, Span::new(0, 6));
        assert!(matches!(
            node.kind,
            Expr::Binary { op: BinaryOp::Add, ref left, .. } if left.kind == Expr::Literal(Literal::Integer(1))
        ));
    }

    #[test]
    fn test_parse_errors_unexpected_token() {
        assert_parse_error(")", unexpected_token());
        assert_parse_error("1 + )", unexpected_token());
        assert_parse_error("defun (x) { x }", unexpected_token());
        assert_parse_error("defun f(x y) { x }", unexpected_token());
        assert_parse_error("defun f(1) { 1 }", unexpected_token());
        assert_parse_error("f(1 2)", unexpected_token());
        assert_parse_error("lambda x y. x", unexpected_token());
        assert_parse_error("if True { 1 }", unexpected_token());
        assert_parse_error("if (True) 1", unexpected_token());
        assert_parse_error("else { 1 }", unexpected_token());
    }

    #[test]
    fn test_parse_errors_eof() {
        assert_parse_error("(1 + 2", unexpected_eof());
        assert_parse_error("1 +", unexpected_eof());
        assert_parse_error("defun f(x) { x", unexpected_eof());
        assert_parse_error("lambda x", unexpected_eof());
        assert_parse_error("print", unexpected_eof());
        assert_parse_error("f(1,", unexpected_eof());
    }

    #[test]
    fn test_parse_error_message() {
        let err = parse_str("if (True) {\n  1 ]").unwrap_err();
        // ']' is not even a token
        assert!(matches!(err, ParseError::LexerError(_)));

        let err = parse_str("f(1,\n  )").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Syntax error at line 2, column 3: expected an expression, found ')'"
        );

        let err = parse_str("defun f(x) { x").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Syntax error at line 1, column 15: unexpected end of input, expected '}'"
        );
    }

    #[test]
    fn test_parse_nesting_within_limit() {
        let nodes = parse_with_limit(&nested_parens(20), 50).unwrap();
        assert_eq!(nodes, vec![Node::new_integer(1, Span::new(20, 21))]);
        // The budget is per construct, not per program
        let program = format!("{} {}", nested_parens(30), nested_parens(30));
        assert_eq!(parse_with_limit(&program, 50).unwrap().len(), 2);
    }

    #[test]
    fn test_parse_nesting_over_limit() {
        let err = parse_with_limit(&nested_parens(10_000), 50).unwrap_err();
        assert!(matches!(err, ParseError::TooDeep { limit: 50, .. }));
        assert_eq!(
            err.to_string(),
            "Syntax error at line 1, column 51: nesting deeper than 50 levels"
        );

        for input in [
            format!("{}x", "!".repeat(100)),
            format!("{}1", "1 + ".repeat(100)),
            format!("{}1", "2 * ".repeat(100)),
            format!("f{}", "(1)".repeat(100)),
            format!("{}1", "lambda x. ".repeat(100)),
            format!("{}1{}", "if (True) { ".repeat(100), " }".repeat(100)),
        ] {
            match parse_with_limit(&input, 50) {
                Err(err) => assert_eq!(
                    std::mem::discriminant(&err),
                    std::mem::discriminant(&too_deep()),
                    "Input: '{}'",
                    input
                ),
                Ok(nodes) => panic!("Expected nesting error for '{}', got {:?}", input, nodes),
            }
        }
    }

    #[test]
    fn test_parse_default_nesting_limit() {
        // Deep enough to hit the default cap; runs with room to spare on the stack
        let handle = std::thread::Builder::new()
            .stack_size(64 * 1024 * 1024)
            .spawn(|| {
                let err = parse_str(&nested_parens(30_000)).unwrap_err();
                assert!(matches!(
                    err,
                    ParseError::TooDeep {
                        limit: DEFAULT_MAX_NESTING,
                        ..
                    }
                ));
                let nodes = parse_str(&nested_parens(DEFAULT_MAX_NESTING - 1)).unwrap();
                assert_eq!(nodes.len(), 1);
            })
            .unwrap();
        handle.join().unwrap();
    }

    #[test]
    fn test_parse_lexer_error_propagation() {
        let err = parse_str("1 & 2").unwrap_err();
        match err {
            ParseError::LexerError(lex_err) => {
                assert_eq!(lex_err.error, LexerErrorKind::IncompleteOperator('&'));
                assert_eq!(lex_err.span.start, 2);
            }
            other => panic!("Expected lexer error, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_deterministic() {
        let input = "defun f(a, b) { if (a >= b) { a } else { b } } f(1)(2) print !True";
        assert_eq!(parse_str(input), parse_str(input));
    }
}
