use crate::ast::{ArithOp, CmpOp, Expr, Stmt, UnOp};
use crate::lexer::{Token, TokenKind};
use crate::runtime::CalcError;

/// Deepest parenthesis/unary/exponent/call nesting the parser will recurse into.
///
/// Left-associative operator chains and `?:` chains are parsed with loops and do not
/// count against this.
pub(crate) const MAX_NESTING_DEPTH: usize = 256;
/// Largest number of expression nodes a single statement may build.
pub(crate) const MAX_STATEMENT_NODES: usize = 4096;

/// Recursive-descent parser producing one statement at a time.
///
/// Precedence, lowest first: ternary, `||`, comparison, `+ -`, `* /`, `**` (right
/// associative), unary `+ -`, primary.
pub(crate) struct Parser<'t> {
    tokens: &'t [Token],
    pos: usize,
    depth: usize,
    nodes: usize,
    stmt_start: (usize, usize),
}

impl<'t> Parser<'t> {
    pub fn new(tokens: &'t [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
            nodes: 0,
            stmt_start: (1, 1),
        }
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn current(&self) -> Option<&'t Token> {
        self.tokens.get(self.pos)
    }

    fn peek_kind(&self) -> Option<&'t TokenKind> {
        self.current().map(|t| &t.kind)
    }

    fn advance(&mut self) -> Option<&'t Token> {
        let tok = self.current();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.peek_kind() == Some(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind, expected: &'static str) -> Result<&'t Token, CalcError> {
        match self.current() {
            Some(tok) if tok.kind == kind => {
                self.pos += 1;
                Ok(tok)
            }
            Some(tok) => Err(CalcError::UnexpectedToken {
                expected,
                found: tok.kind.to_string(),
                line: tok.line,
                col: tok.col,
            }),
            None => Err(CalcError::UnexpectedEof { expected }),
        }
    }

    fn expect_identifier(&mut self) -> Result<String, CalcError> {
        match self.current() {
            Some(Token {
                kind: TokenKind::Identifier(name),
                ..
            }) => {
                self.pos += 1;
                Ok(name.clone())
            }
            Some(tok) => Err(CalcError::UnexpectedToken {
                expected: "identifier",
                found: tok.kind.to_string(),
                line: tok.line,
                col: tok.col,
            }),
            None => Err(CalcError::UnexpectedEof {
                expected: "identifier",
            }),
        }
    }

    fn too_complex(&self) -> CalcError {
        let (line, col) = self.stmt_start;
        CalcError::ExpressionTooComplex { line, col }
    }

    fn node(&mut self, expr: Expr) -> Result<Expr, CalcError> {
        self.nodes += 1;
        if self.nodes > MAX_STATEMENT_NODES {
            return Err(self.too_complex());
        }
        Ok(expr)
    }

    fn nested<T>(
        &mut self,
        f: impl FnOnce(&mut Self) -> Result<T, CalcError>,
    ) -> Result<T, CalcError> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(self.too_complex());
        }
        let result = f(self);
        self.depth -= 1;
        result
    }

    /// Parse the statement starting at the current token.
    ///
    /// Always consumes at least one token or fails, so a driver loop over `is_at_end`
    /// terminates.
    pub fn parse_statement(&mut self) -> Result<Stmt, CalcError> {
        self.depth = 0;
        self.nodes = 0;
        self.stmt_start = self.current().map_or((1, 1), |t| (t.line, t.col));

        if self.eat(&TokenKind::Semicolon) {
            return Ok(Stmt::Empty);
        }

        let expr = if let Some(TokenKind::Keyword(_)) = self.peek_kind() {
            self.advance();
            let name = self.expect_identifier()?;
            self.expect(TokenKind::Assign, "`=`")?;
            let value = self.parse_expression()?;
            self.node(Expr::Assign {
                name,
                value: Box::new(value),
            })?
        } else {
            self.parse_expression()?
        };
        self.eat(&TokenKind::Semicolon);
        Ok(Stmt::Expr(expr))
    }

    fn parse_expression(&mut self) -> Result<Expr, CalcError> {
        self.nested(Self::parse_ternary)
    }

    fn parse_ternary(&mut self) -> Result<Expr, CalcError> {
        let mut arms = Vec::new();
        let mut tail = self.parse_logical_or()?;
        while self.eat(&TokenKind::Question) {
            let then_branch = self.parse_logical_or()?;
            self.expect(TokenKind::Colon, "`:`")?;
            arms.push((tail, then_branch));
            tail = self.parse_logical_or()?;
        }

        // `a ? b : c ? d : e` groups as `a ? b : (c ? d : e)`.
        while let Some((condition, then_branch)) = arms.pop() {
            tail = self.node(Expr::Ternary {
                condition: Box::new(condition),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(tail),
            })?;
        }
        Ok(tail)
    }

    fn parse_logical_or(&mut self) -> Result<Expr, CalcError> {
        let mut left = self.parse_comparison()?;
        while self.eat(&TokenKind::OrOr) {
            let right = self.parse_comparison()?;
            left = self.node(Expr::Or {
                left: Box::new(left),
                right: Box::new(right),
            })?;
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, CalcError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Gt) => CmpOp::Gt,
                Some(TokenKind::Lt) => CmpOp::Lt,
                Some(TokenKind::Ge) => CmpOp::Ge,
                Some(TokenKind::Le) => CmpOp::Le,
                Some(TokenKind::EqEq) => CmpOp::Eq,
                Some(TokenKind::Ne) => CmpOp::Ne,
                _ => break,
            };
            self.advance();
            let right = self.parse_additive()?;
            left = self.node(Expr::Compare {
                op,
                left: Box::new(left),
                right: Box::new(right),
            })?;
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, CalcError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Plus) => ArithOp::Add,
                Some(TokenKind::Minus) => ArithOp::Sub,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplicative()?;
            left = self.node(Expr::Arith {
                op,
                left: Box::new(left),
                right: Box::new(right),
            })?;
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, CalcError> {
        let mut left = self.parse_exponent()?;
        loop {
            let op = match self.peek_kind() {
                Some(TokenKind::Star) => ArithOp::Mul,
                Some(TokenKind::Slash) => ArithOp::Div,
                _ => break,
            };
            self.advance();
            let right = self.parse_exponent()?;
            left = self.node(Expr::Arith {
                op,
                left: Box::new(left),
                right: Box::new(right),
            })?;
        }
        Ok(left)
    }

    fn parse_exponent(&mut self) -> Result<Expr, CalcError> {
        let base = self.parse_unary()?;
        if !self.eat(&TokenKind::StarStar) {
            return Ok(base);
        }
        // Right associative: `2 ** 3 ** 2` is `2 ** (3 ** 2)`.
        let exponent = self.nested(Self::parse_exponent)?;
        self.node(Expr::Arith {
            op: ArithOp::Pow,
            left: Box::new(base),
            right: Box::new(exponent),
        })
    }

    fn parse_unary(&mut self) -> Result<Expr, CalcError> {
        let op = match self.peek_kind() {
            Some(TokenKind::Plus) => UnOp::Plus,
            Some(TokenKind::Minus) => UnOp::Neg,
            _ => return self.parse_primary(),
        };
        self.advance();
        let operand = self.nested(Self::parse_unary)?;
        self.node(Expr::Unary {
            op,
            expr: Box::new(operand),
        })
    }

    fn parse_primary(&mut self) -> Result<Expr, CalcError> {
        let Some(tok) = self.advance() else {
            return Err(CalcError::UnexpectedEof {
                expected: "expression",
            });
        };

        let expr = match &tok.kind {
            TokenKind::Number(v) => Expr::Number(*v),
            TokenKind::String(s) => Expr::String(s.clone()),
            TokenKind::Identifier(name) => {
                if self.eat(&TokenKind::LParen) {
                    let args = self.parse_call_args()?;
                    Expr::Call {
                        name: name.clone(),
                        args,
                    }
                } else {
                    Expr::Var(name.clone())
                }
            }
            TokenKind::LParen => {
                let inner = self.parse_expression()?;
                self.expect(TokenKind::RParen, "`)`")?;
                return Ok(inner);
            }
            other => {
                return Err(CalcError::UnrecognizedToken {
                    found: other.to_string(),
                    line: tok.line,
                    col: tok.col,
                })
            }
        };
        self.node(expr)
    }

    fn parse_call_args(&mut self) -> Result<Vec<Expr>, CalcError> {
        let mut args = Vec::new();
        if self.eat(&TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_expression()?);
            if self.eat(&TokenKind::Comma) {
                continue;
            }
            self.expect(TokenKind::RParen, "`,` or `)`")?;
            return Ok(args);
        }
    }
}
