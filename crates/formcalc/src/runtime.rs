use std::collections::BTreeMap;

use thiserror::Error;

use crate::ast::{ArithOp, CmpOp, Expr, Stmt, UnOp};
use crate::builtins;
use crate::form_data::FormData;
use crate::lexer::tokenize;
use crate::parser::Parser;
use crate::value::Value;

/// Hard ceiling on statements processed per run.
pub const MAX_STATEMENTS: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CalcError {
    #[error("Parse error: expected {expected}, found EOF")]
    UnexpectedEof { expected: &'static str },
    #[error("Parse error: expected {expected}, found {found} at {line}:{col}")]
    UnexpectedToken {
        expected: &'static str,
        found: String,
        line: usize,
        col: usize,
    },
    #[error("Parse error: unexpected {found} at {line}:{col}")]
    UnrecognizedToken {
        found: String,
        line: usize,
        col: usize,
    },
    #[error("Parse error: expression starting at {line}:{col} is too complex")]
    ExpressionTooComplex { line: usize, col: usize },
    #[error("Execution limit exceeded (possible infinite loop)")]
    ExecutionLimit { limit: usize },
}

impl CalcError {
    pub fn is_parse_error(&self) -> bool {
        !matches!(self, Self::ExecutionLimit { .. })
    }
}

/// Bounds applied to a single run.
///
/// `max_statements` may lower the ceiling; values above [`MAX_STATEMENTS`] are clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionLimits {
    pub max_statements: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self {
            max_statements: MAX_STATEMENTS,
        }
    }
}

impl ExecutionLimits {
    pub fn effective_max_statements(&self) -> usize {
        self.max_statements.min(MAX_STATEMENTS)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunSummary {
    /// Statements parsed and evaluated, empty statements included.
    pub statements: usize,
    /// Script-local variables as they stood when the run finished.
    pub variables: BTreeMap<String, Value>,
}

/// Mutable state threaded through every evaluation of one run.
pub struct Context<'a> {
    pub variables: BTreeMap<String, Value>,
    pub form_data: &'a mut FormData,
}

impl<'a> Context<'a> {
    pub fn new(form_data: &'a mut FormData) -> Self {
        Self {
            variables: BTreeMap::new(),
            form_data,
        }
    }

    pub fn exec_stmt(&mut self, stmt: &Stmt) -> Option<Value> {
        match stmt {
            Stmt::Expr(expr) => Some(self.eval_expr(expr)),
            Stmt::Empty => None,
        }
    }

    pub fn eval_expr(&mut self, expr: &Expr) -> Value {
        let mut expr = expr;
        loop {
            // The selected `?:` branch loops instead of recursing.
            match expr {
                Expr::Number(v) => return Value::Number(*v),
                Expr::String(s) => return Value::String(s.clone()),
                Expr::Var(name) => {
                    return self
                        .variables
                        .get(name)
                        .cloned()
                        .unwrap_or(Value::Number(0.0))
                }
                Expr::Assign { name, value } => {
                    let v = self.eval_expr(value);
                    self.variables.insert(name.clone(), v.clone());
                    return v;
                }
                Expr::Arith { .. } | Expr::Compare { .. } | Expr::Or { .. } => {
                    return self.eval_binary_chain(expr)
                }
                Expr::Unary { op, expr: operand } => {
                    let v = self.eval_expr(operand);
                    return match op {
                        UnOp::Plus => v,
                        UnOp::Neg => Value::Number(-v.to_number()),
                    };
                }
                Expr::Ternary {
                    condition,
                    then_branch,
                    else_branch,
                } => {
                    expr = if self.eval_expr(condition).is_truthy() {
                        &**then_branch
                    } else {
                        &**else_branch
                    };
                }
                Expr::Call { name, args } => {
                    let args: Vec<Value> = args.iter().map(|arg| self.eval_expr(arg)).collect();
                    return builtins::call(name, &args, self.form_data);
                }
            }
        }
    }

    /// Evaluate a left-deep run of binary operators (`a + b - c < d || e`) without
    /// recursing down its left spine.
    fn eval_binary_chain(&mut self, expr: &Expr) -> Value {
        let mut spine = Vec::new();
        let mut leftmost = expr;
        while let Expr::Arith { left, .. } | Expr::Compare { left, .. } | Expr::Or { left, .. } =
            leftmost
        {
            spine.push(leftmost);
            leftmost = &**left;
        }

        let mut acc = self.eval_expr(leftmost);
        while let Some(node) = spine.pop() {
            acc = match node {
                Expr::Arith { op, right, .. } => {
                    let r = self.eval_expr(right);
                    eval_arith(*op, &acc, &r)
                }
                Expr::Compare { op, right, .. } => {
                    let r = self.eval_expr(right);
                    Value::Boolean(eval_compare(*op, &acc, &r))
                }
                Expr::Or { right, .. } if !acc.is_truthy() => self.eval_expr(right),
                _ => acc,
            };
        }
        acc
    }
}

fn eval_arith(op: ArithOp, l: &Value, r: &Value) -> Value {
    let a = l.to_number();
    let b = r.to_number();
    let result = match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
        ArithOp::Div => {
            if b == 0.0 {
                0.0
            } else {
                a / b
            }
        }
        ArithOp::Pow => a.powf(b),
    };
    Value::Number(result)
}

fn eval_compare(op: CmpOp, l: &Value, r: &Value) -> bool {
    use std::cmp::Ordering;

    let ord = l.loose_cmp(r);
    match op {
        CmpOp::Eq => l.loose_eq(r),
        CmpOp::Ne => !l.loose_eq(r),
        CmpOp::Lt => ord == Some(Ordering::Less),
        CmpOp::Le => matches!(ord, Some(Ordering::Less | Ordering::Equal)),
        CmpOp::Gt => ord == Some(Ordering::Greater),
        CmpOp::Ge => matches!(ord, Some(Ordering::Greater | Ordering::Equal)),
    }
}

/// Runs one calculation script against a form-data snapshot.
///
/// Statements are parsed and evaluated one at a time. Effects of statements that ran
/// before a failure stay in the snapshot; use [`crate::execute_calculations`] to leave the
/// caller's snapshot untouched on failure.
pub struct Interpreter<'s> {
    source: &'s str,
    limits: ExecutionLimits,
}

impl<'s> Interpreter<'s> {
    pub fn new(source: &'s str) -> Self {
        Self {
            source,
            limits: ExecutionLimits::default(),
        }
    }

    pub fn with_limits(mut self, limits: ExecutionLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn run(&self, form_data: &mut FormData) -> Result<RunSummary, CalcError> {
        let tokens = tokenize(self.source);
        let max_statements = self.limits.effective_max_statements();
        log::debug!(
            "running calculation script: {} tokens, {} sheets",
            tokens.len(),
            form_data.sheet_count()
        );

        let mut parser = Parser::new(&tokens);
        let mut ctx = Context::new(form_data);
        let mut statements = 0usize;

        while !parser.is_at_end() {
            statements += 1;
            if statements > max_statements {
                log::warn!("calculation script exceeded {max_statements} statements");
                return Err(CalcError::ExecutionLimit {
                    limit: max_statements,
                });
            }

            let stmt = parser.parse_statement()?;
            let value = ctx.exec_stmt(&stmt);
            log::trace!("statement {statements} evaluated to {value:?}");
        }

        log::debug!("calculation script finished after {statements} statements");
        Ok(RunSummary {
            statements,
            variables: ctx.variables,
        })
    }
}

/// Parse a whole script without evaluating it.
pub fn parse_statements(source: &str, limits: ExecutionLimits) -> Result<Vec<Stmt>, CalcError> {
    let tokens = tokenize(source);
    let max_statements = limits.effective_max_statements();
    let mut parser = Parser::new(&tokens);
    let mut out = Vec::new();
    while !parser.is_at_end() {
        if out.len() >= max_statements {
            return Err(CalcError::ExecutionLimit {
                limit: max_statements,
            });
        }
        out.push(parser.parse_statement()?);
    }
    Ok(out)
}
