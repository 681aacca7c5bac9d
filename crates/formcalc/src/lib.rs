//! `formcalc` evaluates the small calculation scripts attached to form templates.
//!
//! A script reads and writes cells of a form-data snapshot (`sheet -> cell -> value`)
//! through a handful of built-in functions:
//!
//! ```text
//! const total = parseFloat(getValue('Sheet1:B2')) * 1.07;
//! setValue('Sheet1:B3', total);
//! total > 1000 ? setBgColor('Sheet1:B3', '#ffcccc') : 0;
//! ```
//!
//! The crate exposes:
//! - A lexer that never fails (`tokenize`).
//! - A recursive-descent parser (`parse_script`).
//! - An interpreter (`Interpreter`) that parses and evaluates one statement at a time
//!   under a statement ceiling (`ExecutionLimits`).

mod ast;
mod builtins;
mod form_data;
mod lexer;
mod parser;
mod runtime;
mod value;

pub use crate::ast::{ArithOp, CmpOp, Expr, Stmt, UnOp};
pub use crate::form_data::{CellRef, CellStyle, FormData, SnapshotError, STYLES_KEY};
pub use crate::lexer::{tokenize, Lexer, Token, TokenKind};
pub use crate::runtime::{
    CalcError, Context, ExecutionLimits, Interpreter, RunSummary, MAX_STATEMENTS,
};
pub use crate::value::{parse_float_prefix, Value};

/// Run `script` against a copy of `form_data` and return the updated copy.
///
/// On failure the caller's snapshot is untouched; partial effects are discarded with the
/// copy. An empty or whitespace-only script returns the snapshot unchanged.
pub fn execute_calculations(form_data: &FormData, script: &str) -> Result<FormData, CalcError> {
    let mut out = form_data.clone();
    if script.trim().is_empty() {
        log::debug!("empty calculation script, form data unchanged");
        return Ok(out);
    }

    log::debug!("executing calculation script ({} bytes)", script.len());
    match Interpreter::new(script).run(&mut out) {
        Ok(summary) => {
            log::debug!(
                "calculation script completed: {} statements",
                summary.statements
            );
            Ok(out)
        }
        Err(err) => {
            log::warn!("calculation script failed: {err}");
            Err(err)
        }
    }
}

/// Parse `script` into statements without evaluating anything.
pub fn parse_script(script: &str) -> Result<Vec<Stmt>, CalcError> {
    runtime::parse_statements(script, ExecutionLimits::default())
}
