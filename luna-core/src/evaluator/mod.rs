//! Expression evaluator facade: tokenizer -> shunting-yard -> RPN executor,
//! wired to a [`symbol_table::SymbolTable`] bound to a local instance and an
//! optional global accumulator. Multi-statement scripts (`;`-separated)
//! evaluate left to right; once a statement fails, later statements are
//! skipped and the evaluator is marked invalid, per section 4.4's error
//! semantics.

pub mod functions;
pub mod lexer;
pub mod ops;
pub mod rpn;
pub mod shunting_yard;
pub mod symbol_table;

use std::collections::HashSet;

use crate::annotation::Instance;
use crate::error::{LunaError, Result};
use crate::token::Token;

/// Evaluates `;`-separated statement scripts against a local instance and an
/// optional global accumulator instance. `is_valid` latches `false` on the
/// first parse or evaluation failure and is never reset; a script that goes
/// invalid mid-way still returns the last value it computed successfully.
pub struct Evaluator {
    is_valid: bool,
    global_names: HashSet<String>,
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator {
    #[must_use]
    pub fn new() -> Self {
        Self { is_valid: true, global_names: HashSet::new() }
    }

    /// Declare `name` (expected to start with `_`) as resolving against the
    /// global accumulator rather than the local instance.
    pub fn declare_global(&mut self, name: impl Into<String>) {
        self.global_names.insert(name.into());
    }

    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    /// Evaluate one `;`-separated script. Returns the value of the last
    /// statement executed. Statements after the first failure are skipped
    /// (not executed), matching "later statements execute only while
    /// valid". A parse failure on the very first statement returns `Err`;
    /// a failure on a later statement stops evaluation there and returns the
    /// prior statement's value.
    pub fn eval_script(&mut self, script: &str, local: &mut Instance, global: Option<&mut Instance>) -> Result<Token> {
        let statements = split_statements(script);
        if statements.is_empty() {
            return Err(LunaError::Parse("empty script".into()));
        }

        let mut global = global;
        let mut last = None;
        for (i, stmt) in statements.iter().enumerate() {
            match self.eval_one(stmt, local, global.as_deref_mut()) {
                Ok(value) => last = Some(value),
                Err(e) => {
                    self.is_valid = false;
                    if i == 0 {
                        return Err(e);
                    }
                    break;
                }
            }
        }
        last.ok_or_else(|| LunaError::Eval("no statement produced a value".into()))
    }

    /// Evaluate a single (non-`;`-split) expression statement.
    pub fn eval_one(&mut self, stmt: &str, local: &mut Instance, global: Option<&mut Instance>) -> Result<Token> {
        let raw = lexer::lex(stmt).map_err(|e| {
            self.is_valid = false;
            LunaError::Parse(e)
        })?;
        let preprocessed = shunting_yard::preprocess(raw);
        let rpn = shunting_yard::to_rpn(preprocessed).inspect_err(|_| {
            self.is_valid = false;
        })?;
        let mut table = symbol_table::SymbolTable::new(local, global, self.global_names.clone());
        rpn::execute(&rpn, &mut table).inspect_err(|_| {
            self.is_valid = false;
        })
    }
}

/// Split a script on top-level `;` (inside nestable `{...}` strings a `;`
/// does not terminate a statement).
fn split_statements(script: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut in_quote = false;
    let mut current = String::new();
    for c in script.chars() {
        match c {
            '\'' => {
                in_quote = !in_quote;
                current.push(c);
            }
            '{' if !in_quote => {
                depth += 1;
                current.push(c);
            }
            '}' if !in_quote => {
                depth -= 1;
                current.push(c);
            }
            ';' if !in_quote && depth == 0 => {
                if !current.trim().is_empty() {
                    out.push(current.trim().to_string());
                }
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        out.push(current.trim().to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::TypedValue;

    #[test]
    fn single_expression_result() {
        let mut ev = Evaluator::new();
        let mut local = Instance::new();
        let r = ev.eval_script("1 + 2 * 3", &mut local, None).unwrap();
        assert_eq!(r.as_typed_value(), TypedValue::Int(7));
        assert!(ev.is_valid());
    }

    #[test]
    fn idempotence_assignment_then_reference() {
        // Evaluator idempotence: `x = expr; x` equals `expr`.
        let mut ev = Evaluator::new();
        let mut local = Instance::new();
        let direct = ev.eval_script("2 * 5", &mut local, None).unwrap();
        let mut local2 = Instance::new();
        let via_assign = ev.eval_script("x = 2 * 5; x", &mut local2, None).unwrap();
        assert_eq!(direct.as_typed_value(), via_assign.as_typed_value());
    }

    #[test]
    fn multi_statement_stops_after_first_failure() {
        let mut ev = Evaluator::new();
        let mut local = Instance::new();
        let r = ev.eval_script("x = 1; (; x", &mut local, None).unwrap();
        assert_eq!(r.as_typed_value(), TypedValue::Int(1));
        assert!(!ev.is_valid());
    }

    #[test]
    fn first_statement_failure_is_a_hard_error() {
        let mut ev = Evaluator::new();
        let mut local = Instance::new();
        assert!(ev.eval_script("(1 + ", &mut local, None).is_err());
    }

    #[test]
    fn global_accumulator_binding() {
        let mut ev = Evaluator::new();
        ev.declare_global("_n");
        let mut local = Instance::new();
        let mut global = Instance::new();
        global.set("_n", TypedValue::Int(0));
        ev.eval_script("_n = _n + 1", &mut local, Some(&mut global)).unwrap();
        assert_eq!(global.find("_n"), Some(&TypedValue::Int(1)));
        assert!(local.find("_n").is_none());
    }

    #[test]
    fn nested_brace_string_is_not_split_on_semicolon() {
        let stmts = split_statements("x = {a;b}; y = 1");
        assert_eq!(stmts, vec!["x = {a;b}".to_string(), "y = 1".to_string()]);
    }
}
