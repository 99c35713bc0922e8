//! RPN executor. Walks the postfix stream from [`super::shunting_yard`],
//! tracking an optional assignment target ("lvalue") alongside every value
//! on the stack so `Assign` can pick the right write-back shape without a
//! full parse tree: plain name, or a name plus the storage positions an
//! `element()` read sliced out (`x[c(2,3,5)] = ...`).

use crate::error::{LunaError, Result};
use crate::evaluator::functions;
use crate::evaluator::ops;
use crate::evaluator::shunting_yard::RpnItem;
use crate::evaluator::symbol_table::SymbolTable;
use crate::token::{Operator, SubsetView, Token};
use crate::value::TypedValue;

#[derive(Debug, Clone)]
enum LValue {
    Plain(String),
    Indexed { name: String, positions: Vec<i32> },
}

struct StackItem {
    token: Token,
    lvalue: Option<LValue>,
}

impl StackItem {
    fn value(token: Token) -> Self {
        Self { token, lvalue: None }
    }
}

/// Execute a preprocessed RPN stream against `table`, returning the value
/// of the final (only) remaining stack item.
pub fn execute(rpn: &[RpnItem], table: &mut SymbolTable) -> Result<Token> {
    let mut stack: Vec<StackItem> = Vec::new();

    for item in rpn {
        match item {
            RpnItem::Num(n) => stack.push(StackItem::value(Token::scalar(TypedValue::Dbl(*n)))),
            RpnItem::Int(n) => stack.push(StackItem::value(Token::scalar(TypedValue::Int(*n)))),
            RpnItem::Str(s) => stack.push(StackItem::value(Token::scalar(TypedValue::Txt(s.clone())))),
            RpnItem::Bool(b) => stack.push(StackItem::value(Token::scalar(TypedValue::Bool(*b)))),
            RpnItem::Ident(name) => {
                let token = table.lookup(name);
                stack.push(StackItem { token, lvalue: Some(LValue::Plain(name.clone())) });
            }
            RpnItem::Op(Operator::Not) => {
                let operand = pop(&mut stack, "!")?;
                stack.push(StackItem::value(ops::apply_not(&operand.token)));
            }
            RpnItem::Op(Operator::Assign) => {
                let rhs = pop(&mut stack, "=")?;
                let lhs = pop(&mut stack, "=")?;
                stack.push(assign(table, lhs, rhs)?);
            }
            RpnItem::Op(op) => {
                let rhs = pop(&mut stack, "binary operator")?;
                let lhs = pop(&mut stack, "binary operator")?;
                stack.push(StackItem::value(ops::apply_binary(*op, &lhs.token, &rhs.token)));
            }
            RpnItem::Call(name, arity) => {
                let args = pop_args(&mut stack, *arity)?;
                stack.push(dispatch_call(name, args)?);
            }
        }
    }

    match stack.len() {
        1 => Ok(stack.pop().unwrap().token),
        0 => Err(LunaError::Eval("empty expression".into())),
        _ => Err(LunaError::Eval("expression left extra values on the stack".into())),
    }
}

fn pop(stack: &mut Vec<StackItem>, ctx: &str) -> Result<StackItem> {
    stack.pop().ok_or_else(|| LunaError::Eval(format!("stack underflow evaluating {ctx}")))
}

fn pop_args(stack: &mut Vec<StackItem>, arity: usize) -> Result<Vec<StackItem>> {
    if stack.len() < arity {
        return Err(LunaError::Eval("stack underflow evaluating function call".into()));
    }
    // split_off preserves push order, so the result is already arg0..argN-1.
    Ok(stack.split_off(stack.len() - arity))
}

fn dispatch_call(name: &str, mut args: Vec<StackItem>) -> Result<StackItem> {
    if name == "element" && args.len() == 2 {
        let idx_item = args.pop().unwrap();
        let target_item = args.pop().unwrap();
        return element(target_item, idx_item);
    }

    if let Some(expected) = functions::fixed_arity(name) {
        if args.len() != expected {
            return Err(LunaError::Eval(format!("{name}: expected {expected} argument(s), got {}", args.len())));
        }
    }

    let tokens: Vec<Token> = args.into_iter().map(|a| a.token).collect();
    let result = functions::call(name, tokens)?;
    Ok(StackItem::value(result))
}

/// `element(target, idx)`. A vector index produces a `VectorView` subset
/// (supports `x[c(2,3,5)] = ...`); a scalar index produces a plain scalar,
/// but still carries a single-position lvalue so `x[2] = ...` can write
/// back through the same assignment path.
fn element(target: StackItem, idx_item: StackItem) -> Result<StackItem> {
    let idx_tv = idx_item.token.as_typed_value();

    if idx_item.token.is_vector() {
        let storage = match &target.token {
            Token::VectorView { storage, .. } => storage.clone(),
            Token::Value(v) => v.clone(),
            _ => return Err(LunaError::Eval("element: target is not a vector".into())),
        };
        let fullsize = storage.size();
        let positions: Vec<i32> = idx_tv
            .int_vector()
            .into_iter()
            .map(|i| (i - 1) as i32)
            .collect();
        for &p in &positions {
            if p < 0 || p as usize >= fullsize {
                return Err(LunaError::OutOfRange("element".into()));
            }
        }
        let lvalue = target.lvalue.map(|lv| match lv {
            LValue::Plain(name) => LValue::Indexed { name, positions: positions.clone() },
            LValue::Indexed { name, .. } => LValue::Indexed { name, positions: positions.clone() },
        });
        let result_token = Token::VectorView { storage, view: SubsetView { ve: positions }, fullsize };
        Ok(StackItem { token: result_token, lvalue })
    } else {
        let idx = idx_tv.int_value();
        let tv = target.token.as_typed_value();
        let result_token = functions::element_at(&tv, idx)?;
        let lvalue = target.lvalue.map(|lv| {
            let name = match lv {
                LValue::Plain(name) | LValue::Indexed { name, .. } => name,
            };
            LValue::Indexed { name, positions: vec![(idx - 1) as i32] }
        });
        Ok(StackItem { token: result_token, lvalue })
    }
}

fn assign(table: &mut SymbolTable, lhs: StackItem, rhs: StackItem) -> Result<StackItem> {
    match lhs.lvalue {
        None => Err(LunaError::Assignment("left-hand side of '=' is not assignable".into())),
        Some(LValue::Plain(name)) => {
            reject_dotted(&name)?;
            let rhs_tv = rhs.token.prune().as_typed_value();
            table.assign(&name, rhs_tv);
            Ok(StackItem { token: rhs.token, lvalue: Some(LValue::Plain(name)) })
        }
        Some(LValue::Indexed { name, positions }) => {
            reject_dotted(&name)?;
            let current = table.lookup(&name);
            if current.is_undef() {
                return Err(LunaError::Assignment(format!("cannot index-assign into undefined variable '{name}'")));
            }
            let storage = current.as_typed_value();
            let updated = write_positions(storage, &positions, &rhs.token)?;
            table.assign(&name, updated);
            Ok(StackItem { token: rhs.token, lvalue: Some(LValue::Indexed { name, positions }) })
        }
    }
}

/// Assignment contract (section 4.4): "LHS must be a variable name that
/// does *not* contain `.`" — dotted names address an existing instance
/// field and are read-only.
fn reject_dotted(name: &str) -> Result<()> {
    if name.contains('.') {
        return Err(LunaError::Assignment(format!("cannot assign to dotted field '{name}'")));
    }
    Ok(())
}

/// Row 4/5 of the assignment shape table: write `rhs` into `storage` at
/// `positions`, broadcasting a scalar rhs across every position and
/// requiring an exact length match for a vector rhs.
fn write_positions(storage: TypedValue, positions: &[i32], rhs: &Token) -> Result<TypedValue> {
    let n = storage.size();
    let mut scalars: Vec<TypedValue> = (0..n).map(|i| ops::scalar_at(&storage, i)).collect();

    if rhs.is_vector() {
        let rhs_tv = rhs.as_typed_value();
        if rhs_tv.size() != positions.len() {
            return Err(LunaError::Assignment(format!(
                "masked vector assignment expects {} values, got {}",
                positions.len(),
                rhs_tv.size()
            )));
        }
        for (slot, &pos) in positions.iter().enumerate() {
            scalars[pos as usize] = ops::scalar_at(&rhs_tv, slot);
        }
    } else {
        let rhs_scalar = rhs.as_typed_value();
        for &pos in positions {
            scalars[pos as usize] = rhs_scalar.clone();
        }
    }

    Ok(ops::pack_same_kind(scalars))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::Instance;
    use crate::evaluator::lexer::lex;
    use crate::evaluator::shunting_yard::{preprocess, to_rpn};
    use std::collections::HashSet;

    fn eval(expr: &str, local: &mut Instance) -> Result<Token> {
        let toks = preprocess(lex(expr).unwrap());
        let rpn = to_rpn(toks)?;
        let mut table = SymbolTable::new(local, None, HashSet::new());
        execute(&rpn, &mut table)
    }

    #[test]
    fn arithmetic_precedence_is_honored() {
        let mut local = Instance::new();
        let r = eval("1 + 2 * 3", &mut local).unwrap();
        assert_eq!(r.as_typed_value(), TypedValue::Int(7));
    }

    #[test]
    fn assignment_persists_into_the_symbol_table() {
        let mut local = Instance::new();
        eval("x = 5", &mut local).unwrap();
        assert_eq!(local.find("x"), Some(&TypedValue::Int(5)));
    }

    #[test]
    fn reassignment_round_trips_through_lookup() {
        let mut local = Instance::new();
        eval("x = 4", &mut local).unwrap();
        let r = eval("x", &mut local).unwrap();
        assert_eq!(r.as_typed_value(), TypedValue::Int(4));
    }

    #[test]
    fn masked_vector_assignment_updates_only_selected_positions() {
        let mut local = Instance::new();
        local.set("v".into(), TypedValue::IntVec(vec![10, 20, 30, 40, 50]));
        eval("v[c(2,4)] = c(99, 98)", &mut local).unwrap();
        assert_eq!(local.find("v"), Some(&TypedValue::IntVec(vec![10, 99, 30, 98, 50])));
    }

    #[test]
    fn scalar_broadcast_into_masked_vector() {
        let mut local = Instance::new();
        local.set("v".into(), TypedValue::IntVec(vec![1, 2, 3]));
        eval("v[c(1,3)] = 0", &mut local).unwrap();
        assert_eq!(local.find("v"), Some(&TypedValue::IntVec(vec![0, 2, 0])));
    }

    #[test]
    fn single_index_assignment_writes_one_position() {
        let mut local = Instance::new();
        local.set("v".into(), TypedValue::IntVec(vec![1, 2, 3]));
        eval("v[2] = 42", &mut local).unwrap();
        assert_eq!(local.find("v"), Some(&TypedValue::IntVec(vec![1, 42, 3])));
    }

    #[test]
    fn undefined_symbol_propagates_as_undef() {
        let mut local = Instance::new();
        let r = eval("missing + 1", &mut local).unwrap();
        assert!(r.is_undef());
    }

    #[test]
    fn assignment_to_non_lvalue_is_an_error() {
        let mut local = Instance::new();
        assert!(eval("1 + 2 = 3", &mut local).is_err());
    }

    #[test]
    fn assignment_to_dotted_name_is_an_error() {
        let mut local = Instance::new();
        assert!(eval("a.b = 1", &mut local).is_err());
    }

    #[test]
    fn wrong_arity_call_is_an_error() {
        let mut local = Instance::new();
        local.set("v".into(), TypedValue::IntVec(vec![1, 2, 3]));
        assert!(eval("pow(v)", &mut local).is_err());
    }

    #[test]
    fn comparison_and_logical_chain() {
        let mut local = Instance::new();
        let r = eval("(1 < 2) && (3 > 2)", &mut local).unwrap();
        assert_eq!(r.as_typed_value(), TypedValue::Bool(true));
    }

    #[test]
    fn element_read_is_one_based() {
        let mut local = Instance::new();
        local.set("v".into(), TypedValue::IntVec(vec![10, 20, 30]));
        let r = eval("v[2]", &mut local).unwrap();
        assert_eq!(r.as_typed_value(), TypedValue::Int(20));
    }
}
