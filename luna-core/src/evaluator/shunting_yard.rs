//! Preprocessing (`x[y]` -> `element(x,y)`, variadic arity rewrite) and the
//! shunting-yard conversion from the raw token stream to reverse-Polish
//! notation.

use crate::error::{LunaError, Result};
use crate::evaluator::functions::is_variadic;
use crate::evaluator::lexer::RawTok;
use crate::token::Operator;

/// One item of the RPN output stream.
#[derive(Debug, Clone, PartialEq)]
pub enum RpnItem {
    Num(f64),
    Int(i64),
    Str(String),
    Bool(bool),
    Ident(String),
    /// A function call with the argument count the parser actually saw,
    /// counted from top-level commas in the call's parens. Needed because
    /// `rnd()` and `rnd(n)` share a name but differ in arity, and because
    /// variadic constructors were rewritten to carry their arity as an
    /// extra trailing argument before this pass ever runs.
    Call(String, usize),
    Op(Operator),
}

/// Tracks, for each currently open `(`, whether it belongs to a function
/// call (and if so its running comma/arg-seen state) or is a plain
/// grouping paren.
enum ParenFrame {
    Group,
    Call { name: String, commas: usize, saw_token: bool },
}

fn mark_token_seen(parens: &mut [ParenFrame]) {
    if let Some(ParenFrame::Call { saw_token, .. }) = parens.last_mut() {
        *saw_token = true;
    }
}

/// Rewrite `x[y]` occurrences into `element(x, y)` calls via a backward
/// bracket-matching scan, then rewrite every variadic constructor call
/// `f(a, b, c)` into `f_func(a, b, c, 3)` (arity becomes a trailing literal
/// argument so the RPN executor can pop it off the stack).
pub fn preprocess(tokens: Vec<RawTok>) -> Vec<RawTok> {
    let tokens = rewrite_indexing(tokens);
    rewrite_variadic(tokens)
}

fn rewrite_indexing(tokens: Vec<RawTok>) -> Vec<RawTok> {
    // Scan left to right; whenever `LBracket` is found, the preceding
    // balanced-paren expression (an identifier or a `)`-closed group) is the
    // indexed target.
    let mut out: Vec<RawTok> = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        if tokens[i] == RawTok::LBracket {
            // Find matching RBracket.
            let mut depth = 1;
            let mut j = i + 1;
            while j < tokens.len() && depth > 0 {
                match tokens[j] {
                    RawTok::LBracket => depth += 1,
                    RawTok::RBracket => depth -= 1,
                    _ => {}
                }
                if depth > 0 {
                    j += 1;
                }
            }
            let index_expr: Vec<RawTok> = tokens[i + 1..j].to_vec();

            // Pop the target expression (an identifier, or a parenthesized
            // group) already pushed onto `out`.
            let target: Vec<RawTok> = if let Some(RawTok::Ident(_)) = out.last() {
                vec![out.pop().unwrap()]
            } else if out.last() == Some(&RawTok::RParen) {
                let mut depth = 1;
                let mut k = out.len() - 1;
                loop {
                    k -= 1;
                    match out[k] {
                        RawTok::RParen => depth += 1,
                        RawTok::LParen => depth -= 1,
                        _ => {}
                    }
                    if depth == 0 {
                        break;
                    }
                }
                out.drain(k..).collect()
            } else {
                vec![out.pop().unwrap_or(RawTok::Ident(String::new()))]
            };

            out.push(RawTok::FuncCall("element".to_string()));
            out.push(RawTok::LParen);
            out.extend(rewrite_indexing(target));
            out.push(RawTok::Comma);
            out.extend(rewrite_indexing(index_expr));
            out.push(RawTok::RParen);

            i = j + 1; // skip past matching RBracket
            continue;
        }
        out.push(tokens[i].clone());
        i += 1;
    }
    out
}

fn rewrite_variadic(tokens: Vec<RawTok>) -> Vec<RawTok> {
    let mut out = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        if let RawTok::FuncCall(name) = &tokens[i] {
            if is_variadic(name) {
                // tokens[i+1] is guaranteed LParen by the lexer's FuncCall rule.
                let mut depth = 1;
                let mut j = i + 2;
                let mut arg_count = if matches!(tokens.get(i + 2), Some(RawTok::RParen)) { 0 } else { 1 };
                while j < tokens.len() && depth > 0 {
                    match &tokens[j] {
                        RawTok::LParen => depth += 1,
                        RawTok::RParen => depth -= 1,
                        RawTok::Comma if depth == 1 => arg_count += 1,
                        _ => {}
                    }
                    if depth > 0 {
                        j += 1;
                    }
                }
                out.push(RawTok::FuncCall(format!("{name}_func")));
                out.push(RawTok::LParen);
                out.extend(rewrite_variadic(tokens[i + 2..j].to_vec()));
                if arg_count > 0 {
                    out.push(RawTok::Comma);
                }
                out.push(RawTok::Int(arg_count as i64));
                out.push(RawTok::RParen);
                i = j + 1;
                continue;
            }
        }
        out.push(tokens[i].clone());
        i += 1;
    }
    out
}

/// Convert a preprocessed token stream to RPN via shunting-yard.
/// Function calls are recognized by the `FuncCall` marker the lexer already
/// produced (trailing `(` disambiguation happened during lexing).
pub fn to_rpn(tokens: Vec<RawTok>) -> Result<Vec<RpnItem>> {
    let mut output = Vec::new();
    let mut ops: Vec<RawTok> = Vec::new();
    let mut parens: Vec<ParenFrame> = Vec::new();

    for tok in tokens {
        match tok {
            RawTok::Num(n) => {
                output.push(RpnItem::Num(n));
                mark_token_seen(&mut parens);
            }
            RawTok::Int(n) => {
                output.push(RpnItem::Int(n));
                mark_token_seen(&mut parens);
            }
            RawTok::Str(s) => {
                output.push(RpnItem::Str(s));
                mark_token_seen(&mut parens);
            }
            RawTok::Bool(b) => {
                output.push(RpnItem::Bool(b));
                mark_token_seen(&mut parens);
            }
            RawTok::Ident(name) => {
                output.push(RpnItem::Ident(name));
                mark_token_seen(&mut parens);
            }
            RawTok::FuncCall(name) => ops.push(RawTok::FuncCall(name)),
            RawTok::Comma => {
                while let Some(top) = ops.last() {
                    if *top == RawTok::LParen {
                        break;
                    }
                    pop_op_to_output(&mut ops, &mut output)?;
                }
                if let Some(ParenFrame::Call { commas, .. }) = parens.last_mut() {
                    *commas += 1;
                }
            }
            RawTok::Op(op) => {
                while let Some(RawTok::Op(top)) = ops.last() {
                    let pop = if op.is_right_associative() {
                        top.precedence() > op.precedence()
                    } else {
                        top.precedence() >= op.precedence()
                    };
                    if !pop {
                        break;
                    }
                    pop_op_to_output(&mut ops, &mut output)?;
                }
                ops.push(RawTok::Op(op));
            }
            RawTok::LParen => {
                if let Some(RawTok::FuncCall(name)) = ops.last() {
                    parens.push(ParenFrame::Call { name: name.clone(), commas: 0, saw_token: false });
                } else {
                    parens.push(ParenFrame::Group);
                }
                ops.push(RawTok::LParen);
            }
            RawTok::RParen => {
                loop {
                    match ops.last() {
                        Some(RawTok::LParen) => {
                            ops.pop();
                            break;
                        }
                        Some(_) => pop_op_to_output(&mut ops, &mut output)?,
                        None => return Err(LunaError::Parse("mismatched parentheses".into())),
                    }
                }
                let frame = parens.pop().ok_or_else(|| LunaError::Parse("mismatched parentheses".into()))?;
                if let Some(RawTok::FuncCall(name)) = ops.last() {
                    let name = name.clone();
                    ops.pop();
                    let arity = match frame {
                        ParenFrame::Call { commas, saw_token, .. } => {
                            if saw_token {
                                commas + 1
                            } else {
                                0
                            }
                        }
                        ParenFrame::Group => 0,
                    };
                    output.push(RpnItem::Call(name, arity));
                }
                mark_token_seen(&mut parens);
            }
            RawTok::LBracket | RawTok::RBracket => {
                return Err(LunaError::Parse("internal error: bracket survived preprocessing".into()));
            }
        }
    }

    while let Some(top) = ops.pop() {
        match top {
            RawTok::LParen | RawTok::RParen => return Err(LunaError::Parse("mismatched parentheses".into())),
            RawTok::Op(op) => output.push(RpnItem::Op(op)),
            RawTok::FuncCall(_) => return Err(LunaError::Parse("unterminated function call".into())),
            _ => {}
        }
    }

    Ok(output)
}

fn pop_op_to_output(ops: &mut Vec<RawTok>, output: &mut Vec<RpnItem>) -> Result<()> {
    match ops.pop() {
        Some(RawTok::Op(op)) => {
            output.push(RpnItem::Op(op));
            Ok(())
        }
        Some(_) | None => Err(LunaError::Parse("malformed expression".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::lexer::lex;

    #[test]
    fn simple_precedence() {
        let toks = preprocess(lex("1 + 2 * 3").unwrap());
        let rpn = to_rpn(toks).unwrap();
        assert_eq!(
            rpn,
            vec![RpnItem::Int(1), RpnItem::Int(2), RpnItem::Int(3), RpnItem::Op(Operator::Mul), RpnItem::Op(Operator::Add)]
        );
    }

    #[test]
    fn indexing_rewrites_to_element_call() {
        let toks = preprocess(lex("X[1]").unwrap());
        let rpn = to_rpn(toks).unwrap();
        assert_eq!(rpn, vec![RpnItem::Ident("X".into()), RpnItem::Int(1), RpnItem::Call("element".into(), 2)]);
    }

    #[test]
    fn variadic_rewrite_appends_arity() {
        let toks = preprocess(lex("c(1, 2, 3)").unwrap());
        let rpn = to_rpn(toks).unwrap();
        assert_eq!(
            rpn,
            vec![
                RpnItem::Int(1),
                RpnItem::Int(2),
                RpnItem::Int(3),
                RpnItem::Int(3),
                RpnItem::Call("c_func".into(), 4),
            ]
        );
    }

    #[test]
    fn zero_arg_call_has_zero_arity() {
        let toks = preprocess(lex("rnd()").unwrap());
        let rpn = to_rpn(toks).unwrap();
        assert_eq!(rpn, vec![RpnItem::Call("rnd".into(), 0)]);
    }

    #[test]
    fn mismatched_parens_fail() {
        let toks = preprocess(lex("(1 + 2").unwrap());
        assert!(to_rpn(toks).is_err());
    }
}
