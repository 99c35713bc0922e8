//! Function table. Fixed-arity functions pop a known number of arguments;
//! variadic vector constructors (`num int txt bool c`) are rewritten by the
//! preprocessor to an `f_func` name that consumes a trailing integer arity
//! popped from the stack.

use crate::error::{LunaError, Result};
use crate::token::Token;
use crate::value::TypedValue;

/// Names recognized as variadic constructors; the shunting-yard
/// preprocessor rewrites `f(a,b,c)` to `f_func(a,b,c,3)`.
pub const VARIADIC_CONSTRUCTORS: &[&str] = &["num", "int", "txt", "bool", "c"];

#[must_use]
pub fn is_variadic(name: &str) -> bool {
    VARIADIC_CONSTRUCTORS.contains(&name)
}

/// Fixed arity for every non-variadic function, or `None` if unknown or
/// (like `rnd`, which accepts either `rnd()` or `rnd(n)`) genuinely
/// overloaded. The RPN executor consults this before dispatching a call, to
/// reject an arity mismatch before it ever reaches `call`.
#[must_use]
pub fn fixed_arity(name: &str) -> Option<usize> {
    Some(match name {
        "sqrt" | "sqr" | "log" | "log10" | "exp" | "abs" | "floor" | "round" | "length" | "size" | "sum" | "mean"
        | "sd" | "sort" | "any" | "all" | "min" | "max" => 1,
        "pow" | "element" | "ifnot" | "contains" | "countif" => 2,
        "if" | "ifelse" => 3,
        _ => return None,
    })
}

pub fn call(name: &str, mut args: Vec<Token>) -> Result<Token> {
    // `rnd` has two overloads: rnd() and rnd(n). Dispatch on argument count.
    match name {
        "num_func" | "int_func" | "txt_func" | "bool_func" | "c_func" => return construct_vector(name, args),
        _ => {}
    }

    let a = |args: &mut Vec<Token>, i: usize| args.get(i).cloned().ok_or_else(|| LunaError::Eval(format!("{name}: missing argument {i}")));

    match name {
        "sqrt" => unary_numeric(a(&mut args, 0)?, f64::sqrt),
        "sqr" => unary_numeric(a(&mut args, 0)?, |x| x * x),
        "log" => unary_numeric(a(&mut args, 0)?, f64::ln),
        "log10" => unary_numeric(a(&mut args, 0)?, f64::log10),
        "exp" => unary_numeric(a(&mut args, 0)?, f64::exp),
        "abs" => unary_numeric(a(&mut args, 0)?, f64::abs),
        "floor" => unary_numeric(a(&mut args, 0)?, f64::floor),
        "round" => unary_numeric(a(&mut args, 0)?, f64::round),
        "rnd" => {
            if args.is_empty() {
                Ok(Token::scalar(TypedValue::Dbl(pseudo_random())))
            } else {
                let n = a(&mut args, 0)?.as_typed_value().int_value();
                Ok(Token::scalar(TypedValue::Int((pseudo_random() * n as f64).floor() as i64)))
            }
        }
        "pow" => {
            let base = a(&mut args, 0)?.as_typed_value().double_value();
            let exp = a(&mut args, 1)?.as_typed_value().double_value();
            Ok(Token::scalar(TypedValue::Dbl(base.powf(exp))))
        }
        "length" | "size" => Ok(Token::scalar(TypedValue::Int(a(&mut args, 0)?.size() as i64))),
        "sum" => reduce_numeric(a(&mut args, 0)?, |v| v.iter().sum::<f64>()),
        "mean" => reduce_numeric(a(&mut args, 0)?, |v| if v.is_empty() { f64::NAN } else { v.iter().sum::<f64>() / v.len() as f64 }),
        "sd" => reduce_numeric(a(&mut args, 0)?, |v| stddev(v)),
        "min" => reduce_numeric(a(&mut args, 0)?, |v| v.iter().copied().fold(f64::INFINITY, f64::min)),
        "max" => reduce_numeric(a(&mut args, 0)?, |v| v.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
        "sort" => {
            let mut v = a(&mut args, 0)?.as_typed_value().double_vector();
            v.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
            Ok(Token::vector(TypedValue::DblVec(v)))
        }
        "element" => {
            let v = a(&mut args, 0)?;
            let idx = a(&mut args, 1)?.as_typed_value().int_value();
            let tv = v.as_typed_value();
            element_at(&tv, idx)
        }
        "any" => {
            let v = a(&mut args, 0)?.as_typed_value().bool_vector();
            Ok(Token::scalar(TypedValue::Bool(v.iter().any(|b| *b))))
        }
        "all" => {
            let v = a(&mut args, 0)?.as_typed_value().bool_vector();
            Ok(Token::scalar(TypedValue::Bool(v.iter().all(|b| *b))))
        }
        "contains" => {
            let x = a(&mut args, 0)?.as_typed_value().text_vector();
            let y = a(&mut args, 1)?.as_typed_value().text_value();
            Ok(Token::scalar(TypedValue::Bool(x.iter().any(|e| e == &y))))
        }
        "countif" => {
            let x = a(&mut args, 0)?.as_typed_value().text_vector();
            let y = a(&mut args, 1)?.as_typed_value().text_value();
            Ok(Token::scalar(TypedValue::Int(x.iter().filter(|e| *e == &y).count() as i64)))
        }
        "if" => {
            let cond = a(&mut args, 0)?.as_typed_value().bool_value();
            Ok(if cond { a(&mut args, 1)? } else { a(&mut args, 2)? })
        }
        "ifnot" => {
            let cond = a(&mut args, 0)?.as_typed_value().bool_value();
            Ok(if !cond { a(&mut args, 1)? } else { Token::scalar(TypedValue::Flag) })
        }
        "ifelse" => {
            let cond = a(&mut args, 0)?.as_typed_value().bool_value();
            Ok(if cond { a(&mut args, 1)? } else { a(&mut args, 2)? })
        }
        _ => Err(LunaError::UnknownFunction(name.to_string())),
    }
}

pub(crate) fn element_at(tv: &TypedValue, idx_1based: i64) -> Result<Token> {
    let idx = idx_1based - 1;
    if idx < 0 {
        return Err(LunaError::OutOfRange("element".into()));
    }
    let idx = idx as usize;
    let out = match tv {
        TypedValue::BoolVec(v) => v.get(idx).map(|b| TypedValue::Bool(*b)),
        TypedValue::IntVec(v) => v.get(idx).map(|i| TypedValue::Int(*i)),
        TypedValue::DblVec(v) => v.get(idx).map(|d| TypedValue::Dbl(*d)),
        TypedValue::TxtVec(v) => v.get(idx).map(|s| TypedValue::Txt(s.clone())),
        scalar if idx == 0 => Some(scalar.clone()),
        _ => None,
    };
    out.map(Token::scalar).ok_or_else(|| LunaError::OutOfRange("element".into()))
}

fn construct_vector(name: &str, mut args: Vec<Token>) -> Result<Token> {
    // Arity (pushed by the preprocessor) is the trailing integer argument.
    let Some(arity_tok) = args.pop() else {
        return Err(LunaError::Eval(format!("{name}: missing arity")));
    };
    let arity = arity_tok.as_typed_value().int_value() as usize;
    if args.len() != arity {
        return Err(LunaError::Eval(format!("{name}: expected {arity} arguments, got {}", args.len())));
    }
    let values: Vec<TypedValue> = args.iter().map(Token::as_typed_value).collect();
    Ok(match name {
        "num_func" => Token::vector(TypedValue::DblVec(values.iter().map(TypedValue::double_value).collect())),
        "int_func" => Token::vector(TypedValue::IntVec(values.iter().map(TypedValue::int_value).collect())),
        "txt_func" => Token::vector(TypedValue::TxtVec(values.iter().map(TypedValue::text_value).collect())),
        "bool_func" => Token::vector(TypedValue::BoolVec(values.iter().map(TypedValue::bool_value).collect())),
        "c_func" => concat_same_kind(values),
        _ => unreachable!(),
    })
}

/// `c(...)`: concatenate same-kind scalars/vectors into one vector,
/// promoting to the richest kind present (bool < int < float; string is
/// incompatible with numeric kinds and wins outright if present).
fn concat_same_kind(values: Vec<TypedValue>) -> Token {
    let any_txt = values.iter().any(|v| matches!(v, TypedValue::Txt(_) | TypedValue::TxtVec(_)));
    if any_txt {
        return Token::vector(TypedValue::TxtVec(values.iter().flat_map(TypedValue::text_vector).collect()));
    }
    let any_dbl = values.iter().any(|v| matches!(v, TypedValue::Dbl(_) | TypedValue::DblVec(_)));
    if any_dbl {
        return Token::vector(TypedValue::DblVec(values.iter().flat_map(TypedValue::double_vector).collect()));
    }
    let any_int = values.iter().any(|v| matches!(v, TypedValue::Int(_) | TypedValue::IntVec(_)));
    if any_int {
        return Token::vector(TypedValue::IntVec(values.iter().flat_map(TypedValue::int_vector).collect()));
    }
    Token::vector(TypedValue::BoolVec(values.iter().flat_map(TypedValue::bool_vector).collect()))
}

fn unary_numeric(t: Token, f: impl Fn(f64) -> f64) -> Result<Token> {
    let tv = t.as_typed_value();
    Ok(if tv.is_vector() {
        Token::vector(TypedValue::DblVec(tv.double_vector().into_iter().map(f).collect()))
    } else {
        Token::scalar(TypedValue::Dbl(f(tv.double_value())))
    })
}

fn reduce_numeric(t: Token, f: impl Fn(&[f64]) -> f64) -> Result<Token> {
    let tv = t.as_typed_value().double_vector();
    Ok(Token::scalar(TypedValue::Dbl(f(&tv))))
}

fn stddev(v: &[f64]) -> f64 {
    if v.len() < 2 {
        return 0.0;
    }
    let mean = v.iter().sum::<f64>() / v.len() as f64;
    let var = v.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (v.len() - 1) as f64;
    var.sqrt()
}

/// Deterministic pseudo-random in `[0, 1)`. The original uses the
/// platform RNG; a fixed-seed xorshift keeps evaluator scripts reproducible,
/// which matters more for this engine (scripted batch analysis) than true
/// randomness.
fn pseudo_random() -> f64 {
    use std::cell::Cell;
    thread_local! {
        static STATE: Cell<u64> = const { Cell::new(0x9E3779B97F4A7C15) };
    }
    STATE.with(|s| {
        let mut x = s.get();
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        s.set(x);
        (x >> 11) as f64 / (1u64 << 53) as f64
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_of_vector() {
        let t = Token::vector(TypedValue::IntVec(vec![1, 2, 3, 4, 5]));
        let r = call("sum", vec![t]).unwrap();
        assert_eq!(r.as_typed_value(), TypedValue::Dbl(15.0));
    }

    #[test]
    fn mean_of_vector() {
        let t = Token::vector(TypedValue::IntVec(vec![3, 4, 5]));
        let r = call("mean", vec![t]).unwrap();
        assert_eq!(r.as_typed_value(), TypedValue::Dbl(4.0));
    }

    #[test]
    fn min_and_max_of_vector() {
        let v = TypedValue::IntVec(vec![5, 1, 9, 3]);
        let min = call("min", vec![Token::vector(v.clone())]).unwrap();
        let max = call("max", vec![Token::vector(v)]).unwrap();
        assert_eq!(min.as_typed_value(), TypedValue::Dbl(1.0));
        assert_eq!(max.as_typed_value(), TypedValue::Dbl(9.0));
    }

    #[test]
    fn element_is_one_based() {
        let t = Token::vector(TypedValue::IntVec(vec![10, 20, 30]));
        let idx = Token::scalar(TypedValue::Int(2));
        let r = call("element", vec![t, idx]).unwrap();
        assert_eq!(r.as_typed_value(), TypedValue::Int(20));
    }

    #[test]
    fn c_func_concatenates_promoting_to_float() {
        let a = Token::scalar(TypedValue::Int(1));
        let b = Token::scalar(TypedValue::Dbl(2.5));
        let arity = Token::scalar(TypedValue::Int(2));
        let r = call("c_func", vec![a, b, arity]).unwrap();
        assert_eq!(r.as_typed_value(), TypedValue::DblVec(vec![1.0, 2.5]));
    }
}
