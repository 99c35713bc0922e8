//! Token-level operator semantics: the scalar promotion lattice, vector
//! broadcasting/element-wise rules, and the asymmetric `=~` ("any element
//! equals") operator.

use crate::token::{Operator, Token};
use crate::value::TypedValue;

/// Apply a binary operator to two already-resolved (non-lvalue) tokens.
/// `Undef` is contagious except for the `&&`/`||` short-circuit rule, which
/// still requires *both* sides defined before it applies boolean logic.
pub fn apply_binary(op: Operator, lhs: &Token, rhs: &Token) -> Token {
    if lhs.is_undef() || rhs.is_undef() {
        return Token::Undef;
    }

    match op {
        Operator::Add => arith(lhs, rhs, |a, b| a + b, |a, b| a.wrapping_add(b), Some(concat_text)),
        Operator::Sub => arith(lhs, rhs, |a, b| a - b, |a, b| a.wrapping_sub(b), None),
        Operator::Mul => arith(lhs, rhs, |a, b| a * b, |a, b| a.wrapping_mul(b), None),
        Operator::Div => divide(lhs, rhs),
        Operator::Mod => modulo(lhs, rhs),
        Operator::Pow => arith(lhs, rhs, f64::powf, |a, b| (a as f64).powf(b as f64) as i64, None),
        Operator::And => logical(lhs, rhs, |a, b| a && b),
        Operator::Or => logical(lhs, rhs, |a, b| a || b),
        Operator::Lt => compare(lhs, rhs, |a, b| a < b, |a, b| a < b),
        Operator::Le => compare(lhs, rhs, |a, b| a <= b, |a, b| a <= b),
        Operator::Gt => compare(lhs, rhs, |a, b| a > b, |a, b| a > b),
        Operator::Ge => compare(lhs, rhs, |a, b| a >= b, |a, b| a >= b),
        Operator::Eq => equality(lhs, rhs, true),
        Operator::Neq => equality(lhs, rhs, false),
        Operator::Has => has(lhs, rhs),
        Operator::Not | Operator::Assign => unreachable!("handled by the caller"),
    }
}

pub fn apply_not(t: &Token) -> Token {
    if t.is_undef() {
        return Token::Undef;
    }
    let tv = t.as_typed_value();
    if tv.is_vector() {
        Token::vector(TypedValue::BoolVec(tv.bool_vector().into_iter().map(|b| !b).collect()))
    } else {
        Token::scalar(TypedValue::Bool(!tv.bool_value()))
    }
}

fn is_text(v: &TypedValue) -> bool {
    matches!(v, TypedValue::Txt(_) | TypedValue::TxtVec(_))
}

fn concat_text(a: &str, b: &str) -> String {
    format!("{a}{b}")
}

/// Elementwise/broadcast arithmetic, following the `bool ⊂ int ⊂ float`
/// promotion lattice. Strings only combine via `text_concat` (used for `+`;
/// `None` for operators where strings are invalid, which degrades to 0.0).
fn arith(
    lhs: &Token,
    rhs: &Token,
    ffloat: impl Fn(f64, f64) -> f64,
    fint: impl Fn(i64, i64) -> i64,
    text_concat: Option<fn(&str, &str) -> String>,
) -> Token {
    let ltv = lhs.as_typed_value();
    let rtv = rhs.as_typed_value();

    if let Some(concat) = text_concat {
        if is_text(&ltv) || is_text(&rtv) {
            return zip_broadcast(lhs, rhs, &ltv, &rtv, |a, b| TypedValue::Txt(concat(&a.text_value(), &b.text_value())));
        }
    }

    let use_int = !matches!(ltv, TypedValue::Dbl(_) | TypedValue::DblVec(_)) && !matches!(rtv, TypedValue::Dbl(_) | TypedValue::DblVec(_));

    if use_int {
        zip_broadcast(lhs, rhs, &ltv, &rtv, |a, b| TypedValue::Int(fint(a.int_value(), b.int_value())))
    } else {
        zip_broadcast(lhs, rhs, &ltv, &rtv, |a, b| TypedValue::Dbl(ffloat(a.double_value(), b.double_value())))
    }
}

fn divide(lhs: &Token, rhs: &Token) -> Token {
    let ltv = lhs.as_typed_value();
    let rtv = rhs.as_typed_value();
    zip_broadcast(lhs, rhs, &ltv, &rtv, |a, b| TypedValue::Dbl(a.double_value() / b.double_value()))
}

/// `%` requires int (section 4.4). Rust's native integer `%` already
/// truncates towards zero like the reference implementation's (so
/// `7 % -3 == 1`); the only thing it doesn't handle gracefully is a zero
/// divisor, which panics instead of producing a value. Guard it up front,
/// over exactly the divisor values `zip_broadcast` will actually pair up,
/// and yield `Undef` like any other ill-typed intermediate (section 7).
fn modulo(lhs: &Token, rhs: &Token) -> Token {
    let ltv = lhs.as_typed_value();
    let rtv = rhs.as_typed_value();
    let divisors: Vec<i64> = if rhs.is_vector() {
        let n = if lhs.is_vector() { ltv.size().min(rtv.size()) } else { rtv.size() };
        rtv.int_vector().into_iter().take(n).collect()
    } else {
        vec![rtv.int_value()]
    };
    if divisors.iter().any(|&d| d == 0) {
        return Token::Undef;
    }
    zip_broadcast(lhs, rhs, &ltv, &rtv, |a, b| TypedValue::Int(a.int_value() % b.int_value()))
}

fn logical(lhs: &Token, rhs: &Token, f: impl Fn(bool, bool) -> bool) -> Token {
    let ltv = lhs.as_typed_value();
    let rtv = rhs.as_typed_value();
    zip_broadcast(lhs, rhs, &ltv, &rtv, |a, b| TypedValue::Bool(f(a.bool_value(), b.bool_value())))
}

fn compare(lhs: &Token, rhs: &Token, fnum: impl Fn(f64, f64) -> bool, ftxt: impl Fn(&str, &str) -> bool) -> Token {
    let ltv = lhs.as_typed_value();
    let rtv = rhs.as_typed_value();
    if is_text(&ltv) || is_text(&rtv) {
        zip_broadcast(lhs, rhs, &ltv, &rtv, move |a, b| TypedValue::Bool(ftxt(&a.text_value(), &b.text_value())))
    } else {
        zip_broadcast(lhs, rhs, &ltv, &rtv, move |a, b| TypedValue::Bool(fnum(a.double_value(), b.double_value())))
    }
}

/// `==`/`!=` on equal-length vectors is element-wise; on unequal-length
/// vectors the result is `Undef` (section 4.4/9: "conservative implementation
/// is to return UNDEF and force callers to length-check").
fn equality(lhs: &Token, rhs: &Token, want_eq: bool) -> Token {
    let lsz = if lhs.is_vector() { lhs.size() } else { 1 };
    let rsz = if rhs.is_vector() { rhs.size() } else { 1 };
    if lhs.is_vector() && rhs.is_vector() && lsz != rsz {
        return Token::Undef;
    }
    let ltv = lhs.as_typed_value();
    let rtv = rhs.as_typed_value();
    if is_text(&ltv) || is_text(&rtv) {
        zip_broadcast(lhs, rhs, &ltv, &rtv, move |a, b| TypedValue::Bool((a.text_value() == b.text_value()) == want_eq))
    } else {
        zip_broadcast(lhs, rhs, &ltv, &rtv, move |a, b| TypedValue::Bool((a.double_value() == b.double_value()) == want_eq))
    }
}

/// `=~`: asymmetric "any element equals" — `count(lhs == rhs) > 0` as a
/// scalar bool, regardless of vector lengths.
fn has(lhs: &Token, rhs: &Token) -> Token {
    let l = lhs.as_typed_value().text_vector();
    let r = rhs.as_typed_value().text_vector();
    let any = l.iter().any(|a| r.iter().any(|b| a == b));
    Token::scalar(TypedValue::Bool(any))
}

/// Zip two operands applying broadcasting: vector-vector requires equal
/// `size()` (panics upstream via length mismatch would have already been
/// caught by `equality`'s undef guard for `==`/`!=`; arithmetic on
/// mismatched vector lengths truncates to the shorter, matching a
/// defensive zip rather than hard-failing mid-expression); vector-scalar
/// broadcasts the scalar across every position.
fn zip_broadcast(
    lhs: &Token,
    rhs: &Token,
    ltv: &TypedValue,
    rtv: &TypedValue,
    f: impl Fn(&TypedValue, &TypedValue) -> TypedValue,
) -> Token {
    let lvec = lhs.is_vector();
    let rvec = rhs.is_vector();

    if !lvec && !rvec {
        return Token::scalar(f(ltv, rtv));
    }

    let values: Vec<TypedValue> = if lvec && rvec {
        let ln = ltv.size();
        let rn = rtv.size();
        let n = ln.min(rn);
        (0..n).map(|i| f(&scalar_at(ltv, i), &scalar_at(rtv, i))).collect()
    } else if lvec {
        (0..ltv.size()).map(|i| f(&scalar_at(ltv, i), rtv)).collect()
    } else {
        (0..rtv.size()).map(|i| f(ltv, &scalar_at(rtv, i))).collect()
    };

    Token::vector(pack_same_kind(values))
}

pub(crate) fn scalar_at(tv: &TypedValue, i: usize) -> TypedValue {
    match tv {
        TypedValue::BoolVec(v) => TypedValue::Bool(v[i]),
        TypedValue::IntVec(v) => TypedValue::Int(v[i]),
        TypedValue::DblVec(v) => TypedValue::Dbl(v[i]),
        TypedValue::TxtVec(v) => TypedValue::Txt(v[i].clone()),
        scalar => scalar.clone(),
    }
}

pub(crate) fn pack_same_kind(values: Vec<TypedValue>) -> TypedValue {
    if values.iter().all(|v| matches!(v, TypedValue::Bool(_))) {
        TypedValue::BoolVec(values.into_iter().map(|v| v.bool_value()).collect())
    } else if values.iter().all(|v| matches!(v, TypedValue::Int(_))) {
        TypedValue::IntVec(values.into_iter().map(|v| v.int_value()).collect())
    } else if values.iter().all(|v| matches!(v, TypedValue::Txt(_))) {
        TypedValue::TxtVec(values.into_iter().map(|v| v.text_value()).collect())
    } else {
        TypedValue::DblVec(values.into_iter().map(|v| v.double_value()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_plus_scalar_broadcasts() {
        let x = Token::vector(TypedValue::IntVec(vec![1, 2, 3, 4, 5]));
        let ten = Token::scalar(TypedValue::Int(10));
        let r = apply_binary(Operator::Add, &x, &ten);
        assert_eq!(r.as_typed_value(), TypedValue::IntVec(vec![11, 12, 13, 14, 15]));
    }

    #[test]
    fn comparison_produces_bool_vector() {
        let x = Token::vector(TypedValue::IntVec(vec![1, 2, 3, 4, 5]));
        let two = Token::scalar(TypedValue::Int(2));
        let r = apply_binary(Operator::Gt, &x, &two);
        assert_eq!(r.as_typed_value(), TypedValue::BoolVec(vec![false, false, true, true, true]));
    }

    #[test]
    fn equality_on_unequal_length_vectors_is_undef() {
        let a = Token::vector(TypedValue::IntVec(vec![1, 2]));
        let b = Token::vector(TypedValue::IntVec(vec![1, 2, 3]));
        assert!(apply_binary(Operator::Eq, &a, &b).is_undef());
    }

    #[test]
    fn has_operator_is_asymmetric_any_match() {
        let a = Token::vector(TypedValue::IntVec(vec![1, 2, 3]));
        let b = Token::scalar(TypedValue::Int(2));
        let r = apply_binary(Operator::Has, &a, &b);
        assert_eq!(r.as_typed_value(), TypedValue::Bool(true));
    }

    #[test]
    fn undef_is_contagious() {
        let u = Token::Undef;
        let five = Token::scalar(TypedValue::Int(5));
        assert!(apply_binary(Operator::Add, &u, &five).is_undef());
    }

    #[test]
    fn division_always_returns_float() {
        let a = Token::scalar(TypedValue::Int(7));
        let b = Token::scalar(TypedValue::Int(2));
        assert_eq!(apply_binary(Operator::Div, &a, &b).as_typed_value(), TypedValue::Dbl(3.5));
    }

    #[test]
    fn modulo_truncates_towards_zero_for_negative_divisor() {
        let a = Token::scalar(TypedValue::Int(7));
        let b = Token::scalar(TypedValue::Int(-3));
        assert_eq!(apply_binary(Operator::Mod, &a, &b).as_typed_value(), TypedValue::Int(1));
    }

    #[test]
    fn modulo_by_zero_is_undef() {
        let a = Token::scalar(TypedValue::Int(7));
        let b = Token::scalar(TypedValue::Int(0));
        assert!(apply_binary(Operator::Mod, &a, &b).is_undef());
    }
}
