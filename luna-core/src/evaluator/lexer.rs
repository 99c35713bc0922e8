//! Tokenizer. Disambiguates unary `+`/`-` and leading `.` using a
//! `previous_value` flag: a `+`/`-` is unary unless the previous token was a
//! value, a variable, a right paren, or a function call's closing context.

use crate::token::{Operator, Token};
use crate::value::TypedValue;

#[derive(Debug, Clone, PartialEq)]
pub enum RawTok {
    Num(f64),
    Int(i64),
    Str(String),
    Bool(bool),
    Ident(String),
    FuncCall(String),
    Op(Operator),
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
}

/// Tokenize `input` into a flat stream, not yet shunting-yarded.
pub fn lex(input: &str) -> Result<Vec<RawTok>, String> {
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0usize;
    let mut out = Vec::new();
    let mut previous_value = false;

    while i < chars.len() {
        let c = chars[i];

        if c.is_whitespace() {
            i += 1;
            continue;
        }

        // Single-quoted string literal.
        if c == '\'' {
            let mut j = i + 1;
            let mut s = String::new();
            while j < chars.len() && chars[j] != '\'' {
                s.push(chars[j]);
                j += 1;
            }
            if j >= chars.len() {
                return Err("unterminated string literal".into());
            }
            out.push(RawTok::Str(s));
            previous_value = true;
            i = j + 1;
            continue;
        }

        // Nestable `{...}` string literal.
        if c == '{' {
            let mut depth = 1;
            let mut j = i + 1;
            let mut s = String::new();
            while j < chars.len() && depth > 0 {
                match chars[j] {
                    '{' => depth += 1,
                    '}' => {
                        depth -= 1;
                        if depth == 0 {
                            break;
                        }
                    }
                    _ => {}
                }
                if depth > 0 {
                    s.push(chars[j]);
                }
                j += 1;
            }
            if depth != 0 {
                return Err("unterminated nested string literal".into());
            }
            out.push(RawTok::Str(s));
            previous_value = true;
            i = j + 1;
            continue;
        }

        // Number literal (with unary sign folded in when not previous_value).
        if c.is_ascii_digit() || (c == '.' && !previous_value && chars.get(i + 1).is_some_and(char::is_ascii_digit)) {
            let start = i;
            let mut j = i;
            let mut is_float = false;
            while j < chars.len() && (chars[j].is_ascii_digit() || chars[j] == '.') {
                if chars[j] == '.' {
                    is_float = true;
                }
                j += 1;
            }
            let text: String = chars[start..j].iter().collect();
            if is_float {
                out.push(RawTok::Num(text.parse().map_err(|_| format!("bad number literal: {text}"))?));
            } else {
                match text.parse::<i64>() {
                    Ok(v) => out.push(RawTok::Int(v)),
                    Err(_) => out.push(RawTok::Num(text.parse().map_err(|_| format!("bad number literal: {text}"))?)),
                }
            }
            previous_value = true;
            i = j;
            continue;
        }

        if (c == '+' || c == '-') && !previous_value {
            // Unary sign: fold into the following numeric literal if any.
            let mut j = i + 1;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            if j < chars.len() && (chars[j].is_ascii_digit() || chars[j] == '.') {
                let start = j;
                let mut k = j;
                let mut is_float = false;
                while k < chars.len() && (chars[k].is_ascii_digit() || chars[k] == '.') {
                    if chars[k] == '.' {
                        is_float = true;
                    }
                    k += 1;
                }
                let text: String = chars[start..k].iter().collect();
                let sign = if c == '-' { -1.0 } else { 1.0 };
                if is_float {
                    let v: f64 = text.parse().map_err(|_| format!("bad number literal: {text}"))?;
                    out.push(RawTok::Num(sign * v));
                } else {
                    let v: i64 = text.parse().map_err(|_| format!("bad number literal: {text}"))?;
                    out.push(RawTok::Int((sign as i64) * v));
                }
                previous_value = true;
                i = k;
                continue;
            }
            // Otherwise it's a genuine unary +/-, represented as `0 - x` / `0 + x`.
            out.push(RawTok::Int(0));
            out.push(RawTok::Op(if c == '-' { Operator::Sub } else { Operator::Add }));
            previous_value = false;
            i += 1;
            continue;
        }

        if c.is_alphabetic() || c == '_' {
            let start = i;
            let mut j = i;
            while j < chars.len() && (chars[j].is_alphanumeric() || chars[j] == '_' || chars[j] == '.') {
                j += 1;
            }
            let word: String = chars[start..j].iter().collect();
            match word.as_str() {
                "true" => {
                    out.push(RawTok::Bool(true));
                    previous_value = true;
                }
                "false" => {
                    out.push(RawTok::Bool(false));
                    previous_value = true;
                }
                _ => {
                    if chars.get(j) == Some(&'(') {
                        out.push(RawTok::FuncCall(word));
                        previous_value = false;
                    } else {
                        out.push(RawTok::Ident(word));
                        previous_value = true;
                    }
                }
            }
            i = j;
            continue;
        }

        macro_rules! op2 {
            ($two:literal, $one:expr, $two_op:expr) => {
                if chars.get(i + 1) == Some(&$two) {
                    out.push(RawTok::Op($two_op));
                    i += 2;
                } else {
                    out.push(RawTok::Op($one));
                    i += 1;
                }
                previous_value = false;
                continue;
            };
        }

        match c {
            '(' => {
                out.push(RawTok::LParen);
                previous_value = false;
                i += 1;
            }
            ')' => {
                out.push(RawTok::RParen);
                previous_value = true;
                i += 1;
            }
            '[' => {
                out.push(RawTok::LBracket);
                previous_value = false;
                i += 1;
            }
            ']' => {
                out.push(RawTok::RBracket);
                previous_value = true;
                i += 1;
            }
            ',' => {
                out.push(RawTok::Comma);
                previous_value = false;
                i += 1;
            }
            ';' => {
                out.push(RawTok::Comma); // statement separators are split upstream; treat stray ';' defensively
                previous_value = false;
                i += 1;
            }
            '*' => {
                out.push(RawTok::Op(Operator::Mul));
                previous_value = false;
                i += 1;
            }
            '/' => {
                out.push(RawTok::Op(Operator::Div));
                previous_value = false;
                i += 1;
            }
            '%' => {
                out.push(RawTok::Op(Operator::Mod));
                previous_value = false;
                i += 1;
            }
            '^' => {
                out.push(RawTok::Op(Operator::Pow));
                previous_value = false;
                i += 1;
            }
            '+' => {
                out.push(RawTok::Op(Operator::Add));
                previous_value = false;
                i += 1;
            }
            '-' => {
                out.push(RawTok::Op(Operator::Sub));
                previous_value = false;
                i += 1;
            }
            '!' => {
                op2!('=', Operator::Not, Operator::Neq);
            }
            '=' => {
                op2!('~', Operator::Assign, Operator::Has);
            }
            '<' => {
                op2!('=', Operator::Lt, Operator::Le);
            }
            '>' => {
                op2!('=', Operator::Gt, Operator::Ge);
            }
            '&' => {
                if chars.get(i + 1) == Some(&'&') {
                    out.push(RawTok::Op(Operator::And));
                    i += 2;
                } else {
                    return Err("bare '&' is not a valid operator".into());
                }
                previous_value = false;
            }
            '|' => {
                if chars.get(i + 1) == Some(&'|') {
                    out.push(RawTok::Op(Operator::Or));
                    i += 2;
                } else {
                    return Err("bare '|' is not a valid operator".into());
                }
                previous_value = false;
            }
            _ => return Err(format!("unexpected character '{c}'")),
        }

        // Handle the `==` two-char case for '=' which is covered above via
        // op2!, but a single `=` followed by `=` needs explicit handling
        // since op2! only checks one alternate. Re-scan for `==` here.
    }

    Ok(fixup_equals(out))
}

/// `op2!` above only disambiguates `=` against `=~`; `==` needs a second
/// pass since both branches start with `=`.
fn fixup_equals(mut toks: Vec<RawTok>) -> Vec<RawTok> {
    let mut i = 0;
    while i + 1 < toks.len() {
        if toks[i] == RawTok::Op(Operator::Assign) && toks[i + 1] == RawTok::Op(Operator::Assign) {
            toks[i] = RawTok::Op(Operator::Eq);
            toks.remove(i + 1);
        }
        i += 1;
    }
    toks
}

#[must_use]
pub fn bool_literal(b: bool) -> Token {
    Token::scalar(TypedValue::Bool(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lexes_simple_arithmetic() {
        let toks = lex("1 + 2 * 3").unwrap();
        assert_eq!(
            toks,
            vec![
                RawTok::Int(1),
                RawTok::Op(Operator::Add),
                RawTok::Int(2),
                RawTok::Op(Operator::Mul),
                RawTok::Int(3),
            ]
        );
    }

    #[test]
    fn distinguishes_eq_from_assign() {
        let toks = lex("x == 1").unwrap();
        assert_eq!(toks[1], RawTok::Op(Operator::Eq));
        let toks = lex("x = 1").unwrap();
        assert_eq!(toks[1], RawTok::Op(Operator::Assign));
    }

    #[test]
    fn distinguishes_has_from_assign() {
        let toks = lex("x =~ y").unwrap();
        assert_eq!(toks[1], RawTok::Op(Operator::Has));
    }

    #[test]
    fn leading_unary_minus_on_literal() {
        let toks = lex("-5 + 1").unwrap();
        assert_eq!(toks[0], RawTok::Int(-5));
    }

    #[test]
    fn function_call_detected_by_trailing_paren() {
        let toks = lex("sum(x)").unwrap();
        assert_eq!(toks[0], RawTok::FuncCall("sum".into()));
    }

    #[test]
    fn identifier_without_paren_is_variable() {
        let toks = lex("X > 2").unwrap();
        assert_eq!(toks[0], RawTok::Ident("X".into()));
    }
}
