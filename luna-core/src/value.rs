//! `TypedValue` ("avar"): the tagged union of scalar/vector metadata values
//! that an [`crate::annotation::Instance`] attaches to a name, and that the
//! evaluator's [`crate::token::Token`] wraps for expression use.
//!
//! The original implementation models this as a small class hierarchy
//! (`avar_t` abstract base, one concrete subclass per scalar/vector kind).
//! A single tagged enum is the idiomatic Rust equivalent; every accessor the
//! original exposes on the base class is kept here as an inherent method.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeTag {
    Flag,
    Mask,
    Bool,
    Int,
    Dbl,
    Txt,
    BoolVec,
    IntVec,
    DblVec,
    TxtVec,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TypedValue {
    /// A valueless presence marker ("this instance has this field").
    Flag,
    /// A masked boolean: carries a value but may be excluded from vector
    /// assignment targets (see the masked-vector assignment shape).
    Mask(bool),
    Bool(bool),
    Int(i64),
    Dbl(f64),
    Txt(String),
    BoolVec(Vec<bool>),
    IntVec(Vec<i64>),
    DblVec(Vec<f64>),
    TxtVec(Vec<String>),
}

impl TypedValue {
    #[must_use]
    pub fn type_tag(&self) -> TypeTag {
        match self {
            TypedValue::Flag => TypeTag::Flag,
            TypedValue::Mask(_) => TypeTag::Mask,
            TypedValue::Bool(_) => TypeTag::Bool,
            TypedValue::Int(_) => TypeTag::Int,
            TypedValue::Dbl(_) => TypeTag::Dbl,
            TypedValue::Txt(_) => TypeTag::Txt,
            TypedValue::BoolVec(_) => TypeTag::BoolVec,
            TypedValue::IntVec(_) => TypeTag::IntVec,
            TypedValue::DblVec(_) => TypeTag::DblVec,
            TypedValue::TxtVec(_) => TypeTag::TxtVec,
        }
    }

    /// Every `TypedValue` "has a value" except the bare flag marker, which
    /// records presence only.
    #[must_use]
    pub fn has_value(&self) -> bool {
        !matches!(self, TypedValue::Flag)
    }

    #[must_use]
    pub fn is_vector(&self) -> bool {
        matches!(
            self,
            TypedValue::BoolVec(_) | TypedValue::IntVec(_) | TypedValue::DblVec(_) | TypedValue::TxtVec(_)
        )
    }

    #[must_use]
    pub fn size(&self) -> usize {
        match self {
            TypedValue::BoolVec(v) => v.len(),
            TypedValue::IntVec(v) => v.len(),
            TypedValue::DblVec(v) => v.len(),
            TypedValue::TxtVec(v) => v.len(),
            TypedValue::Flag => 0,
            _ => 1,
        }
    }

    // -- lossy scalar projections -----------------------------------------

    #[must_use]
    pub fn bool_value(&self) -> bool {
        match self {
            TypedValue::Flag => true,
            TypedValue::Mask(b) | TypedValue::Bool(b) => *b,
            TypedValue::Int(i) => *i != 0,
            TypedValue::Dbl(d) => *d != 0.0,
            TypedValue::Txt(s) => !s.is_empty() && s != "0" && s.to_lowercase() != "false",
            TypedValue::BoolVec(v) => v.first().copied().unwrap_or(false),
            TypedValue::IntVec(v) => v.first().map(|i| *i != 0).unwrap_or(false),
            TypedValue::DblVec(v) => v.first().map(|d| *d != 0.0).unwrap_or(false),
            TypedValue::TxtVec(v) => v.first().map(|s| !s.is_empty()).unwrap_or(false),
        }
    }

    #[must_use]
    pub fn int_value(&self) -> i64 {
        match self {
            TypedValue::Flag => 1,
            TypedValue::Mask(b) | TypedValue::Bool(b) => i64::from(*b),
            TypedValue::Int(i) => *i,
            TypedValue::Dbl(d) => *d as i64,
            TypedValue::Txt(s) => s.parse().unwrap_or(0),
            TypedValue::BoolVec(v) => v.first().map(|b| i64::from(*b)).unwrap_or(0),
            TypedValue::IntVec(v) => v.first().copied().unwrap_or(0),
            TypedValue::DblVec(v) => v.first().map(|d| *d as i64).unwrap_or(0),
            TypedValue::TxtVec(v) => v.first().and_then(|s| s.parse().ok()).unwrap_or(0),
        }
    }

    #[must_use]
    pub fn double_value(&self) -> f64 {
        match self {
            TypedValue::Flag => 1.0,
            TypedValue::Mask(b) | TypedValue::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            TypedValue::Int(i) => *i as f64,
            TypedValue::Dbl(d) => *d,
            TypedValue::Txt(s) => s.parse().unwrap_or(f64::NAN),
            TypedValue::BoolVec(v) => v.first().map(|b| if *b { 1.0 } else { 0.0 }).unwrap_or(0.0),
            TypedValue::IntVec(v) => v.first().map(|i| *i as f64).unwrap_or(0.0),
            TypedValue::DblVec(v) => v.first().copied().unwrap_or(0.0),
            TypedValue::TxtVec(v) => v.first().and_then(|s| s.parse().ok()).unwrap_or(0.0),
        }
    }

    #[must_use]
    pub fn text_value(&self) -> String {
        match self {
            TypedValue::Flag => String::new(),
            TypedValue::Mask(b) | TypedValue::Bool(b) => b.to_string(),
            TypedValue::Int(i) => i.to_string(),
            TypedValue::Dbl(d) => d.to_string(),
            TypedValue::Txt(s) => s.clone(),
            TypedValue::BoolVec(v) => v.iter().map(bool::to_string).collect::<Vec<_>>().join(","),
            TypedValue::IntVec(v) => v.iter().map(i64::to_string).collect::<Vec<_>>().join(","),
            TypedValue::DblVec(v) => v.iter().map(f64::to_string).collect::<Vec<_>>().join(","),
            TypedValue::TxtVec(v) => v.join(","),
        }
    }

    // -- lossy vector projections -------------------------------------------

    #[must_use]
    pub fn bool_vector(&self) -> Vec<bool> {
        match self {
            TypedValue::BoolVec(v) => v.clone(),
            TypedValue::IntVec(v) => v.iter().map(|i| *i != 0).collect(),
            TypedValue::DblVec(v) => v.iter().map(|d| *d != 0.0).collect(),
            TypedValue::TxtVec(v) => v.iter().map(|s| !s.is_empty()).collect(),
            other => vec![other.bool_value()],
        }
    }

    #[must_use]
    pub fn int_vector(&self) -> Vec<i64> {
        match self {
            TypedValue::BoolVec(v) => v.iter().map(|b| i64::from(*b)).collect(),
            TypedValue::IntVec(v) => v.clone(),
            TypedValue::DblVec(v) => v.iter().map(|d| *d as i64).collect(),
            TypedValue::TxtVec(v) => v.iter().map(|s| s.parse().unwrap_or(0)).collect(),
            other => vec![other.int_value()],
        }
    }

    #[must_use]
    pub fn double_vector(&self) -> Vec<f64> {
        match self {
            TypedValue::BoolVec(v) => v.iter().map(|b| if *b { 1.0 } else { 0.0 }).collect(),
            TypedValue::IntVec(v) => v.iter().map(|i| *i as f64).collect(),
            TypedValue::DblVec(v) => v.clone(),
            TypedValue::TxtVec(v) => v.iter().map(|s| s.parse().unwrap_or(f64::NAN)).collect(),
            other => vec![other.double_value()],
        }
    }

    #[must_use]
    pub fn text_vector(&self) -> Vec<String> {
        match self {
            TypedValue::BoolVec(v) => v.iter().map(bool::to_string).collect(),
            TypedValue::IntVec(v) => v.iter().map(i64::to_string).collect(),
            TypedValue::DblVec(v) => v.iter().map(f64::to_string).collect(),
            TypedValue::TxtVec(v) => v.clone(),
            other => vec![other.text_value()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_promotion_to_vector() {
        let v = TypedValue::Int(3);
        assert_eq!(v.double_vector(), vec![3.0]);
    }

    #[test]
    fn flag_has_no_value() {
        assert!(!TypedValue::Flag.has_value());
        assert!(TypedValue::Bool(false).has_value());
    }

    #[test]
    fn vector_cross_casts_are_elementwise() {
        let v = TypedValue::IntVec(vec![0, 1, 2]);
        assert_eq!(v.bool_vector(), vec![false, true, true]);
        assert_eq!(v.double_vector(), vec![0.0, 1.0, 2.0]);
    }

    #[test]
    fn size_of_scalar_is_one() {
        assert_eq!(TypedValue::Bool(true).size(), 1);
        assert_eq!(TypedValue::Flag.size(), 0);
        assert_eq!(TypedValue::IntVec(vec![1, 2, 3]).size(), 3);
    }
}
