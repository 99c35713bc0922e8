//! Symbol binding: a local instance and an optional global accumulator
//! instance. A `_`-prefixed identifier declared global resolves against the
//! accumulator; everything else resolves against the local instance.
//! Missing symbols bind as `UNDEF`, never a hard error (section 4.4).

use std::collections::HashSet;

use crate::annotation::Instance;
use crate::token::Token;
use crate::value::TypedValue;

pub struct SymbolTable<'a> {
    local: &'a mut Instance,
    global: Option<&'a mut Instance>,
    global_names: HashSet<String>,
}

impl<'a> SymbolTable<'a> {
    #[must_use]
    pub fn new(local: &'a mut Instance, global: Option<&'a mut Instance>, global_names: HashSet<String>) -> Self {
        Self { local, global, global_names }
    }

    fn is_global_eligible(&self, name: &str) -> bool {
        name.starts_with('_') && self.global_names.contains(name)
    }

    /// Look up `name`; returns [`Token::Undef`] if unbound.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Token {
        let value: Option<&TypedValue> = if self.is_global_eligible(name) {
            self.global.as_ref().and_then(|g| g.find(name))
        } else {
            self.local.find(name)
        };
        match value {
            Some(v) if v.is_vector() => Token::vector(v.clone()),
            Some(v) => Token::scalar(v.clone()),
            None => Token::Undef,
        }
    }

    /// Write `name = value`. LHS must not contain `.` (no mutation of
    /// dotted instance fields) — the RPN executor's assignment handler
    /// rejects a dotted name before this is ever called.
    pub fn assign(&mut self, name: &str, value: TypedValue) {
        if self.is_global_eligible(name) {
            if let Some(g) = self.global.as_mut() {
                g.set(name.to_string(), value);
                return;
            }
        }
        self.local.set(name.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbound_symbol_is_undef() {
        let mut local = Instance::new();
        let table = SymbolTable::new(&mut local, None, HashSet::new());
        assert!(table.lookup("missing").is_undef());
    }

    #[test]
    fn local_assignment_roundtrip() {
        let mut local = Instance::new();
        let mut table = SymbolTable::new(&mut local, None, HashSet::new());
        table.assign("x", TypedValue::Int(5));
        assert_eq!(table.lookup("x"), Token::scalar(TypedValue::Int(5)));
    }

    #[test]
    fn global_prefixed_name_binds_to_accumulator() {
        let mut local = Instance::new();
        let mut global = Instance::new();
        let mut names = HashSet::new();
        names.insert("_acc".to_string());
        let mut table = SymbolTable::new(&mut local, Some(&mut global), names);
        table.assign("_acc", TypedValue::Int(42));
        assert_eq!(table.lookup("_acc"), Token::scalar(TypedValue::Int(42)));
        assert!(local.find("_acc").is_none());
    }
}
