//! Chained scope records.
//!
//! Every block, call and class body gets a fresh [`Environment`] whose
//! `enclosing` link points at the environment that was active when it was
//! entered.  Environments are shared (`Rc<RefCell<_>>`): the frame that
//! created one and every closure created inside it keep it alive.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use log::debug;

use crate::error::{MochaError, Result};
use crate::token::Token;
use crate::value::Value;

/// Shared handle to an environment.
pub type EnvRef<'a> = Rc<RefCell<Environment<'a>>>;

#[derive(Debug, Default)]
pub struct Environment<'a> {
    values: HashMap<String, Value<'a>>,
    enclosing: Option<EnvRef<'a>>,
}

fn undefined(name: &Token<'_>) -> MochaError {
    MochaError::runtime(name, format!("Undefined variable '{}'.", name.lexeme))
}

impl<'a> Environment<'a> {
    /// The root (global) environment.
    pub fn new() -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: None,
        }
    }

    pub fn with_enclosing(enclosing: EnvRef<'a>) -> Self {
        Environment {
            values: HashMap::new(),
            enclosing: Some(enclosing),
        }
    }

    /// Wrap into a shared handle.
    pub fn into_ref(self) -> EnvRef<'a> {
        Rc::new(RefCell::new(self))
    }

    pub fn enclosing(&self) -> Option<EnvRef<'a>> {
        self.enclosing.clone()
    }

    /// Bind `name` in this scope, replacing any previous binding here.
    pub fn define(&mut self, name: &str, value: Value<'a>) {
        debug!("define '{}' = {}", name, value);

        self.values.insert(name.to_string(), value);
    }

    /// Look `name` up here, then outward.
    pub fn get(&self, name: &Token<'_>) -> Result<Value<'a>> {
        if let Some(value) = self.values.get(name.lexeme) {
            Ok(value.clone())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow().get(name)
        } else {
            Err(undefined(name))
        }
    }

    /// Overwrite the nearest existing binding of `name`.  Never creates one.
    pub fn assign(&mut self, name: &Token<'_>, value: Value<'a>) -> Result<()> {
        if let Some(slot) = self.values.get_mut(name.lexeme) {
            *slot = value;
            Ok(())
        } else if let Some(enclosing) = &self.enclosing {
            enclosing.borrow_mut().assign(name, value)
        } else {
            Err(undefined(name))
        }
    }

    /// The environment exactly `distance` links out from `env`.
    ///
    /// # Panics
    ///
    /// If the chain is shorter than `distance`.  Distances come from the
    /// resolver, so a short chain means resolver and interpreter disagree.
    pub fn ancestor(env: &EnvRef<'a>, distance: usize) -> EnvRef<'a> {
        let mut current: EnvRef<'a> = Rc::clone(env);

        for hop in 0..distance {
            let next = current.borrow().enclosing().unwrap_or_else(|| {
                panic!(
                    "resolved distance {} exceeds environment depth {}",
                    distance, hop
                )
            });
            current = next;
        }

        current
    }

    /// Read `name` directly from the scope `distance` links out.
    pub fn get_at(env: &EnvRef<'a>, distance: usize, name: &str) -> Option<Value<'a>> {
        Self::ancestor(env, distance)
            .borrow()
            .values
            .get(name)
            .cloned()
    }

    /// Write `name` directly into the scope `distance` links out.
    pub fn assign_at(env: &EnvRef<'a>, distance: usize, name: &Token<'_>, value: Value<'a>) {
        Self::ancestor(env, distance)
            .borrow_mut()
            .values
            .insert(name.lexeme.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::TokenType;

    fn ident(name: &str) -> Token<'_> {
        Token::new(TokenType::IDENTIFIER, name, 1)
    }

    #[test]
    fn get_walks_outward_and_define_shadows() {
        let globals = Environment::new().into_ref();
        globals.borrow_mut().define("a", Value::Number(1.0));

        let inner = Environment::with_enclosing(Rc::clone(&globals)).into_ref();
        assert_eq!(inner.borrow().get(&ident("a")).unwrap(), Value::Number(1.0));

        inner.borrow_mut().define("a", Value::Number(2.0));
        assert_eq!(inner.borrow().get(&ident("a")).unwrap(), Value::Number(2.0));
        assert_eq!(globals.borrow().get(&ident("a")).unwrap(), Value::Number(1.0));
    }

    #[test]
    fn assign_never_creates_a_binding() {
        let globals = Environment::new().into_ref();
        let inner = Environment::with_enclosing(Rc::clone(&globals)).into_ref();

        let err = inner
            .borrow_mut()
            .assign(&ident("missing"), Value::Nil)
            .unwrap_err();
        assert_eq!(err.to_string(), "Undefined variable 'missing'.\n[line 1]");
        assert!(globals.borrow().get(&ident("missing")).is_err());
    }

    #[test]
    fn assign_updates_the_nearest_binding() {
        let globals = Environment::new().into_ref();
        globals.borrow_mut().define("a", Value::Number(1.0));
        let inner = Environment::with_enclosing(Rc::clone(&globals)).into_ref();

        inner
            .borrow_mut()
            .assign(&ident("a"), Value::Number(5.0))
            .unwrap();

        assert_eq!(globals.borrow().get(&ident("a")).unwrap(), Value::Number(5.0));
    }

    #[test]
    fn depth_indexed_access() {
        let globals = Environment::new().into_ref();
        globals.borrow_mut().define("x", Value::Bool(true));
        let middle = Environment::with_enclosing(Rc::clone(&globals)).into_ref();
        let inner = Environment::with_enclosing(Rc::clone(&middle)).into_ref();

        assert!(Rc::ptr_eq(&Environment::ancestor(&inner, 2), &globals));
        assert_eq!(Environment::get_at(&inner, 2, "x"), Some(Value::Bool(true)));
        assert_eq!(Environment::get_at(&inner, 1, "x"), None);

        Environment::assign_at(&inner, 2, &ident("x"), Value::Bool(false));
        assert_eq!(globals.borrow().get(&ident("x")).unwrap(), Value::Bool(false));
    }

    #[test]
    #[should_panic(expected = "exceeds environment depth")]
    fn ancestor_past_the_root_panics() {
        let globals = Environment::new().into_ref();
        Environment::ancestor(&globals, 1);
    }
}
