// ABOUTME: Environment module for managing variable bindings and lexical scopes

use crate::error::RuntimeError;
use crate::value::Value;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug)]
pub struct Environment {
    bindings: RefCell<HashMap<String, Value>>,
    parent: Option<Rc<Environment>>,
}

impl Environment {
    /// Creates a new global environment with no parent
    pub fn new() -> Rc<Self> {
        Rc::new(Environment {
            bindings: RefCell::new(HashMap::new()),
            parent: None,
        })
    }

    /// Creates a new child environment with a parent
    pub fn with_parent(parent: Rc<Environment>) -> Rc<Self> {
        Rc::new(Environment {
            bindings: RefCell::new(HashMap::new()),
            parent: Some(parent),
        })
    }

    /// Defines a binding in THIS scope (doesn't walk parent chain). Redefinition
    /// overwrites silently; duplicate-declaration checking is the resolver's job.
    pub fn define(&self, name: String, value: Value) {
        self.bindings.borrow_mut().insert(name, value);
    }

    /// Looks up a symbol in THIS scope and parent scopes recursively.
    pub fn get(&self, name: &str, line: usize) -> Result<Value, RuntimeError> {
        if let Some(value) = self.bindings.borrow().get(name) {
            return Ok(value.clone());
        }
        if let Some(ref parent) = self.parent {
            return parent.get(name, line);
        }
        Err(RuntimeError::undefined_variable(line, name))
    }

    /// Updates an existing binding. Never implicitly defines.
    pub fn assign(&self, name: &str, value: Value, line: usize) -> Result<(), RuntimeError> {
        if self.bindings.borrow().contains_key(name) {
            self.bindings.borrow_mut().insert(name.to_string(), value);
            return Ok(());
        }
        if let Some(ref parent) = self.parent {
            return parent.assign(name, value, line);
        }
        Err(RuntimeError::undefined_variable(line, name))
    }

    /// Walks the parent chain exactly `distance` hops.
    pub fn ancestor(self: &Rc<Self>, distance: usize) -> Rc<Environment> {
        let mut env = self.clone();
        for _ in 0..distance {
            env = env
                .parent
                .clone()
                .expect("resolver recorded a depth deeper than the live scope chain");
        }
        env
    }

    /// Address a local at a fixed depth, recorded by the resolver. The name is
    /// asserted present: the resolver would not have recorded this depth for
    /// this name unless it found a matching declaration there.
    pub fn get_at(self: &Rc<Self>, distance: usize, name: &str) -> Value {
        self.ancestor(distance)
            .bindings
            .borrow()
            .get(name)
            .cloned()
            .unwrap_or_else(|| panic!("resolver recorded depth {distance} for '{name}' but it isn't bound there"))
    }

    pub fn assign_at(self: &Rc<Self>, distance: usize, name: &str, value: Value) {
        self.ancestor(distance)
            .bindings
            .borrow_mut()
            .insert(name.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_and_get() {
        let env = Environment::new();
        env.define("x".to_string(), Value::Number(42.0));
        assert_eq!(env.get("x", 1).unwrap(), Value::Number(42.0));
    }

    #[test]
    fn undefined_symbol_is_runtime_error() {
        let env = Environment::new();
        assert!(env.get("undefined", 1).is_err());
    }

    #[test]
    fn shadowing_prefers_innermost_scope() {
        let parent = Environment::new();
        parent.define("x".to_string(), Value::Number(42.0));

        let child = Environment::with_parent(parent);
        child.define("x".to_string(), Value::Number(100.0));

        assert_eq!(child.get("x", 1).unwrap(), Value::Number(100.0));
    }

    #[test]
    fn parent_lookup_falls_through() {
        let parent = Environment::new();
        parent.define("x".to_string(), Value::Number(42.0));
        let child = Environment::with_parent(parent);
        assert_eq!(child.get("x", 1).unwrap(), Value::Number(42.0));
    }

    #[test]
    fn multiple_levels_all_visible() {
        let grandparent = Environment::new();
        grandparent.define("a".to_string(), Value::Number(1.0));
        let parent = Environment::with_parent(grandparent);
        parent.define("b".to_string(), Value::Number(2.0));
        let child = Environment::with_parent(parent);
        child.define("c".to_string(), Value::Number(3.0));

        assert_eq!(child.get("a", 1).unwrap(), Value::Number(1.0));
        assert_eq!(child.get("b", 1).unwrap(), Value::Number(2.0));
        assert_eq!(child.get("c", 1).unwrap(), Value::Number(3.0));
    }

    #[test]
    fn ancestor_and_get_at_address_fixed_depth() {
        let grandparent = Environment::new();
        grandparent.define("a".to_string(), Value::Number(1.0));
        let parent = Environment::with_parent(grandparent);
        let child = Environment::with_parent(parent);

        assert_eq!(child.get_at(2, "a"), Value::Number(1.0));
        child.ancestor(2).define("a".to_string(), Value::Number(9.0));
        assert_eq!(child.get_at(2, "a"), Value::Number(9.0));
    }

    #[test]
    fn assign_never_implicitly_defines() {
        let env = Environment::new();
        assert!(env.assign("never_declared", Value::Nil, 1).is_err());
    }
}
