use crate::source::Span;
use crate::types::Value;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;
use thiserror::Error;

// --- Environment Error ---
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EnvError {
    #[error("Unbound variable: '{0}'")]
    UnboundVariable(String, Span), // Name, span where lookup happened
}

// --- Environment Definition ---

/// One scope frame. Frames form a parent-pointer chain: the global scope at
/// the root, then one frame per active call whose parent is the scope the
/// callee captured.
#[derive(Debug)]
pub struct Environment {
    outer: Option<Rc<RefCell<Environment>>>,
    bindings: HashMap<String, Value>,
}

impl Environment {
    /// Creates a new, top-level (global) environment.
    pub fn new() -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Environment {
            outer: None,
            bindings: HashMap::new(),
        }))
    }

    /// Creates a new environment enclosed within an outer one.
    pub fn new_enclosed(outer_env: Rc<RefCell<Environment>>) -> Rc<RefCell<Self>> {
        Rc::new(RefCell::new(Environment {
            outer: Some(outer_env),
            bindings: HashMap::new(),
        }))
    }

    /// Defines a name in the *current* frame, shadowing any outer binding.
    /// Replaces the value if the name already exists in this frame.
    pub fn define(&mut self, name: String, value: Value) {
        self.bindings.insert(name, value);
    }

    /// Looks up a name, walking outward through enclosing frames.
    /// `lookup_span` is where the name was referenced, used for error reporting.
    pub fn get(&self, name: &str, lookup_span: Span) -> Result<Value, EnvError> {
        if let Some(value) = self.bindings.get(name) {
            Ok(value.clone())
        } else {
            match &self.outer {
                Some(outer_env_ptr) => outer_env_ptr.borrow().get(name, lookup_span),
                None => Err(EnvError::UnboundVariable(name.to_string(), lookup_span)),
            }
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
            || self
                .outer
                .as_ref()
                .is_some_and(|outer| outer.borrow().contains(name))
    }

    /// Gets every identifier visible from this frame
    pub fn get_identifiers(&self) -> HashSet<String> {
        let mut identifiers: HashSet<String> = self.bindings.keys().cloned().collect();
        if let Some(outer_env_ptr) = &self.outer {
            identifiers.extend(outer_env_ptr.borrow().get_identifiers());
        }
        identifiers
    }
}

// --- Unit Tests ---
#[cfg(test)]
mod tests {
    use super::*;

    fn int(n: i64) -> Value {
        Value::Integer(n)
    }

    #[test]
    fn test_define_and_get_global() {
        let env = Environment::new();
        env.borrow_mut().define("x".to_string(), int(10));

        let result = env.borrow().get("x", Span::default());
        assert_eq!(result, Ok(int(10)));
    }

    #[test]
    fn test_get_unbound_global() {
        let env = Environment::new();
        let result = env.borrow().get("y", Span::default());
        assert!(matches!(result, Err(EnvError::UnboundVariable(s, _)) if s == "y"));
    }

    #[test]
    fn test_define_and_get_enclosed() {
        let global_env = Environment::new();
        global_env.borrow_mut().define("x".to_string(), int(10));

        let local_env = Environment::new_enclosed(global_env);
        local_env.borrow_mut().define("y".to_string(), int(20));

        assert_eq!(local_env.borrow().get("y", Span::default()), Ok(int(20)));
        assert_eq!(local_env.borrow().get("x", Span::default()), Ok(int(10)));
    }

    #[test]
    fn test_get_unbound_enclosed() {
        let global_env = Environment::new();
        let local_env = Environment::new_enclosed(global_env);

        let span = Span::new(11, 12);
        let result = local_env.borrow().get("z", span);
        assert_eq!(
            result,
            Err(EnvError::UnboundVariable("z".to_string(), span))
        );
    }

    #[test]
    fn test_shadowing() {
        let global_env = Environment::new();
        global_env.borrow_mut().define("x".to_string(), int(10));

        let local_env = Environment::new_enclosed(global_env.clone());
        local_env.borrow_mut().define("x".to_string(), int(50)); // Shadow global x

        let inner_local_env = Environment::new_enclosed(local_env.clone());
        inner_local_env
            .borrow_mut()
            .define("y".to_string(), Value::Boolean(true));

        assert_eq!(
            inner_local_env.borrow().get("x", Span::default()),
            Ok(int(50))
        );
        assert_eq!(
            inner_local_env.borrow().get("y", Span::default()),
            Ok(Value::Boolean(true))
        );
        // The outer frames are untouched
        assert_eq!(local_env.borrow().get("x", Span::default()), Ok(int(50)));
        assert_eq!(global_env.borrow().get("x", Span::default()), Ok(int(10)));
        assert!(!global_env.borrow().contains("y"));
    }

    #[test]
    fn test_enclosed_sees_later_outer_definitions() {
        let global_env = Environment::new();
        let local_env = Environment::new_enclosed(global_env.clone());
        global_env.borrow_mut().define("late".to_string(), int(1));
        assert!(local_env.borrow().contains("late"));
        assert_eq!(local_env.borrow().get("late", Span::default()), Ok(int(1)));
    }

    #[test]
    fn test_get_identifiers() {
        let global_env = Environment::new();
        global_env.borrow_mut().define("a".to_string(), int(1));
        let local_env = Environment::new_enclosed(global_env);
        local_env.borrow_mut().define("b".to_string(), int(2));

        let identifiers = local_env.borrow().get_identifiers();
        let expected: HashSet<String> = ["a", "b"].iter().map(|s| s.to_string()).collect();
        assert_eq!(identifiers, expected);
    }
}
