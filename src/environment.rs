use crate::error::{Error, Result};
use crate::runtime::Value;
use std::{cell::RefCell, collections::HashMap, rc::Rc};

#[derive(Default)]
struct Frame {
    bindings: HashMap<String, Value>,
    parent: Option<Environment>,
}

/// A handle to one frame of the scope chain.
///
/// Cloning the handle shares the frame, it does not copy it: a closure that
/// captured this environment sees every later `define` made through any other
/// handle to the same frame.
#[derive(Clone, Default)]
pub struct Environment {
    frame: Rc<RefCell<Frame>>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty child frame whose parent is this one.
    pub fn extend(&self) -> Environment {
        Environment {
            frame: Rc::new(RefCell::new(Frame {
                bindings: HashMap::new(),
                parent: Some(self.clone()),
            })),
        }
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        let frame = self.frame.borrow();
        match frame.bindings.get(name) {
            Some(value) => Some(value.clone()),
            None => frame.parent.as_ref().and_then(|parent| parent.get(name)),
        }
    }

    pub fn lookup(&self, name: &str) -> Result<Value> {
        self.get(name).ok_or_else(|| Error::UnboundSymbol {
            name: name.to_string(),
        })
    }

    /// Binds `name` in this frame only, shadowing any outer binding.
    pub fn define(&self, name: impl Into<String>, value: Value) {
        self.frame.borrow_mut().bindings.insert(name.into(), value);
    }

    #[cfg(test)]
    pub fn is_defined_locally(&self, name: &str) -> bool {
        self.frame.borrow().bindings.contains_key(name)
    }

    #[cfg(test)]
    pub fn same_frame(&self, other: &Environment) -> bool {
        Rc::ptr_eq(&self.frame, &other.frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Number;

    fn int(n: i64) -> Value {
        Value::Number(Number::Integer(n))
    }

    #[test]
    fn test_lookup_walks_outward() -> Result<()> {
        let global = Environment::new();
        global.define("x", int(1));
        global.define("y", int(2));

        let child = global.extend();
        child.define("x", int(10));

        assert_eq!(child.lookup("x")?, int(10));
        assert_eq!(child.lookup("y")?, int(2));
        assert_eq!(global.lookup("x")?, int(1));
        Ok(())
    }

    #[test]
    fn test_define_touches_only_current_frame() {
        let global = Environment::new();
        let child = global.extend();
        child.define("z", int(3));

        assert!(child.is_defined_locally("z"));
        assert!(!global.is_defined_locally("z"));
        assert!(global.get("z").is_none());
    }

    #[test]
    fn test_unbound_symbol() {
        let env = Environment::new();
        assert!(matches!(
            env.lookup("missing"),
            Err(Error::UnboundSymbol { name }) if name == "missing"
        ));
    }

    #[test]
    fn test_shared_frames_alias() -> Result<()> {
        let global = Environment::new();
        let first = global.extend();
        let second = global.extend();

        // Bound after both children exist, still visible to both
        global.define("shared", int(7));
        assert_eq!(first.lookup("shared")?, int(7));
        assert_eq!(second.lookup("shared")?, int(7));

        let alias = first.clone();
        alias.define("local", int(1));
        assert_eq!(first.lookup("local")?, int(1));
        assert!(first.same_frame(&alias));
        assert!(!first.same_frame(&second));
        Ok(())
    }
}
