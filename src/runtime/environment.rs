use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use super::value::Value;

/// One frame of variable bindings
/// Frames are shared: the block or call that opened one holds it, and so does every closure created while it was
/// current, so a frame lives as long as its longest holder. The parent link is fixed at creation
#[derive(Debug, Default)]
pub struct Environment {
    values: RefCell<HashMap<String, Value>>,
    enclosing: Option<Rc<Environment>>,
}

impl Environment {
    pub fn new_global() -> Rc<Environment> {
        Rc::new(Environment::default())
    }

    /// A fresh empty frame whose parent is this one
    pub fn open_scope(self: &Rc<Self>) -> Rc<Environment> {
        Rc::new(Environment {
            values: RefCell::new(HashMap::new()),
            enclosing: Some(self.clone()),
        })
    }

    /// Bind in this frame, replacing any previous binding of the same name
    pub fn define(&self, name: &str, value: Value) {
        self.values.borrow_mut().insert(name.to_string(), value);
    }

    /// Look a name up, walking outwards until a frame has it
    pub fn get(&self, name: &str) -> Option<Value> {
        let mut env = self;
        loop {
            if let Some(value) = env.values.borrow().get(name) {
                return Some(value.clone());
            }
            env = env.enclosing.as_deref()?;
        }
    }

    /// Assign to the nearest frame that binds the name
    /// Returns false if no frame on the chain does
    #[must_use]
    pub fn assign(&self, name: &str, value: Value) -> bool {
        let mut env = self;
        loop {
            if let Some(slot) = env.values.borrow_mut().get_mut(name) {
                *slot = value;
                return true;
            }
            match env.enclosing.as_deref() {
                Some(parent) => env = parent,
                None => return false,
            }
        }
    }

    fn ancestor(&self, distance: usize) -> Option<&Environment> {
        let mut env = self;
        for _ in 0..distance {
            env = env.enclosing.as_deref()?;
        }
        Some(env)
    }

    /// Look a name up in exactly the frame `distance` parents away, without searching
    pub fn get_at(&self, distance: usize, name: &str) -> Option<Value> {
        self.ancestor(distance)?.values.borrow().get(name).cloned()
    }

    /// Assign in exactly the frame `distance` parents away
    /// Returns false if that frame doesn't exist
    #[must_use]
    pub fn assign_at(&self, distance: usize, name: &str, value: Value) -> bool {
        match self.ancestor(distance) {
            Some(env) => {
                env.values.borrow_mut().insert(name.to_string(), value);
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn define_overwrites_in_same_frame() {
        let global = Environment::new_global();
        global.define("a", Value::Number(1.0));
        global.define("a", Value::Number(2.0));
        assert_eq!(Some(Value::Number(2.0)), global.get("a"));
    }

    #[test]
    fn lookups_walk_outwards() {
        let global = Environment::new_global();
        global.define("a", Value::Number(1.0));
        let block = global.open_scope();
        let inner = block.open_scope();
        assert_eq!(Some(Value::Number(1.0)), inner.get("a"));
        assert_eq!(None, inner.get("b"));
    }

    #[test]
    fn shadowing_leaves_outer_binding_alone() {
        let global = Environment::new_global();
        global.define("a", Value::Number(1.0));
        let block = global.open_scope();
        block.define("a", Value::Number(2.0));
        assert!(block.assign("a", Value::Number(3.0)));
        assert_eq!(Some(Value::Number(3.0)), block.get("a"));
        assert_eq!(Some(Value::Number(1.0)), global.get("a"));
    }

    #[test]
    fn assign_to_unbound_name_fails() {
        let global = Environment::new_global();
        let block = global.open_scope();
        assert!(!block.assign("missing", Value::Nil));
        assert_eq!(None, global.get("missing"));
    }

    #[test]
    fn resolved_access_skips_nearer_frames() {
        let global = Environment::new_global();
        global.define("a", Value::Number(1.0));
        let block = global.open_scope();
        block.define("a", Value::Number(2.0));
        let inner = block.open_scope();
        assert_eq!(Some(Value::Number(1.0)), inner.get_at(2, "a"));
        assert_eq!(Some(Value::Number(2.0)), inner.get_at(1, "a"));
        assert_eq!(None, inner.get_at(0, "a"));
        assert!(inner.assign_at(2, "a", Value::Bool(true)));
        assert_eq!(Some(Value::Bool(true)), global.get("a"));
        assert!(!inner.assign_at(5, "a", Value::Nil));
    }

    #[test]
    fn frames_outlive_their_opener_when_shared() {
        let global = Environment::new_global();
        let captured = {
            let block = global.open_scope();
            block.define("count", Value::Number(0.0));
            block
        };
        assert!(captured.assign("count", Value::Number(1.0)));
        assert_eq!(Some(Value::Number(1.0)), captured.get("count"));
    }
}
