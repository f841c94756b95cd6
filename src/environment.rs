use std::{cell::RefCell, rc::Rc};

use indexmap::IndexMap;

use crate::value::Value;

pub type EnvironmentRef = Rc<RefCell<Environment>>;

/// One frame in the lexical chain. The bottom frame of a module is mutable
/// for its whole life (`let NAME = …` statements and `del` rewrite it in
/// place, which is what makes top-level rebinding visible to captured
/// closures); inner frames are filled once when pushed and never touched
/// again.
#[derive(Debug, Default)]
pub struct Environment {
    parent: Option<EnvironmentRef>,
    bindings: IndexMap<String, Value>,
}

impl Environment {
    pub fn new() -> EnvironmentRef {
        Rc::new(RefCell::new(Self {
            parent: None,
            bindings: IndexMap::new(),
        }))
    }

    pub fn with_parent(parent: EnvironmentRef) -> EnvironmentRef {
        Rc::new(RefCell::new(Self {
            parent: Some(parent),
            bindings: IndexMap::new(),
        }))
    }

    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.bindings.insert(name.into(), value);
    }

    /// Remove a binding from this frame only. Returns false when the name was
    /// never bound here.
    pub fn remove(&mut self, name: &str) -> bool {
        self.bindings.shift_remove(name).is_some()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Walk child → parent; the first hit wins.
    pub fn lookup(env: &EnvironmentRef, name: &str) -> Option<Value> {
        if let Some(value) = env.borrow().bindings.get(name) {
            return Some(value.clone());
        }
        let parent = env.borrow().parent.clone();
        parent.and_then(|parent| Environment::lookup(&parent, name))
    }

    /// Snapshot of the bindings in this single frame, used for module export
    /// tables.
    pub fn snapshot(env: &EnvironmentRef) -> IndexMap<String, Value> {
        env.borrow().bindings.clone()
    }
}
