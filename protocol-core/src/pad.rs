//! Lexical scoping: a name -> value mapping with parent-chained lookup.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use crate::value::Value;

/// A single lexical scope. Child pads hold a shared-owned reference to their
/// parent; destruction happens by refcount collapse once the last continuation
/// referencing a pad exits.
pub struct LexicalPad {
    bindings: Mutex<BTreeMap<String, Value>>,
    parent: Option<Arc<LexicalPad>>,
}

impl LexicalPad {
    pub fn root() -> Arc<LexicalPad> {
        Arc::new(LexicalPad {
            bindings: Mutex::new(BTreeMap::new()),
            parent: None,
        })
    }

    pub fn child(parent: &Arc<LexicalPad>) -> Arc<LexicalPad> {
        Arc::new(LexicalPad {
            bindings: Mutex::new(BTreeMap::new()),
            parent: Some(Arc::clone(parent)),
        })
    }

    /// Walks from this pad up through parents, returning the nearest binding.
    pub fn get(self: &Arc<Self>, name: &str) -> Value {
        let mut pad = self;
        let mut owned;
        loop {
            if let Some(v) = pad.bindings.lock().unwrap().get(name) {
                return v.clone();
            }
            match &pad.parent {
                Some(p) => {
                    owned = Arc::clone(p);
                    pad = &owned;
                }
                None => return Value::name_error(name.to_string()),
            }
        }
    }

    /// Updates the nearest enclosing binding. Fails with `NameError` if the
    /// name is unbound anywhere up the chain.
    pub fn set(self: &Arc<Self>, name: &str, v: Value) -> Value {
        let mut pad = self;
        let mut owned;
        loop {
            {
                let mut b = pad.bindings.lock().unwrap();
                if let Some(slot) = b.get_mut(name) {
                    return std::mem::replace(slot, v);
                }
            }
            match &pad.parent {
                Some(p) => {
                    owned = Arc::clone(p);
                    pad = &owned;
                }
                None => return Value::name_error(name.to_string()),
            }
        }
    }

    /// Creates (or overwrites) a binding in this exact pad, unconditionally.
    pub fn initialize(&self, name: impl Into<String>, v: Value) {
        self.bindings.lock().unwrap().insert(name.into(), v);
    }

    /// Creates the binding in the root pad (the one with no parent).
    pub fn initialize_global(self: &Arc<Self>, name: impl Into<String>, v: Value) {
        let mut pad = self;
        let mut owned;
        loop {
            match &pad.parent {
                Some(p) => {
                    owned = Arc::clone(p);
                    pad = &owned;
                }
                None => {
                    pad.initialize(name, v);
                    return;
                }
            }
        }
    }

    /// Snapshot of this pad's own bindings (not parents) as a `Value::Dictionary`.
    pub fn as_dict(&self) -> Value {
        let b = self.bindings.lock().unwrap();
        let map = b
            .iter()
            .map(|(k, v)| (k.clone().into_bytes(), v.clone()))
            .collect();
        Value::dict(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_walks_parent_chain() {
        let root = LexicalPad::root();
        root.initialize("x", Value::Int32(1));
        let child = LexicalPad::child(&root);
        child.initialize("y", Value::Int32(2));

        assert!(matches!(child.get("y"), Value::Int32(2)));
        assert!(matches!(child.get("x"), Value::Int32(1)));
        assert!(matches!(child.get("z"), Value::Error(_)));
    }

    #[test]
    fn set_requires_existing_binding() {
        let root = LexicalPad::root();
        root.initialize("x", Value::Int32(1));
        let child = LexicalPad::child(&root);

        let prev = child.set("x", Value::Int32(2));
        assert!(matches!(prev, Value::Int32(1)));
        assert!(matches!(root.get("x"), Value::Int32(2)));

        let err = child.set("never_bound", Value::Int32(0));
        assert!(matches!(err, Value::Error(_)));
    }

    #[test]
    fn initialize_shadows_in_current_pad_only() {
        let root = LexicalPad::root();
        root.initialize("x", Value::Int32(1));
        let child = LexicalPad::child(&root);
        child.initialize("x", Value::Int32(99));

        assert!(matches!(child.get("x"), Value::Int32(99)));
        assert!(matches!(root.get("x"), Value::Int32(1)));
    }

    #[test]
    fn initialize_global_reaches_root() {
        let root = LexicalPad::root();
        let mid = LexicalPad::child(&root);
        let leaf = LexicalPad::child(&mid);

        leaf.initialize_global("state", Value::octets("Open"));

        assert!(matches!(root.get("state"), Value::Octets(_)));
        assert!(matches!(mid.get("state"), Value::Octets(_)));
    }
}
