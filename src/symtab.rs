//! The symbol-table engine shared, as two independent instances, by the
//! type checker and the interpreter (§3/§4.3/§4.4).
//!
//! Each environment is a node in an arena with a parent pointer; the table
//! tracks a single "current" environment id. Scoping is LIFO by default
//! (`enter_scope`/`exit_scope`), except that a function invocation may
//! [`SymbolTable::enter_global`] to jump the current pointer straight to
//! the global environment before pushing the callee's frame, and later
//! restore the caller's id verbatim — the one non-LIFO operation the
//! language's scoping rules require (§5).

use std::collections::HashMap;

pub type EnvId = usize;

struct Environment<B> {
    parent: Option<EnvId>,
    bindings: HashMap<String, B>,
}

pub struct SymbolTable<B> {
    environments: Vec<Environment<B>>,
    current: EnvId,
}

impl<B> SymbolTable<B> {
    pub fn new() -> Self {
        SymbolTable {
            environments: vec![Environment {
                parent: None,
                bindings: HashMap::new(),
            }],
            current: 0,
        }
    }

    pub fn global(&self) -> EnvId {
        0
    }

    pub fn current(&self) -> EnvId {
        self.current
    }

    /// Create a new environment whose parent is the current one, and make
    /// it current. Returns the new environment's id.
    pub fn enter_scope(&mut self) -> EnvId {
        let id = self.environments.len();
        self.environments.push(Environment {
            parent: Some(self.current),
            bindings: HashMap::new(),
        });
        self.current = id;
        id
    }

    /// Leave the current environment, freeing its bindings and moving
    /// `current` back to its parent (or leaving it at the global
    /// environment if called at the top level).
    pub fn exit_scope(&mut self) {
        let parent = self.environments[self.current].parent;
        self.environments[self.current].bindings.clear();
        if let Some(parent) = parent {
            self.current = parent;
        }
    }

    /// Jump `current` directly to `id`, returning the previous value so the
    /// caller can restore it later. Used by function invocation to enter
    /// the global environment's scope chain regardless of the caller's
    /// actual lexical position.
    pub fn jump(&mut self, id: EnvId) -> EnvId {
        let previous = self.current;
        self.current = id;
        previous
    }

    pub fn enter_global(&mut self) -> EnvId {
        self.jump(self.global())
    }

    /// Bind `name` in the innermost (current) frame only.
    pub fn define(&mut self, name: impl Into<String>, binding: B) {
        self.environments[self.current]
            .bindings
            .insert(name.into(), binding);
    }

    /// Walk outward from the current environment, returning the nearest
    /// binding for `name`.
    pub fn lookup(&self, name: &str) -> Option<&B> {
        let mut env = Some(self.current);
        while let Some(id) = env {
            if let Some(binding) = self.environments[id].bindings.get(name) {
                return Some(binding);
            }
            env = self.environments[id].parent;
        }
        None
    }

    /// Like [`Self::lookup`], but updates the binding in whichever
    /// environment owns it (used for reassigning an existing variable).
    pub fn assign(&mut self, name: &str, binding: B) -> bool {
        let mut env = Some(self.current);
        while let Some(id) = env {
            if let Some(slot) = self.environments[id].bindings.get_mut(name) {
                *slot = binding;
                return true;
            }
            env = self.environments[id].parent;
        }
        false
    }

    /// True when `name` is bound in the current frame specifically (used to
    /// detect illegal shadowing within one scope).
    pub fn defined_in_current(&self, name: &str) -> bool {
        self.environments[self.current].bindings.contains_key(name)
    }
}

impl<B> Default for SymbolTable<B> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_walks_outward() {
        let mut table: SymbolTable<i32> = SymbolTable::new();
        table.define("x", 1);
        table.enter_scope();
        table.define("y", 2);
        assert_eq!(table.lookup("x"), Some(&1));
        assert_eq!(table.lookup("y"), Some(&2));
        table.exit_scope();
        assert_eq!(table.lookup("y"), None);
        assert_eq!(table.lookup("x"), Some(&1));
    }

    #[test]
    fn shadow_detection_is_current_frame_only() {
        let mut table: SymbolTable<i32> = SymbolTable::new();
        table.define("x", 1);
        assert!(table.defined_in_current("x"));
        table.enter_scope();
        assert!(!table.defined_in_current("x"));
    }

    #[test]
    fn jump_and_restore_is_non_lifo() {
        let mut table: SymbolTable<i32> = SymbolTable::new();
        table.define("g", 0);
        let caller = table.enter_scope();
        table.define("local", 1);
        let saved = table.enter_global();
        let callee = table.enter_scope();
        table.define("param", 2);
        assert_eq!(table.lookup("g"), Some(&0));
        assert_eq!(table.lookup("local"), None);
        assert_eq!(table.current(), callee);
        table.exit_scope();
        table.jump(saved);
        assert_eq!(table.current(), caller);
        assert_eq!(table.lookup("local"), Some(&1));
    }

    #[test]
    fn assign_updates_owning_environment() {
        let mut table: SymbolTable<i32> = SymbolTable::new();
        table.define("x", 1);
        table.enter_scope();
        assert!(table.assign("x", 42));
        table.exit_scope();
        assert_eq!(table.lookup("x"), Some(&42));
    }
}
