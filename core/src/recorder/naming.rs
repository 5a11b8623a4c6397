//! Variable naming and declaration scopes
//!
//! Every registered object is referenced in the replay program through a
//! variable named after its identity. A variable is declared local to the
//! scope (initialization or a single frame) that created it, unless it is
//! referenced from another scope, in which case it moves to the persistent
//! scope declared at the top of the program.

use hashbrown::{HashMap, HashSet};

use super::Scope;
use super::registry::ObjectId;

/// Variable name for an identity
pub fn variable_name(id: ObjectId) -> String {
    format!("x{id}")
}

/// Insertion-ordered set of variable names
#[derive(Debug, Default, Clone)]
pub struct NameSet {
    order: Vec<String>,
    seen: HashSet<String>,
}

impl NameSet {
    pub fn insert(&mut self, name: &str) -> bool {
        if self.seen.contains(name) {
            return false;
        }
        self.seen.insert(name.to_string());
        self.order.push(name.to_string());
        true
    }

    pub fn remove(&mut self, name: &str) -> bool {
        if !self.seen.remove(name) {
            return false;
        }
        self.order.retain(|n| n != name);
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.seen.contains(name)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Names joined for a declaration list, e.g. `x0, x3, x4`
    pub fn join(&self) -> String {
        self.order.join(", ")
    }
}

/// Declaration scopes of the replay program
#[derive(Debug, Default)]
pub struct VariableScopes {
    persistent: NameSet,
    locals: HashMap<Scope, NameSet>,
}

impl VariableScopes {
    pub fn new() -> Self {
        Self::default()
    }

    /// Note a reference to `name`, owned by `owner`, made from `current`.
    ///
    /// Same-scope references declare the name locally. A reference from any
    /// other scope promotes the name to the persistent scope; promotion is
    /// idempotent.
    pub fn reference(&mut self, name: &str, owner: Scope, current: Scope) {
        if self.persistent.contains(name) {
            return;
        }
        if owner == current {
            self.locals.entry(current).or_default().insert(name);
        } else {
            if let Some(owner_locals) = self.locals.get_mut(&owner) {
                owner_locals.remove(name);
            }
            self.persistent.insert(name);
        }
    }

    pub fn persistent(&self) -> &NameSet {
        &self.persistent
    }

    /// Names declared local to `scope`
    pub fn locals(&self, scope: Scope) -> Option<&NameSet> {
        self.locals.get(&scope)
    }

    /// Declaration list for the persistent scope
    pub fn persistent_declarations(&self) -> String {
        self.persistent.join()
    }

    /// Declaration list for a local scope
    pub fn local_declarations(&self, scope: Scope) -> String {
        self.locals
            .get(&scope)
            .map(NameSet::join)
            .unwrap_or_default()
    }
}
