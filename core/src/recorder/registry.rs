//! Identity registry
//!
//! Assigns a permanent numeric identity to every recorded object the first
//! time it is observed and remembers which scope first exposed it.

use gpurec_shared::{ByteView, HostObject, Surface, object_addr, surface_addr};
use hashbrown::HashMap;
use std::rc::Rc;

use super::Scope;

/// Identity of a recorded object
pub type ObjectId = u32;

/// Key identifying a recorded object instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKey {
    /// A host API object, by allocation address
    Host(usize),
    /// A drawable surface, by allocation address
    Surface(usize),
    /// A byte view instance; clones of a view share it
    View(usize),
}

/// Keeps a registered allocation alive so its address is never reused
/// for a different object during the recording.
pub enum Keepalive {
    Host(Rc<dyn HostObject>),
    Surface(Rc<dyn Surface>),
    View(ByteView),
}

impl Keepalive {
    pub fn key(&self) -> ObjectKey {
        match self {
            Self::Host(obj) => ObjectKey::Host(object_addr(obj)),
            Self::Surface(surface) => ObjectKey::Surface(surface_addr(surface)),
            Self::View(view) => ObjectKey::View(view.instance_addr()),
        }
    }
}

/// A registered object
pub struct Registration {
    pub id: ObjectId,
    /// Scope during which the object was first registered
    pub owner: Scope,
    _keepalive: Keepalive,
}

/// Registry of object identities
#[derive(Default)]
pub struct IdentityRegistry {
    entries: HashMap<ObjectKey, Registration>,
    next_id: ObjectId,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Assign the next identity to `object`, stamped with `owner`.
    ///
    /// Callers check [`IdentityRegistry::has_identity`] first; registering
    /// an object twice replaces its identity.
    pub fn register(&mut self, object: Keepalive, owner: Scope) -> ObjectId {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.insert(
            object.key(),
            Registration {
                id,
                owner,
                _keepalive: object,
            },
        );
        id
    }

    pub fn has_identity(&self, key: &ObjectKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn get(&self, key: &ObjectKey) -> Option<&Registration> {
        self.entries.get(key)
    }

    /// Number of registered objects
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
