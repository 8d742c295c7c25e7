//! The per-world object registry.
//!
//! Ids are monotonic and never reused; disposing an entry tombstones
//! it for the lifetime of the world so that late-arriving calls fail
//! cleanly instead of racing with id reuse. An inverse identity map
//! de-duplicates registrations: wrapping the same object twice yields
//! the same id, which is what makes a round-tripped handle compare
//! equal to the original.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use tesser_core::{ObjectId, RpcError, WorldId};

use crate::object::RpcTarget;

struct Entry {
    object: Rc<dyn RpcTarget>,
    disposed: Cell<bool>,
}

/// Table of objects owned by one world.
pub(crate) struct Registry {
    entries: RefCell<HashMap<ObjectId, Entry>>,
    by_identity: RefCell<HashMap<usize, ObjectId>>,
    next_id: Cell<u64>,
}

impl Registry {
    pub(crate) fn new() -> Registry {
        Registry {
            entries: RefCell::new(HashMap::new()),
            by_identity: RefCell::new(HashMap::new()),
            next_id: Cell::new(0),
        }
    }

    /// Register `object`, or return its existing id when the same
    /// allocation is already held.
    ///
    /// Handle proxies are rejected; the caller must pass the underlying
    /// object.
    pub(crate) fn register(&self, object: Rc<dyn RpcTarget>) -> Result<ObjectId, RpcError> {
        if object.as_handle().is_some() {
            return Err(RpcError::handle_to_handle());
        }

        let identity = Rc::as_ptr(&object) as *const () as usize;
        if let Some(id) = self.by_identity.borrow().get(&identity) {
            return Ok(*id);
        }

        let id = ObjectId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.entries.borrow_mut().insert(
            id,
            Entry {
                object,
                disposed: Cell::new(false),
            },
        );
        self.by_identity.borrow_mut().insert(identity, id);
        Ok(id)
    }

    /// Resolve `id` to the registered object.
    pub(crate) fn lookup(&self, world: WorldId, id: ObjectId) -> Result<Rc<dyn RpcTarget>, RpcError> {
        match self.entries.borrow().get(&id) {
            None => Err(RpcError::NotFound { world, object: id }),
            Some(entry) if entry.disposed.get() => Err(RpcError::Disposed),
            Some(entry) => Ok(entry.object.clone()),
        }
    }

    /// Tombstone `id`. Further lookups fail with `Disposed`; the id is
    /// never reissued.
    pub(crate) fn dispose(&self, world: WorldId, id: ObjectId) -> Result<(), RpcError> {
        match self.entries.borrow().get(&id) {
            None => Err(RpcError::NotFound { world, object: id }),
            Some(entry) => {
                entry.disposed.set(true);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Object;

    fn target() -> Rc<dyn RpcTarget> {
        Rc::new(Object::new())
    }

    #[test]
    fn test_ids_are_monotonic() {
        let registry = Registry::new();
        let a = registry.register(target()).expect("register");
        let b = registry.register(target()).expect("register");
        assert_eq!(a, ObjectId(0));
        assert_eq!(b, ObjectId(1));
    }

    #[test]
    fn test_register_dedupes_same_object() {
        let registry = Registry::new();
        let obj = target();
        let first = registry.register(obj.clone()).expect("register");
        let second = registry.register(obj).expect("register");
        assert_eq!(first, second);
    }

    #[test]
    fn test_lookup_unknown_id() {
        let registry = Registry::new();
        let err = match registry.lookup(WorldId(0), ObjectId(5)) {
            Ok(_) => panic!("must fail"),
            Err(e) => e,
        };
        assert!(matches!(err, RpcError::NotFound { .. }));
    }

    #[test]
    fn test_dispose_tombstones() {
        let registry = Registry::new();
        let obj = target();
        let id = registry.register(obj.clone()).expect("register");

        registry.dispose(WorldId(0), id).expect("dispose");

        let err = match registry.lookup(WorldId(0), id) {
            Ok(_) => panic!("must fail"),
            Err(e) => e,
        };
        assert_eq!(err.to_string(), "Object has been diposed");

        // The id is retained, so re-registering the same object still
        // resolves to the tombstoned entry rather than a fresh id.
        let again = registry.register(obj).expect("register");
        assert_eq!(again, id);
    }

    #[test]
    fn test_dispose_unknown_id() {
        let registry = Registry::new();
        let err = registry
            .dispose(WorldId(0), ObjectId(9))
            .expect_err("must fail");
        assert!(matches!(err, RpcError::NotFound { .. }));
    }
}
