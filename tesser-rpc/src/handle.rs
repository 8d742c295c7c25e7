//! Handle proxies: the dynamic surface exposed to user code.
//!
//! A handle stands in for an object that may live in another world.
//! Invoking any member name performs an RPC; resolution happens at the
//! callee. Handles are canonicalized per world, so two handles that
//! refer to the same `(world, object)` within one world are the same
//! proxy ([`Handle::same`]) and compare equal.

use std::cell::Cell;
use std::fmt;
use std::rc::{Rc, Weak};

use tesser_core::{ObjectId, RpcError, WorldId};

use crate::object::RpcTarget;
use crate::value::{InvokeFuture, Value};
use crate::world::WorldCore;

pub(crate) struct HandleInner {
    world_id: WorldId,
    object_id: ObjectId,
    /// The world this proxy lives in; calls route from here.
    home: Weak<WorldCore>,
    /// Fast-path strong reference, present for same-world handles.
    local: Option<Rc<dyn RpcTarget>>,
    /// Set by `World::dispose`; applies to this proxy everywhere it is
    /// cloned, independent of the owning registry's tombstone.
    disposed: Cell<bool>,
}

/// A proxy for an object, possibly in another world.
///
/// Cloning is cheap and preserves identity: clones of one proxy, and
/// every demarshalled reference to the same object within a world, all
/// share the same underlying state.
#[derive(Clone)]
pub struct Handle {
    inner: Rc<HandleInner>,
}

impl Handle {
    pub(crate) fn new(
        world_id: WorldId,
        object_id: ObjectId,
        home: Weak<WorldCore>,
        local: Option<Rc<dyn RpcTarget>>,
    ) -> Handle {
        Handle {
            inner: Rc::new(HandleInner {
                world_id,
                object_id,
                home,
                local,
                disposed: Cell::new(false),
            }),
        }
    }

    pub(crate) fn from_inner(inner: Rc<HandleInner>) -> Handle {
        Handle { inner }
    }

    pub(crate) fn downgrade(&self) -> Weak<HandleInner> {
        Rc::downgrade(&self.inner)
    }

    pub(crate) fn local(&self) -> Option<Rc<dyn RpcTarget>> {
        self.inner.local.clone()
    }

    pub(crate) fn mark_disposed(&self) {
        self.inner.disposed.set(true);
    }

    /// The world owning the object this handle refers to.
    pub fn world_id(&self) -> WorldId {
        self.inner.world_id
    }

    /// The object's id within the owning world's registry.
    pub fn object_id(&self) -> ObjectId {
        self.inner.object_id
    }

    /// Whether two handles are the same canonical proxy.
    ///
    /// Within one world this is equivalent to `==`; the registry's
    /// de-duplication and the per-world handle cache guarantee it.
    pub fn same(a: &Handle, b: &Handle) -> bool {
        Rc::ptr_eq(&a.inner, &b.inner)
    }

    /// Invoke `member` on the remote object.
    ///
    /// Member names beginning with `_` are rejected here, before
    /// anything is sent. Calls on a disposed handle fail with
    /// `Disposed`; calls on a handle whose owning world has been
    /// disposed never settle (see the world manager for the disposal
    /// model).
    pub async fn call(&self, member: &str, args: Vec<Value>) -> Result<Value, RpcError> {
        if member.starts_with('_') {
            return Err(RpcError::PrivateMember {
                member: member.to_string(),
            });
        }
        if self.inner.disposed.get() {
            return Err(RpcError::Disposed);
        }
        let Some(home) = self.inner.home.upgrade() else {
            // The world this proxy belonged to is gone entirely.
            return Err(RpcError::Disposed);
        };
        home.call_member(self.inner.world_id, self.inner.object_id, member, args)
            .await
    }
}

impl PartialEq for Handle {
    fn eq(&self, other: &Handle) -> bool {
        self.inner.world_id == other.inner.world_id
            && self.inner.object_id == other.inner.object_id
    }
}

impl Eq for Handle {}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Handle({}/{})",
            self.inner.world_id, self.inner.object_id
        )
    }
}

/// A handle is itself a valid call target: invocation forwards through
/// the proxy. This is also how registration detects and rejects
/// attempts to wrap a handle in another handle.
impl RpcTarget for Handle {
    fn invoke(self: Rc<Self>, member: &str, args: Vec<Value>) -> InvokeFuture {
        let handle = (*self).clone();
        let member = member.to_string();
        Box::pin(async move { handle.call(&member, args).await })
    }

    fn as_handle(&self) -> Option<Handle> {
        Some(self.clone())
    }
}
