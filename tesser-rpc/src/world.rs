//! World lifecycle, message dispatch, and the routing mesh.
//!
//! A world is an isolated execution context: its own registry, its own
//! dispatcher, and a link to every peer it talks to directly. Worlds
//! only ever communicate with direct peers; a call aimed at a world
//! reached through an intermediary is relayed hop by hop, with each
//! hop re-numbering the call into its own sequence space. Routes are
//! learned by introduction: the first link a world's id arrives on is
//! the link calls to that world leave through.
//!
//! # Disposal model
//!
//! Disposal is the only cancellation primitive, and it is asymmetric:
//!
//! - `dispose(handle)` tombstones one object; calls on it reject with
//!   `Disposed`.
//! - `dispose_world(id)` severs a peer: pending calls targeting it
//!   reject with `PeerDisposed`, and new calls on its handles never
//!   settle, because nothing is sent and nothing will answer. Calls it
//!   already delivered here run to completion and their responses are
//!   dropped on the dead link.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use tesser_core::{Message, ObjectId, RpcError, WireRef, WireValue, WorldId};
use tokio::sync::oneshot;

use crate::dispatch::Dispatcher;
use crate::handle::{Handle, HandleInner};
use crate::marshal;
use crate::object::RpcTarget;
use crate::registry::Registry;
use crate::transport::{MessageSink, TransportFactory};
use crate::value::{InvokeFuture, Value};

/// Process-wide world id allocator.
///
/// The root takes id 0; every world spawned in this process draws from
/// this counter, so ids minted here never collide. Ids observed from
/// other processes advance the counter past themselves, which keeps
/// tree topologies collision-free.
static NEXT_WORLD_ID: AtomicU64 = AtomicU64::new(1);

/// Placeholder id carried by a child between `init_world` and the
/// arrival of its `CreateWorld` bootstrap.
const UNASSIGNED_WORLD_ID: WorldId = WorldId(u64::MAX);

fn alloc_world_id() -> WorldId {
    WorldId(NEXT_WORLD_ID.fetch_add(1, Ordering::Relaxed))
}

fn observe_world_id(id: WorldId) {
    NEXT_WORLD_ID.fetch_max(id.0.saturating_add(1), Ordering::Relaxed);
}

/// Tunables for a world.
#[derive(Debug, Clone)]
pub struct WorldConfig {
    /// Maximum composite nesting depth the marshaller accepts before
    /// failing with `RefChainTooLong`. The default, 20, is the value
    /// callers may rely on.
    pub max_ref_depth: usize,
}

impl Default for WorldConfig {
    fn default() -> WorldConfig {
        WorldConfig {
            max_ref_depth: marshal::MAX_REF_DEPTH,
        }
    }
}

impl WorldConfig {
    /// A config with a custom marshalling depth cap.
    pub fn with_max_ref_depth(max_ref_depth: usize) -> WorldConfig {
        WorldConfig { max_ref_depth }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct LinkId(u64);

struct Link {
    send: MessageSink,
    alive: Cell<bool>,
    /// The world at the other end, once known. Routes to other worlds
    /// may share this link; only the direct peer's disposal kills it.
    peer: Cell<Option<WorldId>>,
}

struct RelayEntry {
    origin_link: LinkId,
    origin_seq: u64,
}

struct InitState {
    initializer: Box<dyn FnOnce(Handle, World)>,
    ready: oneshot::Sender<()>,
}

pub(crate) struct WorldCore {
    weak: Weak<WorldCore>,
    id: Cell<WorldId>,
    config: WorldConfig,
    registry: Registry,
    dispatcher: Dispatcher,
    links: RefCell<HashMap<LinkId, Link>>,
    next_link: Cell<u64>,
    routes: RefCell<HashMap<WorldId, LinkId>>,
    handles: RefCell<HashMap<(WorldId, ObjectId), Weak<HandleInner>>>,
    disposed_worlds: RefCell<HashSet<WorldId>>,
    ready_waiters: RefCell<HashMap<WorldId, oneshot::Sender<()>>>,
    relays: RefCell<HashMap<u64, RelayEntry>>,
    world_args: RefCell<Vec<Value>>,
    user_root: RefCell<Option<Rc<dyn RpcTarget>>>,
    pending_init: RefCell<Option<InitState>>,
}

/// An isolated execution context participating in the RPC fabric.
///
/// Cloning is cheap; clones share the same underlying world. A world
/// must run on a single-threaded executor inside a tokio `LocalSet`,
/// which is where inbound calls and transport pumps are spawned.
#[derive(Clone)]
pub struct World {
    core: Rc<WorldCore>,
}

impl World {
    fn new(id: WorldId, config: WorldConfig) -> World {
        let core = Rc::new_cyclic(|weak: &Weak<WorldCore>| WorldCore {
            weak: weak.clone(),
            id: Cell::new(id),
            config,
            registry: Registry::new(),
            dispatcher: Dispatcher::new(),
            links: RefCell::new(HashMap::new()),
            next_link: Cell::new(0),
            routes: RefCell::new(HashMap::new()),
            handles: RefCell::new(HashMap::new()),
            disposed_worlds: RefCell::new(HashSet::new()),
            ready_waiters: RefCell::new(HashMap::new()),
            relays: RefCell::new(HashMap::new()),
            world_args: RefCell::new(Vec::new()),
            user_root: RefCell::new(None),
            pending_init: RefCell::new(None),
        });
        let root: Rc<dyn RpcTarget> = Rc::new(WorldRoot {
            core: core.weak.clone(),
        });
        if core.registry.register(root).is_err() {
            unreachable!("a fresh registry cannot reject the root object");
        }
        World { core }
    }

    /// Create the root world, id 0.
    pub fn init_root() -> World {
        World::new(WorldId::ROOT, WorldConfig::default())
    }

    /// Create the root world with explicit tunables.
    pub fn init_root_with(config: WorldConfig) -> World {
        World::new(WorldId::ROOT, config)
    }

    /// This world's id.
    ///
    /// For a child this is only meaningful once `init_world` has
    /// returned.
    pub fn id(&self) -> WorldId {
        self.core.id.get()
    }

    /// Wrap a local object into a handle, registering it in this
    /// world's registry.
    ///
    /// Wrapping the same object twice yields the same handle. Wrapping
    /// a handle fails with `InvalidInput`; handles are never
    /// double-wrapped.
    pub fn handle(&self, object: Rc<dyn RpcTarget>) -> Result<Handle, RpcError> {
        let id = self.core.registry.register(object.clone())?;
        Ok(self.core.local_handle(id, object))
    }

    /// Materialize the object behind a handle owned by this world.
    pub fn object(&self, handle: &Handle) -> Result<Rc<dyn RpcTarget>, RpcError> {
        if handle.world_id() != self.core.id.get() {
            return Err(RpcError::invalid_input(
                "Can not materialize a handle owned by another world",
            ));
        }
        // The registry enforces tombstones and unknown ids; same-world
        // handles then materialize through their own strong reference.
        let object = self
            .core
            .registry
            .lookup(handle.world_id(), handle.object_id())?;
        Ok(handle.local().unwrap_or(object))
    }

    /// Dispose a handle. Subsequent calls on it fail with `Disposed`.
    ///
    /// For a handle owned by this world the registry entry is
    /// tombstoned, so remote callers holding their own proxies are cut
    /// off as well; for a foreign handle only this proxy is disabled.
    pub fn dispose(&self, handle: &Handle) -> Result<(), RpcError> {
        handle.mark_disposed();
        if handle.world_id() == self.core.id.get() {
            self.core
                .registry
                .dispose(handle.world_id(), handle.object_id())?;
        }
        Ok(())
    }

    /// Install the object that serves this world's root, object id 0.
    ///
    /// The root is what a child's parent handle points at. The
    /// built-in `worldArgs` member stays available either way.
    pub fn set_root(&self, object: Rc<dyn RpcTarget>) -> Result<(), RpcError> {
        if object.as_handle().is_some() {
            return Err(RpcError::handle_to_handle());
        }
        *self.core.user_root.borrow_mut() = Some(object);
        Ok(())
    }

    /// The arguments this world was created with.
    ///
    /// Empty for the root world. Remote peers fetch the same list by
    /// invoking `worldArgs` on this world's root.
    pub fn world_args(&self) -> Vec<Value> {
        self.core.world_args.borrow().clone()
    }

    /// Spawn a child world over `transport`.
    ///
    /// Allocates the child's id, sends the bootstrap carrying `args`,
    /// and resolves once the child acknowledged with `worldReady`.
    pub async fn create_world<T: TransportFactory>(
        &self,
        transport: T,
        args: Vec<Value>,
    ) -> Result<WorldId, RpcError> {
        let child = alloc_world_id();
        let wire_args = args
            .iter()
            .map(|arg| marshal::marshal(arg, self.core.config.max_ref_depth))
            .collect::<Result<Vec<_>, _>>()?;

        let link = self.core.attach(transport);
        self.core.set_link_peer(link, child);
        self.core.routes.borrow_mut().insert(child, link);

        let (ready, acked) = oneshot::channel();
        self.core.ready_waiters.borrow_mut().insert(child, ready);

        self.core.send_on(
            link,
            Message::CreateWorld {
                new_world_id: child,
                parent_world_id: self.core.id.get(),
                args: wire_args,
            },
        );

        acked
            .await
            .map_err(|_| RpcError::PeerDisposed { world: child })?;
        tracing::debug!(parent = %self.core.id.get(), %child, "child world ready");
        Ok(child)
    }

    /// Dispose the peer world `world`.
    ///
    /// Pending calls targeting it reject with `PeerDisposed`; messages
    /// to or from it are dropped from here on, so responses to calls
    /// it originated are abandoned. The peer is notified first.
    pub fn dispose_world(&self, world: WorldId) {
        self.core.mark_world_disposed(world, true);
    }
}

/// Register the child side of a link.
///
/// Installs the receive callback, waits for the parent's `createWorld`
/// bootstrap, and then: adopts the assigned world id, stores the
/// creation args, invokes `initializer` with a handle to the parent's
/// root and the child world itself, and acknowledges with
/// `worldReady`.
pub async fn init_world<T, F>(transport: T, initializer: F) -> Result<World, RpcError>
where
    T: TransportFactory,
    F: FnOnce(Handle, World) + 'static,
{
    let world = World::new(UNASSIGNED_WORLD_ID, WorldConfig::default());
    let (ready, initialized) = oneshot::channel();
    *world.core.pending_init.borrow_mut() = Some(InitState {
        initializer: Box::new(initializer),
        ready,
    });
    world.core.attach(transport);

    initialized
        .await
        .map_err(|_| RpcError::invalid_input("transport closed before createWorld arrived"))?;
    Ok(world)
}

impl WorldCore {
    /// Wire a transport to this world and return its link id.
    fn attach<T: TransportFactory>(&self, transport: T) -> LinkId {
        let link = LinkId(self.next_link.get());
        self.next_link.set(link.0 + 1);

        let weak = self.weak.clone();
        let receive: MessageSink = Box::new(move |message| {
            if let Some(core) = weak.upgrade() {
                core.on_message(link, message);
            }
        });
        let send = transport.connect(receive);
        self.links.borrow_mut().insert(
            link,
            Link {
                send,
                alive: Cell::new(true),
                peer: Cell::new(None),
            },
        );
        link
    }

    fn set_link_peer(&self, link: LinkId, world: WorldId) {
        if let Some(l) = self.links.borrow().get(&link) {
            l.peer.set(Some(world));
        }
    }

    fn link_alive(&self, link: LinkId) -> bool {
        self.links
            .borrow()
            .get(&link)
            .map(|l| l.alive.get())
            .unwrap_or(false)
    }

    fn send_on(&self, link: LinkId, message: Message) {
        let links = self.links.borrow();
        match links.get(&link) {
            Some(l) if l.alive.get() => (l.send)(message),
            _ => tracing::debug!(link = link.0, "dropping message to dead link"),
        }
    }

    /// The per-link message demultiplexer.
    fn on_message(&self, link: LinkId, message: Message) {
        if !self.link_alive(link) {
            tracing::debug!(link = link.0, "dropping message from dead link");
            return;
        }
        match message {
            Message::Call {
                seq,
                world_id,
                object_id,
                member,
                args,
            } => {
                if world_id == self.id.get() {
                    self.spawn_serve_call(link, seq, object_id, member, args);
                } else {
                    self.relay_call(link, seq, world_id, object_id, member, args);
                }
            }
            Message::Response { seq, result } => {
                let relayed = self.relays.borrow_mut().remove(&seq);
                match relayed {
                    Some(entry) => self.send_on(
                        entry.origin_link,
                        Message::Response {
                            seq: entry.origin_seq,
                            result,
                        },
                    ),
                    None => self
                        .dispatcher
                        .settle(seq, result.map_err(RpcError::from)),
                }
            }
            Message::CreateWorld {
                new_world_id,
                parent_world_id,
                args,
            } => self.on_create_world(link, new_world_id, parent_world_id, args),
            Message::WorldReady { new_world_id } => {
                if let Some(waiter) = self.ready_waiters.borrow_mut().remove(&new_world_id) {
                    let _ = waiter.send(());
                } else {
                    tracing::warn!(world = %new_world_id, "unexpected worldReady");
                }
            }
            Message::DisposeWorld { world_id } => {
                if world_id == self.id.get() {
                    // A peer disposed us; sever every link.
                    tracing::debug!(world = %world_id, "disposed by a peer");
                    for l in self.links.borrow().values() {
                        l.alive.set(false);
                    }
                } else {
                    self.mark_world_disposed(world_id, false);
                }
            }
        }
    }

    fn on_create_world(
        &self,
        link: LinkId,
        new_world_id: WorldId,
        parent_world_id: WorldId,
        args: Vec<WireValue>,
    ) {
        let state = self.pending_init.borrow_mut().take();
        let Some(state) = state else {
            tracing::warn!(world = %new_world_id, "ignoring createWorld on an initialized world");
            return;
        };

        self.id.set(new_world_id);
        observe_world_id(new_world_id);
        observe_world_id(parent_world_id);
        self.set_link_peer(link, parent_world_id);
        self.routes.borrow_mut().insert(parent_world_id, link);

        let args: Vec<Value> = args
            .into_iter()
            .map(|arg| self.unmarshal_value(arg, Some(link)))
            .collect();
        *self.world_args.borrow_mut() = args;

        let parent = self.resolve_ref(
            WireRef {
                world_id: parent_world_id,
                object_id: ObjectId::ROOT,
            },
            Some(link),
        );
        tracing::debug!(world = %new_world_id, parent = %parent_world_id, "world initialized");

        let Some(core) = self.weak.upgrade() else {
            return;
        };
        (state.initializer)(parent, World { core });
        self.send_on(link, Message::WorldReady { new_world_id });
        let _ = state.ready.send(());
    }

    /// Forward a call toward the world that owns its target.
    ///
    /// The call is re-numbered into this world's sequence space so
    /// that sequence numbers from independent origins cannot collide
    /// in one pending table; the relay entry maps the response back.
    fn relay_call(
        &self,
        origin: LinkId,
        seq: u64,
        world_id: WorldId,
        object_id: ObjectId,
        member: String,
        args: Vec<WireValue>,
    ) {
        if self.disposed_worlds.borrow().contains(&world_id) {
            tracing::debug!(world = %world_id, "dropping call relayed toward a disposed world");
            return;
        }
        let route = self.routes.borrow().get(&world_id).copied();
        match route {
            Some(next_hop) => {
                let relay_seq = self.dispatcher.next_seq();
                self.relays.borrow_mut().insert(
                    relay_seq,
                    RelayEntry {
                        origin_link: origin,
                        origin_seq: seq,
                    },
                );
                self.send_on(
                    next_hop,
                    Message::Call {
                        seq: relay_seq,
                        world_id,
                        object_id,
                        member,
                        args,
                    },
                );
            }
            None => {
                tracing::warn!(world = %world_id, %member, "no route for relayed call");
                self.send_on(
                    origin,
                    Message::Response {
                        seq,
                        result: Err(RpcError::invalid_input(format!(
                            "no route to world {world_id}"
                        ))
                        .into_wire()),
                    },
                );
            }
        }
    }

    fn spawn_serve_call(
        &self,
        link: LinkId,
        seq: u64,
        object_id: ObjectId,
        member: String,
        args: Vec<WireValue>,
    ) {
        let Some(core) = self.weak.upgrade() else {
            return;
        };
        tokio::task::spawn_local(async move {
            let outcome = core.serve_call(link, object_id, &member, args).await;
            let result = outcome.map_err(RpcError::into_wire);
            core.send_on(link, Message::Response { seq, result });
        });
    }

    /// Serve one inbound call: resolve the target, invoke the member
    /// with demarshalled args, and marshal the outcome.
    async fn serve_call(
        &self,
        link: LinkId,
        object_id: ObjectId,
        member: &str,
        args: Vec<WireValue>,
    ) -> Result<WireValue, RpcError> {
        let target = self.registry.lookup(self.id.get(), object_id)?;
        let args: Vec<Value> = args
            .into_iter()
            .map(|arg| self.unmarshal_value(arg, Some(link)))
            .collect();
        let value = target.invoke(member, args).await?;
        marshal::marshal(&value, self.config.max_ref_depth)
    }

    /// Invoke `member` on `(world, object)` from this world.
    ///
    /// Same-world calls loop back through marshal and unmarshal so the
    /// depth cap and handle canonicalization hold uniformly; remote
    /// calls go through the dispatcher.
    pub(crate) async fn call_member(
        &self,
        world: WorldId,
        object: ObjectId,
        member: &str,
        args: Vec<Value>,
    ) -> Result<Value, RpcError> {
        let world_disposed = self.disposed_worlds.borrow().contains(&world);
        if world_disposed {
            // Nothing is sent and nothing will answer: the call never
            // settles, which is the contract for disposed worlds.
            tracing::debug!(%world, member, "call on a disposed world will never settle");
            return std::future::pending().await;
        }

        let wire_args = args
            .iter()
            .map(|arg| marshal::marshal(arg, self.config.max_ref_depth))
            .collect::<Result<Vec<_>, _>>()?;

        if world == self.id.get() {
            let target = self.registry.lookup(world, object)?;
            let args: Vec<Value> = wire_args
                .into_iter()
                .map(|arg| self.unmarshal_value(arg, None))
                .collect();
            let value = target.invoke(member, args).await?;
            let wire = marshal::marshal(&value, self.config.max_ref_depth)?;
            return Ok(self.unmarshal_value(wire, None));
        }

        let route = self.routes.borrow().get(&world).copied();
        let Some(route) = route else {
            return Err(RpcError::invalid_input(format!(
                "no route to world {world}"
            )));
        };
        let (seq, reply) = self.dispatcher.register(world);
        self.send_on(
            route,
            Message::Call {
                seq,
                world_id: world,
                object_id: object,
                member: member.to_string(),
                args: wire_args,
            },
        );
        match reply.await {
            Ok(Ok(wire)) => Ok(self.unmarshal_value(wire, Some(route))),
            Ok(Err(error)) => Err(error),
            // The dispatcher itself went away mid-call; the world is
            // being torn down.
            Err(_) => Err(RpcError::Disposed),
        }
    }

    fn mark_world_disposed(&self, world: WorldId, notify: bool) {
        if world == self.id.get() {
            tracing::debug!(%world, "ignoring request to dispose this world through itself");
            return;
        }
        if !self.disposed_worlds.borrow_mut().insert(world) {
            return;
        }
        tracing::debug!(%world, "peer world disposed");

        self.dispatcher.cancel_for(world);
        self.ready_waiters.borrow_mut().remove(&world);

        // Kill only a link whose direct peer is the disposed world; a
        // route that merely passes through a shared link (a sibling
        // reached via the parent) must leave that link untouched.
        let direct = self
            .links
            .borrow()
            .iter()
            .find_map(|(id, l)| (l.peer.get() == Some(world)).then_some(*id));
        if let Some(link) = direct {
            if notify {
                self.send_on(link, Message::DisposeWorld { world_id: world });
            }
            if let Some(l) = self.links.borrow().get(&link) {
                l.alive.set(false);
            }
        }
    }

    fn cached_handle(&self, key: &(WorldId, ObjectId)) -> Option<Handle> {
        self.handles
            .borrow()
            .get(key)
            .and_then(Weak::upgrade)
            .map(Handle::from_inner)
    }

    /// The canonical handle for a locally registered object.
    fn local_handle(&self, id: ObjectId, object: Rc<dyn RpcTarget>) -> Handle {
        let key = (self.id.get(), id);
        if let Some(existing) = self.cached_handle(&key) {
            return existing;
        }
        let handle = Handle::new(key.0, key.1, self.weak.clone(), Some(object));
        self.handles.borrow_mut().insert(key, handle.downgrade());
        handle
    }

    /// Resolve a wire reference to its canonical handle, learning the
    /// route to a foreign owner from the link it arrived on.
    fn resolve_ref(&self, wire: WireRef, via: Option<LinkId>) -> Handle {
        observe_world_id(wire.world_id);
        if wire.world_id != self.id.get() {
            if let Some(link) = via {
                self.routes.borrow_mut().entry(wire.world_id).or_insert(link);
            }
        }

        let key = (wire.world_id, wire.object_id);
        if let Some(existing) = self.cached_handle(&key) {
            return existing;
        }
        let local = if wire.world_id == self.id.get() {
            self.registry.lookup(wire.world_id, wire.object_id).ok()
        } else {
            None
        };
        let handle = Handle::new(key.0, key.1, self.weak.clone(), local);
        self.handles.borrow_mut().insert(key, handle.downgrade());
        handle
    }

    fn unmarshal_value(&self, wire: WireValue, via: Option<LinkId>) -> Value {
        match wire {
            WireValue::Null => Value::Null,
            WireValue::Bool(b) => Value::Bool(b),
            WireValue::Int(n) => Value::Int(n),
            WireValue::Float(x) => Value::Float(x),
            WireValue::Str(s) => Value::Str(s),
            WireValue::List(items) => {
                Value::list(items.into_iter().map(|item| self.unmarshal_value(item, via)))
            }
            WireValue::Map(entries) => Value::map(
                entries
                    .into_iter()
                    .map(|(key, item)| (key, self.unmarshal_value(item, via))),
            ),
            WireValue::Ref(r) => Value::Handle(self.resolve_ref(r, via)),
        }
    }
}

/// The built-in root object present in every world at object id 0.
///
/// Serves the `worldArgs` member and delegates everything else to the
/// user root installed with [`World::set_root`].
struct WorldRoot {
    core: Weak<WorldCore>,
}

impl RpcTarget for WorldRoot {
    fn invoke(self: Rc<Self>, member: &str, args: Vec<Value>) -> InvokeFuture {
        let member = member.to_string();
        let core = self.core.clone();
        Box::pin(async move {
            let Some(core) = core.upgrade() else {
                return Err(RpcError::Disposed);
            };
            if member == "worldArgs" {
                return Ok(Value::list(core.world_args.borrow().iter().cloned()));
            }
            let user = core.user_root.borrow().clone();
            match user {
                Some(user) => user.invoke(&member, args).await,
                None => Err(RpcError::NoMember { member }),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Object;

    fn block_on<F: std::future::Future>(fut: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime")
            .block_on(fut)
    }

    fn sum_object() -> Rc<dyn RpcTarget> {
        Rc::new(Object::new().method("sum", |args| {
            let a = args.first().and_then(Value::as_i64).unwrap_or(0);
            let b = args.get(1).and_then(Value::as_i64).unwrap_or(0);
            Ok(Value::from(a + b))
        }))
    }

    #[test]
    fn test_root_world_has_id_zero() {
        let world = World::init_root();
        assert_eq!(world.id(), WorldId::ROOT);
    }

    #[test]
    fn test_local_call_through_handle() {
        block_on(async {
            let world = World::init_root();
            let foo = world.handle(sum_object()).expect("handle");
            let out = foo
                .call("sum", vec![Value::from(1), Value::from(3)])
                .await
                .expect("sum");
            assert_eq!(out, Value::from(4));
        });
    }

    #[test]
    fn test_handle_round_trip_identity() {
        let world = World::init_root();
        let obj = sum_object();
        let first = world.handle(obj.clone()).expect("handle");
        let second = world.handle(obj.clone()).expect("handle");
        assert!(Handle::same(&first, &second));

        let materialized = world.object(&first).expect("object");
        assert!(Rc::ptr_eq(&materialized, &obj));
    }

    #[test]
    fn test_handle_of_handle_is_rejected() {
        let world = World::init_root();
        let handle = world.handle(sum_object()).expect("handle");
        let err = world
            .handle(Rc::new(handle))
            .expect_err("wrapping a handle must fail");
        assert_eq!(err.to_string(), "Can not return handle to handle");
    }

    #[test]
    fn test_private_member_is_rejected_locally() {
        block_on(async {
            let world = World::init_root();
            let foo = world.handle(sum_object()).expect("handle");
            let err = foo.call("_sum", vec![]).await.expect_err("must fail");
            assert_eq!(err.to_string(), "Private members are not exposed over RPC");
        });
    }

    #[test]
    fn test_disposed_handle_rejects_calls() {
        block_on(async {
            let world = World::init_root();
            let foo = world.handle(sum_object()).expect("handle");
            world.dispose(&foo).expect("dispose");

            let err = foo.call("sum", vec![]).await.expect_err("must fail");
            assert_eq!(err.to_string(), "Object has been diposed");

            let err = match world.object(&foo) {
                Ok(_) => panic!("materialize must fail"),
                Err(e) => e,
            };
            assert_eq!(err.to_string(), "Object has been diposed");
        });
    }

    #[test]
    fn test_cross_world_materialization_is_rejected() {
        let world = World::init_root();
        let foreign = world.core.resolve_ref(
            WireRef {
                world_id: WorldId(7),
                object_id: ObjectId(1),
            },
            None,
        );
        let err = match world.object(&foreign) {
            Ok(_) => panic!("must fail"),
            Err(e) => e,
        };
        assert!(matches!(err, RpcError::InvalidInput { .. }));
    }

    #[test]
    fn test_local_loopback_enforces_depth_cap() {
        block_on(async {
            let world = World::init_root();
            let foo = world.handle(sum_object()).expect("handle");

            let mut deep = Value::from(1);
            for _ in 0..(marshal::MAX_REF_DEPTH + 1) {
                deep = Value::list([deep]);
            }
            let err = foo.call("sum", vec![deep]).await.expect_err("must fail");
            assert_eq!(err.to_string(), "Object reference chain is too long");
        });
    }

    #[test]
    fn test_echoed_handle_is_canonical() {
        block_on(async {
            let world = World::init_root();
            let echo = world
                .handle(Rc::new(Object::new().method("echo", |mut args| {
                    if args.is_empty() {
                        return Err(RpcError::invalid_input("nothing to echo"));
                    }
                    Ok(args.remove(0))
                })))
                .expect("handle");

            let out = echo
                .call("echo", vec![Value::Handle(echo.clone())])
                .await
                .expect("echo");
            let back = out.as_handle().expect("a handle comes back");
            assert!(Handle::same(&back, &echo));
        });
    }

    #[test]
    fn test_world_root_serves_world_args_locally() {
        block_on(async {
            let world = World::init_root();
            *world.core.world_args.borrow_mut() = vec![Value::from(1), Value::from(2)];

            let root = world.core.resolve_ref(
                WireRef {
                    world_id: world.id(),
                    object_id: ObjectId::ROOT,
                },
                None,
            );
            let out = root.call("worldArgs", vec![]).await.expect("worldArgs");
            assert_eq!(out, Value::list([Value::from(1), Value::from(2)]));
        });
    }

    #[test]
    fn test_world_root_delegates_to_user_root() {
        block_on(async {
            let world = World::init_root();
            world.set_root(sum_object()).expect("set_root");

            let root = world.core.resolve_ref(
                WireRef {
                    world_id: world.id(),
                    object_id: ObjectId::ROOT,
                },
                None,
            );
            let out = root
                .call("sum", vec![Value::from(2), Value::from(2)])
                .await
                .expect("sum");
            assert_eq!(out, Value::from(4));

            let err = root.call("missing", vec![]).await.expect_err("must fail");
            assert_eq!(err.to_string(), "There is no member missing");
        });
    }

    #[test]
    fn test_custom_depth_cap() {
        block_on(async {
            let world = World::init_root_with(WorldConfig::with_max_ref_depth(2));
            let foo = world.handle(sum_object()).expect("handle");

            let shallow = Value::list([Value::list([Value::from(1)])]);
            assert!(foo.call("sum", vec![shallow]).await.is_ok());

            let deep = Value::list([Value::list([Value::list([Value::from(1)])])]);
            let err = foo.call("sum", vec![deep]).await.expect_err("must fail");
            assert_eq!(err.to_string(), "Object reference chain is too long");
        });
    }
}
