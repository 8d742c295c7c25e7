//! # tesser-rpc
//!
//! A capability-oriented RPC fabric between isolated execution
//! contexts called worlds. A parent process and its spawned children,
//! or two children talking through their parent, invoke methods on
//! each other's objects as if local; arguments, results, errors, and
//! object references cross an opaque bidirectional message transport.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │               User code                          │
//! │        handles, Objects, Values                  │
//! ├─────────────────────────────────────────────────┤
//! │     World (lifecycle + routing mesh)             │
//! │     • registry of owned objects                  │
//! │     • relay toward indirectly reachable worlds   │
//! ├─────────────────────────────────────────────────┤
//! │     Dispatcher (request/response correlation)    │
//! │     • sequence numbers, pending calls            │
//! │     • targeted cancellation on disposal          │
//! ├─────────────────────────────────────────────────┤
//! │     Transport (any ordered message channel)      │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick start
//!
//! ```ignore
//! use std::rc::Rc;
//! use tesser_rpc::{Object, Value, World};
//!
//! let world = World::init_root();
//! let foo = world.handle(Rc::new(Object::new().method("sum", |args| {
//!     let a = args[0].as_i64().unwrap_or(0);
//!     let b = args[1].as_i64().unwrap_or(0);
//!     Ok(Value::from(a + b))
//! })))?;
//!
//! let four = foo.call("sum", vec![Value::from(1), Value::from(3)]).await?;
//! ```
//!
//! Worlds are single-threaded and cooperative: run them inside a tokio
//! `LocalSet` on a current-thread runtime. Every remote invocation is
//! a future; the only suspension points are awaiting a response,
//! awaiting a user method's own future, and transport queuing.

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

mod dispatch;
mod marshal;
mod registry;

pub mod handle;
pub mod object;
pub mod transport;
pub mod value;
pub mod world;

pub use handle::Handle;
pub use object::{Object, RpcTarget};
pub use transport::{ChannelTransport, MessageSink, TransportFactory, pair};
pub use value::{InvokeFuture, NativeFn, Value};
pub use world::{World, WorldConfig, init_world};

// Re-export the wire-level types for convenience.
pub use tesser_core::{
    CodecError, JsonCodec, Message, MessageCodec, ObjectId, RpcError, WireError, WireRef,
    WireValue, WorldId,
};
