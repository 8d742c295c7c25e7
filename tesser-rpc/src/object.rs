//! Invocable objects and the dynamic member surface.
//!
//! Anything a world registers implements [`RpcTarget`]: one generic
//! `invoke(member, args)` entry point, since member resolution happens
//! at the callee and member names arrive as strings. [`Object`] is the
//! standard implementation, built from named methods and properties
//! with the member semantics the fabric promises: unknown members fail
//! with `NoMember`, a property read is an invocation with zero
//! arguments, and invoking a property with arguments fails with
//! `NotCallable`.

use std::collections::BTreeMap;
use std::future::Future;
use std::rc::Rc;

use tesser_core::RpcError;

use crate::handle::Handle;
use crate::value::{InvokeFuture, NativeFn, Value};

/// An object callable through the RPC fabric.
pub trait RpcTarget {
    /// Invoke `member` with `args`.
    ///
    /// The returned future may resolve immediately (synchronous
    /// methods) or suspend (methods that themselves await remote
    /// calls). Errors surface verbatim to the caller.
    fn invoke(self: Rc<Self>, member: &str, args: Vec<Value>) -> InvokeFuture;

    /// The handle this target proxies, when it is itself a proxy.
    ///
    /// Registration uses this to reject double-wrapping: a handle is
    /// never wrapped in another handle.
    fn as_handle(&self) -> Option<Handle> {
        None
    }
}

#[derive(Clone)]
enum Member {
    Method(NativeFn),
    Property(Value),
}

/// A dynamic object assembled from named methods and properties.
///
/// ```ignore
/// let calc = Rc::new(
///     Object::new()
///         .method("sum", |args| {
///             let a = args[0].as_i64().unwrap_or(0);
///             let b = args[1].as_i64().unwrap_or(0);
///             Ok(Value::from(a + b))
///         })
///         .property("version", Value::from(1)),
/// );
/// let handle = world.handle(calc)?;
/// ```
#[derive(Default)]
pub struct Object {
    members: BTreeMap<String, Member>,
}

impl Object {
    /// Create an empty object.
    pub fn new() -> Object {
        Object::default()
    }

    /// Add a synchronous method.
    pub fn method<F>(mut self, name: &str, f: F) -> Object
    where
        F: Fn(Vec<Value>) -> Result<Value, RpcError> + 'static,
    {
        let f = Rc::new(f);
        self.members.insert(
            name.to_string(),
            Member::Method(Rc::new(move |args| {
                let out = f(args);
                Box::pin(async move { out }) as InvokeFuture
            })),
        );
        self
    }

    /// Add a method whose body is asynchronous.
    pub fn async_method<F, Fut>(mut self, name: &str, f: F) -> Object
    where
        F: Fn(Vec<Value>) -> Fut + 'static,
        Fut: Future<Output = Result<Value, RpcError>> + 'static,
    {
        self.members.insert(
            name.to_string(),
            Member::Method(Rc::new(move |args| Box::pin(f(args)) as InvokeFuture)),
        );
        self
    }

    /// Add a plain value member.
    ///
    /// Remote callers read it by invoking the member with zero
    /// arguments.
    pub fn property(mut self, name: &str, value: Value) -> Object {
        self.members.insert(name.to_string(), Member::Property(value));
        self
    }
}

impl RpcTarget for Object {
    fn invoke(self: Rc<Self>, member: &str, args: Vec<Value>) -> InvokeFuture {
        match self.members.get(member).cloned() {
            Some(Member::Method(f)) => f(args),
            Some(Member::Property(value)) => {
                if args.is_empty() {
                    Box::pin(async move { Ok(value) })
                } else {
                    let member = member.to_string();
                    Box::pin(async move { Err(RpcError::NotCallable { member }) })
                }
            }
            None => {
                let member = member.to_string();
                Box::pin(async move { Err(RpcError::NoMember { member }) })
            }
        }
    }
}
