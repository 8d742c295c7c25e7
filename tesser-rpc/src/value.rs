//! The dynamic value model that flows through RPC calls.
//!
//! [`Value`] is a graph, not a tree: composites are shared through
//! `Rc<RefCell<_>>`, so the same node can appear in several places and
//! cycles are expressible. The marshaller bounds its walk with a depth
//! cap rather than a visited set, so cyclic graphs are rejected at the
//! call site instead of looping.
//!
//! Worlds are single-threaded, which is why plain `Rc` sharing is the
//! right tool here; nothing in a value graph crosses threads.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use tesser_core::RpcError;

use crate::handle::Handle;

/// Future type produced by native functions and member invocations.
pub type InvokeFuture = Pin<Box<dyn Future<Output = Result<Value, RpcError>>>>;

/// A native function value.
///
/// Callables can sit inside argument graphs, but they have no wire
/// form: the marshaller rejects them, because functions are only
/// transferable as handles.
pub type NativeFn = Rc<dyn Fn(Vec<Value>) -> InvokeFuture>;

/// One node of an argument or result graph.
#[derive(Clone)]
pub enum Value {
    /// Absent value.
    Null,
    /// Boolean scalar.
    Bool(bool),
    /// Integer scalar.
    Int(i64),
    /// Floating point scalar.
    Float(f64),
    /// String scalar.
    Str(String),
    /// Ordered sequence, shared and mutable in place.
    List(Rc<RefCell<Vec<Value>>>),
    /// Key/value mapping, shared and mutable in place.
    Map(Rc<RefCell<BTreeMap<String, Value>>>),
    /// A proxy for an object, possibly in another world.
    Handle(Handle),
    /// A bare native function; constructible but never marshallable.
    Callable(NativeFn),
}

impl Value {
    /// Build a list value from anything iterable.
    pub fn list<I: IntoIterator<Item = Value>>(items: I) -> Value {
        Value::List(Rc::new(RefCell::new(items.into_iter().collect())))
    }

    /// Build a map value from key/value pairs.
    pub fn map<K: Into<String>, I: IntoIterator<Item = (K, Value)>>(entries: I) -> Value {
        Value::Map(Rc::new(RefCell::new(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        )))
    }

    /// Whether this is [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// The integer payload, if this is an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(n) => Some(*n),
            _ => None,
        }
    }

    /// The float payload, widening integers.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(x) => Some(*x),
            Value::Int(n) => Some(*n as f64),
            _ => None,
        }
    }

    /// The boolean payload, if this is a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// The string payload, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// The handle payload, if this is a handle.
    pub fn as_handle(&self) -> Option<Handle> {
        match self {
            Value::Handle(h) => Some(h.clone()),
            _ => None,
        }
    }

    /// Look up `key` in a map value.
    pub fn get(&self, key: &str) -> Option<Value> {
        match self {
            Value::Map(entries) => entries.borrow().get(key).cloned(),
            _ => None,
        }
    }

    /// Look up `index` in a list value.
    pub fn at(&self, index: usize) -> Option<Value> {
        match self {
            Value::List(items) => items.borrow().get(index).cloned(),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Value {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Value {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Value {
        Value::Int(n as i64)
    }
}

impl From<f64> for Value {
    fn from(x: f64) -> Value {
        Value::Float(x)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Value {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Value {
        Value::Str(s)
    }
}

impl From<Handle> for Value {
    fn from(h: Handle) -> Value {
        Value::Handle(h)
    }
}

impl PartialEq for Value {
    /// Structural equality. Handles compare by `(world, object)`;
    /// callables compare by identity. Comparing a cyclic graph with
    /// itself through distinct nodes does not terminate, same as any
    /// recursive equality; the marshaller's depth cap keeps such
    /// graphs out of the fabric.
    fn eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::List(a), Value::List(b)) => {
                Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow()
            }
            (Value::Map(a), Value::Map(b)) => Rc::ptr_eq(a, b) || *a.borrow() == *b.borrow(),
            (Value::Handle(a), Value::Handle(b)) => a == b,
            (Value::Callable(a), Value::Callable(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "Null"),
            Value::Bool(b) => write!(f, "Bool({b})"),
            Value::Int(n) => write!(f, "Int({n})"),
            Value::Float(x) => write!(f, "Float({x})"),
            Value::Str(s) => write!(f, "Str({s:?})"),
            Value::List(items) => match items.try_borrow() {
                Ok(items) => f.debug_list().entries(items.iter()).finish(),
                Err(_) => write!(f, "List(<borrowed>)"),
            },
            Value::Map(entries) => match entries.try_borrow() {
                Ok(entries) => f.debug_map().entries(entries.iter()).finish(),
                Err(_) => write!(f, "Map(<borrowed>)"),
            },
            Value::Handle(h) => write!(f, "{h:?}"),
            Value::Callable(_) => write!(f, "Callable(<fn>)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_conversions() {
        assert_eq!(Value::from(4).as_i64(), Some(4));
        assert_eq!(Value::from(2.5).as_f64(), Some(2.5));
        assert_eq!(Value::from(7).as_f64(), Some(7.0));
        assert_eq!(Value::from(true).as_bool(), Some(true));
        assert_eq!(Value::from("name").as_str(), Some("name"));
        assert!(Value::Null.is_null());
    }

    #[test]
    fn test_composite_access() {
        let v = Value::map([("a", Value::list([Value::from(1), Value::from(2)]))]);
        let a = v.get("a").expect("key present");
        assert_eq!(a.at(0), Some(Value::from(1)));
        assert_eq!(a.at(2), None);
        assert_eq!(v.get("b"), None);
    }

    #[test]
    fn test_structural_equality() {
        let a = Value::map([("x", Value::from(1))]);
        let b = Value::map([("x", Value::from(1))]);
        assert_eq!(a, b);
        assert_ne!(a, Value::map([("x", Value::from(2))]));
        assert_ne!(Value::from(1), Value::from(1.0));
    }

    #[test]
    fn test_shared_composites_alias() {
        let shared = Value::list([Value::from(1)]);
        let outer = Value::map([("a", shared.clone()), ("b", shared.clone())]);
        if let Value::List(items) = &shared {
            items.borrow_mut().push(Value::from(2));
        }
        assert_eq!(outer.get("a").and_then(|v| v.at(1)), Some(Value::from(2)));
        assert_eq!(outer.get("b").and_then(|v| v.at(1)), Some(Value::from(2)));
    }

    #[test]
    fn test_callable_identity_equality() {
        let f: NativeFn = Rc::new(|_args| Box::pin(async { Ok(Value::Null) }) as InvokeFuture);
        let a = Value::Callable(f.clone());
        let b = Value::Callable(f);
        let c = Value::Callable(Rc::new(|_args| {
            Box::pin(async { Ok(Value::Null) }) as InvokeFuture
        }));
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
