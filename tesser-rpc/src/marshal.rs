//! Conversion of value graphs to wire form.
//!
//! Rules, applied in order at every node: scalars pass through;
//! handles become wire references; bare callables are rejected (they
//! transfer only as handles); composites recurse under a depth
//! counter. Exceeding the cap fails with `RefChainTooLong`, which both
//! bounds the walk and breaks cycles without visited-set bookkeeping;
//! legitimately deep acyclic graphs are rejected too.
//!
//! The inverse direction lives with the world manager, because turning
//! a wire reference back into a handle needs the registry, the handle
//! cache, and the link the reference arrived on.

use std::collections::BTreeMap;

use tesser_core::{RpcError, WireRef, WireValue};

use crate::value::Value;

/// Default cap on composite nesting depth.
pub(crate) const MAX_REF_DEPTH: usize = 20;

/// Marshal `value` into wire form, refusing composites nested deeper
/// than `max_depth`.
pub(crate) fn marshal(value: &Value, max_depth: usize) -> Result<WireValue, RpcError> {
    marshal_at(value, 0, max_depth)
}

fn marshal_at(value: &Value, depth: usize, max_depth: usize) -> Result<WireValue, RpcError> {
    match value {
        Value::Null => Ok(WireValue::Null),
        Value::Bool(b) => Ok(WireValue::Bool(*b)),
        Value::Int(n) => Ok(WireValue::Int(*n)),
        Value::Float(x) => Ok(WireValue::Float(*x)),
        Value::Str(s) => Ok(WireValue::Str(s.clone())),
        Value::Handle(handle) => Ok(WireValue::Ref(WireRef {
            world_id: handle.world_id(),
            object_id: handle.object_id(),
        })),
        Value::Callable(_) => Err(RpcError::invalid_input(
            "functions can only be passed as handles",
        )),
        Value::List(items) => {
            let next = depth + 1;
            if next > max_depth {
                return Err(RpcError::RefChainTooLong);
            }
            let items = items
                .borrow()
                .iter()
                .map(|item| marshal_at(item, next, max_depth))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(WireValue::List(items))
        }
        Value::Map(entries) => {
            let next = depth + 1;
            if next > max_depth {
                return Err(RpcError::RefChainTooLong);
            }
            let entries = entries
                .borrow()
                .iter()
                .map(|(key, item)| Ok((key.clone(), marshal_at(item, next, max_depth)?)))
                .collect::<Result<BTreeMap<_, _>, RpcError>>()?;
            Ok(WireValue::Map(entries))
        }
    }
}
