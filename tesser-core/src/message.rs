//! Wire form of values and the protocol messages.
//!
//! Everything in this module is plain serde data: a transport relays
//! [`Message`]s losslessly and needs to know nothing about worlds,
//! registries, or handles. The concrete encoding is pluggable (see
//! [`crate::MessageCodec`]); the structural contract is what matters.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ids::{ObjectId, WorldId};

/// Marshalled form of a handle: the world that owns the object and the
/// object's id within that world's registry.
///
/// Demarshalled in the owning world, a reference resolves to the
/// concrete local object; anywhere else it becomes a proxy that routes
/// calls toward the owning world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireRef {
    /// World owning the referenced object.
    pub world_id: WorldId,
    /// Object id within the owning world's registry.
    pub object_id: ObjectId,
}

/// One node of a marshalled argument or result graph.
///
/// Scalars pass through marshalling unchanged, composites are walked
/// recursively, and handles travel as [`WireRef`]s. Callables have no
/// wire form at all; they transfer only as handles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WireValue {
    /// Absent value (the null/undefined equivalents).
    Null,
    /// Boolean scalar.
    Bool(bool),
    /// Integer scalar.
    Int(i64),
    /// Floating point scalar.
    Float(f64),
    /// String scalar.
    Str(String),
    /// Ordered sequence.
    List(Vec<WireValue>),
    /// Key/value mapping with stable key order.
    Map(BTreeMap<String, WireValue>),
    /// Reference to an object owned by some world.
    Ref(WireRef),
}

/// Error payload carried in a [`Message::Response`].
///
/// The message is forwarded verbatim to the caller; the stack trace is
/// carried along whenever the throw site had one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireError {
    /// Human-readable description of the failure.
    pub message: String,
    /// Stack trace captured at the throw site, when available.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// Protocol messages exchanged between two directly linked worlds.
///
/// A link is full-duplex, ordered, and message-oriented; both ends may
/// originate calls. Sequence numbers are scoped to the sending side of
/// a link and correlate a [`Message::Call`] with its
/// [`Message::Response`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Message {
    /// Invoke `member` on an object, answered by a [`Message::Response`]
    /// carrying the same `seq`.
    ///
    /// `world_id` names the world owning the target object. A receiver
    /// that does not own that world relays the call toward it.
    #[serde(rename_all = "camelCase")]
    Call {
        /// Correlation id allocated by the sender.
        seq: u64,
        /// World owning the target object.
        world_id: WorldId,
        /// Target object within the owning world's registry.
        object_id: ObjectId,
        /// Member name to invoke.
        member: String,
        /// Marshalled arguments.
        args: Vec<WireValue>,
    },
    /// Outcome of a [`Message::Call`], correlated by `seq`.
    Response {
        /// The `seq` of the call being answered.
        seq: u64,
        /// Marshalled result, or the error the invocation produced.
        result: Result<WireValue, WireError>,
    },
    /// Parent to child bootstrap: the child's assigned world id, the
    /// parent's own id (so the child can address the parent's root),
    /// and the marshalled creation arguments.
    #[serde(rename_all = "camelCase")]
    CreateWorld {
        /// Id assigned to the child world.
        new_world_id: WorldId,
        /// Id of the world sending the bootstrap.
        parent_world_id: WorldId,
        /// Marshalled creation arguments, retrievable via `worldArgs`.
        args: Vec<WireValue>,
    },
    /// Child to parent acknowledgement of [`Message::CreateWorld`].
    #[serde(rename_all = "camelCase")]
    WorldReady {
        /// The id the child adopted.
        new_world_id: WorldId,
    },
    /// Notification that `world_id` has been disposed and will neither
    /// send nor accept further traffic.
    #[serde(rename_all = "camelCase")]
    DisposeWorld {
        /// The world being disposed.
        world_id: WorldId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(msg: &Message) -> Message {
        let json = serde_json::to_string(msg).expect("serialize");
        serde_json::from_str(&json).expect("deserialize")
    }

    #[test]
    fn test_call_roundtrip() {
        let msg = Message::Call {
            seq: 7,
            world_id: WorldId(2),
            object_id: ObjectId(5),
            member: "sum".to_string(),
            args: vec![WireValue::Int(1), WireValue::Int(3)],
        };
        assert_eq!(roundtrip(&msg), msg);
    }

    #[test]
    fn test_response_ok_roundtrip() {
        let msg = Message::Response {
            seq: 7,
            result: Ok(WireValue::Int(4)),
        };
        assert_eq!(roundtrip(&msg), msg);
    }

    #[test]
    fn test_response_error_keeps_stack() {
        let msg = Message::Response {
            seq: 9,
            result: Err(WireError {
                message: "boom".to_string(),
                stack: Some("at sum".to_string()),
            }),
        };
        assert_eq!(roundtrip(&msg), msg);
    }

    #[test]
    fn test_create_world_roundtrip() {
        let msg = Message::CreateWorld {
            new_world_id: WorldId(3),
            parent_world_id: WorldId(0),
            args: vec![WireValue::Int(1), WireValue::Int(2), WireValue::Int(3)],
        };
        assert_eq!(roundtrip(&msg), msg);
    }

    #[test]
    fn test_lifecycle_messages_roundtrip() {
        let ready = Message::WorldReady {
            new_world_id: WorldId(3),
        };
        assert_eq!(roundtrip(&ready), ready);

        let dispose = Message::DisposeWorld {
            world_id: WorldId(3),
        };
        assert_eq!(roundtrip(&dispose), dispose);
    }

    #[test]
    fn test_nested_wire_value_roundtrip() {
        let mut map = BTreeMap::new();
        map.insert(
            "a".to_string(),
            WireValue::List(vec![WireValue::Ref(WireRef {
                world_id: WorldId(0),
                object_id: ObjectId(1),
            })]),
        );
        let msg = Message::Call {
            seq: 1,
            world_id: WorldId(0),
            object_id: ObjectId(1),
            member: "call".to_string(),
            args: vec![WireValue::Map(map)],
        };
        assert_eq!(roundtrip(&msg), msg);
    }

    #[test]
    fn test_wire_error_without_stack_omits_field() {
        let err = WireError {
            message: "x".to_string(),
            stack: None,
        };
        let json = serde_json::to_string(&err).expect("serialize");
        assert!(!json.contains("stack"));
    }
}
