//! The error surface of the RPC fabric.
//!
//! Errors are never recovered inside the core; every failure surfaces
//! to the caller that initiated the operation. Several `Display`
//! strings below are part of the observable contract and are asserted
//! by consumers, so they must not be reworded. That includes the
//! legacy spelling in [`RpcError::Disposed`].

use crate::ids::{ObjectId, WorldId};
use crate::message::WireError;

/// Every error an RPC operation can surface.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RpcError {
    /// The target object has no member with the requested name.
    #[error("There is no member {member}")]
    NoMember {
        /// The requested member name.
        member: String,
    },

    /// Member names beginning with `_` are rejected at the proxy layer,
    /// before anything reaches the remote side.
    #[error("Private members are not exposed over RPC")]
    PrivateMember {
        /// The rejected member name.
        member: String,
    },

    /// The member resolved to a plain value but was invoked with
    /// arguments. Invoking a plain value with zero arguments reads it.
    #[error("{member} is not a function")]
    NotCallable {
        /// The member that is not invocable.
        member: String,
    },

    /// The marshaller's depth cap was exceeded; the argument graph is
    /// either too deep or cyclic.
    #[error("Object reference chain is too long")]
    RefChainTooLong,

    /// The handle, or the object it refers to, has been disposed.
    ///
    /// The spelling is intentional: existing consumers assert this
    /// exact string.
    #[error("Object has been diposed")]
    Disposed,

    /// The peer world was disposed while the call was in flight.
    #[error("world {world} was disposed while the call was in flight")]
    PeerDisposed {
        /// The world that went away.
        world: WorldId,
    },

    /// The object id was never issued by the owning world.
    #[error("there is no object {object} in world {world}")]
    NotFound {
        /// The world that was asked.
        world: WorldId,
        /// The unknown object id.
        object: ObjectId,
    },

    /// The operation was given an argument it cannot accept, such as
    /// wrapping a handle in another handle or materializing a handle
    /// owned by a different world.
    #[error("{message}")]
    InvalidInput {
        /// Description of the rejected input.
        message: String,
    },

    /// The remote method itself failed; its message and stack are
    /// forwarded verbatim.
    #[error("{message}")]
    Remote {
        /// The remote error's message.
        message: String,
        /// The remote error's stack trace, when one was available.
        stack: Option<String>,
    },

    /// A message could not be encoded or decoded.
    #[error("codec error: {message}")]
    Codec {
        /// Description of the codec failure.
        message: String,
    },
}

impl RpcError {
    /// Build an [`RpcError::InvalidInput`] from any message.
    pub fn invalid_input(message: impl Into<String>) -> Self {
        RpcError::InvalidInput {
            message: message.into(),
        }
    }

    /// The rejection produced when wrapping an existing handle.
    pub fn handle_to_handle() -> Self {
        RpcError::invalid_input("Can not return handle to handle")
    }

    /// Convert into the wire payload of a response.
    ///
    /// The message is this error's `Display` form; a stack is carried
    /// only when the error already crossed a hop with one attached.
    pub fn into_wire(self) -> WireError {
        let stack = match &self {
            RpcError::Remote { stack, .. } => stack.clone(),
            _ => None,
        };
        WireError {
            message: self.to_string(),
            stack,
        }
    }
}

impl From<WireError> for RpcError {
    fn from(err: WireError) -> Self {
        RpcError::Remote {
            message: err.message,
            stack: err.stack,
        }
    }
}
