//! # tesser-core
//!
//! Shared wire-level types for the tesser RPC fabric.
//!
//! This crate holds everything both ends of a link must agree on, and
//! nothing else: world and object identifiers, the marshalled value
//! model, the protocol messages, the pluggable message codec, and the
//! unified error type. The engine itself (registries, handles,
//! dispatch, world lifecycle) lives in `tesser-rpc`.
//!
//! | Component | Purpose |
//! |-----------|---------|
//! | [`WorldId`] / [`ObjectId`] | Addressing: which world owns which object |
//! | [`WireValue`] | Marshalled argument and result graphs |
//! | [`Message`] | The five protocol messages exchanged per link |
//! | [`MessageCodec`] | Pluggable serialization, [`JsonCodec`] by default |
//! | [`RpcError`] | Every error an RPC operation can surface |

#![deny(missing_docs)]
#![deny(clippy::unwrap_used)]

mod codec;
mod error;
mod ids;
mod message;

pub use codec::{CodecError, JsonCodec, MessageCodec};
pub use error::RpcError;
pub use ids::{ObjectId, WorldId};
pub use message::{Message, WireError, WireRef, WireValue};
