//! The transport contract and the in-process channel link.
//!
//! The fabric consumes any full-duplex, ordered, message-oriented
//! channel. A [`TransportFactory`] is connected exactly once: it takes
//! the receive sink the fabric installs and returns the send sink the
//! fabric will call. Closures work directly, so a custom transport is
//! one `move |receive| ...` away.
//!
//! [`pair`] builds the link used in tests and same-process embeddings:
//! two unbounded channels whose pump tasks run on the current
//! `LocalSet`. Every message crosses the [`JsonCodec`] boundary in
//! both directions, so the link behaves like a process boundary and
//! nothing structural survives except what the wire form carries.

use tesser_core::{JsonCodec, Message, MessageCodec};
use tokio::sync::mpsc;

/// Message consumer installed by or handed to a transport.
pub type MessageSink = Box<dyn Fn(Message)>;

/// A transport endpoint waiting to be wired to a world.
pub trait TransportFactory {
    /// Install `receive` as the inbound delivery callback and return
    /// the sink the world uses to transmit.
    ///
    /// Delivery may be asynchronous; ordering per direction must be
    /// preserved.
    fn connect(self, receive: MessageSink) -> MessageSink;
}

impl<F> TransportFactory for F
where
    F: FnOnce(MessageSink) -> MessageSink,
{
    fn connect(self, receive: MessageSink) -> MessageSink {
        self(receive)
    }
}

/// One endpoint of an in-process link created by [`pair`].
pub struct ChannelTransport {
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    inbound: mpsc::UnboundedReceiver<Vec<u8>>,
}

/// Create a connected pair of in-process transports.
///
/// Both endpoints must be connected from within a tokio `LocalSet`;
/// the receive pumps are `spawn_local` tasks.
pub fn pair() -> (ChannelTransport, ChannelTransport) {
    let (a_to_b, from_a) = mpsc::unbounded_channel();
    let (b_to_a, from_b) = mpsc::unbounded_channel();
    (
        ChannelTransport {
            outbound: a_to_b,
            inbound: from_b,
        },
        ChannelTransport {
            outbound: b_to_a,
            inbound: from_a,
        },
    )
}

impl TransportFactory for ChannelTransport {
    fn connect(self, receive: MessageSink) -> MessageSink {
        let ChannelTransport {
            outbound,
            mut inbound,
        } = self;

        tokio::task::spawn_local(async move {
            while let Some(bytes) = inbound.recv().await {
                match JsonCodec.decode::<Message>(&bytes) {
                    Ok(message) => receive(message),
                    Err(error) => {
                        tracing::warn!(%error, "dropping undecodable inbound message");
                    }
                }
            }
        });

        Box::new(move |message| match JsonCodec.encode(&message) {
            Ok(bytes) => {
                // A closed channel means the peer is gone; disposal
                // semantics make dropped messages acceptable here.
                let _ = outbound.send(bytes);
            }
            Err(error) => {
                tracing::warn!(%error, "failed to encode outbound message");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tesser_core::{ObjectId, WireValue, WorldId};

    fn run<F: std::future::Future>(fut: F) -> F::Output {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .expect("runtime");
        runtime.block_on(tokio::task::LocalSet::new().run_until(fut))
    }

    fn call(seq: u64) -> Message {
        Message::Call {
            seq,
            world_id: WorldId(0),
            object_id: ObjectId(1),
            member: "sum".to_string(),
            args: vec![WireValue::Int(seq as i64)],
        }
    }

    #[test]
    fn test_pair_delivers_both_directions() {
        run(async {
            let (left, right) = pair();

            let left_seen: Rc<RefCell<Vec<Message>>> = Rc::new(RefCell::new(Vec::new()));
            let right_seen: Rc<RefCell<Vec<Message>>> = Rc::new(RefCell::new(Vec::new()));

            let seen = left_seen.clone();
            let left_send = left.connect(Box::new(move |m| seen.borrow_mut().push(m)));
            let seen = right_seen.clone();
            let right_send = right.connect(Box::new(move |m| seen.borrow_mut().push(m)));

            left_send(call(1));
            right_send(call(2));

            while left_seen.borrow().is_empty() || right_seen.borrow().is_empty() {
                tokio::task::yield_now().await;
            }

            assert_eq!(right_seen.borrow().as_slice(), &[call(1)]);
            assert_eq!(left_seen.borrow().as_slice(), &[call(2)]);
        });
    }

    #[test]
    fn test_pair_preserves_order() {
        run(async {
            let (left, right) = pair();

            let seen: Rc<RefCell<Vec<Message>>> = Rc::new(RefCell::new(Vec::new()));
            let sink = seen.clone();
            let _right_send = right.connect(Box::new(move |m| sink.borrow_mut().push(m)));
            let left_send = left.connect(Box::new(|_| {}));

            for seq in 1..=5 {
                left_send(call(seq));
            }

            while seen.borrow().len() < 5 {
                tokio::task::yield_now().await;
            }

            let seqs: Vec<u64> = seen
                .borrow()
                .iter()
                .map(|m| match m {
                    Message::Call { seq, .. } => *seq,
                    other => panic!("unexpected message {other:?}"),
                })
                .collect();
            assert_eq!(seqs, vec![1, 2, 3, 4, 5]);
        });
    }

    #[test]
    fn test_closure_factory_connects() {
        let echoed: Rc<RefCell<Option<Message>>> = Rc::new(RefCell::new(None));
        let slot = echoed.clone();

        // A loopback transport: whatever is sent is delivered straight
        // back to the sender.
        let factory = move |receive: MessageSink| -> MessageSink {
            Box::new(move |message| {
                receive(message.clone());
                slot.borrow_mut().replace(message);
            })
        };

        let seen: Rc<RefCell<Option<Message>>> = Rc::new(RefCell::new(None));
        let sink = seen.clone();
        let send = factory.connect(Box::new(move |m| {
            sink.borrow_mut().replace(m);
        }));

        send(call(7));
        assert_eq!(seen.borrow().clone(), Some(call(7)));
        assert_eq!(echoed.borrow().clone(), Some(call(7)));
    }
}
