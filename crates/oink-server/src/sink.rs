//! Hand-off of received payloads from the listener thread.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use tracing::debug;

use oink_core::Payload;

/// Creates a connected sink/inbox pair.
pub fn inbound_channel() -> (InboundSink, Inbox) {
    let (tx, rx) = mpsc::channel();
    (InboundSink { tx }, Inbox { rx })
}

/// Producer side, owned by the listener's connections.
#[derive(Debug, Clone)]
pub struct InboundSink {
    tx: Sender<Payload>,
}

impl InboundSink {
    /// Delivers a payload. Returns `false` if the inbox was dropped.
    pub fn deliver(&self, payload: Payload) -> bool {
        match self.tx.send(payload) {
            Ok(()) => true,
            Err(_) => {
                debug!("inbox dropped, discarding payload");
                false
            }
        }
    }
}

/// Consumer side, polled by the application.
#[derive(Debug)]
pub struct Inbox {
    rx: Receiver<Payload>,
}

impl Inbox {
    /// Takes every payload received so far, oldest first.
    pub fn drain(&self) -> Vec<Payload> {
        self.rx.try_iter().collect()
    }

    /// Takes the oldest pending payload, if any.
    pub fn try_next(&self) -> Option<Payload> {
        match self.rx.try_recv() {
            Ok(payload) => Some(payload),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oink_core::Address;

    fn payload(text: &str) -> Payload {
        Payload::new(Address::localhost(1), Address::localhost(2), text)
    }

    #[test]
    fn drain_preserves_order() {
        let (sink, inbox) = inbound_channel();
        assert!(sink.clone().deliver(payload("a")));
        assert!(sink.deliver(payload("b")));

        let texts: Vec<_> = inbox.drain().into_iter().map(|p| p.text).collect();
        assert_eq!(texts, ["a", "b"]);
        assert!(inbox.try_next().is_none());
    }

    #[test]
    fn deliver_after_inbox_dropped() {
        let (sink, inbox) = inbound_channel();
        drop(inbox);
        assert!(!sink.deliver(payload("lost")));
    }
}
