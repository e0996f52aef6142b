use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use parking_lot::RwLock;

use wscollab_core::error::WsCollabError;
use wscollab_core::protocol::{classify, Classification, Envelope, OtherReason};

use crate::session::ConnectionEvent;

/// Error a listener may return; reported, never propagated.
pub type ListenerError = Box<dyn std::error::Error + Send + Sync>;

/// Return type of every listener.
pub type ListenerResult = std::result::Result<(), ListenerError>;

type EnvelopeListener = Arc<dyn Fn(&Envelope) -> ListenerResult + Send + Sync>;
type TextDataListener = Arc<dyn Fn(&str, &str, &Envelope) -> ListenerResult + Send + Sync>;
type OtherListener = Arc<dyn Fn(&Envelope, OtherReason) -> ListenerResult + Send + Sync>;
type RawListener = Arc<dyn Fn(&str) -> ListenerResult + Send + Sync>;
type EventListener = Arc<dyn Fn(&ConnectionEvent) -> ListenerResult + Send + Sync>;

/// Independent registration channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerChannel {
    /// Every syntactically valid envelope, before recipient filtering.
    AllMessages,
    Text,
    Data,
    /// Well-formed envelopes with an unknown type or a malformed payload.
    Other,
    /// Raw text that is not a protocol envelope.
    NonProtocol,
    /// Session lifecycle notifications.
    Connection,
}

impl ListenerChannel {
    pub fn as_str(self) -> &'static str {
        match self {
            ListenerChannel::AllMessages => "all_messages",
            ListenerChannel::Text => "text",
            ListenerChannel::Data => "data",
            ListenerChannel::Other => "other",
            ListenerChannel::NonProtocol => "non_protocol",
            ListenerChannel::Connection => "connection",
        }
    }
}

#[derive(Default)]
struct Registry {
    all: Vec<EnvelopeListener>,
    text: Vec<TextDataListener>,
    data: Vec<TextDataListener>,
    other: Vec<OtherListener>,
    non_protocol: Vec<RawListener>,
    connection: Vec<EventListener>,
}

/// Append-only listener registry, invoked synchronously in registration order.
///
/// Listener lists are snapshotted before invocation, so a listener may
/// register further listeners (they see the next event, not this one).
#[derive(Default)]
pub struct Dispatcher {
    registry: RwLock<Registry>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_all_messages<F>(&self, f: F)
    where
        F: Fn(&Envelope) -> ListenerResult + Send + Sync + 'static,
    {
        self.registry.write().all.push(Arc::new(f));
    }

    pub fn on_text_message<F>(&self, f: F)
    where
        F: Fn(&str, &str, &Envelope) -> ListenerResult + Send + Sync + 'static,
    {
        self.registry.write().text.push(Arc::new(f));
    }

    pub fn on_data_message<F>(&self, f: F)
    where
        F: Fn(&str, &str, &Envelope) -> ListenerResult + Send + Sync + 'static,
    {
        self.registry.write().data.push(Arc::new(f));
    }

    pub fn on_other_message<F>(&self, f: F)
    where
        F: Fn(&Envelope, OtherReason) -> ListenerResult + Send + Sync + 'static,
    {
        self.registry.write().other.push(Arc::new(f));
    }

    pub fn on_non_protocol_message<F>(&self, f: F)
    where
        F: Fn(&str) -> ListenerResult + Send + Sync + 'static,
    {
        self.registry.write().non_protocol.push(Arc::new(f));
    }

    pub fn on_connection_event<F>(&self, f: F)
    where
        F: Fn(&ConnectionEvent) -> ListenerResult + Send + Sync + 'static,
    {
        self.registry.write().connection.push(Arc::new(f));
    }

    /// Drop every listener on every channel in one step.
    pub fn clear(&self) {
        *self.registry.write() = Registry::default();
    }

    pub fn registered(&self, channel: ListenerChannel) -> usize {
        let r = self.registry.read();
        match channel {
            ListenerChannel::AllMessages => r.all.len(),
            ListenerChannel::Text => r.text.len(),
            ListenerChannel::Data => r.data.len(),
            ListenerChannel::Other => r.other.len(),
            ListenerChannel::NonProtocol => r.non_protocol.len(),
            ListenerChannel::Connection => r.connection.len(),
        }
    }

    /// Classify one inbound frame and fan it out.
    ///
    /// All-messages listeners see every valid envelope. Typed listeners only
    /// see envelopes addressed to `local_user` (or `"all"`) and sent by
    /// someone else.
    pub fn route(&self, frame: &str, local_user: &str) -> Classification {
        let classification = classify(frame);

        let Some(envelope) = classification.envelope() else {
            let listeners = self.registry.read().non_protocol.clone();
            invoke(ListenerChannel::NonProtocol, &listeners, |l| l(frame));
            return classification;
        };

        let all = self.registry.read().all.clone();
        invoke(ListenerChannel::AllMessages, &all, |l| l(envelope));

        if !envelope.is_deliverable_to(local_user) {
            tracing::trace!(
                from = %envelope.from,
                kind = classification.kind(),
                "envelope not for local user"
            );
            return classification;
        }

        match &classification {
            Classification::Text { envelope, payload } => {
                let listeners = self.registry.read().text.clone();
                invoke(ListenerChannel::Text, &listeners, |l| {
                    l(payload.name.as_str(), payload.content.as_str(), envelope)
                });
            }
            Classification::Data { envelope, payload } => {
                let listeners = self.registry.read().data.clone();
                invoke(ListenerChannel::Data, &listeners, |l| {
                    l(payload.name.as_str(), payload.content.as_str(), envelope)
                });
            }
            Classification::Other { envelope, reason } => {
                let listeners = self.registry.read().other.clone();
                invoke(ListenerChannel::Other, &listeners, |l| l(envelope, *reason));
            }
            Classification::NonProtocol(_) => {}
        }

        classification
    }

    /// Deliver a lifecycle notification.
    pub fn notify(&self, event: &ConnectionEvent) {
        let listeners = self.registry.read().connection.clone();
        invoke(ListenerChannel::Connection, &listeners, |l| l(event));
    }
}

/// Run every listener; a failing or panicking listener is logged and skipped.
fn invoke<L: ?Sized>(
    channel: ListenerChannel,
    listeners: &[Arc<L>],
    call: impl Fn(&L) -> ListenerResult,
) {
    for (index, listener) in listeners.iter().enumerate() {
        let reason = match panic::catch_unwind(AssertUnwindSafe(|| call(listener.as_ref()))) {
            Ok(Ok(())) => continue,
            Ok(Err(e)) => e.to_string(),
            Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
        };
        let err = WsCollabError::ObserverFailure {
            channel: channel.as_str(),
            reason,
        };
        tracing::warn!(index, error = %err, "listener failed");
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic"
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    const FROM_BOB: &str = r#"{"version":1,"type":"message","from":"bob","to":["all"],"payload":{"name":"Bob","content":"hi"}}"#;
    const FROM_SELF: &str = r#"{"version":1,"type":"message","from":"alice","to":["all"],"payload":{"name":"Alice","content":"self"}}"#;
    const POKE: &str = r#"{"version":1,"type":"poke","from":"bob","to":["alice"],"payload":{"x":1}}"#;
    const DATA_FOR_CAROL: &str = r#"{"version":1,"type":"data","from":"bob","to":["carol"],"payload":{"name":"k","content":"v"}}"#;

    fn recording() -> (Arc<Dispatcher>, Arc<Mutex<Vec<String>>>) {
        let d = Arc::new(Dispatcher::new());
        let log = Arc::new(Mutex::new(Vec::new()));

        let l = log.clone();
        d.on_all_messages(move |e| {
            l.lock().unwrap().push(format!("all:{}", e.msg_type));
            Ok(())
        });
        let l = log.clone();
        d.on_text_message(move |name, content, _| {
            l.lock().unwrap().push(format!("text:{name}:{content}"));
            Ok(())
        });
        let l = log.clone();
        d.on_data_message(move |name, content, _| {
            l.lock().unwrap().push(format!("data:{name}:{content}"));
            Ok(())
        });
        let l = log.clone();
        d.on_other_message(move |e, reason| {
            l.lock().unwrap().push(format!("other:{}:{}", e.msg_type, reason.as_str()));
            Ok(())
        });
        let l = log.clone();
        d.on_non_protocol_message(move |raw| {
            l.lock().unwrap().push(format!("raw:{raw}"));
            Ok(())
        });
        (d, log)
    }

    #[test]
    fn text_from_peer_reaches_all_and_text() {
        let (d, log) = recording();
        d.route(FROM_BOB, "alice");
        assert_eq!(*log.lock().unwrap(), vec!["all:message", "text:Bob:hi"]);
    }

    #[test]
    fn self_sent_only_reaches_all() {
        let (d, log) = recording();
        d.route(FROM_SELF, "alice");
        assert_eq!(*log.lock().unwrap(), vec!["all:message"]);
    }

    #[test]
    fn not_addressed_only_reaches_all() {
        let (d, log) = recording();
        d.route(DATA_FOR_CAROL, "alice");
        assert_eq!(*log.lock().unwrap(), vec!["all:data"]);
    }

    #[test]
    fn unknown_type_reaches_other() {
        let (d, log) = recording();
        d.route(POKE, "alice");
        assert_eq!(*log.lock().unwrap(), vec!["all:poke", "other:poke:unknown_type"]);
    }

    #[test]
    fn garbage_reaches_only_non_protocol() {
        let (d, log) = recording();
        d.route("not json", "alice");
        assert_eq!(*log.lock().unwrap(), vec!["raw:not json"]);
    }

    #[test]
    fn array_shaped_envelope_reaches_only_non_protocol() {
        let (d, log) = recording();
        let frame = r#"[1,"poke","bob",["alice"],{"x":1}]"#;
        let c = d.route(frame, "alice");
        assert_eq!(c.kind(), "non_protocol");
        assert_eq!(*log.lock().unwrap(), vec![format!("raw:{frame}")]);
    }

    #[test]
    fn failing_listeners_do_not_stop_the_rest() {
        let d = Dispatcher::new();
        let hits = Arc::new(Mutex::new(0));

        d.on_text_message(|_, _, _| Err("boom".into()));
        d.on_text_message(|_, _, _| panic!("listener panic"));
        let h = hits.clone();
        d.on_text_message(move |_, _, _| {
            *h.lock().unwrap() += 1;
            Ok(())
        });

        d.route(FROM_BOB, "alice");
        d.route(FROM_BOB, "alice");
        assert_eq!(*hits.lock().unwrap(), 2);
    }

    #[test]
    fn listeners_run_in_registration_order() {
        let d = Dispatcher::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..3 {
            let o = order.clone();
            d.on_all_messages(move |_| {
                o.lock().unwrap().push(i);
                Ok(())
            });
        }
        d.route(FROM_BOB, "alice");
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn clear_empties_every_channel() {
        let (d, log) = recording();
        d.on_connection_event(|_| Ok(()));
        d.clear();
        for ch in [
            ListenerChannel::AllMessages,
            ListenerChannel::Text,
            ListenerChannel::Data,
            ListenerChannel::Other,
            ListenerChannel::NonProtocol,
            ListenerChannel::Connection,
        ] {
            assert_eq!(d.registered(ch), 0, "channel={}", ch.as_str());
        }
        d.route(FROM_BOB, "alice");
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn listener_may_register_listeners() {
        let d = Arc::new(Dispatcher::new());
        let inner = d.clone();
        d.on_all_messages(move |_| {
            inner.on_all_messages(|_| Ok(()));
            Ok(())
        });
        d.route(FROM_BOB, "alice");
        assert_eq!(d.registered(ListenerChannel::AllMessages), 2);
    }
}
