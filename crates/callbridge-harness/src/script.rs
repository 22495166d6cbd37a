//! Scripted client behavior
//!
//! A client script is the sequence of listener callbacks a transport would make
//! for one call.

use callbridge_core::CallListener;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientStep<Req> {
    Message(Req),
    HalfClose,
    Cancel,
}

impl<Req> ClientStep<Req> {
    /// Messages followed by a half-close
    pub fn messages_then_half_close(messages: impl IntoIterator<Item = Req>) -> Vec<Self> {
        messages
            .into_iter()
            .map(ClientStep::Message)
            .chain(std::iter::once(ClientStep::HalfClose))
            .collect()
    }
}

/// Deliver `steps` to `listener` in order, as the transport would
pub fn drive<Req, L>(listener: &mut L, steps: impl IntoIterator<Item = ClientStep<Req>>)
where
    L: CallListener<Req> + ?Sized,
{
    for step in steps {
        match step {
            ClientStep::Message(message) => listener.on_message(message),
            ClientStep::HalfClose => listener.on_half_close(),
            ClientStep::Cancel => listener.on_cancel(),
        }
    }
}
