use hickory_proto::op::Message;
use thiserror::Error;

/// Failure modes of a single DNS exchange.
#[derive(Error, Debug)]
pub enum DnsError {
    #[error("failed to encode message: {0}")]
    Pack(String),

    #[error("failed to decode message: {0}")]
    Unpack(String),

    #[error("transport: {0}")]
    Transport(#[from] std::io::Error),

    /// The reply did not answer the request we sent. The decoded reply is
    /// kept for diagnostics.
    #[error("mismatched message id: sent {sent}, received {received}")]
    MismatchedId {
        sent: u16,
        received: u16,
        reply: Box<Message>,
    },
}
