//! Small DNS client and server building blocks around the `hickory-proto`
//! message types. Supports plain UDP, TCP and DNS over TLS.
//!
//! The crate deliberately does not implement all features of the DNS
//! specifications. Notably EDNS(0) and DNSSEC are unsupported.
//!
//! The most basic operation is building a message, sending it to a server
//! and handling the reply with [`exchange`]:
//!
//! ```no_run
//! use burrow_dns_core::exchange;
//! use hickory_proto::op::{Message, MessageType, OpCode, Query};
//! use hickory_proto::rr::{DNSClass, Name, RecordType};
//! use std::str::FromStr;
//!
//! # async fn run() -> Result<(), burrow_dns_core::DnsError> {
//! let mut query = Query::new();
//! query.set_name(Name::from_str("www.example.com.").unwrap());
//! query.set_query_type(RecordType::A);
//! query.set_query_class(DNSClass::IN);
//!
//! let mut msg = Message::new();
//! msg.set_id(1);
//! msg.set_message_type(MessageType::Query);
//! msg.set_op_code(OpCode::Query);
//! msg.set_recursion_desired(true);
//! msg.add_query(query);
//!
//! let reply = exchange(&msg, "9.9.9.9:53").await?;
//! # Ok(())
//! # }
//! ```
//!
//! [`listen_and_serve`] starts a DNS server on the given network and
//! address. Each received message is dispatched to the [`Handler`] on its
//! own task; replies go back through a [`ResponseWriter`]. A server built
//! without a handler gracefully refuses everything it is asked.

pub mod codec;
pub mod error;
pub mod exchange;
pub mod reply;
pub mod server;

pub use error::DnsError;
pub use exchange::{exchange, exchange_tcp, exchange_tls, EXCHANGE_TIMEOUT};
pub use server::{
    listen_and_serve, serve, serve_packet, DefaultHandler, Handler, Network, ResponseWriter,
    Server,
};

/// Media type for DNS messages carried in HTTP bodies (RFC 8484).
pub const MEDIA_TYPE: &str = "application/dns-message";

/// Largest DNS message carried by any transport; the 16-bit stream length
/// prefix cannot frame anything bigger.
pub const MAX_MSG_SIZE: usize = 65_535;
