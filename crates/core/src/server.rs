//! DNS server framework. A [`Server`] accepts datagram or stream
//! messages, decodes them, and dispatches each to its [`Handler`] on a
//! fresh task so handlers may block on upstream work without stalling the
//! accept loop.

use crate::codec::{pack, read_framed, unpack, write_framed, MAX_UDP_PAYLOAD};
use crate::error::DnsError;
use crate::reply;
use async_trait::async_trait;
use hickory_proto::op::Message;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream, UdpSocket};
use tracing::{debug, info};

/// Transport kind a server listens on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Network {
    Udp,
    Tcp,
}

/// The write half a [`Handler`] replies through. A writer wraps either a
/// packet socket with a remote address or a connected stream; framing is
/// applied by the stream variant only.
#[async_trait]
pub trait ResponseWriter: Send {
    /// Encode and send a full reply message.
    async fn write_msg(&mut self, msg: &Message) -> Result<(), DnsError>;

    /// Send an already-packed payload.
    async fn write(&mut self, payload: &[u8]) -> Result<(), DnsError>;
}

/// Replies to a datagram sender.
pub struct PacketWriter {
    socket: Arc<UdpSocket>,
    peer: SocketAddr,
}

#[async_trait]
impl ResponseWriter for PacketWriter {
    async fn write_msg(&mut self, msg: &Message) -> Result<(), DnsError> {
        let packed = pack(msg)?;
        self.socket.send_to(&packed, self.peer).await?;
        Ok(())
    }

    async fn write(&mut self, payload: &[u8]) -> Result<(), DnsError> {
        self.socket.send_to(payload, self.peer).await?;
        Ok(())
    }
}

/// Replies down a connected stream, applying the length prefix.
pub struct StreamWriter {
    stream: TcpStream,
}

#[async_trait]
impl ResponseWriter for StreamWriter {
    async fn write_msg(&mut self, msg: &Message) -> Result<(), DnsError> {
        let packed = pack(msg)?;
        write_framed(&mut self.stream, &packed).await
    }

    async fn write(&mut self, payload: &[u8]) -> Result<(), DnsError> {
        write_framed(&mut self.stream, payload).await
    }
}

/// Responds to one decoded DNS message. Implementations write their reply
/// to the [`ResponseWriter`] and return.
#[async_trait]
pub trait Handler: Send + Sync + 'static {
    async fn handle(&self, w: &mut dyn ResponseWriter, msg: &Message);
}

/// Safe fallback for a [`Server`] without a handler: recursive queries are
/// refused and everything else is answered with NotImplemented.
pub struct DefaultHandler;

#[async_trait]
impl Handler for DefaultHandler {
    async fn handle(&self, w: &mut dyn ResponseWriter, msg: &Message) {
        let rmsg = if msg.recursion_desired() {
            reply::refused(msg)
        } else {
            reply::not_implemented(msg)
        };
        if let Err(e) = w.write_msg(&rmsg).await {
            debug!(error = %e, "failed to write default reply");
        }
    }
}

/// Settings for running a DNS server.
pub struct Server {
    network: Network,
    addr: String,
    handler: Arc<dyn Handler>,
}

impl Server {
    /// A server that refuses everything via [`DefaultHandler`]; attach a
    /// real handler with [`Server::with_handler`].
    pub fn new(network: Network, addr: impl Into<String>) -> Self {
        Self {
            network,
            addr: addr.into(),
            handler: Arc::new(DefaultHandler),
        }
    }

    pub fn with_handler(mut self, handler: Arc<dyn Handler>) -> Self {
        self.handler = handler;
        self
    }

    /// Bind the configured address and serve until a fatal socket error.
    pub async fn listen_and_serve(&self) -> Result<(), DnsError> {
        let addr = if self.addr.is_empty() {
            "0.0.0.0:53"
        } else {
            &self.addr
        };
        match self.network {
            Network::Udp => {
                let socket = UdpSocket::bind(addr).await?;
                info!(addr = %addr, "listening on udp");
                serve_packet(socket, self.handler.clone()).await
            }
            Network::Tcp => {
                let listener = TcpListener::bind(addr).await?;
                info!(addr = %addr, "listening on tcp");
                serve(listener, self.handler.clone()).await
            }
        }
    }
}

/// Bind `addr` on `network` and dispatch received messages to `handler`.
/// Runs until a fatal socket error; an `Ok` return does not happen in a
/// healthy server.
pub async fn listen_and_serve(
    network: Network,
    addr: &str,
    handler: Arc<dyn Handler>,
) -> Result<(), DnsError> {
    Server::new(network, addr)
        .with_handler(handler)
        .listen_and_serve()
        .await
}

/// Serve datagrams from an already-bound socket.
///
/// A datagram that fails to decode is answered with a minimal Refused
/// reply carrying whatever of its header was readable.
pub async fn serve_packet(socket: UdpSocket, handler: Arc<dyn Handler>) -> Result<(), DnsError> {
    let socket = Arc::new(socket);
    let mut buf = vec![0u8; MAX_UDP_PAYLOAD];
    loop {
        let (n, peer) = socket.recv_from(&mut buf).await?;
        let datagram = buf[..n].to_vec();
        let socket = socket.clone();
        let handler = handler.clone();
        tokio::spawn(async move {
            let msg = match unpack(&datagram) {
                Ok(msg) => msg,
                Err(e) => {
                    debug!(peer = %peer, error = %e, "refusing undecodable datagram");
                    if let Ok(packed) = pack(&reply::refuse_fragment(&datagram)) {
                        let _ = socket.send_to(&packed, peer).await;
                    }
                    return;
                }
            };
            let mut w = PacketWriter { socket, peer };
            handler.handle(&mut w, &msg).await;
        });
    }
}

/// Serve stream connections from an already-bound listener.
///
/// Connections that deliver garbage are dropped once framing or decoding
/// fails.
pub async fn serve(listener: TcpListener, handler: Arc<dyn Handler>) -> Result<(), DnsError> {
    loop {
        let (mut stream, peer) = listener.accept().await?;
        let handler = handler.clone();
        tokio::spawn(async move {
            let payload = match read_framed(&mut stream).await {
                Ok(p) => p,
                Err(e) => {
                    debug!(peer = %peer, error = %e, "dropping stream: bad framing");
                    return;
                }
            };
            let msg = match unpack(&payload) {
                Ok(m) => m,
                Err(e) => {
                    debug!(peer = %peer, error = %e, "dropping stream: bad message");
                    return;
                }
            };
            let mut w = StreamWriter { stream };
            handler.handle(&mut w, &msg).await;
        });
    }
}
