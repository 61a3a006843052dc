//! Synchronous request/response exchanges with a single DNS server over
//! UDP, TCP or TLS. One message out, one message back, no retries.

use crate::codec::{pack, read_framed, unpack, write_framed, MAX_UDP_PAYLOAD};
use crate::error::DnsError;
use hickory_proto::op::Message;
use rustls::pki_types::ServerName;
use std::io;
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, UdpSocket};
use tokio::time::timeout;
use tracing::debug;

/// Deadline applied to each blocking phase of an exchange (dial, receive).
pub const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(2);

static SHARED_TLS_CONFIG: LazyLock<Arc<rustls::ClientConfig>> = LazyLock::new(|| {
    let mut root_store = rustls::RootCertStore::empty();
    root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let config = rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth();

    Arc::new(config)
});

/// Perform an unencrypted UDP exchange with `addr` and return its reply to
/// `msg`. One send, one receive.
pub async fn exchange(msg: &Message, addr: &str) -> Result<Message, DnsError> {
    let packed = pack(msg)?;

    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket.connect(addr).await?;
    socket.send(&packed).await?;

    let mut buf = vec![0u8; MAX_UDP_PAYLOAD];
    let n = timeout(EXCHANGE_TIMEOUT, socket.recv(&mut buf))
        .await
        .map_err(|_| timeout_err(addr))??;

    debug!(server = %addr, bytes = n, "udp reply received");
    check_id(msg.id(), unpack(&buf[..n])?)
}

/// Perform a TCP exchange with `addr`; request and reply carry the 16-bit
/// length prefix.
pub async fn exchange_tcp(msg: &Message, addr: &str) -> Result<Message, DnsError> {
    let packed = pack(msg)?;

    let mut stream = timeout(EXCHANGE_TIMEOUT, TcpStream::connect(addr))
        .await
        .map_err(|_| timeout_err(addr))??;

    exchange_stream(msg.id(), &packed, &mut stream, addr).await
}

/// Perform a DNS-over-TLS exchange with `addr`. The certificate is
/// verified against the host part of `addr`.
pub async fn exchange_tls(msg: &Message, addr: &str) -> Result<Message, DnsError> {
    let packed = pack(msg)?;

    let host = addr.rsplit_once(':').map(|(h, _)| h).unwrap_or(addr);
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|e| DnsError::Transport(io::Error::new(io::ErrorKind::InvalidInput, e)))?;

    let connector = tokio_rustls::TlsConnector::from(SHARED_TLS_CONFIG.clone());
    let tcp = timeout(EXCHANGE_TIMEOUT, TcpStream::connect(addr))
        .await
        .map_err(|_| timeout_err(addr))??;
    let mut stream = timeout(EXCHANGE_TIMEOUT, connector.connect(server_name, tcp))
        .await
        .map_err(|_| timeout_err(addr))??;

    debug!(server = %addr, host = %host, "tls connection established");
    exchange_stream(msg.id(), &packed, &mut stream, addr).await
}

async fn exchange_stream<S>(
    id: u16,
    packed: &[u8],
    stream: &mut S,
    addr: &str,
) -> Result<Message, DnsError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    write_framed(stream, packed).await?;
    let reply = timeout(EXCHANGE_TIMEOUT, read_framed(stream))
        .await
        .map_err(|_| timeout_err(addr))??;

    debug!(server = %addr, bytes = reply.len(), "stream reply received");
    check_id(id, unpack(&reply)?)
}

fn check_id(sent: u16, reply: Message) -> Result<Message, DnsError> {
    if reply.id() != sent {
        return Err(DnsError::MismatchedId {
            sent,
            received: reply.id(),
            reply: Box::new(reply),
        });
    }
    Ok(reply)
}

fn timeout_err(addr: &str) -> DnsError {
    DnsError::Transport(io::Error::new(
        io::ErrorKind::TimedOut,
        format!("timed out waiting for {addr}"),
    ))
}
