//! Wire codec glue: packing and unpacking through `hickory-proto`, plus the
//! two-octet big-endian length framing used by stream transports.

use crate::error::DnsError;
use hickory_proto::op::Message;
use hickory_proto::serialize::binary::{BinEncodable, BinEncoder};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Largest payload a datagram read will accept without truncation.
pub(crate) const MAX_UDP_PAYLOAD: usize = 512;

/// Initial buffer for framed stream reads; grown once when the announced
/// length exceeds it.
const STREAM_READ_BUF: usize = 1280;

/// Encode `msg` into its on-the-wire form.
pub fn pack(msg: &Message) -> Result<Vec<u8>, DnsError> {
    let mut buf = Vec::with_capacity(512);
    let mut encoder = BinEncoder::new(&mut buf);
    msg.emit(&mut encoder)
        .map_err(|e| DnsError::Pack(e.to_string()))?;
    Ok(buf)
}

/// Decode a message from its on-the-wire form.
pub fn unpack(bytes: &[u8]) -> Result<Message, DnsError> {
    Message::from_vec(bytes).map_err(|e| DnsError::Unpack(e.to_string()))
}

/// Write `payload` prefixed with its 16-bit big-endian length.
pub(crate) async fn write_framed<S>(stream: &mut S, payload: &[u8]) -> Result<(), DnsError>
where
    S: AsyncWrite + Unpin,
{
    let len = payload.len() as u16;
    stream.write_all(&len.to_be_bytes()).await?;
    stream.write_all(payload).await?;
    stream.flush().await?;
    Ok(())
}

/// Read one length-prefixed payload: two octets of length, then exactly
/// that many octets of message.
pub(crate) async fn read_framed<S>(stream: &mut S) -> Result<Vec<u8>, DnsError>
where
    S: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; STREAM_READ_BUF];
    stream.read_exact(&mut buf[..2]).await?;
    let len = u16::from_be_bytes([buf[0], buf[1]]) as usize;
    if len > buf.len() {
        buf = vec![0u8; len];
    }
    stream.read_exact(&mut buf[..len]).await?;
    buf.truncate(len);
    Ok(buf)
}
