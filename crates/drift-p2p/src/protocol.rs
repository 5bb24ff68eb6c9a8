//! Stream protocols and framing.
//!
//! A stream starts with a protocol identifier terminated by `\n`. After
//! that, both protocols exchange frames: a big-endian `u32` length
//! followed by that many bytes. A zero-length frame ends a sequence.

use crate::{P2pError, Result};
use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{
    AsyncBufRead, AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt,
};

/// Identifier of the hello protocol.
pub const HELLO_PROTOCOL: &str = "/drift/hello/1.0.0";

/// Identifier of the object-transfer protocol.
pub const OBJECT_TRANSFER_PROTOCOL: &str = "/drift/object-transfer/1.0.0";

/// Longest accepted protocol identifier line.
const MAX_PROTOCOL_LINE: usize = 128;

/// Default upper bound on a single frame.
pub const DEFAULT_MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

/// The protocols a stream can speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    /// Peer identifier exchange.
    Hello,
    /// Object transfer.
    ObjectTransfer,
}

impl Protocol {
    /// Returns the wire identifier.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Protocol::Hello => HELLO_PROTOCOL,
            Protocol::ObjectTransfer => OBJECT_TRANSFER_PROTOCOL,
        }
    }

    /// Parses a wire identifier.
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            HELLO_PROTOCOL => Ok(Protocol::Hello),
            OBJECT_TRANSFER_PROTOCOL => Ok(Protocol::ObjectTransfer),
            _ => Err(P2pError::Protocol(format!("unsupported protocol: {}", s))),
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Writes the protocol identifier line that opens a stream.
pub async fn write_protocol<W: AsyncWrite + Unpin>(writer: &mut W, protocol: Protocol) -> Result<()> {
    let mut buf = BytesMut::with_capacity(protocol.as_str().len() + 1);
    buf.put_slice(protocol.as_str().as_bytes());
    buf.put_u8(b'\n');
    writer.write_all(&buf).await?;
    Ok(())
}

/// Reads the protocol identifier line that opens a stream.
pub async fn read_protocol<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Protocol> {
    let mut line = Vec::new();
    let mut limited = reader.take(MAX_PROTOCOL_LINE as u64 + 1);
    limited.read_until(b'\n', &mut line).await?;

    if line.last() != Some(&b'\n') {
        return Err(P2pError::Protocol(if line.len() > MAX_PROTOCOL_LINE {
            "protocol identifier too long".into()
        } else {
            "stream closed before protocol identifier".into()
        }));
    }
    line.pop();

    let id = std::str::from_utf8(&line)
        .map_err(|_| P2pError::Protocol("protocol identifier is not UTF-8".into()))?;
    Protocol::parse(id)
}

/// Encodes one frame.
///
/// # Errors
///
/// Returns [`P2pError::Protocol`] if the payload does not fit the `u32`
/// length prefix.
pub fn encode_frame(payload: &[u8]) -> Result<Bytes> {
    let len = frame_len(payload.len())?;
    let mut buf = BytesMut::with_capacity(4 + payload.len());
    buf.put_u32(len);
    buf.put_slice(payload);
    Ok(buf.freeze())
}

fn frame_len(len: usize) -> Result<u32> {
    u32::try_from(len)
        .map_err(|_| P2pError::Protocol(format!("frame of {len} bytes exceeds the wire limit")))
}

/// Writes one frame. The payload must be non-empty; an empty frame is the
/// sequence terminator written by [`write_end`].
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, payload: &[u8]) -> Result<()> {
    if payload.is_empty() {
        return Err(P2pError::Protocol("refusing to write an empty frame".into()));
    }
    writer.write_all(&encode_frame(payload)?).await?;
    Ok(())
}

/// Writes the zero-length frame that ends a sequence.
pub async fn write_end<W: AsyncWrite + Unpin>(writer: &mut W) -> Result<()> {
    writer.write_u32(0).await?;
    Ok(())
}

/// Reads one frame. Returns `None` at the end-of-sequence frame.
pub async fn read_frame<R: AsyncRead + Unpin>(
    reader: &mut R,
    max_len: usize,
) -> Result<Option<Bytes>> {
    let len = reader.read_u32().await? as usize;
    if len == 0 {
        return Ok(None);
    }
    if len > max_len {
        return Err(P2pError::Protocol(format!(
            "frame of {} bytes exceeds limit of {}",
            len, max_len
        )));
    }
    let mut buf = BytesMut::zeroed(len);
    reader.read_exact(&mut buf).await?;
    Ok(Some(buf.freeze()))
}
