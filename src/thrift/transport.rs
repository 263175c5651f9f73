//! Thrift transports over an async byte stream.

use bytes::{Buf, BufMut, BytesMut};
use serde::Deserialize;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::common::{Error, Result};
use crate::thrift::codec::DecodeError;
use crate::thrift::message::{ApplicationException, Message, MessageType};
use crate::thrift::value::Struct;

/// Frames larger than this are rejected rather than buffered
const MAX_FRAME_SIZE: usize = 256 * 1024 * 1024;

const READ_CHUNK_SIZE: usize = 8 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    /// Messages written back to back on the stream
    #[default]
    Buffered,
    /// Each message preceded by its 4-byte big-endian length
    Framed,
}

/// A Thrift connection: one request in flight at a time
pub struct ThriftConnection<S = TcpStream> {
    stream: S,
    kind: TransportKind,
    read_buf: BytesMut,
    seq: i32,
}

impl<S> ThriftConnection<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, kind: TransportKind) -> Self {
        Self {
            stream,
            kind,
            read_buf: BytesMut::with_capacity(READ_CHUNK_SIZE),
            seq: 0,
        }
    }

    /// Invoke `method` and return its result struct
    pub async fn call(&mut self, method: &str, args: Struct) -> Result<Struct> {
        self.seq = self.seq.wrapping_add(1);
        let seq = self.seq;
        tracing::debug!("thrift call {} seq={}", method, seq);
        self.write_message(&Message::call(method, seq, args)).await?;

        let reply = self.read_message().await?;
        if reply.name != method || reply.seq != seq {
            return Err(Error::Protocol(format!(
                "Reply {}#{} does not match call {}#{}",
                reply.name, reply.seq, method, seq
            )));
        }
        match reply.kind {
            MessageType::Reply => Ok(reply.body),
            MessageType::Exception => {
                let ex = ApplicationException::from_struct(&reply.body);
                Err(Error::Metastore {
                    kind: format!("TApplicationException({})", ex.kind),
                    message: format!("{}: {}", method, ex.message),
                })
            }
            other => Err(Error::Protocol(format!(
                "Unexpected {:?} message in reply to {}",
                other, method
            ))),
        }
    }

    pub async fn write_message(&mut self, message: &Message) -> Result<()> {
        let mut payload = BytesMut::new();
        message.encode(&mut payload);

        let mut out = match self.kind {
            TransportKind::Buffered => payload,
            TransportKind::Framed => {
                let mut framed = BytesMut::with_capacity(4 + payload.len());
                framed.put_u32(payload.len() as u32);
                framed.extend_from_slice(&payload);
                framed
            }
        };
        self.stream
            .write_all_buf(&mut out)
            .await
            .map_err(|e| Error::CatalogUnavailable(format!("Write failed: {}", e)))?;
        self.stream
            .flush()
            .await
            .map_err(|e| Error::CatalogUnavailable(format!("Flush failed: {}", e)))?;
        Ok(())
    }

    /// Read the next message; `Ok(None)` on a clean end of stream
    pub async fn try_read_message(&mut self) -> Result<Option<Message>> {
        loop {
            if let Some(message) = self.parse_message()? {
                return Ok(Some(message));
            }
            let n = self
                .stream
                .read_buf(&mut self.read_buf)
                .await
                .map_err(|e| Error::CatalogUnavailable(format!("Read failed: {}", e)))?;
            if n == 0 {
                if self.read_buf.is_empty() {
                    return Ok(None);
                }
                return Err(Error::CatalogUnavailable(
                    "Connection closed mid-message".to_string(),
                ));
            }
        }
    }

    pub async fn read_message(&mut self) -> Result<Message> {
        self.try_read_message()
            .await?
            .ok_or_else(|| Error::CatalogUnavailable("Connection closed by peer".to_string()))
    }

    /// Try to take one complete message off the front of the read buffer
    fn parse_message(&mut self) -> Result<Option<Message>> {
        match self.kind {
            TransportKind::Buffered => {
                let mut slice = &self.read_buf[..];
                match Message::decode(&mut slice) {
                    Ok(message) => {
                        let consumed = self.read_buf.len() - slice.len();
                        self.read_buf.advance(consumed);
                        Ok(Some(message))
                    }
                    Err(DecodeError::Incomplete) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            }
            TransportKind::Framed => {
                if self.read_buf.len() < 4 {
                    return Ok(None);
                }
                let len = u32::from_be_bytes([
                    self.read_buf[0],
                    self.read_buf[1],
                    self.read_buf[2],
                    self.read_buf[3],
                ]) as usize;
                if len > MAX_FRAME_SIZE {
                    return Err(Error::Protocol(format!("Frame of {} bytes is too large", len)));
                }
                if self.read_buf.len() < 4 + len {
                    self.read_buf.reserve(4 + len - self.read_buf.len());
                    return Ok(None);
                }
                self.read_buf.advance(4);
                let frame = self.read_buf.split_to(len);
                let mut slice = &frame[..];
                let message = Message::decode(&mut slice)?;
                if !slice.is_empty() {
                    return Err(Error::Protocol(format!(
                        "{} trailing bytes in frame",
                        slice.len()
                    )));
                }
                Ok(Some(message))
            }
        }
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.stream.shutdown().await?;
        Ok(())
    }
}
