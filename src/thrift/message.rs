use bytes::{BufMut, BytesMut};
use std::convert::TryFrom;

use crate::common::{Error, Result};
use crate::thrift::codec::{
    read_i32, read_string, read_struct, read_u8, write_string, write_struct, DecodeError,
    DecodeResult,
};
use crate::thrift::value::{Struct, Value};

const VERSION_1: u32 = 0x8001_0000;
const VERSION_MASK: u32 = 0xffff_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Call,
    Reply,
    Exception,
    Oneway,
}

impl MessageType {
    fn code(self) -> u8 {
        match self {
            MessageType::Call => 1,
            MessageType::Reply => 2,
            MessageType::Exception => 3,
            MessageType::Oneway => 4,
        }
    }
}

impl TryFrom<u8> for MessageType {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            1 => Ok(MessageType::Call),
            2 => Ok(MessageType::Reply),
            3 => Ok(MessageType::Exception),
            4 => Ok(MessageType::Oneway),
            other => Err(Error::Protocol(format!("Unknown message type {}", other))),
        }
    }
}

/// One Thrift message: header plus the argument or result struct
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub name: String,
    pub kind: MessageType,
    pub seq: i32,
    pub body: Struct,
}

impl Message {
    pub fn call(name: &str, seq: i32, args: Struct) -> Self {
        Self {
            name: name.to_string(),
            kind: MessageType::Call,
            seq,
            body: args,
        }
    }

    pub fn reply(name: &str, seq: i32, result: Struct) -> Self {
        Self {
            name: name.to_string(),
            kind: MessageType::Reply,
            seq,
            body: result,
        }
    }

    /// Strict binary protocol encoding
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(VERSION_1 | self.kind.code() as u32);
        write_string(buf, self.name.as_bytes());
        buf.put_i32(self.seq);
        write_struct(buf, &self.body);
    }

    /// Decode one message from the front of `buf`, accepting strict and
    /// pre-versioned headers.
    pub fn decode(buf: &mut &[u8]) -> DecodeResult<Self> {
        let first = read_i32(buf)?;
        let (name, kind) = if first < 0 {
            let header = first as u32;
            if header & VERSION_MASK != VERSION_1 {
                return Err(DecodeError::Invalid(format!(
                    "Bad protocol version {:#010x}",
                    header & VERSION_MASK
                )));
            }
            let kind = MessageType::try_from((header & 0xff) as u8)?;
            (read_string(buf)?, kind)
        } else {
            let len = first as usize;
            let remaining = *buf;
            if remaining.len() < len {
                return Err(DecodeError::Incomplete);
            }
            let (name, rest) = remaining.split_at(len);
            let name = String::from_utf8(name.to_vec())
                .map_err(|e| DecodeError::Invalid(format!("Invalid method name: {}", e)))?;
            *buf = rest;
            let kind = MessageType::try_from(read_u8(buf)?)?;
            (name, kind)
        };
        let seq = read_i32(buf)?;
        let body = read_struct(buf)?;
        Ok(Self {
            name,
            kind,
            seq,
            body,
        })
    }
}

/// Server-side failure carried by an EXCEPTION message
#[derive(Debug, Clone, PartialEq)]
pub struct ApplicationException {
    pub message: String,
    pub kind: i32,
}

impl ApplicationException {
    pub fn from_struct(s: &Struct) -> Self {
        Self {
            message: s.get_str(1).unwrap_or_default().to_string(),
            kind: s.get(2).and_then(|v| v.as_i32()).unwrap_or(0),
        }
    }

    pub fn to_struct(&self) -> Struct {
        Struct::new()
            .with(1, Value::string(self.message.clone()))
            .with(2, Value::I32(self.kind))
    }
}
