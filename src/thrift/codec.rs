//! Thrift binary protocol encoding.
//!
//! Decoding runs over a byte slice that may hold only part of a message;
//! running out of input yields [`DecodeError::Incomplete`] so the caller can
//! read more from the socket and try again.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::convert::TryFrom;

use crate::common::Error;
use crate::thrift::value::{Struct, TType, Value};

/// Nesting limit for decoded structs and containers
const MAX_DEPTH: usize = 64;

#[derive(Debug)]
pub enum DecodeError {
    /// More bytes are needed
    Incomplete,
    /// The bytes are not valid Thrift
    Invalid(String),
}

impl From<DecodeError> for Error {
    fn from(e: DecodeError) -> Self {
        match e {
            DecodeError::Incomplete => Error::Protocol("Truncated Thrift message".to_string()),
            DecodeError::Invalid(msg) => Error::Protocol(msg),
        }
    }
}

impl From<Error> for DecodeError {
    fn from(e: Error) -> Self {
        DecodeError::Invalid(e.to_string())
    }
}

pub type DecodeResult<T> = std::result::Result<T, DecodeError>;

fn need(buf: &&[u8], n: usize) -> DecodeResult<()> {
    if buf.remaining() < n {
        Err(DecodeError::Incomplete)
    } else {
        Ok(())
    }
}

pub fn read_u8(buf: &mut &[u8]) -> DecodeResult<u8> {
    need(buf, 1)?;
    Ok(buf.get_u8())
}

pub fn read_i16(buf: &mut &[u8]) -> DecodeResult<i16> {
    need(buf, 2)?;
    Ok(buf.get_i16())
}

pub fn read_i32(buf: &mut &[u8]) -> DecodeResult<i32> {
    need(buf, 4)?;
    Ok(buf.get_i32())
}

fn read_size(buf: &mut &[u8]) -> DecodeResult<usize> {
    let size = read_i32(buf)?;
    usize::try_from(size).map_err(|_| DecodeError::Invalid(format!("Negative size {}", size)))
}

pub fn read_binary(buf: &mut &[u8]) -> DecodeResult<Bytes> {
    let len = read_size(buf)?;
    need(buf, len)?;
    Ok(buf.copy_to_bytes(len))
}

pub fn read_string(buf: &mut &[u8]) -> DecodeResult<String> {
    let bytes = read_binary(buf)?;
    String::from_utf8(bytes.to_vec())
        .map_err(|e| DecodeError::Invalid(format!("Invalid UTF-8 string: {}", e)))
}

fn read_ttype(buf: &mut &[u8]) -> DecodeResult<TType> {
    Ok(TType::try_from(read_u8(buf)?)?)
}

pub fn read_value(buf: &mut &[u8], ttype: TType) -> DecodeResult<Value> {
    read_value_at(buf, ttype, 0)
}

pub fn read_struct(buf: &mut &[u8]) -> DecodeResult<Struct> {
    read_struct_at(buf, 0)
}

fn read_struct_at(buf: &mut &[u8], depth: usize) -> DecodeResult<Struct> {
    if depth > MAX_DEPTH {
        return Err(DecodeError::Invalid("Struct nesting too deep".to_string()));
    }
    let mut s = Struct::new();
    loop {
        let ttype = read_ttype(buf)?;
        if ttype == TType::Stop {
            return Ok(s);
        }
        let id = read_i16(buf)?;
        let value = read_value_at(buf, ttype, depth + 1)?;
        s.push(id, value);
    }
}

fn read_items(
    buf: &mut &[u8],
    elem_type: TType,
    size: usize,
    depth: usize,
) -> DecodeResult<Vec<Value>> {
    // Each element takes at least one byte; cap preallocation by what is buffered.
    let mut items = Vec::with_capacity(size.min(buf.remaining()));
    for _ in 0..size {
        items.push(read_value_at(buf, elem_type, depth + 1)?);
    }
    Ok(items)
}

fn read_value_at(buf: &mut &[u8], ttype: TType, depth: usize) -> DecodeResult<Value> {
    if depth > MAX_DEPTH {
        return Err(DecodeError::Invalid("Value nesting too deep".to_string()));
    }
    let value = match ttype {
        TType::Bool => Value::Bool(read_u8(buf)? != 0),
        TType::Byte => Value::Byte(read_u8(buf)? as i8),
        TType::Double => {
            need(buf, 8)?;
            Value::Double(buf.get_f64())
        }
        TType::I16 => Value::I16(read_i16(buf)?),
        TType::I32 => Value::I32(read_i32(buf)?),
        TType::I64 => {
            need(buf, 8)?;
            Value::I64(buf.get_i64())
        }
        TType::String => Value::Binary(read_binary(buf)?),
        TType::Struct => Value::Struct(read_struct_at(buf, depth)?),
        TType::Map => {
            let key_type = read_ttype(buf)?;
            let value_type = read_ttype(buf)?;
            let size = read_size(buf)?;
            let mut entries = Vec::with_capacity(size.min(buf.remaining()));
            for _ in 0..size {
                let k = read_value_at(buf, key_type, depth + 1)?;
                let v = read_value_at(buf, value_type, depth + 1)?;
                entries.push((k, v));
            }
            Value::Map {
                key_type,
                value_type,
                entries,
            }
        }
        TType::Set => {
            let elem_type = read_ttype(buf)?;
            let size = read_size(buf)?;
            Value::Set {
                elem_type,
                items: read_items(buf, elem_type, size, depth)?,
            }
        }
        TType::List => {
            let elem_type = read_ttype(buf)?;
            let size = read_size(buf)?;
            Value::List {
                elem_type,
                items: read_items(buf, elem_type, size, depth)?,
            }
        }
        TType::Stop | TType::Void => {
            return Err(DecodeError::Invalid(format!(
                "{:?} is not a value type",
                ttype
            )))
        }
    };
    Ok(value)
}

pub fn write_string(buf: &mut BytesMut, s: &[u8]) {
    buf.put_i32(s.len() as i32);
    buf.put_slice(s);
}

pub fn write_struct(buf: &mut BytesMut, s: &Struct) {
    for (id, value) in s.fields() {
        buf.put_u8(value.ttype().code());
        buf.put_i16(*id);
        write_value(buf, value);
    }
    buf.put_u8(TType::Stop.code());
}

pub fn write_value(buf: &mut BytesMut, value: &Value) {
    match value {
        Value::Bool(b) => buf.put_u8(u8::from(*b)),
        Value::Byte(b) => buf.put_i8(*b),
        Value::Double(d) => buf.put_f64(*d),
        Value::I16(v) => buf.put_i16(*v),
        Value::I32(v) => buf.put_i32(*v),
        Value::I64(v) => buf.put_i64(*v),
        Value::Binary(b) => write_string(buf, b),
        Value::Struct(s) => write_struct(buf, s),
        Value::Map {
            key_type,
            value_type,
            entries,
        } => {
            buf.put_u8(key_type.code());
            buf.put_u8(value_type.code());
            buf.put_i32(entries.len() as i32);
            for (k, v) in entries {
                write_value(buf, k);
                write_value(buf, v);
            }
        }
        Value::Set { elem_type, items } | Value::List { elem_type, items } => {
            buf.put_u8(elem_type.code());
            buf.put_i32(items.len() as i32);
            for item in items {
                write_value(buf, item);
            }
        }
    }
}
