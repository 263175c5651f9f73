//! Thrift binary protocol client plumbing
//!
//! Just enough of Apache Thrift to talk to a Hive metastore: the binary
//! protocol, buffered and framed transports, and a generic value tree.

pub mod codec;
pub mod message;
pub mod transport;
pub mod value;

pub use message::{ApplicationException, Message, MessageType};
pub use transport::{ThriftConnection, TransportKind};
pub use value::{Struct, TType, Value};
