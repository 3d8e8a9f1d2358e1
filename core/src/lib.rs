//! Core protocol library for a remote storage subsystem: a framed command
//! channel, a typed value codec, a streaming filter pipeline, a storage
//! driver capability surface, and the dispatcher that ties them together.

pub mod block;
pub mod channel;
pub mod command;
pub mod config;
pub mod error;
pub mod filter;
pub mod server;
pub mod storage;
pub mod value;

pub use block::BlockHeader;
pub use channel::{Channel, StreamChannel};
pub use command::{Command, CommandId, Response};
pub use config::{RepoCipher, SessionConfig, SessionType};
pub use error::{Error, Result};
pub use filter::{Direction, Filter, Pipeline};
pub use server::ProtocolServer;
pub use storage::{feature, ReadHandle, StorageDriver, WriteHandle, WriteOptions};
pub use value::Value;
