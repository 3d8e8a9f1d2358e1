//! The protocol dispatcher: reads a command name and parameter list from
//! the channel, routes it to the bound [`StorageDriver`], streams any
//! payload through a [`Pipeline`] with block framing, and writes back a
//! response. Grounded on the teacher's `MessageHandler` chain-of-
//! responsibility trait and its connection worker's read-dispatch-write
//! loop.

use crate::block::BlockHeader;
use crate::channel::Channel;
use crate::command::{Command, CommandId, Response};
use crate::config::SessionConfig;
use crate::error::{Error, Result};
use crate::filter::{Direction, Pipeline};
use crate::storage::{StorageDriver, WriteOptions};
use crate::value::Value;
use maybe_async::maybe_async;
use std::io::{Read, Write};

/// A filter-list parameter is either absent (`Null`, meaning "no filters")
/// or a list of descriptors.
fn filter_list(value: &Value) -> Result<Vec<Value>> {
    match value {
        Value::Null => Ok(Vec::new()),
        _ => Ok(value.as_list()?.to_vec()),
    }
}

/// One protocol session: bound to exactly one channel and one storage
/// driver (the repository driver, or the cluster driver -- the caller picks
/// which, per [`SessionConfig::session_type`], before constructing this).
pub struct ProtocolServer<D: StorageDriver> {
    driver: D,
    config: SessionConfig,
}

impl<D: StorageDriver> ProtocolServer<D> {
    pub fn new(driver: D, config: SessionConfig) -> Result<Self> {
        config.validate()?;
        Ok(ProtocolServer { driver, config })
    }

    /// Serve commands from `channel` until it closes cleanly (EOF on the
    /// first read of a new command). Any other I/O fault propagates and
    /// ends the session.
    #[maybe_async]
    pub async fn serve<C: Channel>(&self, channel: &mut C) -> Result<()> {
        loop {
            let line = match channel.read_line().await {
                Ok(line) => line,
                Err(Error::Io(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                    return Ok(())
                }
                Err(e) => return Err(e),
            };

            let command = match Command::decode_line(&line) {
                Ok(command) => command,
                Err(e) => {
                    log::debug!("malformed command line: {e}");
                    self.write_response(channel, &Response::from(&e)).await?;
                    continue;
                }
            };
            let name = command.name.clone();
            log::trace!("dispatching {name}");

            let outcome = self.dispatch_one(channel, &command).await;
            match outcome {
                Ok(true) => {}
                Ok(false) => {
                    log::debug!("no handler for {name}");
                    self.write_response(channel, &Response::from(&Error::UnknownCommand(name)))
                        .await?
                }
                // A transport fault, as opposed to a logical command failure,
                // ends the session outright rather than merely aborting the
                // command -- there is no channel left in a known state to
                // write an error response onto.
                Err(e @ Error::Io(_)) => {
                    log::error!("{name}: transport fault: {e}");
                    return Err(e);
                }
                Err(e) => {
                    log::debug!("{name}: {e}");
                    self.write_response(channel, &Response::from(&e)).await?
                }
            }
        }
    }

    /// Dispatch one already-decoded command. Returns `Ok(false)` for a name
    /// outside the closed storage command set, so an outer multi-handler
    /// dispatch could try the next handler in the chain; this crate has
    /// only the storage handler, so a top-level `Ok(false)` always becomes
    /// a `ProtocolError` in [`Self::serve`].
    #[maybe_async]
    async fn dispatch_one<C: Channel>(&self, channel: &mut C, command: &Command) -> Result<bool> {
        let id = match command.id {
            Some(id) => id,
            None => return Ok(false),
        };

        match id {
            CommandId::Exists => {
                let path = command.param(0)?.as_str()?;
                let exists = self.driver.exists(path)?;
                self.respond(channel, Value::Bool(exists)).await?;
            }
            CommandId::Feature => {
                self.respond(channel, Value::UInt(self.driver.feature())).await?;
            }
            CommandId::List => {
                let path = command.param(0)?.as_str()?;
                let expression = command.param_or_null(1).as_opt_str()?;
                let names = self.driver.list(path, expression)?;
                self.respond(channel, Value::List(names.into_iter().map(Value::Str).collect()))
                    .await?;
            }
            CommandId::PathExists => {
                let path = command.param(0)?.as_str()?;
                let result = self
                    .driver
                    .path_exists(path)?
                    .ok_or(Error::PathExistsUnsupported)?;
                self.respond(channel, Value::Bool(result)).await?;
            }
            CommandId::PathCreate => {
                let path = command.param(0)?.as_str()?;
                let error_on_exists = command.param_or_null(1).as_bool_or(false)?;
                let no_parent_create = command.param_or_null(2).as_bool_or(false)?;
                let mode = command.param_or_null(3).as_opt_u32()?;
                self.driver
                    .path_create(path, error_on_exists, no_parent_create, mode)?;
                self.respond(channel, Value::Null).await?;
            }
            CommandId::PathRemove => {
                let path = command.param(0)?.as_str()?;
                let recursive = command.param_or_null(1).as_bool_or(false)?;
                let removed = self.driver.path_remove(path, recursive)?;
                self.respond(channel, Value::Bool(removed)).await?;
            }
            CommandId::PathSync => {
                let path = command.param(0)?.as_str()?;
                self.driver.path_sync(path)?;
                self.respond(channel, Value::Null).await?;
            }
            CommandId::Remove => {
                let path = command.param(0)?.as_str()?;
                let error_on_missing = command.param_or_null(1).as_bool_or(true)?;
                self.driver.remove(path, error_on_missing)?;
                self.respond(channel, Value::Null).await?;
            }
            CommandId::OpenRead => self.open_read(channel, command).await?,
            CommandId::OpenWrite => self.open_write(channel, command).await?,
        }
        Ok(true)
    }

    #[maybe_async]
    async fn open_read<C: Channel>(&self, channel: &mut C, command: &Command) -> Result<()> {
        let path = command.param(0)?.as_str()?;
        let ignore_missing = command.param_or_null(1).as_bool_or(false)?;
        let filter_descriptors = filter_list(command.param_or_null(2))?;
        let mut pipeline = Pipeline::build(&filter_descriptors, Direction::Read)?;

        let handle = self.driver.new_read(path, ignore_missing)?;
        let mut handle = match handle {
            Some(h) => h,
            None => {
                // No handle was constructed: respond `false` and stop. No
                // filter-result frame follows -- there is nothing to report.
                self.respond(channel, Value::Bool(false)).await?;
                return Ok(());
            }
        };

        self.respond(channel, Value::Bool(true)).await?;

        let mut buf = vec![0u8; self.config.io_buffer_size];
        loop {
            let n = handle.read(&mut buf)?;
            if n == 0 {
                break;
            }
            let transformed = pipeline.process(&buf[..n])?;
            self.emit_block(channel, &transformed).await?;
        }
        let trailing = pipeline.finish()?;
        self.emit_block(channel, &trailing).await?;

        channel.write_line(&BlockHeader::End.encode()).await?;
        channel.flush().await?;

        self.respond(channel, pipeline.result()).await?;
        Ok(())
    }

    #[maybe_async]
    async fn emit_block<C: Channel>(&self, channel: &mut C, payload: &[u8]) -> Result<()> {
        if payload.is_empty() {
            return Ok(());
        }
        channel
            .write_line(&BlockHeader::Payload(payload.len() as u64).encode())
            .await?;
        channel.write_bytes(payload).await?;
        channel.flush().await?;
        Ok(())
    }

    #[maybe_async]
    async fn open_write<C: Channel>(&self, channel: &mut C, command: &Command) -> Result<()> {
        let path = command.param(0)?.as_str()?;
        let options = WriteOptions {
            mode_file: command.param_or_null(1).as_opt_u32()?,
            mode_path: command.param_or_null(2).as_opt_u32()?,
            user: command.param_or_null(3).as_opt_str()?.map(str::to_owned),
            group: command.param_or_null(4).as_opt_str()?.map(str::to_owned),
            mtime: command.param_or_null(5).as_opt_i64()?,
            create_path: command.param_or_null(6).as_bool_or(false)?,
            sync_file: command.param_or_null(7).as_bool_or(false)?,
            sync_path: command.param_or_null(8).as_bool_or(false)?,
            atomic: command.param_or_null(9).as_bool_or(false)?,
        };
        let filter_descriptors = filter_list(command.param_or_null(10))?;
        let mut pipeline = Pipeline::build(&filter_descriptors, Direction::Write)?;

        let mut handle = self.driver.new_write(path, options)?;
        self.respond(channel, Value::Null).await?;

        loop {
            let line = channel.read_line().await?;
            match BlockHeader::decode(&line)? {
                BlockHeader::Payload(mut remaining) => {
                    while remaining > 0 {
                        let chunk_size =
                            remaining.min(self.config.io_buffer_size as u64) as usize;
                        let chunk = channel.read_bytes(chunk_size).await?;
                        let transformed = pipeline.process(&chunk)?;
                        handle.write_all(&transformed)?;
                        remaining -= chunk.len() as u64;
                    }
                }
                BlockHeader::End => {
                    let trailing = pipeline.finish()?;
                    handle.write_all(&trailing)?;
                    handle.commit()?;
                    self.respond(channel, pipeline.result()).await?;
                    return Ok(());
                }
                BlockHeader::Abort => {
                    handle.abandon()?;
                    self.respond(channel, Value::Null).await?;
                    return Ok(());
                }
            }
        }
    }

    #[maybe_async]
    async fn respond<C: Channel>(&self, channel: &mut C, value: Value) -> Result<()> {
        self.write_response(channel, &Response::Ok(value)).await
    }

    #[maybe_async]
    async fn write_response<C: Channel>(&self, channel: &mut C, response: &Response) -> Result<()> {
        channel.write_line(&response.encode_line()).await?;
        channel.flush().await?;
        Ok(())
    }
}
