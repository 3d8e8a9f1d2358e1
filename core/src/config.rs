//! Session-level configuration, supplied before the first command.
//! Mirrors the teacher's `ConnectionConfig`/`ClientConfig` builder-ish
//! structs and their `validate` step.

use crate::error::{Error, Result};

/// Which storage a session's paths resolve against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionType {
    /// Paths resolve relative to the repository.
    Backup,
    /// Paths resolve relative to the database cluster.
    Db,
}

impl SessionType {
    pub fn parse(s: &str) -> Option<SessionType> {
        match s {
            "backup" => Some(SessionType::Backup),
            "db" => Some(SessionType::Db),
            _ => None,
        }
    }
}

/// The repository cipher in effect for this session, if any. Carried here
/// rather than baked into a filter descriptor so the session can validate
/// it up front, the way the teacher validates its negotiated dialect before
/// any command runs.
#[derive(Debug, Clone, Default)]
pub struct RepoCipher {
    pub cipher_type: Option<String>,
    pub passphrase: Option<String>,
}

/// Per-session configuration. `io_buffer_size` bounds both the chunk size
/// used when streaming an `openRead` payload and the per-read cap applied
/// while draining an `openWrite` block.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub session_type: SessionType,
    pub repo_cipher: RepoCipher,
    pub io_buffer_size: usize,
}

impl SessionConfig {
    pub const DEFAULT_IO_BUFFER_SIZE: usize = 64 * 1024;

    pub fn new(session_type: SessionType) -> Self {
        SessionConfig {
            session_type,
            repo_cipher: RepoCipher::default(),
            io_buffer_size: Self::DEFAULT_IO_BUFFER_SIZE,
        }
    }

    pub fn with_io_buffer_size(mut self, size: usize) -> Self {
        self.io_buffer_size = size;
        self
    }

    pub fn with_repo_cipher(mut self, cipher: RepoCipher) -> Self {
        self.repo_cipher = cipher;
        self
    }

    /// Mirrors `ConnectionConfig::validate`: cheap sanity checks performed
    /// once, before the session starts serving commands.
    pub fn validate(&self) -> Result<()> {
        if self.io_buffer_size == 0 {
            return Err(Error::Protocol("io_buffer_size must be non-zero".into()));
        }
        if let Some(cipher_type) = &self.repo_cipher.cipher_type {
            if cipher_type != "none" && self.repo_cipher.passphrase.is_none() {
                return Err(Error::Protocol(format!(
                    "repository cipher '{cipher_type}' requires a passphrase"
                )));
            }
        }
        Ok(())
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig::new(SessionType::Backup)
    }
}
