//! The closed set of command identifiers the protocol server dispatches,
//! the same way the teacher's `packets::smb2::Command` is a closed enum
//! over the wire's fixed command set.

use crate::error::{Error, Result};
use crate::value::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandId {
    Exists,
    Feature,
    List,
    OpenRead,
    OpenWrite,
    PathCreate,
    PathExists,
    PathRemove,
    PathSync,
    Remove,
}

impl CommandId {
    pub const ALL: &'static [CommandId] = &[
        CommandId::Exists,
        CommandId::Feature,
        CommandId::List,
        CommandId::OpenRead,
        CommandId::OpenWrite,
        CommandId::PathCreate,
        CommandId::PathExists,
        CommandId::PathRemove,
        CommandId::PathSync,
        CommandId::Remove,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CommandId::Exists => "storage/exists",
            CommandId::Feature => "storage/feature",
            CommandId::List => "storage/list",
            CommandId::OpenRead => "storage/openRead",
            CommandId::OpenWrite => "storage/openWrite",
            CommandId::PathCreate => "storage/pathCreate",
            CommandId::PathExists => "storage/pathExists",
            CommandId::PathRemove => "storage/pathRemove",
            CommandId::PathSync => "storage/pathSync",
            CommandId::Remove => "storage/remove",
        }
    }

    pub fn parse(s: &str) -> Option<CommandId> {
        Self::ALL.iter().copied().find(|c| c.as_str() == s)
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A command name plus its ordered parameter list, as read off the channel.
///
/// `id` is `None` for a name outside the closed storage command set -- that
/// is not a decode failure. It lets [`crate::server::ProtocolServer`]
/// report "not handled here" the way an outer multi-handler dispatch (e.g.
/// backup- or restore-specific commands layered on the same session) would
/// need to, rather than failing at the parsing stage.
#[derive(Debug, Clone)]
pub struct Command {
    pub name: String,
    pub id: Option<CommandId>,
    pub params: Vec<Value>,
}

impl Command {
    /// Decode a command name and parameter list from one wire line:
    /// `{"cmd": "storage/exists", "params": [...]}`.
    pub fn decode_line(line: &str) -> Result<Command> {
        let parsed: WireCommand = serde_json::from_str(line)
            .map_err(|e| Error::Protocol(format!("malformed command line: {e} ({line:?})")))?;
        let id = CommandId::parse(&parsed.cmd);
        Ok(Command {
            name: parsed.cmd,
            id,
            params: parsed.params,
        })
    }

    pub fn param(&self, idx: usize) -> Result<&Value> {
        self.params
            .get(idx)
            .ok_or_else(|| Error::Protocol(format!("{}: missing parameter {idx}", self.name)))
    }

    pub fn param_or_null(&self, idx: usize) -> &Value {
        self.params.get(idx).unwrap_or(&Value::Null)
    }
}

#[derive(serde::Deserialize)]
struct WireCommand {
    cmd: String,
    #[serde(default)]
    params: Vec<Value>,
}

/// A response value, encoded back onto the channel as `{"ok": <value>}` or
/// `{"err": {"kind": ..., "message": ...}}`.
#[derive(Debug, Clone)]
pub enum Response {
    Ok(Value),
    Err { kind: &'static str, message: String },
}

impl Response {
    pub fn encode_line(&self) -> String {
        #[derive(serde::Serialize)]
        struct ErrBody<'a> {
            kind: &'a str,
            message: &'a str,
        }
        #[derive(serde::Serialize)]
        #[serde(untagged)]
        enum Wire<'a> {
            Ok {
                ok: &'a Value,
            },
            Err {
                err: ErrBody<'a>,
            },
        }
        let wire = match self {
            Response::Ok(v) => Wire::Ok { ok: v },
            Response::Err { kind, message } => Wire::Err {
                err: ErrBody { kind, message },
            },
        };
        serde_json::to_string(&wire).expect("Value serialization is infallible")
    }
}

impl From<&Error> for Response {
    fn from(e: &Error) -> Self {
        let kind = match e {
            Error::Protocol(_) => "ProtocolError",
            Error::Assert(_) => "AssertError",
            Error::Io(_) => "IoError",
            Error::Parsing(_) => "ProtocolError",
            Error::Coercion { .. } => "ProtocolError",
            Error::FileOpen(_) => "FileOpenError",
            Error::FileRead(_) => "FileReadError",
            Error::FileWrite(_) => "FileWriteError",
            Error::PathMissing(_) => "PathMissingError",
            Error::PathOpen(_) => "PathOpenError",
            Error::PathExistsUnsupported => "ProtocolError",
            Error::UnknownCommand(_) => "ProtocolError",
        };
        Response::Err {
            kind,
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_all_command_ids_back_from_their_wire_strings() {
        for id in CommandId::ALL {
            assert_eq!(CommandId::parse(id.as_str()), Some(*id));
        }
    }

    #[test]
    fn decodes_a_command_line() {
        let line = r#"{"cmd": "storage/exists", "params": ["/a/b"]}"#;
        let cmd = Command::decode_line(line).unwrap();
        assert_eq!(cmd.id, Some(CommandId::Exists));
        assert_eq!(cmd.param(0).unwrap().as_str().unwrap(), "/a/b");
    }

    #[test]
    fn unknown_command_decodes_with_no_id() {
        let line = r#"{"cmd": "storage/bogus", "params": []}"#;
        let cmd = Command::decode_line(line).unwrap();
        assert_eq!(cmd.id, None);
        assert_eq!(cmd.name, "storage/bogus");
    }
}
