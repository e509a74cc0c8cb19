//! Outgoing command serialization.
//!
//! The outgoing half of the relay protocol is textual: one UTF-8 command
//! per line, optionally prefixed with a parenthesized correlation id that
//! the relay echoes back on the response. [`CommandBatch`] accumulates
//! several rendered lines into a single write so they reach the relay
//! atomically.

use std::fmt;

use crate::error::BatchError;
use crate::handshake::HashAlgo;

/// Whether `init` should ask the relay to disable compression.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Compression {
    /// Leave the relay's default (zlib) in place.
    #[default]
    Default,
    /// Append `compression=off`.
    Off,
}

/// How `init` authenticates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InitAuth {
    /// Legacy clear-text password, escaped for the init grammar.
    Password(String),
    /// A pre-computed `algorithm:salt[:iterations]:hash` blob from the
    /// handshake negotiation.
    Hash(String),
}

/// An outgoing relay command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Open the session, authenticating with a password or hash.
    Init {
        /// Authentication payload.
        auth: InitAuth,
        /// Compression preference.
        compression: Compression,
    },
    /// Negotiate password hashing before `init`.
    Handshake {
        /// Advertised algorithms, in preference order.
        algos: Vec<HashAlgo>,
    },
    /// Request an hdata row set.
    Hdata {
        /// Hdata path with optional list/pointer selectors.
        path: String,
        /// Comma-separated keys, or `None` for all.
        keys: Option<String>,
    },
    /// Request a named info string.
    Info {
        /// Info name.
        name: String,
    },
    /// Request an infolist.
    Infolist {
        /// Infolist name.
        name: String,
        /// Optional pointer argument.
        pointer: Option<String>,
        /// Optional extra arguments.
        args: Option<String>,
    },
    /// Request a nicklist, for one buffer or all.
    Nicklist {
        /// Buffer pointer, or `None` for every buffer.
        buffer: Option<String>,
    },
    /// Send input text to a buffer.
    Input {
        /// Target buffer pointer.
        buffer: String,
        /// Text to deliver, as if typed.
        text: String,
    },
    /// Subscribe to updates for buffers/signals.
    Sync {
        /// Buffer pointers or names; empty means all.
        buffers: Vec<String>,
        /// Signal names; empty means all.
        signals: Vec<String>,
    },
    /// Unsubscribe from updates for buffers/signals.
    Desync {
        /// Buffer pointers or names; empty means all.
        buffers: Vec<String>,
        /// Signal names; empty means all.
        signals: Vec<String>,
    },
    /// Keep-alive; the relay echoes the argument in `_pong`.
    Ping {
        /// Opaque payload, conventionally a millisecond tick count.
        payload: String,
    },
    /// Close the session.
    Quit,
}

impl Command {
    /// Render this command as a full line, with an optional correlation
    /// id prefix and the terminating newline.
    pub fn to_line(&self, id: Option<&str>) -> String {
        match id {
            Some(id) => format!("({}) {}\n", id, self),
            None => format!("{}\n", self),
        }
    }
}

/// Escape a password for the comma-separated init argument grammar.
fn escape_init_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for ch in value.chars() {
        if ch == ',' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

fn write_sync_args(
    f: &mut fmt::Formatter<'_>,
    buffers: &[String],
    signals: &[String],
) -> fmt::Result {
    if !buffers.is_empty() {
        write!(f, " {}", buffers.join(","))?;
        if !signals.is_empty() {
            write!(f, " {}", signals.join(","))?;
        }
    }
    Ok(())
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Init { auth, compression } => {
                match auth {
                    InitAuth::Password(p) => {
                        write!(f, "init password={}", escape_init_value(p))?
                    }
                    InitAuth::Hash(h) => write!(f, "init password_hash={}", h)?,
                }
                if *compression == Compression::Off {
                    write!(f, ",compression=off")?;
                }
                Ok(())
            }
            Command::Handshake { algos } => {
                let names: Vec<&str> = algos.iter().map(|a| a.wire_name()).collect();
                write!(f, "handshake password_hash_algo={}", names.join(":"))
            }
            Command::Hdata { path, keys } => {
                write!(f, "hdata {}", path)?;
                if let Some(keys) = keys {
                    write!(f, " {}", keys)?;
                }
                Ok(())
            }
            Command::Info { name } => write!(f, "info {}", name),
            Command::Infolist {
                name,
                pointer,
                args,
            } => {
                write!(f, "infolist {}", name)?;
                if let Some(ptr) = pointer {
                    write!(f, " {}", ptr)?;
                    if let Some(args) = args {
                        write!(f, " {}", args)?;
                    }
                }
                Ok(())
            }
            Command::Nicklist { buffer } => {
                write!(f, "nicklist")?;
                if let Some(ptr) = buffer {
                    write!(f, " {}", ptr)?;
                }
                Ok(())
            }
            Command::Input { buffer, text } => write!(f, "input {} {}", buffer, text),
            Command::Sync { buffers, signals } => {
                write!(f, "sync")?;
                write_sync_args(f, buffers, signals)
            }
            Command::Desync { buffers, signals } => {
                write!(f, "desync")?;
                write_sync_args(f, buffers, signals)
            }
            Command::Ping { payload } => write!(f, "ping {}", payload),
            Command::Quit => write!(f, "quit"),
        }
    }
}

/// Accumulates command lines for one atomic write.
///
/// Bracketing is explicit: `begin` opens the batch, `push` appends, and
/// `end` yields the combined buffer. Nested `begin` calls are an error,
/// as is pushing or ending without an open batch.
#[derive(Debug, Default)]
pub struct CommandBatch {
    buf: String,
    open: bool,
}

impl CommandBatch {
    /// Create a closed batch.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a batch is currently open.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Open the batch.
    pub fn begin(&mut self) -> Result<(), BatchError> {
        if self.open {
            return Err(BatchError::Nested);
        }
        self.open = true;
        self.buf.clear();
        Ok(())
    }

    /// Append one command line to the open batch.
    pub fn push(&mut self, command: &Command, id: Option<&str>) -> Result<(), BatchError> {
        if !self.open {
            return Err(BatchError::NotOpen);
        }
        self.buf.push_str(&command.to_line(id));
        Ok(())
    }

    /// Close the batch and return all accumulated lines as one write.
    pub fn end(&mut self) -> Result<String, BatchError> {
        if !self.open {
            return Err(BatchError::NotOpen);
        }
        self.open = false;
        Ok(std::mem::take(&mut self.buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_password_rendering() {
        let cmd = Command::Init {
            auth: InitAuth::Password("s3cret".into()),
            compression: Compression::Off,
        };
        assert_eq!(cmd.to_line(None), "init password=s3cret,compression=off\n");
    }

    #[test]
    fn test_init_password_escaping() {
        let cmd = Command::Init {
            auth: InitAuth::Password("a,b\\c".into()),
            compression: Compression::Default,
        };
        assert_eq!(cmd.to_line(None), "init password=a\\,b\\\\c\n");
    }

    #[test]
    fn test_handshake_rendering() {
        let cmd = Command::Handshake {
            algos: HashAlgo::CLIENT_PREFERENCE.to_vec(),
        };
        assert_eq!(
            cmd.to_line(Some("handshake")),
            "(handshake) handshake password_hash_algo=plain:sha256:sha512:pbkdf2+sha256:pbkdf2+sha512\n"
        );
    }

    #[test]
    fn test_correlation_id_prefix() {
        let cmd = Command::Hdata {
            path: "buffer:gui_buffers(*)".into(),
            keys: Some("number,full_name".into()),
        };
        assert_eq!(
            cmd.to_line(Some("listbuffers")),
            "(listbuffers) hdata buffer:gui_buffers(*) number,full_name\n"
        );
    }

    #[test]
    fn test_sync_variants() {
        assert_eq!(
            Command::Sync {
                buffers: vec![],
                signals: vec![]
            }
            .to_line(None),
            "sync\n"
        );
        assert_eq!(
            Command::Desync {
                buffers: vec!["0xaa".into(), "0xbb".into()],
                signals: vec!["buffer".into(), "nicklist".into()],
            }
            .to_line(None),
            "desync 0xaa,0xbb buffer,nicklist\n"
        );
    }

    #[test]
    fn test_misc_rendering() {
        assert_eq!(
            Command::Input {
                buffer: "0xaa".into(),
                text: "hello world".into()
            }
            .to_line(None),
            "input 0xaa hello world\n"
        );
        assert_eq!(
            Command::Infolist {
                name: "option".into(),
                pointer: None,
                args: None
            }
            .to_line(Some("getoptions")),
            "(getoptions) infolist option\n"
        );
        assert_eq!(
            Command::Ping {
                payload: "12345".into()
            }
            .to_line(None),
            "ping 12345\n"
        );
        assert_eq!(Command::Quit.to_line(None), "quit\n");
    }

    #[test]
    fn test_batch_bracketing() {
        let mut batch = CommandBatch::new();
        batch.begin().unwrap();
        batch.push(&Command::Quit, None).unwrap();
        batch
            .push(&Command::Info { name: "version".into() }, Some("version"))
            .unwrap();
        let out = batch.end().unwrap();
        assert_eq!(out, "quit\n(version) info version\n");

        // Ended batch can be reused.
        batch.begin().unwrap();
        batch.end().unwrap();
    }

    #[test]
    fn test_batch_nesting_is_error() {
        let mut batch = CommandBatch::new();
        batch.begin().unwrap();
        assert_eq!(batch.begin(), Err(BatchError::Nested));
        batch.end().unwrap();
        assert_eq!(batch.end(), Err(BatchError::NotOpen));
        assert_eq!(batch.push(&Command::Quit, None), Err(BatchError::NotOpen));
    }
}
