//! Text line protocol.
//!
//! One command per line, fields separated by spaces:
//!
//! | Command               | Reply                         |
//! |-----------------------|-------------------------------|
//! | `update <id> <delta>` | `OK`                          |
//! | `next`                | `<id>` or `-1` when empty     |
//! | `stats`               | `STAT <name> <value>` … `END` |
//! | `quit`                | connection closed             |
//!
//! Anything else gets `ERROR`. Replies end in `\r\n`.

use tracing::{debug, error};

use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::model::{ItemId, Score};
use crate::stats::Stats;

/// Wire value for "queue is empty". Ids on the wire are non-negative, so it
/// cannot collide with a real id.
pub const EMPTY_SENTINEL: i64 = -1;

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Update { id: ItemId, delta: Score },
    Next,
    Stats,
    Quit,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Update { .. } => "update",
            Command::Next => "next",
            Command::Stats => "stats",
            Command::Quit => "quit",
        }
    }
}

/// Split a line into space-separated tokens, dropping empty ones.
pub fn tokenize(line: &str) -> Vec<&str> {
    let line = line.strip_suffix('\n').unwrap_or(line);
    let line = line.strip_suffix('\r').unwrap_or(line);
    line.split(' ').filter(|t| !t.is_empty()).collect()
}

/// Parse one command line. A trailing `\r\n` or `\n` is tolerated.
pub fn parse_command(line: &str) -> Result<Command> {
    match tokenize(line).as_slice() {
        ["update", id, delta] => {
            let id = parse_int(id, "id")?;
            if id < 0 {
                return Err(Error::Protocol(format!("negative item id {id}")));
            }
            let delta = parse_int(delta, "delta")?;
            Ok(Command::Update {
                id: ItemId(id),
                delta,
            })
        }
        ["next"] => Ok(Command::Next),
        ["stats"] => Ok(Command::Stats),
        ["quit"] => Ok(Command::Quit),
        [] => Err(Error::Protocol("empty command".to_string())),
        [name, ..] => Err(Error::Protocol(format!(
            "unknown command or wrong arity: {name}"
        ))),
    }
}

fn parse_int(token: &str, field: &str) -> Result<i64> {
    token
        .parse()
        .map_err(|e| Error::Protocol(format!("bad {field} {token:?}: {e}")))
}

// ---------------------------------------------------------------------------
// Replies
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    Ok,
    Item(ItemId),
    Empty,
    Stats(Stats),
    /// Malformed or rejected command. No state changed.
    Error,
    /// The engine refused because its state is inconsistent.
    ServerError(String),
    /// Close the connection without replying.
    Close,
}

impl Reply {
    /// Wire bytes for this reply. `Close` renders as nothing.
    pub fn render(&self) -> String {
        match self {
            Reply::Ok => "OK\r\n".to_string(),
            Reply::Item(id) => format!("{id}\r\n"),
            Reply::Empty => format!("{EMPTY_SENTINEL}\r\n"),
            Reply::Stats(stats) => {
                let mut out = String::new();
                for (name, value) in stats.entries() {
                    out.push_str(&format!("STAT {name} {value}\r\n"));
                }
                out.push_str("END\r\n");
                out
            }
            Reply::Error => "ERROR\r\n".to_string(),
            Reply::ServerError(msg) => format!("SERVER_ERROR {msg}\r\n"),
            Reply::Close => String::new(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Reply::Ok => "ok",
            Reply::Item(_) => "item",
            Reply::Empty => "empty",
            Reply::Stats(_) => "stats",
            Reply::Error => "error",
            Reply::ServerError(_) => "server_error",
            Reply::Close => "close",
        }
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Run one parsed command against the engine.
pub fn dispatch(engine: &mut Engine, command: Command) -> Reply {
    match command {
        Command::Update { id, delta } => match engine.submit(id, delta) {
            Ok(result) => {
                debug!(%id, delta, score = result.score(), "update applied");
                Reply::Ok
            }
            Err(e) => refusal(e),
        },
        Command::Next => match engine.dequeue_max() {
            Ok(Some(item)) => {
                debug!(id = %item.id, score = item.score, "item dequeued");
                Reply::Item(item.id)
            }
            Ok(None) => Reply::Empty,
            Err(e) => refusal(e),
        },
        Command::Stats => Reply::Stats(engine.stats()),
        Command::Quit => Reply::Close,
    }
}

/// Parse and run one line.
pub fn handle_line(engine: &mut Engine, line: &str) -> Reply {
    match parse_command(line) {
        Ok(command) => dispatch(engine, command),
        Err(e) => {
            debug!(error = %e, "rejected command");
            Reply::Error
        }
    }
}

fn refusal(e: Error) -> Reply {
    if e.is_client_error() {
        debug!(error = %e, "rejected command");
        Reply::Error
    } else {
        error!(error = %e, "engine refused command");
        Reply::ServerError("internal consistency violation".to_string())
    }
}
