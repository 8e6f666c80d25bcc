//! TCP listener and per-connection line loop.
//!
//! Each accepted connection gets its own task. Commands are read one line at
//! a time and dispatched while holding the engine lock; the lock is released
//! before the reply is written, so a slow client never stalls the others.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use opentelemetry::KeyValue;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::protocol::{self, Reply};
use crate::telemetry::command::{record_reply, start_command_span};
use crate::telemetry::metrics;

/// The engine as shared between connection tasks.
pub type SharedEngine = Arc<Mutex<Engine>>;

pub fn shared(engine: Engine) -> SharedEngine {
    Arc::new(Mutex::new(engine))
}

// ---------------------------------------------------------------------------
// Connection table
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct ConnectionInfo {
    pub peer: SocketAddr,
    pub opened_at: DateTime<Utc>,
}

/// Live connections keyed by id.
#[derive(Debug, Default)]
pub struct ConnectionTable {
    next_id: AtomicU64,
    live: Mutex<HashMap<ConnectionId, ConnectionInfo>>,
}

impl ConnectionTable {
    /// Register a peer. The entry is released when the guard drops.
    pub fn open(self: &Arc<Self>, peer: SocketAddr) -> ConnectionGuard {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let info = ConnectionInfo {
            peer,
            opened_at: Utc::now(),
        };
        if let Ok(mut live) = self.live.lock() {
            live.insert(id, info);
        }
        metrics::connections().add(1, &[KeyValue::new("event", "opened")]);
        ConnectionGuard {
            id,
            table: Arc::clone(self),
        }
    }

    pub fn len(&self) -> usize {
        self.live.lock().map(|live| live.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, id: ConnectionId) -> Option<ConnectionInfo> {
        self.live.lock().ok()?.get(&id).cloned()
    }

    fn release(&self, id: ConnectionId) {
        if let Ok(mut live) = self.live.lock() {
            live.remove(&id);
        }
        metrics::connections().add(1, &[KeyValue::new("event", "closed")]);
    }
}

/// Holds a connection's table entry for as long as the connection lives.
#[derive(Debug)]
pub struct ConnectionGuard {
    id: ConnectionId,
    table: Arc<ConnectionTable>,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.table.release(self.id);
    }
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// Cloneable handle that stops a running [`Server`].
#[derive(Debug, Clone)]
pub struct ShutdownHandle(Arc<Notify>);

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.0.notify_one();
    }
}

pub struct Server {
    listener: TcpListener,
    engine: SharedEngine,
    connections: Arc<ConnectionTable>,
    max_line_bytes: usize,
    shutdown: Arc<Notify>,
}

impl Server {
    /// Bind the listener described by `config`.
    pub async fn bind(config: &Config, engine: SharedEngine) -> Result<Self> {
        let listener = TcpListener::bind(config.bind).await?;
        Ok(Self {
            listener,
            engine,
            connections: Arc::new(ConnectionTable::default()),
            max_line_bytes: config.max_line_bytes,
            shutdown: Arc::new(Notify::new()),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(Arc::clone(&self.shutdown))
    }

    pub fn connections(&self) -> Arc<ConnectionTable> {
        Arc::clone(&self.connections)
    }

    /// Accept connections until shut down. Open connections are dropped on exit.
    pub async fn run(self) -> Result<()> {
        info!(addr = %self.local_addr()?, "barbershop listening");
        let mut tasks = JoinSet::new();

        loop {
            tokio::select! {
                _ = self.shutdown.notified() => {
                    info!(open = self.connections.len(), "shutting down");
                    break;
                }
                res = self.listener.accept() => {
                    match res {
                        Ok((stream, peer)) => {
                            let guard = self.connections.open(peer);
                            info!(conn = %guard.id(), %peer, "accepted connection");
                            tasks.spawn(serve_connection(
                                stream,
                                guard,
                                Arc::clone(&self.engine),
                                self.max_line_bytes,
                            ));
                        }
                        Err(e) => {
                            warn!(error = %e, "accept failed");
                        }
                    }
                }
            }
            while tasks.try_join_next().is_some() {}
        }

        tasks.shutdown().await;
        Ok(())
    }
}

async fn serve_connection(
    stream: TcpStream,
    guard: ConnectionGuard,
    engine: SharedEngine,
    max_line_bytes: usize,
) {
    let conn = guard.id();
    match handle_connection(stream, conn, &engine, max_line_bytes).await {
        Ok(()) => info!(%conn, "connection closed"),
        Err(e) => warn!(%conn, error = %e, "connection dropped"),
    }
    drop(guard);
}

/// Read command lines until EOF, `quit`, or an oversized line.
async fn handle_connection(
    stream: TcpStream,
    conn: ConnectionId,
    engine: &SharedEngine,
    max_line_bytes: usize,
) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = Vec::with_capacity(128);

    loop {
        line.clear();
        let n = (&mut reader)
            .take(max_line_bytes as u64)
            .read_until(b'\n', &mut line)
            .await?;
        if n == 0 {
            return Ok(());
        }

        let terminated = line.last() == Some(&b'\n');
        if !terminated && n >= max_line_bytes {
            debug!(%conn, limit = max_line_bytes, "command line too long");
            metrics::protocol_errors().add(1, &[]);
            writer.write_all(Reply::Error.render().as_bytes()).await?;
            return Ok(());
        }

        let reply = match std::str::from_utf8(&line) {
            Ok(text) => execute(engine, conn, text)?,
            Err(_) => Reply::Error,
        };
        if reply == Reply::Error {
            metrics::protocol_errors().add(1, &[]);
        }
        if reply == Reply::Close {
            return Ok(());
        }

        writer.write_all(reply.render().as_bytes()).await?;
        if !terminated {
            // Peer closed mid-line; that fragment was its last command.
            return Ok(());
        }
    }
}

fn execute(engine: &SharedEngine, conn: ConnectionId, line: &str) -> Result<Reply> {
    let name = protocol::tokenize(line).first().copied().unwrap_or("").to_string();
    let span = start_command_span(&name, conn);
    let _enter = span.enter();

    let mut engine = engine.lock().map_err(|_| {
        error!("engine lock poisoned");
        Error::Poisoned("engine lock poisoned by a panicked task".to_string())
    })?;
    let reply = protocol::handle_line(&mut engine, line);
    record_reply(&span, reply.kind());
    Ok(reply)
}
