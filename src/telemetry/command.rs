//! Command span helpers.
//!
//! Every protocol command runs inside a `barbershop.command` span carrying the
//! connection it arrived on and the kind of reply it produced.

use tracing::Span;

use crate::server::ConnectionId;

/// Start a span for one protocol command.
///
/// The `reply` field is declared empty and filled by [`record_reply`].
pub fn start_command_span(command: &str, conn: ConnectionId) -> Span {
    tracing::debug_span!(
        "barbershop.command",
        "command" = command,
        "conn.id" = %conn,
        "reply" = tracing::field::Empty,
    )
}

pub fn record_reply(span: &Span, reply: &str) {
    span.record("reply", reply);
}
