//! Metric instrument factories.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`,
//! which is a no-op until [`init_telemetry`](super::init_telemetry) installs
//! an exporter.

use opentelemetry::metrics::{Counter, Meter};

fn meter() -> Meter {
    opentelemetry::global::meter("barbershop")
}

/// Counter: accepted score submissions.
/// Labels: `result` ("created" | "coalesced" | "unchanged").
pub fn queue_updates() -> Counter<u64> {
    meter()
        .u64_counter("barbershop.queue.updates")
        .with_description("Score submissions applied to the queue")
        .build()
}

/// Counter: dequeue attempts.
/// Labels: `result` ("item" | "empty").
pub fn queue_dequeues() -> Counter<u64> {
    meter()
        .u64_counter("barbershop.queue.dequeues")
        .with_description("Dequeue attempts against the queue")
        .build()
}

/// Counter: score pools created.
pub fn pools_created() -> Counter<u64> {
    meter()
        .u64_counter("barbershop.pools.created")
        .with_description("Score pools created")
        .build()
}

/// Counter: score pools destroyed after losing their last member.
pub fn pools_reclaimed() -> Counter<u64> {
    meter()
        .u64_counter("barbershop.pools.reclaimed")
        .with_description("Score pools reclaimed")
        .build()
}

/// Counter: command lines answered with `ERROR`.
pub fn protocol_errors() -> Counter<u64> {
    meter()
        .u64_counter("barbershop.protocol.errors")
        .with_description("Malformed or rejected command lines")
        .build()
}

/// Counter: client connection lifecycle.
/// Labels: `event` ("opened" | "closed").
pub fn connections() -> Counter<u64> {
    meter()
        .u64_counter("barbershop.connections")
        .with_description("Client connections opened and closed")
        .build()
}
