//! Side channel for the pipeline's own diagnostics.
//!
//! Everything the shipper reports about itself goes through `tracing` with
//! the [`SIDE_CHANNEL_TARGET`] target. [`IngestLayer`](crate::layer::IngestLayer)
//! never captures that target, so a failing endpoint cannot feed its own
//! error reports back into the queue. Pair the layer with a `fmt` layer (see
//! [`crate::init`]) to see these messages on stderr/stdout.

use tracing::{debug, error, warn};

use crate::sink::Delivery;

pub const SIDE_CHANNEL_TARGET: &str = "log_shipper::side_channel";

/// Longest response body kept in a rejection report.
pub const MAX_REPORTED_BODY: usize = 512;

pub(crate) fn batch_outcome(delivery: &Delivery, batch_len: usize) {
    match delivery {
        Delivery::Delivered => {
            debug!(target: SIDE_CHANNEL_TARGET, batch_len, "log batch delivered");
        }
        Delivery::Rejected { status, body } => {
            warn!(
                target: SIDE_CHANNEL_TARGET,
                status,
                batch_len,
                body = %body,
                "log ingest rejected batch, dropping it"
            );
        }
        Delivery::Failed { reason } => {
            warn!(
                target: SIDE_CHANNEL_TARGET,
                batch_len,
                error = %reason,
                "log ingest request failed, dropping batch"
            );
        }
    }
}

pub(crate) fn started(service: &str, batch_size: usize, flush_interval_ms: u128) {
    debug!(
        target: SIDE_CHANNEL_TARGET,
        service,
        batch_size,
        flush_interval_ms = flush_interval_ms as u64,
        "log shipper started"
    );
}

pub(crate) fn draining() {
    debug!(target: SIDE_CHANNEL_TARGET, "log shipper draining queue");
}

pub(crate) fn stopped(batches: u64) {
    debug!(target: SIDE_CHANNEL_TARGET, batches, "log shipper stopped");
}

pub(crate) fn forced_shutdown(timeout_ms: u128) {
    error!(
        target: SIDE_CHANNEL_TARGET,
        timeout_ms = timeout_ms as u64,
        "log shipper did not drain before the shutdown timeout, aborting; remaining events are lost"
    );
}

pub(crate) fn loop_crashed(err: &tokio::task::JoinError) {
    error!(target: SIDE_CHANNEL_TARGET, error = %err, "log shipper task ended abnormally");
}

/// Cut `body` to at most [`MAX_REPORTED_BODY`] bytes on a char boundary.
pub(crate) fn truncate_body(mut body: String) -> String {
    if body.len() <= MAX_REPORTED_BODY {
        return body;
    }
    let mut cut = MAX_REPORTED_BODY;
    while !body.is_char_boundary(cut) {
        cut -= 1;
    }
    body.truncate(cut);
    body.push_str("...");
    body
}
