//! Verbose per-call logging for `RequestPipeline`.
//!
//! Every method is a no-op unless the pipeline was created with
//! diagnostics enabled. Nothing here returns a value the pipeline branches on.

use std::fmt;
use std::time::Instant;

use rand::Rng;

use crate::decoder::DecodeError;
use crate::error::NetworkError;
use crate::http::HttpResponse;
use crate::types::{ErrorEnvelope, RequestDescriptor};

const TARGET: &str = "netkit::api";

/// Which call shape produced a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Channel {
    Async,
    Stream,
    Parse,
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Channel::Async => "ASYNC",
            Channel::Stream => "STREAM",
            Channel::Parse => "PARSE",
        })
    }
}

/// Logging state for one pipeline call.
#[derive(Debug)]
pub(crate) struct CallLog {
    enabled: bool,
    channel: Channel,
    /// Random tag to correlate lines of one call. Not unique.
    id: u8,
}

impl CallLog {
    pub(crate) fn new(enabled: bool, channel: Channel) -> Self {
        let id = if enabled { rand::thread_rng().gen_range(0..100) } else { 0 };
        Self { enabled, channel, id }
    }

    pub(crate) fn request(&self, descriptor: &RequestDescriptor) {
        if !self.enabled {
            return;
        }
        tracing::info!(
            target: TARGET,
            id = self.id,
            channel = %self.channel,
            method = %descriptor.method(),
            url = ?descriptor.url(),
            params = ?descriptor.param_map(),
            headers = ?descriptor.header_map(),
            "request"
        );
    }

    pub(crate) fn dropped_header(&self, name: &str) {
        if self.enabled {
            tracing::info!(target: TARGET, id = self.id, channel = %self.channel, header = name, "dropping non-string header");
        }
    }

    pub(crate) fn invalid_url(&self) {
        if self.enabled {
            tracing::error!(target: TARGET, id = self.id, channel = %self.channel, "invalid URL");
        }
    }

    /// Marks the transport dispatch. The returned guard logs a cancellation if
    /// it is dropped before `complete` is called.
    pub(crate) fn dispatch(&self) -> InFlight<'_> {
        if self.enabled {
            tracing::info!(target: TARGET, id = self.id, channel = %self.channel, "subscription");
        }
        InFlight {
            log: self,
            started: Instant::now(),
            done: false,
        }
    }

    pub(crate) fn no_response(&self) {
        if self.enabled {
            tracing::error!(target: TARGET, id = self.id, channel = %self.channel, "no response");
        }
    }

    pub(crate) fn parsed_empty(&self) {
        if self.enabled {
            tracing::info!(target: TARGET, id = self.id, channel = %self.channel, parser = "EmptyResponse");
        }
    }

    pub(crate) fn parsed_ok(&self) {
        if self.enabled {
            tracing::info!(target: TARGET, id = self.id, channel = %self.channel, parser = "OK");
        }
    }

    pub(crate) fn server_error(&self, status: u16, envelope: &ErrorEnvelope) {
        if self.enabled {
            tracing::warn!(target: TARGET, id = self.id, channel = %self.channel, status, ?envelope, "error response");
        }
    }

    pub(crate) fn decode_failed(&self, error: &DecodeError) {
        if self.enabled {
            tracing::error!(
                target: TARGET,
                id = self.id,
                channel = %self.channel,
                category = ?error.category,
                detail = %error.message,
                "decoding error"
            );
        }
    }

    pub(crate) fn transport_failed(&self, error: &NetworkError) {
        if !self.enabled {
            return;
        }
        match error {
            NetworkError::NoInternet(_) => {
                tracing::error!(target: TARGET, id = self.id, channel = %self.channel, "no internet connection");
            }
            other => {
                tracing::error!(target: TARGET, id = self.id, channel = %self.channel, error = %other, "transport error");
            }
        }
    }
}

/// A dispatched transport call that has not completed yet.
pub(crate) struct InFlight<'a> {
    log: &'a CallLog,
    started: Instant,
    done: bool,
}

impl InFlight<'_> {
    /// Records completion and dumps the raw body.
    pub(crate) fn complete(mut self, response: Option<&HttpResponse>) {
        self.done = true;
        let log = self.log;
        if !log.enabled {
            return;
        }
        let elapsed_ms = self.started.elapsed().as_millis() as u64;
        tracing::info!(target: TARGET, id = log.id, channel = %log.channel, elapsed_ms, "completion");
        if let Some(response) = response {
            tracing::info!(
                target: TARGET,
                id = log.id,
                channel = %log.channel,
                status = response.status,
                "output:\n{}",
                pretty_json(&response.body)
            );
        }
    }

    pub(crate) fn fail(mut self) {
        self.done = true;
        if self.log.enabled {
            let elapsed_ms = self.started.elapsed().as_millis() as u64;
            tracing::error!(target: TARGET, id = self.log.id, channel = %self.log.channel, elapsed_ms, "failed");
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.done && self.log.enabled {
            let elapsed_ms = self.started.elapsed().as_millis() as u64;
            tracing::error!(target: TARGET, id = self.log.id, channel = %self.log.channel, elapsed_ms, "cancel");
        }
    }
}

/// Pretty-print `body` if it is JSON; empty string otherwise.
pub fn pretty_json(body: &[u8]) -> String {
    serde_json::from_slice::<serde_json::Value>(body)
        .ok()
        .and_then(|value| serde_json::to_string_pretty(&value).ok())
        .unwrap_or_default()
}
