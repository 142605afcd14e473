// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for stream lifecycle and guest call events.
//!
//! This module contains message types for logging events related to:
//! * Guest entry-point calls and their results
//! * Sticky guest failure and the fail-open/fail-closed fallback
//! * Local replies queued on behalf of the guest
//! * Context creation and teardown

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// A line logged by the guest through the host log capability.
///
/// # Log Level
/// Chosen by the guest.
///
/// # Example
/// ```
/// use http_wasm_host::observability::messages::context::GuestLogLine;
///
/// let msg = GuestLogLine {
///     prefix: " auth auth_root vm_1",
///     message: "token accepted",
/// };
///
/// assert_eq!(msg.to_string(), "httpwasm log auth auth_root vm_1: token accepted");
/// ```
pub struct GuestLogLine<'a> {
    pub prefix: &'a str,
    pub message: &'a str,
}

impl Display for GuestLogLine<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "httpwasm log{}: {}", self.prefix, self.message)
    }
}

/// A guest entry point returned an error; the VM is now failed.
///
/// # Log Level
/// `error!` - Failure requiring attention
///
/// # Example
/// ```
/// use http_wasm_host::observability::messages::context::GuestCallFailed;
///
/// let error = std::io::Error::new(std::io::ErrorKind::Other, "unreachable executed");
/// let msg = GuestCallFailed {
///     context_id: 2,
///     entry_point: "handle_request",
///     error: &error,
/// };
///
/// tracing::error!("{}", msg);
/// ```
pub struct GuestCallFailed<'a> {
    pub context_id: u32,
    pub entry_point: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for GuestCallFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Guest {} failed on context {}, plugin VM marked failed: {}",
            self.entry_point, self.context_id, self.error
        )
    }
}

impl StructuredLog for GuestCallFailed<'_> {
    fn log(&self) {
        tracing::error!(
            context_id = self.context_id,
            entry_point = self.entry_point,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "guest_call_failed",
            span_name = name,
            context_id = self.context_id,
            entry_point = self.entry_point,
        )
    }
}

/// Result of a request-phase guest call.
///
/// # Log Level
/// `debug!` - Per-stream detail
///
/// # Example
/// ```
/// use http_wasm_host::observability::messages::context::RequestPhaseHandled;
///
/// let msg = RequestPhaseHandled {
///     context_id: 2,
///     phase: "headers",
///     continuation_id: 7,
///     next_action: 0,
///     end_of_stream: true,
/// };
///
/// tracing::debug!("{}", msg);
/// ```
pub struct RequestPhaseHandled<'a> {
    pub context_id: u32,
    pub phase: &'a str,
    pub continuation_id: u32,
    pub next_action: u32,
    pub end_of_stream: bool,
}

impl Display for RequestPhaseHandled<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Request {} handled on context {}: continuation={} next={} end_of_stream={}",
            self.phase, self.context_id, self.continuation_id, self.next_action, self.end_of_stream
        )
    }
}

impl StructuredLog for RequestPhaseHandled<'_> {
    fn log(&self) {
        tracing::debug!(
            context_id = self.context_id,
            phase = self.phase,
            continuation_id = self.continuation_id,
            next_action = self.next_action,
            end_of_stream = self.end_of_stream,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "request_phase",
            span_name = name,
            context_id = self.context_id,
            phase = self.phase,
            continuation_id = self.continuation_id,
        )
    }
}

/// The guest is failed and a phase resolved to its fallback action.
///
/// # Log Level
/// `debug!` - Emitted for every short-circuited phase
pub struct FallbackApplied<'a> {
    pub context_id: u32,
    pub phase: &'a str,
    pub fail_open: bool,
}

impl Display for FallbackApplied<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        let policy = if self.fail_open { "open" } else { "closed" };
        write!(
            f,
            "Plugin VM failed, {} phase on context {} fails {}",
            self.phase, self.context_id, policy
        )
    }
}

impl StructuredLog for FallbackApplied<'_> {
    fn log(&self) {
        tracing::debug!(
            context_id = self.context_id,
            phase = self.phase,
            fail_open = self.fail_open,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::debug_span!(
            "fallback",
            span_name = name,
            context_id = self.context_id,
            phase = self.phase,
        )
    }
}

/// A fail-closed stream is answered with a local reply.
///
/// # Log Level
/// `warn!` - Traffic is being rejected
pub struct StreamFailed {
    pub context_id: u32,
    pub status: u16,
}

impl Display for StreamFailed {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Failing stream on context {} with local reply {}",
            self.context_id, self.status
        )
    }
}

impl StructuredLog for StreamFailed {
    fn log(&self) {
        tracing::warn!(context_id = self.context_id, status = self.status, "{}", self);
    }

    fn span(&self, name: &str) -> Span {
        tracing::warn_span!(
            "stream_failed",
            span_name = name,
            context_id = self.context_id,
            status = self.status,
        )
    }
}

/// The guest asked for a local reply with a status that is not an HTTP status.
///
/// # Log Level
/// `warn!` - Guest misbehaviour, request ignored
pub struct InvalidLocalReplyStatus {
    pub status: u32,
}

impl Display for InvalidLocalReplyStatus {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Ignoring local reply with invalid status {}", self.status)
    }
}

/// Context registered in the VM context table.
///
/// # Log Level
/// `debug!` - Lifecycle detail
pub struct ContextCreated<'a> {
    pub context_id: u32,
    pub parent_id: u32,
    pub kind: &'a str,
}

impl Display for ContextCreated<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Created {} context {} (parent {})",
            self.kind, self.context_id, self.parent_id
        )
    }
}

/// Stream context torn down by the proxy.
///
/// # Log Level
/// `debug!` - Lifecycle detail
pub struct ContextDestroyed {
    pub context_id: u32,
}

impl Display for ContextDestroyed {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "Destroyed context {}", self.context_id)
    }
}
