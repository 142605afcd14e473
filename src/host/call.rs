// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! The host surface a guest sees during one entry-point call.

use crate::context::{queue_local_reply, DeferredAction};
use crate::errors::{WasmError, WasmResult};
use crate::host::{
    BodyKind, HeaderMapAccessor, HeaderMapKind, HostBuffer, TrailerState, END_OF_DATA,
};
use crate::observability::messages::context::GuestLogLine;
use crate::plugin::PluginIdentity;
use crate::traits::{GuestHost, LogLevel};
use std::collections::VecDeque;
use tracing::Level;

/// Log target for lines written by the guest.
pub const GUEST_LOG_TARGET: &str = "http_wasm::guest";

/// Borrows everything a guest may touch for exactly one call.
pub struct HostCall<'a> {
    context_id: u32,
    plugin: &'a PluginIdentity,
    headers: HeaderMapAccessor<'a>,
    body: HostBuffer<'a>,
    body_kind: Option<BodyKind>,
    element_count: u32,
    end_of_stream: bool,
    deferred: &'a mut VecDeque<DeferredAction>,
}

impl<'a> HostCall<'a> {
    pub fn new(
        context_id: u32,
        plugin: &'a PluginIdentity,
        headers: HeaderMapAccessor<'a>,
        deferred: &'a mut VecDeque<DeferredAction>,
    ) -> Self {
        Self {
            context_id,
            plugin,
            headers,
            body: HostBuffer::absent(),
            body_kind: None,
            element_count: 0,
            end_of_stream: false,
            deferred,
        }
    }

    /// Records what the proxy handed to the current phase.
    pub fn with_phase(mut self, element_count: u32, end_of_stream: bool) -> Self {
        self.element_count = element_count;
        self.end_of_stream = end_of_stream;
        self
    }

    /// Exposes the body chunk of the current phase.
    pub fn with_body(mut self, kind: BodyKind, body: HostBuffer<'a>) -> Self {
        self.body = body;
        self.body_kind = Some(kind);
        self
    }

    pub fn trailer_state(&self) -> TrailerState {
        self.headers.state()
    }

    fn body_for(&mut self, kind: BodyKind) -> Option<&mut HostBuffer<'a>> {
        (self.body_kind == Some(kind)).then_some(&mut self.body)
    }
}

impl GuestHost for HostCall<'_> {
    fn context_id(&self) -> u32 {
        self.context_id
    }

    fn element_count(&self) -> u32 {
        self.element_count
    }

    fn end_of_stream(&self) -> bool {
        self.end_of_stream
    }

    fn log(&mut self, level: LogLevel, message: &str) {
        let line = GuestLogLine {
            prefix: self.plugin.log_prefix(),
            message,
        };
        match level {
            LogLevel::Debug => tracing::debug!(target: GUEST_LOG_TARGET, "{}", line),
            LogLevel::Info => tracing::info!(target: GUEST_LOG_TARGET, "{}", line),
            LogLevel::Warn => tracing::warn!(target: GUEST_LOG_TARGET, "{}", line),
            LogLevel::Error => tracing::error!(target: GUEST_LOG_TARGET, "{}", line),
            LogLevel::None => {}
        }
    }

    fn log_enabled(&self, level: LogLevel) -> bool {
        match level {
            LogLevel::Debug => tracing::enabled!(target: GUEST_LOG_TARGET, Level::DEBUG),
            LogLevel::Info => tracing::enabled!(target: GUEST_LOG_TARGET, Level::INFO),
            LogLevel::Warn => tracing::enabled!(target: GUEST_LOG_TARGET, Level::WARN),
            LogLevel::Error => tracing::enabled!(target: GUEST_LOG_TARGET, Level::ERROR),
            LogLevel::None => false,
        }
    }

    fn configuration(&self) -> &[u8] {
        self.plugin.configuration()
    }

    fn header_values(&mut self, kind: HeaderMapKind, name: &str) -> WasmResult<Vec<Vec<u8>>> {
        self.headers.values(kind, name)
    }

    fn header_names(&mut self, kind: HeaderMapKind) -> WasmResult<Vec<String>> {
        self.headers.names(kind)
    }

    fn add_header_value(
        &mut self,
        kind: HeaderMapKind,
        name: &str,
        value: &[u8],
    ) -> WasmResult<()> {
        self.headers.add(kind, name, value)
    }

    fn replace_header_value(
        &mut self,
        kind: HeaderMapKind,
        name: &str,
        value: &[u8],
    ) -> WasmResult<()> {
        self.headers.replace(kind, name, value)
    }

    fn remove_header(&mut self, kind: HeaderMapKind, name: &str) -> WasmResult<()> {
        self.headers.remove(kind, name)
    }

    fn header_map_size(&mut self, kind: HeaderMapKind) -> WasmResult<u32> {
        self.headers.byte_size(kind)
    }

    fn read_body(&mut self, kind: BodyKind, dest: &mut [u8]) -> u64 {
        match self.body_for(kind) {
            Some(body) => body.copy_to(dest),
            None => END_OF_DATA,
        }
    }

    fn write_body(&mut self, kind: BodyKind, data: &[u8]) -> WasmResult<()> {
        match self.body_for(kind) {
            Some(body) => body.copy_from(data),
            None => Err(WasmError::BadArgument(format!(
                "{:?} body is not available in this phase",
                kind
            ))),
        }
    }

    fn send_local_response(&mut self, status: u32) {
        let has_decoder = self.headers.has_decoder();
        queue_local_reply(self.deferred, has_decoder, status);
    }
}
