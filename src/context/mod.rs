// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Per-stream state machine between the proxy and the guest.
//!
//! The proxy drives a stream context through the `decode_*` / `encode_*`
//! callbacks. Each one that reaches the guest goes through a single guarded
//! invocation: a failed VM short-circuits to the phase's fallback action
//! without calling the guest, a successful call has its next-action code
//! translated to a proxy status, and actions the guest queued run in order
//! before control returns to the proxy.

mod deferred;
mod status;


pub use deferred::{queue_local_reply, DeferredAction};
pub use status::{
    Fallback, Filter1xxHeadersStatus, FilterDataStatus, FilterHeadersStatus,
    FilterMetadataStatus, FilterTrailersStatus, DATA_FALLBACK, HEADERS_FALLBACK,
    METADATA_FALLBACK, TRAILERS_FALLBACK,
};

use crate::config::consts::{FAIL_STREAM_DETAILS, FAIL_STREAM_STATUS};
use crate::errors::WasmResult;
use crate::host::{
    BodyKind, HeaderMapAccessor, HeaderMapKind, HostBuffer, HostCall, TrailerState,
};
use crate::observability::messages::context::{
    ContextDestroyed, FallbackApplied, RequestPhaseHandled, StreamFailed,
};
use crate::observability::messages::StructuredLog;
use crate::plugin::PluginIdentity;
use crate::traits::{DecoderFilterCallbacks, EncoderFilterCallbacks};
use crate::vm::{ContextKind, SharedVm, VM_CONTEXT_ID};
use bytes::BytesMut;
use http::{HeaderMap, StatusCode};
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;
use std::sync::Arc;

/// Stream metadata as handed over by the proxy.
pub type MetadataMap = BTreeMap<String, String>;

/// Proxy data exposed to the guest for the current call.
enum Bound<'a> {
    Headers(HeaderMapKind, &'a mut HeaderMap),
    Body(BodyKind, &'a mut BytesMut),
}

enum EntryPoint {
    Request,
    Response,
}

pub struct Context {
    id: u32,
    parent_id: u32,
    kind: ContextKind,
    plugin: Arc<PluginIdentity>,
    vm: Option<SharedVm>,
    decoder: Option<Box<dyn DecoderFilterCallbacks>>,
    encoder: Option<Box<dyn EncoderFilterCallbacks>>,
    created: bool,
    destroyed: bool,
    buffering_request_body: bool,
    buffering_response_body: bool,
    end_of_stream: bool,
    stream_failed: bool,
    request_trailers_added: bool,
    response_trailers_added: bool,
    continuation_id: u32,
    deferred: VecDeque<DeferredAction>,
}

impl Context {
    fn with_ids(
        id: u32,
        parent_id: u32,
        kind: ContextKind,
        plugin: Arc<PluginIdentity>,
        vm: Option<SharedVm>,
    ) -> Self {
        Self {
            id,
            parent_id,
            kind,
            plugin,
            vm,
            decoder: None,
            encoder: None,
            created: false,
            destroyed: false,
            buffering_request_body: false,
            buffering_response_body: false,
            end_of_stream: false,
            stream_failed: false,
            request_trailers_added: false,
            response_trailers_added: false,
            continuation_id: 0,
            deferred: VecDeque::new(),
        }
    }

    /// Creates the root context of a plugin on `vm`.
    pub fn new_root(vm: &SharedVm, plugin: Arc<PluginIdentity>) -> WasmResult<Self> {
        let id = vm.borrow_mut().register_root()?;
        Ok(Self::with_ids(id, id, ContextKind::Root, plugin, Some(Rc::clone(vm))))
    }

    /// Creates a stream context under the root context `root_id`.
    pub fn new_stream(
        vm: &SharedVm,
        root_id: u32,
        plugin: Arc<PluginIdentity>,
    ) -> WasmResult<Self> {
        let id = vm.borrow_mut().register_stream(root_id)?;
        Ok(Self::with_ids(
            id,
            root_id,
            ContextKind::Stream,
            plugin,
            Some(Rc::clone(vm)),
        ))
    }

    /// A stream context with no VM behind it. Permanently failed, so every
    /// phase resolves to the plugin's fallback.
    pub fn new_detached(plugin: Arc<PluginIdentity>) -> Self {
        Self::with_ids(VM_CONTEXT_ID, VM_CONTEXT_ID, ContextKind::Stream, plugin, None)
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn parent_id(&self) -> u32 {
        self.parent_id
    }

    pub fn kind(&self) -> ContextKind {
        self.kind
    }

    pub fn plugin(&self) -> &PluginIdentity {
        &self.plugin
    }

    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Continuation id returned by the last request-phase call.
    pub fn continuation_id(&self) -> u32 {
        self.continuation_id
    }

    /// Failed when there is no VM or the VM recorded a guest failure.
    pub fn is_failed(&self) -> bool {
        self.vm.as_ref().map_or(true, |vm| vm.borrow().is_failed())
    }

    /// Log prefix for lines about this context.
    pub fn log_prefix(&self) -> String {
        match self.kind {
            ContextKind::Stream => self.plugin.log_prefix().to_string(),
            ContextKind::Root | ContextKind::Vm => self.plugin.root_log_prefix(),
        }
    }

    pub fn set_decoder_filter_callbacks(&mut self, callbacks: Box<dyn DecoderFilterCallbacks>) {
        self.decoder = Some(callbacks);
    }

    pub fn set_encoder_filter_callbacks(&mut self, callbacks: Box<dyn EncoderFilterCallbacks>) {
        self.encoder = Some(callbacks);
    }

    // Proxy-facing callbacks, request direction.

    pub fn decode_headers(
        &mut self,
        headers: &mut HeaderMap,
        end_stream: bool,
    ) -> FilterHeadersStatus {
        self.created = true;
        if !end_stream {
            // The guest sees the request once the body arrives.
            return FilterHeadersStatus::StopIteration;
        }
        self.with_deferred_actions(|ctx| {
            ctx.end_of_stream = true;
            let count = element_count(headers.len());
            ctx.on_request_headers(
                Bound::Headers(HeaderMapKind::RequestHeaders, headers),
                count,
                true,
            )
        })
    }

    pub fn decode_data(&mut self, data: &mut BytesMut, end_stream: bool) -> FilterDataStatus {
        if !self.created {
            return FilterDataStatus::Continue;
        }
        self.with_deferred_actions(|ctx| {
            ctx.end_of_stream = end_stream;
            ctx.buffering_request_body = true;
            let length = element_count(data.len());
            ctx.on_request_body(Bound::Body(BodyKind::Request, data), length, end_stream)
        })
    }

    pub fn decode_trailers(&mut self, _trailers: &mut HeaderMap) -> FilterTrailersStatus {
        if !self.created {
            return FilterTrailersStatus::Continue;
        }
        self.with_deferred_actions(Self::on_request_trailers)
    }

    pub fn decode_metadata(&mut self, _metadata: &mut MetadataMap) -> FilterMetadataStatus {
        if !self.created {
            return FilterMetadataStatus::Continue;
        }
        self.with_deferred_actions(Self::on_request_metadata)
    }

    // Proxy-facing callbacks, response direction.

    pub fn encode_1xx_headers(&mut self, _headers: &mut HeaderMap) -> Filter1xxHeadersStatus {
        Filter1xxHeadersStatus::Continue
    }

    pub fn encode_headers(
        &mut self,
        headers: &mut HeaderMap,
        end_stream: bool,
    ) -> FilterHeadersStatus {
        if !self.created {
            return FilterHeadersStatus::Continue;
        }
        if !end_stream {
            return FilterHeadersStatus::StopIteration;
        }
        self.with_deferred_actions(|ctx| {
            ctx.end_of_stream = true;
            let count = element_count(headers.len());
            ctx.on_response_headers(
                Bound::Headers(HeaderMapKind::ResponseHeaders, headers),
                count,
                true,
            )
        })
    }

    pub fn encode_data(&mut self, data: &mut BytesMut, end_stream: bool) -> FilterDataStatus {
        if !self.created {
            return FilterDataStatus::Continue;
        }
        self.with_deferred_actions(|ctx| {
            ctx.end_of_stream = end_stream;
            ctx.buffering_response_body = true;
            let length = element_count(data.len());
            ctx.on_response_body(Bound::Body(BodyKind::Response, data), length, end_stream)
        })
    }

    pub fn encode_trailers(&mut self, _trailers: &mut HeaderMap) -> FilterTrailersStatus {
        if !self.created {
            return FilterTrailersStatus::Continue;
        }
        self.with_deferred_actions(Self::on_response_trailers)
    }

    pub fn encode_metadata(&mut self, _metadata: &mut MetadataMap) -> FilterMetadataStatus {
        if !self.created {
            return FilterMetadataStatus::Continue;
        }
        self.with_deferred_actions(Self::on_response_metadata)
    }

    /// Marks a created stream destroyed. Repeated calls are ignored.
    pub fn on_destroy(&mut self) {
        if self.destroyed || !self.created {
            return;
        }
        self.destroyed = true;
        tracing::debug!("{}", ContextDestroyed { context_id: self.id });
    }

    // Guest-facing phases.

    fn on_request_headers(
        &mut self,
        headers: Bound<'_>,
        count: u32,
        end_of_stream: bool,
    ) -> FilterHeadersStatus {
        self.guarded(HEADERS_FALLBACK, "request headers", |ctx| {
            let next = ctx.call_request(headers, "headers", count, end_of_stream)?;
            Some(FilterHeadersStatus::from_request_code(next))
        })
    }

    fn on_request_body(
        &mut self,
        body: Bound<'_>,
        length: u32,
        end_of_stream: bool,
    ) -> FilterDataStatus {
        self.guarded(DATA_FALLBACK, "request body", |ctx| {
            let next = ctx.call_request(body, "body", length, end_of_stream)?;
            Some(FilterDataStatus::from_code(next))
        })
    }

    // Trailer and metadata phases have no guest entry point; only the guard
    // applies.

    fn on_request_trailers(&mut self) -> FilterTrailersStatus {
        self.guarded(TRAILERS_FALLBACK, "request trailers", |_| {
            Some(FilterTrailersStatus::Continue)
        })
    }

    fn on_request_metadata(&mut self) -> FilterMetadataStatus {
        self.guarded(METADATA_FALLBACK, "request metadata", |_| {
            Some(FilterMetadataStatus::Continue)
        })
    }

    fn on_response_headers(
        &mut self,
        headers: Bound<'_>,
        count: u32,
        end_of_stream: bool,
    ) -> FilterHeadersStatus {
        self.guarded(HEADERS_FALLBACK, "response headers", |ctx| {
            let next = ctx.invoke(headers, EntryPoint::Response, count, end_of_stream)?;
            Some(FilterHeadersStatus::from_code(next as u32))
        })
    }

    fn on_response_body(
        &mut self,
        body: Bound<'_>,
        length: u32,
        end_of_stream: bool,
    ) -> FilterDataStatus {
        self.guarded(DATA_FALLBACK, "response body", |ctx| {
            let next = ctx.invoke(body, EntryPoint::Response, length, end_of_stream)?;
            Some(FilterDataStatus::from_code(next as u32))
        })
    }

    fn on_response_trailers(&mut self) -> FilterTrailersStatus {
        self.guarded(TRAILERS_FALLBACK, "response trailers", |_| {
            Some(FilterTrailersStatus::Continue)
        })
    }

    fn on_response_metadata(&mut self) -> FilterMetadataStatus {
        self.guarded(METADATA_FALLBACK, "response metadata", |_| {
            Some(FilterMetadataStatus::Continue)
        })
    }

    /// Runs `phase` unless the VM is failed, re-checking after it returns.
    /// A `None` from `phase` means the guest failed during the call.
    fn guarded<T: Copy>(
        &mut self,
        fallback: Fallback<T>,
        phase_name: &str,
        phase: impl FnOnce(&mut Self) -> Option<T>,
    ) -> T {
        if self.is_failed() {
            return self.fall_back(fallback, phase_name);
        }
        let status = phase(self);
        match status {
            Some(status) if !self.is_failed() => status,
            _ => self.fall_back(fallback, phase_name),
        }
    }

    fn fall_back<T: Copy>(&mut self, fallback: Fallback<T>, phase_name: &str) -> T {
        let fail_open = self.plugin.fail_open();
        FallbackApplied {
            context_id: self.id,
            phase: phase_name,
            fail_open,
        }
        .log();
        if !fail_open {
            self.fail_stream();
        }
        fallback.select(fail_open)
    }

    /// Answers a fail-closed stream once with a local error reply.
    fn fail_stream(&mut self) {
        if self.stream_failed || self.decoder.is_none() {
            return;
        }
        self.stream_failed = true;
        let status =
            StatusCode::from_u16(FAIL_STREAM_STATUS).unwrap_or(StatusCode::SERVICE_UNAVAILABLE);
        StreamFailed {
            context_id: self.id,
            status: status.as_u16(),
        }
        .log();
        self.deferred.push_back(DeferredAction::SendLocalReply {
            status,
            details: FAIL_STREAM_DETAILS,
        });
    }

    /// Calls `handle_request` and records the continuation id. Returns the
    /// next-action code.
    fn call_request(
        &mut self,
        bound: Bound<'_>,
        phase: &str,
        count: u32,
        end_of_stream: bool,
    ) -> Option<u32> {
        let packed = self.invoke(bound, EntryPoint::Request, count, end_of_stream)?;
        self.continuation_id = (packed >> 32) as u32;
        let next_action = packed as u32;
        RequestPhaseHandled {
            context_id: self.id,
            phase,
            continuation_id: self.continuation_id,
            next_action,
            end_of_stream,
        }
        .log();
        Some(next_action)
    }

    /// Calls into the guest with `bound` exposed, along with its element
    /// count and the end-of-stream flag. `None` when there is no VM or the
    /// guest failed.
    fn invoke(
        &mut self,
        bound: Bound<'_>,
        entry_point: EntryPoint,
        count: u32,
        end_of_stream: bool,
    ) -> Option<u64> {
        let vm = Rc::clone(self.vm.as_ref()?);
        let state = TrailerState {
            request_body_seen: self.buffering_request_body,
            response_body_seen: self.buffering_response_body,
            end_of_stream: self.end_of_stream,
            request_trailers_added: self.request_trailers_added,
            response_trailers_added: self.response_trailers_added,
        };
        let continuation_id = self.continuation_id;

        let decoder = self
            .decoder
            .as_mut()
            .map(|d| &mut **d as &mut dyn DecoderFilterCallbacks);
        let encoder = self
            .encoder
            .as_mut()
            .map(|e| &mut **e as &mut dyn EncoderFilterCallbacks);
        let mut headers = HeaderMapAccessor::new(decoder, encoder, state);
        let mut body = None;
        match bound {
            Bound::Headers(kind, map) => headers = headers.with_map(kind, map),
            Bound::Body(kind, data) => body = Some((kind, HostBuffer::writable(data))),
        }
        let mut host = HostCall::new(self.id, &self.plugin, headers, &mut self.deferred)
            .with_phase(count, end_of_stream);
        if let Some((kind, buffer)) = body {
            host = host.with_body(kind, buffer);
        }

        let result = {
            let mut vm = vm.borrow_mut();
            match entry_point {
                EntryPoint::Request => vm.handle_request(&mut host),
                EntryPoint::Response => {
                    vm.handle_response(&mut host, continuation_id).map(u64::from)
                }
            }
        };

        let state = host.trailer_state();
        drop(host);
        self.request_trailers_added = state.request_trailers_added;
        self.response_trailers_added = state.response_trailers_added;
        result
    }

    /// Runs `f`, then every action queued meanwhile, in order.
    fn with_deferred_actions<R>(&mut self, f: impl FnOnce(&mut Self) -> R) -> R {
        let result = f(self);
        self.run_deferred_actions();
        result
    }

    fn run_deferred_actions(&mut self) {
        while let Some(action) = self.deferred.pop_front() {
            match action {
                DeferredAction::SendLocalReply { status, details } => {
                    if let Some(decoder) = self.decoder.as_mut() {
                        decoder.send_local_reply(status, details);
                    }
                }
            }
        }
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        if self.kind != ContextKind::Stream {
            return;
        }
        if let Some(vm) = &self.vm {
            if let Ok(mut vm) = vm.try_borrow_mut() {
                vm.remove_context(self.id);
            }
        }
    }
}

fn element_count(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}
