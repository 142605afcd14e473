// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::{WasmError, WasmResult};
use crate::host::{BodyKind, HeaderMapKind};

/// Guest log levels as numbered by the http-wasm ABI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
    None,
}

impl LogLevel {
    pub fn from_code(code: i32) -> WasmResult<Self> {
        match code {
            -1 => Ok(LogLevel::Debug),
            0 => Ok(LogLevel::Info),
            1 => Ok(LogLevel::Warn),
            2 => Ok(LogLevel::Error),
            3 => Ok(LogLevel::None),
            other => Err(WasmError::BadArgument(format!("unknown log level {}", other))),
        }
    }
}

/// Everything the guest may call back into while one of its entry points runs.
///
/// Implemented by the per-call view a context builds around the proxy data of
/// the current phase. All calls are synchronous and happen on the thread that
/// invoked the guest.
pub trait GuestHost {
    /// Id of the context the call is made on behalf of.
    fn context_id(&self) -> u32;

    /// Number of entries (headers, or body bytes) handed to the current
    /// phase.
    fn element_count(&self) -> u32;

    /// Whether the current phase is the last one of its direction.
    fn end_of_stream(&self) -> bool;

    fn log(&mut self, level: LogLevel, message: &str);

    fn log_enabled(&self, level: LogLevel) -> bool;

    /// The plugin's opaque configuration bytes.
    fn configuration(&self) -> &[u8];

    /// All values of `name` in the given map. `NotFound` when there are none.
    fn header_values(&mut self, kind: HeaderMapKind, name: &str) -> WasmResult<Vec<Vec<u8>>>;

    /// Names present in the given map, one entry per value.
    fn header_names(&mut self, kind: HeaderMapKind) -> WasmResult<Vec<String>>;

    /// Appends a value, keeping existing ones.
    fn add_header_value(&mut self, kind: HeaderMapKind, name: &str, value: &[u8])
        -> WasmResult<()>;

    /// Sets a value, replacing existing ones.
    fn replace_header_value(
        &mut self,
        kind: HeaderMapKind,
        name: &str,
        value: &[u8],
    ) -> WasmResult<()>;

    fn remove_header(&mut self, kind: HeaderMapKind, name: &str) -> WasmResult<()>;

    /// Serialized size of the given map in bytes.
    fn header_map_size(&mut self, kind: HeaderMapKind) -> WasmResult<u32>;

    /// Reads the next window of a body. Returns the packed read word.
    fn read_body(&mut self, kind: BodyKind, dest: &mut [u8]) -> u64;

    /// Replaces a body.
    fn write_body(&mut self, kind: BodyKind, data: &[u8]) -> WasmResult<()>;

    /// Queues a local reply that is sent once the guest call returns.
    fn send_local_response(&mut self, status: u32);

    fn current_time_nanos(&self) -> WasmResult<u64> {
        Err(WasmError::Unimplemented("current_time_nanos"))
    }

    fn monotonic_time_nanos(&self) -> WasmResult<u64> {
        Err(WasmError::Unimplemented("monotonic_time_nanos"))
    }
}
