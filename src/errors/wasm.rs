// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Error types for the http-wasm host bridge.
//!
//! The first five variants form the taxonomy the guest ABI understands:
//! they are what a host call reports back across the guest boundary. The
//! remaining variants only surface while a module is being loaded.

use thiserror::Error;

/// Error message for WebAssembly components handed to the loader.
///
/// The http-wasm ABI is defined over core modules; component-model binaries
/// cannot export `handle_request`/`handle_response` in the expected shape.
pub const WASM_UNSUPPORTED_ENCODING: &str = "Unsupported WASM binary: Component Model binaries \
are not supported by the http-wasm ABI. Please build a core WASM module.";

/// Error type for every host-side operation.
#[derive(Error, Debug)]
pub enum WasmError {
    /// The requested map or buffer is not available in the current phase.
    #[error("Bad argument: {0}")]
    BadArgument(String),

    /// A key lookup found nothing.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The capability is not offered by this host.
    #[error("Unimplemented http-wasm API: {0}")]
    Unimplemented(&'static str),

    /// Binary parse failure: truncated length, bad varint, out-of-range slice.
    #[error("Malformed WASM binary: {0}")]
    Malformed(String),

    /// The guest trapped or reported an unrecoverable error.
    #[error("Guest failure: {0}")]
    GuestFailure(String),

    /// The VM has handed out every context id.
    #[error("Context ids exhausted")]
    ContextIdsExhausted,

    /// File I/O error during module or configuration loading.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Module or configuration validation error (size limits, missing exports).
    #[error("Invalid input: {0}")]
    Validation(String),

    /// The binary is a well-formed WASM artifact of a kind we cannot run.
    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    /// Wasmtime engine creation or module compilation error.
    #[error("Engine error: {0}")]
    Engine(String),

    /// WASM binary parsing error from wasmparser.
    #[error("WASM parser error: {0}")]
    Parser(#[from] wasmparser::BinaryReaderError),
}

impl WasmError {
    /// Status code reported to the guest for this error.
    ///
    /// Matches the http-wasm result codes; loader-only errors collapse into
    /// the generic internal failure code.
    pub fn guest_code(&self) -> u32 {
        match self {
            WasmError::NotFound(_) => 1,
            WasmError::BadArgument(_) => 2,
            WasmError::Unimplemented(_) => 12,
            _ => 10,
        }
    }
}

/// Result type alias for host operations.
pub type WasmResult<T> = Result<T, WasmError>;
