// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! WASM binary encoding detection.
//!
//! The http-wasm ABI is defined over core modules, so component-model
//! binaries are rejected before compilation.

use crate::errors::{WasmError, WasmResult, WASM_UNSUPPORTED_ENCODING};
use wasmparser::{Encoding, Parser, Payload};

/// Encoding of an accepted guest binary.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ModuleEncoding {
    /// Core WASM module (binary version 1).
    Core,
}

impl ModuleEncoding {
    pub fn as_str(self) -> &'static str {
        match self {
            ModuleEncoding::Core => "core module",
        }
    }
}

/// Reads the version header with `wasmparser` and accepts core modules only.
///
/// # Errors
/// - `Parser` when the header is truncated or invalid
/// - `UnsupportedEncoding` for component-model binaries
pub fn detect_encoding(bytes: &[u8]) -> WasmResult<ModuleEncoding> {
    for payload in Parser::new(0).parse_all(bytes) {
        if let Payload::Version { encoding, .. } = payload? {
            return match encoding {
                Encoding::Module => Ok(ModuleEncoding::Core),
                Encoding::Component => Err(WasmError::UnsupportedEncoding(
                    WASM_UNSUPPORTED_ENCODING.to_string(),
                )),
            };
        }
    }
    Err(WasmError::Malformed("missing WASM version header".to_string()))
}
