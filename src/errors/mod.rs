// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod config;
mod wasm;

pub use config::ConfigError;
pub use wasm::{WasmError, WasmResult, WASM_UNSUPPORTED_ENCODING};
