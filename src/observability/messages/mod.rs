// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for structured logging.
//!
//! Each message implements `Display` for the human-readable line and
//! [`StructuredLog`] to emit it with its fields attached.
//!
//! * `context` - Stream lifecycle, guest calls and failure handling
//! * `module` - Guest module loading and introspection
//!
//! # Usage Pattern
//!
//! ```rust
//! use http_wasm_host::observability::messages::module::ModuleLoaded;
//! use http_wasm_host::observability::messages::StructuredLog;
//!
//! let msg = ModuleLoaded {
//!     module_path: "plugins/auth.wasm",
//!     size_bytes: 4096,
//!     function_count: 12,
//! };
//!
//! msg.log();
//! ```

use tracing::Span;

pub mod context;
pub mod module;

/// Emits a message at its level with its fields attached.
pub trait StructuredLog {
    fn log(&self);

    /// A span carrying the message fields.
    fn span(&self, name: &str) -> Span;
}
