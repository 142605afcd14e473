// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Message types for guest module loading and introspection.

use crate::observability::messages::StructuredLog;
use std::fmt::{Display, Formatter};
use tracing::Span;

/// Guest module compiled and accepted.
///
/// # Log Level
/// `info!` - Important operational event
///
/// # Example
/// ```
/// use http_wasm_host::observability::messages::module::ModuleLoaded;
///
/// let msg = ModuleLoaded {
///     module_path: "plugins/auth.wasm",
///     size_bytes: 4096,
///     function_count: 12,
/// };
///
/// tracing::info!("{}", msg);
/// ```
pub struct ModuleLoaded<'a> {
    pub module_path: &'a str,
    pub size_bytes: usize,
    pub function_count: usize,
}

impl Display for ModuleLoaded<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Loaded guest module: {} ({} bytes, {} named functions)",
            self.module_path, self.size_bytes, self.function_count
        )
    }
}

impl StructuredLog for ModuleLoaded<'_> {
    fn log(&self) {
        tracing::info!(
            module_path = self.module_path,
            size_bytes = self.size_bytes,
            function_count = self.function_count,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::info_span!(
            "module_loaded",
            span_name = name,
            module_path = self.module_path,
            size_bytes = self.size_bytes,
        )
    }
}

/// Guest module rejected.
///
/// # Log Level
/// `error!` - The plugin will not run
///
/// # Example
/// ```
/// use http_wasm_host::observability::messages::module::ModuleLoadFailed;
///
/// let error = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
/// let msg = ModuleLoadFailed {
///     module_path: "plugins/missing.wasm",
///     error: &error,
/// };
///
/// tracing::error!("{}", msg);
/// ```
pub struct ModuleLoadFailed<'a> {
    pub module_path: &'a str,
    pub error: &'a dyn std::error::Error,
}

impl Display for ModuleLoadFailed<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Failed to load guest module '{}': {}",
            self.module_path, self.error
        )
    }
}

impl StructuredLog for ModuleLoadFailed<'_> {
    fn log(&self) {
        tracing::error!(
            module_path = self.module_path,
            error = %self.error,
            "{}", self
        );
    }

    fn span(&self, name: &str) -> Span {
        tracing::error_span!(
            "module_load_failed",
            span_name = name,
            module_path = self.module_path,
        )
    }
}

/// Precompiled sections removed before compilation.
///
/// # Log Level
/// `debug!` - Load detail
pub struct PrecompiledSectionsStripped<'a> {
    pub module_path: &'a str,
    pub original_bytes: usize,
    pub stripped_bytes: usize,
}

impl Display for PrecompiledSectionsStripped<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Stripped precompiled sections from {}: {} -> {} bytes",
            self.module_path, self.original_bytes, self.stripped_bytes
        )
    }
}

/// Module binary encoding identified.
///
/// # Log Level
/// `debug!` - Load detail
pub struct EncodingDetected<'a> {
    pub module_path: &'a str,
    pub encoding: &'a str,
}

impl Display for EncodingDetected<'_> {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(
            f,
            "Detected {} encoding for module: {}",
            self.encoding, self.module_path
        )
    }
}
