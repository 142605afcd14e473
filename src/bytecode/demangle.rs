// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use cpp_demangle::{DemangleOptions, Symbol};

/// Best-effort demangling of a function name from the `name` section.
///
/// Rust symbols (legacy and v0) are tried first, then Itanium C++ symbols.
/// Anything that is not a recognised mangled name is returned unchanged.
pub fn demangle(raw: &str) -> String {
    if let Ok(symbol) = rustc_demangle::try_demangle(raw) {
        // `{:#}` drops the trailing hash of legacy Rust symbols.
        return format!("{:#}", symbol);
    }

    Symbol::new(raw)
        .ok()
        .and_then(|symbol| symbol.demangle(&DemangleOptions::default()).ok())
        .unwrap_or_else(|| raw.to_string())
}
