// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod bytecode;   // module introspection
pub mod config;     // plugin configuration
pub mod context;    // per-stream state machine
pub mod errors;     // error handling
pub mod filter;     // per-worker filter factory
pub mod host;       // host surface exposed to the guest
pub mod loader;     // module loading + compilation
pub mod observability;
pub mod plugin;     // plugin identity + cache key
pub mod traits;     // proxy and engine seams
pub mod vm;         // guest VM + context table
