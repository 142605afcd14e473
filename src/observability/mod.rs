// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Observability module for structured logging and tracing.
//!
//! Diagnostic and operational log lines are built from message structs that
//! implement `Display`, so no log text is scattered through the code paths
//! that emit it.
//!
//! # Architecture
//!
//! Messages are organized by subsystem:
//! * `messages::context` - Stream lifecycle, guest calls and failure handling
//! * `messages::module` - Guest module loading and introspection
//!
//! # Usage
//!
//! ```rust
//! use http_wasm_host::observability::messages::context::GuestCallFailed;
//!
//! let error = std::io::Error::new(std::io::ErrorKind::Other, "trap");
//! let msg = GuestCallFailed {
//!     context_id: 4,
//!     entry_point: "handle_request",
//!     error: &error,
//! };
//!
//! tracing::error!("{}", msg);
//! ```

pub mod messages;
