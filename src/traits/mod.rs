// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

pub mod callbacks;
pub mod engine;
pub mod host;

pub use callbacks::{DecoderFilterCallbacks, EncoderFilterCallbacks};
pub use engine::GuestEngine;
pub use host::{GuestHost, LogLevel};
