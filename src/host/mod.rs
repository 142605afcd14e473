// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod buffer;
mod call;
mod headers;

pub use buffer::{BodyKind, HostBuffer, ReadResult, END_OF_DATA};
pub use call::{HostCall, GUEST_LOG_TARGET};
pub use headers::{HeaderMapAccessor, HeaderMapKind, TrailerState};
