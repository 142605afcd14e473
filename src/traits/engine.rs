// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::errors::WasmResult;
use crate::traits::GuestHost;

/// The two guest entry points of the http-wasm ABI.
///
/// Implementations compile and run the guest; the bridge only sees the packed
/// results. Both calls run to completion or fail: an `Err` means the guest
/// trapped or is otherwise unusable, and the owning VM is marked failed.
pub trait GuestEngine {
    /// Runs `handle_request`.
    ///
    /// Returns the packed word: continuation id in the high 32 bits, next
    /// action code in the low 32 bits.
    fn handle_request(&mut self, host: &mut dyn GuestHost) -> WasmResult<u64>;

    /// Runs `handle_response` with the continuation id returned by the
    /// request phase. Returns the next action code.
    fn handle_response(&mut self, host: &mut dyn GuestHost, continuation_id: u32)
        -> WasmResult<u32>;
}
