// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Host actions requested during a guest call and run after it returns.

use crate::observability::messages::context::InvalidLocalReplyStatus;
use http::StatusCode;
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeferredAction {
    /// Answer the downstream caller through the decoder callbacks.
    SendLocalReply {
        status: StatusCode,
        details: &'static str,
    },
}

/// Queues a guest-requested local reply. Dropped when no decoder callbacks
/// are bound or the status is not a valid HTTP status.
pub fn queue_local_reply(queue: &mut VecDeque<DeferredAction>, has_decoder: bool, status: u32) {
    if !has_decoder {
        return;
    }
    let status = match u16::try_from(status).ok().and_then(|s| StatusCode::from_u16(s).ok()) {
        Some(status) => status,
        None => {
            tracing::warn!("{}", InvalidLocalReplyStatus { status });
            return;
        }
    };
    queue.push_back(DeferredAction::SendLocalReply { status, details: "" });
}
