// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Handles into the proxy's stream, one per direction.
//!
//! A context keeps these for the lifetime of the stream. They are how the
//! bridge reaches proxy state that was handed over in an earlier phase
//! (request headers while the body is flowing, for example) and how it asks
//! the proxy for side effects.

use http::{HeaderMap, StatusCode};

/// Request-direction (decoder) handle.
pub trait DecoderFilterCallbacks {
    /// The request headers of the stream, once the proxy has them.
    fn request_headers(&mut self) -> Option<&mut HeaderMap>;

    /// Creates the request trailer map if it does not exist yet and returns it.
    fn add_decoded_trailers(&mut self) -> &mut HeaderMap;

    /// Drops any cached route resolution for the stream.
    fn clear_route_cache(&mut self);

    /// Answers the downstream caller directly, ending upstream processing.
    fn send_local_reply(&mut self, status: StatusCode, details: &str);
}

/// Response-direction (encoder) handle.
pub trait EncoderFilterCallbacks {
    /// The response headers of the stream, once the proxy has them.
    fn response_headers(&mut self) -> Option<&mut HeaderMap>;

    /// Creates the response trailer map if it does not exist yet and returns it.
    fn add_encoded_trailers(&mut self) -> &mut HeaderMap;
}
