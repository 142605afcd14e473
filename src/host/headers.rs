// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Typed access to the four header/trailer maps of a stream.
//!
//! A `HeaderMapAccessor` is built for one guest call. Maps handed to the
//! current lifecycle callback are borrowed directly; maps from earlier phases
//! are reached through the proxy's callback handles. Trailer maps are created
//! lazily, and only on the mutable path.

use crate::errors::{WasmError, WasmResult};
use crate::traits::{DecoderFilterCallbacks, EncoderFilterCallbacks};
use http::header::{HeaderName, HeaderValue};
use http::HeaderMap;

/// Addressable maps, numbered as in the http-wasm ABI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeaderMapKind {
    RequestHeaders,
    ResponseHeaders,
    RequestTrailers,
    ResponseTrailers,
}

impl HeaderMapKind {
    pub fn from_code(code: u32) -> WasmResult<Self> {
        match code {
            0 => Ok(HeaderMapKind::RequestHeaders),
            1 => Ok(HeaderMapKind::ResponseHeaders),
            2 => Ok(HeaderMapKind::RequestTrailers),
            3 => Ok(HeaderMapKind::ResponseTrailers),
            other => Err(WasmError::BadArgument(format!("unknown header map kind {}", other))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HeaderMapKind::RequestHeaders => "request headers",
            HeaderMapKind::ResponseHeaders => "response headers",
            HeaderMapKind::RequestTrailers => "request trailers",
            HeaderMapKind::ResponseTrailers => "response trailers",
        }
    }
}

/// Stream flags that decide whether trailer maps may be created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TrailerState {
    pub request_body_seen: bool,
    pub response_body_seen: bool,
    pub end_of_stream: bool,
    pub request_trailers_added: bool,
    pub response_trailers_added: bool,
}

/// Per-call view over the stream's header maps.
pub struct HeaderMapAccessor<'a> {
    request_headers: Option<&'a mut HeaderMap>,
    response_headers: Option<&'a mut HeaderMap>,
    request_trailers: Option<&'a mut HeaderMap>,
    response_trailers: Option<&'a mut HeaderMap>,
    decoder: Option<&'a mut dyn DecoderFilterCallbacks>,
    encoder: Option<&'a mut dyn EncoderFilterCallbacks>,
    state: TrailerState,
}

impl<'a> HeaderMapAccessor<'a> {
    pub fn new(
        decoder: Option<&'a mut dyn DecoderFilterCallbacks>,
        encoder: Option<&'a mut dyn EncoderFilterCallbacks>,
        state: TrailerState,
    ) -> Self {
        Self {
            request_headers: None,
            response_headers: None,
            request_trailers: None,
            response_trailers: None,
            decoder,
            encoder,
            state,
        }
    }

    /// Binds a map handed to the current lifecycle callback.
    pub fn with_map(mut self, kind: HeaderMapKind, map: &'a mut HeaderMap) -> Self {
        match kind {
            HeaderMapKind::RequestHeaders => self.request_headers = Some(map),
            HeaderMapKind::ResponseHeaders => self.response_headers = Some(map),
            HeaderMapKind::RequestTrailers => self.request_trailers = Some(map),
            HeaderMapKind::ResponseTrailers => self.response_trailers = Some(map),
        }
        self
    }

    /// Flags after the call, including trailer maps created during it.
    pub fn state(&self) -> TrailerState {
        self.state
    }

    pub fn has_decoder(&self) -> bool {
        self.decoder.is_some()
    }

    /// Resolves a map. With `materialize` set, a missing trailer map is
    /// created once the direction's body was seen and the stream ended.
    fn resolve(&mut self, kind: HeaderMapKind, materialize: bool) -> Option<&mut HeaderMap> {
        match kind {
            HeaderMapKind::RequestHeaders => {
                if self.request_headers.is_some() {
                    return self.request_headers.as_deref_mut();
                }
                self.decoder.as_deref_mut()?.request_headers()
            }
            HeaderMapKind::ResponseHeaders => {
                if self.response_headers.is_some() {
                    return self.response_headers.as_deref_mut();
                }
                self.encoder.as_deref_mut()?.response_headers()
            }
            HeaderMapKind::RequestTrailers => {
                if self.request_trailers.is_some() {
                    return self.request_trailers.as_deref_mut();
                }
                let ready = self.state.request_trailers_added
                    || (materialize && self.state.request_body_seen && self.state.end_of_stream);
                if !ready {
                    return None;
                }
                let decoder = self.decoder.as_deref_mut()?;
                self.state.request_trailers_added = true;
                Some(decoder.add_decoded_trailers())
            }
            HeaderMapKind::ResponseTrailers => {
                if self.response_trailers.is_some() {
                    return self.response_trailers.as_deref_mut();
                }
                let ready = self.state.response_trailers_added
                    || (materialize && self.state.response_body_seen && self.state.end_of_stream);
                if !ready {
                    return None;
                }
                let encoder = self.encoder.as_deref_mut()?;
                self.state.response_trailers_added = true;
                Some(encoder.add_encoded_trailers())
            }
        }
    }

    fn map_mut(&mut self, kind: HeaderMapKind) -> WasmResult<&mut HeaderMap> {
        self.resolve(kind, true)
            .ok_or_else(|| WasmError::BadArgument(format!("{} not available", kind.as_str())))
    }

    fn map(&mut self, kind: HeaderMapKind) -> WasmResult<&HeaderMap> {
        self.resolve(kind, false)
            .map(|map| &*map)
            .ok_or_else(|| WasmError::BadArgument(format!("{} not available", kind.as_str())))
    }

    // Header values may take part in route selection, so every mutation of
    // the request headers drops the cached route.
    fn after_mutation(&mut self, kind: HeaderMapKind) {
        if kind == HeaderMapKind::RequestHeaders {
            if let Some(decoder) = self.decoder.as_deref_mut() {
                decoder.clear_route_cache();
            }
        }
    }

    pub fn add(&mut self, kind: HeaderMapKind, name: &str, value: &[u8]) -> WasmResult<()> {
        let (name, value) = (header_name(name)?, header_value(value)?);
        self.map_mut(kind)?.append(name, value);
        self.after_mutation(kind);
        Ok(())
    }

    pub fn replace(&mut self, kind: HeaderMapKind, name: &str, value: &[u8]) -> WasmResult<()> {
        let (name, value) = (header_name(name)?, header_value(value)?);
        self.map_mut(kind)?.insert(name, value);
        self.after_mutation(kind);
        Ok(())
    }

    pub fn remove(&mut self, kind: HeaderMapKind, name: &str) -> WasmResult<()> {
        let name = header_name(name)?;
        self.map_mut(kind)?.remove(&name);
        self.after_mutation(kind);
        Ok(())
    }

    /// All values of `name`, in insertion order.
    pub fn values(&mut self, kind: HeaderMapKind, name: &str) -> WasmResult<Vec<Vec<u8>>> {
        let name = header_name(name)?;
        let values: Vec<Vec<u8>> = self
            .map(kind)?
            .get_all(&name)
            .iter()
            .map(|value| value.as_bytes().to_vec())
            .collect();
        if values.is_empty() {
            return Err(WasmError::NotFound(name.to_string()));
        }
        Ok(values)
    }

    /// One name per stored value.
    pub fn names(&mut self, kind: HeaderMapKind) -> WasmResult<Vec<String>> {
        Ok(self
            .map(kind)?
            .iter()
            .map(|(name, _)| name.as_str().to_string())
            .collect())
    }

    /// Sum of name and value lengths over every entry.
    pub fn byte_size(&mut self, kind: HeaderMapKind) -> WasmResult<u32> {
        let size: usize = self
            .map_mut(kind)?
            .iter()
            .map(|(name, value)| name.as_str().len() + value.len())
            .sum();
        Ok(u32::try_from(size).unwrap_or(u32::MAX))
    }
}

fn header_name(name: &str) -> WasmResult<HeaderName> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|_| WasmError::BadArgument(format!("invalid header name '{}'", name)))
}

fn header_value(value: &[u8]) -> WasmResult<HeaderValue> {
    HeaderValue::from_bytes(value)
        .map_err(|_| WasmError::BadArgument("invalid header value".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[derive(Default)]
    struct Decoder {
        headers: Option<HeaderMap>,
        trailers: Option<HeaderMap>,
        route_cache_clears: usize,
    }

    impl DecoderFilterCallbacks for Decoder {
        fn request_headers(&mut self) -> Option<&mut HeaderMap> {
            self.headers.as_mut()
        }

        fn add_decoded_trailers(&mut self) -> &mut HeaderMap {
            self.trailers.get_or_insert_with(HeaderMap::new)
        }

        fn clear_route_cache(&mut self) {
            self.route_cache_clears += 1;
        }

        fn send_local_reply(&mut self, _status: StatusCode, _details: &str) {}
    }

    #[derive(Default)]
    struct Encoder {
        headers: Option<HeaderMap>,
        trailers: Option<HeaderMap>,
    }

    impl EncoderFilterCallbacks for Encoder {
        fn response_headers(&mut self) -> Option<&mut HeaderMap> {
            self.headers.as_mut()
        }

        fn add_encoded_trailers(&mut self) -> &mut HeaderMap {
            self.trailers.get_or_insert_with(HeaderMap::new)
        }
    }

    fn request_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("host", HeaderValue::from_static("example.com"));
        headers.append("accept", HeaderValue::from_static("text/html"));
        headers.append("accept", HeaderValue::from_static("*/*"));
        headers
    }

    #[test]
    fn test_values_and_names() {
        let mut headers = request_headers();
        let mut accessor = HeaderMapAccessor::new(None, None, TrailerState::default())
            .with_map(HeaderMapKind::RequestHeaders, &mut headers);

        let values = accessor.values(HeaderMapKind::RequestHeaders, "Accept").unwrap();
        assert_eq!(values, vec![b"text/html".to_vec(), b"*/*".to_vec()]);

        let names = accessor.names(HeaderMapKind::RequestHeaders).unwrap();
        assert_eq!(names, vec!["host", "accept", "accept"]);

        assert!(matches!(
            accessor.values(HeaderMapKind::RequestHeaders, "missing"),
            Err(WasmError::NotFound(_))
        ));
    }

    #[test]
    fn test_unavailable_map_is_bad_argument() {
        let mut accessor = HeaderMapAccessor::new(None, None, TrailerState::default());
        assert!(matches!(
            accessor.values(HeaderMapKind::ResponseHeaders, "a"),
            Err(WasmError::BadArgument(_))
        ));
        assert!(matches!(
            accessor.add(HeaderMapKind::RequestTrailers, "a", b"b"),
            Err(WasmError::BadArgument(_))
        ));
    }

    #[test]
    fn test_replace_clears_route_cache_once_per_call() {
        let mut headers = request_headers();
        let mut decoder = Decoder::default();
        {
            let mut accessor =
                HeaderMapAccessor::new(Some(&mut decoder), None, TrailerState::default())
                    .with_map(HeaderMapKind::RequestHeaders, &mut headers);
            accessor.replace(HeaderMapKind::RequestHeaders, "host", b"a.test").unwrap();
            accessor.replace(HeaderMapKind::RequestHeaders, "host", b"b.test").unwrap();
        }
        assert_eq!(decoder.route_cache_clears, 2);
        assert_eq!(headers.get("host").unwrap(), "b.test");
    }

    #[test]
    fn test_every_request_mutation_clears_route_cache() {
        let mut headers = request_headers();
        let mut decoder = Decoder::default();
        {
            let mut accessor =
                HeaderMapAccessor::new(Some(&mut decoder), None, TrailerState::default())
                    .with_map(HeaderMapKind::RequestHeaders, &mut headers);
            accessor.add(HeaderMapKind::RequestHeaders, "x-a", b"1").unwrap();
            accessor.remove(HeaderMapKind::RequestHeaders, "accept").unwrap();
            accessor.values(HeaderMapKind::RequestHeaders, "x-a").unwrap();
        }
        assert_eq!(decoder.route_cache_clears, 2);
        assert!(headers.get("accept").is_none());
    }

    #[test]
    fn test_response_mutation_leaves_route_cache() {
        let mut response = HeaderMap::new();
        let mut decoder = Decoder::default();
        {
            let mut accessor =
                HeaderMapAccessor::new(Some(&mut decoder), None, TrailerState::default())
                    .with_map(HeaderMapKind::ResponseHeaders, &mut response);
            accessor.add(HeaderMapKind::ResponseHeaders, "x-a", b"1").unwrap();
        }
        assert_eq!(decoder.route_cache_clears, 0);
        assert_eq!(response.get("x-a").unwrap(), "1");
    }

    #[test]
    fn test_failed_mutation_leaves_route_cache() {
        let mut decoder = Decoder::default();
        let mut accessor =
            HeaderMapAccessor::new(Some(&mut decoder), None, TrailerState::default());
        assert!(accessor.replace(HeaderMapKind::RequestHeaders, "host", b"x").is_err());
        drop(accessor);
        assert_eq!(decoder.route_cache_clears, 0);
    }

    #[test]
    fn test_request_headers_from_callbacks() {
        let mut decoder = Decoder {
            headers: Some(request_headers()),
            ..Decoder::default()
        };
        let mut accessor =
            HeaderMapAccessor::new(Some(&mut decoder), None, TrailerState::default());
        let values = accessor.values(HeaderMapKind::RequestHeaders, "host").unwrap();
        assert_eq!(values, vec![b"example.com".to_vec()]);
    }

    #[test]
    fn test_trailers_materialize_after_body_end() {
        let mut decoder = Decoder::default();
        let state = TrailerState {
            request_body_seen: true,
            end_of_stream: true,
            ..TrailerState::default()
        };
        let mut accessor = HeaderMapAccessor::new(Some(&mut decoder), None, state);

        // Reads never create the map.
        assert!(accessor.names(HeaderMapKind::RequestTrailers).is_err());
        assert!(!accessor.state().request_trailers_added);

        accessor.add(HeaderMapKind::RequestTrailers, "grpc-status", b"0").unwrap();
        assert!(accessor.state().request_trailers_added);
        assert_eq!(
            accessor.values(HeaderMapKind::RequestTrailers, "grpc-status").unwrap(),
            vec![b"0".to_vec()]
        );
        drop(accessor);
        assert_eq!(decoder.trailers.unwrap().len(), 1);
    }

    #[test]
    fn test_trailers_not_materialized_mid_stream() {
        let mut decoder = Decoder::default();
        let state = TrailerState {
            request_body_seen: true,
            end_of_stream: false,
            ..TrailerState::default()
        };
        let mut accessor = HeaderMapAccessor::new(Some(&mut decoder), None, state);
        assert!(matches!(
            accessor.add(HeaderMapKind::RequestTrailers, "a", b"b"),
            Err(WasmError::BadArgument(_))
        ));
        drop(accessor);
        assert!(decoder.trailers.is_none());
    }

    #[test]
    fn test_response_trailers_materialize_after_body_end() {
        let mut decoder = Decoder::default();
        let mut encoder = Encoder::default();
        let state = TrailerState {
            response_body_seen: true,
            end_of_stream: true,
            ..TrailerState::default()
        };
        let mut accessor = HeaderMapAccessor::new(Some(&mut decoder), Some(&mut encoder), state);

        assert!(accessor.names(HeaderMapKind::ResponseTrailers).is_err());
        accessor.replace(HeaderMapKind::ResponseTrailers, "grpc-status", b"0").unwrap();
        assert!(accessor.state().response_trailers_added);
        assert!(!accessor.state().request_trailers_added);
        assert_eq!(
            accessor.names(HeaderMapKind::ResponseTrailers).unwrap(),
            vec!["grpc-status"]
        );
        drop(accessor);

        assert_eq!(encoder.trailers.unwrap().get("grpc-status").unwrap(), "0");
        assert!(decoder.trailers.is_none());
        assert_eq!(decoder.route_cache_clears, 0);
    }

    #[test]
    fn test_response_trailers_need_response_body() {
        let mut encoder = Encoder::default();
        let state = TrailerState {
            request_body_seen: true,
            end_of_stream: true,
            ..TrailerState::default()
        };
        let mut accessor = HeaderMapAccessor::new(None, Some(&mut encoder), state);
        assert!(matches!(
            accessor.add(HeaderMapKind::ResponseTrailers, "a", b"b"),
            Err(WasmError::BadArgument(_))
        ));
        drop(accessor);
        assert!(encoder.trailers.is_none());
    }

    #[test]
    fn test_byte_size() {
        let mut headers = request_headers();
        let mut accessor = HeaderMapAccessor::new(None, None, TrailerState::default())
            .with_map(HeaderMapKind::RequestHeaders, &mut headers);
        // host + example.com, accept + text/html, accept + */*
        assert_eq!(accessor.byte_size(HeaderMapKind::RequestHeaders).unwrap(), 15 + 15 + 9);
    }

    #[test]
    fn test_invalid_name_is_bad_argument() {
        let mut headers = HeaderMap::new();
        let mut accessor = HeaderMapAccessor::new(None, None, TrailerState::default())
            .with_map(HeaderMapKind::RequestHeaders, &mut headers);
        assert!(matches!(
            accessor.add(HeaderMapKind::RequestHeaders, "bad name", b"v"),
            Err(WasmError::BadArgument(_))
        ));
        assert!(matches!(
            accessor.add(HeaderMapKind::RequestHeaders, "ok", b"bad\nvalue"),
            Err(WasmError::BadArgument(_))
        ));
    }

    #[test]
    fn test_kind_codes() {
        assert_eq!(HeaderMapKind::from_code(0).unwrap(), HeaderMapKind::RequestHeaders);
        assert_eq!(HeaderMapKind::from_code(1).unwrap(), HeaderMapKind::ResponseHeaders);
        assert_eq!(HeaderMapKind::from_code(2).unwrap(), HeaderMapKind::RequestTrailers);
        assert_eq!(HeaderMapKind::from_code(3).unwrap(), HeaderMapKind::ResponseTrailers);
        assert!(HeaderMapKind::from_code(4).is_err());
    }
}
