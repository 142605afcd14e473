// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Flow-control statuses handed back to the proxy, and the guest's
//! next-action codes that map onto them.

/// Status of a headers callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterHeadersStatus {
    Continue,
    StopIteration,
    StopAllIterationAndBuffer,
    StopAllIterationAndWatermark,
}

impl FilterHeadersStatus {
    /// Unknown codes continue.
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => FilterHeadersStatus::StopIteration,
            3 => FilterHeadersStatus::StopAllIterationAndBuffer,
            4 => FilterHeadersStatus::StopAllIterationAndWatermark,
            _ => FilterHeadersStatus::Continue,
        }
    }

    /// Request headers may not pause header iteration alone while the body
    /// keeps flowing to a guest that has not seen it, so `StopIteration`
    /// pauses everything instead.
    pub fn from_request_code(code: u32) -> Self {
        match Self::from_code(code) {
            FilterHeadersStatus::StopIteration => FilterHeadersStatus::StopAllIterationAndWatermark,
            status => status,
        }
    }
}

/// Status of a body callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterDataStatus {
    Continue,
    StopIterationAndBuffer,
    StopIterationAndWatermark,
    StopIterationNoBuffer,
}

impl FilterDataStatus {
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => FilterDataStatus::StopIterationAndBuffer,
            2 => FilterDataStatus::StopIterationAndWatermark,
            3 => FilterDataStatus::StopIterationNoBuffer,
            _ => FilterDataStatus::Continue,
        }
    }
}

/// Status of a trailers callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterTrailersStatus {
    Continue,
    StopIteration,
}

impl FilterTrailersStatus {
    pub fn from_code(code: u32) -> Self {
        match code {
            1 => FilterTrailersStatus::StopIteration,
            _ => FilterTrailersStatus::Continue,
        }
    }
}

/// Status of a metadata callback. Continuing is the only outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterMetadataStatus {
    Continue,
}

/// Status of an informational (1xx) response headers callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Filter1xxHeadersStatus {
    Continue,
}

/// Actions a phase resolves to once the guest is failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fallback<T> {
    pub open: T,
    pub closed: T,
}

impl<T: Copy> Fallback<T> {
    pub fn select(&self, fail_open: bool) -> T {
        if fail_open {
            self.open
        } else {
            self.closed
        }
    }
}

pub const HEADERS_FALLBACK: Fallback<FilterHeadersStatus> = Fallback {
    open: FilterHeadersStatus::Continue,
    closed: FilterHeadersStatus::StopAllIterationAndWatermark,
};

pub const DATA_FALLBACK: Fallback<FilterDataStatus> = Fallback {
    open: FilterDataStatus::Continue,
    closed: FilterDataStatus::StopIterationNoBuffer,
};

pub const TRAILERS_FALLBACK: Fallback<FilterTrailersStatus> = Fallback {
    open: FilterTrailersStatus::Continue,
    closed: FilterTrailersStatus::StopIteration,
};

pub const METADATA_FALLBACK: Fallback<FilterMetadataStatus> = Fallback {
    open: FilterMetadataStatus::Continue,
    closed: FilterMetadataStatus::Continue,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headers_codes() {
        assert_eq!(FilterHeadersStatus::from_code(0), FilterHeadersStatus::Continue);
        assert_eq!(FilterHeadersStatus::from_code(1), FilterHeadersStatus::StopIteration);
        assert_eq!(
            FilterHeadersStatus::from_code(3),
            FilterHeadersStatus::StopAllIterationAndBuffer
        );
        assert_eq!(
            FilterHeadersStatus::from_code(4),
            FilterHeadersStatus::StopAllIterationAndWatermark
        );
        assert_eq!(FilterHeadersStatus::from_code(2), FilterHeadersStatus::Continue);
        assert_eq!(FilterHeadersStatus::from_code(99), FilterHeadersStatus::Continue);
    }

    #[test]
    fn test_request_headers_stop_iteration_is_upgraded() {
        assert_eq!(
            FilterHeadersStatus::from_request_code(1),
            FilterHeadersStatus::StopAllIterationAndWatermark
        );
        assert_eq!(
            FilterHeadersStatus::from_request_code(3),
            FilterHeadersStatus::StopAllIterationAndBuffer
        );
        assert_eq!(FilterHeadersStatus::from_request_code(0), FilterHeadersStatus::Continue);
    }

    #[test]
    fn test_data_and_trailer_codes() {
        assert_eq!(FilterDataStatus::from_code(1), FilterDataStatus::StopIterationAndBuffer);
        assert_eq!(FilterDataStatus::from_code(2), FilterDataStatus::StopIterationAndWatermark);
        assert_eq!(FilterDataStatus::from_code(3), FilterDataStatus::StopIterationNoBuffer);
        assert_eq!(FilterDataStatus::from_code(7), FilterDataStatus::Continue);
        assert_eq!(FilterTrailersStatus::from_code(1), FilterTrailersStatus::StopIteration);
        assert_eq!(FilterTrailersStatus::from_code(2), FilterTrailersStatus::Continue);
    }

    #[test]
    fn test_fallback_selection() {
        assert_eq!(HEADERS_FALLBACK.select(true), FilterHeadersStatus::Continue);
        assert_eq!(
            HEADERS_FALLBACK.select(false),
            FilterHeadersStatus::StopAllIterationAndWatermark
        );
        assert_eq!(DATA_FALLBACK.select(false), FilterDataStatus::StopIterationNoBuffer);
        assert_eq!(TRAILERS_FALLBACK.select(false), FilterTrailersStatus::StopIteration);
        assert_eq!(METADATA_FALLBACK.select(false), FilterMetadataStatus::Continue);
    }
}
