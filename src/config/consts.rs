/// Maximum accepted guest module size (16MB)
pub const MAX_MODULE_SIZE: usize = 16 * 1024 * 1024;
/// Fuel granted to a guest store when fuel metering is enabled (100 million instructions)
pub const DEFAULT_FUEL_LEVEL: u64 = 100_000_000;
/// Runtime used when the configuration does not name one
pub const DEFAULT_RUNTIME: &str = "wasmtime";
/// Status of the local reply sent when a fail-closed plugin stops a stream
pub const FAIL_STREAM_STATUS: u16 = 503;
/// Response details attached to that local reply
pub const FAIL_STREAM_DETAILS: &str = "http_wasm_fail_stream";
