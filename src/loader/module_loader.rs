// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Guest module loading and validation.
//!
//! ## Responsibilities
//! - Read module bytes and enforce the size limit
//! - Reject malformed framing and component-model binaries
//! - Strip `precompiled_` sections and compile with wasmtime
//! - Require the two http-wasm entry-point exports
//! - Recover the function-name table for diagnostics

use crate::bytecode::{self, FunctionNames, WASM_HEADER_LEN};
use crate::config::consts::{DEFAULT_FUEL_LEVEL, MAX_MODULE_SIZE};
use crate::errors::{WasmError, WasmResult};
use crate::loader::detector::{detect_encoding, ModuleEncoding};
use crate::observability::messages::module::{
    EncodingDetected, ModuleLoadFailed, ModuleLoaded, PrecompiledSectionsStripped,
};
use crate::observability::messages::StructuredLog;
use std::path::Path;
use wasmtime::{Config, Engine, ExternType, Module, Store};

/// Export called for the request phases.
pub const HANDLE_REQUEST_EXPORT: &str = "handle_request";
/// Export called for the response phases.
pub const HANDLE_RESPONSE_EXPORT: &str = "handle_response";

/// A compiled guest module with its diagnostics.
pub struct LoadedModule {
    pub engine: Engine,
    pub module: Module,
    pub encoding: ModuleEncoding,
    pub function_names: FunctionNames,
    pub module_path: String,
    pub original_size: usize,
    pub stripped_size: usize,
}

impl LoadedModule {
    /// A store on this module's engine with the default fuel budget.
    pub fn new_store<T>(&self, data: T) -> WasmResult<Store<T>> {
        let mut store = Store::new(&self.engine, data);
        store
            .set_fuel(DEFAULT_FUEL_LEVEL)
            .map_err(|e| WasmError::Engine(e.to_string()))?;
        Ok(store)
    }
}

pub struct ModuleLoader;

impl ModuleLoader {
    /// Loads and validates a guest module from the filesystem.
    pub fn load<P: AsRef<Path>>(module_path: P) -> WasmResult<LoadedModule> {
        let module_path = module_path.as_ref();
        let module_path_str = module_path.to_string_lossy().to_string();

        let result = std::fs::read(module_path)
            .map_err(WasmError::Io)
            .and_then(|bytes| Self::load_bytes(&bytes, &module_path_str));

        if let Err(error) = &result {
            ModuleLoadFailed {
                module_path: &module_path_str,
                error,
            }
            .log();
        }
        result
    }

    /// Validates and compiles module bytes. `module_path` is only used for
    /// diagnostics.
    pub fn load_bytes(bytes: &[u8], module_path: &str) -> WasmResult<LoadedModule> {
        if bytes.len() > MAX_MODULE_SIZE {
            return Err(WasmError::Validation(format!(
                "WASM module too large: {} bytes (max: {} bytes)",
                bytes.len(),
                MAX_MODULE_SIZE
            )));
        }
        if bytes.len() < WASM_HEADER_LEN || !bytecode::check_wasm_header(bytes) {
            return Err(WasmError::Malformed(format!(
                "'{}' does not start with a WASM header",
                module_path
            )));
        }

        let stripped = bytecode::stripped_source(bytes)?;
        let function_names = bytecode::function_names(bytes)?;
        if stripped.len() != bytes.len() {
            tracing::debug!(
                "{}",
                PrecompiledSectionsStripped {
                    module_path,
                    original_bytes: bytes.len(),
                    stripped_bytes: stripped.len(),
                }
            );
        }

        let encoding = detect_encoding(&stripped)?;
        tracing::debug!(
            "{}",
            EncodingDetected {
                module_path,
                encoding: encoding.as_str(),
            }
        );

        let engine = Self::create_engine()?;
        let module =
            Module::new(&engine, &*stripped).map_err(|e| WasmError::Engine(e.to_string()))?;
        Self::require_entry_points(&module)?;

        ModuleLoaded {
            module_path,
            size_bytes: bytes.len(),
            function_count: function_names.len(),
        }
        .log();

        Ok(LoadedModule {
            engine,
            module,
            encoding,
            function_names,
            module_path: module_path.to_string(),
            original_size: bytes.len(),
            stripped_size: stripped.len(),
        })
    }

    /// Creates a wasmtime engine for guest modules.
    pub fn create_engine() -> WasmResult<Engine> {
        let mut config = Config::new();

        config.wasm_threads(false);
        config.wasm_simd(false);
        config.wasm_relaxed_simd(false);
        config.wasm_multi_memory(false);
        config.wasm_memory64(false);

        // Guests run synchronously on the proxy's worker thread; fuel bounds
        // how long a single entry-point call can hold it.
        config.consume_fuel(true);
        config.epoch_interruption(false);

        Engine::new(&config).map_err(|e| WasmError::Engine(e.to_string()))
    }

    fn require_entry_points(module: &Module) -> WasmResult<()> {
        for export in [HANDLE_REQUEST_EXPORT, HANDLE_RESPONSE_EXPORT] {
            match module.get_export(export) {
                Some(ExternType::Func(_)) => {}
                Some(_) => {
                    return Err(WasmError::Validation(format!(
                        "export '{}' is not a function",
                        export
                    )))
                }
                None => {
                    return Err(WasmError::Validation(format!(
                        "module does not export '{}'",
                        export
                    )))
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const GUEST: &str = r#"
        (module
          (func $handle_request (export "handle_request") (result i64)
            i64.const 0)
          (func $handle_response (export "handle_response") (param i32 i32)))
    "#;

    fn guest_bytes() -> Vec<u8> {
        wat::parse_str(GUEST).unwrap()
    }

    fn append_custom(bytes: &mut Vec<u8>, name: &str, body: &[u8]) {
        let payload_len = 1 + name.len() + body.len();
        assert!(payload_len < 0x80);
        bytes.push(0);
        bytes.push(payload_len as u8);
        bytes.push(name.len() as u8);
        bytes.extend_from_slice(name.as_bytes());
        bytes.extend_from_slice(body);
    }

    #[test]
    fn test_engine_creation() {
        assert!(ModuleLoader::create_engine().is_ok());
    }

    #[test]
    fn test_load_guest_module() {
        let loaded = ModuleLoader::load_bytes(&guest_bytes(), "guest.wasm").unwrap();

        assert_eq!(loaded.encoding, ModuleEncoding::Core);
        assert_eq!(loaded.original_size, loaded.stripped_size);
        assert_eq!(
            loaded.function_names.get(&0).map(String::as_str),
            Some("handle_request")
        );
        assert_eq!(
            loaded.function_names.get(&1).map(String::as_str),
            Some("handle_response")
        );
    }

    #[test]
    fn test_new_store_has_fuel() {
        let loaded = ModuleLoader::load_bytes(&guest_bytes(), "guest.wasm").unwrap();
        let store = loaded.new_store(()).unwrap();
        assert_eq!(store.get_fuel().unwrap(), DEFAULT_FUEL_LEVEL);
    }

    #[test]
    fn test_precompiled_sections_are_stripped() {
        let mut bytes = guest_bytes();
        append_custom(&mut bytes, "precompiled_x86_64", b"native code");

        let loaded = ModuleLoader::load_bytes(&bytes, "guest.wasm").unwrap();
        assert_eq!(loaded.original_size, bytes.len());
        assert!(loaded.stripped_size < loaded.original_size);
    }

    #[test]
    fn test_missing_entry_point() {
        let bytes = wat::parse_str(
            r#"(module (func (export "handle_request") (result i64) i64.const 0))"#,
        )
        .unwrap();
        let result = ModuleLoader::load_bytes(&bytes, "half.wasm");
        assert!(
            matches!(result, Err(WasmError::Validation(msg)) if msg.contains("handle_response"))
        );
    }

    #[test]
    fn test_entry_point_must_be_function() {
        let bytes = wat::parse_str(
            r#"(module
                 (func (export "handle_request") (result i64) i64.const 0)
                 (global (export "handle_response") i32 (i32.const 0)))"#,
        )
        .unwrap();
        let result = ModuleLoader::load_bytes(&bytes, "global.wasm");
        assert!(
            matches!(result, Err(WasmError::Validation(msg)) if msg.contains("not a function"))
        );
    }

    #[test]
    fn test_component_is_rejected() {
        let bytes = wat::parse_str("(component)").unwrap();
        let result = ModuleLoader::load_bytes(&bytes, "component.wasm");
        assert!(matches!(result, Err(WasmError::UnsupportedEncoding(_))));
    }

    #[test]
    fn test_malformed_framing_is_rejected() {
        let mut bytes = guest_bytes();
        // A section claiming more bytes than remain.
        bytes.extend_from_slice(&[0x01, 0x7f, 0x00]);
        let result = ModuleLoader::load_bytes(&bytes, "broken.wasm");
        assert!(matches!(result, Err(WasmError::Malformed(_))));
    }

    #[test]
    fn test_short_or_foreign_input_is_rejected() {
        assert!(matches!(
            ModuleLoader::load_bytes(b"\0asm", "short.wasm"),
            Err(WasmError::Malformed(_))
        ));
        assert!(matches!(
            ModuleLoader::load_bytes(b"#!/bin/sh\necho", "script.wasm"),
            Err(WasmError::Malformed(_))
        ));
    }

    #[test]
    fn test_module_size_validation() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(&vec![0u8; MAX_MODULE_SIZE + 1]).unwrap();

        let result = ModuleLoader::load(temp_file.path());
        assert!(matches!(result, Err(WasmError::Validation(msg)) if msg.contains("too large")));
    }

    #[test]
    fn test_load_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(&guest_bytes()).unwrap();

        let loaded = ModuleLoader::load(temp_file.path()).unwrap();
        assert_eq!(loaded.module_path, temp_file.path().to_string_lossy());
    }

    #[test]
    fn test_load_missing_file() {
        let result = ModuleLoader::load("/definitely/not/here.wasm");
        assert!(matches!(result, Err(WasmError::Io(_))));
    }
}
