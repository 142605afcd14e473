// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use crate::config::consts::DEFAULT_RUNTIME;
use crate::errors::ConfigError;
use crate::plugin::{ListenerMetadata, TrafficDirection};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Configuration of one http-wasm plugin.
///
/// Typically loaded from a YAML file. Everything except `name` and
/// `vm_config.code` is optional.
///
/// # Fields
/// * `name` - Plugin name, part of the cache key and the log prefix
/// * `root_id` - Root context id, groups streams sharing one root context
/// * `vm_config` - Which module to run and on which runtime
/// * `configuration` - Opaque configuration handed to the guest verbatim
/// * `fail_open` - Let traffic through unfiltered once the guest failed
/// * `direction` - Traffic direction of the listener
/// * `listener_metadata` - Listener-scope metadata, hashed into the cache key
///
/// # Example
/// ```yaml
/// name: auth
/// root_id: auth_root
/// fail_open: false
/// direction: inbound
/// vm_config:
///   vm_id: vm_1
///   runtime: wasmtime
///   code: plugins/auth.wasm
/// configuration: '{"header": "x-auth"}'
/// listener_metadata:
///   team: edge
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct PluginConfig {
    pub name: String,
    #[serde(default)]
    pub root_id: String,
    pub vm_config: VmConfig,
    #[serde(default)]
    pub configuration: String,
    #[serde(default)]
    pub fail_open: bool,
    #[serde(default)]
    pub direction: TrafficDirection,
    #[serde(default)]
    pub listener_metadata: Option<ListenerMetadata>,
}

/// Guest module and runtime selection.
#[derive(Debug, Clone, Deserialize)]
pub struct VmConfig {
    #[serde(default)]
    pub vm_id: String,
    #[serde(default = "default_runtime")]
    pub runtime: String,
    pub code: PathBuf,
}

fn default_runtime() -> String {
    DEFAULT_RUNTIME.to_string()
}

/// Parse and validate a plugin configuration from YAML text.
pub fn parse_plugin_config(content: &str) -> Result<PluginConfig, ConfigError> {
    let cfg: PluginConfig = serde_yaml::from_str(content)?;
    validate(&cfg)?;
    Ok(cfg)
}

/// Load and validate a plugin configuration from a YAML file.
///
/// A relative `vm_config.code` path is resolved against the directory of the
/// configuration file.
pub fn load_plugin_config<P: AsRef<Path>>(path: P) -> Result<PluginConfig, ConfigError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let mut cfg = parse_plugin_config(&content)?;

    if cfg.vm_config.code.is_relative() {
        if let Some(dir) = path.parent() {
            cfg.vm_config.code = dir.join(&cfg.vm_config.code);
        }
    }

    tracing::debug!(
        plugin = %cfg.name,
        code = %cfg.vm_config.code.display(),
        "Loaded plugin configuration"
    );
    Ok(cfg)
}

fn validate(cfg: &PluginConfig) -> Result<(), ConfigError> {
    if cfg.name.trim().is_empty() {
        return Err(ConfigError::Invalid("plugin name must not be empty".to_string()));
    }
    if cfg.vm_config.code.as_os_str().is_empty() {
        return Err(ConfigError::Invalid(format!(
            "plugin '{}' does not name a module in vm_config.code",
            cfg.name
        )));
    }
    if cfg.vm_config.runtime != DEFAULT_RUNTIME {
        return Err(ConfigError::Invalid(format!(
            "plugin '{}' requests unsupported runtime '{}'",
            cfg.name, cfg.vm_config.runtime
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const FULL: &str = r#"
name: auth
root_id: auth_root
fail_open: true
direction: outbound
vm_config:
  vm_id: vm_1
  runtime: wasmtime
  code: /plugins/auth.wasm
configuration: '{"header": "x-auth"}'
listener_metadata:
  team: edge
  weight: 3
"#;

    #[test]
    fn test_parse_full_config() {
        let cfg = parse_plugin_config(FULL).unwrap();

        assert_eq!(cfg.name, "auth");
        assert_eq!(cfg.root_id, "auth_root");
        assert!(cfg.fail_open);
        assert_eq!(cfg.direction, TrafficDirection::Outbound);
        assert_eq!(cfg.vm_config.vm_id, "vm_1");
        assert_eq!(cfg.vm_config.code, PathBuf::from("/plugins/auth.wasm"));
        assert_eq!(cfg.configuration, r#"{"header": "x-auth"}"#);

        let metadata = cfg.listener_metadata.unwrap();
        assert_eq!(metadata["team"], serde_json::json!("edge"));
        assert_eq!(metadata["weight"], serde_json::json!(3));
    }

    #[test]
    fn test_defaults() {
        let cfg = parse_plugin_config("name: minimal\nvm_config:\n  code: m.wasm\n").unwrap();

        assert_eq!(cfg.root_id, "");
        assert!(!cfg.fail_open);
        assert_eq!(cfg.direction, TrafficDirection::Unspecified);
        assert_eq!(cfg.vm_config.runtime, DEFAULT_RUNTIME);
        assert!(cfg.listener_metadata.is_none());
    }

    #[test]
    fn test_rejects_empty_name() {
        let result = parse_plugin_config("name: ''\nvm_config:\n  code: m.wasm\n");
        assert!(matches!(result, Err(ConfigError::Invalid(msg)) if msg.contains("name")));
    }

    #[test]
    fn test_rejects_unknown_runtime() {
        let result =
            parse_plugin_config("name: p\nvm_config:\n  code: m.wasm\n  runtime: v8\n");
        assert!(matches!(result, Err(ConfigError::Invalid(msg)) if msg.contains("v8")));
    }

    #[test]
    fn test_rejects_bad_yaml() {
        let result = parse_plugin_config("name: [unterminated");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_resolves_relative_code_path() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"name: p\nvm_config:\n  code: plugin.wasm\n").unwrap();

        let cfg = load_plugin_config(file.path()).unwrap();
        let expected = file.path().parent().unwrap().join("plugin.wasm");
        assert_eq!(cfg.vm_config.code, expected);
    }

    #[test]
    fn test_load_missing_file() {
        let result = load_plugin_config("/definitely/not/here.yaml");
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }
}
