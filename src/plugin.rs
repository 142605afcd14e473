// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Plugin identity.
//!
//! A `PluginIdentity` is the immutable description of one configured plugin.
//! Its cache key is what an external instance-reuse layer uses to decide
//! whether two configurations can share a guest instance, so it must be a
//! pure function of the fields below.

use crate::config::PluginConfig;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt;

const KEY_SEPARATOR: &[u8] = b"||";

/// Traffic direction of the listener the plugin is attached to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrafficDirection {
    #[default]
    Unspecified,
    Inbound,
    Outbound,
}

impl TrafficDirection {
    pub fn as_str(self) -> &'static str {
        match self {
            TrafficDirection::Unspecified => "UNSPECIFIED",
            TrafficDirection::Inbound => "INBOUND",
            TrafficDirection::Outbound => "OUTBOUND",
        }
    }
}

impl fmt::Display for TrafficDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Listener-scope metadata. Sorted, so its serialized form is canonical.
pub type ListenerMetadata = BTreeMap<String, serde_json::Value>;

/// Immutable identity of a configured plugin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginIdentity {
    name: String,
    root_id: String,
    vm_id: String,
    engine: String,
    configuration: Vec<u8>,
    fail_open: bool,
    direction: TrafficDirection,
    listener_metadata_hash: Option<String>,
    key: Vec<u8>,
    log_prefix: String,
}

impl PluginIdentity {
    /// Builds the identity and derives its cache key and log prefix.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: impl Into<String>,
        root_id: impl Into<String>,
        vm_id: impl Into<String>,
        engine: impl Into<String>,
        configuration: impl Into<Vec<u8>>,
        fail_open: bool,
        direction: TrafficDirection,
        listener_metadata: Option<&ListenerMetadata>,
    ) -> Self {
        let name = name.into();
        let root_id = root_id.into();
        let vm_id = vm_id.into();
        let configuration = configuration.into();
        let listener_metadata_hash = listener_metadata.map(hash_metadata);

        let mut key = Vec::with_capacity(root_id.len() + configuration.len() + name.len() + 32);
        key.extend_from_slice(root_id.as_bytes());
        key.extend_from_slice(KEY_SEPARATOR);
        key.extend_from_slice(&configuration);
        key.extend_from_slice(KEY_SEPARATOR);
        key.extend_from_slice(name.as_bytes());
        key.extend_from_slice(KEY_SEPARATOR);
        key.extend_from_slice(direction.as_str().as_bytes());
        if let Some(hash) = &listener_metadata_hash {
            key.extend_from_slice(KEY_SEPARATOR);
            key.extend_from_slice(hash.as_bytes());
        }

        let log_prefix = make_log_prefix(&[&name, &root_id, &vm_id]);

        Self {
            name,
            root_id,
            vm_id,
            engine: engine.into(),
            configuration,
            fail_open,
            direction,
            listener_metadata_hash,
            key,
            log_prefix,
        }
    }

    /// Builds the identity from a loaded plugin configuration.
    pub fn from_config(config: &PluginConfig) -> Self {
        Self::new(
            config.name.clone(),
            config.root_id.clone(),
            config.vm_config.vm_id.clone(),
            config.vm_config.runtime.clone(),
            config.configuration.clone().into_bytes(),
            config.fail_open,
            config.direction,
            config.listener_metadata.as_ref(),
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    pub fn vm_id(&self) -> &str {
        &self.vm_id
    }

    pub fn engine(&self) -> &str {
        &self.engine
    }

    /// Opaque configuration bytes handed to the guest.
    pub fn configuration(&self) -> &[u8] {
        &self.configuration
    }

    pub fn fail_open(&self) -> bool {
        self.fail_open
    }

    pub fn direction(&self) -> TrafficDirection {
        self.direction
    }

    pub fn listener_metadata_hash(&self) -> Option<&str> {
        self.listener_metadata_hash.as_deref()
    }

    /// Cache key: `root_id||configuration||name||DIRECTION[||metadata_hash]`.
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    /// Prefix for log lines of stream contexts, e.g. `" auth auth_root vm_1"`.
    pub fn log_prefix(&self) -> &str {
        &self.log_prefix
    }

    /// Prefix for log lines of the root context; the plugin name is omitted.
    pub fn root_log_prefix(&self) -> String {
        make_log_prefix(&[&self.root_id, &self.vm_id])
    }
}

fn make_log_prefix(parts: &[&str]) -> String {
    parts
        .iter()
        .filter(|part| !part.is_empty())
        .fold(String::new(), |mut prefix, part| {
            prefix.push(' ');
            prefix.push_str(part);
            prefix
        })
}

fn hash_metadata(metadata: &ListenerMetadata) -> String {
    // BTreeMap keys serialize in order and serde_json objects nested inside
    // are sorted as well (no `preserve_order`), so the JSON text is canonical.
    let canonical = serde_json::to_vec(metadata).unwrap_or_default();
    hex::encode(Sha256::digest(&canonical))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(metadata: Option<&ListenerMetadata>) -> PluginIdentity {
        PluginIdentity::new(
            "auth",
            "auth_root",
            "vm_1",
            "wasmtime",
            b"{\"header\":\"x-auth\"}".to_vec(),
            false,
            TrafficDirection::Inbound,
            metadata,
        )
    }

    #[test]
    fn test_key_layout() {
        let plugin = identity(None);
        assert_eq!(
            plugin.key(),
            b"auth_root||{\"header\":\"x-auth\"}||auth||INBOUND".as_slice()
        );
        assert_eq!(plugin.listener_metadata_hash(), None);
    }

    #[test]
    fn test_key_is_deterministic() {
        let mut metadata = ListenerMetadata::new();
        metadata.insert("team".to_string(), serde_json::json!("edge"));
        metadata.insert("zone".to_string(), serde_json::json!({"b": 1, "a": 2}));

        let first = identity(Some(&metadata));
        let second = identity(Some(&metadata.clone()));
        assert_eq!(first.key(), second.key());
        assert_eq!(first, second);

        let hash = first.listener_metadata_hash().unwrap();
        assert_eq!(hash.len(), 64);
        assert!(first.key().ends_with(hash.as_bytes()));
    }

    #[test]
    fn test_key_changes_with_fields() {
        let base = identity(None);
        let outbound = PluginIdentity::new(
            "auth",
            "auth_root",
            "vm_1",
            "wasmtime",
            b"{\"header\":\"x-auth\"}".to_vec(),
            false,
            TrafficDirection::Outbound,
            None,
        );
        assert_ne!(base.key(), outbound.key());

        let mut metadata = ListenerMetadata::new();
        metadata.insert("team".to_string(), serde_json::json!("edge"));
        assert_ne!(base.key(), identity(Some(&metadata)).key());
    }

    #[test]
    fn test_vm_id_and_engine_are_not_part_of_key() {
        let base = identity(None);
        let other = PluginIdentity::new(
            "auth",
            "auth_root",
            "vm_2",
            "other",
            b"{\"header\":\"x-auth\"}".to_vec(),
            true,
            TrafficDirection::Inbound,
            None,
        );
        assert_eq!(base.key(), other.key());
    }

    #[test]
    fn test_log_prefixes() {
        let plugin = identity(None);
        assert_eq!(plugin.log_prefix(), " auth auth_root vm_1");
        assert_eq!(plugin.root_log_prefix(), " auth_root vm_1");

        let anonymous = PluginIdentity::new(
            "",
            "",
            "",
            "",
            Vec::new(),
            true,
            TrafficDirection::Unspecified,
            None,
        );
        assert_eq!(anonymous.log_prefix(), "");
        assert!(anonymous.fail_open());
    }
}
