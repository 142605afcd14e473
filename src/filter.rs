// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Per-worker filter factory.
//!
//! A `PluginHandle` binds a plugin to the VM a worker runs it on and owns the
//! plugin's root context. The proxy asks it for one filter per stream.

use crate::context::Context;
use crate::plugin::PluginIdentity;
use crate::vm::SharedVm;
use std::sync::Arc;

pub struct PluginHandle {
    plugin: Arc<PluginIdentity>,
    vm: Option<SharedVm>,
    root: Option<Context>,
}

impl PluginHandle {
    /// Binds `plugin` to `vm`, creating its root context. A plugin whose VM
    /// could not be started is bound to `None`. Without a root context every
    /// filter follows the plugin's failure policy.
    pub fn new(plugin: Arc<PluginIdentity>, vm: Option<SharedVm>) -> Self {
        let root = vm
            .as_ref()
            .and_then(|vm| Context::new_root(vm, Arc::clone(&plugin)).ok());
        Self { plugin, vm, root }
    }

    pub fn plugin(&self) -> &Arc<PluginIdentity> {
        &self.plugin
    }

    pub fn root_context_id(&self) -> Option<u32> {
        self.root.as_ref().map(Context::id)
    }

    /// Creates the filter for a new stream.
    ///
    /// Without a usable VM a fail-open plugin is skipped (`None`), while a
    /// fail-closed plugin gets a detached context that rejects the stream.
    pub fn create_filter(&self) -> Option<Context> {
        let usable = self
            .vm
            .as_ref()
            .zip(self.root_context_id())
            .filter(|(vm, _)| !vm.borrow().is_failed());

        let stream = usable.and_then(|(vm, root_id)| {
            Context::new_stream(vm, root_id, Arc::clone(&self.plugin)).ok()
        });

        match stream {
            Some(stream) => Some(stream),
            None if self.plugin.fail_open() => None,
            None => Some(Context::new_detached(Arc::clone(&self.plugin))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::WasmResult;
    use crate::plugin::TrafficDirection;
    use crate::traits::{GuestEngine, GuestHost};
    use crate::vm::{ContextKind, GuestVm};

    struct IdleEngine;

    impl GuestEngine for IdleEngine {
        fn handle_request(&mut self, _host: &mut dyn GuestHost) -> WasmResult<u64> {
            Ok(0)
        }

        fn handle_response(
            &mut self,
            _host: &mut dyn GuestHost,
            _continuation_id: u32,
        ) -> WasmResult<u32> {
            Ok(0)
        }
    }

    fn plugin(fail_open: bool) -> Arc<PluginIdentity> {
        Arc::new(PluginIdentity::new(
            "p",
            "r",
            "v",
            "wasmtime",
            Vec::new(),
            fail_open,
            TrafficDirection::Outbound,
            None,
        ))
    }

    #[test]
    fn test_healthy_vm_creates_stream_under_root() {
        let vm = GuestVm::new(Box::new(IdleEngine)).into_shared();
        let handle = PluginHandle::new(plugin(false), Some(vm.clone()));
        let root_id = handle.root_context_id().unwrap();

        let filter = handle.create_filter().unwrap();
        assert_eq!(filter.kind(), ContextKind::Stream);
        assert_eq!(filter.parent_id(), root_id);
        assert!(!filter.is_failed());
        assert_eq!(vm.borrow().root_context_of(filter.id()), Some(root_id));
    }

    #[test]
    fn test_missing_vm_fail_open_skips_filter() {
        let handle = PluginHandle::new(plugin(true), None);
        assert!(handle.create_filter().is_none());
        assert!(handle.root_context_id().is_none());
    }

    #[test]
    fn test_missing_vm_fail_closed_gets_detached_context() {
        let handle = PluginHandle::new(plugin(false), None);
        let filter = handle.create_filter().unwrap();
        assert!(filter.is_failed());
    }

    #[test]
    fn test_failed_vm_follows_policy() {
        let vm = GuestVm::new(Box::new(IdleEngine)).into_shared();
        vm.borrow_mut().fail();

        let open = PluginHandle::new(plugin(true), Some(vm.clone()));
        assert!(open.create_filter().is_none());

        let closed = PluginHandle::new(plugin(false), Some(vm));
        let filter = closed.create_filter().unwrap();
        assert!(filter.is_failed());
    }
}
