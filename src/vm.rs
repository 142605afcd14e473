// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! One guest engine instance and the contexts bound to it.
//!
//! A `GuestVm` belongs to a single worker thread. It owns the engine, the
//! sticky failure flag every bound context consults, and the context table:
//! an arena of records keyed by id, where a root is its own parent.

use crate::errors::{WasmError, WasmResult};
use crate::observability::messages::context::{ContextCreated, GuestCallFailed};
use crate::observability::messages::StructuredLog;
use crate::traits::{GuestEngine, GuestHost};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Id of the VM-wide context, registered when the VM is created.
pub const VM_CONTEXT_ID: u32 = 0;

/// Shared handle to a VM. Contexts and the filter factory hold clones.
pub type SharedVm = Rc<RefCell<GuestVm>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextKind {
    Vm,
    Root,
    Stream,
}

impl ContextKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ContextKind::Vm => "vm",
            ContextKind::Root => "root",
            ContextKind::Stream => "stream",
        }
    }
}

/// Entry of the context table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextRecord {
    pub kind: ContextKind,
    pub parent_id: u32,
}

pub struct GuestVm {
    engine: Box<dyn GuestEngine>,
    failed: bool,
    next_context_id: u32,
    contexts: HashMap<u32, ContextRecord>,
}

impl GuestVm {
    pub fn new(engine: Box<dyn GuestEngine>) -> Self {
        let mut contexts = HashMap::new();
        contexts.insert(
            VM_CONTEXT_ID,
            ContextRecord {
                kind: ContextKind::Vm,
                parent_id: VM_CONTEXT_ID,
            },
        );
        Self {
            engine,
            failed: false,
            next_context_id: VM_CONTEXT_ID + 1,
            contexts,
        }
    }

    pub fn into_shared(self) -> SharedVm {
        Rc::new(RefCell::new(self))
    }

    pub fn is_failed(&self) -> bool {
        self.failed
    }

    /// Marks the VM failed. Never cleared.
    pub fn fail(&mut self) {
        self.failed = true;
    }

    // Ids never wrap, so a live id is never handed out twice.
    fn allocate_context_id(&mut self) -> WasmResult<u32> {
        let id = self.next_context_id;
        self.next_context_id = id.checked_add(1).ok_or(WasmError::ContextIdsExhausted)?;
        Ok(id)
    }

    /// Allocates an id for a root context, which is its own parent.
    pub fn register_root(&mut self) -> WasmResult<u32> {
        let id = self.allocate_context_id()?;
        self.insert(id, ContextKind::Root, id);
        Ok(id)
    }

    /// Allocates an id for a stream context under `root_id`.
    pub fn register_stream(&mut self, root_id: u32) -> WasmResult<u32> {
        match self.contexts.get(&root_id) {
            Some(record) if record.kind == ContextKind::Root => {}
            _ => {
                return Err(WasmError::NotFound(format!(
                    "root context {} is not registered",
                    root_id
                )))
            }
        }
        let id = self.allocate_context_id()?;
        self.insert(id, ContextKind::Stream, root_id);
        Ok(id)
    }

    fn insert(&mut self, id: u32, kind: ContextKind, parent_id: u32) {
        self.contexts.insert(id, ContextRecord { kind, parent_id });
        tracing::debug!(
            "{}",
            ContextCreated {
                context_id: id,
                parent_id,
                kind: kind.as_str(),
            }
        );
    }

    /// Drops a stream record. Vm and root records live as long as the VM.
    pub fn remove_context(&mut self, id: u32) {
        if let Some(record) = self.contexts.get(&id) {
            if record.kind == ContextKind::Stream {
                self.contexts.remove(&id);
            }
        }
    }

    pub fn context(&self, id: u32) -> Option<ContextRecord> {
        self.contexts.get(&id).copied()
    }

    pub fn context_count(&self) -> usize {
        self.contexts.len()
    }

    /// Follows parent links until a self-parented context.
    pub fn root_context_of(&self, id: u32) -> Option<u32> {
        let mut current = id;
        // A chain can never be longer than the table.
        for _ in 0..=self.contexts.len() {
            let record = self.contexts.get(&current)?;
            if record.parent_id == current {
                return Some(current);
            }
            current = record.parent_id;
        }
        None
    }

    /// Runs `handle_request`. `None` when the guest failed.
    pub fn handle_request(&mut self, host: &mut dyn GuestHost) -> Option<u64> {
        let context_id = host.context_id();
        match self.engine.handle_request(host) {
            Ok(packed) => Some(packed),
            Err(error) => {
                self.record_failure(context_id, "handle_request", &error);
                None
            }
        }
    }

    /// Runs `handle_response`. `None` when the guest failed.
    pub fn handle_response(
        &mut self,
        host: &mut dyn GuestHost,
        continuation_id: u32,
    ) -> Option<u32> {
        let context_id = host.context_id();
        match self.engine.handle_response(host, continuation_id) {
            Ok(next) => Some(next),
            Err(error) => {
                self.record_failure(context_id, "handle_response", &error);
                None
            }
        }
    }

    fn record_failure(&mut self, context_id: u32, entry_point: &str, error: &WasmError) {
        GuestCallFailed {
            context_id,
            entry_point,
            error,
        }
        .log();
        self.fail();
    }
}
