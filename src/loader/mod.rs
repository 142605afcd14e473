// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

mod detector;
mod module_loader;

pub use detector::{detect_encoding, ModuleEncoding};
pub use module_loader::{
    LoadedModule, ModuleLoader, HANDLE_REQUEST_EXPORT, HANDLE_RESPONSE_EXPORT,
};
