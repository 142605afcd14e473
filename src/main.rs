// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use anyhow::{bail, Context as _, Result};
use http_wasm_host::bytecode;
use http_wasm_host::config::load_plugin_config;
use http_wasm_host::loader::ModuleLoader;
use http_wasm_host::plugin::PluginIdentity;
use std::env;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "Usage: http-wasm-inspect <module.wasm> | --config <plugin.yaml>";

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = env::args().collect();
    let module_path = match args.get(1).map(String::as_str) {
        Some("--config") => {
            let Some(config_path) = args.get(2) else {
                bail!(USAGE);
            };
            let config = load_plugin_config(config_path)
                .with_context(|| format!("loading plugin configuration {}", config_path))?;
            print_identity(&PluginIdentity::from_config(&config));
            config.vm_config.code
        }
        Some(path) if !path.starts_with('-') => PathBuf::from(path),
        _ => bail!(USAGE),
    };

    inspect(&module_path)
}

fn print_identity(plugin: &PluginIdentity) {
    println!("Plugin");
    println!("  name:       {}", plugin.name());
    println!("  root id:    {}", plugin.root_id());
    println!("  vm id:      {}", plugin.vm_id());
    println!("  direction:  {}", plugin.direction());
    println!("  fail open:  {}", plugin.fail_open());
    println!("  key:        {}", String::from_utf8_lossy(plugin.key()));
    println!();
}

fn inspect(module_path: &Path) -> Result<()> {
    let bytes = std::fs::read(module_path)
        .with_context(|| format!("reading {}", module_path.display()))?;

    println!("Module {} ({} bytes)", module_path.display(), bytes.len());
    println!("Sections");
    for section in bytecode::sections(&bytes)? {
        let name = section
            .display_name()
            .map(|name| format!(" \"{}\"", name))
            .unwrap_or_default();
        println!(
            "  id {:>2}  {:>8} bytes{}",
            section.id,
            section.range.len(),
            name
        );
    }

    let names = bytecode::function_names(&bytes)?;
    println!("Functions ({} named)", names.len());
    for (index, name) in &names {
        println!("  {:>5}  {}", index, name);
    }

    let loaded = ModuleLoader::load_bytes(&bytes, &module_path.to_string_lossy())
        .context("module rejected")?;
    println!(
        "Accepted as {}: {} bytes after stripping precompiled sections",
        loaded.encoding.as_str(),
        loaded.stripped_size
    );
    Ok(())
}
