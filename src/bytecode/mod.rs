// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

//! Guest module introspection.
//!
//! A tolerant extractor over the WASM binary container, not a validator. It
//! walks the section list of a core module to:
//! - locate named custom sections
//! - recover the function-index-to-name table from the `name` section
//! - produce a stripped copy without `precompiled_` sections
//!
//! ## Framing
//! ```text
//! magic (00 61 73 6D) | version (4 bytes) | section*
//! section        = id:u8 | len:varuint32 | payload[len]
//! custom payload = name_len:varuint32 | name[name_len] | body
//! ```
//!
//! Any declared length that would read past the end of the buffer aborts the
//! operation with [`WasmError::Malformed`].

mod demangle;
mod varint;

pub use demangle::demangle;
pub use varint::parse_varint;

use crate::errors::{WasmError, WasmResult};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::ops::Range;

/// The four magic bytes every WASM binary starts with.
pub const WASM_MAGIC: [u8; 4] = [0x00, 0x61, 0x73, 0x6d];

/// Magic plus version.
pub const WASM_HEADER_LEN: usize = 8;

/// Section id of custom sections.
pub const CUSTOM_SECTION_ID: u8 = 0;

/// Custom section carrying debug names.
pub const NAME_SECTION: &str = "name";

/// Subsection id of the function-name map inside the `name` section.
pub const FUNCTION_NAMES_SUBSECTION_ID: u8 = 1;

/// Custom sections whose name contains this marker are removed by stripping.
pub const PRECOMPILED_SECTION_MARKER: &str = "precompiled_";

/// Function index to (demangled) display name.
pub type FunctionNames = BTreeMap<u32, String>;

/// One top-level section of a module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section<'a> {
    /// Section id byte.
    pub id: u8,
    /// Byte range of the whole section, id byte included.
    pub range: Range<usize>,
    /// Name of a custom section, `None` for every other section.
    pub custom_name: Option<&'a [u8]>,
    /// Section body. For custom sections this excludes the name prefix.
    pub payload: &'a [u8],
}

impl Section<'_> {
    pub fn is_custom(&self) -> bool {
        self.id == CUSTOM_SECTION_ID
    }

    /// Lossy rendering of the custom section name, for diagnostics.
    pub fn display_name(&self) -> Option<Cow<'_, str>> {
        self.custom_name.map(String::from_utf8_lossy)
    }

    fn is_precompiled(&self) -> bool {
        self.custom_name
            .map(|name| contains(name, PRECOMPILED_SECTION_MARKER.as_bytes()))
            .unwrap_or(false)
    }
}

/// Iterator over the sections following the module header.
///
/// Yields `Err` once and then stops if a section header is malformed.
pub struct SectionReader<'a> {
    bytecode: &'a [u8],
    pos: usize,
    done: bool,
}

impl<'a> SectionReader<'a> {
    /// Starts reading after the header.
    ///
    /// # Errors
    /// `Malformed` if the header check fails.
    pub fn new(bytecode: &'a [u8]) -> WasmResult<Self> {
        if !check_wasm_header(bytecode) {
            return Err(WasmError::Malformed("bad magic number".to_string()));
        }
        Ok(Self {
            bytecode,
            pos: WASM_HEADER_LEN.min(bytecode.len()),
            done: false,
        })
    }

    fn read_section(&mut self) -> WasmResult<Section<'a>> {
        let bytecode = self.bytecode;
        let start = self.pos;
        let id = bytecode[start];
        self.pos += 1;

        let len = parse_varint(bytecode, &mut self.pos)? as usize;
        let payload_start = self.pos;
        let end = payload_start
            .checked_add(len)
            .filter(|end| *end <= bytecode.len())
            .ok_or_else(|| {
                WasmError::Malformed(format!(
                    "section at offset {} declares {} bytes past the end of the module",
                    start, len
                ))
            })?;
        self.pos = end;

        let section_bytes = &bytecode[..end];
        if id != CUSTOM_SECTION_ID {
            return Ok(Section {
                id,
                range: start..end,
                custom_name: None,
                payload: &section_bytes[payload_start..],
            });
        }

        let mut name_pos = payload_start;
        let name_len = parse_varint(section_bytes, &mut name_pos)? as usize;
        let name_end = name_pos
            .checked_add(name_len)
            .filter(|name_end| *name_end <= end)
            .ok_or_else(|| {
                WasmError::Malformed(format!(
                    "custom section name at offset {} overruns its section",
                    name_pos
                ))
            })?;

        Ok(Section {
            id,
            range: start..end,
            custom_name: Some(&section_bytes[name_pos..name_end]),
            payload: &section_bytes[name_end..],
        })
    }
}

impl<'a> Iterator for SectionReader<'a> {
    type Item = WasmResult<Section<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.pos >= self.bytecode.len() {
            return None;
        }
        let section = self.read_section();
        if section.is_err() {
            self.done = true;
        }
        Some(section)
    }
}

/// Loose header check.
///
/// Accepts inputs too short to hold a header as well as inputs starting with
/// the WASM magic; only a full-length header with the wrong magic is refused.
pub fn check_wasm_header(bytecode: &[u8]) -> bool {
    bytecode.len() < WASM_HEADER_LEN || bytecode[..WASM_MAGIC.len()] == WASM_MAGIC
}

/// Lists every section of the module.
pub fn sections(bytecode: &[u8]) -> WasmResult<Vec<Section<'_>>> {
    SectionReader::new(bytecode)?.collect()
}

/// Finds the first custom section called `name` and returns its body.
///
/// A well-formed module without the section yields `Ok(None)`.
///
/// # Errors
/// `Malformed` for a bad header or any length running past the buffer
/// before the section is found.
pub fn custom_section<'a>(bytecode: &'a [u8], name: &str) -> WasmResult<Option<&'a [u8]>> {
    for section in SectionReader::new(bytecode)? {
        let section = section?;
        if section.custom_name == Some(name.as_bytes()) {
            return Ok(Some(section.payload));
        }
    }
    Ok(None)
}

/// Recovers the function-index-to-name table from the `name` section.
///
/// Only the function-names subsection is interpreted. Names are demangled
/// when possible. A module without a `name` section yields an empty table;
/// for duplicate indices the first entry wins.
///
/// # Errors
/// `Malformed` when the section list or the `name` section is inconsistent,
/// including a function-names subsection whose entries do not end exactly at
/// its declared size.
pub fn function_names(bytecode: &[u8]) -> WasmResult<FunctionNames> {
    let mut names = FunctionNames::new();
    let Some(name_section) = custom_section(bytecode, NAME_SECTION)? else {
        return Ok(names);
    };

    let mut pos = 0;
    while pos < name_section.len() {
        let subsection_id = name_section[pos];
        pos += 1;
        let size = parse_varint(name_section, &mut pos)? as usize;
        let end = pos
            .checked_add(size)
            .filter(|end| *end <= name_section.len())
            .ok_or_else(|| {
                WasmError::Malformed(format!(
                    "name subsection {} overruns the name section",
                    subsection_id
                ))
            })?;

        if subsection_id != FUNCTION_NAMES_SUBSECTION_ID {
            pos = end;
            continue;
        }

        let subsection = &name_section[..end];
        let count = parse_varint(subsection, &mut pos)? as usize;
        if count > end - pos {
            return Err(WasmError::Malformed(format!(
                "function name count {} exceeds subsection size",
                count
            )));
        }

        for _ in 0..count {
            let index = parse_varint(subsection, &mut pos)?;
            let len = parse_varint(subsection, &mut pos)? as usize;
            let name_end = pos
                .checked_add(len)
                .filter(|name_end| *name_end <= end)
                .ok_or_else(|| {
                    WasmError::Malformed(format!("name of function {} is truncated", index))
                })?;
            let raw = String::from_utf8_lossy(&subsection[pos..name_end]);
            names.entry(index).or_insert_with(|| demangle(&raw));
            pos = name_end;
        }

        if pos != end {
            return Err(WasmError::Malformed(format!(
                "function names subsection ends at {} but {} bytes were consumed",
                end, pos
            )));
        }
    }

    Ok(names)
}

/// Produces the module without its `precompiled_` custom sections.
///
/// Everything before the first reserved section is copied once. After that,
/// only non-custom sections are carried over. A module without reserved
/// sections is returned unchanged (borrowed).
///
/// # Errors
/// `Malformed` for a bad header or an inconsistent section list.
pub fn stripped_source(bytecode: &[u8]) -> WasmResult<Cow<'_, [u8]>> {
    let mut stripped: Option<Vec<u8>> = None;

    for section in SectionReader::new(bytecode)? {
        let section = section?;
        if section.is_custom() {
            if section.is_precompiled() && stripped.is_none() {
                stripped = Some(bytecode[..section.range.start].to_vec());
            }
        } else if let Some(out) = stripped.as_mut() {
            out.extend_from_slice(&bytecode[section.range.clone()]);
        }
    }

    Ok(match stripped {
        Some(out) => Cow::Owned(out),
        None => Cow::Borrowed(bytecode),
    })
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}
