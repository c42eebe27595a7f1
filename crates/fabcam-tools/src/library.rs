//! Tool libraries: tool-number to bit bindings for one machine setup.
//!
//! Library records follow the tool table layout
//! `{"version": 1, "tools": [{"nr": 1, "path": "5mm_Endmill.fctb"}, ...]}`,
//! where the file stem of `path` names a bit in the bit catalog.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::bit::{Bit, Bits};
use crate::error::{Result, ToolsError};

/// Library record format version.
pub const LIBRARY_VERSION: u32 = 1;

/// One tool slot in a library.
#[derive(Debug, Clone, PartialEq)]
pub struct LibraryEntry {
    /// Tool number (T1, T2, ...).
    pub number: u32,
    /// The bit mounted in this slot.
    pub bit: Bit,
}

/// A named set of tool bindings, sorted by tool number.
#[derive(Debug, Clone, PartialEq)]
pub struct Library {
    /// Library name.
    pub name: String,
    entries: Vec<LibraryEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct LibraryRecord {
    version: u32,
    tools: Vec<ToolRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct ToolRecord {
    nr: u32,
    path: String,
}

impl Library {
    /// Build a library, rejecting repeated tool numbers.
    pub fn new(name: impl Into<String>, entries: impl IntoIterator<Item = LibraryEntry>) -> Result<Self> {
        let mut entries: Vec<LibraryEntry> = entries.into_iter().collect();
        entries.sort_by_key(|entry| entry.number);
        if let Some(pair) = entries.windows(2).find(|pair| pair[0].number == pair[1].number) {
            return Err(ToolsError::duplicate("tool number", pair[0].number));
        }
        Ok(Self {
            name: name.into(),
            entries,
        })
    }

    /// Build a library from `(tool number, bit name)` bindings, resolving
    /// each bit name through `bits`.
    pub fn from_bindings(name: impl Into<String>, bindings: &[(u32, &str)], bits: &Bits) -> Result<Self> {
        let entries = bindings
            .iter()
            .map(|(number, bit_name)| {
                Ok(LibraryEntry {
                    number: *number,
                    bit: bits.lookup(bit_name)?.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Self::new(name, entries)
    }

    /// Bit bound to tool number `number`.
    pub fn lookup_number(&self, number: u32) -> Result<&Bit> {
        self.entries
            .binary_search_by_key(&number, |entry| entry.number)
            .map(|index| &self.entries[index].bit)
            .map_err(|_| ToolsError::not_found("tool number", number))
    }

    /// Bit named `name`, taking the lowest tool number when the bit is
    /// mounted more than once.
    pub fn lookup_name(&self, name: &str) -> Result<&Bit> {
        self.entries
            .iter()
            .map(|entry| &entry.bit)
            .find(|bit| bit.name == name)
            .ok_or_else(|| ToolsError::not_found("bit", name))
    }

    /// Entries in tool number order.
    pub fn entries(&self) -> &[LibraryEntry] {
        &self.entries
    }

    /// Serialize to the tool table layout.
    pub fn to_json(&self) -> serde_json::Value {
        let record = LibraryRecord {
            version: LIBRARY_VERSION,
            tools: self
                .entries
                .iter()
                .map(|entry| ToolRecord {
                    nr: entry.number,
                    path: format!("{}.fctb", entry.bit.name),
                })
                .collect(),
        };
        serde_json::json!(record)
    }

    /// Read a tool table, resolving every path stem through `bits`.
    pub fn from_json(name: impl Into<String>, value: &serde_json::Value, bits: &Bits) -> Result<Self> {
        let name = name.into();
        let record = LibraryRecord::deserialize(value)
            .map_err(|e| ToolsError::schema(&name, "<record>", e.to_string()))?;
        if record.version != LIBRARY_VERSION {
            return Err(ToolsError::schema(
                &name,
                "version",
                format!("must be {LIBRARY_VERSION}, found {}", record.version),
            ));
        }
        let mut entries = Vec::with_capacity(record.tools.len());
        for tool in &record.tools {
            let stem = Path::new(&tool.path)
                .file_stem()
                .and_then(|stem| stem.to_str())
                .ok_or_else(|| ToolsError::schema(&name, "path", format!("`{}` names no bit", tool.path)))?;
            entries.push(LibraryEntry {
                number: tool.nr,
                bit: bits.lookup(stem)?.clone(),
            });
        }
        Self::new(name, entries)
    }
}

/// A name-sorted catalog of libraries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Libraries {
    libraries: Vec<Library>,
}

impl Libraries {
    /// Build a catalog, rejecting repeated names.
    pub fn new(libraries: impl IntoIterator<Item = Library>) -> Result<Self> {
        let mut libraries: Vec<Library> = libraries.into_iter().collect();
        libraries.sort_by(|a, b| a.name.cmp(&b.name));
        if let Some(pair) = libraries.windows(2).find(|pair| pair[0].name == pair[1].name) {
            return Err(ToolsError::duplicate("library", &pair[0].name));
        }
        Ok(Self { libraries })
    }

    /// Exact-match lookup.
    pub fn lookup(&self, name: &str) -> Result<&Library> {
        self.libraries
            .binary_search_by(|library| library.name.as_str().cmp(name))
            .map(|index| &self.libraries[index])
            .map_err(|_| ToolsError::not_found("library", name))
    }

    /// Libraries in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Library> {
        self.libraries.iter()
    }
}
