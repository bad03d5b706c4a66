//! Native intrinsics callable from generated code.
//!
//! The generated entry point may import host functions by name. Rather than
//! relying on whatever the process happens to export, the host collects the
//! functions it offers in an [`IntrinsicTable`] and hands that table to the
//! component that resolves or loads generated code.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::trace;

use crate::contract::GET_TWO_SYMBOL;

/// Signature every native intrinsic shares: no arguments, one `i64`.
pub type IntrinsicFn = extern "C" fn() -> i64;

/// The standard intrinsic. Returns the constant 2.
///
/// Exported unmangled so a statically linked `tempo_entry` object can
/// resolve it at link time.
#[no_mangle]
pub extern "C" fn get_two_from_c() -> i64 {
    trace!(symbol = GET_TWO_SYMBOL, "native intrinsic invoked");
    2
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IntrinsicError {
    #[error("intrinsic '{0}' is already registered")]
    DuplicateSymbol(String),

    #[error("intrinsic name must not be empty")]
    EmptyName,
}

/// A named host function made callable from generated code.
#[derive(Debug, Clone)]
pub struct NativeIntrinsic {
    name: String,
    func: IntrinsicFn,
}

impl NativeIntrinsic {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Code address handed to the linker or JIT.
    pub fn address(&self) -> *const u8 {
        self.func as *const u8
    }

    /// Call the intrinsic from the host side.
    pub fn call(&self) -> i64 {
        (self.func)()
    }
}

/// Registration table of native intrinsics.
///
/// Entries are never removed; a table is built once and then only read.
#[derive(Debug, Clone, Default)]
pub struct IntrinsicTable {
    entries: BTreeMap<String, NativeIntrinsic>,
}

impl IntrinsicTable {
    /// An empty table. Generated code importing anything will fail to load.
    pub fn new() -> Self {
        Self::default()
    }

    /// The table every Tempo host provides: just `get_two_from_c`.
    pub fn standard() -> Self {
        let native = NativeIntrinsic {
            name: GET_TWO_SYMBOL.to_string(),
            func: get_two_from_c,
        };
        let mut table = Self::new();
        table.entries.insert(native.name.clone(), native);
        table
    }

    /// Register `func` under `name`.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        func: IntrinsicFn,
    ) -> Result<&NativeIntrinsic, IntrinsicError> {
        let name = name.into();
        if name.is_empty() {
            return Err(IntrinsicError::EmptyName);
        }
        if self.entries.contains_key(&name) {
            return Err(IntrinsicError::DuplicateSymbol(name));
        }
        let entry = self
            .entries
            .entry(name.clone())
            .or_insert(NativeIntrinsic { name, func });
        Ok(&*entry)
    }

    pub fn lookup(&self, name: &str) -> Option<&NativeIntrinsic> {
        self.entries.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = &NativeIntrinsic> {
        self.entries.values()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
