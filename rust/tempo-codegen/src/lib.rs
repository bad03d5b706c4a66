//! Native code generation for `tempo_entry` via Cranelift.
//!
//! Produces the reference bodies the conformance harness runs against, either
//! loaded in-process through the JIT or emitted as relocatable objects for the
//! host to link.

pub mod aot;
pub mod body;
pub mod context;
pub mod emit;
pub mod ffi;
pub mod jit;
pub mod lower;
pub mod types;

pub use aot::{compile_entry_object, emit_entry_to_file};
pub use body::{BodyKind, EntryBody, Import};
pub use emit::CodegenError;
pub use ffi::RuntimeSymbol;
pub use jit::{EntryLoader, LoadedEntry, OptLevel};
