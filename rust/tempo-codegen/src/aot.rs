//! AOT (Ahead-Of-Time) compilation of entry bodies to native object files.
//!
//! The object exports `tempo_entry` and leaves every import undefined for the
//! static linker; `get_two_from_c` is satisfied by the host binary.

use std::path::Path;

use cranelift_frontend::FunctionBuilderContext;
use tracing::info;

use crate::body::EntryBody;
use crate::context::CodegenContext;
use crate::emit::{emit_object, emit_to_file, CodegenError};
use crate::lower::define_entry;

/// Build a [`CodegenContext`] with `body` defined in it, ready for emission.
pub fn compile_entry_module(
    body: &EntryBody,
    target: Option<&str>,
) -> Result<CodegenContext, CodegenError> {
    let mut ctx = match target {
        Some(triple) => CodegenContext::new_with_target(triple)?,
        None => CodegenContext::new()?,
    };
    let mut fb_ctx = FunctionBuilderContext::new();
    define_entry(&mut ctx.module, body, &mut fb_ctx)?;
    Ok(ctx)
}

/// Compile `body` to relocatable object bytes for the host or `target`.
pub fn compile_entry_object(body: &EntryBody, target: Option<&str>) -> Result<Vec<u8>, CodegenError> {
    let ctx = compile_entry_module(body, target)?;
    let triple = ctx.triple().to_string();
    let bytes = emit_object(ctx.module)?;
    info!(
        variant = %body.variant(),
        %triple,
        size = bytes.len(),
        "entry object emitted"
    );
    Ok(bytes)
}

/// Compile `body` and write the object file to `path`.
pub fn emit_entry_to_file(
    body: &EntryBody,
    target: Option<&str>,
    path: &Path,
) -> Result<(), CodegenError> {
    let ctx = compile_entry_module(body, target)?;
    emit_to_file(ctx.module, path)?;
    info!(variant = %body.variant(), path = %path.display(), "entry object written");
    Ok(())
}
