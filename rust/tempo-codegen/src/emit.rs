//! Object file emission and the crate-wide error type.

use std::path::Path;

use cranelift_object::ObjectModule;
use tempo_abi::SignatureVariant;
use thiserror::Error;

/// Errors that can occur while building, loading or emitting an entry body.
#[derive(Debug, Error)]
pub enum CodegenError {
    #[error("target error: {0}")]
    TargetError(String),

    #[error("lowering error: {0}")]
    LoweringError(String),

    #[error("emission error: {0}")]
    EmissionError(String),

    #[error("unresolved symbol '{0}'")]
    UnresolvedSymbol(String),

    #[error("symbol '{symbol}' is imported as {expected} but resolves to {found}")]
    SignatureMismatch {
        symbol: String,
        expected: String,
        found: String,
    },

    #[error("a {kind} body cannot implement the {variant} signature")]
    IncompatibleBody {
        variant: SignatureVariant,
        kind: &'static str,
    },

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Finish the module and return the raw object file bytes.
pub fn emit_object(module: ObjectModule) -> Result<Vec<u8>, CodegenError> {
    let product = module.finish();
    product
        .emit()
        .map_err(|e| CodegenError::EmissionError(format!("failed to emit object file: {e}")))
}

/// Finish the module and write the object file to disk.
pub fn emit_to_file(module: ObjectModule, path: &Path) -> Result<(), CodegenError> {
    let bytes = emit_object(module)?;
    std::fs::write(path, &bytes)?;
    Ok(())
}
