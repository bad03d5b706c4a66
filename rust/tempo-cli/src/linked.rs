//! Entry points linked into the executable at build time.
//!
//! A `linked-entry` build links the object named by `TEMPO_ENTRY_OBJECT`
//! into both binaries. The variant it implements, taken from
//! `TEMPO_ENTRY_VARIANT`, is recorded as `TEMPO_LINKED_VARIANT` at compile
//! time. The binaries own the `extern` declaration of `tempo_entry`; this
//! module only turns its address into a typed handle.

use tempo_abi::{EntryPointReference, SignatureVariant};
use thiserror::Error;
use tracing::debug;

/// Variant recorded by the build script, if the binary was linked.
pub const DECLARED_VARIANT: Option<&str> = option_env!("TEMPO_LINKED_VARIANT");

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error(
        "no tempo_entry is linked in; rebuild with --features linked-entry and TEMPO_ENTRY_OBJECT set"
    )]
    NotLinked,

    #[error("TEMPO_ENTRY_VARIANT='{0}' is not a signature variant")]
    UnknownVariant(String),
}

/// Parse a declared variant name.
pub fn parse_declared(declared: Option<&str>) -> Result<SignatureVariant, LinkError> {
    let name = declared.ok_or(LinkError::NotLinked)?;
    name.parse()
        .map_err(|_| LinkError::UnknownVariant(name.to_string()))
}

/// The variant this binary's linked `tempo_entry` was declared with.
pub fn declared_variant() -> Result<SignatureVariant, LinkError> {
    parse_declared(DECLARED_VARIANT)
}

/// Bind the linked `tempo_entry` at `address`.
///
/// # Safety
/// `address` must be the linked `tempo_entry`, compiled against the C
/// signature of [`declared_variant`].
pub unsafe fn bind(address: *const u8) -> Result<EntryPointReference<'static>, LinkError> {
    let variant = declared_variant()?;
    debug!(%variant, ?address, "binding linked tempo_entry");
    Ok(EntryPointReference::from_raw(variant, address))
}
