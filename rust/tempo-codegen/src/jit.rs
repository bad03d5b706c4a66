//! In-process loading of entry bodies.
//!
//! [`EntryLoader`] compiles an [`EntryBody`] with the Cranelift JIT and hands
//! back a [`LoadedEntry`] that owns the executable memory. Imports are never
//! left to the process symbol table: each one is resolved against the
//! loader's [`IntrinsicTable`] first, then the C runtime set, and registered
//! with the JIT by address. A body that imports anything unresolvable fails
//! to load instead of failing at call time.

use cranelift_frontend::FunctionBuilderContext;
use cranelift_jit::{JITBuilder, JITModule};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use tempo_abi::{EntryPointReference, IntrinsicTable, SignatureVariant};
use tracing::{debug, info, trace};

use crate::body::{EntryBody, Import};
use crate::context::build_flags;
use crate::emit::CodegenError;
use crate::ffi::{ExternFunction, RuntimeSymbol};
use crate::lower::define_entry;

// ---------------------------------------------------------------------------
// Optimisation level
// ---------------------------------------------------------------------------

/// Optimisation level for compiled entry bodies.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumString, EnumIter, AsRefStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum OptLevel {
    /// No optimisation (fastest compile, slowest code).
    None,
    /// Optimise for execution speed.
    #[default]
    Speed,
    /// Optimise for both speed and code size.
    SpeedAndSize,
}

// ---------------------------------------------------------------------------
// Import resolution
// ---------------------------------------------------------------------------

/// An import bound to a host address.
#[derive(Debug, Clone)]
pub struct ResolvedImport {
    pub name: String,
    pub address: *const u8,
}

/// Bind every import of `body` to an address.
///
/// The intrinsic table is consulted first. A name it binds has the intrinsic
/// prototype, so a runtime import of that name is a signature mismatch; the
/// same holds the other way round for intrinsic imports named like a runtime
/// function the table does not bind.
pub fn resolve_imports(
    body: &EntryBody,
    intrinsics: &IntrinsicTable,
) -> Result<Vec<ResolvedImport>, CodegenError> {
    let externs = body.externs()?;
    let mut resolved = Vec::with_capacity(externs.len());
    for import in body.imports() {
        let name = import.name();
        if resolved.iter().any(|r: &ResolvedImport| r.name == name) {
            continue;
        }
        let address = match (&import, intrinsics.lookup(name)) {
            (Import::Intrinsic(_), Some(native)) => native.address(),
            (Import::Runtime(sym), Some(_)) => {
                return Err(mismatch(&sym.extern_fn(), &ExternFunction::intrinsic(name)));
            }
            (Import::Runtime(sym), None) => sym.address(),
            (Import::Intrinsic(_), None) => match name.parse::<RuntimeSymbol>() {
                Ok(sym) => {
                    return Err(mismatch(&import.extern_fn(), &sym.extern_fn()));
                }
                Err(_) => return Err(CodegenError::UnresolvedSymbol(name.to_string())),
            },
        };
        trace!(symbol = name, ?address, "import resolved");
        resolved.push(ResolvedImport {
            name: name.to_string(),
            address,
        });
    }
    Ok(resolved)
}

fn mismatch(imported: &ExternFunction, actual: &ExternFunction) -> CodegenError {
    CodegenError::SignatureMismatch {
        symbol: imported.name.clone(),
        expected: imported.shape(),
        found: actual.shape(),
    }
}

// ---------------------------------------------------------------------------
// Loader
// ---------------------------------------------------------------------------

/// Compiles entry bodies into executable memory.
pub struct EntryLoader<'t> {
    intrinsics: &'t IntrinsicTable,
    opt_level: OptLevel,
}

impl<'t> EntryLoader<'t> {
    pub fn new(intrinsics: &'t IntrinsicTable) -> Self {
        Self {
            intrinsics,
            opt_level: OptLevel::default(),
        }
    }

    pub fn with_opt_level(mut self, opt_level: OptLevel) -> Self {
        self.opt_level = opt_level;
        self
    }

    pub fn opt_level(&self) -> OptLevel {
        self.opt_level
    }

    pub fn intrinsics(&self) -> &IntrinsicTable {
        self.intrinsics
    }

    /// Resolve, lower and finalize `body`.
    pub fn load(&self, body: &EntryBody) -> Result<LoadedEntry, CodegenError> {
        let imports = resolve_imports(body, self.intrinsics)?;

        let flags = build_flags(self.opt_level, false)?;
        let isa = cranelift_native::builder()
            .map_err(|e| CodegenError::TargetError(format!("host ISA unavailable: {e}")))?
            .finish(flags)
            .map_err(|e| CodegenError::TargetError(format!("failed to build ISA: {e}")))?;

        let mut builder = JITBuilder::with_isa(isa, cranelift_module::default_libcall_names());
        for import in &imports {
            builder.symbol(import.name.as_str(), import.address);
        }
        let mut module = JITModule::new(builder);

        let mut fb_ctx = FunctionBuilderContext::new();
        let func_id = match define_entry(&mut module, body, &mut fb_ctx) {
            Ok(id) => id,
            Err(e) => {
                // SAFETY: nothing from this module has been handed out.
                unsafe { module.free_memory() };
                return Err(e);
            }
        };
        if let Err(e) = module.finalize_definitions() {
            // SAFETY: as above.
            unsafe { module.free_memory() };
            return Err(CodegenError::LoweringError(format!(
                "finalize_definitions failed: {e}"
            )));
        }
        let address = module.get_finalized_function(func_id);

        info!(
            variant = %body.variant(),
            opt_level = %self.opt_level,
            imports = imports.len(),
            "entry body loaded"
        );
        debug!(?address, "tempo_entry finalized");

        Ok(LoadedEntry {
            module: Some(module),
            variant: body.variant(),
            address,
            imports: imports.into_iter().map(|i| i.name).collect(),
        })
    }
}

/// A finalized entry body. Dropping it releases the code.
pub struct LoadedEntry {
    module: Option<JITModule>,
    variant: SignatureVariant,
    address: *const u8,
    imports: Vec<String>,
}

impl LoadedEntry {
    /// A handle to the loaded code, valid while `self` is alive.
    pub fn entry(&self) -> EntryPointReference<'_> {
        // SAFETY: `address` was compiled from a body checked against
        // `variant`, and the code lives until `self` is dropped.
        unsafe { EntryPointReference::from_raw(self.variant, self.address) }
    }

    pub fn variant(&self) -> SignatureVariant {
        self.variant
    }

    /// Names of the symbols the body imports, in resolution order.
    pub fn imports(&self) -> &[String] {
        &self.imports
    }
}

impl Drop for LoadedEntry {
    fn drop(&mut self) {
        if let Some(module) = self.module.take() {
            // SAFETY: every `EntryPointReference` borrows `self`, so none
            // outlive this point.
            unsafe { module.free_memory() };
        }
    }
}

impl std::fmt::Debug for LoadedEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedEntry")
            .field("variant", &self.variant)
            .field("address", &self.address)
            .field("imports", &self.imports)
            .finish()
    }
}
