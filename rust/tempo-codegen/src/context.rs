//! Compilation context: ISA detection, module creation, and settings.

use std::sync::Arc;

use cranelift_codegen::isa::{self, TargetIsa};
use cranelift_codegen::settings::{self, Configurable};
use cranelift_object::{ObjectBuilder, ObjectModule};
use target_lexicon::Triple;

use crate::emit::CodegenError;
use crate::jit::OptLevel;

/// Cranelift flags shared by the object and JIT backends.
///
/// Objects are position independent so the host can link them into a PIE.
/// In-process code is not, and must not assume libcalls are colocated.
pub(crate) fn build_flags(opt_level: OptLevel, is_pic: bool) -> Result<settings::Flags, CodegenError> {
    let mut flag_builder = settings::builder();
    let settings = [
        ("opt_level", opt_level.as_ref()),
        ("is_pic", if is_pic { "true" } else { "false" }),
        ("use_colocated_libcalls", "false"),
    ];
    for (name, value) in settings {
        flag_builder
            .set(name, value)
            .map_err(|e| CodegenError::TargetError(format!("failed to set {name}: {e}")))?;
    }
    Ok(settings::Flags::new(flag_builder))
}

/// Holds the Cranelift compilation state for one object file.
pub struct CodegenContext {
    /// The target ISA (instruction set architecture).
    pub isa: Arc<dyn TargetIsa>,
    /// The object module being built.
    pub module: ObjectModule,
}

impl CodegenContext {
    /// Create a new codegen context targeting the host platform.
    pub fn new() -> Result<Self, CodegenError> {
        Self::new_with_triple(Triple::host())
    }

    /// Create a new codegen context for cross-compilation to the given target triple string.
    pub fn new_with_target(triple_str: &str) -> Result<Self, CodegenError> {
        let triple: Triple = triple_str
            .parse()
            .map_err(|e| CodegenError::TargetError(format!("invalid target triple: {e}")))?;
        Self::new_with_triple(triple)
    }

    fn new_with_triple(triple: Triple) -> Result<Self, CodegenError> {
        let flags = build_flags(OptLevel::Speed, true)?;

        let isa_builder = isa::lookup(triple.clone())
            .map_err(|e| CodegenError::TargetError(format!("unsupported target {triple}: {e}")))?;

        let isa = isa_builder
            .finish(flags)
            .map_err(|e| CodegenError::TargetError(format!("failed to build ISA: {e}")))?;

        let obj_builder = ObjectBuilder::new(
            isa.clone(),
            "tempo_entry_module",
            cranelift_module::default_libcall_names(),
        )
        .map_err(|e| CodegenError::TargetError(format!("failed to create ObjectBuilder: {e}")))?;

        let module = ObjectModule::new(obj_builder);

        Ok(Self { isa, module })
    }

    pub fn triple(&self) -> &Triple {
        self.isa.triple()
    }

    /// Return the pointer type for the current target (e.g. I64 on 64-bit).
    pub fn pointer_type(&self) -> cranelift_codegen::ir::Type {
        self.isa.pointer_type()
    }
}
