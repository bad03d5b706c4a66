//! FFI support for the functions `tempo_entry` imports.
//!
//! A generated entry point may call two kinds of foreign function: native
//! intrinsics offered by the host, and the small C runtime subset the
//! reference bodies need. Both are described by an [`ExternFunction`],
//! declared with `Linkage::Import` through [`declare_extern`], and called with
//! [`emit_extern_call`]. The same declarations serve the JIT and the object
//! backend.
//!
//! | Symbol             | C prototype                                  |
//! |--------------------|----------------------------------------------|
//! | intrinsic          | `int64_t name(void)`                         |
//! | `strlen`           | `size_t strlen(const char *)`                |
//! | `malloc`           | `void *malloc(size_t)`                       |
//! | `memcpy`           | `void *memcpy(void *, const void *, size_t)` |

use cranelift_codegen::ir::{AbiParam, FuncRef, InstBuilder, Signature, Type as ClifType, Value};
use cranelift_codegen::isa::CallConv;
use cranelift_frontend::FunctionBuilder;
use cranelift_module::{FuncId, Linkage, Module};
use strum::{AsRefStr, Display, EnumIter, EnumString};
use target_lexicon::Triple;
use tempo_abi::CType;

use crate::emit::CodegenError;
use crate::types::ctype_to_clif;

/// Description of an imported C function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternFunction {
    /// The symbol name as the linker or JIT sees it.
    pub name: String,
    /// Parameter types in declaration order.
    pub param_types: Vec<CType>,
    pub return_type: CType,
}

impl ExternFunction {
    pub fn new(name: impl Into<String>, param_types: Vec<CType>, return_type: CType) -> Self {
        Self {
            name: name.into(),
            param_types,
            return_type,
        }
    }

    /// A native intrinsic: no arguments, one `i64`.
    pub fn intrinsic(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new(), CType::I64)
    }

    /// Whether two descriptors describe the same C prototype.
    pub fn same_shape(&self, other: &ExternFunction) -> bool {
        self.param_types == other.param_types && self.return_type == other.return_type
    }

    /// Shape in boundary notation, e.g. `(ptr, i64) -> ptr`.
    pub fn shape(&self) -> String {
        let params: Vec<String> = self.param_types.iter().map(|t| t.to_string()).collect();
        format!("({}) -> {}", params.join(", "), self.return_type)
    }

    /// Signature in the target's default C calling convention.
    pub fn build_signature(&self, triple: &Triple, pointer_type: ClifType) -> Signature {
        let mut sig = Signature::new(CallConv::triple_default(triple));
        for param in &self.param_types {
            sig.params
                .push(AbiParam::new(ctype_to_clif(*param, pointer_type)));
        }
        sig.returns
            .push(AbiParam::new(ctype_to_clif(self.return_type, pointer_type)));
        sig
    }
}

/// The C runtime functions reference bodies may import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter, AsRefStr)]
#[strum(serialize_all = "lowercase")]
pub enum RuntimeSymbol {
    Strlen,
    Malloc,
    Memcpy,
}

impl RuntimeSymbol {
    /// `size_t` is modelled as pointer width.
    pub fn extern_fn(self) -> ExternFunction {
        let (params, ret) = match self {
            RuntimeSymbol::Strlen => (vec![CType::Pointer], CType::Pointer),
            RuntimeSymbol::Malloc => (vec![CType::Pointer], CType::Pointer),
            RuntimeSymbol::Memcpy => (vec![CType::Pointer; 3], CType::Pointer),
        };
        ExternFunction::new(self.as_ref(), params, ret)
    }

    /// Address of the host's implementation, for in-process loading.
    pub fn address(self) -> *const u8 {
        match self {
            RuntimeSymbol::Strlen => libc::strlen as *const u8,
            RuntimeSymbol::Malloc => libc::malloc as *const u8,
            RuntimeSymbol::Memcpy => libc::memcpy as *const u8,
        }
    }
}

/// Declare an extern function in any Cranelift module with `Linkage::Import`.
pub fn declare_extern<M: Module>(
    module: &mut M,
    triple: &Triple,
    pointer_type: ClifType,
    ext_fn: &ExternFunction,
) -> Result<FuncId, CodegenError> {
    let sig = ext_fn.build_signature(triple, pointer_type);
    module
        .declare_function(&ext_fn.name, Linkage::Import, &sig)
        .map_err(|e| {
            CodegenError::LoweringError(format!(
                "failed to declare extern function '{}': {e}",
                ext_fn.name
            ))
        })
}

/// Batch-declare extern functions. Returns `(name, FuncId)` pairs in input order.
pub fn declare_externs<M: Module>(
    module: &mut M,
    triple: &Triple,
    pointer_type: ClifType,
    ext_fns: &[ExternFunction],
) -> Result<Vec<(String, FuncId)>, CodegenError> {
    let mut results = Vec::with_capacity(ext_fns.len());
    for ext_fn in ext_fns {
        let func_id = declare_extern(module, triple, pointer_type, ext_fn)?;
        results.push((ext_fn.name.clone(), func_id));
    }
    Ok(results)
}

/// Emit a call to a previously declared extern function.
///
/// `func_ref` must come from `module.declare_func_in_func` for the function
/// being built. Returns the first result, if the callee has one.
pub fn emit_extern_call(
    builder: &mut FunctionBuilder,
    func_ref: FuncRef,
    args: &[Value],
) -> Option<Value> {
    let call = builder.ins().call(func_ref, args);
    builder.inst_results(call).first().copied()
}
