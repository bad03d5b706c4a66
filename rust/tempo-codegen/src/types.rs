//! Mapping from boundary types to Cranelift IR types.

use cranelift_codegen::ir::types;
use cranelift_codegen::ir::{AbiParam, Signature, Type as ClifType};
use cranelift_module::Module;
use tempo_abi::{CType, SignatureVariant};

/// Convert a boundary type to the corresponding Cranelift IR type.
///
///   I64     -> I64
///   Pointer -> the target pointer type
pub fn ctype_to_clif(ty: CType, pointer_type: ClifType) -> ClifType {
    match ty {
        CType::I64 => types::I64,
        CType::Pointer => pointer_type,
    }
}

/// The C signature of `tempo_entry` for `variant`, in the module's default
/// calling convention.
pub fn entry_signature<M: Module>(module: &M, variant: SignatureVariant) -> Signature {
    let pointer_type = module.isa().pointer_type();
    let mut sig = module.make_signature();
    sig.params
        .push(AbiParam::new(ctype_to_clif(variant.param(), pointer_type)));
    sig.returns
        .push(AbiParam::new(ctype_to_clif(variant.returns(), pointer_type)));
    sig
}
