//! Lowering of an [`EntryBody`] to Cranelift IR.
//!
//! Shared by the JIT and object backends: [`define_entry`] declares the
//! body's imports, declares `tempo_entry` with `Linkage::Export`, and defines
//! it in whatever [`Module`] it is given.

use std::collections::HashMap;

use cranelift_codegen::ir::{types, FuncRef, Function, InstBuilder, UserFuncName, Value};
use cranelift_codegen::Context;
use cranelift_frontend::{FunctionBuilder, FunctionBuilderContext};
use cranelift_module::{FuncId, Linkage, Module};
use tempo_abi::ENTRY_SYMBOL;
use tracing::debug;

use crate::body::{BodyKind, EntryBody};
use crate::emit::CodegenError;
use crate::ffi::{declare_externs, emit_extern_call, RuntimeSymbol};
use crate::types::entry_signature;

/// Declare and define `tempo_entry` for `body` in `module`.
pub fn define_entry<M: Module>(
    module: &mut M,
    body: &EntryBody,
    fb_ctx: &mut FunctionBuilderContext,
) -> Result<FuncId, CodegenError> {
    let pointer_type = module.isa().pointer_type();
    let triple = module.isa().triple().clone();

    let externs = body.externs()?;
    let import_ids = declare_externs(module, &triple, pointer_type, &externs)?;

    let sig = entry_signature(module, body.variant());
    let func_id = module
        .declare_function(ENTRY_SYMBOL, Linkage::Export, &sig)
        .map_err(|e| CodegenError::LoweringError(format!("declare_function({ENTRY_SYMBOL}): {e}")))?;

    let mut func = Function::with_name_signature(UserFuncName::user(0, func_id.as_u32()), sig);

    let mut callees: HashMap<String, FuncRef> = HashMap::new();
    for (name, id) in import_ids {
        let func_ref = module.declare_func_in_func(id, &mut func);
        callees.insert(name, func_ref);
    }

    {
        let mut builder = FunctionBuilder::new(&mut func, fb_ctx);
        let entry_block = builder.create_block();
        builder.append_block_params_for_function_params(entry_block);
        builder.switch_to_block(entry_block);
        let arg = builder.block_params(entry_block)[0];

        let result = match body.kind() {
            BodyKind::Scale(k) => builder.ins().imul_imm(arg, *k),
            BodyKind::Offset(k) => builder.ins().iadd_imm(arg, *k),
            BodyKind::Duplicate => lower_duplicate(&mut builder, &callees, arg)?,
            BodyKind::IntrinsicPlus { intrinsic, addend } => {
                let value = call(&mut builder, &callees, intrinsic, &[])?;
                builder.ins().iadd_imm(value, *addend)
            }
            BodyKind::LengthPlusIntrinsic { intrinsic } => {
                let len = call(&mut builder, &callees, RuntimeSymbol::Strlen.as_ref(), &[arg])?;
                let len = if pointer_type == types::I64 {
                    len
                } else {
                    builder.ins().uextend(types::I64, len)
                };
                let value = call(&mut builder, &callees, intrinsic, &[])?;
                builder.ins().iadd(len, value)
            }
        };
        builder.ins().return_(&[result]);

        builder.seal_all_blocks();
        builder.finalize();
    }

    let kind: &'static str = body.kind().into();
    debug!(
        variant = %body.variant(),
        kind,
        imports = callees.len(),
        "lowered entry point"
    );

    let mut ctx = Context::for_function(func);
    module
        .define_function(func_id, &mut ctx)
        .map_err(|e| CodegenError::LoweringError(format!("define_function({ENTRY_SYMBOL}): {e}")))?;

    Ok(func_id)
}

/// `n = strlen(s) + 1; d = malloc(n); if d { memcpy(d, s, n) }; return d`
///
/// A null `malloc` result is returned as is; the host reports it.
fn lower_duplicate(
    builder: &mut FunctionBuilder,
    callees: &HashMap<String, FuncRef>,
    src: Value,
) -> Result<Value, CodegenError> {
    let len = call(builder, callees, RuntimeSymbol::Strlen.as_ref(), &[src])?;
    let size = builder.ins().iadd_imm(len, 1);
    let dst = call(builder, callees, RuntimeSymbol::Malloc.as_ref(), &[size])?;

    let copy_block = builder.create_block();
    let done_block = builder.create_block();
    builder.ins().brif(dst, copy_block, &[], done_block, &[]);

    builder.switch_to_block(copy_block);
    call(builder, callees, RuntimeSymbol::Memcpy.as_ref(), &[dst, src, size])?;
    builder.ins().jump(done_block, &[]);

    builder.switch_to_block(done_block);
    Ok(dst)
}

fn call(
    builder: &mut FunctionBuilder,
    callees: &HashMap<String, FuncRef>,
    name: &str,
    args: &[Value],
) -> Result<Value, CodegenError> {
    let func_ref = *callees
        .get(name)
        .ok_or_else(|| CodegenError::LoweringError(format!("'{name}' was not declared")))?;
    emit_extern_call(builder, func_ref, args)
        .ok_or_else(|| CodegenError::LoweringError(format!("'{name}' returns no value")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::CodegenContext;
    use tempo_abi::SignatureVariant;
    use strum::IntoEnumIterator;

    #[test]
    fn every_reference_body_lowers() {
        for variant in SignatureVariant::iter() {
            let mut ctx = CodegenContext::new().unwrap();
            let mut fb_ctx = FunctionBuilderContext::new();
            let body = EntryBody::reference(variant);
            assert!(
                define_entry(&mut ctx.module, &body, &mut fb_ctx).is_ok(),
                "{variant} failed to lower"
            );
        }
    }

    #[test]
    fn length_plus_intrinsic_lowers() {
        let mut ctx = CodegenContext::new().unwrap();
        let mut fb_ctx = FunctionBuilderContext::new();
        let body = EntryBody::new(
            SignatureVariant::StrToInt,
            BodyKind::LengthPlusIntrinsic {
                intrinsic: "get_two_from_c".into(),
            },
        )
        .unwrap();
        define_entry(&mut ctx.module, &body, &mut fb_ctx).unwrap();
    }

    #[test]
    fn entry_is_defined_once_per_module() {
        let mut ctx = CodegenContext::new().unwrap();
        let mut fb_ctx = FunctionBuilderContext::new();
        let body = EntryBody::reference(SignatureVariant::IntToInt);
        define_entry(&mut ctx.module, &body, &mut fb_ctx).unwrap();
        let err = define_entry(&mut ctx.module, &body, &mut fb_ctx).unwrap_err();
        assert!(matches!(err, CodegenError::LoweringError(_)));
    }

    #[test]
    fn conflicting_imports_fail_before_declaration() {
        let mut ctx = CodegenContext::new().unwrap();
        let mut fb_ctx = FunctionBuilderContext::new();
        let body = EntryBody::new(
            SignatureVariant::StrToInt,
            BodyKind::LengthPlusIntrinsic {
                intrinsic: "strlen".into(),
            },
        )
        .unwrap();
        let err = define_entry(&mut ctx.module, &body, &mut fb_ctx).unwrap_err();
        assert!(matches!(err, CodegenError::SignatureMismatch { .. }));
    }
}
