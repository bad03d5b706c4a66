//! Reference bodies for `tempo_entry`.
//!
//! An [`EntryBody`] pairs a [`SignatureVariant`] with one of a fixed set of
//! computations. The pairing is checked on construction, so lowering never
//! sees a body whose parameter or result shape disagrees with its variant.

use std::collections::BTreeMap;

use strum::IntoStaticStr;
use tempo_abi::{SignatureVariant, GET_TWO_SYMBOL};

use crate::emit::CodegenError;
use crate::ffi::{ExternFunction, RuntimeSymbol};

/// What the generated function computes.
#[derive(Debug, Clone, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum BodyKind {
    /// `arg * k`, wrapping.
    Scale(i64),
    /// `arg + k`, wrapping.
    Offset(i64),
    /// A fresh `malloc`ed copy of the argument.
    Duplicate,
    /// `intrinsic() + addend`; the argument is ignored.
    IntrinsicPlus { intrinsic: String, addend: i64 },
    /// `strlen(arg) + intrinsic()`.
    LengthPlusIntrinsic { intrinsic: String },
}

impl BodyKind {
    fn implements(&self, variant: SignatureVariant) -> bool {
        use SignatureVariant::*;
        match self {
            BodyKind::Scale(_) => variant == IntToInt,
            BodyKind::Offset(_) => matches!(variant, IntToInt | IntArithmetic),
            BodyKind::Duplicate => variant == StrToStr,
            BodyKind::IntrinsicPlus { .. } | BodyKind::LengthPlusIntrinsic { .. } => {
                variant == StrToInt
            }
        }
    }
}

/// A foreign function a body calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Import {
    Intrinsic(String),
    Runtime(RuntimeSymbol),
}

impl Import {
    pub fn name(&self) -> &str {
        match self {
            Import::Intrinsic(name) => name,
            Import::Runtime(sym) => sym.as_ref(),
        }
    }

    pub fn extern_fn(&self) -> ExternFunction {
        match self {
            Import::Intrinsic(name) => ExternFunction::intrinsic(name.as_str()),
            Import::Runtime(sym) => sym.extern_fn(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryBody {
    variant: SignatureVariant,
    kind: BodyKind,
}

impl EntryBody {
    pub fn new(variant: SignatureVariant, kind: BodyKind) -> Result<Self, CodegenError> {
        if !kind.implements(variant) {
            return Err(CodegenError::IncompatibleBody {
                variant,
                kind: (&kind).into(),
            });
        }
        Ok(Self { variant, kind })
    }

    /// The conforming body for each variant.
    ///
    /// | Variant         | Body                                  | `f(21)` / `f("x")` |
    /// |-----------------|---------------------------------------|--------------------|
    /// | `IntToInt`      | `Scale(2)`                            | `42`               |
    /// | `StrToStr`      | `Duplicate`                           | `"x"`              |
    /// | `StrToInt`      | `IntrinsicPlus(get_two_from_c, 40)`   | `42`               |
    /// | `IntArithmetic` | `Offset(5)`                           | `26`               |
    pub fn reference(variant: SignatureVariant) -> Self {
        let kind = match variant {
            SignatureVariant::IntToInt => BodyKind::Scale(2),
            SignatureVariant::StrToStr => BodyKind::Duplicate,
            SignatureVariant::StrToInt => BodyKind::IntrinsicPlus {
                intrinsic: GET_TWO_SYMBOL.to_string(),
                addend: 40,
            },
            SignatureVariant::IntArithmetic => BodyKind::Offset(tempo_abi::ARITHMETIC_OFFSET),
        };
        Self { variant, kind }
    }

    pub fn variant(&self) -> SignatureVariant {
        self.variant
    }

    pub fn kind(&self) -> &BodyKind {
        &self.kind
    }

    /// Foreign functions this body calls, in call order.
    pub fn imports(&self) -> Vec<Import> {
        match &self.kind {
            BodyKind::Scale(_) | BodyKind::Offset(_) => Vec::new(),
            BodyKind::Duplicate => vec![
                Import::Runtime(RuntimeSymbol::Strlen),
                Import::Runtime(RuntimeSymbol::Malloc),
                Import::Runtime(RuntimeSymbol::Memcpy),
            ],
            BodyKind::IntrinsicPlus { intrinsic, .. } => {
                vec![Import::Intrinsic(intrinsic.clone())]
            }
            BodyKind::LengthPlusIntrinsic { intrinsic } => vec![
                Import::Runtime(RuntimeSymbol::Strlen),
                Import::Intrinsic(intrinsic.clone()),
            ],
        }
    }

    /// One descriptor per distinct imported symbol.
    ///
    /// A name imported under two different prototypes is a
    /// [`CodegenError::SignatureMismatch`].
    pub fn externs(&self) -> Result<Vec<ExternFunction>, CodegenError> {
        let mut seen: BTreeMap<String, ExternFunction> = BTreeMap::new();
        let mut ordered = Vec::new();
        for import in self.imports() {
            let ext = import.extern_fn();
            match seen.get(&ext.name) {
                Some(prev) if !prev.same_shape(&ext) => {
                    return Err(CodegenError::SignatureMismatch {
                        symbol: ext.name.clone(),
                        expected: prev.shape(),
                        found: ext.shape(),
                    });
                }
                Some(_) => {}
                None => {
                    seen.insert(ext.name.clone(), ext.clone());
                    ordered.push(ext);
                }
            }
        }
        Ok(ordered)
    }
}
