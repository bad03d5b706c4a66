//! Typed handles to a resolved generated entry point.
//!
//! All raw-pointer and integer marshaling for calls into generated code
//! happens here. An [`EntryPointReference`] carries the function pointer
//! already cast to the shape of its [`SignatureVariant`]; the only way to
//! get one is through an `unsafe` constructor, because nothing at runtime
//! can confirm the code was compiled against that shape.
//!
//! # Hazard
//!
//! A handle built for the wrong variant is undefined behavior the first time
//! it is called. The checks below only catch a caller asking a correctly
//! built handle for the wrong operation.

use std::ffi::c_char;
use std::marker::PhantomData;

use thiserror::Error;
use tracing::debug;

use crate::contract::{CType, SignatureVariant};
use crate::marshal::{to_c_string, BoundaryValue, MarshalError, ReturnedString};

pub type IntToIntFn = unsafe extern "C" fn(i64) -> i64;
pub type StrToStrFn = unsafe extern "C" fn(*const c_char) -> *mut c_char;
pub type StrToIntFn = unsafe extern "C" fn(*const c_char) -> i64;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InvokeError {
    #[error("entry bound to {bound} cannot be invoked as {requested}")]
    VariantMismatch {
        bound: SignatureVariant,
        requested: &'static str,
    },

    #[error("{bound} entry takes a {expected} argument, got {found}")]
    InputShape {
        bound: SignatureVariant,
        expected: CType,
        found: CType,
    },

    #[error(transparent)]
    Marshal(#[from] MarshalError),
}

/// A generated function pointer tagged with its signature variant.
#[derive(Debug, Clone, Copy)]
pub enum EntryFn {
    IntToInt(IntToIntFn),
    StrToStr(StrToStrFn),
    StrToInt(StrToIntFn),
    IntArithmetic(IntToIntFn),
}

impl EntryFn {
    /// Cast a raw code address to the shape of `variant`.
    ///
    /// # Safety
    /// `ptr` must be the address of a function compiled against exactly
    /// the C signature `variant` describes.
    pub unsafe fn from_raw(variant: SignatureVariant, ptr: *const u8) -> Self {
        debug_assert!(!ptr.is_null(), "entry address must not be null");
        match variant {
            SignatureVariant::IntToInt => {
                EntryFn::IntToInt(std::mem::transmute::<*const u8, IntToIntFn>(ptr))
            }
            SignatureVariant::StrToStr => {
                EntryFn::StrToStr(std::mem::transmute::<*const u8, StrToStrFn>(ptr))
            }
            SignatureVariant::StrToInt => {
                EntryFn::StrToInt(std::mem::transmute::<*const u8, StrToIntFn>(ptr))
            }
            SignatureVariant::IntArithmetic => {
                EntryFn::IntArithmetic(std::mem::transmute::<*const u8, IntToIntFn>(ptr))
            }
        }
    }

    pub fn variant(&self) -> SignatureVariant {
        match self {
            EntryFn::IntToInt(_) => SignatureVariant::IntToInt,
            EntryFn::StrToStr(_) => SignatureVariant::StrToStr,
            EntryFn::StrToInt(_) => SignatureVariant::StrToInt,
            EntryFn::IntArithmetic(_) => SignatureVariant::IntArithmetic,
        }
    }

    pub fn address(&self) -> *const u8 {
        match *self {
            EntryFn::IntToInt(f) | EntryFn::IntArithmetic(f) => f as *const u8,
            EntryFn::StrToStr(f) => f as *const u8,
            EntryFn::StrToInt(f) => f as *const u8,
        }
    }
}

/// A resolved generated entry point, valid for as long as `'m`.
///
/// `'m` borrows whatever owns the machine code (a JIT module, for example);
/// link-time symbols use `'static`. Handles are neither `Send` nor `Sync`:
/// the contract is undefined under concurrent entry.
#[derive(Debug, Clone, Copy)]
pub struct EntryPointReference<'m> {
    func: EntryFn,
    _code: PhantomData<&'m *const u8>,
}

impl<'m> EntryPointReference<'m> {
    /// Bind a raw code address to `variant`.
    ///
    /// # Safety
    /// `ptr` must point to a function compiled against the C signature of
    /// `variant` and must stay executable for `'m`.
    pub unsafe fn from_raw(variant: SignatureVariant, ptr: *const u8) -> Self {
        Self {
            func: EntryFn::from_raw(variant, ptr),
            _code: PhantomData,
        }
    }

    pub fn variant(&self) -> SignatureVariant {
        self.func.variant()
    }

    pub fn address(&self) -> *const u8 {
        self.func.address()
    }

    /// Call an `IntToInt` or `IntArithmetic` entry.
    pub fn call_int(&self, arg: i64) -> Result<i64, InvokeError> {
        match self.func {
            EntryFn::IntToInt(f) | EntryFn::IntArithmetic(f) => {
                // SAFETY: the constructor guarantees `f` has this signature.
                Ok(unsafe { f(arg) })
            }
            _ => Err(self.mismatch("i64 -> i64")),
        }
    }

    /// Call a `StrToStr` entry. The argument lives on this frame for the
    /// whole call; the result is owned and released with `free` on drop.
    pub fn call_str_to_str(&self, arg: &str) -> Result<ReturnedString, InvokeError> {
        let EntryFn::StrToStr(f) = self.func else {
            return Err(self.mismatch("str -> str"));
        };
        let c_arg = to_c_string(arg)?;
        // SAFETY: the constructor guarantees the signature; `c_arg` is a
        // valid NUL-terminated string kept alive until after the call.
        let raw = unsafe { f(c_arg.as_ptr()) };
        // SAFETY: the StrToStr contract transfers a `malloc`ed result.
        let result = unsafe { ReturnedString::from_c_allocator(raw) }?;
        Ok(result)
    }

    /// Call a `StrToInt` entry.
    pub fn call_str_to_int(&self, arg: &str) -> Result<i64, InvokeError> {
        let EntryFn::StrToInt(f) = self.func else {
            return Err(self.mismatch("str -> i64"));
        };
        let c_arg = to_c_string(arg)?;
        // SAFETY: as in `call_str_to_str`.
        Ok(unsafe { f(c_arg.as_ptr()) })
    }

    /// Invoke with a host value, dispatching on the bound variant.
    pub fn invoke(&self, input: &BoundaryValue) -> Result<BoundaryValue, InvokeError> {
        let variant = self.variant();
        let output = match (variant.param(), input) {
            (CType::I64, BoundaryValue::Int(n)) => BoundaryValue::Int(self.call_int(*n)?),
            (CType::Pointer, BoundaryValue::Str(s)) => match self.func {
                EntryFn::StrToStr(_) => self.call_str_to_str(s)?.to_value(),
                _ => BoundaryValue::Int(self.call_str_to_int(s)?),
            },
            (expected, other) => {
                return Err(InvokeError::InputShape {
                    bound: variant,
                    expected,
                    found: other.ctype(),
                })
            }
        };
        debug!(%variant, %input, %output, "entry invoked");
        Ok(output)
    }

    fn mismatch(&self, requested: &'static str) -> InvokeError {
        InvokeError::VariantMismatch {
            bound: self.variant(),
            requested,
        }
    }
}

impl EntryPointReference<'static> {
    /// Bind a symbol resolved by the static linker.
    ///
    /// # Safety
    /// The symbol behind `func` must have been compiled against the
    /// signature its `EntryFn` tag names.
    pub unsafe fn from_linked(func: EntryFn) -> Self {
        Self {
            func,
            _code: PhantomData,
        }
    }
}
