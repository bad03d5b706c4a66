//! Marshaling between host values and the boundary representation.
//!
//! Integers cross as plain `i64`. Strings cross as pointers to
//! NUL-terminated bytes: inputs are built as [`CString`]s that outlive the
//! call, results come back wrapped in a [`ReturnedString`] that knows
//! whether (and how) the host must release them.

use std::borrow::Cow;
use std::ffi::{c_char, CStr, CString};
use std::fmt;
use std::num::IntErrorKind;
use std::ptr::NonNull;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::trace;

use crate::contract::CType;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MarshalError {
    #[error("Invalid integer '{literal}'")]
    InvalidInteger { literal: String },

    #[error("Integer out of range '{literal}'")]
    OutOfRange { literal: String },

    #[error("string contains an interior NUL byte at offset {position}")]
    InteriorNul { position: usize },

    #[error("generated function returned a null string pointer")]
    NullString,
}

/// Parse a base-10 `i64` literal from the command line.
///
/// Accepts an optional `+`/`-` sign followed by at least one ASCII digit and
/// nothing else. Surrounding whitespace, trailing characters and values that
/// do not fit in an `i64` are all rejected; nothing is truncated or
/// saturated.
pub fn parse_int64(literal: &str) -> Result<i64, MarshalError> {
    literal.parse::<i64>().map_err(|e| match e.kind() {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => MarshalError::OutOfRange {
            literal: literal.to_string(),
        },
        _ => MarshalError::InvalidInteger {
            literal: literal.to_string(),
        },
    })
}

/// Build the NUL-terminated form of a host string.
pub fn to_c_string(s: &str) -> Result<CString, MarshalError> {
    CString::new(s).map_err(|e| MarshalError::InteriorNul {
        position: e.nul_position(),
    })
}

/// A host-side value on one side of an entry-point invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BoundaryValue {
    Int(i64),
    Str(String),
    /// A returned string whose bytes are not valid UTF-8.
    Bytes(Vec<u8>),
}

impl BoundaryValue {
    /// The boundary representation this value travels as.
    pub fn ctype(&self) -> CType {
        match self {
            BoundaryValue::Int(_) => CType::I64,
            BoundaryValue::Str(_) | BoundaryValue::Bytes(_) => CType::Pointer,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            BoundaryValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            BoundaryValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Decode returned bytes, keeping non-UTF-8 content byte-for-byte.
    pub fn from_bytes(bytes: &[u8]) -> Self {
        match std::str::from_utf8(bytes) {
            Ok(s) => BoundaryValue::Str(s.to_string()),
            Err(_) => BoundaryValue::Bytes(bytes.to_vec()),
        }
    }
}

impl fmt::Display for BoundaryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BoundaryValue::Int(n) => write!(f, "{n}"),
            BoundaryValue::Str(s) => write!(f, "{s:?}"),
            BoundaryValue::Bytes(b) => write!(f, "{:?}", String::from_utf8_lossy(b)),
        }
    }
}

impl From<i64> for BoundaryValue {
    fn from(n: i64) -> Self {
        BoundaryValue::Int(n)
    }
}

impl From<&str> for BoundaryValue {
    fn from(s: &str) -> Self {
        BoundaryValue::Str(s.to_string())
    }
}

impl From<String> for BoundaryValue {
    fn from(s: String) -> Self {
        BoundaryValue::Str(s)
    }
}

/// Release function for a string allocated on the other side of the
/// boundary. `libc::free` for anything produced with `malloc`.
pub type ReleaseFn = unsafe extern "C" fn(*mut libc::c_void);

/// Who is responsible for the memory behind a [`ReturnedString`].
#[derive(Debug, Clone, Copy)]
pub enum Ownership {
    /// The caller owns the string and releases it with the given function.
    Owned(ReleaseFn),
    /// The string belongs to the generated side; the caller only reads it.
    Borrowed,
}

/// A NUL-terminated string returned across the boundary.
///
/// Owned strings are released exactly once, when the handle is dropped,
/// unless [`ReturnedString::leak`] hands the pointer off explicitly.
#[derive(Debug)]
pub struct ReturnedString {
    ptr: NonNull<c_char>,
    ownership: Ownership,
}

impl ReturnedString {
    /// Take ownership of `ptr`, releasing it with `release` on drop.
    ///
    /// # Safety
    /// `ptr` must be null or point to a NUL-terminated string that stays
    /// valid until released, was allocated by the allocator `release`
    /// belongs to, and is owned by nobody else.
    pub unsafe fn owned(ptr: *mut c_char, release: ReleaseFn) -> Result<Self, MarshalError> {
        let ptr = NonNull::new(ptr).ok_or(MarshalError::NullString)?;
        Ok(Self {
            ptr,
            ownership: Ownership::Owned(release),
        })
    }

    /// Take ownership of a string allocated with the C allocator.
    ///
    /// # Safety
    /// Same as [`ReturnedString::owned`], with `malloc` as the allocator.
    pub unsafe fn from_c_allocator(ptr: *mut c_char) -> Result<Self, MarshalError> {
        Self::owned(ptr, libc::free)
    }

    /// Wrap a string the caller must not release.
    ///
    /// # Safety
    /// `ptr` must be null or point to a NUL-terminated string that outlives
    /// the returned handle.
    pub unsafe fn borrowed(ptr: *const c_char) -> Result<Self, MarshalError> {
        let ptr = NonNull::new(ptr as *mut c_char).ok_or(MarshalError::NullString)?;
        Ok(Self {
            ptr,
            ownership: Ownership::Borrowed,
        })
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    pub fn is_owned(&self) -> bool {
        matches!(self.ownership, Ownership::Owned(_))
    }

    pub fn as_c_str(&self) -> &CStr {
        // SAFETY: the constructors require a valid NUL-terminated string
        // that lives at least as long as this handle.
        unsafe { CStr::from_ptr(self.ptr.as_ptr()) }
    }

    /// Content without the terminating NUL.
    pub fn as_bytes(&self) -> &[u8] {
        self.as_c_str().to_bytes()
    }

    pub fn to_string_lossy(&self) -> Cow<'_, str> {
        self.as_c_str().to_string_lossy()
    }

    pub fn to_value(&self) -> BoundaryValue {
        BoundaryValue::from_bytes(self.as_bytes())
    }

    /// Give up ownership without releasing. The caller now answers for the
    /// memory behind the returned pointer.
    pub fn leak(self) -> *mut c_char {
        let ptr = self.ptr.as_ptr();
        std::mem::forget(self);
        ptr
    }
}

impl Drop for ReturnedString {
    fn drop(&mut self) {
        if let Ownership::Owned(release) = self.ownership {
            trace!(ptr = ?self.ptr, "releasing returned string");
            // SAFETY: owned handles hold the only reference to a string
            // allocated by `release`'s allocator; it is released once.
            unsafe { release(self.ptr.as_ptr().cast()) };
        }
    }
}
