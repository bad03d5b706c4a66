//! The entry-point contract shared by the host and the code generator.
//!
//! Both sides must agree on these names and shapes exactly. There is no
//! runtime negotiation: a generated function compiled against a different
//! shape than the one the host assumes is undefined behavior, not an error.
//!
//! | Variant         | Parameter          | Result             |
//! |-----------------|--------------------|--------------------|
//! | `IntToInt`      | `i64`              | `i64`              |
//! | `StrToStr`      | `const char *`     | `char *` (owned)   |
//! | `StrToInt`      | `const char *`     | `i64`              |
//! | `IntArithmetic` | `i64`              | `i64` (`arg + 5`)  |

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumIter, EnumString};

/// Symbol name of the generated entry point.
pub const ENTRY_SYMBOL: &str = "tempo_entry";

/// Symbol name of the standard native intrinsic.
pub const GET_TWO_SYMBOL: &str = "get_two_from_c";

/// Fixed offset of the `IntArithmetic` variant.
pub const ARITHMETIC_OFFSET: i64 = 5;

/// Boundary representation of a single parameter or result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum CType {
    /// 64-bit signed integer (`int64_t`).
    #[strum(serialize = "i64")]
    I64,
    /// Pointer to a NUL-terminated byte string (`char *`).
    #[strum(serialize = "ptr")]
    Pointer,
}

/// The closed set of signatures a generated entry point may implement.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    AsRefStr,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SignatureVariant {
    /// `i64 -> i64`, semantics left to the generated function.
    IntToInt,
    /// Borrowed string in, caller-owned string out.
    StrToStr,
    /// String in (may be ignored), `i64` out. May call native intrinsics.
    StrToInt,
    /// `i64 -> i64` with `output = input + 5`.
    IntArithmetic,
}

impl SignatureVariant {
    /// Representation of the single parameter.
    pub fn param(self) -> CType {
        match self {
            SignatureVariant::IntToInt | SignatureVariant::IntArithmetic => CType::I64,
            SignatureVariant::StrToStr | SignatureVariant::StrToInt => CType::Pointer,
        }
    }

    /// Representation of the result.
    pub fn returns(self) -> CType {
        match self {
            SignatureVariant::StrToStr => CType::Pointer,
            _ => CType::I64,
        }
    }

    /// Whether the contract explicitly allows calls back into native
    /// intrinsics while the entry point runs.
    ///
    /// Only `StrToInt` is exercised this way; the other shapes carry no
    /// such permission, though nothing at runtime enforces it.
    pub fn may_call_intrinsics(self) -> bool {
        matches!(self, SignatureVariant::StrToInt)
    }

    /// True when the result ownership moves from the generated function to
    /// the caller.
    pub fn transfers_result(self) -> bool {
        self.returns() == CType::Pointer
    }

    /// The value the contract fixes for `input`, if any.
    ///
    /// Only `IntArithmetic` pins its output. Inputs whose `+ 5` would
    /// overflow are outside the contract and yield `None`.
    pub fn expected_output(self, input: i64) -> Option<i64> {
        match self {
            SignatureVariant::IntArithmetic => input.checked_add(ARITHMETIC_OFFSET),
            _ => None,
        }
    }

    /// C-style prototype of the entry point, e.g. `int64_t tempo_entry(int64_t)`.
    pub fn prototype(self) -> String {
        fn c_name(ty: CType, out: bool) -> &'static str {
            match (ty, out) {
                (CType::I64, _) => "int64_t",
                (CType::Pointer, false) => "const char *",
                (CType::Pointer, true) => "char *",
            }
        }
        format!(
            "{} {}({})",
            c_name(self.returns(), true),
            ENTRY_SYMBOL,
            c_name(self.param(), false)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use strum::IntoEnumIterator;

    #[test]
    fn exactly_four_variants_in_declaration_order() {
        let all: Vec<_> = SignatureVariant::iter().collect();
        assert_eq!(
            all,
            vec![
                SignatureVariant::IntToInt,
                SignatureVariant::StrToStr,
                SignatureVariant::StrToInt,
                SignatureVariant::IntArithmetic,
            ]
        );
    }

    #[test]
    fn variant_shapes() {
        assert_eq!(SignatureVariant::IntToInt.param(), CType::I64);
        assert_eq!(SignatureVariant::IntToInt.returns(), CType::I64);
        assert_eq!(SignatureVariant::StrToStr.param(), CType::Pointer);
        assert_eq!(SignatureVariant::StrToStr.returns(), CType::Pointer);
        assert_eq!(SignatureVariant::StrToInt.param(), CType::Pointer);
        assert_eq!(SignatureVariant::StrToInt.returns(), CType::I64);
        assert_eq!(SignatureVariant::IntArithmetic.param(), CType::I64);
        assert_eq!(SignatureVariant::IntArithmetic.returns(), CType::I64);
    }

    #[test]
    fn only_str_to_str_transfers_ownership() {
        for v in SignatureVariant::iter() {
            assert_eq!(v.transfers_result(), v == SignatureVariant::StrToStr);
        }
    }

    #[test]
    fn only_str_to_int_may_call_intrinsics() {
        for v in SignatureVariant::iter() {
            assert_eq!(v.may_call_intrinsics(), v == SignatureVariant::StrToInt);
        }
    }

    #[test]
    fn arithmetic_expectation() {
        let v = SignatureVariant::IntArithmetic;
        assert_eq!(v.expected_output(10), Some(15));
        assert_eq!(v.expected_output(42), Some(47));
        assert_eq!(v.expected_output(-5), Some(0));
        assert_eq!(v.expected_output(i64::MAX), None);
        assert_eq!(v.expected_output(i64::MAX - 5), Some(i64::MAX));
        assert_eq!(SignatureVariant::IntToInt.expected_output(10), None);
    }

    #[test]
    fn snake_case_names_round_trip() {
        for v in SignatureVariant::iter() {
            assert_eq!(SignatureVariant::from_str(v.as_ref()).unwrap(), v);
        }
        assert_eq!(SignatureVariant::IntArithmetic.to_string(), "int_arithmetic");
        assert!(SignatureVariant::from_str("IntArith").is_err());
    }

    #[test]
    fn prototypes() {
        assert_eq!(
            SignatureVariant::IntToInt.prototype(),
            "int64_t tempo_entry(int64_t)"
        );
        assert_eq!(
            SignatureVariant::StrToStr.prototype(),
            "char * tempo_entry(const char *)"
        );
        assert_eq!(
            SignatureVariant::StrToInt.prototype(),
            "int64_t tempo_entry(const char *)"
        );
    }
}
