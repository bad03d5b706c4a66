//! The `tempo-host` executable's logic.
//!
//! Takes exactly one command-line argument, parses it as an integer
//! literal, passes it to the `IntToInt` entry point and returns the result.
//! The host has no options: `--help`, `-V` and `--` are just malformed
//! literals. The entry point is either the reference body loaded
//! in-process or, in a `linked-entry` build, the `tempo_entry` symbol the
//! binary was linked against.

use std::ffi::OsString;

use tempo_abi::{
    parse_int64, EntryPointReference, IntrinsicTable, InvokeError, MarshalError, SignatureVariant,
};
use tempo_codegen::{CodegenError, EntryBody, EntryLoader};
use thiserror::Error;
use tracing::debug;

use crate::linked::LinkError;

pub const USAGE: &str = "Usage: tempo-host <INTEGER>";

#[derive(Debug, Error)]
pub enum HostError {
    #[error(transparent)]
    Input(#[from] MarshalError),

    #[error("cannot load entry point: {0}")]
    Load(#[from] CodegenError),

    #[error(transparent)]
    Invoke(#[from] InvokeError),

    #[error("tempo-host needs an int_to_int entry point, found {0}")]
    WrongVariant(SignatureVariant),

    #[error("expected exactly one argument, got {0}")]
    Usage(usize),

    #[error(transparent)]
    Link(#[from] LinkError),
}

impl HostError {
    /// Whether the failure was the user's input rather than the entry point.
    pub fn is_input(&self) -> bool {
        matches!(self, HostError::Input(_))
    }
}

/// The single argument after the program name.
///
/// Arguments are taken verbatim; nothing is treated as an option.
pub fn single_argument<I, S>(args: I) -> Result<String, HostError>
where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
{
    let mut args: Vec<OsString> = args.into_iter().map(Into::into).collect();
    if args.len() != 1 {
        return Err(HostError::Usage(args.len()));
    }
    let arg = args.remove(0);
    Ok(arg.to_string_lossy().into_owned())
}

/// Parse the command-line argument.
pub fn parse_argument(literal: &str) -> Result<i64, HostError> {
    Ok(parse_int64(literal)?)
}

/// Parse `literal` and call the reference `IntToInt` body with it.
///
/// The literal is validated before anything is loaded, so bad input never
/// reaches generated code.
pub fn run(literal: &str) -> Result<i64, HostError> {
    let arg = parse_argument(literal)?;
    let intrinsics = IntrinsicTable::standard();
    let loaded = EntryLoader::new(&intrinsics)
        .load(&EntryBody::reference(SignatureVariant::IntToInt))?;
    call(loaded.entry(), arg)
}

/// Call an `IntToInt` entry point with `arg`.
pub fn call(entry: EntryPointReference<'_>, arg: i64) -> Result<i64, HostError> {
    if entry.variant() != SignatureVariant::IntToInt {
        return Err(HostError::WrongVariant(entry.variant()));
    }
    let result = entry.call_int(arg)?;
    debug!(arg, result, "tempo_entry returned");
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempo_abi::EntryFn;

    unsafe extern "C" fn triple(x: i64) -> i64 {
        x.wrapping_mul(3)
    }

    #[test]
    fn call_checks_the_variant() {
        let entry = unsafe { EntryPointReference::from_linked(EntryFn::IntToInt(triple)) };
        assert_eq!(call(entry, 7).unwrap(), 21);

        let entry = unsafe { EntryPointReference::from_linked(EntryFn::IntArithmetic(triple)) };
        assert!(matches!(
            call(entry, 7),
            Err(HostError::WrongVariant(SignatureVariant::IntArithmetic))
        ));
    }

    #[test]
    fn invalid_literals_are_input_errors() {
        for literal in ["12abc", "", "--", " 1", "1.5"] {
            let err = run(literal).unwrap_err();
            assert!(err.is_input(), "{literal:?} gave {err}");
            assert_eq!(err.to_string(), format!("Invalid integer '{literal}'"));
        }
    }

    #[test]
    fn exactly_one_argument_is_taken() {
        assert_eq!(single_argument(["21"]).unwrap(), "21");
        assert_eq!(single_argument(["--"]).unwrap(), "--");
        assert!(matches!(
            single_argument(Vec::<String>::new()),
            Err(HostError::Usage(0))
        ));
        assert!(matches!(single_argument(["1", "2"]), Err(HostError::Usage(2))));
    }

    #[test]
    fn option_like_arguments_are_invalid_literals() {
        for literal in ["--help", "-h", "--version", "-V", "--"] {
            let arg = single_argument([literal]).unwrap();
            let err = run(&arg).unwrap_err();
            assert!(err.is_input(), "{literal:?} gave {err}");
            assert_eq!(err.to_string(), format!("Invalid integer '{literal}'"));
        }
    }

    #[test]
    fn overflow_is_an_input_error() {
        let err = run("9223372036854775808").unwrap_err();
        assert!(err.is_input());
    }

    #[test]
    fn reference_entry_doubles() {
        assert_eq!(run("21").unwrap(), 42);
        assert_eq!(run("-4").unwrap(), -8);
        assert_eq!(run("+5").unwrap(), 10);
        assert_eq!(run("0").unwrap(), 0);
    }
}
